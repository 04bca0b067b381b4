pub mod address;
pub mod category;
pub mod hours;
pub mod image;
pub mod location;
pub mod phone;
pub mod rating;
pub mod website;

use scraper::{ElementRef, Html};
use tracing::debug;

use crate::store::{Column, Record};

/// The detail panel as the extractors see it.
///
/// `scope` is the verified detail container in strict mode and the whole
/// document otherwise; `root` is always the whole document and is only read
/// by the unscoped fallbacks, which run when `strict` is off.
pub struct DetailView<'a> {
    pub scope: ElementRef<'a>,
    pub root: ElementRef<'a>,
    pub location: &'a str,
    pub strict: bool,
}

impl<'a> DetailView<'a> {
    pub fn new(
        doc: &'a Html,
        container: Option<ElementRef<'a>>,
        location: &'a str,
        strict: bool,
    ) -> Self {
        let root = doc.root_element();
        let scope = match container {
            Some(c) if strict => c,
            _ => root,
        };
        DetailView {
            scope,
            root,
            location,
            strict,
        }
    }
}

/// Columns written during one pass.
#[derive(Debug, Default)]
pub struct ExtractReport {
    pub filled: Vec<Column>,
}

impl ExtractReport {
    fn put(&mut self, record: &mut Record, column: Column, value: &str) {
        if record.fill(column, value) {
            debug!("Found {}: {}", column.header(), value);
            self.filled.push(column);
        }
    }

    fn put_phone(&mut self, record: &mut Record, number: &str) {
        let filled = record.fill_phone(number);
        if !filled.is_empty() {
            debug!("Found Phone: {}", number);
        }
        self.filled.extend(filled);
    }

    pub fn contains(&self, column: Column) -> bool {
        self.filled.contains(&column)
    }

    /// Short tag list for the per-record log line.
    pub fn summary(&self) -> String {
        [
            (Column::Phone, "phone"),
            (Column::Website, "website"),
            (Column::FullAddress, "address"),
            (Column::OpeningHours, "hours"),
        ]
        .iter()
        .filter(|(c, _)| self.contains(*c))
        .map(|(_, tag)| *tag)
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// Run every field extractor against `view`, writing into empty slots of
/// `record` only. Fields that cannot be found are left alone.
pub fn extract_all(view: &DetailView, record: &mut Record) -> ExtractReport {
    let mut report = ExtractReport::default();

    if let Some(number) = phone::extract(view) {
        report.put_phone(record, &number);
    }

    if let Some(site) = website::extract(view) {
        report.put(record, Column::Website, &site.url);
        report.put(record, Column::Domain, &site.domain);
    }

    if let Some(addr) = address::extract(view) {
        report.put(record, Column::FullAddress, &addr.full);
        if let Some(street) = &addr.street {
            report.put(record, Column::Street, street);
        }
        if let Some(locality) = &addr.locality {
            report.put(record, Column::Municipality, locality);
        }
    }

    if let Some(categories) = category::extract(view) {
        report.put(record, Column::Categories, &categories);
    }

    let stars = rating::extract(view);
    if let Some(r) = &stars.rating {
        report.put(record, Column::AverageRating, r);
    }
    if let Some(n) = &stars.reviews {
        report.put(record, Column::ReviewCount, n);
    }

    if let Some(h) = hours::extract(view) {
        report.put(record, Column::OpeningHours, &h);
    }

    if let Some((lat, lng)) = location::coordinates(view.location) {
        report.put(record, Column::Latitude, &lat);
        report.put(record, Column::Longitude, &lng);
    }

    if let Some(src) = image::extract(view) {
        report.put(record, Column::FeaturedImage, &src);
    }

    if let Some(ids) = location::hex_ids(view.location) {
        report.put(record, Column::Fid, &ids.fid);
        if let Some(cid) = &ids.cid {
            report.put(record, Column::Cid, cid);
        }
    }

    if !record.id.is_empty() {
        let url = location::review_url(&record.id);
        report.put(record, Column::ReviewUrl, &url);
    }

    report
}

// ── Tests ──
