use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// One business discovered in the listing feed.
///
/// Every field except `id`, `name` and `discovered_at` starts out empty and
/// is filled at most once: discovery sets what the listing card shows, the
/// detail pass fills whatever is still missing.
#[derive(Debug, Clone, Default)]
pub struct Record {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub full_address: Option<String>,
    pub street: Option<String>,
    pub municipality: Option<String>,
    pub categories: Option<String>,
    pub time_zone: Option<String>,
    pub amenities: Option<String>,
    pub phone: Option<String>,
    pub phones: Option<String>,
    pub claimed: Option<String>,
    pub review_count: Option<String>,
    pub average_rating: Option<String>,
    pub review_url: Option<String>,
    pub maps_url: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub website: Option<String>,
    pub domain: Option<String>,
    pub opening_hours: Option<String>,
    pub featured_image: Option<String>,
    pub cid: Option<String>,
    pub fid: Option<String>,
    pub discovered_at: DateTime<Utc>,
}

/// Export columns, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Name,
    Description,
    FullAddress,
    Street,
    Municipality,
    Categories,
    TimeZone,
    Amenities,
    Phone,
    Phones,
    Claimed,
    ReviewCount,
    AverageRating,
    ReviewUrl,
    MapsUrl,
    Latitude,
    Longitude,
    Website,
    Domain,
    OpeningHours,
    FeaturedImage,
    Cid,
    Fid,
    PlaceId,
}

impl Column {
    pub const ALL: [Column; 24] = [
        Column::Name,
        Column::Description,
        Column::FullAddress,
        Column::Street,
        Column::Municipality,
        Column::Categories,
        Column::TimeZone,
        Column::Amenities,
        Column::Phone,
        Column::Phones,
        Column::Claimed,
        Column::ReviewCount,
        Column::AverageRating,
        Column::ReviewUrl,
        Column::MapsUrl,
        Column::Latitude,
        Column::Longitude,
        Column::Website,
        Column::Domain,
        Column::OpeningHours,
        Column::FeaturedImage,
        Column::Cid,
        Column::Fid,
        Column::PlaceId,
    ];

    pub fn header(self) -> &'static str {
        match self {
            Column::Name => "Name",
            Column::Description => "Description",
            Column::FullAddress => "Fulladdress",
            Column::Street => "Street",
            Column::Municipality => "Municipality",
            Column::Categories => "Categories",
            Column::TimeZone => "Time Zone",
            Column::Amenities => "Amenities",
            Column::Phone => "Phone",
            Column::Phones => "Phones",
            Column::Claimed => "Claimed",
            Column::ReviewCount => "Review Count",
            Column::AverageRating => "Average Rating",
            Column::ReviewUrl => "Review URL",
            Column::MapsUrl => "Google Maps URL",
            Column::Latitude => "Latitude",
            Column::Longitude => "Longitude",
            Column::Website => "Website",
            Column::Domain => "Domain",
            Column::OpeningHours => "Opening Hours",
            Column::FeaturedImage => "Featured Image",
            Column::Cid => "Cid",
            Column::Fid => "Fid",
            Column::PlaceId => "Place Id",
        }
    }
}

impl Record {
    pub fn new(id: impl Into<String>, name: impl Into<String>, discovered_at: DateTime<Utc>) -> Self {
        Record {
            id: id.into(),
            name: name.into(),
            discovered_at,
            ..Default::default()
        }
    }

    pub fn value(&self, column: Column) -> Option<&str> {
        let v = match column {
            Column::Name => return Some(self.name.as_str()),
            Column::PlaceId => return Some(self.id.as_str()),
            Column::Description => &self.description,
            Column::FullAddress => &self.full_address,
            Column::Street => &self.street,
            Column::Municipality => &self.municipality,
            Column::Categories => &self.categories,
            Column::TimeZone => &self.time_zone,
            Column::Amenities => &self.amenities,
            Column::Phone => &self.phone,
            Column::Phones => &self.phones,
            Column::Claimed => &self.claimed,
            Column::ReviewCount => &self.review_count,
            Column::AverageRating => &self.average_rating,
            Column::ReviewUrl => &self.review_url,
            Column::MapsUrl => &self.maps_url,
            Column::Latitude => &self.latitude,
            Column::Longitude => &self.longitude,
            Column::Website => &self.website,
            Column::Domain => &self.domain,
            Column::OpeningHours => &self.opening_hours,
            Column::FeaturedImage => &self.featured_image,
            Column::Cid => &self.cid,
            Column::Fid => &self.fid,
        };
        v.as_deref()
    }

    /// Mutable slot for a fillable column. `Name` and `PlaceId` are fixed at
    /// discovery and have no slot.
    pub fn slot_mut(&mut self, column: Column) -> Option<&mut Option<String>> {
        let slot = match column {
            Column::Name | Column::PlaceId => return None,
            Column::Description => &mut self.description,
            Column::FullAddress => &mut self.full_address,
            Column::Street => &mut self.street,
            Column::Municipality => &mut self.municipality,
            Column::Categories => &mut self.categories,
            Column::TimeZone => &mut self.time_zone,
            Column::Amenities => &mut self.amenities,
            Column::Phone => &mut self.phone,
            Column::Phones => &mut self.phones,
            Column::Claimed => &mut self.claimed,
            Column::ReviewCount => &mut self.review_count,
            Column::AverageRating => &mut self.average_rating,
            Column::ReviewUrl => &mut self.review_url,
            Column::MapsUrl => &mut self.maps_url,
            Column::Latitude => &mut self.latitude,
            Column::Longitude => &mut self.longitude,
            Column::Website => &mut self.website,
            Column::Domain => &mut self.domain,
            Column::OpeningHours => &mut self.opening_hours,
            Column::FeaturedImage => &mut self.featured_image,
            Column::Cid => &mut self.cid,
            Column::Fid => &mut self.fid,
        };
        Some(slot)
    }

    /// Fill `Phone`, then copy whatever `Phone` holds into an empty `Phones`
    /// so the two never diverge. Returns the columns written.
    pub fn fill_phone(&mut self, number: &str) -> Vec<Column> {
        let mut filled = Vec::new();
        if self.fill(Column::Phone, number) {
            filled.push(Column::Phone);
        }
        if self.phones.is_none() {
            if let Some(phone) = self.phone.clone() {
                self.phones = Some(phone);
                filled.push(Column::Phones);
            }
        }
        filled
    }

    /// Write `value` into `column` only if the slot is still empty.
    /// Returns true when the record changed.
    pub fn fill(&mut self, column: Column, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return false;
        }
        match self.slot_mut(column) {
            Some(slot) if slot.is_none() => {
                *slot = Some(value.to_string());
                true
            }
            _ => false,
        }
    }
}

/// Ordered records plus the dedup index keyed by place id.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: Vec<Record>,
    index: HashMap<String, usize>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly discovered record. Empty or already-seen ids are
    /// ignored; returns true when the record was added.
    pub fn insert(&mut self, record: Record) -> bool {
        if record.id.is_empty() || self.index.contains_key(&record.id) {
            return false;
        }
        self.index.insert(record.id.clone(), self.records.len());
        self.records.push(record);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    #[cfg(test)]
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Record> {
        self.index.get(id).map(|&i| &mut self.records[i])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }
}

impl FromIterator<Record> for RecordStore {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let mut store = RecordStore::new();
        for record in iter {
            store.insert(record);
        }
        store
    }
}

// ── Tests ──
