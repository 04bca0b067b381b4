use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::store::{Column, Record};

/// `google-maps-data-<epoch ms>.csv`
pub fn default_file_name(now: DateTime<Utc>) -> String {
    format!("google-maps-data-{}.csv", now.timestamp_millis())
}

/// Header row plus one row per record, columns in `Column::ALL` order.
/// Values are quoted only when they hold a comma, a quote or a line break.
pub fn write_csv<'a, W: Write>(records: impl IntoIterator<Item = &'a Record>, out: W) -> Result<usize> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out);

    writer
        .write_record(Column::ALL.iter().map(|c| c.header()))
        .context("Failed to write CSV header")?;

    let mut rows = 0;
    for record in records {
        writer
            .write_record(Column::ALL.iter().map(|c| record.value(*c).unwrap_or("")))
            .with_context(|| format!("Failed to write row for {}", record.name))?;
        rows += 1;
    }
    writer.flush().context("Failed to flush CSV")?;
    Ok(rows)
}

/// The store as CSV text; `None` when there is nothing to export.
pub fn to_csv_string<'a>(records: impl IntoIterator<Item = &'a Record>) -> Result<Option<String>> {
    let mut buf = Vec::new();
    let rows = write_csv(records, &mut buf)?;
    if rows == 0 {
        warn!("No data to export");
        return Ok(None);
    }
    info!("Exported {} records", rows);
    Ok(Some(String::from_utf8(buf).context("CSV output is not UTF-8")?))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RecordStore;

    fn store() -> RecordStore {
        let mut store = RecordStore::new();
        let mut joe = Record::new("0x1:0x2", "Joe's Pizza", Utc::now());
        joe.fill(Column::Phone, "(212) 366-1182");
        joe.fill(Column::Latitude, "40.7305991");
        store.insert(joe);
        let mut tom = Record::new("0x3:0x4", "Tom's \"BBQ\", Inc.", Utc::now());
        tom.fill(Column::Categories, "Barbecue restaurant");
        store.insert(tom);
        store
    }

    #[test]
    fn header_plus_one_line_per_record() {
        let csv = to_csv_string(store().iter()).unwrap().unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Name,Description,Fulladdress,Street,Municipality,Categories,Time Zone"));
        assert!(lines[0].ends_with("Featured Image,Cid,Fid,Place Id"));
        assert_eq!(lines[0].split(',').count(), 24);
    }

    #[test]
    fn values_are_escaped() {
        let csv = to_csv_string(store().iter()).unwrap().unwrap();
        let tom = csv.lines().nth(2).unwrap();
        assert!(tom.starts_with(r#""Tom's ""BBQ"", Inc.",,,,,Barbecue restaurant,"#));
        assert!(tom.ends_with(",0x3:0x4"));
    }

    #[test]
    fn empty_fields_are_empty_cells() {
        let csv = to_csv_string(store().iter()).unwrap().unwrap();
        let joe: Vec<&str> = csv.lines().nth(1).unwrap().split(',').collect();
        assert_eq!(joe.len(), 24);
        assert_eq!(joe[0], "Joe's Pizza");
        assert_eq!(joe[1], "");
        assert_eq!(joe[8], "(212) 366-1182");
        assert_eq!(joe[15], "40.7305991");
    }

    #[test]
    fn empty_store_exports_nothing() {
        assert_eq!(to_csv_string(RecordStore::new().iter()).unwrap(), None);
    }

    #[test]
    fn file_name_uses_epoch_millis() {
        let at = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        assert_eq!(default_file_name(at), "google-maps-data-1700000000123.csv");
    }
}
