//! Spreadsheet export sink: one CSV file per non-empty category.

use crate::models::ListingRecord;
use crate::pipeline::CategoryResults;
use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Write every non-empty category to `<dir>/<category>.csv` and return the
/// paths actually produced. A permission failure on the primary name retries
/// once on `<category>_backup.csv`; any other per-file failure is logged and
/// that artifact is skipped — the scrape data of other categories still gets
/// written.
pub fn write_category_files(results: &CategoryResults, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("Could not create export dir {dir:?}"))?;

    let mut written = Vec::new();
    for (name, records) in results {
        if records.is_empty() {
            continue;
        }

        let path = dir.join(format!("{name}.csv"));
        match write_sheet(&path, records) {
            Ok(()) => {
                info!(category = %name, file = %path.display(), rows = records.len(), "Exported");
                written.push(path);
            }
            Err(e) if is_permission_denied(&e) => {
                let backup = dir.join(format!("{name}_backup.csv"));
                warn!(
                    category = %name,
                    file = %path.display(),
                    "File locked or not writable, retrying as {}",
                    backup.display()
                );
                match write_sheet(&backup, records) {
                    Ok(()) => written.push(backup),
                    Err(e) => warn!(category = %name, "Backup write failed too: {e}"),
                }
            }
            Err(e) => warn!(category = %name, file = %path.display(), "Export failed: {e}"),
        }
    }

    Ok(written)
}

fn write_sheet(path: &Path, records: &[ListingRecord]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

fn is_permission_denied(e: &csv::Error) -> bool {
    match e.kind() {
        csv::ErrorKind::Io(io) => io.kind() == ErrorKind::PermissionDenied,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PinStatus;

    fn record(id: &str) -> ListingRecord {
        ListingRecord {
            id: Some(id.to_string()),
            date_published: Some("2024-01-15 09:00:00".to_string()),
            relative_date: Some("5 Hours".to_string()),
            pin: PinStatus::NotPinned,
            listing_type: Some("House for Sale".to_string()),
            title: Some(format!("Listing {id}")),
            description: None,
            link: format!("https://www.q84sale.com/en/property/listing-{id}"),
            image: None,
            price: "95,000 KWD".to_string(),
            address: "Salmiya, Block 3".to_string(),
            beds: "4 Beds".to_string(),
            area: "400 m2".to_string(),
            views_no: Some("542".to_string()),
            submitter: Some("Al Deera Real Estate".to_string()),
            ads: Some("12 ads".to_string()),
            membership: Some("Member since 2019".to_string()),
            phone: Some("+96512345678".to_string()),
        }
    }

    fn scratch_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("q84-export-{tag}-{}", std::process::id()))
    }

    #[test]
    fn test_writes_one_file_per_nonempty_category() {
        let dir = scratch_dir("basic");
        let mut results = CategoryResults::new();
        results.insert("Houses".to_string(), vec![record("1"), record("2")]);
        results.insert("Flats".to_string(), vec![record("3")]);
        results.insert("Empty".to_string(), vec![]);

        let files = write_category_files(&results, &dir).unwrap();
        assert_eq!(files.len(), 2);
        assert!(dir.join("Houses.csv").exists());
        assert!(dir.join("Flats.csv").exists());
        assert!(!dir.join("Empty.csv").exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_rows_round_trip() {
        let dir = scratch_dir("roundtrip");
        let mut results = CategoryResults::new();
        results.insert("Houses".to_string(), vec![record("1"), record("2")]);

        write_category_files(&results, &dir).unwrap();

        let mut reader = csv::Reader::from_path(dir.join("Houses.csv")).unwrap();
        let rows: Vec<ListingRecord> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id.as_deref(), Some("1"));
        assert_eq!(rows[0].price, "95,000 KWD");
        assert_eq!(rows[1].description, None);

        let _ = fs::remove_dir_all(&dir);
    }
}
