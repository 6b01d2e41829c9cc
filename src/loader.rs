// 📥 Inventory Loader - raw extract → Inventory table
// Filters to oxygen/pulse equipment, lower-cases every field, aborts on schema drift

use crate::config::{InventoryConfig, EQUIPMENT, INVENTORY_TABLE};
use crate::error::{InventoryError, Result};
use crate::store::{Cell, RecordStore, TableSchema};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// One source row: header → raw string value
pub type RawRecord = HashMap<String, String>;

/// Read a header-keyed CSV extract
pub fn read_csv_records(csv_path: &Path) -> Result<Vec<RawRecord>> {
    let mut rdr = csv::Reader::from_path(csv_path)?;

    let mut records = Vec::new();
    for result in rdr.deserialize() {
        let record: RawRecord = result?;
        records.push(record);
    }

    info!(path = %csv_path.display(), records = records.len(), "read source extract");
    Ok(records)
}

/// Schema of the Inventory table, straight from the field mapping
pub fn inventory_schema(config: &InventoryConfig) -> TableSchema {
    let columns: Vec<(&str, _)> = config
        .fields
        .iter()
        .map(|f| (f.field_name.as_str(), f.column_type))
        .collect();
    TableSchema::new(INVENTORY_TABLE, &columns)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub records_seen: usize,
    pub records_loaded: usize,
    pub records_skipped: usize,
}

// ============================================================================
// LOADER
// ============================================================================

pub struct InventoryLoader<'a> {
    config: &'a InventoryConfig,
}

impl<'a> InventoryLoader<'a> {
    pub fn new(config: &'a InventoryConfig) -> Self {
        InventoryLoader { config }
    }

    /// Whether an equipment name is in scope for this inventory
    pub fn is_tracked_equipment(&self, equipment_name: &str) -> bool {
        let lower = equipment_name.to_lowercase();
        self.config
            .equipment_keywords
            .iter()
            .any(|keyword| lower.contains(&keyword.to_lowercase()))
    }

    /// Project one record onto the Inventory columns, or `None` if filtered out.
    /// `ordinal` is the record's 1-based position, used in shape errors.
    pub fn project(&self, record: &RawRecord, ordinal: usize) -> Result<Option<Vec<Cell>>> {
        let equipment = self.config.mapping(EQUIPMENT)?;
        let equipment_name = record.get(&equipment.source_name).ok_or_else(|| {
            InventoryError::RecordShape {
                field: equipment.source_name.clone(),
                ordinal,
            }
        })?;

        // Every column must be present even on rows we skip; a missing
        // header means the extract does not match the mapping.
        let mut row = Vec::with_capacity(self.config.fields.len());
        for field in &self.config.fields {
            let value = record.get(&field.source_name).ok_or_else(|| {
                InventoryError::RecordShape {
                    field: field.source_name.clone(),
                    ordinal,
                }
            })?;
            row.push(Cell::from(value.to_lowercase()));
        }

        if self.is_tracked_equipment(equipment_name) {
            Ok(Some(row))
        } else {
            Ok(None)
        }
    }

    /// Filter, project and bulk-insert records. Nothing is inserted if any
    /// record is malformed.
    pub fn load<S, I>(&self, store: &mut S, records: I) -> Result<LoadReport>
    where
        S: RecordStore + ?Sized,
        I: IntoIterator<Item = RawRecord>,
    {
        let mut report = LoadReport::default();
        let mut rows = Vec::new();

        for (index, record) in records.into_iter().enumerate() {
            report.records_seen += 1;
            match self.project(&record, index + 1)? {
                Some(row) => rows.push(row),
                None => report.records_skipped += 1,
            }
        }

        let columns: Vec<&str> = self
            .config
            .fields
            .iter()
            .map(|f| f.field_name.as_str())
            .collect();
        report.records_loaded = store.insert_rows(INVENTORY_TABLE, &columns, &rows)?;

        info!(
            seen = report.records_seen,
            loaded = report.records_loaded,
            skipped = report.records_skipped,
            "populated table {}",
            INVENTORY_TABLE
        );
        Ok(report)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Filter, MemoryStore, SqliteStore};
    use crate::testing::raw;
    use std::io::Write;

    fn setup(config: &InventoryConfig) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.create_table(&inventory_schema(config)).unwrap();
        store
    }

    #[test]
    fn test_filter_keeps_oxygen_and_pulse() {
        let config = InventoryConfig::default();
        let loader = InventoryLoader::new(&config);

        assert!(loader.is_tracked_equipment("Oxygen Concentrator"));
        assert!(loader.is_tracked_equipment("Oxygen Humidifier"));
        assert!(loader.is_tracked_equipment("PULSE OXIMETER"));
        assert!(!loader.is_tracked_equipment("Thermometer"));
        assert!(!loader.is_tracked_equipment("ECG Machine"));
    }

    #[test]
    fn test_load_filters_and_lowercases() {
        let config = InventoryConfig::default();
        let mut store = setup(&config);

        let records = vec![
            raw("Kheda", "PHC", "PHC Alindra", "Oxygen Humidifier", "OPD"),
            raw("Kheda", "PHC", "PHC Alindra", "Thermometer", "OPD"),
            raw("Kheda", "PHC", "PHC Alindra", "Pulse Oximeter", "OPD"),
        ];

        let report = InventoryLoader::new(&config).load(&mut store, records).unwrap();

        assert_eq!(report.records_seen, 3);
        assert_eq!(report.records_loaded, 2);
        assert_eq!(report.records_skipped, 1);

        let equipment = store.group_count(INVENTORY_TABLE, &[EQUIPMENT], None).unwrap();
        let names: Vec<String> = equipment.iter().map(|g| g.key[0].to_string()).collect();
        assert_eq!(names, vec!["oxygen humidifier", "pulse oximeter"]);

        let thermometers = store
            .group_count(INVENTORY_TABLE, &[], Some(&Filter::equals(EQUIPMENT, "thermometer")))
            .unwrap();
        assert_eq!(thermometers[0].count, 0);

        let kheda = store
            .group_count(INVENTORY_TABLE, &[], Some(&Filter::equals("district", "kheda")))
            .unwrap();
        assert_eq!(kheda[0].count, 2);
    }

    #[test]
    fn test_record_matching_both_keywords_loads_once() {
        let config = InventoryConfig::default();
        let mut store = setup(&config);

        let records = vec![raw("Anand", "CHC", "CHC Borsad", "Pulse Oxygen Monitor", "ICU")];
        let report = InventoryLoader::new(&config).load(&mut store, records).unwrap();

        assert_eq!(report.records_loaded, 1);
        assert_eq!(store.count_rows(INVENTORY_TABLE).unwrap(), 1);
    }

    #[test]
    fn test_missing_field_aborts_load() {
        let config = InventoryConfig::default();
        let mut store = setup(&config);

        let mut broken = raw("Anand", "CHC", "CHC Borsad", "Oxygen Cylinder", "ICU");
        broken.remove("Manufacturer");

        let records = vec![
            raw("Anand", "CHC", "CHC Borsad", "Oxygen Cylinder", "ICU"),
            broken,
        ];
        let err = InventoryLoader::new(&config)
            .load(&mut store, records)
            .unwrap_err();

        match err {
            InventoryError::RecordShape { field, ordinal } => {
                assert_eq!(field, "Manufacturer");
                assert_eq!(ordinal, 2);
            }
            other => panic!("expected RecordShape, got {:?}", other),
        }

        // First record was valid but nothing may be committed
        assert_eq!(store.count_rows(INVENTORY_TABLE).unwrap(), 0);
    }

    #[test]
    fn test_missing_field_on_filtered_record_still_fails() {
        let config = InventoryConfig::default();
        let mut store = setup(&config);

        let mut broken = raw("Anand", "CHC", "CHC Borsad", "Thermometer", "ICU");
        broken.remove("DISTRICT");

        let err = InventoryLoader::new(&config)
            .load(&mut store, vec![broken])
            .unwrap_err();
        assert!(matches!(err, InventoryError::RecordShape { ordinal: 1, .. }));
    }

    #[test]
    fn test_read_csv_and_load_into_sqlite() {
        let config = InventoryConfig::default();
        let headers: Vec<String> = config
            .fields
            .iter()
            .map(|f| format!("\"{}\"", f.source_name))
            .collect();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", headers.join(",")).unwrap();
        writeln!(file, "Kheda,DH,DH Nadiad,Oxygen Cyclinder,ICU Room,Inox,1,W").unwrap();
        writeln!(file, "Kheda,DH,DH Nadiad,Pulse Oximeter,ICU,BPL,0,NW").unwrap();
        writeln!(file, "Kheda,DH,DH Nadiad,BP Apparatus,ICU,BPL,0,W").unwrap();
        file.flush().unwrap();

        let records = read_csv_records(file.path()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["Equipment name"], "Oxygen Cyclinder");

        let mut store = SqliteStore::open_in_memory().unwrap();
        store.create_table(&inventory_schema(&config)).unwrap();
        let report = InventoryLoader::new(&config).load(&mut store, records).unwrap();

        assert_eq!(report.records_loaded, 2);
        let statuses = store.group_count(INVENTORY_TABLE, &["status"], None).unwrap();
        assert_eq!(statuses[0].key[0], Cell::from("nw"));
    }
}
