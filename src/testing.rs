// Shared fixtures for unit tests

use crate::config::InventoryConfig;
use crate::loader::RawRecord;

/// Source record with the default headers; the trailing columns are filler
pub fn raw(
    district: &str,
    facility_type: &str,
    facility_name: &str,
    equipment: &str,
    location: &str,
) -> RawRecord {
    let config = InventoryConfig::default();
    let values = [
        district,
        facility_type,
        facility_name,
        equipment,
        location,
        "Acme Medical",
        "1",
        "W",
    ];
    config
        .fields
        .iter()
        .zip(values)
        .map(|(f, v)| (f.source_name.clone(), v.to_string()))
        .collect()
}

/// `count` copies of the same item in one room
pub fn items(
    count: usize,
    district: &str,
    facility_type: &str,
    facility_name: &str,
    equipment: &str,
    location: &str,
) -> Vec<RawRecord> {
    (0..count)
        .map(|_| raw(district, facility_type, facility_name, equipment, location))
        .collect()
}
