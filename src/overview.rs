// 🔎 Inventory Overview - quick look at a loaded Inventory table
// Entry/district/facility/room counts and where each kind of equipment sits

use crate::config::{
    InventoryConfig, DISTRICT, EQUIPMENT, FACILITY_NAME, FACILITY_TYPE, INVENTORY_TABLE, LOCATION,
};
use crate::error::Result;
use crate::facility::EquipmentKind;
use crate::store::{Filter, RecordStore};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryOverview {
    pub entries: i64,
    pub districts: i64,
    pub facilities: i64,
    pub rooms: i64,
}

pub fn overview<S: RecordStore + ?Sized>(store: &S) -> Result<InventoryOverview> {
    Ok(InventoryOverview {
        entries: store.count_rows(INVENTORY_TABLE)?,
        districts: store.distinct_count(INVENTORY_TABLE, &[DISTRICT])?,
        facilities: store.distinct_count(INVENTORY_TABLE, &[DISTRICT, FACILITY_TYPE, FACILITY_NAME])?,
        rooms: store.distinct_count(
            INVENTORY_TABLE,
            &[DISTRICT, FACILITY_TYPE, FACILITY_NAME, LOCATION],
        )?,
    })
}

/// Item counts per location, for one tracked kind or (with `None`) all equipment
pub fn equipment_by_location<S: RecordStore + ?Sized>(
    store: &S,
    config: &InventoryConfig,
    kind: Option<EquipmentKind>,
) -> Result<BTreeMap<String, i64>> {
    let filter = kind.map(|k| Filter::equals(EQUIPMENT, k.canonical_name(&config.equipment)));

    Ok(store
        .group_count(INVENTORY_TABLE, &[LOCATION], filter.as_ref())?
        .into_iter()
        .map(|g| (g.key[0].to_string(), g.count))
        .collect())
}
