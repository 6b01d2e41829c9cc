// 🏥 Facility Aggregator - per-room equipment tallies
// Rolls Inventory rows up to (district, facility, type, room) and derives coordinated use
//
// Coordinated use: a room stocks an oxygen source (concentrator or cylinder)
// AND a pulse oximeter.

use crate::config::{
    ColumnType, InventoryConfig, TrackedEquipment, DISTRICT, EQUIPMENT, FACILITY_NAME,
    FACILITY_TABLE, FACILITY_TYPE, INVENTORY_TABLE, LOCATION,
};
use crate::error::{DataAnomaly, Result, UnrecognizedTermWarning};
use crate::store::{Cell, RecordStore, TableSchema};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

pub const COORDINATED_USE: &str = "coordinated_use";
pub const OXYGEN_CONCENTRATORS: &str = "oxygen_concentrators";
pub const OXYGEN_CYLINDERS: &str = "oxygen_cylinders";
pub const PULSE_OXIMETERS: &str = "pulse_oximeters";
pub const OTHER_EQUIPMENT: &str = "other_equipment";

pub fn facility_schema() -> TableSchema {
    TableSchema::new(
        FACILITY_TABLE,
        &[
            (DISTRICT, ColumnType::Text),
            (FACILITY_NAME, ColumnType::Text),
            (FACILITY_TYPE, ColumnType::Text),
            (LOCATION, ColumnType::Text),
            (COORDINATED_USE, ColumnType::Int),
            (OXYGEN_CONCENTRATORS, ColumnType::Int),
            (OXYGEN_CYLINDERS, ColumnType::Int),
            (PULSE_OXIMETERS, ColumnType::Int),
            (OTHER_EQUIPMENT, ColumnType::Int),
        ],
    )
}

/// The coordinated-use rule
pub fn coordinated_use(concentrators: i64, cylinders: i64, oximeters: i64) -> bool {
    (concentrators > 0 || cylinders > 0) && oximeters > 0
}

// ============================================================================
// EQUIPMENT KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EquipmentKind {
    OxygenConcentrator,
    OxygenCylinder,
    PulseOximeter,
}

impl EquipmentKind {
    pub const ALL: [EquipmentKind; 3] = [
        EquipmentKind::OxygenConcentrator,
        EquipmentKind::OxygenCylinder,
        EquipmentKind::PulseOximeter,
    ];

    /// Exact match against the configured canonical names
    pub fn classify(equipment_name: &str, tracked: &TrackedEquipment) -> Option<Self> {
        EquipmentKind::ALL
            .into_iter()
            .find(|kind| kind.canonical_name(tracked) == equipment_name)
    }

    pub fn canonical_name<'a>(&self, tracked: &'a TrackedEquipment) -> &'a str {
        match self {
            EquipmentKind::OxygenConcentrator => &tracked.oxygen_concentrator,
            EquipmentKind::OxygenCylinder => &tracked.oxygen_cylinder,
            EquipmentKind::PulseOximeter => &tracked.pulse_oximeter,
        }
    }
}

// ============================================================================
// TALLY
// ============================================================================

/// Equipment counts for one room: tracked kinds by name, everything else by spelling
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EquipmentTally {
    pub oxygen_concentrators: i64,
    pub oxygen_cylinders: i64,
    pub pulse_oximeters: i64,
    pub unrecognized: BTreeMap<String, i64>,
}

impl EquipmentTally {
    pub fn add(&mut self, kind: Option<EquipmentKind>, equipment_name: &str, count: i64) {
        match kind {
            Some(EquipmentKind::OxygenConcentrator) => self.oxygen_concentrators += count,
            Some(EquipmentKind::OxygenCylinder) => self.oxygen_cylinders += count,
            Some(EquipmentKind::PulseOximeter) => self.pulse_oximeters += count,
            None => *self.unrecognized.entry(equipment_name.to_string()).or_insert(0) += count,
        }
    }

    pub fn other_equipment(&self) -> i64 {
        self.unrecognized.values().sum()
    }

    pub fn coordinated_use(&self) -> bool {
        coordinated_use(
            self.oxygen_concentrators,
            self.oxygen_cylinders,
            self.pulse_oximeters,
        )
    }
}

// ============================================================================
// ROOM SUMMARY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FacilityKey {
    pub district: String,
    pub facility_name: String,
    pub facility_type: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacilityRoomSummary {
    pub district: String,
    pub facility_name: String,
    pub facility_type: String,
    pub location: String,
    pub coordinated_use: bool,
    pub oxygen_concentrators: i64,
    pub oxygen_cylinders: i64,
    pub pulse_oximeters: i64,
    pub other_equipment: i64,
}

impl FacilityRoomSummary {
    pub fn new(key: FacilityKey, tally: &EquipmentTally) -> Self {
        FacilityRoomSummary {
            district: key.district,
            facility_name: key.facility_name,
            facility_type: key.facility_type,
            location: key.location,
            coordinated_use: tally.coordinated_use(),
            oxygen_concentrators: tally.oxygen_concentrators,
            oxygen_cylinders: tally.oxygen_cylinders,
            pulse_oximeters: tally.pulse_oximeters,
            other_equipment: tally.other_equipment(),
        }
    }

    /// Values in `facility_schema()` column order
    fn to_row(&self) -> Vec<Cell> {
        vec![
            Cell::from(self.district.as_str()),
            Cell::from(self.facility_name.as_str()),
            Cell::from(self.facility_type.as_str()),
            Cell::from(self.location.as_str()),
            Cell::from(self.coordinated_use),
            Cell::from(self.oxygen_concentrators),
            Cell::from(self.oxygen_cylinders),
            Cell::from(self.pulse_oximeters),
            Cell::from(self.other_equipment),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FacilityRollup {
    pub rooms: Vec<FacilityRoomSummary>,

    /// Equipment names outside the tracked kinds, with item counts
    pub unrecognized: BTreeMap<String, i64>,

    pub anomalies: Vec<DataAnomaly>,
}

impl FacilityRollup {
    pub fn coordinated_rooms(&self) -> usize {
        self.rooms.iter().filter(|r| r.coordinated_use).count()
    }
}

// ============================================================================
// AGGREGATOR
// ============================================================================

pub struct FacilityAggregator<'a> {
    config: &'a InventoryConfig,
}

impl<'a> FacilityAggregator<'a> {
    pub fn new(config: &'a InventoryConfig) -> Self {
        FacilityAggregator { config }
    }

    /// Compute room summaries from the Inventory table without writing anything
    pub fn rollup<S: RecordStore + ?Sized>(&self, store: &S) -> Result<FacilityRollup> {
        let groups = store.group_count(
            INVENTORY_TABLE,
            &[DISTRICT, FACILITY_NAME, FACILITY_TYPE, LOCATION, EQUIPMENT],
            None,
        )?;

        let mut tallies: BTreeMap<FacilityKey, EquipmentTally> = BTreeMap::new();
        let mut unrecognized: BTreeMap<String, i64> = BTreeMap::new();
        let mut missing_location: BTreeMap<(String, String), i64> = BTreeMap::new();

        for group in groups {
            let mut key = group.key.iter().map(|c| c.to_string());
            let mut next = || key.next().unwrap_or_default();
            let room = FacilityKey {
                district: next(),
                facility_name: next(),
                facility_type: next(),
                location: next(),
            };
            let equipment_name = next();

            let kind = EquipmentKind::classify(&equipment_name, &self.config.equipment);
            if kind.is_none() {
                *unrecognized.entry(equipment_name.clone()).or_insert(0) += group.count;
            }
            if room.location.trim().is_empty() {
                *missing_location
                    .entry((room.district.clone(), room.facility_name.clone()))
                    .or_insert(0) += group.count;
            }

            tallies
                .entry(room)
                .or_default()
                .add(kind, &equipment_name, group.count);
        }

        let mut anomalies = Vec::new();
        for (term, occurrences) in &unrecognized {
            let warning = UnrecognizedTermWarning {
                field: EQUIPMENT.to_string(),
                term: term.clone(),
                occurrences: *occurrences,
            };
            warn!("Equipment not added to {}: {}", FACILITY_TABLE, warning);
            anomalies.push(DataAnomaly::UnrecognizedTerm(warning));
        }
        for ((district, facility_name), items) in missing_location {
            let anomaly = DataAnomaly::MissingLocation {
                district,
                facility_name,
                items,
            };
            warn!("{}", anomaly);
            anomalies.push(anomaly);
        }

        let rooms = tallies
            .into_iter()
            .map(|(key, tally)| FacilityRoomSummary::new(key, &tally))
            .collect();

        Ok(FacilityRollup {
            rooms,
            unrecognized,
            anomalies,
        })
    }

    /// Regenerate the Facility_info table wholesale from the Inventory table
    pub fn aggregate<S: RecordStore + ?Sized>(&self, store: &mut S) -> Result<FacilityRollup> {
        let rollup = self.rollup(store)?;

        let schema = facility_schema();
        store.reset_table(&schema)?;
        let rows: Vec<Vec<Cell>> = rollup.rooms.iter().map(|r| r.to_row()).collect();
        store.insert_rows(FACILITY_TABLE, &schema.column_names(), &rows)?;

        info!(
            rooms = rollup.rooms.len(),
            coordinated = rollup.coordinated_rooms(),
            "populated table {}",
            FACILITY_TABLE
        );
        Ok(rollup)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{inventory_schema, InventoryLoader, RawRecord};
    use crate::normalizer::TermNormalizer;
    use crate::store::{Filter, MemoryStore, SqliteStore};
    use crate::testing::{items, raw};

    fn loaded_store(config: &InventoryConfig, records: Vec<RawRecord>) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.create_table(&inventory_schema(config)).unwrap();
        InventoryLoader::new(config).load(&mut store, records).unwrap();
        TermNormalizer::new(config.aliases.clone())
            .apply(&mut store, INVENTORY_TABLE)
            .unwrap();
        store
    }

    #[test]
    fn test_coordinated_use_truth_table() {
        // (oxygen source present, oximeter present) -> coordinated
        assert!(!coordinated_use(0, 0, 0));
        assert!(!coordinated_use(2, 0, 0));
        assert!(!coordinated_use(0, 0, 4));
        assert!(coordinated_use(2, 0, 1));

        // Either oxygen source is enough
        assert!(coordinated_use(0, 3, 1));
        assert!(coordinated_use(1, 1, 1));
    }

    #[test]
    fn test_classify_equipment() {
        let tracked = TrackedEquipment::default();

        assert_eq!(
            EquipmentKind::classify("oxygen concentrator", &tracked),
            Some(EquipmentKind::OxygenConcentrator)
        );
        assert_eq!(
            EquipmentKind::classify("pulse oximeter", &tracked),
            Some(EquipmentKind::PulseOximeter)
        );
        assert_eq!(EquipmentKind::classify("oxygen humidifier", &tracked), None);
        assert_eq!(EquipmentKind::classify("oxygen cyclinder", &tracked), None);
    }

    #[test]
    fn test_tally_keeps_unrecognized() {
        let mut tally = EquipmentTally::default();
        tally.add(Some(EquipmentKind::OxygenCylinder), "oxygen cylinder", 3);
        tally.add(None, "oxygen humidifier", 2);
        tally.add(None, "oxygen humidifier", 1);

        assert_eq!(tally.oxygen_cylinders, 3);
        assert_eq!(tally.other_equipment(), 3);
        assert_eq!(tally.unrecognized["oxygen humidifier"], 3);
        assert!(!tally.coordinated_use());
    }

    #[test]
    fn test_rollup_two_rooms() {
        let config = InventoryConfig::default();
        let mut records = items(2, "Kheda", "DH", "DH Nadiad", "Oxygen Concentrator", "ICU");
        records.push(raw("Kheda", "DH", "DH Nadiad", "Pulse Oximeter", "ICU"));
        records.extend(items(3, "Kheda", "DH", "DH Nadiad", "Oxygen Cylinder", "OPD"));
        let mut store = loaded_store(&config, records);

        let rollup = FacilityAggregator::new(&config).aggregate(&mut store).unwrap();

        assert_eq!(rollup.rooms.len(), 2);
        assert!(rollup.anomalies.is_empty());

        let icu = rollup.rooms.iter().find(|r| r.location == "icu").unwrap();
        assert_eq!(icu.oxygen_concentrators, 2);
        assert_eq!(icu.pulse_oximeters, 1);
        assert!(icu.coordinated_use);

        let opd = rollup.rooms.iter().find(|r| r.location == "opd").unwrap();
        assert_eq!(opd.oxygen_cylinders, 3);
        assert!(!opd.coordinated_use);

        assert_eq!(store.count_rows(FACILITY_TABLE).unwrap(), 2);
        let coordinated = store
            .group_count(FACILITY_TABLE, &[LOCATION], Some(&Filter::equals(COORDINATED_USE, true)))
            .unwrap();
        assert_eq!(coordinated.len(), 1);
        assert_eq!(coordinated[0].key[0], Cell::from("icu"));
    }

    #[test]
    fn test_alternate_spelling_lands_in_same_bucket() {
        let config = InventoryConfig::default();
        let records = vec![
            raw("Anand", "CHC", "CHC Borsad", "Oxygen Cylinder", "Emergency"),
            raw("Anand", "CHC", "CHC Borsad", "oxygen cyclinder", "Emergency Ward"),
        ];
        let store = loaded_store(&config, records);

        let rollup = FacilityAggregator::new(&config).rollup(&store).unwrap();

        assert_eq!(rollup.rooms.len(), 1);
        assert_eq!(rollup.rooms[0].location, "emergency");
        assert_eq!(rollup.rooms[0].oxygen_cylinders, 2);
        assert!(rollup.unrecognized.is_empty());
    }

    #[test]
    fn test_unrecognized_kinds_are_reported() {
        let config = InventoryConfig::default();
        let mut records = items(2, "Anand", "PHC", "PHC Sojitra", "Oxygen Humidifier", "Ward");
        records.push(raw("Anand", "PHC", "PHC Sojitra", "Oxygen Flowmeter", "Ward"));
        records.push(raw("Anand", "PHC", "PHC Sojitra", "Pulse Oximeter", "Ward"));
        let store = loaded_store(&config, records);

        let rollup = FacilityAggregator::new(&config).rollup(&store).unwrap();

        assert_eq!(rollup.unrecognized["oxygen humidifier"], 2);
        assert_eq!(rollup.unrecognized["oxygen flowmeter"], 1);
        assert_eq!(rollup.rooms[0].other_equipment, 3);
        assert_eq!(rollup.rooms[0].pulse_oximeters, 1);
        // Humidifiers do not make a room coordinated
        assert!(!rollup.rooms[0].coordinated_use);

        let terms: Vec<&str> = rollup
            .anomalies
            .iter()
            .filter_map(|a| match a {
                DataAnomaly::UnrecognizedTerm(w) => Some(w.term.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(terms, vec!["oxygen flowmeter", "oxygen humidifier"]);
    }

    #[test]
    fn test_missing_location_is_reported() {
        let config = InventoryConfig::default();
        let records = vec![
            raw("Anand", "PHC", "PHC Sojitra", "Oxygen Cylinder", ""),
            raw("Anand", "PHC", "PHC Sojitra", "Pulse Oximeter", " "),
        ];
        let store = loaded_store(&config, records);

        let rollup = FacilityAggregator::new(&config).rollup(&store).unwrap();

        let missing: i64 = rollup
            .anomalies
            .iter()
            .filter_map(|a| match a {
                DataAnomaly::MissingLocation { items, .. } => Some(*items),
                _ => None,
            })
            .sum();
        assert_eq!(missing, 2);
        // Still tallied, grouped by the exact stored value
        assert_eq!(rollup.rooms.len(), 2);
    }

    #[test]
    fn test_facility_type_is_part_of_room_key() {
        let config = InventoryConfig::default();
        let records = vec![
            raw("Anand", "PHC", "Sojitra", "Oxygen Cylinder", "Ward"),
            raw("Anand", "CHC", "Sojitra", "Oxygen Cylinder", "Ward"),
        ];
        let store = loaded_store(&config, records);

        let rollup = FacilityAggregator::new(&config).rollup(&store).unwrap();
        assert_eq!(rollup.rooms.len(), 2);
    }

    #[test]
    fn test_aggregate_twice_regenerates_table() {
        let config = InventoryConfig::default();
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.create_table(&inventory_schema(&config)).unwrap();
        InventoryLoader::new(&config)
            .load(
                &mut store,
                vec![
                    raw("Kheda", "DH", "DH Nadiad", "Oxygen Concentrator", "ICU"),
                    raw("Kheda", "DH", "DH Nadiad", "Pulse Oximeter", "ICU"),
                ],
            )
            .unwrap();

        let aggregator = FacilityAggregator::new(&config);
        aggregator.aggregate(&mut store).unwrap();
        aggregator.aggregate(&mut store).unwrap();

        assert_eq!(store.count_rows(FACILITY_TABLE).unwrap(), 1);
    }
}
