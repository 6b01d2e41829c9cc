// 📊 State Aggregator - state-wide breakdowns
// Equipment totals, facility-type totals and coordinated-use ratios
//
// Two denominators are kept apart on purpose:
//   facility level = distinct (district, facility_name, facility type)
//   room level     = rows of Facility_info

use crate::config::{
    ColumnType, InventoryConfig, TrackedFacilityTypes, DISTRICT, EQUIPMENT, FACILITY_NAME,
    FACILITY_TABLE, FACILITY_TYPE, INVENTORY_TABLE, LOCATION, STATE_TABLE,
};
use crate::error::{DataAnomaly, InventoryError, Result, UnrecognizedTermWarning};
use crate::facility::{EquipmentKind, COORDINATED_USE};
use crate::store::{Cell, Filter, GroupCount, RecordStore, TableSchema};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

const FACILITY_IDENTITY: [&str; 3] = [DISTRICT, FACILITY_NAME, FACILITY_TYPE];

fn ratio(numerator: i64, denominator: i64, metric: &str, unit: &str) -> Result<f64> {
    if denominator == 0 {
        return Err(InventoryError::empty_dataset(metric, unit));
    }
    Ok(numerator as f64 / denominator as f64)
}

// ============================================================================
// FACILITY TYPE BUCKETS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FacilityBucket {
    DistrictHospital,
    CommunityHealthCentre,
    PrimaryHealthCentre,
    Other,
}

impl FacilityBucket {
    pub fn classify(facility_type: &str, tracked: &TrackedFacilityTypes) -> Self {
        if facility_type == tracked.district_hospital {
            FacilityBucket::DistrictHospital
        } else if facility_type == tracked.community_health_centre {
            FacilityBucket::CommunityHealthCentre
        } else if facility_type == tracked.primary_health_centre {
            FacilityBucket::PrimaryHealthCentre
        } else {
            FacilityBucket::Other
        }
    }
}

/// Counts per facility type, untracked types merged into `other`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FacilityTypeCounts {
    pub dh: i64,
    pub chc: i64,
    pub phc: i64,
    pub other: i64,
}

impl FacilityTypeCounts {
    pub fn add(&mut self, bucket: FacilityBucket, count: i64) {
        match bucket {
            FacilityBucket::DistrictHospital => self.dh += count,
            FacilityBucket::CommunityHealthCentre => self.chc += count,
            FacilityBucket::PrimaryHealthCentre => self.phc += count,
            FacilityBucket::Other => self.other += count,
        }
    }

    pub fn get(&self, bucket: FacilityBucket) -> i64 {
        match bucket {
            FacilityBucket::DistrictHospital => self.dh,
            FacilityBucket::CommunityHealthCentre => self.chc,
            FacilityBucket::PrimaryHealthCentre => self.phc,
            FacilityBucket::Other => self.other,
        }
    }

    pub fn total(&self) -> i64 {
        self.dh + self.chc + self.phc + self.other
    }
}

// ============================================================================
// BREAKDOWNS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquipmentBreakdown {
    pub by_kind: BTreeMap<String, i64>,
    pub total: i64,
}

impl EquipmentBreakdown {
    pub fn count(&self, equipment_name: &str) -> i64 {
        self.by_kind.get(equipment_name).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacilityTypeBreakdown {
    pub counts: FacilityTypeCounts,
    pub total: i64,

    /// Raw spellings merged into `other`
    pub other_types: BTreeMap<String, i64>,

    /// Facilities recorded under more than one type
    pub mixed_types: Vec<MixedFacilityType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MixedFacilityType {
    pub district: String,
    pub facility_name: String,
    pub types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinatedUseBreakdown {
    /// Facilities with at least one coordinated room
    pub coordinated: FacilityTypeCounts,
    pub facilities: FacilityTypeCounts,

    /// Coordinated Facility_info rows per facility type
    pub coordinated_rooms: FacilityTypeCounts,
    pub facilities_with_coordinated_use: i64,
    pub total_facilities: i64,
    pub ratio: f64,
}

impl CoordinatedUseBreakdown {
    /// Share of one facility type with coordinated use; `None` when the type is absent
    pub fn type_ratio(&self, bucket: FacilityBucket) -> Option<f64> {
        let total = self.facilities.get(bucket);
        (total > 0).then(|| self.coordinated.get(bucket) as f64 / total as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomCoordinatedUse {
    /// Coordinated rooms per location
    pub by_location: BTreeMap<String, i64>,
    pub rooms_with_coordinated_use: i64,
    pub total_rooms: i64,
    pub ratio: f64,
}

// ============================================================================
// STATE SUMMARY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Count(i64),
    Percent(f64),
}

impl From<MetricValue> for Cell {
    fn from(value: MetricValue) -> Self {
        match value {
            MetricValue::Count(n) => Cell::Int(n),
            MetricValue::Percent(p) => Cell::Real(p),
        }
    }
}

/// State_info columns, in table order
pub const STATE_METRICS: [(&str, ColumnType); 22] = [
    ("Total_facilities", ColumnType::Int),
    ("DH", ColumnType::Int),
    ("CHC", ColumnType::Int),
    ("PHC", ColumnType::Int),
    ("Other_facility_types", ColumnType::Int),
    ("Oxygen_concentrators", ColumnType::Int),
    ("Oxygen_cylinders", ColumnType::Int),
    ("Pulse_oximeters", ColumnType::Int),
    ("Other_equipment", ColumnType::Int),
    ("Total_equipment", ColumnType::Int),
    ("Facilities_with_coordinated_use", ColumnType::Int),
    ("Percent_facilities_with_coordinated_use", ColumnType::Real),
    ("DH_with_coordinated_use", ColumnType::Int),
    ("CHC_with_coordinated_use", ColumnType::Int),
    ("PHC_with_coordinated_use", ColumnType::Int),
    ("Other_facilities_with_coordinated_use", ColumnType::Int),
    ("Percent_DH_with_coordinated_use", ColumnType::Real),
    ("Percent_CHC_with_coordinated_use", ColumnType::Real),
    ("Percent_PHC_with_coordinated_use", ColumnType::Real),
    ("Percent_other_facilities_with_coordinated_use", ColumnType::Real),
    ("Rooms_with_coordinated_use", ColumnType::Int),
    ("Percent_rooms_with_coordinated_use", ColumnType::Real),
];

pub fn state_schema() -> TableSchema {
    TableSchema::new(STATE_TABLE, &STATE_METRICS)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSummary {
    pub total_facilities: i64,
    pub facility_types: FacilityTypeBreakdown,
    pub equipment: EquipmentBreakdown,
    pub oxygen_concentrators: i64,
    pub oxygen_cylinders: i64,
    pub pulse_oximeters: i64,
    pub coordinated_use: CoordinatedUseBreakdown,
    pub rooms: RoomCoordinatedUse,
}

impl StateSummary {
    /// Flat metric map; per-type percentages are omitted for absent types
    pub fn metrics(&self) -> BTreeMap<&'static str, MetricValue> {
        use MetricValue::{Count, Percent};

        let types = &self.facility_types.counts;
        let coordinated = &self.coordinated_use;
        let tracked = self.oxygen_concentrators + self.oxygen_cylinders + self.pulse_oximeters;

        let mut metrics = BTreeMap::from([
            ("Total_facilities", Count(self.total_facilities)),
            ("DH", Count(types.dh)),
            ("CHC", Count(types.chc)),
            ("PHC", Count(types.phc)),
            ("Other_facility_types", Count(types.other)),
            ("Oxygen_concentrators", Count(self.oxygen_concentrators)),
            ("Oxygen_cylinders", Count(self.oxygen_cylinders)),
            ("Pulse_oximeters", Count(self.pulse_oximeters)),
            ("Other_equipment", Count(self.equipment.total - tracked)),
            ("Total_equipment", Count(self.equipment.total)),
            (
                "Facilities_with_coordinated_use",
                Count(coordinated.facilities_with_coordinated_use),
            ),
            (
                "Percent_facilities_with_coordinated_use",
                Percent(coordinated.ratio * 100.0),
            ),
            ("DH_with_coordinated_use", Count(coordinated.coordinated.dh)),
            ("CHC_with_coordinated_use", Count(coordinated.coordinated.chc)),
            ("PHC_with_coordinated_use", Count(coordinated.coordinated.phc)),
            (
                "Other_facilities_with_coordinated_use",
                Count(coordinated.coordinated.other),
            ),
            (
                "Rooms_with_coordinated_use",
                Count(self.rooms.rooms_with_coordinated_use),
            ),
            (
                "Percent_rooms_with_coordinated_use",
                Percent(self.rooms.ratio * 100.0),
            ),
        ]);

        let per_type = [
            ("Percent_DH_with_coordinated_use", FacilityBucket::DistrictHospital),
            ("Percent_CHC_with_coordinated_use", FacilityBucket::CommunityHealthCentre),
            ("Percent_PHC_with_coordinated_use", FacilityBucket::PrimaryHealthCentre),
            ("Percent_other_facilities_with_coordinated_use", FacilityBucket::Other),
        ];
        for (name, bucket) in per_type {
            if let Some(r) = coordinated.type_ratio(bucket) {
                metrics.insert(name, Percent(r * 100.0));
            }
        }

        metrics
    }

    /// Facility types merged into "Other", and facilities filed under several types
    pub fn anomalies(&self) -> Vec<DataAnomaly> {
        let other = self.facility_types.other_types.iter().map(|(term, occurrences)| {
            DataAnomaly::UnrecognizedTerm(UnrecognizedTermWarning {
                field: FACILITY_TYPE.to_string(),
                term: term.clone(),
                occurrences: *occurrences,
            })
        });
        let mixed = self
            .facility_types
            .mixed_types
            .iter()
            .map(|m| DataAnomaly::MixedFacilityType {
                district: m.district.clone(),
                facility_name: m.facility_name.clone(),
                types: m.types.clone(),
            });
        other.chain(mixed).collect()
    }
}

// ============================================================================
// AGGREGATOR
// ============================================================================

pub struct StateAggregator<'a> {
    config: &'a InventoryConfig,
}

impl<'a> StateAggregator<'a> {
    pub fn new(config: &'a InventoryConfig) -> Self {
        StateAggregator { config }
    }

    fn bucket_facilities(&self, groups: &[GroupCount]) -> FacilityTypeCounts {
        let mut counts = FacilityTypeCounts::default();
        for group in groups {
            let facility_type = group.key.get(2).map(|c| c.to_string()).unwrap_or_default();
            counts.add(
                FacilityBucket::classify(&facility_type, &self.config.facility_types),
                1,
            );
        }
        counts
    }

    /// Inventory rows per equipment name
    pub fn equipment_breakdown<S: RecordStore + ?Sized>(&self, store: &S) -> Result<EquipmentBreakdown> {
        let groups = store.group_count(INVENTORY_TABLE, &[EQUIPMENT], None)?;

        let by_kind: BTreeMap<String, i64> = groups
            .into_iter()
            .map(|g| (g.key[0].to_string(), g.count))
            .collect();
        let total = by_kind.values().sum();

        Ok(EquipmentBreakdown { by_kind, total })
    }

    /// Distinct facilities in Inventory per facility type
    pub fn facility_type_breakdown<S: RecordStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<FacilityTypeBreakdown> {
        let facilities = store.group_count(INVENTORY_TABLE, &FACILITY_IDENTITY, None)?;
        let counts = self.bucket_facilities(&facilities);

        let mut other_types = BTreeMap::new();
        for group in &facilities {
            let facility_type = group.key[2].to_string();
            if FacilityBucket::classify(&facility_type, &self.config.facility_types)
                == FacilityBucket::Other
            {
                *other_types.entry(facility_type).or_insert(0) += 1;
            }
        }
        for (term, n) in &other_types {
            warn!("facility type '{}' ({} facilities) counted as Other", term, n);
        }

        let mut types_by_facility: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
        for group in &facilities {
            types_by_facility
                .entry((group.key[0].to_string(), group.key[1].to_string()))
                .or_default()
                .push(group.key[2].to_string());
        }
        let mixed_types: Vec<MixedFacilityType> = types_by_facility
            .into_iter()
            .filter(|(_, types)| types.len() > 1)
            .map(|((district, facility_name), types)| MixedFacilityType {
                district,
                facility_name,
                types,
            })
            .collect();
        for m in &mixed_types {
            warn!(
                "'{}' ({}) recorded under types {}; each counted as a facility",
                m.facility_name,
                m.district,
                m.types.join(", ")
            );
        }

        Ok(FacilityTypeBreakdown {
            counts,
            total: facilities.len() as i64,
            other_types,
            mixed_types,
        })
    }

    /// Facilities with at least one coordinated room, overall and per type
    pub fn coordinated_use_breakdown<S: RecordStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<CoordinatedUseBreakdown> {
        let all = store.group_count(FACILITY_TABLE, &FACILITY_IDENTITY, None)?;
        let with_use = store.group_count(
            FACILITY_TABLE,
            &FACILITY_IDENTITY,
            Some(&Filter::equals(COORDINATED_USE, true)),
        )?;

        let total_facilities = all.len() as i64;
        let facilities_with_coordinated_use = with_use.len() as i64;
        let ratio = ratio(
            facilities_with_coordinated_use,
            total_facilities,
            "facility coordinated-use ratio",
            "facilities",
        )?;

        let mut coordinated_rooms = FacilityTypeCounts::default();
        for group in store.group_count(
            FACILITY_TABLE,
            &[FACILITY_TYPE],
            Some(&Filter::equals(COORDINATED_USE, true)),
        )? {
            let facility_type = group.key[0].to_string();
            coordinated_rooms.add(
                FacilityBucket::classify(&facility_type, &self.config.facility_types),
                group.count,
            );
        }

        Ok(CoordinatedUseBreakdown {
            coordinated: self.bucket_facilities(&with_use),
            facilities: self.bucket_facilities(&all),
            coordinated_rooms,
            facilities_with_coordinated_use,
            total_facilities,
            ratio,
        })
    }

    /// Rooms with coordinated use over all rooms
    pub fn room_coordinated_use<S: RecordStore + ?Sized>(&self, store: &S) -> Result<RoomCoordinatedUse> {
        let by_location: BTreeMap<String, i64> = store
            .group_count(
                FACILITY_TABLE,
                &[LOCATION],
                Some(&Filter::equals(COORDINATED_USE, true)),
            )?
            .into_iter()
            .map(|g| (g.key[0].to_string(), g.count))
            .collect();

        let rooms_with_coordinated_use = by_location.values().sum();
        let total_rooms = store.count_rows(FACILITY_TABLE)?;
        let ratio = ratio(
            rooms_with_coordinated_use,
            total_rooms,
            "room coordinated-use ratio",
            "rooms",
        )?;

        Ok(RoomCoordinatedUse {
            by_location,
            rooms_with_coordinated_use,
            total_rooms,
            ratio,
        })
    }

    pub fn summarize<S: RecordStore + ?Sized>(&self, store: &S) -> Result<StateSummary> {
        let equipment = self.equipment_breakdown(store)?;
        let facility_types = self.facility_type_breakdown(store)?;
        let coordinated_use = self.coordinated_use_breakdown(store)?;
        let rooms = self.room_coordinated_use(store)?;

        let tracked = &self.config.equipment;
        let count = |kind: EquipmentKind| equipment.count(kind.canonical_name(tracked));

        Ok(StateSummary {
            total_facilities: facility_types.total,
            oxygen_concentrators: count(EquipmentKind::OxygenConcentrator),
            oxygen_cylinders: count(EquipmentKind::OxygenCylinder),
            pulse_oximeters: count(EquipmentKind::PulseOximeter),
            facility_types,
            equipment,
            coordinated_use,
            rooms,
        })
    }

    /// Replace State_info with a single row holding the summary's metrics
    pub fn persist<S: RecordStore + ?Sized>(&self, store: &mut S, summary: &StateSummary) -> Result<()> {
        store.reset_table(&state_schema())?;

        let metrics = summary.metrics();
        let columns: Vec<&str> = STATE_METRICS
            .iter()
            .map(|(name, _)| *name)
            .filter(|name| metrics.contains_key(name))
            .collect();
        let row: Vec<Cell> = columns.iter().map(|name| Cell::from(metrics[name])).collect();

        store.insert_rows(STATE_TABLE, &columns, &[row])?;
        info!(
            facilities = summary.total_facilities,
            rooms = summary.rooms.total_rooms,
            "populated table {}",
            STATE_TABLE
        );
        Ok(())
    }

    pub fn aggregate<S: RecordStore + ?Sized>(&self, store: &mut S) -> Result<StateSummary> {
        let summary = self.summarize(store)?;
        self.persist(store, &summary)?;
        Ok(summary)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facility::{facility_schema, FacilityAggregator};
    use crate::loader::{inventory_schema, InventoryLoader, RawRecord};
    use crate::normalizer::TermNormalizer;
    use crate::store::{MemoryStore, SqliteStore};
    use crate::testing::{items, raw};

    fn rolled_up<S: RecordStore>(mut store: S, config: &InventoryConfig, records: Vec<RawRecord>) -> S {
        store.create_table(&inventory_schema(config)).unwrap();
        InventoryLoader::new(config).load(&mut store, records).unwrap();
        TermNormalizer::new(config.aliases.clone())
            .apply(&mut store, INVENTORY_TABLE)
            .unwrap();
        FacilityAggregator::new(config).aggregate(&mut store).unwrap();
        store
    }

    fn two_rooms() -> Vec<RawRecord> {
        let mut records = items(2, "Kheda", "DH", "DH Nadiad", "Oxygen Concentrator", "ICU");
        records.push(raw("Kheda", "DH", "DH Nadiad", "Pulse Oximeter", "ICU"));
        records.extend(items(3, "Kheda", "DH", "DH Nadiad", "Oxygen Cylinder", "OPD"));
        records
    }

    #[test]
    fn test_equipment_breakdown_sums_to_rows() {
        let config = InventoryConfig::default();
        let mut records = two_rooms();
        records.push(raw("Anand", "PHC", "PHC Sojitra", "Oxygen Humidifier", "Ward"));
        records.push(raw("Anand", "PHC", "PHC Sojitra", "oxygen cyclinder", "Ward"));
        let store = rolled_up(MemoryStore::new(), &config, records);

        let breakdown = StateAggregator::new(&config).equipment_breakdown(&store).unwrap();

        assert_eq!(breakdown.total, store.count_rows(INVENTORY_TABLE).unwrap());
        assert_eq!(breakdown.by_kind.values().sum::<i64>(), breakdown.total);
        assert_eq!(breakdown.count("oxygen cylinder"), 4);
        assert_eq!(breakdown.count("oxygen humidifier"), 1);
        assert_eq!(breakdown.count("oxygen cyclinder"), 0);
    }

    #[test]
    fn test_facility_type_breakdown_merges_other() {
        let config = InventoryConfig::default();
        let records = vec![
            raw("Kheda", "DH", "DH Nadiad", "Oxygen Cylinder", "ICU"),
            raw("Anand", "DH", "DH Anand", "Oxygen Cylinder", "ICU"),
            raw("Anand", "CHC", "CHC Borsad", "Oxygen Cylinder", "ICU"),
            raw("Anand", "Sub-Center", "SC Vasad", "Oxygen Cylinder", "ICU"),
        ];
        let store = rolled_up(MemoryStore::new(), &config, records);

        let breakdown = StateAggregator::new(&config)
            .facility_type_breakdown(&store)
            .unwrap();

        assert_eq!(
            breakdown.counts,
            FacilityTypeCounts { dh: 2, chc: 1, phc: 0, other: 1 }
        );
        assert_eq!(breakdown.total, 4);
        assert_eq!(breakdown.counts.total(), breakdown.total);
        assert_eq!(breakdown.other_types["sub-center"], 1);
    }

    #[test]
    fn test_facility_counted_once_across_rooms() {
        let config = InventoryConfig::default();
        let store = rolled_up(MemoryStore::new(), &config, two_rooms());

        let breakdown = StateAggregator::new(&config)
            .facility_type_breakdown(&store)
            .unwrap();
        assert_eq!(breakdown.total, 1);
        assert_eq!(breakdown.counts.dh, 1);
    }

    #[test]
    fn test_room_ratio_is_half() {
        let config = InventoryConfig::default();
        let store = rolled_up(MemoryStore::new(), &config, two_rooms());

        let rooms = StateAggregator::new(&config).room_coordinated_use(&store).unwrap();

        assert_eq!(rooms.total_rooms, 2);
        assert_eq!(rooms.rooms_with_coordinated_use, 1);
        assert_eq!(rooms.ratio, 0.5);
        assert_eq!(rooms.by_location["icu"], 1);
    }

    #[test]
    fn test_facility_ratio_uses_facility_denominator() {
        let config = InventoryConfig::default();
        let mut records = two_rooms();
        // Second facility without an oximeter
        records.extend(items(2, "Anand", "PHC", "PHC Sojitra", "Oxygen Cylinder", "Ward"));
        let store = rolled_up(MemoryStore::new(), &config, records);

        let aggregator = StateAggregator::new(&config);
        let facilities = aggregator.coordinated_use_breakdown(&store).unwrap();
        let rooms = aggregator.room_coordinated_use(&store).unwrap();

        assert_eq!(facilities.total_facilities, 2);
        assert_eq!(facilities.facilities_with_coordinated_use, 1);
        assert_eq!(facilities.ratio, 0.5);
        assert_eq!(facilities.coordinated.dh, 1);
        assert_eq!(facilities.type_ratio(FacilityBucket::DistrictHospital), Some(1.0));
        assert_eq!(facilities.type_ratio(FacilityBucket::PrimaryHealthCentre), Some(0.0));
        assert_eq!(facilities.type_ratio(FacilityBucket::CommunityHealthCentre), None);

        assert_eq!(rooms.total_rooms, 3);
        assert!((rooms.ratio - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_coordinated_rooms_per_type() {
        let config = InventoryConfig::default();
        let mut records = two_rooms();
        // A second coordinated room in the same hospital
        records.push(raw("Kheda", "DH", "DH Nadiad", "Oxygen Cylinder", "Emergency"));
        records.push(raw("Kheda", "DH", "DH Nadiad", "Pulse Oximeter", "Emergency"));
        let store = rolled_up(MemoryStore::new(), &config, records);

        let facilities = StateAggregator::new(&config)
            .coordinated_use_breakdown(&store)
            .unwrap();

        assert_eq!(facilities.coordinated.dh, 1);
        assert_eq!(facilities.coordinated_rooms.dh, 2);
        assert_eq!(facilities.coordinated_rooms.total(), 2);
    }

    #[test]
    fn test_facility_under_two_types_is_reported() {
        let config = InventoryConfig::default();
        let records = vec![
            raw("Anand", "PHC", "Sojitra", "Oxygen Cylinder", "Ward"),
            raw("Anand", "CHC", "Sojitra", "Pulse Oximeter", "Ward"),
            raw("Anand", "PHC", "Borsad", "Pulse Oximeter", "Ward"),
        ];
        let store = rolled_up(MemoryStore::new(), &config, records);

        let breakdown = StateAggregator::new(&config)
            .facility_type_breakdown(&store)
            .unwrap();

        // Still counted once per type
        assert_eq!(breakdown.total, 3);
        assert_eq!(
            breakdown.mixed_types,
            vec![MixedFacilityType {
                district: "anand".to_string(),
                facility_name: "sojitra".to_string(),
                types: vec!["chc".to_string(), "phc".to_string()],
            }]
        );
    }

    #[test]
    fn test_empty_facility_table_is_an_error() {
        let config = InventoryConfig::default();
        let mut store = MemoryStore::new();
        store.create_table(&inventory_schema(&config)).unwrap();
        store.create_table(&facility_schema()).unwrap();

        let aggregator = StateAggregator::new(&config);

        let err = aggregator.coordinated_use_breakdown(&store).unwrap_err();
        assert!(matches!(err, InventoryError::EmptyDataset { ref denominator, .. } if denominator == "facilities"));

        let err = aggregator.room_coordinated_use(&store).unwrap_err();
        assert!(matches!(err, InventoryError::EmptyDataset { ref denominator, .. } if denominator == "rooms"));

        // Unrelated computations still succeed on the same store
        let equipment = aggregator.equipment_breakdown(&store).unwrap();
        assert_eq!(equipment.total, 0);
    }

    #[test]
    fn test_summary_and_persist_on_sqlite() {
        let config = InventoryConfig::default();
        let mut records = two_rooms();
        records.push(raw("Anand", "Sub-Center", "SC Vasad", "Pulse Oximeter", "OPD"));
        let mut store = rolled_up(SqliteStore::open_in_memory().unwrap(), &config, records);

        let summary = StateAggregator::new(&config).aggregate(&mut store).unwrap();

        assert_eq!(summary.total_facilities, 2);
        assert_eq!(summary.oxygen_concentrators, 2);
        assert_eq!(summary.oxygen_cylinders, 3);
        assert_eq!(summary.pulse_oximeters, 2);
        assert_eq!(summary.coordinated_use.ratio, 0.5);

        let metrics = summary.metrics();
        assert_eq!(metrics["Total_facilities"], MetricValue::Count(2));
        assert_eq!(metrics["Other_facility_types"], MetricValue::Count(1));
        assert_eq!(metrics["Percent_facilities_with_coordinated_use"], MetricValue::Percent(50.0));
        assert!(!metrics.contains_key("Percent_CHC_with_coordinated_use"));

        let anomalies = summary.anomalies();
        assert_eq!(anomalies.len(), 1);

        assert_eq!(store.count_rows(STATE_TABLE).unwrap(), 1);
        let (facilities, percent): (i64, f64) = store
            .connection()
            .query_row(
                "SELECT Total_facilities, Percent_rooms_with_coordinated_use FROM State_info",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(facilities, 2);
        assert!((percent - 100.0 / 3.0).abs() < 1e-9);
    }
}
