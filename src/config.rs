// ⚙️ Pipeline Configuration - Rules as Data
// Field mapping, alias table and tracked categories, passed explicitly to every stage

use crate::error::{InventoryError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// TABLE & COLUMN NAMES
// ============================================================================

pub const INVENTORY_TABLE: &str = "Inventory";
pub const FACILITY_TABLE: &str = "Facility_info";
pub const STATE_TABLE: &str = "State_info";

pub const DISTRICT: &str = "district";
pub const FACILITY_TYPE: &str = "facility";
pub const FACILITY_NAME: &str = "facility_name";
pub const EQUIPMENT: &str = "equipment";
pub const LOCATION: &str = "location";

// ============================================================================
// FIELD MAPPING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Text,
    Int,
    Real,
}

impl ColumnType {
    pub fn sql(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Int => "INT",
            ColumnType::Real => "REAL",
        }
    }
}

/// Maps one column of the source extract onto a column of the Inventory table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Column name in the Inventory table
    pub field_name: String,

    /// Header in the source extract
    pub source_name: String,

    pub column_type: ColumnType,
}

impl FieldMapping {
    fn text(field_name: &str, source_name: &str) -> Self {
        FieldMapping {
            field_name: field_name.to_string(),
            source_name: source_name.to_string(),
            column_type: ColumnType::Text,
        }
    }
}

// ============================================================================
// ALIAS TABLE
// ============================================================================

/// One (field, canonical term, alternate spelling) triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermAlias {
    pub field: String,
    pub term: String,
    pub alt: String,
}

impl TermAlias {
    pub fn new(field: &str, term: &str, alt: &str) -> Self {
        TermAlias {
            field: field.to_string(),
            term: term.to_string(),
            alt: alt.to_string(),
        }
    }
}

fn default_aliases() -> Vec<TermAlias> {
    let location = [
        ("store room", "store"),
        ("surgical", "surgical (ot)"),
        ("surgical", "surgery"),
        ("surgical", "surgical ward"),
        ("emergency", "emergency ward"),
        ("other", "others"),
        ("sncu", "sncu store room"),
        ("ot", "o t"),
        ("ot", "ot-general"),
        ("ot store", "o.t.store"),
        ("opd", "opd  "),
        ("opd", "opd room"),
        ("dental", "dentel"),
        ("eye ot", "eye"),
        ("sterilization", "sterlization"),
        ("eye ot", "eye store"),
        ("maternity", "meternity"),
        ("maternity", "meternity room"),
        ("mch", "maternal & child care"),
        ("mch", "w&c helth"),
        ("mch", "maternal and child care"),
        ("mch", "m & child care"),
        ("mch", "maternal and child"),
        ("mch", "maternal and child health"),
        ("female ward", "female ward room"),
        ("icu", "icu room"),
        ("icu", "i c u"),
        ("laboratory", "lab"),
        ("labour room", "labour ward"),
        ("child health", "child ward"),
        ("vip", "vip room"),
    ];

    let mut aliases = vec![TermAlias::new(EQUIPMENT, "oxygen cylinder", "oxygen cyclinder")];
    aliases.extend(
        location
            .iter()
            .map(|(term, alt)| TermAlias::new(LOCATION, term, alt)),
    );
    aliases
}

// ============================================================================
// TRACKED CATEGORIES
// ============================================================================

/// Canonical names of the three equipment kinds that feed the room tallies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEquipment {
    pub oxygen_concentrator: String,
    pub oxygen_cylinder: String,
    pub pulse_oximeter: String,
}

impl Default for TrackedEquipment {
    fn default() -> Self {
        TrackedEquipment {
            oxygen_concentrator: "oxygen concentrator".to_string(),
            oxygen_cylinder: "oxygen cylinder".to_string(),
            pulse_oximeter: "pulse oximeter".to_string(),
        }
    }
}

/// Facility types reported individually; everything else is "Other"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFacilityTypes {
    pub district_hospital: String,
    pub community_health_centre: String,
    pub primary_health_centre: String,
}

impl Default for TrackedFacilityTypes {
    fn default() -> Self {
        TrackedFacilityTypes {
            district_hospital: "dh".to_string(),
            community_health_centre: "chc".to_string(),
            primary_health_centre: "phc".to_string(),
        }
    }
}

// ============================================================================
// INVENTORY CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    pub fields: Vec<FieldMapping>,

    /// A record is loaded only if its equipment name contains one of these
    pub equipment_keywords: Vec<String>,

    pub aliases: Vec<TermAlias>,
    pub equipment: TrackedEquipment,
    pub facility_types: TrackedFacilityTypes,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        InventoryConfig {
            fields: vec![
                FieldMapping::text(DISTRICT, "DISTRICT"),
                FieldMapping::text(FACILITY_TYPE, "Facility Type"),
                FieldMapping::text(FACILITY_NAME, "Name of Facility"),
                FieldMapping::text(EQUIPMENT, "Equipment name"),
                FieldMapping::text(LOCATION, "Equipment category"),
                FieldMapping::text("manufacturer", "Manufacturer"),
                FieldMapping::text("amc", "AMC / CMC (Y=1,N=0)"),
                FieldMapping::text(
                    "status",
                    "Working status W-WORKING/NW- NOT WORKING/NI-NOT INSTALLED/PACKED",
                ),
            ],
            equipment_keywords: vec!["oxygen".to_string(), "pulse".to_string()],
            aliases: default_aliases(),
            equipment: TrackedEquipment::default(),
            facility_types: TrackedFacilityTypes::default(),
        }
    }
}

impl InventoryConfig {
    /// Load config from a JSON file. Missing sections fall back to defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|source| {
            InventoryError::ConfigRead {
                path: path.as_ref().to_path_buf(),
                source,
            }
        })?;

        let config: InventoryConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the parts of the config the pipeline cannot run without
    pub fn validate(&self) -> Result<()> {
        for required in [DISTRICT, FACILITY_TYPE, FACILITY_NAME, EQUIPMENT, LOCATION] {
            self.mapping(required)?;
        }
        crate::normalizer::TermNormalizer::new(self.aliases.clone()).validate()
    }

    /// Look up the mapping for an Inventory column
    pub fn mapping(&self, field_name: &str) -> Result<&FieldMapping> {
        self.fields
            .iter()
            .find(|f| f.field_name == field_name)
            .ok_or_else(|| InventoryError::MissingMapping(field_name.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ============================================================================
// TESTS
// ============================================================================
