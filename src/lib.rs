// Oxygen Inventory - Core Library
// Equipment extract → Inventory → Facility_info → State_info, usable from the CLI and tests

pub mod config;
pub mod error;
pub mod facility;
pub mod loader;
pub mod normalizer;
pub mod overview;
pub mod pipeline;
pub mod state;
pub mod store;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::{
    ColumnType, FieldMapping, InventoryConfig, TermAlias, TrackedEquipment, TrackedFacilityTypes,
    FACILITY_TABLE, INVENTORY_TABLE, STATE_TABLE,
};
pub use error::{DataAnomaly, InventoryError, Result, UnrecognizedTermWarning};
pub use facility::{
    coordinated_use, facility_schema, EquipmentKind, EquipmentTally, FacilityAggregator,
    FacilityKey, FacilityRollup, FacilityRoomSummary,
};
pub use loader::{inventory_schema, read_csv_records, InventoryLoader, LoadReport, RawRecord};
pub use normalizer::TermNormalizer;
pub use overview::{equipment_by_location, overview, InventoryOverview};
pub use pipeline::{Pipeline, PipelineReport};
pub use state::{
    state_schema, CoordinatedUseBreakdown, EquipmentBreakdown, FacilityBucket,
    FacilityTypeBreakdown, FacilityTypeCounts, MetricValue, MixedFacilityType, RoomCoordinatedUse,
    StateAggregator, StateSummary, STATE_METRICS,
};
pub use store::{
    Cell, ColumnDef, Filter, GroupCount, MemoryStore, RecordStore, Replacement, SqliteStore,
    TableSchema,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
