// 🔄 Pipeline Driver
// reset → load → clean → facility rollup → state summary, fail-fast

use crate::config::{InventoryConfig, INVENTORY_TABLE};
use crate::error::{DataAnomaly, Result};
use crate::facility::{facility_schema, FacilityAggregator, FacilityRoomSummary};
use crate::loader::{inventory_schema, InventoryLoader, LoadReport, RawRecord};
use crate::normalizer::TermNormalizer;
use crate::state::{state_schema, StateAggregator, StateSummary};
use crate::store::RecordStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub load: LoadReport,
    pub normalized_rows: usize,
    pub rooms: Vec<FacilityRoomSummary>,
    pub summary: StateSummary,
    pub anomalies: Vec<DataAnomaly>,
    pub completed_at: DateTime<Utc>,
}

pub struct Pipeline<'a> {
    config: &'a InventoryConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a InventoryConfig) -> Self {
        Pipeline { config }
    }

    /// Drop and recreate all three tables. Destructive.
    pub fn reset_tables<S: RecordStore + ?Sized>(&self, store: &mut S) -> Result<()> {
        for schema in [inventory_schema(self.config), facility_schema(), state_schema()] {
            store.reset_table(&schema)?;
            info!("Created table: {}", schema.name);
        }
        Ok(())
    }

    pub fn run<S, I>(&self, store: &mut S, records: I) -> Result<PipelineReport>
    where
        S: RecordStore + ?Sized,
        I: IntoIterator<Item = RawRecord>,
    {
        let normalizer = TermNormalizer::new(self.config.aliases.clone());
        normalizer.validate()?;

        self.reset_tables(store)?;

        let load = InventoryLoader::new(self.config).load(store, records)?;
        let normalized_rows = normalizer.apply(store, INVENTORY_TABLE)?;

        let rollup = FacilityAggregator::new(self.config).aggregate(store)?;
        let summary = StateAggregator::new(self.config).aggregate(store)?;

        let mut anomalies = rollup.anomalies;
        anomalies.extend(summary.anomalies());

        info!(
            loaded = load.records_loaded,
            rooms = rollup.rooms.len(),
            anomalies = anomalies.len(),
            "pipeline complete"
        );

        Ok(PipelineReport {
            load,
            normalized_rows,
            rooms: rollup.rooms,
            summary,
            anomalies,
            completed_at: Utc::now(),
        })
    }
}
