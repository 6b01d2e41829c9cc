use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use oxygen_inventory::{
    equipment_by_location, overview, read_csv_records, EquipmentKind, InventoryConfig, Pipeline,
    PipelineReport, SqliteStore,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "oxygen-inventory", version, about = "Oxygen equipment inventory pipeline")]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "OXYGEN_INVENTORY_LOG", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild Inventory, Facility_info and State_info from a CSV extract
    Run {
        /// Source extract (CSV with a header row)
        #[arg(long)]
        input: PathBuf,

        /// SQLite database file
        #[arg(long, env = "OXYGEN_INVENTORY_DB")]
        db: PathBuf,

        /// JSON config; defaults are used when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the full report as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Summarize an already-loaded Inventory table
    Overview {
        #[arg(long, env = "OXYGEN_INVENTORY_DB")]
        db: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,

        /// Restrict the per-location breakdown to one kind
        #[arg(long, value_enum)]
        equipment: Option<KindArg>,
    },

    /// Print the effective config as JSON
    Config {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    Concentrator,
    Cylinder,
    Oximeter,
}

impl From<KindArg> for EquipmentKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Concentrator => EquipmentKind::OxygenConcentrator,
            KindArg::Cylinder => EquipmentKind::OxygenCylinder,
            KindArg::Oximeter => EquipmentKind::PulseOximeter,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    match cli.command {
        Command::Run {
            input,
            db,
            config,
            json,
        } => run_pipeline(&input, &db, config.as_deref(), json),
        Command::Overview {
            db,
            config,
            equipment,
        } => run_overview(&db, config.as_deref(), equipment),
        Command::Config { config } => {
            let config = load_config(config.as_deref())?;
            println!("{}", config.to_json()?);
            Ok(())
        }
    }
}

fn setup_logging(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<InventoryConfig> {
    match path {
        Some(path) => InventoryConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(InventoryConfig::default()),
    }
}

fn run_pipeline(input: &Path, db: &Path, config: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(config)?;

    let records = read_csv_records(input)
        .with_context(|| format!("Failed to read extract {}", input.display()))?;
    let mut store = SqliteStore::open(db)
        .with_context(|| format!("Failed to open database {}", db.display()))?;

    let report = Pipeline::new(&config)
        .run(&mut store, records)
        .context("Pipeline run failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &PipelineReport) {
    let summary = &report.summary;
    let types = &summary.facility_types.counts;

    println!("🫁 Oxygen Inventory - Pipeline Report");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("\n📂 Load");
    println!("✓ Records read:     {}", report.load.records_seen);
    println!("✓ Records loaded:   {}", report.load.records_loaded);
    println!("✓ Records filtered: {}", report.load.records_skipped);
    println!("✓ Terms normalized: {}", report.normalized_rows);

    println!("\n🏥 Facilities");
    println!("✓ Total:  {}", summary.total_facilities);
    println!("  DH: {}  CHC: {}  PHC: {}  Other: {}", types.dh, types.chc, types.phc, types.other);
    println!("✓ Rooms:  {}", summary.rooms.total_rooms);

    println!("\n🧰 Equipment");
    println!("  Oxygen concentrators: {}", summary.oxygen_concentrators);
    println!("  Oxygen cylinders:     {}", summary.oxygen_cylinders);
    println!("  Pulse oximeters:      {}", summary.pulse_oximeters);
    println!("  Total:                {}", summary.equipment.total);

    println!("\n🔗 Coordinated use");
    println!(
        "✓ Facilities: {}/{} ({:.1}%)",
        summary.coordinated_use.facilities_with_coordinated_use,
        summary.coordinated_use.total_facilities,
        summary.coordinated_use.ratio * 100.0
    );
    println!(
        "✓ Rooms:      {}/{} ({:.1}%)",
        summary.rooms.rooms_with_coordinated_use,
        summary.rooms.total_rooms,
        summary.rooms.ratio * 100.0
    );

    if !report.anomalies.is_empty() {
        println!("\n⚠️  Data anomalies ({})", report.anomalies.len());
        for anomaly in &report.anomalies {
            println!("  - {}", anomaly);
        }
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Completed at {}", report.completed_at.format("%Y-%m-%d %H:%M:%S UTC"));
}

fn run_overview(db: &Path, config: Option<&Path>, equipment: Option<KindArg>) -> Result<()> {
    let config = load_config(config)?;

    if !db.exists() {
        anyhow::bail!("Database not found: {} (run `oxygen-inventory run` first)", db.display());
    }
    let store = SqliteStore::open(db)
        .with_context(|| format!("Failed to open database {}", db.display()))?;

    let counts = overview(&store)?;
    println!("🔎 Inventory Overview");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ Entries:    {}", counts.entries);
    println!("✓ Districts:  {}", counts.districts);
    println!("✓ Facilities: {}", counts.facilities);
    println!("✓ Rooms:      {}", counts.rooms);

    let kind = equipment.map(EquipmentKind::from);
    let label = match kind {
        Some(k) => k.canonical_name(&config.equipment).to_string(),
        None => "all equipment".to_string(),
    };

    println!("\n📍 By location ({})", label);
    for (location, count) in equipment_by_location(&store, &config, kind)? {
        println!("  {:<24} {}", location, count);
    }
    Ok(())
}
