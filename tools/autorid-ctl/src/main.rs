//! autorid-ctl: inspect and manage an autorid range database.
//!
//! Log output goes to stderr (`RUST_LOG`, default `info`); results go to
//! stdout, as JSON with `--json`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use autorid_ctl::settings::{effective_txn, Settings};
use autorid_ctl::stress::{self, StressConfig};
use idmap_autorid::{
    Counter, CounterApi, FileStore, GlobalConfig, GlobalConfigApi, Pool, RangeAllocatorApi,
    RangeAllocatorService, RangeLookupApi, RangeRecord,
};

/// autorid-ctl: autorid range database tool
#[derive(Parser, Debug)]
#[command(name = "autorid-ctl")]
#[command(about = "Manage the domain-to-range mappings of an autorid database")]
struct Args {
    /// Database file (overrides AUTORID_DB)
    #[arg(short, long)]
    db: Option<PathBuf>,

    /// Transaction retry budget (overrides AUTORID_MAX_ATTEMPTS)
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Skip fsync on commit
    #[arg(long)]
    no_sync: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Admin(AdminCommand),
    /// Run the transaction isolation test against the database
    TxnStress(StressArgs),
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
    /// Create the counters and optionally store the range geometry
    Init {
        /// Geometry as "minvalue:<n> rangesize:<n> maxranges:<n>"
        #[arg(long)]
        config: Option<String>,
    },
    /// Show the stored range geometry
    GetConfig,
    /// Store the range geometry
    SetConfig {
        #[arg(long)]
        minvalue: u32,
        #[arg(long)]
        rangesize: u32,
        #[arg(long)]
        maxranges: u32,
    },
    /// Return the range of a domain, allocating one if needed
    Acquire {
        domain: String,
        #[arg(long, default_value_t = 0)]
        index: u32,
    },
    /// Map a domain to an explicit range number
    SetRange {
        domain: String,
        range: u32,
        #[arg(long, default_value_t = 0)]
        index: u32,
    },
    /// Look up the range of a domain
    GetRange {
        domain: String,
        #[arg(long, default_value_t = 0)]
        index: u32,
        /// Allocate a range if the domain has none
        #[arg(long)]
        allocate: bool,
    },
    /// Allocate one id from the allocation pool
    AllocId {
        #[arg(value_enum)]
        pool: PoolArg,
    },
    /// Show the high-water marks
    Hwm,
}

#[derive(clap::Args, Debug)]
struct StressArgs {
    /// Counter slot owned by this participant
    #[arg(long, default_value_t = 0)]
    slot: usize,
    /// Seconds to run, 0 for no limit
    #[arg(short, long, default_value_t = 10)]
    timelimit: u64,
    /// Stop after this many rounds
    #[arg(long)]
    rounds: Option<u64>,
    /// Seconds to pause between operations
    #[arg(short = 'D', long, default_value_t = 0)]
    delay: u64,
    /// Log the counters after every round
    #[arg(short, long)]
    verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PoolArg {
    Uid,
    Gid,
}

impl From<PoolArg> for Pool {
    fn from(arg: PoolArg) -> Self {
        match arg {
            PoolArg::Uid => Pool::Uid,
            PoolArg::Gid => Pool::Gid,
        }
    }
}

#[derive(Serialize)]
struct HwmReport {
    range: u32,
    alloc_uid: u32,
    alloc_gid: u32,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let settings = Settings::from_env(args.db.clone(), args.max_attempts, args.no_sync)?;
    debug!(
        "[autorid] Using {} (retry budget {})",
        settings.db_path.display(),
        effective_txn(&settings).max_attempts
    );

    let store = FileStore::open(settings.store_config())
        .with_context(|| format!("Failed to open {}", settings.db_path.display()))?;

    match args.command {
        Command::TxnStress(stress_args) => run_stress(&store, stress_args, args.json),
        Command::Admin(command) => {
            let service =
                RangeAllocatorService::open(store).context("Failed to initialize counters")?;
            run_command(&service, command, args.json)
        }
    }
}

fn run_stress(store: &FileStore, args: StressArgs, json: bool) -> Result<()> {
    let config = StressConfig::new(args.slot)
        .with_time_limit((args.timelimit > 0).then(|| Duration::from_secs(args.timelimit)))
        .with_max_rounds(args.rounds)
        .with_delay(Duration::from_secs(args.delay))
        .with_verbose(args.verbose);

    let report = stress::run(store, &config).context("Transaction test failed")?;
    emit(json, &report, || {
        format!(
            "slot {}: {} rounds, counters {}",
            report.slot, report.rounds, report.last
        )
    })
}

fn run_command<S>(
    service: &RangeAllocatorService<S>,
    command: AdminCommand,
    json: bool,
) -> Result<()>
where
    S: idmap_autorid::TransactionalStore,
{
    match command {
        AdminCommand::Init { config } => {
            if let Some(text) = config {
                service
                    .save_config_str(&text)
                    .context("Failed to store configuration")?;
            }
            emit(json, &"initialized", || "initialized".to_string())
        }
        AdminCommand::GetConfig => {
            let config = service.load_config().context("Failed to load configuration")?;
            emit(json, &config, || config.to_string())
        }
        AdminCommand::SetConfig {
            minvalue,
            rangesize,
            maxranges,
        } => {
            let config = GlobalConfig::new(minvalue, rangesize, maxranges);
            service
                .save_config(&config)
                .context("Failed to store configuration")?;
            emit(json, &config, || config.to_string())
        }
        AdminCommand::Acquire { domain, index } => {
            let record = service
                .acquire_range(&domain, index)
                .with_context(|| format!("Failed to acquire a range for {}", domain))?;
            let config = service.load_config()?;
            emit(json, &record, || describe(&record, &config))
        }
        AdminCommand::SetRange {
            domain,
            range,
            index,
        } => {
            let record = service
                .set_range(&domain, index, range)
                .with_context(|| format!("Failed to map {} to range {}", domain, range))?;
            let config = service.load_config()?;
            emit(json, &record, || describe(&record, &config))
        }
        AdminCommand::GetRange {
            domain,
            index,
            allocate,
        } => {
            let record = service
                .get_domain_range(&domain, index, !allocate)
                .with_context(|| format!("No range for {}", domain))?;
            let config = service.load_config()?;
            emit(json, &record, || describe(&record, &config))
        }
        AdminCommand::AllocId { pool } => {
            let id = service
                .allocate_pool_id(pool.into())
                .context("Failed to allocate from the pool")?;
            emit(json, &id, || id.to_string())
        }
        AdminCommand::Hwm => {
            let report = HwmReport {
                range: service.current_hwm(Counter::Range)?,
                alloc_uid: service.current_hwm(Counter::AllocUid)?,
                alloc_gid: service.current_hwm(Counter::AllocGid)?,
            };
            emit(json, &report, || {
                format!(
                    "{}: {}\n{}: {}\n{}: {}",
                    Counter::Range,
                    report.range,
                    Counter::AllocUid,
                    report.alloc_uid,
                    Counter::AllocGid,
                    report.alloc_gid
                )
            })
        }
    }
}

fn describe(record: &RangeRecord, config: &GlobalConfig) -> String {
    format!(
        "{} -> range {} (ids {}-{})",
        record.domain_key,
        record.range_number,
        record.low_id,
        record.high_id(config)
    )
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}
