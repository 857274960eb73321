use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vflow::prelude::*;

#[derive(Parser, Debug)]
#[command(
    name = "vflowctl",
    about = "Replay OpenFlow 1.0 flow files against a virtual flow table",
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    /// Log level, used when RUST_LOG is not set
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply every flow-mod of a flow file and print the resulting table
    Table {
        file: PathBuf,
        /// Capacity of the table
        #[arg(long, default_value_t = TableConfig::default().max_entries)]
        max_entries: usize,
        /// Reject overlapping adds even without the check_overlap flag
        #[arg(long)]
        check_overlap: bool,
    },
    /// Print the relation between the matches of every ordered pair of flow-mods
    Compare {
        file: PathBuf,
        /// Compare the way strict flow-mods do
        #[arg(long)]
        strict: bool,
    },
}

fn init_logging(level: LogLevel) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

fn load(path: &Path) -> Result<(u64, Vec<FlowMod>)> {
    let content =
        fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    match DefaultFlowLoader::default().load(&content) {
        Ok(flows) => Ok(flows),
        Err(e) => {
            let offset = content.len() - e.input.len();
            let line = content[..offset].matches('\n').count() + 1;
            let near = e.input.lines().next().unwrap_or_default();
            bail!(
                "{}:{}: cannot parse flow ({:?}) near {:?}",
                path.display(),
                line,
                e.code,
                near
            )
        }
    }
}

fn replay(path: &Path, config: TableConfig) -> Result<()> {
    let (dpid, fms) = load(path)?;
    info!(dpid, flows = fms.len(), "replaying flow file");
    let mut table = FlowTable::new(dpid, config);
    for (fm, outcome) in fms.iter().zip(table.apply_all(&fms)) {
        match outcome {
            Ok(FlowModOutcome::Added(key)) => {
                println!("{} {}: added {}", fm.command, fm.rule_match, key)
            }
            Ok(FlowModOutcome::Replaced(key)) => {
                println!("{} {}: replaced {}", fm.command, fm.rule_match, key)
            }
            Ok(FlowModOutcome::Modified(n)) => {
                println!("{} {}: modified {} entries", fm.command, fm.rule_match, n)
            }
            Ok(FlowModOutcome::Deleted(removed)) => {
                println!("{} {}: deleted {} entries", fm.command, fm.rule_match, removed.len())
            }
            Err(e) => println!("{} {}: rejected, {}", fm.command, fm.rule_match, e),
        }
    }
    println!("table of datapath {:#018x}, {} entries", dpid, table.len());
    for entry in table.iter().chain(table.emergency_entries()) {
        println!("  {}", entry);
    }
    Ok(())
}

fn compare(path: &Path, strict: bool) -> Result<()> {
    let (_, fms) = load(path)?;
    for (i, a) in fms.iter().enumerate() {
        for (j, b) in fms.iter().enumerate().filter(|(j, _)| *j != i) {
            println!(
                "#{} {} #{}: {} / {}",
                i,
                classify(&a.rule_match, &b.rule_match, strict),
                j,
                a.rule_match,
                b.rule_match
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);
    match cli.command {
        Command::Table {
            file,
            max_entries,
            check_overlap,
        } => replay(
            &file,
            TableConfig::default()
                .with_max_entries(max_entries)
                .with_always_check_overlap(check_overlap),
        ),
        Command::Compare { file, strict } => compare(&file, strict),
    }
}
