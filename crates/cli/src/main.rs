// ClkTree - SoC Clock Tree Manager
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

mod table_check;
mod units;

use clap::{Parser, Subcommand};
use clktree_config::{ClockRef, ClockTable};
use clktree_core::soc::s3c64xx::{Formulas, Variant};
use clktree_core::{build_tree, ClockError, ClockId, ClockTree, RegisterBlock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use table_check::CheckReport;
use units::{format_hz, parse_hz, parse_poke, parse_u32};

const EXIT_PASS: u8 = 0;
const EXIT_CHECK_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "ClkTree - S3C64xx clock tree manager",
    long_about = None
)]
struct Cli {
    /// Path to the clock table (YAML)
    #[arg(long, global = true, default_value = "configs/clocks/s3c6410.yaml")]
    table: PathBuf,

    /// Crystal rate, e.g. 12M (default: from the table)
    #[arg(long, global = true, value_parser = parse_hz)]
    xtal: Option<u64>,

    /// SoC variant, selects the ARMCLK divisor mask
    #[arg(long, global = true, conflicts_with = "armclk_mask")]
    variant: Option<Variant>,

    /// Explicit ARMCLK divisor mask, e.g. 0x7
    #[arg(long, global = true, value_parser = parse_u32)]
    armclk_mask: Option<u32>,

    /// Override a boot register value as OFFSET=VALUE (repeatable)
    #[arg(long = "poke", global = true, value_parser = parse_poke)]
    pokes: Vec<(u64, u32)>,

    /// Enable debug logging, including every register write
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print every clock with its rate, depth-first from the roots
    Summary {
        /// Emit JSON instead of an indented tree
        #[arg(long)]
        json: bool,
    },
    /// Print the current rate of a clock
    Rate { clock: ClockRef },
    /// Print the rate a set-rate request would produce, without writing
    RoundRate {
        clock: ClockRef,
        #[arg(value_parser = parse_hz)]
        rate: u64,
    },
    /// Program the clock's divider for the requested rate
    SetRate {
        clock: ClockRef,
        #[arg(value_parser = parse_hz)]
        rate: u64,
    },
    /// Take an enable reference on a gated clock
    Enable { clock: ClockRef },
    /// Drop an enable reference on a gated clock
    Disable { clock: ClockRef },
    /// Switch a multiplexed clock to another source
    Reparent { clock: ClockRef, source: ClockRef },
    /// Validate the clock table and the tree built from it
    Check {
        #[arg(long)]
        json: bool,
    },
}

/// Why a command failed, mapped onto the exit code.
#[derive(Debug)]
enum Failure {
    Config(anyhow::Error),
    Clock(ClockError),
}

impl From<ClockError> for Failure {
    fn from(e: ClockError) -> Self {
        Failure::Clock(e)
    }
}

impl Failure {
    fn exit_code(&self) -> ExitCode {
        match self {
            Failure::Config(e) => {
                error!("{:#}", e);
                ExitCode::from(EXIT_CONFIG_ERROR)
            }
            Failure::Clock(e) => {
                error!("{}", e);
                ExitCode::from(EXIT_RUNTIME_ERROR)
            }
        }
    }
}

/// A loaded table, the simulated register block seeded from it and the tree on top.
struct Session {
    block: Arc<RegisterBlock>,
    tree: ClockTree,
}

struct TreeOptions {
    xtal_hz: u64,
    armclk_mask: u32,
}

fn tree_options(cli: &Cli, table: &ClockTable) -> TreeOptions {
    TreeOptions {
        xtal_hz: cli.xtal.unwrap_or(table.settings.xtal_hz),
        armclk_mask: cli
            .armclk_mask
            .or_else(|| cli.variant.map(|v| v.armclk_mask()))
            .unwrap_or(table.settings.armclk_mask),
    }
}

fn seed_registers(table: &ClockTable, pokes: &[(u64, u32)]) -> Arc<RegisterBlock> {
    Arc::new(RegisterBlock::with_values(
        table
            .registers
            .iter()
            .map(|r| (r.offset, r.value))
            .chain(pokes.iter().copied()),
    ))
}

fn load_session(cli: &Cli) -> anyhow::Result<Session> {
    use anyhow::Context;

    let table = ClockTable::from_file(&cli.table)?;
    let opts = tree_options(cli, &table);
    info!(
        "Loaded clock table '{}' ({} clocks, xtal {}, armclk mask {:#x})",
        table.name,
        table.clocks.len(),
        format_hz(opts.xtal_hz),
        opts.armclk_mask
    );

    let block = seed_registers(&table, &cli.pokes);
    let tree = build_tree(
        opts.xtal_hz,
        opts.armclk_mask,
        &table,
        block.clone(),
        &Formulas,
    )
    .with_context(|| format!("Failed to build clock tree from {:?}", cli.table))?;
    Ok(Session { block, tree })
}

fn resolve(tree: &ClockTree, clock: &ClockRef) -> Result<ClockId, Failure> {
    tree.lookup_for_device(&clock.name, clock.instance)
        .map_err(|e| Failure::Config(e.into()))
}

/// Prints every register whose value changed since `before`.
fn print_writes(block: &RegisterBlock, before: &[(u64, u32)]) {
    let before: HashMap<u64, u32> = before.iter().copied().collect();
    for (offset, value) in block.snapshot() {
        let old = before.get(&offset).copied().unwrap_or(0);
        if old != value {
            println!("  reg {:#06x}: {:#010x} -> {:#010x}", offset, old, value);
        }
    }
}

fn print_rate(tree: &ClockTree, id: ClockId) -> Result<(), Failure> {
    let label = tree.key(id)?.to_string();
    let rate = tree.get_rate(id)?;
    println!("{}: {} Hz ({})", label, rate, format_hz(rate));
    Ok(())
}

fn print_summary(tree: &ClockTree, json: bool) -> Result<(), Failure> {
    if json {
        let out = serde_json::to_string_pretty(&tree.snapshot())
            .map_err(|e| Failure::Config(e.into()))?;
        println!("{}", out);
        return Ok(());
    }

    for entry in tree.summary() {
        let indent = entry.depth * 2;
        let rate = match (entry.rate_hz, &entry.error) {
            (Some(hz), _) => format_hz(hz),
            (None, Some(err)) => format!("<{}>", err),
            (None, None) => "-".to_string(),
        };
        let mut line = format!(
            "{:indent$}{:<width$} {:>16}",
            "",
            entry.label(),
            rate,
            indent = indent,
            width = 32usize.saturating_sub(indent)
        );
        if let Some(count) = entry.enable_count {
            line.push_str(&format!("  en={}", count));
        }
        if !entry.flags.is_empty() {
            line.push_str(&format!("  [{}]", entry.flags.join(",")));
        }
        println!("{}", line);
    }
    Ok(())
}

fn run_command(cli: &Cli) -> Result<(), Failure> {
    let Session { block, mut tree } = load_session(cli).map_err(Failure::Config)?;
    let before = block.snapshot();

    match &cli.command {
        Commands::Summary { json } => print_summary(&tree, *json)?,
        Commands::Rate { clock } => {
            let id = resolve(&tree, clock)?;
            print_rate(&tree, id)?;
        }
        Commands::RoundRate { clock, rate } => {
            let id = resolve(&tree, clock)?;
            let rounded = tree.round_rate(id, *rate)?;
            println!(
                "{}: {} rounds to {} Hz ({})",
                tree.key(id)?,
                format_hz(*rate),
                rounded,
                format_hz(rounded)
            );
        }
        Commands::SetRate { clock, rate } => {
            let id = resolve(&tree, clock)?;
            tree.set_rate(id, *rate)?;
            print_rate(&tree, id)?;
            print_writes(&block, &before);
        }
        Commands::Enable { clock } | Commands::Disable { clock } => {
            let id = resolve(&tree, clock)?;
            if matches!(cli.command, Commands::Enable { .. }) {
                tree.enable(id)?;
            } else {
                tree.disable(id)?;
            }
            match tree.enable_count(id)? {
                Some(count) => println!("{}: enable count {}", tree.key(id)?, count),
                None => println!("{}: not gated", tree.key(id)?),
            }
            print_writes(&block, &before);
        }
        Commands::Reparent { clock, source } => {
            let id = resolve(&tree, clock)?;
            let source = resolve(&tree, source)?;
            tree.set_parent(id, source)?;
            print_rate(&tree, id)?;
            print_writes(&block, &before);
        }
        Commands::Check { .. } => {}
    }
    Ok(())
}

fn run_check(cli: &Cli, json: bool) -> ExitCode {
    let mut report = CheckReport::new(format!("ClockTable: {:?}", cli.table));

    match ClockTable::from_file(&cli.table) {
        Ok(table) => {
            table_check::check_table(&table, &mut report);
            if report.valid {
                let opts = tree_options(cli, &table);
                let block = seed_registers(&table, &cli.pokes);
                match build_tree(opts.xtal_hz, opts.armclk_mask, &table, block, &Formulas) {
                    Ok(tree) => table_check::check_tree(&tree, &mut report),
                    Err(e) => report.error(format!("Failed to build clock tree: {}", e)),
                }
            }
        }
        Err(e) => report.error(format!("Failed to load clock table: {:#}", e)),
    }

    print_report(&report, json)
}

fn print_report(report: &CheckReport, json: bool) -> ExitCode {
    if json {
        println!("{}", serde_json::to_string_pretty(report).unwrap_or_default());
    } else {
        println!("{}", report.context);
        for e in &report.errors {
            println!("  error: {}", e);
        }
        for w in &report.warnings {
            println!("  warning: {}", w);
        }
        println!(
            "{} ({} errors, {} warnings)",
            if report.valid { "OK" } else { "FAILED" },
            report.errors.len(),
            report.warnings.len()
        );
    }

    if report.valid {
        ExitCode::from(EXIT_PASS)
    } else {
        ExitCode::from(EXIT_CHECK_FAIL)
    }
}

fn table_exists(path: &Path) -> bool {
    path.is_file()
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output stays parseable.
    let level = if cli.trace {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if !table_exists(&cli.table) {
        error!("Clock table not found: {:?}", cli.table);
        return ExitCode::from(EXIT_CONFIG_ERROR);
    }

    match &cli.command {
        Commands::Check { json } => run_check(&cli, *json),
        _ => match run_command(&cli) {
            Ok(()) => ExitCode::from(EXIT_PASS),
            Err(failure) => failure.exit_code(),
        },
    }
}
