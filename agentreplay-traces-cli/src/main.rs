// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Agentreplay Traces CLI
//!
//! Replays JSONL tool-call logs through the trace engine.

mod input;

use agentreplay_traces::{
    ToolWeightScorer, Trace, TraceDetector, TraceEngineConfig, TraceSessionRegistry,
    TraceStatistics,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "agentreplay-traces")]
#[command(about = "Group coding-agent tool calls into scored traces", long_about = None)]
struct Cli {
    /// Engine configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Output as JSON (machine-readable)
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect traces in a tool-call log and print them
    Ingest {
        /// JSONL file, one tool call per line
        file: PathBuf,
    },

    /// Print trace statistics per session
    Stats {
        /// JSONL file, one tool call per line
        file: PathBuf,
    },

    /// Detect traces, then compress those older than the given age
    Compress {
        /// JSONL file, one tool call per line
        file: PathBuf,

        /// Age threshold in hours
        #[arg(long, default_value = "24", value_parser = parse_age_hours)]
        age_hours: f64,
    },
}

/// Accepts finite, non-negative hours.
fn parse_age_hours(value: &str) -> std::result::Result<f64, String> {
    let hours: f64 = value
        .parse()
        .map_err(|_| format!("`{value}` is not a number"))?;
    if !hours.is_finite() || hours < 0.0 {
        return Err(format!("`{value}` must be a finite, non-negative number of hours"));
    }
    Ok(hours)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => TraceEngineConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TraceEngineConfig::default(),
    };

    match &cli.command {
        Commands::Ingest { file } => {
            let registry = replay(&config, file)?;
            let exports = collect(&registry, |d| d.export_traces());
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&exports)?);
            } else {
                for (session, export) in &exports {
                    print_traces(session, &export.traces);
                }
            }
        }

        Commands::Stats { file } => {
            let registry = replay(&config, file)?;
            let stats = collect(&registry, |d| d.get_statistics());
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                for (session, stats) in &stats {
                    print_statistics(session, stats);
                }
            }
        }

        Commands::Compress { file, age_hours } => {
            let registry = replay(&config, file)?;
            let compressed = collect(&registry, |d| d.compress_old_traces(*age_hours));
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&compressed)?);
            } else {
                for (session, count) in &compressed {
                    println!("✓ {session}: compressed {count} trace(s) older than {age_hours}h");
                }
            }
        }
    }

    Ok(())
}

/// Feed every record of a log through a fresh registry and flush it.
fn replay(config: &TraceEngineConfig, file: &Path) -> Result<TraceSessionRegistry> {
    let records = input::read_records(file)?;
    let scorer = Arc::new(ToolWeightScorer::new(config.scoring.clone()));
    let registry = TraceSessionRegistry::new(config.boundary.clone(), scorer)?;

    let total = records.len();
    for record in records {
        let session = record.session().to_string();
        registry.record(&session, record.call);
    }
    registry.flush_all();

    info!(
        file = %file.display(),
        tool_calls = total,
        sessions = registry.len(),
        "Replayed tool-call log"
    );
    Ok(registry)
}

fn collect<T>(
    registry: &TraceSessionRegistry,
    mut f: impl FnMut(&mut TraceDetector) -> T,
) -> BTreeMap<String, T> {
    registry
        .sessions()
        .into_iter()
        .filter_map(|session| {
            let value = registry.with_detector(&session, &mut f)?;
            Some((session, value))
        })
        .collect()
}

fn print_traces(session: &str, traces: &[Trace]) {
    println!("Session {session}: {} traces", traces.len());
    for trace in traces {
        let marker = if trace.is_compressed() {
            " [compressed]"
        } else {
            ""
        };
        println!(
            "  {} {:<22} score={:.2} tools={:<3} {}{}",
            trace.id,
            trace.trace_type.as_str(),
            trace.score,
            trace.tool_count(),
            trace.summary,
            marker
        );
    }
}

fn print_statistics(session: &str, stats: &TraceStatistics) {
    println!("Session {session}");
    println!("  Traces: {}", stats.total_traces);
    for (trace_type, count) in &stats.traces_by_type {
        println!("    {trace_type}: {count}");
    }
    println!("  Average score: {:.3}", stats.average_score);
    println!("  Average tools per trace: {:.1}", stats.average_tool_count);
    println!("  Compressed: {}", stats.compressed_count);
    println!("  High importance: {}", stats.high_importance_count);
}
