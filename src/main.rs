use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use log::LevelFilter;
use rustyline::Editor;
use rustyline::error::ReadlineError;
use serde_json::{Value, json};
use std::ops::ControlFlow;
use std::path::PathBuf;

use vgosdb::analysis::{Band, SessionAnalysis, SessionSummary};
use vgosdb::shell::commands::cat::{PREVIEW_VALUES, render_table};
use vgosdb::shell::commands::tree::DEFAULT_DEPTH;
use vgosdb::shell::{ShellCompleter, ShellState};
use vgosdb::ui::create_spinner;
use vgosdb::{ArchiveHandle, NetcdfDecoder, ReaderOptions};

/// Browse vgosDB session archives without unpacking them
#[derive(Parser)]
#[command(name = "vgosdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Session archive (.tgz)
    archive: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suffix of the members to index
    #[arg(
        long,
        env = "VGOSDB_EXTENSION",
        default_value = vgosdb::config::DEFAULT_EXTENSION,
        global = true
    )]
    extension: String,

    /// Keep a single top-level directory instead of navigating inside it
    #[arg(long, env = "VGOSDB_NO_STRIP_ROOT", global = true)]
    no_strip_root: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// File count, station guesses and files per directory
    Summary,

    /// Directory tree with file sizes
    Tree {
        /// Deepest directory level to expand
        #[arg(short, long, default_value_t = DEFAULT_DEPTH)]
        depth: usize,
    },

    /// List a directory
    Ls {
        /// Directory relative to the archive root
        path: Option<String>,
    },

    /// List files whose path matches a regular expression
    Find { pattern: String },

    /// Station codes guessed from member paths
    Stations,

    /// Dimensions, attributes and variables of one file
    Show {
        /// File relative to the archive root, e.g. Apriori/Antenna.nc
        path: String,

        /// Values printed per variable
        #[arg(short = 'n', long, default_value_t = PREVIEW_VALUES)]
        values: usize,
    },

    /// Observation overview for EOP analysis
    Analysis {
        #[arg(short, long, default_value_t = Band::X)]
        band: Band,
    },

    /// Interactive shell (the default)
    Shell,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.parse_default_env();
    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(buf, "[{}] {}", record.level(), record.args())
    });
    let _ = builder.try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = ReaderOptions::default()
        .with_extension(cli.extension.clone())
        .strip_single_root(!cli.no_strip_root);

    let spinner = create_spinner(&format!("Indexing {}...", cli.archive.display()));
    let archive = ArchiveHandle::open_with(&cli.archive, options, Box::new(NetcdfDecoder));
    spinner.finish_and_clear();
    let archive = archive.with_context(|| format!("failed to open {}", cli.archive.display()))?;

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Summary => {
            let summary = archive.summary();
            if cli.json {
                print_json(&json!({
                    "name": summary.name,
                    "file_count": summary.file_count,
                    "stations": summary.stations,
                    "categories": summary.categories,
                }))?;
            } else {
                print!("{summary}");
            }
        }
        Commands::Tree { depth } => {
            print!("{}", archive.render_tree(depth)?);
        }
        Commands::Ls { path } => {
            let root = archive.root();
            let dir = match path.as_deref().map(|p| p.trim_matches('/')) {
                None | Some("") => root,
                Some(p) => root.node(p)?,
            };
            let children = dir.children()?;
            if cli.json {
                let entries = children
                    .iter()
                    .map(|name| {
                        Ok(json!({
                            "name": name,
                            "is_dir": dir.is_dir(name)?,
                            "size": dir.leaf_size(name)?,
                        }))
                    })
                    .collect::<vgosdb::Result<Vec<Value>>>()?;
                print_json(&Value::Array(entries))?;
            } else {
                for name in &children {
                    if dir.is_dir(name)? {
                        println!("{}/", name.blue().bold());
                    } else {
                        println!("{name}");
                    }
                }
            }
        }
        Commands::Find { pattern } => {
            let found = archive.find(&pattern)?;
            if cli.json {
                print_json(&json!(found))?;
            } else {
                found.iter().for_each(|path| println!("{path}"));
            }
        }
        Commands::Stations => {
            let stations = archive.stations();
            if cli.json {
                print_json(&json!(stations))?;
            } else {
                stations.iter().for_each(|code| println!("{code}"));
            }
        }
        Commands::Show { path, values } => {
            let table = archive.root().table(&path)?;
            if cli.json {
                let variables: Vec<Value> = table
                    .variables
                    .iter()
                    .map(|v| {
                        json!({
                            "name": v.name,
                            "type": v.data.type_name(),
                            "dimensions": v.dimensions,
                            "shape": v.shape,
                            "units": v.units(),
                        })
                    })
                    .collect();
                print_json(&json!({ "path": path, "variables": variables }))?;
            } else {
                print!("{}", render_table(&path, &table, values));
            }
        }
        Commands::Analysis { band } => {
            let summary = SessionAnalysis::new(&archive).summary(band)?;
            if cli.json {
                print_json(&summary_json(&summary))?;
            } else {
                print_summary(&summary);
            }
        }
        Commands::Shell => run_shell(archive)?,
    }
    Ok(())
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn summary_json(summary: &SessionSummary) -> Value {
    json!({
        "n_observations": summary.n_observations,
        "n_stations": summary.n_stations,
        "stations": summary.stations,
        "sources": summary.sources,
        "baselines": summary.baselines,
        "time_range": summary.time_range.as_ref().map(|t| json!({
            "start_mjd": t.start_mjd,
            "end_mjd": t.end_mjd,
            "duration_hours": t.duration_hours,
        })),
        "delay_stats": summary.delay_stats.as_ref().map(|d| json!({
            "mean_delay_us": d.mean_delay_us,
            "std_delay_us": d.std_delay_us,
            "mean_sigma_ns": d.mean_sigma_ns,
        })),
    })
}

fn print_summary(summary: &SessionSummary) {
    println!("Observations: {}", summary.n_observations);
    println!("Stations ({}): {}", summary.n_stations, summary.stations.join(", "));
    println!("Sources: {}", summary.sources.len());
    println!("Baselines: {}", summary.baselines.len());
    if let Some(range) = &summary.time_range {
        println!(
            "Time range: MJD {:.5} to {:.5} ({:.2} h)",
            range.start_mjd, range.end_mjd, range.duration_hours
        );
    }
    if let Some(stats) = &summary.delay_stats {
        println!(
            "Group delay: mean {:.3} us, std {:.3} us, mean sigma {:.3} ns",
            stats.mean_delay_us, stats.std_delay_us, stats.mean_sigma_ns
        );
    }
}

fn run_shell(archive: ArchiveHandle) -> Result<()> {
    println!("{}", "=".repeat(60).cyan());
    println!("{}", format!("  vgosdb - {}", archive.name()).bold().cyan());
    println!("{}", format!("  {} netCDF files", archive.member_count()).cyan());
    println!("{}", "=".repeat(60).cyan());
    println!();
    println!("Type 'help' for available commands or 'exit' to quit");
    println!();

    let mut state = ShellState::new(archive);

    let completer = ShellCompleter::new(state.completion_cache().clone());
    let mut rl = Editor::new()?;
    rl.set_helper(Some(completer));

    let history_file = dirs::home_dir().map(|home| home.join(".vgosdb_history"));
    if let Some(path) = &history_file {
        let _ = rl.load_history(path);
    }

    loop {
        match rl.readline(&state.prompt()) {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                match state.execute(&line) {
                    Ok(ControlFlow::Break(())) => break,
                    Ok(ControlFlow::Continue(())) => {}
                    Err(e) => eprintln!("{} {:#}", "Error:".red().bold(), e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
            }
            Err(ReadlineError::Eof) => {
                println!("exit");
                break;
            }
            Err(err) => {
                eprintln!("{} {:?}", "Error:".red().bold(), err);
                break;
            }
        }
    }

    if let Some(path) = &history_file {
        let _ = rl.save_history(path);
    }

    println!("Goodbye!");
    Ok(())
}
