//! rusty-indicator CLI - evaluate stored indicator formulas against CSV bars
//!
//! ## Example Usage
//!
//! ```bash
//! # Print an indicator over the last 60 daily bars
//! rusty-indicator eval --data bars.csv --symbol SH600000 --formula spread.json --start -60
//!
//! # Dump every position as CSV
//! rusty-indicator items --data bars.csv --symbol SH600000 --formula spread.json
//!
//! # Show names and the formula without loading data
//! rusty-indicator describe --formula spread.json
//! ```

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rusty_indicator::data::CsvFormat;
use rusty_indicator::indicator::IndicatorDef;
use rusty_indicator::operand::OperandDef;
use rusty_indicator::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

/// rusty-indicator: composable technical-indicator evaluation
#[derive(Parser)]
#[command(name = "rusty-indicator")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Evaluate composable technical indicators", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a formula and print its result table
    Eval(EvalArgs),

    /// Evaluate a formula and print every position as CSV
    Items(EvalArgs),

    /// Print name, long name and formula of a stored indicator or operand
    Describe {
        /// Formula file (JSON)
        #[arg(short, long)]
        formula: PathBuf,
    },
}

#[derive(Args)]
struct EvalArgs {
    /// Bar data (CSV)
    #[arg(short, long)]
    data: PathBuf,

    /// Instrument market code, e.g. SH600000
    #[arg(short, long)]
    symbol: String,

    /// Formula file (JSON)
    #[arg(short, long)]
    formula: PathBuf,

    /// First bar index; negative counts from the end
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    start: i64,

    /// End bar index (exclusive)
    #[arg(long, allow_hyphen_values = true)]
    end: Option<i64>,

    /// Bar frequency of the data file
    #[arg(long, default_value = "daily")]
    frequency: String,
}

/// Configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Config {
    #[serde(default)]
    print: PrintOptions,
    #[serde(default)]
    csv: CsvFormat,
}

impl Config {
    fn load(path: Option<&Path>) -> Self {
        if let Some(config_path) = path {
            match fs::read_to_string(config_path) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(config) => return config,
                    Err(e) => {
                        eprintln!("{} Failed to parse config: {}", "Warning:".yellow(), e);
                    }
                },
                Err(e) => {
                    eprintln!("{} Failed to read config: {}", "Warning:".yellow(), e);
                }
            }
        } else if let Some(home) = dirs::home_dir() {
            let default_config = home.join(".rusty-indicator").join("config.toml");
            if let Ok(contents) = fs::read_to_string(&default_config) {
                if let Ok(config) = toml::from_str(&contents) {
                    return config;
                }
            }
        }

        Config::default()
    }
}

/// A formula file holds either a single indicator or an operand expression
enum Stored {
    Indicator(Indicator),
    Operand(Operand),
}

impl Stored {
    fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read formula {}", path.display()))?;
        let registry = FormulaRegistry::new();

        if let Ok(def) = serde_json::from_str::<IndicatorDef>(&json) {
            return Ok(Stored::Indicator(Indicator::from_def(&def, &registry)?));
        }
        match serde_json::from_str::<OperandDef>(&json) {
            Ok(def) => Ok(Stored::Operand(Operand::from_def(&def, &registry)?)),
            Err(e) => bail!("{} is neither an indicator nor an operand: {}", path.display(), e),
        }
    }

    fn bind(&self, series: BarSeries) -> Indicator {
        match self {
            Stored::Indicator(ind) => ind.apply_series(series),
            Stored::Operand(op) => {
                let close = Indicator::close();
                close.set_context_series(series);
                op.calculate(&close)
            }
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = Config::load(cli.config.as_deref());
    if cli.verbose {
        println!(
            "{} v{}",
            "rusty-indicator".cyan().bold(),
            env!("CARGO_PKG_VERSION")
        );
    }

    let result = match cli.command {
        Commands::Eval(args) => eval(&args, &config),
        Commands::Items(args) => items(&args, &config),
        Commands::Describe { formula } => describe(&formula),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn evaluate(args: &EvalArgs, config: &Config) -> Result<Indicator> {
    let frequency: Frequency = args.frequency.parse()?;
    let asset: Asset = args.symbol.parse()?;

    let mut provider = InMemoryDataProvider::new();
    let loaded = CsvBarReader::with_format(config.csv.clone())
        .load_into(&args.data, &mut provider, frequency)
        .with_context(|| format!("Failed to load {}", args.data.display()))?;
    log::info!("loaded {} bars from {}", loaded, args.data.display());

    let query = Query::index(args.start, args.end).with_frequency(frequency);
    let series = rusty_indicator::data::fetch_series(&provider, &asset, &query)?;
    let stored = Stored::load(&args.formula)?;

    let ind = stored.bind(series);
    ind.evaluate()
        .with_context(|| format!("Failed to evaluate {}", ind.formula()))?;
    Ok(ind)
}

fn eval(args: &EvalArgs, config: &Config) -> Result<()> {
    let ind = evaluate(args, config)?;
    println!("{}", ind.long_name().green().bold());
    print!("{}", ind.render(&config.print)?);
    Ok(())
}

fn items(args: &EvalArgs, config: &Config) -> Result<()> {
    let ind = evaluate(args, config)?;
    let count = ind.result_count()?;

    let mut writer = csv::Writer::from_writer(std::io::stdout());
    let mut header = vec!["datetime".to_string()];
    header.extend((0..count).map(|ch| format!("result{}", ch)));
    writer.write_record(&header)?;

    for (ts, values) in ind.items()? {
        let mut record = vec![ts
            .map(|t| t.format(&config.print.datetime_format).to_string())
            .unwrap_or_default()];
        record.extend(
            values
                .iter()
                .map(|v| if is_null(*v) { String::new() } else { v.to_string() }),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn describe(formula: &Path) -> Result<()> {
    match Stored::load(formula)? {
        Stored::Indicator(ind) => {
            println!("{:<10}{}", "name:".bold(), ind.name());
            println!("{:<10}{}", "long:".bold(), ind.long_name());
            println!("{:<10}{}", "formula:".bold(), ind.formula());
        }
        Stored::Operand(op) => {
            println!("{:<10}{}", "name:".bold(), op.name());
            println!("{:<10}{}", "formula:".bold(), op.formula());
        }
    }
    Ok(())
}
