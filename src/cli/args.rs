use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cph-bikes")]
#[command(about = "Copenhagen bike-counter pipeline: ingest, transform, schedule and serve analytics")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Hide progress spinners")]
    pub quiet: bool,

    #[arg(
        long,
        global = true,
        help = "Configuration file [default: cph-bikes.toml if present]"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Snapshot a source CSV into the raw directory
    Ingest {
        #[arg(long, conflicts_with = "file", help = "Source URL [default: configured SOURCE_URL]")]
        url: Option<String>,

        #[arg(long, help = "Local source CSV or zip archive")]
        file: Option<PathBuf>,

        #[arg(long, conflicts_with_all = ["url", "file"], help = "Require the configured SOURCE_URL")]
        remote: bool,
    },

    /// Aggregate a raw export into daily_counts.parquet
    Transform {
        #[arg(short, long, help = "Raw CSV [default: latest raw snapshot]")]
        input: Option<PathBuf>,

        #[arg(short, long, help = "Output directory [default: curated directory]")]
        output_dir: Option<PathBuf>,

        #[arg(short, long, help = "snappy, gzip, lz4, zstd or none")]
        compression: Option<String>,

        #[arg(long)]
        max_workers: Option<usize>,
    },

    /// Build the dashboard dataset from a raw export and optional weather CSV
    Prepare {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, help = "Daily weather CSV: day,temperature,precipitation,wind_speed")]
        weather: Option<PathBuf>,

        #[arg(short, long, help = "Output directory [default: curated directory]")]
        output_dir: Option<PathBuf>,
    },

    /// Write a synthetic demonstration dataset
    Generate {
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value = "2005-01-01")]
        start: NaiveDate,

        #[arg(long, default_value = "2014-12-31")]
        end: NaiveDate,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Run the daily DAG once
    RunDag {
        #[arg(long, help = "Logical date [default: now]")]
        date: Option<NaiveDate>,
    },

    /// Run the daily DAG on its cron schedule until Ctrl-C
    Schedule,

    /// Print the next fire times of the daily DAG
    NextRuns {
        #[arg(short = 'n', long, default_value = "5")]
        count: usize,
    },

    /// Print dashboard figures for a dataset
    Report {
        #[arg(short, long, help = "Dataset file [default: preferred dataset in the curated directory]")]
        dataset: Option<PathBuf>,

        #[arg(short, long, help = "Month to analyse, YYYY-MM")]
        month: Option<String>,
    },

    /// Check an enriched dataset for range, calendar and duplicate problems
    Validate {
        #[arg(short, long)]
        dataset: PathBuf,
    },

    /// Display information about a Parquet file
    Info {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long, default_value = "10")]
        sample: usize,
    },

    /// Serve the dashboard JSON API
    Serve {
        #[arg(short, long)]
        port: Option<u16>,

        #[arg(short, long)]
        bind: Option<String>,

        #[arg(long, help = "Curated data directory")]
        data_dir: Option<PathBuf>,
    },
}
