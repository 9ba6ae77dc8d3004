use std::path::PathBuf;

use clap::{ Parser, ValueEnum };
use log::LevelFilter;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> LevelFilter {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Traces one batch of sun rays through a solar concentrator scene.
#[derive(Debug, Parser)]
#[clap(name = "heliotrace", version, about)]
pub struct Args {
    /// JSON simulation file
    #[clap(short, long)]
    pub config: PathBuf,

    /// Number of sun rays; overrides the scene file
    #[clap(short, long)]
    pub rays: Option<usize>,

    /// Batch seed; overrides the scene file
    #[clap(short, long)]
    pub seed: Option<u64>,

    /// Worker threads
    #[clap(short, long, default_value_t = heliotrace::consts::NUM_THREADS)]
    pub threads: usize,

    /// Write the reflected rays to this JSON file
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    #[clap(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}

/* Tests */

#[test]
fn defaults_apply() {
    let args = Args::try_parse_from(["heliotrace", "--config", "scene.json"]).unwrap();

    assert_eq!(args.config, PathBuf::from("scene.json"));
    assert_eq!((args.rays, args.seed, args.output), (None, None, None));
    assert_eq!(args.threads, heliotrace::consts::NUM_THREADS);
    assert_eq!(args.log_level, LogLevel::Info);
}

#[test]
fn overrides_parse() {
    let args = Args::try_parse_from([
        "heliotrace", "-c", "s.json", "--rays", "100", "--seed", "9",
        "--threads", "2", "--output", "rays.json", "--log-level", "debug",
    ]).unwrap();

    assert_eq!((args.rays, args.seed, args.threads), (Some(100), Some(9), 2));
    assert_eq!(args.output, Some(PathBuf::from("rays.json")));
    assert_eq!(LevelFilter::from(args.log_level), LevelFilter::Debug);
}

#[test]
fn config_is_required() {
    assert!(Args::try_parse_from(["heliotrace"]).is_err());
}
