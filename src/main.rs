use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, error, info};
use std::path::PathBuf;
use std::process;

use def2png::config::Config;
use def2png::event::BatchEvent;
use def2png::pipeline_worker::{PipelineWorker, RunSummary};

#[derive(Parser, Debug)]
#[command(version, about = "Extract DEF sprite frames to PNG")]
struct Args {
    /// DEF file, directory of DEF files, or LOD archive
    input: PathBuf,

    /// Directory receiving one sub-directory per DEF file
    output_dir: PathBuf,

    /// Number of worker threads (0 or absent: 4)
    workers: Option<usize>,

    /// TOML file with defaults for the options below
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop scheduling new items after the first failure
    #[arg(long)]
    fail_fast: bool,

    /// Also copy non-DEF entries out of LOD archives
    #[arg(long)]
    raw: bool,

    /// Write a JSON manifest of the LOD archive's file table into the output directory
    #[arg(long)]
    manifest: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from_file(path)
                .with_context(|| format!("can't load config {}", path.display()))?,
            None => Config::default(),
        };

        config.input = self.input;
        config.output_dir = self.output_dir;
        if let Some(workers) = self.workers {
            config.thread_count = workers;
        }
        config.fail_fast |= self.fail_fast;
        config.extract_raw |= self.raw;
        config.write_manifest |= self.manifest;
        Ok(config)
    }
}

fn init_logger(level: Option<&str>) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = level {
        let filter = match level {
            "trace" => LevelFilter::Trace,
            "debug" => LevelFilter::Debug,
            "warn" => LevelFilter::Warn,
            "error" => LevelFilter::Error,
            "off" => LevelFilter::Off,
            _ => LevelFilter::Info,
        };
        builder.filter_level(filter);
    }
    builder.init();
}

fn run(args: Args) -> Result<RunSummary> {
    let config = args.into_config()?;
    info!(
        "extracting {} into {} with {} workers",
        config.input.display(),
        config.output_dir.display(),
        config.worker_count()
    );

    let (tx, rx) = crossbeam_channel::unbounded();
    let handle = PipelineWorker::new(tx).start(config);

    // the channel closes once the worker thread drops its sender
    for event in rx {
        match event {
            BatchEvent::ItemStarted(name) => log::debug!("processing {}", name),
            BatchEvent::ItemCompleted(name) => log::debug!("done {}", name),
            BatchEvent::ItemFailed(..) => {}
            BatchEvent::ItemCancelled(name) => log::warn!("cancelled {}", name),
            BatchEvent::Progress(done, total) => log::debug!("progress {}/{}", done, total),
            BatchEvent::LogMessage(msg) => info!("{}", msg),
        }
    }

    match handle.join() {
        Ok(result) => result,
        Err(_) => anyhow::bail!("pipeline worker panicked"),
    }
}

fn main() {
    let args = Args::parse();
    init_logger(args.log_level.as_deref());

    match run(args) {
        Ok(summary) if summary.is_success() => {}
        Ok(summary) => {
            eprintln!("{} failures:", summary.failures.len());
            for failure in &summary.failures {
                eprintln!("  {}: {}", failure.item, failure.reason);
            }
            if summary.cancelled > 0 {
                eprintln!("{} items cancelled", summary.cancelled);
            }
            process::exit(1);
        }
        Err(e) => {
            error!("{:#}", e);
            process::exit(1);
        }
    }
}
