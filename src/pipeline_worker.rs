// Pipeline worker: resolves the input and runs the batch extraction on a background thread

use anyhow::{Context, Result, bail};
use crossbeam_channel::Sender;
use log::{info, warn};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use walkdir::WalkDir;

use crate::config::Config;
use crate::event::BatchEvent;
use crate::pipeline::batch::{BatchRunner, ItemOutcome};
use crate::pipeline::extractor::{
    DefReport, ExtractOptions, def_stem, extract_def, extract_def_file,
};
use crate::pipeline::lod::{self, LodArchive, LodEntry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// DEF files found under `root`. Output mirrors their position below it.
    DefFiles { root: PathBuf, files: Vec<PathBuf> },
    Lod(PathBuf),
}

/// Decides how to read `path`: a directory of DEF files, a LOD archive (by
/// extension or magic), or a single DEF file.
pub fn resolve_input(path: &Path) -> Result<InputSource> {
    if path.is_dir() {
        let mut def_files = Vec::new();
        for entry in WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(ext) = path.extension() {
                if ext.to_string_lossy().eq_ignore_ascii_case("def") {
                    def_files.push(path.to_path_buf());
                }
            }
        }
        return Ok(InputSource::DefFiles {
            root: path.to_path_buf(),
            files: def_files,
        });
    }

    if !path.is_file() {
        bail!("input {} does not exist", path.display());
    }

    let by_extension = path
        .extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("lod"));
    if by_extension || has_lod_magic(path)? {
        return Ok(InputSource::Lod(path.to_path_buf()));
    }

    let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(InputSource::DefFiles {
        root,
        files: vec![path.to_path_buf()],
    })
}

/// Directory that receives the output tree of `file`: `output_dir` plus the
/// file's sub-directory below `root`.
fn mirrored_output_root(root: &Path, file: &Path, output_dir: &Path) -> PathBuf {
    match file.strip_prefix(root).ok().and_then(Path::parent) {
        Some(relative) => output_dir.join(relative),
        None => output_dir.to_path_buf(),
    }
}

/// For each `(label, output dir)` pair, the label of an earlier item that already
/// writes to the same directory. Compared case-insensitively, as game resource
/// names are.
fn output_clashes(targets: &[(String, PathBuf)]) -> Vec<Option<String>> {
    let mut claimed: HashMap<String, &str> = HashMap::new();
    targets
        .iter()
        .map(|(label, dir)| {
            let key = dir.to_string_lossy().to_lowercase();
            match claimed.get(&key) {
                Some(first) => Some(first.to_string()),
                None => {
                    claimed.insert(key, label);
                    None
                }
            }
        })
        .collect()
}

/// One DEF file with where its output goes.
#[derive(Debug)]
struct DefJob {
    path: PathBuf,
    output_root: PathBuf,
    clash: Option<String>,
}

fn has_lod_magic(path: &Path) -> Result<bool> {
    let mut magic = Vec::with_capacity(4);
    File::open(path)
        .with_context(|| format!("can't open {}", path.display()))?
        .take(4)
        .read_to_end(&mut magic)?;
    Ok(LodArchive::can_parse(&magic))
}

#[derive(Debug)]
pub enum ItemReport {
    Def(DefReport),
    Raw(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub item: String,
    pub reason: String,
}

/// Totals of one run, with every item and frame failure spelled out.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub items: usize,
    pub succeeded: usize,
    pub cancelled: usize,
    pub frames_extracted: usize,
    pub failures: Vec<Failure>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.cancelled == 0
    }

    fn record(&mut self, item: String, outcome: ItemOutcome<ItemReport>) {
        self.items += 1;
        match outcome {
            ItemOutcome::Done(ItemReport::Def(report)) => {
                self.succeeded += 1;
                self.frames_extracted += report.extracted();
                for frame in report.failures() {
                    if let Err(e) = &frame.result {
                        self.failures.push(Failure {
                            item: format!("{} (block {}, frame {})", item, frame.block_id, frame.name),
                            reason: e.to_string(),
                        });
                    }
                }
            }
            ItemOutcome::Done(ItemReport::Raw(_)) => self.succeeded += 1,
            ItemOutcome::Failed(e) => self.failures.push(Failure {
                item,
                reason: format!("{:#}", e),
            }),
            ItemOutcome::Cancelled => self.cancelled += 1,
        }
    }
}

pub struct PipelineWorker {
    tx: Sender<BatchEvent>,
}

impl PipelineWorker {
    pub fn new(tx: Sender<BatchEvent>) -> Self {
        Self { tx }
    }

    pub fn start(&self, config: Config) -> JoinHandle<Result<RunSummary>> {
        let tx = self.tx.clone();
        thread::spawn(move || Self::run(&config, &tx))
    }

    pub fn run(config: &Config, tx: &Sender<BatchEvent>) -> Result<RunSummary> {
        let source = resolve_input(&config.input)?;

        fs::create_dir_all(&config.output_dir).with_context(|| {
            format!("can't create output directory {}", config.output_dir.display())
        })?;
        let _ = tx.send(BatchEvent::LogMessage(format!(
            "Writing to {}",
            config.output_dir.display()
        )));

        let runner = BatchRunner::new(config.worker_count())
            .with_policy(config.failure_policy())
            .with_events(tx.clone());
        let options = ExtractOptions::new();

        match source {
            InputSource::DefFiles { root, files } => {
                Self::run_def_files(config, &runner, &options, &root, &files, tx)
            }
            InputSource::Lod(path) => Self::run_lod(config, &runner, &options, &path, tx),
        }
    }

    fn run_def_files(
        config: &Config,
        runner: &BatchRunner,
        options: &ExtractOptions,
        root: &Path,
        files: &[PathBuf],
        tx: &Sender<BatchEvent>,
    ) -> Result<RunSummary> {
        if files.is_empty() {
            warn!("no .def files found in {}", config.input.display());
        }
        let _ = tx.send(BatchEvent::LogMessage(format!(
            "Found {} DEF files to process",
            files.len()
        )));

        let mut jobs: Vec<DefJob> = files
            .iter()
            .map(|path| DefJob {
                path: path.clone(),
                output_root: mirrored_output_root(root, path, &config.output_dir),
                clash: None,
            })
            .collect();
        let targets: Vec<(String, PathBuf)> = jobs
            .iter()
            .map(|job| {
                let name = job.path.file_name().and_then(|s| s.to_str()).unwrap_or("sprite.def");
                (job.path.display().to_string(), job.output_root.join(def_stem(name)))
            })
            .collect();
        for (job, clash) in jobs.iter_mut().zip(output_clashes(&targets)) {
            job.clash = clash;
        }

        let outcomes = runner.run(
            &jobs,
            |job| job.path.display().to_string(),
            || Ok(()),
            |_, job| {
                if let Some(first) = &job.clash {
                    bail!("output directory already used by {}", first);
                }
                extract_def_file(&job.path, &job.output_root, options).map(ItemReport::Def)
            },
        );

        let mut summary = RunSummary::default();
        for (path, outcome) in files.iter().zip(outcomes) {
            summary.record(path.display().to_string(), outcome);
        }
        Self::finish(&summary, tx);
        Ok(summary)
    }

    fn run_lod(
        config: &Config,
        runner: &BatchRunner,
        options: &ExtractOptions,
        path: &Path,
        tx: &Sender<BatchEvent>,
    ) -> Result<RunSummary> {
        let archive = LodArchive::open(path)
            .with_context(|| format!("can't read LOD archive {}", path.display()))?;

        let entries: Vec<LodEntry> = archive
            .list_entries()
            .iter()
            .filter(|entry| config.extract_raw || entry.is_def())
            .cloned()
            .collect();
        let _ = tx.send(BatchEvent::LogMessage(format!(
            "{}: {} of {} entries selected",
            path.display(),
            entries.len(),
            archive.list_entries().len()
        )));

        if config.write_manifest {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("archive");
            let manifest_path = config.output_dir.join(format!("{}.json", stem));
            archive
                .manifest()
                .write_json(&manifest_path)
                .with_context(|| format!("can't write {}", manifest_path.display()))?;
            info!("wrote manifest {}", manifest_path.display());
        }

        let targets: Vec<(String, PathBuf)> = entries
            .iter()
            .map(|entry| {
                let dir = if entry.is_def() {
                    config.output_dir.join(def_stem(&entry.name))
                } else {
                    config.output_dir.join(&entry.name)
                };
                (entry.name.clone(), dir)
            })
            .collect();
        let clashes = output_clashes(&targets);
        let jobs: Vec<(&LodEntry, &Option<String>)> = entries.iter().zip(&clashes).collect();

        let outcomes = runner.run(
            &jobs,
            |(entry, _)| entry.name.clone(),
            || {
                archive
                    .open_handle()
                    .with_context(|| format!("can't open {}", archive.path().display()))
            },
            |handle, (entry, clash)| {
                if let Some(first) = clash {
                    bail!("output path already used by {}", first);
                }
                if entry.is_def() {
                    let data = lod::read_entry(handle, entry)?;
                    let report =
                        extract_def(Cursor::new(data), &entry.name, &config.output_dir, options)?;
                    Ok(ItemReport::Def(report))
                } else {
                    let out = lod::extract_entry(handle, entry, &config.output_dir)?;
                    Ok(ItemReport::Raw(out))
                }
            },
        );

        let mut summary = RunSummary::default();
        for (entry, outcome) in entries.iter().zip(outcomes) {
            summary.record(entry.name.clone(), outcome);
        }
        Self::finish(&summary, tx);
        Ok(summary)
    }

    fn finish(summary: &RunSummary, tx: &Sender<BatchEvent>) {
        info!(
            "{}/{} items succeeded, {} frames extracted",
            summary.succeeded, summary.items, summary.frames_extracted
        );
        if !summary.is_success() {
            let _ = tx.send(BatchEvent::LogMessage(format!(
                "Completed with {} failures and {} cancelled items",
                summary.failures.len(),
                summary.cancelled
            )));
        }
    }
}
