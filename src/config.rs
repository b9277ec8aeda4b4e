use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::pipeline::batch::{DEFAULT_WORKERS, FailurePolicy};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Worker threads; 0 picks the default.
    pub thread_count: usize,
    pub fail_fast: bool,
    /// Also copy non-DEF entries out of LOD archives.
    pub extract_raw: bool,
    /// Write `<archive stem>.json` describing a LOD archive's file table.
    pub write_manifest: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: PathBuf::from("."),
            output_dir: PathBuf::from("./out"),
            thread_count: 0,
            fail_fast: false,
            extract_raw: false,
            write_manifest: false,
        }
    }
}

impl Config {
    pub fn worker_count(&self) -> usize {
        if self.thread_count == 0 {
            DEFAULT_WORKERS
        } else {
            self.thread_count
        }
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        if self.fail_fast {
            FailurePolicy::FailFast
        } else {
            FailurePolicy::CollectAll
        }
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
