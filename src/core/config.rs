// Run Configuration
// Compiled defaults, the optional YAML settings file, and the per-run SyncConfig

use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};

use super::SizeThreshold;
use crate::error::{Error, Result};

// Include the auto-generated defaults from build.rs
pub mod compiled {
    include!(concat!(env!("OUT_DIR"), "/compiled_defaults.rs"));
}

/// Whether operations are carried out or only written to the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Record every operation and perform it
    #[default]
    Execute,
    /// Record every operation as a shell script, touch nothing
    RecordOnly,
}

/// Everything a reconciliation run needs to know
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Tree holding the current versions
    pub master: PathBuf,

    /// Tree being brought up to date
    pub slave: PathBuf,

    /// Rubbish bin receiving evicted slave content
    pub bin: PathBuf,

    /// Stale files above this size are deleted rather than archived
    pub threshold: SizeThreshold,

    /// Execute or record-only
    pub mode: SyncMode,
}

impl SyncConfig {
    /// Create a config in execute mode using the compiled default threshold
    pub fn new(
        master: impl Into<PathBuf>,
        slave: impl Into<PathBuf>,
        bin: impl Into<PathBuf>,
    ) -> Result<Self> {
        Ok(Self {
            master: master.into(),
            slave: slave.into(),
            bin: bin.into(),
            threshold: SizeThreshold::parse(compiled::DEFAULT_MAX_SIZE)?,
            mode: SyncMode::Execute,
        })
    }

    pub fn with_threshold(mut self, threshold: SizeThreshold) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Optional settings read from a YAML file
///
/// Every key may be omitted; command line flags take precedence over the file
/// and the file over the compiled defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Oversized threshold, e.g. "512MiB" or a bare byte count
    #[serde(default, deserialize_with = "size_text")]
    pub max_size: Option<String>,

    /// Interpreter named on the first line of script output
    #[serde(default)]
    pub interpreter: Option<String>,
}

/// Accept `max_size: 500` as well as `max_size: "500"`
fn size_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Bytes(u64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Bytes(bytes) => bytes.to_string(),
    }))
}

impl Settings {
    /// Load settings from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        // An empty document deserializes to unit, not a map
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(content).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Threshold from the first available source: `cli`, this file, compiled default
    pub fn resolve_threshold(&self, cli: Option<&str>) -> Result<SizeThreshold> {
        let raw = cli
            .or(self.max_size.as_deref())
            .unwrap_or(compiled::DEFAULT_MAX_SIZE);
        SizeThreshold::parse(raw)
    }

    /// Interpreter from this file, else the compiled default
    pub fn interpreter(&self) -> &str {
        self.interpreter
            .as_deref()
            .unwrap_or(compiled::SCRIPT_INTERPRETER)
    }

    /// The `#!` line written at the top of script output
    pub fn shebang(&self) -> String {
        format!("#!{}", self.interpreter())
    }
}
