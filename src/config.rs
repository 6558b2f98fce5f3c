//! Configuration file parsing for mutation testing

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::codegen::is_checksum;
use crate::error::MutestingError;

/// Config file picked up from the working directory when none is given
pub const DEFAULT_CONFIG: &str = "mutesting.yaml";

/// Top-level configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub mutators: MutatorSettings,
}

/// Global settings for mutation testing
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Timeout in seconds for each verification run
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Custom verification command, replacing the built-in `cargo test`
    #[serde(default)]
    pub exec: Option<String>,
    /// Test the owning package's whole workspace
    #[serde(default)]
    pub test_recursive: bool,
    /// Keep the temporary directory holding all mutants
    #[serde(default)]
    pub keep_mutants: bool,
    /// Files listing checksums of mutants to ignore
    #[serde(default)]
    pub blacklist: Vec<PathBuf>,
    /// Only mutate functions whose name matches this regex
    #[serde(default, rename = "match")]
    pub function_match: Option<String>,
    /// Also mutate test functions and `#[cfg(test)]` modules
    #[serde(default)]
    pub include_tests: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            exec: None,
            test_recursive: false,
            keep_mutants: false,
            blacklist: Vec::new(),
            function_match: None,
            include_tests: false,
        }
    }
}

fn default_timeout() -> u64 {
    10
}

/// Which mutators run and how they are tuned
#[derive(Debug, Default, Deserialize)]
pub struct MutatorSettings {
    /// Names or `prefix*` patterns to enable; empty enables all
    #[serde(default)]
    pub enable: Vec<String>,
    /// Names or `prefix*` patterns to disable
    #[serde(default)]
    pub disable: Vec<String>,
    #[serde(default)]
    pub guard: GuardPattern,
    /// Additional identifier substitution mutators
    #[serde(default)]
    pub substitutions: Vec<SubstitutionConfig>,
}

/// Recognizes conditionals that only propagate an error
///
/// The branch mutators leave an `if` alone when its body has at most
/// `max_statements` statements and its condition, rendered without
/// whitespace, contains `error_marker` (case-insensitive) and one of the
/// `check_markers`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GuardPattern {
    pub enabled: bool,
    pub error_marker: String,
    pub check_markers: Vec<String>,
    pub max_statements: usize,
}

impl Default for GuardPattern {
    fn default() -> Self {
        Self {
            enabled: true,
            error_marker: "err".to_string(),
            check_markers: vec![
                "is_err()".to_string(),
                "is_some()".to_string(),
                "!=None".to_string(),
                "letErr(".to_string(),
                "letSome(".to_string(),
            ],
            max_statements: 1,
        }
    }
}

impl GuardPattern {
    /// Whether a condition with `statements` statements in its body is an error guard
    pub fn matches(&self, condition: &str, statements: usize) -> bool {
        self.enabled
            && statements <= self.max_statements
            && condition
                .to_lowercase()
                .contains(&self.error_marker.to_lowercase())
            && self.check_markers.iter().any(|m| condition.contains(m.as_str()))
    }
}

/// A table-driven mutator declared in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct SubstitutionConfig {
    /// Registered mutator name, e.g. `domain/getters`
    pub name: String,
    /// Method or function name replacements
    pub pairs: BTreeMap<String, String>,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, MutestingError> {
        let content = std::fs::read_to_string(path).map_err(|e| MutestingError::ConfigError {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| MutestingError::ConfigError {
                message: format!("Failed to parse config file '{}': {}", path.display(), e),
            })?;

        Ok(config)
    }

    /// Load the given file, or `mutesting.yaml` if present, or the defaults
    pub fn discover(path: Option<&Path>) -> Result<Self, MutestingError> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG).is_file() => Self::load(Path::new(DEFAULT_CONFIG)),
            None => Ok(Self::default()),
        }
    }
}

/// Read checksum blacklists, one checksum per line
pub fn load_blacklist(files: &[PathBuf]) -> Result<HashSet<String>, MutestingError> {
    let mut checksums = HashSet::new();

    for file in files {
        let content = std::fs::read_to_string(file).map_err(|e| MutestingError::FileReadError {
            file: file.clone(),
            error: e.to_string(),
        })?;

        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if !is_checksum(line) {
                return Err(MutestingError::InvalidChecksum {
                    file: file.clone(),
                    entry: line.to_string(),
                });
            }
            checksums.insert(line.to_lowercase());
        }
    }

    Ok(checksums)
}
