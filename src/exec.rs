//! Verification of mutants
//!
//! A [`Verifier`] decides, for one mutant, whether the test suite noticed
//! it. Its exit code follows one convention for both implementations:
//!
//! | code  | meaning                                    |
//! |-------|--------------------------------------------|
//! | 0     | tests passed, the mutant survived          |
//! | 1     | tests failed, the mutant was killed        |
//! | 2     | the mutant did not build or was skipped    |
//! | other | unknown, reported but not counted          |

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use similar::TextDiff;
use subprocess::{ExitStatus, Popen, PopenConfig, Redirection};
use tracing::{debug, warn};

use crate::error::{MutestingError, Result};

pub const EXIT_SURVIVED: i32 = 0;
pub const EXIT_KILLED: i32 = 1;
pub const EXIT_SKIPPED: i32 = 2;

/// Markers cargo prints to stderr when the crate does not build
const BUILD_FAILURE_MARKERS: &[&str] = &["error[E", "could not compile", "aborting due to"];

/// Files involved in verifying one mutant
#[derive(Debug, Clone, Copy)]
pub struct Verification<'a> {
    /// The file in the project that was mutated
    pub original: &'a Path,
    /// The mutant
    pub mutant: &'a Path,
    /// Directory of the package owning `original`
    pub package: &'a Path,
}

/// Settings shared by the verifiers
#[derive(Debug, Clone)]
pub struct ExecOptions {
    pub timeout: Duration,
    pub recursive: bool,
    pub verbose: bool,
    pub debug: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            recursive: false,
            verbose: false,
            debug: false,
        }
    }
}

/// Runs the tests against a mutant and reports an exit code
pub trait Verifier {
    /// Errors are reserved for failures to run the verification at all
    fn verify(&self, verification: &Verification<'_>) -> Result<i32>;
}

/// Swaps the mutant into the project and runs `cargo test` on its package
pub struct BuiltinVerifier {
    options: ExecOptions,
}

impl BuiltinVerifier {
    pub fn new(options: ExecOptions) -> Self {
        Self { options }
    }

    fn command(&self) -> Vec<String> {
        let mut command = vec!["cargo".to_string(), "test".to_string()];
        if self.options.recursive {
            command.push("--workspace".to_string());
        }
        if !self.options.verbose {
            command.push("--quiet".to_string());
        }
        command
    }
}

impl Verifier for BuiltinVerifier {
    fn verify(&self, verification: &Verification<'_>) -> Result<i32> {
        let _swap = SwapGuard::new(verification.original, verification.mutant)?;

        let command = self.command();
        debug!(
            "running {:?} in {}",
            command.join(" "),
            verification.package.display()
        );
        let mut process = Popen::create(
            command.as_slice(),
            PopenConfig {
                stdout: Redirection::Pipe,
                stderr: Redirection::Pipe,
                cwd: Some(verification.package.as_os_str().to_owned()),
                ..Default::default()
            },
        )
        .map_err(|e| exec_error(&command, e))?;

        let (stdout, stderr) = match process
            .communicate_start(None)
            .limit_time(self.options.timeout)
            .read_string()
        {
            Ok((stdout, stderr)) => (stdout.unwrap_or_default(), stderr.unwrap_or_default()),
            Err(e) if e.error.kind() == std::io::ErrorKind::TimedOut => {
                terminate(&mut process);
                debug!("tests timed out after {:?}", self.options.timeout);
                return Ok(EXIT_KILLED);
            }
            Err(e) => {
                warn!("reading test output failed: {}", e.error);
                let (stdout, stderr) = e.capture;
                (lossy(stdout), lossy(stderr))
            }
        };

        let status = process.wait().map_err(|e| exec_error(&command, e))?;

        if self.options.verbose {
            print!("{}", stdout);
            eprint!("{}", stderr);
        }

        Ok(classify_cargo(status, &stderr))
    }
}

/// Map a `cargo test` outcome onto the exit code convention
fn classify_cargo(status: ExitStatus, stderr: &str) -> i32 {
    if status.success() {
        EXIT_SURVIVED
    } else if BUILD_FAILURE_MARKERS.iter().any(|m| stderr.contains(m)) {
        EXIT_SKIPPED
    } else {
        EXIT_KILLED
    }
}

/// Runs a user supplied command that does its own swapping and testing
pub struct CommandVerifier {
    command: Vec<String>,
    options: ExecOptions,
}

impl CommandVerifier {
    /// `command_line` is split on whitespace; quoting is not supported
    pub fn new(command_line: &str, options: ExecOptions) -> Result<Self> {
        let command: Vec<String> = command_line.split_whitespace().map(String::from).collect();
        if command.is_empty() {
            return Err(MutestingError::ConfigError {
                message: "exec command is empty".to_string(),
            });
        }
        Ok(Self { command, options })
    }

    fn environment(&self, verification: &Verification<'_>) -> Vec<(OsString, OsString)> {
        let flag = |on: bool| OsString::from(if on { "true" } else { "false" });
        let mut extra: Vec<(OsString, OsString)> = vec![
            ("MUTATE_CHANGED".into(), verification.mutant.as_os_str().to_owned()),
            ("MUTATE_ORIGINAL".into(), verification.original.as_os_str().to_owned()),
            ("MUTATE_PACKAGE".into(), verification.package.as_os_str().to_owned()),
            ("MUTATE_DEBUG".into(), flag(self.options.debug)),
            ("MUTATE_VERBOSE".into(), flag(self.options.verbose)),
            (
                "MUTATE_TIMEOUT".into(),
                self.options.timeout.as_secs().to_string().into(),
            ),
        ];
        if self.options.recursive {
            extra.push(("TEST_RECURSIVE".into(), "true".into()));
        }

        let mut env = PopenConfig::current_env();
        env.retain(|(key, _)| !extra.iter().any(|(name, _)| name == key));
        env.extend(extra);
        env
    }
}

impl Verifier for CommandVerifier {
    fn verify(&self, verification: &Verification<'_>) -> Result<i32> {
        debug!("executing {:?}", self.command.join(" "));
        let mut process = Popen::create(
            self.command.as_slice(),
            PopenConfig {
                env: Some(self.environment(verification)),
                ..Default::default()
            },
        )
        .map_err(|e| exec_error(&self.command, e))?;

        let status = process
            .wait_timeout(self.options.timeout)
            .map_err(|e| exec_error(&self.command, e))?;

        match status {
            Some(ExitStatus::Exited(code)) => Ok(i32::try_from(code).unwrap_or(-1)),
            Some(other) => {
                warn!("{:?} ended abnormally: {:?}", self.command.join(" "), other);
                Ok(-1)
            }
            None => {
                terminate(&mut process);
                debug!("command timed out after {:?}", self.options.timeout);
                Ok(EXIT_KILLED)
            }
        }
    }
}

fn terminate(process: &mut Popen) {
    if let Err(e) = process.kill() {
        warn!("failed to kill timed out process: {}", e);
    }
    // reap
    let _ = process.wait();
}

fn lossy(bytes: Option<Vec<u8>>) -> String {
    bytes
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .unwrap_or_default()
}

fn exec_error(command: &[String], error: impl std::fmt::Display) -> MutestingError {
    MutestingError::Exec {
        command: command.join(" "),
        error: error.to_string(),
    }
}

/// Keeps a mutant in place of the original file while alive
///
/// The original is copied aside and the mutant is renamed over it. On drop,
/// the copy is renamed back and its modification time is bumped so that
/// cargo does not reuse the build of the mutant.
pub struct SwapGuard {
    original: PathBuf,
    backup: PathBuf,
}

impl SwapGuard {
    pub fn new(original: &Path, mutant: &Path) -> Result<Self> {
        let backup = sibling(original, "mutesting-backup");
        let staging = sibling(original, "mutesting-staging");
        let swap_error = |e: std::io::Error| MutestingError::SwapError {
            file: original.to_path_buf(),
            error: e.to_string(),
        };

        fs::copy(original, &backup).map_err(swap_error)?;
        let guard = Self {
            original: original.to_path_buf(),
            backup,
        };
        fs::copy(mutant, &staging).map_err(swap_error)?;
        fs::rename(&staging, original).map_err(swap_error)?;
        Ok(guard)
    }

    fn restore(&self) -> std::io::Result<()> {
        fs::rename(&self.backup, &self.original)?;
        fs::File::options()
            .write(true)
            .open(&self.original)?
            .set_modified(SystemTime::now())
    }
}

impl Drop for SwapGuard {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!(
                "could not restore {} from {}: {}",
                self.original.display(),
                self.backup.display(),
                e
            );
        }
    }
}

/// `dir/.name.suffix` next to `file`
fn sibling(file: &Path, suffix: &str) -> PathBuf {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    file.with_file_name(format!(".{}.{}", name, suffix))
}

/// Directory of the package owning `file`: the nearest ancestor holding a
/// `Cargo.toml`, or the file's own directory
pub fn find_package(file: &Path) -> PathBuf {
    let file = fs::canonicalize(file).unwrap_or_else(|_| file.to_path_buf());
    let dir = match file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    dir.ancestors()
        .find(|d| d.join("Cargo.toml").is_file())
        .map(Path::to_path_buf)
        .unwrap_or(dir)
}

/// Unified diff between two versions of a file
pub fn unified_diff(original: &str, mutant: &str, original_name: &str, mutant_name: &str) -> String {
    TextDiff::from_lines(original, mutant)
        .unified_diff()
        .context_radius(3)
        .header(original_name, mutant_name)
        .to_string()
}
