//! Report generation for mutation testing results
//!
//! This module classifies verification outcomes, keeps the run's counters
//! and formats what the user sees.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use colored::{ColoredString, Colorize};

use crate::exec::{EXIT_KILLED, EXIT_SKIPPED, EXIT_SURVIVED};

/// What happened to one generated mutant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The tests noticed the mutant (good!)
    Passed,
    /// The mutant survived the tests (bad!)
    Failed,
    /// The mutant did not build or was opted out
    Skipped,
    /// The verification exited with an undefined code
    Unknown(i32),
    /// Identical to an earlier mutant or blacklisted; not executed
    Duplicate,
    /// Written out without execution
    Generated,
}

impl Outcome {
    /// Classify a verification exit code
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            EXIT_SURVIVED => Outcome::Failed,
            EXIT_KILLED => Outcome::Passed,
            EXIT_SKIPPED => Outcome::Skipped,
            other => Outcome::Unknown(other),
        }
    }

    fn label(&self) -> ColoredString {
        match self {
            Outcome::Passed => "PASS".green().bold(),
            Outcome::Failed => "FAIL".red().bold(),
            Outcome::Skipped => "SKIP".yellow().bold(),
            Outcome::Unknown(_) => "UNKNOWN".yellow().bold(),
            Outcome::Duplicate => "DUPLICATE".dimmed(),
            Outcome::Generated => "SAVED".dimmed(),
        }
    }
}

/// Everything known about one generated mutant
#[derive(Debug, Clone)]
pub struct MutantRecord {
    /// Target file the mutant was derived from
    pub file: PathBuf,
    /// Sequence number within the file
    pub id: usize,
    pub mutator: String,
    pub line: usize,
    pub description: String,
    pub checksum: String,
    /// Where the mutant text was saved
    pub path: PathBuf,
    pub outcome: Outcome,
}

impl MutantRecord {
    /// Per-mutant result line, e.g. `PASS "tmp/src/lib.rs.3" with checksum ...`
    pub fn status_line(&self) -> String {
        let message = format!("{:?} with checksum {}", self.path.display().to_string(), self.checksum);
        match self.outcome {
            Outcome::Unknown(code) => {
                format!("{} exit code {} for {}", self.outcome.label(), code, message)
            }
            _ => format!("{} {}", self.outcome.label(), message),
        }
    }

    /// `file:line`
    pub fn location(&self) -> String {
        format!("{}:{}", self.file.display(), self.line)
    }
}

/// Counters of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationStats {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duplicated: usize,
}

impl MutationStats {
    /// Count an outcome; unknown and unexecuted outcomes are not counted
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Passed => self.passed += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Duplicate => self.duplicated += 1,
            Outcome::Unknown(_) | Outcome::Generated => {}
        }
    }

    /// `passed / (passed + failed + skipped)`, or 0 when nothing was executed
    pub fn score(&self) -> f64 {
        let executed = self.passed + self.failed + self.skipped;
        if executed == 0 {
            return 0.0;
        }
        self.passed as f64 / executed as f64
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.duplicated
    }

    pub fn summary_line(&self) -> String {
        format!(
            "The mutation score is {:.6} ({} passed, {} failed, {} duplicated, {} skipped, total is {})",
            self.score(),
            self.passed,
            self.failed,
            self.duplicated,
            self.skipped,
            self.total()
        )
    }
}

impl fmt::Display for MutationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary_line())
    }
}

/// Message printed instead of a score when nothing was executed
pub const NO_EXEC_SUMMARY: &str =
    "Cannot do a mutation testing summary since no exec command was executed.";

/// Summary report of mutation testing
#[derive(Debug)]
pub struct MutationReport {
    pub records: Vec<MutantRecord>,
    pub stats: MutationStats,
    /// Whether mutants were verified at all
    pub executed: bool,
    pub duration: Duration,
    /// Directory holding the mutants, when kept after the run
    pub mutants_dir: Option<PathBuf>,
}

impl MutationReport {
    /// Mutants the tests did not notice
    pub fn survivors(&self) -> Vec<&MutantRecord> {
        self.records
            .iter()
            .filter(|r| r.outcome == Outcome::Failed)
            .collect()
    }

    /// Mutants whose verification ended with an undefined exit code
    pub fn unknown(&self) -> Vec<&MutantRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Unknown(_)))
            .collect()
    }

    /// The final summary line
    pub fn summary(&self) -> String {
        if self.executed {
            self.stats.summary_line()
        } else {
            NO_EXEC_SUMMARY.to_string()
        }
    }

    /// Print the report to stdout
    pub fn print(&self) {
        if self.executed {
            let survivors = self.survivors();
            if !survivors.is_empty() {
                println!();
                println!("{}", "Surviving mutants (improve your tests!)".red().bold());
                println!("{}", "-".repeat(40));
                for record in survivors {
                    println!(
                        "  {} {} {}",
                        record.location(),
                        record.mutator.yellow(),
                        record.description
                    );
                }
            }

            let unknown = self.unknown();
            if !unknown.is_empty() {
                println!();
                println!("{}", "Mutants with unknown exit codes".yellow().bold());
                for record in unknown {
                    println!("  {} {}", record.location(), record.path.display());
                }
            }
        } else {
            println!(
                "{} mutants saved in {:.2}s",
                self.records.len(),
                self.duration.as_secs_f64()
            );
        }

        if let Some(dir) = &self.mutants_dir {
            println!("Mutants kept in {}", dir.display().to_string().dimmed());
        }

        println!();
        println!("{}", self.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(outcome: Outcome) -> MutantRecord {
        MutantRecord {
            file: PathBuf::from("src/lib.rs"),
            id: 3,
            mutator: "branch/if".to_string(),
            line: 12,
            description: "emptied if body".to_string(),
            checksum: "0123456789abcdef0123456789abcdef".to_string(),
            path: PathBuf::from("/tmp/run/src/lib.rs.3"),
            outcome,
        }
    }

    #[test]
    fn test_exit_code_convention() {
        assert_eq!(Outcome::from_exit_code(0), Outcome::Failed);
        assert_eq!(Outcome::from_exit_code(1), Outcome::Passed);
        assert_eq!(Outcome::from_exit_code(2), Outcome::Skipped);
        assert_eq!(Outcome::from_exit_code(7), Outcome::Unknown(7));
    }

    #[test]
    fn test_score_excludes_duplicates() {
        let mut stats = MutationStats::default();
        for outcome in [
            Outcome::Passed,
            Outcome::Passed,
            Outcome::Passed,
            Outcome::Failed,
            Outcome::Duplicate,
            Outcome::Duplicate,
            Outcome::Unknown(9),
        ] {
            stats.record(outcome);
        }
        assert_eq!(stats.score(), 0.75);
        assert_eq!(stats.total(), 6);
        assert_eq!(
            stats.summary_line(),
            "The mutation score is 0.750000 (3 passed, 1 failed, 2 duplicated, 0 skipped, total is 6)"
        );
    }

    #[test]
    fn test_empty_score_is_zero() {
        let mut stats = MutationStats::default();
        stats.record(Outcome::Duplicate);
        assert_eq!(stats.score(), 0.0);
    }

    #[test]
    fn test_status_line() {
        colored::control::set_override(false);
        assert_eq!(
            record(Outcome::Passed).status_line(),
            "PASS \"/tmp/run/src/lib.rs.3\" with checksum 0123456789abcdef0123456789abcdef"
        );
        assert!(record(Outcome::Unknown(5))
            .status_line()
            .starts_with("UNKNOWN exit code 5 for"));
    }

    #[test]
    fn test_summary_without_execution() {
        let report = MutationReport {
            records: vec![record(Outcome::Generated)],
            stats: MutationStats::default(),
            executed: false,
            duration: Duration::from_secs(1),
            mutants_dir: None,
        };
        assert_eq!(report.summary(), NO_EXEC_SUMMARY);
        assert!(report.survivors().is_empty());
    }
}
