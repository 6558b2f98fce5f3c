//! Mutation testing orchestration
//!
//! This module coordinates the mutation testing process:
//! - Drives every enabled mutator over every file
//! - Drops mutants that were seen before or are blacklisted
//! - Saves and verifies the rest
//! - Collects results

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::codegen::{checksum, generate_source, parse_file};
use crate::config::GuardPattern;
use crate::error::{MutestingError, Result};
use crate::exec::{
    find_package, unified_diff, BuiltinVerifier, CommandVerifier, ExecOptions, Verification,
    Verifier,
};
use crate::files::{mirror, with_suffix};
use crate::mutator::{Context, Mutation, Registry};
use crate::report::{MutantRecord, MutationReport, MutationStats, Outcome};
use crate::types::DeclaredTypes;
use crate::walk::{Driver, Scope, Signal};

/// How mutants are verified
#[derive(Debug, Clone, Default)]
pub enum ExecMode {
    /// Only generate and save mutants
    #[default]
    Skip,
    /// Swap each mutant in and run `cargo test`
    Builtin,
    /// Run this command line for each mutant
    Command(String),
}

/// Everything a run needs besides the registry and the files
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Mutator names, in the order they are applied to each file
    pub mutators: Vec<String>,
    pub scope: Scope,
    pub guard: GuardPattern,
    /// Checksums of mutants that are never executed
    pub blacklist: HashSet<String>,
    pub exec: ExecMode,
    pub exec_options: ExecOptions,
    pub keep_mutants: bool,
    /// Print diffs of every executed mutant, not just survivors
    pub debug: bool,
}

/// Mutable state shared across all files of one run
#[derive(Default)]
struct RunState {
    seen: HashSet<String>,
    stats: MutationStats,
    records: Vec<MutantRecord>,
}

/// One target file while it is being mutated
struct Target<'a> {
    file: &'a Path,
    /// Formatted source before any mutation
    source: String,
    checksum: String,
    /// Mirror of `file` inside the mutant directory
    base: PathBuf,
    pristine: PathBuf,
    package: PathBuf,
}

/// Drives mutators over files and verifies the mutants
pub struct Runner<'a> {
    registry: &'a Registry,
    options: RunOptions,
    verifier: Option<Box<dyn Verifier>>,
}

impl<'a> Runner<'a> {
    pub fn new(registry: &'a Registry, options: RunOptions) -> Result<Self> {
        let verifier: Option<Box<dyn Verifier>> = match &options.exec {
            ExecMode::Skip => None,
            ExecMode::Builtin => Some(Box::new(BuiltinVerifier::new(
                options.exec_options.clone(),
            ))),
            ExecMode::Command(line) => Some(Box::new(CommandVerifier::new(
                line,
                options.exec_options.clone(),
            )?)),
        };
        for name in &options.mutators {
            if !registry.contains(name) {
                return Err(MutestingError::UnknownMutator { name: name.clone() });
            }
            info!("Enable mutator {:?}", name);
        }
        Ok(Self {
            registry,
            options,
            verifier,
        })
    }

    /// Mutate all `files` and verify the mutants
    ///
    /// A file that cannot be read, parsed or written is reported and
    /// skipped. Failing to run the verification at all, or a tree that is
    /// not restored after a mutation, aborts the run.
    pub fn run(&self, files: &[PathBuf]) -> Result<MutationReport> {
        let start = Instant::now();
        let tmp = tempfile::Builder::new()
            .prefix("mutesting-")
            .tempdir()
            .map_err(|e| MutestingError::WriteError {
                file: std::env::temp_dir(),
                error: e.to_string(),
            })?;
        info!("Save mutations into {:?}", tmp.path());

        let mut state = RunState::default();
        for file in files {
            match self.mutate_file(file, tmp.path(), &mut state) {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("{}", e),
            }
        }

        let mutants_dir = if self.options.keep_mutants {
            Some(tmp.keep())
        } else {
            debug!("Remove {:?}", tmp.path());
            None
        };

        Ok(MutationReport {
            records: state.records,
            stats: state.stats,
            executed: self.verifier.is_some(),
            duration: start.elapsed(),
            mutants_dir,
        })
    }

    fn mutate_file(&self, file: &Path, tmp: &Path, state: &mut RunState) -> Result<()> {
        info!("Mutate {:?}", file);
        let (_, mut tree) = parse_file(file)?;
        let types = DeclaredTypes::collect(&tree);

        let source = generate_source(&tree);
        let base = mirror(tmp, file);
        let target = Target {
            file,
            checksum: checksum(&source),
            pristine: with_suffix(&base, "original"),
            package: find_package(file),
            source,
            base,
        };
        if let Some(dir) = target.base.parent() {
            fs::create_dir_all(dir).map_err(|e| write_error(dir, e))?;
        }
        fs::write(&target.pristine, &target.source)
            .map_err(|e| write_error(&target.pristine, e))?;
        debug!("Save original into {:?}", target.pristine);

        // a mutation that prints like the original is a duplicate
        state.seen.insert(target.checksum.clone());

        let mut id = 0;
        for name in &self.options.mutators {
            debug!("Mutator {}", name);
            let mutator = self.registry.create(name)?;
            let ctx = Context::new(Some(&types), &self.options.guard);
            let mut driver = Driver::new(&mut tree, mutator.as_ref(), &ctx, &self.options.scope);

            while let Some(signal) = driver.resume() {
                match signal {
                    Signal::Applied => {
                        let mutant = generate_source(driver.tree());
                        if let Some(mutation) = driver.mutation() {
                            self.observe(&target, id, name, mutation, &mutant, state)?;
                        }
                        id += 1;
                    }
                    Signal::Reverted => {
                        if checksum(&generate_source(driver.tree())) != target.checksum {
                            return Err(MutestingError::RevertMismatch {
                                file: file.to_path_buf(),
                                mutation: id.saturating_sub(1),
                            });
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Deduplicate, save, verify and record one mutant
    fn observe(
        &self,
        target: &Target<'_>,
        id: usize,
        mutator: &str,
        mutation: &Mutation,
        mutant: &str,
        state: &mut RunState,
    ) -> Result<()> {
        let path = with_suffix(&target.base, id);
        let sum = checksum(mutant);

        let outcome = if self.options.blacklist.contains(&sum) || state.seen.contains(&sum) {
            debug!("{:?} is a duplicate, we ignore it", path);
            Outcome::Duplicate
        } else {
            state.seen.insert(sum.clone());
            fs::write(&path, mutant).map_err(|e| write_error(&path, e))?;
            debug!("Save mutation into {:?} with checksum {}", path, sum);

            match &self.verifier {
                None => Outcome::Generated,
                Some(verifier) => {
                    let code = verifier.verify(&Verification {
                        original: target.file,
                        mutant: &path,
                        package: &target.package,
                    })?;
                    debug!("Exited with {}", code);
                    Outcome::from_exit_code(code)
                }
            }
        };
        state.stats.record(outcome);

        let record = MutantRecord {
            file: target.file.to_path_buf(),
            id,
            mutator: mutator.to_string(),
            line: mutation.line(),
            description: mutation.description().to_string(),
            checksum: sum,
            path,
            outcome,
        };

        let executed = !matches!(outcome, Outcome::Duplicate | Outcome::Generated);
        if executed {
            println!("{}", record.status_line());
            if outcome == Outcome::Failed || self.options.debug {
                println!(
                    "{}",
                    unified_diff(
                        &target.source,
                        mutant,
                        &target.pristine.display().to_string(),
                        &record.path.display().to_string(),
                    )
                );
            }
        }

        state.records.push(record);
        Ok(())
    }
}

fn write_error(file: &Path, error: std::io::Error) -> MutestingError {
    MutestingError::WriteError {
        file: file.to_path_buf(),
        error: error.to_string(),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const THREE_COMPARISONS: &str = r#"
fn accept(a: i32, b: i32) -> bool {
    a < b && b > 0 || a >= 5
}
"#;

    fn write_target(dir: &Path, name: &str, source: &str) -> PathBuf {
        let file = dir.join(name);
        fs::write(&file, source).unwrap();
        file
    }

    fn options(mutators: &[&str], exec: ExecMode) -> RunOptions {
        RunOptions {
            mutators: mutators.iter().map(|m| m.to_string()).collect(),
            exec,
            ..RunOptions::default()
        }
    }

    #[test]
    fn test_all_killed_scores_one() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_target(dir.path(), "accept.rs", THREE_COMPARISONS);
        let registry = Registry::with_builtins();
        let runner = Runner::new(
            &registry,
            options(&["expression/comparison"], ExecMode::Command("false".to_string())),
        )
        .unwrap();

        let report = runner.run(&[file.clone()]).unwrap();
        assert_eq!(
            report.stats,
            MutationStats {
                passed: 3,
                failed: 0,
                skipped: 0,
                duplicated: 0
            }
        );
        assert_eq!(report.stats.score(), 1.0);
        assert!(report.survivors().is_empty());
        // the target is untouched
        assert_eq!(fs::read_to_string(&file).unwrap(), THREE_COMPARISONS);
    }

    #[test]
    fn test_survivors_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_target(dir.path(), "accept.rs", THREE_COMPARISONS);
        let registry = Registry::with_builtins();
        let runner = Runner::new(
            &registry,
            options(&["expression/comparison"], ExecMode::Command("true".to_string())),
        )
        .unwrap();

        let report = runner.run(&[file]).unwrap();
        assert_eq!(report.stats.failed, 3);
        assert_eq!(report.stats.score(), 0.0);
        let survivors = report.survivors();
        assert_eq!(survivors.len(), 3);
        assert_eq!(survivors[0].line, 3);
        assert_eq!(survivors[0].mutator, "expression/comparison");
        assert_eq!(
            survivors.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_identical_mutants_are_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_target(
            dir.path(),
            "notify.rs",
            "fn run(flag: bool) {\n    if flag {\n        notify();\n    }\n}\n",
        );
        let registry = Registry::with_builtins();
        let runner = Runner::new(
            &registry,
            options(
                &["branch/if", "statement/remove"],
                ExecMode::Command("false".to_string()),
            ),
        )
        .unwrap();

        let report = runner.run(&[file]).unwrap();
        assert_eq!(report.stats.passed, 1);
        assert_eq!(report.stats.duplicated, 1);
        assert_eq!(report.records[1].outcome, Outcome::Duplicate);
        assert_eq!(report.records[0].checksum, report.records[1].checksum);
    }

    #[test]
    fn test_blacklisted_mutants_are_not_executed() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_target(dir.path(), "accept.rs", THREE_COMPARISONS);
        let registry = Registry::with_builtins();

        let dry = Runner::new(&registry, options(&["expression/comparison"], ExecMode::Skip))
            .unwrap()
            .run(&[file.clone()])
            .unwrap();
        assert!(!dry.executed);
        assert!(dry.records.iter().all(|r| r.outcome == Outcome::Generated));

        let mut blacklisted = options(
            &["expression/comparison"],
            ExecMode::Command("false".to_string()),
        );
        blacklisted.blacklist.insert(dry.records[1].checksum.clone());
        let report = Runner::new(&registry, blacklisted)
            .unwrap()
            .run(&[file])
            .unwrap();
        assert_eq!(report.stats.passed, 2);
        assert_eq!(report.stats.duplicated, 1);
        assert_eq!(report.records[1].outcome, Outcome::Duplicate);
    }

    #[test]
    fn test_kept_mutants_mirror_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_target(dir.path(), "accept.rs", THREE_COMPARISONS);
        let registry = Registry::with_builtins();
        let mut kept = options(&["expression/comparison"], ExecMode::Skip);
        kept.keep_mutants = true;

        let report = Runner::new(&registry, kept).unwrap().run(&[file.clone()]).unwrap();
        let mutants_dir = report.mutants_dir.clone().unwrap();
        let base = mirror(&mutants_dir, &file);

        let first = fs::read_to_string(with_suffix(&base, 0)).unwrap();
        assert!(first.contains("a <= b && b > 0"));
        assert!(with_suffix(&base, "original").is_file());
        assert_eq!(report.summary(), crate::report::NO_EXEC_SUMMARY);

        fs::remove_dir_all(mutants_dir).unwrap();
    }

    #[test]
    fn test_repeated_runs_number_mutants_identically() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_target(
            dir.path(),
            "settle.rs",
            r#"
fn settle(a: i32, b: i32, log: &mut Vec<i32>) -> bool {
    if a < b {
        log.push(a);
    } else {
        log.push(b);
    }
    match a {
        0 => {
            log.clear();
        }
        _ => {}
    }
    a >= 0 && b <= 10
}
"#,
        );
        let registry = Registry::with_builtins();
        let names = registry.list();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let run = || {
            Runner::new(&registry, options(&names, ExecMode::Skip))
                .unwrap()
                .run(&[file.clone()])
                .unwrap()
                .records
                .into_iter()
                .map(|r| (r.id, r.mutator, r.line, r.checksum))
                .collect::<Vec<_>>()
        };

        let first = run();
        assert!(first.len() > 5);
        assert_eq!(first, run());
    }

    #[test]
    fn test_broken_file_does_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let broken = write_target(dir.path(), "broken.rs", "fn broken( {");
        let good = write_target(dir.path(), "accept.rs", THREE_COMPARISONS);
        let registry = Registry::with_builtins();
        let runner = Runner::new(
            &registry,
            options(&["expression/comparison"], ExecMode::Command("false".to_string())),
        )
        .unwrap();

        let report = runner.run(&[broken, good]).unwrap();
        assert_eq!(report.stats.passed, 3);
    }

    #[test]
    fn test_missing_command_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_target(dir.path(), "accept.rs", THREE_COMPARISONS);
        let registry = Registry::with_builtins();
        let runner = Runner::new(
            &registry,
            options(
                &["expression/comparison"],
                ExecMode::Command("/nonexistent/verify-mutant".to_string()),
            ),
        )
        .unwrap();

        let err = runner.run(&[file]).unwrap_err();
        assert!(matches!(err, MutestingError::Exec { .. }));
    }

    #[test]
    fn test_unknown_mutator_is_rejected() {
        let registry = Registry::with_builtins();
        let result = Runner::new(&registry, options(&["branch/nope"], ExecMode::Skip));
        assert!(matches!(result, Err(MutestingError::UnknownMutator { .. })));
    }
}
