//! Mutation Testing Framework for Rust
//!
//! This library mutates Rust source files one syntax-tree edit at a time,
//! runs the tests against every unique mutant, and reports which mutants
//! the tests noticed. Mutators are looked up by name in a [`Registry`]:
//! branch elision (`branch/if`, `branch/else`, `branch/case`), operator
//! changes (`expression/comparison`, `expression/remove`), statement
//! removal (`statement/remove`) and table-driven method substitution
//! (`arithmetic/method`, `comparison/method`).
//!
//! # Example Configuration
//!
//! ```yaml
//! settings:
//!   timeout: 30
//!   match: "^parse_"
//!
//! mutators:
//!   disable:
//!     - "branch/*"
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use mutesting::{Registry, RunOptions, Runner};
//! use mutesting::runner::ExecMode;
//! use std::path::PathBuf;
//!
//! let registry = Registry::with_builtins();
//! let options = RunOptions {
//!     mutators: registry.list(),
//!     exec: ExecMode::Builtin,
//!     ..RunOptions::default()
//! };
//! let runner = Runner::new(&registry, options).unwrap();
//! let report = runner.run(&[PathBuf::from("src/lib.rs")]).unwrap();
//! report.print();
//! ```

pub mod codegen;
pub mod config;
pub mod error;
pub mod exec;
pub mod files;
pub mod mutator;
pub mod node;
pub mod noop;
pub mod report;
pub mod runner;
pub mod types;
pub mod walk;

#[cfg(test)]
mod test_util;

// Re-export main types at crate root
pub use config::{Config, GuardPattern, Settings};
pub use error::{MutestingError, Result};
pub use mutator::{Context, Mutation, Mutator, Registry};
pub use report::{MutationReport, MutationStats, Outcome};
pub use runner::{RunOptions, Runner};
pub use walk::{count, Driver, Scope, Signal};
