//! CLI for mutation testing

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context as _};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use regex::Regex;
use tracing_subscriber::EnvFilter;

use mutesting::config::{load_blacklist, Config};
use mutesting::exec::ExecOptions;
use mutesting::files::discover;
use mutesting::mutator::substitution::register_table;
use mutesting::runner::ExecMode;
use mutesting::{Registry, RunOptions, Runner, Scope};

#[derive(Parser)]
#[command(name = "mutesting")]
#[command(author, version, about = "Mutation testing for Rust source code", long_about = None)]
struct Cli {
    /// Configuration file (defaults to mutesting.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug log output, including diffs of every executed mutant
    #[arg(long, global = true)]
    debug: bool,

    /// Verbose log output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mutate the targets and verify every mutant
    Run(RunArgs),

    /// List all available mutators
    ListMutators,

    /// List the files that would be mutated
    ListFiles {
        /// Files or directories (defaults to the current directory)
        targets: Vec<PathBuf>,
    },

    /// Print the syntax tree of each file
    PrintAst {
        /// Files or directories (defaults to the current directory)
        targets: Vec<PathBuf>,
    },

    /// Show example configuration
    Example,
}

#[derive(Args)]
struct RunArgs {
    /// Files or directories (defaults to the current directory)
    targets: Vec<PathBuf>,

    /// Keep the temporary directory holding all mutants
    #[arg(long)]
    keep_mutants: bool,

    /// File of mutant checksums to ignore (repeatable)
    #[arg(long, value_name = "FILE")]
    blacklist: Vec<PathBuf>,

    /// Only use mutators matching this name or `prefix*` pattern (repeatable)
    #[arg(long, value_name = "PAT")]
    enable: Vec<String>,

    /// Do not use mutators matching this name or `prefix*` pattern (repeatable)
    #[arg(long, value_name = "PAT")]
    disable: Vec<String>,

    /// Only mutate functions whose name matches this regex
    #[arg(long = "match", value_name = "REGEX")]
    function_match: Option<String>,

    /// Also mutate test functions and `#[cfg(test)]` modules
    #[arg(long)]
    include_tests: bool,

    /// Command verifying each mutant instead of `cargo test`
    #[arg(long, value_name = "CMD")]
    exec: Option<String>,

    /// Only generate mutants, do not verify them
    #[arg(long, conflicts_with = "exec")]
    no_exec: bool,

    /// Timeout in seconds for each verification
    #[arg(long, value_name = "SECS")]
    exec_timeout: Option<u64>,

    /// Test the owning package's whole workspace
    #[arg(long)]
    test_recursive: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug, cli.verbose);

    let result = match &cli.command {
        Commands::Run(args) => run(&cli, args),
        Commands::ListMutators => list_mutators(cli.config.as_deref()),
        Commands::ListFiles { targets } => list_files(targets),
        Commands::PrintAst { targets } => print_ast(targets),
        Commands::Example => {
            print_example();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(debug: bool, verbose: bool) {
    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Built-in mutators plus the substitution tables of the configuration
fn build_registry(config: &Config) -> anyhow::Result<Registry> {
    let mut registry = Registry::with_builtins();
    for table in &config.mutators.substitutions {
        if registry.contains(&table.name) {
            bail!("mutator {:?} from the configuration is already registered", table.name);
        }
        register_table(&mut registry, &table.name, table.pairs.clone());
    }
    Ok(registry)
}

fn run(cli: &Cli, args: &RunArgs) -> anyhow::Result<()> {
    let config = Config::discover(cli.config.as_deref())?;
    let settings = &config.settings;
    let registry = build_registry(&config)?;

    let enable: Vec<String> = config
        .mutators
        .enable
        .iter()
        .chain(&args.enable)
        .cloned()
        .collect();
    let disable: Vec<String> = config
        .mutators
        .disable
        .iter()
        .chain(&args.disable)
        .cloned()
        .collect();
    let mutators = registry.select(&enable, &disable);
    if mutators.is_empty() {
        bail!("no mutators enabled");
    }

    let blacklist_files: Vec<PathBuf> = settings
        .blacklist
        .iter()
        .chain(&args.blacklist)
        .cloned()
        .collect();
    let blacklist = load_blacklist(&blacklist_files).context("failed to load blacklist")?;

    let functions = args
        .function_match
        .as_ref()
        .or(settings.function_match.as_ref())
        .map(|pattern| Regex::new(pattern).with_context(|| format!("invalid match regex {:?}", pattern)))
        .transpose()?;

    let exec = if args.no_exec {
        ExecMode::Skip
    } else {
        match args.exec.as_ref().or(settings.exec.as_ref()) {
            Some(command) => ExecMode::Command(command.clone()),
            None => ExecMode::Builtin,
        }
    };

    let options = RunOptions {
        mutators,
        scope: Scope {
            functions,
            include_tests: args.include_tests || settings.include_tests,
        },
        guard: config.mutators.guard.clone(),
        blacklist,
        exec,
        exec_options: ExecOptions {
            timeout: Duration::from_secs(args.exec_timeout.unwrap_or(settings.timeout)),
            recursive: args.test_recursive || settings.test_recursive,
            verbose: cli.verbose,
            debug: cli.debug,
        },
        keep_mutants: args.keep_mutants || settings.keep_mutants,
        debug: cli.debug,
    };

    let files = discover(&args.targets)?;
    if files.is_empty() {
        bail!("no Rust files found");
    }

    let runner = Runner::new(&registry, options)?;
    let report = runner.run(&files)?;
    report.print();
    Ok(())
}

fn list_mutators(config: Option<&Path>) -> anyhow::Result<()> {
    let config = Config::discover(config)?;
    for name in build_registry(&config)?.list() {
        println!("{}", name);
    }
    Ok(())
}

fn list_files(targets: &[PathBuf]) -> anyhow::Result<()> {
    for file in discover(targets)? {
        println!("{}", file.display());
    }
    Ok(())
}

fn print_ast(targets: &[PathBuf]) -> anyhow::Result<()> {
    for file in discover(targets)? {
        let (_, ast) = mutesting::codegen::parse_file(&file)?;
        println!("{}", file.display().to_string().bold());
        println!("{:#?}", ast);
    }
    Ok(())
}

fn print_example() {
    let example = r#"# Example mutesting.yaml configuration file
settings:
  timeout: 30            # seconds per verification
  # exec: "./scripts/verify-mutant.sh"   # replaces the built-in cargo test
  test_recursive: false
  keep_mutants: false
  blacklist: []          # files with one mutant checksum per line
  # match: "^parse_"     # only mutate matching functions
  include_tests: false

mutators:
  # empty enables every mutator
  enable: []
  disable:
    - "comparison/method"

  # conditionals that only propagate an error are not emptied
  guard:
    enabled: true
    error_marker: "err"
    check_markers: ["is_err()", "is_some()", "!=None", "letErr(", "letSome("]
    max_statements: 1

  # additional method name substitutions
  substitutions:
    - name: pool/getters
      pairs:
        token0: token1
        token1: token0
        reserve0: reserve1
        reserve1: reserve0
"#;

    println!("{}", example);
}
