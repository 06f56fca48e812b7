//! Build automation for the cms-db workspace.
//!
//! Run with `cargo xtask <command>`.
//!
//! - `ci`: formatting, clippy, tests and docs, stopping at the first failure
//! - `test`: tests for the workspace or one package
//! - `stress`: pool invariant property tests with many cases
//! - `bench`: criterion benchmarks
//! - `fuzz`: a cargo-fuzz target (requires cargo-fuzz + nightly)
//! - `semver`: semver checks for the published crates

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use xshell::{Shell, cmd};

const PUBLISHED_CRATES: [&str; 2] = ["cms-pool", "cms-db"];

const FUZZ_TARGETS: [&str; 2] = ["connection_string", "expand_placeholders"];

/// Steps run by `ci`, in order.
const CI_STEPS: [(&str, &[&str]); 4] = [
    ("format", &["fmt", "--all", "--", "--check"]),
    (
        "clippy",
        &["clippy", "--all-features", "--all-targets", "--", "-D", "warnings"],
    ),
    ("tests", &["test", "--all-features"]),
    ("docs", &["doc", "--all-features", "--no-deps"]),
];

#[derive(Parser)]
#[command(name = "xtask", about = "Build automation for cms-db")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run formatting, clippy, tests and docs
    Ci,
    /// Run tests
    Test {
        /// Test a specific package
        #[arg(short, long)]
        package: Option<String>,
    },
    /// Run the pool invariant property tests with many cases
    Stress {
        /// Number of proptest cases per property
        #[arg(long, default_value = "2048")]
        cases: u32,
    },
    /// Run benchmarks
    Bench {
        /// Benchmark filter pattern
        filter: Option<String>,
    },
    /// Run a fuzz target
    Fuzz {
        /// Fuzz target to run
        #[arg(default_value = "connection_string")]
        target: String,
        /// Maximum runtime in seconds
        #[arg(long, default_value = "60")]
        max_time: u64,
    },
    /// Check the published crates for semver violations
    Semver,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;
    sh.change_dir(workspace_root()?);

    match cli.command {
        Command::Ci => {
            for (name, args) in CI_STEPS {
                println!("==> {name}");
                cmd!(sh, "cargo {args...}")
                    .run()
                    .with_context(|| format!("ci step failed: {name}"))?;
            }
            println!("ci passed");
        }
        Command::Test { package } => {
            let package = package.map(|p| vec!["-p".to_string(), p]).unwrap_or_default();
            cmd!(sh, "cargo test --all-features {package...}").run()?;
        }
        Command::Stress { cases } => {
            cmd!(sh, "cargo test -p cms-pool --release --test invariants")
                .env("PROPTEST_CASES", cases.to_string())
                .run()?;
        }
        Command::Bench { filter } => {
            let filter = filter.into_iter().collect::<Vec<_>>();
            cmd!(sh, "cargo bench -- {filter...}").run()?;
        }
        Command::Fuzz { target, max_time } => {
            if !FUZZ_TARGETS.contains(&target.as_str()) {
                bail!(
                    "unknown fuzz target {target}; available: {}",
                    FUZZ_TARGETS.join(", ")
                );
            }
            let max_time = format!("-max_total_time={max_time}");
            sh.change_dir("fuzz");
            cmd!(sh, "cargo +nightly fuzz run {target} -- {max_time}").run()?;
        }
        Command::Semver => {
            for crate_name in PUBLISHED_CRATES {
                cmd!(sh, "cargo semver-checks check-release -p {crate_name}").run()?;
            }
        }
    }

    Ok(())
}

fn workspace_root() -> Result<PathBuf> {
    let output = std::process::Command::new("cargo")
        .args(["locate-project", "--workspace", "--message-format=plain"])
        .output()
        .context("failed to run cargo locate-project")?;

    let manifest = String::from_utf8(output.stdout).context("invalid UTF-8 in cargo output")?;
    PathBuf::from(manifest.trim())
        .parent()
        .map(PathBuf::from)
        .context("failed to get workspace root")
}
