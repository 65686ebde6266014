use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the publish-lambda workspace",
    long_about = "A unified CLI for CI checks and local dry runs of the\n\
                  publish-lambda workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Build the archive for a project and print the sync plan without publishing
    DryRun {
        /// Module whose functions are planned
        #[arg(long)]
        module: String,
        /// Bucket the archive would be uploaded to
        #[arg(long)]
        bucket: String,
        /// Project root
        #[arg(long, default_value = ".")]
        dir: String,
        /// Extra requirement names, comma-separated
        #[arg(long)]
        requirements: Option<String>,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting and clippy
    Check,
    /// Unit and integration tests
    Test,
    /// Run check + test
    All,
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .expect("failed to execute cargo")
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);
}

fn ci_test() {
    step("Test publish_lambda_core");
    run_cargo(&["test", "-p", "publish_lambda_core"]);

    step("Test publish_lambda");
    run_cargo(&["test", "-p", "publish_lambda"]);
}

fn dry_run_args<'a>(
    module: &'a str,
    bucket: &'a str,
    dir: &'a str,
    requirements: Option<&'a str>,
) -> Vec<&'a str> {
    let mut args = vec![
        "run",
        "-p",
        "publish_lambda",
        "--bin",
        "publish-lambda",
        "--",
        "--dry-run",
        "--module",
        module,
        "--bucket",
        bucket,
        "--dir",
        dir,
    ];
    if let Some(requirements) = requirements {
        args.extend(["--requirements", requirements]);
    }
    args
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Test => ci_test(),
                CiJob::All => {
                    ci_check();
                    ci_test();
                }
            }
            eprintln!("\nCI job passed.");
        }
        Commands::DryRun {
            module,
            bucket,
            dir,
            requirements,
        } => {
            step("Plan publish (dry run)");
            run_cargo(&dry_run_args(
                &module,
                &bucket,
                &dir,
                requirements.as_deref(),
            ));
        }
    }
}
