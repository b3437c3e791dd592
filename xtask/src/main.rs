use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "x")]
#[command(about = "Build, test and simulation tasks for zuluide-core")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// fmt check, clippy, build and the full test run
    Ci {
        #[arg(long)]
        verbose: bool,
    },
    /// fmt check and clippy only
    Check {
        #[arg(long)]
        verbose: bool,
    },
    Fmt {
        #[arg(long)]
        check: bool,
    },
    Clippy {
        #[arg(long)]
        fix: bool,
    },
    Build {
        #[arg(long)]
        release: bool,
    },
    /// Run the test suites, all of them unless `--only` is given
    Test {
        /// Restrict the run to these suites (repeatable)
        #[arg(long, value_enum)]
        only: Vec<Suite>,
        /// Run doc tests instead
        #[arg(long)]
        doc: bool,
        #[arg(long)]
        ignored: bool,
    },
    /// Ring buffer and bus throughput benchmarks
    Bench,
    /// Write a commented example drive configuration
    SampleConfig {
        #[arg(default_value = "zuluide.toml")]
        path: String,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Drive the mock bus with `zuluide simulate`
    Simulate {
        #[arg(default_value = "zuluide.toml")]
        config: String,
        /// Sectors read from each device
        #[arg(short = 'n', long, default_value = "4")]
        sectors: u8,
        #[arg(long)]
        release: bool,
    },
    /// What the git hook runs: fmt check, clippy, tests
    PreCommit,
    InstallHooks,
}

/// A group of tests selected by module path or integration target
#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Suite {
    Atapi,
    Cdrom,
    Removable,
    Zip,
    Rigid,
    Image,
    Phy,
    Protocol,
    Config,
    /// Whole-bus sessions under tests/
    Integration,
}

impl Suite {
    fn label(self) -> &'static str {
        match self {
            Suite::Atapi => "ATAPI engine",
            Suite::Cdrom => "CD-ROM",
            Suite::Removable => "Removable",
            Suite::Zip => "ZIP",
            Suite::Rigid => "Rigid disk",
            Suite::Image => "Image",
            Suite::Phy => "PHY",
            Suite::Protocol => "Protocol",
            Suite::Config => "Config",
            Suite::Integration => "Integration",
        }
    }

    fn cargo_args(self) -> Vec<&'static str> {
        let filter = match self {
            Suite::Atapi => "core::atapi",
            Suite::Cdrom => "core::cdrom",
            Suite::Removable => "core::removable",
            Suite::Zip => "core::zip",
            Suite::Rigid => "core::rigid",
            Suite::Image => "core::image",
            Suite::Phy => "core::phy",
            Suite::Protocol => "core::protocol",
            Suite::Config => "core::config",
            Suite::Integration => return vec!["test", "--test", "integration_test"],
        };
        vec!["test", "--lib", filter]
    }
}

/// One step of a check pipeline
#[derive(Clone, Copy)]
enum Step {
    FmtCheck,
    Clippy,
    Build,
    Test,
}

impl Step {
    fn name(self) -> &'static str {
        match self {
            Step::FmtCheck => "Format Check",
            Step::Clippy => "Clippy",
            Step::Build => "Build",
            Step::Test => "Test",
        }
    }

    fn run(self) -> Result<()> {
        match self {
            Step::FmtCheck => run_fmt(true),
            Step::Clippy => run_clippy(false),
            Step::Build => cargo(&["build"]),
            Step::Test => run_test(&[], false, false),
        }
    }
}

const CI: &[Step] = &[Step::FmtCheck, Step::Clippy, Step::Build, Step::Test];
const QUICK: &[Step] = &[Step::FmtCheck, Step::Clippy];
const PRE_COMMIT: &[Step] = &[Step::FmtCheck, Step::Clippy, Step::Test];

const SAMPLE_CONFIG: &str = r#"# zuluide-core drive configuration

[ide]
max_pio = 3
max_udma = 0                # -1 disables DMA
transfer_timeout_ms = 10000
ignore_command_interrupt = true

# Device 0
[[device]]
kind = "rigid"
image = "disk.img"

# Device 1, a CUE/BIN pair is picked up from the .bin name
[[device]]
kind = "cdrom"
image = "disc.bin"
"#;

const HOOK: &str = r#"#!/bin/sh
# Installed by cargo x install-hooks
set -e
cargo x pre-commit
"#;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci { verbose } => run_pipeline("CI Pipeline", CI, verbose),
        Commands::Check { verbose } => run_pipeline("Quick Checks", QUICK, verbose),
        Commands::Fmt { check } => run_fmt(check),
        Commands::Clippy { fix } => run_clippy(fix),
        Commands::Build { release: true } => cargo(&["build", "--release"]),
        Commands::Build { release: false } => cargo(&["build"]),
        Commands::Test { only, doc, ignored } => run_test(&only, doc, ignored),
        Commands::Bench => cargo(&["bench"]),
        Commands::SampleConfig { path, force } => write_sample_config(&path, force),
        Commands::Simulate {
            config,
            sectors,
            release,
        } => run_simulate(&config, sectors, release),
        Commands::PreCommit => run_pipeline("Pre-commit Checks", PRE_COMMIT, false),
        Commands::InstallHooks => install_hooks(),
    }
}

fn run_pipeline(title: &str, steps: &[Step], verbose: bool) -> Result<()> {
    println!("{}", format!("=== {} ===", title).bold().blue());
    let start = Instant::now();

    for step in steps {
        run_task(step.name(), || step.run(), verbose)?;
    }

    println!(
        "\n{} {}",
        format!("✓ {} passed in", title).green().bold(),
        format!("{:.2}s", start.elapsed().as_secs_f64()).bold()
    );
    Ok(())
}

fn run_fmt(check: bool) -> Result<()> {
    if check {
        cargo(&["fmt", "--all", "--", "--check"])
    } else {
        cargo(&["fmt", "--all"])
    }
}

fn run_clippy(fix: bool) -> Result<()> {
    if fix {
        cargo(&["clippy", "--all-targets", "--fix"])
    } else {
        cargo(&["clippy", "--all-targets", "--", "-D", "warnings"])
    }
}

fn run_test(only: &[Suite], doc: bool, ignored: bool) -> Result<()> {
    let with_ignored = |mut args: Vec<&'static str>| {
        if ignored {
            args.extend(["--", "--ignored"]);
        }
        args
    };

    if doc {
        return cargo(&with_ignored(vec!["test", "--doc"]));
    }
    if only.is_empty() {
        return cargo(&with_ignored(vec!["test", "--workspace"]));
    }

    let mut failed = Vec::new();
    for &suite in only {
        println!("{} Running {} tests...", "→".blue(), suite.label().bold());
        match cargo(&with_ignored(suite.cargo_args())) {
            Ok(()) => println!("{} {} tests passed\n", "✓".green(), suite.label()),
            Err(_) => {
                println!("{} {} tests failed\n", "✗".red(), suite.label());
                failed.push(suite.label());
            }
        }
    }

    if !failed.is_empty() {
        bail!("Failing suites: {}", failed.join(", "));
    }
    Ok(())
}

fn write_sample_config(path: &str, force: bool) -> Result<()> {
    if Path::new(path).exists() && !force {
        bail!("{} already exists, pass --force to overwrite", path);
    }
    fs::write(path, SAMPLE_CONFIG).with_context(|| format!("writing {}", path))?;
    println!("{} Wrote {}", "✓".green(), path.cyan());
    println!("  Point the image entries at real files, then run: cargo x simulate {}", path);
    Ok(())
}

fn run_simulate(config_path: &str, sectors: u8, release: bool) -> Result<()> {
    if !Path::new(config_path).exists() {
        println!(
            "{} Configuration not found: {}",
            "✗".red().bold(),
            config_path.yellow()
        );
        println!(
            "\n{} Generate one with: cargo x sample-config {}",
            "ℹ".blue(),
            config_path
        );
        bail!("Configuration file not found");
    }

    println!(
        "{} {} ({} sectors per device, {} build)",
        "→".blue(),
        config_path.cyan(),
        sectors,
        if release { "release" } else { "debug" }
    );

    let sectors = sectors.to_string();
    let mut args = vec!["run"];
    if release {
        args.push("--release");
    }
    args.extend([
        "--bin",
        "zuluide",
        "--",
        "simulate",
        "--config",
        config_path,
        "-n",
        &sectors,
    ]);

    let start = Instant::now();
    cargo(&args).context("simulation failed")?;
    println!(
        "\n{} Simulation completed in {:.2}s",
        "✓".green().bold(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn install_hooks() -> Result<()> {
    let hook_path = Path::new(".git/hooks/pre-commit");
    if !hook_path.parent().is_some_and(Path::is_dir) {
        bail!("No .git/hooks directory, run from the repository root");
    }
    fs::write(hook_path, HOOK)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mut perms = fs::metadata(hook_path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(hook_path, perms)?;
    }

    println!("{} Installed {}", "✓".green(), hook_path.display());
    Ok(())
}

fn run_task<F>(name: &str, task: F, verbose: bool) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    print!("{} {} ... ", "→".blue(), name);
    let start = Instant::now();

    match task() {
        Ok(()) => {
            if verbose {
                println!("{} ({:.2}s)", "✓".green().bold(), start.elapsed().as_secs_f64());
            } else {
                println!("{}", "✓".green().bold());
            }
            Ok(())
        }
        Err(e) => {
            println!("{}", "✗".red().bold());
            Err(e)
        }
    }
}

fn cargo(args: &[&str]) -> Result<()> {
    let status = Command::new("cargo")
        .args(args)
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .context("failed to launch cargo")?;

    if !status.success() {
        bail!("cargo {} failed: {}", args.join(" "), status);
    }
    Ok(())
}
