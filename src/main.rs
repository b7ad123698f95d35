//! tfprobe CLI entry point.
//!
//! This binary provides the command-line interface for tfprobe.

use clap::Parser;
use comfy_table::{ContentArrangement, Table};
use std::error::Error;
use std::process::ExitCode;
use tfprobe::cli::{Cli, Commands};
use tfprobe::config::DEFAULT_CONFIG_FILES;
use tfprobe::reporter::Reporter;
use tfprobe::{Config, DetectorRegistry, Linter, TfProbeError};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Exit code when issues were reported.
const EXIT_ISSUES: u8 = 2;

/// Exit code when some checks could not run.
const EXIT_FAILURES: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");

            eprintln!("Error: {e}");

            let mut source = e.source();
            if source.is_some() {
                eprintln!("\nCaused by:");
                let mut i = 0;
                while let Some(cause) = source {
                    eprintln!("  {i}: {cause}");
                    source = cause.source();
                    i += 1;
                }
            }

            let backtrace = e.backtrace();
            if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
                eprintln!("\nStack backtrace:");
                for line in backtrace.to_string().lines().filter(|l| l.contains("tfprobe")) {
                    eprintln!("{line}");
                }
            }

            let code = e
                .downcast_ref::<TfProbeError>()
                .map_or(1, TfProbeError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let base_level = match verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            };
            // tfprobe at the requested level, everything else at warn
            EnvFilter::new(format!("warn,tfprobe={base_level}"))
        })
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    tracing::debug!("Loading configuration");
    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Lint(args) => {
            config.merge_cli_args(&args);
            let linter = Linter::new(config.clone())?;
            let result = linter.lint(&args.path, &args.vars).await?;

            let report = Reporter::new(&config).generate(&result, args.format)?;
            if let Some(output_path) = &args.output {
                std::fs::write(output_path, &report)?;
                tracing::info!(path = %output_path.display(), "Report written");
            } else {
                println!("{report}");
            }

            let exit_code = if result.has_failures() {
                EXIT_FAILURES
            } else if result.has_issues() {
                EXIT_ISSUES
            } else {
                0
            };
            Ok(ExitCode::from(exit_code))
        }

        Commands::Tree(args) => {
            if let Some(dir) = args.modules_dir {
                config.lint.modules_dir = dir;
            }
            let linter = Linter::new(config)?;
            let tree = linter.tree(&args.path)?;
            let output = tfprobe::tree::export_tree(&tree, args.format)?;

            if let Some(output_path) = args.output {
                std::fs::write(&output_path, &output)?;
                tracing::info!(path = %output_path.display(), "Module tree written");
            } else {
                println!("{output}");
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Rules => {
            let overrides = config.severity_overrides()?;
            let disabled = config.disabled_rules();
            let mut table = Table::new();
            table
                .load_preset(comfy_table::presets::UTF8_BORDERS_ONLY)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["Name", "Deep", "Severity", "Enabled", "Description"]);
            for detector in DetectorRegistry::with_builtin().iter() {
                let severity = overrides
                    .get(detector.name())
                    .copied()
                    .unwrap_or_else(|| detector.default_severity());
                table.add_row(vec![
                    detector.name().to_string(),
                    if detector.is_deep() { "yes" } else { "no" }.to_string(),
                    severity.to_string(),
                    if disabled.iter().any(|d| d == detector.name()) { "no" } else { "yes" }.to_string(),
                    detector.description().to_string(),
                ]);
            }
            println!("{table}");
            Ok(ExitCode::SUCCESS)
        }

        Commands::Init => {
            let config_path = std::path::Path::new(DEFAULT_CONFIG_FILES[0]);
            if config_path.exists() {
                anyhow::bail!("Configuration file already exists: {}", config_path.display());
            }

            std::fs::write(config_path, Config::example_yaml())?;
            println!("Created example configuration: {}", config_path.display());
            Ok(ExitCode::SUCCESS)
        }

        Commands::Validate(args) => {
            let content = std::fs::read_to_string(&args.config)
                .map_err(|e| TfProbeError::io(&args.config, e, file!(), line!()))?;
            match Config::from_yaml(&content) {
                Ok(_) => {
                    println!("Configuration is valid: {}", args.config.display());
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("Configuration error: {e}");
                    Ok(ExitCode::from(1))
                }
            }
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = if let Some(ref config_path) = cli.config {
        tracing::debug!(path = %config_path.display(), "Loading configuration from explicit path");
        read_config(config_path)?
    } else if let Some(path) = DEFAULT_CONFIG_FILES
        .iter()
        .map(std::path::Path::new)
        .find(|p| p.exists())
    {
        tracing::debug!(path = %path.display(), "Found configuration file");
        read_config(path)?
    } else {
        tracing::debug!("No configuration file found, using default configuration");
        Config::default()
    };
    config.load_from_env();
    Ok(config)
}

fn read_config(path: &std::path::Path) -> tfprobe::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| TfProbeError::io(path, e, file!(), line!()))?;
    Config::from_yaml(&content)
}
