//! freightcheck - acceptance runs against the transport request wizard
//!
//! Exit status: 0 when every scenario passed, 1 when at least one failed,
//! 2 when the harness itself could not run.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{error, info};

use freightcheck_common::Credentials;
use freightcheck_e2e::driver::playwright::PlaywrightFactory;
use freightcheck_e2e::driver::DriverFactory;
use freightcheck_e2e::{
    preflight, FixtureSet, HarnessConfig, RunnerConfig, Scenario, SimConfig, SimWorld, TestRunner,
};

/// Browser-driven acceptance harness for the transport request wizard
#[derive(Parser)]
#[command(name = "freightcheck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "freightcheck.toml")]
    config: PathBuf,

    /// Application base URL (overrides the config file)
    #[arg(long, env = "FREIGHTCHECK_BASE_URL")]
    base_url: Option<String>,

    /// Test identity
    #[arg(long, env = "TEST_USER_EMAIL", hide_env_values = true)]
    email: Option<String>,

    #[arg(long, env = "TEST_USER_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Run against the in-process simulator instead of a browser
    #[arg(long)]
    simulate: bool,

    /// Scenarios running at the same time
    #[arg(short, long)]
    workers: Option<usize>,

    /// Only run scenarios whose name contains this text
    #[arg(short, long)]
    scenario: Vec<String>,

    /// Only run scenarios carrying this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Directory for test-results.json (overrides the config file)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Skip the reachability check of the login page
    #[arg(long)]
    skip_preflight: bool,

    /// Print the selected scenarios and exit
    #[arg(long)]
    list: bool,

    /// Write the effective configuration to --config and exit
    #[arg(long)]
    init_config: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    info!("freightcheck v{}", env!("CARGO_PKG_VERSION"));

    let mut config = HarnessConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(url) = cli.base_url {
        config.app.base_url = url;
    }
    if let Some(workers) = cli.workers {
        config.run.workers = workers;
    }
    if let Some(dir) = cli.output_dir {
        config.run.output_dir = dir;
    }
    config.validate()?;

    if cli.init_config {
        config.save(&cli.config)?;
        info!("Configuration written to {}", cli.config.display());
        return Ok(true);
    }

    // Fixture dates are checked against the same day the run uses
    let today = chrono::Local::now().date_naive();
    let sets = match &config.run.fixtures_dir {
        Some(dir) => {
            let sets = FixtureSet::load_all(dir, today)
                .with_context(|| format!("loading fixtures from {}", dir.display()))?;
            if sets.is_empty() {
                bail!("no fixture sets found in {}", dir.display());
            }
            sets
        }
        None => vec![FixtureSet::minimal(), FixtureSet::realistic()],
    };

    let mut scenarios = Scenario::catalog(&sets, config.run.negative_expected_errors);
    if !cli.scenario.is_empty() {
        scenarios.retain(|s| cli.scenario.iter().any(|f| s.name.contains(f.as_str())));
    }
    if let Some(tag) = &cli.tag {
        scenarios.retain(|s| s.has_tag(tag));
    }
    if scenarios.is_empty() {
        bail!("no scenario matches the given filters");
    }

    if cli.list {
        for s in &scenarios {
            println!("{:<28} [{}]", s.name, s.tags.join(", "));
        }
        return Ok(true);
    }

    let provided = match (cli.email, cli.password) {
        (Some(email), Some(password)) => Some(Credentials::new(email, password)),
        _ => None,
    };

    let (factory, credentials): (Arc<dyn DriverFactory>, Credentials) = if cli.simulate {
        let mut sim = SimConfig::default();
        if let Some(creds) = &provided {
            sim.credentials = creds.clone();
        }
        let credentials = sim.credentials.clone();
        (Arc::new(SimWorld::new(sim)), credentials)
    } else {
        let Some(credentials) = provided else {
            bail!("TEST_USER_EMAIL and TEST_USER_PASSWORD must be set (or pass --email/--password)");
        };
        if !cli.skip_preflight {
            preflight::wait_for_app(&config.app.base_url, config.preflight_timeout()).await?;
        }
        let factory = PlaywrightFactory::new(config.playwright()).await?;
        (Arc::new(factory), credentials)
    };

    let runner = TestRunner::new(
        factory,
        RunnerConfig {
            workers: config.run.workers,
            timeouts: config.timeouts(),
            credentials,
            today: Some(today),
            output_dir: config.run.output_dir.clone(),
        },
    );

    let results = runner.run(scenarios).await?;
    runner.write_results(&results)?;
    Ok(results.all_passed())
}
