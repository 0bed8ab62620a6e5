use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use termprobe::driver::{BrowserSession, DriverHandle};
use termprobe::environment::{self, Environment};
use termprobe::runner::{self, Orchestrator, RunnerConfig};
use termprobe::{deps, report};

#[derive(Parser)]
#[command(
    name = "termprobe",
    about = "Network and browser reachability probes for mobile terminal environments",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonOpts {
    /// Results file (default depends on the suite)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Seconds to pause between probes
    #[arg(long, default_value_t = 2)]
    delay: u64,

    /// Explicit geckodriver executable (skips the locator)
    #[arg(long)]
    driver: Option<PathBuf>,

    /// Run the browser with a visible window instead of headless
    #[arg(long)]
    headed: bool,

    /// Screenshot output path
    #[arg(long, default_value = "ci_screenshot.png")]
    screenshot: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full suite (network + browser probes)
    Run {
        #[command(flatten)]
        opts: CommonOpts,
    },

    /// Network-only probes, no browser required
    Network {
        #[command(flatten)]
        opts: CommonOpts,
    },

    /// Browser automation probes
    Browser {
        #[command(flatten)]
        opts: CommonOpts,
    },

    /// CI-optimized browser probes
    Ci {
        #[command(flatten)]
        opts: CommonOpts,

        /// Only verify that browser automation is available
        #[arg(long)]
        check_only: bool,
    },

    /// Quick smoke checks
    Smoke {
        #[command(flatten)]
        opts: CommonOpts,
    },
}

#[derive(Clone, Copy)]
enum Suite {
    Full,
    Network,
    Browser,
    Ci,
    Smoke,
}

impl Suite {
    fn default_output(self) -> &'static str {
        match self {
            Suite::Full => "probe_results.json",
            Suite::Network => "network_test_results.json",
            Suite::Browser => "selenium_results.json",
            Suite::Ci => "ci_test_results.json",
            Suite::Smoke => "simple_test_results.json",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let env = environment::detect();
    tracing::info!(environment = %env, "detected execution environment");

    match cli.command {
        Commands::Run { opts } => execute(env, opts, Suite::Full).await,
        Commands::Network { opts } => execute(env, opts, Suite::Network).await,
        Commands::Browser { opts } => execute(env, opts, Suite::Browser).await,
        Commands::Ci { opts, check_only } => {
            if check_only {
                check_browser_stack(env, &opts).await
            } else {
                execute(env, opts, Suite::Ci).await
            }
        }
        Commands::Smoke { opts } => execute(env, opts, Suite::Smoke).await,
    }
}

async fn execute(env: Environment, opts: CommonOpts, suite: Suite) -> Result<()> {
    let config = RunnerConfig {
        headless: !opts.headed,
        inter_probe_delay: Duration::from_secs(opts.delay),
        screenshot_path: opts.screenshot.clone(),
        driver_override: opts.driver.clone(),
        driver_port: None,
    };

    let probes = match suite {
        Suite::Full => runner::full_suite(env, &config),
        Suite::Network => runner::network_suite(),
        Suite::Browser => runner::browser_suite(env, &config),
        Suite::Ci => runner::ci_suite(env, &config),
        Suite::Smoke => runner::smoke_suite(env),
    };

    let orchestrator = Orchestrator::new(env, config);
    let run_report = orchestrator.run(&probes).await;

    let (summary, _) = report::render(&run_report)?;
    println!("\n{summary}");

    let output = opts
        .output
        .unwrap_or_else(|| PathBuf::from(suite.default_output()));
    report::persist(&run_report, &output)?;
    println!("Results saved to: {}", output.display());

    if run_report.overall_success() {
        Ok(())
    } else {
        tracing::error!("no probe succeeded");
        std::process::exit(1);
    }
}

/// `ci --check-only`: verify the browser stack end to end, then tear it
/// down. Exits non-zero if any piece is missing or refuses to start.
async fn check_browser_stack(env: Environment, opts: &CommonOpts) -> Result<()> {
    let found = deps::check(env)?;
    if let Some(firefox) = &found.firefox {
        println!("firefox:     {}", firefox.display());
    }
    let executable = match &opts.driver {
        Some(path) => path.clone(),
        None => found
            .geckodriver
            .ok_or_else(|| anyhow::anyhow!("geckodriver missing after dependency check"))?,
    };
    println!("geckodriver: {}", executable.display());

    let handle = DriverHandle::spawn(executable, None).await?;
    let session = BrowserSession::new(handle, !opts.headed).await?;
    session.quit().await;
    println!("Browser automation is available");
    Ok(())
}
