//! Exposes the command line application.
use std::collections::BTreeMap;
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gatekeeper_service::config::Config;
use gatekeeper_service::metrics;

use crate::healthcheck;
use crate::logging;
use crate::server;

fn get_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

fn get_long_crate_version() -> &'static str {
    concat!(
        "version: ",
        env!("CARGO_PKG_VERSION"),
        "\ngit commit: ",
        env!("GATEKEEPER_GIT_VERSION")
    )
}

/// Gatekeeper commands.
#[derive(Subcommand)]
enum Command {
    /// Run the web server.
    Run,

    /// Check the health of a running server.
    Healthcheck {
        /// Address of the server. Defaults to the configured bind address.
        #[arg(long)]
        addr: Option<SocketAddr>,

        /// Request timeout in seconds.
        #[arg(long, default_value_t = 5)]
        timeout: u64,
    },
}

/// Command line interface parser.
#[derive(Parser)]
#[command(bin_name = "gatekeeper", version = get_crate_version(), long_version = get_long_crate_version())]
struct Cli {
    /// Path to your configuration file.
    #[arg(long, short, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    /// Returns the path to the configuration file.
    fn config(&self) -> Option<&Path> {
        self.config.as_deref()
    }
}

/// Collects the tags sent with every metric.
fn metric_tags(config: &Config) -> BTreeMap<String, String> {
    let mut tags = config.metrics.custom_tags.clone();

    if let Some(tag) = config.metrics.hostname_tag.clone() {
        let hostname = hostname::get().ok().and_then(|s| s.into_string().ok());
        if let Some(hostname) = hostname {
            tags.insert(tag, hostname);
        }
    }
    if let Some(tag) = config.metrics.environment_tag.clone() {
        if let Ok(environment) = env::var("GATEKEEPER_ENV") {
            tags.insert(tag, environment);
        }
    }

    tags
}

/// Runs the main application.
pub fn execute() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::get(cli.config()).context("failed loading config")?;

    let _sentry = sentry::init(sentry::ClientOptions {
        dsn: config.sentry_dsn.clone(),
        release: Some(env!("GATEKEEPER_RELEASE").into()),
        session_mode: sentry::SessionMode::Request,
        auto_session_tracking: false,
        ..Default::default()
    });

    // SAFETY: The runtime has not been started yet, so this is still single-threaded.
    unsafe { logging::init_logging(&config) };

    if let Some(ref statsd) = config.metrics.statsd {
        metrics::configure_statsd(&config.metrics.prefix, statsd.as_str(), metric_tags(&config))
            .context("failed to configure statsd")?;
    }

    match cli.command {
        Command::Run => server::run(config).context("failed to start the server")?,
        Command::Healthcheck { addr, timeout } => healthcheck::healthcheck(config, addr, timeout)?,
    }

    Ok(())
}
