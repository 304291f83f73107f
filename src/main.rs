//! jmx-reporter - JVM monitoring report generator
//!
//! Reads a cycle input file describing monitored connections and their
//! management snapshots, runs the report pipeline and prints the records.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use jmx_reporter::{
    cache::SystemClock,
    cli::{Cli, OutputFormat},
    config::Config,
    directory::DirectoryCaches,
    hook::PluginHook,
    input::CycleInput,
    metrics::PipelineMetrics,
    pipeline::{PipelineSettings, ReportPipeline},
    plugin::{ConfiguredPlugin, LoggingLifecycle},
    transformer::ReportFormatter,
};

/// State shared by every cycle
struct Reporter {
    config: Config,
    input: PathBuf,
    hook: Arc<dyn PluginHook>,
    caches: Arc<DirectoryCaches>,
    metrics: Arc<PipelineMetrics>,
    formatter: ReportFormatter,
    format: OutputFormat,
}

impl Reporter {
    fn new(config: Config, input: PathBuf, cli: &Cli) -> Self {
        let hook: Arc<dyn PluginHook> = Arc::new(ConfiguredPlugin::from_config(&config.plugin));
        let caches = Arc::new(DirectoryCaches::new(
            Arc::new(SystemClock),
            config.cache.ttl(),
        ));
        Self {
            config,
            input,
            hook,
            caches,
            metrics: Arc::new(PipelineMetrics::new()),
            formatter: ReportFormatter::new().with_pretty(cli.pretty),
            format: cli.output_format,
        }
    }

    /// Run one cycle and print its records to stdout
    fn run_cycle(&self) -> Result<()> {
        let input = CycleInput::load(&self.input)
            .with_context(|| format!("Failed to load cycle input {}", self.input.display()))?;
        let check = Arc::new(input.container_check());
        let connections = input.into_monitored(&self.config.selectors);

        let settings = PipelineSettings {
            endpoint: self.config.agent.endpoint.clone(),
            container_runtime: self.config.agent.container_runtime,
        };
        let pipeline = ReportPipeline::new(settings, self.hook.clone(), self.caches.clone())
            .with_metrics(self.metrics.clone())
            .with_lifecycle(Arc::new(LoggingLifecycle))
            .with_container_check(check);

        let records = pipeline.report(&connections).into_vec();
        let output = self.formatter.format(&records, self.format)?;

        let mut stdout = std::io::stdout().lock();
        stdout.write_all(output.as_bytes())?;
        if !output.is_empty() && !output.ends_with('\n') {
            stdout.write_all(b"\n")?;
        }
        stdout.flush()?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    jmx_reporter::init_logging(&cli.log_level.to_string())?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting jmx-reporter");

    if cli.validate {
        return validate(&cli);
    }

    let mut config = Config::load_or_default(&cli.config)?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    let Some(input) = cli.input.clone() else {
        bail!("No cycle input given; pass --input or set JMXR_INPUT");
    };

    let reporter = Reporter::new(config, input, &cli);

    match cli.interval.filter(|_| !cli.once) {
        None => {
            reporter.run_cycle()?;
            info!(stats = ?reporter.metrics.snapshot(), "Pipeline statistics");
        }
        Some(0) => bail!("--interval must be greater than 0"),
        Some(secs) => run_interval(&reporter, Duration::from_secs(secs)).await,
    }

    Ok(())
}

/// Check the configuration file and print the effective configuration
fn validate(cli: &Cli) -> Result<()> {
    let mut config = Config::load(&cli.config)
        .with_context(|| format!("Invalid configuration {}", cli.config.display()))?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    match cli.output_format {
        OutputFormat::Text => println!("Configuration OK: {}", cli.config.display()),
        OutputFormat::Json => {
            let rendered = if cli.pretty {
                serde_json::to_string_pretty(&config)?
            } else {
                serde_json::to_string(&config)?
            };
            println!("{}", rendered);
        }
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&config)?),
    }
    Ok(())
}

/// Run cycles on a fixed interval until a shutdown signal arrives
///
/// A failed cycle is logged and the next tick runs normally.
async fn run_interval(reporter: &Reporter, period: Duration) {
    info!(
        interval_secs = period.as_secs(),
        input = %reporter.input.display(),
        "Running report cycles"
    );

    let mut ticker = tokio::time::interval(period);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                if let Err(e) = reporter.run_cycle() {
                    error!(error = %e, input = %reporter.input.display(), "Report cycle failed");
                }
            }
        }
    }

    info!(stats = ?reporter.metrics.snapshot(), "Shutdown complete");
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
