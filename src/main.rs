//! DHT Exporter binary.
//!
//! Loads the configuration, sets up logging, opens the sensor, starts the
//! metrics listener and hands control to the monitor loop. Exits non-zero on
//! any startup failure or fatal sensor error.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use dht_exporter::{
    config::MonitorConfig,
    logging::init_logging,
    monitor::local_hostname,
    web::{bind_metrics_listener, serve_metrics, supervise},
    DerivedReading, DhtSensor, LoopSettings, MetricRegistry, MonitorError, MonitorLoop,
    RetryDecision, RetryPolicy, SampleReader, SensorDriver, SensorIdentity, SimulatedSensor,
    DEFAULT_CONFIG_PATH,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn, Level};

#[derive(Parser)]
#[command(name = "dht_exporter")]
#[command(about = "DHT22/DHT11 temperature and humidity exporter for Prometheus")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Austin Couch")]
#[command(long_about = "Reads a DHT sensor on a fixed interval and serves readings on /metrics")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the metrics listener port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the read interval in seconds
    #[arg(short, long)]
    interval: Option<u64>,

    /// Use a simulated sensor instead of the GPIO line (useful for non-Pi systems)
    #[arg(long)]
    simulate: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the exporter (default)
    Run,

    /// Take a single reading, print it and exit
    Read(ReadArgs),

    /// Validate the configuration file and print the resolved settings
    Check,
}

#[derive(Args)]
struct ReadArgs {
    /// Output format: json or pretty
    #[arg(short, long, default_value = "pretty")]
    format: String,

    /// Attempts before giving up on transient sensor faults
    #[arg(short, long, default_value_t = 5)]
    attempts: u32,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match &cli.command {
        Some(Commands::Run) | None => run_command(&cli).await,
        Some(Commands::Read(args)) => read_command(&cli, args).await,
        Some(Commands::Check) => check_command(&cli),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let already_logged = err
                .downcast_ref::<MonitorError>()
                .is_some_and(MonitorError::is_fatal_sensor);
            if tracing::dispatcher::has_been_set() {
                if !already_logged {
                    error!("{:#}", err);
                }
            } else {
                eprintln!("ERROR: {:#}", err);
            }
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<MonitorConfig> {
    let mut config = MonitorConfig::load(&cli.config)?;

    if let Some(port) = cli.port {
        config.metrics.port = port;
    }
    if let Some(interval) = cli.interval {
        config.monitor.read_interval_seconds = interval;
    }
    config.validate()?;

    Ok(config)
}

fn log_level(cli: &Cli, config: &MonitorConfig) -> Level {
    if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        config.logging.log_level.to_tracing_level()
    }
}

fn open_driver(cli: &Cli, config: &MonitorConfig) -> anyhow::Result<Box<dyn SensorDriver>> {
    if cli.simulate {
        info!("Using simulated sensor");
        return Ok(Box::new(SimulatedSensor::default()));
    }

    let pin = config.sensor.gpio_pin()?;
    let sensor = DhtSensor::open(config.sensor.model, pin)?;
    info!("{} sensor opened on {}", config.sensor.model, pin);
    Ok(Box::new(sensor))
}

fn print_banner() {
    println!("DHT Exporter - Temperature and Humidity Metrics");
    println!("   Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
}

async fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    init_logging(log_level(cli, &config), Some(&config.logging.log_file))
        .with_context(|| format!("failed to open log file {}", config.logging.log_file.display()))?;

    print_banner();

    let driver = open_driver(cli, &config)?;
    let hostname = local_hostname();
    let identity = SensorIdentity::new(&config.sensor.location, driver.sensor_type(), &hostname);

    let metrics = Arc::new(MetricRegistry::new(identity)?);
    metrics.set_info(env!("CARGO_PKG_VERSION"));

    let listener = bind_metrics_listener(&config.metrics)
        .await
        .context("Failed to start metrics server")?;
    info!(
        "Metrics available at http://{}:{}/metrics",
        hostname, config.metrics.port
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown requested, stopping after the current read");
        let _ = shutdown_tx.send(true);
    });

    let monitor = MonitorLoop::new(driver, metrics.clone(), LoopSettings::from_config(&config))
        .with_shutdown(shutdown_rx);

    let state = supervise(serve_metrics(listener, metrics), monitor.run()).await??;
    info!(
        "Monitoring stopped ({} read errors since startup)",
        state.error_count()
    );
    Ok(())
}

async fn read_command(cli: &Cli, args: &ReadArgs) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    init_logging(log_level(cli, &config), None)?;

    let driver = open_driver(cli, &config)?;
    let identity =
        SensorIdentity::new(&config.sensor.location, driver.sensor_type(), local_hostname());
    let policy = RetryPolicy::new(config.retry_backoff());
    let mut reader = SampleReader::new(driver);

    let mut attempt = 0;
    let result = loop {
        attempt += 1;
        match reader.read() {
            Ok(sample) => break sample.validate().map_err(anyhow::Error::from),
            Err(err) => match policy.decide(&err) {
                RetryDecision::Retry(delay) if attempt < args.attempts => {
                    warn!("Attempt {} failed: {}", attempt, err);
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::Retry(_) => {
                    break Err(anyhow::anyhow!("giving up after {} attempts: {}", attempt, err))
                }
                RetryDecision::Abort(reason) => {
                    error!("Critical sensor error: {}", reason);
                    break Err(MonitorError::fatal_sensor_error(reason).into());
                }
            },
        }
    };
    reader.release();

    let reading = DerivedReading::from_sample(&result?, &identity);
    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&reading)?),
        "pretty" => print_pretty_reading(&reading),
        other => anyhow::bail!("Unsupported format: {}. Use 'json' or 'pretty'", other),
    }

    Ok(())
}

fn check_command(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    let pin = config.sensor.gpio_pin()?;

    println!("Configuration OK: {}", cli.config.display());
    println!("  Location:       {}", config.sensor.location);
    println!("  Sensor:         {} on {} (BCM {})", config.sensor.model, pin, pin.bcm());
    println!("  Read interval:  {}s", config.monitor.read_interval_seconds);
    println!("  Retry backoff:  {}s", config.monitor.retry_backoff_seconds);
    println!("  Metrics:        http://{}/metrics", config.metrics.bind_address());
    println!(
        "  Log file:       {} ({})",
        config.logging.log_file.display(),
        config.logging.log_level
    );

    #[cfg(feature = "gpio")]
    println!("  GPIO support:   ✓");
    #[cfg(not(feature = "gpio"))]
    println!("  GPIO support:   ✗ (only --simulate will work)");

    Ok(())
}

fn print_pretty_reading(reading: &DerivedReading) {
    println!(
        "Reading ({})",
        reading.observed_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("  Location:    {}", reading.location);
    println!("  Sensor:      {} @ {}", reading.sensor_type, reading.hostname);
    println!(
        "  Temperature: {:.1}°C / {:.1}°F",
        reading.temperature_celsius, reading.temperature_fahrenheit
    );
    println!("  Humidity:    {:.1}%", reading.humidity_percent);
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        use clap::Parser;

        let cli = Cli::try_parse_from(["dht_exporter", "--port", "9200", "--simulate"]).unwrap();
        assert_eq!(cli.port, Some(9200));
        assert!(cli.simulate);
    }

    #[test]
    fn test_default_values() {
        use clap::Parser;

        let cli = Cli::try_parse_from(["dht_exporter"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(cli.port, None);
        assert_eq!(cli.interval, None);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_read_subcommand() {
        use clap::Parser;

        let cli = Cli::try_parse_from(["dht_exporter", "read", "--format", "json"]).unwrap();
        match cli.command {
            Some(Commands::Read(args)) => {
                assert_eq!(args.format, "json");
                assert_eq!(args.attempts, 5);
            }
            _ => panic!("expected read subcommand"),
        }
    }
}
