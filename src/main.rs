use clap::Parser;
use sensorscope::{
    ChartSink, ChartUpdate, DashboardPanel, PanelConfig, RedrawCadence, SourceConfig, StreamError,
    StreamResult, TimeOrigin, WindowConfig,
};

#[derive(Parser)]
#[command(
    name = "sensorscope",
    version,
    about = "Stream live sensor readings into a sliding-window dashboard",
    long_about = "Connects to a sensor stream endpoint and maintains a trailing\n\
                  time window of readings, logging one line per rendered frame.\n\
                  Endpoints: ws://host:port/sensors/stream/<device> or tcp://host:port"
)]
struct Cli {
    /// Stream endpoint URL (ws://, wss:// or tcp://)
    endpoint: String,

    /// Trailing window horizon in seconds
    #[arg(long, default_value_t = 30.0)]
    horizon: f64,

    /// Redraw interval in milliseconds; 0 redraws on every arrival
    #[arg(long, default_value_t = 50)]
    interval_ms: u64,

    /// Readings to buffer before the first redraw
    #[arg(long, default_value_t = 1)]
    min_ready: usize,

    /// Tolerated timestamp skew for out-of-order readings, in seconds
    #[arg(long, default_value_t = 0.0)]
    reorder_tolerance: f64,

    /// Plot seconds since dashboard start instead of epoch time
    #[arg(long)]
    relative_time: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Chart sink that renders each frame as a log line
struct LogSink;

impl ChartSink for LogSink {
    fn render(&mut self, update: ChartUpdate) -> StreamResult<()> {
        if let Some(latest) = update.rows.last() {
            log::info!(
                "frame: {} rows in window, latest {}={:.4} @ t={:.3}",
                update.rows.len(),
                latest.series,
                latest.value,
                latest.time
            );
        }
        Ok(())
    }
}

fn parse_endpoint(endpoint: &str) -> StreamResult<SourceConfig> {
    if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
        return Ok(SourceConfig::WebSocket {
            url: endpoint.to_string(),
        });
    }

    if let Some(addr) = endpoint.strip_prefix("tcp://") {
        let (host, port) = addr.split_once(':').ok_or_else(|| {
            StreamError::InvalidConfig(format!("TCP endpoint '{}' must be tcp://host:port", endpoint))
        })?;
        let port = port.parse::<u16>().map_err(|_| {
            StreamError::InvalidConfig(format!("Invalid port in endpoint '{}'", endpoint))
        })?;
        return Ok(SourceConfig::Tcp {
            host: host.to_string(),
            port,
        });
    }

    Err(StreamError::InvalidConfig(format!(
        "Endpoint '{}' must start with ws://, wss:// or tcp://",
        endpoint
    )))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let config = PanelConfig {
        source: parse_endpoint(&cli.endpoint)?,
        window: WindowConfig {
            horizon_secs: cli.horizon,
            reorder_tolerance: cli.reorder_tolerance,
        },
        cadence: if cli.interval_ms == 0 {
            RedrawCadence::OnArrival
        } else {
            RedrawCadence::Interval(cli.interval_ms)
        },
        min_ready_samples: cli.min_ready,
        origin: if cli.relative_time {
            TimeOrigin::captured_now()
        } else {
            TimeOrigin::Epoch
        },
        ..Default::default()
    };

    let mut panel = DashboardPanel::new(config)?;
    panel.start(Box::new(LogSink), None)?;

    tokio::signal::ctrl_c().await?;
    panel.stop().await;

    let stats = panel.stats();
    log::info!(
        "Done: {} readings received, {} frames rendered, {} messages dropped, {} readings rejected",
        stats.readings_received,
        stats.frames_rendered,
        stats.messages_dropped,
        stats.readings_rejected
    );

    Ok(())
}
