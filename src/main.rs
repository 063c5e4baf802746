//! Application entry point for the `codemetal-fieldflow` service.
//!
//! This binary orchestrates the full startup sequence:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Building the in-memory processing pipeline
//! - Starting the queue relay, its reconnect supervisor and the alert timers
//! - Binding the Axum HTTP server that exposes the ingestion API
//!
//! On Ctrl-C the server drains, the timers are cancelled and the relay is
//! stopped before exit.
//!
//! # Environment Variables
//! See [`fieldflow::config::load_from_env`] for the service settings, plus:
//! - `FIELDFLOW_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `FIELDFLOW_SPAN_EVENTS` (optional) – span event mode for tracing
use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Result;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use fieldflow::alerts::AlertTimers;
use fieldflow::queue::AmqpConnector;
use fieldflow::{
    config, routes, sink, ForwardMode, HttpSink, MessageRelay, PipelineSink, ProcessingPipeline,
    ReadingSink, RelaySettings, TimeSeriesStore,
};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let pipeline = ProcessingPipeline::new(Arc::new(TimeSeriesStore::new()));
    let client = sink::http_client(&cfg)?;
    let cancel = CancellationToken::new();

    let relay = if cfg.enable_relay {
        let sink: Arc<dyn ReadingSink> = match cfg.forward_mode {
            ForwardMode::Http => Arc::new(HttpSink::new(client.clone(), &cfg.api_base_url)),
            ForwardMode::Local => Arc::new(PipelineSink::new(pipeline.clone())),
        };
        let relay = Arc::new(MessageRelay::new(
            Arc::new(AmqpConnector::from_config(&cfg)),
            sink,
            RelaySettings::from_config(&cfg),
        ));
        // A failed start is logged by the relay; the API keeps serving
        relay.start().await;
        tokio::spawn(Arc::clone(&relay).supervise(cancel.clone()));
        Some(relay)
    } else {
        tracing::info!("Queue relay disabled");
        None
    };

    if cfg.enable_alert_timers {
        AlertTimers::new(client, &cfg).start(cancel.clone());
    }

    let app = routes::router(pipeline);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel.cancel();
    if let Some(relay) = relay {
        relay.stop().await;
    }
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    // ---
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `FIELDFLOW_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by the `FIELDFLOW_LOG_LEVEL` env var, with the AMQP
///   client held at `info` to keep frame-level noise out of debug logs
///
/// This should be called once at application startup before any logging
/// or tracing macros are invoked.
fn init_tracing() {
    // ---
    let span_events = match env::var("FIELDFLOW_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to FIELDFLOW_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("FIELDFLOW_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},lapin=info,hyper=info,reqwest=info"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
