// `server.rs` composes the service: it opens the serial port, mounts the
// HTTP routes, connects the MQTT subscriber and then waits for either a
// shutdown signal or a fatal error before releasing everything.
use crate::config::Args;
use crate::dispatch::Dispatcher;
use crate::lifecycle::{shutdown_signal, Lifecycle};
use crate::metrics::Metrics;
use crate::{handlers, mqtt, serial};
use anyhow::{anyhow, Context};
use axum::{
    routing::get,
    Extension, Router,
};
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task;
use tracing::{error, info, warn};

// Grace period for the MQTT disconnect to reach the broker.
const MQTT_DISCONNECT_QUIESCE: Duration = Duration::from_millis(250);

/// Build the HTTP app. The `Extension` layers hand the dispatcher and the
/// metrics registry to the handlers.
pub fn app(dispatcher: Dispatcher, registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/input/{id}", get(handlers::input).post(handlers::input))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/health", get(|| async { "ok" }))
        .layer(Extension(dispatcher))
        .layer(Extension(registry))
}

pub async fn run(args: Args) -> anyhow::Result<()> {
    let mut lifecycle = Lifecycle::new();

    let settings = mqtt::MqttSettings::from_args(&args)?;

    let registry = Arc::new(Registry::new());
    let metrics = Metrics::register(&registry).context("Failed to register metrics")?;

    let port = serial::open_port(&args.serial_path).context("Failed to open serial port")?;
    info!(path = %args.serial_path, "Connected to serial port successfully");
    let (sink, writer) = serial::start_serial_writer(port);
    let dispatcher = Dispatcher::new(sink.clone(), metrics);

    let bind_addr = SocketAddr::from(([0, 0, 0, 0], args.http_port));
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {}", bind_addr))?;
    info!(addr = %bind_addr, "Starting HTTP server");

    let (http_stop_tx, http_stop_rx) = oneshot::channel::<()>();
    let router = app(dispatcher.clone(), registry);
    let mut http = task::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = http_stop_rx.await;
            })
            .await
    });

    let (client, eventloop) = mqtt::connect(&settings).await?;
    let mut subscriber = task::spawn(mqtt::run_subscriber(eventloop, dispatcher));

    lifecycle.advance();

    let outcome = tokio::select! {
        _ = shutdown_signal() => Ok(()),
        res = &mut subscriber => Err(match res {
            Ok(Ok(())) => anyhow!("MQTT event loop ended unexpectedly"),
            Ok(Err(e)) => e,
            Err(e) => anyhow::Error::new(e).context("MQTT task failed"),
        }),
        res = &mut http => Err(match res {
            Ok(Ok(())) => anyhow!("HTTP server stopped unexpectedly"),
            Ok(Err(e)) => anyhow::Error::new(e).context("HTTP server failed"),
            Err(e) => anyhow::Error::new(e).context("HTTP server task failed"),
        }),
    };
    if let Err(e) = &outcome {
        error!(error = %format!("{:#}", e), "Fatal error");
    }

    lifecycle.advance();

    if !subscriber.is_finished() {
        if let Err(e) = client.disconnect().await {
            warn!(error = %e, "Failed to request MQTT disconnect");
        }
        if tokio::time::timeout(MQTT_DISCONNECT_QUIESCE, &mut subscriber).await.is_err() {
            subscriber.abort();
        }
    }

    let _ = http_stop_tx.send(());
    if !http.is_finished() {
        if let Ok(Err(e)) = http.await {
            warn!(error = %e, "HTTP server ended with error");
        }
    }

    if let Err(e) = sink.shutdown().await {
        warn!(error = %e, "Failed to close serial port");
    }
    if let Err(e) = writer.await {
        warn!(error = %e, "Serial writer task failed");
    }

    lifecycle.advance();
    info!(state = ?lifecycle.state(), "Shutting down");
    outcome
}
