//! qws echo server.
//!
//! - Config: first CLI argument, else `qws.yaml`, else built-in defaults
//! - Route `/echo/:room`: every envelope is sent straight back
//! - Ctrl-C / SIGTERM: drain and close all connections gracefully

use tracing_subscriber::{fmt, EnvFilter};

use qws_core::Result;
use qws_runtime::config::{self, QwsConfig};
use qws_runtime::{handler_fn, Connection, EndpointBuilder, RequestInfo, RouteParams};

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cfg = load_config()?;
    let listen = cfg.listen_addr()?;

    let endpoint = EndpointBuilder::new()
        .options(cfg.endpoint_options())
        .route("/echo/:room", handler_fn(echo))?
        .bind(listen)
        .await?;

    tracing::info!(addr = %endpoint.local_addr(), "qws-echo started");
    endpoint.serve_until(shutdown_signal()).await;
    Ok(())
}

fn load_config() -> Result<QwsConfig> {
    match std::env::args().nth(1) {
        Some(path) => config::load_from_file(path),
        None if std::path::Path::new("qws.yaml").exists() => config::load_from_file("qws.yaml"),
        None => config::load_from_str("version: 1"),
    }
}

async fn echo(conn: Connection, params: RouteParams, _request: RequestInfo) -> Result<()> {
    let room = params.path_param("room").unwrap_or_default().to_string();
    tracing::info!(id = conn.id(), %room, "joined echo room");

    let out = conn.clone();
    conn.on_structured_message(move |value, headers| {
        if let Err(e) = out.send(value.clone(), headers.clone()) {
            tracing::debug!(error = %e, "echo dropped");
        }
    });
    let out = conn.clone();
    conn.on_binary_message(move |bytes, headers| {
        if let Err(e) = out.send_binary(bytes.clone(), headers.clone()) {
            tracing::debug!(error = %e, "echo dropped");
        }
    });
    conn.on_close(move |reason| tracing::info!(%room, %reason, "left echo room"));
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler failed");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

