//! Same-origin proxy server
//!
//! Browsers (and the dashboard transport) cannot talk to the boards directly,
//! so this server forwards `/proxy/*` requests to `http://<ip>/...`, persists
//! the `/save-*` configuration posts into the data directory and serves every
//! other path as a static file from that directory.

use anyhow::{anyhow, Context, Result};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crate::core::{
    persistence::{save_config, ConfigFile},
    task_manager::spawn_blocking_task,
};

const NOT_FOUND_PAGE: &str = "<h1>404 - File Not Found</h1>";

#[derive(Clone)]
pub struct ServerState {
    data_dir: Arc<PathBuf>,
    agent: ureq::Agent,
}

impl ServerState {
    pub fn new(data_dir: impl Into<PathBuf>, upstream_timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(upstream_timeout))
            .http_status_as_error(false)
            .build();
        Self {
            data_dir: Arc::new(data_dir.into()),
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ProxyParams {
    ip: Option<String>,
    cmd: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

pub fn router(state: ServerState) -> Router {
    let mut router = Router::new()
        .route("/proxy/command", get(proxy_command))
        .route("/proxy/states", get(proxy_states))
        .route("/proxy/matrix", get(proxy_matrix));

    for file in ConfigFile::ALL {
        router = router.route(
            file.save_route(),
            post(move |State(state): State<ServerState>, body: String| {
                save_posted_config(state, file, body)
            }),
        );
    }

    router.fallback(serve_static).with_state(state)
}

fn text_response(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain")], body).into_response()
}

/// Upstream replies are passed through byte for byte as 200 whatever the
/// board answered.
fn forwarded(body: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        body,
    )
        .into_response()
}

async fn fetch_upstream(agent: ureq::Agent, url: String) -> Result<Vec<u8>> {
    spawn_blocking_task(move || -> Result<Vec<u8>> {
        let mut response = agent.get(&url).call()?;
        Ok(response.body_mut().read_to_vec()?)
    })
    .await
    .context("Upstream worker task failed")?
}

async fn proxy_command(
    State(state): State<ServerState>,
    Query(params): Query<ProxyParams>,
) -> Response {
    let (Some(ip), Some(cmd)) = (non_empty(&params.ip), non_empty(&params.cmd)) else {
        return text_response(
            StatusCode::BAD_REQUEST,
            "Missing IP or command parameter".into(),
        );
    };
    let url = format!("http://{ip}{cmd}");
    log::debug!("Forwarding command to {url}");
    match fetch_upstream(state.agent.clone(), url).await {
        Ok(body) => forwarded(body),
        Err(err) => {
            log::warn!("Proxy error for {ip}: {err:#}");
            text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Proxy error: {err:#}"),
            )
        }
    }
}

async fn proxy_states(
    State(state): State<ServerState>,
    Query(params): Query<ProxyParams>,
) -> Response {
    let Some(ip) = non_empty(&params.ip) else {
        return text_response(StatusCode::BAD_REQUEST, "Missing IP parameter".into());
    };
    match fetch_upstream(state.agent.clone(), format!("http://{ip}/states")).await {
        Ok(body) => forwarded(body),
        Err(err) => {
            log::debug!("Failed to fetch states from {ip}: {err:#}");
            text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Proxy error: {err:#}"),
            )
        }
    }
}

async fn proxy_matrix(
    State(state): State<ServerState>,
    Query(params): Query<ProxyParams>,
) -> Response {
    let Some(ip) = non_empty(&params.ip) else {
        return text_response(StatusCode::BAD_REQUEST, "Missing IP parameter".into());
    };
    match fetch_upstream(state.agent.clone(), format!("http://{ip}/matrix")).await {
        Ok(body) => forwarded(body),
        Err(err) => {
            log::error!("Error fetching matrix from {ip}: {err:#}");
            text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error fetching matrix from device".into(),
            )
        }
    }
}

fn json_response(status: StatusCode, value: serde_json::Value) -> Response {
    let mut response = (status, axum::Json(value)).into_response();
    if status.is_success() {
        response.headers_mut().insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            header::HeaderValue::from_static("*"),
        );
    }
    response
}

async fn save_posted_config(state: ServerState, file: ConfigFile, body: String) -> Response {
    let data_dir = Arc::clone(&state.data_dir);
    let result = spawn_blocking_task(move || -> Result<()> {
        let value: serde_json::Value = serde_json::from_str(&body)?;
        save_config(&data_dir, file, &value)
    })
    .await
    .context("Save worker task failed")
    .and_then(|saved| saved);

    match result {
        Ok(()) => {
            log::info!("💾 Saved {} ({file})", file.file_name());
            json_response(StatusCode::OK, serde_json::json!({ "success": true }))
        }
        Err(err) => {
            log::error!("Failed to save {file}: {err:#}");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": err.to_string() }),
            )
        }
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") => "image/jpeg",
        Some("ico") => "image/x-icon",
        _ => "text/plain",
    }
}

/// Map a request path onto the data directory, refusing anything that could
/// leave it.
fn resolve_static_path(data_dir: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = request_path.trim_start_matches('/');
    let relative = if relative.is_empty() {
        "index.html"
    } else {
        relative
    };
    let relative = Path::new(relative);
    if relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        Some(data_dir.join(relative))
    } else {
        None
    }
}

async fn serve_static(State(state): State<ServerState>, uri: Uri) -> Response {
    let Some(path) = resolve_static_path(&state.data_dir, uri.path()) else {
        log::warn!("Rejected static path {}", uri.path());
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    };

    match tokio::fs::read(&path).await {
        Ok(content) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, content_type_for(&path))],
            content,
        )
            .into_response(),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/html")],
            NOT_FOUND_PAGE,
        )
            .into_response(),
        Err(err) => text_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Server Error: {}", err.kind()),
        ),
    }
}

/// Bind `0.0.0.0:<port>` and serve until Ctrl+C.
pub async fn serve(port: u16, state: ServerState) -> Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow!("Failed to bind HTTP server to {addr}: {e}"))?;

    println!("{}", "=".repeat(50));
    println!("Device Switcher Server Running!");
    println!("{}", "=".repeat(50));
    println!("\nLocal:   http://localhost:{port}");
    println!("Data:    {}", state.data_dir.display());
    println!("\nPress Ctrl+C to stop the server\n");
    log::info!("HTTP server listening on {addr}");

    let shutdown_signal = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => log::info!("HTTP server received shutdown signal, exiting"),
            Err(err) => log::warn!("Failed to listen for Ctrl+C: {err}"),
        }
    };

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| anyhow!("HTTP server error: {e}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_paths_stay_inside_data_dir() {
        let root = Path::new("/srv/deck");
        assert_eq!(
            resolve_static_path(root, "/"),
            Some(root.join("index.html"))
        );
        assert_eq!(
            resolve_static_path(root, "/icons/app.png"),
            Some(root.join("icons/app.png"))
        );
        assert_eq!(resolve_static_path(root, "/../etc/passwd"), None);
        assert_eq!(resolve_static_path(root, "/a/../../b"), None);
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for(Path::new("index.html")), "text/html");
        assert_eq!(content_type_for(Path::new("devices.json")), "application/json");
        assert_eq!(content_type_for(Path::new("README")), "text/plain");
    }
}
