//! Transport seam between the dashboard runtime and the relay hardware.
//!
//! The runtime never talks to a board directly: commands, state and matrix
//! reports travel through the same-origin proxy server, configuration saves
//! go to its `/save-*` routes. Reachability probes are the one exception and
//! hit `http://<address>/` directly.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use super::{persistence::ConfigFile, task_manager::spawn_blocking_task};

/// Reply to a forwarded command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl CommandReply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: Some("text/plain".to_string()),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as shown in the response pane: JSON bodies are re-indented,
    /// anything else is passed through.
    pub fn display_body(&self) -> String {
        let is_json = self
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("application/json"));
        if is_json {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&self.body) {
                if let Ok(pretty) = serde_json::to_string_pretty(&value) {
                    return pretty;
                }
            }
        }
        self.body.clone()
    }
}

#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Forward one encoded command to `address`. Any HTTP reply is `Ok`;
    /// only a failed exchange is an error.
    async fn send_command(&self, address: &str, command: &str) -> Result<CommandReply>;

    /// Raw states report of `address`.
    async fn fetch_states(&self, address: &str) -> Result<String>;

    /// Raw matrix report of `address`.
    async fn fetch_matrix(&self, address: &str) -> Result<String>;

    /// Succeeds when `address` answers HTTP at all within the probe timeout.
    async fn probe(&self, address: &str) -> Result<()>;

    async fn save_config(&self, file: ConfigFile, body: serde_json::Value) -> Result<()>;
}

/// [`RelayTransport`] over the proxy server using blocking `ureq` agents.
#[derive(Clone)]
pub struct HttpProxyTransport {
    proxy_url: String,
    agent: ureq::Agent,
    probe_agent: ureq::Agent,
}

impl HttpProxyTransport {
    pub fn new(proxy_url: &str, request_timeout: Duration, probe_timeout: Duration) -> Self {
        Self {
            proxy_url: proxy_url.trim_end_matches('/').to_string(),
            agent: build_agent(request_timeout),
            probe_agent: build_agent(probe_timeout),
        }
    }

    async fn proxy_get(&self, route: &'static str, query: Vec<(&'static str, String)>) -> Result<CommandReply> {
        let agent = self.agent.clone();
        let url = format!("{}{route}", self.proxy_url);
        spawn_blocking_task(move || blocking_get(&agent, &url, &query))
            .await
            .context("HTTP worker task failed")?
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build();
    ureq::Agent::new_with_config(config)
}

fn blocking_get(
    agent: &ureq::Agent,
    url: &str,
    query: &[(&'static str, String)],
) -> Result<CommandReply> {
    let mut request = agent
        .get(url)
        .header("Accept", "application/json, text/plain, */*");
    for (key, value) in query {
        request = request.query(*key, value);
    }
    let mut response = request
        .call()
        .with_context(|| format!("Request to {url} failed"))?;

    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    // Boards are not strict about encodings; undecodable bytes are replaced.
    let bytes = response
        .body_mut()
        .read_to_vec()
        .with_context(|| format!("Failed to read reply from {url}"))?;
    let body = String::from_utf8_lossy(&bytes).into_owned();

    Ok(CommandReply {
        status,
        content_type,
        body,
    })
}

fn expect_success(reply: CommandReply, what: &str) -> Result<String> {
    if reply.is_success() {
        Ok(reply.body)
    } else {
        Err(anyhow!("{what} failed with HTTP status {}", reply.status))
    }
}

#[async_trait]
impl RelayTransport for HttpProxyTransport {
    async fn send_command(&self, address: &str, command: &str) -> Result<CommandReply> {
        self.proxy_get(
            "/proxy/command",
            vec![("ip", address.to_string()), ("cmd", command.to_string())],
        )
        .await
    }

    async fn fetch_states(&self, address: &str) -> Result<String> {
        let reply = self
            .proxy_get("/proxy/states", vec![("ip", address.to_string())])
            .await?;
        expect_success(reply, "States request")
    }

    async fn fetch_matrix(&self, address: &str) -> Result<String> {
        let reply = self
            .proxy_get("/proxy/matrix", vec![("ip", address.to_string())])
            .await?;
        expect_success(reply, "Matrix request")
    }

    async fn probe(&self, address: &str) -> Result<()> {
        let agent = self.probe_agent.clone();
        let url = format!("http://{address}/");
        // Any HTTP reply counts; the page itself is never read.
        spawn_blocking_task(move || {
            agent
                .get(&url)
                .call()
                .map(|_| ())
                .with_context(|| format!("No reply from {url}"))
        })
        .await
        .context("HTTP worker task failed")?
    }

    async fn save_config(&self, file: ConfigFile, body: serde_json::Value) -> Result<()> {
        let agent = self.agent.clone();
        let url = format!("{}{}", self.proxy_url, file.save_route());
        let payload = serde_json::to_string(&body)?;
        let status = spawn_blocking_task(move || -> Result<u16> {
            let response = agent
                .post(&url)
                .header("Content-Type", "application/json")
                .send(payload.as_str())
                .with_context(|| format!("Request to {url} failed"))?;
            Ok(response.status().as_u16())
        })
        .await
        .context("HTTP worker task failed")??;

        if !(200..300).contains(&status) {
            return Err(anyhow!("Saving {file} failed with HTTP status {status}"));
        }
        log::info!("💾 Saved {file} through the proxy");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_replies_are_reindented() {
        let reply = CommandReply {
            status: 200,
            content_type: Some("application/json; charset=utf-8".into()),
            body: r#"{"relay":3,"state":"on"}"#.into(),
        };
        assert_eq!(
            reply.display_body(),
            "{\n  \"relay\": 3,\n  \"state\": \"on\"\n}"
        );
    }

    #[test]
    fn test_text_and_broken_json_pass_through() {
        assert_eq!(CommandReply::ok("done").display_body(), "done");
        let reply = CommandReply {
            status: 200,
            content_type: Some("application/json".into()),
            body: "{oops".into(),
        };
        assert_eq!(reply.display_body(), "{oops");
    }

    #[test]
    fn test_success_range() {
        assert!(CommandReply::ok("").is_success());
        let reply = CommandReply {
            status: 500,
            ..CommandReply::ok("")
        };
        assert!(!reply.is_success());
    }
}
