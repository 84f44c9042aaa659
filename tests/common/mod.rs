#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;

use support_core::database::{models::User, MemoryBackend, TenantScopedStore};
use support_core::middleware::BoundaryState;
use support_core::server::{app, AppState};
use support_core::services::TenantDirectory;

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub backend: Arc<MemoryBackend<User>>,
}

impl TestServer {
    /// Serve the app in-process on a free port, backed by a fresh in-memory store
    pub async fn spawn(directory: Option<Arc<dyn TenantDirectory>>) -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let backend = Arc::new(MemoryBackend::<User>::new());
        let state = AppState {
            users: TenantScopedStore::from_arc(backend.clone()),
            check_database: false,
        };
        let boundary = BoundaryState {
            directory,
            trust_identity_headers: true,
            audit: true,
        };

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app(state, boundary)).await;
        });

        let server = Self { port, base_url, backend };
        server.wait_ready(Duration::from_secs(10)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = client.get(format!("{}/health", self.base_url)).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Client bound to one tenant through the trusted identity header
pub fn tenant_client(tenant: &str) -> Result<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert("x-tenant-id", tenant.parse()?);
    Ok(reqwest::Client::builder().default_headers(headers).build()?)
}

pub fn system_client() -> Result<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert("x-system-context", "true".parse()?);
    Ok(reqwest::Client::builder().default_headers(headers).build()?)
}

pub fn agent_payload(username: &str) -> serde_json::Value {
    serde_json::json!({
        "username": username,
        "display_name": null,
        "email": format!("{}@example.test", username),
        "last_login": null,
        "status": "ACTIVE",
        "user_type": "AGENT",
        "agent_id": format!("A-{}", username),
        "domain": "example.test"
    })
}
