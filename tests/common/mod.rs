//! Common test utilities

use std::net::SocketAddr;

use backend_utils::auth::Auth;
use backend_utils::config::{AppInfo, AuthConfig, Config, TelemetryConfig};
use backend_utils::server::{build_router, serve};
use tokio::net::TcpListener;

pub const TEST_SECRET: &str = "test-secret-key-for-testing-purposes";

/// Server running on an ephemeral port for the duration of a test
pub struct TestApp {
    pub addr: SocketAddr,
    pub config: Config,
}

#[allow(dead_code)]
impl TestApp {
    /// Create a test configuration
    pub fn test_config() -> Config {
        Config {
            http_host: "127.0.0.1".to_string(),
            http_port: 0, // Random port
            app: AppInfo {
                name: "backend-utils-test".to_string(),
                version: "0.0.1".to_string(),
            },
            auth: Some(AuthConfig::new(TEST_SECRET, "test-public-key")),
            telemetry: TelemetryConfig::default(),
        }
    }

    pub async fn spawn() -> Self {
        Self::spawn_with(Self::test_config()).await
    }

    pub async fn spawn_with(config: Config) -> Self {
        let router = build_router(&config).expect("Failed to build router");
        let listener = TcpListener::bind(config.http_addr())
            .await
            .expect("Failed to bind random port");
        let addr = listener.local_addr().expect("Failed to read local address");

        tokio::spawn(async move {
            if let Err(e) = serve(listener, router).await {
                eprintln!("Test server stopped: {e:#}");
            }
        });

        Self { addr, config }
    }

    /// Create HTTP client for testing
    pub fn http_client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client")
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// `Auth` built from the same configuration as the server
    pub fn auth(&self) -> Auth {
        let config = self.config.auth.clone().expect("Auth is not configured");
        Auth::new(config).expect("Invalid auth configuration")
    }
}
