#![allow(
    clippy::missing_errors_doc,
    dead_code,
    missing_docs,
    clippy::expect_used
)]
use std::net::TcpListener;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use url::Url;

use pollux_core::PollUntilDoneOptions;
use pollux_core::test_client::{HealthStatus, TestClient, TestServer, TestServerConfig};

use disk_service::client::{DisksClient, PetsClient};
use disk_service::{ServiceConfig, launch};

pub const POLLS_BEFORE_DONE: usize = 3;

#[derive(Debug)]
pub struct AppTestServer {
    config: ServiceConfig,
}

impl TestServer for AppTestServer {
    type Error = std::io::Error;

    async fn launch(&self, listener: TcpListener) -> Result<(), Self::Error> {
        listener.set_nonblocking(true)?;
        let listener = tokio::net::TcpListener::from_std(listener)?;
        info!(?listener, "launching server");
        launch(listener, self.config.clone())
            .await
            .map_err(std::io::Error::other)
    }

    async fn is_healthy(
        &self,
        client: &reqwest::Client,
        base_url: &Url,
    ) -> Result<HealthStatus, Self::Error> {
        let Ok(url) = base_url.join("api/health") else {
            return Ok(HealthStatus::Uncheckable);
        };
        let healthy = client
            .get(url)
            .send()
            .await
            .is_ok_and(|response| response.status().is_success());

        Ok(if healthy {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        })
    }

    fn config(&self) -> TestServerConfig {
        TestServerConfig {
            backoff_jitter: false,
            ..TestServerConfig::default()
        }
    }
}

#[derive(Debug, derive_more::Deref)]
pub struct TestApp {
    #[deref]
    client: TestClient<AppTestServer>,
}

impl TestApp {
    pub async fn start(polls_before_done: usize) -> anyhow::Result<Self> {
        let server = AppTestServer {
            config: ServiceConfig::default().with_polls_before_done(polls_before_done),
        };
        let client = TestClient::start(server)
            .await
            .context("should start the test server")?;

        Ok(Self { client })
    }

    pub fn disks(&self) -> DisksClient {
        DisksClient::new(self.client.client().clone(), self.base_url().clone())
    }

    pub fn pets(&self) -> PetsClient {
        PetsClient::new(self.client.client().clone(), self.base_url().clone())
    }

    pub fn fast_polling() -> PollUntilDoneOptions {
        PollUntilDoneOptions::default().with_frequency(Duration::from_millis(5))
    }
}
