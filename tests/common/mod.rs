//! Common test utilities - ShortpixTest harness for end-to-end testing

#![allow(dead_code)]

pub mod upstream;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::{header, redirect, Client};
use shortpix::kv::{load_record, save_record, FileRecord, KvStore};
use shortpix::{Config, Server};
use tokio::task::JoinHandle;

use upstream::{MockUpstream, BOT_TOKEN, CHAT_ID};

/// Moderation key handed to the service under test
pub const MODERATION_KEY: &str = "test-moderation-key";

/// Test harness that spawns a real shortpix server on a random port,
/// wired to a mock Telegram/moderation/legacy upstream
pub struct ShortpixTest {
    pub addr: SocketAddr,
    pub client: Client,
    pub upstream: MockUpstream,
    server: Arc<Server>,
    _handle: JoinHandle<()>,
}

impl ShortpixTest {
    /// Start a server with the default test configuration
    pub async fn start() -> Result<Self> {
        Self::start_with(|_| {}).await
    }

    /// Start a server, letting the caller adjust the configuration first
    pub async fn start_with(configure: impl FnOnce(&mut Config)) -> Result<Self> {
        let upstream = MockUpstream::start().await?;

        // Find a random available port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        let mut config = Config {
            bind_addr: addr,
            db_path: None, // In-memory for tests
            legacy_origin: format!("{}/legacy", upstream.base_url()),
            ..Config::default()
        };
        config.telegram.api_base = upstream.base_url();
        config.telegram.bot_token = BOT_TOKEN.to_string();
        config.telegram.chat_id = Some(CHAT_ID.to_string());
        config.moderation.api_base = upstream.base_url();
        config.moderation.api_key = Some(MODERATION_KEY.to_string());
        configure(&mut config);

        let server = Arc::new(Server::new(config).await?);
        let server_clone = server.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = server_clone.run().await {
                eprintln!("Server error: {}", e);
            }
        });

        // Redirects are asserted on, never followed
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .redirect(redirect::Policy::none())
            .build()?;

        // Poll until server is ready (max 2 seconds)
        let mut ready = false;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if client
                .get(format!("http://{}/health", addr))
                .send()
                .await
                .is_ok()
            {
                ready = true;
                break;
            }
        }

        if !ready {
            panic!("Server failed to start within 2 seconds");
        }

        Ok(Self {
            addr,
            client,
            upstream,
            server,
            _handle: handle,
        })
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Make a GET request carrying a Referer header
    pub async fn get_with_referer(&self, path: &str, referer: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .header(header::REFERER, referer)
            .send()
            .await?)
    }

    /// Upload a file through the multipart endpoint
    pub async fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<reqwest::Response> {
        let part = reqwest::multipart::Part::bytes(bytes.to_vec()).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        Ok(self
            .client
            .post(format!("{}/upload", self.base_url()))
            .multipart(form)
            .send()
            .await?)
    }

    /// Direct access to the metadata store for setup and assertions
    pub fn store(&self) -> Arc<dyn KvStore> {
        self.server
            .store()
            .expect("test server runs with the metadata store enabled")
    }

    /// Write a record for `code`
    pub async fn seed(&self, code: &str, record: &FileRecord) -> Result<()> {
        save_record(self.store().as_ref(), code, record).await?;
        Ok(())
    }

    /// Read back the record for `code`
    pub async fn record(&self, code: &str) -> Result<Option<FileRecord>> {
        Ok(load_record(self.store().as_ref(), code).await?)
    }

    /// Shutdown the server gracefully
    pub fn shutdown(&self) {
        self.server.shutdown();
    }
}

impl Drop for ShortpixTest {
    fn drop(&mut self) {
        self.shutdown();
    }
}
