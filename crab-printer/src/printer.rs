//! Print-server connections
//!
//! Supports:
//! - IPP over HTTP(S) (CUPS and IPP Everywhere servers)
//!
//! A [`Connector`] produces [`PrinterConnection`]s; the [`crate::PrinterClient`]
//! owns one connection at a time and replaces it when it goes stale.

use crate::error::{PrintError, PrintResult};
use crate::ipp::{self, IppBuilder, IppResponse};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{info, instrument, warn};

const IPP_CONTENT_TYPE: &str = "application/ipp";
const DEFAULT_DOCUMENT_FORMAT: &str = "application/octet-stream";

/// Print server settings
#[derive(Debug, Clone)]
pub struct PrinterConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Target queue (CUPS printer name)
    pub queue: String,
    pub use_tls: bool,
    /// Per-request timeout
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

impl PrinterConfig {
    /// Create a config with no credentials and default timeout
    pub fn new(host: &str, port: u16, queue: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            username: String::new(),
            password: String::new(),
            queue: queue.to_string(),
            use_tls: false,
            timeout: default_timeout(),
        }
    }

    /// Set basic-auth credentials
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.username = username.to_string();
        self.password = password.to_string();
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// HTTP base URL of the server (e.g. "http://cups.local:631")
    pub fn base_url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// HTTP endpoint for a queue
    pub fn queue_url(&self, queue: &str) -> String {
        format!("{}/printers/{}", self.base_url(), queue)
    }

    /// `printer-uri` attribute value for a queue
    pub fn printer_uri(&self, queue: &str) -> String {
        let scheme = if self.use_tls { "ipps" } else { "ipp" };
        format!("{}://{}:{}/printers/{}", scheme, self.host, self.port, queue)
    }

    fn validate(&self) -> PrintResult<()> {
        if self.host.trim().is_empty() {
            return Err(PrintError::InvalidConfig("empty printer host".to_string()));
        }
        if self.port == 0 {
            return Err(PrintError::InvalidConfig("printer port is 0".to_string()));
        }
        Ok(())
    }
}

/// Accepted print job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJob {
    /// IPP status code of the reply (successful range)
    pub status_code: u16,
    /// Server-assigned job id, when reported
    pub job_id: Option<i32>,
}

/// A live connection to a print server
#[async_trait]
pub trait PrinterConnection: Send + Sync {
    /// Check that the server still answers
    async fn test_connection(&self) -> PrintResult<()>;

    /// Submit one document to a queue as a single job with no job attributes
    async fn submit_job(&self, queue: &str, job_name: &str, document: &[u8])
    -> PrintResult<PrintJob>;
}

/// Factory for printer connections
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> PrintResult<Box<dyn PrinterConnection>>;
}

/// IPP connection backed by a pooled HTTP client
pub struct IppConnection {
    config: PrinterConfig,
    http: reqwest::Client,
    next_request_id: AtomicU32,
}

impl IppConnection {
    /// Build the HTTP client for a config
    pub fn new(config: PrinterConfig) -> PrintResult<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .no_proxy()
            .build()
            .map_err(|e| PrintError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http,
            next_request_id: AtomicU32::new(1),
        })
    }

    pub fn config(&self) -> &PrinterConfig {
        &self.config
    }

    fn request_id(&self) -> u32 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }

    fn requesting_user(&self) -> &str {
        if self.config.username.is_empty() {
            "receipt-server"
        } else {
            &self.config.username
        }
    }

    /// Encode a Print-Job request for `queue`
    pub fn print_job_request(
        &self,
        queue: &str,
        job_name: &str,
        document: &[u8],
    ) -> PrintResult<Vec<u8>> {
        let mut b = IppBuilder::request(ipp::operation::PRINT_JOB, self.request_id());
        b.standard_operation_attributes()
            .uri("printer-uri", &self.config.printer_uri(queue))
            .name("requesting-user-name", self.requesting_user())
            .name("job-name", job_name)
            .mime_media_type("document-format", DEFAULT_DOCUMENT_FORMAT);
        b.build_with_document(document)
    }

    async fn post(&self, url: &str, body: Vec<u8>) -> PrintResult<IppResponse> {
        let mut req = self
            .http
            .post(url)
            .header(CONTENT_TYPE, IPP_CONTENT_TYPE)
            .body(body);

        if !self.config.username.is_empty() {
            req = req.basic_auth(&self.config.username, Some(&self.config.password));
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PrintError::Http {
                status: status.as_u16(),
            });
        }

        let bytes = resp.bytes().await?;
        IppResponse::parse(&bytes)
    }
}

#[async_trait]
impl PrinterConnection for IppConnection {
    #[instrument(skip(self), fields(server = %self.config.base_url()))]
    async fn test_connection(&self) -> PrintResult<()> {
        let mut req = self.http.get(self.config.base_url());
        if !self.config.username.is_empty() {
            req = req.basic_auth(&self.config.username, Some(&self.config.password));
        }

        let resp = req.send().await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            warn!(status = %resp.status(), "Print server test failed");
            Err(PrintError::Http {
                status: resp.status().as_u16(),
            })
        }
    }

    #[instrument(skip(self, document), fields(data_len = document.len()))]
    async fn submit_job(
        &self,
        queue: &str,
        job_name: &str,
        document: &[u8],
    ) -> PrintResult<PrintJob> {
        let body = self.print_job_request(queue, job_name, document)?;
        let resp = self.post(&self.config.queue_url(queue), body).await?;

        if !resp.is_success() {
            let message = resp
                .status_message()
                .unwrap_or_else(|| ipp::status_name(resp.status_code))
                .to_string();
            warn!(status = resp.status_code, %message, "Print job rejected");
            return Err(PrintError::Ipp {
                status: resp.status_code,
                message,
            });
        }

        let job = PrintJob {
            status_code: resp.status_code,
            job_id: resp.job_id(),
        };
        info!(job_id = ?job.job_id, "Print job accepted");
        Ok(job)
    }
}

/// Connector producing [`IppConnection`]s for one server
#[derive(Debug, Clone)]
pub struct IppConnector {
    config: PrinterConfig,
}

impl IppConnector {
    pub fn new(config: PrinterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PrinterConfig {
        &self.config
    }
}

#[async_trait]
impl Connector for IppConnector {
    #[instrument(skip(self), fields(server = %self.config.base_url()))]
    async fn connect(&self) -> PrintResult<Box<dyn PrinterConnection>> {
        let conn = IppConnection::new(self.config.clone())?;
        conn.test_connection()
            .await
            .map_err(|e| PrintError::Connection(format!("{}: {}", self.config.base_url(), e)))?;
        info!("Connected to print server");
        Ok(Box::new(conn))
    }
}
