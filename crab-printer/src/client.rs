//! Long-lived printer client
//!
//! Owns the single connection to the print server and repairs it before
//! every job:
//!
//! ```text
//! Disconnected ──connect ok──▶ Connected
//! Connected ──test fails──▶ Disconnected ──one reconnect──▶ Connected | error
//! Connected ──submit_job──▶ Connected   (job failures never drop the connection)
//! ```
//!
//! The test-and-reconnect step and the submission run under one lock, so
//! concurrent prints never race on the connection.

use std::path::Path;

use crate::error::{PrintError, PrintResult};
use crate::printer::{Connector, PrintJob, PrinterConnection};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// Connection state as seen by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

struct ClientInner {
    connection: Option<Box<dyn PrinterConnection>>,
    state: ConnectionState,
    reconnects: u64,
}

/// Printer client with an owned, self-repairing connection
pub struct PrinterClient {
    connector: Box<dyn Connector>,
    inner: Mutex<ClientInner>,
}

impl PrinterClient {
    /// Create a disconnected client
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self {
            connector: Box::new(connector),
            inner: Mutex::new(ClientInner {
                connection: None,
                state: ConnectionState::Disconnected,
                reconnects: 0,
            }),
        }
    }

    /// Current connection state
    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    /// Number of reconnects performed after a failed connection test
    pub async fn reconnect_count(&self) -> u64 {
        self.inner.lock().await.reconnects
    }

    /// Open (or replace) the connection
    pub async fn connect(&self) -> PrintResult<()> {
        let mut inner = self.inner.lock().await;
        self.connect_locked(&mut inner).await
    }

    /// Test the connection and reconnect once if the test fails
    pub async fn ensure_connected(&self) -> PrintResult<()> {
        let mut inner = self.inner.lock().await;
        self.ensure_connected_locked(&mut inner).await
    }

    /// Print a document file to `queue`
    ///
    /// The file name becomes the job name. A failed reconnect aborts before
    /// submission; a rejected job leaves the connection in place.
    #[instrument(skip(self, document_path), fields(document = %document_path.as_ref().display()))]
    pub async fn print(
        &self,
        document_path: impl AsRef<Path>,
        queue: &str,
    ) -> PrintResult<PrintJob> {
        let path = document_path.as_ref();
        let document = tokio::fs::read(path).await?;
        let job_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "receipt".to_string());

        let mut inner = self.inner.lock().await;
        self.ensure_connected_locked(&mut inner).await?;

        let connection = inner
            .connection
            .as_ref()
            .ok_or_else(|| PrintError::Connection("no printer connection".to_string()))?;

        info!(bytes = document.len(), "Submitting print job");
        connection.submit_job(queue, &job_name, &document).await
    }

    async fn connect_locked(&self, inner: &mut ClientInner) -> PrintResult<()> {
        match self.connector.connect().await {
            Ok(connection) => {
                inner.connection = Some(connection);
                inner.state = ConnectionState::Connected;
                Ok(())
            }
            Err(e) => {
                inner.connection = None;
                inner.state = ConnectionState::Disconnected;
                Err(e)
            }
        }
    }

    async fn ensure_connected_locked(&self, inner: &mut ClientInner) -> PrintResult<()> {
        if let Some(connection) = inner.connection.as_ref() {
            match connection.test_connection().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(error = %e, "Printer connection test failed, reconnecting");
                    inner.state = ConnectionState::Disconnected;
                    inner.reconnects += 1;
                }
            }
        }

        self.connect_locked(inner).await.map_err(|e| {
            warn!(error = %e, "Printer reconnect failed");
            match e {
                PrintError::Connection(_)
                | PrintError::Timeout(_)
                | PrintError::InvalidConfig(_) => e,
                other => PrintError::Connection(other.to_string()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Shared knobs and counters for the mock server
    #[derive(Default)]
    struct MockServer {
        healthy: AtomicBool,
        refuse_connect: AtomicBool,
        bad_config: AtomicBool,
        reject_jobs: AtomicBool,
        connects: AtomicUsize,
        tests: AtomicUsize,
        submits: AtomicUsize,
    }

    struct MockConnection {
        server: Arc<MockServer>,
    }

    #[async_trait]
    impl PrinterConnection for MockConnection {
        async fn test_connection(&self) -> PrintResult<()> {
            self.server.tests.fetch_add(1, Ordering::SeqCst);
            if self.server.healthy.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(PrintError::Connection("stale".to_string()))
            }
        }

        async fn submit_job(
            &self,
            _queue: &str,
            _job_name: &str,
            _document: &[u8],
        ) -> PrintResult<PrintJob> {
            let n = self.server.submits.fetch_add(1, Ordering::SeqCst);
            if self.server.reject_jobs.load(Ordering::SeqCst) {
                return Err(PrintError::Ipp {
                    status: 0x0506,
                    message: "not accepting jobs".to_string(),
                });
            }
            Ok(PrintJob {
                status_code: 0,
                job_id: Some(n as i32 + 1),
            })
        }
    }

    struct MockConnector {
        server: Arc<MockServer>,
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn connect(&self) -> PrintResult<Box<dyn PrinterConnection>> {
            self.server.connects.fetch_add(1, Ordering::SeqCst);
            if self.server.bad_config.load(Ordering::SeqCst) {
                return Err(PrintError::InvalidConfig("port must be non-zero".to_string()));
            }
            if self.server.refuse_connect.load(Ordering::SeqCst) {
                return Err(PrintError::Connection("refused".to_string()));
            }
            self.server.healthy.store(true, Ordering::SeqCst);
            Ok(Box::new(MockConnection {
                server: self.server.clone(),
            }))
        }
    }

    fn client() -> (PrinterClient, Arc<MockServer>) {
        let server = Arc::new(MockServer::default());
        let client = PrinterClient::new(MockConnector {
            server: server.clone(),
        });
        (client, server)
    }

    fn document() -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"%PDF-1.4 test").unwrap();
        file
    }

    #[tokio::test]
    async fn test_initial_state_disconnected() {
        let (client, _) = client();
        assert_eq!(client.state().await, ConnectionState::Disconnected);

        client.connect().await.unwrap();
        assert_eq!(client.state().await, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_print_on_healthy_connection_does_not_reconnect() {
        let (client, server) = client();
        client.connect().await.unwrap();
        let doc = document();

        let job = client.print(doc.path(), "receipt").await.unwrap();

        assert_eq!(job.job_id, Some(1));
        assert_eq!(server.connects.load(Ordering::SeqCst), 1);
        assert_eq!(server.tests.load(Ordering::SeqCst), 1);
        assert_eq!(client.reconnect_count().await, 0);
    }

    #[tokio::test]
    async fn test_failed_test_triggers_exactly_one_reconnect() {
        let (client, server) = client();
        client.connect().await.unwrap();
        server.healthy.store(false, Ordering::SeqCst);
        let doc = document();

        let job = client.print(doc.path(), "receipt").await.unwrap();

        assert_eq!(job.status_code, 0);
        assert_eq!(server.connects.load(Ordering::SeqCst), 2);
        assert_eq!(server.submits.load(Ordering::SeqCst), 1);
        assert_eq!(client.reconnect_count().await, 1);
        assert_eq!(client.state().await, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_reconnect_failure_skips_submission() {
        let (client, server) = client();
        client.connect().await.unwrap();
        server.healthy.store(false, Ordering::SeqCst);
        server.refuse_connect.store(true, Ordering::SeqCst);
        let doc = document();

        let err = client.print(doc.path(), "receipt").await.unwrap_err();

        assert!(matches!(err, PrintError::Connection(_)));
        assert_eq!(err.status_code(), -1);
        // Exactly one reconnect attempt, no submission
        assert_eq!(server.connects.load(Ordering::SeqCst), 2);
        assert_eq!(server.submits.load(Ordering::SeqCst), 0);
        assert_eq!(client.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_invalid_config_is_not_reported_as_connection_error() {
        let (client, server) = client();
        server.bad_config.store(true, Ordering::SeqCst);
        let doc = document();

        let err = client.print(doc.path(), "receipt").await.unwrap_err();

        assert!(matches!(err, PrintError::InvalidConfig(_)));
        assert_eq!(server.submits.load(Ordering::SeqCst), 0);
        assert_eq!(client.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_print_connects_lazily() {
        let (client, server) = client();
        let doc = document();

        client.print(doc.path(), "receipt").await.unwrap();

        assert_eq!(server.connects.load(Ordering::SeqCst), 1);
        assert_eq!(server.tests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejected_job_keeps_connection() {
        let (client, server) = client();
        client.connect().await.unwrap();
        server.reject_jobs.store(true, Ordering::SeqCst);
        let doc = document();

        let err = client.print(doc.path(), "receipt").await.unwrap_err();

        assert_eq!(err.status_code(), 0x0506);
        assert_eq!(client.state().await, ConnectionState::Connected);
        assert_eq!(server.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_document_is_io_error() {
        let (client, server) = client();

        let err = client
            .print("/nonexistent/receipt-1.pdf", "receipt")
            .await
            .unwrap_err();

        assert!(matches!(err, PrintError::Io(_)));
        assert_eq!(server.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_prints_share_one_reconnect() {
        let (client, server) = client();
        client.connect().await.unwrap();
        server.healthy.store(false, Ordering::SeqCst);
        let client = Arc::new(client);
        let doc = document();
        let path = doc.path().to_path_buf();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let client = client.clone();
            let path = path.clone();
            handles.push(tokio::spawn(async move {
                client.print(&path, "receipt").await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        // The first print repairs the connection; the rest see it healthy
        assert_eq!(server.connects.load(Ordering::SeqCst), 2);
        assert_eq!(server.submits.load(Ordering::SeqCst), 8);
        assert_eq!(client.reconnect_count().await, 1);
    }
}
