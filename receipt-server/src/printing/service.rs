//! Receipt print service
//!
//! Runs aggregation → barcode → render → convert → submit for one order and
//! maps the outcome to a status code.

use std::path::PathBuf;
use std::sync::Arc;

use crab_printer::{IppConnector, PrintError, PrintJob, PrinterClient};
use dashmap::DashMap;
use rust_decimal::Decimal;
use shared::models::{BusinessInfo, Order};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, instrument};

use crate::core::Config;

use super::aggregate::aggregate;
use super::converter::{ConvertError, DocumentConverter, PageSize};
use super::renderer::{ReceiptContext, ReceiptRenderer, RenderError};
use super::secure::{CryptoError, SecurePayloadEncoder};

/// Status reported for failures before anything reaches the printer
pub const INTERNAL_ERROR_STATUS: i32 = 99;

#[derive(Debug, Error)]
pub enum ReceiptError {
    #[error("Barcode error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    #[error("Print error: {0}")]
    Print(#[from] PrintError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ReceiptResult<T> = Result<T, ReceiptError>;

impl ReceiptError {
    /// Status code reported to the caller
    ///
    /// - 99: failed locally before submission
    /// - IPP / HTTP status: the print server answered with a rejection
    /// - -1: transport failure with no protocol reply
    pub fn status_code(&self) -> i32 {
        match self {
            ReceiptError::Print(PrintError::Io(_) | PrintError::InvalidConfig(_)) => {
                INTERNAL_ERROR_STATUS
            }
            ReceiptError::Print(e) => e.status_code(),
            _ => INTERNAL_ERROR_STATUS,
        }
    }
}

/// Result of one print request
#[derive(Debug)]
pub struct PrintOutcome {
    pub status_code: i32,
    pub job_id: Option<i32>,
    pub error: Option<ReceiptError>,
}

impl PrintOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl From<ReceiptResult<PrintJob>> for PrintOutcome {
    fn from(result: ReceiptResult<PrintJob>) -> Self {
        match result {
            Ok(job) => Self {
                status_code: i32::from(job.status_code),
                job_id: job.job_id,
                error: None,
            },
            Err(e) => Self {
                status_code: e.status_code(),
                job_id: None,
                error: Some(e),
            },
        }
    }
}

/// Receipt pipeline for one printer and one template
pub struct ReceiptPipeline {
    renderer: ReceiptRenderer,
    encoder: SecurePayloadEncoder,
    converter: Box<dyn DocumentConverter>,
    printer: PrinterClient,
    business: BusinessInfo,
    receipts_dir: PathBuf,
    queue: String,
    page: PageSize,
    /// Serializes prints of the same order (they share file names)
    order_locks: DashMap<u64, Arc<Mutex<()>>>,
}

impl ReceiptPipeline {
    pub fn new(
        renderer: ReceiptRenderer,
        encoder: SecurePayloadEncoder,
        converter: impl DocumentConverter + 'static,
        printer: PrinterClient,
    ) -> Self {
        Self {
            renderer,
            encoder,
            converter: Box::new(converter),
            printer,
            business: BusinessInfo::default(),
            receipts_dir: PathBuf::from("receipts"),
            queue: "receipt".to_string(),
            page: PageSize::default(),
            order_locks: DashMap::new(),
        }
    }

    /// Assemble the pipeline from configuration
    ///
    /// Fails on a missing or malformed secret key or template. The printer is
    /// not contacted until the first print.
    pub fn from_config(config: &Config) -> ReceiptResult<Self> {
        let renderer = ReceiptRenderer::from_file(&config.template_path)?;
        let encoder = SecurePayloadEncoder::new(&config.secret_key()?)?;
        let printer = PrinterClient::new(IppConnector::new(config.printer_config()));

        Ok(Self::new(renderer, encoder, config.converter(), printer)
            .with_business(config.business_info())
            .with_receipts_dir(&config.receipts_dir)
            .with_queue(&config.printer_queue)
            .with_page_size(config.page_size()))
    }

    pub fn with_business(mut self, business: BusinessInfo) -> Self {
        self.business = business;
        self
    }

    pub fn with_receipts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.receipts_dir = dir.into();
        self
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    pub fn with_page_size(mut self, page: PageSize) -> Self {
        self.page = page;
        self
    }

    pub fn printer(&self) -> &PrinterClient {
        &self.printer
    }

    pub fn encoder(&self) -> &SecurePayloadEncoder {
        &self.encoder
    }

    /// Print a receipt, reporting failures through the outcome
    #[instrument(skip(self, order), fields(order_id = order.id))]
    pub async fn print_order(&self, order: &Order, total: Decimal) -> PrintOutcome {
        let outcome = PrintOutcome::from(self.print_order_checked(order, total).await);
        match &outcome.error {
            None => info!(job_id = ?outcome.job_id, "Receipt printed"),
            Some(e) => error!(status = outcome.status_code, error = %e, "Receipt print failed"),
        }
        outcome
    }

    /// Print a receipt and return the accepted job
    pub async fn print_order_checked(&self, order: &Order, total: Decimal) -> ReceiptResult<PrintJob> {
        let lock = self.order_lock(order.id);
        let result = {
            let _guard = lock.lock().await;
            self.run(order, total).await
        };
        drop(lock);
        self.order_locks
            .remove_if(&order.id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    fn order_lock(&self, order_id: u64) -> Arc<Mutex<()>> {
        self.order_locks
            .entry(order_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    async fn run(&self, order: &Order, total: Decimal) -> ReceiptResult<PrintJob> {
        let rows = aggregate(&order.products);
        let barcode = self.encoder.encode(order.id)?;
        let ctx = ReceiptContext::new(order, total, &rows, &barcode, &self.business);

        let html = self.renderer.render_to_file(&ctx, &self.receipts_dir).await?;
        let pdf = self.receipts_dir.join(format!("receipt-{}.pdf", order.id));
        self.converter.convert(&html, &pdf, self.page).await?;

        let job = self.printer.print(&pdf, &self.queue).await?;
        Ok(job)
    }
}
