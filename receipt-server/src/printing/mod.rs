//! Receipt printing module
//!
//! One order in, one print job out:
//! - Aggregation: duplicate line items collapse into quantity rows
//! - Secure barcode: encrypted order id rendered as a QR code
//! - Rendering: HTML receipt from a runtime template
//! - Conversion: HTML → PDF through an external converter
//! - Submission: `crab_printer::PrinterClient`

pub mod aggregate;
pub mod converter;
pub mod renderer;
pub mod secure;
pub mod service;

pub use aggregate::aggregate;
pub use converter::{ConvertError, ConvertResult, DocumentConverter, PageSize, WkHtmlToPdf};
pub use renderer::{ReceiptContext, ReceiptRenderer, RenderError, RenderResult, format_money};
pub use secure::{BarcodeImage, CryptoError, CryptoResult, SecretKey, SecurePayloadEncoder};
pub use service::{
    INTERNAL_ERROR_STATUS, PrintOutcome, ReceiptError, ReceiptPipeline, ReceiptResult,
};
