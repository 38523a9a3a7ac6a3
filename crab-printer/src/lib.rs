//! # crab-printer
//!
//! Network print-server client - delivery of finished documents only.
//!
//! ## Scope
//!
//! This crate handles HOW a document reaches the printer:
//! - IPP message encoding/decoding
//! - IPP over HTTP(S) submission to a CUPS-style print server
//! - Connection health checks and reconnects
//!
//! Business logic (WHAT to print) stays in application code:
//! - Receipt rendering and conversion → receipt-server
//!
//! ## Example
//!
//! ```ignore
//! use crab_printer::{IppConnector, PrinterClient, PrinterConfig};
//!
//! let config = PrinterConfig::new("192.168.1.100", 631, "receipt")
//!     .with_credentials("pos", "secret");
//!
//! let client = PrinterClient::new(IppConnector::new(config));
//! client.connect().await?;
//!
//! let job = client.print("receipts/receipt-42.pdf", "receipt").await?;
//! println!("job id: {:?}", job.job_id);
//! ```

mod client;
mod error;
pub mod ipp;
mod printer;

// Re-exports
pub use client::{ConnectionState, PrinterClient};
pub use error::{PrintError, PrintResult};
pub use printer::{Connector, IppConnection, IppConnector, PrintJob, PrinterConfig, PrinterConnection};
