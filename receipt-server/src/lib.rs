//! Receipt Server - point-of-sale receipt pipeline
//!
//! Turns an order into a printed receipt:
//!
//! ```text
//! Order → aggregate → render (HTML + encrypted QR) → convert (PDF) → IPP print job
//! ```
//!
//! # Module structure
//!
//! ```text
//! receipt-server/src/
//! ├── core/          # Configuration
//! ├── printing/      # Aggregation, barcode, rendering, conversion, pipeline
//! └── utils/         # Logging
//! ```

pub mod core;
pub mod printing;
pub mod utils;

pub use core::Config;
pub use printing::{PrintOutcome, ReceiptError, ReceiptPipeline, ReceiptResult};
pub use utils::logger::{init_logger, init_logger_with_file};

/// Load `.env`, read configuration and start logging
pub fn setup_environment() -> Config {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    init_logger_with_file(
        Some(&config.log_level),
        Some(config.log_json),
        config.log_dir.as_deref(),
    );
    config
}
