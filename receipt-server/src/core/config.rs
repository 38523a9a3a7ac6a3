use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crab_printer::PrinterConfig;
use shared::models::BusinessInfo;

use crate::printing::{CryptoError, CryptoResult, PageSize, SecretKey, WkHtmlToPdf};

/// Receipt server configuration
///
/// # Environment variables
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | WORK_DIR | . | Base directory for relative paths |
/// | RECEIPTS_DIR | <WORK_DIR>/receipts | Rendered HTML and PDF receipts |
/// | RECEIPT_TEMPLATE | <WORK_DIR>/templates/receipt.html | Receipt template |
/// | PRINTER_HOST | localhost | Print server host |
/// | PRINTER_PORT | 631 | Print server port |
/// | PRINTER_USERNAME / PRINTER_PASSWORD | (empty) | Basic auth credentials |
/// | PRINTER_QUEUE | receipt | Print queue name |
/// | PRINTER_USE_TLS | false | Use ipps / https |
/// | PRINTER_TIMEOUT_MS | 10000 | IPP request timeout |
/// | BUSINESS_NAME, BUSINESS_ADDRESS1, BUSINESS_ADDRESS2 | (empty) | Receipt header |
/// | RECEIPT_SECRET_KEY | (required) | Hex barcode key, 16 or 32 bytes |
/// | CONVERTER_BIN | wkhtmltopdf | HTML → PDF converter |
/// | PAGE_WIDTH_MM / PAGE_HEIGHT_MM | 60 / 200 | Receipt page size |
/// | CONVERT_TIMEOUT_MS | 30000 | Converter timeout |
/// | LOG_LEVEL | info | Log filter |
/// | LOG_JSON | false | JSON log lines |
/// | LOG_DIR | (none) | Daily rolling log files |
///
/// # Example
///
/// ```ignore
/// PRINTER_HOST=192.168.1.50 RECEIPT_SECRET_KEY=00112233445566778899aabbccddeeff \
///     receipt-server order.json
/// ```
#[derive(Clone)]
pub struct Config {
    pub work_dir: String,
    pub receipts_dir: String,
    pub template_path: String,

    // === Printer ===
    pub printer_host: String,
    pub printer_port: u16,
    pub printer_username: String,
    pub printer_password: String,
    pub printer_queue: String,
    pub printer_use_tls: bool,
    pub printer_timeout_ms: u64,

    // === Business ===
    pub business_name: String,
    pub business_address1: String,
    pub business_address2: String,
    /// Hex-encoded barcode key
    pub secret_key: Option<String>,

    // === Conversion ===
    pub converter_bin: String,
    pub page_width_mm: u32,
    pub page_height_mm: u32,
    pub convert_timeout_ms: u64,

    // === Logging ===
    pub log_level: String,
    pub log_json: bool,
    pub log_dir: Option<String>,
}

impl Config {
    /// Load configuration from the process environment
    ///
    /// Unset or unparsable values fall back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let work_dir = var("WORK_DIR").unwrap_or_else(|| ".".into());
        let in_work_dir = |rel: &str| {
            PathBuf::from(&work_dir)
                .join(rel)
                .to_string_lossy()
                .into_owned()
        };

        Self {
            receipts_dir: var("RECEIPTS_DIR").unwrap_or_else(|| in_work_dir("receipts")),
            template_path: var("RECEIPT_TEMPLATE")
                .unwrap_or_else(|| in_work_dir("templates/receipt.html")),

            printer_host: var("PRINTER_HOST").unwrap_or_else(|| "localhost".into()),
            printer_port: parse(var("PRINTER_PORT")).unwrap_or(631),
            printer_username: var("PRINTER_USERNAME").unwrap_or_default(),
            printer_password: var("PRINTER_PASSWORD").unwrap_or_default(),
            printer_queue: var("PRINTER_QUEUE").unwrap_or_else(|| "receipt".into()),
            printer_use_tls: parse(var("PRINTER_USE_TLS")).unwrap_or(false),
            printer_timeout_ms: parse(var("PRINTER_TIMEOUT_MS")).unwrap_or(10000),

            business_name: var("BUSINESS_NAME").unwrap_or_default(),
            business_address1: var("BUSINESS_ADDRESS1").unwrap_or_default(),
            business_address2: var("BUSINESS_ADDRESS2").unwrap_or_default(),
            secret_key: var("RECEIPT_SECRET_KEY"),

            converter_bin: var("CONVERTER_BIN").unwrap_or_else(|| "wkhtmltopdf".into()),
            page_width_mm: parse(var("PAGE_WIDTH_MM")).unwrap_or(60),
            page_height_mm: parse(var("PAGE_HEIGHT_MM")).unwrap_or(200),
            convert_timeout_ms: parse(var("CONVERT_TIMEOUT_MS")).unwrap_or(30000),

            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            log_json: parse(var("LOG_JSON")).unwrap_or(false),
            log_dir: var("LOG_DIR"),

            work_dir,
        }
    }

    pub fn printer_config(&self) -> PrinterConfig {
        let mut config = PrinterConfig::new(&self.printer_host, self.printer_port, &self.printer_queue)
            .with_credentials(&self.printer_username, &self.printer_password)
            .with_timeout(Duration::from_millis(self.printer_timeout_ms));
        config.use_tls = self.printer_use_tls;
        config
    }

    pub fn business_info(&self) -> BusinessInfo {
        BusinessInfo {
            name: self.business_name.clone(),
            address1: self.business_address1.clone(),
            address2: self.business_address2.clone(),
        }
    }

    /// Parse the barcode key; missing or malformed keys are an error
    pub fn secret_key(&self) -> CryptoResult<SecretKey> {
        match &self.secret_key {
            Some(hex) => SecretKey::from_hex(hex),
            None => Err(CryptoError::InvalidKey(
                "RECEIPT_SECRET_KEY is not set".to_string(),
            )),
        }
    }

    pub fn page_size(&self) -> PageSize {
        PageSize::new(self.page_width_mm, self.page_height_mm)
    }

    pub fn converter(&self) -> WkHtmlToPdf {
        WkHtmlToPdf::new(&self.converter_bin)
            .with_timeout(Duration::from_millis(self.convert_timeout_ms))
    }
}

fn parse<T: FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("work_dir", &self.work_dir)
            .field("receipts_dir", &self.receipts_dir)
            .field("template_path", &self.template_path)
            .field("printer", &self.printer_config().base_url())
            .field("printer_queue", &self.printer_queue)
            .field("printer_username", &self.printer_username)
            .field("business_name", &self.business_name)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("converter_bin", &self.converter_bin)
            .field("page", &self.page_size())
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}
