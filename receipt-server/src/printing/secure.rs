//! Encrypted order-identity barcode
//!
//! The receipt carries a QR code with the order id encrypted under the
//! business secret instead of the plain, sequential order number. A second
//! system holding the same key can scan it back to the order (returns,
//! reprints) while anyone else only sees noise.
//!
//! Format: hex(nonce_12bytes || ciphertext || tag_16bytes), where the
//! plaintext is `{"i":<order id>}`.

use std::io::Cursor;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes128Gcm, Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use image::{GrayImage, ImageFormat, Luma};
use qrcode::{Color, EcLevel, QrCode};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroize;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
/// Rendered barcode edge length in pixels
pub const QR_SIZE_PX: u32 = 160;
/// Light modules around the symbol required by scanners
const QUIET_ZONE: usize = 4;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid secret key: {0}")]
    InvalidKey(String),

    #[error("Encryption failed")]
    Encrypt,

    #[error("Decryption failed (wrong key or tampered data)")]
    Decrypt,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Barcode rendering failed: {0}")]
    Barcode(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Symmetric secret for barcode payloads (16 or 32 bytes)
#[derive(Clone)]
pub struct SecretKey {
    bytes: Vec<u8>,
}

impl SecretKey {
    /// Build from raw key bytes
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        match bytes.len() {
            16 | 32 => Ok(Self {
                bytes: bytes.to_vec(),
            }),
            n => Err(CryptoError::InvalidKey(format!(
                "expected 16 or 32 bytes, got {}",
                n
            ))),
        }
    }

    /// Build from a hex string (32 or 64 hex digits)
    pub fn from_hex(value: &str) -> CryptoResult<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(CryptoError::InvalidKey("key is empty".to_string()));
        }
        let mut bytes =
            hex::decode(value).map_err(|e| CryptoError::InvalidKey(format!("not hex: {}", e)))?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey")
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

#[derive(Serialize, Deserialize)]
struct OrderPayload {
    i: u64,
}

enum Cipher {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

impl Cipher {
    fn new(key: &SecretKey) -> CryptoResult<Self> {
        let bytes = key.as_bytes();
        let invalid = |_| CryptoError::InvalidKey(format!("bad key length {}", bytes.len()));
        match bytes.len() {
            16 => Ok(Cipher::Aes128(Box::new(
                Aes128Gcm::new_from_slice(bytes).map_err(invalid)?,
            ))),
            32 => Ok(Cipher::Aes256(Box::new(
                Aes256Gcm::new_from_slice(bytes).map_err(invalid)?,
            ))),
            n => Err(CryptoError::InvalidKey(format!("bad key length {}", n))),
        }
    }

    fn encrypt(&self, nonce: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let nonce = Nonce::from_slice(nonce);
        match self {
            Cipher::Aes128(c) => c.encrypt(nonce, plaintext),
            Cipher::Aes256(c) => c.encrypt(nonce, plaintext),
        }
        .map_err(|_| CryptoError::Encrypt)
    }

    fn decrypt(&self, nonce: &[u8], ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        let nonce = Nonce::from_slice(nonce);
        match self {
            Cipher::Aes128(c) => c.decrypt(nonce, ciphertext),
            Cipher::Aes256(c) => c.decrypt(nonce, ciphertext),
        }
        .map_err(|_| CryptoError::Decrypt)
    }
}

/// Rendered barcode and the payload it encodes
#[derive(Debug, Clone)]
pub struct BarcodeImage {
    /// Hex payload embedded in the QR code
    pub payload: String,
    /// PNG bytes
    pub png: Vec<u8>,
}

impl BarcodeImage {
    /// Base64 PNG for `data:` URIs in the receipt template
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.png)
    }
}

/// Encrypts order ids and renders them as QR codes
pub struct SecurePayloadEncoder {
    cipher: Cipher,
}

impl SecurePayloadEncoder {
    /// Initialise the cipher; fails on a malformed key
    pub fn new(key: &SecretKey) -> CryptoResult<Self> {
        Ok(Self {
            cipher: Cipher::new(key)?,
        })
    }

    /// Encrypt an order id into the hex barcode payload
    ///
    /// Every call draws a fresh random nonce.
    pub fn encrypt_payload(&self, order_id: u64) -> CryptoResult<String> {
        let plaintext = serde_json::to_vec(&OrderPayload { i: order_id })
            .map_err(|e| CryptoError::InvalidPayload(e.to_string()))?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self.cipher.encrypt(&nonce, &plaintext)?;

        // nonce || ciphertext (includes tag)
        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(hex::encode(out))
    }

    /// Encrypt an order id and render it as a QR code PNG
    pub fn encode(&self, order_id: u64) -> CryptoResult<BarcodeImage> {
        let payload = self.encrypt_payload(order_id)?;
        let png = render_qr_png(&payload, QR_SIZE_PX)?;
        Ok(BarcodeImage { payload, png })
    }

    /// Recover the order id from a scanned payload
    pub fn decode(&self, payload: &str) -> CryptoResult<u64> {
        let data = hex::decode(payload.trim())
            .map_err(|e| CryptoError::InvalidPayload(format!("not hex: {}", e)))?;

        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::InvalidPayload("ciphertext too short".to_string()));
        }

        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        let plaintext = self.cipher.decrypt(nonce, ciphertext)?;

        let payload: OrderPayload = serde_json::from_slice(&plaintext)
            .map_err(|e| CryptoError::InvalidPayload(e.to_string()))?;
        Ok(payload.i)
    }
}

/// Render `data` as a QR code (EC level M) on a square grayscale PNG
fn render_qr_png(data: &str, size: u32) -> CryptoResult<Vec<u8>> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::M)
        .map_err(|e| CryptoError::Barcode(e.to_string()))?;

    let modules = code.width();
    let colors = code.to_colors();
    let total = modules + 2 * QUIET_ZONE;
    let px = size as usize;

    // Whole pixels per module keep every module the same size for scanners
    let scale = px / total;
    if scale == 0 {
        return Err(CryptoError::Barcode(format!(
            "{} modules do not fit in {}px",
            total, size
        )));
    }
    let offset = (px - total * scale) / 2;

    let is_dark = |x: u32, y: u32| -> bool {
        let (x, y) = (x as usize, y as usize);
        if x < offset || y < offset {
            return false;
        }
        let (mx, my) = ((x - offset) / scale, (y - offset) / scale);
        if mx < QUIET_ZONE || my < QUIET_ZONE {
            return false;
        }
        let (mx, my) = (mx - QUIET_ZONE, my - QUIET_ZONE);
        mx < modules && my < modules && colors[my * modules + mx] == Color::Dark
    };

    let image = GrayImage::from_fn(size, size, |x, y| {
        if is_dark(x, y) { Luma([0]) } else { Luma([255]) }
    });

    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| CryptoError::Barcode(e.to_string()))?;
    Ok(png)
}
