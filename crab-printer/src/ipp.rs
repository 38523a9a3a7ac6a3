//! IPP message codec
//!
//! Binary encoding of Internet Printing Protocol messages (RFC 8010):
//!
//! ```text
//! version-number   2 bytes  (major, minor)
//! operation-id     2 bytes  (status-code in responses)
//! request-id       4 bytes
//! attribute groups ...      (delimiter tag, then value attributes)
//! end-of-attributes 0x03
//! document data    ...
//! ```
//!
//! Only the subset needed to submit a job and read the reply is covered.

use crate::error::{PrintError, PrintResult};

/// Protocol version sent in requests
pub const IPP_VERSION: (u8, u8) = (2, 0);

/// Delimiter and value tags
pub mod tag {
    pub const OPERATION_ATTRIBUTES: u8 = 0x01;
    pub const JOB_ATTRIBUTES: u8 = 0x02;
    pub const END_OF_ATTRIBUTES: u8 = 0x03;
    pub const PRINTER_ATTRIBUTES: u8 = 0x04;
    pub const UNSUPPORTED_ATTRIBUTES: u8 = 0x05;

    pub const INTEGER: u8 = 0x21;
    pub const BOOLEAN: u8 = 0x22;
    pub const ENUM: u8 = 0x23;
    pub const TEXT_WITHOUT_LANGUAGE: u8 = 0x41;
    pub const NAME_WITHOUT_LANGUAGE: u8 = 0x42;
    pub const KEYWORD: u8 = 0x44;
    pub const URI: u8 = 0x45;
    pub const CHARSET: u8 = 0x47;
    pub const NATURAL_LANGUAGE: u8 = 0x48;
    pub const MIME_MEDIA_TYPE: u8 = 0x49;

    /// Tags below 0x10 delimit attribute groups
    pub fn is_delimiter(tag: u8) -> bool {
        tag < 0x10
    }
}

/// Operation ids
pub mod operation {
    pub const PRINT_JOB: u16 = 0x0002;
}

/// Status codes
pub mod status {
    pub const SUCCESSFUL_OK: u16 = 0x0000;
    pub const SUCCESSFUL_OK_IGNORED_OR_SUBSTITUTED: u16 = 0x0001;
    pub const SUCCESSFUL_OK_CONFLICTING: u16 = 0x0002;
    pub const CLIENT_ERROR_BAD_REQUEST: u16 = 0x0400;
    pub const CLIENT_ERROR_FORBIDDEN: u16 = 0x0401;
    pub const CLIENT_ERROR_NOT_AUTHENTICATED: u16 = 0x0402;
    pub const CLIENT_ERROR_NOT_AUTHORIZED: u16 = 0x0403;
    pub const CLIENT_ERROR_NOT_POSSIBLE: u16 = 0x0404;
    pub const CLIENT_ERROR_TIMEOUT: u16 = 0x0405;
    pub const CLIENT_ERROR_NOT_FOUND: u16 = 0x0406;
    pub const CLIENT_ERROR_GONE: u16 = 0x0407;
    pub const CLIENT_ERROR_REQUEST_ENTITY_TOO_LARGE: u16 = 0x0408;
    pub const CLIENT_ERROR_DOCUMENT_FORMAT_NOT_SUPPORTED: u16 = 0x040A;
    pub const SERVER_ERROR_INTERNAL_ERROR: u16 = 0x0500;
    pub const SERVER_ERROR_OPERATION_NOT_SUPPORTED: u16 = 0x0501;
    pub const SERVER_ERROR_SERVICE_UNAVAILABLE: u16 = 0x0502;
    pub const SERVER_ERROR_VERSION_NOT_SUPPORTED: u16 = 0x0503;
    pub const SERVER_ERROR_DEVICE_ERROR: u16 = 0x0504;
    pub const SERVER_ERROR_NOT_ACCEPTING_JOBS: u16 = 0x0506;
    pub const SERVER_ERROR_BUSY: u16 = 0x0507;
}

/// Successful status codes live in 0x0000..=0x00FF
pub fn is_success(code: u16) -> bool {
    code < 0x0100
}

/// Keyword name of a status code
pub fn status_name(code: u16) -> &'static str {
    use status::*;
    match code {
        SUCCESSFUL_OK => "successful-ok",
        SUCCESSFUL_OK_IGNORED_OR_SUBSTITUTED => "successful-ok-ignored-or-substituted-attributes",
        SUCCESSFUL_OK_CONFLICTING => "successful-ok-conflicting-attributes",
        CLIENT_ERROR_BAD_REQUEST => "client-error-bad-request",
        CLIENT_ERROR_FORBIDDEN => "client-error-forbidden",
        CLIENT_ERROR_NOT_AUTHENTICATED => "client-error-not-authenticated",
        CLIENT_ERROR_NOT_AUTHORIZED => "client-error-not-authorized",
        CLIENT_ERROR_NOT_POSSIBLE => "client-error-not-possible",
        CLIENT_ERROR_TIMEOUT => "client-error-timeout",
        CLIENT_ERROR_NOT_FOUND => "client-error-not-found",
        CLIENT_ERROR_GONE => "client-error-gone",
        CLIENT_ERROR_REQUEST_ENTITY_TOO_LARGE => "client-error-request-entity-too-large",
        CLIENT_ERROR_DOCUMENT_FORMAT_NOT_SUPPORTED => "client-error-document-format-not-supported",
        SERVER_ERROR_INTERNAL_ERROR => "server-error-internal-error",
        SERVER_ERROR_OPERATION_NOT_SUPPORTED => "server-error-operation-not-supported",
        SERVER_ERROR_SERVICE_UNAVAILABLE => "server-error-service-unavailable",
        SERVER_ERROR_VERSION_NOT_SUPPORTED => "server-error-version-not-supported",
        SERVER_ERROR_DEVICE_ERROR => "server-error-device-error",
        SERVER_ERROR_NOT_ACCEPTING_JOBS => "server-error-not-accepting-jobs",
        SERVER_ERROR_BUSY => "server-error-busy",
        0x0000..=0x00FF => "successful",
        0x0400..=0x04FF => "client-error",
        0x0500..=0x05FF => "server-error",
        _ => "unknown",
    }
}

/// IPP message builder
///
/// Fluent API in the same spirit as a command-buffer builder: every call
/// appends wire bytes and returns `&mut Self`. An oversized name or value
/// is remembered and reported by `build`.
pub struct IppBuilder {
    buf: Vec<u8>,
    overflow: Option<String>,
}

impl IppBuilder {
    /// Start a request message
    pub fn request(operation_id: u16, request_id: u32) -> Self {
        Self::with_header(operation_id, request_id)
    }

    /// Start a response message (used by test servers)
    pub fn response(status_code: u16, request_id: u32) -> Self {
        Self::with_header(status_code, request_id)
    }

    fn with_header(code: u16, request_id: u32) -> Self {
        let mut buf = Vec::with_capacity(512);
        buf.push(IPP_VERSION.0);
        buf.push(IPP_VERSION.1);
        buf.extend_from_slice(&code.to_be_bytes());
        buf.extend_from_slice(&request_id.to_be_bytes());
        Self {
            buf,
            overflow: None,
        }
    }

    // === Groups ===

    /// Begin an attribute group
    pub fn group(&mut self, delimiter: u8) -> &mut Self {
        self.buf.push(delimiter);
        self
    }

    pub fn operation_attributes(&mut self) -> &mut Self {
        self.group(tag::OPERATION_ATTRIBUTES)
    }

    pub fn job_attributes(&mut self) -> &mut Self {
        self.group(tag::JOB_ATTRIBUTES)
    }

    // === Attributes ===

    /// Write one attribute with a raw value
    pub fn attribute(&mut self, value_tag: u8, name: &str, value: &[u8]) -> &mut Self {
        // Names and values are bounded by u16 on the wire
        let (Ok(name_len), Ok(value_len)) =
            (u16::try_from(name.len()), u16::try_from(value.len()))
        else {
            self.overflow.get_or_insert_with(|| {
                format!("attribute '{}' exceeds {} bytes", name, u16::MAX)
            });
            return self;
        };
        self.buf.push(value_tag);
        self.buf.extend_from_slice(&name_len.to_be_bytes());
        self.buf.extend_from_slice(name.as_bytes());
        self.buf.extend_from_slice(&value_len.to_be_bytes());
        self.buf.extend_from_slice(value);
        self
    }

    pub fn charset(&mut self, name: &str, value: &str) -> &mut Self {
        self.attribute(tag::CHARSET, name, value.as_bytes())
    }

    pub fn natural_language(&mut self, name: &str, value: &str) -> &mut Self {
        self.attribute(tag::NATURAL_LANGUAGE, name, value.as_bytes())
    }

    pub fn uri(&mut self, name: &str, value: &str) -> &mut Self {
        self.attribute(tag::URI, name, value.as_bytes())
    }

    pub fn name(&mut self, name: &str, value: &str) -> &mut Self {
        self.attribute(tag::NAME_WITHOUT_LANGUAGE, name, value.as_bytes())
    }

    pub fn text(&mut self, name: &str, value: &str) -> &mut Self {
        self.attribute(tag::TEXT_WITHOUT_LANGUAGE, name, value.as_bytes())
    }

    pub fn mime_media_type(&mut self, name: &str, value: &str) -> &mut Self {
        self.attribute(tag::MIME_MEDIA_TYPE, name, value.as_bytes())
    }

    pub fn integer(&mut self, name: &str, value: i32) -> &mut Self {
        self.attribute(tag::INTEGER, name, &value.to_be_bytes())
    }

    /// Standard leading operation attributes required by every request
    pub fn standard_operation_attributes(&mut self) -> &mut Self {
        self.operation_attributes()
            .charset("attributes-charset", "utf-8")
            .natural_language("attributes-natural-language", "en")
    }

    // === Output ===

    /// Finish the message without document data
    pub fn build(self) -> PrintResult<Vec<u8>> {
        self.build_with_document(&[])
    }

    /// Finish the message and append document data
    pub fn build_with_document(mut self, document: &[u8]) -> PrintResult<Vec<u8>> {
        if let Some(message) = self.overflow {
            return Err(PrintError::Protocol(message));
        }
        self.buf.push(tag::END_OF_ATTRIBUTES);
        self.buf.reserve(document.len());
        self.buf.extend_from_slice(document);
        Ok(self.buf)
    }
}

/// Decoded attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum IppValue {
    Integer(i32),
    Boolean(bool),
    Text(String),
    Other { tag: u8, data: Vec<u8> },
}

impl IppValue {
    fn decode(value_tag: u8, data: &[u8]) -> Self {
        match value_tag {
            tag::INTEGER | tag::ENUM if data.len() == 4 => {
                IppValue::Integer(i32::from_be_bytes([data[0], data[1], data[2], data[3]]))
            }
            tag::BOOLEAN if data.len() == 1 => IppValue::Boolean(data[0] != 0),
            0x41..=0x49 => IppValue::Text(String::from_utf8_lossy(data).into_owned()),
            _ => IppValue::Other {
                tag: value_tag,
                data: data.to_vec(),
            },
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            IppValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            IppValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// One named attribute, possibly multi-valued
#[derive(Debug, Clone, PartialEq)]
pub struct IppAttribute {
    pub group: u8,
    pub name: String,
    pub values: Vec<IppValue>,
}

impl IppAttribute {
    pub fn first(&self) -> Option<&IppValue> {
        self.values.first()
    }
}

/// Decoded IPP response
#[derive(Debug, Clone)]
pub struct IppResponse {
    pub version: (u8, u8),
    pub status_code: u16,
    pub request_id: u32,
    pub attributes: Vec<IppAttribute>,
}

impl IppResponse {
    /// Parse a response body
    pub fn parse(data: &[u8]) -> PrintResult<Self> {
        Self::parse_message(data).map(|(message, _)| message)
    }

    /// Parse a message and return the document data trailing the attributes
    ///
    /// Requests share the response layout (the status slot holds the
    /// operation id), so stub servers decode requests with this too.
    pub fn parse_message(data: &[u8]) -> PrintResult<(Self, &[u8])> {
        let mut r = Reader::new(data);

        let version = (r.u8()?, r.u8()?);
        let status_code = r.u16()?;
        let request_id = r.u32()?;

        let mut attributes: Vec<IppAttribute> = Vec::new();
        let mut group = 0u8;

        loop {
            let value_tag = r.u8()?;
            if value_tag == tag::END_OF_ATTRIBUTES {
                break;
            }
            if tag::is_delimiter(value_tag) {
                group = value_tag;
                continue;
            }

            let name_len = r.u16()? as usize;
            let name = r.bytes(name_len)?;
            let value_len = r.u16()? as usize;
            let value = IppValue::decode(value_tag, r.bytes(value_len)?);

            if name.is_empty() {
                // Additional value of the previous attribute (1setOf)
                let prev = attributes.last_mut().ok_or_else(|| {
                    PrintError::Protocol("additional value without attribute".to_string())
                })?;
                prev.values.push(value);
            } else {
                attributes.push(IppAttribute {
                    group,
                    name: String::from_utf8_lossy(name).into_owned(),
                    values: vec![value],
                });
            }
        }

        let message = Self {
            version,
            status_code,
            request_id,
            attributes,
        };
        Ok((message, r.rest()))
    }

    pub fn is_success(&self) -> bool {
        is_success(self.status_code)
    }

    /// Find the first attribute with the given name
    pub fn attribute(&self, name: &str) -> Option<&IppAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// `job-id` from the job attributes group
    pub fn job_id(&self) -> Option<i32> {
        self.attributes
            .iter()
            .find(|a| a.group == tag::JOB_ATTRIBUTES && a.name == "job-id")
            .and_then(|a| a.first())
            .and_then(IppValue::as_integer)
    }

    /// `status-message` from the operation attributes group
    pub fn status_message(&self) -> Option<&str> {
        self.attribute("status-message")
            .and_then(|a| a.first())
            .and_then(IppValue::as_text)
    }
}

/// Bounds-checked big-endian reader
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn bytes(&mut self, n: usize) -> PrintResult<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.data.len());
        match end {
            Some(end) => {
                let out = &self.data[self.pos..end];
                self.pos = end;
                Ok(out)
            }
            None => Err(PrintError::Protocol(format!(
                "truncated message: need {} bytes at offset {}, have {}",
                n,
                self.pos,
                self.data.len()
            ))),
        }
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn u8(&mut self) -> PrintResult<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> PrintResult<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> PrintResult<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}
