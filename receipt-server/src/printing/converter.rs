//! HTML → printable document conversion
//!
//! The converter is an external program. It either leaves a non-empty
//! output file behind or the call fails.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Default receipt page: 60mm thermal roll, 200mm long
pub const DEFAULT_PAGE_WIDTH_MM: u32 = 60;
pub const DEFAULT_PAGE_HEIGHT_MM: u32 = 200;
pub const DEFAULT_CONVERT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Failed to launch converter '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Converter exited with status {status:?}: {stderr}")]
    Failed { status: Option<i32>, stderr: String },

    #[error("Converter timed out after {0:?}")]
    Timeout(Duration),

    #[error("Converter produced no output at {0}")]
    EmptyOutput(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConvertResult<T> = Result<T, ConvertError>;

/// Physical page size in millimetres
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSize {
    pub width_mm: u32,
    pub height_mm: u32,
}

impl PageSize {
    pub fn new(width_mm: u32, height_mm: u32) -> Self {
        Self {
            width_mm,
            height_mm,
        }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_WIDTH_MM, DEFAULT_PAGE_HEIGHT_MM)
    }
}

/// Converts a rendered receipt into a document the printer accepts
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(&self, input: &Path, output: &Path, page: PageSize) -> ConvertResult<()>;
}

/// `wkhtmltopdf` invoked as a child process
#[derive(Debug, Clone)]
pub struct WkHtmlToPdf {
    program: String,
    /// Arguments placed before the page options
    leading_args: Vec<String>,
    timeout: Duration,
}

impl Default for WkHtmlToPdf {
    fn default() -> Self {
        Self::new("wkhtmltopdf")
    }
}

impl WkHtmlToPdf {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            timeout: DEFAULT_CONVERT_TIMEOUT,
        }
    }

    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl DocumentConverter for WkHtmlToPdf {
    #[instrument(skip(self), fields(program = %self.program))]
    async fn convert(&self, input: &Path, output: &Path, page: PageSize) -> ConvertResult<()> {
        let child = Command::new(&self.program)
            .args(&self.leading_args)
            .arg("--page-width")
            .arg(page.width_mm.to_string())
            .arg("--page-height")
            .arg(page.height_mm.to_string())
            .arg(input)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ConvertError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Dropping the child on timeout kills it
        let result = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(timeout = ?self.timeout, "Converter timed out, killed");
                return Err(ConvertError::Timeout(self.timeout));
            }
        };

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            warn!(status = ?result.status.code(), %stderr, "Converter failed");
            return Err(ConvertError::Failed {
                status: result.status.code(),
                stderr,
            });
        }

        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => {
                debug!(bytes = meta.len(), "Document converted");
                Ok(())
            }
            _ => Err(ConvertError::EmptyOutput(output.to_path_buf())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Run `script` through `sh -c`; converter arguments arrive as $1..$6
    fn shell(script: &str) -> WkHtmlToPdf {
        WkHtmlToPdf::new("sh").with_leading_args(["-c", script, "sh"])
    }

    fn paths() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("receipt-42.html");
        let output = dir.path().join("receipt-42.pdf");
        std::fs::write(&input, "<html>42</html>").unwrap();
        (dir, input, output)
    }

    #[tokio::test]
    async fn test_arguments_passed_in_order() {
        let (_dir, input, output) = paths();
        let converter = shell(r#"echo "$@" > "$6""#);

        converter
            .convert(&input, &output, PageSize::default())
            .await
            .unwrap();

        let args = std::fs::read_to_string(&output).unwrap();
        assert_eq!(
            args.trim(),
            format!(
                "--page-width 60 --page-height 200 {} {}",
                input.display(),
                output.display()
            )
        );
    }

    #[tokio::test]
    async fn test_success_produces_output() {
        let (_dir, input, output) = paths();

        shell(r#"cat "$5" > "$6""#)
            .convert(&input, &output, PageSize::new(80, 150))
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&output).unwrap(), "<html>42</html>");
    }

    #[tokio::test]
    async fn test_nonzero_exit() {
        let (_dir, input, output) = paths();

        let err = shell("echo 'cannot load page' >&2; exit 3")
            .convert(&input, &output, PageSize::default())
            .await
            .unwrap_err();

        match err {
            ConvertError::Failed { status, stderr } => {
                assert_eq!(status, Some(3));
                assert_eq!(stderr, "cannot load page");
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_output_is_error() {
        let (_dir, input, output) = paths();

        let err = shell(r#": > "$6""#)
            .convert(&input, &output, PageSize::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::EmptyOutput(_)));

        let err = shell("exit 0")
            .convert(&input, &output, PageSize::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::EmptyOutput(_)));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let (_dir, input, output) = paths();

        let err = WkHtmlToPdf::new("/nonexistent/wkhtmltopdf")
            .convert(&input, &output, PageSize::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ConvertError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let (_dir, input, output) = paths();
        let started = std::time::Instant::now();

        let err = shell("sleep 10")
            .with_timeout(Duration::from_millis(200))
            .convert(&input, &output, PageSize::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ConvertError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
