//! Receipt renderer
//!
//! Merges aggregated rows, totals, business metadata and the barcode into
//! an HTML document using a runtime template.

use std::path::{Path, PathBuf};

use minijinja::{Environment, UndefinedBehavior};
use rust_decimal::{Decimal, RoundingStrategy};
use shared::models::{AggregateProduct, BusinessInfo, Order};
use thiserror::Error;
use tracing::{debug, instrument};

use super::secure::BarcodeImage;

/// Registered template name; the `.html` suffix turns on HTML auto-escaping
const TEMPLATE_NAME: &str = "receipt.html";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Receipt template not found: {0}")]
    TemplateNotFound(PathBuf),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RenderResult<T> = Result<T, RenderError>;

/// Format a monetary amount with exactly two decimals
pub fn format_money(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

/// One receipt line as the template sees it
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReceiptRow {
    pub id: u64,
    pub name: String,
    pub quantity: u32,
    pub price: String,
    #[serde(rename = "type")]
    pub product_type: String,
}

impl From<&AggregateProduct> for ReceiptRow {
    fn from(row: &AggregateProduct) -> Self {
        Self {
            id: row.id,
            name: row.name.clone(),
            quantity: row.quantity,
            price: format_money(row.price),
            product_type: row.product_type.clone(),
        }
    }
}

/// Order summary exposed to the template
#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderSummary {
    pub id: u64,
    pub item_count: usize,
}

/// Everything a receipt template can reference
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReceiptContext {
    pub total: String,
    pub order: OrderSummary,
    pub products: Vec<ReceiptRow>,
    /// Base64 PNG of the order barcode
    pub qrcode: String,
    pub name: String,
    pub address1: String,
    pub address2: String,
}

impl ReceiptContext {
    pub fn new(
        order: &Order,
        total: Decimal,
        rows: &[AggregateProduct],
        barcode: &BarcodeImage,
        business: &BusinessInfo,
    ) -> Self {
        Self {
            total: format_money(total),
            order: OrderSummary {
                id: order.id,
                item_count: order.products.len(),
            },
            products: rows.iter().map(ReceiptRow::from).collect(),
            qrcode: barcode.to_base64(),
            name: business.name.clone(),
            address1: business.address1.clone(),
            address2: business.address2.clone(),
        }
    }
}

/// HTML receipt renderer backed by a single template
pub struct ReceiptRenderer {
    env: Environment<'static>,
}

impl ReceiptRenderer {
    /// Compile a template from source
    ///
    /// Syntax errors surface here rather than on the first receipt.
    pub fn from_source(source: impl Into<String>) -> RenderResult<Self> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.add_template_owned(TEMPLATE_NAME, source.into())?;
        Ok(Self { env })
    }

    /// Load and compile the template at `path`
    pub fn from_file(path: impl AsRef<Path>) -> RenderResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => RenderError::TemplateNotFound(path.to_path_buf()),
            _ => RenderError::Io(e),
        })?;
        Self::from_source(source)
    }

    /// Render the receipt to an HTML string
    pub fn render(&self, ctx: &ReceiptContext) -> RenderResult<String> {
        let template = self.env.get_template(TEMPLATE_NAME)?;
        Ok(template.render(ctx)?)
    }

    /// Render and write `receipt-<id>.html` into `dir`, returning its path
    #[instrument(skip(self, ctx, dir), fields(order_id = ctx.order.id))]
    pub async fn render_to_file(
        &self,
        ctx: &ReceiptContext,
        dir: impl AsRef<Path>,
    ) -> RenderResult<PathBuf> {
        let html = self.render(ctx)?;
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;

        let path = dir.join(format!("receipt-{}.html", ctx.order.id));
        tokio::fs::write(&path, html.as_bytes()).await?;
        debug!(path = %path.display(), bytes = html.len(), "Receipt rendered");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::Product;

    fn context() -> ReceiptContext {
        let order = Order::new(
            42,
            vec![
                Product::new(1, "Coffee", Decimal::new(250, 2)),
                Product::new(1, "Coffee", Decimal::new(250, 2)),
                Product::new(2, "Bagel <plain>", Decimal::new(3, 0)),
            ],
        );
        let rows = crate::printing::aggregate(&order.products);
        let barcode = BarcodeImage {
            payload: "00ff".to_string(),
            png: vec![0x89, b'P', b'N', b'G'],
        };
        let business = BusinessInfo {
            name: "Corner Cafe".to_string(),
            address1: "1 Main St".to_string(),
            address2: "Springfield".to_string(),
        };
        ReceiptContext::new(&order, Decimal::new(8, 0), &rows, &barcode, &business)
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(Decimal::new(12, 0)), "12.00");
        assert_eq!(format_money(Decimal::new(35, 1)), "3.50");
        assert_eq!(format_money(Decimal::new(12345, 3)), "12.35");
        assert_eq!(format_money(Decimal::ZERO), "0.00");
    }

    #[test]
    fn test_render_fields() {
        let renderer = ReceiptRenderer::from_source(
            "{{ name }}|{{ address1 }}|{{ address2 }}|#{{ order.id }}|\
             {% for p in products %}{{ p.quantity }}x{{ p.name }}={{ p.price }};{% endfor %}\
             |{{ total }}|{{ qrcode|safe }}",
        )
        .unwrap();

        let html = renderer.render(&context()).unwrap();

        assert_eq!(
            html,
            "Corner Cafe|1 Main St|Springfield|#42|\
             2xCoffee=5.00;1xBagel &lt;plain&gt;=3.00;|8.00|iVBORw=="
        );
    }

    #[test]
    fn test_undefined_variable_is_error() {
        let renderer = ReceiptRenderer::from_source("{{ missing_field }}").unwrap();
        assert!(matches!(
            renderer.render(&context()),
            Err(RenderError::Template(_))
        ));
    }

    #[test]
    fn test_syntax_error_at_load() {
        assert!(matches!(
            ReceiptRenderer::from_source("{% for p in products %}"),
            Err(RenderError::Template(_))
        ));
    }

    #[test]
    fn test_missing_template_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.html");
        match ReceiptRenderer::from_file(&path) {
            Err(RenderError::TemplateNotFound(p)) => assert_eq!(p, path),
            other => panic!("expected TemplateNotFound, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_bundled_template_renders() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("templates/receipt.html");
        let renderer = ReceiptRenderer::from_file(path).unwrap();

        let html = renderer.render(&context()).unwrap();

        assert!(html.contains("Corner Cafe"));
        assert!(html.contains("data:image/png;base64,iVBORw=="));
        assert!(html.contains("8.00"));
    }

    #[tokio::test]
    async fn test_render_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let receipts = dir.path().join("receipts");
        let renderer = ReceiptRenderer::from_source("<p>{{ order.id }}</p>").unwrap();

        let path = renderer.render_to_file(&context(), &receipts).await.unwrap();

        assert_eq!(path, receipts.join("receipt-42.html"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "<p>42</p>");
    }
}
