use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use receipt_server::{ReceiptPipeline, setup_environment};
use rust_decimal::Decimal;
use shared::models::Order;

/// Print one order's receipt on the configured printer
#[derive(Parser)]
#[command(name = "receipt-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Order JSON file: {"id": 42, "products": [{"id": 1, "name": "...", "price": 3.5}]}
    order: PathBuf,

    /// Total printed on the receipt (defaults to the sum of line items)
    #[arg(long)]
    total: Option<Decimal>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // 1. Environment (dotenv, config, logging)
    let config = setup_environment();
    tracing::info!(printer = %config.printer_config().base_url(), "Receipt server starting");

    // 2. Order
    let data = tokio::fs::read(&cli.order)
        .await
        .with_context(|| format!("failed to read {}", cli.order.display()))?;
    let order: Order = serde_json::from_slice(&data).context("invalid order JSON")?;
    let total = cli.total.unwrap_or_else(|| order.total());

    // 3. Pipeline
    let pipeline = ReceiptPipeline::from_config(&config).context("failed to set up receipt pipeline")?;
    let outcome = pipeline.print_order(&order, total).await;

    println!(
        "{}",
        serde_json::json!({
            "statusCode": outcome.status_code,
            "jobId": outcome.job_id,
            "error": outcome.error.as_ref().map(|e| e.to_string()),
        })
    );

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
