//! Payment demo CLI
//!
//! Weaves the demo payment service with the configured aspects and runs a
//! single payment through it, printing the outcome (and optionally the
//! event stream) as JSON.
//!
//! Usage:
//!   cargo run --bin aspect_demo -- --amount 1500
//!   cargo run --bin aspect_demo -- --invalid
//!   RUST_LOG=aspect_weaver=trace cargo run --bin aspect_demo -- --events
//!   cargo run --bin aspect_demo -- --config config/aspects.yaml --describe

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;

use aspect_weaver::config::{self, ConfigLoader};
use aspect_weaver::events::{EventSink, RecordingSink, TracingSink};
use aspect_weaver::payment::{
    self, AuditTrail, PaymentRequest, PaymentService, WovenPaymentService,
};
use aspect_weaver::{RegistryBuilder, Weaver};

/// Run one payment through the woven payment service
#[derive(Parser, Debug)]
#[command(name = "aspect_demo")]
#[command(about = "Weave the demo payment service and process one payment")]
struct Args {
    /// Submit a payment that fails validation
    #[arg(long)]
    invalid: bool,

    /// Amount in minor units
    #[arg(long, short = 'a', default_value_t = 1000)]
    amount: u64,

    /// Currency code
    #[arg(long, default_value = "EUR")]
    currency: String,

    /// Aspect configuration file (defaults to ASPECT_CONFIG, then the bundled config)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Print the composed advice chain and exit
    #[arg(long)]
    describe: bool,

    /// Include the recorded weaving events in the output
    #[arg(long)]
    events: bool,
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,aspect_weaver=debug".into()),
        )
        .init();

    let args = Args::parse();

    let aspect_config = match &args.config {
        Some(path) => ConfigLoader::new(path).load()?,
        None => {
            let loader = ConfigLoader::from_env();
            if loader.path().exists() {
                loader.load()?
            } else {
                payment::bundled_config().context("Failed to parse bundled aspect config")?
            }
        }
    };

    let trail = AuditTrail::new();
    let catalog = payment::default_catalog(&trail);
    let mut builder = RegistryBuilder::new();
    config::apply(&aspect_config, &catalog, &mut builder)?;
    let registry = Arc::new(builder.build()?);

    let recorder = Arc::new(RecordingSink::new());
    let sink: Arc<dyn EventSink> = if args.events {
        recorder.clone()
    } else {
        Arc::new(TracingSink)
    };
    let weaver = Weaver::new(registry).with_sink(sink);

    let mut request = PaymentRequest::new(!args.invalid, args.amount);
    request.currency = args.currency.clone();

    if args.describe {
        let descriptor = WovenPaymentService::describe_call(&request)?;
        let chain = weaver.describe(&descriptor);
        println!("{}", serde_json::to_string_pretty(&chain)?);
        return Ok(());
    }

    let service = WovenPaymentService::new(weaver, Arc::new(PaymentService::new()));
    let outcome = service.process_payment(&mut request);

    let mut report = match &outcome {
        Ok(value) => json!({ "status": "ok", "result": value }),
        Err(e) => json!({ "status": "error", "error": e, "message": e.to_string() }),
    };
    report["request"] = serde_json::to_value(&request)?;
    report["audit"] = json!(trail.entries());
    if args.events {
        report["events"] = serde_json::to_value(recorder.events())?;
    }

    println!("{}", serde_json::to_string_pretty(&report)?);

    if outcome.is_err() {
        std::process::exit(1);
    }
    Ok(())
}
