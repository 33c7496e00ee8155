//! Test Order Producer
//!
//! Generates random, schema-valid order requests and publishes them to NATS
//! for service testing.
//!
//! Usage: order-producer [nats_url] [subject] [count] [schema] [delay_ms] [labels|codes]
//!
//! `codes` writes categorical fields as level indices, for deployments
//! serving a numeric-only ONNX graph.

use delivery_time_predictor::schema::{CategoryInput, FieldKind, OrderSchema};
use delivery_time_predictor::types::order::{OrderRecord, OrderRequest};
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Order generator for testing
struct OrderGenerator {
    rng: rand::rngs::ThreadRng,
    schema: OrderSchema,
    categories: CategoryInput,
    order_counter: u64,
}

impl OrderGenerator {
    fn new(schema: OrderSchema, categories: CategoryInput) -> Self {
        Self {
            rng: rand::thread_rng(),
            schema,
            categories,
            order_counter: 0,
        }
    }

    /// Generate a random order within the schema's bounds
    fn generate(&mut self) -> OrderRequest {
        self.order_counter += 1;

        let mut attributes = OrderRecord::new();
        for field in self.schema.fields() {
            match field.kind {
                FieldKind::Numeric { min, max, integer } => {
                    let value = if integer {
                        self.rng.gen_range(min as i64..=max as i64) as f64
                    } else {
                        // one decimal, like a form input
                        (self.rng.gen_range(min..=max) * 10.0).round() / 10.0
                    };
                    attributes.insert(field.name, value);
                }
                FieldKind::Categorical(levels) => {
                    let code = self.rng.gen_range(0..levels.len());
                    match self.categories {
                        CategoryInput::Labels => attributes.insert(field.name, levels[code]),
                        CategoryInput::LabelsOrCodes => attributes.insert(field.name, code as i64),
                    }
                }
            }
        }

        OrderRequest {
            order_id: format!("order_{:012}", self.order_counter),
            attributes,
        }
    }
}

fn parse_schema(name: &str) -> OrderSchema {
    match name {
        "standard" => OrderSchema::Standard,
        "bucketed" => OrderSchema::Bucketed,
        "hourly" => OrderSchema::Hourly,
        _ => OrderSchema::Full,
    }
}

fn parse_categories(name: &str) -> CategoryInput {
    match name {
        "codes" => CategoryInput::LabelsOrCodes,
        _ => CategoryInput::Labels,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("order_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Order Producer");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("delivery.orders");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let schema = parse_schema(args.get(4).map(|s| s.as_str()).unwrap_or("full"));
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);
    let categories = parse_categories(args.get(6).map(|s| s.as_str()).unwrap_or("labels"));

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        schema = ?schema,
        categories = ?categories,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(schema, categories, count, delay_ms).await;
        }
    };

    let mut generator = OrderGenerator::new(schema, categories);

    info!("Starting to publish {} orders...", count);

    for i in 0..count {
        let request = generator.generate();
        let payload = serde_json::to_vec(&request)?;

        client.publish(subject.to_string(), payload.into()).await?;

        if (i + 1) % 10 == 0 {
            info!("Published {}/{} orders", i + 1, count);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!("Completed! Published {} orders", count);

    Ok(())
}

async fn run_dry_mode(
    schema: OrderSchema,
    categories: CategoryInput,
    count: u64,
    delay_ms: u64,
) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = OrderGenerator::new(schema, categories);

    for i in 0..count {
        let request = generator.generate();
        if let Err(e) = schema.validate_with(&request.attributes, categories) {
            warn!(error = %e, "Generated an invalid order");
        }

        let json = serde_json::to_string_pretty(&request)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample order {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
