//! Delivery Time Predictor - Main Entry Point
//!
//! Consumes order requests from NATS, runs inference and publishes
//! delivery time estimates. Requests are handled one at a time.

use anyhow::Result;
use delivery_time_predictor::{
    config::{AppConfig, LoggingConfig},
    consumer::{OrderConsumer, OrderIntake},
    handler::OrderHandler,
    metrics::{MetricsReporter, ServiceMetrics},
    models::inference::InferenceAdapter,
    producer::EstimateProducer,
    schema::CategoryInput,
};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("delivery_time_predictor={}", logging.level)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting Delivery Time Predictor");
    info!(
        backend = ?config.model.backend,
        schema = ?config.model.schema,
        interval = config.interval.enabled,
        "Configuration loaded"
    );

    let metrics = Arc::new(ServiceMetrics::new());

    // Artifacts are loaded once here and never reloaded
    let adapter = InferenceAdapter::new(&config)?;
    let handler = OrderHandler::new(
        adapter,
        config.model.schema,
        CategoryInput::for_backend(config.model.backend),
        metrics.clone(),
    );
    info!(
        model = %handler.adapter().model_name(),
        fields = ?handler.schema().field_names(),
        categories = ?handler.category_input(),
        "Order handler ready"
    );

    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = OrderConsumer::new(client.clone(), OrderIntake::from_config(&config.nats));
    let producer = EstimateProducer::new(client.clone(), &config.nats.estimates_subject);
    info!("Publishing estimates to: {}", producer.subject());

    let reporter = MetricsReporter::new(metrics.clone(), config.service.metrics_interval_secs);
    tokio::spawn(reporter.start());

    let mut subscription = consumer.subscribe().await?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            message = subscription.next() => {
                let Some(message) = message else { break };

                // Inference is synchronous and blocks this request until done
                let reply = tokio::task::block_in_place(|| handler.handle(&message.payload));

                if let Err(e) = producer.publish(&reply, message.reply.clone()).await {
                    error!(
                        order_id = reply.order_id().unwrap_or("-"),
                        error = %e,
                        "Failed to publish estimate"
                    );
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("Delivery Time Predictor shutting down...");
    metrics.print_summary();

    Ok(())
}
