//! Client Retention Service - Main Entry Point
//!
//! Answers retention prediction requests received over NATS request/reply.
//! Requests are processed concurrently up to the configured worker count.

use anyhow::Result;
use client_retention::{
    config::AppConfig,
    consumer::RequestConsumer,
    handler::RequestHandler,
    metrics::{MetricsReporter, ServiceMetrics},
    models::inference::InferenceEngine,
    producer::ResponsePublisher,
};
use futures::StreamExt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &AppConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!("client_retention={}", config.logging.level))?,
    };

    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config)?;

    info!("Starting Client Retention Service");
    info!(
        artifact = %config.model.artifact_path,
        top_k = ?config.explain.top_k,
        "Configuration loaded"
    );

    let metrics = Arc::new(ServiceMetrics::new());

    let engine = InferenceEngine::from_config(&config)?;
    info!(
        model = engine.model_name(),
        classifier = engine.artifact().classifier().kind(),
        features = engine.feature_count(),
        "Inference engine initialized"
    );
    let handler = Arc::new(RequestHandler::new(engine).with_top_k(config.explain.top_k));

    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = RequestConsumer::new(client.clone(), &config.nats.request_subject)
        .with_queue_group(config.nats.queue_group.clone());
    let publisher = ResponsePublisher::new(client.clone());

    let num_workers = config.service.workers.max(1);
    info!(
        "Starting request processing loop with {} parallel workers",
        num_workers
    );

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers));

    let reporter = MetricsReporter::new(metrics.clone(), config.service.metrics_interval_secs);
    tokio::spawn(reporter.start());

    let mut subscription = consumer.subscribe().await?;

    while let Some(message) = subscription.next().await {
        let permit = semaphore.clone().acquire_owned().await?;

        let handler = handler.clone();
        let publisher = publisher.clone();
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();

            let response = handler.handle_payload(&message.payload);
            let processing_time = start_time.elapsed();
            metrics.record_response(&response, processing_time);

            match &response.prediction {
                Some(prediction) => debug!(
                    request_id = %response.request_id,
                    label = prediction.label,
                    probability = prediction.probability,
                    explained = response.attributions.is_some(),
                    processing_time_us = processing_time.as_micros(),
                    "Request processed"
                ),
                None => debug!(
                    request_id = %response.request_id,
                    processing_time_us = processing_time.as_micros(),
                    "Request rejected"
                ),
            }

            match message.reply {
                Some(reply_to) => {
                    if let Err(e) = publisher.reply(reply_to, &response).await {
                        error!(
                            request_id = %response.request_id,
                            error = %e,
                            "Failed to publish response"
                        );
                    }
                }
                None => warn!(
                    request_id = %response.request_id,
                    "Request has no reply subject, response dropped"
                ),
            }

            let count = metrics.requests_processed.load(Ordering::Relaxed);
            if count % 100 == 0 {
                let processing_stats = metrics.get_processing_stats();
                info!(
                    processed = count,
                    throughput = format!("{:.1} req/s", metrics.get_throughput()),
                    avg_latency_us = processing_stats.mean_us,
                    "Processing milestone"
                );
            }

            drop(permit);
        });
    }

    info!("Service shutting down...");
    metrics.print_summary();

    Ok(())
}
