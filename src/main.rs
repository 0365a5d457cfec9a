//! RiceGuard Classifier - Main Entry Point
//!
//! Consumes leaf images from NATS, runs the disease classifier, and publishes
//! scan outcomes. Scans are processed in parallel up to the worker limit.

use anyhow::Result;
use futures::StreamExt;
use riceguard_classifier::{
    config::{AppConfig, LoggingConfig},
    consumer::{self, ScanConsumer},
    metrics::{ClassifierMetrics, MetricsReporter},
    models::inference::ClassifierService,
    producer::ResultProducer,
    types::scan::ScanOutcome,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("riceguard_classifier={}", logging.level).parse()?);

    if logging.format == "json" {
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
    // Load configuration
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting RiceGuard classifier worker");
    info!(
        "Confidence threshold: {:.2}, margin: {:.2}, model path: {}",
        config.classifier.confidence_threshold,
        config.classifier.confidence_margin,
        config.classifier.model_path
    );

    let metrics = Arc::new(ClassifierMetrics::new());

    let service = Arc::new(
        ClassifierService::new(&config.classifier)
            .with_inference_timeout(Duration::from_millis(config.pipeline.timeout_ms)),
    );

    // Warm up the model off the async runtime; a failure leaves the service
    // degraded and the next scan retries
    let warmup = service.clone();
    let loaded = tokio::task::spawn_blocking(move || warmup.load()).await?;
    if loaded {
        info!("Classifier ready");
    } else {
        warn!(
            load_error = ?service.status().load_error,
            "Model unavailable, serving fallback classifications"
        );
    }

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = ScanConsumer::new(client.clone(), &config.nats.scan_subject);
    let producer = Arc::new(ResultProducer::new(
        client.clone(),
        &config.nats.result_subject,
    ));

    // Health probe responder
    let mut health_requests = client.subscribe(config.nats.health_subject.clone()).await?;
    info!("Answering health probes on: {}", config.nats.health_subject);
    let health_service = service.clone();
    let health_producer = producer.clone();
    tokio::spawn(async move {
        while let Some(request) = health_requests.next().await {
            let Some(reply) = request.reply else {
                debug!("Health probe without reply subject ignored");
                continue;
            };
            let health = health_service.get_service_health();
            if let Err(e) = health_producer.reply_health(reply, &health).await {
                error!(error = %e, "Failed to answer health probe");
            }
        }
    });

    let num_workers = config.pipeline.workers;
    info!("Starting scan processing loop with {} parallel workers", num_workers);
    info!("Listening on subject: {}", consumer.subject());
    info!("Publishing outcomes to: {}", producer.subject());

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    // Start metrics reporter (prints summary every 30 seconds)
    let metrics_clone = metrics.clone();
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(metrics_clone, 30);
        reporter.start().await;
    });

    let mut subscription = consumer.subscribe().await?;

    while let Some(message) = subscription.next().await {
        // Acquire permit (limits concurrent tasks)
        let permit = semaphore.clone().acquire_owned().await?;

        let service = service.clone();
        let producer = producer.clone();
        let metrics = metrics.clone();
        let processed_count = processed_count.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();
            let scan_id = consumer::scan_id(message.headers.as_ref())
                .unwrap_or_else(ScanOutcome::generate_id);

            let (result, meets_threshold) = service.predict_async(message.payload.clone()).await;
            let processing_time = start_time.elapsed();

            metrics.record_scan(processing_time, &result);

            if result.success {
                debug!(
                    scan_id = %scan_id,
                    disease = %result.disease_key,
                    confidence = result.confidence,
                    meets_threshold,
                    processing_time_us = processing_time.as_micros(),
                    "Scan classified"
                );
            } else {
                warn!(
                    scan_id = %scan_id,
                    reason = ?result.fallback_reason,
                    "Scan answered with fallback classification"
                );
            }

            let outcome = ScanOutcome::new(
                scan_id,
                result,
                meets_threshold,
                processing_time.as_secs_f64() * 1000.0,
            );

            if let Err(e) = producer.publish(&outcome, message.reply.clone()).await {
                error!(
                    scan_id = %outcome.scan_id,
                    error = %e,
                    "Failed to publish scan outcome"
                );
            }

            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;

            // Log progress every 100 scans
            if count % 100 == 0 {
                let processing_stats = metrics.get_processing_stats();
                info!(
                    processed = count,
                    throughput = format!("{:.1} scans/s", metrics.get_throughput()),
                    avg_latency_us = processing_stats.mean_us,
                    "Processing milestone"
                );
            }

            // Release permit when done
            drop(permit);
        });
    }

    // Print final summary
    info!("Worker shutting down...");
    metrics.print_summary();

    Ok(())
}
