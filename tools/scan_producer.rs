//! Test Scan Producer
//!
//! Generates synthetic leaf images and publishes them to NATS for worker
//! testing. Each scan is sent as a request so the classifier's outcome is
//! printed as it arrives.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use rand::Rng;
use std::io::Cursor;
use std::time::Duration;
use tracing::{info, warn};

/// Synthetic leaf image generator for testing
struct LeafGenerator {
    rng: rand::rngs::ThreadRng,
    scan_counter: u64,
}

impl LeafGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            scan_counter: 0,
        }
    }

    fn next_id(&mut self) -> String {
        self.scan_counter += 1;
        format!("scan_{:012}", self.scan_counter)
    }

    /// Uniform green leaf with slight texture
    fn generate_healthy(&mut self) -> RgbImage {
        let size = self.rng.gen_range(256..640);
        let mut img = RgbImage::new(size, size);
        for pixel in img.pixels_mut() {
            let shade: i16 = self.rng.gen_range(-12..12);
            *pixel = Rgb([
                (40 + shade).clamp(0, 255) as u8,
                (140 + shade).clamp(0, 255) as u8,
                (35 + shade / 2).clamp(0, 255) as u8,
            ]);
        }
        img
    }

    /// Green leaf with brown, gray-centered lesions
    fn generate_lesioned(&mut self) -> RgbImage {
        let mut img = self.generate_healthy();
        let (width, height) = img.dimensions();
        let lesions = self.rng.gen_range(4..16);

        for _ in 0..lesions {
            let cx = self.rng.gen_range(0..width) as i64;
            let cy = self.rng.gen_range(0..height) as i64;
            let rx = self.rng.gen_range(6..28) as i64;
            let ry = self.rng.gen_range(4..18) as i64;

            for y in (cy - ry).max(0)..(cy + ry).min(height as i64) {
                for x in (cx - rx).max(0)..(cx + rx).min(width as i64) {
                    let dx = (x - cx) as f64 / rx as f64;
                    let dy = (y - cy) as f64 / ry as f64;
                    let d = dx * dx + dy * dy;
                    if d <= 1.0 {
                        let color = if d < 0.3 {
                            Rgb([150, 145, 140])
                        } else {
                            Rgb([120, 72, 30])
                        };
                        img.put_pixel(x as u32, y as u32, color);
                    }
                }
            }
        }
        img
    }
}

fn encode_jpeg(img: RgbImage) -> anyhow::Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img).write_to(&mut buf, ImageFormat::Jpeg)?;
    Ok(buf.into_inner())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("scan_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Scan Producer");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("scans.requests");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(20);
    let lesion_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.5);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(200);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        lesion_rate = lesion_rate,
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
            return run_dry_mode(count, lesion_rate, delay_ms).await;
        }
    };

    let mut generator = LeafGenerator::new();
    let mut rng = rand::thread_rng();
    let lesion_rate = lesion_rate.clamp(0.0, 1.0);

    info!("Starting to send {} scans...", count);

    for i in 0..count {
        let scan_id = generator.next_id();
        let image = if rng.gen_bool(lesion_rate) {
            generator.generate_lesioned()
        } else {
            generator.generate_healthy()
        };
        let payload = encode_jpeg(image)?;

        let mut headers = async_nats::HeaderMap::new();
        headers.insert("Scan-Id", scan_id.as_str());

        match client
            .request_with_headers(subject.to_string(), headers, payload.into())
            .await
        {
            Ok(reply) => {
                let outcome: serde_json::Value = serde_json::from_slice(&reply.payload)?;
                info!(
                    scan_id = %scan_id,
                    disease = %outcome["result"]["disease_key"],
                    confidence = %outcome["result"]["confidence"],
                    success = %outcome["result"]["success"],
                    meets_threshold = %outcome["meets_threshold"],
                    "Scan {}/{} classified",
                    i + 1,
                    count
                );
            }
            Err(e) => warn!(scan_id = %scan_id, error = %e, "Scan request failed"),
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!("Completed! Sent {} scans", count);

    Ok(())
}

async fn run_dry_mode(count: u64, lesion_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = LeafGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let lesioned = rng.gen_bool(lesion_rate.clamp(0.0, 1.0));
        let image = if lesioned {
            generator.generate_lesioned()
        } else {
            generator.generate_healthy()
        };
        let (width, height) = image.dimensions();
        let bytes = encode_jpeg(image)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!(
                scan_id = %generator.next_id(),
                width,
                height,
                bytes = bytes.len(),
                lesioned,
                "Sample scan {}",
                i + 1
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
