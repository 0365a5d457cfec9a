//! End-to-end classifier scenarios against stub models

use anyhow::Result;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, RgbaImage};
use ndarray::Array4;
use riceguard_classifier::config::ClassifierConfig;
use riceguard_classifier::models::{Classifier, ClassifierService, ModelLoader, ModelResolver};
use riceguard_classifier::types::health::HealthStatus;
use riceguard_classifier::{DiseaseKey, FallbackKind, ScanOutcome};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

struct StubModel {
    scores: Vec<f32>,
    delay: Duration,
}

impl Classifier for StubModel {
    fn forward(&mut self, _input: &Array4<f32>) -> Result<Vec<f32>> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(self.scores.clone())
    }
}

struct StubLoader {
    scores: Vec<f32>,
    delay: Duration,
}

impl ModelLoader for StubLoader {
    fn load(&self, _path: &Path) -> Result<Box<dyn Classifier>> {
        Ok(Box::new(StubModel {
            scores: self.scores.clone(),
            delay: self.delay,
        }))
    }
}

struct Harness {
    _root: tempfile::TempDir,
    service: ClassifierService,
}

fn harness(with_model_file: bool, scores: Vec<f32>, delay: Duration) -> Harness {
    let root = tempfile::tempdir().unwrap();
    if with_model_file {
        std::fs::create_dir_all(root.path().join("ml")).unwrap();
        std::fs::write(root.path().join("ml").join("model.onnx"), b"stub").unwrap();
    }

    let config = ClassifierConfig::default();
    let service = ClassifierService::with_parts(
        &config,
        ModelResolver::with_search_roots(&config.model_path, vec![root.path().to_path_buf()]),
        Box::new(StubLoader { scores, delay }),
    );

    Harness {
        _root: root,
        service,
    }
}

fn with_model(scores: Vec<f32>) -> Harness {
    harness(true, scores, Duration::ZERO)
}

fn leaf_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let rgb = RgbImage::from_fn(width, height, |x, y| {
        Rgb([30 + (x % 40) as u8, 130 + (y % 50) as u8, 40])
    });
    let img = match format {
        ImageFormat::Gif => DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            let p = rgb.get_pixel(x, y);
            image::Rgba([p[0], p[1], p[2], 255])
        })),
        _ => DynamicImage::ImageRgb8(rgb),
    };
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

fn assert_fallback_shape(result: &riceguard_classifier::ClassificationResult) {
    assert!(!result.success);
    assert!(!result.meets_threshold);
    assert_eq!(result.disease_key, DiseaseKey::Healthy);
    assert_eq!(result.confidence, 0.5);
    assert_eq!(result.all_scores.len(), DiseaseKey::COUNT);
    assert_eq!(result.score_for(DiseaseKey::Healthy), Some(0.5));
}

#[test]
fn empty_bytes_yield_no_image_fallback() {
    let h = with_model(vec![0.1, 0.1, 0.6, 0.1, 0.1]);
    let (result, meets) = h.service.predict(&[]);

    assert!(!meets);
    assert_fallback_shape(&result);
    assert_eq!(result.fallback_kind, Some(FallbackKind::NoImageData));
    assert!(result
        .fallback_reason
        .as_deref()
        .unwrap()
        .contains("No image data"));
    // Empty input never triggers a load
    assert!(!h.service.status().loaded);
}

#[test]
fn missing_model_yields_unavailable_fallback() {
    let h = harness(false, vec![0.2; 5], Duration::ZERO);
    let (result, meets) = h.service.predict(&leaf_image(300, 300, ImageFormat::Jpeg));

    assert!(!meets);
    assert_fallback_shape(&result);
    assert_eq!(result.fallback_kind, Some(FallbackKind::ModelUnavailable));

    let health = h.service.get_service_health();
    assert_eq!(health.status, HealthStatus::Degraded);
    assert!(health.load_error.is_some());
}

#[test]
fn confident_prediction_meets_threshold() {
    let h = with_model(vec![0.1, 0.1, 0.6, 0.1, 0.1]);
    let (result, meets) = h.service.predict(&leaf_image(300, 300, ImageFormat::Jpeg));

    assert!(meets);
    assert!(result.success);
    assert!(result.meets_threshold);
    assert_eq!(result.disease_key, DiseaseKey::Healthy);
    assert!((result.confidence - 0.6).abs() < 1e-6);
    assert!(result.fallback_kind.is_none());

    let ranked = result.ranked();
    assert_eq!(ranked[0].disease_key, DiseaseKey::Healthy);
}

#[test]
fn low_confidence_fails_threshold() {
    let h = with_model(vec![0.1, 0.1, 0.45, 0.35, 0.1]);
    let (result, meets) = h.service.predict(&leaf_image(300, 300, ImageFormat::Png));

    assert!(!meets);
    assert!(result.success);
    assert_eq!(result.disease_key, DiseaseKey::Healthy);
    assert!((result.confidence - 0.45).abs() < 1e-6);
    assert_eq!(result.score_for(DiseaseKey::LeafBlast), Some(0.35));
}

#[test]
fn close_runner_up_fails_margin() {
    let h = with_model(vec![0.05, 0.55, 0.0, 0.4, 0.0]);
    let (result, meets) = h.service.predict(&leaf_image(300, 300, ImageFormat::Jpeg));

    assert!(!meets);
    assert!(result.success);
    assert!(!result.meets_threshold);
    assert_eq!(result.disease_key, DiseaseKey::BrownSpot);
    assert!((result.confidence - 0.55).abs() < 1e-6);
}

#[test]
fn dominant_disease_is_reported() {
    let h = with_model(vec![0.02, 0.9, 0.03, 0.03, 0.02]);
    let (result, meets) = h.service.predict(&leaf_image(400, 250, ImageFormat::Jpeg));

    assert!(meets);
    assert_eq!(result.disease_key, DiseaseKey::BrownSpot);
    assert!(!result.disease_key.info().recommendations.is_empty());
}

#[test]
fn undersized_image_is_rejected() {
    let h = with_model(vec![0.1, 0.1, 0.6, 0.1, 0.1]);
    let (result, meets) = h.service.predict(&leaf_image(30, 30, ImageFormat::Png));

    assert!(!meets);
    assert_fallback_shape(&result);
    assert_eq!(result.fallback_kind, Some(FallbackKind::InvalidImage));
    assert!(result.fallback_reason.unwrap().contains("too small"));
}

#[test]
fn unsupported_format_is_rejected() {
    let h = with_model(vec![0.1, 0.1, 0.6, 0.1, 0.1]);
    let (result, _) = h.service.predict(&leaf_image(120, 120, ImageFormat::Gif));

    assert_fallback_shape(&result);
    assert_eq!(result.fallback_kind, Some(FallbackKind::InvalidImage));
    assert!(result.fallback_reason.unwrap().contains("GIF"));
}

#[test]
fn garbage_bytes_never_panic() {
    let h = with_model(vec![0.1, 0.1, 0.6, 0.1, 0.1]);
    let noise: Vec<u8> = (0..4096u32).map(|i| (i * 31 % 251) as u8).collect();
    let (result, meets) = h.service.predict(&noise);

    assert!(!meets);
    assert_fallback_shape(&result);
}

#[test]
fn every_result_lists_all_classes() {
    let h = with_model(vec![0.3, 0.1, 0.2, 0.25, 0.15]);
    let jpeg = leaf_image(300, 300, ImageFormat::Jpeg);
    let inputs: [&[u8]; 3] = [&[], &[0xff, 0xd8, 0x00], &jpeg];

    for input in inputs {
        let (result, _) = h.service.predict(input);
        let keys: Vec<DiseaseKey> = result.all_scores.iter().map(|s| s.disease_key).collect();
        assert_eq!(keys, DiseaseKey::ALL.to_vec());
    }
}

#[test]
fn outcome_serializes_for_the_wire() {
    let h = with_model(vec![0.1, 0.1, 0.6, 0.1, 0.1]);
    let (result, meets) = h.service.predict(&leaf_image(300, 300, ImageFormat::Jpeg));
    let outcome = ScanOutcome::new("scan_1".to_string(), result, meets, 12.5);

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["scan_id"], "scan_1");
    assert_eq!(json["meets_threshold"], true);
    assert_eq!(json["result"]["disease_key"], "healthy");
    assert_eq!(json["result"]["all_scores"].as_array().unwrap().len(), 5);
    assert!(json["result"].get("fallback_reason").is_none());
}

#[tokio::test]
async fn async_prediction_matches_blocking() {
    let h = with_model(vec![0.1, 0.1, 0.1, 0.6, 0.1]);
    let service = Arc::new(h.service);
    let image = Bytes::from(leaf_image(300, 300, ImageFormat::Jpeg));

    let (result, meets) = service.predict_async(image).await;
    assert!(meets);
    assert_eq!(result.disease_key, DiseaseKey::LeafBlast);
}

#[tokio::test]
async fn slow_inference_times_out_to_fallback() {
    let h = harness(true, vec![0.1, 0.1, 0.6, 0.1, 0.1], Duration::from_millis(400));
    let service = Arc::new(
        h.service
            .with_inference_timeout(Duration::from_millis(50)),
    );
    let image = Bytes::from(leaf_image(300, 300, ImageFormat::Jpeg));

    let (result, meets) = service.predict_async(image).await;
    assert!(!meets);
    assert_fallback_shape(&result);
    assert_eq!(result.fallback_kind, Some(FallbackKind::InferenceTimeout));
    assert!(result.fallback_reason.unwrap().contains("50 ms"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn queued_requests_do_not_spend_the_timeout_waiting() {
    let h = harness(true, vec![0.1, 0.1, 0.6, 0.1, 0.1], Duration::from_millis(500));
    let service = Arc::new(
        h.service
            .with_inference_timeout(Duration::from_millis(1200)),
    );
    let image = Bytes::from(leaf_image(300, 300, ImageFormat::Jpeg));

    // Serialized, the last request finishes well past the budget
    let requests = (0..4).map(|_| {
        let service = service.clone();
        let image = image.clone();
        async move { service.predict_async(image).await }
    });
    let results = futures::future::join_all(requests).await;

    for (result, meets) in results {
        assert!(result.success, "unexpected fallback: {:?}", result.fallback_reason);
        assert!(meets);
        assert_eq!(result.disease_key, DiseaseKey::Healthy);
    }
}

#[tokio::test]
async fn async_empty_input_short_circuits() {
    let h = with_model(vec![0.1, 0.1, 0.6, 0.1, 0.1]);
    let service = Arc::new(h.service);

    let (result, meets) = service.predict_async(Bytes::new()).await;
    assert!(!meets);
    assert_eq!(result.fallback_kind, Some(FallbackKind::NoImageData));
    assert!(!service.status().loaded);
}
