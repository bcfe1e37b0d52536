//! End-to-end inference and explanation scenarios.
//!
//! These tests run the full byte-level pipeline against the CPU backend
//! with small synthetic models and in-memory PNG scans.

use std::io::Cursor;

use burn::module::{Module, ModuleMapper, ParamId};
use burn::prelude::*;
use image::{DynamicImage, GrayImage, Luma};

use ctxai::engine::EngineBackend;
use ctxai::prelude::*;

/// Sets every parameter to zero, giving a model with uniform (identical)
/// output for every class.
struct ZeroMapper;

impl<B: Backend> ModuleMapper<B> for ZeroMapper {
    fn map_float<const D: usize>(&mut self, _id: ParamId, tensor: Tensor<B, D>) -> Tensor<B, D> {
        tensor.zeros_like()
    }
}

fn tiny_config() -> CtResNetConfig {
    CtResNetConfig {
        in_channels: 1,
        num_classes: 4,
        stage_widths: [8, 8, 16, 16],
        blocks_per_stage: 1,
        norm_groups: 4,
    }
}

fn build_engine(model: CtResNet<EngineBackend>) -> InferenceEngine {
    let mut config = EngineConfig::new("unused.mpk");
    config.model = tiny_config();
    config.image_size = 32;
    let loaded = LoadedScanModel::from_parts(model, Default::default(), config);
    InferenceEngine::from_model(loaded)
}

fn gray_png(size: u32, value: u8) -> Vec<u8> {
    let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(size, size, Luma([value])));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// A scan with strong spatial structure: a bright disc on a dark field.
fn structured_png(size: u32) -> Vec<u8> {
    let center = size as f32 / 2.0;
    let radius = size as f32 / 4.0;
    let img = GrayImage::from_fn(size, size, |x, y| {
        let dx = x as f32 - center;
        let dy = y as f32 - center;
        if (dx * dx + dy * dy).sqrt() < radius {
            Luma([220])
        } else {
            Luma([30])
        }
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

#[test]
fn uniform_model_predicts_uniform_probabilities() {
    let device = Default::default();
    let model = tiny_config()
        .init::<EngineBackend>(&device)
        .map(&mut ZeroMapper);
    let engine = build_engine(model);

    // A 224x224 all-mid-gray scan against uniform parameters: no class can
    // be distinguished, so each of the 4 classes gets ~0.25.
    let prediction = engine.predict_bytes(&gray_png(224, 128)).unwrap();
    assert_eq!(prediction.probabilities.len(), 4);
    for &p in &prediction.probabilities {
        assert!((p - 0.25).abs() < 1e-4);
    }
    let sum: f32 = prediction.probabilities.iter().sum();
    assert!((sum - 1.0).abs() < 1e-4);
    assert_eq!(prediction.class_index, argmax(&prediction.probabilities));
}

#[test]
fn uniform_model_yields_all_zero_saliency() {
    let device = Default::default();
    let model = tiny_config()
        .init::<EngineBackend>(&device)
        .map(&mut ZeroMapper);

    let scan = preprocess_scan(&gray_png(224, 128), 32, &device).unwrap();
    let output = grad_cam(&model, scan.tensor.clone(), TapPoint::LAST, None).unwrap();

    assert!(output.saliency.is_uniformly_zero());
    assert!(output
        .saliency
        .values()
        .iter()
        .all(|v| !v.is_nan() && (0.0..=1.0).contains(v)));

    // The engine still renders a valid overlay from the zero map.
    let engine = build_engine(
        tiny_config()
            .init::<EngineBackend>(&device)
            .map(&mut ZeroMapper),
    );
    let explanation = engine
        .explain_bytes(&gray_png(224, 128), ExplainOptions::default())
        .unwrap();
    assert!(explanation.heatmap_png.starts_with(&[0x89, b'P', b'N', b'G']));
}

#[test]
fn explicit_target_class_reseeds_the_backward_pass() {
    <EngineBackend as Backend>::seed(41);
    let device = Default::default();
    let model = tiny_config().init::<EngineBackend>(&device);

    let scan = preprocess_scan(&structured_png(64), 32, &device).unwrap();

    let default_run = grad_cam(&model, scan.tensor.clone(), TapPoint::Layer1, None).unwrap();

    // The reported class index always reflects the forward arg-max; only the
    // saliency pattern follows the requested class. At least one non-predicted
    // class must light up a different pattern than the predicted one.
    let mut some_pattern_differs = false;
    for offset in 1..4 {
        let other_class = (default_run.class_index + offset) % 4;
        let seeded_run =
            grad_cam(&model, scan.tensor.clone(), TapPoint::Layer1, Some(other_class)).unwrap();
        assert_eq!(seeded_run.class_index, default_run.class_index);
        assert_eq!(seeded_run.saliency.target_class(), other_class);
        if seeded_run.saliency.values() != default_run.saliency.values() {
            some_pattern_differs = true;
        }
    }
    assert!(
        some_pattern_differs,
        "saliency should differ when seeded from a non-predicted class"
    );
}

#[test]
fn explain_defaults_to_the_predicted_class() {
    <EngineBackend as Backend>::seed(43);
    let device = Default::default();
    let engine = build_engine(tiny_config().init::<EngineBackend>(&device));
    let bytes = gray_png(64, 150);

    let prediction = engine.predict_bytes(&bytes).unwrap();
    let explanation = engine
        .explain_bytes(&bytes, ExplainOptions::default())
        .unwrap();
    assert_eq!(explanation.class_index, prediction.class_index);
}

#[test]
fn concurrent_explanations_do_not_interfere() {
    <EngineBackend as Backend>::seed(47);
    let device: <EngineBackend as Backend>::Device = Default::default();
    let model = tiny_config().init::<EngineBackend>(&device);

    // Different scans per worker, each compared against its own serial run.
    let scans: Vec<_> = [40_u8, 128, 220]
        .iter()
        .map(|&value| {
            preprocess_scan::<ctxai::engine::InnerBackend>(&gray_png(64, value), 32, &device)
                .unwrap()
                .tensor
        })
        .collect();

    let serial: Vec<Vec<f32>> = scans
        .iter()
        .map(|tensor| {
            grad_cam(&model, tensor.clone(), TapPoint::LAST, None)
                .unwrap()
                .saliency
                .values()
                .to_vec()
        })
        .collect();

    // Worker threads hold shallow clones sharing the one set of parameters;
    // each call's capture is its own, so no cross-call interference.
    let concurrent: Vec<Vec<f32>> = std::thread::scope(|scope| {
        let handles: Vec<_> = scans
            .iter()
            .map(|tensor| {
                let tensor = tensor.clone();
                let model = model.clone();
                scope.spawn(move || {
                    grad_cam(&model, tensor, TapPoint::LAST, None)
                        .unwrap()
                        .saliency
                        .values()
                        .to_vec()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for (serial_map, concurrent_map) in serial.iter().zip(&concurrent) {
        assert_eq!(serial_map, concurrent_map);
    }
}

#[test]
fn mismatched_checkpoint_fails_and_is_not_cached() {
    let device = Default::default();
    let path = std::env::temp_dir().join(format!(
        "ctxai_integration_{}_mismatch.mpk",
        std::process::id()
    ));

    // Checkpoint from a 3-class training run, engine configured for 4.
    let trained = CtResNetConfig {
        num_classes: 3,
        ..tiny_config()
    }
    .init::<EngineBackend>(&device);
    save_classifier(&trained, &path).unwrap();

    let mut config = EngineConfig::new(path.clone());
    config.model = tiny_config();
    config.image_size = 32;

    let cache = ModelCache::new();
    let err = cache.get_or_load(&config).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Checkpoint(CheckpointError::ShapeMismatch { .. })
    ));
    assert!(cache.get().is_none());

    let _ = std::fs::remove_file(&path);
}
