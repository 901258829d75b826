use pixel_mlp::persist::{Format, load_any};
use pixel_mlp::pixels::{reconstruct, training_samples};
use pixel_mlp::{Activation, CorruptionMask, Error, Init, NetworkConfig, Raster};

const MASK: CorruptionMask = CorruptionMask::Threshold(CorruptionMask::DEFAULT_THRESHOLD);

/// Smooth RGB gradient with a few pixels blacked out.
fn damaged_raster() -> Raster {
    let (w, h) = (8, 6);
    let mut data = Vec::with_capacity(w * h * 3);
    for y in 0..h {
        for x in 0..w {
            let r = 0.3 + 0.6 * x as f32 / w as f32;
            let g = 0.2 + 0.5 * y as f32 / h as f32;
            data.extend_from_slice(&[r, g, 0.5]);
        }
    }
    let mut raster = Raster::new(w, h, 3, data).unwrap();
    for idx in [5, 17, 18, 40] {
        raster.pixel_mut(idx).fill(0.0);
    }
    raster
}

fn config() -> NetworkConfig {
    NetworkConfig {
        widths: vec![4, 8, 3],
        learning_rate: 0.1,
        activation: Activation::Sigmoid,
        weight_init: Some(Init::Uniform { limit: 0.5 }),
        seed: Some(3),
        ..NetworkConfig::default()
    }
}

#[test]
fn train_save_load_reconstruct() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config();
    let damaged = damaged_raster();

    let samples = training_samples(&damaged, MASK);
    assert_eq!(samples.len(), damaged.len() - 4);

    let mut mlp = cfg.build().unwrap();
    let report = mlp.train(&samples, 50).unwrap();
    assert!(report.final_loss < report.epoch_losses[0]);

    let mut expected = damaged.clone();
    assert_eq!(reconstruct(&mlp, &mut expected, MASK, None).unwrap(), 4);

    for format in [Format::Framed, Format::Legacy] {
        let path = dir.path().join(format!("{format:?}.bin"));
        mlp.save(&path, format).unwrap();

        let loaded = load_any(&path, &cfg).unwrap();
        assert_eq!(loaded.widths(), vec![4, 8, 3]);
        assert_eq!(loaded.export_parameters(), mlp.export_parameters());

        let mut raster = damaged.clone();
        assert_eq!(reconstruct(&loaded, &mut raster, MASK, None).unwrap(), 4);
        assert_eq!(raster, expected);
    }

    // Intact pixels are left alone; repainted ones stay in range.
    for idx in 0..damaged.len() {
        if MASK.is_corrupt(damaged.pixel(idx)) {
            assert!(expected.pixel(idx).iter().all(|v| (0.0..=1.0).contains(v)));
        } else {
            assert_eq!(expected.pixel(idx), damaged.pixel(idx));
        }
    }
}

#[test]
fn framed_snapshot_ignores_config_topology() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("weights.bin");
    let mlp = config().build().unwrap();
    mlp.save(&path, Format::Framed).unwrap();

    // The default config describes a different network.
    let loaded = load_any(&path, &NetworkConfig::default()).unwrap();
    assert_eq!(loaded, mlp);
}

#[test]
fn legacy_snapshot_needs_matching_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("weights.bin");
    config().build().unwrap().save(&path, Format::Legacy).unwrap();

    assert!(matches!(
        load_any(&path, &NetworkConfig::default()),
        Err(Error::ShapeMismatch(_))
    ));
}

#[test]
fn resumed_training_continues_from_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("weights.bin");
    let cfg = config();
    let samples = training_samples(&damaged_raster(), MASK);

    let mut first = cfg.build().unwrap();
    first.train(&samples, 20).unwrap();
    first.save(&path, Format::Framed).unwrap();

    let mut resumed = load_any(&path, &cfg).unwrap();
    let before = resumed.evaluate(&samples).unwrap();
    assert_eq!(before, first.evaluate(&samples).unwrap());

    resumed.train(&samples, 20).unwrap();
    assert!(resumed.evaluate(&samples).unwrap() < before);
}
