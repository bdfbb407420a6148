use brisk_cli::{BriskBuilder, BriskImage, DetectorConfig};
use std::time::Instant;

/// Checkerboard with a bright diamond, enough structure for every preset
fn create_demo_image(size: usize) -> BriskImage {
    let c = size as i64 / 2;
    BriskImage::from_fn(size, size, |x, y| {
        let (dx, dy) = (x as i64 - c, y as i64 - c);
        if dx.abs() + dy.abs() < size as i64 / 5 {
            230
        } else if (x / 24 + y / 24) % 2 == 0 {
            170
        } else {
            50
        }
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("BRISK configuration presets");
    println!("===========================\n");

    let img = create_demo_image(320);
    let presets = [
        DetectorConfig::default_preset(),
        DetectorConfig::fast_preset(),
        DetectorConfig::upright_preset(),
        DetectorConfig::single_scale_preset(),
        DetectorConfig::dense_preset(),
    ];

    for preset in &presets {
        println!("{}", preset.summary());
        let brisk = preset.clone().to_builder().build()?;
        let t0 = Instant::now();
        let (keypoints, descriptors) = brisk.detect_and_describe(&img)?;
        println!(
            "   {} keypoints, {} descriptors in {:.2?}\n",
            keypoints.len(),
            descriptors.len(),
            t0.elapsed()
        );
    }

    // Serialization
    let custom = BriskBuilder::new()
        .threshold(45.0)
        .octaves(3)
        .pattern_scale(1.2)
        .to_config()
        .with_metadata("Custom", "Slightly larger pattern over three octaves");
    let toml = custom.to_toml()?;
    println!("Custom config as TOML:\n{toml}");
    let restored = DetectorConfig::from_toml(&toml)?;
    assert_eq!(restored, custom);
    println!("Custom config as JSON:\n{}", custom.to_json()?);

    Ok(())
}
