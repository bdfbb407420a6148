use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use argh::FromArgs;
use brisk_cli::{Brisk, BriskDescriptors, BriskError, BriskImage, BriskKeypoint, BriskResult, DetectorConfig};
use image::{ImageReader, Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};
use log::{error, info};

/// Detect BRISK keypoints and compute their binary descriptors.
#[derive(FromArgs, Debug)]
struct Args {
    /// input image, any format the `image` crate decodes
    #[argh(positional)]
    image: PathBuf,

    /// corner score a keypoint must exceed (default 60)
    #[argh(option)]
    threshold: Option<f32>,

    /// number of octaves, 0 for the source image only (default 4)
    #[argh(option)]
    octaves: Option<usize>,

    /// sampling pattern scale (default 1.0)
    #[argh(option)]
    pattern_scale: Option<f32>,

    /// skip orientation estimation
    #[argh(switch)]
    upright: bool,

    /// describe every keypoint at a single scale
    #[argh(switch)]
    single_scale: bool,

    /// worker threads (default: all cores)
    #[argh(option)]
    threads: Option<usize>,

    /// named preset: default, fast, upright, single-scale or dense
    #[argh(option)]
    preset: Option<String>,

    /// JSON or TOML configuration file, applied before the other flags
    #[argh(option)]
    config: Option<PathBuf>,

    /// write the image with keypoints drawn on it
    #[argh(option)]
    output: Option<PathBuf>,

    /// write keypoints and hex descriptors as JSON
    #[argh(option)]
    json: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args: Args = argh::from_env();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> BriskResult<()> {
    let config = resolve_config(args)?;
    info!("{}", config.summary());

    let luma = ImageReader::open(&args.image)?.decode()?.to_luma8();
    let (w, h) = luma.dimensions();
    let img = BriskImage::from_raw(w as usize, h as usize, luma.into_raw())?;

    let t0 = Instant::now();
    let brisk = Brisk::new(config.core)?;
    let setup = t0.elapsed();

    // Time the full pipeline
    let t1 = Instant::now();
    let (keypoints, descriptors) = brisk.detect_and_describe(&img)?;
    let elapsed = t1.elapsed();

    println!("Image: {}x{}", w, h);
    println!("Pattern setup: {:.2?}", setup);
    println!("Time taken: {:.2?}", elapsed);
    println!("Detected {} keypoints", keypoints.len());
    println!(
        "Generated {} descriptors of {} bytes",
        descriptors.len(),
        descriptors.row_bytes()
    );

    if let Some(path) = &args.output {
        draw_keypoints(&img, &keypoints).save(path)?;
        println!("Saved keypoint overlay as {}", path.display());
    }
    if let Some(path) = &args.json {
        write_json(path, &args.image, &keypoints, &descriptors)?;
        println!("Saved keypoints as {}", path.display());
    }
    Ok(())
}

/// Preset, then config file, then individual flags
fn resolve_config(args: &Args) -> BriskResult<DetectorConfig> {
    let mut config = match &args.preset {
        Some(name) => DetectorConfig::preset_by_name(name)
            .ok_or_else(|| BriskError::UnknownPreset(name.clone()))?,
        None => DetectorConfig::default(),
    };
    if let Some(path) = &args.config {
        config = load_config(path)?;
    }

    let core = &mut config.core;
    if let Some(threshold) = args.threshold {
        core.threshold = threshold;
    }
    if let Some(octaves) = args.octaves {
        core.octaves = octaves;
    }
    if let Some(pattern_scale) = args.pattern_scale {
        core.pattern_scale = pattern_scale;
    }
    if let Some(threads) = args.threads {
        core.n_threads = threads;
    }
    if args.upright {
        core.rotation_invariant = false;
    }
    if args.single_scale {
        core.scale_invariant = false;
    }
    config.validate()?;
    Ok(config)
}

#[cfg(feature = "serde")]
fn load_config(path: &Path) -> BriskResult<DetectorConfig> {
    DetectorConfig::load(path)
}

#[cfg(not(feature = "serde"))]
fn load_config(_path: &Path) -> BriskResult<DetectorConfig> {
    Err(BriskError::SerdeDisabled("--config"))
}

fn draw_keypoints(img: &BriskImage, keypoints: &[BriskKeypoint]) -> RgbaImage {
    let mut output = RgbaImage::from_fn(img.width() as u32, img.height() as u32, |x, y| {
        let v = img.get(x as usize, y as usize);
        Rgba([v, v, v, 255])
    });
    let color = Rgba([255, 0, 0, 255]);
    for kp in keypoints {
        let radius = (kp.size / 2.0).max(1.0);
        draw_hollow_circle_mut(&mut output, (kp.x as i32, kp.y as i32), radius as i32, color);
        if kp.has_angle() {
            let (s, c) = kp.angle.to_radians().sin_cos();
            draw_line_segment_mut(&mut output, (kp.x, kp.y), (kp.x + c * radius, kp.y + s * radius), color);
        }
    }
    output
}

#[cfg(feature = "serde")]
fn write_json(
    path: &Path,
    image: &Path,
    keypoints: &[BriskKeypoint],
    descriptors: &BriskDescriptors,
) -> BriskResult<()> {
    #[derive(serde::Serialize)]
    struct Report<'a> {
        image: String,
        descriptor_bytes: usize,
        keypoints: &'a [BriskKeypoint],
        descriptors: Vec<String>,
    }

    let report = Report {
        image: image.display().to_string(),
        descriptor_bytes: descriptors.row_bytes(),
        keypoints,
        descriptors: descriptors
            .rows()
            .map(|row| row.iter().map(|b| format!("{b:02x}")).collect())
            .collect(),
    };
    std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
    Ok(())
}

#[cfg(not(feature = "serde"))]
fn write_json(_: &Path, _: &Path, _: &[BriskKeypoint], _: &BriskDescriptors) -> BriskResult<()> {
    Err(BriskError::SerdeDisabled("--json"))
}
