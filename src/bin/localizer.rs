//! Synthetic end-to-end demo.
//!
//! Drives the localization pipeline with a stub inference engine and
//! generated camera frames until the detected set stabilizes, then prints
//! the accumulated boxes. Useful for eyeballing the pipeline without a
//! camera or a model runtime.

use anyhow::Result;
use clap::Parser;
use image::{Rgba, RgbaImage};
use ndarray::{Array, IxDyn};
use rand::Rng;

use localizer_rs::{
    DecoderConfig, FrameOutcome, GridDecoder, LabelTable, LocalizationSession, PipelineConfig,
    StubEngine, ViewTransform,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "object localization demo over synthetic frames", long_about = None)]
struct Args {
    /// Label table file, one label per line; synthetic labels if omitted
    #[arg(short, long)]
    labels: Option<String>,

    /// Number of synthetic classes when no label file is given
    #[arg(short, long, default_value_t = 20)]
    classes: usize,

    /// Detector input edge length
    #[arg(short, long, default_value_t = 416)]
    size: u32,

    /// Confidence threshold
    #[arg(short, long, default_value_t = 0.2)]
    threshold: f32,

    /// Maximum frames to feed before giving up
    #[arg(short, long, default_value_t = 400)]
    frames: u32,

    /// Simulated screen width in pixels
    #[arg(long, default_value_t = 1080)]
    screen_width: u32,

    /// Simulated screen height in pixels
    #[arg(long, default_value_t = 1920)]
    screen_height: u32,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let labels = match &args.labels {
        Some(path) => LabelTable::from_file(path)?,
        None => LabelTable::new((0..args.classes).map(|i| format!("object-{i}")).collect())?,
    };

    let mut config = DecoderConfig::with_classes(labels.len());
    config.confidence_threshold = args.threshold;
    let engine = StubEngine::new(synthetic_output(&config));
    let decoder = GridDecoder::new(config, labels)?;

    let pipeline = PipelineConfig {
        input_size: args.size,
        ..PipelineConfig::default()
    };
    let view = ViewTransform::for_screen(
        args.screen_width as f32,
        args.screen_height as f32,
        args.size,
    );
    let mut session = LocalizationSession::new(Box::new(engine), decoder, pipeline, view);

    let mut rng = rand::thread_rng();
    let mut frames_fed = 0u32;
    for _ in 0..args.frames {
        let frame = synthetic_frame(&mut rng, 320, 240);
        match session.submit_frame(frame)? {
            FrameOutcome::Complete => break,
            FrameOutcome::Scheduled => {
                frames_fed += 1;
                session.wait_cycle()?;
            }
            FrameOutcome::Dropped => {}
        }
    }

    if session.localization_complete() {
        println!("localization complete after {frames_fed} frames");
    } else {
        println!("stopped after {frames_fed} frames without stabilizing");
    }
    println!(
        "{} boxes accumulated, {} frames dropped",
        session.boxes().len(),
        session.dropped_frames()
    );
    for (index, b) in session.boxes().iter().enumerate() {
        println!(
            "  #{index} {} {:.0}%  at ({:.1}, {:.1}) {:.1}x{:.1}",
            b.label,
            b.confidence * 100.0,
            b.dimensions.x,
            b.dimensions.y,
            b.dimensions.width,
            b.dimensions.height
        );
    }
    Ok(())
}

/// One confident detection in the center cell, everything else muted.
fn synthetic_output(config: &DecoderConfig) -> Array<f32, IxDyn> {
    let mut tensor = Array::from_elem(
        IxDyn(&[1, config.grid_rows, config.grid_cols, config.channel_depth()]),
        -8.0f32,
    );
    let row = config.grid_rows / 2;
    let col = config.grid_cols / 2;
    let channel = 2 * (config.class_count + 5); // anchor slot 2

    for offset in 0..4 {
        tensor[[0, row, col, channel + offset]] = 0.0;
    }
    tensor[[0, row, col, channel + 4]] = 4.0; // objectness ≈ 0.98
    tensor[[0, row, col, channel + 5 + 7 % config.class_count]] = 8.0;
    tensor
}

/// Flat gray frame with sensor-ish noise.
fn synthetic_frame(rng: &mut impl Rng, width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |_, _| {
        let v: u8 = rng.gen_range(96..160);
        Rgba([v, v, v, 255])
    })
}
