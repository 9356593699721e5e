//! dog_detect - run detection and annotation on a single image file

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use dog_spotter::config::{ModelSettings, RenderSettings};
use dog_spotter::detect::load_model;
use dog_spotter::{Annotator, Detector, LabelStyle, Pipeline};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image to inspect.
    #[arg(long)]
    input: PathBuf,
    /// Where to write the annotated image.
    #[arg(long)]
    output: PathBuf,
    /// Model backend (tract|stub).
    #[arg(long, env = "DOG_SPOTTER_MODEL_BACKEND", default_value = "tract")]
    backend: String,
    /// ONNX model, or a JSON fixture for the stub backend.
    #[arg(long, env = "DOG_SPOTTER_MODEL_PATH", default_value = "yolov8n.onnx")]
    model: String,
    /// TrueType font for the label (defaults to the bundled DejaVu Sans).
    #[arg(long, env = "DOG_SPOTTER_FONT_PATH")]
    font: Option<PathBuf>,
    /// Label with the class name only, without confidence.
    #[arg(long)]
    plain_label: bool,
    /// Class to look for.
    #[arg(long, default_value = "dog")]
    target_class: String,
    /// UI mode for stderr progress.
    #[arg(long, value_enum, default_value = "auto", value_name = "MODE")]
    ui: ui::UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let ui = ui::Ui::new(args.ui, std::io::stderr().is_terminal());

    let model_settings = ModelSettings {
        backend: args.backend.trim().to_lowercase(),
        path: args.model.clone(),
        target_class: args.target_class.trim().to_string(),
        ..ModelSettings::default()
    };
    if model_settings.target_class.is_empty() {
        return Err(anyhow!("--target-class must not be empty"));
    }
    let render_settings = RenderSettings {
        font_path: args.font.clone(),
        label_style: if args.plain_label {
            LabelStyle::Plain
        } else {
            LabelStyle::Confidence
        },
        ..RenderSettings::default()
    };

    let input = {
        let _stage = ui.stage("Read input");
        std::fs::read(&args.input)
            .map_err(|e| anyhow!("failed to read {}: {}", args.input.display(), e))?
    };
    let pipeline = {
        let _stage = ui.stage("Load model");
        let model = load_model(&model_settings)?;
        let detector =
            Detector::new(model).with_target_class(model_settings.target_class.clone());
        let annotator = Annotator::from_settings(&render_settings, &model_settings.target_class)?;
        Pipeline::new(detector, annotator)
    };
    let outcome = {
        let mut stage = ui.stage("Detect and annotate");
        let outcome = pipeline.run(&input)?;
        stage.detail(match &outcome.detection {
            Some(detection) => format!("{:.0}%", f64::from(detection.confidence) * 100.0),
            None => "nothing found".to_string(),
        });
        outcome
    };
    {
        let _stage = ui.stage("Write output");
        std::fs::write(&args.output, &outcome.annotated.image)
            .map_err(|e| anyhow!("failed to write {}: {}", args.output.display(), e))?;
    }

    let summary = serde_json::json!({
        "found": outcome.found(),
        "confidence": outcome.detection.map(|d| d.confidence),
        "bbox": outcome.detection.map(|d| d.bbox),
        "output": args.output.display().to_string(),
    });
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}
