use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::annotate::LabelStyle;
use crate::detect::backends::BACKEND_NAMES;
use crate::detect::DEFAULT_TARGET_CLASS;

const DEFAULT_API_URL: &str = "https://api.telegram.org";
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;
const MAX_POLL_TIMEOUT_SECS: u64 = 50;
const DEFAULT_MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_MODEL_BACKEND: &str = "tract";
const DEFAULT_MODEL_PATH: &str = "yolov8n.onnx";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
const DEFAULT_IOU_THRESHOLD: f32 = 0.7;
const DEFAULT_STROKE_WIDTH: u32 = 3;
const DEFAULT_COLOR: [u8; 3] = [255, 0, 0];
const DEFAULT_FONT_SCALE: f32 = 24.0;

/// Env file loaded by the bot before reading configuration.
pub const DEFAULT_ENV_FILE: &str = "config/.env";

#[derive(Debug, Deserialize, Default)]
struct BotConfigFile {
    telegram: Option<TelegramConfigFile>,
    model: Option<ModelConfigFile>,
    render: Option<RenderConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct TelegramConfigFile {
    api_url: Option<String>,
    poll_timeout_secs: Option<u64>,
    max_image_bytes: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    backend: Option<String>,
    path: Option<String>,
    input_size: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
    target_class: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RenderConfigFile {
    font_path: Option<PathBuf>,
    label_style: Option<LabelStyle>,
    stroke_width: Option<u32>,
    color: Option<[u8; 3]>,
    font_scale: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Bot API token. Only the bot binary requires it.
    pub bot_token: Option<String>,
    pub telegram: TelegramSettings,
    pub model: ModelSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub api_url: String,
    pub poll_timeout: Duration,
    pub max_image_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub backend: String,
    pub path: String,
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub target_class: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_MODEL_BACKEND.to_string(),
            path: DEFAULT_MODEL_PATH.to_string(),
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            target_class: DEFAULT_TARGET_CLASS.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub font_path: Option<PathBuf>,
    pub label_style: LabelStyle,
    pub stroke_width: u32,
    pub color: [u8; 3],
    pub font_scale: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            font_path: None,
            label_style: LabelStyle::default(),
            stroke_width: DEFAULT_STROKE_WIDTH,
            color: DEFAULT_COLOR,
            font_scale: DEFAULT_FONT_SCALE,
        }
    }
}

impl BotConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("DOG_SPOTTER_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: BotConfigFile) -> Self {
        let telegram = file.telegram.unwrap_or_default();
        let model = file.model.unwrap_or_default();
        let render = file.render.unwrap_or_default();
        let model_defaults = ModelSettings::default();

        Self {
            bot_token: None,
            telegram: TelegramSettings {
                api_url: telegram
                    .api_url
                    .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                poll_timeout: Duration::from_secs(
                    telegram
                        .poll_timeout_secs
                        .unwrap_or(DEFAULT_POLL_TIMEOUT_SECS),
                ),
                max_image_bytes: telegram.max_image_bytes.unwrap_or(DEFAULT_MAX_IMAGE_BYTES),
            },
            model: ModelSettings {
                backend: model.backend.unwrap_or(model_defaults.backend),
                path: model.path.unwrap_or(model_defaults.path),
                input_size: model.input_size.unwrap_or(model_defaults.input_size),
                confidence_threshold: model
                    .confidence_threshold
                    .unwrap_or(model_defaults.confidence_threshold),
                iou_threshold: model
                    .iou_threshold
                    .unwrap_or(model_defaults.iou_threshold),
                target_class: model.target_class.unwrap_or(model_defaults.target_class),
            },
            render: RenderSettings {
                font_path: render.font_path,
                label_style: render.label_style.unwrap_or_default(),
                stroke_width: render.stroke_width.unwrap_or(DEFAULT_STROKE_WIDTH),
                color: render.color.unwrap_or(DEFAULT_COLOR),
                font_scale: render.font_scale.unwrap_or(DEFAULT_FONT_SCALE),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(token) = non_empty_env("BOT_TOKEN") {
            self.bot_token = Some(token.trim().to_string());
        }
        if let Some(url) = non_empty_env("DOG_SPOTTER_API_URL") {
            self.telegram.api_url = url;
        }
        if let Some(backend) = non_empty_env("DOG_SPOTTER_MODEL_BACKEND") {
            self.model.backend = backend;
        }
        if let Some(path) = non_empty_env("DOG_SPOTTER_MODEL_PATH") {
            self.model.path = path;
        }
        if let Some(confidence) = non_empty_env("DOG_SPOTTER_CONFIDENCE") {
            self.model.confidence_threshold = confidence.trim().parse().map_err(|_| {
                anyhow!("DOG_SPOTTER_CONFIDENCE must be a number between 0 and 1")
            })?;
        }
        if let Some(path) = non_empty_env("DOG_SPOTTER_FONT_PATH") {
            self.render.font_path = Some(PathBuf::from(path));
        }
        if let Some(timeout) = non_empty_env("DOG_SPOTTER_POLL_TIMEOUT_SECS") {
            let seconds: u64 = timeout.trim().parse().map_err(|_| {
                anyhow!("DOG_SPOTTER_POLL_TIMEOUT_SECS must be an integer number of seconds")
            })?;
            self.telegram.poll_timeout = Duration::from_secs(seconds);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        let api_url = url::Url::parse(&self.telegram.api_url)
            .map_err(|e| anyhow!("invalid api_url {}: {}", self.telegram.api_url, e))?;
        if !matches!(api_url.scheme(), "http" | "https") {
            return Err(anyhow!("api_url must use http or https"));
        }
        self.telegram.api_url = self.telegram.api_url.trim_end_matches('/').to_string();

        if self.telegram.poll_timeout.as_secs() > MAX_POLL_TIMEOUT_SECS {
            return Err(anyhow!(
                "poll_timeout_secs must be at most {}",
                MAX_POLL_TIMEOUT_SECS
            ));
        }
        if self.telegram.max_image_bytes == 0 {
            return Err(anyhow!("max_image_bytes must be greater than zero"));
        }

        self.model.backend = self.model.backend.trim().to_lowercase();
        if !BACKEND_NAMES.contains(&self.model.backend.as_str()) {
            return Err(anyhow!(
                "model backend must be one of {:?}, got '{}'",
                BACKEND_NAMES,
                self.model.backend
            ));
        }
        if self.model.input_size == 0 || self.model.input_size % 32 != 0 {
            return Err(anyhow!("input_size must be a positive multiple of 32"));
        }
        check_unit("confidence_threshold", self.model.confidence_threshold)?;
        check_unit("iou_threshold", self.model.iou_threshold)?;
        self.model.target_class = self.model.target_class.trim().to_string();
        if self.model.target_class.is_empty() {
            return Err(anyhow!("target_class must not be empty"));
        }

        if self.render.stroke_width == 0 {
            return Err(anyhow!("stroke_width must be at least 1"));
        }
        if self.render.font_scale.is_nan() || self.render.font_scale <= 0.0 {
            return Err(anyhow!("font_scale must be positive"));
        }
        Ok(())
    }
}

/// Load `KEY=value` pairs from an env file into the process environment.
///
/// Variables already set win. A missing file is not an error.
pub fn load_env_file(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    dotenv::from_path(path)
        .map_err(|e| anyhow!("failed to load env file {}: {}", path.display(), e))?;
    Ok(true)
}

fn read_config_file(path: &Path) -> Result<BotConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(anyhow!("{} must be within [0, 1], got {}", name, value))
    }
}
