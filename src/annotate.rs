//! Burns the selected detection into the image.
//!
//! A missing detection never touches the pixels: the input bytes are handed
//! back as-is. A detection is drawn as a hollow rectangle centered on the box
//! edges plus a text label sitting above the top-left corner.

use std::io::Cursor;
use std::path::Path;

use ab_glyph::FontArc;
use anyhow::{anyhow, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use serde::Deserialize;

use crate::config::RenderSettings;
use crate::detect::{BoundingBox, Detection, DetectionResult};
use crate::error::RenderError;

const JPEG_QUALITY: u8 = 95;

/// DejaVu Sans, used for labels unless another font is configured.
const BUNDLED_FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");

/// How the text above the box reads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelStyle {
    /// Class name only: `Dog`.
    Plain,
    /// Class name and integer percentage: `Dog 92%`.
    #[default]
    Confidence,
}

#[derive(Clone, Debug)]
pub struct AnnotationStyle {
    pub color: Rgb<u8>,
    pub stroke_width: u32,
    pub font_scale: f32,
    /// Gap between the label baseline and the top edge of the box.
    pub label_offset: i32,
    pub label_style: LabelStyle,
    pub class_label: String,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            color: Rgb([255, 0, 0]),
            stroke_width: 3,
            font_scale: 24.0,
            label_offset: 10,
            label_style: LabelStyle::Confidence,
            class_label: "Dog".to_string(),
        }
    }
}

impl AnnotationStyle {
    pub fn from_settings(settings: &RenderSettings, target_class: &str) -> Self {
        Self {
            color: Rgb(settings.color),
            stroke_width: settings.stroke_width,
            font_scale: settings.font_scale,
            label_style: settings.label_style,
            class_label: display_class(target_class),
            ..Self::default()
        }
    }
}

/// Output of the annotation step.
#[derive(Clone, Debug)]
pub struct Annotated {
    /// Encoded output image.
    pub image: Vec<u8>,
    /// Encoding of `image`, when recognizable.
    pub format: Option<ImageFormat>,
    pub found: bool,
    pub confidence: Option<f32>,
}

impl Annotated {
    /// File name to use when handing the image to a messaging platform.
    pub fn file_name(&self) -> String {
        let extension = self
            .format
            .and_then(|format| format.extensions_str().first().copied())
            .unwrap_or("bin");
        format!("result.{}", extension)
    }
}

pub struct Annotator {
    style: AnnotationStyle,
    font: FontArc,
}

impl Annotator {
    /// Annotator labelling with the bundled font.
    pub fn new(style: AnnotationStyle) -> Result<Self> {
        let font = FontArc::try_from_slice(BUNDLED_FONT)
            .map_err(|_| anyhow!("bundled label font is not a valid font"))?;
        Ok(Self { style, font })
    }

    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = font;
        self
    }

    pub fn with_font_path(self, path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .map_err(|e| anyhow!("failed to read font {}: {}", path.display(), e))?;
        let font = FontArc::try_from_vec(data)
            .map_err(|_| anyhow!("failed to parse font file {}", path.display()))?;
        log::info!("label font: {}", path.display());
        Ok(self.with_font(font))
    }

    /// Build from configuration. A configured font must load.
    pub fn from_settings(settings: &RenderSettings, target_class: &str) -> Result<Self> {
        let annotator = Self::new(AnnotationStyle::from_settings(settings, target_class))?;
        match &settings.font_path {
            Some(path) => annotator.with_font_path(path),
            None => Ok(annotator),
        }
    }

    pub fn style(&self) -> &AnnotationStyle {
        &self.style
    }

    pub fn label(&self, detection: &Detection) -> String {
        format_label(
            &self.style.class_label,
            detection.confidence,
            self.style.label_style,
        )
    }

    /// Where the label lands as `(x, y, width, height)`: its bottom edge
    /// `label_offset` pixels above the box, starting at `x1`.
    pub fn label_bounds(&self, detection: &Detection) -> (i32, i32, u32, u32) {
        let label = self.label(detection);
        let (width, height) = text_size(self.style.font_scale, &self.font, &label);
        let y = i64::from(detection.bbox.y1)
            - i64::from(self.style.label_offset)
            - i64::from(height);
        (
            saturate(i64::from(detection.bbox.x1)),
            saturate(y),
            width,
            height,
        )
    }

    /// Produce the output image for a detection result.
    pub fn annotate(
        &self,
        input: &[u8],
        result: &DetectionResult,
    ) -> Result<Annotated, RenderError> {
        let format = image::guess_format(input).ok();
        let Some(detection) = result else {
            return Ok(Annotated {
                image: input.to_vec(),
                format,
                found: false,
                confidence: None,
            });
        };

        let mut canvas = image::load_from_memory(input)
            .map_err(RenderError::Decode)?
            .into_rgb8();
        self.draw(&mut canvas, detection);

        let format = match format {
            Some(ImageFormat::Jpeg) => ImageFormat::Jpeg,
            _ => ImageFormat::Png,
        };
        Ok(Annotated {
            image: encode(&canvas, format)?,
            format: Some(format),
            found: true,
            confidence: Some(detection.confidence),
        })
    }

    /// Draw the rectangle and label onto an already decoded image.
    pub fn draw(&self, canvas: &mut RgbImage, detection: &Detection) {
        draw_thick_rect(
            canvas,
            &detection.bbox,
            self.style.stroke_width,
            self.style.color,
        );

        let (x, y, width, height) = self.label_bounds(detection);
        let visible_x = x < canvas.width() as i32 && x.saturating_add(width as i32) > 0;
        let visible_y = y < canvas.height() as i32 && y.saturating_add(height as i32) > 0;
        if !(visible_x && visible_y) {
            return;
        }
        draw_text_mut(
            canvas,
            self.style.color,
            x,
            y,
            self.style.font_scale,
            &self.font,
            &self.label(detection),
        );
    }
}

/// `Dog 92%` or `Dog`.
pub fn format_label(class_label: &str, confidence: f32, style: LabelStyle) -> String {
    match style {
        LabelStyle::Plain => class_label.to_string(),
        LabelStyle::Confidence => {
            format!("{} {:.0}%", class_label, f64::from(confidence) * 100.0)
        }
    }
}

fn display_class(class: &str) -> String {
    let mut chars = class.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Corners are inclusive; the stroke is centered on the box edges.
///
/// Corners far outside the canvas are pulled in to just past its border, so
/// the visible result is unchanged and sizes stay small.
fn draw_thick_rect(canvas: &mut RgbImage, bbox: &BoundingBox, stroke_width: u32, color: Rgb<u8>) {
    let (canvas_w, canvas_h) = (i64::from(canvas.width()), i64::from(canvas.height()));
    let stroke = i64::from(stroke_width.max(1)).min(canvas_w.max(canvas_h) + 1);
    let clamp_x = |v: i32| i64::from(v).clamp(-stroke - 1, canvas_w + stroke);
    let clamp_y = |v: i32| i64::from(v).clamp(-stroke - 1, canvas_h + stroke);
    let (x1, y1) = (clamp_x(bbox.x1), clamp_y(bbox.y1));
    let (x2, y2) = (clamp_x(bbox.x2), clamp_y(bbox.y2));

    let half = (stroke - 1) / 2;
    for t in 0..stroke {
        let grow = half - t;
        let (w, h) = (x2 - x1 + 1 + 2 * grow, y2 - y1 + 1 + 2 * grow);
        if w <= 0 || h <= 0 {
            continue;
        }
        let rect = Rect::at((x1 - grow) as i32, (y1 - grow) as i32).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}

fn saturate(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

fn encode(canvas: &RgbImage, format: ImageFormat) -> Result<Vec<u8>, RenderError> {
    let mut out = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
            canvas
                .write_with_encoder(encoder)
                .map_err(RenderError::Encode)?;
        }
        _ => {
            canvas
                .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
                .map_err(RenderError::Encode)?;
        }
    }
    Ok(out)
}
