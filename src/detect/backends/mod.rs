pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

use anyhow::{anyhow, Result};

use crate::config::ModelSettings;
use crate::detect::backend::{share, SharedModel};

pub use stub::StubModel;

#[cfg(feature = "backend-tract")]
pub use tract::TractModel;

/// Backend names accepted in configuration.
pub const BACKEND_NAMES: [&str; 2] = ["tract", "stub"];

/// Build the configured model and warm it up.
///
/// For the `stub` backend `settings.path` names a JSON fixture; an empty
/// path yields a stub that never finds anything.
pub fn load_model(settings: &ModelSettings) -> Result<SharedModel> {
    match settings.backend.as_str() {
        "stub" => {
            let model = if settings.path.trim().is_empty() {
                StubModel::coco()
            } else {
                StubModel::from_fixture(&settings.path)?
            };
            log::info!("model: stub backend ({})", display_path(&settings.path));
            Ok(share(model))
        }
        "tract" => load_tract(settings),
        other => Err(anyhow!(
            "unknown model backend '{}'; expected one of {:?}",
            other,
            BACKEND_NAMES
        )),
    }
}

#[cfg(feature = "backend-tract")]
fn load_tract(settings: &ModelSettings) -> Result<SharedModel> {
    use crate::detect::backend::DetectorModel;

    let mut model = TractModel::new(&settings.path, settings.input_size)?
        .with_thresholds(settings.confidence_threshold, settings.iou_threshold);
    model.warm_up()?;
    log::info!(
        "model: tract backend loaded from {} ({}x{})",
        settings.path,
        settings.input_size,
        settings.input_size
    );
    Ok(share(model))
}

#[cfg(not(feature = "backend-tract"))]
fn load_tract(_settings: &ModelSettings) -> Result<SharedModel> {
    Err(anyhow!(
        "the tract backend requires the backend-tract feature"
    ))
}

fn display_path(path: &str) -> &str {
    if path.trim().is_empty() {
        "no fixture"
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backend::DetectorModel;

    fn settings(backend: &str) -> ModelSettings {
        ModelSettings {
            backend: backend.to_string(),
            path: String::new(),
            ..ModelSettings::default()
        }
    }

    #[test]
    fn loads_empty_stub() {
        let model = load_model(&settings("stub")).unwrap();
        let guard = model.lock().unwrap();
        assert_eq!(guard.name(), "stub");
        assert_eq!(guard.class_id("dog"), Some(16));
    }

    #[test]
    fn rejects_unknown_backend() {
        let err = load_model(&settings("opencv")).err().unwrap();
        assert!(err.to_string().contains("unknown model backend"));
    }

    #[cfg(not(feature = "backend-tract"))]
    #[test]
    fn tract_requires_feature() {
        let err = load_model(&settings("tract")).err().unwrap();
        assert!(err.to_string().contains("backend-tract"));
    }

    #[cfg(feature = "backend-tract")]
    #[test]
    fn default_backend_is_compiled_in() {
        let defaults = ModelSettings {
            path: "does/not/exist.onnx".to_string(),
            ..ModelSettings::default()
        };
        assert_eq!(defaults.backend, "tract");
        let err = load_model(&defaults).err().unwrap();
        let message = format!("{:#}", err);
        assert!(message.contains("failed to load ONNX model"), "{}", message);
        assert!(!message.contains("backend-tract"), "{}", message);
    }
}
