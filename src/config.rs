//! Option files and scene files as read by the `tsinfer` binary.

use anyhow::{Context, Result, bail};
use std::path::Path;
use tracing::debug;
use tsinfer_infer::InferenceOptions;
use tsinfer_ir::{MethodId, Scene};

/// Read [`InferenceOptions`] from a JSON file. Missing keys keep their
/// defaults; unknown keys are an error.
pub fn load_options(path: &Path) -> Result<InferenceOptions> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read options file {}", path.display()))?;
    let options: InferenceOptions = serde_json::from_str(&text)
        .with_context(|| format!("invalid options in {}", path.display()))?;
    debug!(?options, path = %path.display(), "loaded options");
    Ok(options)
}

pub fn load_scene(path: &Path) -> Result<Scene> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scene file {}", path.display()))?;
    Scene::from_json(&text).with_context(|| format!("invalid scene in {}", path.display()))
}

/// Resolve `Class::method` names. An empty list selects every method.
pub fn resolve_entries(scene: &Scene, names: &[String]) -> Result<Vec<MethodId>> {
    if names.is_empty() {
        return Ok(scene.method_ids().collect());
    }
    names
        .iter()
        .map(|name| {
            let Some((class, method)) = name.split_once("::") else {
                bail!("entry `{name}` is not of the form Class::method");
            };
            scene
                .find_method(class, method)
                .with_context(|| format!("no method `{method}` in class `{class}`"))
        })
        .collect()
}
