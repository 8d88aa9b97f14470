use crate::cache::CacheIndex;
use crate::config;
use crate::error::{VoxError, VoxResult};
use std::path::Path;

/// CLI entry point: look up one cache entry by logical key or by exact
/// narration text (the render-time consumer's view) and print it as JSON.
pub fn run(path: &Path, key: Option<&str>, text: Option<&str>) -> VoxResult<()> {
    if !path.exists() {
        return Err(VoxError::ProjectNotFound(path.to_path_buf()));
    }
    let config = config::load_config(path)?;
    let output_dir = config.output_path(path);
    let index = CacheIndex::load(&output_dir)?;

    let entry = match (key, text) {
        (Some(k), None) => index.get_by_key(k),
        (None, Some(t)) => index.get_by_text(t),
        _ => {
            return Err(VoxError::Other(
                "pass exactly one of --key or --text".into(),
            ))
        }
    };

    match entry {
        Some(entry) => {
            let json = serde_json::to_string_pretty(entry)
                .map_err(|e| VoxError::Other(format!("failed to serialize entry: {e}")))?;
            println!("{json}");
            Ok(())
        }
        None => Err(VoxError::Other("no cache entry matches".into())),
    }
}
