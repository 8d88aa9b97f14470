use crate::error::{VoxError, VoxResult};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// One logical narration unit: a key unique within the project, paired with
/// the literal text to synthesize. An empty string marks a deliberately
/// silent scene.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationUnit {
    pub key: String,
    pub text: String,
}

/// The narration source for a project: units in declaration order, plus the
/// content digest of the raw source file used by the coarse freshness check.
#[derive(Debug, Clone)]
pub struct NarrationSource {
    pub units: Vec<NarrationUnit>,
    pub digest: String,
}

impl NarrationSource {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.units
            .iter()
            .find(|u| u.key == key)
            .map(|u| u.text.as_str())
    }
}

pub fn narration_path(project_path: &Path) -> PathBuf {
    project_path.join("narration.json")
}

/// Load `<project>/narration.json`: a JSON object mapping narration keys to
/// literal strings. Declaration order is preserved for generation ordering;
/// correctness does not depend on it.
pub fn load_narration(project_path: &Path) -> VoxResult<NarrationSource> {
    let path = narration_path(project_path);
    if !path.exists() {
        return Err(VoxError::ConfigNotFound(path));
    }
    let raw = std::fs::read(&path)?;
    let units = parse_narration(&raw)?;
    Ok(NarrationSource {
        units,
        digest: hex_digest(&raw),
    })
}

fn parse_narration(raw: &[u8]) -> VoxResult<Vec<NarrationUnit>> {
    let map: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(raw)
        .map_err(|e| VoxError::ConfigParse(format!("narration.json: {e}")))?;

    let mut units = Vec::with_capacity(map.len());
    for (key, value) in map {
        let text = value.as_str().ok_or_else(|| {
            VoxError::ConfigParse(format!(
                "narration.json: value for key '{key}' is not a string"
            ))
        })?;
        units.push(NarrationUnit {
            key,
            text: text.to_string(),
        });
    }
    Ok(units)
}

/// SHA-256 of arbitrary bytes, hex-encoded.
pub fn hex_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut s = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(s, "{b:02x}");
    }
    s
}
