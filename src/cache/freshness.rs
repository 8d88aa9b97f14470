use crate::cache::CacheIndex;
use crate::error::VoxResult;
use std::io::Write;
use std::path::Path;

pub const MARKER_FILE: &str = "narration.sha256";

/// Digests recorded after the last fully successful population run. Two
/// lines on disk: the narration-source digest, then the reference identity
/// digest. A reference swap must invalidate the whole cache even when the
/// narration text is byte-identical, so the marker covers both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub narration_digest: String,
    pub reference_digest: String,
}

pub fn read_marker(output_dir: &Path) -> Option<Marker> {
    let raw = std::fs::read_to_string(output_dir.join(MARKER_FILE)).ok()?;
    let mut lines = raw.lines();
    let narration = lines.next()?.trim();
    let reference = lines.next()?.trim();
    if narration.is_empty() || reference.is_empty() {
        return None;
    }
    Some(Marker {
        narration_digest: narration.to_string(),
        reference_digest: reference.to_string(),
    })
}

pub fn write_marker(output_dir: &Path, marker: &Marker) -> VoxResult<()> {
    std::fs::create_dir_all(output_dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(output_dir)?;
    writeln!(tmp, "{}", marker.narration_digest)?;
    writeln!(tmp, "{}", marker.reference_digest)?;
    tmp.persist(output_dir.join(MARKER_FILE))
        .map_err(|e| crate::error::VoxError::Io(e.error))?;
    Ok(())
}

/// Coarse freshness check: the stored marker matches the current digests and
/// the index file parses. Fresh means the whole population step can be
/// skipped; anything else means run it, where per-entry validation is
/// authoritative. Missing or unparseable index is unconditionally stale
/// regardless of marker state.
pub fn is_cache_fresh(output_dir: &Path, narration_digest: &str, reference_digest: &str) -> bool {
    let Some(marker) = read_marker(output_dir) else {
        return false;
    };
    if marker.narration_digest != narration_digest || marker.reference_digest != reference_digest {
        return false;
    }
    let index_path = output_dir.join(super::INDEX_FILE);
    if !index_path.exists() {
        return false;
    }
    match std::fs::read_to_string(&index_path) {
        Ok(raw) => CacheIndex::parse(&raw).is_ok(),
        Err(_) => false,
    }
}
