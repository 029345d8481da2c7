use std::fs::File;
use std::io::{BufReader, BufWriter, Write as _};
use std::path::Path;

use crate::foundation::error::{GeoError, GeoResult};

/// Parse a JSON document from disk.
///
/// A missing file is an [`GeoError::Input`]; malformed content is a [`GeoError::Serde`].
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> GeoResult<T> {
    let f = File::open(path)
        .map_err(|e| GeoError::input(format!("open JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(BufReader::new(f))
        .map_err(|e| GeoError::serde(format!("parse JSON '{}': {e}", path.display())))
}

/// Write `value` as pretty JSON, creating parent directories as needed.
pub fn write_json_pretty<T: serde::Serialize>(path: &Path, value: &T) -> GeoResult<()> {
    ensure_parent_dir(path)?;
    let f = File::create(path)
        .map_err(|e| GeoError::input(format!("create '{}': {e}", path.display())))?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, value)
        .map_err(|e| GeoError::serde(format!("write JSON '{}': {e}", path.display())))?;
    w.write_all(b"\n")
        .and_then(|_| w.flush())
        .map_err(|e| GeoError::input(format!("write '{}': {e}", path.display())))
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> GeoResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_through_disk() {
        let path = Path::new("target/json_helpers/nested/value.json");
        write_json_pretty(path, &serde_json::json!({"a": [1, 2]})).unwrap();
        let v: serde_json::Value = read_json(path).unwrap();
        assert_eq!(v["a"][1], 2);
    }

    #[test]
    fn error_kinds_distinguish_missing_from_malformed() {
        let missing = read_json::<serde_json::Value>(Path::new("target/json_helpers/none.json"));
        assert!(matches!(missing, Err(GeoError::Input(_))));

        let bad = Path::new("target/json_helpers/bad.json");
        ensure_parent_dir(bad).unwrap();
        std::fs::write(bad, "{ not json").unwrap();
        assert!(matches!(
            read_json::<serde_json::Value>(bad),
            Err(GeoError::Serde(_))
        ));
    }
}
