//! Config file parsers.
//!
//! Format-specific adapters that flatten a file's content into a mapping from
//! slash-delimited path to scalar value, and can write a single scalar back
//! by path. The flattened path is the sole addressing scheme used by the
//! config engine's read and edit operations.

pub mod flatten;
pub mod json;
pub mod properties;
pub mod yaml;

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// A config file format named by an image's `parser` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Properties,
    Yaml,
    Json,
}

impl Format {
    /// Resolve a parser name from an image definition.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "properties" => Ok(Format::Properties),
            "yaml" => Ok(Format::Yaml),
            "json" => Ok(Format::Json),
            other => Err(Error::UnsupportedFiletype(other.to_string())),
        }
    }
}

/// Load a config file and flatten it into path → scalar pairs.
///
/// Parse failures carry the file path as context.
pub fn read_file(format: Format, path: &Path) -> Result<BTreeMap<String, Value>> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::Read {
        path: path.display().to_string(),
        source: e,
    })?;

    let parse_err = |reason: String| Error::Parse {
        file: path.display().to_string(),
        reason,
    };

    match format {
        Format::Properties => Ok(properties::read(&content)),
        Format::Yaml => yaml::read(&content).map_err(parse_err),
        Format::Json => json::read(&content).map_err(parse_err),
    }
}

/// Write a single scalar back into a config file at the given flattened path.
pub fn write_key(format: Format, path: &Path, key: &str, value: &Value) -> Result<()> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::Read {
        path: path.display().to_string(),
        source: e,
    })?;

    let parse_err = |reason: String| Error::Parse {
        file: path.display().to_string(),
        reason,
    };

    let updated = match format {
        Format::Properties => properties::write(&content, key, value),
        Format::Yaml => yaml::write(&content, key, value).map_err(parse_err)?,
        Format::Json => json::write(&content, key, value).map_err(parse_err)?,
    };

    std::fs::write(path, updated)
        .map_err(|e| Error::Write(format!("could not write {}: {}", path.display(), e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_resolves_known_names() {
        assert_eq!(Format::from_name("properties").unwrap(), Format::Properties);
        assert_eq!(Format::from_name("yaml").unwrap(), Format::Yaml);
        assert_eq!(Format::from_name("json").unwrap(), Format::Json);
    }

    #[test]
    fn format_rejects_unknown_name() {
        assert!(matches!(
            Format::from_name("toml").unwrap_err(),
            Error::UnsupportedFiletype(name) if name == "toml"
        ));
    }

    #[test]
    fn read_file_reports_missing_file_as_read_error() {
        let err = read_file(Format::Json, Path::new("/no/such/file.json")).unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
    }
}
