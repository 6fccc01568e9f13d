use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use serde::Deserialize;
use thiserror::Error;

/// Calling convention requested for a descriptor. Recorded on the
/// descriptor; every descriptor is currently prepared with the platform
/// default ABI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Convention {
    #[default]
    Default,
    Stdcall,
    Sysv,
}

/// Options accepted alongside a call signature.
///
/// ```toml
/// convention = "default"
/// blocking = false
///
/// [type_map]
/// size_t = "ULONG"
/// handle = "POINTER"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CallOptions {
    pub convention: Convention,
    pub blocking: bool,
    /// Extra type names, each resolving to a catalog type name.
    pub type_map: FxHashMap<String, String>,
}

#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("Failed to read call options from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid call options: {0}")]
    Parse(#[from] toml::de::Error),
}

impl CallOptions {
    pub fn from_toml(text: &str) -> Result<Self, OptionsError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, OptionsError> {
        let text = fs::read_to_string(path)
            .map_err(|source| OptionsError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml(&text)
    }

    /// Catalog name a custom type name stands for.
    pub fn mapped_name(&self, name: &str) -> Option<&str> {
        self.type_map.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_field() {
        let options = CallOptions::from_toml(
            r#"
            convention = "stdcall"
            blocking = true

            [type_map]
            size_t = "ULONG"
            "#,
        )
        .unwrap();
        assert_eq!(options.convention, Convention::Stdcall);
        assert!(options.blocking);
        assert_eq!(options.mapped_name("size_t"), Some("ULONG"));
        assert_eq!(options.mapped_name("ssize_t"), None);
    }

    #[test]
    fn empty_document_is_the_default() {
        assert_eq!(CallOptions::from_toml("").unwrap(), CallOptions::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            CallOptions::from_toml("varargs = true"),
            Err(OptionsError::Parse(_))
        ));
        assert!(CallOptions::from_toml("convention = \"fastcall\"").is_err());
    }
}
