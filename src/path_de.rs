use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{ApiGenError, Result};

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| {
        let path = err.path().to_string();
        ApiGenError::Json(format!("at JSON path {path} → {}", err.into_inner()))
    })
}

pub fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| {
        let path = err.path().to_string();
        ApiGenError::Json(format!("at JSON path {path} → {}", err.into_inner()))
    })
}

/// Read and deserialize a JSON file (AST document or description).
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path).map_err(|source| ApiGenError::Io {
        path: path.display().to_string(),
        source,
    })?;
    from_slice_with_path(&bytes).map_err(|err| ApiGenError::Json(format!("{}: {err}", path.display())))
}
