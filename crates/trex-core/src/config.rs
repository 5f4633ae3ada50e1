//! Loading configuration files

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::Result;

/// Read a JSON configuration file into `T`.
///
/// Structs deriving `#[serde(default)]` accept partial files.
pub async fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Device, ExecutionContext};

    #[tokio::test]
    async fn partial_file_takes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctx.json");
        tokio::fs::write(&path, r#"{ "seed": 42 }"#).await.unwrap();

        let ctx: ExecutionContext = load_json(&path).await.unwrap();
        assert_eq!(ctx.seed, Some(42));
        assert_eq!(ctx.device, Device::Cpu);
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let err = load_json::<ExecutionContext>(Path::new("/nonexistent/ctx.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::TrexError::Io(_)));
    }
}
