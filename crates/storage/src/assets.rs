use doc_model::AssetHandle;
use std::fs;
use std::path::Path;
use tracing::debug;
use viewer_core::{AssetError, AssetResolver};

/// Resolves local PDF paths to `file://` handles the renderer can load.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileAssetResolver;

impl AssetResolver for FileAssetResolver {
    fn resolve(&self, path: &Path) -> Result<AssetHandle, AssetError> {
        let unreadable =
            |message: String| AssetError::Unreadable { path: path.to_path_buf(), message };

        let canonical = fs::canonicalize(path).map_err(|error| match error.kind() {
            std::io::ErrorKind::NotFound => AssetError::NotFound(path.to_path_buf()),
            _ => unreadable(error.to_string()),
        })?;

        let metadata = fs::metadata(&canonical).map_err(|error| unreadable(error.to_string()))?;
        if !metadata.is_file() {
            return Err(unreadable("not a regular file".to_owned()));
        }

        debug!(path = %canonical.display(), "resolved document");
        Ok(AssetHandle { uri: format!("file://{}", canonical.display()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_existing_files_to_file_uris() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let pdf = temp.path().join("paper.pdf");
        fs::write(&pdf, b"%PDF-1.7").expect("write should succeed");

        let handle = FileAssetResolver.resolve(&pdf).expect("resolve should succeed");
        assert!(handle.uri.starts_with("file://"));
        assert!(handle.uri.ends_with("paper.pdf"));
    }

    #[test]
    fn missing_files_and_directories_fail() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let missing = temp.path().join("missing.pdf");

        assert_eq!(FileAssetResolver.resolve(&missing), Err(AssetError::NotFound(missing.clone())));
        assert!(matches!(
            FileAssetResolver.resolve(temp.path()),
            Err(AssetError::Unreadable { .. })
        ));
    }
}
