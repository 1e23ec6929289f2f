use std::sync::Arc;

use crate::{
    foundation::error::{AlphaVideoError, AlphaVideoResult},
    media::decode::local_path,
};

/// Fetches a resource's raw bytes for blob-mode loading.
pub trait BlobFetcher {
    fn fetch(&mut self, url: &str) -> AlphaVideoResult<Arc<[u8]>>;
}

/// Reads local paths and `file://` URLs. Network schemes are rejected.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsFetcher;

impl BlobFetcher for FsFetcher {
    fn fetch(&mut self, url: &str) -> AlphaVideoResult<Arc<[u8]>> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Err(AlphaVideoError::fetch(format!(
                "no network fetcher configured for '{url}'"
            )));
        }
        let path = local_path(url);
        let bytes = std::fs::read(&path)
            .map_err(|e| AlphaVideoError::fetch(format!("read '{}': {e}", path.display())))?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "fetched blob");
        Ok(Arc::from(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_local_file_with_and_without_scheme() {
        let dir = std::path::PathBuf::from("target").join("fs_fetcher");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("blob.bin");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let mut f = FsFetcher;
        assert_eq!(&*f.fetch(&path.display().to_string()).unwrap(), &[1, 2, 3]);
        assert_eq!(
            &*f.fetch(&format!("file://{}", path.display())).unwrap(),
            &[1, 2, 3]
        );
    }

    #[test]
    fn missing_file_and_network_urls_are_fetch_errors() {
        let mut f = FsFetcher;
        let err = f.fetch("target/definitely/missing.mp4").unwrap_err();
        assert!(matches!(err, AlphaVideoError::Fetch(_)));
        let err = f.fetch("https://example.invalid/a.mp4").unwrap_err();
        assert!(matches!(err, AlphaVideoError::Fetch(_)));
    }
}
