use std::path::Path;
use std::sync::Arc;

use sha2::{Digest, Sha256};

/// An image attached to a slot. Bytes are shared so form snapshots stay cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Arc<[u8]>,
    pub content_hash: String,
}

impl Asset {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let file_name = file_name.into();
        let bytes: Vec<u8> = bytes.into();
        Self {
            content_type: guess_content_type(&file_name).to_string(),
            content_hash: Self::hash_content(&bytes),
            bytes: Arc::from(bytes),
            file_name,
        }
    }

    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());
        Ok(Self::new(file_name, bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Label shown for a freshly attached asset: the file name up to its first dot.
    pub fn default_label(&self) -> String {
        let base = self
            .file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.file_name);
        match base.split('.').next() {
            Some(head) if !head.is_empty() => head.to_string(),
            _ => Path::new(base)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| base.to_string()),
        }
    }

    pub fn hash_content(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!("{:x}", hasher.finalize())
    }
}

fn guess_content_type(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_label_cuts_at_first_dot() {
        assert_eq!(Asset::new("cat.png", vec![1]).default_label(), "cat");
        assert_eq!(Asset::new("cat.final.v2.png", vec![1]).default_label(), "cat");
        assert_eq!(Asset::new("no_extension", vec![1]).default_label(), "no_extension");
    }

    #[test]
    fn test_default_label_ignores_directories_and_leading_dot() {
        assert_eq!(Asset::new("shots/dog.jpg", vec![1]).default_label(), "dog");
        assert_eq!(Asset::new(".hidden", vec![1]).default_label(), ".hidden");
    }

    #[test]
    fn test_content_type_from_extension() {
        assert_eq!(Asset::new("a.JPG", vec![1]).content_type, "image/jpeg");
        assert_eq!(Asset::new("a.png", vec![1]).content_type, "image/png");
        assert_eq!(
            Asset::new("a.bin", vec![1]).content_type,
            "application/octet-stream"
        );
    }

    #[test]
    fn test_hash_is_content_addressed() {
        let a = Asset::new("a.png", vec![1, 2, 3]);
        let b = Asset::new("b.png", vec![1, 2, 3]);
        let c = Asset::new("a.png", vec![3, 2, 1]);
        assert_eq!(a.content_hash, b.content_hash);
        assert_ne!(a.content_hash, c.content_hash);
        assert_eq!(a.content_hash.len(), 64);
    }

    #[test]
    fn test_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sunset.webp");
        std::fs::write(&path, b"webp-bytes").unwrap();

        let asset = Asset::from_path(&path).unwrap();
        assert_eq!(asset.file_name, "sunset.webp");
        assert_eq!(asset.content_type, "image/webp");
        assert_eq!(&*asset.bytes, b"webp-bytes");
    }
}
