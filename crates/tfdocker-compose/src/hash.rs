//! 変更検出用のコンテンツハッシュ

use sha2::{Digest, Sha256};

/// Compose ファイル内容の SHA-256（16進小文字）
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_content() {
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_content_changes_hash() {
        let a = content_hash("services:\n  web:\n    image: nginx\n");
        let b = content_hash("services:\n  web:\n    image: nginx:alpine\n");
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }
}
