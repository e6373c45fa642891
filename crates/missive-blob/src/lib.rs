//! Blob storage for Missive media
//!
//! Uploaded bytes land under the blob directory with a SHA-256 content hash
//! recorded in a sidecar metadata file; the hash is re-checked whenever the
//! bytes are read back. Callers get a resolvable URL, which is what gets
//! embedded in photo and video messages.

mod store;

pub use store::{BlobConfig, BlobError, BlobMetadata, BlobStore};

/// Storage path for a user's profile picture
pub fn profile_picture_path(user_key: &str) -> String {
    format!("images/{}_profile_picture.jpeg", user_key)
}

/// Storage path for a photo sent in a conversation
pub fn message_photo_path(file_name: &str) -> String {
    format!("message_images/{}", file_name)
}

/// Storage path for a video sent in a conversation
pub fn message_video_path(file_name: &str) -> String {
    format!("message_videos/{}", file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_conventions() {
        assert_eq!(
            profile_picture_path("a-x-com"),
            "images/a-x-com_profile_picture.jpeg"
        );
        assert_eq!(message_photo_path("pic.png"), "message_images/pic.png");
        assert_eq!(message_video_path("clip.mov"), "message_videos/clip.mov");
    }
}
