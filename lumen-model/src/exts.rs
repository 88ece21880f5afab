//! Extension allow-list and MIME resolution shared by server and client.
//!
//! Both sides gate on the extension before touching file contents, so the
//! tables live in the model crate rather than being duplicated.

use std::path::Path;

/// Image suffixes accepted for upload.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Video suffixes accepted for upload.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm"];

/// Whether the path carries an allowed image/video extension.
///
/// Matching is case-insensitive; a file without an extension is rejected.
pub fn allowed_extension(path: &Path) -> bool {
    match extension_of(path) {
        Some(ext) => {
            IMAGE_EXTENSIONS.contains(&ext.as_str()) || VIDEO_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

/// Best-effort MIME type from the file extension.
///
/// Used when the uploader did not declare a content type. Unknown allowed
/// extensions fall through to `None` and the record keeps a null MIME.
pub fn guess_mime(path: &Path) -> Option<&'static str> {
    let ext = extension_of(path)?;
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        "webm" => "video/webm",
        _ => return None,
    };
    Some(mime)
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_media_extensions() {
        assert!(allowed_extension(Path::new("/photos/IMG_0001.JPG")));
        assert!(allowed_extension(Path::new("clip.webm")));
        assert!(!allowed_extension(Path::new("notes.txt")));
        assert!(!allowed_extension(Path::new("no_extension")));
    }

    #[test]
    fn guesses_mime_from_extension() {
        assert_eq!(guess_mime(Path::new("a.jpeg")), Some("image/jpeg"));
        assert_eq!(guess_mime(Path::new("a.MOV")), Some("video/quicktime"));
        assert_eq!(guess_mime(Path::new("a.txt")), None);
    }
}
