use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// The two families of uploaded assets. Each lives in its own directory
/// (or key prefix) and gets its own filename prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Audio,
    Image,
}

impl AssetKind {
    /// Directory / key prefix the asset is stored under.
    pub fn dir(&self) -> &'static str {
        match self {
            AssetKind::Audio => "audio",
            AssetKind::Image => "images",
        }
    }

    /// Prefix of generated filenames.
    pub fn name_prefix(&self) -> &'static str {
        match self {
            AssetKind::Audio => "music",
            AssetKind::Image => "image",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir())
    }
}

impl FromStr for AssetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio" => Ok(AssetKind::Audio),
            "images" => Ok(AssetKind::Image),
            other => Err(format!("unknown asset directory: {other}")),
        }
    }
}

/// Generate a fresh stored name such as `music-1718000000000-123456789.mp3`.
///
/// The extension is taken from `original_name` when it has a usable one,
/// otherwise `fallback_ext` is used.
pub fn unique_asset_name(kind: AssetKind, original_name: &str, fallback_ext: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix = rand::random::<u32>() % 1_000_000_000;
    let ext = asset_extension(original_name).unwrap_or_else(|| fallback_ext.to_string());
    if ext.is_empty() {
        format!("{}-{millis}-{suffix}", kind.name_prefix())
    } else {
        format!("{}-{millis}-{suffix}.{ext}", kind.name_prefix())
    }
}

/// Lower-cased extension of a client-supplied filename, if it is short and
/// purely alphanumeric.
pub fn asset_extension(original_name: &str) -> Option<String> {
    let sanitized = sanitize_filename(original_name);
    Path::new(&sanitized)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
}

/// Whether a stored name can be used as a single path component.
pub fn is_safe_asset_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && !name.contains("..")
        && !name.starts_with('.')
        && !name
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '\0' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
}

/// Content type to serve a stored asset with, from its extension.
pub fn content_type_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        "m4a" | "mp4" => "audio/mp4",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string();
    // SECURITY: reject path traversal sequences
    if sanitized.contains("..") {
        return sanitized.replace("..", "__");
    }
    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_kind_dirs() {
        assert_eq!(AssetKind::Audio.dir(), "audio");
        assert_eq!(AssetKind::Image.dir(), "images");
        assert_eq!("audio".parse::<AssetKind>().unwrap(), AssetKind::Audio);
        assert_eq!("images".parse::<AssetKind>().unwrap(), AssetKind::Image);
        assert!("videos".parse::<AssetKind>().is_err());
    }

    #[test]
    fn test_unique_asset_name_shape() {
        let name = unique_asset_name(AssetKind::Audio, "My Song.MP3", "bin");
        assert!(name.starts_with("music-"));
        assert!(name.ends_with(".mp3"));
        assert!(is_safe_asset_name(&name));

        let image = unique_asset_name(AssetKind::Image, "cover.webp", "jpg");
        assert!(image.starts_with("image-"));
        assert!(image.ends_with(".webp"));
    }

    #[test]
    fn test_unique_asset_name_uses_fallback_extension() {
        let name = unique_asset_name(AssetKind::Image, "cover", "png");
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn test_unique_asset_names_differ() {
        let a = unique_asset_name(AssetKind::Audio, "a.mp3", "mp3");
        let b = unique_asset_name(AssetKind::Audio, "a.mp3", "mp3");
        assert_ne!(a, b);
    }

    #[test]
    fn test_asset_extension_rejects_junk() {
        assert_eq!(asset_extension("song.flac").as_deref(), Some("flac"));
        assert_eq!(asset_extension("song"), None);
        assert_eq!(asset_extension("song.mp3;rm -rf"), None);
        assert_eq!(asset_extension("../../etc/passwd"), None);
    }

    #[test]
    fn test_is_safe_asset_name() {
        assert!(is_safe_asset_name("music-1-2.mp3"));
        assert!(!is_safe_asset_name("../secret"));
        assert!(!is_safe_asset_name("a/b.mp3"));
        assert!(!is_safe_asset_name(".env"));
        assert!(!is_safe_asset_name(""));
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("x.mp3"), "audio/mpeg");
        assert_eq!(content_type_for("x.JPG"), "image/jpeg");
        assert_eq!(content_type_for("x.m4a"), "audio/mp4");
        assert_eq!(content_type_for("x"), "application/octet-stream");
    }

    #[test]
    fn test_sanitize_filename_slashes() {
        assert_eq!(sanitize_filename("path/to\\file"), "path_to_file");
    }

    #[test]
    fn test_sanitize_filename_traversal() {
        assert_eq!(sanitize_filename(".."), "__");
        assert_eq!(sanitize_filename("a..b"), "a__b");
    }

    #[test]
    fn test_sanitize_filename_unicode() {
        assert_eq!(sanitize_filename("日本語の曲.mp3"), "日本語の曲.mp3");
    }
}
