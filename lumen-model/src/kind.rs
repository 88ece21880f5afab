use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Coarse classification of stored media, derived from the MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
pub enum MediaKind {
    Image,
    Video,
    /// Anything that passed the extension gate but has no media MIME type.
    Other,
}

impl MediaKind {
    /// Classify from a MIME type string, e.g. `image/jpeg` -> `Image`.
    pub fn from_mime(mime: Option<&str>) -> Self {
        match mime {
            Some(m) if m.starts_with("image") => MediaKind::Image,
            Some(m) if m.starts_with("video") => MediaKind::Video,
            _ => MediaKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Other => "other",
        }
    }
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            "other" => Ok(MediaKind::Other),
            _ => Err(format!("unknown media kind: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_from_mime_prefix() {
        assert_eq!(MediaKind::from_mime(Some("image/png")), MediaKind::Image);
        assert_eq!(MediaKind::from_mime(Some("video/mp4")), MediaKind::Video);
        assert_eq!(MediaKind::from_mime(Some("text/plain")), MediaKind::Other);
        assert_eq!(MediaKind::from_mime(None), MediaKind::Other);
    }

    #[test]
    fn round_trips_through_str() {
        for kind in [MediaKind::Image, MediaKind::Video, MediaKind::Other] {
            assert_eq!(kind.as_str().parse::<MediaKind>().unwrap(), kind);
        }
    }
}
