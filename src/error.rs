use std::path::PathBuf;

pub type OverlayResult<T> = Result<T, OverlayError>;

#[derive(thiserror::Error, Debug)]
pub enum OverlayError {
    #[error("unknown font family '{0}' (expected one of: Inter, Poppins, Montserrat, Oswald, Product Sans)")]
    UnknownFontFamily(String),

    #[error("font file unavailable: {}", path.display())]
    FontFileUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch image: {0}")]
    FetchFailed(String),

    #[error("failed to decode image: {0}")]
    DecodeFailed(String),

    #[error("failed to render overlay: {0}")]
    RenderFailed(String),
}

impl OverlayError {
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::FetchFailed(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::DecodeFailed(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::RenderFailed(msg.into())
    }

    /// Stable machine-readable name, used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownFontFamily(_) => "unknown_font_family",
            Self::FontFileUnavailable { .. } => "font_file_unavailable",
            Self::FetchFailed(_) => "fetch_failed",
            Self::DecodeFailed(_) => "decode_failed",
            Self::RenderFailed(_) => "render_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            OverlayError::fetch("x")
                .to_string()
                .contains("failed to fetch image:")
        );
        assert!(
            OverlayError::decode("x")
                .to_string()
                .contains("failed to decode image:")
        );
        assert!(
            OverlayError::render("x")
                .to_string()
                .contains("failed to render overlay:")
        );
        assert!(
            OverlayError::UnknownFontFamily("Comic".to_string())
                .to_string()
                .contains("'Comic'")
        );
    }

    #[test]
    fn font_file_unavailable_preserves_source() {
        let err = OverlayError::FontFileUnavailable {
            path: PathBuf::from("/fonts/Inter-Bold.ttf"),
            source: std::io::Error::other("boom"),
        };
        assert!(err.to_string().contains("Inter-Bold.ttf"));
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "boom");
        assert_eq!(err.kind(), "font_file_unavailable");
    }
}
