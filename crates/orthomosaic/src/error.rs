use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The rectifier's derived rotation matrix could not be inverted.
    #[error("degenerate pose at frame {frame}: rectifying matrix is singular")]
    DegeneratePose { frame: usize },

    /// Fewer ratio-filtered matches than the transform solver's minimum.
    #[error("insufficient matches for frame {frame}: got {found}, need at least {needed}")]
    InsufficientMatches {
        frame: usize,
        found: usize,
        needed: usize,
    },

    /// Both the affine and projective robust estimators failed.
    #[error("no transform available for frame {frame}")]
    TransformUnavailable { frame: usize },

    /// The Assembler's wrapper for the two failures above.
    #[error("alignment failed at frame {0}")]
    AlignmentFailed(usize),

    /// An intermediate or final artifact could not be read or written.
    #[error("I/O error: {0}")]
    Io(String),

    /// Two images expected to share a canvas size did not.
    #[error(
        "size mismatch compositing frame: mosaic is {mosaic_w}x{mosaic_h}, frame is {frame_w}x{frame_h}"
    )]
    SizeMismatch {
        mosaic_w: u32,
        mosaic_h: u32,
        frame_w: u32,
        frame_h: u32,
    },

    /// Error surfaced from the underlying vision backend (OpenCV).
    #[error("backend error: {0}")]
    Backend(String),
}

#[cfg(feature = "opencv")]
impl From<opencv::Error> for Error {
    fn from(e: opencv::Error) -> Self {
        Error::Backend(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
