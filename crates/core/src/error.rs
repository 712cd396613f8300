/// Result alias that carries the custom [`CueCaptureError`] type.
pub type Result<T> = std::result::Result<T, CueCaptureError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum CueCaptureError {
    /// Free-form message for failures that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// Caller supplied a value the pipeline cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    /// A single frame could not be turned into a bitmap. The capture loop
    /// recovers from this by dropping the frame.
    #[error("frame encoding failed: {0}")]
    Encoding(String),
    #[error("unknown sketch `{0}`")]
    UnknownSketch(String),
    #[error("score has no track at index {0}")]
    MissingTrack(usize),
    /// The capture loop hit an unrecoverable error and discarded the session.
    #[error("capture aborted at frame {frame}: {source}")]
    CaptureAborted {
        frame: u64,
        #[source]
        source: Box<CueCaptureError>,
    },
}

impl CueCaptureError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Whether the error only affects a single frame.
    pub fn is_encoding(&self) -> bool {
        matches!(self, Self::Encoding(_))
    }

    pub(crate) fn aborted(frame: u64, source: CueCaptureError) -> Self {
        Self::CaptureAborted {
            frame,
            source: Box::new(source),
        }
    }
}

impl From<&str> for CueCaptureError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for CueCaptureError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

impl From<tokio::task::JoinError> for CueCaptureError {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::msg(format!("background task failed: {value}"))
    }
}
