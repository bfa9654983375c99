use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid height: {value:?} (expected 100-220 cm)")]
    InvalidHeight { value: String },

    #[error("image quality rejected (front valid: {front}, side valid: {side})")]
    ImageQualityRejected { front: bool, side: bool },

    #[error("landmark extraction failed: {0}")]
    LandmarkExtractionFailed(String),

    #[error("processing error: {0}")]
    Processing(String),

    #[error("measurement cancelled")]
    Cancelled,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model deserialization error: {0}")]
    Deserialization(#[from] bincode::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid model: {0}")]
    InvalidModel(String),
}

impl Error {
    /// Whether this error is meant to be shown to the person who supplied the input.
    pub fn is_user_visible(&self) -> bool {
        self.user_message().is_some()
    }

    /// Title and description for the notification collaborator.
    pub fn user_message(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Error::InvalidHeight { .. } => Some((
                "Invalid height",
                "Please enter a valid height between 100-220cm (39-87in).",
            )),
            Error::ImageQualityRejected { .. } => Some((
                "Image processing failed",
                "We couldn't process your images. Please ensure they show your full body clearly.",
            )),
            Error::Processing(_) => Some((
                "Processing error",
                "An error occurred while calculating your measurements. Please try again.",
            )),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
