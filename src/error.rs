use thiserror::Error;

/// Main error type for the frame-studio library
#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Media processing error: {0}")]
    Media(#[from] MediaError),

    #[error("Text layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("File system error: {0}")]
    Fs(#[from] FsError),

    #[error("Image edit error: {0}")]
    Edit(#[from] EditError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("PNG encoding error: {0}")]
    Png(#[from] png::EncodingError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Errors raised while decoding, encoding or probing media
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Source not found or not readable: {path}")]
    SourceNotFound { path: String },

    #[error("Frame {frame} is {actual_width}x{actual_height}, encoder is locked to {expected_width}x{expected_height}")]
    DimensionMismatch {
        frame: String,
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("External tool failed: {command}\n{diagnostic}")]
    ExternalToolFailure { command: String, diagnostic: String },

    #[error("No frames found in: {path}")]
    EmptySequence { path: String },

    #[error("Invalid media parameters: {details}")]
    InvalidParameters { details: String },
}

/// Errors raised by text sizing and rendering
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("Cannot fit text {text:?} into {max_width}x{max_height} px")]
    InvalidLayoutBounds {
        text: String,
        max_width: f32,
        max_height: f32,
    },

    #[error("No usable font: {details}")]
    FontUnavailable { details: String },
}

/// File system errors that are not plain IO failures
#[derive(Error, Debug)]
pub enum FsError {
    #[error("Could not find a free output path for: {path}")]
    PathCollision { path: String },

    #[error("Not a directory: {path}")]
    NotADirectory { path: String },
}

/// Batch image edit errors
#[derive(Error, Debug)]
pub enum EditError {
    #[error("Unknown edit: {name}")]
    UnknownEdit { name: String },

    #[error("Invalid parameters for {edit}: {details}")]
    InvalidParameters { edit: String, details: String },

    #[error("Edit {edit} failed on {path}: {reason}")]
    Failed {
        edit: String,
        path: String,
        reason: String,
    },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}: {reason}")]
    ParseFailed { path: String, reason: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using EditorError
pub type Result<T> = std::result::Result<T, EditorError>;

impl EditorError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Whether re-running the same command could plausibly succeed.
    ///
    /// Nothing in the crate retries on its own; this only shapes the CLI hint.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(_) => true,
            Self::Media(MediaError::ExternalToolFailure { .. }) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Media(MediaError::SourceNotFound { path }) => {
                format!("Could not open '{}'. Please check the file exists and is a supported format.", path)
            }
            Self::Media(MediaError::ExternalToolFailure { command, diagnostic }) => {
                format!("ffmpeg failed.\n  command: {}\n  output: {}", command, diagnostic.trim())
            }
            Self::Layout(LayoutError::FontUnavailable { .. }) => {
                "No TrueType font found. Set `paths.font_path` in the configuration file.".to_string()
            }
            Self::Edit(EditError::UnknownEdit { name }) => {
                format!("Edit '{}' not found. Available edits: rotate, invert, strip-metadata, resize, subtitle, grayscale", name)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}
