use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Upload of {size} bytes exceeds the {limit} byte limit")]
    UploadTooLarge { size: u64, limit: u64 },
}

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Failed to create perspective transformation")]
    ProjectionFailed,
}
