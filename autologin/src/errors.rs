use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutoLoginError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Screen capture failed: {0}")]
    Capture(String),

    #[error("Required field not found: {0}")]
    FieldNotFound(String),

    #[error("Window activation denied: {0}")]
    ActivationDenied(String),

    #[error("Launch failed: {0}")]
    Launch(String),

    #[error("Credential store error: {0}")]
    Credential(String),

    #[error("Platform-specific error: {0}")]
    Platform(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
