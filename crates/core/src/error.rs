use thiserror::Error;

#[derive(Error, Debug)]
pub enum LandingError {
    #[error("Configuration error: {0}")]
    Config(String),
}
