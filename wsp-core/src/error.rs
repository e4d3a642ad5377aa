use std::fmt::{self, Display, Formatter};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WspError {
    Config(String),
    Io(#[from] std::io::Error),
    Command(String),
    Dependency(String),
    Filesystem(String),
    Serialization(String),
    Validation(String),
    NotFound(String),
    DockerNotRunning,
}

impl Display for WspError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            WspError::Config(s) => write!(f, "Configuration error: {}", s),
            WspError::Io(e) => write!(f, "I/O error: {}", e),
            WspError::Command(s) => write!(f, "Command failed: {}", s),
            WspError::Dependency(s) => write!(f, "Dependency not found: {}", s),
            WspError::Filesystem(s) => write!(f, "Filesystem error: {}", s),
            WspError::Serialization(s) => write!(f, "Serialization error: {}", s),
            WspError::Validation(s) => write!(f, "Validation error: {}", s),
            WspError::NotFound(s) => write!(f, "Not found: {}", s),
            WspError::DockerNotRunning => {
                write!(f, "Docker daemon is not running\n\n")?;
                write!(f, "Fix:\n")?;
                write!(f, "  • Start Docker Desktop, or\n")?;
                write!(f, "  • Run: sudo systemctl start docker\n")?;
                write!(f, "  • Verify: docker ps")
            }
        }
    }
}

impl From<serde_yaml_ng::Error> for WspError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        WspError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WspError>;
