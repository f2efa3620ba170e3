use std::fmt;

#[derive(Debug)]
pub enum LinkError {
    Http(reqwest::Error),
    Config(toml::de::Error),
    Io(std::io::Error),
    InvalidData(String),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Http(e) => write!(f, "HTTP error: {e}"),
            LinkError::Config(e) => write!(f, "config error: {e}"),
            LinkError::Io(e) => write!(f, "I/O error: {e}"),
            LinkError::InvalidData(msg) => write!(f, "invalid data: {msg}"),
        }
    }
}

impl std::error::Error for LinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LinkError::Http(e) => Some(e),
            LinkError::Config(e) => Some(e),
            LinkError::Io(e) => Some(e),
            LinkError::InvalidData(_) => None,
        }
    }
}

impl From<reqwest::Error> for LinkError {
    fn from(e: reqwest::Error) -> Self {
        LinkError::Http(e)
    }
}

impl From<toml::de::Error> for LinkError {
    fn from(e: toml::de::Error) -> Self {
        LinkError::Config(e)
    }
}

impl From<std::io::Error> for LinkError {
    fn from(e: std::io::Error) -> Self {
        LinkError::Io(e)
    }
}

impl From<serde_json::Error> for LinkError {
    fn from(e: serde_json::Error) -> Self {
        LinkError::InvalidData(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
