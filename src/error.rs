use std::fmt;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Auth(String),
    Protocol(String),
    Io(std::io::Error),
    NotConfigured(&'static str),
    /// A command batch stopped part-way; `applied` patches reached the cloud.
    Command {
        applied: usize,
        total: usize,
        source: Box<Error>,
    },
    ControllerStopped,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Auth(msg) => write!(f, "authentication failed: {msg}"),
            Error::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
            Error::NotConfigured(what) => write!(f, "not configured: {what}"),
            Error::Command {
                applied,
                total,
                source,
            } => write!(
                f,
                "command failed after {applied} of {total} patches: {source}"
            ),
            Error::ControllerStopped => write!(f, "appliance controller stopped"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Command { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
