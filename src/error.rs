use std::path::PathBuf;

use thiserror::Error;

pub type Result<A> = std::result::Result<A, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Encountered io error: `{0}`")]
    IOError(std::io::Error),
    #[error("Encountered io error on `{path}`: `{source}`")]
    PathIOError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Path escapes the source directory: `{0}`")]
    Traversal(String),
    #[error("Unusable file name: `{0}`")]
    InvalidPath(PathBuf),
    #[error("Template not found: `{0}`")]
    TemplateNotFound(String),
    #[error("Error with templating: `{0}`")]
    JinjaError(minijinja::Error),
    #[error("Processor `{name}` failed: {message}")]
    ProcessorError { name: String, message: String },
    #[error("Failed to parse yaml: `{0}`")]
    SerdeError(serde_yml::Error),
    #[error("Invalid settings: `{0}`")]
    ConfigError(Box<figment::Error>),
    #[error("Invalid pattern: `{0}`")]
    PatternError(globset::Error),
    #[error("Unable to create the build directory `{path}`: `{source}`")]
    BuildRootError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Source directory not found: `{0}`")]
    SourceNotFound(PathBuf),
    #[error("Refusing to overwrite non-empty directory `{0}`")]
    DestinationNotEmpty(PathBuf),
}

impl Error {
    /// per-file errors where the build falls back to the raw source and moves on
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::JinjaError(_) | Self::ProcessorError { .. })
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::TemplateNotFound(_) => true,
            Self::IOError(err) | Self::PathIOError { source: err, .. } => {
                err.kind() == std::io::ErrorKind::NotFound
            }
            _ => false,
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::PathIOError { path, source }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::IOError(value)
    }
}

impl From<serde_yml::Error> for Error {
    fn from(value: serde_yml::Error) -> Self {
        Self::SerdeError(value)
    }
}
impl From<minijinja::Error> for Error {
    fn from(value: minijinja::Error) -> Self {
        match value.kind() {
            minijinja::ErrorKind::TemplateNotFound => Self::TemplateNotFound(value.to_string()),
            _ => Self::JinjaError(value),
        }
    }
}
impl From<figment::Error> for Error {
    fn from(value: figment::Error) -> Self {
        Self::ConfigError(Box::new(value))
    }
}
impl From<globset::Error> for Error {
    fn from(value: globset::Error) -> Self {
        Self::PatternError(value)
    }
}
