//! Error types for nvcompose

use std::path::PathBuf;
use thiserror::Error;

/// Exit code used when the base compose document cannot be parsed
pub const EXIT_CONFIG_PARSE: i32 = 2;
/// Exit code used when the GPU runtime cannot be queried
pub const EXIT_RUNTIME_QUERY: i32 = 3;
/// Exit code for any other wrapper failure
pub const EXIT_FAILURE: i32 = 1;

/// Main error type for nvcompose
#[derive(Error, Debug)]
pub enum ComposeError {
    /// Malformed base compose document
    #[error("Failed to parse {}{}: {message}", .path.display(), .location.map(|l| format!(" at {}", l)).unwrap_or_default())]
    ConfigParse {
        path: PathBuf,
        location: Option<Location>,
        message: String,
    },

    /// GPU runtime unreachable or returned malformed data
    #[error("GPU runtime query failed: {0}")]
    RuntimeQuery(String),

    /// Wrapper configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Delegated compose invocation could not be run
    #[error("Execution error: {0}")]
    Execution(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for nvcompose operations
pub type ComposeResult<T> = Result<T, ComposeError>;

/// Line/column position inside a parsed document (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

impl ComposeError {
    /// Build a parse error for `path` from a YAML parser error
    pub fn parse(path: impl Into<PathBuf>, err: &serde_yaml::Error) -> Self {
        ComposeError::ConfigParse {
            path: path.into(),
            location: err.location().map(|l| Location {
                line: l.line(),
                column: l.column(),
            }),
            message: err.to_string(),
        }
    }

    /// Build a parse error that has no position information
    pub fn malformed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ComposeError::ConfigParse {
            path: path.into(),
            location: None,
            message: message.into(),
        }
    }

    /// Process exit code the wrapper reports for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ComposeError::ConfigParse { .. } => EXIT_CONFIG_PARSE,
            ComposeError::RuntimeQuery(_) => EXIT_RUNTIME_QUERY,
            _ => EXIT_FAILURE,
        }
    }
}

impl From<serde_yaml::Error> for ComposeError {
    fn from(err: serde_yaml::Error) -> Self {
        ComposeError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for ComposeError {
    fn from(err: toml::de::Error) -> Self {
        ComposeError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ComposeError::RuntimeQuery("connection refused".to_string());
        assert_eq!(err.to_string(), "GPU runtime query failed: connection refused");
    }

    #[test]
    fn test_parse_error_display_with_location() {
        let err = ComposeError::ConfigParse {
            path: PathBuf::from("docker-compose.yml"),
            location: Some(Location { line: 3, column: 7 }),
            message: "bad indentation".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to parse docker-compose.yml at line 3, column 7: bad indentation"
        );
    }

    #[test]
    fn test_parse_error_from_yaml_has_location() {
        let yaml_err = serde_yaml::from_str::<serde_yaml::Value>("a: [1, 2").unwrap_err();
        let err = ComposeError::parse("docker-compose.yml", &yaml_err);
        match err {
            ComposeError::ConfigParse { location, .. } => assert!(location.is_some()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            ComposeError::malformed("x.yml", "root is not a mapping").exit_code(),
            EXIT_CONFIG_PARSE
        );
        assert_eq!(
            ComposeError::RuntimeQuery("down".to_string()).exit_code(),
            EXIT_RUNTIME_QUERY
        );
        assert_eq!(
            ComposeError::Config("bad".to_string()).exit_code(),
            EXIT_FAILURE
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ComposeError = io_err.into();
        assert!(matches!(err, ComposeError::Io(_)));
    }
}
