use thiserror::Error;

use crate::catalog::CatalogError;
use crate::config::ConfigError;

/// Startup and operator-facing failures. Dialogue turns never produce one;
/// they report problems as reply annotations instead.
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not access `{path}`: {message}")]
    Io { path: String, message: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ApplicationError {
    pub fn io(path: impl Into<String>, error: &std::io::Error) -> Self {
        Self::Io { path: path.into(), message: error.to_string() }
    }

    /// Stable class reported in machine-readable command output.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Catalog(_) => "catalog",
            Self::Config(_) => "config",
            Self::Io { .. } => "io",
            Self::InvalidInput(_) => "input",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Catalog(_) => 3,
            Self::Io { .. } => 4,
            Self::InvalidInput(_) => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::CatalogError;
    use crate::config::ConfigError;
    use crate::errors::ApplicationError;

    #[test]
    fn config_errors_map_to_config_class() {
        let error = ApplicationError::from(ConfigError::Validation("bad currency".to_owned()));

        assert_eq!(error.error_class(), "config");
        assert_eq!(error.exit_code(), 2);
        assert_eq!(error.to_string(), "configuration validation failed: bad currency");
    }

    #[test]
    fn catalog_errors_keep_their_message() {
        let error = ApplicationError::from(CatalogError::Invalid {
            domain: "pozo_tierra".to_owned(),
            reason: "stage `pozos` is declared twice".to_owned(),
        });

        assert_eq!(error.error_class(), "catalog");
        assert_eq!(error.exit_code(), 3);
        assert!(error.to_string().contains("pozo_tierra"));
    }

    #[test]
    fn io_and_input_errors_have_distinct_exit_codes() {
        let io = ApplicationError::io(
            "estado.json",
            &std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        let input = ApplicationError::InvalidInput("state is not valid JSON".to_owned());

        assert_eq!(io.error_class(), "io");
        assert_ne!(io.exit_code(), input.exit_code());
        assert_eq!(input.error_class(), "input");
    }
}
