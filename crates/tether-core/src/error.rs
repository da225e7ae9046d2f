//! Error types for tether-core

use thiserror::Error;

/// Result type alias using tether-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for Tether
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration format
    #[error("Invalid configuration format: {message}")]
    InvalidConfig { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unparseable version string
    #[error("Invalid version format: {version}")]
    InvalidVersion { version: String },

    /// Slug not present in the catalog
    #[error("Unknown package: {slug}")]
    UnknownPackage { slug: String },

    /// Caller lacks the capability for the requested mutation
    #[error("Permission denied: caller lacks the '{capability}' capability")]
    PermissionDenied { capability: String },

    /// A declared package or its local archive is missing
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// Every archive extraction strategy was tried and none produced the package
    #[error("Extraction failed for {slug}: tried {attempted}")]
    ExtractionExhausted { slug: String, attempted: String },

    /// A bulk pass finished with some failures
    #[error("{succeeded} of {total} packages converged")]
    PartialConvergence { succeeded: usize, total: usize },

    /// A host install/activate/upgrade primitive failed
    #[error("Host {operation} failed for {slug}: {message}")]
    HostPrimitive {
        operation: String,
        slug: String,
        message: String,
    },
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid version error
    pub fn invalid_version(version: impl Into<String>) -> Self {
        Self::InvalidVersion {
            version: version.into(),
        }
    }

    /// Create an unknown package error
    pub fn unknown_package(slug: impl Into<String>) -> Self {
        Self::UnknownPackage { slug: slug.into() }
    }

    /// Create a permission denied error
    pub fn permission_denied(capability: impl Into<String>) -> Self {
        Self::PermissionDenied {
            capability: capability.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create an extraction exhausted error from the list of attempted strategies
    pub fn extraction_exhausted(slug: impl Into<String>, attempted: &[&str]) -> Self {
        let attempted = if attempted.is_empty() {
            "no available strategy".to_string()
        } else {
            attempted.join(", ")
        };
        Self::ExtractionExhausted {
            slug: slug.into(),
            attempted,
        }
    }

    /// Create a host primitive failure
    pub fn host_primitive(
        operation: impl Into<String>,
        slug: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::HostPrimitive {
            operation: operation.into(),
            slug: slug.into(),
            message: message.into(),
        }
    }

    /// Whether this error must abort the operation before any mutation
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_exhausted_lists_strategies() {
        let err = Error::extraction_exhausted("gallery", &["zip", "builtin"]);
        assert_eq!(err.to_string(), "Extraction failed for gallery: tried zip, builtin");

        let none = Error::extraction_exhausted("gallery", &[]);
        assert!(none.to_string().contains("no available strategy"));
    }

    #[test]
    fn test_only_permission_denied_is_fatal() {
        assert!(Error::permission_denied("install_packages").is_fatal());
        assert!(!Error::not_found("archive").is_fatal());
        assert!(!Error::host_primitive("activate", "forms", "boom").is_fatal());
    }
}
