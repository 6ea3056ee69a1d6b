use std::path::PathBuf;

use kube::config::KubeconfigError;
use thiserror::Error;

/// Boxed error used where the underlying failure comes from more than one library.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures surfaced while resolving the client configuration or building a catalog.
///
/// Configuration failures are returned to the caller. Discovery and schema failures are only
/// constructed to be logged; catalog building degrades to an empty catalog instead of failing.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The global options could not be read from the environment.
    #[error("error reading global options: {0}")]
    Environment(#[from] config::ConfigError),

    /// None of the kubeconfig location sources produced a path.
    #[error(
        "error initializing config: no kubeconfig location could be resolved, set KUBECONFIG or pass --kubeconfig"
    )]
    ConfigurationMissing,

    /// The kubeconfig file exists but could not be read or parsed.
    #[error("the provided credentials {path:?} could not be loaded: {source}")]
    ConfigurationInvalid {
        path: PathBuf,
        #[source]
        source: KubeconfigError,
    },

    /// The parsed kubeconfig could not be turned into a usable client configuration.
    #[error("the provided credentials {path:?} could not be used: {reason}")]
    CredentialsRejected { path: PathBuf, reason: String },

    /// A global option override carried a malformed value.
    #[error("error parsing global option {option:?}: {reason}")]
    InvalidOverride {
        option: &'static str,
        reason: String,
    },

    /// The discovery connection could not be opened or the resource listing failed.
    #[error("discovery is unavailable: {0}")]
    DiscoveryUnavailable(#[source] BoxError),

    /// The schema provider session could not be opened.
    #[error("schema provider {provider:?} is unavailable: {source:#}")]
    SchemaUnavailable {
        provider: String,
        #[source]
        source: anyhow::Error,
    },

    /// The server reported a group/version string that does not parse.
    #[error("unexpected GroupVersion string: {0:?}")]
    UnsupportedGroupVersion(String),

    /// Some requested resources are not part of the catalog.
    #[error("not supported resources: {}", .0.join(", "))]
    UnsupportedResources(Vec<String>),

    /// None of the requested resources are part of the catalog.
    #[error("none of the requested resources are supported: {}", .0.join(", "))]
    NoMatchingResources(Vec<String>),
}

impl Error {
    pub(crate) fn credentials_rejected(
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        Self::CredentialsRejected {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_override(option: &'static str, reason: impl ToString) -> Self {
        Self::InvalidOverride {
            option,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn discovery_unavailable(source: impl Into<BoxError>) -> Self {
        Self::DiscoveryUnavailable(source.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_override_names_the_option() {
        let err = Error::invalid_override("--as-group", "expected value at line 1 column 1");
        let message = err.to_string();
        assert!(message.contains("\"--as-group\""));
        assert!(message.contains("expected value"));
    }

    #[test]
    fn credentials_rejected_carries_path() {
        let err =
            Error::credentials_rejected("/tmp/kubeconfig", "no server found for cluster \"dev\"");
        assert_eq!(
            err.to_string(),
            "the provided credentials \"/tmp/kubeconfig\" could not be used: no server found for cluster \"dev\""
        );
    }

    #[test]
    fn schema_unavailable_names_the_provider() {
        let err = Error::SchemaUnavailable {
            provider: "kubernetes".into(),
            source: anyhow::anyhow!("no such file"),
        };
        assert!(err.to_string().contains("kubernetes"));
    }

    #[test]
    fn unsupported_resources_lists_names() {
        let err = Error::UnsupportedResources(vec!["widgets".into(), "gadgets".into()]);
        assert_eq!(err.to_string(), "not supported resources: widgets, gadgets");
    }
}
