use std::{env, path::PathBuf};

use config::{Config, ConfigError, Environment, Map};
use serde::Deserialize;

/// Prefix shared by every global option exported to the process environment.
pub const GLOBAL_FLAG_PREFIX: &str = "KUBECTL_PLUGINS_GLOBAL_FLAG";

/// Global options handed over by the invoking tool, captured once at the process boundary.
///
/// Every field maps to `KUBECTL_PLUGINS_GLOBAL_FLAG_<FIELD>`, e.g. `as_group` is read from
/// `KUBECTL_PLUGINS_GLOBAL_FLAG_AS_GROUP`. Empty values are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GlobalOptions {
    /// Explicit configuration file, takes precedence over every other kubeconfig location.
    pub config: Option<String>,
    /// Kubeconfig file passed with `--kubeconfig`.
    pub kubeconfig: Option<String>,
    pub namespace: Option<String>,
    pub context: Option<String>,
    /// User to impersonate (`--as`).
    #[serde(rename = "as")]
    pub impersonate: Option<String>,
    /// Groups to impersonate (`--as-group`), encoded as a JSON array of strings.
    #[serde(rename = "as_group")]
    pub impersonate_group: Option<String>,
    pub certificate_authority: Option<String>,
    pub client_certificate: Option<String>,
    pub client_key: Option<String>,
    /// Accepted but not applied.
    pub cluster: Option<String>,
    /// Accepted but not applied.
    pub user: Option<String>,
    /// Go-style duration string, e.g. `"30s"`.
    pub request_timeout: Option<String>,
    /// Server name used for TLS verification.
    pub server: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl GlobalOptions {
    /// Load the global options from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::with_prefix(GLOBAL_FLAG_PREFIX))
    }

    /// Load the global options from an explicit set of environment-style variables.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: Map<String, String> = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self::load(Environment::with_prefix(GLOBAL_FLAG_PREFIX).source(Some(vars)))
    }

    fn load(environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(environment.ignore_empty(true))
            .build()?
            .try_deserialize()
    }
}

/// Returns the value when it is present and non-empty.
pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

/// Platform environment consulted for the lower-precedence kubeconfig locations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformEnv {
    /// Value of `KUBECONFIG`, possibly a platform path list.
    pub kubeconfig: Option<String>,
    /// Home directory of the current user on non-Windows platforms.
    pub home: Option<PathBuf>,
    pub home_drive: Option<String>,
    pub home_path: Option<String>,
    pub user_profile: Option<String>,
}

impl PlatformEnv {
    /// Capture the relevant variables from the process environment.
    pub fn capture() -> Self {
        let var = |name: &str| env::var(name).ok().filter(|value| !value.is_empty());
        Self {
            kubeconfig: var("KUBECONFIG"),
            home: var("HOME").map(PathBuf::from).or_else(dirs::home_dir),
            home_drive: var("HOMEDRIVE"),
            home_path: var("HOMEPATH"),
            user_profile: var("USERPROFILE"),
        }
    }

    /// Home directory of the current user, following the platform conventions.
    pub fn home_dir(&self) -> Option<PathBuf> {
        if cfg!(windows) {
            windows_home(
                self.home_drive.as_deref(),
                self.home_path.as_deref(),
                self.user_profile.as_deref(),
            )
        } else {
            self.home.clone().filter(|home| !home.as_os_str().is_empty())
        }
    }

    /// `<home>/.kube/config`, when a home directory is known.
    pub fn default_kubeconfig(&self) -> Option<PathBuf> {
        self.home_dir().map(|home| home.join(".kube").join("config"))
    }
}

/// On Windows the home directory is `HOMEDRIVE` + `HOMEPATH`, or `USERPROFILE` when both are empty.
fn windows_home(drive: Option<&str>, path: Option<&str>, profile: Option<&str>) -> Option<PathBuf> {
    let home = format!("{}{}", drive.unwrap_or_default(), path.unwrap_or_default());
    if !home.is_empty() {
        return Some(PathBuf::from(home));
    }
    profile
        .filter(|profile| !profile.is_empty())
        .map(PathBuf::from)
}
