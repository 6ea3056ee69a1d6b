//! Resolution of the client configuration used to reach the cluster.
//!
//! The configuration is assembled in a fixed order:
//! 1. [`resolve_location`] picks the kubeconfig location from the global options and the platform.
//! 2. [`load_kubeconfig`] reads (and merges, for path lists) the raw credentials.
//! 3. [`materialize`] selects the context, applies the namespace override and validates the result.
//! 4. [`apply_global_options`] overlays the individual global option overrides.
//!
//! [`resolve`] runs all four steps.

use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use kube::config::{
    AuthInfo, Cluster, Context, KubeConfigOptions, Kubeconfig, KubeconfigError, NamedAuthInfo,
    NamedCluster, NamedContext,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};

use crate::{Error, Result};

pub mod duration;
mod options;
pub use options::{GLOBAL_FLAG_PREFIX, GlobalOptions, PlatformEnv};
use options::present;

const DEFAULT_NAMESPACE: &str = "default";

/// Where the kubeconfig location was taken from, in decreasing order of precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// The explicit global configuration-file override.
    ExplicitConfig,
    /// The global `--kubeconfig` override.
    KubeconfigFlag,
    /// The `KUBECONFIG` environment variable.
    Environment,
    /// `<home>/.kube/config`.
    PlatformDefault,
}

/// Resolved kubeconfig location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeconfigLocation {
    pub source: ConfigSource,
    pub path: PathBuf,
}

/// Pick the kubeconfig location with the highest precedence.
pub fn resolve_location(
    options: &GlobalOptions,
    platform: &PlatformEnv,
) -> Result<KubeconfigLocation> {
    let flagged = [
        (ConfigSource::ExplicitConfig, present(&options.config)),
        (ConfigSource::KubeconfigFlag, present(&options.kubeconfig)),
        (ConfigSource::Environment, present(&platform.kubeconfig)),
    ];
    if let Some((source, path)) = flagged
        .into_iter()
        .find_map(|(source, path)| path.map(|path| (source, path)))
    {
        return Ok(KubeconfigLocation {
            source,
            path: PathBuf::from(path),
        });
    }

    platform
        .default_kubeconfig()
        .map(|path| KubeconfigLocation {
            source: ConfigSource::PlatformDefault,
            path,
        })
        .ok_or(Error::ConfigurationMissing)
}

/// Read the raw credentials at `location`.
///
/// A `KUBECONFIG` value may list several files; they are merged in order, the first file to set a
/// value wins. Files of the list that do not exist are skipped.
pub fn load_kubeconfig(location: &KubeconfigLocation) -> Result<Kubeconfig> {
    let invalid = |path: &Path, source: KubeconfigError| Error::ConfigurationInvalid {
        path: path.to_path_buf(),
        source,
    };

    let paths: Vec<PathBuf> = match location.source {
        ConfigSource::Environment => env::split_paths(&location.path)
            .filter(|path| !path.as_os_str().is_empty())
            .collect(),
        _ => vec![location.path.clone()],
    };

    let mut merged: Option<Kubeconfig> = None;
    for path in &paths {
        if location.source == ConfigSource::Environment && !path.exists() {
            debug!(path = %path.display(), "skipping missing kubeconfig");
            continue;
        }
        let kubeconfig = Kubeconfig::read_from(path).map_err(|err| invalid(path, err))?;
        debug!(path = %path.display(), "loaded kubeconfig");
        merged = Some(match merged {
            Some(current) => current
                .merge(kubeconfig)
                .map_err(|err| invalid(&location.path, err))?,
            None => kubeconfig,
        });
    }
    merged.ok_or(Error::ConfigurationMissing)
}

/// Overrides applied while selecting the context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub namespace: Option<String>,
    pub context: Option<String>,
}

impl From<&GlobalOptions> for ConfigOverrides {
    fn from(options: &GlobalOptions) -> Self {
        Self {
            namespace: present(&options.namespace).map(String::from),
            context: present(&options.context).map(String::from),
        }
    }
}

/// Fully materialized client configuration.
///
/// Built by [`materialize`] and [`apply_global_options`]; read-only afterwards. Any change requires
/// rebuilding it from its sources.
#[derive(Clone, Debug)]
pub struct ClientConfiguration {
    kubeconfig_path: PathBuf,
    context: String,
    namespace: String,
    cluster_name: String,
    cluster: Cluster,
    user_name: Option<String>,
    auth: AuthInfo,
    timeout: Option<Duration>,
}

impl ClientConfiguration {
    /// Kubeconfig the configuration was loaded from.
    pub fn kubeconfig_path(&self) -> &Path {
        &self.kubeconfig_path
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    /// API server URL.
    pub fn server(&self) -> &str {
        self.cluster.server.as_deref().unwrap_or_default()
    }

    /// Server name used to verify the serving certificate.
    pub fn tls_server_name(&self) -> Option<&str> {
        self.cluster.tls_server_name.as_deref()
    }

    pub fn ca_file(&self) -> Option<&str> {
        self.cluster.certificate_authority.as_deref()
    }

    pub fn insecure_skip_tls_verify(&self) -> bool {
        self.cluster.insecure_skip_tls_verify.unwrap_or(false)
    }

    pub fn client_certificate_file(&self) -> Option<&str> {
        self.auth.client_certificate.as_deref()
    }

    pub fn client_key_file(&self) -> Option<&str> {
        self.auth.client_key.as_deref()
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.auth.token.as_ref().map(|token| token.expose_secret())
    }

    pub fn username(&self) -> Option<&str> {
        self.auth.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.auth.password.as_ref().map(|password| password.expose_secret())
    }

    pub fn impersonate_user(&self) -> Option<&str> {
        self.auth.impersonate.as_deref()
    }

    pub fn impersonate_groups(&self) -> &[String] {
        self.auth.impersonate_groups.as_deref().unwrap_or_default()
    }

    /// Request timeout, applied to connecting, reading and writing; zero means no timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Build a [`kube::Config`] for opening connections with this configuration.
    pub async fn to_kube_config(&self) -> Result<kube::Config, KubeconfigError> {
        let user_name = self
            .user_name
            .clone()
            .unwrap_or_else(|| format!("{}-user", self.context));
        let kubeconfig = Kubeconfig {
            clusters: vec![NamedCluster {
                name: self.cluster_name.clone(),
                cluster: Some(self.cluster.clone()),
            }],
            auth_infos: vec![NamedAuthInfo {
                name: user_name.clone(),
                auth_info: Some(self.auth.clone()),
            }],
            contexts: vec![NamedContext {
                name: self.context.clone(),
                context: Some(Context {
                    cluster: self.cluster_name.clone(),
                    user: Some(user_name),
                    namespace: Some(self.namespace.clone()),
                    ..Default::default()
                }),
            }],
            current_context: Some(self.context.clone()),
            ..Default::default()
        };

        let mut config =
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
        match self.timeout {
            Some(timeout) if !timeout.is_zero() => {
                config.connect_timeout = Some(timeout);
                config.read_timeout = Some(timeout);
                config.write_timeout = Some(timeout);
            }
            // Zero disables the request timeout; connecting keeps kube's default limit.
            Some(_) => {
                config.read_timeout = None;
                config.write_timeout = None;
            }
            None => {}
        }
        Ok(config)
    }
}

/// Select the context from `kubeconfig` and turn it into a validated [`ClientConfiguration`].
///
/// With a context override the named context must exist; otherwise the kubeconfig's current context
/// is used. The namespace override wins over the context namespace.
pub fn materialize(
    kubeconfig: Kubeconfig,
    overrides: &ConfigOverrides,
    path: &Path,
) -> Result<ClientConfiguration> {
    let rejected = |reason: String| Error::credentials_rejected(path, reason);

    if kubeconfig.clusters.is_empty() && kubeconfig.contexts.is_empty() {
        return Err(rejected(
            "invalid configuration: no configuration has been provided".into(),
        ));
    }

    let context_name = match overrides.context.as_deref() {
        Some(context) => context.to_string(),
        None => kubeconfig
            .current_context
            .clone()
            .filter(|context| !context.is_empty())
            .ok_or_else(|| rejected("current-context is not set".into()))?,
    };

    let context = kubeconfig
        .contexts
        .iter()
        .find(|named| named.name == context_name)
        .and_then(|named| named.context.clone())
        .ok_or_else(|| {
            rejected(format!(
                "context was not found for specified context: {context_name}"
            ))
        })?;

    let cluster = kubeconfig
        .clusters
        .iter()
        .find(|named| named.name == context.cluster)
        .and_then(|named| named.cluster.clone())
        .ok_or_else(|| {
            rejected(format!(
                "cluster {:?} was not found for context {context_name:?}",
                context.cluster
            ))
        })?;
    if cluster.server.as_deref().is_none_or(str::is_empty) {
        return Err(rejected(format!(
            "no server found for cluster {:?}",
            context.cluster
        )));
    }

    // A user named by the context but missing from the kubeconfig leaves the client anonymous.
    let user_name = context.user.clone().filter(|user| !user.is_empty());
    let auth = match &user_name {
        Some(user) => match kubeconfig.auth_infos.iter().find(|named| &named.name == user) {
            Some(named) => named.auth_info.clone().unwrap_or_default(),
            None => {
                debug!(user, context = %context_name, "user not found, using anonymous credentials");
                AuthInfo::default()
            }
        },
        None => AuthInfo::default(),
    };

    validate(&cluster, &auth, user_name.as_deref().unwrap_or_default()).map_err(rejected)?;

    let namespace = overrides
        .namespace
        .clone()
        .or(context.namespace.clone())
        .filter(|namespace| !namespace.is_empty())
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

    Ok(ClientConfiguration {
        kubeconfig_path: path.to_path_buf(),
        context: context_name,
        namespace,
        cluster_name: context.cluster,
        cluster,
        user_name,
        auth,
        timeout: None,
    })
}

fn validate(cluster: &Cluster, auth: &AuthInfo, user: &str) -> std::result::Result<(), String> {
    if cluster.certificate_authority.is_some() && cluster.certificate_authority_data.is_some() {
        return Err(
            "certificate-authority-data and certificate-authority are both specified".into(),
        );
    }
    if cluster.insecure_skip_tls_verify.unwrap_or(false)
        && (cluster.certificate_authority.is_some() || cluster.certificate_authority_data.is_some())
    {
        return Err(
            "specifying a root certificates file with the insecure flag is not allowed".into(),
        );
    }

    let has_token = auth.token.is_some() || auth.token_file.is_some();
    let has_basic = auth.username.is_some() || auth.password.is_some();
    if has_token && has_basic {
        return Err(format!(
            "more than one authentication method found for {user:?}; username/password or bearer token may be set, but not both"
        ));
    }

    if auth.client_certificate.is_some() && auth.client_certificate_data.is_some() {
        return Err(format!(
            "client-cert-data and client-cert are both specified for {user:?}"
        ));
    }
    if auth.client_key.is_some() && auth.client_key_data.is_some() {
        return Err(format!(
            "client-key-data and client-key are both specified for {user:?}"
        ));
    }
    let has_cert = auth.client_certificate.is_some() || auth.client_certificate_data.is_some();
    let has_key = auth.client_key.is_some() || auth.client_key_data.is_some();
    if has_cert && !has_key {
        return Err(format!(
            "client-key-data or client-key must be specified for {user:?} to use the clientCert authentication method"
        ));
    }
    if has_key && !has_cert {
        return Err(format!(
            "client-cert-data or client-cert must be specified for {user:?} to use the clientCert authentication method"
        ));
    }
    Ok(())
}

/// Overlay the global option overrides on top of a materialized configuration.
///
/// Each present option replaces its field; list values are replaced, never merged. Values that need
/// parsing are parsed before anything is replaced, so a failure leaves no partial result.
pub fn apply_global_options(
    config: &ClientConfiguration,
    options: &GlobalOptions,
) -> Result<ClientConfiguration> {
    let groups = present(&options.impersonate_group)
        .map(|raw| {
            serde_json::from_str::<Vec<String>>(raw)
                .map_err(|err| Error::invalid_override("--as-group", err))
        })
        .transpose()?
        .filter(|groups| !groups.is_empty());
    let timeout = present(&options.request_timeout)
        .map(|raw| {
            duration::parse_duration(raw)
                .map_err(|err| Error::invalid_override("--request-timeout", err))
        })
        .transpose()?;

    let mut config = config.clone();

    if let Some(user) = present(&options.impersonate) {
        config.auth.impersonate = Some(user.to_string());
    }
    if let Some(groups) = groups {
        config.auth.impersonate_groups = Some(groups);
    }

    if let Some(ca_file) = present(&options.certificate_authority) {
        config.cluster.certificate_authority = Some(ca_file.to_string());
        config.cluster.certificate_authority_data = None;
    }
    if let Some(cert_file) = present(&options.client_certificate) {
        config.auth.client_certificate = Some(cert_file.to_string());
        config.auth.client_certificate_data = None;
    }
    if let Some(key_file) = present(&options.client_key) {
        config.auth.client_key = Some(key_file.to_string());
        config.auth.client_key_data = None;
    }

    // TODO: apply the cluster and user overrides once their kubeconfig semantics are settled.
    if let Some(cluster) = present(&options.cluster) {
        debug!(cluster, "ignoring cluster override");
    }
    if let Some(user) = present(&options.user) {
        debug!(user, "ignoring user override");
    }

    if let Some(timeout) = timeout {
        config.timeout = Some(timeout);
    }
    if let Some(server) = present(&options.server) {
        config.cluster.tls_server_name = Some(server.to_string());
    }
    if let Some(token) = present(&options.token) {
        config.auth.token = Some(SecretString::from(token.to_string()));
    }
    if let Some(username) = present(&options.username) {
        config.auth.username = Some(username.to_string());
    }
    if let Some(password) = present(&options.password) {
        config.auth.password = Some(SecretString::from(password.to_string()));
    }

    Ok(config)
}

/// Resolve the client configuration from the global options and the platform environment.
#[instrument(skip_all)]
pub fn resolve(options: &GlobalOptions, platform: &PlatformEnv) -> Result<ClientConfiguration> {
    let location = resolve_location(options, platform)?;
    debug!(
        path = %location.path.display(),
        source = ?location.source,
        "resolved kubeconfig location"
    );

    let kubeconfig = load_kubeconfig(&location)?;
    let config = materialize(kubeconfig, &ConfigOverrides::from(options), &location.path)?;
    let config = apply_global_options(&config, options)?;
    debug!(
        context = config.context(),
        namespace = config.namespace(),
        server = config.server(),
        "resolved client configuration"
    );
    Ok(config)
}
