//! Schema providers declaring which resource types they can represent.

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::PathBuf,
};

use anyhow::{Context, anyhow};
use futures::{FutureExt, future::BoxFuture};
use serde::Deserialize;

/// Resource-type schema declared by a provider, keyed by normalized type name.
///
/// Only the presence of a name matters to catalog building; descriptors are kept opaque.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderSchema {
    pub resource_types: HashMap<String, serde_json::Value>,
}

impl ProviderSchema {
    pub fn declares(&self, type_name: &str) -> bool {
        self.resource_types.contains_key(type_name)
    }
}

/// How a provider names the resource type for a Kubernetes kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindNameConvention {
    /// `prefix` followed by the kind in snake case: `ConfigMap` → `kubernetes_config_map`.
    PrefixedSnakeCase { prefix: String },
    /// The kind in lower case: `ConfigMap` → `configmap`.
    Lowercase,
}

impl KindNameConvention {
    pub fn normalize(&self, kind: &str) -> String {
        match self {
            Self::PrefixedSnakeCase { prefix } => format!("{prefix}{}", snake_case(kind)),
            Self::Lowercase => kind.to_lowercase(),
        }
    }
}

impl Default for KindNameConvention {
    fn default() -> Self {
        Self::PrefixedSnakeCase {
            prefix: "kubernetes_".into(),
        }
    }
}

/// `HorizontalPodAutoscaler` → `horizontal_pod_autoscaler`.
///
/// A run of capitals is one word, so `APIService` becomes `api_service`.
fn snake_case(kind: &str) -> String {
    let chars: Vec<char> = kind.chars().collect();
    let mut out = String::with_capacity(kind.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower =
                i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let next_lower = chars.get(i + 1).is_some_and(|next| next.is_lowercase());
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            if prev_lower || (prev_upper && next_lower) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// An open session with a schema provider.
pub trait SchemaSession: Send + Sync {
    /// Retrieve the provider's declared resource-type schema.
    fn schema(&self) -> BoxFuture<'_, anyhow::Result<ProviderSchema>>;
}

/// External component declaring, by name, which resource types it can represent.
pub trait SchemaProvider: Send + Sync {
    /// Provider identity, e.g. `kubernetes`.
    fn name(&self) -> &str;

    fn open_session(
        &self,
        verbose: bool,
    ) -> BoxFuture<'_, anyhow::Result<Box<dyn SchemaSession>>>;

    fn naming_convention(&self) -> KindNameConvention {
        KindNameConvention::default()
    }

    /// Name the provider uses for the resource type of `kind`.
    fn normalize_kind(&self, kind: &str) -> String {
        self.naming_convention().normalize(kind)
    }
}

/// Provider with a fixed, in-memory set of resource types.
#[derive(Debug, Clone)]
pub struct StaticSchemaProvider {
    name: String,
    convention: KindNameConvention,
    resource_types: HashSet<String>,
}

impl StaticSchemaProvider {
    pub fn new<I, S>(name: impl Into<String>, resource_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            convention: KindNameConvention::default(),
            resource_types: resource_types.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_convention(mut self, convention: KindNameConvention) -> Self {
        self.convention = convention;
        self
    }
}

impl SchemaSession for StaticSchemaProvider {
    fn schema(&self) -> BoxFuture<'_, anyhow::Result<ProviderSchema>> {
        let resource_types = self
            .resource_types
            .iter()
            .map(|name| (name.clone(), serde_json::Value::Null))
            .collect();
        async move { Ok::<_, anyhow::Error>(ProviderSchema { resource_types }) }.boxed()
    }
}

impl SchemaProvider for StaticSchemaProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn open_session(
        &self,
        _verbose: bool,
    ) -> BoxFuture<'_, anyhow::Result<Box<dyn SchemaSession>>> {
        let session: Box<dyn SchemaSession> = Box::new(self.clone());
        async move { Ok::<_, anyhow::Error>(session) }.boxed()
    }

    fn naming_convention(&self) -> KindNameConvention {
        self.convention.clone()
    }
}

#[derive(Debug, Deserialize)]
struct SchemaDocument {
    #[serde(default)]
    provider_schemas: HashMap<String, ProviderEntry>,
}

#[derive(Debug, Deserialize)]
struct ProviderEntry {
    #[serde(default)]
    resource_schemas: HashMap<String, serde_json::Value>,
}

/// Provider reading a schema document in the `providers schema -json` layout.
///
/// The provider entry is the one whose address is the provider name or ends with `/<name>`, such as
/// `registry.terraform.io/hashicorp/kubernetes`.
#[derive(Debug, Clone)]
pub struct JsonSchemaProvider {
    name: String,
    path: PathBuf,
    convention: KindNameConvention,
}

impl JsonSchemaProvider {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            convention: KindNameConvention::default(),
        }
    }

    pub fn with_convention(mut self, convention: KindNameConvention) -> Self {
        self.convention = convention;
        self
    }

    fn load(&self, verbose: bool) -> anyhow::Result<ProviderSchema> {
        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read provider schema at {:?}", self.path))?;
        let document: SchemaDocument = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse provider schema at {:?}", self.path))?;

        let suffix = format!("/{}", self.name);
        let (address, entry) = document
            .provider_schemas
            .into_iter()
            .find(|(address, _)| *address == self.name || address.ends_with(&suffix))
            .ok_or_else(|| anyhow!("provider {:?} not found in {:?}", self.name, self.path))?;

        if verbose {
            tracing::info!(
                provider = %address,
                resource_types = entry.resource_schemas.len(),
                "loaded provider schema"
            );
        }
        Ok(ProviderSchema {
            resource_types: entry.resource_schemas,
        })
    }
}

struct LoadedSession(ProviderSchema);

impl SchemaSession for LoadedSession {
    fn schema(&self) -> BoxFuture<'_, anyhow::Result<ProviderSchema>> {
        let schema = self.0.clone();
        async move { Ok::<_, anyhow::Error>(schema) }.boxed()
    }
}

impl SchemaProvider for JsonSchemaProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn open_session(
        &self,
        verbose: bool,
    ) -> BoxFuture<'_, anyhow::Result<Box<dyn SchemaSession>>> {
        async move {
            let schema = self.load(verbose)?;
            Ok::<_, anyhow::Error>(Box::new(LoadedSession(schema)) as Box<dyn SchemaSession>)
        }
        .boxed()
    }

    fn naming_convention(&self) -> KindNameConvention {
        self.convention.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;

    use super::*;

    #[test]
    fn snake_cases_kind_names() {
        assert_eq!(snake_case("ConfigMap"), "config_map");
        assert_eq!(snake_case("HorizontalPodAutoscaler"), "horizontal_pod_autoscaler");
        assert_eq!(snake_case("Pod"), "pod");
        assert_eq!(snake_case("APIService"), "api_service");
        assert_eq!(snake_case("CSIDriver"), "csi_driver");
    }

    #[test]
    fn conventions_normalize_differently() {
        let terraform = KindNameConvention::default();
        assert_eq!(terraform.normalize("ConfigMap"), "kubernetes_config_map");
        assert_eq!(KindNameConvention::Lowercase.normalize("ConfigMap"), "configmap");
    }

    #[tokio::test]
    async fn static_provider_declares_its_types() {
        let provider = StaticSchemaProvider::new("kubernetes", ["kubernetes_pod"]);
        assert_eq!(provider.normalize_kind("Pod"), "kubernetes_pod");

        let session = provider.open_session(false).await.unwrap();
        let schema = session.schema().await.unwrap();
        assert!(schema.declares("kubernetes_pod"));
        assert!(!schema.declares("kubernetes_service"));
    }

    #[tokio::test]
    async fn json_provider_reads_resource_schemas() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        let document = json!({
            "format_version": "1.0",
            "provider_schemas": {
                "registry.terraform.io/hashicorp/aws": {
                    "resource_schemas": {"aws_instance": {}}
                },
                "registry.terraform.io/hashicorp/kubernetes": {
                    "resource_schemas": {
                        "kubernetes_config_map": {"version": 0},
                        "kubernetes_deployment": {"version": 1}
                    }
                }
            }
        });
        fs::write(&path, document.to_string()).unwrap();

        let provider = JsonSchemaProvider::new("kubernetes", &path);
        let session = provider.open_session(true).await.unwrap();
        let schema = session.schema().await.unwrap();
        assert_eq!(schema.resource_types.len(), 2);
        assert!(schema.declares("kubernetes_config_map"));
        assert!(!schema.declares("aws_instance"));
    }

    #[tokio::test]
    async fn json_provider_fails_without_matching_provider() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        fs::write(&path, r#"{"provider_schemas": {}}"#).unwrap();

        let provider = JsonSchemaProvider::new("kubernetes", &path);
        assert!(provider.open_session(false).await.is_err());

        let missing = JsonSchemaProvider::new("kubernetes", dir.path().join("missing.json"));
        assert!(missing.open_session(false).await.is_err());
    }
}
