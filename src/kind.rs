use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use kube::{api::GroupVersionKind, discovery::ApiResource};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Group and version of an API resource list, e.g. `apps/v1`.
///
/// The core group is represented by an empty `group`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupVersion {
    pub group: String,
    pub version: String,
}

impl GroupVersion {
    /// Parse a `group/version` string as reported by the discovery endpoint.
    ///
    /// `v1` is in the core group, while an empty string and `/` are the empty group/version. Either
    /// side of the `/` may be empty; anything with more than one `/` is rejected.
    pub fn parse(group_version: &str) -> Result<Self> {
        match group_version.split('/').collect::<Vec<_>>()[..] {
            [version] => Ok(Self {
                group: String::new(),
                version: version.to_string(),
            }),
            [group, version] => Ok(Self {
                group: group.to_string(),
                version: version.to_string(),
            }),
            _ => Err(Error::UnsupportedGroupVersion(group_version.to_string())),
        }
    }

    /// The `apiVersion` form: `version` for the core group, `group/version` otherwise.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for GroupVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.api_version())
    }
}

/// One importable resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kind {
    /// API group, empty for the core group.
    pub group: String,
    pub version: String,
    /// Kind name as reported by the server, e.g. `ConfigMap`.
    pub name: String,
    /// Plural resource name, e.g. `configmaps`.
    pub resource: String,
    pub namespaced: bool,
}

impl Kind {
    pub fn api_version(&self) -> String {
        GroupVersion {
            group: self.group.clone(),
            version: self.version.clone(),
        }
        .api_version()
    }

    /// Whether `target` names this kind, by plural name, kind name or `plural.group`.
    pub fn matches(&self, target: &str) -> bool {
        let target = target.to_lowercase();
        self.resource == target
            || self.name.to_lowercase() == target
            || (!self.group.is_empty() && format!("{}.{}", self.resource, self.group) == target)
    }
}

impl From<&Kind> for ApiResource {
    fn from(kind: &Kind) -> Self {
        let gvk = GroupVersionKind::gvk(&kind.group, &kind.version, &kind.name);
        Self::from_gvk_with_plural(&gvk, &kind.resource)
    }
}

/// Importable kinds, keyed by plural resource name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    kinds: HashMap<String, Kind>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a kind under its plural resource name, replacing any previous entry.
    pub(crate) fn insert(&mut self, kind: Kind) -> Option<Kind> {
        self.kinds.insert(kind.resource.clone(), kind)
    }

    pub fn get(&self, resource: &str) -> Option<&Kind> {
        self.kinds.get(resource)
    }

    pub fn contains(&self, resource: &str) -> bool {
        self.kinds.contains_key(resource)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Kind)> {
        self.kinds.iter().map(|(resource, kind)| (resource.as_str(), kind))
    }

    /// Plural resource names in lexical order.
    pub fn resource_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.kinds.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Find the kind named by `target`, see [`Kind::matches`].
    pub fn resolve(&self, target: &str) -> Option<&Kind> {
        self.kinds
            .get(target)
            .or_else(|| self.kinds.values().find(|kind| kind.matches(target)))
    }

    /// Select kinds from the catalog according to `spec`.
    pub fn select(&self, spec: &ResourceTargetSpec) -> Result<Vec<Kind>> {
        match spec {
            ResourceTargetSpec::AllResources => {
                let mut kinds: Vec<_> = self.kinds.values().cloned().collect();
                kinds.sort_by(|a, b| a.resource.cmp(&b.resource));
                Ok(kinds)
            }
            ResourceTargetSpec::AllOf(targets) => {
                let mut matched = Vec::new();
                let mut unmatched = Vec::new();

                for target in targets {
                    match self.resolve(target) {
                        Some(kind) => matched.push(kind.clone()),
                        None => unmatched.push(target.clone()),
                    }
                }

                if unmatched.is_empty() {
                    Ok(matched)
                } else {
                    Err(Error::UnsupportedResources(unmatched))
                }
            }
            ResourceTargetSpec::AnyOf(targets) => {
                let mut seen = HashSet::new();
                let matched: Vec<_> = targets
                    .iter()
                    .filter_map(|target| self.resolve(target))
                    .filter(|kind| seen.insert(kind.resource.clone()))
                    .cloned()
                    .collect();

                if matched.is_empty() {
                    Err(Error::NoMatchingResources(targets.clone()))
                } else {
                    Ok(matched)
                }
            }
        }
    }
}

impl FromIterator<Kind> for Catalog {
    fn from_iter<I: IntoIterator<Item = Kind>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for kind in iter {
            catalog.insert(kind);
        }
        catalog
    }
}

impl IntoIterator for Catalog {
    type Item = (String, Kind);
    type IntoIter = std::collections::hash_map::IntoIter<String, Kind>;

    fn into_iter(self) -> Self::IntoIter {
        self.kinds.into_iter()
    }
}

/// Which kinds of a catalog a run should import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceTargetSpec {
    /// Every kind in the catalog.
    AllResources,
    /// All named kinds must be in the catalog.
    AllOf(Vec<String>),
    /// At least one named kind must be in the catalog.
    AnyOf(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(group: &str, version: &str, name: &str, resource: &str, namespaced: bool) -> Kind {
        Kind {
            group: group.into(),
            version: version.into(),
            name: name.into(),
            resource: resource.into(),
            namespaced,
        }
    }

    fn catalog() -> Catalog {
        [
            kind("", "v1", "ConfigMap", "configmaps", true),
            kind("apps", "v1", "Deployment", "deployments", true),
            kind("", "v1", "Namespace", "namespaces", false),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn parses_group_versions() {
        assert_eq!(
            GroupVersion::parse("v1").unwrap(),
            GroupVersion {
                group: String::new(),
                version: "v1".into()
            }
        );
        let apps = GroupVersion::parse("apps/v1").unwrap();
        assert_eq!(apps.group, "apps");
        assert_eq!(apps.version, "v1");
        assert_eq!(apps.to_string(), "apps/v1");
        assert_eq!(GroupVersion::parse("").unwrap().api_version(), "");
    }

    #[test]
    fn rejects_malformed_group_versions() {
        assert!(matches!(
            GroupVersion::parse("a/b/c"),
            Err(Error::UnsupportedGroupVersion(_))
        ));
    }

    #[test]
    fn single_slash_group_versions_may_have_empty_sides() {
        let empty = GroupVersion::parse("/").unwrap();
        assert_eq!(empty.group, "");
        assert_eq!(empty.version, "");

        let apps = GroupVersion::parse("apps/").unwrap();
        assert_eq!(apps.group, "apps");
        assert_eq!(apps.version, "");

        let core = GroupVersion::parse("/v1").unwrap();
        assert_eq!(core.group, "");
        assert_eq!(core.version, "v1");
    }

    #[test]
    fn converts_to_api_resource() {
        let deployment = kind("apps", "v1", "Deployment", "deployments", true);
        let api_resource = ApiResource::from(&deployment);
        assert_eq!(api_resource.api_version, "apps/v1");
        assert_eq!(api_resource.plural, "deployments");

        let config_map = kind("", "v1", "ConfigMap", "configmaps", true);
        assert_eq!(ApiResource::from(&config_map).api_version, "v1");
    }

    #[test]
    fn resolves_by_plural_kind_or_qualified_name() {
        let catalog = catalog();
        assert_eq!(catalog.resolve("configmaps").unwrap().name, "ConfigMap");
        assert_eq!(catalog.resolve("configmap").unwrap().resource, "configmaps");
        assert_eq!(catalog.resolve("deployments.apps").unwrap().name, "Deployment");
        assert!(catalog.resolve("pods").is_none());
    }

    #[test]
    fn select_all_of_requires_every_target() {
        let catalog = catalog();
        let selected = catalog
            .select(&ResourceTargetSpec::AllOf(vec![
                "deployments".into(),
                "namespaces".into(),
            ]))
            .unwrap();
        assert_eq!(selected.len(), 2);

        let err = catalog
            .select(&ResourceTargetSpec::AllOf(vec![
                "deployments".into(),
                "widgets".into(),
            ]))
            .unwrap_err();
        match err {
            Error::UnsupportedResources(names) => assert_eq!(names, ["widgets"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn select_any_of_deduplicates() {
        let catalog = catalog();
        let selected = catalog
            .select(&ResourceTargetSpec::AnyOf(vec![
                "configmaps".into(),
                "ConfigMap".into(),
                "widgets".into(),
            ]))
            .unwrap();
        assert_eq!(selected, vec![kind("", "v1", "ConfigMap", "configmaps", true)]);

        assert!(matches!(
            catalog.select(&ResourceTargetSpec::AnyOf(vec!["widgets".into()])),
            Err(Error::NoMatchingResources(_))
        ));
    }

    #[test]
    fn select_all_resources_is_sorted() {
        let names: Vec<_> = catalog()
            .select(&ResourceTargetSpec::AllResources)
            .unwrap()
            .into_iter()
            .map(|kind| kind.resource)
            .collect();
        assert_eq!(names, ["configmaps", "deployments", "namespaces"]);
    }

    #[test]
    fn serializes_as_map() {
        let json = serde_json::to_value(catalog()).unwrap();
        assert_eq!(json["deployments"]["group"], "apps");
        assert_eq!(json["namespaces"]["namespaced"], false);
    }
}
