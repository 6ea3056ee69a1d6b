//! Catalog of importable kinds: the resource types the server lets us list and the schema provider
//! knows how to represent.
//!
//! Failures while talking to the cluster or the provider are logged and produce an empty catalog.

use std::thread;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use tokio::{
    runtime::{Handle, RuntimeFlavor},
    task,
};
use tracing::{debug, instrument, warn};

use crate::{
    ClientConfiguration, Error,
    discover::{DiscoverClient, PreferredResources},
    kind::{Catalog, GroupVersion, Kind},
    schema::{ProviderSchema, SchemaProvider},
};

/// Build the catalog for the cluster described by `config`.
#[instrument(skip_all, fields(provider = provider.name(), context = config.context()))]
pub async fn build_catalog<P>(config: &ClientConfiguration, provider: &P, verbose: bool) -> Catalog
where
    P: SchemaProvider + ?Sized,
{
    let discover = match DiscoverClient::connect(config).await {
        Ok(discover) => discover,
        Err(err) => {
            warn!(error = %err, "failed to open discovery connection");
            return Catalog::new();
        }
    };
    build_catalog_with(&discover, provider, verbose).await
}

/// Build the catalog from an already opened discovery source.
pub async fn build_catalog_with<D, P>(discovery: &D, provider: &P, verbose: bool) -> Catalog
where
    D: PreferredResources + ?Sized,
    P: SchemaProvider + ?Sized,
{
    let lists = match discovery.server_preferred_resources().await {
        Ok(lists) => lists,
        Err(err) => {
            warn!(
                error = %Error::discovery_unavailable(err),
                "failed to list server preferred resources"
            );
            return Catalog::new();
        }
    };

    let schema = match open_schema(provider, verbose).await {
        Ok(schema) => schema,
        Err(err) => {
            warn!(error = %err, "failed to load provider schema");
            return Catalog::new();
        }
    };

    let catalog = catalog_from_resources(&lists, &schema, |kind| provider.normalize_kind(kind));
    debug!(kinds = catalog.len(), "built resource catalog");
    catalog
}

async fn open_schema<P>(provider: &P, verbose: bool) -> Result<ProviderSchema, Error>
where
    P: SchemaProvider + ?Sized,
{
    let unavailable = |source| Error::SchemaUnavailable {
        provider: provider.name().to_string(),
        source,
    };
    let session = provider.open_session(verbose).await.map_err(unavailable)?;
    session.schema().await.map_err(unavailable)
}

/// Intersect the discovered resource lists with the provider schema.
///
/// A resource becomes a [`Kind`] when it supports `list` and `normalize(kind)` is declared by the
/// schema. Lists whose group/version does not parse are skipped.
pub fn catalog_from_resources<F>(
    lists: &[APIResourceList],
    schema: &ProviderSchema,
    normalize: F,
) -> Catalog
where
    F: Fn(&str) -> String,
{
    let mut catalog = Catalog::new();

    for list in lists {
        if list.resources.is_empty() {
            continue;
        }

        let group_version = match GroupVersion::parse(&list.group_version) {
            Ok(group_version) => group_version,
            Err(err) => {
                debug!(error = %err, "skipping resource list");
                continue;
            }
        };

        for resource in &list.resources {
            if resource.verbs.is_empty() {
                continue;
            }
            if !resource.verbs.iter().any(|verb| verb == "list") {
                continue;
            }
            if !schema.declares(&normalize(&resource.kind)) {
                continue;
            }

            catalog.insert(Kind {
                group: group_version.group.clone(),
                version: group_version.version.clone(),
                name: resource.kind.clone(),
                resource: resource.name.clone(),
                namespaced: resource.namespaced,
            });
        }
    }

    catalog
}

/// Blocking variant of [`build_catalog`].
///
/// Inside a multi-threaded Tokio runtime the build runs on the current handle through
/// `block_in_place`; otherwise a new runtime is created for the call, on a separate thread when
/// called from a current-thread runtime. A runtime that cannot be
/// created yields an empty catalog.
pub fn build_catalog_blocking<P>(
    config: &ClientConfiguration,
    provider: &P,
    verbose: bool,
) -> Catalog
where
    P: SchemaProvider + ?Sized,
{
    let future = build_catalog(config, provider, verbose);
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            task::block_in_place(move || handle.block_on(future))
        }
        // A current-thread runtime cannot block in place; run on a scoped thread instead.
        Ok(_) => thread::scope(|scope| {
            scope
                .spawn(move || block_on_new_runtime(future))
                .join()
                .unwrap_or_else(|_| {
                    warn!("catalog building thread panicked");
                    Catalog::new()
                })
        }),
        Err(_) => block_on_new_runtime(future),
    }
}

fn block_on_new_runtime(future: impl Future<Output = Catalog>) -> Catalog {
    match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime.block_on(future),
        Err(err) => {
            warn!(error = %err, "failed to start runtime for catalog building");
            Catalog::new()
        }
    }
}
