//! Discovery of the resource types served by the cluster.

use futures::future::BoxFuture;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;

pub mod client;
pub use client::DiscoverClient;

/// Source of the server's preferred resource lists.
///
/// One list is returned per API group, holding the resources of the group's preferred version.
pub trait PreferredResources {
    fn server_preferred_resources(
        &self,
    ) -> BoxFuture<'_, Result<Vec<APIResourceList>, kube::Error>>;
}

/// Drop subresources such as `pods/log` from a resource list.
pub(crate) fn without_subresources(mut list: APIResourceList) -> APIResourceList {
    list.resources.retain(|resource| !resource.name.contains('/'));
    list
}
