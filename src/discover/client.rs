use futures::{FutureExt, future::BoxFuture};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use kube::Client;
use tracing::debug;

use super::{PreferredResources, without_subresources};
use crate::{ClientConfiguration, Error, Result};

/// Discovery client listing the preferred resources of a live cluster.
#[derive(Clone)]
pub struct DiscoverClient {
    client: Client,
}

impl DiscoverClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Open a client for the cluster described by `config`.
    pub async fn connect(config: &ClientConfiguration) -> Result<Self> {
        let config = config
            .to_kube_config()
            .await
            .map_err(Error::discovery_unavailable)?;
        let client = Client::try_from(config).map_err(Error::discovery_unavailable)?;
        Ok(Self::new(client))
    }

    /// List the resources of the preferred version of every API group, core `v1` first.
    pub async fn list_server_preferred_resources(
        &self,
    ) -> Result<Vec<APIResourceList>, kube::Error> {
        let mut lists = Vec::new();

        let core = self.client.list_core_api_versions().await?;
        if let Some(version) = core.versions.first() {
            let list = self.client.list_core_api_resources(version).await?;
            lists.push(without_subresources(list));
        }

        let groups = self.client.list_api_groups().await?;
        for group in groups.groups {
            let Some(preferred) = group
                .preferred_version
                .or_else(|| group.versions.first().cloned())
            else {
                debug!(group = %group.name, "skipping API group without versions");
                continue;
            };
            let list = self
                .client
                .list_api_group_resources(&preferred.group_version)
                .await?;
            lists.push(without_subresources(list));
        }

        Ok(lists)
    }
}

impl PreferredResources for DiscoverClient {
    fn server_preferred_resources(
        &self,
    ) -> BoxFuture<'_, Result<Vec<APIResourceList>, kube::Error>> {
        self.list_server_preferred_resources().boxed()
    }
}
