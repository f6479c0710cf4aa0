//! HttpRemoteTree - IRemoteTree implementation for the HTTP listing API
//!
//! Wraps the [`RemoteClient`] and converts its wire records into port-level
//! [`RemoteEntry`] and [`ListPage`] values.
//!
//! ## Design Notes
//!
//! - This adapter does no throttling of its own; wrap it in
//!   [`crate::RateLimitedRemote`] for rate limits and retries.
//! - A 404 from `dirs/resolve` becomes `Ok(None)`; a 404 anywhere else
//!   surfaces as [`crate::RemoteError::NotFound`].

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use strmsync_core::config::{RateLimitingConfig, RemoteConfig};
use strmsync_core::domain::{Ancestor, ItemKind, RemoteEntry, RemoteId, RemotePath};
use strmsync_core::ports::{IRemoteTree, ListOptions, ListPage};

use crate::client::{AncestorDto, ChildrenQuery, ChildrenResponse, ItemDto, RemoteClient};
use crate::limited::PoolEndpoint;
use crate::RemoteError;

/// Converts a wire item into a port-level [`RemoteEntry`]
fn item_to_entry(item: ItemDto) -> RemoteEntry {
    let kind = if item.is_dir {
        ItemKind::Directory
    } else {
        ItemKind::File {
            size: item.size,
            content_handle: item.handle.filter(|h| !h.is_empty()),
        }
    };

    RemoteEntry {
        id: RemoteId::new(item.id),
        parent_id: RemoteId::new(item.parent_id),
        name: item.name,
        modify_time: item.mtime,
        kind,
    }
}

fn ancestor_from_dto(dto: AncestorDto) -> Ancestor {
    Ancestor {
        id: RemoteId::new(dto.id),
        parent_id: RemoteId::new(dto.parent_id),
        name: dto.name,
    }
}

fn response_to_page(resp: ChildrenResponse) -> ListPage {
    ListPage {
        entries: resp.items.into_iter().map(item_to_entry).collect(),
        total: resp.total,
        ancestors: resp
            .ancestors
            .map(|chain| chain.into_iter().map(ancestor_from_dto).collect()),
    }
}

/// [`IRemoteTree`] over the HTTP listing API
#[derive(Debug, Clone)]
pub struct HttpRemoteTree {
    client: RemoteClient,
}

impl HttpRemoteTree {
    /// Creates a provider over an existing client
    pub fn new(client: RemoteClient) -> Self {
        Self { client }
    }

    /// Returns the underlying client
    pub fn client(&self) -> &RemoteClient {
        &self.client
    }

    /// One provider per configured endpoint, ready for
    /// [`crate::RateLimitedRemote::pool`]
    ///
    /// Endpoints without their own cooldown use
    /// `rate_limiting.endpoint_cooldown_secs`.
    pub fn pool_endpoints(
        remote: &RemoteConfig,
        rate_limiting: &RateLimitingConfig,
    ) -> Result<Vec<PoolEndpoint<Self>>, RemoteError> {
        let timeout = Duration::from_secs(remote.timeout_secs);
        remote
            .effective_endpoints()
            .into_iter()
            .map(|endpoint| -> Result<PoolEndpoint<Self>, RemoteError> {
                let client = RemoteClient::with_timeout(endpoint.base_url.as_str(), timeout)?;
                let cooldown_secs = endpoint
                    .cooldown_secs
                    .unwrap_or(rate_limiting.endpoint_cooldown_secs);
                Ok(PoolEndpoint {
                    name: client.base_url().to_string(),
                    remote: Self::new(client),
                    cooldown: Duration::from_secs_f64(cooldown_secs.max(0.0)),
                    weight: endpoint.weight,
                })
            })
            .collect()
    }

    async fn list(
        &self,
        id: RemoteId,
        offset: u64,
        page_size: u32,
        options: &ListOptions,
        with_ancestors: bool,
    ) -> Result<ListPage> {
        let query = ChildrenQuery {
            offset,
            limit: page_size,
            with_ancestors,
            sort: options.sort.as_str(),
            ascending: options.ascending,
            suffix: options.suffix.as_deref(),
        };
        let resp = self.client.list_children(id.get(), &query).await?;
        Ok(response_to_page(resp))
    }
}

#[async_trait]
impl IRemoteTree for HttpRemoteTree {
    async fn resolve_path_to_id(&self, path: &RemotePath) -> Result<Option<RemoteId>> {
        if path.is_root() {
            return Ok(Some(RemoteId::ROOT));
        }
        let id = self.client.resolve_dir(path.as_str()).await?;
        Ok(id.map(RemoteId::new))
    }

    async fn list_children(
        &self,
        id: RemoteId,
        offset: u64,
        page_size: u32,
        options: &ListOptions,
    ) -> Result<ListPage> {
        self.list(id, offset, page_size, options, false).await
    }

    async fn list_children_with_ancestors(
        &self,
        id: RemoteId,
        offset: u64,
        page_size: u32,
        options: &ListOptions,
    ) -> Result<ListPage> {
        self.list(id, offset, page_size, options, true).await
    }

    async fn get_item_metadata(&self, id: RemoteId) -> Result<RemoteEntry> {
        let item = self.client.get_item(id.get()).await?;
        Ok(item_to_entry(item))
    }
}
