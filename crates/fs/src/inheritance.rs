// Inheritance resolver: walks a schema's parent links through the index.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use creatio_fs_common::path::VirtualPath;
use creatio_fs_common::types::File;

use crate::error::{FsError, FsResult};
use crate::index::RemoteFs;
use crate::session::HttpTransport;

/// Upper bound on chain length; longer chains are treated as cycles.
pub const MAX_CHAIN_LEN: usize = 64;

/// Where the resolver loads files from.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Load the file at `path` with its body.
    async fn load_file(&self, path: &VirtualPath) -> FsResult<File>;

    /// Path of the schema with this uId, if it is indexed.
    fn resolve_uid(&self, u_id: Uuid) -> Option<VirtualPath>;
}

#[async_trait]
impl<T: HttpTransport + 'static> FileSource for RemoteFs<T> {
    async fn load_file(&self, path: &VirtualPath) -> FsResult<File> {
        self.get_file(path, true).await
    }

    fn resolve_uid(&self, u_id: Uuid) -> Option<VirtualPath> {
        RemoteFs::resolve_uid(self, u_id)
    }
}

/// The file itself followed by each ancestor, nearest first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AncestorChain {
    pub files: Vec<File>,
    /// Set when the walk stopped because the token was cancelled.
    pub cancelled: bool,
}

impl AncestorChain {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Ancestors only, without the starting file.
    pub fn ancestors(&self) -> &[File] {
        self.files.get(1..).unwrap_or_default()
    }
}

/// Collect `path` and its ancestors by following parent uIds.
///
/// The walk stops at a schema with no parent or with a parent that is not
/// indexed. Cancellation is checked before every fetch; a cancelled walk
/// returns what it collected so far. A repeated uId or a chain longer than
/// [`MAX_CHAIN_LEN`] is an error.
pub async fn get_ancestor_chain<S: FileSource + ?Sized>(
    source: &S,
    path: &VirtualPath,
    cancel: &CancellationToken,
) -> FsResult<AncestorChain> {
    let mut chain = AncestorChain::default();
    let mut seen: Vec<Uuid> = Vec::new();
    let mut next = Some(path.clone());

    while let Some(current) = next.take() {
        if cancel.is_cancelled() {
            debug!(%path, collected = chain.len(), "ancestor walk cancelled");
            chain.cancelled = true;
            break;
        }
        if chain.len() == MAX_CHAIN_LEN {
            return Err(FsError::InheritanceCycle { path: path.to_string(), limit: MAX_CHAIN_LEN });
        }

        let file = source.load_file(&current).await?;
        if seen.contains(&file.u_id()) {
            return Err(FsError::InheritanceCycle { path: path.to_string(), limit: MAX_CHAIN_LEN });
        }
        seen.push(file.u_id());

        next = match file.parent_u_id() {
            Some(parent) => {
                let resolved = source.resolve_uid(parent);
                if resolved.is_none() {
                    debug!(%current, %parent, "parent not indexed, chain ends");
                }
                resolved
            }
            None => None,
        };
        chain.files.push(file);
    }

    Ok(chain)
}
