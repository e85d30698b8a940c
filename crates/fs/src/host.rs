// Host-facing filesystem surface.
//
// Front ends (the CLI, an editor bridge) talk to this trait instead of a
// concrete `RemoteFs`, so they can be driven by a fake in tests.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use creatio_fs_common::path::VirtualPath;
use creatio_fs_common::protocol::{BuildResponse, PackageChange};
use creatio_fs_common::types::File;
use serde_json::Value;

use crate::cache::CacheScope;
use crate::error::FsResult;
use crate::index::{CachePackageReport, DirEntry, Entry, ReloadSummary, RemoteFs, WriteOptions};
use crate::inheritance::{get_ancestor_chain, AncestorChain};
use crate::notify::ChangeSubscription;
use crate::session::HttpTransport;

#[async_trait]
pub trait SchemaFileSystem: Send + Sync {
    fn root(&self) -> VirtualPath;

    /// Refresh the tree from the server.
    async fn reload(&self) -> FsResult<ReloadSummary>;

    async fn stat(&self, path: &VirtualPath) -> FsResult<Entry>;

    async fn list_directory(&self, path: &VirtualPath) -> FsResult<Vec<DirEntry>>;

    async fn read_file(&self, path: &VirtualPath) -> FsResult<File>;

    async fn write_file(
        &self,
        path: &VirtualPath,
        content: String,
        options: WriteOptions,
    ) -> FsResult<File>;

    async fn lock(&self, path: &VirtualPath) -> FsResult<()>;

    async fn unlock(&self, path: &VirtualPath) -> FsResult<()>;

    async fn revert(&self, path: &VirtualPath) -> FsResult<()>;

    async fn generate_changes(&self, package: &str) -> FsResult<Vec<PackageChange>>;

    async fn build(&self, full: bool) -> FsResult<BuildResponse>;

    async fn select_query(&self, query: Value) -> FsResult<Value>;

    async fn ancestors(
        &self,
        path: &VirtualPath,
        cancel: &CancellationToken,
    ) -> FsResult<AncestorChain>;

    async fn cache_package(
        &self,
        package: &str,
        cancel: &CancellationToken,
    ) -> FsResult<CachePackageReport>;

    async fn clear_cache(&self, scope: &CacheScope) -> FsResult<()>;

    fn subscribe(&self, prefix: Option<VirtualPath>) -> ChangeSubscription;
}

#[async_trait]
impl<T: HttpTransport + 'static> SchemaFileSystem for RemoteFs<T> {
    fn root(&self) -> VirtualPath {
        RemoteFs::root(self)
    }

    async fn reload(&self) -> FsResult<ReloadSummary> {
        RemoteFs::reload(self).await
    }

    async fn stat(&self, path: &VirtualPath) -> FsResult<Entry> {
        RemoteFs::stat(self, path).await
    }

    async fn list_directory(&self, path: &VirtualPath) -> FsResult<Vec<DirEntry>> {
        RemoteFs::list_directory(self, path).await
    }

    async fn read_file(&self, path: &VirtualPath) -> FsResult<File> {
        self.get_file(path, false).await
    }

    async fn write_file(
        &self,
        path: &VirtualPath,
        content: String,
        options: WriteOptions,
    ) -> FsResult<File> {
        RemoteFs::write_file(self, path, content, options).await
    }

    async fn lock(&self, path: &VirtualPath) -> FsResult<()> {
        RemoteFs::lock(self, path).await
    }

    async fn unlock(&self, path: &VirtualPath) -> FsResult<()> {
        RemoteFs::unlock(self, path).await
    }

    async fn revert(&self, path: &VirtualPath) -> FsResult<()> {
        RemoteFs::revert(self, path).await
    }

    async fn generate_changes(&self, package: &str) -> FsResult<Vec<PackageChange>> {
        RemoteFs::generate_changes(self, package).await
    }

    async fn build(&self, full: bool) -> FsResult<BuildResponse> {
        if full {
            self.rebuild().await
        } else {
            RemoteFs::build(self).await
        }
    }

    async fn select_query(&self, query: Value) -> FsResult<Value> {
        RemoteFs::select_query(self, query).await
    }

    async fn ancestors(
        &self,
        path: &VirtualPath,
        cancel: &CancellationToken,
    ) -> FsResult<AncestorChain> {
        get_ancestor_chain(self, path, cancel).await
    }

    async fn cache_package(
        &self,
        package: &str,
        cancel: &CancellationToken,
    ) -> FsResult<CachePackageReport> {
        RemoteFs::cache_package(self, package, cancel).await
    }

    async fn clear_cache(&self, scope: &CacheScope) -> FsResult<()> {
        RemoteFs::clear_cache(self, scope).await
    }

    fn subscribe(&self, prefix: Option<VirtualPath>) -> ChangeSubscription {
        RemoteFs::subscribe(self, prefix)
    }
}
