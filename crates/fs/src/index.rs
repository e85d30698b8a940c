// Virtual index: the in-memory directory and file table for one connection.
//
// Built from the package and workspace-item listings, merged with the disk
// cache, and kept current by every mutating operation. All server traffic
// goes through the connection's request queue. The state mutex is never held
// across an await point. A reload holds the mutation lock exclusively from its
// first listing call until the new table is swapped in; every other mutator
// holds it shared, so a finished write is never replaced by an older listing.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{oneshot, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use creatio_fs_common::path::{PathKind, VirtualPath};
use creatio_fs_common::protocol::{BuildResponse, PackageChange};
use creatio_fs_common::types::{
    Directory, File, PackageMetaInfo, Schema, SchemaRef, SchemaType, WorkspaceItem,
};

use crate::cache::{CacheScope, DiskCache};
use crate::error::{FsError, FsResult};
use crate::notify::{ChangeKind, ChangeNotifier, ChangeSubscription, DebounceConfig};
use crate::queue::{QueueError, RequestQueue};
use crate::session::{HttpTransport, SessionClient};

// ── Options ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarefulMode {
    pub enabled: bool,
    /// Cached bodies verified longer ago than this are re-checked.
    pub verify_after: Duration,
}

impl Default for CarefulMode {
    fn default() -> Self {
        Self { enabled: false, verify_after: Duration::from_secs(300) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOptions {
    pub careful_mode: CarefulMode,
    /// Kinds listed in the tree; others are left out of the index.
    pub schema_types: Vec<SchemaType>,
    pub debounce: DebounceConfig,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            careful_mode: CarefulMode::default(),
            schema_types: SchemaType::EDITABLE.to_vec(),
            debounce: DebounceConfig::default(),
        }
    }
}

/// Flags for `write_file`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Create the schema if the path is not indexed.
    pub create: bool,
    /// Replace the body of an existing schema.
    pub overwrite: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { create: false, overwrite: true }
    }
}

// ── Conflicts ──────────────────────────────────────────────────────

/// A cached body that no longer matches the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub path: VirtualPath,
    pub cached: File,
    pub remote: File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    KeepLocal,
    TakeRemote,
}

/// Decides what happens when careful mode finds a diverged body.
#[async_trait]
pub trait ConflictHandler: Send + Sync {
    async fn resolve(&self, conflict: &Conflict) -> ConflictResolution;
}

/// Keeps the cached body and logs the divergence.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeepLocalHandler;

#[async_trait]
impl ConflictHandler for KeepLocalHandler {
    async fn resolve(&self, conflict: &Conflict) -> ConflictResolution {
        warn!(path = %conflict.path, "cached body differs from the server, keeping local copy");
        ConflictResolution::KeepLocal
    }
}

/// Result of a careful-mode comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Unchanged,
    KeptLocal,
    TookRemote,
}

// ── Listing types ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub path: VirtualPath,
    pub kind: EntryKind,
    pub is_read_only: bool,
    pub is_changed: bool,
    pub is_locked: bool,
}

/// What a path resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Root { packages: usize },
    Directory(Directory),
    File(File),
}

impl Entry {
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Root { .. } | Self::Directory(_) => EntryKind::Directory,
            Self::File(_) => EntryKind::File,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReloadSummary {
    pub packages: usize,
    pub files: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CachePackageReport {
    pub fetched: usize,
    pub skipped: usize,
    pub cancelled: bool,
}

// ── State ──────────────────────────────────────────────────────────

#[derive(Default)]
struct IndexState {
    loaded: bool,
    directories: BTreeMap<String, Directory>,
    files: BTreeMap<VirtualPath, File>,
    by_uid: HashMap<Uuid, VirtualPath>,
    verifying: HashSet<VirtualPath>,
}

impl IndexState {
    fn insert_file(&mut self, path: VirtualPath, file: File) {
        self.by_uid.insert(file.u_id(), path.clone());
        self.files.insert(path, file);
    }

    fn is_read_only(&self, file: &File) -> bool {
        file.workspace_item.is_read_only
            || self
                .directories
                .get(&file.workspace_item.package_name)
                .is_some_and(Directory::is_read_only)
    }
}

type ReloadWaiters = Vec<oneshot::Sender<FsResult<ReloadSummary>>>;

struct Inner<T: HttpTransport> {
    host: String,
    client: Arc<SessionClient<T>>,
    queue: RequestQueue,
    cache: DiskCache,
    options: IndexOptions,
    conflicts: Arc<dyn ConflictHandler>,
    notifier: ChangeNotifier,
    state: Mutex<IndexState>,
    mutation: RwLock<()>,
    /// `Some` while a reload is in flight; every caller that joins waits here.
    reload: Mutex<Option<ReloadWaiters>>,
}

/// Filesystem view of one remote connection. Clones share the same index.
pub struct RemoteFs<T: HttpTransport> {
    inner: Arc<Inner<T>>,
}

impl<T: HttpTransport> Clone for RemoteFs<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T: HttpTransport + 'static> RemoteFs<T> {
    /// Must be called within a tokio runtime (the change pump is spawned).
    pub fn new(client: SessionClient<T>, cache: DiskCache, options: IndexOptions) -> Self {
        let host = client.connection().host().to_string();
        let notifier = ChangeNotifier::spawn(options.debounce);
        Self {
            inner: Arc::new(Inner {
                host,
                client: Arc::new(client),
                queue: RequestQueue::new(),
                cache,
                options,
                conflicts: Arc::new(KeepLocalHandler),
                notifier,
                state: Mutex::new(IndexState::default()),
                mutation: RwLock::new(()),
                reload: Mutex::new(None),
            }),
        }
    }

    /// Replace the conflict handler. Only valid before the index is shared.
    pub fn with_conflict_handler(mut self, handler: Arc<dyn ConflictHandler>) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.conflicts = handler,
            None => warn!("conflict handler ignored: index already shared"),
        }
        self
    }

    pub fn host(&self) -> &str {
        &self.inner.host
    }

    pub fn root(&self) -> VirtualPath {
        VirtualPath::root(self.inner.host.clone())
    }

    pub fn client(&self) -> &SessionClient<T> {
        &self.inner.client
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.inner.queue
    }

    pub fn cache(&self) -> &DiskCache {
        &self.inner.cache
    }

    pub fn subscribe(&self, prefix: Option<VirtualPath>) -> ChangeSubscription {
        self.inner.notifier.subscribe(prefix)
    }

    fn state(&self) -> MutexGuard<'_, IndexState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, kind: ChangeKind, path: VirtualPath) {
        self.inner.notifier.emit(kind, path);
    }

    /// Run `task` against the session client through the request queue.
    async fn remote<R, F, Fut>(&self, task: F) -> FsResult<R>
    where
        R: Send + 'static,
        F: FnOnce(Arc<SessionClient<T>>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = FsResult<R>> + Send + 'static,
    {
        let client = Arc::clone(&self.inner.client);
        self.inner.queue.enqueue(move || task(client)).await
    }

    // ── Reload ──────────────────────────────────────────────────────

    /// Rebuild the index from the server. Concurrent callers share one
    /// in-flight reload and all receive its result.
    pub async fn reload(&self) -> FsResult<ReloadSummary> {
        let (tx, rx) = oneshot::channel();
        let leader = {
            let mut slot = self.inner.reload.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_mut() {
                Some(waiters) => {
                    waiters.push(tx);
                    false
                }
                None => {
                    *slot = Some(vec![tx]);
                    true
                }
            }
        };

        if leader {
            let this = self.clone();
            tokio::spawn(async move {
                let worker = this.clone();
                let result = match tokio::spawn(async move { worker.reload_now().await }).await {
                    Ok(result) => result,
                    Err(error) => Err(QueueError::Aborted(error.to_string()).into()),
                };
                let waiters = this
                    .inner
                    .reload
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take()
                    .unwrap_or_default();
                for waiter in waiters {
                    let _ = waiter.send(result.clone());
                }
            });
        } else {
            debug!(host = self.host(), "joining in-flight reload");
        }

        rx.await.unwrap_or_else(|_| Err(QueueError::Aborted("reload ended without a result".into()).into()))
    }

    async fn reload_now(&self) -> FsResult<ReloadSummary> {
        let _exclusive = self.inner.mutation.write().await;
        let packages = self.remote(|client| async move { client.get_packages().await }).await?;
        let items = self.remote(|client| async move { client.get_workspace_items().await }).await?;

        let mut directories = BTreeMap::new();
        for package in packages {
            if directories.contains_key(&package.name) {
                warn!(package = %package.name, "duplicate package in listing, keeping first");
                continue;
            }
            directories.insert(package.name.clone(), Directory::new(package));
        }

        let mut files: BTreeMap<VirtualPath, File> = BTreeMap::new();
        for item in items {
            if !self.inner.options.schema_types.contains(&item.schema_type) {
                continue;
            }
            if !directories.contains_key(&item.package_name) {
                warn!(item = %item.name, package = %item.package_name, "item in unlisted package, skipping");
                continue;
            }
            let path = VirtualPath::for_item(self.inner.host.clone(), &item);
            if files.contains_key(&path) {
                warn!(%path, "duplicate item in listing, keeping first");
                continue;
            }
            let merged = match self.inner.cache.update(&File::new(item)).await {
                Ok(merged) => merged,
                Err(error) => {
                    warn!(%path, %error, "skipping unusable item");
                    continue;
                }
            };
            files.insert(path, merged);
        }

        let summary = ReloadSummary { packages: directories.len(), files: files.len() };
        let (created, changed, deleted) = {
            let mut state = self.state();
            let deleted: Vec<VirtualPath> =
                state.files.keys().filter(|path| !files.contains_key(*path)).cloned().collect();
            let mut created = Vec::new();
            let mut changed = Vec::new();
            for (path, file) in &files {
                match state.files.get(path) {
                    None => created.push(path.clone()),
                    Some(previous) if previous.workspace_item != file.workspace_item => {
                        changed.push(path.clone())
                    }
                    Some(_) => {}
                }
            }

            state.by_uid = files.iter().map(|(path, file)| (file.u_id(), path.clone())).collect();
            state.directories = directories;
            state.files = files;
            state.loaded = true;
            (created, changed, deleted)
        };

        for path in deleted {
            self.emit(ChangeKind::Deleted, path);
        }
        for path in created {
            self.emit(ChangeKind::Created, path);
        }
        for path in changed {
            self.emit(ChangeKind::Changed, path);
        }
        info!(host = self.host(), packages = summary.packages, files = summary.files, "index reloaded");
        Ok(summary)
    }

    async fn ensure_loaded(&self) -> FsResult<()> {
        if self.state().loaded {
            return Ok(());
        }
        self.reload().await.map(|_| ())
    }

    // ── Lookups ─────────────────────────────────────────────────────

    fn check_host(&self, path: &VirtualPath) -> FsResult<()> {
        if path.host() == self.inner.host {
            Ok(())
        } else {
            Err(FsError::NotFound(path.to_string()))
        }
    }

    fn indexed_file(&self, path: &VirtualPath) -> FsResult<File> {
        self.check_host(path)?;
        self.state().files.get(path).cloned().ok_or_else(|| FsError::NotFound(path.to_string()))
    }

    pub async fn stat(&self, path: &VirtualPath) -> FsResult<Entry> {
        self.check_host(path)?;
        self.ensure_loaded().await?;
        let state = self.state();
        match path.kind() {
            PathKind::Root => Ok(Entry::Root { packages: state.directories.len() }),
            PathKind::Package => path
                .package_name()
                .and_then(|name| state.directories.get(name))
                .cloned()
                .map(Entry::Directory)
                .ok_or_else(|| FsError::NotFound(path.to_string())),
            PathKind::File => state
                .files
                .get(path)
                .cloned()
                .map(Entry::File)
                .ok_or_else(|| FsError::NotFound(path.to_string())),
        }
    }

    pub async fn list_directory(&self, path: &VirtualPath) -> FsResult<Vec<DirEntry>> {
        self.check_host(path)?;
        self.ensure_loaded().await?;
        let state = self.state();
        match path.kind() {
            PathKind::Root => Ok(state
                .directories
                .values()
                .map(|dir| DirEntry {
                    name: dir.name().to_string(),
                    path: VirtualPath::package(self.inner.host.clone(), dir.name()),
                    kind: EntryKind::Directory,
                    is_read_only: dir.is_read_only(),
                    is_changed: false,
                    is_locked: false,
                })
                .collect()),
            PathKind::Package => {
                let name = path.package_name().unwrap_or_default();
                let Some(dir) = state.directories.get(name) else {
                    return Err(FsError::NotFound(path.to_string()));
                };
                Ok(state
                    .files
                    .iter()
                    .filter(|(_, file)| dir.contains(&file.workspace_item))
                    .map(|(file_path, file)| DirEntry {
                        name: file.workspace_item.file_name(),
                        path: file_path.clone(),
                        kind: EntryKind::File,
                        is_read_only: state.is_read_only(file),
                        is_changed: file.workspace_item.is_changed,
                        is_locked: file.workspace_item.is_locked,
                    })
                    .collect())
            }
            PathKind::File => Err(FsError::Unsupported(format!("`{path}` is not a directory"))),
        }
    }

    /// Path of the indexed schema with this uId.
    pub fn resolve_uid(&self, u_id: Uuid) -> Option<VirtualPath> {
        self.state().by_uid.get(&u_id).cloned()
    }

    pub fn package(&self, name: &str) -> Option<PackageMetaInfo> {
        self.state().directories.get(name).map(|dir| dir.package.clone())
    }

    // ── Reading ─────────────────────────────────────────────────────

    /// Return the file with its body, fetching and caching it if needed.
    ///
    /// With careful mode on and `silent` off, a cached body whose last
    /// verification is too old is compared with the server in the
    /// background.
    pub async fn get_file(&self, path: &VirtualPath, silent: bool) -> FsResult<File> {
        self.check_host(path)?;
        self.ensure_loaded().await?;
        let file = self.indexed_file(path)?;

        if file.is_loaded() {
            if !silent && self.inner.options.careful_mode.enabled {
                self.schedule_verification(path).await;
            }
            return Ok(file);
        }

        self.fetch_and_store(path, file.workspace_item).await
    }

    async fn fetch_and_store(&self, path: &VirtualPath, item: WorkspaceItem) -> FsResult<File> {
        let request = item.clone();
        let schema = self.remote(move |client| async move { client.get_schema(&request).await }).await?;
        let fetched = File::with_schema(item, schema);
        self.inner.cache.write(&fetched).await?;

        let mut state = self.state();
        let stored = match state.files.get_mut(path) {
            Some(current) => {
                current.schema = fetched.schema.clone();
                current.clone()
            }
            None => fetched,
        };
        debug!(%path, "body fetched");
        Ok(stored)
    }

    async fn schedule_verification(&self, path: &VirtualPath) {
        let threshold = self.inner.options.careful_mode.verify_after;
        let stale = match self.inner.cache.read_entry(path).await {
            Ok(Some(entry)) => match entry.verified_at {
                Some(at) => Utc::now()
                    .signed_duration_since(at)
                    .to_std()
                    .is_ok_and(|age| age >= threshold),
                None => true,
            },
            Ok(None) => true,
            Err(error) => {
                warn!(%path, %error, "could not read cache entry for verification");
                false
            }
        };
        if !stale || !self.state().verifying.insert(path.clone()) {
            return;
        }

        let this = self.clone();
        let path = path.clone();
        tokio::spawn(async move {
            if let Err(error) = this.verify_file(&path).await {
                warn!(%path, %error, "background verification failed");
            }
            this.state().verifying.remove(&path);
        });
    }

    /// Compare the cached body with the server's and, on divergence, let the
    /// conflict handler decide. Never overwrites silently.
    pub async fn verify_file(&self, path: &VirtualPath) -> FsResult<Verification> {
        let cached = self.indexed_file(path)?;
        if !cached.is_loaded() {
            return Ok(Verification::Unchanged);
        }

        let request = cached.workspace_item.clone();
        let schema = self.remote(move |client| async move { client.get_schema(&request).await }).await?;
        let remote = File::with_schema(cached.workspace_item.clone(), schema);

        if remote.body() == cached.body() {
            self.inner.cache.mark_verified(path).await?;
            return Ok(Verification::Unchanged);
        }

        let conflict = Conflict { path: path.clone(), cached, remote };
        match self.inner.conflicts.resolve(&conflict).await {
            ConflictResolution::KeepLocal => {
                self.inner.cache.mark_verified(path).await?;
                Ok(Verification::KeptLocal)
            }
            ConflictResolution::TakeRemote => {
                let _shared = self.inner.mutation.read().await;
                self.inner.cache.write(&conflict.remote).await?;
                if let Some(current) = self.state().files.get_mut(path) {
                    current.schema = conflict.remote.schema.clone();
                }
                self.emit(ChangeKind::Changed, path.clone());
                Ok(Verification::TookRemote)
            }
        }
    }

    // ── Writing ─────────────────────────────────────────────────────

    /// Save `content` as the body at `path`.
    ///
    /// On success the file is marked changed and locked, re-cached, and a
    /// change is announced. On failure the index is left untouched.
    pub async fn write_file(
        &self,
        path: &VirtualPath,
        content: String,
        options: WriteOptions,
    ) -> FsResult<File> {
        self.check_host(path)?;
        self.ensure_loaded().await?;
        if path.kind() != PathKind::File {
            return Err(FsError::Unsupported(format!("`{path}` is not a file")));
        }

        let _shared = self.inner.mutation.read().await;
        let existing = {
            let state = self.state();
            state.files.get(path).map(|file| (file.clone(), state.is_read_only(file)))
        };
        match existing {
            Some((file, read_only)) => {
                if !options.overwrite {
                    return Err(FsError::AlreadyExists(path.to_string()));
                }
                if read_only {
                    return Err(FsError::ReadOnly(path.to_string()));
                }
                self.overwrite(path, file, content).await
            }
            None if options.create => self.create(path, content).await,
            None => Err(FsError::NotFound(path.to_string())),
        }
    }

    async fn overwrite(&self, path: &VirtualPath, file: File, content: String) -> FsResult<File> {
        let loaded = match file.schema {
            Some(_) => file,
            None => self.fetch_and_store(path, file.workspace_item).await?,
        };
        let mut schema = loaded.schema.clone().unwrap_or_default();
        schema.body = content;

        let kind = loaded.schema_type();
        let to_save = schema.clone();
        self.remote(move |client| async move { client.save_schema(kind, &to_save).await }).await?;

        let mut item = loaded.workspace_item;
        item.is_changed = true;
        item.is_locked = true;
        let saved = File::with_schema(item, schema);
        self.inner.cache.write(&saved).await?;
        self.state().insert_file(path.clone(), saved.clone());
        self.emit(ChangeKind::Changed, path.clone());
        info!(%path, "schema saved");
        Ok(saved)
    }

    async fn create(&self, path: &VirtualPath, content: String) -> FsResult<File> {
        let (name, kind) = path
            .item()
            .map(|(name, kind)| (name.to_string(), kind))
            .ok_or_else(|| FsError::Unsupported(format!("`{path}` is not a file")))?;
        let package_name = path.package_name().unwrap_or_default().to_string();
        let package = self
            .package(&package_name)
            .ok_or_else(|| FsError::NotFound(format!("package `{package_name}`")))?;
        if package.is_read_only {
            return Err(FsError::ReadOnly(format!("package `{package_name}`")));
        }
        if !self.inner.options.schema_types.contains(&kind) || kind.designer().is_none() {
            return Err(FsError::Unsupported(format!("cannot create {kind} schemas")));
        }

        let u_id = Uuid::new_v4();
        let schema = Schema {
            u_id,
            name: name.clone(),
            body: content,
            package: Some(SchemaRef { u_id: package.u_id, name: package.name.clone() }),
            schema_type: Some(kind),
            ..Default::default()
        };
        let to_save = schema.clone();
        self.remote(move |client| async move { client.save_schema(kind, &to_save).await }).await?;

        let item = WorkspaceItem {
            id: Uuid::new_v4(),
            u_id,
            name,
            package_name: package.name.clone(),
            package_u_id: package.u_id,
            schema_type: kind,
            is_changed: true,
            is_locked: true,
            is_read_only: false,
            title: None,
            modified_on: None,
        };
        let created = File::with_schema(item, schema);
        self.inner.cache.write(&created).await?;
        self.state().insert_file(path.clone(), created.clone());
        self.emit(ChangeKind::Created, path.clone());
        info!(%path, "schema created");
        Ok(created)
    }

    // ── Source control ──────────────────────────────────────────────

    pub async fn lock(&self, path: &VirtualPath) -> FsResult<()> {
        self.flag_operation(path, SourceControl::Lock).await
    }

    pub async fn unlock(&self, path: &VirtualPath) -> FsResult<()> {
        self.flag_operation(path, SourceControl::Unlock).await
    }

    /// Revert local changes on the server and drop the cached body.
    pub async fn revert(&self, path: &VirtualPath) -> FsResult<()> {
        self.flag_operation(path, SourceControl::Revert).await
    }

    async fn flag_operation(&self, path: &VirtualPath, operation: SourceControl) -> FsResult<()> {
        self.check_host(path)?;
        self.ensure_loaded().await?;
        let _shared = self.inner.mutation.read().await;
        let file = self.indexed_file(path)?;

        let items = vec![file.workspace_item.clone()];
        self.remote(move |client| async move {
            match operation {
                SourceControl::Lock => client.lock(&items).await,
                SourceControl::Unlock => client.unlock(&items).await,
                SourceControl::Revert => client.revert(&items).await,
            }
        })
        .await?;

        let updated = {
            let mut state = self.state();
            let Some(current) = state.files.get_mut(path) else {
                return Ok(());
            };
            match operation {
                SourceControl::Lock => current.workspace_item.is_locked = true,
                SourceControl::Unlock => current.workspace_item.is_locked = false,
                SourceControl::Revert => {
                    current.workspace_item.is_changed = false;
                    current.workspace_item.is_locked = false;
                    *current = current.without_body();
                }
            }
            current.clone()
        };
        self.inner.cache.rewrite(&updated).await?;
        self.emit(ChangeKind::Changed, path.clone());
        debug!(%path, ?operation, "source control operation applied");
        Ok(())
    }

    pub async fn generate_changes(&self, package: &str) -> FsResult<Vec<PackageChange>> {
        let package = package.to_string();
        self.remote(move |client| async move { client.generate_changes(&package).await }).await
    }

    pub async fn build(&self) -> FsResult<BuildResponse> {
        self.remote(|client| async move { client.build().await }).await
    }

    pub async fn rebuild(&self) -> FsResult<BuildResponse> {
        self.remote(|client| async move { client.rebuild().await }).await
    }

    pub async fn select_query(&self, query: Value) -> FsResult<Value> {
        self.remote(move |client| async move { client.select_query(query).await }).await
    }

    // ── Bulk cache management ───────────────────────────────────────

    /// Fetch every unloaded body in `package`, checking `cancel` before each
    /// fetch.
    pub async fn cache_package(
        &self,
        package: &str,
        cancel: &CancellationToken,
    ) -> FsResult<CachePackageReport> {
        self.ensure_loaded().await?;
        let files: Vec<(VirtualPath, bool)> = {
            let state = self.state();
            if !state.directories.contains_key(package) {
                return Err(FsError::NotFound(format!("package `{package}`")));
            }
            state
                .files
                .iter()
                .filter(|(_, file)| file.workspace_item.package_name == package)
                .map(|(path, file)| {
                    let fetchable = !file.is_loaded() && file.schema_type().designer().is_some();
                    (path.clone(), fetchable)
                })
                .collect()
        };

        let mut report = CachePackageReport::default();
        for (path, fetchable) in files {
            if !fetchable {
                report.skipped += 1;
                continue;
            }
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            self.get_file(&path, true).await?;
            report.fetched += 1;
        }
        info!(package, fetched = report.fetched, skipped = report.skipped, cancelled = report.cancelled, "package cached");
        Ok(report)
    }

    /// Clear the disk cache in `scope` and drop the matching bodies from the
    /// index.
    pub async fn clear_cache(&self, scope: &CacheScope) -> FsResult<()> {
        let _shared = self.inner.mutation.read().await;
        self.inner.cache.clear(scope).await?;
        let cleared: Vec<VirtualPath> = {
            let mut state = self.state();
            let mut cleared = Vec::new();
            for (path, file) in state.files.iter_mut() {
                let in_scope = match scope {
                    CacheScope::All => true,
                    CacheScope::Package(package) => file.workspace_item.package_name == *package,
                    CacheScope::File(target) => path == target,
                };
                if in_scope && file.is_loaded() {
                    *file = file.without_body();
                    cleared.push(path.clone());
                }
            }
            cleared
        };
        for path in cleared {
            self.emit(ChangeKind::Changed, path);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceControl {
    Lock,
    Unlock,
    Revert,
}
