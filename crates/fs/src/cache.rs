// Disk cache: one metadata record per remote item, plus its body when known.
//
// Layout under `<cache_root>/<host>/`:
//   metadata/<package>/<name><ext>.metadata.json   file snapshot minus body
//   data/<package>/<name><ext>                     body text
//
// Metadata is always written before the body and removed after it, so a body
// never exists without its record. Each artifact is replaced atomically.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

use creatio_fs_common::path::{validate_component, PathKind, VirtualPath};
use creatio_fs_common::types::File;

use crate::error::{FsError, FsResult};

const METADATA_DIR: &str = "metadata";
const DATA_DIR: &str = "data";
const METADATA_SUFFIX: &str = ".metadata.json";

/// What to drop from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheScope {
    All,
    Package(String),
    File(VirtualPath),
}

/// On-disk metadata record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct MetadataRecord {
    #[serde(flatten)]
    file: File,
    #[serde(default)]
    body_sha256: Option<String>,
    #[serde(default)]
    verified_at: Option<DateTime<Utc>>,
}

/// A cached file together with the last time its body was confirmed
/// against the server.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub file: File,
    pub verified_at: Option<DateTime<Utc>>,
}

/// Per-host disk cache.
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    /// Cache for `host` under `cache_root`. Directories are created lazily.
    pub fn new(cache_root: impl AsRef<Path>, host: &str) -> FsResult<Self> {
        validate_component(host).map_err(|e| FsError::cache("invalid cache host", e))?;
        Ok(Self { root: cache_root.as_ref().join(host) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ── Reads ──────────────────────────────────────────────────────

    pub async fn read(&self, path: &VirtualPath) -> FsResult<Option<File>> {
        Ok(self.read_entry(path).await?.map(|entry| entry.file))
    }

    /// Load the metadata record and overlay the body file if it is present
    /// and matches the recorded hash.
    pub async fn read_entry(&self, path: &VirtualPath) -> FsResult<Option<CacheEntry>> {
        let (package, file_name) = file_components(path)?;
        self.read_parts(package, file_name).await
    }

    async fn read_parts(&self, package: &str, file_name: &str) -> FsResult<Option<CacheEntry>> {
        let Some(record) = self.read_record(package, file_name).await? else {
            return Ok(None);
        };
        let MetadataRecord { mut file, body_sha256, verified_at } = record;

        let body = match read_optional(&self.body_path(package, file_name)).await? {
            Some(body) if body.is_empty() => None,
            Some(body) => match &body_sha256 {
                Some(expected) if *expected == sha256_hex(&body) => Some(body),
                _ => {
                    warn!(package, file = file_name, "cached body does not match its record, ignoring");
                    None
                }
            },
            None => None,
        };

        match (file.schema.as_mut(), body) {
            (Some(schema), Some(body)) => schema.body = body,
            (Some(schema), None) => schema.body.clear(),
            (None, Some(_)) => {
                warn!(package, file = file_name, "cached body has no schema record, ignoring");
            }
            (None, None) => {}
        }

        Ok(Some(CacheEntry { file, verified_at }))
    }

    async fn read_record(&self, package: &str, file_name: &str) -> FsResult<Option<MetadataRecord>> {
        let path = self.metadata_path(package, file_name);
        let Some(raw) = read_optional(&path).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(error) => {
                warn!(path = %path.display(), %error, "unreadable cache record, treating as missing");
                Ok(None)
            }
        }
    }

    // ── Writes ─────────────────────────────────────────────────────

    /// Persist `file`: metadata first, then the body. An empty body removes
    /// any previously cached body but keeps the metadata.
    pub async fn write(&self, file: &File) -> FsResult<()> {
        let verified_at = file.is_loaded().then(Utc::now);
        self.write_with(file, verified_at).await
    }

    async fn write_with(&self, file: &File, verified_at: Option<DateTime<Utc>>) -> FsResult<()> {
        let (package, file_name) = item_components(file)?;
        let file_name = file_name.as_str();
        let body = file.body();
        let record = MetadataRecord {
            file: file.without_body(),
            body_sha256: body.map(sha256_hex),
            verified_at,
        };
        let encoded = serde_json::to_vec_pretty(&record)
            .map_err(|e| FsError::cache("failed to encode cache record", e))?;

        write_atomic(&self.metadata_path(package, file_name), &encoded).await?;
        let body_path = self.body_path(package, file_name);
        match body {
            Some(body) => write_atomic(&body_path, body.as_bytes()).await?,
            None => remove_optional(&body_path).await?,
        }
        debug!(package, file = file_name, loaded = body.is_some(), "cached");
        Ok(())
    }

    /// Persist a possibly metadata-only snapshot without losing a body that
    /// is already cached. Returns the merged file.
    pub async fn update(&self, file: &File) -> FsResult<File> {
        if file.is_loaded() {
            self.write(file).await?;
            return Ok(file.clone());
        }

        let (package, file_name) = item_components(file)?;
        let previous = self.read_parts(package, &file_name).await?;
        let Some(CacheEntry { file: cached, verified_at }) =
            previous.filter(|entry| entry.file.is_loaded())
        else {
            self.write_with(file, None).await?;
            return Ok(file.clone());
        };

        let mut merged = file.clone();
        if merged.schema.is_none() {
            merged.schema = cached.schema;
        } else if let (Some(schema), Some(cached_schema)) = (merged.schema.as_mut(), cached.schema) {
            schema.body = cached_schema.body;
        }
        self.write_with(&merged, verified_at).await?;
        Ok(merged)
    }

    /// Persist `file` keeping the previously recorded verification time.
    /// For metadata changes (flags) that say nothing about the body.
    pub async fn rewrite(&self, file: &File) -> FsResult<()> {
        let (package, file_name) = item_components(file)?;
        let verified_at = match self.read_record(package, &file_name).await? {
            Some(record) if file.is_loaded() => record.verified_at,
            _ => None,
        };
        self.write_with(file, verified_at).await
    }

    /// Record that the cached body was just confirmed against the server.
    pub async fn mark_verified(&self, path: &VirtualPath) -> FsResult<()> {
        self.mark_verified_at(path, Utc::now()).await
    }

    pub async fn mark_verified_at(&self, path: &VirtualPath, at: DateTime<Utc>) -> FsResult<()> {
        let (package, file_name) = file_components(path)?;
        let Some(mut record) = self.read_record(package, file_name).await? else {
            return Err(FsError::NotFound(path.to_string()));
        };
        record.verified_at = Some(at);
        let encoded = serde_json::to_vec_pretty(&record)
            .map_err(|e| FsError::cache("failed to encode cache record", e))?;
        write_atomic(&self.metadata_path(package, file_name), &encoded).await
    }

    /// Remove cached artifacts in `scope`. Bodies go before metadata.
    pub async fn clear(&self, scope: &CacheScope) -> FsResult<()> {
        match scope {
            CacheScope::All => {
                remove_dir_optional(&self.root.join(DATA_DIR)).await?;
                remove_dir_optional(&self.root.join(METADATA_DIR)).await?;
            }
            CacheScope::Package(package) => {
                validate_component(package).map_err(|e| FsError::cache("invalid package", e))?;
                remove_dir_optional(&self.root.join(DATA_DIR).join(package)).await?;
                remove_dir_optional(&self.root.join(METADATA_DIR).join(package)).await?;
            }
            CacheScope::File(path) => {
                let (package, file_name) = file_components(path)?;
                remove_optional(&self.body_path(package, file_name)).await?;
                remove_optional(&self.metadata_path(package, file_name)).await?;
            }
        }
        debug!(root = %self.root.display(), ?scope, "cache cleared");
        Ok(())
    }

    // ── Layout ─────────────────────────────────────────────────────

    fn metadata_path(&self, package: &str, file_name: &str) -> PathBuf {
        self.root.join(METADATA_DIR).join(package).join(format!("{file_name}{METADATA_SUFFIX}"))
    }

    fn body_path(&self, package: &str, file_name: &str) -> PathBuf {
        self.root.join(DATA_DIR).join(package).join(file_name)
    }
}

fn file_components(path: &VirtualPath) -> FsResult<(&str, &str)> {
    match (path.kind(), path.package_name(), path.file_name()) {
        (PathKind::File, Some(package), Some(file_name)) => Ok((package, file_name)),
        _ => Err(FsError::cache("cache entries are files", path)),
    }
}

/// Package and file name of `file`, checked so that server-supplied names
/// cannot escape the cache root.
fn item_components(file: &File) -> FsResult<(&str, String)> {
    let item = &file.workspace_item;
    let file_name = item.file_name();
    validate_component(&item.package_name).map_err(|e| FsError::cache("invalid package name", e))?;
    validate_component(&file_name).map_err(|e| FsError::cache("invalid item name", e))?;
    Ok((item.package_name.as_str(), file_name))
}

pub(crate) fn sha256_hex(body: &str) -> String {
    format!("{:x}", Sha256::digest(body.as_bytes()))
}

async fn read_optional(path: &Path) -> FsResult<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
        Err(error) => Err(FsError::cache(&format!("failed to read `{}`", path.display()), error)),
    }
}

/// Write to a sibling temp file, then rename over the target.
async fn write_atomic(path: &Path, contents: &[u8]) -> FsResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| FsError::Cache(format!("`{}` has no parent directory", path.display())))?;
    tokio::fs::create_dir_all(parent).await.map_err(|e| {
        FsError::cache(&format!("failed to create cache directory `{}`", parent.display()), e)
    })?;

    let file_name = path.file_name().and_then(|name| name.to_str()).unwrap_or("entry");
    let tmp_path = parent.join(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));
    tokio::fs::write(&tmp_path, contents).await.map_err(|e| {
        FsError::cache(&format!("failed to write temp file `{}`", tmp_path.display()), e)
    })?;
    if let Err(error) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(FsError::cache(
            &format!("failed to move `{}` into place", path.display()),
            error,
        ));
    }
    Ok(())
}

async fn remove_optional(path: &Path) -> FsResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
        Err(error) => Err(FsError::cache(&format!("failed to remove `{}`", path.display()), error)),
    }
}

async fn remove_dir_optional(path: &Path) -> FsResult<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
        Err(error) => Err(FsError::cache(&format!("failed to remove `{}`", path.display()), error)),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use creatio_fs_common::types::{Schema, SchemaRef, SchemaType, WorkspaceItem};
    use proptest::prelude::*;
    use tempfile::TempDir;

    use super::*;

    const HOST: &str = "crm.example.com";

    fn item(package: &str, name: &str, kind: SchemaType) -> WorkspaceItem {
        WorkspaceItem {
            id: Uuid::new_v4(),
            u_id: Uuid::new_v4(),
            name: name.to_string(),
            package_name: package.to_string(),
            package_u_id: Uuid::new_v4(),
            schema_type: kind,
            is_changed: false,
            is_locked: false,
            is_read_only: false,
            title: Some(format!("{name} title")),
            modified_on: None,
        }
    }

    fn loaded(item: WorkspaceItem, body: &str) -> File {
        let schema = Schema {
            u_id: item.u_id,
            name: item.name.clone(),
            body: body.to_string(),
            parent: Some(SchemaRef { u_id: Uuid::new_v4(), name: "BasePage".into() }),
            ..Default::default()
        };
        File::with_schema(item, schema)
    }

    fn path_of(file: &File) -> VirtualPath {
        VirtualPath::for_item(HOST, &file.workspace_item)
    }

    fn cache(dir: &TempDir) -> DiskCache {
        DiskCache::new(dir.path(), HOST).unwrap()
    }

    #[tokio::test]
    async fn round_trip_preserves_item_and_body() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let file = loaded(item("Custom", "AccountPageV2", SchemaType::ClientUnit), "define([], {});");

        cache.write(&file).await.expect("write should succeed");
        let back = cache.read(&path_of(&file)).await.unwrap().expect("entry should exist");
        assert_eq!(back, file);
        assert!(back.is_loaded());
    }

    #[tokio::test]
    async fn layout_matches_metadata_and_data_dirs() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let file = loaded(item("Custom", "UsrSync", SchemaType::SourceCode), "class UsrSync {}");
        cache.write(&file).await.unwrap();

        let host_root = dir.path().join(HOST);
        assert!(host_root.join("metadata/Custom/UsrSync.cs.metadata.json").exists());
        let body = std::fs::read_to_string(host_root.join("data/Custom/UsrSync.cs")).unwrap();
        assert_eq!(body, "class UsrSync {}");

        let record = std::fs::read_to_string(host_root.join("metadata/Custom/UsrSync.cs.metadata.json"))
            .unwrap();
        assert!(!record.contains("class UsrSync {}"), "metadata must not embed the body");
    }

    #[tokio::test]
    async fn metadata_only_entry_is_not_loaded() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let file = File::new(item("Custom", "Seed", SchemaType::Data));
        cache.write(&file).await.unwrap();

        let back = cache.read(&path_of(&file)).await.unwrap().unwrap();
        assert_eq!(back, file);
        assert!(!back.is_loaded());
    }

    #[tokio::test]
    async fn empty_body_removes_previous_body_but_keeps_metadata() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let file = loaded(item("Custom", "UsrQuery", SchemaType::SqlScript), "select 1");
        cache.write(&file).await.unwrap();

        cache.write(&file.without_body()).await.unwrap();
        assert!(!dir.path().join(HOST).join("data/Custom/UsrQuery.sql").exists());
        let back = cache.read(&path_of(&file)).await.unwrap().unwrap();
        assert!(!back.is_loaded());
        assert_eq!(back.parent_u_id(), file.parent_u_id());
    }

    #[tokio::test]
    async fn missing_entry_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let path = VirtualPath::parse("creatio:/crm.example.com/Custom/Nope.js").unwrap();
        assert_eq!(cache(&dir).read(&path).await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_keeps_cached_body_for_metadata_only_snapshot() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let file = loaded(item("Custom", "AccountPageV2", SchemaType::ClientUnit), "body v1");
        cache.write(&file).await.unwrap();

        let mut listing = File::new(file.workspace_item.clone());
        listing.workspace_item.is_changed = true;
        let merged = cache.update(&listing).await.unwrap();

        assert_eq!(merged.body(), Some("body v1"));
        assert!(merged.workspace_item.is_changed);
        let back = cache.read(&path_of(&file)).await.unwrap().unwrap();
        assert_eq!(back, merged);
    }

    #[tokio::test]
    async fn update_without_previous_body_stores_metadata() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let listing = File::new(item("Custom", "Fresh", SchemaType::ClientUnit));

        let merged = cache.update(&listing).await.unwrap();
        assert_eq!(merged, listing);
        assert!(cache.read(&path_of(&listing)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn tampered_body_is_not_served() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let file = loaded(item("Custom", "UsrSync", SchemaType::SourceCode), "original");
        cache.write(&file).await.unwrap();

        std::fs::write(dir.path().join(HOST).join("data/Custom/UsrSync.cs"), "edited elsewhere")
            .unwrap();
        let back = cache.read(&path_of(&file)).await.unwrap().unwrap();
        assert!(!back.is_loaded());
    }

    #[tokio::test]
    async fn mark_verified_refreshes_timestamp_only() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let file = loaded(item("Custom", "UsrSync", SchemaType::SourceCode), "class A {}");
        cache.write(&file).await.unwrap();
        let path = path_of(&file);

        let long_ago = Utc::now() - Duration::hours(2);
        cache.mark_verified_at(&path, long_ago).await.unwrap();
        let entry = cache.read_entry(&path).await.unwrap().unwrap();
        assert_eq!(entry.verified_at, Some(long_ago));
        assert_eq!(entry.file, file);

        cache.mark_verified(&path).await.unwrap();
        let entry = cache.read_entry(&path).await.unwrap().unwrap();
        assert!(entry.verified_at.unwrap() > long_ago);
    }

    #[tokio::test]
    async fn rewrite_keeps_verification_time() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let file = loaded(item("Custom", "UsrSync", SchemaType::SourceCode), "class A {}");
        cache.write(&file).await.unwrap();
        let path = path_of(&file);
        let long_ago = Utc::now() - Duration::hours(2);
        cache.mark_verified_at(&path, long_ago).await.unwrap();

        let mut locked = file.clone();
        locked.workspace_item.is_locked = true;
        cache.rewrite(&locked).await.unwrap();

        let entry = cache.read_entry(&path).await.unwrap().unwrap();
        assert_eq!(entry.verified_at, Some(long_ago));
        assert!(entry.file.workspace_item.is_locked);
        assert_eq!(entry.file.body(), Some("class A {}"));
    }

    #[tokio::test]
    async fn rewrite_without_body_drops_verification_time() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let file = loaded(item("Custom", "UsrSync", SchemaType::SourceCode), "class A {}");
        cache.write(&file).await.unwrap();

        cache.rewrite(&file.without_body()).await.unwrap();
        let entry = cache.read_entry(&path_of(&file)).await.unwrap().unwrap();
        assert_eq!(entry.verified_at, None);
        assert!(!entry.file.is_loaded());
    }

    #[tokio::test]
    async fn clear_scopes() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let a = loaded(item("Custom", "A", SchemaType::ClientUnit), "a");
        let b = loaded(item("Custom", "B", SchemaType::ClientUnit), "b");
        let c = loaded(item("Base", "C", SchemaType::ClientUnit), "c");
        for file in [&a, &b, &c] {
            cache.write(file).await.unwrap();
        }

        cache.clear(&CacheScope::File(path_of(&a))).await.unwrap();
        assert!(cache.read(&path_of(&a)).await.unwrap().is_none());
        assert!(cache.read(&path_of(&b)).await.unwrap().is_some());

        cache.clear(&CacheScope::Package("Custom".into())).await.unwrap();
        assert!(cache.read(&path_of(&b)).await.unwrap().is_none());
        assert!(cache.read(&path_of(&c)).await.unwrap().is_some());

        cache.clear(&CacheScope::All).await.unwrap();
        assert!(cache.read(&path_of(&c)).await.unwrap().is_none());
        // Clearing an empty cache is fine.
        cache.clear(&CacheScope::All).await.unwrap();
    }

    #[tokio::test]
    async fn server_names_cannot_escape_the_root() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let file = loaded(item("..", "Evil", SchemaType::ClientUnit), "x");
        assert!(matches!(cache.write(&file).await, Err(FsError::Cache(_))));
    }

    #[tokio::test]
    async fn no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        let file = loaded(item("Custom", "A", SchemaType::ClientUnit), "a");
        cache.write(&file).await.unwrap();
        cache.write(&file).await.unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join(HOST).join("data/Custom"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    proptest! {
        #[test]
        fn any_body_survives_the_cache(body in "\\PC{1,200}", name in "[A-Za-z][A-Za-z0-9_]{0,30}") {
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let dir = TempDir::new().unwrap();
            let cache = cache(&dir);
            let file = loaded(item("Custom", &name, SchemaType::SourceCode), &body);
            let back = runtime.block_on(async {
                cache.write(&file).await.unwrap();
                cache.read(&path_of(&file)).await.unwrap()
            });
            prop_assert_eq!(back, Some(file));
        }
    }
}
