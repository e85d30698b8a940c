// Wires one connection together: config, session client, cache and index.

use std::sync::Arc;

use tracing::info;

use crate::cache::DiskCache;
use crate::config::GlobalConfig;
use crate::error::{FsError, FsResult};
use crate::index::{CarefulMode, ConflictHandler, IndexOptions, RemoteFs};
use crate::session::{ConnectionInfo, HttpTransport, ReqwestTransport, SessionClient};

/// A ready-to-use filesystem for one remote host.
pub struct FsContext<T: HttpTransport + 'static = ReqwestTransport> {
    config: GlobalConfig,
    fs: RemoteFs<T>,
}

impl FsContext<ReqwestTransport> {
    /// Connect over HTTP. No request is made until the first operation.
    pub fn connect(config: GlobalConfig, connection: ConnectionInfo) -> FsResult<Self> {
        let transport = ReqwestTransport::new(connection.url().clone())
            .map_err(|e| FsError::Config(e.to_string()))?;
        Self::with_transport(config, connection, transport)
    }
}

impl<T: HttpTransport + 'static> FsContext<T> {
    pub fn with_transport(
        config: GlobalConfig,
        connection: ConnectionInfo,
        transport: T,
    ) -> FsResult<Self> {
        let options = index_options(&config)?;
        let cache_root = config.resolved_cache_dir().map_err(|e| FsError::Config(e.to_string()))?;
        let cache = DiskCache::new(&cache_root, connection.host())?;
        info!(
            host = connection.host(),
            login = connection.login(),
            cache = %cache_root.display(),
            careful = options.careful_mode.enabled,
            "filesystem context ready"
        );

        let client = SessionClient::new(connection, transport).with_retry_policy(config.retry.policy());
        let fs = RemoteFs::new(client, cache, options);
        Ok(Self { config, fs })
    }

    pub fn with_conflict_handler(mut self, handler: Arc<dyn ConflictHandler>) -> Self {
        self.fs = self.fs.with_conflict_handler(handler);
        self
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    pub fn fs(&self) -> &RemoteFs<T> {
        &self.fs
    }

    pub fn host(&self) -> &str {
        self.fs.host()
    }
}

/// Index options derived from the global config.
pub fn index_options(config: &GlobalConfig) -> FsResult<IndexOptions> {
    let schema_types =
        config.schema_types.resolve().map_err(|e| FsError::Config(e.to_string()))?;
    Ok(IndexOptions {
        careful_mode: CarefulMode {
            enabled: config.careful_mode.enabled,
            verify_after: config.careful_mode.verify_after(),
        },
        schema_types,
        debounce: config.notifications.debounce(),
    })
}
