// Connection settings shared by every subcommand, and the glue that turns
// them into a live filesystem context.

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;

use creatio_fs::config::{global_config_path, GlobalConfig};
use creatio_fs::{ConnectionInfo, FsContext};
use creatio_fs_common::path::{VirtualPath, SCHEME};

#[derive(Debug, Clone, Default, Args)]
pub struct ConnectArgs {
    /// Platform base URL, e.g. https://crm.example.com.
    #[arg(long, global = true, env = "CREATIO_URL")]
    pub url: Option<String>,

    /// Login name.
    #[arg(long, global = true, env = "CREATIO_LOGIN")]
    pub login: Option<String>,

    /// Password. Never read from config files.
    #[arg(long, global = true, env = "CREATIO_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Config file (defaults to ~/.creatio-fs/config.toml).
    #[arg(long, global = true, env = "CREATIO_FS_CONFIG")]
    pub config: Option<PathBuf>,
}

impl ConnectArgs {
    /// Explicit `--config` must exist; the default file is optional.
    pub fn load_config(&self) -> Result<GlobalConfig> {
        match &self.config {
            Some(path) => load_config_file(path),
            None => match global_config_path() {
                Some(path) if path.exists() => load_config_file(&path),
                _ => Ok(GlobalConfig::default()),
            },
        }
    }

    /// Command-line values win over the config file.
    pub fn connection(&self, config: &GlobalConfig) -> Result<ConnectionInfo> {
        let url = self
            .url
            .clone()
            .or_else(|| config.connection.url.clone())
            .ok_or_else(|| anyhow!("no server URL: pass --url or set connection.url in the config"))?;
        let login = self
            .login
            .clone()
            .or_else(|| config.connection.login.clone())
            .ok_or_else(|| anyhow!("no login: pass --login or set connection.login in the config"))?;
        let password = self
            .password
            .clone()
            .ok_or_else(|| anyhow!("no password: set CREATIO_PASSWORD or pass --password"))?;
        Ok(ConnectionInfo::new(&url, login, password)?)
    }

    /// Must be called inside a tokio runtime.
    pub fn open(&self) -> Result<FsContext> {
        let config = self.load_config()?;
        let connection = self.connection(&config)?;
        Ok(FsContext::connect(config, connection)?)
    }
}

fn load_config_file(path: &Path) -> Result<GlobalConfig> {
    GlobalConfig::load_from(path).with_context(|| format!("failed to load config `{}`", path.display()))
}

/// Accept either a full `creatio:/host/...` path or one relative to the
/// connected host (`Package/Schema.js`, `/` for the root).
pub fn resolve_path(host: &str, input: &str) -> Result<VirtualPath> {
    let input = input.trim();
    if input.starts_with(&format!("{SCHEME}:")) {
        return Ok(VirtualPath::parse(input)?);
    }
    let relative = input.trim_matches('/');
    if relative.is_empty() {
        return Ok(VirtualPath::root(host));
    }
    Ok(VirtualPath::parse(&format!("{SCHEME}:/{host}/{relative}"))?)
}

/// Run a command future on a fresh current-thread runtime.
pub fn block_on<T, F>(future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    runtime.block_on(future)
}

/// Token cancelled on the first Ctrl-C. Must be called inside a runtime.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    token
}
