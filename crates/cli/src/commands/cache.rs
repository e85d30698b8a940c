// `creatio-fs cache-package | clear-cache`: manage the local body cache.

use clap::Args;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use creatio_fs::{CacheScope, SchemaFileSystem};

use crate::connect::{self, ConnectArgs};
use crate::output::{self, OutputFormat};

// ── cache-package ──────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CachePackageArgs {
    /// Package whose schema bodies should be downloaded.
    pub package: String,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachePackageResult {
    pub package: String,
    pub fetched: usize,
    pub skipped: usize,
    #[serde(default)]
    pub cancelled: bool,
}

pub fn run_cache_package(args: CachePackageArgs, connect: &ConnectArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let result = connect::block_on(async {
        let context = connect.open()?;
        let cancel = connect::cancel_on_ctrl_c();
        cache_package(context.fs(), &args.package, &cancel).await
    });
    if let Ok(report) = &result {
        if report.cancelled {
            output::print_warning(format, "CANCELLED", "stopped before every body was downloaded");
        }
    }
    output::finish(format, result, format_cache_package)
}

pub async fn cache_package(
    fs: &dyn SchemaFileSystem,
    package: &str,
    cancel: &CancellationToken,
) -> anyhow::Result<CachePackageResult> {
    let report = fs.cache_package(package, cancel).await?;
    Ok(CachePackageResult {
        package: package.to_string(),
        fetched: report.fetched,
        skipped: report.skipped,
        cancelled: report.cancelled,
    })
}

fn format_cache_package(result: &CachePackageResult) -> String {
    let mut line = format!(
        "{}: {} downloaded, {} already cached or not downloadable",
        result.package, result.fetched, result.skipped
    );
    if result.cancelled {
        line.push_str(" (cancelled)");
    }
    line
}

// ── clear-cache ────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ClearCacheArgs {
    /// Only drop entries belonging to this package.
    #[arg(long)]
    package: Option<String>,

    /// Only drop the entry for this schema path.
    #[arg(long, conflicts_with = "package")]
    path: Option<String>,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearCacheResult {
    pub scope: String,
}

pub fn run_clear_cache(args: ClearCacheArgs, connect: &ConnectArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let result = connect::block_on(async {
        let context = connect.open()?;
        let scope = scope_for(context.host(), args.package.as_deref(), args.path.as_deref())?;
        clear_cache(context.fs(), scope).await
    });
    output::finish(format, result, |result: &ClearCacheResult| format!("Cleared {}.", result.scope))
}

pub async fn clear_cache(fs: &dyn SchemaFileSystem, scope: CacheScope) -> anyhow::Result<ClearCacheResult> {
    fs.clear_cache(&scope).await?;
    Ok(ClearCacheResult { scope: describe(&scope) })
}

fn scope_for(host: &str, package: Option<&str>, path: Option<&str>) -> anyhow::Result<CacheScope> {
    match (package, path) {
        (Some(package), _) => Ok(CacheScope::Package(package.to_string())),
        (None, Some(path)) => Ok(CacheScope::File(connect::resolve_path(host, path)?)),
        (None, None) => Ok(CacheScope::All),
    }
}

fn describe(scope: &CacheScope) -> String {
    match scope {
        CacheScope::All => "the whole cache".to_string(),
        CacheScope::Package(package) => format!("package {package}"),
        CacheScope::File(path) => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: &str = "crm.example.com";

    #[test]
    fn scope_follows_flags() {
        assert_eq!(scope_for(HOST, None, None).unwrap(), CacheScope::All);
        assert_eq!(
            scope_for(HOST, Some("Custom"), None).unwrap(),
            CacheScope::Package("Custom".into())
        );
        match scope_for(HOST, None, Some("Custom/UsrSync.cs")).unwrap() {
            CacheScope::File(path) => {
                assert_eq!(path.to_string(), "creatio:/crm.example.com/Custom/UsrSync.cs");
            }
            other => panic!("unexpected scope {other:?}"),
        }
    }

    #[test]
    fn cache_package_summary_mentions_cancellation() {
        let result = CachePackageResult {
            package: "Custom".into(),
            fetched: 3,
            skipped: 1,
            cancelled: true,
        };
        let line = format_cache_package(&result);
        assert!(line.starts_with("Custom: 3 downloaded, 1 already cached"));
        assert!(line.ends_with("(cancelled)"));
    }

    #[test]
    fn describe_names_the_scope() {
        assert_eq!(describe(&CacheScope::All), "the whole cache");
        assert_eq!(describe(&CacheScope::Package("NUI".into())), "package NUI");
    }
}
