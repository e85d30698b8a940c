// `creatio-fs watch`: poll the server and stream change notifications.

use std::collections::HashSet;
use std::io::Write;
use std::time::Duration;

use clap::Args;
use serde::Serialize;
use tracing::warn;

use creatio_fs::{ChangeEvent, ChangeKind, EntryKind, SchemaFileSystem};
use creatio_fs_common::path::VirtualPath;

use crate::connect::{self, ConnectArgs};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Only report changes under this path (a package or schema).
    pub path: Option<String>,

    /// Seconds between reloads of the workspace listing.
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// Force JSON output (one object per line).
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize)]
struct EventLine {
    kind: &'static str,
    path: String,
}

impl From<&ChangeEvent> for EventLine {
    fn from(event: &ChangeEvent) -> Self {
        Self { kind: kind_label(event.kind), path: event.path.to_string() }
    }
}

pub fn run(args: WatchArgs, connect: &ConnectArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let result = connect::block_on(watch(args, format, connect));
    if let Err(error) = &result {
        output::print_anyhow_error(format, error);
    }
    result
}

async fn watch(args: WatchArgs, format: OutputFormat, connect: &ConnectArgs) -> anyhow::Result<()> {
    let context = connect.open()?;
    let fs = context.fs();
    let prefix = match &args.path {
        Some(path) => Some(connect::resolve_path(context.host(), path)?),
        None => None,
    };

    // Subscribe first so nothing between the reload and the loop is lost.
    let mut subscription = fs.subscribe(prefix.clone());
    let summary = fs.reload().await?;
    let mut listed = StartupListing::collect(fs).await?;
    eprintln!(
        "Watching {} ({} packages, {} schemas). Press Ctrl-C to stop.",
        prefix.as_ref().map(ToString::to_string).unwrap_or_else(|| fs.root().to_string()),
        summary.packages,
        summary.files
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval));
    // The first tick fires immediately; the listing is already fresh.
    ticker.tick().await;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = ticker.tick() => {
                if let Err(error) = fs.reload().await {
                    warn!(%error, "reload failed, retrying on the next tick");
                    output::print_warning(format, error.code(), &format!("reload failed: {error}"));
                }
            }
            batch = subscription.recv() => {
                let Some(batch) = batch else { break };
                let batch = listed.filter(batch);
                if !batch.is_empty() {
                    print_batch(&mut std::io::stdout().lock(), format, &batch)?;
                }
            }
        }
    }
    Ok(())
}

/// Paths already present when watching started. The first reload announces
/// each of them as created; those announcements are not news.
#[derive(Debug, Default)]
struct StartupListing {
    paths: HashSet<VirtualPath>,
}

impl StartupListing {
    async fn collect(fs: &dyn SchemaFileSystem) -> anyhow::Result<Self> {
        let mut paths = HashSet::new();
        for package in fs.list_directory(&fs.root()).await? {
            for entry in fs.list_directory(&package.path).await? {
                if entry.kind == EntryKind::File {
                    paths.insert(entry.path);
                }
            }
        }
        Ok(Self { paths })
    }

    fn filter(&mut self, batch: Vec<ChangeEvent>) -> Vec<ChangeEvent> {
        batch
            .into_iter()
            .filter(|event| match event.kind {
                ChangeKind::Created => !self.paths.remove(&event.path),
                ChangeKind::Deleted => {
                    self.paths.remove(&event.path);
                    true
                }
                ChangeKind::Changed => true,
            })
            .collect()
    }
}

fn print_batch<W: Write>(writer: &mut W, format: OutputFormat, batch: &[ChangeEvent]) -> anyhow::Result<()> {
    for event in batch {
        match format {
            OutputFormat::Human => writeln!(writer, "{:<8} {}", kind_label(event.kind), event.path)?,
            OutputFormat::Json => {
                serde_json::to_writer(&mut *writer, &EventLine::from(event))?;
                writeln!(writer)?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

fn kind_label(kind: ChangeKind) -> &'static str {
    match kind {
        ChangeKind::Created => "created",
        ChangeKind::Changed => "changed",
        ChangeKind::Deleted => "deleted",
    }
}
