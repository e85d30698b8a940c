// `creatio-fs ls`: list packages or the schemas in one package.

use clap::Args;
use serde::{Deserialize, Serialize};

use creatio_fs::{DirEntry, Entry, EntryKind, SchemaFileSystem};

use crate::connect::{self, ConnectArgs};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct LsArgs {
    /// Package or schema path (defaults to the root).
    #[arg(default_value = "/")]
    path: String,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LsResult {
    pub path: String,
    #[serde(default)]
    pub entries: Vec<LsEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LsEntry {
    pub name: String,
    pub path: String,
    pub directory: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub changed: bool,
    #[serde(default)]
    pub locked: bool,
}

impl From<DirEntry> for LsEntry {
    fn from(entry: DirEntry) -> Self {
        Self {
            name: entry.name,
            path: entry.path.to_string(),
            directory: entry.kind == EntryKind::Directory,
            read_only: entry.is_read_only,
            changed: entry.is_changed,
            locked: entry.is_locked,
        }
    }
}

pub fn run(args: LsArgs, connect: &ConnectArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let result = connect::block_on(async {
        let context = connect.open()?;
        list(context.fs(), context.host(), &args.path).await
    });
    output::finish(format, result, format_human)
}

pub async fn list(fs: &dyn SchemaFileSystem, host: &str, input: &str) -> anyhow::Result<LsResult> {
    let path = connect::resolve_path(host, input)?;
    let entries = match fs.stat(&path).await? {
        Entry::File(file) => vec![LsEntry {
            name: file.workspace_item.file_name(),
            path: path.to_string(),
            directory: false,
            read_only: file.workspace_item.is_read_only,
            changed: file.workspace_item.is_changed,
            locked: file.workspace_item.is_locked,
        }],
        Entry::Root { .. } | Entry::Directory(_) => {
            fs.list_directory(&path).await?.into_iter().map(LsEntry::from).collect()
        }
    };
    Ok(LsResult { path: path.to_string(), entries })
}

fn format_human(result: &LsResult) -> String {
    if result.entries.is_empty() {
        return format!("{} is empty.", result.path);
    }

    let mut lines = Vec::new();
    for entry in &result.entries {
        let mut flags = Vec::new();
        if entry.read_only {
            flags.push("read-only");
        }
        if entry.changed {
            flags.push("changed");
        }
        if entry.locked {
            flags.push("locked");
        }
        let suffix = if entry.directory { "/" } else { "" };
        let flags = if flags.is_empty() { String::new() } else { format!("  [{}]", flags.join(", ")) };
        lines.push(format!("{}{suffix}{flags}", entry.name));
    }
    lines.join("\n")
}
