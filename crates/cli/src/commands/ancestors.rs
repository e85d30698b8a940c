// `creatio-fs ancestors`: a schema and the schemas it inherits from.

use clap::Args;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use creatio_fs::SchemaFileSystem;
use creatio_fs_common::path::VirtualPath;

use crate::connect::{self, ConnectArgs};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct AncestorsArgs {
    /// Schema path, e.g. `Custom/AccountPageV2.js`.
    pub path: String,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AncestorsResult {
    pub path: String,
    pub chain: Vec<ChainEntry>,
    #[serde(default)]
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainEntry {
    pub name: String,
    pub package: String,
    pub path: String,
    pub u_id: Uuid,
}

pub fn run(args: AncestorsArgs, connect: &ConnectArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let result = connect::block_on(async {
        let context = connect.open()?;
        let cancel = connect::cancel_on_ctrl_c();
        ancestors(context.fs(), context.host(), &args.path, &cancel).await
    });
    output::finish(format, result, format_human)
}

pub async fn ancestors(
    fs: &dyn SchemaFileSystem,
    host: &str,
    input: &str,
    cancel: &CancellationToken,
) -> anyhow::Result<AncestorsResult> {
    let path = connect::resolve_path(host, input)?;
    let chain = fs.ancestors(&path, cancel).await?;
    let entries = chain
        .files
        .iter()
        .map(|file| ChainEntry {
            name: file.name().to_string(),
            package: file.workspace_item.package_name.clone(),
            path: VirtualPath::for_item(path.host(), &file.workspace_item).to_string(),
            u_id: file.u_id(),
        })
        .collect();
    Ok(AncestorsResult { path: path.to_string(), chain: entries, cancelled: chain.cancelled })
}

fn format_human(result: &AncestorsResult) -> String {
    let mut lines = Vec::new();
    for (depth, entry) in result.chain.iter().enumerate() {
        let indent = "  ".repeat(depth);
        let arrow = if depth == 0 { "" } else { "└ " };
        lines.push(format!("{indent}{arrow}{} ({})", entry.name, entry.package));
    }
    if result.cancelled {
        lines.push("(cancelled)".into());
    }
    lines.join("\n")
}
