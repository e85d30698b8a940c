// `creatio-fs changes`: version-control changes pending in a package.

use clap::Args;
use serde::{Deserialize, Serialize};

use creatio_fs::SchemaFileSystem;
use creatio_fs_common::protocol::PackageChange;

use crate::connect::{self, ConnectArgs};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct ChangesArgs {
    /// Package name.
    pub package: String,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangesResult {
    pub package: String,
    #[serde(default)]
    pub changes: Vec<PackageChange>,
}

pub fn run(args: ChangesArgs, connect: &ConnectArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let result = connect::block_on(async {
        let context = connect.open()?;
        changes(context.fs(), &args.package).await
    });
    output::finish(format, result, format_human)
}

pub async fn changes(fs: &dyn SchemaFileSystem, package: &str) -> anyhow::Result<ChangesResult> {
    let changes = fs.generate_changes(package).await?;
    Ok(ChangesResult { package: package.to_string(), changes })
}

fn format_human(result: &ChangesResult) -> String {
    let elements: usize = result.changes.iter().map(|change| change.items.len()).sum();
    if elements == 0 {
        return format!("No changes in {}.", result.package);
    }

    let mut lines = vec![format!("{elements} changed element(s) in {}", result.package)];
    for change in &result.changes {
        for item in &change.items {
            let kind = item.schema_type.map(|kind| kind.to_string()).unwrap_or_else(|| "?".into());
            let state = match &item.state {
                serde_json::Value::String(state) => state.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            lines.push(format!("  {} [{kind}] {state}", item.name).trim_end().to_string());
        }
    }
    lines.join("\n")
}
