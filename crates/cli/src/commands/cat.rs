// `creatio-fs cat`: print a schema body.

use clap::Args;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use creatio_fs::SchemaFileSystem;

use crate::connect::{self, ConnectArgs};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct CatArgs {
    /// Schema path, e.g. `Custom/UsrSync.cs`.
    pub path: String,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatResult {
    pub path: String,
    pub u_id: Uuid,
    pub schema_type: String,
    pub changed: bool,
    pub locked: bool,
    pub body: String,
}

pub fn run(args: CatArgs, connect: &ConnectArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let result = connect::block_on(async {
        let context = connect.open()?;
        read(context.fs(), context.host(), &args.path).await
    });
    output::finish(format, result, |result| result.body.clone())
}

pub async fn read(fs: &dyn SchemaFileSystem, host: &str, input: &str) -> anyhow::Result<CatResult> {
    let path = connect::resolve_path(host, input)?;
    let file = fs.read_file(&path).await?;
    Ok(CatResult {
        path: path.to_string(),
        u_id: file.u_id(),
        schema_type: file.schema_type().to_string(),
        changed: file.workspace_item.is_changed,
        locked: file.workspace_item.is_locked,
        body: file.body().unwrap_or_default().to_string(),
    })
}
