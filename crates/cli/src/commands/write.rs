// `creatio-fs write`: save a schema body.

use std::io::Read;

use anyhow::Context;
use clap::Args;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use creatio_fs::{SchemaFileSystem, WriteOptions};

use crate::connect::{self, ConnectArgs};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct WriteArgs {
    /// Schema path, e.g. `Custom/UsrSync.cs`.
    pub path: String,

    /// Read the body from a local file instead of stdin.
    #[arg(long, group = "content_source")]
    file: Option<String>,

    /// New body given inline.
    #[arg(long, group = "content_source")]
    content: Option<String>,

    /// Create the schema if it does not exist.
    #[arg(long)]
    create: bool,

    /// Fail instead of replacing an existing schema.
    #[arg(long)]
    no_overwrite: bool,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteResult {
    pub path: String,
    pub u_id: Uuid,
    pub created: bool,
    pub bytes_written: usize,
}

pub fn run(args: WriteArgs, connect: &ConnectArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);

    let options = WriteOptions { create: args.create, overwrite: !args.no_overwrite };
    let result = read_body(&args).and_then(|body| {
        connect::block_on(async {
            let context = connect.open()?;
            write(context.fs(), context.host(), &args.path, body, options).await
        })
    });
    output::finish(format, result, format_human)
}

fn read_body(args: &WriteArgs) -> anyhow::Result<String> {
    match (&args.content, &args.file) {
        (Some(content), _) => Ok(content.clone()),
        (_, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read content file `{path}`")),
        (None, None) => {
            let mut body = String::new();
            std::io::stdin().read_to_string(&mut body).context("failed to read stdin")?;
            Ok(body)
        }
    }
}

pub async fn write(
    fs: &dyn SchemaFileSystem,
    host: &str,
    input: &str,
    body: String,
    options: WriteOptions,
) -> anyhow::Result<WriteResult> {
    if body.is_empty() {
        anyhow::bail!("refusing to save an empty body");
    }
    let path = connect::resolve_path(host, input)?;
    let existed = fs.stat(&path).await.is_ok();
    let bytes_written = body.len();
    let file = fs.write_file(&path, body, options).await?;
    Ok(WriteResult { path: path.to_string(), u_id: file.u_id(), created: !existed, bytes_written })
}

fn format_human(result: &WriteResult) -> String {
    let verb = if result.created { "Created" } else { "Saved" };
    format!("{verb} {} ({} bytes)", result.path, result.bytes_written)
}
