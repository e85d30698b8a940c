// `creatio-fs query`: run a data-service select query.

use anyhow::Context;
use clap::Args;
use serde_json::Value;

use creatio_fs::SchemaFileSystem;

use crate::connect::{self, ConnectArgs};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Query JSON, or `@path` to read it from a file.
    pub query: String,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

pub fn run(args: QueryArgs, connect: &ConnectArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let result = parse_query(&args.query).and_then(|query| {
        connect::block_on(async {
            let context = connect.open()?;
            query_rows(context.fs(), query).await
        })
    });
    output::finish(format, result, format_human)
}

pub async fn query_rows(fs: &dyn SchemaFileSystem, query: Value) -> anyhow::Result<Value> {
    Ok(fs.select_query(query).await?)
}

fn parse_query(input: &str) -> anyhow::Result<Value> {
    let text = match input.strip_prefix('@') {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("failed to read query file `{path}`"))?
        }
        None => input.to_string(),
    };
    let query: Value = serde_json::from_str(&text).context("query is not valid JSON")?;
    if !query.is_object() {
        anyhow::bail!("query must be a JSON object");
    }
    Ok(query)
}

fn format_human(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
