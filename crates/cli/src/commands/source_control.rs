// `creatio-fs lock | unlock | revert`: version-control flags on one schema.

use clap::Args;
use serde::{Deserialize, Serialize};

use creatio_fs::SchemaFileSystem;

use crate::connect::{self, ConnectArgs};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct PathArgs {
    /// Schema path, e.g. `Custom/UsrSync.cs`.
    pub path: String,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Lock,
    Unlock,
    Revert,
}

impl Action {
    fn past_tense(self) -> &'static str {
        match self {
            Self::Lock => "Locked",
            Self::Unlock => "Unlocked",
            Self::Revert => "Reverted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceControlResult {
    pub path: String,
    pub action: Action,
}

pub fn run(args: PathArgs, action: Action, connect: &ConnectArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let result = connect::block_on(async {
        let context = connect.open()?;
        apply(context.fs(), context.host(), &args.path, action).await
    });
    output::finish(format, result, format_human)
}

pub async fn apply(
    fs: &dyn SchemaFileSystem,
    host: &str,
    input: &str,
    action: Action,
) -> anyhow::Result<SourceControlResult> {
    let path = connect::resolve_path(host, input)?;
    match action {
        Action::Lock => fs.lock(&path).await?,
        Action::Unlock => fs.unlock(&path).await?,
        Action::Revert => fs.revert(&path).await?,
    }
    Ok(SourceControlResult { path: path.to_string(), action })
}

fn format_human(result: &SourceControlResult) -> String {
    format!("{} {}", result.action.past_tense(), result.path)
}
