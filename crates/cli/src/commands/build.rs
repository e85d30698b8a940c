// `creatio-fs build`: compile the workspace and report diagnostics.

use clap::Args;
use serde::{Deserialize, Serialize};

use creatio_fs::SchemaFileSystem;
use creatio_fs_common::protocol::BuildError;

use crate::connect::{self, ConnectArgs};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Rebuild everything instead of compiling changes only.
    #[arg(long)]
    full: bool,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildResult {
    pub full: bool,
    pub failures: usize,
    #[serde(default)]
    pub diagnostics: Vec<BuildError>,
}

pub fn run(args: BuildArgs, connect: &ConnectArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let result = connect::block_on(async {
        let context = connect.open()?;
        build(context.fs(), args.full).await
    });

    let failures = result.as_ref().map(|result| result.failures).unwrap_or_default();
    output::finish(format, result, format_human)?;
    if failures > 0 {
        anyhow::bail!("build reported {failures} error(s)");
    }
    Ok(())
}

pub async fn build(fs: &dyn SchemaFileSystem, full: bool) -> anyhow::Result<BuildResult> {
    let response = fs.build(full).await?;
    Ok(BuildResult { full, failures: response.failures().count(), diagnostics: response.errors })
}

fn format_human(result: &BuildResult) -> String {
    let mut lines = Vec::new();
    for diagnostic in &result.diagnostics {
        let severity = if diagnostic.warning { "warning" } else { "error" };
        let location = match (diagnostic.line, diagnostic.column) {
            (Some(line), Some(column)) => format!("({line},{column})"),
            (Some(line), None) => format!("({line})"),
            _ => String::new(),
        };
        lines.push(format!(
            "{}{location}: {severity} {}: {}",
            diagnostic.file_name, diagnostic.error_number, diagnostic.error_text
        ));
    }
    let verb = if result.full { "Rebuild" } else { "Build" };
    if result.failures == 0 {
        lines.push(format!("{verb} succeeded."));
    } else {
        lines.push(format!("{verb} failed with {} error(s).", result.failures));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagnostic(warning: bool) -> BuildError {
        BuildError {
            file_name: "UsrSync.cs".into(),
            line: Some(3),
            column: Some(14),
            error_number: if warning { "CS0168".into() } else { "CS1002".into() },
            error_text: "; expected".into(),
            warning,
        }
    }

    #[test]
    fn human_format_lists_diagnostics() {
        let result = BuildResult { full: false, failures: 1, diagnostics: vec![diagnostic(false)] };
        let output = format_human(&result);
        assert!(output.contains("UsrSync.cs(3,14): error CS1002: ; expected"));
        assert!(output.ends_with("Build failed with 1 error(s)."));
    }

    #[test]
    fn warnings_alone_succeed() {
        let result = BuildResult { full: true, failures: 0, diagnostics: vec![diagnostic(true)] };
        let output = format_human(&result);
        assert!(output.contains("warning CS0168"));
        assert!(output.ends_with("Rebuild succeeded."));
    }
}
