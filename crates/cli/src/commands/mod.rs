// CLI subcommand dispatch.

use clap::Subcommand;

use crate::connect::ConnectArgs;

pub mod ancestors;
pub mod build;
pub mod cache;
pub mod cat;
pub mod changes;
pub mod ls;
pub mod query;
pub mod source_control;
pub mod watch;
pub mod write;

use source_control::Action;

#[derive(Subcommand)]
pub enum Command {
    /// List packages, or the schemas in a package
    Ls(ls::LsArgs),
    /// Print a schema body
    Cat(cat::CatArgs),
    /// Save a schema body from a file or stdin
    Write(write::WriteArgs),
    /// Lock a schema in version control
    Lock(source_control::PathArgs),
    /// Unlock a schema in version control
    Unlock(source_control::PathArgs),
    /// Discard local changes to a schema
    Revert(source_control::PathArgs),
    /// Show a schema and the schemas it inherits from
    Ancestors(ancestors::AncestorsArgs),
    /// Show version-control changes in a package
    Changes(changes::ChangesArgs),
    /// Compile the workspace
    Build(build::BuildArgs),
    /// Run a data-service select query
    Query(query::QueryArgs),
    /// Download every schema body in a package
    CachePackage(cache::CachePackageArgs),
    /// Remove cached bodies
    ClearCache(cache::ClearCacheArgs),
    /// Stream change notifications
    Watch(watch::WatchArgs),
}

pub fn run(cmd: Command, connect: &ConnectArgs) -> anyhow::Result<()> {
    match cmd {
        Command::Ls(args) => ls::run(args, connect),
        Command::Cat(args) => cat::run(args, connect),
        Command::Write(args) => write::run(args, connect),
        Command::Lock(args) => source_control::run(args, Action::Lock, connect),
        Command::Unlock(args) => source_control::run(args, Action::Unlock, connect),
        Command::Revert(args) => source_control::run(args, Action::Revert, connect),
        Command::Ancestors(args) => ancestors::run(args, connect),
        Command::Changes(args) => changes::run(args, connect),
        Command::Build(args) => build::run(args, connect),
        Command::Query(args) => query::run(args, connect),
        Command::CachePackage(args) => cache::run_cache_package(args, connect),
        Command::ClearCache(args) => cache::run_clear_cache(args, connect),
        Command::Watch(args) => watch::run(args, connect),
    }
}
