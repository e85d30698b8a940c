// Server operations and their fixed URL paths, mirrored in
// contracts/operations.json.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Designer service responsible for one family of schema bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaDesigner {
    ClientUnit,
    SourceCode,
    SqlScript,
    Entity,
    Data,
    Process,
    Case,
    ProcessUserTask,
}

impl SchemaDesigner {
    pub const ALL: [SchemaDesigner; 8] = [
        Self::ClientUnit,
        Self::SourceCode,
        Self::SqlScript,
        Self::Entity,
        Self::Data,
        Self::Process,
        Self::Case,
        Self::ProcessUserTask,
    ];
}

/// Every call the core can make besides login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetPackages,
    GetWorkspaceItems,
    GetSchema(SchemaDesigner),
    SaveSchema(SchemaDesigner),
    LockElements,
    UnlockElements,
    RevertElements,
    GenerateChanges,
    Build,
    Rebuild,
    SelectQuery,
}

/// All operations, one per fixed path.
pub const ALL_OPERATIONS: &[Operation] = &[
    Operation::GetPackages,
    Operation::GetWorkspaceItems,
    Operation::GetSchema(SchemaDesigner::ClientUnit),
    Operation::GetSchema(SchemaDesigner::SourceCode),
    Operation::GetSchema(SchemaDesigner::SqlScript),
    Operation::GetSchema(SchemaDesigner::Entity),
    Operation::GetSchema(SchemaDesigner::Data),
    Operation::GetSchema(SchemaDesigner::Process),
    Operation::GetSchema(SchemaDesigner::Case),
    Operation::GetSchema(SchemaDesigner::ProcessUserTask),
    Operation::SaveSchema(SchemaDesigner::ClientUnit),
    Operation::SaveSchema(SchemaDesigner::SourceCode),
    Operation::SaveSchema(SchemaDesigner::SqlScript),
    Operation::SaveSchema(SchemaDesigner::Entity),
    Operation::SaveSchema(SchemaDesigner::Data),
    Operation::SaveSchema(SchemaDesigner::Process),
    Operation::SaveSchema(SchemaDesigner::Case),
    Operation::SaveSchema(SchemaDesigner::ProcessUserTask),
    Operation::LockElements,
    Operation::UnlockElements,
    Operation::RevertElements,
    Operation::GenerateChanges,
    Operation::Build,
    Operation::Rebuild,
    Operation::SelectQuery,
];

impl Operation {
    /// Fixed server path for this operation.
    pub const fn path(self) -> &'static str {
        match self {
            Self::GetPackages => "/0/ServiceModel/WorkspaceExplorerService.svc/GetPackages",
            Self::GetWorkspaceItems => {
                "/0/ServiceModel/WorkspaceExplorerService.svc/GetWorkspaceItems"
            }
            Self::GetSchema(designer) => match designer {
                SchemaDesigner::ClientUnit => {
                    "/0/ServiceModel/ClientUnitSchemaDesignerService.svc/GetSchema"
                }
                SchemaDesigner::SourceCode => {
                    "/0/ServiceModel/SourceCodeSchemaDesignerService.svc/GetSchema"
                }
                SchemaDesigner::SqlScript => {
                    "/0/ServiceModel/SqlScriptSchemaDesignerService.svc/GetSchema"
                }
                SchemaDesigner::Entity => {
                    "/0/ServiceModel/EntitySchemaDesignerService.svc/GetSchema"
                }
                SchemaDesigner::Data => "/0/ServiceModel/SchemaDataDesignerService.svc/GetSchema",
                SchemaDesigner::Process => {
                    "/0/ServiceModel/ProcessSchemaDesignerService.svc/GetSchema"
                }
                SchemaDesigner::Case => "/0/ServiceModel/CaseSchemaDesignerService.svc/GetSchema",
                SchemaDesigner::ProcessUserTask => {
                    "/0/ServiceModel/ProcessUserTaskSchemaDesignerService.svc/GetSchema"
                }
            },
            Self::SaveSchema(designer) => match designer {
                SchemaDesigner::ClientUnit => {
                    "/0/ServiceModel/ClientUnitSchemaDesignerService.svc/SaveSchema"
                }
                SchemaDesigner::SourceCode => {
                    "/0/ServiceModel/SourceCodeSchemaDesignerService.svc/SaveSchema"
                }
                SchemaDesigner::SqlScript => {
                    "/0/ServiceModel/SqlScriptSchemaDesignerService.svc/SaveSchema"
                }
                SchemaDesigner::Entity => {
                    "/0/ServiceModel/EntitySchemaDesignerService.svc/SaveSchema"
                }
                SchemaDesigner::Data => {
                    "/0/ServiceModel/SchemaDataDesignerService.svc/SaveSchema"
                }
                SchemaDesigner::Process => {
                    "/0/ServiceModel/ProcessSchemaDesignerService.svc/SaveSchema"
                }
                SchemaDesigner::Case => {
                    "/0/ServiceModel/CaseSchemaDesignerService.svc/SaveSchema"
                }
                SchemaDesigner::ProcessUserTask => {
                    "/0/ServiceModel/ProcessUserTaskSchemaDesignerService.svc/SaveSchema"
                }
            },
            Self::LockElements => "/0/ServiceModel/SourceControlService.svc/LockPackageElements",
            Self::UnlockElements => {
                "/0/ServiceModel/SourceControlService.svc/UnlockPackageElements"
            }
            Self::RevertElements => "/0/ServiceModel/SourceControlService.svc/RevertElements",
            Self::GenerateChanges => "/0/ServiceModel/SourceControlService.svc/GenerateChanges",
            Self::Build => "/0/ServiceModel/WorkspaceExplorerService.svc/Build",
            Self::Rebuild => "/0/ServiceModel/WorkspaceExplorerService.svc/Rebuild",
            Self::SelectQuery => "/0/DataService/json/SyncReply/SelectQuery",
        }
    }

    /// Short name used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::GetPackages => "get_packages",
            Self::GetWorkspaceItems => "get_workspace_items",
            Self::GetSchema(_) => "get_schema",
            Self::SaveSchema(_) => "save_schema",
            Self::LockElements => "lock_elements",
            Self::UnlockElements => "unlock_elements",
            Self::RevertElements => "revert_elements",
            Self::GenerateChanges => "generate_changes",
            Self::Build => "build",
            Self::Rebuild => "rebuild",
            Self::SelectQuery => "select_query",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn every_operation_has_a_distinct_path() {
        let paths: HashSet<&str> = ALL_OPERATIONS.iter().map(|op| op.path()).collect();
        assert_eq!(paths.len(), ALL_OPERATIONS.len());
    }

    #[test]
    fn all_operations_cover_every_designer() {
        for designer in SchemaDesigner::ALL {
            assert!(ALL_OPERATIONS.contains(&Operation::GetSchema(designer)));
            assert!(ALL_OPERATIONS.contains(&Operation::SaveSchema(designer)));
        }
    }

    #[test]
    fn service_model_paths_live_under_the_app_prefix() {
        for op in ALL_OPERATIONS {
            assert!(op.path().starts_with("/0/"), "{op} -> {}", op.path());
        }
    }
}
