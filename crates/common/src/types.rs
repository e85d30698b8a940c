// Core domain types shared across all creatio-fs crates.
//
// Field names follow the remote platform's camelCase JSON so the same
// structs serve the wire protocol and the on-disk metadata records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::protocol::SchemaDesigner;

// ── Schema kinds ───────────────────────────────────────────────────

/// Kind of a remote schema. The wire form is the platform's integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum SchemaType {
    SqlScript,
    Data,
    Dll,
    Entity,
    ClientUnit,
    SourceCode,
    Process,
    Case,
    ProcessUserTask,
    Unknown,
}

impl SchemaType {
    pub const ALL: [SchemaType; 10] = [
        Self::SqlScript,
        Self::Data,
        Self::Dll,
        Self::Entity,
        Self::ClientUnit,
        Self::SourceCode,
        Self::Process,
        Self::Case,
        Self::ProcessUserTask,
        Self::Unknown,
    ];

    /// Kinds whose bodies can be fetched and saved.
    pub const EDITABLE: [SchemaType; 8] = [
        Self::SqlScript,
        Self::Data,
        Self::Entity,
        Self::ClientUnit,
        Self::SourceCode,
        Self::Process,
        Self::Case,
        Self::ProcessUserTask,
    ];

    /// File extension (including the leading dot) used for this kind in
    /// virtual paths and in the body cache.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::SqlScript => ".sql",
            Self::Data => ".data.json",
            Self::Dll => ".dll",
            Self::Entity => ".ent.json",
            Self::ClientUnit => ".js",
            Self::SourceCode => ".cs",
            Self::Process => ".bp.json",
            Self::Case => ".case.json",
            Self::ProcessUserTask => ".put.json",
            Self::Unknown => ".txt",
        }
    }

    /// Name used in configuration files.
    pub const fn config_name(self) -> &'static str {
        match self {
            Self::SqlScript => "sql_script",
            Self::Data => "data",
            Self::Dll => "dll",
            Self::Entity => "entity",
            Self::ClientUnit => "client_unit",
            Self::SourceCode => "source_code",
            Self::Process => "process",
            Self::Case => "case",
            Self::ProcessUserTask => "process_user_task",
            Self::Unknown => "unknown",
        }
    }

    /// Designer service that serves bodies of this kind, if any.
    pub const fn designer(self) -> Option<SchemaDesigner> {
        match self {
            Self::SqlScript => Some(SchemaDesigner::SqlScript),
            Self::Data => Some(SchemaDesigner::Data),
            Self::Entity => Some(SchemaDesigner::Entity),
            Self::ClientUnit => Some(SchemaDesigner::ClientUnit),
            Self::SourceCode => Some(SchemaDesigner::SourceCode),
            Self::Process => Some(SchemaDesigner::Process),
            Self::Case => Some(SchemaDesigner::Case),
            Self::ProcessUserTask => Some(SchemaDesigner::ProcessUserTask),
            Self::Dll | Self::Unknown => None,
        }
    }

    /// Split a file name into `(item name, kind)` by its extension.
    ///
    /// The longest matching extension wins, so `Foo.ent.json` is an entity
    /// named `Foo` and never a `.json`-suffixed item.
    pub fn split_file_name(file_name: &str) -> Option<(&str, SchemaType)> {
        Self::ALL
            .iter()
            .filter(|kind| file_name.len() > kind.extension().len())
            .filter(|kind| file_name.ends_with(kind.extension()))
            .max_by_key(|kind| kind.extension().len())
            .map(|kind| (&file_name[..file_name.len() - kind.extension().len()], *kind))
    }
}

impl From<u8> for SchemaType {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::SqlScript,
            1 => Self::Data,
            2 => Self::Dll,
            3 => Self::Entity,
            4 => Self::ClientUnit,
            5 => Self::SourceCode,
            6 => Self::Process,
            7 => Self::Case,
            8 => Self::ProcessUserTask,
            _ => Self::Unknown,
        }
    }
}

impl From<SchemaType> for u8 {
    fn from(kind: SchemaType) -> Self {
        match kind {
            SchemaType::SqlScript => 0,
            SchemaType::Data => 1,
            SchemaType::Dll => 2,
            SchemaType::Entity => 3,
            SchemaType::ClientUnit => 4,
            SchemaType::SourceCode => 5,
            SchemaType::Process => 6,
            SchemaType::Case => 7,
            SchemaType::ProcessUserTask => 8,
            SchemaType::Unknown => 9,
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSchemaType(pub String);

impl fmt::Display for UnknownSchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown schema type `{}`", self.0)
    }
}

impl std::error::Error for UnknownSchemaType {}

impl FromStr for SchemaType {
    type Err = UnknownSchemaType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.config_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownSchemaType(s.to_string()))
    }
}

// ── Remote metadata ────────────────────────────────────────────────

/// A package: the top-level container of schemas.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PackageMetaInfo {
    pub id: Uuid,
    pub u_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub maintainer: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_read_only: bool,
    #[serde(default)]
    pub created_on: Option<String>,
    #[serde(default)]
    pub modified_on: Option<String>,
}

/// Listing entry for one remote schema.
///
/// `is_changed` / `is_locked` mirror the server's version-control state and
/// are refreshed on reload or after lock, unlock, save and revert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceItem {
    pub id: Uuid,
    pub u_id: Uuid,
    pub name: String,
    pub package_name: String,
    pub package_u_id: Uuid,
    #[serde(rename = "type")]
    pub schema_type: SchemaType,
    #[serde(default)]
    pub is_changed: bool,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub is_read_only: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub modified_on: Option<String>,
}

impl WorkspaceItem {
    /// File name of this item in the virtual tree: `<name><extension>`.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.name, self.schema_type.extension())
    }
}

/// Weak reference to another schema by identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SchemaRef {
    pub u_id: Uuid,
    #[serde(default)]
    pub name: String,
}

/// Full body-bearing form of a workspace item.
///
/// Fields the core does not interpret are kept in `extra` so that a schema
/// fetched from the server can be saved back without losing data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub u_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub parent: Option<SchemaRef>,
    #[serde(default)]
    pub package: Option<SchemaRef>,
    #[serde(default)]
    pub schema_type: Option<SchemaType>,
    #[serde(default)]
    pub extend_parent: bool,
    #[serde(default)]
    pub localizable_strings: Vec<Value>,
    #[serde(default)]
    pub messages: Vec<Value>,
    #[serde(default)]
    pub parameters: Vec<Value>,
    #[serde(default)]
    pub images: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Schema {
    pub fn parent_u_id(&self) -> Option<Uuid> {
        self.parent.as_ref().map(|parent| parent.u_id)
    }
}

// ── Index entries ──────────────────────────────────────────────────

/// One workspace item plus its body, once fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct File {
    #[serde(rename = "workSpaceItem")]
    pub workspace_item: WorkspaceItem,
    #[serde(default)]
    pub schema: Option<Schema>,
}

impl File {
    pub fn new(workspace_item: WorkspaceItem) -> Self {
        Self { workspace_item, schema: None }
    }

    pub fn with_schema(workspace_item: WorkspaceItem, schema: Schema) -> Self {
        Self { workspace_item, schema: Some(schema) }
    }

    /// A file is loaded once a non-empty body is present.
    pub fn is_loaded(&self) -> bool {
        self.schema.as_ref().is_some_and(|schema| !schema.body.is_empty())
    }

    pub fn body(&self) -> Option<&str> {
        self.schema.as_ref().map(|schema| schema.body.as_str()).filter(|body| !body.is_empty())
    }

    pub fn u_id(&self) -> Uuid {
        self.workspace_item.u_id
    }

    pub fn name(&self) -> &str {
        &self.workspace_item.name
    }

    pub fn schema_type(&self) -> SchemaType {
        self.workspace_item.schema_type
    }

    pub fn parent_u_id(&self) -> Option<Uuid> {
        self.schema.as_ref().and_then(Schema::parent_u_id)
    }

    /// Drop the body while keeping everything else about the schema.
    pub fn without_body(&self) -> Self {
        let mut stripped = self.clone();
        if let Some(schema) = stripped.schema.as_mut() {
            schema.body.clear();
        }
        stripped
    }
}

/// A package together with the files it contains.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Directory {
    pub package: PackageMetaInfo,
}

impl Directory {
    pub fn new(package: PackageMetaInfo) -> Self {
        Self { package }
    }

    pub fn name(&self) -> &str {
        &self.package.name
    }

    pub fn is_read_only(&self) -> bool {
        self.package.is_read_only
    }

    /// Whether `item` belongs to this directory.
    pub fn contains(&self, item: &WorkspaceItem) -> bool {
        item.package_u_id == self.package.u_id
    }
}
