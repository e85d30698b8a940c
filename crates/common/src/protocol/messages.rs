// Request and response bodies exchanged with the remote platform.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::types::{PackageMetaInfo, Schema, SchemaType, WorkspaceItem};

// ── Login ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    #[serde(rename = "UserName")]
    pub user_name: &'a str,
    #[serde(rename = "UserPassword")]
    pub user_password: &'a str,
}

/// `Code == 0` means the credentials were accepted.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoginResponse {
    #[serde(rename = "Code")]
    pub code: i32,
    #[serde(rename = "Message", default)]
    pub message: Option<String>,
}

impl LoginResponse {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

// ── Envelope ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub stack_trace: Option<String>,
}

/// Common frame of every non-login response. Operation-specific fields land
/// in `fields`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub error_info: Option<ErrorInfo>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ResponseEnvelope {
    /// Human-readable failure message supplied by the server.
    pub fn error_message(&self) -> String {
        self.error_info
            .as_ref()
            .map(|info| info.message.trim())
            .filter(|message| !message.is_empty())
            .unwrap_or("remote operation failed without an error message")
            .to_string()
    }

    /// Reassemble the full response body (envelope fields included).
    pub fn into_value(self) -> Value {
        let mut fields = self.fields;
        if let Some(success) = self.success {
            fields.insert("success".to_string(), Value::Bool(success));
        }
        if let Some(info) = self.error_info {
            fields.insert(
                "errorInfo".to_string(),
                serde_json::to_value(info).unwrap_or(Value::Null),
            );
        }
        Value::Object(fields)
    }
}

// ── Requests ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GetSchemaRequest {
    pub schema_u_id: Uuid,
    pub use_full_hierarchy: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateChangesRequest<'a> {
    pub package_name: &'a str,
}

// ── Responses ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PackagesResponse {
    #[serde(default)]
    pub packages: Vec<PackageMetaInfo>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct WorkspaceItemsResponse {
    #[serde(default)]
    pub items: Vec<WorkspaceItem>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SchemaResponse {
    pub schema: Schema,
}

/// One element changed in a package relative to version control.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChangedElement {
    pub name: String,
    #[serde(default, rename = "type")]
    pub schema_type: Option<SchemaType>,
    #[serde(default)]
    pub state: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackageChange {
    #[serde(alias = "packageName")]
    pub name: String,
    #[serde(default)]
    pub state: Value,
    #[serde(default)]
    pub items: Vec<ChangedElement>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChangesResponse {
    #[serde(default)]
    pub changes: Vec<PackageChange>,
}

/// Compiler diagnostic reported by build / rebuild.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BuildError {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub column: Option<u32>,
    #[serde(default)]
    pub error_number: String,
    #[serde(default)]
    pub error_text: String,
    #[serde(default)]
    pub warning: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BuildResponse {
    #[serde(default)]
    pub errors: Vec<BuildError>,
}

impl BuildResponse {
    /// Diagnostics that are errors rather than warnings.
    pub fn failures(&self) -> impl Iterator<Item = &BuildError> {
        self.errors.iter().filter(|error| !error.warning)
    }
}
