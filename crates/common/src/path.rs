// Virtual paths: `creatio:/<host>/<package>/<item><ext>`.
//
// A path names either the connection root, a package directory, or one
// schema file. Parsing rejects traversal components, null bytes and
// anything deeper than a file.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{SchemaType, WorkspaceItem};

pub const SCHEME: &str = "creatio";

/// Maximum allowed path length in characters.
const MAX_PATH_CHARS: usize = 512;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("path must start with `{SCHEME}:/`: {0}")]
    Scheme(String),

    #[error("path exceeds maximum length of {MAX_PATH_CHARS} characters")]
    TooLong,

    #[error("path contains directory traversal component: {0}")]
    Traversal(String),

    #[error("path contains null byte")]
    NullByte,

    #[error("path contains invalid component: {0}")]
    InvalidComponent(String),

    #[error("path is nested deeper than <host>/<package>/<file>: {0}")]
    TooDeep(String),

    #[error("file name has no known schema extension: {0}")]
    UnknownExtension(String),
}

/// Check a single path component (host, package or file name) taken from
/// outside, e.g. a name returned by the server.
pub fn validate_component(component: &str) -> Result<(), PathError> {
    if component.contains('\0') {
        return Err(PathError::NullByte);
    }
    if component == "." || component == ".." {
        return Err(PathError::Traversal(component.to_string()));
    }
    if component.contains('/') || component.contains('\\') {
        return Err(PathError::InvalidComponent(component.to_string()));
    }
    if component.trim().is_empty() {
        return Err(PathError::InvalidComponent("(whitespace-only component)".to_string()));
    }
    Ok(())
}

/// What a virtual path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Root,
    Package,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VirtualPath {
    host: String,
    package: Option<String>,
    file: Option<String>,
}

impl VirtualPath {
    /// Root of one connection, listing its packages.
    pub fn root(host: impl Into<String>) -> Self {
        Self { host: host.into(), package: None, file: None }
    }

    pub fn package(host: impl Into<String>, package: impl Into<String>) -> Self {
        Self { host: host.into(), package: Some(package.into()), file: None }
    }

    /// Path of a workspace item: its package directory plus `<name><ext>`.
    pub fn for_item(host: impl Into<String>, item: &WorkspaceItem) -> Self {
        Self {
            host: host.into(),
            package: Some(item.package_name.clone()),
            file: Some(item.file_name()),
        }
    }

    /// Parse `creatio:/host[/package[/file]]`. A trailing slash is accepted.
    pub fn parse(input: &str) -> Result<Self, PathError> {
        if input.is_empty() {
            return Err(PathError::Empty);
        }
        if input.contains('\0') {
            return Err(PathError::NullByte);
        }
        if input.chars().count() > MAX_PATH_CHARS {
            return Err(PathError::TooLong);
        }

        let rest = input
            .strip_prefix(SCHEME)
            .and_then(|rest| rest.strip_prefix(":/"))
            .ok_or_else(|| PathError::Scheme(input.to_string()))?;

        let unified = rest.replace('\\', "/");
        let components: Vec<&str> = unified.split('/').filter(|s| !s.is_empty()).collect();

        if components.is_empty() {
            return Err(PathError::Empty);
        }
        if components.len() > 3 {
            return Err(PathError::TooDeep(input.to_string()));
        }

        for component in &components {
            validate_component(component)?;
        }

        let mut components = components.into_iter().map(str::to_string);
        let host = components.next().ok_or(PathError::Empty)?;
        let package = components.next();
        let file = components.next();

        if let Some(file) = &file {
            if SchemaType::split_file_name(file).is_none() {
                return Err(PathError::UnknownExtension(file.clone()));
            }
        }

        Ok(Self { host, package, file })
    }

    pub fn kind(&self) -> PathKind {
        match (&self.package, &self.file) {
            (None, _) => PathKind::Root,
            (Some(_), None) => PathKind::Package,
            (Some(_), Some(_)) => PathKind::File,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn package_name(&self) -> Option<&str> {
        self.package.as_deref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file.as_deref()
    }

    /// Item name and kind for file paths.
    pub fn item(&self) -> Option<(&str, SchemaType)> {
        self.file.as_deref().and_then(SchemaType::split_file_name)
    }

    /// Containing directory; the root is its own parent.
    pub fn parent(&self) -> Self {
        match self.kind() {
            PathKind::Root | PathKind::Package => Self::root(self.host.clone()),
            PathKind::File => Self {
                host: self.host.clone(),
                package: self.package.clone(),
                file: None,
            },
        }
    }

    /// Append a child name: a package under the root, a file under a package.
    pub fn join(&self, name: &str) -> Result<Self, PathError> {
        Self::parse(&format!("{self}/{name}"))
    }

    /// True if `self` equals `ancestor` or lies beneath it.
    pub fn starts_with(&self, ancestor: &VirtualPath) -> bool {
        if self.host != ancestor.host {
            return false;
        }
        match (&ancestor.package, &ancestor.file) {
            (None, _) => true,
            (Some(package), None) => self.package.as_ref() == Some(package),
            (Some(_), Some(_)) => self == ancestor,
        }
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}:/{}", self.host)?;
        if let Some(package) = &self.package {
            write!(f, "/{package}")?;
        }
        if let Some(file) = &self.file {
            write!(f, "/{file}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for VirtualPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VirtualPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VirtualPath> for String {
    fn from(path: VirtualPath) -> Self {
        path.to_string()
    }
}
