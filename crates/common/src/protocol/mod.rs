// Remote platform HTTP protocol: operations, fixed paths, request and
// response bodies.

pub mod messages;
pub mod operations;

pub use messages::*;
pub use operations::{Operation, SchemaDesigner, ALL_OPERATIONS};

/// Login endpoint; the only call made without session headers.
pub const LOGIN_PATH: &str = "/ServiceModel/AuthService.svc/Login";

/// Cookie that carries the anti-forgery token issued at login.
pub const CSRF_COOKIE: &str = "BPMCSRF";

/// Header that must echo the anti-forgery token on authenticated calls.
pub const CSRF_HEADER: &str = "BPMCSRF";
