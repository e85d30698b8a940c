// creatio-fs-common: shared types and wire protocol for the creatio-fs workspace

pub mod path;
pub mod protocol;
pub mod types;
