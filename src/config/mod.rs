pub mod loader;
pub mod policy;
pub mod resolved;
pub mod source;
pub mod types;
pub mod variables;

pub use loader::ConfigLoader;
pub use policy::{resolve_policies, PolicyInput, ResolvedPolicies};
pub use resolved::*;
pub use source::{ConfigSource, FsConfigSource, MemoryConfigSource};
pub use types::*;
pub use variables::{resolve_variables, sql_literal};
