//! Shader programs
//!
//! Parameter derivation, template expansion and the shared program cache.

mod cache;
mod parameters;
pub mod shader_lib;

pub use cache::{MaterialKey, Program, ProgramCache, ProgramId, SyncStamp};
pub use parameters::{FogKind, ParameterInputs, ProgramCacheKey, ProgramParameters};
