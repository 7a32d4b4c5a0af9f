//! Stored procedure descriptors and parameter types

mod descriptor;
mod types;

pub use descriptor::{Parameter, ParameterOptions, ProcedureDescriptor};
pub use types::DataType;
