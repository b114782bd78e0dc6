//! Parameter registry
//!
//! A fixed, read-only catalog mapping parameter names to protocol-level ids
//! and value codecs. Values are validated here, before anything touches the
//! network.

mod registry;
mod value;

pub use self::registry::{lookup, Access, Parameter, ValueKind, PARAMETERS};
pub use self::value::Value;
