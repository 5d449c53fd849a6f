//! Task identifiers, task records and provider result shapes.

pub mod id;
pub mod result;
pub mod task;

pub use id::*;
pub use result::*;
pub use task::*;
