//! Core record types produced by the decoder.

mod field;
mod frame;

pub use field::{FieldBody, FieldNode};
pub use frame::Frame;
