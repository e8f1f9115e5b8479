//! Provider implementations.

pub mod export;

pub use export::ExportProvider;
