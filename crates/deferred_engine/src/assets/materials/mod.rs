//! Wavefront material libraries

pub mod mtl_parser;

pub use mtl_parser::{MtlData, MtlParser};
