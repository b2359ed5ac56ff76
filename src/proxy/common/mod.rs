// Common tools

pub mod headers;
pub mod pattern;
