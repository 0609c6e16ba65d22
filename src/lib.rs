//! Reading, probing and writing CD cue sheets.

pub mod cd;
pub mod cue;
pub mod metadata;
pub mod writer;
