//! Binary-content scanner: MIME probing, classification, archive inspection,
//! target resolution and the tree walker that ties them together.

pub mod archive;
pub mod classifier;
pub mod mime;
pub mod remote;
pub mod report;
pub mod target;
pub mod walker;
