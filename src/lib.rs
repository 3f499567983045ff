#![forbid(unsafe_code)]

//! binary-checker: recursive, archive-aware binary-content scanner.
//!
//! Given a source tree, a repository URL or a single compressed artifact,
//! reports every contained file whose content is non-text:
//! 1. **Content classifier**: binary iff the MIME category is `application`,
//!    `image`, `audio` or `video`
//! 2. **Archive inspector**: zip, tar, and gzip/bzip2-wrapped tar, each
//!    extracted into a private scratch directory
//! 3. **Tree walker**: pinned-order enumeration with fixed `.git` / `test`
//!    exclusions and a parallel worker pool
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use binary_checker::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use binary_checker::core::config::Config;
//! use binary_checker::scanner::walker::{TreeWalker, WalkerConfig};
//! ```

pub mod prelude;

pub mod core;
pub mod logger;
pub mod scanner;
