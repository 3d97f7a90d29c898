/// State management module
///
/// This module handles all dashboard state, including:
/// - Title database connections and queries (library.rs)
/// - Shared data structures (data.rs)
/// - Configuration load/save (config.rs)
/// - The widget tree shared with the scan workers (tree.rs)

pub mod config;
pub mod data;
pub mod library;
pub mod tree;
