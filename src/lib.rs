//! Jump-to-definition for editors, backed by ctags tags files.
//!
//! The tags file is produced by an external indexer (`ctags`, optionally
//! GNU Global for cross references) and consumed here: parsed into a
//! [`tags::TagIndex`], resolved to a single definition with
//! [`tags::resolver::SymbolResolver`], and navigated with a per-project
//! [`navigation::NavigationStack`]. The [`mcp`] module exposes all of it
//! as MCP tools over stdio.

pub mod config;
pub mod error;
pub mod handlers;
pub mod indexer;
pub mod mcp;
pub mod navigation;
pub mod project;
pub mod scope;
pub mod tags;
pub mod xref;
