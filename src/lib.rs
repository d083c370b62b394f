//! Code capture toolkit: Python source-structure analysis, exact line-range
//! capture, line-level diffs and folder search, served over MCP.

pub mod capture;
pub mod config;
pub mod diff;
pub mod error;
pub mod handlers;
pub mod mcp;
pub mod parser;
pub mod search;

pub use error::{CoreError, ErrorKind, Result};
