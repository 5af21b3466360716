//! docscout - full-text search over a local tree of mixed document formats.
//!
//! docscout walks a directory of HTML, LaTeX, and MCTDH-style plain-text
//! files (`.inp`, `.op`), strips the markup per format, and looks for a
//! case-insensitive substring, returning context snippets around the first
//! match. The same search is exposed to AI agents over MCP and declared as
//! a callable tool when relaying a chat to the Gemini API.
//!
//! # Quick start
//!
//! ```no_run
//! use docscout::search::{self, SearchOptions};
//!
//! let mut options = SearchOptions::new("relaxation", "/home/user/mctdh");
//! options.exclusions = vec!["/home/user/mctdh/docs_tool".into()];
//!
//! for result in search::search(&options).unwrap() {
//!     println!("{}: {}", result.relative_path.display(), result.snippet);
//! }
//! ```
//!
//! No index is built or persisted; every search is an independent,
//! stateless pass over the live filesystem.

pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod mcp;
pub mod search;

pub use chat::{ChatSession, SearchScope};
pub use config::{Config, ConfigDir};
pub use error::{Error, Result};
pub use extract::Extractor;
pub use search::{SearchOptions, SearchResult};
