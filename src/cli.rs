use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "docscout",
    about = "Full-text search over local HTML/LaTeX/MCTDH document trees"
)]
pub struct Cli {
    /// Override the XDG config directory
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search the document tree for a substring
    Search(SearchArgs),
    /// Chat with Gemini; the model can call the local search as a tool
    Chat(ChatArgs),
    /// Start MCP server exposing local_file_search for AI agent integration
    Mcp(McpArgs),
    /// Open a result path with the system default application
    Open(OpenArgs),
    /// Manage the stored Gemini API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
    /// Inspect or edit the persistent configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    /// Root directory to search (defaults to the configured root)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Absolute path to exclude; may be repeated. Added on top of the
    /// configured exclusions.
    #[arg(long = "exclude")]
    pub exclusions: Vec<PathBuf>,

    /// Target file extension (e.g. .tex); may be repeated
    #[arg(long = "ext")]
    pub extensions: Vec<String>,

    /// Subdirectory of the root to narrow the walk to
    #[arg(long)]
    pub sub_dir: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,

    /// Output only absolute file paths (one per line)
    #[arg(long)]
    pub files: bool,
}

// -- Chat --

#[derive(Debug, Parser)]
pub struct ChatArgs {
    /// Root directory the model's file search tool is scoped to
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Gemini model name (defaults to the configured model)
    #[arg(long)]
    pub model: Option<String>,
}

// -- Mcp --

#[derive(Debug, Parser)]
pub struct McpArgs {
    /// Root directory the local_file_search tool is scoped to
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Absolute path to exclude; may be repeated
    #[arg(long = "exclude")]
    pub exclusions: Vec<PathBuf>,
}

// -- Open --

#[derive(Debug, Parser)]
pub struct OpenArgs {
    /// Path relative to the configured root (as printed in results)
    pub path: PathBuf,

    /// Resolve against this root instead of the configured one
    #[arg(long)]
    pub root: Option<PathBuf>,
}

// -- Key --

#[derive(Debug, Subcommand)]
pub enum KeyAction {
    /// Store the Gemini API key in the config directory
    Set {
        /// The API key value
        key: String,
    },
    /// Print whether a key is configured (never prints the key itself)
    Show,
    /// Remove the stored key
    Clear,
}

// -- Config --

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the resolved configuration
    Show,
    /// Set the default root directory
    SetRoot {
        /// Absolute path to the document tree
        path: PathBuf,
    },
    /// Add an absolute path to the exclusion list
    AddExclusion {
        /// Absolute path whose subtree is never searched
        path: PathBuf,
    },
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "docscout",
            &mut std::io::stdout(),
        );
    }
}
