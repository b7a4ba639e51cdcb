use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "docassist", version, about = "Document assistant chat proxy", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the config file path globally
    #[arg(short, long, global = true, default_value = "config.yaml")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API and WebSocket server
    Serve,

    /// Enter interactive CLI chat REPL mode
    Chat(ChatArgs),

    /// Manage the files attached to the assistant
    Files {
        #[command(subcommand)]
        action: FileAction,
    },

    /// List the chat models the assistant can use
    Models,

    /// Show the assistant's configuration
    Config,
}

#[derive(Args, Debug, Default)]
pub struct ChatArgs {
    /// Model to request
    #[arg(short, long)]
    pub model: Option<String>,

    /// Sampling temperature between 0 and 1
    #[arg(short, long)]
    pub temperature: Option<f32>,

    /// Send only the latest message instead of the whole conversation
    #[arg(long)]
    pub no_history: bool,

    /// Ask the assistant for citation highlights
    #[arg(long)]
    pub highlights: bool,

    /// Append sources and citations to each answer
    #[arg(long)]
    pub citations: bool,

    /// Score every answer against this ground-truth text
    #[arg(long)]
    pub ground_truth: Option<String>,

    /// Do not derive a resource filter from the question
    #[arg(long)]
    pub no_auto_categorize: bool,

    /// Characters read from each retrieved snippet
    #[arg(long)]
    pub snippet_size: Option<u32>,

    /// Number of snippets to retrieve
    #[arg(long)]
    pub top_k: Option<u32>,

    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    #[arg(long)]
    pub specialty: Option<String>,
    #[arg(long)]
    pub document_type: Option<String>,
    #[arg(long)]
    pub user_role: Option<String>,
    #[arg(long)]
    pub resource: Option<String>,
    #[arg(long)]
    pub department: Option<String>,
    #[arg(long)]
    pub priority: Option<String>,
    #[arg(long)]
    pub date_range: Option<String>,
}

#[derive(Subcommand)]
pub enum FileAction {
    /// List all files
    List,

    /// Upload a file with optional JSON metadata
    Upload {
        /// Path of the file to upload
        path: String,
        /// Metadata as a JSON object
        #[arg(short, long)]
        metadata: Option<String>,
    },

    /// Delete a file
    Delete {
        id: String,
    },

    /// Replace a file's metadata
    UpdateMetadata {
        id: String,
        /// Metadata as a JSON object
        #[arg(short, long)]
        metadata: String,
    },
}
