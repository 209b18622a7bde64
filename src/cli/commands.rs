use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "voltdesk", version, about = "Voltdesk Scooter Support Chat Server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the config file path globally
    #[arg(short, long, global = true, default_value = "config.yaml")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    Serve,

    /// Enter interactive terminal chat mode for a session
    Chat {
        /// The UUID of the session to open
        #[arg(short, long)]
        session: Uuid,

        /// The UUID of the user acting as the caller
        #[arg(short, long)]
        user: Uuid,
    },

    /// Manage chat sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Manage the curated domain questions
    Questions {
        #[command(subcommand)]
        action: QuestionAction,
    },
}

#[derive(Subcommand)]
pub enum SessionAction {
    /// Create a new session for a user
    Create {
        #[arg(short, long)]
        user: Uuid,
    },

    /// List a user's sessions (only those with at least one user message)
    List {
        #[arg(short, long)]
        user: Uuid,
    },

    /// Delete a session and its messages (asks for confirmation)
    Delete {
        id: Uuid,
        #[arg(short, long)]
        user: Uuid,
    },
}

#[derive(Subcommand)]
pub enum QuestionAction {
    /// List all domain questions, active or not
    List,

    /// Add a question
    Add {
        question: String,
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Flip a question's active flag
    Toggle { id: Uuid },

    /// Delete a question
    Delete { id: Uuid },

    /// Insert the sample starter questions
    Seed,
}
