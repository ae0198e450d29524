// Certvault — CLI Module
//
// Command-line interface using clap derive macros.
// Subcommands: import, list, show, export, rename, comment, delete, attach,
// detach, audit, remind.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

pub use commands::execute;

/// Certvault — a local store for certificates, keys, requests, CRLs and templates.
#[derive(Parser, Debug)]
#[command(name = "certvault")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Database file (default: <data dir>/certvault/certvault.db).
    #[arg(long, global = true, env = "CERTVAULT_DB")]
    pub db: Option<PathBuf>,

    /// Encrypt the database with a key derived from this passphrase.
    #[arg(long, global = true, env = "CERTVAULT_PASSPHRASE", hide_env_values = true)]
    pub passphrase: Option<String>,

    /// Prefix PEM exports with the artifact's name and comment.
    #[arg(long, global = true, env = "CERTVAULT_PEM_COMMENT")]
    pub pem_comment: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Pem,
    Der,
    Base64,
    Dump,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import artifacts from PEM, DER or template files.
    Import {
        /// Files to import. PEM files may hold several blocks.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show the artifact tree.
    List {
        /// Case-insensitive regular expression over names, comments and identities.
        #[arg(long)]
        filter: Option<String>,

        /// Treat the filter as plain text.
        #[arg(long, default_value = "false")]
        literal: bool,
    },

    /// Print the details of one artifact.
    Show {
        /// Store key of the artifact.
        key: String,
    },

    /// Export an artifact.
    Export {
        /// Store key of the artifact.
        key: String,

        #[arg(long, value_enum, default_value = "pem")]
        format: ExportFormat,

        /// Output file (default: stdout, or the default export name with --save).
        #[arg(long)]
        out: Option<PathBuf>,

        /// Write to the artifact's default export name in the current directory.
        #[arg(long, conflicts_with = "out")]
        save: bool,

        /// Export the private half of a key instead of the public one.
        #[arg(long)]
        private: bool,
    },

    /// Change the display name of an artifact.
    Rename {
        key: String,
        name: String,
    },

    /// Replace the comment of an artifact.
    Comment {
        key: String,
        text: String,
    },

    /// Delete an artifact and everything below it.
    Delete {
        key: String,
    },

    /// Move an artifact under another one.
    Attach {
        /// The artifact to move.
        child: String,
        /// Its new parent.
        parent: String,
    },

    /// Make an artifact a root; its children move with it.
    Detach {
        key: String,
    },

    /// View the audit log of an artifact.
    Audit {
        key: String,
    },

    /// Print an iCalendar expiry reminder for an artifact.
    Remind {
        key: String,
    },
}
