//! Command-line interface.

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// chattr: chat with a historical character
#[derive(Parser, Debug)]
#[command(name = "chattr", version, about = "Chat with a historical character")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP chat server
    Serve(ServeArgs),
    /// Send one message and print the reply
    Chat(ChatArgs),
    /// Load settings and the tool file, then print a summary
    CheckConfig,
    /// Add text files to the knowledge index
    Ingest(IngestArgs),
}

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Override SERVER__HOST
    #[arg(long)]
    pub host: Option<String>,

    /// Override SERVER__PORT
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Message text
    pub text: String,

    /// File to attach (repeatable)
    #[arg(short, long = "attach")]
    pub attachments: Vec<PathBuf>,

    /// Session id for stored history
    #[arg(short, long)]
    pub session: Option<String>,
}

#[derive(Parser, Debug)]
pub struct IngestArgs {
    /// Text files to index
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}
