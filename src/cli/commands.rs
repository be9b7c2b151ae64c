//! Command handlers.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use tracing::info;

use crate::agent::AgentSession;
use crate::config::Settings;
use crate::error::{ChattrError, Result};
use crate::knowledge::{chunk_text, KnowledgeDocument, KnowledgeIndex, QdrantIndex};
use crate::mcp::load_descriptors;
use crate::provider::create_embedder;
use crate::response::{run_turn, TurnState};
use crate::types::{ToolStatus, UserMessage};

use super::{ChatArgs, IngestArgs, ServeArgs};

pub async fn serve(mut settings: Settings, args: ServeArgs) -> Result<()> {
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    let session = AgentSession::from_settings(&settings)?;
    crate::server::serve(&settings.server, session).await
}

/// One turn in the terminal: text streams to stdout, tool activity and media to stderr.
pub async fn chat(settings: Settings, args: ChatArgs) -> Result<()> {
    let session = AgentSession::from_settings(&settings)?;
    let mut message = UserMessage::new(args.text);
    message.attachments = args.attachments;

    let mut snapshots = run_turn(&session, message, Vec::new(), args.session);
    let mut printed_chars = 0;
    let mut reported_activities = 0;
    let mut outcome = TurnState::Idle;

    while let Some(snapshot) = snapshots.next().await {
        outcome = snapshot.state;
        let message = &snapshot.message;
        if snapshot.state.is_terminal() && snapshot.state != TurnState::Completed {
            println!("{}", message.text);
            break;
        }

        let new_text: String = message.text.chars().skip(printed_chars).collect();
        if !new_text.is_empty() {
            print!("{new_text}");
            let _ = std::io::stdout().flush();
            printed_chars += new_text.chars().count();
        }
        for activity in message.activities.iter().skip(reported_activities) {
            if activity.status == ToolStatus::Started {
                eprintln!("\n[tool] {}", activity.name);
            }
        }
        reported_activities = message.activities.len();

        if snapshot.state == TurnState::Completed {
            println!();
            for activity in &message.activities {
                let mark = if activity.is_error { "failed" } else { "ok" };
                eprintln!("[tool] {} {mark}", activity.name);
            }
            if let Some(audio) = &message.audio_ref {
                eprintln!("[audio] {audio}");
            }
            if let Some(video) = &message.video_ref {
                eprintln!("[video] {video}");
            }
        }
    }

    session.close().await;
    match outcome {
        TurnState::Completed | TurnState::Blocked => Ok(()),
        _ => Err(ChattrError::upstream_message(
            crate::error::Collaborator::Model,
            "turn did not complete",
        )),
    }
}

/// Print a redacted summary of the effective configuration.
pub fn check_config(settings: &Settings) -> Result<()> {
    let servers = load_descriptors(&settings.mcp.path)?;

    println!("model:            {} @ {}", settings.model.name, settings.model.url);
    println!("api key:          {}", settings.model.require_api_key()?);
    println!("temperature:      {}", settings.model.temperature);
    println!("embeddings:       {} ({} dims)", settings.model.embedding_name, settings.model.embedding_dims);
    println!("vector database:  {} / {}", settings.vector_database.url, settings.vector_database.name);
    println!("session store:    {}", settings.session_store_url());
    println!("assets:           {}", settings.directory.assets().display());
    println!("character:        {}", settings.character.name);
    println!("timezone:         {}", settings.tz());
    println!("tool file:        {}", settings.mcp.path.display());
    for server in &servers {
        let endpoint = server
            .url
            .clone()
            .or_else(|| server.command.clone())
            .unwrap_or_default();
        println!("  - {} ({}) {}", server.name, server.transport, endpoint);
    }
    Ok(())
}

/// Chunk, embed and upsert text files.
pub async fn ingest(settings: Settings, args: IngestArgs) -> Result<()> {
    let embedder = create_embedder(&settings.model)?;
    let index = QdrantIndex::new(&settings.vector_database, Arc::clone(&embedder));
    index.ensure_collection().await?;

    let mut total = 0;
    for file in &args.files {
        let documents = read_documents(file)?;
        let written = index.upsert(&documents).await?;
        info!(file = %file.display(), chunks = written, "ingested file");
        total += written;
    }
    println!("indexed {total} chunks into '{}'", index.collection());
    Ok(())
}

fn read_documents(path: &Path) -> Result<Vec<KnowledgeDocument>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        ChattrError::Validation(format!("Cannot read {}: {e}", path.display()))
    })?;
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());
    Ok(chunk_text(&text)
        .into_iter()
        .map(|content| KnowledgeDocument {
            content,
            source: source.clone(),
        })
        .collect())
}
