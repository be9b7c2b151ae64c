//! chattr: chat with a historical character.
//!
//! A user message goes through input guardrails, picks up stored history and
//! knowledge context, and drives a tool-using model loop. The loop's events
//! are folded into one assistant message (text, optional audio, optional
//! video) that is re-emitted after every event.
//!
//! # Quick Start
//!
//! ```no_run
//! use chattr::prelude::*;
//! use futures::StreamExt;
//!
//! # async fn example() -> chattr::error::Result<()> {
//! let settings = Settings::load()?;
//! let session = AgentSession::from_settings(&settings)?;
//! let mut snapshots = run_turn(&session, UserMessage::new("Bonjour!"), Vec::new(), None);
//! while let Some(snapshot) = snapshots.next().await {
//!     println!("{:?}: {}", snapshot.state, snapshot.message.text);
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod guardrail;
pub mod knowledge;
pub mod logging;
pub mod mcp;
pub mod media;
pub mod memory;
pub mod prelude;
pub mod provider;
pub mod response;
pub mod server;
pub mod tools;
pub mod types;
