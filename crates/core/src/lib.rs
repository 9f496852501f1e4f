//! JARVIS core: the conversation turn loop and its tool adapters.
//!
//! A model reply may carry command markers such as `[CMD: CALENDAR]`. The
//! [`orchestrator`] scans for them with the [`command`] grammar, runs the one
//! data-fetch command it handles server-side, and re-prompts the model with
//! the result. Every provider failure is turned into a short spoken sentence.

pub mod command;
pub mod conversation;
pub mod error;
pub mod llm_client;
pub mod orchestrator;
pub mod prompt;
pub mod reply;
pub mod tools;

pub use command::{CommandInvocation, CommandName};
pub use conversation::{ChatTurn, ConversationContext, HistoryEntry, Role};
pub use error::ToolError;
pub use orchestrator::{Orchestrator, TurnState};
pub use reply::AssistantReply;
