//! Command Marker Grammar
//!
//! The language model signals tool usage by embedding bracketed markers in
//! its free-text reply, e.g. `[CMD: CALENDAR]` or `[CMD: SPOTIFY | lofi beats]`.
//! The marker syntax is a wire contract the model has been prompted with, so
//! it is matched literally.
//!
//! Scanning happens in two steps: [`tokenize`] splits the reply into text and
//! marker spans, then [`parse`] keeps the markers whose name belongs to the
//! fixed [`CommandName`] vocabulary. Unknown markers stay plain text.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

const MARKER_OPEN: &str = "[CMD: ";
const MARKER_CLOSE: char = ']';
const ARGUMENT_SEPARATOR: char = '|';

/// The fixed vocabulary of commands the model may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandName {
    Calendar,
    Weather,
    AddTask,
    ListTasks,
    Spotify,
    #[serde(rename = "LINKEDIN")]
    LinkedIn,
}

impl CommandName {
    pub const ALL: [CommandName; 6] = [
        CommandName::Calendar,
        CommandName::Weather,
        CommandName::AddTask,
        CommandName::ListTasks,
        CommandName::Spotify,
        CommandName::LinkedIn,
    ];

    /// The exact upper-case name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandName::Calendar => "CALENDAR",
            CommandName::Weather => "WEATHER",
            CommandName::AddTask => "ADD_TASK",
            CommandName::ListTasks => "LIST_TASKS",
            CommandName::Spotify => "SPOTIFY",
            CommandName::LinkedIn => "LINKEDIN",
        }
    }

    /// Commands whose result is fetched server-side and summarised by a
    /// second model turn. Everything else is left for the client to act on.
    pub fn is_data_fetch(&self) -> bool {
        matches!(self, CommandName::Calendar)
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a marker name is not part of the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command name: {0}")]
pub struct UnknownCommand(pub String);

impl FromStr for CommandName {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

/// A recognised marker: a command name plus its optional free-text argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandInvocation {
    pub name: CommandName,
    pub argument: Option<String>,
}

impl CommandInvocation {
    pub fn is_data_fetch(&self) -> bool {
        self.name.is_data_fetch()
    }
}

/// A lexical span of a model reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Text outside of any well-formed marker.
    Text(&'a str),
    /// A well-formed `[CMD: ...]` span. `name` is not validated yet.
    Marker {
        name: &'a str,
        argument: Option<&'a str>,
        raw: &'a str,
    },
}

impl<'a> Token<'a> {
    /// The exact source text this token covers.
    pub fn raw(&self) -> &'a str {
        match self {
            Token::Text(text) => *text,
            Token::Marker { raw, .. } => *raw,
        }
    }
}

/// Splits a reply into text and marker spans.
///
/// A marker opens with the literal `[CMD: ` and closes at the first `]`.
/// An opener without a closing bracket, e.g. from a truncated completion,
/// is plain text. Concatenating the `raw` of every token yields the input.
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    // `pending` is where the current run of plain text began.
    let mut pending = 0;
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find(MARKER_OPEN) {
        let start = cursor + offset;
        let body_start = start + MARKER_OPEN.len();
        let Some(body_len) = text[body_start..].find(MARKER_CLOSE) else {
            break;
        };
        let body = &text[body_start..body_start + body_len];

        // A second opener before the bracket means the first was never closed.
        if let Some(inner) = body.find(MARKER_OPEN) {
            cursor = body_start + inner;
            continue;
        }

        if pending < start {
            tokens.push(Token::Text(&text[pending..start]));
        }
        let end = body_start + body_len + MARKER_CLOSE.len_utf8();
        let (name, argument) = match body.split_once(ARGUMENT_SEPARATOR) {
            Some((name, argument)) => (
                name.trim_end(),
                Some(argument.strip_prefix(' ').unwrap_or(argument)),
            ),
            None => (body.trim_end(), None),
        };
        tokens.push(Token::Marker {
            name,
            argument,
            raw: &text[start..end],
        });
        cursor = end;
        pending = end;
    }

    if pending < text.len() {
        tokens.push(Token::Text(&text[pending..]));
    }
    tokens
}

/// Maps marker tokens with a known name to typed invocations, in order.
pub fn parse(tokens: &[Token<'_>]) -> Vec<CommandInvocation> {
    tokens
        .iter()
        .filter_map(|token| match token {
            Token::Marker { name, argument, .. } => {
                let name = name.parse::<CommandName>().ok()?;
                Some(CommandInvocation {
                    name,
                    argument: argument.map(str::to_string),
                })
            }
            Token::Text(_) => None,
        })
        .collect()
}

/// Finds every recognised command in a model reply, in order of appearance.
pub fn scan(text: &str) -> Vec<CommandInvocation> {
    parse(&tokenize(text))
}

/// The first invocation that must be fetched server-side, if any.
pub fn first_data_fetch(invocations: &[CommandInvocation]) -> Option<&CommandInvocation> {
    invocations.iter().find(|invocation| invocation.is_data_fetch())
}
