//! Conversation session state.
//!
//! A single [`SessionContext`] owns the bounded turn [`History`] and the
//! [`FileReferenceTable`], and turns each incoming utterance into one prompt
//! string for the inference backend.
//!
//! ## Exchange flow
//!
//! ```text
//! begin_exchange(user)  ── gate ──► resolve files → render prompt → record user turn
//!        │
//!        ▼ (inference, no history lock held)
//! Exchange::commit(reply) ────────► record assistant turn → evict → release gate
//! ```
//!
//! Exchanges are strictly sequential: a second caller waits on the exchange
//! gate until the first exchange commits or is dropped. History and file
//! reads never wait on the gate.

use crate::resolver::FileReferenceResolver;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};
use swallow_common::config::{AssistantLabel, SessionConfig};
use tokio::sync::{Mutex, MutexGuard};

/// Default history capacity in turns (10 exchanges).
pub const DEFAULT_MAX_TURNS: usize = 20;

// ============================================================================
// Turns & History
// ============================================================================

/// Speaker of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One role-tagged message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    role: Role,
    content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Ordered turn sequence capped at `max_turns` by [`History::evict`].
#[derive(Debug, Clone)]
pub struct History {
    turns: VecDeque<Turn>,
    max_turns: usize,
}

impl History {
    pub fn new() -> Self {
        Self::with_capacity_limit(DEFAULT_MAX_TURNS)
    }

    pub fn with_capacity_limit(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(max_turns + 1),
            max_turns,
        }
    }

    /// Append without evicting.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push_back(turn);
    }

    /// Drop the oldest turns until at most `max_turns` remain. Returns how many were dropped.
    pub fn evict(&mut self) -> usize {
        let excess = self.turns.len().saturating_sub(self.max_turns);
        self.turns.drain(..excess);
        excess
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn turns(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// File Reference Table
// ============================================================================

/// Content stored for an uploaded file.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub content: Vec<u8>,
    pub uploaded_at: DateTime<Utc>,
}

/// Uploaded files keyed by identifier. Lives for the process lifetime.
#[derive(Debug, Clone, Default)]
pub struct FileReferenceTable {
    entries: HashMap<String, FileEntry>,
}

impl FileReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an entry.
    pub fn insert(&mut self, id: String, content: Vec<u8>) {
        self.entries.insert(
            id,
            FileEntry {
                content,
                uploaded_at: Utc::now(),
            },
        );
    }

    pub fn get(&self, id: &str) -> Option<&FileEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(id, size)` pairs sorted by id.
    pub fn summaries(&self) -> Vec<(String, usize)> {
        let mut out: Vec<(String, usize)> = self
            .entries
            .iter()
            .map(|(id, entry)| (id.clone(), entry.content.len()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

// ============================================================================
// Prompt rendering
// ============================================================================

/// Assemble the inference prompt.
///
/// History turns (chronological, newline-terminated), then annotation lines
/// (newline-terminated), then `User: <user_text>` with no trailing newline.
pub fn render_prompt<'a, I>(
    turns: I,
    annotations: &[String],
    user_text: &str,
    assistant_label: AssistantLabel,
) -> String
where
    I: IntoIterator<Item = &'a Turn>,
{
    let mut prompt = String::new();

    for turn in turns {
        let label = match turn.role {
            Role::User => "User",
            Role::Assistant => assistant_label.as_str(),
        };
        prompt.push_str(label);
        prompt.push_str(": ");
        prompt.push_str(&turn.content);
        prompt.push('\n');
    }

    for line in annotations {
        prompt.push_str(line);
        prompt.push('\n');
    }

    prompt.push_str("User: ");
    prompt.push_str(user_text);
    prompt
}

// ============================================================================
// Session Context
// ============================================================================

/// Owner of conversation history and the file table.
pub struct SessionContext {
    history: RwLock<History>,
    files: RwLock<FileReferenceTable>,
    resolver: FileReferenceResolver,
    assistant_label: AssistantLabel,
    exchange_gate: Mutex<()>,
}

impl SessionContext {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            history: RwLock::new(History::with_capacity_limit(config.max_history_turns)),
            files: RwLock::new(FileReferenceTable::new()),
            resolver: FileReferenceResolver::new(),
            assistant_label: config.assistant_label,
            exchange_gate: Mutex::new(()),
        }
    }

    /// Annotation lines for the known files mentioned in `user_text`.
    pub fn resolve_files(&self, user_text: &str) -> Vec<String> {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        self.resolver.resolve(user_text, &files)
    }

    /// Render the prompt against the current history.
    pub fn render_prompt(&self, user_text: &str, annotations: &[String]) -> String {
        let history = self.history.read().unwrap_or_else(PoisonError::into_inner);
        render_prompt(history.iter(), annotations, user_text, self.assistant_label)
    }

    /// Append a turn. Assistant turns are followed by eviction; user turns never are.
    pub fn record_turn(&self, role: Role, content: impl Into<String>) -> usize {
        let mut history = self.history.write().unwrap_or_else(PoisonError::into_inner);
        Self::record_locked(&mut history, Turn::new(role, content))
    }

    fn record_locked(history: &mut History, turn: Turn) -> usize {
        let role = turn.role;
        history.push(turn);
        if role == Role::Assistant {
            let evicted = history.evict();
            if evicted > 0 {
                tracing::debug!(evicted, remaining = history.len(), "History evicted");
            }
        }
        history.len()
    }

    /// Start an exchange: wait for the previous exchange to finish, snapshot
    /// the prompt, and record the user turn.
    pub async fn begin_exchange(&self, user_text: &str) -> Exchange<'_> {
        let gate = self.exchange_gate.lock().await;

        let annotations = self.resolve_files(user_text);

        let prompt = {
            let mut history = self.history.write().unwrap_or_else(PoisonError::into_inner);
            let prompt =
                render_prompt(history.iter(), &annotations, user_text, self.assistant_label);
            Self::record_locked(&mut history, Turn::user(user_text));
            prompt
        };

        Exchange {
            session: self,
            prompt,
            annotations: annotations.len(),
            _gate: gate,
        }
    }

    /// Copy of the current history.
    pub fn history_snapshot(&self) -> Vec<Turn> {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .turns()
    }

    pub fn history_len(&self) -> usize {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn max_turns(&self) -> usize {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .max_turns()
    }

    /// Upload hook. Generates an id when none is given; returns the id used.
    pub fn upload(&self, file_id: Option<String>, content: Vec<u8>) -> String {
        let id = file_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(generate_file_id);
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        files.insert(id.clone(), content);
        id
    }

    /// Download hook. `None` when the id is unknown.
    pub fn download(&self, file_id: &str) -> Option<Vec<u8>> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(file_id)
            .map(|entry| entry.content.clone())
    }

    pub fn list_files(&self) -> Vec<(String, usize)> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .summaries()
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}

/// An in-flight exchange holding the exchange gate.
///
/// Dropping it without [`Exchange::commit`] releases the gate and leaves the
/// user turn in history.
pub struct Exchange<'a> {
    session: &'a SessionContext,
    prompt: String,
    annotations: usize,
    _gate: MutexGuard<'a, ()>,
}

impl Exchange<'_> {
    /// Prompt snapshot taken when the exchange began.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Number of file annotation lines in the prompt.
    pub fn annotation_count(&self) -> usize {
        self.annotations
    }

    /// Record the assistant reply, evict, and release the gate. Returns the history length.
    pub fn commit(self, reply: impl Into<String>) -> usize {
        self.session.record_turn(Role::Assistant, reply)
    }
}

/// Generate an identifier for an upload that arrived without one.
fn generate_file_id() -> String {
    let timestamp = Utc::now().timestamp_millis();
    let random = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
    format!("file-{}-{}", timestamp, random)
}
