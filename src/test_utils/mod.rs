//! In-memory fakes for the pipeline's external seams.
//!
//! Every fake records the calls it receives so tests can assert on
//! traffic as well as results. State sits behind `parking_lot` mutexes so
//! the fakes are `Sync` and can be driven from the worker pool.

use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::Mutex;
use serde_json::Value;

use crate::engine::{ExecutionTarget, SqlEngine, StatementHandle, StatementState};
use crate::error::{MinerError, Result};
use crate::llm::{ClassificationService, ExtractionService, Purpose, Structured, TextGenerator};
use crate::models::{ComplexityAnalysis, ComplexityTier, ExtractedQuery, ParameterExtraction, Candidate};
use crate::registry::RegistryStore;
use crate::source::{Conversation, ConversationScope, ConversationSource, Message, Page};

// =============================================================================
// Builders
// =============================================================================

/// A complex analysis with joins and a CTE.
#[must_use]
pub fn complex_analysis() -> ComplexityAnalysis {
    ComplexityAnalysis {
        tier: ComplexityTier::Complex,
        reasoning: "Multiple joins with a CTE".to_string(),
        has_joins: true,
        has_subqueries: false,
        has_ctes: true,
        has_window_functions: false,
        has_aggregations: true,
        join_count: 3,
    }
}

/// A complex candidate without parameters.
#[must_use]
pub fn candidate(question: &str, sql: &str) -> Candidate {
    let query = ExtractedQuery {
        question: question.to_string(),
        sql: sql.to_string(),
        execution_time_ms: None,
        message_id: format!("msg-{}", question.len()),
        conversation_id: "conv-1".to_string(),
    };
    Candidate::new(&query, complex_analysis(), Vec::new(), None)
}

// =============================================================================
// Conversation source
// =============================================================================

#[derive(Default)]
struct SourceState {
    conversations: Vec<Conversation>,
    messages: HashMap<String, Vec<Message>>,
    full_messages: HashMap<(String, String), Message>,
    failing_conversations: HashSet<String>,
    fail_listing: bool,
    get_message_calls: usize,
}

/// Conversation source backed by vectors, paged by offset cursors.
pub struct FakeSource {
    page_size: usize,
    state: Mutex<SourceState>,
}

impl Default for FakeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            page_size: 100,
            state: Mutex::new(SourceState::default()),
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn add_conversation(&self, id: &str, title: Option<&str>, created_timestamp: Option<i64>) {
        self.state.lock().conversations.push(Conversation {
            id: id.to_string(),
            title: title.map(str::to_string),
            created_timestamp,
        });
    }

    pub fn add_message(&self, conversation_id: &str, message: Message) {
        self.state
            .lock()
            .messages
            .entry(conversation_id.to_string())
            .or_default()
            .push(message);
    }

    /// Full form of a message returned by `get_message`.
    pub fn set_full_message(&self, conversation_id: &str, message: Message) {
        let id = message.id.clone().unwrap_or_default();
        self.state
            .lock()
            .full_messages
            .insert((conversation_id.to_string(), id), message);
    }

    pub fn fail_messages_for(&self, conversation_id: &str) {
        self.state
            .lock()
            .failing_conversations
            .insert(conversation_id.to_string());
    }

    pub fn fail_listing(&self) {
        self.state.lock().fail_listing = true;
    }

    #[must_use]
    pub fn get_message_calls(&self) -> usize {
        self.state.lock().get_message_calls
    }

    fn page<T: Clone>(&self, items: &[T], cursor: Option<&str>) -> Result<Page<T>> {
        let start = match cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| MinerError::SourceUnavailable(format!("bad cursor {cursor}")))?,
            None => 0,
        };
        let end = (start + self.page_size).min(items.len());
        let page = items.get(start..end).map(<[T]>::to_vec).unwrap_or_default();
        let next_cursor = (end < items.len()).then(|| end.to_string());
        Ok(Page {
            items: page,
            next_cursor,
        })
    }
}

impl ConversationSource for FakeSource {
    fn list_conversations(
        &self,
        _scope: ConversationScope,
        cursor: Option<&str>,
    ) -> Result<Page<Conversation>> {
        let state = self.state.lock();
        if state.fail_listing {
            return Err(MinerError::SourceUnavailable("listing failed".to_string()));
        }
        self.page(&state.conversations, cursor)
    }

    fn list_messages(&self, conversation_id: &str, cursor: Option<&str>) -> Result<Page<Message>> {
        let state = self.state.lock();
        if state.failing_conversations.contains(conversation_id) {
            return Err(MinerError::SourceUnavailable(format!(
                "messages unavailable for {conversation_id}"
            )));
        }
        let messages = state.messages.get(conversation_id).cloned().unwrap_or_default();
        self.page(&messages, cursor)
    }

    fn get_message(&self, conversation_id: &str, message_id: &str) -> Result<Message> {
        let mut state = self.state.lock();
        state.get_message_calls += 1;
        state
            .full_messages
            .get(&(conversation_id.to_string(), message_id.to_string()))
            .cloned()
            .ok_or_else(|| MinerError::Api {
                status: 404,
                message: format!("message {message_id} not found"),
            })
    }
}

// =============================================================================
// Language model
// =============================================================================

#[derive(Default)]
struct LlmState {
    classifications: VecDeque<Structured<ComplexityAnalysis>>,
    extractions: VecDeque<Structured<ParameterExtraction>>,
    generations: HashMap<Purpose, VecDeque<Result<String>>>,
    classification_calls: usize,
    extraction_calls: usize,
    generate_calls: HashMap<Purpose, usize>,
}

/// Scripted model. An empty queue behaves like an unreachable service.
#[derive(Default)]
pub struct FakeLlm {
    state: Mutex<LlmState>,
}

impl FakeLlm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_classification(&self, reply: Structured<ComplexityAnalysis>) {
        self.state.lock().classifications.push_back(reply);
    }

    pub fn push_extraction(&self, reply: Structured<ParameterExtraction>) {
        self.state.lock().extractions.push_back(reply);
    }

    pub fn push_generation(&self, purpose: Purpose, reply: Result<String>) {
        self.state
            .lock()
            .generations
            .entry(purpose)
            .or_default()
            .push_back(reply);
    }

    #[must_use]
    pub fn classification_calls(&self) -> usize {
        self.state.lock().classification_calls
    }

    #[must_use]
    pub fn extraction_calls(&self) -> usize {
        self.state.lock().extraction_calls
    }

    #[must_use]
    pub fn generate_calls(&self, purpose: Purpose) -> usize {
        self.state
            .lock()
            .generate_calls
            .get(&purpose)
            .copied()
            .unwrap_or(0)
    }
}

impl ClassificationService for FakeLlm {
    fn classify_structured(&self, _system_prompt: &str, _sql: &str) -> Structured<ComplexityAnalysis> {
        let mut state = self.state.lock();
        state.classification_calls += 1;
        state
            .classifications
            .pop_front()
            .unwrap_or_else(|| Structured::Unavailable("no scripted classification".to_string()))
    }
}

impl ExtractionService for FakeLlm {
    fn extract_structured(
        &self,
        _system_prompt: &str,
        _sql: &str,
        _question: &str,
    ) -> Structured<ParameterExtraction> {
        let mut state = self.state.lock();
        state.extraction_calls += 1;
        state
            .extractions
            .pop_front()
            .unwrap_or_else(|| Structured::Unavailable("no scripted extraction".to_string()))
    }
}

impl TextGenerator for FakeLlm {
    fn generate(&self, purpose: Purpose, _system_prompt: &str, _user_prompt: &str) -> Result<String> {
        let mut state = self.state.lock();
        *state.generate_calls.entry(purpose).or_insert(0) += 1;
        state
            .generations
            .get_mut(&purpose)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(MinerError::LlmUnavailable(format!(
                    "no scripted {} reply",
                    purpose.as_str()
                )))
            })
    }
}

// =============================================================================
// SQL engine
// =============================================================================

#[derive(Default)]
struct EngineState {
    submitted: Vec<String>,
    scripted: VecDeque<StatementState>,
    persistent_failures: Vec<(String, String)>,
    queued_failures: Vec<(String, VecDeque<String>)>,
    polls: usize,
    next_id: usize,
}

impl EngineState {
    fn failure_for(&mut self, statement: &str) -> Option<String> {
        let queued = self
            .queued_failures
            .iter_mut()
            .filter(|(prefix, _)| statement.starts_with(prefix.as_str()))
            .find_map(|(_, errors)| errors.pop_front());
        if queued.is_some() {
            return queued;
        }
        self.persistent_failures
            .iter()
            .find(|(prefix, _)| statement.starts_with(prefix.as_str()))
            .map(|(_, error)| error.clone())
    }
}

/// Records submitted statements and answers from a script.
///
/// Unscripted statements succeed immediately. A statement matching a
/// failure prefix comes back already in the failed state.
#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<EngineState>,
}

impl FakeEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// States handed out in order: the first on submit, the rest on polls.
    pub fn script_states(&self, states: Vec<StatementState>) {
        self.state.lock().scripted = states.into();
    }

    /// Every statement starting with `prefix` fails with `error`.
    pub fn fail_matching(&self, prefix: &str, error: &str) {
        self.state
            .lock()
            .persistent_failures
            .push((prefix.to_string(), error.to_string()));
    }

    /// The next statements starting with `prefix` fail with `errors`, one each.
    pub fn fail_next_matching(&self, prefix: &str, errors: Vec<String>) {
        self.state
            .lock()
            .queued_failures
            .push((prefix.to_string(), errors.into()));
    }

    #[must_use]
    pub fn submitted(&self) -> Vec<String> {
        self.state.lock().submitted.clone()
    }

    #[must_use]
    pub fn count_matching(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .submitted
            .iter()
            .filter(|s| s.starts_with(prefix))
            .count()
    }

    #[must_use]
    pub fn poll_count(&self) -> usize {
        self.state.lock().polls
    }
}

impl SqlEngine for FakeEngine {
    fn submit(&self, statement: &str, _target: &ExecutionTarget) -> Result<StatementHandle> {
        let mut state = self.state.lock();
        state.submitted.push(statement.to_string());
        state.next_id += 1;
        let statement_id = format!("stmt-{}", state.next_id);
        let initial = match state.failure_for(statement) {
            Some(error) => StatementState::Failed(error),
            None => state.scripted.pop_front().unwrap_or(StatementState::Succeeded),
        };
        Ok(StatementHandle {
            statement_id,
            state: initial,
        })
    }

    fn poll(&self, _handle: &StatementHandle) -> Result<StatementState> {
        let mut state = self.state.lock();
        state.polls += 1;
        Ok(state.scripted.pop_front().unwrap_or(StatementState::Succeeded))
    }
}

// =============================================================================
// Registry store
// =============================================================================

#[derive(Default)]
struct StoreState {
    document: Option<Value>,
    put_error: Option<String>,
    get_error: Option<String>,
    puts: usize,
    gets: usize,
}

/// Registry document held in memory.
#[derive(Default)]
pub struct FakeStore {
    state: Mutex<StoreState>,
}

impl FakeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_document(document: Value) -> Self {
        let store = Self::new();
        store.state.lock().document = Some(document);
        store
    }

    #[must_use]
    pub fn document(&self) -> Option<Value> {
        self.state.lock().document.clone()
    }

    pub fn fail_puts(&self, message: &str) {
        self.state.lock().put_error = Some(message.to_string());
    }

    pub fn fail_gets(&self, message: &str) {
        self.state.lock().get_error = Some(message.to_string());
    }

    #[must_use]
    pub fn put_count(&self) -> usize {
        self.state.lock().puts
    }

    #[must_use]
    pub fn get_count(&self) -> usize {
        self.state.lock().gets
    }
}

impl RegistryStore for FakeStore {
    fn get_document(&self) -> Result<Option<Value>> {
        let mut state = self.state.lock();
        state.gets += 1;
        if let Some(error) = &state.get_error {
            return Err(MinerError::Registry(error.clone()));
        }
        Ok(state.document.clone())
    }

    fn put_document(&self, document: &Value) -> Result<()> {
        let mut state = self.state.lock();
        state.puts += 1;
        if let Some(error) = &state.put_error {
            return Err(MinerError::Registry(error.clone()));
        }
        state.document = Some(document.clone());
        Ok(())
    }
}
