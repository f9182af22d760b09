//! Request and response bodies of the workspace REST API.

use serde::{Deserialize, Serialize};

use crate::engine::StatementState;
use crate::source::{Conversation, Message};

#[derive(Debug, Deserialize)]
pub struct ListConversationsResponse {
    #[serde(default)]
    pub conversations: Vec<Conversation>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListMessagesResponse {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SpaceResponse {
    #[serde(default)]
    pub serialized_space: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateSpaceRequest<'a> {
    pub serialized_space: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ExecuteStatementRequest<'a> {
    pub warehouse_id: &'a str,
    pub statement: &'a str,
    pub catalog: &'a str,
    pub schema: &'a str,
    pub wait_timeout: String,
}

#[derive(Debug, Deserialize)]
pub struct StatementResponse {
    pub statement_id: String,
    #[serde(default)]
    pub status: Option<StatementStatus>,
}

#[derive(Debug, Deserialize)]
pub struct StatementStatus {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<StatementError>,
}

#[derive(Debug, Deserialize)]
pub struct StatementError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
}

impl StatementError {
    fn describe(&self) -> String {
        match (&self.message, &self.error_code) {
            (Some(message), _) if !message.is_empty() => message.clone(),
            (_, Some(code)) => code.clone(),
            _ => "Unknown error".to_string(),
        }
    }
}

impl StatementStatus {
    /// Map the wire state onto [`StatementState`].
    pub fn to_state(&self) -> StatementState {
        let error = || {
            self.error
                .as_ref()
                .map_or_else(|| "Unknown error".to_string(), StatementError::describe)
        };
        match self.state.as_deref() {
            Some("PENDING") | None => StatementState::Pending,
            Some("RUNNING") => StatementState::Running,
            Some("SUCCEEDED") => StatementState::Succeeded,
            Some("FAILED") => StatementState::Failed(error()),
            Some(other) => StatementState::Failed(format!("statement ended in state {other}: {}", error())),
        }
    }
}

impl StatementResponse {
    pub fn state(&self) -> StatementState {
        self.status
            .as_ref()
            .map_or(StatementState::Pending, StatementStatus::to_state)
    }
}
