//! Conversation source abstraction.
//!
//! A source lists conversations and their messages page by page. The
//! workspace HTTP client implements it for real spaces; tests use the
//! in-memory fake from `test_utils`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Page size requested from paginated listings.
pub const PAGE_SIZE: u32 = 100;

/// Statuses that mean the assistant produced SQL for the message.
pub const SUCCESS_STATUSES: [MessageStatus; 2] =
    [MessageStatus::Completed, MessageStatus::ExecutingQuery];

/// Whose conversations to read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationScope {
    /// Only the caller's own conversations.
    #[default]
    Own,
    /// Every user's conversations (requires manage permission).
    AllUsers,
}

impl ConversationScope {
    #[must_use]
    pub const fn from_include_all(include_all_users: bool) -> Self {
        if include_all_users {
            Self::AllUsers
        } else {
            Self::Own
        }
    }

    #[must_use]
    pub const fn include_all(&self) -> bool {
        matches!(self, Self::AllUsers)
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

/// Conversation summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(rename = "conversation_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Creation time in epoch milliseconds.
    #[serde(default, alias = "created_time")]
    pub created_timestamp: Option<i64>,
}

/// Lifecycle state reported for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Submitted,
    FetchingMetadata,
    FilteringContext,
    AskingAi,
    PendingWarehouse,
    ExecutingQuery,
    Completed,
    Failed,
    Cancelled,
    QueryResultExpired,
    #[serde(other)]
    Unknown,
}

/// Query payload of an attachment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryAttachment {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub execution_time_ms: Option<i64>,
    #[serde(default)]
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub elapsed_time_ms: Option<i64>,
}

impl QueryAttachment {
    /// First timing field present, in milliseconds.
    #[must_use]
    pub fn timing_ms(&self) -> Option<i64> {
        self.execution_time_ms
            .or(self.duration_ms)
            .or(self.elapsed_time_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub attachment_id: Option<String>,
    #[serde(default)]
    pub query: Option<QueryAttachment>,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, alias = "message_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub status: Option<MessageStatus>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Message {
    #[must_use]
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    /// Content when present and non-empty.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.is_empty())
    }

    /// Whether the assistant successfully generated SQL for this message.
    ///
    /// Without a status, any attachment counts as success.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.status.map_or_else(
            || self.has_attachments(),
            |status| SUCCESS_STATUSES.contains(&status),
        )
    }

    /// First non-empty SQL carried by an attachment.
    #[must_use]
    pub fn sql(&self) -> Option<&str> {
        self.attachments
            .iter()
            .filter_map(|a| a.query.as_ref())
            .filter_map(|q| q.query.as_deref())
            .find(|sql| !sql.trim().is_empty())
    }

    /// Execution time reported by the first query attachment that has one.
    #[must_use]
    pub fn execution_time_ms(&self) -> Option<i64> {
        self.attachments
            .iter()
            .filter_map(|a| a.query.as_ref())
            .find_map(QueryAttachment::timing_ms)
    }
}

/// Paginated conversation source.
pub trait ConversationSource: Send + Sync {
    fn list_conversations(
        &self,
        scope: ConversationScope,
        cursor: Option<&str>,
    ) -> Result<Page<Conversation>>;

    fn list_messages(&self, conversation_id: &str, cursor: Option<&str>) -> Result<Page<Message>>;

    fn get_message(&self, conversation_id: &str, message_id: &str) -> Result<Message>;
}

/// Walk conversation pages until exhausted or `max` items are collected.
pub fn collect_conversations(
    source: &dyn ConversationSource,
    scope: ConversationScope,
    max: Option<usize>,
) -> Result<Vec<Conversation>> {
    let mut conversations = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = source.list_conversations(scope, cursor.as_deref())?;
        if page.items.is_empty() {
            break;
        }
        for conversation in page.items {
            if max.is_some_and(|max| conversations.len() >= max) {
                break;
            }
            conversations.push(conversation);
        }
        if max.is_some_and(|max| conversations.len() >= max) {
            break;
        }
        match page.next_cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => break,
        }
    }
    debug!(count = conversations.len(), "Listed conversations");
    Ok(conversations)
}

/// Walk every message page of a conversation.
pub fn collect_messages(source: &dyn ConversationSource, conversation_id: &str) -> Result<Vec<Message>> {
    let mut messages = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = source.list_messages(conversation_id, cursor.as_deref())?;
        if page.items.is_empty() {
            break;
        }
        messages.extend(page.items);
        match page.next_cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => break,
        }
    }
    Ok(messages)
}
