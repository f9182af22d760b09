//! Query extraction from conversation logs.
//!
//! Pairs each user question with the SQL the assistant generated for it and
//! drops questions already seen in the run (compared after normalization).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::models::ExtractedQuery;
use crate::source::{
    collect_conversations, collect_messages, Conversation, ConversationScope, ConversationSource,
    Message,
};
use crate::timestamp::TimeWindow;
use crate::utils::{normalize_question, truncate_string};

/// Title used when a conversation has none.
const UNTITLED: &str = "Untitled";

/// Extraction limits and filters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    pub scope: ConversationScope,
    pub max_conversations: Option<usize>,
    pub window: TimeWindow,
}

/// Counters gathered while walking the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractStats {
    pub conversations: usize,
    pub messages: usize,
    pub duplicates_skipped: usize,
    pub outside_window: usize,
    pub unreadable_conversations: usize,
}

/// Extracted queries plus the counters behind them.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub queries: Vec<ExtractedQuery>,
    pub stats: ExtractStats,
}

/// Walks a [`ConversationSource`] and produces unique question/SQL pairs.
pub struct QueryExtractor<'a> {
    source: &'a dyn ConversationSource,
    options: ExtractOptions,
}

impl<'a> QueryExtractor<'a> {
    #[must_use]
    pub fn new(source: &'a dyn ConversationSource, options: ExtractOptions) -> Self {
        Self { source, options }
    }

    /// Extract every unique query.
    ///
    /// Failing to list conversations is fatal. Failing to read one
    /// conversation's messages skips that conversation.
    pub fn extract(&self) -> Result<Extraction> {
        info!(
            scope = ?self.options.scope,
            max_conversations = ?self.options.max_conversations,
            "Fetching conversations"
        );
        let listed = if self.options.window.is_unbounded() {
            collect_conversations(self.source, self.options.scope, self.options.max_conversations)?
        } else {
            collect_conversations(self.source, self.options.scope, None)?
        };

        let mut stats = ExtractStats::default();
        let mut conversations = Vec::with_capacity(listed.len());
        for conversation in listed {
            if self.options.window.contains(conversation.created_timestamp) {
                conversations.push(conversation);
            } else {
                stats.outside_window += 1;
            }
        }
        if let Some(max) = self.options.max_conversations {
            conversations.truncate(max);
        }
        if stats.outside_window > 0 {
            info!(
                excluded = stats.outside_window,
                "Excluded conversations outside the time window"
            );
        }

        let mut seen = HashSet::new();
        let mut queries = Vec::new();
        for conversation in &conversations {
            stats.conversations += 1;
            let messages = match collect_messages(self.source, &conversation.id) {
                Ok(messages) => messages,
                Err(err) => {
                    warn!(conversation_id = %conversation.id, error = %err, "Failed to list messages");
                    stats.unreadable_conversations += 1;
                    continue;
                }
            };
            stats.messages += messages.len();
            self.pair_messages(conversation, messages, &mut seen, &mut queries, &mut stats);
        }

        if stats.duplicates_skipped > 0 {
            info!(skipped = stats.duplicates_skipped, "Skipped duplicate questions");
        }
        info!(
            queries = queries.len(),
            conversations = stats.conversations,
            messages = stats.messages,
            "Extracted unique queries"
        );
        Ok(Extraction { queries, stats })
    }

    fn pair_messages(
        &self,
        conversation: &Conversation,
        messages: Vec<Message>,
        seen: &mut HashSet<String>,
        queries: &mut Vec<ExtractedQuery>,
        stats: &mut ExtractStats,
    ) {
        let title = conversation
            .title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(UNTITLED);
        debug!(conversation_id = %conversation.id, title = %truncate_string(title, 50), "Processing conversation");

        let mut pending_question: Option<String> = None;
        for (index, message) in messages.into_iter().enumerate() {
            if !message.has_attachments() {
                if let Some(content) = message.text() {
                    pending_question = Some(content.to_string());
                    continue;
                }
            }
            // Listings may omit attachments; a bare completed message is fetched in full.
            if !message.is_successful() {
                debug!(status = ?message.status, "Skipping message without successful status");
                continue;
            }

            let Some((message, sql)) = self.resolve_sql(&conversation.id, message) else {
                continue;
            };

            let question = pending_question
                .take()
                .or_else(|| message.text().map(str::to_string))
                .unwrap_or_else(|| title.to_string());

            if !seen.insert(normalize_question(&question)) {
                debug!(question = %truncate_string(&question, 60), "Skipping duplicate question");
                stats.duplicates_skipped += 1;
                continue;
            }

            let message_id = message
                .id
                .clone()
                .unwrap_or_else(|| format!("{}_{index}", conversation.id));
            debug!(question = %truncate_string(&question, 60), "Extracted SQL");
            queries.push(ExtractedQuery {
                question,
                sql,
                execution_time_ms: message.execution_time_ms(),
                message_id,
                conversation_id: conversation.id.clone(),
            });
        }
    }

    /// Inline SQL, or SQL recovered by fetching the full message.
    fn resolve_sql(&self, conversation_id: &str, message: Message) -> Option<(Message, String)> {
        if let Some(sql) = message.sql() {
            let sql = sql.to_string();
            return Some((message, sql));
        }
        let message_id = message.id.as_deref()?;
        match self.source.get_message(conversation_id, message_id) {
            Ok(full) => {
                let sql = full.sql()?.to_string();
                Some((full, sql))
            }
            Err(err) => {
                warn!(message_id = %message_id, error = %err, "Failed to fetch message");
                None
            }
        }
    }
}
