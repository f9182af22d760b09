use std::time::Duration;

use reqwest::blocking::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::WorkspaceConfig;
use crate::engine::{ExecutionTarget, SqlEngine, StatementHandle, StatementState};
use crate::error::{MinerError, Result};
use crate::registry::RegistryStore;
use crate::source::{Conversation, ConversationScope, ConversationSource, Message, Page, PAGE_SIZE};
use crate::utils::truncate_string;

use super::wire::{
    ExecuteStatementRequest, ListConversationsResponse, ListMessagesResponse, SpaceResponse,
    StatementResponse, UpdateSpaceRequest,
};

/// Blocking client for one space of a workspace.
pub struct WorkspaceClient {
    base_url: String,
    space_id: String,
    token: Option<String>,
    http_client: reqwest::blocking::Client,
}

impl WorkspaceClient {
    pub fn new(config: &WorkspaceConfig, space_id: &str, token: Option<String>) -> Result<Self> {
        let host = config.host.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err(MinerError::MissingConfig("workspace.host".to_string()));
        }
        if space_id.trim().is_empty() {
            return Err(MinerError::MissingConfig("space id".to_string()));
        }
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{host}")
        };
        let http_client = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MinerError::Config(format!("HTTP client error: {e}")))?;
        Ok(Self {
            base_url,
            space_id: space_id.to_string(),
            token,
            http_client,
        })
    }

    fn space_url(&self, suffix: &str) -> String {
        format!(
            "{}/api/2.0/genie/spaces/{}{}",
            self.base_url,
            urlencoding::encode(&self.space_id),
            suffix
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.authorize(request).send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(MinerError::Api {
            status: status.as_u16(),
            message: truncate_string(&body, 500),
        })
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let url = with_query(url, query);
        debug!(url = %url, "GET");
        let response = self.send(self.http_client.get(&url))?;
        Ok(response.json()?)
    }

    fn page_query(cursor: Option<&str>) -> Vec<(&'static str, String)> {
        let mut query = vec![("page_size", PAGE_SIZE.to_string())];
        if let Some(token) = cursor.filter(|c| !c.is_empty()) {
            query.push(("page_token", token.to_string()));
        }
        query
    }
}

fn with_query(url: &str, query: &[(&str, String)]) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let pairs = query
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{url}?{pairs}")
}

fn source_error(err: MinerError) -> MinerError {
    match err {
        MinerError::Api { .. } => err,
        other => MinerError::SourceUnavailable(other.to_string()),
    }
}

impl ConversationSource for WorkspaceClient {
    fn list_conversations(&self, scope: ConversationScope, cursor: Option<&str>) -> Result<Page<Conversation>> {
        let mut query = Self::page_query(cursor);
        if scope.include_all() {
            query.push(("include_all", "true".to_string()));
        }
        let response: ListConversationsResponse = self
            .get_json(&self.space_url("/conversations"), &query)
            .map_err(source_error)?;
        Ok(Page {
            items: response.conversations,
            next_cursor: response.next_page_token,
        })
    }

    fn list_messages(&self, conversation_id: &str, cursor: Option<&str>) -> Result<Page<Message>> {
        let url = self.space_url(&format!(
            "/conversations/{}/messages",
            urlencoding::encode(conversation_id)
        ));
        let response: ListMessagesResponse = self
            .get_json(&url, &Self::page_query(cursor))
            .map_err(source_error)?;
        Ok(Page {
            items: response.messages,
            next_cursor: response.next_page_token,
        })
    }

    fn get_message(&self, conversation_id: &str, message_id: &str) -> Result<Message> {
        let url = self.space_url(&format!(
            "/conversations/{}/messages/{}",
            urlencoding::encode(conversation_id),
            urlencoding::encode(message_id)
        ));
        self.get_json(&url, &[]).map_err(source_error)
    }
}

impl SqlEngine for WorkspaceClient {
    fn submit(&self, statement: &str, target: &ExecutionTarget) -> Result<StatementHandle> {
        let body = ExecuteStatementRequest {
            warehouse_id: &target.warehouse_id,
            statement,
            catalog: &target.catalog,
            schema: &target.schema,
            wait_timeout: format!("{}s", target.wait_timeout.as_secs()),
        };
        let url = format!("{}/api/2.0/sql/statements", self.base_url);
        let response: StatementResponse = self.send(self.http_client.post(&url).json(&body))?.json()?;
        let state = response.state();
        debug!(statement_id = %response.statement_id, state = ?state, "Submitted statement");
        Ok(StatementHandle {
            statement_id: response.statement_id,
            state,
        })
    }

    fn poll(&self, handle: &StatementHandle) -> Result<StatementState> {
        let url = format!(
            "{}/api/2.0/sql/statements/{}",
            self.base_url,
            urlencoding::encode(&handle.statement_id)
        );
        let response: StatementResponse = self.get_json(&url, &[])?;
        Ok(response.state())
    }
}

impl RegistryStore for WorkspaceClient {
    fn get_document(&self) -> Result<Option<Value>> {
        let response: SpaceResponse = self
            .get_json(
                &self.space_url(""),
                &[("include_serialized_space", "true".to_string())],
            )
            .map_err(|e| MinerError::Registry(format!("failed to read space: {e}")))?;
        match response.serialized_space.filter(|s| !s.trim().is_empty()) {
            Some(serialized) => serde_json::from_str(&serialized)
                .map(Some)
                .map_err(|e| MinerError::Registry(format!("invalid serialized space: {e}"))),
            None => Ok(None),
        }
    }

    fn put_document(&self, document: &Value) -> Result<()> {
        let serialized = serde_json::to_string(document)?;
        let body = UpdateSpaceRequest {
            serialized_space: &serialized,
        };
        self.send(self.http_client.patch(self.space_url("")).json(&body))
            .map_err(|e| MinerError::Registry(format!("failed to update space: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(server: &MockServer) -> WorkspaceClient {
        let config = WorkspaceConfig {
            host: server.base_url(),
            ..WorkspaceConfig::default()
        };
        WorkspaceClient::new(&config, "space-1", Some("token-123".to_string())).unwrap()
    }

    fn target() -> ExecutionTarget {
        ExecutionTarget {
            warehouse_id: "wh-1".into(),
            catalog: "main".into(),
            schema: "assets".into(),
            wait_timeout: Duration::from_secs(30),
        }
    }

    // =========================================================================
    // Construction
    // =========================================================================

    #[test]
    fn missing_host_is_config_error() {
        let err = WorkspaceClient::new(&WorkspaceConfig::default(), "space-1", None)
            .err()
            .unwrap();
        assert!(matches!(err, MinerError::MissingConfig(ref key) if key == "workspace.host"));
    }

    // =========================================================================
    // Conversation source
    // =========================================================================

    #[test]
    fn lists_conversations_with_paging() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/2.0/genie/spaces/space-1/conversations")
                .query_param("page_size", "100")
                .query_param("page_token", "abc")
                .query_param("include_all", "true")
                .header("authorization", "Bearer token-123");
            then.status(200).json_body(json!({
                "conversations": [
                    {"conversation_id": "c1", "title": "Sales", "created_timestamp": 1_700_000_000_000_i64}
                ],
                "next_page_token": "def"
            }));
        });
        let page = client_for(&server)
            .list_conversations(ConversationScope::AllUsers, Some("abc"))
            .unwrap();
        mock.assert();
        assert_eq!(page.items[0].id, "c1");
        assert_eq!(page.items[0].created_timestamp, Some(1_700_000_000_000));
        assert_eq!(page.next_cursor.as_deref(), Some("def"));
    }

    #[test]
    fn lists_messages_with_attachments() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/2.0/genie/spaces/space-1/conversations/c1/messages");
            then.status(200).json_body(json!({
                "messages": [
                    {"id": "m1", "content": "Top customers?", "status": "COMPLETED"},
                    {"id": "m2", "status": "COMPLETED", "attachments": [
                        {"attachment_id": "a1", "query": {"query": "SELECT 1", "execution_time_ms": 42}}
                    ]}
                ]
            }));
        });
        let page = client_for(&server).list_messages("c1", None).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[1].sql(), Some("SELECT 1"));
        assert_eq!(page.items[1].execution_time_ms(), Some(42));
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn source_transport_errors_are_source_unavailable() {
        let config = WorkspaceConfig {
            host: "http://127.0.0.1:1".to_string(),
            ..WorkspaceConfig::default()
        };
        let client = WorkspaceClient::new(&config, "space-1", None).unwrap();
        let err = client.list_conversations(ConversationScope::Own, None).unwrap_err();
        assert!(matches!(err, MinerError::SourceUnavailable(_)));
    }

    #[test]
    fn api_errors_carry_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/2.0/genie/spaces/space-1/conversations");
            then.status(403).body("PERMISSION_DENIED");
        });
        let err = client_for(&server)
            .list_conversations(ConversationScope::Own, None)
            .unwrap_err();
        assert!(matches!(err, MinerError::Api { status: 403, ref message } if message.contains("PERMISSION_DENIED")));
    }

    // =========================================================================
    // SQL engine
    // =========================================================================

    #[test]
    fn submits_and_polls_statements() {
        let server = MockServer::start();
        let submit = server.mock(|when, then| {
            when.method(POST)
                .path("/api/2.0/sql/statements")
                .body_includes(r#""warehouse_id":"wh-1""#)
                .body_includes(r#""catalog":"main""#)
                .body_includes(r#""wait_timeout":"30s""#);
            then.status(200).json_body(json!({
                "statement_id": "s-1", "status": {"state": "PENDING"}
            }));
        });
        let poll = server.mock(|when, then| {
            when.method(GET).path("/api/2.0/sql/statements/s-1");
            then.status(200).json_body(json!({
                "statement_id": "s-1", "status": {"state": "SUCCEEDED"}
            }));
        });
        let client = client_for(&server);
        let handle = client.submit("SELECT 1", &target()).unwrap();
        assert_eq!(handle.state, StatementState::Pending);
        assert_eq!(client.poll(&handle).unwrap(), StatementState::Succeeded);
        submit.assert();
        poll.assert();
    }

    // =========================================================================
    // Registry store
    // =========================================================================

    #[test]
    fn reads_serialized_space() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/2.0/genie/spaces/space-1")
                .query_param("include_serialized_space", "true");
            then.status(200).json_body(json!({
                "space_id": "space-1",
                "serialized_space": "{\"version\":1,\"instructions\":{\"sql_functions\":[]}}"
            }));
        });
        let doc = client_for(&server).get_document().unwrap().unwrap();
        assert_eq!(doc["version"], 1);
    }

    #[test]
    fn missing_serialized_space_is_none() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/2.0/genie/spaces/space-1");
            then.status(200).json_body(json!({"space_id": "space-1"}));
        });
        assert!(client_for(&server).get_document().unwrap().is_none());
    }

    #[test]
    fn writes_whole_document_as_string() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PATCH)
                .path("/api/2.0/genie/spaces/space-1")
                .body_includes("serialized_space")
                .body_includes(r#"\"version\":1"#);
            then.status(200).json_body(json!({}));
        });
        client_for(&server)
            .put_document(&json!({"version": 1}))
            .unwrap();
        mock.assert();
    }

    #[test]
    fn write_failure_is_registry_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PATCH).path("/api/2.0/genie/spaces/space-1");
            then.status(500).body("boom");
        });
        let err = client_for(&server).put_document(&json!({})).unwrap_err();
        assert!(matches!(err, MinerError::Registry(ref m) if m.contains("boom")));
    }
}
