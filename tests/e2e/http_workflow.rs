//! Full run through the HTTP clients against mock servers.

use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;

use asset_miner::cancel::CancelToken;
use asset_miner::config::{LlmConfig, WorkspaceConfig};
use asset_miner::llm::LlmClient;
use asset_miner::pipeline::{self, RunOptions, Services, Tuning};
use asset_miner::workspace::WorkspaceClient;

const SPACE: &str = "/api/2.0/genie/spaces/space-1";

fn chat_reply(content: &str) -> serde_json::Value {
    json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
}

#[test]
fn examples_flow_through_workspace_and_llm_endpoints() {
    let workspace_server = MockServer::start();
    let llm_server = MockServer::start();

    workspace_server.mock(|when, then| {
        when.method(GET).path(format!("{SPACE}/conversations"));
        then.status(200).json_body(json!({
            "conversations": [
                {"conversation_id": "c1", "title": "Revenue", "created_timestamp": 1_700_000_000_000_i64}
            ]
        }));
    });
    workspace_server.mock(|when, then| {
        when.method(GET).path(format!("{SPACE}/conversations/c1/messages"));
        then.status(200).json_body(json!({
            "messages": [
                {"message_id": "q1", "content": "Revenue by region for recent orders"},
                {
                    "message_id": "a1",
                    "status": "COMPLETED",
                    "attachments": [{"query": {"query": "WITH r AS (SELECT * FROM orders) SELECT region, SUM(amount) FROM r GROUP BY region"}}]
                }
            ]
        }));
    });
    workspace_server.mock(|when, then| {
        when.method(GET).path(SPACE).query_param("include_serialized_space", "true");
        then.status(200).json_body(json!({"space_id": "space-1"}));
    });
    let update = workspace_server.mock(|when, then| {
        when.method(PATCH)
            .path(SPACE)
            .body_includes("example_question_sqls")
            .body_includes("Revenue by region for recent orders");
        then.status(200).json_body(json!({}));
    });

    llm_server.mock(|when, then| {
        when.method(POST).path("/chat");
        then.status(200).json_body(chat_reply(
            "{\"complexity\": \"complex\", \"reasoning\": \"CTE with aggregation\", \"has_ctes\": true}",
        ));
    });

    let workspace = WorkspaceClient::new(
        &WorkspaceConfig {
            host: workspace_server.base_url(),
            request_timeout: Duration::from_secs(5),
            ..WorkspaceConfig::default()
        },
        "space-1",
        Some("token".to_string()),
    )
    .unwrap();
    let llm = LlmClient::new(
        &LlmConfig {
            endpoint: llm_server.url("/chat"),
            ..LlmConfig::default()
        },
        None,
    )
    .unwrap();

    let services = Services {
        source: &workspace,
        classifier: &llm,
        extractor: &llm,
        generator: &llm,
        store: &workspace,
        engine: None,
    };
    let mut options = RunOptions::new("main", "assets");
    options.create_functions = false;
    options.register_functions = false;

    let report = pipeline::run(&services, &options, &Tuning::immediate(2), &CancelToken::new());

    assert!(report.is_success(), "{:?}", report.errors);
    assert_eq!(report.total_conversations, 1);
    assert_eq!(report.queries_extracted, 1);
    assert_eq!(report.complex_queries, 1);
    assert_eq!(report.examples_created, 1);
    update.assert();
}

#[test]
fn unreachable_workspace_aborts_run() {
    let workspace_server = MockServer::start();
    workspace_server.mock(|when, then| {
        when.method(GET).path(format!("{SPACE}/conversations"));
        then.status(403).body("PERMISSION_DENIED");
    });
    let workspace = WorkspaceClient::new(
        &WorkspaceConfig {
            host: workspace_server.base_url(),
            ..WorkspaceConfig::default()
        },
        "space-1",
        None,
    )
    .unwrap();
    let llm = LlmClient::new(
        &LlmConfig {
            endpoint: "http://127.0.0.1:9/chat".to_string(),
            ..LlmConfig::default()
        },
        None,
    )
    .unwrap();

    let services = Services {
        source: &workspace,
        classifier: &llm,
        extractor: &llm,
        generator: &llm,
        store: &workspace,
        engine: None,
    };
    let report = pipeline::run(
        &services,
        &RunOptions::new("main", "assets"),
        &Tuning::immediate(2),
        &CancelToken::new(),
    );

    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("Failed to extract queries"));
    assert!(report.errors[0].contains("403"));
}
