//! Scenario fixture wiring the pipeline to in-memory collaborators.

use asset_miner::cancel::CancelToken;
use asset_miner::models::Report;
use asset_miner::pipeline::{self, RunOptions, Services, Tuning};
use asset_miner::source::{Attachment, Message, MessageStatus, QueryAttachment};
use asset_miner::test_utils::{FakeEngine, FakeLlm, FakeSource, FakeStore};

pub const CTE_SQL: &str = "WITH recent AS (SELECT * FROM orders WHERE order_date >= '2024-01-01') \
     SELECT c.region, SUM(r.amount) FROM recent r JOIN customers c ON r.customer_id = c.id GROUP BY c.region";

pub const SIMPLE_SQL: &str = "SELECT * FROM orders";

pub struct Scenario {
    pub source: FakeSource,
    pub llm: FakeLlm,
    pub store: FakeStore,
    pub engine: FakeEngine,
    pub cancel: CancelToken,
    conversations: usize,
}

impl Scenario {
    pub fn new() -> Self {
        Self {
            source: FakeSource::new(),
            llm: FakeLlm::new(),
            store: FakeStore::new(),
            engine: FakeEngine::new(),
            cancel: CancelToken::new(),
            conversations: 0,
        }
    }

    /// One conversation holding a question and its answered SQL.
    pub fn conversation(&mut self, question: &str, sql: &str) -> &mut Self {
        self.conversations += 1;
        let id = format!("conv-{}", self.conversations);
        self.source.add_conversation(&id, Some(question), Some(1_700_000_000_000));
        self.source.add_message(
            &id,
            Message {
                content: Some(question.to_string()),
                ..Message::default()
            },
        );
        self.source.add_message(
            &id,
            Message {
                id: Some(format!("{id}-answer")),
                content: None,
                status: Some(MessageStatus::Completed),
                attachments: vec![Attachment {
                    attachment_id: Some(format!("{id}-att")),
                    query: Some(QueryAttachment {
                        query: Some(sql.to_string()),
                        execution_time_ms: Some(250),
                        ..QueryAttachment::default()
                    }),
                }],
            },
        );
        self
    }

    pub fn options(&self) -> RunOptions {
        let mut options = RunOptions::new("main", "assets");
        options.warehouse_id = Some("wh-1".to_string());
        options.workers = 2;
        options
    }

    pub fn run(&self, options: &RunOptions) -> Report {
        let services = Services {
            source: &self.source,
            classifier: &self.llm,
            extractor: &self.llm,
            generator: &self.llm,
            store: &self.store,
            engine: Some(&self.engine),
        };
        pipeline::run(&services, options, &Tuning::immediate(2), &self.cancel)
    }

    pub fn example_count(&self) -> usize {
        self.section_len("example_question_sqls")
    }

    pub fn function_count(&self) -> usize {
        self.section_len("sql_functions")
    }

    fn section_len(&self, section: &str) -> usize {
        self.store
            .document()
            .and_then(|doc| doc["instructions"][section].as_array().map(Vec::len))
            .unwrap_or(0)
    }
}
