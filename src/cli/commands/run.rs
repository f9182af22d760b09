//! asset-miner run - Mine a space and materialize complex queries

use clap::Args;
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::cli::commands::Exit;
use crate::cli::output;
use crate::cli::Cli;
use crate::config::Config;
use crate::engine::SqlEngine;
use crate::error::{MinerError, Result};
use crate::llm::LlmClient;
use crate::models::ComplexityTier;
use crate::pipeline::{self, RunOptions, Services, Tuning};
use crate::source::ConversationScope;
use crate::timestamp::TimeWindow;
use crate::utils::format_epoch_millis;
use crate::workspace::WorkspaceClient;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Space whose conversations are mined and whose registry is updated
    #[arg(long)]
    pub space_id: String,

    /// Catalog that receives the generated functions
    #[arg(long)]
    pub catalog: String,

    /// Schema that receives the generated functions
    #[arg(long)]
    pub schema: String,

    /// SQL warehouse used to create functions (functions are skipped without it)
    #[arg(long)]
    pub warehouse_id: Option<String>,

    /// Stop after this many conversations
    #[arg(long, value_name = "N")]
    pub max_conversations: Option<usize>,

    /// Read every user's conversations (requires manage permission)
    #[arg(long)]
    pub include_all_users: bool,

    /// Minimum tier to materialize: simple, moderate, complex
    #[arg(long)]
    pub threshold: Option<ComplexityTier>,

    /// Report what would be created without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Replace examples and function registrations that already exist
    #[arg(long, short)]
    pub force: bool,

    /// Skip example creation
    #[arg(long)]
    pub no_examples: bool,

    /// Skip function creation
    #[arg(long)]
    pub no_functions: bool,

    /// Skip function registration
    #[arg(long)]
    pub no_register: bool,

    /// Only conversations created at or after this time (7d, 2024-01-01, ...)
    #[arg(long, value_name = "TIME")]
    pub from: Option<String>,

    /// Only conversations created at or before this time
    #[arg(long, value_name = "TIME")]
    pub to: Option<String>,

    /// Concurrent workers for generation and function creation
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,
}

impl RunArgs {
    fn options(&self, config: &Config, window: TimeWindow) -> Result<RunOptions> {
        let workers = self.workers.unwrap_or(config.pipeline.workers);
        if workers == 0 {
            return Err(MinerError::Config("--workers must be greater than 0".to_string()));
        }
        Ok(RunOptions {
            scope: ConversationScope::from_include_all(self.include_all_users),
            catalog: self.catalog.clone(),
            schema: self.schema.clone(),
            warehouse_id: self.warehouse_id.clone().filter(|id| !id.trim().is_empty()),
            max_conversations: self.max_conversations,
            threshold: self.threshold.unwrap_or(config.pipeline.threshold),
            dry_run: self.dry_run,
            force: self.force,
            create_examples: !self.no_examples,
            create_functions: !self.no_functions,
            register_functions: !self.no_register,
            window,
            workers,
        })
    }
}

pub fn run(cli: &Cli, args: &RunArgs) -> Result<Exit> {
    let window = TimeWindow::parse(args.from.as_deref(), args.to.as_deref(), chrono::Utc::now())?;
    let config = Config::load(cli.config.as_deref())?;
    let options = args.options(&config, window)?;

    let token = config.workspace.token();
    if token.is_none() {
        warn!(env = %config.workspace.token_env, "No bearer token found in environment");
    }
    let workspace = WorkspaceClient::new(&config.workspace, &args.space_id, token.clone())?;
    let mut llm_config = config.llm.clone();
    llm_config.endpoint = config.llm_endpoint();
    let llm = LlmClient::new(&llm_config, token)?;

    let engine: Option<&dyn SqlEngine> = options.warehouse_id.as_ref().map(|_| &workspace as &dyn SqlEngine);
    let services = Services {
        source: &workspace,
        classifier: &llm,
        extractor: &llm,
        generator: &llm,
        store: &workspace,
        engine,
    };

    let cancel = CancelToken::new();
    install_interrupt_handler(&cancel);

    info!(
        space_id = %args.space_id,
        catalog = %options.catalog,
        schema = %options.schema,
        threshold = %options.threshold,
        dry_run = options.dry_run,
        from = ?options.window.from_ms.map(format_epoch_millis),
        to = ?options.window.to_ms.map(format_epoch_millis),
        "Starting run"
    );
    let report = pipeline::run(&services, &options, &Tuning::from_config(&config), &cancel);

    if cli.json {
        println!("{}", output::render_json(&report)?);
    } else {
        print!("{}", output::render_human(&report, options.dry_run));
    }

    if cancel.is_cancelled() {
        Ok(Exit::Interrupted)
    } else if report.is_success() {
        Ok(Exit::Success)
    } else {
        Ok(Exit::Failed)
    }
}

/// What a Ctrl-C does, given how many were received before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterruptAction {
    /// Stop scheduling work and let in-flight tasks finish.
    Cancel,
    /// Leave immediately.
    Exit,
}

const fn interrupt_action(previous: usize) -> InterruptAction {
    if previous == 0 {
        InterruptAction::Cancel
    } else {
        InterruptAction::Exit
    }
}

/// Set the token on the first Ctrl-C and exit on the second.
///
/// The listener runs on its own small runtime.
fn install_interrupt_handler(cancel: &CancelToken) {
    let cancel = cancel.clone();
    let spawned = std::thread::Builder::new()
        .name("asset-miner-signal".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    warn!(error = %err, "Interrupt handling unavailable");
                    return;
                }
            };
            runtime.block_on(async {
                let mut received = 0;
                while tokio::signal::ctrl_c().await.is_ok() {
                    match interrupt_action(received) {
                        InterruptAction::Cancel => {
                            warn!("Interrupt received, finishing in-flight work (press Ctrl-C again to quit)");
                            cancel.cancel();
                        }
                        InterruptAction::Exit => {
                            warn!("Second interrupt received, exiting");
                            std::process::exit(i32::from(Exit::Interrupted.code()));
                        }
                    }
                    received += 1;
                }
            });
        });
    if let Err(err) = spawned {
        warn!(error = %err, "Failed to spawn interrupt listener");
    }
}
