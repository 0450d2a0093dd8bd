//! Interactive terminal chat with managed conversation history.
//!
//! Reads the API key from the `OPENROUTER_KEY` environment variable. Type
//! `quit` or `q` to exit.
//!
//! ```sh
//! recollect-chat --policy tokens --token-limit 5000 --user-name Ada
//! recollect-chat --policy window --window 6 --no-stream -v
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use recollect::prelude::*;
use recollect_chat::{ChatConfig, PolicyKind, StdinInput, TerminalHandler, load_script};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Terminal chat that keeps long conversations within budget.
#[derive(Parser, Debug)]
#[command(name = "recollect-chat")]
struct Cli {
    /// History policy applied before every agent call.
    #[arg(long, value_enum, default_value_t = PolicyKind::Tokens)]
    policy: PolicyKind,

    /// Messages kept by the window policy.
    #[arg(long, default_value_t = 10)]
    window: usize,

    /// Recorded-token limit for the tokens policy.
    #[arg(long, default_value_t = 5000)]
    token_limit: u64,

    /// Message threshold for the halves policy.
    #[arg(long, default_value_t = 16)]
    threshold: usize,

    /// Estimate tokens from message length when the API reported none.
    #[arg(long)]
    estimate_tokens: bool,

    /// Model answering the user.
    #[arg(long, default_value = recollect::DEFAULT_MODEL)]
    model: String,

    /// Model used to summarize and consolidate history.
    #[arg(long, default_value = recollect::summarizer::llm::DEFAULT_SUMMARY_MODEL)]
    summary_model: String,

    /// Maximum tokens per response.
    #[arg(long, default_value_t = 4096)]
    max_tokens: u32,

    /// Sampling temperature.
    #[arg(long, default_value_t = 0.7)]
    temperature: f32,

    /// Maximum tool round-trips per turn.
    #[arg(long, default_value_t = 8)]
    max_rounds: u32,

    /// Wait for complete responses instead of streaming.
    #[arg(long)]
    no_stream: bool,

    /// Retries for transient API errors.
    #[arg(long, default_value_t = 2)]
    retries: u32,

    /// Timeout for one summarizer call, in seconds. 0 disables it.
    #[arg(long, default_value_t = 60)]
    summary_timeout_secs: u64,

    /// Replace the default instructions.
    #[arg(long)]
    instructions: Option<String>,

    /// The user's name, mentioned in the instructions.
    #[arg(long)]
    user_name: Option<String>,

    /// Disable the calculator and clock tools.
    #[arg(long)]
    no_tools: bool,

    /// Read messages from a file, one per line, instead of the terminal.
    #[arg(long, value_name = "FILE")]
    script: Option<PathBuf>,

    /// Record this feedback score for every answered turn.
    #[arg(long)]
    feedback_score: Option<f64>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn to_config(&self) -> ChatConfig {
        let defaults = ChatConfig::default();
        ChatConfig {
            policy: self.policy,
            window: self.window,
            token_limit: self.token_limit,
            threshold: self.threshold,
            estimate_tokens: self.estimate_tokens,
            model: self.model.clone(),
            summary_model: self.summary_model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            max_rounds: self.max_rounds,
            streaming: !self.no_stream,
            retries: self.retries,
            summary_timeout: (self.summary_timeout_secs > 0)
                .then(|| Duration::from_secs(self.summary_timeout_secs)),
            instructions: self.instructions.clone().unwrap_or(defaults.instructions),
            user_name: self.user_name.clone(),
            tools: !self.no_tools,
            feedback_score: self.feedback_score,
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = cli.to_config();

    let api_key = match std::env::var("OPENROUTER_KEY") {
        Ok(key) => key,
        Err(_) => {
            eprintln!("Error: OPENROUTER_KEY environment variable is not set");
            std::process::exit(1);
        }
    };

    let client = match OpenRouterClient::with_headers(
        api_key,
        "https://crates.io/crates/recollect-chat",
        "recollect-chat",
    ) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Error: failed to create API client: {e}");
            std::process::exit(1);
        }
    };

    let mut input: Box<dyn InputSource> = match &cli.script {
        Some(path) => match load_script(path) {
            Ok(script) => Box::new(script),
            Err(e) => {
                eprintln!("Error: cannot read script {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => Box::new(StdinInput::default()),
    };

    let summarizer = Arc::new(LlmSummarizer::new(
        client.clone(),
        config.build_summarizer_config(),
    ));
    let policy = config.build_policy(summarizer.clone());

    let agent = OpenRouterAgent::new(
        client,
        config.build_tool_set(),
        config.build_agent_config(),
    );
    let agent: Box<dyn Agent> = match config.feedback_score {
        Some(score) => Box::new(FeedbackRecorder::new(agent, score)),
        None => Box::new(agent),
    };

    let mut conversation = Conversation::new(agent, policy)
        .with_instructions(config.instructions.clone())
        .with_user_name(config.user_name.clone());

    let handler = CompositeEventHandler::new()
        .with(TerminalHandler::new(cli.script.is_some()))
        .with(LoggingHandler);

    tracing::info!(
        "Chat started: model={}, policy={}",
        config.model,
        conversation.policy().name()
    );

    let outcome = conversation.run(input.as_mut(), &handler).await;
    if let Err(e) = &outcome {
        eprintln!("Error: {e}");
    }

    eprintln!("Agent {}", conversation.cost().summary());
    eprintln!("Summarizer {}", summarizer.cost().summary());

    let code = exit_code(&outcome);
    if code != 0 {
        std::process::exit(code);
    }
}

/// `quit` and end of input exit cleanly. An input failure does not.
fn exit_code(outcome: &recollect::Result<()>) -> i32 {
    match outcome {
        Ok(()) => 0,
        Err(_) => 1,
    }
}
