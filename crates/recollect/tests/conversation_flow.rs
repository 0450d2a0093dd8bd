//! End-to-end conversation runs with stub agents and summarizers.

mod common;

use std::sync::Arc;

use common::{CannedSummarizer, RecordingHandler, ScriptedAgent};
use recollect::agent::FeedbackRecorder;
use recollect::conversation::{Conversation, ScriptedInput};
use recollect::history::{CountThreshold, Passthrough, RecentWindow, TokenThreshold};
use recollect::message::total_recorded_tokens;
use recollect::{Message, MessageKind};

#[tokio::test]
async fn short_history_is_submitted_unchanged() {
    let agent = Arc::new(ScriptedAgent::new(10));
    let summarizer = Arc::new(CannedSummarizer::default());
    let seed = vec![Message::user_prompt("hi"), Message::agent_text("hello")];

    let mut conversation = Conversation::new(agent.clone(), CountThreshold::new(16, summarizer.clone()))
        .with_history(seed.clone());
    let handler = RecordingHandler::default();
    conversation.submit("how are you?", &handler).await.unwrap();

    let requests = agent.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].history, seed);
    assert_eq!(conversation.history().len(), 4);
    assert_eq!(summarizer.calls(), 0);
    assert_eq!(
        handler.lines(),
        vec![
            "start 1",
            "policy unchanged 2->2",
            "text reply to how are you?",
            "finished 1 len=4",
        ]
    );
}

#[tokio::test]
async fn failed_turn_is_dropped_and_the_loop_continues() {
    let agent = Arc::new(ScriptedAgent::new(10).failing_on("boom"));
    let mut conversation = Conversation::new(agent.clone(), Passthrough);
    let mut input = ScriptedInput::new(["first", "boom", "second", "quit"]);
    let handler = RecordingHandler::default();

    conversation.run(&mut input, &handler).await.unwrap();

    assert_eq!(conversation.turn(), 3);
    assert_eq!(conversation.history().len(), 4);
    assert_eq!(handler.matching("failed"), vec!["failed 2"]);
    let requests = agent.requests();
    assert_eq!(requests.len(), 3);
    // The failed turn left nothing behind.
    assert_eq!(requests[2].history.len(), 2);
    assert_eq!(conversation.history()[2], Message::user_prompt("second"));
}

#[tokio::test]
async fn summarizer_failure_keeps_the_full_history() {
    let agent = Arc::new(ScriptedAgent::new(10));
    let summarizer = Arc::new(CannedSummarizer::failing());
    let mut conversation = Conversation::new(agent.clone(), CountThreshold::new(4, summarizer.clone()));
    let mut input = ScriptedInput::new(["a", "b", "c", "d"]);
    let handler = RecordingHandler::default();

    conversation.run(&mut input, &handler).await.unwrap();

    // Turn 4 saw 6 messages over a threshold of 4; the summarizer failed.
    assert_eq!(summarizer.calls(), 1);
    assert_eq!(handler.matching("policy failed"), vec!["policy failed 6->6"]);
    assert_eq!(agent.requests()[3].history.len(), 6);
    assert_eq!(conversation.history().len(), 8);
    assert!(conversation.memory().is_none());
}

#[tokio::test]
async fn count_threshold_condenses_the_older_half() {
    let agent = Arc::new(ScriptedAgent::new(10));
    let summarizer = Arc::new(CannedSummarizer::default());
    let mut conversation = Conversation::new(agent.clone(), CountThreshold::new(4, summarizer.clone()));
    let mut input = ScriptedInput::new(["a", "b", "c", "d"]);

    conversation
        .run(&mut input, &RecordingHandler::default())
        .await
        .unwrap();

    // 6 messages, keep 2: four condensed into one summary.
    let seen = &agent.requests()[3].history;
    assert_eq!(seen.len(), 3);
    assert_eq!(
        seen[0],
        Message::agent_text("Earlier: 4 messages about the weather.")
    );
    assert_eq!(seen[1], Message::user_prompt("c"));
    assert_eq!(conversation.history().len(), 5);
}

#[tokio::test]
async fn token_threshold_moves_history_into_memory() {
    let agent = Arc::new(ScriptedAgent::new(100));
    let summarizer = Arc::new(CannedSummarizer::default());
    let policy = TokenThreshold::new(250, summarizer.clone());
    let mut conversation = Conversation::new(agent.clone(), policy)
        .with_instructions("You are a friendly assistant.")
        .with_user_name(Some("Ada".into()));
    let mut input = ScriptedInput::new(["one", "two", "three", "four"]);

    conversation
        .run(&mut input, &RecordingHandler::default())
        .await
        .unwrap();

    assert_eq!(summarizer.calls(), 1);
    let requests = agent.requests();

    // No memory before consolidation.
    assert!(!requests[2].instructions.contains("## Conversation Memory"));
    assert_eq!(requests[2].history.len(), 4);

    // 300 tokens at turn four: only the last reply survives, memory injected.
    let fourth = &requests[3];
    assert_eq!(fourth.history.len(), 1);
    assert_eq!(fourth.history[0].kind(), MessageKind::AgentText);
    assert_eq!(fourth.history[0].usage(), None);
    assert!(fourth.instructions.starts_with("You are a friendly assistant."));
    assert!(fourth.instructions.contains("## Conversation Memory"));
    assert!(fourth.instructions.contains("Name is Ada"));
    assert!(fourth.instructions.contains("The user's name is Ada."));

    assert_eq!(conversation.history().len(), 3);
    assert_eq!(total_recorded_tokens(conversation.history()), 100);
    assert_eq!(conversation.memory().unwrap().discussed_subjects.len(), 1);
}

#[tokio::test]
async fn window_policy_and_feedback_decorator_compose() {
    let inner = Arc::new(ScriptedAgent::new(10));
    let agent = Arc::new(FeedbackRecorder::new(inner.clone(), 0.8));
    let mut conversation = Conversation::new(agent.clone(), RecentWindow::new(2));
    let mut input = ScriptedInput::new(["one", "two", "three"]);
    let handler = RecordingHandler::default();

    conversation.run(&mut input, &handler).await.unwrap();

    assert_eq!(agent.records().len(), 3);
    assert_eq!(handler.matching("feedback").len(), 3);
    assert_eq!(handler.matching("policy trimmed"), vec!["policy trimmed 4->2"]);
    assert_eq!(inner.requests()[2].history.len(), 2);
    assert_eq!(conversation.history().len(), 4);
}
