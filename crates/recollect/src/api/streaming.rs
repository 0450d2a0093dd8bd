//! Server-Sent Events (SSE) streaming for chat completions.
//!
//! [`OpenRouterClient::chat_stream_live`] reads the response body chunk by
//! chunk and hands each parsed [`StreamEvent`] to a callback as it arrives,
//! so the agent can forward text deltas to the conversation while the model
//! is still generating.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{debug, trace, warn};

use super::client::OpenRouterClient;
use super::wire::{ChatCompletion, ChatRequest, ToolCallData, UsageInfo};
use crate::{Error, Result};

/// A single event from an SSE stream.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// An incremental text content delta.
    TextDelta(String),
    /// A tool call chunk (accumulated until complete).
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments_delta: String,
    },
    /// Token usage information (sent in the final chunk).
    Usage(UsageInfo),
    /// The model reported why it stopped.
    Finished(String),
    /// The stream is complete.
    Done,
}

#[derive(Deserialize, Debug)]
struct StreamChunk {
    choices: Option<Vec<StreamChoice>>,
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    delta: Option<StreamDelta>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

#[derive(Deserialize, Debug)]
struct StreamToolCallDelta {
    index: Option<usize>,
    id: Option<String>,
    function: Option<StreamFunctionDelta>,
}

#[derive(Deserialize, Debug, Default)]
struct StreamFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

impl OpenRouterClient {
    /// Send a streaming chat request, invoking `on_event` for each event as
    /// it arrives off the wire.
    ///
    /// The full event list is also returned so the caller can assemble tool
    /// calls and usage afterwards.
    pub async fn chat_stream_live(
        &self,
        body: &ChatRequest,
        mut on_event: impl FnMut(&StreamEvent),
    ) -> Result<Vec<StreamEvent>> {
        let mut stream_body =
            serde_json::to_value(body).map_err(|e| Error::Parse(format!("serialize: {e}")))?;
        stream_body["stream"] = serde_json::Value::Bool(true);

        debug!(
            "Sending live streaming chat request: model={}, messages={}",
            body.model.as_deref().unwrap_or("(none)"),
            body.messages.len()
        );

        let mut resp = self
            .post()
            .json(&stream_body)
            .send()
            .await
            .map_err(|e| Error::Request(format!("streaming request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Api { status, body: text });
        }

        let mut events = Vec::new();
        let mut buffer = LineBuffer::default();
        let mut done = false;

        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| Error::Request(format!("failed to read streaming chunk: {e}")))?
        {
            buffer.push(&chunk);

            while let Some(line) = buffer.next_line() {
                match parse_sse_line(&line) {
                    SseLine::Skip => {}
                    SseLine::Done => {
                        let ev = StreamEvent::Done;
                        on_event(&ev);
                        events.push(ev);
                        done = true;
                        break;
                    }
                    SseLine::Data(data) => {
                        let before = events.len();
                        parse_sse_data(data, &mut events);
                        for ev in &events[before..] {
                            on_event(ev);
                        }
                    }
                }
            }

            if done {
                break;
            }
        }

        // Incomplete final line.
        let rest = buffer.finish();
        if !done && let SseLine::Data(data) = parse_sse_line(&rest) {
            let before = events.len();
            parse_sse_data(data, &mut events);
            for ev in &events[before..] {
                on_event(ev);
            }
        }

        if !events.iter().any(|e| matches!(e, StreamEvent::Done)) {
            let ev = StreamEvent::Done;
            on_event(&ev);
            events.push(ev);
        }

        debug!("Live stream completed with {} events", events.len());
        Ok(events)
    }
}

/// Raw body bytes awaiting a newline. Lines are decoded only once complete,
/// so a multi-byte character split across network chunks stays intact.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// The next complete line, newline included.
    pub(crate) fn next_line(&mut self) -> Option<String> {
        let end = self.bytes.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.bytes.drain(..=end).collect();
        Some(decode_line(&line))
    }

    /// Whatever remains once the body has ended.
    pub(crate) fn finish(&mut self) -> String {
        decode_line(&std::mem::take(&mut self.bytes))
    }
}

fn decode_line(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(line) => line.to_string(),
        Err(e) => {
            warn!("Invalid UTF-8 in SSE line: {e}");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

enum SseLine<'a> {
    Skip,
    Done,
    Data(&'a str),
}

fn parse_sse_line(line: &str) -> SseLine<'_> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return SseLine::Skip;
    }
    if line == "data: [DONE]" {
        return SseLine::Done;
    }
    match line.strip_prefix("data:") {
        Some(data) => SseLine::Data(data.trim_start()),
        None => SseLine::Skip,
    }
}

/// Parse a single SSE `data:` payload into stream events.
pub(crate) fn parse_sse_data(data: &str, events: &mut Vec<StreamEvent>) {
    let chunk = match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!("Failed to parse SSE chunk: {e}; data: {data}");
            return;
        }
    };

    if let Some(usage) = chunk.usage {
        events.push(StreamEvent::Usage(usage));
    }

    for choice in chunk.choices.unwrap_or_default() {
        if let Some(delta) = choice.delta {
            if let Some(content) = delta.content
                && !content.is_empty()
            {
                events.push(StreamEvent::TextDelta(content));
            }
            for tc in delta.tool_calls.unwrap_or_default() {
                let func = tc.function.unwrap_or_default();
                events.push(StreamEvent::ToolCallDelta {
                    index: tc.index.unwrap_or(0),
                    id: tc.id,
                    name: func.name,
                    arguments_delta: func.arguments.unwrap_or_default(),
                });
            }
        }
        if let Some(reason) = choice.finish_reason {
            trace!("Stream finish_reason: {reason}");
            events.push(StreamEvent::Finished(reason));
        }
    }
}

/// Assemble a complete text string from a sequence of stream events.
pub fn collect_text(events: &[StreamEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::TextDelta(delta) => Some(delta.as_str()),
            _ => None,
        })
        .collect()
}

/// Extract usage info from stream events (if present).
pub fn extract_usage(events: &[StreamEvent]) -> Option<UsageInfo> {
    events.iter().rev().find_map(|e| match e {
        StreamEvent::Usage(usage) => Some(usage.clone()),
        _ => None,
    })
}

/// Assemble complete tool calls from streaming `ToolCallDelta` events.
///
/// The first delta for a call carries its id and name; later deltas with
/// the same index only append argument fragments. Calls that never received
/// an id or a name are dropped.
pub fn assemble_tool_calls(events: &[StreamEvent]) -> Vec<ToolCallData> {
    let mut calls: BTreeMap<usize, (Option<String>, Option<String>, String)> = BTreeMap::new();

    for event in events {
        if let StreamEvent::ToolCallDelta {
            index,
            id,
            name,
            arguments_delta,
        } = event
        {
            let entry = calls.entry(*index).or_insert((None, None, String::new()));
            if let Some(id) = id {
                entry.0 = Some(id.clone());
            }
            if let Some(name) = name {
                entry.1 = Some(name.clone());
            }
            entry.2.push_str(arguments_delta);
        }
    }

    calls
        .into_values()
        .filter_map(|(id, name, arguments)| Some(ToolCallData::new(id?, name?, arguments)))
        .collect()
}

/// Fold a finished stream into the same shape a non-streaming call returns.
pub fn completion_from_events(events: &[StreamEvent]) -> ChatCompletion {
    let text = collect_text(events);
    let finish_reason = events.iter().rev().find_map(|e| match e {
        StreamEvent::Finished(reason) => Some(reason.clone()),
        _ => None,
    });
    ChatCompletion {
        content: if text.is_empty() { None } else { Some(text) },
        tool_calls: assemble_tool_calls(events),
        usage: extract_usage(events),
        finish_reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(lines: &[&str]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        for line in lines {
            if let SseLine::Data(data) = parse_sse_line(line) {
                parse_sse_data(data, &mut events);
            }
        }
        events
    }

    #[test]
    fn collect_text_from_deltas() {
        let events = vec![
            StreamEvent::TextDelta("Hello ".into()),
            StreamEvent::TextDelta("world!".into()),
            StreamEvent::Done,
        ];
        assert_eq!(collect_text(&events), "Hello world!");
    }

    #[test]
    fn extract_usage_takes_the_last_report() {
        let events = vec![
            StreamEvent::TextDelta("hi".into()),
            StreamEvent::Usage(UsageInfo {
                prompt_tokens: Some(100),
                completion_tokens: Some(50),
                total_tokens: Some(150),
            }),
            StreamEvent::Done,
        ];
        let usage = extract_usage(&events).unwrap();
        assert_eq!(usage.prompt_tokens, Some(100));

        let none = vec![StreamEvent::TextDelta("hi".into()), StreamEvent::Done];
        assert!(extract_usage(&none).is_none());
    }

    #[test]
    fn sse_lines_are_classified() {
        assert!(matches!(parse_sse_line(": keep-alive\n"), SseLine::Skip));
        assert!(matches!(parse_sse_line("\n"), SseLine::Skip));
        assert!(matches!(parse_sse_line("data: [DONE]\n"), SseLine::Done));
        assert!(matches!(parse_sse_line("data:{}"), SseLine::Data("{}")));
        assert!(matches!(parse_sse_line("event: ping"), SseLine::Skip));
    }

    #[test]
    fn text_chunks_become_deltas() {
        let events = parse(&[
            r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#,
            r#"data: {"choices":[{"delta":{"content":""}}]}"#,
            r#"data: {"choices":[{"delta":{"content":"lo"},"finish_reason":"stop"}]}"#,
            r#"data: {"choices":[],"usage":{"prompt_tokens":7,"completion_tokens":2,"total_tokens":9}}"#,
        ]);
        let completion = completion_from_events(&events);
        assert_eq!(completion.content.as_deref(), Some("Hello"));
        assert_eq!(completion.finish_reason.as_deref(), Some("stop"));
        assert_eq!(completion.usage.unwrap().completion_tokens, Some(2));
    }

    #[test]
    fn character_split_across_chunks_survives() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"café\"}}]}\n";
        let bytes = line.as_bytes();
        let split = bytes.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut buffer = LineBuffer::default();
        buffer.push(&bytes[..split]);
        assert!(buffer.next_line().is_none());
        buffer.push(&bytes[split..]);

        let decoded = buffer.next_line().unwrap();
        assert!(buffer.next_line().is_none());
        let events = parse(&[decoded.as_str()]);
        assert_eq!(collect_text(&events), "café");
    }

    #[test]
    fn unterminated_tail_is_returned_on_finish() {
        let mut buffer = LineBuffer::default();
        buffer.push(b": ping\ndata: [DO");
        buffer.push(b"NE]");
        assert_eq!(buffer.next_line().as_deref(), Some(": ping\n"));
        assert!(buffer.next_line().is_none());
        assert_eq!(buffer.finish(), "data: [DONE]");
        assert_eq!(buffer.finish(), "");
    }

    #[test]
    fn malformed_chunk_is_skipped() {
        let events = parse(&[
            "data: {not json",
            r#"data: {"choices":[{"delta":{"content":"ok"}}]}"#,
        ]);
        assert_eq!(collect_text(&events), "ok");
    }

    #[test]
    fn tool_call_fragments_are_assembled_by_index() {
        let events = parse(&[
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_a","function":{"name":"calculator","arguments":"{\"expr"}}]}}]}"#,
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":1,"id":"call_b","function":{"name":"check_datetime","arguments":"{}"}}]}}]}"#,
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"ession\":\"2*3\"}"}}]}}]}"#,
        ]);
        let calls = assemble_tool_calls(&events);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "call_a");
        assert_eq!(calls[0].function.arguments, r#"{"expression":"2*3"}"#);
        assert_eq!(calls[1].function.name, "check_datetime");
    }

    #[test]
    fn tool_call_without_id_is_dropped() {
        let events = vec![StreamEvent::ToolCallDelta {
            index: 0,
            id: None,
            name: Some("calculator".into()),
            arguments_delta: "{}".into(),
        }];
        assert!(assemble_tool_calls(&events).is_empty());
    }
}
