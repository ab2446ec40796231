//! Streaming protocol parser.
//!
//! Model output is a single text stream where each line is either free
//! prose or exactly one JSON object describing an ACTION or QUESTION. The
//! parser consumes chunks at arbitrary boundaries and emits typed units in
//! order: [`StreamUnit::TextDelta`] for prose and [`StreamUnit::Structured`]
//! for recognized event lines.
//!
//! The parser fails open by construction. Malformed JSON, an unrecognized
//! `type`, missing fields, or a payload with nested values all degrade the
//! line to plain text; no model output is ever dropped and no input can
//! make parsing abort the stream.

use mentor_core::session::ActionPayload;
use serde::Deserialize;

/// Kind of a recognized structured-event line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// An actionable proposal, possibly with a side effect.
    Action,
    /// A question requiring user acknowledgment.
    Question,
}

/// A structured event parsed from one line of model output.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredEvent {
    pub kind: EventKind,
    pub content: String,
    /// Raw action type string; present only for ACTION events.
    pub action_type: Option<String>,
    /// Primitive-valued payload; present only for ACTION events.
    pub action_payload: Option<ActionPayload>,
}

/// One parsed unit of model output.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUnit {
    /// A run of plain text, byte-for-byte as it appeared in the stream
    /// (newlines included). Concatenating all deltas in emission order
    /// reconstructs the non-event portion of the input exactly.
    TextDelta(String),
    /// A complete structured-event line.
    Structured(StructuredEvent),
}

/// Wire schema of a structured-event line. Unknown extra fields are
/// tolerated; everything listed here is enforced by deserialization.
#[derive(Debug, Deserialize)]
struct RawEventLine {
    #[serde(rename = "type")]
    kind: String,
    content: String,
    #[serde(rename = "actionType", default)]
    action_type: Option<String>,
    #[serde(rename = "actionPayload", default)]
    action_payload: Option<ActionPayload>,
}

/// Incremental parser for the chat line protocol.
///
/// Feed arbitrary text chunks and drain complete units; call
/// [`ChatStreamParser::finish`] once the stream ends to flush the tail.
#[derive(Debug, Default)]
pub struct ChatStreamParser {
    buffer: String,
    /// True while the head of the current line has already gone out as
    /// prose; the remainder up to the next newline cannot form an event.
    mid_prose_line: bool,
}

impl ChatStreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk into the parser and drains the units it completes.
    ///
    /// Complete `\n`-terminated lines are classified immediately. A partial
    /// trailing line whose first non-whitespace character is not `{` can
    /// never become an event line, so it is flushed eagerly as prose and
    /// consumers see text as it arrives; a possible JSON object prefix stays
    /// buffered until its newline decides it. Classification applies to
    /// whole lines only: once part of a line has been flushed as prose, the
    /// rest of that line is prose too, even if it would parse as an event
    /// on its own.
    pub fn feed(&mut self, chunk: &str) -> Vec<StreamUnit> {
        self.buffer.push_str(chunk);
        let mut units = Vec::new();

        while let Some(split) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=split).collect();
            if std::mem::take(&mut self.mid_prose_line) {
                // Tail of a line whose head was already emitted
                units.push(StreamUnit::TextDelta(line));
            } else {
                units.push(classify_line(&line));
            }
        }

        if self.mid_prose_line {
            if !self.buffer.is_empty() {
                units.push(StreamUnit::TextDelta(std::mem::take(&mut self.buffer)));
            }
        } else {
            let rest = self.buffer.trim_start();
            if !rest.is_empty() && !rest.starts_with('{') {
                self.mid_prose_line = true;
                units.push(StreamUnit::TextDelta(std::mem::take(&mut self.buffer)));
            }
        }

        units
    }

    /// Flushes whatever remains at end of stream through the same
    /// classification, with no trailing newline required.
    pub fn finish(&mut self) -> Vec<StreamUnit> {
        let mid_prose = std::mem::take(&mut self.mid_prose_line);
        if self.buffer.is_empty() {
            return Vec::new();
        }
        let tail = std::mem::take(&mut self.buffer);
        if mid_prose {
            return vec![StreamUnit::TextDelta(tail)];
        }
        vec![classify_line(&tail)]
    }
}

fn classify_line(line: &str) -> StreamUnit {
    match parse_structured(line.trim()) {
        Some(event) => StreamUnit::Structured(event),
        None => StreamUnit::TextDelta(line.to_string()),
    }
}

/// Returns the structured event encoded by `trimmed`, or `None` when the
/// line is prose.
fn parse_structured(trimmed: &str) -> Option<StructuredEvent> {
    if !trimmed.starts_with('{') {
        return None;
    }
    let raw: RawEventLine = serde_json::from_str(trimmed).ok()?;
    match raw.kind.as_str() {
        "QUESTION" => Some(StructuredEvent {
            kind: EventKind::Question,
            content: raw.content,
            action_type: None,
            action_payload: None,
        }),
        "ACTION" => {
            // An ACTION without an action type is unexecutable; treat the
            // line as prose rather than guessing.
            if raw.action_type.as_deref().unwrap_or("").is_empty() {
                tracing::debug!(
                    target: "stream_parser",
                    "ACTION line without actionType, keeping as prose"
                );
                return None;
            }
            Some(StructuredEvent {
                kind: EventKind::Action,
                content: raw.content,
                action_type: raw.action_type,
                action_payload: raw.action_payload,
            })
        }
        other => {
            tracing::debug!(
                target: "stream_parser",
                kind = %other,
                "unrecognized event type, keeping line as prose"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deltas(units: &[StreamUnit]) -> String {
        units
            .iter()
            .filter_map(|u| match u {
                StreamUnit::TextDelta(text) => Some(text.as_str()),
                StreamUnit::Structured(_) => None,
            })
            .collect()
    }

    fn events(units: &[StreamUnit]) -> Vec<&StructuredEvent> {
        units
            .iter()
            .filter_map(|u| match u {
                StreamUnit::Structured(event) => Some(event),
                StreamUnit::TextDelta(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_plain_prose_passes_through() {
        let mut parser = ChatStreamParser::new();
        let units = parser.feed("Hello world\n");
        assert_eq!(units, vec![StreamUnit::TextDelta("Hello world\n".to_string())]);
        assert!(parser.finish().is_empty());
    }

    #[test]
    fn test_question_line_becomes_event() {
        let mut parser = ChatStreamParser::new();
        let units = parser.feed("{\"type\":\"QUESTION\",\"content\":\"ok?\"}\n");
        let events = events(&units);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Question);
        assert_eq!(events[0].content, "ok?");
        assert!(events[0].action_type.is_none());
    }

    #[test]
    fn test_action_line_with_payload() {
        let mut parser = ChatStreamParser::new();
        let line = "{\"type\":\"ACTION\",\"content\":\"adding a task\",\
                    \"actionType\":\"create_task\",\"actionPayload\":{\"title\":\"essay\"}}\n";
        let units = parser.feed(line);
        let events = events(&units);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Action);
        assert_eq!(events[0].action_type.as_deref(), Some("create_task"));
        let payload = events[0].action_payload.as_ref().unwrap();
        assert_eq!(payload.get("title").and_then(|v| v.as_str()), Some("essay"));
    }

    #[test]
    fn test_invalid_json_fails_open() {
        let mut parser = ChatStreamParser::new();
        let units = parser.feed("{\"type\":\"ACTION\",\"content\":}\n");
        assert_eq!(units.len(), 1);
        match &units[0] {
            StreamUnit::TextDelta(text) => {
                assert!(text.contains("{\"type\":\"ACTION\",\"content\":}"));
            }
            other => panic!("expected prose, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_is_prose() {
        let mut parser = ChatStreamParser::new();
        let units = parser.feed("{\"type\":\"NOTE\",\"content\":\"hi\"}\n");
        assert_eq!(events(&units).len(), 0);
        assert_eq!(deltas(&units), "{\"type\":\"NOTE\",\"content\":\"hi\"}\n");
    }

    #[test]
    fn test_missing_content_is_prose() {
        let mut parser = ChatStreamParser::new();
        let units = parser.feed("{\"type\":\"QUESTION\"}\n");
        assert_eq!(events(&units).len(), 0);
    }

    #[test]
    fn test_action_without_action_type_is_prose() {
        let mut parser = ChatStreamParser::new();
        let missing = parser.feed("{\"type\":\"ACTION\",\"content\":\"x\"}\n");
        assert_eq!(events(&missing).len(), 0);

        let null = parser.feed("{\"type\":\"ACTION\",\"content\":\"x\",\"actionType\":null}\n");
        assert_eq!(events(&null).len(), 0);
    }

    #[test]
    fn test_nested_payload_is_prose() {
        let mut parser = ChatStreamParser::new();
        let line = "{\"type\":\"ACTION\",\"content\":\"x\",\"actionType\":\"create_task\",\
                    \"actionPayload\":{\"items\":[1,2]}}\n";
        let units = parser.feed(line);
        assert_eq!(events(&units).len(), 0);
        assert_eq!(deltas(&units), line);
    }

    #[test]
    fn test_extra_fields_ignored() {
        let mut parser = ChatStreamParser::new();
        let units = parser.feed("{\"type\":\"QUESTION\",\"content\":\"ok?\",\"extra\":1}\n");
        assert_eq!(events(&units).len(), 1);
    }

    #[test]
    fn test_question_ignores_action_fields() {
        let mut parser = ChatStreamParser::new();
        let units = parser.feed(
            "{\"type\":\"QUESTION\",\"content\":\"ok?\",\"actionType\":\"create_task\"}\n",
        );
        let events = events(&units);
        assert_eq!(events.len(), 1);
        assert!(events[0].action_type.is_none());
    }

    #[test]
    fn test_json_split_across_chunks() {
        let mut parser = ChatStreamParser::new();
        assert!(parser.feed("{\"type\":\"QUES").is_empty());
        assert!(parser.feed("TION\",\"content\"").is_empty());
        let units = parser.feed(":\"ok?\"}\n");
        let events = events(&units);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].content, "ok?");
    }

    #[test]
    fn test_partial_prose_flushes_eagerly() {
        let mut parser = ChatStreamParser::new();
        assert_eq!(
            parser.feed("Hel"),
            vec![StreamUnit::TextDelta("Hel".to_string())]
        );
        assert_eq!(
            parser.feed("lo wor"),
            vec![StreamUnit::TextDelta("lo wor".to_string())]
        );
        let units = parser.feed("ld\n{\"type\":\"QUESTION\",\"content\":\"ok?\"}\n");
        assert_eq!(units.len(), 2);
        assert_eq!(units[0], StreamUnit::TextDelta("ld\n".to_string()));
        assert!(matches!(units[1], StreamUnit::Structured(_)));
    }

    #[test]
    fn test_prose_head_keeps_line_json_tail_as_prose() {
        let mut parser = ChatStreamParser::new();
        let mut units = parser.feed("The answer is ");
        units.extend(parser.feed("{\"type\":\"QUESTION\",\"content\":\"ok?\"}\n"));
        assert_eq!(events(&units).len(), 0);
        assert_eq!(
            deltas(&units),
            "The answer is {\"type\":\"QUESTION\",\"content\":\"ok?\"}\n"
        );
    }

    #[test]
    fn test_mixed_line_is_prose_at_every_split_point() {
        let input = "The answer is {\"type\":\"ACTION\",\"content\":\"x\",\
                     \"actionType\":\"create_task\"}\n";
        for split in 0..=input.len() {
            let mut parser = ChatStreamParser::new();
            let mut units = parser.feed(&input[..split]);
            units.extend(parser.feed(&input[split..]));
            units.extend(parser.finish());
            assert_eq!(events(&units).len(), 0, "split at {split}");
            assert_eq!(deltas(&units), input, "split at {split}");
        }
    }

    #[test]
    fn test_reconstruction_across_arbitrary_chunks() {
        let input = "alpha beta\n{\"type\":\"QUESTION\",\"content\":\"q1\"}\ngamma\n\
                     see {\"type\":\"QUESTION\",\"content\":\"q2\"}\n\
                     not json { but prose\n{\"type\":\"ACTION\",\"content\":\"a\",\
                     \"actionType\":\"record_note\"}\ntail";
        let expected_prose = "alpha beta\ngamma\n\
                              see {\"type\":\"QUESTION\",\"content\":\"q2\"}\n\
                              not json { but prose\ntail";

        // Split at deliberately awkward byte positions
        for step in [1, 3, 7, 11] {
            let mut parser = ChatStreamParser::new();
            let mut units = Vec::new();
            let chars: Vec<char> = input.chars().collect();
            for chunk in chars.chunks(step) {
                let chunk: String = chunk.iter().collect();
                units.extend(parser.feed(&chunk));
            }
            units.extend(parser.finish());

            assert_eq!(deltas(&units), expected_prose, "chunk size {step}");
            assert_eq!(events(&units).len(), 2, "chunk size {step}");
        }
    }

    #[test]
    fn test_finish_flushes_partial_prose() {
        let mut parser = ChatStreamParser::new();
        assert!(parser.feed("{incomplete").is_empty());
        let units = parser.finish();
        assert_eq!(units, vec![StreamUnit::TextDelta("{incomplete".to_string())]);
        assert!(parser.finish().is_empty());
    }

    #[test]
    fn test_finish_parses_complete_tail_event() {
        let mut parser = ChatStreamParser::new();
        assert!(parser.feed("{\"type\":\"QUESTION\",\"content\":\"last?\"}").is_empty());
        let units = parser.finish();
        let events = events(&units);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].content, "last?");
    }

    #[test]
    fn test_crlf_line_still_parses() {
        let mut parser = ChatStreamParser::new();
        let units = parser.feed("{\"type\":\"QUESTION\",\"content\":\"ok?\"}\r\nplain\r\n");
        assert_eq!(events(&units).len(), 1);
        assert_eq!(deltas(&units), "plain\r\n");
    }

    #[test]
    fn test_whitespace_prefixed_event_line() {
        let mut parser = ChatStreamParser::new();
        // Leading whitespace is held, not flushed as spurious prose
        assert!(parser.feed("   ").is_empty());
        let units = parser.feed("{\"type\":\"QUESTION\",\"content\":\"ok?\"}\n");
        assert_eq!(events(&units).len(), 1);
        assert_eq!(deltas(&units), "");
    }
}
