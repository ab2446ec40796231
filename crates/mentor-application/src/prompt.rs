//! System prompt and request construction.
//!
//! The model is taught the line protocol here: prose flows freely, and each
//! QUESTION or ACTION is one JSON object alone on its own line. The action
//! roster is rendered from [`ActionKind`] so the prompt can never drift from
//! what the executor actually dispatches.

use mentor_core::action::ActionKind;
use mentor_core::session::{Message, MessageKind, Sender, Session};
use mentor_interaction::{ChatRequest, ChatTurn};
use minijinja::{Environment, context};
use once_cell::sync::Lazy;
use serde::Serialize;
use strum::IntoEnumIterator;

const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are Mentor, an AI coach helping one user work toward their goals.

Reply in plain prose. When you need an explicit decision from the user, or
when you want to change their planner, put a single JSON object alone on its
own line, with nothing else on that line:

{"type": "QUESTION", "content": "<what you need the user to decide>"}
{"type": "ACTION", "content": "<what you are doing>", "actionType": "<action name>", "actionPayload": {"<field>": "<value>"}}

Available actions:
{%- for action in actions %}
- {{ action.name }} (payload: {{ action.fields }}): {{ action.description }}
{%- endfor %}

Rules:
- Never mix prose and JSON on the same line
- actionPayload values must be strings, numbers, booleans, or null
- Ask a QUESTION before any ACTION the user has not explicitly asked for
- Each QUESTION or ACTION stays open until the user resolves it, so use them
  sparingly
"#;

#[derive(Serialize)]
struct ActionSpec {
    name: String,
    fields: &'static str,
    description: &'static str,
}

fn action_specs() -> Vec<ActionSpec> {
    ActionKind::iter()
        .map(|kind| {
            let (fields, description) = match kind {
                ActionKind::CreateTask => ("title", "add a task to the user's planner"),
                ActionKind::RecordNote => ("text", "attach a note to the user's planner"),
                ActionKind::SetGoalStatus => {
                    ("goal_id, status", "move one of the user's goals to a new status")
                }
            };
            ActionSpec {
                name: kind.to_string(),
                fields,
                description,
            }
        })
        .collect()
}

static SYSTEM_PROMPT: Lazy<String> = Lazy::new(|| {
    Environment::new()
        .render_str(SYSTEM_PROMPT_TEMPLATE, context! { actions => action_specs() })
        .expect("system prompt template must render")
});

/// The rendered system prompt teaching the line protocol and the action
/// roster.
pub fn system_prompt() -> &'static str {
    &SYSTEM_PROMPT
}

/// Builds the backend request for one turn: the system prompt followed by
/// the session's conversation so far.
pub fn build_request(session: &Session) -> ChatRequest {
    let mut turns = Vec::with_capacity(session.messages.len() + 1);
    turns.push(ChatTurn::system(system_prompt()));
    for message in &session.messages {
        let turn = match message.sender {
            Sender::User => ChatTurn::user(message.content.clone()),
            Sender::Ai => ChatTurn::assistant(wire_line(message)),
        };
        turns.push(turn);
    }
    ChatRequest::new(turns)
}

/// Re-encodes an AI message as the protocol line the model originally sent,
/// so earlier structured events keep their meaning in the replayed context.
fn wire_line(message: &Message) -> String {
    match message.kind {
        MessageKind::Text => message.content.clone(),
        MessageKind::Question => serde_json::json!({
            "type": "QUESTION",
            "content": message.content,
        })
        .to_string(),
        MessageKind::Action => serde_json::json!({
            "type": "ACTION",
            "content": message.content,
            "actionType": message.action_type,
            "actionPayload": message.action_payload,
        })
        .to_string(),
    }
}
