//! Admin/chat intent dispatch (spec.md §4.8: "Admin/chat intents
//! ENUMERATED: `{ status, halt[reason], unhalt, run[symbol,mode],
//! dlq_list[stream], dlq_requeue[stream,id] }`"). `POST /chat` accepts
//! either a pre-parsed `{intent, args}` or a free-text `input` string
//! matched against a small fixed grammar — there is no NLU here, just
//! enough parsing to let an operator type `halt daily loss limit` instead
//! of hand-building JSON.

use std::sync::Arc;

use qf_http::ApiError;
use qf_wire::{streams, CommMode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::pipeline;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub intent: String,
    pub result: Value,
}

enum Intent {
    Status,
    Halt { reason: Option<String> },
    Unhalt,
    Run { symbol: String, mode: CommMode },
    DlqList { stream: String },
    DlqRequeue { stream: String, id: i64 },
}

fn parse_comm_mode(raw: &str) -> Option<CommMode> {
    match raw {
        "http" => Some(CommMode::Http),
        "pubsub" => Some(CommMode::Pubsub),
        "hybrid" => Some(CommMode::Hybrid),
        _ => None,
    }
}

/// Resolve a structured `{intent, args}` request into an `Intent`.
fn from_structured(intent: &str, args: &Value) -> Result<Intent, ApiError> {
    match intent {
        "status" => Ok(Intent::Status),
        "halt" => Ok(Intent::Halt {
            reason: args.get("reason").and_then(Value::as_str).map(String::from),
        }),
        "unhalt" => Ok(Intent::Unhalt),
        "run" => {
            let symbol = args
                .get("symbol")
                .and_then(Value::as_str)
                .ok_or_else(|| ApiError::Validation("run intent requires symbol".to_string()))?
                .to_string();
            let mode = args
                .get("mode")
                .and_then(Value::as_str)
                .and_then(parse_comm_mode)
                .ok_or_else(|| ApiError::Validation("run intent requires a valid mode".to_string()))?;
            Ok(Intent::Run { symbol, mode })
        }
        "dlq_list" => {
            let stream = args
                .get("stream")
                .and_then(Value::as_str)
                .ok_or_else(|| ApiError::Validation("dlq_list intent requires stream".to_string()))?
                .to_string();
            Ok(Intent::DlqList { stream })
        }
        "dlq_requeue" => {
            let stream = args
                .get("stream")
                .and_then(Value::as_str)
                .ok_or_else(|| ApiError::Validation("dlq_requeue intent requires stream".to_string()))?
                .to_string();
            let id = args
                .get("id")
                .and_then(Value::as_i64)
                .ok_or_else(|| ApiError::Validation("dlq_requeue intent requires id".to_string()))?;
            Ok(Intent::DlqRequeue { stream, id })
        }
        other => Err(ApiError::Validation(format!("unknown intent: {other}"))),
    }
}

/// Resolve free-text `input` against the fixed grammar: `status`,
/// `halt [reason...]`, `unhalt`, `run <symbol> <mode>`,
/// `dlq_list <stream>`, `dlq_requeue <stream> <id>`.
fn from_text(input: &str) -> Result<Intent, ApiError> {
    let mut words = input.split_whitespace();
    let verb = words
        .next()
        .ok_or_else(|| ApiError::Validation("empty chat input".to_string()))?;

    match verb {
        "status" => Ok(Intent::Status),
        "halt" => {
            let rest: Vec<&str> = words.collect();
            let reason = if rest.is_empty() {
                None
            } else {
                Some(rest.join(" "))
            };
            Ok(Intent::Halt { reason })
        }
        "unhalt" => Ok(Intent::Unhalt),
        "run" => {
            let symbol = words
                .next()
                .ok_or_else(|| ApiError::Validation("run requires a symbol".to_string()))?
                .to_string();
            let mode = words
                .next()
                .and_then(parse_comm_mode)
                .ok_or_else(|| ApiError::Validation("run requires a valid mode".to_string()))?;
            Ok(Intent::Run { symbol, mode })
        }
        "dlq_list" => {
            let stream = words
                .next()
                .ok_or_else(|| ApiError::Validation("dlq_list requires a stream".to_string()))?
                .to_string();
            Ok(Intent::DlqList { stream })
        }
        "dlq_requeue" => {
            let stream = words
                .next()
                .ok_or_else(|| ApiError::Validation("dlq_requeue requires a stream".to_string()))?
                .to_string();
            let id = words
                .next()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or_else(|| ApiError::Validation("dlq_requeue requires an integer id".to_string()))?;
            Ok(Intent::DlqRequeue { stream, id })
        }
        other => Err(ApiError::Validation(format!("unrecognized chat verb: {other}"))),
    }
}

pub async fn dispatch(state: &Arc<AppState>, request: ChatRequest) -> Result<ChatResponse, ApiError> {
    let intent = match (&request.intent, &request.input) {
        (Some(intent), _) => from_structured(intent, &request.args)?,
        (None, Some(input)) => from_text(input)?,
        (None, None) => {
            return Err(ApiError::Validation(
                "chat request requires either intent or input".to_string(),
            ))
        }
    };

    let (label, result) = match intent {
        Intent::Status => {
            let pnl = qf_kv::pnl::get(&state.pool).await?;
            ("status", json!({ "pnl": pnl }))
        }
        Intent::Halt { reason } => {
            let pnl = qf_kv::pnl::set_halted(&state.pool, true, reason.as_deref()).await?;
            ("halt", json!({ "pnl": pnl }))
        }
        Intent::Unhalt => {
            let pnl = qf_kv::pnl::set_halted(&state.pool, false, None).await?;
            ("unhalt", json!({ "pnl": pnl }))
        }
        Intent::Run { symbol, mode } => {
            let outcome = pipeline::dispatch_run(state, &symbol, mode, None, None).await?;
            ("run", serde_json::to_value(outcome).map_err(anyhow::Error::from)?)
        }
        Intent::DlqList { stream } => {
            let dlq_stream = streams::dlq_name(&stream);
            let entries = qf_bus::range_dlq(&state.pool, &dlq_stream, 0, i64::MAX, 100).await?;
            (
                "dlq_list",
                json!({ "stream": dlq_stream, "entries": entries.into_iter().map(|e| json!({
                    "id": e.id,
                    "originalStream": e.original_stream,
                    "failures": e.failures,
                    "lastError": e.last_error,
                    "payload": e.payload,
                })).collect::<Vec<_>>() }),
            )
        }
        Intent::DlqRequeue { stream, id } => {
            let dlq_stream = streams::dlq_name(&stream);
            let outcome = qf_bus::requeue(&state.pool, &dlq_stream, id).await?;
            ("dlq_requeue", json!({ "outcome": format!("{outcome:?}") }))
        }
    };

    Ok(ChatResponse {
        intent: label.to_string(),
        result,
    })
}
