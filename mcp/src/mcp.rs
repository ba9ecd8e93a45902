//! MCP (Model Context Protocol) JSON-RPC handler.
//!
//! Reads framed JSON-RPC 2.0 messages (see [`crate::framing`]) and answers
//! each in the framing it arrived in.
//!
//! ## Supported methods
//!
//! | Method        | Description                                   |
//! |---------------|-----------------------------------------------|
//! | `initialize`  | Server info, capabilities and tool list       |
//! | `tools/list`  | List available tool definitions               |
//! | `tools/call`  | Execute a tool and return its result          |
//! | `ping`        | Liveness check                                |
//! | `shutdown`    | Acknowledged with `{"status":"ok"}`           |
//! | `exit`        | Ends the process, no response                 |
//!
//! Messages without an `id` are notifications and never get a response.
//! `exit` is honoured either way; other notifications are ignored.

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};

use crate::framing::{read_message, write_message, FrameKind, FramingError};
use crate::protocol::{
    InitializeResult, Request, Response, RpcError, ServerInfo, ToolCallParams, ToolCallResult,
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION, METHOD_NOT_FOUND,
    PARSE_ERROR, PROTOCOL_VERSION,
};
use crate::tools::{self, ToolContext};

const SERVER_NAME: &str = "chef-server-mcp";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// What to do after handling one message.
#[derive(Debug)]
pub enum Outcome {
    Reply(Response),
    /// Notification; nothing is written.
    Silent,
    Exit,
}

/// Why the read loop stopped.
#[derive(Debug, PartialEq, Eq)]
pub enum Stop {
    Eof,
    Exit,
}

pub struct Dispatcher {
    tools: ToolContext,
}

impl Dispatcher {
    pub fn new(tools: ToolContext) -> Self {
        Self { tools }
    }

    /// Handle one message body.
    pub async fn handle(&self, payload: &[u8]) -> Outcome {
        let request: Request = match serde_json::from_slice(payload) {
            Ok(r) => r,
            Err(e) => return Outcome::Reply(decode_failure(payload, &e)),
        };

        if request.method == "exit" {
            tracing::info!("exit requested");
            return Outcome::Exit;
        }

        let Some(id) = request.id.clone() else {
            if request.method.starts_with("notifications/") {
                tracing::debug!(method = %request.method, "notification");
            } else {
                tracing::warn!(method = %request.method, "ignoring request without id");
            }
            return Outcome::Silent;
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Outcome::Reply(Response::error(
                id,
                RpcError::new(
                    INVALID_REQUEST,
                    format!("unsupported jsonrpc version: {}", request.jsonrpc),
                ),
            ));
        }

        tracing::debug!(method = %request.method, id = %id, "request");
        let reply = match request.method.as_str() {
            "initialize" => Ok(Self::initialize()),
            "tools/list" => Ok(json!({ "tools": tools::definitions() })),
            "tools/call" => self.tools_call(&request).await,
            "ping" => Ok(json!({})),
            "shutdown" => Ok(json!({ "status": "ok" })),
            other => Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("method not found: {other}"),
            )),
        };

        Outcome::Reply(match reply {
            Ok(result) => Response::result(id, result),
            Err(error) => Response::error(id, error),
        })
    }

    fn initialize() -> Value {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION,
            capabilities: json!({ "tools": { "listChanged": false } }),
            server_info: ServerInfo {
                name: SERVER_NAME,
                version: SERVER_VERSION,
            },
            tools: tools::definitions(),
        };
        serde_json::to_value(result).unwrap_or_default()
    }

    async fn tools_call(&self, request: &Request) -> Result<Value, RpcError> {
        let raw = request.params.as_deref().map_or("{}", |p| p.get());
        let params: ToolCallParams = serde_json::from_str(raw)
            .map_err(|e| RpcError::new(INVALID_PARAMS, format!("invalid tools/call params: {e}")))?;

        let output = self
            .tools
            .call(&params.name, params.arguments.as_deref())
            .await
            .map_err(|e| RpcError::new(e.code(), e.to_string()))?;

        serde_json::to_value(ToolCallResult::structured(output))
            .map_err(|e| RpcError::new(INTERNAL_ERROR, e.to_string()))
    }
}

/// Response for a body that did not decode as a request.
///
/// Malformed JSON is a parse error with a null id. Well-formed JSON that is
/// not a valid request is an invalid request, echoing its id when it has one.
fn decode_failure(payload: &[u8], err: &serde_json::Error) -> Response {
    if err.is_syntax() || err.is_eof() {
        tracing::warn!(error = %err, "parse error");
        return Response::error(Value::Null, RpcError::new(PARSE_ERROR, format!("parse error: {err}")));
    }
    let id = serde_json::from_slice::<Value>(payload)
        .ok()
        .and_then(|v| v.get("id").cloned())
        .unwrap_or(Value::Null);
    tracing::warn!(error = %err, "invalid request");
    Response::error(id, RpcError::new(INVALID_REQUEST, format!("invalid request: {err}")))
}

/// Serve messages from `reader` until end of input or `exit`.
///
/// Framing errors end the loop; everything else is answered and the loop
/// continues.
pub async fn run<R, W>(reader: &mut R, writer: &mut W, dispatcher: &Dispatcher) -> Result<Stop, FramingError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = read_message(reader).await? {
        match dispatcher.handle(&frame.payload).await {
            Outcome::Reply(response) => send(writer, &response, frame.kind).await?,
            Outcome::Silent => {}
            Outcome::Exit => return Ok(Stop::Exit),
        }
    }
    Ok(Stop::Eof)
}

async fn send<W>(writer: &mut W, response: &Response, kind: FrameKind) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(response).map_err(std::io::Error::other)?;
    write_message(writer, &body, kind).await?;
    Ok(())
}

/// Run on stdin/stdout.
pub async fn run_stdio(dispatcher: &Dispatcher) -> Result<Stop, FramingError> {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut writer = tokio::io::stdout();
    run(&mut reader, &mut writer, dispatcher).await
}
