use std::io::Write as _;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::{
    error::{Error, Result},
    mcp::{ForwardedResult, LocalSearchParams, MAX_FORWARDED_RESULTS},
    search,
};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const SEARCH_TOOL_NAME: &str = "local_file_search";

/// The directory tree the model's file search tool is allowed to see.
#[derive(Debug, Clone)]
pub struct SearchScope {
    pub root_dir: PathBuf,
    pub exclusions: Vec<PathBuf>,
}

// -- generateContent wire types --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

/// The local_file_search declaration sent to Gemini, mirroring the
/// parameters the MCP surface exposes.
fn search_tool_declaration() -> serde_json::Value {
    json!({
        "functionDeclarations": [{
            "name": SEARCH_TOOL_NAME,
            "description": "Searches for keywords in the configured local \
                document tree (HTML, TeX, INP, OP files). Can search \
                specific subdirectories and filter by file extension.",
            "parameters": {
                "type": "OBJECT",
                "properties": {
                    "search_query": {
                        "type": "STRING",
                        "description": "The keywords or phrases to search for in the files."
                    },
                    "file_extensions": {
                        "type": "ARRAY",
                        "description": "Optional. Specific file extensions to target \
                            (e.g. [\".inp\", \".op\"]). Defaults to \
                            [\".html\", \".htm\", \".tex\", \".inp\", \".op\"].",
                        "items": { "type": "STRING" }
                    },
                    "sub_directory": {
                        "type": "STRING",
                        "description": "Optional. A subdirectory of the document tree \
                            to focus the search on (e.g. \"inputs\", \"docs/latex\")."
                    }
                },
                "required": ["search_query"]
            }
        }]
    })
}

/// One conversation with Gemini. Keeps the turn history and the search
/// scope the model's tool calls are resolved against.
pub struct ChatSession {
    client: reqwest::Client,
    api_key: String,
    model: String,
    scope: SearchScope,
    history: Vec<Content>,
}

impl ChatSession {
    pub fn new(api_key: String, model: String, scope: SearchScope) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            scope,
            history: Vec::new(),
        }
    }

    /// Send one user message and return the model's text reply.
    ///
    /// When the model answers with a `local_file_search` call instead of
    /// text, the search runs locally, at most [`MAX_FORWARDED_RESULTS`]
    /// redacted results go back to the model, and its follow-up text is
    /// returned. The history only advances when a turn completes.
    pub async fn send(&mut self, message: &str) -> Result<String> {
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::Chat("cannot send an empty message".into()));
        }

        let mut contents = self.history.clone();
        contents.push(Content {
            role: "user".into(),
            parts: vec![Part::text(message)],
        });

        let candidate = self.generate(&contents, true).await?;
        let model_turn = candidate.content.ok_or_else(|| {
            Error::Chat("model response contained no content".into())
        })?;

        let part = model_turn.parts.first().cloned().unwrap_or_default();

        let reply = if let Some(text) = part.text {
            self.history = contents;
            self.history.push(model_turn);
            text
        } else if let Some(call) = part.function_call {
            info!("model called {} with {}", call.name, call.args);
            let tool_response = self.dispatch_tool_call(&call)?;

            contents.push(model_turn);
            contents.push(Content {
                role: "tool".into(),
                parts: vec![Part {
                    function_response: Some(FunctionResponse {
                        name: call.name,
                        response: tool_response,
                    }),
                    ..Default::default()
                }],
            });

            // Second round-trip: hand the tool output back and let the
            // model produce the final text.
            let candidate = self.generate(&contents, false).await?;
            let final_turn = candidate.content.ok_or_else(|| {
                Error::Chat(
                    "model produced no text after tool execution".into(),
                )
            })?;
            let text = final_turn
                .parts
                .first()
                .and_then(|p| p.text.clone())
                .ok_or_else(|| {
                    Error::Chat(
                        "model produced no text after tool execution".into(),
                    )
                })?;

            self.history = contents;
            self.history.push(final_turn);
            text
        } else {
            return Err(Error::Chat(
                "unexpected content part in model response".into(),
            ));
        };

        Ok(reply)
    }

    /// Execute a tool call locally. Only `local_file_search` exists; the
    /// payload sent back to the model never includes absolute paths.
    fn dispatch_tool_call(
        &self,
        call: &FunctionCall,
    ) -> Result<serde_json::Value> {
        if call.name != SEARCH_TOOL_NAME {
            return Err(Error::Chat(format!(
                "model requested unknown tool: {}",
                call.name
            )));
        }

        let params: LocalSearchParams =
            serde_json::from_value(call.args.clone())?;
        let options = params.into_options(&self.scope);

        match search::search(&options) {
            Ok(results) => {
                info!("local search found {} result(s)", results.len());
                let forwarded: Vec<ForwardedResult> = results
                    .iter()
                    .take(MAX_FORWARDED_RESULTS)
                    .map(ForwardedResult::from)
                    .collect();
                Ok(json!({
                    "status": "success",
                    "files_found": forwarded,
                }))
            }
            Err(e) => Ok(json!({
                "status": "error",
                "details": e.to_string(),
            })),
        }
    }

    async fn generate(
        &self,
        contents: &[Content],
        with_tools: bool,
    ) -> Result<Candidate> {
        let mut body = json!({ "contents": contents });
        if with_tools {
            body["tools"] = json!([search_tool_declaration()]);
        }

        let url = format!("{API_BASE}/{}:generateContent", self.model);
        debug!("sending {} turn(s) to {}", contents.len(), self.model);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Chat(api_error_message(status, &body)));
        }

        let parsed: GenerateResponse = response.json().await?;
        let candidate = parsed.candidates.into_iter().next().ok_or_else(|| {
            Error::Chat("response contained no candidates".into())
        })?;

        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(Error::Chat(
                "response blocked by safety settings; rephrase the message"
                    .into(),
            ));
        }

        Ok(candidate)
    }
}

fn api_error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) =
            value.pointer("/error/message").and_then(|m| m.as_str())
        {
            return format!("Gemini API error ({status}): {message}");
        }
    }
    format!("Gemini API error ({status})")
}

/// Interactive chat loop over stdin. `exit`/`quit` or EOF ends it.
pub fn run_chat(
    api_key: String,
    model: String,
    scope: SearchScope,
) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            Error::Config(format!("failed to start tokio runtime: {e}"))
        })?;

    let mut session = ChatSession::new(api_key, model, scope);
    let stdin = std::io::stdin();
    let mut line = String::new();

    println!("Chatting with {} (exit/quit to leave)", session.model);
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message == "exit" || message == "quit" {
            break;
        }

        match runtime.block_on(session.send(message)) {
            Ok(reply) => println!("{reply}\n"),
            Err(e) => eprintln!("chat error: {e}"),
        }
    }

    Ok(())
}
