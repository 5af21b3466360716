use std::{path::PathBuf, sync::Arc};

use rmcp::{
    ServerHandler,
    ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult,
        Content,
        Implementation,
        ServerCapabilities,
        ServerInfo,
    },
    tool,
    tool_handler,
    tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    chat::SearchScope,
    error,
    search::{self, SearchOptions, SearchResult},
};

/// Cap on results forwarded to a remote model, to bound payload size.
pub const MAX_FORWARDED_RESULTS: usize = 10;

/// Parameters of the `local_file_search` tool. Field names are the wire
/// schema shared with the Gemini tool declaration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LocalSearchParams {
    /// The keywords or phrases to search for in the files.
    pub search_query: String,
    /// Optional. Specific file extensions to target (e.g. [".inp", ".op"]).
    /// Defaults to [".html", ".htm", ".tex", ".inp", ".op"].
    pub file_extensions: Option<Vec<String>>,
    /// Optional. A subdirectory of the document tree to focus the search on
    /// (e.g. "inputs", "docs/latex").
    pub sub_directory: Option<String>,
}

impl LocalSearchParams {
    /// Resolve the tool parameters against the configured search scope.
    pub fn into_options(self, scope: &SearchScope) -> SearchOptions {
        let mut options =
            SearchOptions::new(self.search_query, scope.root_dir.clone());
        options.exclusions = scope.exclusions.clone();
        if let Some(extensions) = self.file_extensions {
            if !extensions.is_empty() {
                options.target_extensions = extensions;
            }
        }
        options.sub_directory = self.sub_directory.map(PathBuf::from);
        options
    }
}

/// The off-box view of a [`SearchResult`]: everything except the
/// absolute path, which never leaves the local process.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardedResult {
    pub file_name: String,
    pub relative_path: String,
    pub snippet: String,
}

impl From<&SearchResult> for ForwardedResult {
    fn from(result: &SearchResult) -> Self {
        Self {
            file_name: result.file_name.clone(),
            relative_path: result.relative_path.to_string_lossy().into_owned(),
            snippet: result.snippet.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    query: String,
    total_count: usize,
    results: Vec<ForwardedResult>,
}

#[derive(Clone)]
pub struct DocscoutMcpServer {
    scope: Arc<SearchScope>,
    tool_router: ToolRouter<Self>,
}

impl DocscoutMcpServer {
    pub fn new(scope: SearchScope) -> Self {
        Self {
            scope: Arc::new(scope),
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router(router = tool_router)]
impl DocscoutMcpServer {
    /// Case-insensitive substring search over the configured document tree.
    #[tool(
        name = "local_file_search",
        description = "Searches for keywords in local document files (HTML, TeX, INP, OP) under the configured root directory. Can search specific subdirectories and filter by file extension."
    )]
    pub async fn local_file_search(
        &self,
        params: Parameters<LocalSearchParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let options = params.0.into_options(&self.scope);
        let query = options.query.clone();

        let results = search::search(&options)
            .map_err(|e| mcp_error("search failed", e))?;

        let total_count = results.len();
        let forwarded: Vec<ForwardedResult> = results
            .iter()
            .take(MAX_FORWARDED_RESULTS)
            .map(ForwardedResult::from)
            .collect();

        let summary = format_search_summary(&forwarded, total_count, &query);
        let structured = serde_json::to_value(SearchResponse {
            query,
            total_count,
            results: forwarded,
        })
        .map_err(|e| mcp_error("failed to serialize search results", e))?;

        let mut result = CallToolResult::success(vec![Content::text(summary)]);
        result.structured_content = Some(structured);
        Ok(result)
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for DocscoutMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info.server_info = Implementation::new("docscout", env!("CARGO_PKG_VERSION"))
            .with_title("docscout MCP");
        info.instructions = Some(
            "Use local_file_search to find keywords in the local document tree. Narrow with sub_directory or file_extensions when possible."
                .to_string(),
        );
        info
    }
}

fn format_search_summary(
    results: &[ForwardedResult],
    total_count: usize,
    query: &str,
) -> String {
    if results.is_empty() {
        return format!("No results found for \"{query}\"");
    }

    let mut lines = Vec::with_capacity(results.len() + 1);
    let suffix = if total_count == 1 { "" } else { "s" };
    if total_count > results.len() {
        lines.push(format!(
            "Found {total_count} result{suffix} for \"{query}\" (showing first {}):",
            results.len()
        ));
    } else {
        lines.push(format!("Found {total_count} result{suffix} for \"{query}\":"));
    }

    for item in results {
        lines.push(format!("{} -- {}", item.relative_path, item.snippet));
    }

    lines.join("\n")
}

fn mcp_error(message: &str, error: impl std::fmt::Display) -> rmcp::ErrorData {
    rmcp::ErrorData::internal_error(
        message.to_string(),
        Some(json!({ "error": error.to_string() })),
    )
}

pub fn run_mcp(scope: SearchScope) -> error::Result<()> {
    let server = DocscoutMcpServer::new(scope);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            error::Error::Config(format!("failed to start tokio runtime: {e}"))
        })?;

    runtime.block_on(async move {
        let transport = rmcp::transport::stdio();
        let running = server.serve(transport).await.map_err(|e| {
            error::Error::Config(format!(
                "MCP server initialization failed: {e}"
            ))
        })?;
        running.waiting().await.map_err(|e| {
            error::Error::Config(format!("MCP server error: {e}"))
        })?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_for(root: &std::path::Path) -> DocscoutMcpServer {
        DocscoutMcpServer::new(SearchScope {
            root_dir: root.to_path_buf(),
            exclusions: Vec::new(),
        })
    }

    #[tokio::test]
    async fn search_tool_returns_structured_results() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("notes.html"),
            "<html><body><p>Hello WORLD</p></body></html>",
        )
        .unwrap();

        let server = server_for(tmp.path());
        let params = LocalSearchParams {
            search_query: "hello".to_string(),
            file_extensions: None,
            sub_directory: None,
        };

        let result =
            server.local_file_search(Parameters(params)).await.unwrap();

        let structured = result.structured_content.expect("structured");
        let results = structured
            .get("results")
            .and_then(|v| v.as_array())
            .expect("results array");

        assert_eq!(results.len(), 1);
        let first = &results[0];
        assert_eq!(
            first.get("fileName").and_then(|v| v.as_str()),
            Some("notes.html")
        );
        assert_eq!(
            first.get("relativePath").and_then(|v| v.as_str()),
            Some("notes.html")
        );
        let snippet =
            first.get("snippet").and_then(|v| v.as_str()).unwrap_or("");
        assert!(snippet.contains("Hello WORLD"));
        assert!(first.get("absolutePath").is_none());

        let summary = result
            .content
            .first()
            .and_then(|c| c.as_text())
            .map(|t| t.text.clone())
            .unwrap_or_default();
        assert!(summary.contains("Found 1 result"));
    }

    #[tokio::test]
    async fn search_tool_honors_extension_filter() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.inp"), "needle").unwrap();
        std::fs::write(tmp.path().join("b.op"), "needle").unwrap();

        let server = server_for(tmp.path());
        let params = LocalSearchParams {
            search_query: "needle".to_string(),
            file_extensions: Some(vec![".op".to_string()]),
            sub_directory: None,
        };

        let result =
            server.local_file_search(Parameters(params)).await.unwrap();
        let structured = result.structured_content.expect("structured");
        let results = structured["results"].as_array().unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["fileName"], "b.op");
    }

    #[tokio::test]
    async fn search_tool_caps_forwarded_results() {
        let tmp = tempfile::tempdir().unwrap();
        for i in 0..12 {
            std::fs::write(tmp.path().join(format!("f{i:02}.inp")), "needle")
                .unwrap();
        }

        let server = server_for(tmp.path());
        let params = LocalSearchParams {
            search_query: "needle".to_string(),
            file_extensions: None,
            sub_directory: None,
        };

        let result =
            server.local_file_search(Parameters(params)).await.unwrap();
        let structured = result.structured_content.expect("structured");

        assert_eq!(structured["totalCount"], 12);
        assert_eq!(
            structured["results"].as_array().unwrap().len(),
            MAX_FORWARDED_RESULTS
        );
    }

    #[tokio::test]
    async fn search_tool_cannot_escape_root_via_sub_directory() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("leak.inp"), "needle").unwrap();

        let server = server_for(root.path());
        let params = LocalSearchParams {
            search_query: "needle".to_string(),
            file_extensions: None,
            sub_directory: Some(
                outside.path().to_string_lossy().into_owned(),
            ),
        };

        let result =
            server.local_file_search(Parameters(params)).await.unwrap();
        let structured = result.structured_content.expect("structured");
        assert_eq!(structured["totalCount"], 0);
        assert!(structured["results"].as_array().unwrap().is_empty());
    }

    #[test]
    fn params_deserialize_from_wire_names() {
        let params: LocalSearchParams = serde_json::from_value(json!({
            "search_query": "relaxation",
            "file_extensions": [".inp"],
            "sub_directory": "inputs"
        }))
        .unwrap();
        assert_eq!(params.search_query, "relaxation");
        assert_eq!(params.file_extensions.as_deref(), Some(&[".inp".to_string()][..]));
        assert_eq!(params.sub_directory.as_deref(), Some("inputs"));
    }
}
