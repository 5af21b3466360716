use std::path::{Path, PathBuf};

use rmcp::{
    ServiceExt,
    model::CallToolRequestParams,
    transport::{ConfigureCommandExt, TokioChildProcess},
};
use serde_json::json;

fn setup_fixture(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::write(
        root.join("notes.html"),
        "<html><body><p>Hello WORLD</p><script>var hello = 1;</script></body></html>",
    )?;
    std::fs::write(
        root.join("paper.tex"),
        "% comment\nThis is \\textbf{bold} text about relaxation.\n",
    )?;

    let inputs = root.join("inputs");
    std::fs::create_dir_all(&inputs)?;
    std::fs::write(inputs.join("run.inp"), "RUN-SECTION\n  relaxation\nend-run-section\n")?;

    let excluded = root.join("excluded");
    std::fs::create_dir_all(&excluded)?;
    std::fs::write(excluded.join("secret.inp"), "relaxation secrets\n")?;

    Ok(())
}

#[tokio::test]
async fn mcp_stdio_search_roundtrip() -> Result<(), Box<dyn std::error::Error>>
{
    let tempdir = tempfile::tempdir()?;
    let root = tempdir.path().join("docs");
    std::fs::create_dir_all(&root)?;
    setup_fixture(&root)?;

    let config_dir = tempdir.path().join("config");
    let excluded = root.join("excluded");

    let bin = docscout_bin()?;
    let transport = TokioChildProcess::new(
        tokio::process::Command::new(bin).configure(|cmd| {
            cmd.arg("mcp")
                .arg("--root")
                .arg(&root)
                .arg("--exclude")
                .arg(&excluded)
                .env("DOCSCOUT_CONFIG_DIR", &config_dir);
        }),
    )?;

    let client = ().serve(transport).await?;

    // HTML match: case-insensitive query, snippet keeps original case,
    // script content is not searchable.
    let args = json!({ "search_query": "hello" });
    let result = client
        .peer()
        .call_tool({
            let mut params = CallToolRequestParams::new("local_file_search");
            params.arguments = Some(args.as_object().unwrap().clone());
            params
        })
        .await?;

    let structured = result.structured_content.expect("structured content");
    let results = structured
        .get("results")
        .and_then(|v| v.as_array())
        .expect("results array");

    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].get("fileName").and_then(|v| v.as_str()),
        Some("notes.html")
    );
    let snippet = results[0]
        .get("snippet")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    assert!(snippet.contains("Hello WORLD"));

    // Excluded subtree never appears, sub_directory narrows the walk but
    // relative paths stay anchored at the root.
    let args = json!({
        "search_query": "relaxation",
        "file_extensions": [".inp"],
        "sub_directory": "inputs"
    });
    let result = client
        .peer()
        .call_tool({
            let mut params = CallToolRequestParams::new("local_file_search");
            params.arguments = Some(args.as_object().unwrap().clone());
            params
        })
        .await?;

    let structured = result.structured_content.expect("structured content");
    let results = structured
        .get("results")
        .and_then(|v| v.as_array())
        .expect("results array");

    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].get("relativePath").and_then(|v| v.as_str()),
        Some("inputs/run.inp")
    );
    assert!(results.iter().all(|r| {
        r.get("relativePath")
            .and_then(|v| v.as_str())
            .is_some_and(|p| !p.contains("secret"))
    }));

    client.cancel().await?;
    Ok(())
}

fn docscout_bin() -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Ok(bin) = std::env::var("CARGO_BIN_EXE_docscout") {
        return Ok(PathBuf::from(bin));
    }

    let mut path = std::env::current_exe()?;
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.push("docscout");

    if cfg!(windows) {
        path.set_extension("exe");
    }

    Ok(path)
}
