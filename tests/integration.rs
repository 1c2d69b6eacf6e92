use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn rh_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_rh"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("alpha.md"),
        "# Alpha\n\nNotes on Rust programming. Cargo builds crates and resolves their dependencies.",
    ).unwrap();
    fs::write(
        files_dir.join("beta.md"),
        "# Beta\n\nA short tour of Python notebooks. Plotting libraries draw the charts.",
    ).unwrap();
    fs::write(
        files_dir.join("gamma.txt"),
        "Gamma runbook. Restart the worker pool, then check the queue depth on the dashboard.",
    ).unwrap();
    fs::write(files_dir.join("bundle.zip"), [b'P', b'K', 0x03, 0x04]).unwrap();

    let config_content = format!(
        r#"[store]
path = "{}/data/rh.sqlite"

[chunking]
chunk_size = 200
overlap = 20

[retrieval]
top_k = 5
min_score = 0.1

[[knowledge_bases]]
id = "kb_builtin"
name = "Ownership primer"
doc_ids = ["doc_none"]
default_content = "Ownership and borrowing keep Rust memory safe. Borrowing rules are checked at compile time."
"#,
        root.display()
    );

    let config_path = config_dir.join("rh.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_rh(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = rh_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run rh binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn files_dir(config_path: &Path) -> PathBuf {
    config_path.parent().unwrap().parent().unwrap().join("files")
}

/// First whitespace-separated token of the first line mentioning `name`.
fn doc_id_for(docs_output: &str, name: &str) -> String {
    docs_output
        .lines()
        .find(|line| line.contains(name))
        .and_then(|line| line.split_whitespace().next())
        .unwrap_or_else(|| panic!("{} not listed in:\n{}", name, docs_output))
        .to_string()
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_rh(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_rh(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_rh(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_directory_skips_unsupported() {
    let (_tmp, config_path) = setup_test_env();
    let files = files_dir(&config_path);

    run_rh(&config_path, &["init"]);
    let (stdout, stderr, success) = run_rh(&config_path, &["ingest", files.to_str().unwrap()]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Ingested 3 document(s)."));
    assert!(!stdout.contains("bundle.zip"));

    let (stats, _, _) = run_rh(&config_path, &["stats"]);
    assert!(stats.contains("Documents:   3"));
    assert!(stats.contains("Vectorized:  3"));
}

#[test]
fn test_ingest_unsupported_file_fails() {
    let (_tmp, config_path) = setup_test_env();
    let zip = files_dir(&config_path).join("bundle.zip");

    run_rh(&config_path, &["init"]);
    let (_, stderr, success) = run_rh(&config_path, &["ingest", zip.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("unsupported file type"));
}

#[test]
fn test_ingest_image_is_stored_unvectorized() {
    let (_tmp, config_path) = setup_test_env();
    let png = files_dir(&config_path).join("scan.png");
    fs::write(&png, [0x89, b'P', b'N', b'G']).unwrap();

    run_rh(&config_path, &["init"]);
    let (stdout, stderr, success) = run_rh(&config_path, &["ingest", png.to_str().unwrap()]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Ingested 1 document(s)."));

    let (stats, _, _) = run_rh(&config_path, &["stats"]);
    assert!(stats.contains("Documents:   1"));
    assert!(stats.contains("Vectorized:  0"));
}

#[test]
fn test_search_finds_ingested_file() {
    let (_tmp, config_path) = setup_test_env();
    let alpha = files_dir(&config_path).join("alpha.md");

    run_rh(&config_path, &["init"]);
    run_rh(&config_path, &["ingest", alpha.to_str().unwrap()]);

    let (stdout, stderr, success) = run_rh(&config_path, &["search", "rust cargo crates"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.starts_with("1. ["));
    assert!(stdout.contains("alpha.md"));
}

#[test]
fn test_search_empty_index() {
    let (_tmp, config_path) = setup_test_env();

    run_rh(&config_path, &["init"]);
    let (stdout, _, success) = run_rh(&config_path, &["search", "anything"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_delete_removes_document() {
    let (_tmp, config_path) = setup_test_env();
    let files = files_dir(&config_path);

    run_rh(&config_path, &["init"]);
    run_rh(&config_path, &["ingest", files.to_str().unwrap()]);

    let (docs, _, _) = run_rh(&config_path, &["docs"]);
    let id = doc_id_for(&docs, "beta.md");

    let (stdout, _, success) = run_rh(&config_path, &["delete", &id]);
    assert!(success);
    assert!(stdout.contains("Deleted"));

    let (docs_after, _, _) = run_rh(&config_path, &["docs"]);
    assert!(!docs_after.contains("beta.md"));
    assert!(docs_after.contains("alpha.md"));

    let (again, _, _) = run_rh(&config_path, &["delete", &id]);
    assert!(again.contains("No document"));
}

#[test]
fn test_query_uses_builtin_content() {
    let (_tmp, config_path) = setup_test_env();

    run_rh(&config_path, &["init"]);
    let (stdout, stderr, success) = run_rh(&config_path, &["query", "ownership borrowing"]);
    assert!(success, "query failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("[Ownership primer] (built-in)"));
}

#[test]
fn test_query_unknown_kb_fails() {
    let (_tmp, config_path) = setup_test_env();

    run_rh(&config_path, &["init"]);
    let (_, stderr, success) = run_rh(&config_path, &["query", "x", "--kb", "kb_missing"]);
    assert!(!success);
    assert!(stderr.contains("unknown knowledge base"));
}

#[test]
fn test_source_add_list_remove() {
    let (_tmp, config_path) = setup_test_env();

    run_rh(&config_path, &["init"]);
    let (added, stderr, success) = run_rh(
        &config_path,
        &[
            "source",
            "add",
            "https://example.com/guide",
            "--name",
            "Guide",
            "--kb",
            "kb_builtin",
        ],
    );
    assert!(success, "source add failed: {}", stderr);
    let id = added
        .trim()
        .strip_prefix("Added source ")
        .and_then(|s| s.strip_suffix('.'))
        .unwrap()
        .to_string();

    let (listed, _, _) = run_rh(&config_path, &["source", "list", "--kb", "kb_builtin"]);
    assert!(listed.contains(&id));
    assert!(listed.contains("idle"));

    run_rh(&config_path, &["source", "disable", &id]);
    let (disabled, _, _) = run_rh(&config_path, &["source", "list"]);
    assert!(disabled.contains("(disabled)"));

    let (removed, _, _) = run_rh(&config_path, &["source", "remove", &id]);
    assert!(removed.contains("Removed"));
    let (empty, _, _) = run_rh(&config_path, &["source", "list"]);
    assert!(empty.contains("No external sources."));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_tmp, config_path) = setup_test_env();
    let broken = fs::read_to_string(&config_path)
        .unwrap()
        .replace("overlap = 20", "overlap = 200");
    fs::write(&config_path, broken).unwrap();

    let (_, stderr, success) = run_rh(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("overlap"));
}
