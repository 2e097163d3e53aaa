use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn setup_test_env(extra: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[data]
faq_path = "{}/data/clinic_info.json"

[index]
provider = "memory"
dimension = 8

[embedding]
provider = "disabled"

[generation]
provider = "extractive"

[logging]
level = "warn"
{}
"#,
        root.display(),
        extra
    );

    let config_path = config_dir.join("clinic-rag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_cli(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = env!("CARGO_BIN_EXE_clinic-rag");
    let workdir = config_path.parent().and_then(Path::parent).unwrap();
    let output = Command::new(binary)
        .current_dir(workdir)
        .env_remove("PINECONE_API_KEY")
        .env_remove("PINECONE_ENVIRONMENT")
        .env_remove("GEMINI_API_KEY")
        .env_remove("BACKEND_PORT")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run clinic-rag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_chat_scheduling_without_credentials() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_cli(&config_path, &["chat", "I have a headache"]);
    assert!(success, "chat failed: stdout={}, stderr={}", stdout, stderr);

    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["intent"], "SCHEDULING");
    assert_eq!(
        json["agent_response"],
        "I see you are asking about scheduling. Please tell me the reason for your visit."
    );
}

#[test]
fn test_chat_uses_configured_scheduling_text() {
    let (_tmp, config_path) =
        setup_test_env("\n[router]\nscheduling_response = \"What brings you in today?\"\n");

    let (stdout, _, success) = run_cli(&config_path, &["chat", "sore throat"]);
    assert!(success);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["agent_response"], "What brings you in today?");
}

#[test]
fn test_index_missing_file_aborts_cleanly() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_cli(&config_path, &["index", "--progress", "off"]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("indexing aborted"));
    assert!(stdout.contains("clinic_info.json"));
}

#[test]
fn test_index_with_embeddings_disabled_fails() {
    let (tmp, config_path) = setup_test_env("");
    let data_dir = tmp.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();
    fs::write(
        data_dir.join("clinic_info.json"),
        r#"[{"question": "Hours?", "answer": "9 to 5", "topic": "General"}]"#,
    )
    .unwrap();

    let (_, stderr, success) = run_cli(&config_path, &["index", "--progress", "off"]);
    assert!(!success);
    assert!(
        stderr.contains("embedding provider is disabled"),
        "unexpected stderr: {}",
        stderr
    );
}

#[test]
fn test_init_memory_index() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_cli(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("index clinic-faqs-index ready (dimension 8, metric cosine)"));
}

#[test]
fn test_pinecone_without_credentials_fails() {
    let (_tmp, config_path) = setup_test_env("");
    let content = fs::read_to_string(&config_path)
        .unwrap()
        .replace("provider = \"memory\"", "provider = \"pinecone\"");
    fs::write(&config_path, content).unwrap();

    let (_, stderr, success) = run_cli(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("PINECONE_API_KEY"), "unexpected stderr: {}", stderr);
}

#[test]
fn test_invalid_config_rejected() {
    let (_tmp, config_path) = setup_test_env("\n[retrieval]\ntop_k = 0\n");

    let (_, stderr, success) = run_cli(&config_path, &["chat", "hello"]);
    assert!(!success);
    assert!(stderr.contains("top_k"), "unexpected stderr: {}", stderr);
}
