//! Integration tests for the summary archive contents
//!
//! Each test starts fake pmm-agent / PMM Server endpoints, builds an archive
//! into a temp dir and inspects it with a zip reader.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use pmm_admin::{Config, Status, SummaryBuilder, SummaryOptions};
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use super::common::archive::{read_archive, text};
use super::common::fake_pmm::{
    closed_port, fake_agent, fake_server, fake_vmagent, make_zip, status_json,
};

fn config_for(agent: SocketAddr) -> Config {
    let mut config = Config::default();
    config.pmm_agent.listen_port = agent.port();
    config.pmm_agent.binary = PathBuf::from("/nonexistent/pmm-agent");
    config.http_timeout = Duration::from_secs(10);
    config
}

fn options(dir: &TempDir, name: &str, skip_server: bool, pprof: bool) -> SummaryOptions {
    SummaryOptions {
        filename: dir.path().join(name),
        skip_server,
        pprof,
    }
}

async fn build(config: Config, options: &SummaryOptions) {
    let builder = SummaryBuilder::new(config).expect("Failed to create builder");
    let result = builder
        .build(&CancellationToken::new(), options)
        .await
        .expect("Summary should succeed");
    assert_eq!(result.filename, options.filename.display().to_string());
}

/// pmm-server agent with reachable server logs yields client and server entries
#[tokio::test]
async fn test_server_logs_are_mirrored() {
    let server = fake_server(make_zip(&[("a.log", "aaa\n"), ("b.log", "bbb\n")]), None).await;
    let agent = fake_agent(
        status_json("pmm-server", "pmm-server", &format!("http://{}/", server)),
        None,
    )
    .await;

    let dir = TempDir::new().unwrap();
    let options = options(&dir, "summary.zip", false, false);
    build(config_for(agent), &options).await;

    let entries = read_archive(&options.filename);
    for name in [
        "client/status.json",
        "client/pmm-agent-version.txt",
        "client/pmm-admin-version.txt",
        "server/a.log",
        "server/b.log",
    ] {
        assert!(entries.contains_key(name), "missing {name}: {:?}", entries.keys());
    }
    assert_eq!(text(&entries, "server/a.log"), "aaa\n");
    assert_eq!(text(&entries, "server/b.log"), "bbb\n");
    assert!(text(&entries, "client/pmm-agent-version.txt").contains("/nonexistent/pmm-agent"));
    assert!(text(&entries, "client/pmm-admin-version.txt").contains("ProjectName: pmm-admin"));
}

/// --skip-server never produces server/ entries
#[tokio::test]
async fn test_skip_server_has_no_server_entries() {
    let server = fake_server(make_zip(&[("a.log", "aaa")]), None).await;
    let agent = fake_agent(
        status_json("pmm-server", "pmm-server", &format!("http://{}/", server)),
        None,
    )
    .await;

    let dir = TempDir::new().unwrap();
    let options = options(&dir, "summary.zip", true, true);
    build(config_for(agent), &options).await;

    let entries = read_archive(&options.filename);
    assert!(entries.contains_key("client/status.json"));
    assert!(
        entries.keys().all(|name| !name.starts_with("server/")),
        "unexpected server entries: {:?}",
        entries.keys()
    );
}

/// client/status.json decodes back into the status the agent returned
#[tokio::test]
async fn test_status_json_round_trips() {
    let raw = status_json("agent-1", "node-1", "https://pmm.example.com/");
    let expected: Status = serde_json::from_value(raw.clone()).unwrap();
    let agent = fake_agent(raw, None).await;

    let dir = TempDir::new().unwrap();
    let options = options(&dir, "summary.zip", true, false);
    build(config_for(agent), &options).await;

    let entries = read_archive(&options.filename);
    let decoded: Status = serde_json::from_slice(&entries["client/status.json"]).unwrap();
    assert_eq!(decoded, expected);
}

/// Credentials are redacted in status.json but still used for the server request
#[tokio::test]
async fn test_server_credentials_are_redacted_and_used() {
    // base64("admin:secret")
    let server = fake_server(
        make_zip(&[("pmm-managed.log", "ok")]),
        Some("Basic YWRtaW46c2VjcmV0"),
    )
    .await;
    let agent = fake_agent(
        status_json("agent-1", "node-1", &format!("http://admin:secret@{}/", server)),
        None,
    )
    .await;

    let dir = TempDir::new().unwrap();
    let options = options(&dir, "summary.zip", false, false);
    build(config_for(agent), &options).await;

    let entries = read_archive(&options.filename);
    let status = text(&entries, "client/status.json");
    assert!(!status.contains("secret"));
    assert!(status.contains("xxxxx:xxxxx@"));
    assert_eq!(text(&entries, "server/pmm-managed.log"), "ok");
}

/// Unreachable server logs are simply left out
#[tokio::test]
async fn test_unreachable_server_is_best_effort() {
    let port = closed_port();
    let agent = fake_agent(
        status_json("agent-1", "node-1", &format!("http://127.0.0.1:{}/", port)),
        None,
    )
    .await;

    let dir = TempDir::new().unwrap();
    let options = options(&dir, "summary.zip", false, false);
    build(config_for(agent), &options).await;

    let entries = read_archive(&options.filename);
    assert!(entries.contains_key("client/status.json"));
    assert!(entries.keys().all(|name| !name.starts_with("server/")));
}

/// pmm-agent's own logs.zip lands under client/pmm-agent/
#[tokio::test]
async fn test_agent_logs_are_included() {
    let agent = fake_agent(
        status_json("agent-1", "node-1", ""),
        Some(make_zip(&[("pmm-agent.log", "agent log"), ("node_exporter.log", "ne")])),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let options = options(&dir, "summary.zip", true, false);
    build(config_for(agent), &options).await;

    let entries = read_archive(&options.filename);
    assert_eq!(text(&entries, "client/pmm-agent/pmm-agent.log"), "agent log");
    assert_eq!(text(&entries, "client/pmm-agent/node_exporter.log"), "ne");
}

/// The pmm-agent config file is copied, or replaced by the open error
#[tokio::test]
async fn test_agent_config_file_is_copied() {
    let dir = TempDir::new().unwrap();
    let config_file = dir.path().join("pmm-agent.yaml");
    std::fs::write(&config_file, "id: /agent_id/abc\n").unwrap();

    let mut status = status_json("agent-1", "node-1", "");
    status["config_filepath"] = json!(config_file.display().to_string());
    let agent = fake_agent(status, None).await;

    let copied = options(&dir, "copied.zip", true, false);
    build(config_for(agent), &copied).await;
    let entries = read_archive(&copied.filename);
    assert_eq!(
        text(&entries, "client/pmm-agent-config.yaml"),
        "id: /agent_id/abc\n"
    );

    let mut status = status_json("agent-1", "node-1", "");
    status["config_filepath"] = json!(dir.path().join("gone.yaml").display().to_string());
    let agent = fake_agent(status, None).await;

    let missing = options(&dir, "missing.zip", true, false);
    build(config_for(agent), &missing).await;
    let entries = read_archive(&missing.filename);
    let error = text(&entries, "client/pmm-agent-config.yaml");
    assert!(error.contains("gone.yaml"), "unexpected error text: {error}");
}

/// vmagent targets are dumped as JSON and as the HTML page
#[tokio::test]
async fn test_vmagent_targets_are_dumped() {
    let vmagent = fake_vmagent().await;
    let mut status = status_json("agent-1", "node-1", "");
    status["agents_info"] = json!([
        {"agent_id": "ne", "agent_type": "AGENT_TYPE_NODE_EXPORTER", "status": "AGENT_STATUS_RUNNING", "listen_port": 1},
        {"agent_id": "vm", "agent_type": "AGENT_TYPE_VM_AGENT", "status": "AGENT_STATUS_RUNNING", "listen_port": vmagent.port()}
    ]);
    let agent = fake_agent(status, None).await;

    let dir = TempDir::new().unwrap();
    let options = options(&dir, "summary.zip", true, false);
    build(config_for(agent), &options).await;

    let entries = read_archive(&options.filename);
    let targets: serde_json::Value =
        serde_json::from_slice(&entries["client/vmagent-targets.json"]).unwrap();
    assert_eq!(targets["data"]["activeTargets"].as_array().unwrap().len(), 2);
    assert_eq!(
        text(&entries, "client/vmagent-targets.html"),
        "<html>targets</html>"
    );
}

/// Two runs over unchanged data produce the same entry names
#[tokio::test]
async fn test_entry_names_are_stable_across_runs() {
    let server = fake_server(make_zip(&[("a.log", "a"), ("b.log", "b")]), None).await;
    let agent = fake_agent(
        status_json("agent-1", "node-1", &format!("http://{}/", server)),
        Some(make_zip(&[("pmm-agent.log", "log")])),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let first = options(&dir, "first.zip", false, true);
    let second = options(&dir, "second.zip", false, true);
    build(config_for(agent), &first).await;
    build(config_for(agent), &second).await;

    let first_names: BTreeSet<String> = read_archive(&first.filename).into_keys().collect();
    let second_names: BTreeSet<String> = read_archive(&second.filename).into_keys().collect();
    assert_eq!(first_names, second_names);
    assert!(first_names.contains("client/pprof/pmm-agent/heap.pb.gz"));
}
