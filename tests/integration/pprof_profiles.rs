//! Integration tests for `--pprof` profile collection

use std::path::PathBuf;
use std::time::Duration;

use pmm_admin::{Config, SummaryBuilder, SummaryOptions};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use super::common::archive::{read_archive, text};
use super::common::fake_pmm::{closed_port, fake_agent, fake_pprof, status_json};
use super::common::logs::CapturedLogs;

const KINDS: [&str; 3] = ["profile.pb.gz", "heap.pb.gz", "trace.out"];

#[tokio::test]
async fn test_agent_profiles_are_collected() {
    let agent = fake_agent(status_json("agent-1", "node-1", ""), None).await;

    let mut config = Config::default();
    config.pmm_agent.listen_port = agent.port();
    config.pmm_agent.binary = PathBuf::from("/nonexistent/pmm-agent");
    config.http_timeout = Duration::from_secs(10);

    let dir = TempDir::new().unwrap();
    let options = SummaryOptions {
        filename: dir.path().join("summary.zip"),
        skip_server: false,
        pprof: true,
    };
    SummaryBuilder::new(config)
        .unwrap()
        .build(&CancellationToken::new(), &options)
        .await
        .expect("Summary should succeed");

    let entries = read_archive(&options.filename);
    for kind in KINDS {
        assert!(entries.contains_key(&format!("client/pprof/pmm-agent/{kind}")));
    }
    assert_eq!(
        text(&entries, "client/pprof/pmm-agent/heap.pb.gz"),
        "pmm-agent heap"
    );
    // Not on PMM Server: no server-side profiles
    assert!(entries.keys().all(|name| !name.starts_with("server/pprof/")));
}

#[tokio::test]
async fn test_unreachable_server_profile_source_is_omitted() {
    let agent = fake_agent(status_json("pmm-server", "pmm-server", ""), None).await;
    let managed = fake_pprof("pmm-managed").await;

    let mut config = Config::default();
    config.pmm_agent.listen_port = agent.port();
    config.pmm_agent.binary = PathBuf::from("/nonexistent/pmm-agent");
    config.http_timeout = Duration::from_secs(10);
    config.server.on_pmm_server = Some(true);
    config.server.pprof_host = "127.0.0.1".to_string();
    config.server.pmm_managed_pprof_port = managed.port();
    config.server.qan_api2_pprof_port = closed_port();

    let dir = TempDir::new().unwrap();
    let options = SummaryOptions {
        filename: dir.path().join("summary.zip"),
        skip_server: false,
        pprof: true,
    };
    SummaryBuilder::new(config)
        .unwrap()
        .build(&CancellationToken::new(), &options)
        .await
        .expect("Summary should succeed");

    let entries = read_archive(&options.filename);
    for kind in KINDS {
        assert!(entries.contains_key(&format!("client/pprof/pmm-agent/{kind}")));
        assert!(entries.contains_key(&format!("server/pprof/pmm-managed/{kind}")));
    }
    assert_eq!(
        text(&entries, "server/pprof/pmm-managed/profile.pb.gz"),
        "pmm-managed cpu"
    );
    assert!(entries.keys().all(|name| !name.contains("qan-api2")));
}

/// Each failed profile fetch is reported by exactly one warning
#[tokio::test]
async fn test_each_failed_profile_logs_one_warning() {
    let agent = fake_agent(status_json("pmm-server", "pmm-server", ""), None).await;
    let managed = fake_pprof("pmm-managed").await;

    let mut config = Config::default();
    config.pmm_agent.listen_port = agent.port();
    config.pmm_agent.binary = PathBuf::from("/nonexistent/pmm-agent");
    config.http_timeout = Duration::from_secs(10);
    config.server.on_pmm_server = Some(true);
    config.server.pmm_managed_pprof_port = managed.port();
    config.server.qan_api2_pprof_port = closed_port();

    let dir = TempDir::new().unwrap();
    let options = SummaryOptions {
        filename: dir.path().join("summary.zip"),
        skip_server: false,
        pprof: true,
    };

    let logs = CapturedLogs::default();
    let _guard = logs.install();
    SummaryBuilder::new(config)
        .unwrap()
        .build(&CancellationToken::new(), &options)
        .await
        .expect("Summary should succeed");

    let warnings = logs.lines_with("Cannot get profile");
    assert_eq!(warnings.len(), 3, "unexpected warnings: {warnings:#?}");
    for kind in KINDS {
        let entry = format!("server/pprof/qan-api2/{kind}");
        assert_eq!(
            warnings.iter().filter(|line| line.contains(&entry)).count(),
            1,
            "expected one warning for {entry}"
        );
    }
    assert!(warnings.iter().all(|line| line.contains("WARN")));
}
