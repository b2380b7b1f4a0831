//! Integration tests for tool dispatch against a scripted kernel.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;

use mercury_core::testing::{Script, ScriptProbe, ScriptedLauncher};
use mercury_core::{KernelConfig, LocalObjectStore, MimeBundle, Session, SessionConfig};
use mercury_tools::{ContentBlock, ToolRouter};

fn config(temp: &TempDir) -> SessionConfig {
    SessionConfig {
        working_dir: temp.path().join("work"),
        poll_slice: Duration::from_millis(20),
        kernel: KernelConfig {
            ready_timeout: Duration::from_secs(1),
            init_event_timeout: Duration::from_millis(200),
            ..KernelConfig::default()
        },
        ..SessionConfig::default()
    }
}

fn router(temp: &TempDir, scripts: Vec<Script>) -> (ToolRouter, ScriptProbe) {
    let launcher = ScriptedLauncher::new().with_scripts(scripts);
    let probe = launcher.probe();
    let mut session = Session::new(config(temp), Box::new(launcher), None).unwrap();
    session.start_kernel().unwrap();
    (ToolRouter::new(session), probe)
}

#[tokio::test]
async fn test_execute_code_renders_text_and_images() {
    let temp = TempDir::new().unwrap();
    let (router, _probe) = router(
        &temp,
        vec![
            Script::new()
                .busy()
                .stdout("hello")
                .display(MimeBundle::new().with("image/png", "iVBORw0KGgo="))
                .result(MimeBundle::new().with("text/plain", "4"))
                .idle(),
        ],
    );

    let response = router
        .call(&json!({"name": "execute_code", "arguments": {"code": "print('hello'); 2 + 2"}}))
        .await;

    assert!(!response.is_error);
    assert_eq!(response.first_text(), Some("hello\n4"));
    assert_eq!(response.content.len(), 2);
    assert!(matches!(&response.content[1], ContentBlock::Image { data, .. } if data == "iVBORw0KGgo="));
}

#[tokio::test]
async fn test_execute_code_with_double_encoded_arguments() {
    let temp = TempDir::new().unwrap();
    let (router, probe) = router(&temp, vec![]);

    let params = json!({
        "name": "execute_code",
        "arguments": json!({"code": "x = 1", "timeout": "5"}).to_string()
    })
    .to_string();
    let response = router.call(&json!(params)).await;

    assert!(!response.is_error, "{:?}", response);
    assert_eq!(probe.submissions().last().unwrap().code, "x = 1");
}

#[tokio::test]
async fn test_execute_code_error_is_flagged() {
    let temp = TempDir::new().unwrap();
    let (router, _probe) = router(
        &temp,
        vec![Script::new().busy().error("ValueError", "boom", &["ValueError: boom"]).idle()],
    );

    let response = router
        .call(&json!({"name": "execute_code", "arguments": {"code": "raise ValueError('boom')"}}))
        .await;
    assert!(response.is_error);
    assert_eq!(response.content.len(), 1);
    assert!(response.first_text().unwrap().contains("boom"));
}

#[tokio::test]
async fn test_missing_code_argument() {
    let temp = TempDir::new().unwrap();
    let (router, _probe) = router(&temp, vec![]);

    let response = router.call(&json!({"name": "execute_code", "arguments": {}})).await;
    assert!(response.is_error);
    assert_eq!(response.first_text(), Some("Missing required argument: code"));
}

#[tokio::test]
async fn test_unknown_tool() {
    let temp = TempDir::new().unwrap();
    let (router, _probe) = router(&temp, vec![]);

    let response = router.call(&json!({"name": "launch_rockets"})).await;
    assert!(response.is_error);
    assert_eq!(response.first_text(), Some("Unknown tool: launch_rockets"));
}

#[tokio::test]
async fn test_status_and_restart() {
    let temp = TempDir::new().unwrap();
    let (router, probe) = router(&temp, vec![]);

    let response = router.call(&json!({"name": "get_kernel_status"})).await;
    let status: serde_json::Value = serde_json::from_str(response.first_text().unwrap()).unwrap();
    assert_eq!(status["status"], "running");
    assert_eq!(status["kernel_name"], "scripted");

    probe.crash();
    let response = router.call(&json!({"name": "get_kernel_status"})).await;
    let status: serde_json::Value = serde_json::from_str(response.first_text().unwrap()).unwrap();
    assert_eq!(status, json!({"status": "dead", "alive": false}));

    let response = router
        .call(&json!({"name": "execute_code", "arguments": {"code": "1"}}))
        .await;
    assert!(response.is_error);

    let response = router.call(&json!({"name": "restart_kernel"})).await;
    assert!(!response.is_error);
    assert_eq!(response.first_text(), Some("Kernel restarted successfully"));
    assert_eq!(probe.launches(), 2);
}

#[tokio::test]
async fn test_restart_failure_is_flagged() {
    let temp = TempDir::new().unwrap();
    let (router, probe) = router(&temp, vec![]);
    probe.set_fail_launch(true);

    let response = router.call(&json!({"name": "restart_kernel"})).await;
    assert!(response.is_error);
    assert!(response.first_text().unwrap().contains("restart failed"));
}

#[tokio::test]
async fn test_inspect_variable() {
    let temp = TempDir::new().unwrap();
    let (router, _probe) = router(
        &temp,
        vec![
            Script::new()
                .busy()
                .stdout("{\"name\": \"df\", \"type\": \"DataFrame\", \"shape\": \"(3, 2)\"}")
                .idle(),
        ],
    );

    let response = router
        .call(&json!({"name": "inspect_variable", "arguments": {"name": "df"}}))
        .await;
    assert!(!response.is_error);
    let info: serde_json::Value = serde_json::from_str(response.first_text().unwrap()).unwrap();
    assert_eq!(info["shape"], "(3, 2)");

    let response = router
        .call(&json!({"name": "inspect_variable", "arguments": {"name": "os.system('ls')"}}))
        .await;
    assert!(response.is_error);
}

#[tokio::test]
async fn test_notebook_tools() {
    let temp = TempDir::new().unwrap();
    let (router, _probe) = router(&temp, vec![]);

    let response = router
        .call(&json!({
            "name": "create_notebook",
            "arguments": {
                "filename": "analysis",
                "cells": [
                    {"type": "markdown", "source": "# Analysis"},
                    "{\"type\": \"code\", \"source\": \"import pandas as pd\"}",
                    "print('raw')"
                ]
            }
        }))
        .await;
    assert!(!response.is_error, "{:?}", response);
    assert!(response.first_text().unwrap().contains("analysis.ipynb (3 cells)"));

    let response = router
        .call(&json!({"name": "read_notebook", "arguments": {"filename": "analysis.ipynb"}}))
        .await;
    assert!(!response.is_error);
    let summary: serde_json::Value = serde_json::from_str(response.first_text().unwrap()).unwrap();
    assert_eq!(summary["cell_count"], 3);
    assert_eq!(summary["cells"][0]["type"], "markdown");
    assert_eq!(summary["cells"][2]["source"], "print('raw')");

    let response = router
        .call(&json!({"name": "read_notebook", "arguments": {"filename": "missing.ipynb"}}))
        .await;
    assert!(response.is_error);
    assert_eq!(response.first_text(), Some("Notebook not found: missing.ipynb"));
}

#[tokio::test]
async fn test_artifacts_are_listed_after_output() {
    let temp = TempDir::new().unwrap();
    let objects = Arc::new(LocalObjectStore::new(temp.path().join("objects")).unwrap());
    let config = SessionConfig {
        bucket: Some("artifacts".to_string()),
        ..config(&temp)
    };
    let launcher = ScriptedLauncher::new().with_scripts([Script::new().busy().stdout("saved").idle()]);
    let mut session = Session::new(config, Box::new(launcher), Some(objects)).unwrap();
    session.start_kernel().unwrap();
    std::fs::write(session.working_dir().join("out.txt"), "data").unwrap();
    let router = ToolRouter::new(session);

    let response = router
        .call(&json!({"name": "execute_code", "arguments": {"code": "save()"}}))
        .await;

    assert!(!response.is_error);
    assert_eq!(response.first_text(), Some("saved"));
    let listing = response.content[1].as_text().unwrap();
    assert!(listing.starts_with("\nout.txt\nDownload (24h): file://"), "{listing}");
}

#[tokio::test]
async fn test_list_tools() {
    let temp = TempDir::new().unwrap();
    let (router, _probe) = router(&temp, vec![]);
    assert_eq!(router.list_tools().len(), 8);
}

#[tokio::test]
async fn test_shutdown() {
    let temp = TempDir::new().unwrap();
    let (router, probe) = router(&temp, vec![]);

    router.shutdown().await;
    assert!(!probe.current_alive());

    let response = router
        .call(&json!({"name": "execute_code", "arguments": {"code": "1"}}))
        .await;
    assert!(response.is_error);
}
