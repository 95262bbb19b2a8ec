//! Audit entries for API key changes reach the audit service.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::json;

mod common;
use common::{
    client, eventually, key, spawn_gateway, start_capturing_backend, test_config, Captured,
};

fn audited_config(addr: std::net::SocketAddr) -> factory_gateway::GatewayConfig {
    let mut config = test_config();
    config.audit.url = format!("http://{addr}/");
    config.audit.api_key = "audit-secret".into();
    config.audit.timeout_secs = 2;
    config
}

async fn wait_for(captured: &Captured, count: usize) -> bool {
    eventually(|| async move { captured.lock().unwrap().len() >= count }).await
}

#[tokio::test]
async fn key_changes_are_posted_as_audit_logs() {
    let (audit_addr, captured) = start_capturing_backend(201).await;
    let gateway = spawn_gateway(audited_config(audit_addr)).await;

    let mut revised = audited_config(audit_addr);
    revised.auth.keys.retain(|k| k.id != "2");
    revised.auth.keys[0].rate_limit = Some(10);
    revised.auth.keys.push(key("3", "ops", "fk_ops", None));
    gateway.config_updates.send(revised).unwrap();

    assert!(wait_for(&captured, 3).await, "three audit entries expected");

    let requests = captured.lock().unwrap().clone();
    for request in &requests {
        assert_eq!(request.request_line, "POST /v1/audit-logs HTTP/1.1");
        assert_eq!(request.header("x-api-key"), Some("audit-secret"));
        assert!(request
            .header("content-type")
            .is_some_and(|v| v.starts_with("application/json")));
    }

    let mut bodies: Vec<_> = requests.iter().map(|r| r.json()).collect();
    bodies.sort_by_key(|b| b["entityId"].as_str().unwrap_or_default().to_string());
    let summary: Vec<_> = bodies
        .iter()
        .map(|b| (b["action"].clone(), b["entityId"].clone()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (json!("update"), json!("1")),
            (json!("delete"), json!("2")),
            (json!("create"), json!("3")),
        ]
    );
    assert_eq!(bodies[0]["entityType"], "api_key");
    assert_eq!(bodies[0]["userId"], serde_json::Value::Null);
    assert_eq!(bodies[0]["metadata"], json!({ "source": "config_reload" }));
    assert_eq!(bodies[0]["changes"], json!({ "name": "dashboard", "rateLimit": 10 }));
    assert_eq!(bodies[2]["changes"], json!({ "name": "ops", "rateLimit": null }));
    assert!(bodies[1].get("changes").is_none());
    assert!(bodies.iter().all(|b| !b.to_string().contains("fk_")), "secrets must not be audited");

    gateway.shutdown.trigger("test complete");
}

#[tokio::test]
async fn unchanged_revision_sends_nothing() {
    let (audit_addr, captured) = start_capturing_backend(201).await;
    let gateway = spawn_gateway(audited_config(audit_addr)).await;

    gateway.config_updates.send(audited_config(audit_addr)).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(captured.lock().unwrap().is_empty());

    gateway.shutdown.trigger("test complete");
}

#[tokio::test]
async fn failing_audit_service_does_not_block_the_reload() {
    let (audit_addr, captured) = start_capturing_backend(500).await;
    let gateway = spawn_gateway(audited_config(audit_addr)).await;

    let mut revised = audited_config(audit_addr);
    revised.auth.keys.push(key("3", "ops", "fk_ops", None));
    gateway.config_updates.send(revised).unwrap();

    let client = &client();
    let url = &gateway.url("/v1/whoami");
    assert!(
        eventually(|| async move {
            client
                .get(url)
                .header("x-api-key", "fk_ops")
                .send()
                .await
                .is_ok_and(|r| r.status() == StatusCode::OK)
        })
        .await
    );
    assert!(wait_for(&captured, 1).await);

    gateway.shutdown.trigger("test complete");
}
