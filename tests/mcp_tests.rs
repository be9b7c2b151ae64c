//! Tool loader behaviour at the descriptor-file boundary.

use std::time::Duration;

use tempfile::TempDir;
use tokio::time::timeout;

use chattr::error::ChattrError;
use chattr::mcp::{load_descriptors, CapabilityRegistry, TransportKind};

#[tokio::test]
async fn missing_file_yields_an_empty_tool_set() {
    let tmp = TempDir::new().unwrap();
    let registry = CapabilityRegistry::load(&tmp.path().join("mcp.json")).unwrap();
    assert!(registry.is_empty());
    assert!(registry.capabilities().await.is_empty());
}

#[test]
fn malformed_file_names_the_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = CapabilityRegistry::load(&path).err().unwrap();
    assert!(matches!(err, ChattrError::Configuration(ref msg) if msg.contains("broken.json")));
    assert!(err.is_fatal());
}

#[test]
fn duplicate_server_names_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("mcp.json");
    std::fs::write(
        &path,
        r#"{"mcp_servers": [
            {"name": "voice", "url": "http://localhost:7861/gradio_api/mcp/", "transport": "streamable-http"},
            {"name": "voice", "url": "http://localhost:7862/gradio_api/mcp/", "transport": "streamable-http"}
        ]}"#,
    )
    .unwrap();

    let err = load_descriptors(&path).unwrap_err();
    assert!(matches!(err, ChattrError::Configuration(ref msg) if msg.contains("duplicate")));
}

#[test]
fn descriptor_file_round_trips_into_servers() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("mcp.json");
    std::fs::write(
        &path,
        r#"{"mcp_servers": [
            {"name": "voice", "type": "url", "url": "http://localhost:7861/gradio_api/mcp/", "transport": "streamable-http"},
            {"name": "video", "type": "url", "url": "http://localhost:7862/gradio_api/mcp/?tools=generate_video_mcp", "transport": "sse"}
        ]}"#,
    )
    .unwrap();

    let servers = load_descriptors(&path).unwrap();
    assert_eq!(servers.len(), 2);
    assert_eq!(servers[1].transport, TransportKind::Sse);

    let registry = CapabilityRegistry::load(&path).unwrap();
    assert_eq!(registry.server_names(), vec!["voice", "video"]);
}

#[tokio::test]
async fn unreachable_server_is_tolerated() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("mcp.json");
    std::fs::write(
        &path,
        r#"{"mcp_servers": [
            {"name": "ghost", "command": "chattr-test-no-such-binary", "transport": "stdio"}
        ]}"#,
    )
    .unwrap();

    let registry = CapabilityRegistry::load(&path).unwrap();
    let tools = timeout(Duration::from_secs(10), registry.capabilities())
        .await
        .unwrap();
    assert!(tools.is_empty());
    registry.close().await;
}
