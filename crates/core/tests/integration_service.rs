#![cfg(unix)]
//! Service and cache flows driven through the process gateway

mod common;

use berth_core::args::{RemoveOptions, StopOptions, VolumeCreateRequest};
use berth_core::cache::ResourceCache;
use berth_core::errors::ValidationError;
use berth_core::gateway::{CliGateway, Executor};
use berth_core::model::{Container, ContainerStatus};
use berth_core::service::ResourceService;
use common::StubBinary;
use serial_test::serial;
use std::sync::Arc;

const ENGINE: &str = r#"
echo "$*" >> "$(dirname "$0")/calls.log"
case "$1 $2" in
  "container list")
    printf '{"ID":"c1","Names":"web","Image":"nginx:1.27","State":"running"}\n'
    printf '{"ID":"c2","Names":"db","Image":"postgres:16","State":"exited"}\n'
    ;;
  "container stop"|"container start"|"volume create"|"volume rm")
    echo "$3"
    ;;
  *)
    echo "unknown command: $*" >&2
    exit 1
    ;;
esac
"#;

fn calls(stub: &StubBinary) -> Vec<String> {
    std::fs::read_to_string(stub.path.with_file_name("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

fn service(stub: &StubBinary) -> ResourceService {
    let holder = stub.holder();
    let executor: Arc<dyn Executor> = Arc::new(CliGateway::new(holder.clone()));
    ResourceService::new(executor, holder)
}

#[tokio::test]
#[serial]
async fn test_list_containers_normalizes_engine_output() {
    let stub = StubBinary::new(ENGINE);
    let service = service(&stub);

    let result = service.list_containers().await;

    assert!(result.success);
    let containers = result.data.unwrap();
    assert_eq!(containers.len(), 2);
    assert_eq!(containers[0].name, "web");
    assert_eq!(containers[0].status, ContainerStatus::Running);
    assert_eq!(containers[1].status, ContainerStatus::Stopped);
    assert_eq!(calls(&stub), vec!["container list --all --format json"]);
}

#[tokio::test]
#[serial]
async fn test_show_stopped_off_drops_all_flag() {
    let stub = StubBinary::new(ENGINE);
    let service = service(&stub);
    service.config().update(|c| c.show_stopped = false);

    service.list_containers().await;

    assert_eq!(calls(&stub), vec!["container list --format json"]);
}

#[tokio::test]
#[serial]
async fn test_restart_stops_then_starts() {
    let stub = StubBinary::new(ENGINE);
    let service = service(&stub);

    let result = service
        .restart_container("web", &StopOptions { timeout_secs: Some(3) })
        .await;

    assert!(result.success);
    assert_eq!(
        calls(&stub),
        vec!["container stop --time 3 web", "container start web"]
    );
}

#[tokio::test]
#[serial]
async fn test_invalid_volume_name_never_reaches_engine() {
    let stub = StubBinary::new(ENGINE);
    let service = service(&stub);

    let request = VolumeCreateRequest {
        name: "-cache".to_string(),
        ..Default::default()
    };
    let error = service.create_volume(&request).await.unwrap_err();
    assert!(matches!(error, ValidationError::InvalidStart { .. }));

    let error = service
        .remove_volume("my data", &RemoveOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(error, ValidationError::InvalidCharacter { ch: ' ', .. }));

    assert!(calls(&stub).is_empty());
}

#[tokio::test]
#[serial]
async fn test_cache_refresh_through_gateway() {
    let stub = StubBinary::new(ENGINE);
    let holder = stub.holder();
    let cache = ResourceCache::<Container>::new(Arc::new(CliGateway::new(holder.clone())), holder);

    cache.refresh().await.unwrap();

    let snapshot = cache.snapshot();
    assert_eq!(snapshot.generation, 1);
    assert_eq!(snapshot.items.len(), 2);
    assert_eq!(cache.get("db").await.map(|c| c.id), Some("c2".to_string()));
    cache.dispose();
}

#[tokio::test]
#[serial]
async fn test_cache_refresh_failure_keeps_empty_snapshot() {
    let stub = StubBinary::new("echo 'Cannot connect to the engine' >&2\nexit 1");
    let holder = stub.holder();
    let cache = ResourceCache::<Container>::new(Arc::new(CliGateway::new(holder.clone())), holder);

    let error = cache.refresh().await.unwrap_err();

    assert!(error.to_string().contains("Cannot connect to the engine"));
    assert!(!cache.snapshot().is_populated());
}
