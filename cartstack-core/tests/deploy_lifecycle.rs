//! Integration tests for stack deployment.
//!
//! These tests drive the real stack definition through the deployer:
//! - Apply order and one-shot handling
//! - Idempotent re-runs and input changes
//! - Cascading replacement and orphan removal
//! - Partial failure
//! - Destroy
//!
//! Tests use an in-memory database and a mock runtime that records calls.

use async_trait::async_trait;
use cartstack_core::{
    deploy::Action,
    error::{Result, StackError},
    runtime::{ContainerLaunch, ContainerRuntime},
    stack, Deployer, ImageSpec, NetworkSpec, Resource, ResourceGraph, StackSettings, StackStatus,
    StateManager,
};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Mock runtime (doesn't require a container engine).
#[derive(Default)]
struct MockRuntime {
    calls: Mutex<Vec<String>>,
    launches: Mutex<Vec<ContainerLaunch>>,
    /// Tag whose build fails
    fail_build: Option<String>,
    /// Exit code returned for one-shot containers
    job_exit_code: i64,
}

impl MockRuntime {
    fn failing_build(tag: &str) -> Self {
        Self { fail_build: Some(tag.to_string()), ..Default::default() }
    }

    fn with_job_exit_code(code: i64) -> Self {
        Self { job_exit_code: code, ..Default::default() }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn clear(&self) {
        self.calls.lock().unwrap().clear();
        self.launches.lock().unwrap().clear();
    }

    fn launch(&self, name: &str) -> ContainerLaunch {
        self.launches.lock().unwrap().iter().find(|l| l.name() == name).cloned().unwrap()
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn build_image(&self, image: &ImageSpec) -> Result<String> {
        self.record(format!("build {}", image.image_name));
        if self.fail_build.as_deref() == Some(image.image_name.as_str()) {
            return Err(StackError::BuildFailed {
                tag: image.image_name.clone(),
                reason: "Dockerfile not found".to_string(),
            });
        }
        Ok(format!("sha256:{}", image.name))
    }

    async fn pull_image(&self, reference: &str) -> Result<String> {
        self.record(format!("pull {}", reference));
        Ok("sha256:mongo".to_string())
    }

    async fn remove_image(&self, reference: &str) -> Result<()> {
        self.record(format!("rmi {}", reference));
        Ok(())
    }

    async fn create_network(&self, network: &NetworkSpec) -> Result<String> {
        self.record(format!("network {}", network.network_name));
        Ok("net-1".to_string())
    }

    async fn remove_network(&self, name: &str) -> Result<()> {
        self.record(format!("rm-network {}", name));
        Ok(())
    }

    async fn start_container(&self, launch: &ContainerLaunch) -> Result<String> {
        self.record(format!("start {}", launch.name()));
        self.launches.lock().unwrap().push(launch.clone());
        Ok(format!("ctr-{}", launch.name()))
    }

    async fn run_container(&self, launch: &ContainerLaunch) -> Result<i64> {
        self.record(format!("run {}", launch.name()));
        self.launches.lock().unwrap().push(launch.clone());
        Ok(self.job_exit_code)
    }

    async fn remove_container(&self, name: &str) -> Result<()> {
        self.record(format!("rm {}", name));
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn settings() -> StackSettings {
    StackSettings {
        frontend_port: 3000,
        backend_port: 3001,
        mongo_port: 27017,
        mongo_host: "mongo".to_string(),
        database: "cart".to_string(),
        node_environment: "development".to_string(),
    }
}

async fn deployer(runtime: Arc<MockRuntime>) -> Deployer {
    let state = StateManager::new_in_memory().await.unwrap();
    Deployer::new(runtime, state, "cartstack")
}

const FULL_APPLY: [&str; 8] = [
    "build backend:dev",
    "build frontend:dev",
    "pull mongo:bionic",
    "network services-dev",
    "start mongo-dev",
    "start backend-dev",
    "run data_seed",
    "start frontend-dev",
];

#[tokio::test]
async fn test_up_applies_in_dependency_order() {
    let runtime = Arc::new(MockRuntime::default());
    let deployer = deployer(runtime.clone()).await;
    let graph = stack::define(&settings(), "dev", Path::new("/src/cart")).unwrap();

    let report = deployer.up(&graph).await.unwrap();

    assert_eq!(runtime.calls(), FULL_APPLY);
    assert_eq!(report.created, 8);
    assert!(report.warnings.is_empty());

    let stack = deployer.state().get_stack("dev").await.unwrap().unwrap();
    assert_eq!(stack.status, StackStatus::Deployed);
    assert_eq!(deployer.state().list_resources("dev").await.unwrap().len(), 8);
}

#[tokio::test]
async fn test_references_resolve_to_outputs() {
    let runtime = Arc::new(MockRuntime::default());
    let deployer = deployer(runtime.clone()).await;
    let graph = stack::define(&settings(), "dev", Path::new("/src/cart")).unwrap();

    let report = deployer.up(&graph).await.unwrap();

    let mongo = runtime.launch("mongo-dev");
    assert_eq!(mongo.image, "sha256:mongo");
    assert_eq!(mongo.networks[0].network, "services-dev");
    assert_eq!(mongo.networks[0].aliases, vec!["mongo".to_string()]);

    let backend = runtime.launch("backend-dev");
    assert_eq!(backend.image, "backend:dev");

    let seed = runtime.launch("data_seed");
    assert!(seed.spec.is_one_shot());
    assert_eq!(report.outputs["data_seed_container"].exit_code, Some(0));
    assert_eq!(report.outputs["frontend_container"].id, "ctr-frontend-dev");
}

#[tokio::test]
async fn test_rerun_without_changes_is_noop() {
    let runtime = Arc::new(MockRuntime::default());
    let deployer = deployer(runtime.clone()).await;
    let graph = stack::define(&settings(), "dev", Path::new("/src/cart")).unwrap();

    deployer.up(&graph).await.unwrap();
    runtime.clear();

    let plan = deployer.plan(&graph).await.unwrap();
    assert!(!plan.has_changes());

    let report = deployer.up(&graph).await.unwrap();
    assert!(runtime.calls().is_empty());
    assert_eq!(report.unchanged, 8);
    assert_eq!(report.outputs.len(), 8);
}

#[tokio::test]
async fn test_changed_setting_replaces_only_affected_container() {
    let runtime = Arc::new(MockRuntime::default());
    let deployer = deployer(runtime.clone()).await;
    let graph = stack::define(&settings(), "dev", Path::new("/src/cart")).unwrap();
    deployer.up(&graph).await.unwrap();
    runtime.clear();

    let mut changed = settings();
    changed.frontend_port = 8080;
    let graph = stack::define(&changed, "dev", Path::new("/src/cart")).unwrap();

    let plan = deployer.plan(&graph).await.unwrap();
    assert_eq!(plan.action("frontend_container"), Some(Action::Replace));
    assert_eq!(plan.count(Action::Replace), 1);

    let report = deployer.up(&graph).await.unwrap();
    assert_eq!(runtime.calls(), vec!["rm frontend-dev", "start frontend-dev"]);
    assert_eq!(report.replaced, 1);
    assert_eq!(report.unchanged, 7);
}

#[tokio::test]
async fn test_moved_project_rebuilds_images_and_their_consumers() {
    let runtime = Arc::new(MockRuntime::default());
    let deployer = deployer(runtime.clone()).await;
    let graph = stack::define(&settings(), "dev", Path::new("/src/cart")).unwrap();
    deployer.up(&graph).await.unwrap();
    runtime.clear();

    let moved = stack::define(&settings(), "dev", Path::new("/srv/cart")).unwrap();
    let plan = deployer.plan(&moved).await.unwrap();
    let rebuilt =
        ["backend", "frontend", "backend_container", "data_seed_container", "frontend_container"];
    for name in rebuilt {
        assert_eq!(plan.action(name), Some(Action::Replace), "{}", name);
    }
    for name in ["mongo", "network", "mongo_container"] {
        assert_eq!(plan.action(name), Some(Action::Same), "{}", name);
    }

    let report = deployer.up(&moved).await.unwrap();

    // Old instances are removed, consumers first, before anything is rebuilt.
    assert_eq!(
        runtime.calls(),
        vec![
            "rm frontend-dev",
            "rm data_seed",
            "rm backend-dev",
            "rmi frontend:dev",
            "rmi backend:dev",
            "build backend:dev",
            "build frontend:dev",
            "start backend-dev",
            "run data_seed",
            "start frontend-dev",
        ]
    );
    assert_eq!(report.replaced, 5);
    assert_eq!(report.unchanged, 3);
    assert_eq!(report.created, 0);

    let seed = runtime.launch("data_seed");
    assert_eq!(seed.spec.mounts[0].source, Path::new("/srv/cart/products.json"));
}

#[tokio::test]
async fn test_resources_dropped_from_graph_are_removed() {
    let runtime = Arc::new(MockRuntime::default());
    let deployer = deployer(runtime.clone()).await;
    let graph = stack::define(&settings(), "dev", Path::new("/src/cart")).unwrap();
    deployer.up(&graph).await.unwrap();
    runtime.clear();

    let mut smaller = ResourceGraph::new("dev");
    let mongo = ImageSpec::remote(stack::MONGO_IMAGE, stack::MONGO_REFERENCE).keep_locally();
    smaller.add(Resource::Image(mongo)).unwrap();

    let plan = deployer.plan(&smaller).await.unwrap();
    assert_eq!(plan.action("mongo"), Some(Action::Same));
    assert_eq!(plan.count(Action::Delete), 7);

    let report = deployer.up(&smaller).await.unwrap();

    assert_eq!(
        runtime.calls(),
        vec![
            "rm frontend-dev",
            "rm data_seed",
            "rm backend-dev",
            "rm mongo-dev",
            "rm-network services-dev",
            "rmi frontend:dev",
            "rmi backend:dev",
        ]
    );
    assert_eq!(report.deleted, 7);
    assert_eq!(report.unchanged, 1);

    let recorded = deployer.state().list_resources("dev").await.unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].name, "mongo");
}

#[tokio::test]
async fn test_seed_job_failure_is_a_warning() {
    let runtime = Arc::new(MockRuntime::with_job_exit_code(1));
    let deployer = deployer(runtime.clone()).await;
    let graph = stack::define(&settings(), "dev", Path::new("/src/cart")).unwrap();

    let report = deployer.up(&graph).await.unwrap();

    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("data_seed"));
    assert!(runtime.calls().contains(&"start frontend-dev".to_string()));
    let stack = deployer.state().get_stack("dev").await.unwrap().unwrap();
    assert_eq!(stack.status, StackStatus::Deployed);
}

#[tokio::test]
async fn test_build_failure_aborts_and_keeps_partial_state() {
    let runtime = Arc::new(MockRuntime::failing_build("frontend:dev"));
    let deployer = deployer(runtime.clone()).await;
    let graph = stack::define(&settings(), "dev", Path::new("/src/cart")).unwrap();

    let err = deployer.up(&graph).await.unwrap_err();
    assert!(matches!(err, StackError::BuildFailed { .. }));

    // Nothing after the failing build ran, nothing before it was undone.
    assert_eq!(runtime.calls(), vec!["build backend:dev", "build frontend:dev"]);

    let recorded = deployer.state().list_resources("dev").await.unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].name, "backend");

    let stack = deployer.state().get_stack("dev").await.unwrap().unwrap();
    assert_eq!(stack.status, StackStatus::Failed);
}

#[tokio::test]
async fn test_destroy_removes_in_reverse_order() {
    let runtime = Arc::new(MockRuntime::default());
    let deployer = deployer(runtime.clone()).await;
    let graph = stack::define(&settings(), "dev", Path::new("/src/cart")).unwrap();
    deployer.up(&graph).await.unwrap();
    runtime.clear();

    let report = deployer.destroy("dev").await.unwrap();

    assert_eq!(
        runtime.calls(),
        vec![
            "rm frontend-dev",
            "rm data_seed",
            "rm backend-dev",
            "rm mongo-dev",
            "rm-network services-dev",
            "rmi frontend:dev",
            "rmi backend:dev",
        ]
    );
    // The pulled mongo image is kept on the host but still forgotten.
    assert_eq!(report.removed.len(), 8);
    assert!(report.removed.contains(&"mongo".to_string()));
    assert!(deployer.state().get_stack("dev").await.unwrap().is_none());
    assert!(deployer.state().list_resources("dev").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stacks_are_isolated() {
    let runtime = Arc::new(MockRuntime::default());
    let deployer = deployer(runtime.clone()).await;

    let dev = stack::define(&settings(), "dev", Path::new("/src/cart")).unwrap();
    let staging = stack::define(&settings(), "staging", Path::new("/src/cart")).unwrap();
    deployer.up(&dev).await.unwrap();
    runtime.clear();

    deployer.up(&staging).await.unwrap();
    assert!(runtime.calls().contains(&"network services-staging".to_string()));
    assert!(runtime.calls().contains(&"start backend-staging".to_string()));

    deployer.destroy("staging").await.unwrap();
    assert_eq!(deployer.state().list_resources("dev").await.unwrap().len(), 8);
}

#[tokio::test]
async fn test_destroy_unknown_stack_is_empty() {
    let runtime = Arc::new(MockRuntime::default());
    let deployer = deployer(runtime.clone()).await;

    let report = deployer.destroy("ghost").await.unwrap();
    assert!(report.removed.is_empty());
    assert!(runtime.calls().is_empty());
}
