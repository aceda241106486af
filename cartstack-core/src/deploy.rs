//! Deployer: hands a resource graph to the container runtime.
//!
//! Compares the graph with what the state database says was created for the
//! stack, then creates, replaces or removes resources in dependency order.
//! There is no drift detection against the live runtime and nothing is
//! rolled back on failure; state keeps whatever was created.

use crate::error::{Result, StackError};
use crate::graph::{EdgeKind, ResourceGraph};
use crate::runtime::{ContainerLaunch, ContainerRuntime};
use crate::state::StateManager;
use crate::types::{
    ContainerSpec, DeployedResource, ImageSpec, NetworkAttachment, Outputs, Resource,
    ResourceKind, StackStatus,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

/// What `up` will do with one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Not recorded yet
    Create,
    /// Recorded with the same inputs
    Same,
    /// Recorded with different inputs, or something it consumes is being recreated
    Replace,
    /// Recorded but no longer declared
    Delete,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Same => write!(f, "same"),
            Action::Replace => write!(f, "replace"),
            Action::Delete => write!(f, "delete"),
        }
    }
}

/// Planned action for one resource.
#[derive(Debug, Clone)]
pub struct PlannedChange {
    pub name: String,
    pub kind: ResourceKind,
    pub runtime_name: String,
    pub action: Action,
}

/// Changes `up` would make, creations in apply order followed by deletions.
#[derive(Debug, Clone)]
pub struct Plan {
    pub stack: String,
    pub changes: Vec<PlannedChange>,
}

impl Plan {
    pub fn count(&self, action: Action) -> usize {
        self.changes.iter().filter(|c| c.action == action).count()
    }

    pub fn has_changes(&self) -> bool {
        self.changes.iter().any(|c| c.action != Action::Same)
    }

    pub fn action(&self, name: &str) -> Option<Action> {
        self.changes.iter().find(|c| c.name == name).map(|c| c.action)
    }
}

/// Result of a completed `up`.
#[derive(Debug, Clone, Default)]
pub struct UpReport {
    pub created: usize,
    pub replaced: usize,
    pub unchanged: usize,
    pub deleted: usize,

    /// Outputs of every declared resource, by logical name
    pub outputs: BTreeMap<String, Outputs>,

    /// Non-fatal problems (e.g. a one-shot job exiting non-zero)
    pub warnings: Vec<String>,
}

/// Result of a completed `destroy`.
#[derive(Debug, Clone, Default)]
pub struct DestroyReport {
    /// Logical names removed, in removal order
    pub removed: Vec<String>,
    pub warnings: Vec<String>,
}

/// Progress update emitted while applying.
#[derive(Debug, Clone)]
pub struct DeployProgress {
    pub resource: String,
    pub stage: String,
    pub message: String,
}

pub type ProgressSender = mpsc::UnboundedSender<DeployProgress>;

/// Applies resource graphs through a container runtime, tracking what it
/// created in the state database.
pub struct Deployer {
    runtime: Arc<dyn ContainerRuntime>,
    state: StateManager,
    project: String,
    progress: Option<ProgressSender>,
}

impl Deployer {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        state: StateManager,
        project: impl Into<String>,
    ) -> Self {
        Self { runtime, state, project: project.into(), progress: None }
    }

    /// Send progress updates to `tx` while applying.
    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    fn send_progress(&self, resource: &str, stage: &str, message: impl Into<String>) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(DeployProgress {
                resource: resource.to_string(),
                stage: stage.to_string(),
                message: message.into(),
            });
        }
    }

    /// Compare the graph with recorded state.
    #[instrument(skip(self, graph), fields(stack = %graph.stack))]
    pub async fn plan(&self, graph: &ResourceGraph) -> Result<Plan> {
        let order = graph.apply_order()?;
        let recorded: HashMap<String, DeployedResource> = self
            .state
            .list_resources(&graph.stack)
            .await?
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();

        let mut actions: HashMap<&str, Action> = HashMap::new();
        let mut changes = Vec::with_capacity(order.len());

        for resource in order {
            let name = resource.name();
            let mut action = match recorded.get(name) {
                None => Action::Create,
                Some(r) if r.fingerprint == resource.fingerprint() => Action::Same,
                Some(_) => Action::Replace,
            };

            // Consumers of a recreated resource hold its old outputs.
            if action == Action::Same {
                let stale = graph.edges().iter().any(|e| {
                    e.from == name
                        && e.kind == EdgeKind::Reference
                        && matches!(
                            actions.get(e.to.as_str()),
                            Some(Action::Create | Action::Replace)
                        )
                });
                if stale {
                    action = Action::Replace;
                }
            }

            actions.insert(name, action);
            changes.push(PlannedChange {
                name: name.to_string(),
                kind: resource.kind(),
                runtime_name: resource.runtime_name().to_string(),
                action,
            });
        }

        let mut orphans: Vec<&DeployedResource> =
            recorded.values().filter(|r| graph.get(&r.name).is_none()).collect();
        orphans.sort_by_key(|r| std::cmp::Reverse(r.sequence));
        changes.extend(orphans.into_iter().map(|r| PlannedChange {
            name: r.name.clone(),
            kind: r.kind,
            runtime_name: r.resource.runtime_name().to_string(),
            action: Action::Delete,
        }));

        Ok(Plan { stack: graph.stack.clone(), changes })
    }

    /// Bring the runtime in line with the graph.
    #[instrument(skip(self, graph), fields(stack = %graph.stack))]
    pub async fn up(&self, graph: &ResourceGraph) -> Result<UpReport> {
        graph.validate()?;
        let plan = self.plan(graph).await?;

        info!(
            create = plan.count(Action::Create),
            replace = plan.count(Action::Replace),
            delete = plan.count(Action::Delete),
            same = plan.count(Action::Same),
            "Applying stack"
        );

        self.state.upsert_stack(&graph.stack, &self.project, StackStatus::Deploying).await?;

        match self.apply(graph, &plan).await {
            Ok(report) => {
                self.state.upsert_stack(&graph.stack, &self.project, StackStatus::Deployed).await?;
                info!("Stack deployed successfully");
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Stack deployment failed");
                if let Err(state_err) =
                    self.state.upsert_stack(&graph.stack, &self.project, StackStatus::Failed).await
                {
                    warn!(error = %state_err, "Failed to record stack failure");
                }
                Err(e)
            }
        }
    }

    async fn apply(&self, graph: &ResourceGraph, plan: &Plan) -> Result<UpReport> {
        let recorded: HashMap<String, DeployedResource> = self
            .state
            .list_resources(&graph.stack)
            .await?
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();

        let mut report = UpReport::default();

        // Old instances go first, dependents before what they consume.
        let mut removals: Vec<(&DeployedResource, Action)> = plan
            .changes
            .iter()
            .filter(|c| matches!(c.action, Action::Replace | Action::Delete))
            .filter_map(|c| recorded.get(&c.name).map(|r| (r, c.action)))
            .collect();
        removals.sort_by_key(|(r, _)| std::cmp::Reverse(r.sequence));

        for (record, action) in removals {
            self.send_progress(&record.name, "removing", record.resource.runtime_name());
            if let Some(warning) = self.remove(record).await? {
                report.warnings.push(warning);
            }
            if action == Action::Delete {
                self.state.delete_resource(&graph.stack, &record.name).await?;
                report.deleted += 1;
            }
        }

        let mut outputs: HashMap<String, Outputs> = HashMap::new();
        for (sequence, resource) in graph.apply_order()?.into_iter().enumerate() {
            let name = resource.name();
            let action = plan.action(name).unwrap_or(Action::Create);

            if action == Action::Same {
                if let Some(record) = recorded.get(name) {
                    outputs.insert(name.to_string(), record.outputs.clone());
                    report.unchanged += 1;
                    continue;
                }
            }

            self.send_progress(name, "applying", format!("{} {}", action, resource.runtime_name()));
            let created = self.create(resource, &outputs).await?;

            if let Some(code) = created.exit_code.filter(|&c| c != 0) {
                let message = format!("{} exited with code {}", resource.runtime_name(), code);
                warn!(resource = %name, exit_code = code, "One-shot container exited non-zero");
                self.send_progress(name, "warning", message.clone());
                report.warnings.push(message);
            }

            self.state
                .record_resource(&DeployedResource {
                    stack: graph.stack.clone(),
                    name: name.to_string(),
                    kind: resource.kind(),
                    resource: resource.clone(),
                    fingerprint: resource.fingerprint(),
                    outputs: created.clone(),
                    sequence: sequence as i64,
                    created_at: SystemTime::now(),
                })
                .await?;

            match action {
                Action::Replace => report.replaced += 1,
                _ => report.created += 1,
            }
            outputs.insert(name.to_string(), created);
        }

        report.outputs = outputs.into_iter().collect();
        Ok(report)
    }

    /// Create one resource; references resolve from `outputs`.
    async fn create(
        &self,
        resource: &Resource,
        outputs: &HashMap<String, Outputs>,
    ) -> Result<Outputs> {
        match resource {
            Resource::Image(image) => self.create_image(image).await,
            Resource::Network(network) => {
                info!(network = %network.network_name, "Creating network");
                let id = self.runtime.create_network(network).await?;
                Ok(Outputs { id, name: network.network_name.clone(), exit_code: None })
            }
            Resource::Container(container) => {
                let launch = resolve_launch(container, outputs)?;
                if container.is_one_shot() {
                    info!(container = %container.container_name, "Running one-shot container");
                    let code = self.runtime.run_container(&launch).await?;
                    Ok(Outputs {
                        id: String::new(),
                        name: container.container_name.clone(),
                        exit_code: Some(code),
                    })
                } else {
                    info!(
                        container = %container.container_name,
                        image = %launch.image,
                        "Starting container"
                    );
                    let id = self.runtime.start_container(&launch).await?;
                    Ok(Outputs { id, name: container.container_name.clone(), exit_code: None })
                }
            }
        }
    }

    async fn create_image(&self, image: &ImageSpec) -> Result<Outputs> {
        if image.is_build() {
            info!(tag = %image.image_name, "Building image");
            let id = self.runtime.build_image(image).await?;
            Ok(Outputs { id, name: image.image_name.clone(), exit_code: None })
        } else {
            info!(reference = %image.image_name, "Pulling image");
            let id = self.runtime.pull_image(&image.image_name).await?;
            Ok(Outputs { id: id.clone(), name: id, exit_code: None })
        }
    }

    /// Remove the runtime object behind a record. Returns a warning for
    /// images that could not be removed.
    async fn remove(&self, record: &DeployedResource) -> Result<Option<String>> {
        match &record.resource {
            Resource::Image(image) => {
                if image.keep_locally {
                    info!(image = %image.image_name, "Keeping image locally");
                    return Ok(None);
                }
                let reference = if image.is_build() {
                    image.image_name.as_str()
                } else {
                    record.outputs.id.as_str()
                };
                match self.runtime.remove_image(reference).await {
                    Ok(()) => Ok(None),
                    Err(e) => {
                        warn!(image = %image.image_name, error = %e, "Failed to remove image");
                        Ok(Some(format!("image {} left in place: {}", image.image_name, e)))
                    }
                }
            }
            Resource::Network(network) => {
                info!(network = %network.network_name, "Removing network");
                self.runtime.remove_network(&network.network_name).await?;
                Ok(None)
            }
            Resource::Container(container) => {
                info!(container = %container.container_name, "Removing container");
                self.runtime.remove_container(&container.container_name).await?;
                Ok(None)
            }
        }
    }

    /// Remove everything recorded for a stack, newest first.
    #[instrument(skip(self))]
    pub async fn destroy(&self, stack: &str) -> Result<DestroyReport> {
        info!("Destroying stack");

        let mut recorded = self.state.list_resources(stack).await?;
        recorded.sort_by_key(|r| std::cmp::Reverse(r.sequence));

        let mut report = DestroyReport::default();
        for record in &recorded {
            self.send_progress(&record.name, "removing", record.resource.runtime_name());
            if let Some(warning) = self.remove(record).await? {
                report.warnings.push(warning);
            }
            self.state.delete_resource(stack, &record.name).await?;
            report.removed.push(record.name.clone());
        }

        self.state.delete_stack(stack).await?;
        info!(removed = report.removed.len(), "Stack destroyed successfully");
        Ok(report)
    }
}

/// Fill in a container's image and network references from applied outputs.
fn resolve_launch(
    container: &ContainerSpec,
    outputs: &HashMap<String, Outputs>,
) -> Result<ContainerLaunch> {
    let lookup = |resource: &str| {
        outputs.get(resource).map(|o| o.name.clone()).filter(|n| !n.is_empty()).ok_or_else(|| {
            StackError::MissingOutput { resource: resource.to_string(), output: "name".to_string() }
        })
    };

    let image = lookup(&container.image)?;

    let mut seen = HashSet::new();
    let mut networks = Vec::with_capacity(container.networks.len());
    for attachment in &container.networks {
        if !seen.insert(attachment.network.as_str()) {
            continue;
        }
        networks.push(NetworkAttachment {
            network: lookup(&attachment.network)?,
            aliases: attachment.aliases.clone(),
        });
    }

    Ok(ContainerLaunch { spec: container.clone(), image, networks })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outputs() -> HashMap<String, Outputs> {
        let mut outputs = HashMap::new();
        outputs.insert(
            "mongo".to_string(),
            Outputs { id: "sha256:1".to_string(), name: "sha256:1".to_string(), exit_code: None },
        );
        outputs.insert(
            "network".to_string(),
            Outputs { id: "n1".to_string(), name: "services-dev".to_string(), exit_code: None },
        );
        outputs
    }

    #[test]
    fn test_resolve_launch() {
        let container = ContainerSpec::new("db", "mongo-dev", "mongo")
            .network_with_aliases("network", &["mongo"])
            .network("network");

        let launch = resolve_launch(&container, &outputs()).unwrap();
        assert_eq!(launch.image, "sha256:1");
        assert_eq!(launch.networks.len(), 1);
        assert_eq!(launch.networks[0].network, "services-dev");
        assert_eq!(launch.networks[0].aliases, vec!["mongo".to_string()]);
    }

    #[test]
    fn test_resolve_launch_missing_output() {
        let container = ContainerSpec::new("api", "api-dev", "backend").network("network");
        let err = resolve_launch(&container, &outputs()).unwrap_err();
        assert!(matches!(err, StackError::MissingOutput { resource, .. } if resource == "backend"));
    }

    #[test]
    fn test_plan_counts() {
        let plan = Plan {
            stack: "dev".to_string(),
            changes: vec![
                PlannedChange {
                    name: "a".to_string(),
                    kind: ResourceKind::Network,
                    runtime_name: "a".to_string(),
                    action: Action::Same,
                },
                PlannedChange {
                    name: "b".to_string(),
                    kind: ResourceKind::Container,
                    runtime_name: "b".to_string(),
                    action: Action::Create,
                },
            ],
        };
        assert!(plan.has_changes());
        assert_eq!(plan.count(Action::Same), 1);
        assert_eq!(plan.action("b"), Some(Action::Create));
        assert_eq!(plan.action("c"), None);
    }
}
