//! Stack definition.
//!
//! Declares the application stack: the frontend and backend images built
//! from the project's `app/` directory, the pulled MongoDB image, a network
//! scoped to the stack, three long-lived service containers and a one-shot
//! job that seeds the product catalogue.

use crate::error::{Result, StackError};
use crate::graph::ResourceGraph;
use crate::paths;
use crate::settings::StackSettings;
use crate::types::{stack_tag, ContainerSpec, ImageSpec, Mount, NetworkSpec, PortMapping, Resource};
use std::path::Path;
use tracing::{debug, instrument};

pub const BACKEND_IMAGE: &str = "backend";
pub const FRONTEND_IMAGE: &str = "frontend";
pub const MONGO_IMAGE: &str = "mongo";
pub const NETWORK: &str = "network";
pub const MONGO_CONTAINER: &str = "mongo_container";
pub const BACKEND_CONTAINER: &str = "backend_container";
pub const DATA_SEED_CONTAINER: &str = "data_seed_container";
pub const FRONTEND_CONTAINER: &str = "frontend_container";

/// Pulled database image.
pub const MONGO_REFERENCE: &str = "mongo:bionic";

/// Runtime name of the seed job. Not scoped by stack.
pub const DATA_SEED_NAME: &str = "data_seed";

/// Where the seed data file appears inside the job container.
pub const SEED_MOUNT_TARGET: &str = "/home/products.json";

const SEED_COMMAND: &str = "mongoimport --host mongo --db cart --collection products \
                            --type json --file /home/products.json --jsonArray";

/// Check a stack name is usable in image tags and container names.
pub fn validate_stack_name(stack: &str) -> Result<()> {
    let invalid = |reason: &str| StackError::InvalidStackName {
        name: stack.to_string(),
        reason: reason.to_string(),
    };

    if stack.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if stack.len() > 100 {
        return Err(invalid("must be at most 100 characters"));
    }
    if !stack.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')) {
        return Err(invalid("may only contain ASCII letters, digits, '-', '_' and '.'"));
    }
    if !stack.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return Err(invalid("must start with a letter or digit"));
    }
    Ok(())
}

/// Network name for a stack.
pub fn network_name(stack: &str) -> String {
    format!("services-{}", stack)
}

/// Runtime name of a long-lived service container.
pub fn service_container_name(service: &str, stack: &str) -> String {
    format!("{}-{}", service, stack)
}

/// Build the resource graph for `stack`.
///
/// `project_dir` is the directory holding `app/frontend`, `app/backend` and
/// `products.json`.
#[instrument(skip(settings, project_dir), fields(dir = %project_dir.display()))]
pub fn define(settings: &StackSettings, stack: &str, project_dir: &Path) -> Result<ResourceGraph> {
    validate_stack_name(stack)?;

    let mut graph = ResourceGraph::new(stack);

    graph.add(Resource::Image(ImageSpec::build(
        BACKEND_IMAGE,
        paths::app_context(project_dir, "backend"),
        stack_tag(BACKEND_IMAGE, stack),
    )))?;

    graph.add(Resource::Image(ImageSpec::build(
        FRONTEND_IMAGE,
        paths::app_context(project_dir, "frontend"),
        stack_tag(FRONTEND_IMAGE, stack),
    )))?;

    // Pulled by reference, so other stacks on the engine may share it.
    graph.add(Resource::Image(ImageSpec::remote(MONGO_IMAGE, MONGO_REFERENCE).keep_locally()))?;

    graph.add(Resource::Network(NetworkSpec::new(NETWORK, network_name(stack))))?;

    graph.add(Resource::Container(
        ContainerSpec::new(MONGO_CONTAINER, service_container_name("mongo", stack), MONGO_IMAGE)
            .port(PortMapping::same(settings.mongo_port))
            .network_with_aliases(NETWORK, &["mongo"]),
    ))?;

    graph.add(Resource::Container(
        ContainerSpec::new(
            BACKEND_CONTAINER,
            service_container_name("backend", stack),
            BACKEND_IMAGE,
        )
        .port(PortMapping::same(settings.backend_port))
        .env("DATABASE_HOST", &settings.mongo_host)
        .env("DATABASE_NAME", &settings.database)
        .env("NODE_ENV", &settings.node_environment)
        .network(NETWORK),
    ))?;
    graph.depends_on(BACKEND_CONTAINER, MONGO_CONTAINER)?;

    // Ordered on the backend container existing, not on it being ready.
    graph.add(Resource::Container(
        ContainerSpec::new(DATA_SEED_CONTAINER, DATA_SEED_NAME, MONGO_IMAGE)
            .one_shot()
            .mount(Mount::bind(paths::seed_data_path(project_dir), SEED_MOUNT_TARGET))
            .command(["sh", "-c", SEED_COMMAND])
            .network(NETWORK),
    ))?;
    graph.depends_on(DATA_SEED_CONTAINER, BACKEND_CONTAINER)?;

    graph.add(Resource::Container(
        ContainerSpec::new(
            FRONTEND_CONTAINER,
            service_container_name("frontend", stack),
            FRONTEND_IMAGE,
        )
        .port(PortMapping::same(settings.frontend_port))
        .env("LISTEN_PORT", settings.frontend_port)
        .env(
            "HTTP_PROXY",
            format!("{}:{}", service_container_name("backend", stack), settings.backend_port),
        )
        .network(NETWORK),
    ))?;

    graph.validate()?;
    debug!(resources = graph.len(), edges = graph.edges().len(), "Stack graph declared");
    Ok(graph)
}
