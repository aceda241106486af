//! Docker CLI runtime.
//!
//! Shells out to the `docker` binary. Argument vectors are assembled by the
//! free functions below so they can be checked without an engine.

use crate::config::Config;
use crate::error::{Result, StackError};
use crate::runtime::{ContainerLaunch, ContainerRuntime};
use crate::types::{ImageSource, ImageSpec, NetworkSpec};
use async_trait::async_trait;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Runtime backed by the docker command-line client.
pub struct DockerCli {
    binary: String,
    timeout: Duration,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self { binary: binary.into(), timeout }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.docker_binary.clone(), config.command_timeout())
    }

    /// Run one docker command and capture its output.
    ///
    /// Fails on spawn errors, timeouts and non-zero exit.
    async fn exec(&self, args: &[String]) -> Result<Output> {
        let output = self.exec_unchecked(args).await?;
        if !output.status.success() {
            return Err(self.command_error(args, &output));
        }
        Ok(output)
    }

    /// Run one docker command; a non-zero exit is returned, not raised.
    async fn exec_unchecked(&self, args: &[String]) -> Result<Output> {
        debug!(program = %self.binary, args = ?args, "Running runtime command");

        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(StackError::RuntimeCommand {
                program: self.binary.clone(),
                command: subcommand(args),
                code: None,
                stderr: format!("failed to spawn: {}", e),
            }),
            Err(_) => Err(StackError::CommandTimeout {
                program: self.binary.clone(),
                command: subcommand(args),
                secs: self.timeout.as_secs(),
            }),
        }
    }

    fn command_error(&self, args: &[String], output: &Output) -> StackError {
        StackError::RuntimeCommand {
            program: self.binary.clone(),
            command: subcommand(args),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }

    /// Run a removal command, treating "no such object" as success.
    async fn remove(&self, args: Vec<String>, what: &str) -> Result<()> {
        let output = self.exec_unchecked(&args).await?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_not_found(&stderr) {
            warn!("{} already absent: {}", what, stderr.trim());
            return Ok(());
        }
        Err(self.command_error(&args, &output))
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    #[instrument(skip(self, image), fields(tag = %image.image_name))]
    async fn build_image(&self, image: &ImageSpec) -> Result<String> {
        let args = build_args(image).ok_or_else(|| StackError::BuildFailed {
            tag: image.image_name.clone(),
            reason: "image has no build context".to_string(),
        })?;

        info!("Building image");
        let output = self.exec(&args).await.map_err(|e| StackError::BuildFailed {
            tag: image.image_name.clone(),
            reason: e.to_string(),
        })?;

        let id = last_line(&output.stdout);
        if id.is_empty() {
            return self.inspect_image(&image.image_name).await;
        }
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn pull_image(&self, reference: &str) -> Result<String> {
        info!("Pulling image");
        self.exec(&pull_args(reference)).await.map_err(|e| StackError::PullFailed {
            reference: reference.to_string(),
            reason: e.to_string(),
        })?;
        self.inspect_image(reference).await
    }

    #[instrument(skip(self))]
    async fn remove_image(&self, reference: &str) -> Result<()> {
        self.remove(vec!["image".into(), "rm".into(), reference.to_string()], "image").await
    }

    #[instrument(skip(self, network), fields(network = %network.network_name))]
    async fn create_network(&self, network: &NetworkSpec) -> Result<String> {
        let output = self.exec(&network_create_args(network)).await?;
        Ok(last_line(&output.stdout))
    }

    #[instrument(skip(self))]
    async fn remove_network(&self, name: &str) -> Result<()> {
        self.remove(vec!["network".into(), "rm".into(), name.to_string()], "network").await
    }

    #[instrument(skip(self, launch), fields(container = %launch.name()))]
    async fn start_container(&self, launch: &ContainerLaunch) -> Result<String> {
        let output = self.exec(&run_args(launch, true)).await?;
        let id = last_line(&output.stdout);

        // `docker run` joins a single network; the rest are connected afterwards.
        for args in extra_network_args(launch) {
            self.exec(&args).await?;
        }
        Ok(id)
    }

    #[instrument(skip(self, launch), fields(container = %launch.name()))]
    async fn run_container(&self, launch: &ContainerLaunch) -> Result<i64> {
        let args = run_args(launch, false);
        let output = self.exec_unchecked(&args).await?;

        match output.status.code() {
            Some(code) => {
                // 125 is the engine refusing to start the container at all.
                if code == 125 {
                    return Err(self.command_error(&args, &output));
                }
                Ok(code as i64)
            }
            None => Err(self.command_error(&args, &output)),
        }
    }

    #[instrument(skip(self))]
    async fn remove_container(&self, name: &str) -> Result<()> {
        self.remove(remove_container_args(name), "container").await
    }

    fn name(&self) -> &str {
        &self.binary
    }
}

impl DockerCli {
    async fn inspect_image(&self, reference: &str) -> Result<String> {
        let output = self.exec(&inspect_image_args(reference)).await?;
        Ok(last_line(&output.stdout))
    }
}

/// `docker build` arguments; `None` for images that are not built.
pub fn build_args(image: &ImageSpec) -> Option<Vec<String>> {
    let ImageSource::Build { context } = &image.source else {
        return None;
    };

    Some(vec![
        "build".to_string(),
        "-q".to_string(),
        "-t".to_string(),
        image.image_name.clone(),
        context.to_string_lossy().to_string(),
    ])
}

pub fn pull_args(reference: &str) -> Vec<String> {
    vec!["pull".to_string(), "-q".to_string(), reference.to_string()]
}

pub fn inspect_image_args(reference: &str) -> Vec<String> {
    vec![
        "image".to_string(),
        "inspect".to_string(),
        "--format".to_string(),
        "{{.Id}}".to_string(),
        reference.to_string(),
    ]
}

pub fn network_create_args(network: &NetworkSpec) -> Vec<String> {
    vec![
        "network".to_string(),
        "create".to_string(),
        "--driver".to_string(),
        network.driver.to_string(),
        network.network_name.clone(),
    ]
}

/// `docker run` arguments. `detach` selects a long-lived service over a job.
pub fn run_args(launch: &ContainerLaunch, detach: bool) -> Vec<String> {
    let spec = &launch.spec;
    let mut args = vec!["run".to_string()];

    if detach {
        args.push("-d".to_string());
    }
    if spec.remove_on_exit {
        args.push("--rm".to_string());
    }
    args.push("--name".to_string());
    args.push(spec.container_name.clone());

    for port in &spec.ports {
        args.push("-p".to_string());
        args.push(format!("{}:{}/{}", port.external, port.internal, port.protocol));
    }

    for var in &spec.env {
        args.push("-e".to_string());
        args.push(var.to_string());
    }

    if let Some(first) = launch.networks.first() {
        args.push("--network".to_string());
        args.push(first.network.clone());
        for alias in &first.aliases {
            args.push("--network-alias".to_string());
            args.push(alias.clone());
        }
    }

    for mount in &spec.mounts {
        args.push("--mount".to_string());
        args.push(format!(
            "type={},source={},target={}",
            mount.kind,
            mount.source.to_string_lossy(),
            mount.target
        ));
    }

    args.push(launch.image.clone());
    args.extend(spec.command.iter().cloned());
    args
}

/// Forced removal: a running container is killed first.
pub fn remove_container_args(name: &str) -> Vec<String> {
    vec!["rm".to_string(), "-f".to_string(), name.to_string()]
}

/// `docker network connect` invocations for every attachment after the first.
pub fn extra_network_args(launch: &ContainerLaunch) -> Vec<Vec<String>> {
    launch
        .networks
        .iter()
        .skip(1)
        .map(|attachment| {
            let mut args = vec!["network".to_string(), "connect".to_string()];
            for alias in &attachment.aliases {
                args.push("--alias".to_string());
                args.push(alias.clone());
            }
            args.push(attachment.network.clone());
            args.push(launch.spec.container_name.clone());
            args
        })
        .collect()
}

fn subcommand(args: &[String]) -> String {
    args.iter().take(2).cloned().collect::<Vec<_>>().join(" ")
}

fn last_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).lines().last().unwrap_or_default().trim().to_string()
}

fn is_not_found(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("no such") || lower.contains("not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContainerSpec, Mount, NetworkAttachment, PortMapping};

    fn launch(spec: ContainerSpec) -> ContainerLaunch {
        ContainerLaunch {
            image: "sha256:abc".to_string(),
            networks: spec
                .networks
                .iter()
                .map(|n| NetworkAttachment {
                    network: format!("{}-dev", n.network),
                    aliases: n.aliases.clone(),
                })
                .collect(),
            spec,
        }
    }

    #[test]
    fn test_build_args() {
        let image = ImageSpec::build("backend", "/src/app/backend", "backend:dev");
        assert_eq!(
            build_args(&image).unwrap(),
            vec!["build", "-q", "-t", "backend:dev", "/src/app/backend"]
        );

        assert!(build_args(&ImageSpec::remote("mongo", "mongo:bionic")).is_none());
    }

    #[test]
    fn test_service_run_args() {
        let spec = ContainerSpec::new("db", "mongo-dev", "mongo")
            .port(PortMapping::same(27017))
            .env("A", "1")
            .network_with_aliases("services", &["mongo"]);

        let args = run_args(&launch(spec), true);
        assert_eq!(
            args,
            vec![
                "run",
                "-d",
                "--name",
                "mongo-dev",
                "-p",
                "27017:27017/tcp",
                "-e",
                "A=1",
                "--network",
                "services-dev",
                "--network-alias",
                "mongo",
                "sha256:abc",
            ]
        );
    }

    #[test]
    fn test_job_run_args() {
        let spec = ContainerSpec::new("seed", "data_seed", "mongo")
            .one_shot()
            .mount(Mount::bind("/p/products.json", "/home/products.json"))
            .command(["sh", "-c", "echo hi"])
            .network("services");

        let args = run_args(&launch(spec), false);
        assert!(!args.contains(&"-d".to_string()));
        assert_eq!(args[1], "--rm");
        let mount = args.iter().position(|a| a == "--mount").unwrap();
        assert_eq!(args[mount + 1], "type=bind,source=/p/products.json,target=/home/products.json");
        assert_eq!(args[args.len() - 4..], ["sha256:abc", "sh", "-c", "echo hi"]);
    }

    #[test]
    fn test_extra_networks_are_connected() {
        let spec = ContainerSpec::new("api", "api-dev", "img")
            .network("front")
            .network_with_aliases("back", &["api"]);
        let launch = launch(spec);

        let run = run_args(&launch, true);
        assert_eq!(run.iter().filter(|a| *a == "--network").count(), 1);

        let extra = extra_network_args(&launch);
        assert_eq!(
            extra,
            vec![vec!["network", "connect", "--alias", "api", "back-dev", "api-dev"]]
        );
    }

    #[test]
    fn test_seed_container_removal_is_forced_and_unscoped() {
        use crate::stack::{define, DATA_SEED_CONTAINER, DATA_SEED_NAME};
        use crate::StackSettings;

        let settings = StackSettings {
            frontend_port: 3000,
            backend_port: 3001,
            mongo_port: 27017,
            mongo_host: "mongo".to_string(),
            database: "cart".to_string(),
            node_environment: "development".to_string(),
        };
        // Every stack's seed job shares one runtime name, and removal kills it if running.
        for stack in ["dev", "staging"] {
            let graph = define(&settings, stack, std::path::Path::new("/p")).unwrap();
            let seed = graph.get(DATA_SEED_CONTAINER).unwrap();
            assert_eq!(
                remove_container_args(seed.runtime_name()),
                vec!["rm", "-f", DATA_SEED_NAME]
            );
        }
    }

    #[test]
    fn test_not_found_detection() {
        assert!(is_not_found("Error: No such container: backend-dev"));
        assert!(is_not_found("Error response from daemon: network services-dev not found"));
        assert!(!is_not_found("permission denied"));
    }

    #[tokio::test]
    async fn test_exec_captures_output() {
        let cli = DockerCli::new("echo", Duration::from_secs(5));
        let network = NetworkSpec::new("network", "services-dev");
        let id = cli.create_network(&network).await.unwrap();
        assert_eq!(id, "network create --driver bridge services-dev");
    }

    #[tokio::test]
    async fn test_missing_binary_is_reported() {
        let cli = DockerCli::new("nonexistent_command_12345", Duration::from_secs(5));
        let err = cli.remove_container("backend-dev").await.unwrap_err();
        assert!(matches!(err, StackError::RuntimeCommand { code: None, .. }));
    }

    #[tokio::test]
    async fn test_build_failure_is_classified() {
        let cli = DockerCli::new("false", Duration::from_secs(5));
        let image = ImageSpec::build("backend", "/src/app/backend", "backend:dev");
        let err = cli.build_image(&image).await.unwrap_err();
        assert!(matches!(err, StackError::BuildFailed { tag, .. } if tag == "backend:dev"));
    }
}
