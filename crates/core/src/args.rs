//! Argument vectors for the external container CLI
//!
//! Every function here maps a typed request to an ordered list of argv
//! tokens. Tokens are opaque: nothing is ever joined into a command line that
//! a shell could reinterpret, and optional fields only contribute tokens when
//! present. Names reaching these functions are expected to have been checked
//! with [`crate::validation`] already; the builders themselves cannot fail.

use crate::model::{Mount, PortMapping, Protocol, ResourceKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered key/value pairs expanded into repeated `--flag key=value` tokens
pub type Pairs = IndexMap<String, String>;

/// Small argv accumulator used by the builders below
#[derive(Debug, Default)]
struct Argv(Vec<String>);

impl Argv {
    fn new(head: &[&str]) -> Self {
        Self(head.iter().map(|s| s.to_string()).collect())
    }

    fn arg(&mut self, value: impl Into<String>) -> &mut Self {
        self.0.push(value.into());
        self
    }

    fn flag(&mut self, name: &str, enabled: bool) -> &mut Self {
        if enabled {
            self.0.push(name.to_string());
        }
        self
    }

    fn opt(&mut self, name: &str, value: Option<impl ToString>) -> &mut Self {
        if let Some(value) = value {
            self.0.push(name.to_string());
            self.0.push(value.to_string());
        }
        self
    }

    fn pairs(&mut self, name: &str, pairs: &Pairs) -> &mut Self {
        for (key, value) in pairs {
            self.0.push(name.to_string());
            self.0.push(format!("{}={}", key, value));
        }
        self
    }

    fn repeated<T>(&mut self, name: &str, items: &[T], token: impl Fn(&T) -> String) -> &mut Self {
        for item in items {
            self.0.push(name.to_string());
            self.0.push(token(item));
        }
        self
    }

    fn json(&mut self) -> &mut Self {
        self.0.push("--format".to_string());
        self.0.push("json".to_string());
        self
    }

    fn build(self) -> Vec<String> {
        self.0
    }
}

/// Host path or named volume bound into a container (`--volume`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeBinding {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StopOptions {
    /// Seconds to wait before killing the container
    pub timeout_secs: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct KillOptions {
    pub signal: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RemoveOptions {
    pub force: bool,
    /// Also remove anonymous volumes (containers only)
    pub volumes: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LogsOptions {
    pub follow: bool,
    pub tail: Option<u32>,
    pub timestamps: bool,
}

/// Request for `container run`
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub image: String,
    pub name: Option<String>,
    pub detach: bool,
    pub remove: bool,
    pub env: Pairs,
    pub labels: Pairs,
    pub ports: Vec<PortMapping>,
    pub volumes: Vec<VolumeBinding>,
    pub mounts: Vec<Mount>,
    pub network: Option<String>,
    pub workdir: Option<String>,
    pub entrypoint: Option<String>,
    pub command: Vec<String>,
}

impl RunRequest {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            detach: true,
            ..Default::default()
        }
    }
}

/// Request for `container exec`
#[derive(Debug, Clone, Default)]
pub struct ExecRequest {
    pub interactive: bool,
    pub tty: bool,
    pub user: Option<String>,
    pub workdir: Option<String>,
    pub env: Pairs,
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PullRequest {
    pub reference: String,
    pub platform: Option<String>,
}

/// Request for `build`
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    pub context: String,
    pub tag: Option<String>,
    pub file: Option<String>,
    pub build_args: Pairs,
    pub labels: Pairs,
    pub target: Option<String>,
    pub no_cache: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PruneOptions {
    /// Images only: remove all unused images, not just dangling ones
    pub all: bool,
}

#[derive(Debug, Clone, Default)]
pub struct VolumeCreateRequest {
    pub name: String,
    pub driver: Option<String>,
    pub driver_opts: Pairs,
    pub labels: Pairs,
}

#[derive(Debug, Clone, Default)]
pub struct NetworkCreateRequest {
    pub name: String,
    pub driver: Option<String>,
    pub subnet: Option<String>,
    pub gateway: Option<String>,
    pub internal: bool,
    pub labels: Pairs,
}

/// `host-ip:host-port:container-port[/protocol]`; tcp is the engine default and is left implicit
pub fn port_token(port: &PortMapping) -> String {
    let mut token = match &port.host_ip {
        Some(ip) => format!("{}:{}:{}", ip, port.host_port, port.container_port),
        None => format!("{}:{}", port.host_port, port.container_port),
    };
    if port.protocol == Protocol::Udp {
        token.push_str("/udp");
    }
    token
}

/// `source:target[:ro]`
pub fn volume_token(binding: &VolumeBinding) -> String {
    if binding.read_only {
        format!("{}:{}:ro", binding.source, binding.target)
    } else {
        format!("{}:{}", binding.source, binding.target)
    }
}

/// `type=T,source=S,target=D[,readonly]`
pub fn mount_token(mount: &Mount) -> String {
    let mut token = format!("type={}", mount.mount_type);
    if !mount.source.is_empty() {
        token.push_str(&format!(",source={}", mount.source));
    }
    token.push_str(&format!(",target={}", mount.target));
    if mount.read_only {
        token.push_str(",readonly");
    }
    token
}

/// List arguments for any resource kind. `show_stopped` only affects containers.
pub fn list(kind: ResourceKind, show_stopped: bool) -> Vec<String> {
    match kind {
        ResourceKind::Container => container_list(show_stopped),
        ResourceKind::Image => image_list(),
        ResourceKind::Volume => volume_list(),
        ResourceKind::Network => network_list(),
    }
}

/// Inspect arguments for any resource kind
pub fn inspect(kind: ResourceKind, key: &str) -> Vec<String> {
    let mut argv = Argv::new(&[kind.as_str(), "inspect"]);
    argv.arg(key);
    argv.build()
}

pub fn container_list(all: bool) -> Vec<String> {
    let mut argv = Argv::new(&["container", "list"]);
    argv.flag("--all", all).json();
    argv.build()
}

pub fn container_start(id: &str) -> Vec<String> {
    let mut argv = Argv::new(&["container", "start"]);
    argv.arg(id);
    argv.build()
}

pub fn container_stop(id: &str, options: &StopOptions) -> Vec<String> {
    let mut argv = Argv::new(&["container", "stop"]);
    argv.opt("--time", options.timeout_secs).arg(id);
    argv.build()
}

pub fn container_kill(id: &str, options: &KillOptions) -> Vec<String> {
    let mut argv = Argv::new(&["container", "kill"]);
    argv.opt("--signal", options.signal.as_deref()).arg(id);
    argv.build()
}

pub fn container_remove(id: &str, options: &RemoveOptions) -> Vec<String> {
    let mut argv = Argv::new(&["container", "rm"]);
    argv.flag("--force", options.force)
        .flag("--volumes", options.volumes)
        .arg(id);
    argv.build()
}

pub fn container_run(request: &RunRequest) -> Vec<String> {
    let mut argv = Argv::new(&["container", "run"]);
    argv.flag("--detach", request.detach)
        .flag("--rm", request.remove)
        .opt("--name", request.name.as_deref())
        .pairs("--env", &request.env)
        .pairs("--label", &request.labels)
        .repeated("--publish", &request.ports, port_token)
        .repeated("--volume", &request.volumes, volume_token)
        .repeated("--mount", &request.mounts, mount_token)
        .opt("--network", request.network.as_deref())
        .opt("--workdir", request.workdir.as_deref())
        .opt("--entrypoint", request.entrypoint.as_deref())
        .arg(request.image.as_str());
    for token in &request.command {
        argv.arg(token.as_str());
    }
    argv.build()
}

pub fn container_logs(id: &str, options: &LogsOptions) -> Vec<String> {
    let mut argv = Argv::new(&["container", "logs"]);
    argv.flag("--follow", options.follow)
        .opt("--tail", options.tail)
        .flag("--timestamps", options.timestamps)
        .arg(id);
    argv.build()
}

pub fn container_exec(id: &str, request: &ExecRequest) -> Vec<String> {
    let mut argv = Argv::new(&["container", "exec"]);
    argv.flag("--interactive", request.interactive)
        .flag("--tty", request.tty)
        .opt("--user", request.user.as_deref())
        .opt("--workdir", request.workdir.as_deref())
        .pairs("--env", &request.env)
        .arg(id);
    for token in &request.command {
        argv.arg(token.as_str());
    }
    argv.build()
}

/// Interactive shell session arguments for a host terminal to launch
pub fn container_shell(id: &str, shell: &str) -> Vec<String> {
    container_exec(
        id,
        &ExecRequest {
            interactive: true,
            tty: true,
            command: vec![shell.to_string()],
            ..Default::default()
        },
    )
}

pub fn image_list() -> Vec<String> {
    let mut argv = Argv::new(&["image", "list"]);
    argv.json();
    argv.build()
}

pub fn image_pull(request: &PullRequest) -> Vec<String> {
    let mut argv = Argv::new(&["image", "pull"]);
    argv.opt("--platform", request.platform.as_deref())
        .arg(request.reference.as_str());
    argv.build()
}

pub fn image_build(request: &BuildRequest) -> Vec<String> {
    let mut argv = Argv::new(&["build"]);
    argv.opt("--tag", request.tag.as_deref())
        .opt("--file", request.file.as_deref())
        .pairs("--build-arg", &request.build_args)
        .pairs("--label", &request.labels)
        .opt("--target", request.target.as_deref())
        .flag("--no-cache", request.no_cache)
        .arg(request.context.as_str());
    argv.build()
}

pub fn image_remove(reference: &str, options: &RemoveOptions) -> Vec<String> {
    let mut argv = Argv::new(&["image", "rm"]);
    argv.flag("--force", options.force).arg(reference);
    argv.build()
}

pub fn image_prune(options: &PruneOptions) -> Vec<String> {
    let mut argv = Argv::new(&["image", "prune", "--force"]);
    argv.flag("--all", options.all);
    argv.build()
}

pub fn volume_list() -> Vec<String> {
    let mut argv = Argv::new(&["volume", "list"]);
    argv.json();
    argv.build()
}

pub fn volume_create(request: &VolumeCreateRequest) -> Vec<String> {
    let mut argv = Argv::new(&["volume", "create"]);
    argv.opt("--driver", request.driver.as_deref())
        .pairs("--opt", &request.driver_opts)
        .pairs("--label", &request.labels)
        .arg(request.name.as_str());
    argv.build()
}

pub fn volume_remove(name: &str, options: &RemoveOptions) -> Vec<String> {
    let mut argv = Argv::new(&["volume", "rm"]);
    argv.flag("--force", options.force).arg(name);
    argv.build()
}

pub fn volume_prune() -> Vec<String> {
    Argv::new(&["volume", "prune", "--force"]).build()
}

pub fn network_list() -> Vec<String> {
    let mut argv = Argv::new(&["network", "list"]);
    argv.json();
    argv.build()
}

pub fn network_create(request: &NetworkCreateRequest) -> Vec<String> {
    let mut argv = Argv::new(&["network", "create"]);
    argv.opt("--driver", request.driver.as_deref())
        .opt("--subnet", request.subnet.as_deref())
        .opt("--gateway", request.gateway.as_deref())
        .flag("--internal", request.internal)
        .pairs("--label", &request.labels)
        .arg(request.name.as_str());
    argv.build()
}

pub fn network_remove(name: &str) -> Vec<String> {
    let mut argv = Argv::new(&["network", "rm"]);
    argv.arg(name);
    argv.build()
}

pub fn system_info() -> Vec<String> {
    let mut argv = Argv::new(&["system", "info"]);
    argv.json();
    argv.build()
}

/// Availability probe
pub fn version() -> Vec<String> {
    vec!["--version".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MountType;

    fn count(args: &[String], needle: &str) -> usize {
        args.iter().filter(|a| *a == needle).count()
    }

    #[test]
    fn test_run_with_port_and_readonly_volume() {
        let mut request = RunRequest::new("nginx:latest");
        request.ports.push(PortMapping::new(8080, 80));
        request.volumes.push(VolumeBinding {
            source: "/data".to_string(),
            target: "/app".to_string(),
            read_only: true,
        });

        let args = container_run(&request);
        assert_eq!(
            args,
            vec![
                "container",
                "run",
                "--detach",
                "--publish",
                "8080:80",
                "--volume",
                "/data:/app:ro",
                "nginx:latest"
            ]
        );
        assert_eq!(count(&args, "--publish"), 1);
        assert_eq!(count(&args, "--volume"), 1);
    }

    #[test]
    fn test_run_minimal_has_no_extraneous_tokens() {
        let mut request = RunRequest::new("alpine");
        request.detach = false;
        let args = container_run(&request);
        assert_eq!(args, vec!["container", "run", "alpine"]);
        assert!(args.iter().all(|a| !a.is_empty()));
    }

    #[test]
    fn test_run_maps_expand_in_insertion_order() {
        let mut request = RunRequest::new("app");
        request.env.insert("ZED".to_string(), "1".to_string());
        request.env.insert("ALPHA".to_string(), "two words".to_string());
        request.labels.insert("tier".to_string(), "web".to_string());
        request.command = vec!["sh".to_string(), "-c".to_string(), "echo $HOME; rm -rf /".to_string()];

        let args = container_run(&request);
        let env_values: Vec<&String> = args
            .iter()
            .zip(args.iter().skip(1))
            .filter(|(flag, _)| *flag == "--env")
            .map(|(_, value)| value)
            .collect();
        assert_eq!(env_values, vec!["ZED=1", "ALPHA=two words"]);
        assert_eq!(count(&args, "--label"), 1);
        // the shell snippet stays one opaque token
        assert_eq!(args.last().unwrap(), "echo $HOME; rm -rf /");
    }

    #[test]
    fn test_port_token_variants() {
        let mut port = PortMapping::new(5353, 53);
        port.protocol = Protocol::Udp;
        port.host_ip = Some("127.0.0.1".to_string());
        assert_eq!(port_token(&port), "127.0.0.1:5353:53/udp");
        assert_eq!(port_token(&PortMapping::new(80, 8080)), "80:8080");
    }

    #[test]
    fn test_mount_token() {
        let mount = Mount {
            mount_type: MountType::Volume,
            source: "cache".to_string(),
            target: "/var/cache".to_string(),
            read_only: true,
        };
        assert_eq!(
            mount_token(&mount),
            "type=volume,source=cache,target=/var/cache,readonly"
        );

        let tmpfs = Mount {
            mount_type: MountType::Tmpfs,
            source: String::new(),
            target: "/tmp".to_string(),
            read_only: false,
        };
        assert_eq!(mount_token(&tmpfs), "type=tmpfs,target=/tmp");
    }

    #[test]
    fn test_container_list_show_stopped() {
        assert_eq!(
            container_list(true),
            vec!["container", "list", "--all", "--format", "json"]
        );
        assert_eq!(
            container_list(false),
            vec!["container", "list", "--format", "json"]
        );
        assert_eq!(list(ResourceKind::Container, false), container_list(false));
    }

    #[test]
    fn test_stop_and_kill_optional_flags() {
        assert_eq!(
            container_stop("web", &StopOptions::default()),
            vec!["container", "stop", "web"]
        );
        assert_eq!(
            container_stop(
                "web",
                &StopOptions {
                    timeout_secs: Some(5)
                }
            ),
            vec!["container", "stop", "--time", "5", "web"]
        );
        assert_eq!(
            container_kill(
                "web",
                &KillOptions {
                    signal: Some("SIGHUP".to_string())
                }
            ),
            vec!["container", "kill", "--signal", "SIGHUP", "web"]
        );
    }

    #[test]
    fn test_build_request() {
        let mut request = BuildRequest {
            context: ".".to_string(),
            tag: Some("app:dev".to_string()),
            no_cache: true,
            ..Default::default()
        };
        request
            .build_args
            .insert("VERSION".to_string(), "1.2".to_string());
        assert_eq!(
            image_build(&request),
            vec![
                "build",
                "--tag",
                "app:dev",
                "--build-arg",
                "VERSION=1.2",
                "--no-cache",
                "."
            ]
        );
    }

    #[test]
    fn test_network_create() {
        let request = NetworkCreateRequest {
            name: "backend".to_string(),
            subnet: Some("10.10.0.0/24".to_string()),
            internal: true,
            ..Default::default()
        };
        assert_eq!(
            network_create(&request),
            vec![
                "network",
                "create",
                "--subnet",
                "10.10.0.0/24",
                "--internal",
                "backend"
            ]
        );
    }

    #[test]
    fn test_volume_create_and_prune() {
        let mut request = VolumeCreateRequest {
            name: "pgdata".to_string(),
            ..Default::default()
        };
        request.labels.insert("app".to_string(), "db".to_string());
        assert_eq!(
            volume_create(&request),
            vec!["volume", "create", "--label", "app=db", "pgdata"]
        );
        assert_eq!(volume_prune(), vec!["volume", "prune", "--force"]);
    }

    #[test]
    fn test_shell_and_inspect() {
        assert_eq!(
            container_shell("web", "/bin/bash"),
            vec!["container", "exec", "--interactive", "--tty", "web", "/bin/bash"]
        );
        assert_eq!(
            inspect(ResourceKind::Network, "bridge"),
            vec!["network", "inspect", "bridge"]
        );
    }
}
