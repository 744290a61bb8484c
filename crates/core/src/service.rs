//! Resource operations composed from argv building, execution and normalization
//!
//! [`ResourceService`] is the surface a host calls. Every operation builds
//! its argv, runs it through the [`Executor`] and returns an
//! [`OperationResult`]. Operations that change a resource kind ask the
//! attached cache for that kind, if any, to refresh afterwards; a failed
//! follow-up refresh is logged and never alters the mutation's result.

use crate::args::{
    self, BuildRequest, ExecRequest, KillOptions, LogsOptions, NetworkCreateRequest, PruneOptions,
    PullRequest, RemoveOptions, RunRequest, StopOptions, VolumeCreateRequest,
};
use crate::cache::ResourceCache;
use crate::config::ConfigHolder;
use crate::errors::{CacheError, ValidationError};
use crate::gateway::{probe_binary, BinaryStatus, Executor, OperationResult, Output};
use crate::model::{Container, Image, Network, ResourceKind, Volume};
use crate::normalize::{normalize_list, Normalize};
use crate::validation::{validate_network_name, validate_volume_name};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Something that can be asked to reload one resource kind
#[async_trait]
pub trait Refreshable: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> ResourceKind;
    async fn refresh(&self) -> Result<(), CacheError>;
}

#[async_trait]
impl<R: Normalize> Refreshable for ResourceCache<R> {
    fn kind(&self) -> ResourceKind {
        R::KIND
    }

    async fn refresh(&self) -> Result<(), CacheError> {
        ResourceCache::refresh(self).await
    }
}

fn decode<T>(result: OperationResult<Output>, f: impl FnOnce(Value) -> T) -> OperationResult<T> {
    if result.success {
        result.map(|output| f(output.into_json()))
    } else {
        result.discard()
    }
}

fn text(result: OperationResult<Output>) -> OperationResult<String> {
    result.map(|output| output.into_text().trim().to_string())
}

#[derive(Debug, Clone)]
pub struct ResourceService {
    executor: Arc<dyn Executor>,
    config: ConfigHolder,
    caches: HashMap<ResourceKind, Arc<dyn Refreshable>>,
}

impl ResourceService {
    pub fn new(executor: Arc<dyn Executor>, config: ConfigHolder) -> Self {
        Self {
            executor,
            config,
            caches: HashMap::new(),
        }
    }

    /// Register the cache refreshed after mutations of its kind
    pub fn attach_cache(&mut self, cache: Arc<dyn Refreshable>) {
        self.caches.insert(cache.kind(), cache);
    }

    pub fn config(&self) -> &ConfigHolder {
        &self.config
    }

    pub fn executor(&self) -> Arc<dyn Executor> {
        Arc::clone(&self.executor)
    }

    /// Whether destructive operations should be confirmed by the user first
    pub fn requires_confirmation(&self) -> bool {
        self.config.current().confirm_before_delete
    }

    pub async fn probe(&self) -> BinaryStatus {
        probe_binary(self.executor.as_ref()).await
    }

    async fn run_json(&self, argv: Vec<String>) -> OperationResult<Output> {
        self.executor.execute(&argv, true).await
    }

    async fn run_text(&self, argv: Vec<String>) -> OperationResult<String> {
        text(self.executor.execute(&argv, false).await)
    }

    async fn refresh_attached(&self, kind: ResourceKind) {
        if let Some(cache) = self.caches.get(&kind) {
            if let Err(error) = cache.refresh().await {
                warn!(%kind, %error, "Refresh after mutation failed");
            }
        }
    }

    async fn after_mutation<T>(&self, kind: ResourceKind, result: OperationResult<T>) -> OperationResult<T> {
        if result.success {
            self.refresh_attached(kind).await;
        }
        result
    }

    async fn mutate(&self, kind: ResourceKind, argv: Vec<String>) -> OperationResult<String> {
        let result = self.run_text(argv).await;
        self.after_mutation(kind, result).await
    }

    /// List one kind directly, bypassing any cache
    #[instrument(skip(self), fields(kind = %R::KIND))]
    pub async fn list<R: Normalize>(&self) -> OperationResult<Vec<R>> {
        let show_stopped = self.config.current().show_stopped;
        let result = self.run_json(args::list(R::KIND, show_stopped)).await;
        decode(result, |value| normalize_list::<R>(&value))
    }

    pub async fn list_containers(&self) -> OperationResult<Vec<Container>> {
        self.list::<Container>().await
    }

    pub async fn list_images(&self) -> OperationResult<Vec<Image>> {
        self.list::<Image>().await
    }

    pub async fn list_volumes(&self) -> OperationResult<Vec<Volume>> {
        self.list::<Volume>().await
    }

    pub async fn list_networks(&self) -> OperationResult<Vec<Network>> {
        self.list::<Network>().await
    }

    /// Engine inspect document, untouched. On a decode failure the raw text
    /// is kept as a JSON string in `data`.
    #[instrument(skip(self))]
    pub async fn inspect(&self, kind: ResourceKind, key: &str) -> OperationResult<Value> {
        self.run_json(args::inspect(kind, key))
            .await
            .map(Output::into_json)
    }

    pub async fn start_container(&self, id: &str) -> OperationResult<String> {
        self.mutate(ResourceKind::Container, args::container_start(id))
            .await
    }

    pub async fn stop_container(&self, id: &str, options: &StopOptions) -> OperationResult<String> {
        self.mutate(ResourceKind::Container, args::container_stop(id, options))
            .await
    }

    pub async fn kill_container(&self, id: &str, options: &KillOptions) -> OperationResult<String> {
        self.mutate(ResourceKind::Container, args::container_kill(id, options))
            .await
    }

    /// Stop then start. A failed stop is returned as is and start never runs.
    /// Once the stop went through the cache is refreshed whatever start returns.
    #[instrument(skip(self, options))]
    pub async fn restart_container(&self, id: &str, options: &StopOptions) -> OperationResult<String> {
        let stopped = self.run_text(args::container_stop(id, options)).await;
        if !stopped.success {
            debug!(id, "Stop failed, not starting");
            return stopped;
        }
        let started = self.run_text(args::container_start(id)).await;
        self.refresh_attached(ResourceKind::Container).await;
        started
    }

    pub async fn remove_container(&self, id: &str, options: &RemoveOptions) -> OperationResult<String> {
        self.mutate(ResourceKind::Container, args::container_remove(id, options))
            .await
    }

    /// Create and start a container, returning what the engine printed
    /// (the new container id when detached)
    pub async fn run_container(&self, request: &RunRequest) -> OperationResult<String> {
        self.mutate(ResourceKind::Container, args::container_run(request))
            .await
    }

    pub async fn container_logs(&self, id: &str, options: &LogsOptions) -> OperationResult<String> {
        let result = self.executor.execute(&args::container_logs(id, options), false).await;
        result.map(Output::into_text)
    }

    pub async fn exec(&self, id: &str, request: &ExecRequest) -> OperationResult<String> {
        let result = self.executor.execute(&args::container_exec(id, request), false).await;
        result.map(Output::into_text)
    }

    /// Full command line (binary first) for a host terminal to open a shell
    /// in a container with the configured default shell
    pub fn shell_command(&self, id: &str) -> Vec<String> {
        let config = self.config.current();
        self.command_line(args::container_shell(id, &config.default_shell))
    }

    /// Full command line (binary first) for streaming logs outside the gateway
    pub fn logs_command(&self, id: &str, options: &LogsOptions) -> Vec<String> {
        self.command_line(args::container_logs(id, options))
    }

    fn command_line(&self, argv: Vec<String>) -> Vec<String> {
        let config = self.config.current();
        std::iter::once(config.binary_path.clone())
            .chain(argv)
            .collect()
    }

    pub async fn pull_image(&self, request: &PullRequest) -> OperationResult<String> {
        self.mutate(ResourceKind::Image, args::image_pull(request)).await
    }

    pub async fn build_image(&self, request: &BuildRequest) -> OperationResult<String> {
        self.mutate(ResourceKind::Image, args::image_build(request)).await
    }

    pub async fn remove_image(&self, reference: &str, options: &RemoveOptions) -> OperationResult<String> {
        self.mutate(ResourceKind::Image, args::image_remove(reference, options))
            .await
    }

    pub async fn prune_images(&self, options: &PruneOptions) -> OperationResult<String> {
        self.mutate(ResourceKind::Image, args::image_prune(options)).await
    }

    pub async fn create_volume(
        &self,
        request: &VolumeCreateRequest,
    ) -> Result<OperationResult<String>, ValidationError> {
        validate_volume_name(&request.name)?;
        Ok(self
            .mutate(ResourceKind::Volume, args::volume_create(request))
            .await)
    }

    pub async fn remove_volume(
        &self,
        name: &str,
        options: &RemoveOptions,
    ) -> Result<OperationResult<String>, ValidationError> {
        validate_volume_name(name)?;
        Ok(self
            .mutate(ResourceKind::Volume, args::volume_remove(name, options))
            .await)
    }

    pub async fn prune_volumes(&self) -> OperationResult<String> {
        self.mutate(ResourceKind::Volume, args::volume_prune()).await
    }

    pub async fn create_network(
        &self,
        request: &NetworkCreateRequest,
    ) -> Result<OperationResult<String>, ValidationError> {
        validate_network_name(&request.name)?;
        Ok(self
            .mutate(ResourceKind::Network, args::network_create(request))
            .await)
    }

    pub async fn remove_network(&self, name: &str) -> Result<OperationResult<String>, ValidationError> {
        validate_network_name(name)?;
        Ok(self
            .mutate(ResourceKind::Network, args::network_remove(name))
            .await)
    }

    pub async fn system_info(&self) -> OperationResult<Value> {
        decode(self.run_json(args::system_info()).await, |value| value)
    }
}
