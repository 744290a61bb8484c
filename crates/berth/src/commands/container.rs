//! `berth container ...`

use super::shared::{check, confirm, parse_pairs, parse_publish, parse_volume, print_document, print_list, print_outcome};
use super::CommandContext;
use crate::cli::{ContainerCommand, RunArgs};
use crate::ui::spinner::PlainSpinner;
use crate::ui::table;
use anyhow::{Context, Result};
use berth_core::args::{ExecRequest, KillOptions, LogsOptions, RemoveOptions, RunRequest, StopOptions};
use berth_core::errors::{BerthError, GatewayError};
use berth_core::model::ResourceKind;
use std::io;
use tracing::{debug, instrument};

pub async fn run(ctx: &CommandContext, command: ContainerCommand) -> Result<()> {
    let service = &ctx.service;
    match command {
        ContainerCommand::Ls { all, running } => {
            if all || running {
                service.config().update(|c| c.show_stopped = all);
            }
            let containers = check(service.list_containers().await)?;
            print_list(ctx, &containers, table::containers)
        }
        ContainerCommand::Inspect { id } => {
            let document = check(service.inspect(ResourceKind::Container, &id).await)?;
            print_document(&document)
        }
        ContainerCommand::Start { id } => {
            let out = check(service.start_container(&id).await)?;
            print_outcome(ctx, "start", &id, &out)
        }
        ContainerCommand::Stop { id, time } => {
            let options = StopOptions { timeout_secs: time };
            let spinner = PlainSpinner::start(&format!("Stopping {}", id));
            let out = check(service.stop_container(&id, &options).await)?;
            spinner.finish_with_message(&format!("Stopped {}", id));
            print_outcome(ctx, "stop", &id, &out)
        }
        ContainerCommand::Kill { id, signal } => {
            let out = check(service.kill_container(&id, &KillOptions { signal }).await)?;
            print_outcome(ctx, "kill", &id, &out)
        }
        ContainerCommand::Restart { id, time } => {
            let options = StopOptions { timeout_secs: time };
            let spinner = PlainSpinner::start(&format!("Restarting {}", id));
            let out = check(service.restart_container(&id, &options).await)?;
            spinner.finish_with_message(&format!("Restarted {}", id));
            print_outcome(ctx, "restart", &id, &out)
        }
        ContainerCommand::Rm { id, force, volumes } => {
            if !confirm(ctx, &format!("Remove container {}?", id))? {
                debug!(%id, "Removal declined");
                return Ok(());
            }
            let options = RemoveOptions { force, volumes };
            let out = check(service.remove_container(&id, &options).await)?;
            print_outcome(ctx, "remove", &id, &out)
        }
        ContainerCommand::Run(args) => run_container(ctx, args).await,
        ContainerCommand::Logs {
            id,
            follow,
            tail,
            timestamps,
        } => {
            let options = LogsOptions {
                follow,
                tail,
                timestamps,
            };
            if follow {
                return stream_logs(ctx, &id, &options).await;
            }
            let logs = check(service.container_logs(&id, &options).await)?;
            print!("{}", logs);
            Ok(())
        }
        ContainerCommand::Exec {
            id,
            user,
            workdir,
            env,
            command,
        } => {
            let request = ExecRequest {
                user,
                workdir,
                env: parse_pairs("env", &env)?,
                command,
                ..Default::default()
            };
            let out = check(service.exec(&id, &request).await)?;
            print!("{}", out);
            Ok(())
        }
    }
}

fn run_request(args: RunArgs) -> Result<RunRequest> {
    let mut request = RunRequest::new(args.image);
    request.name = args.name;
    request.remove = args.rm;
    request.env = parse_pairs("env", &args.env)?;
    request.labels = parse_pairs("label", &args.label)?;
    request.ports = args
        .publish
        .iter()
        .map(|p| parse_publish(p))
        .collect::<Result<_>>()?;
    request.volumes = args
        .volume
        .iter()
        .map(|v| parse_volume(v))
        .collect::<Result<_>>()?;
    request.network = args.network;
    request.workdir = args.workdir;
    request.entrypoint = args.entrypoint;
    request.command = args.command;
    Ok(request)
}

#[instrument(skip_all, fields(image = %args.image))]
async fn run_container(ctx: &CommandContext, args: RunArgs) -> Result<()> {
    let request = run_request(args)?;
    let spinner = PlainSpinner::start(&format!("Starting {}", request.image));
    let result = ctx.service.run_container(&request).await;
    if !result.success {
        spinner.fail_with_message(&format!("Failed to start {}", request.image));
    } else {
        spinner.finish_with_message(&format!("Started {}", request.image));
    }
    let id = check(result)?;
    print_outcome(ctx, "run", &request.image, &id)
}

/// `--follow` streams until interrupted, so it runs outside the bounded gateway
async fn stream_logs(ctx: &CommandContext, id: &str, options: &LogsOptions) -> Result<()> {
    let command_line = ctx.service.logs_command(id, options);
    let (program, args) = command_line
        .split_first()
        .context("empty logs command line")?;
    debug!(?command_line, "Streaming logs");
    let status = match tokio::process::Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .status()
        .await
    {
        Ok(status) => status,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            return Err(BerthError::from(GatewayError::BinaryNotFound {
                message: format!("failed to start '{}': {}", program, error),
            })
            .into());
        }
        Err(error) => {
            return Err(error).with_context(|| format!("Failed to start '{}'", program));
        }
    };
    if !status.success() {
        anyhow::bail!("Log streaming ended with {}", status);
    }
    Ok(())
}
