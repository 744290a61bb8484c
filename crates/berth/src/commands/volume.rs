//! `berth volume ...`

use super::shared::{check, confirm, parse_pairs, print_document, print_list, print_outcome};
use super::CommandContext;
use crate::cli::VolumeCommand;
use crate::ui::table;
use anyhow::Result;
use berth_core::args::{RemoveOptions, VolumeCreateRequest};
use berth_core::errors::BerthError;
use berth_core::model::ResourceKind;

pub async fn run(ctx: &CommandContext, command: VolumeCommand) -> Result<()> {
    let service = &ctx.service;
    match command {
        VolumeCommand::Ls => {
            let volumes = check(service.list_volumes().await)?;
            print_list(ctx, &volumes, table::volumes)
        }
        VolumeCommand::Create {
            name,
            driver,
            opt,
            label,
        } => {
            let request = VolumeCreateRequest {
                name,
                driver,
                driver_opts: parse_pairs("opt", &opt)?,
                labels: parse_pairs("label", &label)?,
            };
            let result = service
                .create_volume(&request)
                .await
                .map_err(BerthError::from)?;
            let out = check(result)?;
            print_outcome(ctx, "create", &request.name, &out)
        }
        VolumeCommand::Inspect { name } => {
            let document = check(service.inspect(ResourceKind::Volume, &name).await)?;
            print_document(&document)
        }
        VolumeCommand::Rm { name, force } => {
            if !confirm(ctx, &format!("Remove volume {}?", name))? {
                return Ok(());
            }
            let options = RemoveOptions {
                force,
                ..Default::default()
            };
            let result = service
                .remove_volume(&name, &options)
                .await
                .map_err(BerthError::from)?;
            let out = check(result)?;
            print_outcome(ctx, "remove", &name, &out)
        }
        VolumeCommand::Prune => {
            if !confirm(ctx, "Remove all unused volumes?")? {
                return Ok(());
            }
            let out = check(service.prune_volumes().await)?;
            print_outcome(ctx, "prune", "volumes", &out)
        }
    }
}
