//! `berth network ...`

use super::shared::{check, confirm, parse_pairs, print_document, print_list, print_outcome};
use super::CommandContext;
use crate::cli::NetworkCommand;
use crate::ui::table;
use anyhow::Result;
use berth_core::args::NetworkCreateRequest;
use berth_core::errors::BerthError;
use berth_core::model::ResourceKind;

pub async fn run(ctx: &CommandContext, command: NetworkCommand) -> Result<()> {
    let service = &ctx.service;
    match command {
        NetworkCommand::Ls => {
            let networks = check(service.list_networks().await)?;
            print_list(ctx, &networks, table::networks)
        }
        NetworkCommand::Create {
            name,
            driver,
            subnet,
            gateway,
            internal,
            label,
        } => {
            let request = NetworkCreateRequest {
                name,
                driver,
                subnet,
                gateway,
                internal,
                labels: parse_pairs("label", &label)?,
            };
            let result = service
                .create_network(&request)
                .await
                .map_err(BerthError::from)?;
            let out = check(result)?;
            print_outcome(ctx, "create", &request.name, &out)
        }
        NetworkCommand::Inspect { name } => {
            let document = check(service.inspect(ResourceKind::Network, &name).await)?;
            print_document(&document)
        }
        NetworkCommand::Rm { name } => {
            if !confirm(ctx, &format!("Remove network {}?", name))? {
                return Ok(());
            }
            let result = service
                .remove_network(&name)
                .await
                .map_err(BerthError::from)?;
            let out = check(result)?;
            print_outcome(ctx, "remove", &name, &out)
        }
    }
}
