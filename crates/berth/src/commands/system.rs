//! `berth system info`

use super::shared::{check, print_document};
use super::CommandContext;
use anyhow::Result;

pub async fn info(ctx: &CommandContext) -> Result<()> {
    let info = check(ctx.service.system_info().await)?;
    print_document(&info)
}
