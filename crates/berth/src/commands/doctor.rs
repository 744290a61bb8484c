//! `berth doctor`: report whether the container CLI is usable

use super::CommandContext;
use crate::cli::{ConfigSource, OutputFormat};
use anyhow::Result;
use berth_core::config::ConfigLoader;
use berth_core::errors::{BerthError, GatewayError};
use berth_core::gateway::BinaryStatus;
use console::style;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    binary: String,
    #[serde(flatten)]
    status: BinaryStatus,
    settings_path: Option<PathBuf>,
    poll_interval_ms: u64,
    show_stopped: bool,
    command_timeout_ms: u64,
}

pub async fn run(ctx: &CommandContext, source: &ConfigSource) -> Result<()> {
    let config = ctx.service.config().current();
    let status = ctx.service.probe().await;
    let report = Report {
        binary: config.binary_path.clone(),
        status: status.clone(),
        settings_path: source
            .path
            .clone()
            .or_else(ConfigLoader::default_settings_path),
        poll_interval_ms: config.poll_interval_ms,
        show_stopped: config.show_stopped,
        command_timeout_ms: config.command_timeout_ms,
    };

    match ctx.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print!("{}", render(&report)),
    }

    match status {
        BinaryStatus::Available { .. } => Ok(()),
        BinaryStatus::Unavailable { reason } => {
            Err(BerthError::from(GatewayError::BinaryNotFound { message: reason }).into())
        }
    }
}

fn render(report: &Report) -> String {
    let state = match &report.status {
        BinaryStatus::Available { version } => format!("{} {}", style("ok").green(), version),
        BinaryStatus::Unavailable { reason } => format!("{} {}", style("unavailable").red(), reason),
    };
    let settings = report
        .settings_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "-".to_string());
    let polling = if report.poll_interval_ms == 0 {
        "disabled".to_string()
    } else {
        format!("{} ms", report.poll_interval_ms)
    };
    format!(
        "Binary:         {}\nStatus:         {}\nSettings:       {}\nPoll interval:  {}\nShow stopped:   {}\nTimeout:        {} ms\n",
        report.binary, state, settings, polling, report.show_stopped, report.command_timeout_ms
    )
}
