//! `berth watch <kind>`: follow a resource cache until interrupted.
//!
//! SIGHUP reloads settings into the running cache, so a new poll interval or
//! show-stopped flag takes effect without restarting.

use super::CommandContext;
use crate::cli::{ConfigSource, OutputFormat};
use crate::ui::table;
use anyhow::Result;
use berth_core::cache::{ResourceCache, Snapshot};
use berth_core::model::{Container, Image, Network, ResourceKind, Volume};
use berth_core::normalize::Normalize;
use console::Term;
use serde::Serialize;
use tracing::{info, warn};

pub async fn run(ctx: &CommandContext, kind: ResourceKind, source: &ConfigSource) -> Result<()> {
    match kind {
        ResourceKind::Container => follow::<Container>(ctx, source, table::containers).await,
        ResourceKind::Image => follow::<Image>(ctx, source, table::images).await,
        ResourceKind::Volume => follow::<Volume>(ctx, source, table::volumes).await,
        ResourceKind::Network => follow::<Network>(ctx, source, table::networks).await,
    }
}

async fn follow<R>(
    ctx: &CommandContext,
    source: &ConfigSource,
    render: fn(&[R]) -> String,
) -> Result<()>
where
    R: Normalize + Serialize,
{
    let holder = ctx.service.config().clone();
    let cache = ResourceCache::<R>::new(ctx.service.executor(), holder.clone());
    let mut updates = cache.subscribe();
    let mut reload = Reload::new()?;

    cache.start();
    if holder.current().poll_interval().is_none() {
        info!(kind = %R::KIND, "Polling disabled; showing a single refresh");
        if let Err(error) = cache.refresh().await {
            warn!(%error, "Refresh failed");
        }
        print_snapshot(ctx, &cache.snapshot(), render)?;
    }

    loop {
        tokio::select! {
            snapshot = updates.changed() => match snapshot {
                Some(snapshot) => print_snapshot(ctx, &snapshot, render)?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = reload.recv() => match source.load() {
                Ok(config) => {
                    info!("Settings reloaded");
                    holder.replace(config);
                }
                Err(error) => warn!("Keeping current settings: {:#}", error),
            },
        }
    }

    cache.dispose();
    Ok(())
}

fn print_snapshot<R: Serialize>(
    ctx: &CommandContext,
    snapshot: &Snapshot<R>,
    render: fn(&[R]) -> String,
) -> Result<()> {
    match ctx.output {
        OutputFormat::Json => {
            let line = serde_json::json!({
                "generation": snapshot.generation,
                "refreshedAt": snapshot.refreshed_at,
                "items": snapshot.items,
            });
            println!("{}", serde_json::to_string(&line)?);
        }
        OutputFormat::Text => {
            let term = Term::stdout();
            if term.is_term() {
                term.clear_screen()?;
            }
            let stamp = snapshot
                .refreshed_at
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "never".to_string());
            println!(
                "{} item(s), refreshed {} (generation {})\n",
                snapshot.items.len(),
                stamp,
                snapshot.generation
            );
            print!("{}", render(&snapshot.items));
        }
    }
    Ok(())
}

/// Settings reload requests (SIGHUP)
#[cfg(unix)]
struct Reload(tokio::signal::unix::Signal);

#[cfg(unix)]
impl Reload {
    fn new() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self(signal(SignalKind::hangup())?))
    }

    async fn recv(&mut self) {
        if self.0.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
struct Reload;

#[cfg(not(unix))]
impl Reload {
    fn new() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) {
        std::future::pending::<()>().await
    }
}
