//! Helpers shared by the resource subcommands

use super::CommandContext;
use crate::cli::OutputFormat;
use anyhow::{anyhow, bail, Result};
use berth_core::errors::BerthError;
use berth_core::gateway::OperationResult;
use berth_core::args::{Pairs, VolumeBinding};
use berth_core::model::{PortMapping, Protocol};
use serde::Serialize;
use std::io::IsTerminal;

/// Unwrap a successful result or turn its failure into a [`BerthError`]
pub fn check<T>(result: OperationResult<T>) -> Result<T> {
    result
        .into_result()
        .map_err(|e| anyhow::Error::from(BerthError::from(e)))
}

/// Print a list as JSON or through the given table renderer
pub fn print_list<T: Serialize>(
    ctx: &CommandContext,
    items: &[T],
    render: impl Fn(&[T]) -> String,
) -> Result<()> {
    match ctx.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(items)?),
        OutputFormat::Text => print!("{}", render(items)),
    }
    Ok(())
}

/// Inspect documents are always printed as JSON
pub fn print_document(document: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(document)?);
    Ok(())
}

/// Report the engine's output of a mutation
pub fn print_outcome(ctx: &CommandContext, action: &str, subject: &str, stdout: &str) -> Result<()> {
    match ctx.output {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "action": action,
                "subject": subject,
                "output": stdout,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text if stdout.is_empty() => println!("{}", subject),
        OutputFormat::Text => println!("{}", stdout),
    }
    Ok(())
}

/// Ask before a destructive action unless settings or `--yes` waive it.
/// Without a terminal to ask on, the action is refused.
pub fn confirm(ctx: &CommandContext, prompt: &str) -> Result<bool> {
    if ctx.assume_yes || !ctx.service.requires_confirmation() {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        bail!("{} requires confirmation; pass --yes to proceed", prompt);
    }
    let term = console::Term::stderr();
    term.write_str(&format!("{} [y/N] ", prompt))?;
    let answer = term.read_line()?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Parse repeated `KEY=VALUE` flags, keeping their order
pub fn parse_pairs(flag: &str, values: &[String]) -> Result<Pairs> {
    values
        .iter()
        .map(|value| match value.split_once('=') {
            Some((key, val)) if !key.is_empty() => Ok((key.to_string(), val.to_string())),
            _ => Err(anyhow!("Invalid --{} value '{}', expected KEY=VALUE", flag, value)),
        })
        .collect()
}

/// `[IP:]HOST:CONTAINER[/tcp|/udp]`
pub fn parse_publish(value: &str) -> Result<PortMapping> {
    let (spec, protocol) = match value.rsplit_once('/') {
        Some((spec, proto)) => (spec, proto.parse::<Protocol>().map_err(|e| anyhow!(e))?),
        None => (value, Protocol::Tcp),
    };
    let parts: Vec<&str> = spec.rsplitn(3, ':').collect();
    let port = |s: &str| {
        s.parse::<u16>()
            .map_err(|_| anyhow!("Invalid port '{}' in --publish {}", s, value))
    };
    let (host_ip, host_port, container_port) = match parts.as_slice() {
        [container, host] => (None, port(*host)?, port(*container)?),
        [container, host, ip] => (Some(ip.to_string()), port(*host)?, port(*container)?),
        _ => bail!("Invalid --publish value '{}', expected [IP:]HOST:CONTAINER", value),
    };
    Ok(PortMapping {
        host_ip,
        host_port,
        container_port,
        protocol,
    })
}

/// `SOURCE:TARGET[:ro|:rw]`
pub fn parse_volume(value: &str) -> Result<VolumeBinding> {
    let parts: Vec<&str> = value.split(':').collect();
    let (source, target, read_only) = match parts.as_slice() {
        [source, target] => (*source, *target, false),
        [source, target, "ro"] => (*source, *target, true),
        [source, target, "rw"] => (*source, *target, false),
        _ => bail!("Invalid --volume value '{}', expected SOURCE:TARGET[:ro]", value),
    };
    if source.is_empty() || target.is_empty() {
        bail!("Invalid --volume value '{}', source and target are required", value);
    }
    Ok(VolumeBinding {
        source: source.to_string(),
        target: target.to_string(),
        read_only,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs_keeps_order() {
        let pairs = parse_pairs(
            "env",
            &["B=2".to_string(), "A=1".to_string(), "EMPTY=".to_string()],
        )
        .unwrap();
        let keys: Vec<&str> = pairs.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["B", "A", "EMPTY"]);
        assert!(parse_pairs("label", &["novalue".to_string()]).is_err());
        assert!(parse_pairs("label", &["=x".to_string()]).is_err());
    }

    #[test]
    fn test_parse_publish() {
        assert_eq!(parse_publish("8080:80").unwrap(), PortMapping::new(8080, 80));

        let mapping = parse_publish("127.0.0.1:5353:53/udp").unwrap();
        assert_eq!(mapping.host_ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(mapping.host_port, 5353);
        assert_eq!(mapping.container_port, 53);
        assert_eq!(mapping.protocol, Protocol::Udp);

        assert!(parse_publish("80").is_err());
        assert!(parse_publish("http:80").is_err());
        assert!(parse_publish("8080:80/sctp").is_err());
    }

    #[test]
    fn test_parse_volume() {
        let binding = parse_volume("/data:/app:ro").unwrap();
        assert_eq!(binding.source, "/data");
        assert_eq!(binding.target, "/app");
        assert!(binding.read_only);

        assert!(!parse_volume("cache:/var/cache").unwrap().read_only);
        assert!(parse_volume("/data").is_err());
        assert!(parse_volume("/data:/app:rx").is_err());
        assert!(parse_volume(":/app").is_err());
    }
}
