//! Response normalization from engine JSON into the domain model
//!
//! Engines disagree on shape: some print a JSON array of nested records
//! (`configuration.id`, `configuration.image.reference`), others print one
//! flat object per line (`ID`, `Names`, `State`, label and port summaries as
//! strings). Each field is therefore looked up along a list of candidate
//! paths and coerced into the domain type.
//!
//! Normalization never fails. A record that is not an object, or that lacks
//! its identity field, degrades to defaults (empty id, `Unknown` status) and
//! is logged at warn level; the rest of the list is unaffected.

use crate::model::{
    Container, ContainerStatus, Image, Ipam, IpamConfig, Mount, MountType, Network, PortMapping,
    Protocol, Resource, Volume,
};
use bytesize::ByteSize;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

const SIZE_UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

/// Port summary entry such as `0.0.0.0:8080->80/tcp` or `:::8080->80/tcp`
static PORT_SUMMARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?P<ip>.*):)?(?P<host>\d+)->(?P<container>\d+)/(?P<proto>[a-z]+)$")
        .expect("port summary pattern is valid")
});

/// Map a raw engine status onto [`ContainerStatus`], case-insensitively.
/// Unrecognized or absent values become `Unknown`.
pub fn normalize_status(raw: Option<&str>) -> ContainerStatus {
    match raw.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("running") => ContainerStatus::Running,
        Some("stopped") | Some("exited") => ContainerStatus::Stopped,
        Some("created") => ContainerStatus::Created,
        Some("paused") => ContainerStatus::Paused,
        _ => ContainerStatus::Unknown,
    }
}

/// Split an image reference into repository and tag.
///
/// A `:` only separates the tag when it comes after the last `/`; a colon
/// before that belongs to a registry port. Without a tag the tag is
/// `latest`. `docker.io/library/` and `docker.io/` prefixes are removed from
/// the repository for display.
pub fn decompose_reference(reference: &str) -> (String, String) {
    let last_colon = reference.rfind(':');
    let last_slash = reference.rfind('/');

    let (repository, tag) = match (last_colon, last_slash) {
        (Some(colon), Some(slash)) if colon > slash => {
            (&reference[..colon], &reference[colon + 1..])
        }
        (Some(colon), None) => (&reference[..colon], &reference[colon + 1..]),
        _ => (reference, "latest"),
    };

    let repository = repository
        .strip_prefix("docker.io/library/")
        .or_else(|| repository.strip_prefix("docker.io/"))
        .unwrap_or(repository);

    (repository.to_string(), tag.to_string())
}

/// Reference decomposition that also separates a trailing `@digest`
fn decompose_with_digest(reference: &str) -> (String, String, Option<String>) {
    match reference.split_once('@') {
        Some((name, digest)) => {
            let (repository, tag) = decompose_reference(name);
            (repository, tag, Some(digest.to_string()))
        }
        None => {
            let (repository, tag) = decompose_reference(reference);
            (repository, tag, None)
        }
    }
}

/// Format a byte count in the largest IEC unit (up to TiB) with one decimal.
/// Zero is exactly `"0 B"`.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    // compare the rounded value so 1048575 bytes reads 1.0 MiB, not 1024.0 KiB
    while (value * 10.0).round() / 10.0 >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, SIZE_UNITS[unit])
}

/// Recover a byte count from a human size string such as `187MB` or `1.2 GiB`
pub fn parse_human_size(text: &str) -> Option<u64> {
    text.trim().parse::<ByteSize>().ok().map(|size| size.as_u64())
}

/// Parse an engine timestamp: RFC 3339, `YYYY-MM-DD HH:MM:SS +ZZZZ ZZZ`,
/// or epoch seconds (milliseconds when the value is too large for seconds).
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(from_epoch),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.abs() >= 100_000_000_000 {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    }
}

fn parse_timestamp_str(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    // `2024-01-02 10:00:00 +0000 UTC`: drop the trailing zone name
    let without_zone_name = text.split_whitespace().take(3).collect::<Vec<_>>().join(" ");
    if let Ok(parsed) = DateTime::parse_from_str(&without_zone_name, "%Y-%m-%d %H:%M:%S %z") {
        return Some(parsed.with_timezone(&Utc));
    }
    text.parse::<i64>().ok().and_then(from_epoch)
}

/// Candidate-path field access over one raw record
#[derive(Clone, Copy)]
struct Record<'a>(&'a Value);

impl<'a> Record<'a> {
    fn get(&self, path: &str) -> Option<&'a Value> {
        path.split('.')
            .try_fold(self.0, |value, key| value.get(key))
            .filter(|value| !value.is_null())
    }

    fn first(&self, paths: &[&str]) -> Option<&'a Value> {
        paths.iter().find_map(|path| self.get(path))
    }

    fn str(&self, paths: &[&str]) -> Option<&'a str> {
        paths
            .iter()
            .find_map(|path| self.get(path).and_then(Value::as_str))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn string(&self, paths: &[&str]) -> Option<String> {
        self.str(paths).map(str::to_string)
    }

    fn timestamp(&self, paths: &[&str]) -> Option<DateTime<Utc>> {
        paths
            .iter()
            .find_map(|path| self.get(path).and_then(parse_timestamp))
    }

    fn flag(&self, paths: &[&str]) -> Option<bool> {
        paths.iter().find_map(|path| match self.get(path)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        })
    }
}

fn as_port(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn labels_from(value: &Value) -> Option<HashMap<String, String>> {
    match value {
        Value::Object(map) => Some(
            map.iter()
                .map(|(k, v)| {
                    let v = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), v)
                })
                .collect(),
        ),
        // `key=value,key2=value2` summaries
        Value::String(summary) => Some(
            summary
                .split(',')
                .filter(|entry| !entry.trim().is_empty())
                .map(|entry| match entry.split_once('=') {
                    Some((k, v)) => (k.trim().to_string(), v.to_string()),
                    None => (entry.trim().to_string(), String::new()),
                })
                .collect(),
        ),
        _ => None,
    }
}

fn port_from_object(entry: &Value) -> Option<PortMapping> {
    let record = Record(entry);
    let host_port = ["hostPort", "HostPort", "PublicPort"]
        .iter()
        .find_map(|path| record.get(path).and_then(as_port))?;
    let container_port = ["containerPort", "ContainerPort", "PrivatePort"]
        .iter()
        .find_map(|path| record.get(path).and_then(as_port))?;
    let protocol = record
        .str(&["proto", "protocol", "Protocol", "Type"])
        .and_then(|p| p.parse::<Protocol>().ok())
        .unwrap_or_default();

    Some(PortMapping {
        host_ip: record.string(&["hostAddress", "hostIp", "HostIp", "IP"]),
        host_port,
        container_port,
        protocol,
    })
}

fn port_from_summary(entry: &str) -> Option<PortMapping> {
    let captures = PORT_SUMMARY.captures(entry.trim())?;
    Some(PortMapping {
        host_ip: captures
            .name("ip")
            .map(|m| m.as_str().to_string())
            .filter(|ip| !ip.is_empty()),
        host_port: captures["host"].parse().ok()?,
        container_port: captures["container"].parse().ok()?,
        protocol: captures["proto"].parse().unwrap_or_default(),
    })
}

fn ports_from(value: &Value) -> Option<Vec<PortMapping>> {
    match value {
        Value::Array(entries) => Some(entries.iter().filter_map(port_from_object).collect()),
        // Entries without `->` are exposed but unpublished and are skipped
        Value::String(summary) => Some(summary.split(',').filter_map(port_from_summary).collect()),
        _ => None,
    }
}

fn mount_type_from(value: &Value) -> Option<MountType> {
    match value {
        Value::String(s) => s.parse().ok(),
        // `{"volume": {...}}` style tagged objects
        Value::Object(map) if map.len() == 1 => map.keys().next()?.parse().ok(),
        _ => None,
    }
}

fn mount_from(entry: &Value) -> Option<Mount> {
    let record = Record(entry);
    let mount_type = record
        .first(&["type", "Type"])
        .and_then(mount_type_from)?;
    let target = record.string(&["destination", "Destination", "target", "Target"])?;
    let read_only = match record.flag(&["readonly", "readOnly", "ReadOnly"]) {
        Some(read_only) => read_only,
        None => record.flag(&["RW"]).map(|rw| !rw).unwrap_or(false),
    };

    Some(Mount {
        mount_type,
        source: record
            .string(&["source", "Source", "Name", "name"])
            .unwrap_or_default(),
        target,
        read_only,
    })
}

fn mounts_from(value: &Value) -> Option<Vec<Mount>> {
    value
        .as_array()
        .map(|entries| entries.iter().filter_map(mount_from).collect())
}

fn container_name(record: Record<'_>) -> Option<String> {
    let name = match record.first(&["Names", "Name", "names", "name"])? {
        Value::String(s) => s.split(',').next().map(str::to_string),
        Value::Array(names) => names.iter().find_map(Value::as_str).map(str::to_string),
        _ => None,
    }?;
    let name = name.trim().trim_start_matches('/').to_string();
    (!name.is_empty()).then_some(name)
}

fn size_bytes(record: Record<'_>) -> u64 {
    let value = record.first(&["descriptor.size", "fullSize", "Size", "size", "VirtualSize"]);
    match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or_default(),
        Some(Value::String(s)) => parse_human_size(s).unwrap_or_default(),
        _ => 0,
    }
}

/// Conversion from one raw list record
pub trait Normalize: Resource {
    fn from_record(record: &Value) -> Self;
}

impl Normalize for Container {
    fn from_record(value: &Value) -> Self {
        let record = Record(value);
        let id = record
            .string(&["configuration.id", "Id", "ID", "id"])
            .unwrap_or_default();
        let name = container_name(record).unwrap_or_else(|| id.clone());

        Container {
            name,
            image: record
                .string(&[
                    "configuration.image.reference",
                    "Image",
                    "image.reference",
                    "image",
                    "Config.Image",
                ])
                .unwrap_or_default(),
            status: normalize_status(record.str(&["status", "State", "state", "State.Status"])),
            created: record.timestamp(&["configuration.createdAt", "CreatedAt", "Created", "created"]),
            ports: record
                .first(&["configuration.publishedPorts", "Ports", "ports", "publishedPorts"])
                .and_then(ports_from),
            labels: record
                .first(&["configuration.labels", "Labels", "labels", "Config.Labels"])
                .and_then(labels_from),
            mounts: record
                .first(&["configuration.mounts", "Mounts", "mounts"])
                .and_then(mounts_from),
            id,
        }
    }
}

impl Normalize for Image {
    fn from_record(value: &Value) -> Self {
        let record = Record(value);

        let reference = match (
            record.str(&["Repository", "repository"]),
            record.str(&["Tag", "tag"]),
        ) {
            (Some(repository), Some(tag)) => Some(format!("{}:{}", repository, tag)),
            (Some(repository), None) => Some(repository.to_string()),
            _ => record.string(&["reference", "name", "Reference"]),
        };
        let (repository, tag, reference_digest) = reference
            .as_deref()
            .map(decompose_with_digest)
            .unwrap_or_default();

        let digest = record
            .string(&["descriptor.digest", "Digest", "digest"])
            .filter(|d| d != "<none>")
            .or(reference_digest);
        let id = record
            .string(&["ID", "Id", "id"])
            .or_else(|| digest.clone())
            .unwrap_or_default();
        let size_bytes = size_bytes(record);

        Image {
            id,
            repository,
            tag,
            digest,
            size: format_size(size_bytes),
            size_bytes,
            created: record.timestamp(&["CreatedAt", "Created", "created", "createdAt"]),
            labels: record
                .first(&["Labels", "labels", "Config.Labels", "config.labels"])
                .and_then(labels_from),
        }
    }
}

impl Normalize for Volume {
    fn from_record(value: &Value) -> Self {
        let record = Record(value);
        Volume {
            name: record.string(&["Name", "name"]).unwrap_or_default(),
            driver: record.string(&["Driver", "driver"]),
            mountpoint: record.string(&["Mountpoint", "mountpoint", "source"]),
            created: record.timestamp(&["CreatedAt", "createdAt", "created"]),
            scope: record.string(&["Scope", "scope"]),
            labels: record.first(&["Labels", "labels"]).and_then(labels_from),
        }
    }
}

fn ipam_from(record: Record<'_>) -> Option<Ipam> {
    if let Some(ipam) = record.first(&["IPAM", "ipam"]) {
        let ipam = Record(ipam);
        let config = ipam
            .first(&["Config", "config"])
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| {
                        let entry = Record(entry);
                        IpamConfig {
                            subnet: entry.string(&["Subnet", "subnet"]),
                            gateway: entry.string(&["Gateway", "gateway"]),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();
        return Some(Ipam {
            driver: ipam.string(&["Driver", "driver"]),
            config,
        });
    }

    // Engines that only report the allocated address of the network
    let subnet = record.string(&["status.address", "status.subnet"]);
    let gateway = record.string(&["status.gateway"]);
    (subnet.is_some() || gateway.is_some()).then(|| Ipam {
        driver: None,
        config: vec![IpamConfig { subnet, gateway }],
    })
}

impl Normalize for Network {
    fn from_record(value: &Value) -> Self {
        let record = Record(value);
        let id = record.string(&["ID", "Id", "id"]);
        let name = record.string(&["Name", "name"]);

        Network {
            id: id.clone().or_else(|| name.clone()).unwrap_or_default(),
            name: name.or(id).unwrap_or_default(),
            driver: record.string(&["Driver", "driver", "config.mode"]),
            scope: record.string(&["Scope", "scope"]),
            internal: record.flag(&["Internal", "internal"]),
            ipam: ipam_from(record),
            labels: record
                .first(&["Labels", "labels", "config.labels"])
                .and_then(labels_from),
        }
    }
}

/// Normalize a decoded list response.
///
/// `null` is an empty list and a lone object is a one-element list. Every
/// array element yields exactly one entity, so a malformed record never
/// shortens the list.
pub fn normalize_list<R: Normalize>(value: &Value) -> Vec<R> {
    let records: &[Value] = match value {
        Value::Null => &[],
        Value::Array(records) => records,
        Value::Object(_) => std::slice::from_ref(value),
        other => {
            warn!(kind = %R::KIND, value = %other, "Unexpected list payload, treating as empty");
            &[]
        }
    };

    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            if !record.is_object() {
                warn!(kind = %R::KIND, index, "Malformed record, using defaults");
            }
            let entity = R::from_record(record);
            if entity.key().is_empty() {
                warn!(kind = %R::KIND, index, "Record has no identity field");
            }
            entity
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_mapping() {
        let cases = [
            ("Running", ContainerStatus::Running),
            ("RUNNING", ContainerStatus::Running),
            ("exited", ContainerStatus::Stopped),
            ("stopped", ContainerStatus::Stopped),
            ("created", ContainerStatus::Created),
            ("paused", ContainerStatus::Paused),
            ("", ContainerStatus::Unknown),
            ("restarting", ContainerStatus::Unknown),
        ];
        for (raw, expected) in cases {
            assert_eq!(normalize_status(Some(raw)), expected, "raw status {:?}", raw);
        }
        assert_eq!(normalize_status(None), ContainerStatus::Unknown);
    }

    #[test]
    fn test_decompose_reference() {
        let cases = [
            ("nginx:latest", ("nginx", "latest")),
            ("docker.io/library/nginx:1.25", ("nginx", "1.25")),
            ("myregistry.local:5000/app:v2", ("myregistry.local:5000/app", "v2")),
            ("myimage", ("myimage", "latest")),
            ("myregistry.local:5000/app", ("myregistry.local:5000/app", "latest")),
            ("docker.io/bitnami/redis:7", ("bitnami/redis", "7")),
            ("ghcr.io/org/tool:1.0.0", ("ghcr.io/org/tool", "1.0.0")),
        ];
        for (reference, (repository, tag)) in cases {
            assert_eq!(
                decompose_reference(reference),
                (repository.to_string(), tag.to_string()),
                "reference {}",
                reference
            );
        }
    }

    #[test]
    fn test_decompose_with_digest() {
        let (repository, tag, digest) = decompose_with_digest("alpine:3.19@sha256:abc");
        assert_eq!(repository, "alpine");
        assert_eq!(tag, "3.19");
        assert_eq!(digest.as_deref(), Some("sha256:abc"));
    }

    #[test]
    fn test_format_size_exact_values() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512.0 B");
        assert_eq!(format_size(1024), "1.0 KiB");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(1_048_575), "1.0 MiB");
        assert_eq!(format_size(1_048_535), "1.0 MiB");
        assert_eq!(format_size(1_048_524), "1023.9 KiB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MiB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GiB");
        assert_eq!(format_size(2048 * 1024_u64.pow(4)), "2048.0 TiB");
    }

    #[test]
    fn test_format_size_round_trips_within_rounding() {
        let samples = [1_u64, 999, 1023, 1025, 65_535, 1_000_000, 187_000_000, 5_368_709_120, u64::MAX / 3];
        for bytes in samples {
            let formatted = format_size(bytes);
            let (number, unit) = formatted.split_once(' ').unwrap();
            let exponent = SIZE_UNITS.iter().position(|u| *u == unit).unwrap() as i32;
            let scale = 1024_f64.powi(exponent);
            let recovered = number.parse::<f64>().unwrap() * scale;
            assert!(
                (recovered - bytes as f64).abs() <= 0.05 * scale + f64::EPSILON * bytes as f64,
                "{} formatted as {}",
                bytes,
                formatted
            );
        }
    }

    #[test]
    fn test_parse_human_size() {
        assert_eq!(parse_human_size("187MB"), Some(187_000_000));
        assert_eq!(parse_human_size("1 KiB"), Some(1024));
        assert_eq!(parse_human_size("not a size"), None);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = DateTime::parse_from_rfc3339("2024-01-02T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(parse_timestamp(&json!("2024-01-02T10:00:00Z")), Some(expected));
        assert_eq!(
            parse_timestamp(&json!("2024-01-02 10:00:00 +0000 UTC")),
            Some(expected)
        );
        assert_eq!(parse_timestamp(&json!(1704189600)), Some(expected));
        assert_eq!(parse_timestamp(&json!(1704189600000_i64)), Some(expected));
        assert_eq!(parse_timestamp(&json!("yesterday")), None);
        assert_eq!(parse_timestamp(&json!(true)), None);
    }

    #[test]
    fn test_container_from_flat_record() {
        let record = json!({
            "ID": "3f1a2b",
            "Names": "web",
            "Image": "nginx:1.25",
            "State": "running",
            "Status": "Up 2 hours",
            "CreatedAt": "2024-01-02 10:00:00 +0000 UTC",
            "Ports": "0.0.0.0:8080->80/tcp, :::8080->80/tcp, 443/tcp",
            "Labels": "tier=web,owner=ops"
        });
        let container = Container::from_record(&record);

        assert_eq!(container.id, "3f1a2b");
        assert_eq!(container.name, "web");
        assert_eq!(container.image, "nginx:1.25");
        assert_eq!(container.status, ContainerStatus::Running);
        assert!(container.created.is_some());

        let ports = container.ports.unwrap();
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[0].host_ip.as_deref(), Some("0.0.0.0"));
        assert_eq!(ports[0].host_port, 8080);
        assert_eq!(ports[0].container_port, 80);
        assert_eq!(ports[1].host_ip.as_deref(), Some("::"));

        let labels = container.labels.unwrap();
        assert_eq!(labels.get("tier").map(String::as_str), Some("web"));
        assert_eq!(labels.len(), 2);
        assert!(container.mounts.is_none());
    }

    #[test]
    fn test_container_from_nested_record() {
        let record = json!({
            "status": "stopped",
            "configuration": {
                "id": "buildkit",
                "image": {"reference": "ghcr.io/apple/buildkit:0.1"},
                "labels": {"managed": "true"},
                "publishedPorts": [
                    {"hostAddress": "127.0.0.1", "hostPort": 5432, "containerPort": 5432, "proto": "udp"}
                ],
                "mounts": [
                    {"type": {"volume": {}}, "source": "pgdata", "destination": "/var/lib/pg", "readonly": true},
                    {"type": "weird", "destination": "/x"}
                ]
            }
        });
        let container = Container::from_record(&record);

        assert_eq!(container.id, "buildkit");
        assert_eq!(container.name, "buildkit");
        assert_eq!(container.image, "ghcr.io/apple/buildkit:0.1");
        assert_eq!(container.status, ContainerStatus::Stopped);
        assert_eq!(
            container.ports.unwrap(),
            vec![PortMapping {
                host_ip: Some("127.0.0.1".to_string()),
                host_port: 5432,
                container_port: 5432,
                protocol: Protocol::Udp,
            }]
        );
        let mounts = container.mounts.unwrap();
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].mount_type, MountType::Volume);
        assert!(mounts[0].read_only);
    }

    #[test]
    fn test_container_inspect_style_mounts() {
        let record = json!({
            "Id": "abc",
            "Name": "/db",
            "State": {"Status": "paused"},
            "Mounts": [{"Type": "bind", "Source": "/srv", "Destination": "/data", "RW": false}]
        });
        let container = Container::from_record(&record);
        assert_eq!(container.name, "db");
        assert_eq!(container.status, ContainerStatus::Paused);
        let mounts = container.mounts.unwrap();
        assert_eq!(mounts[0].mount_type, MountType::Bind);
        assert_eq!(mounts[0].source, "/srv");
        assert!(mounts[0].read_only);
    }

    #[test]
    fn test_image_from_flat_record() {
        let record = json!({
            "ID": "sha256:0d3f",
            "Repository": "docker.io/library/postgres",
            "Tag": "16",
            "Digest": "<none>",
            "Size": "431MB",
            "CreatedAt": "2024-03-01 08:30:00 +0000 UTC"
        });
        let image = Image::from_record(&record);
        assert_eq!(image.id, "sha256:0d3f");
        assert_eq!(image.repository, "postgres");
        assert_eq!(image.tag, "16");
        assert_eq!(image.digest, None);
        assert_eq!(image.size_bytes, 431_000_000);
        assert_eq!(image.size, "411.0 MiB");
    }

    #[test]
    fn test_image_from_reference_record() {
        let record = json!({
            "reference": "myregistry.local:5000/app:v2",
            "descriptor": {"digest": "sha256:feed", "size": 2048}
        });
        let image = Image::from_record(&record);
        assert_eq!(image.id, "sha256:feed");
        assert_eq!(image.digest.as_deref(), Some("sha256:feed"));
        assert_eq!(image.repository, "myregistry.local:5000/app");
        assert_eq!(image.tag, "v2");
        assert_eq!(image.size, "2.0 KiB");
        assert!(image.labels.is_none());
    }

    #[test]
    fn test_volume_optional_fields_stay_absent() {
        let volume = Volume::from_record(&json!({"Name": "cache"}));
        assert_eq!(volume.name, "cache");
        assert!(volume.driver.is_none());
        assert!(volume.labels.is_none());
        assert_eq!(volume.display_driver(), "local");

        let volume = Volume::from_record(&json!({
            "Name": "pgdata",
            "Driver": "local",
            "Mountpoint": "/var/lib/docker/volumes/pgdata/_data",
            "Scope": "local",
            "Labels": ""
        }));
        assert_eq!(volume.scope.as_deref(), Some("local"));
        assert_eq!(volume.labels, Some(HashMap::new()));
    }

    #[test]
    fn test_network_with_ipam() {
        let record = json!({
            "Id": "9a8b",
            "Name": "backend",
            "Driver": "bridge",
            "Internal": false,
            "IPAM": {
                "Driver": "default",
                "Config": [
                    {"Subnet": "172.20.0.0/16", "Gateway": "172.20.0.1"},
                    {"Subnet": "fd00::/64"}
                ]
            }
        });
        let network = Network::from_record(&record);
        assert_eq!(network.id, "9a8b");
        assert_eq!(network.internal, Some(false));
        let ipam = network.ipam.unwrap();
        assert_eq!(ipam.driver.as_deref(), Some("default"));
        assert_eq!(ipam.config.len(), 2);
        assert_eq!(ipam.config[1].gateway, None);
    }

    #[test]
    fn test_network_name_only_record() {
        let network = Network::from_record(&json!({
            "id": "default",
            "state": "running",
            "status": {"address": "192.168.64.0/24", "gateway": "192.168.64.1"},
            "Internal": "true"
        }));
        assert_eq!(network.id, "default");
        assert_eq!(network.name, "default");
        assert_eq!(network.internal, Some(true));
        assert_eq!(
            network.ipam.unwrap().config[0].subnet.as_deref(),
            Some("192.168.64.0/24")
        );
    }

    #[test]
    fn test_malformed_record_keeps_list_length() {
        let value = json!([
            {"ID": "a", "Names": "one", "State": "running"},
            42,
            {"ID": "c", "Names": "three", "State": "exited"}
        ]);
        let containers: Vec<Container> = normalize_list(&value);
        assert_eq!(containers.len(), 3);
        assert_eq!(containers[1].id, "");
        assert_eq!(containers[1].status, ContainerStatus::Unknown);
        assert_eq!(containers[2].status, ContainerStatus::Stopped);
    }

    #[test]
    fn test_normalize_list_shapes() {
        let empty: Vec<Volume> = normalize_list(&Value::Null);
        assert!(empty.is_empty());

        let single: Vec<Volume> = normalize_list(&json!({"Name": "solo"}));
        assert_eq!(single.len(), 1);

        let scalar: Vec<Volume> = normalize_list(&json!("oops"));
        assert!(scalar.is_empty());
    }
}
