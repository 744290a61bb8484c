//! Column-aligned text tables for resource lists

use berth_core::model::{Container, ContainerStatus, Image, Network, PortMapping, Volume};
use chrono::{DateTime, Utc};
use console::{measure_text_width, style};

/// Left-aligned table; cell widths ignore ANSI styling
#[derive(Debug)]
pub struct Table {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&'static str]) -> Self {
        Self {
            headers: headers.to_vec(),
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<String>) -> &mut Self {
        self.rows.push(cells);
        self
    }

    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.len()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(measure_text_width(cell));
            }
        }

        let mut out = String::new();
        let header: Vec<String> = self
            .headers
            .iter()
            .map(|h| style(*h).bold().to_string())
            .collect();
        push_line(&mut out, &header, &widths);
        for row in &self.rows {
            push_line(&mut out, row, &widths);
        }
        out
    }
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let last = cells.len().saturating_sub(1);
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        out.push_str(cell);
        if i < last {
            let pad = width.saturating_sub(measure_text_width(cell)) + 3;
            out.push_str(&" ".repeat(pad));
        }
    }
    out.push('\n');
}

fn created(value: Option<&DateTime<Utc>>) -> String {
    value
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn short_id(id: &str) -> String {
    let id = id.strip_prefix("sha256:").unwrap_or(id);
    id.chars().take(12).collect()
}

fn status_cell(status: ContainerStatus) -> String {
    let text = status.as_str();
    match status {
        ContainerStatus::Running => style(text).green().to_string(),
        ContainerStatus::Paused => style(text).yellow().to_string(),
        ContainerStatus::Unknown => style(text).dim().to_string(),
        _ => text.to_string(),
    }
}

fn ports_cell(ports: Option<&Vec<PortMapping>>) -> String {
    match ports {
        Some(ports) if !ports.is_empty() => ports
            .iter()
            .map(|p| {
                let host = match &p.host_ip {
                    Some(ip) => format!("{}:{}", ip, p.host_port),
                    None => p.host_port.to_string(),
                };
                format!("{}->{}/{}", host, p.container_port, p.protocol)
            })
            .collect::<Vec<_>>()
            .join(", "),
        _ => "-".to_string(),
    }
}

fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

pub fn containers(items: &[Container]) -> String {
    let mut table = Table::new(&["ID", "NAME", "IMAGE", "STATUS", "CREATED", "PORTS"]);
    for c in items {
        table.row(vec![
            short_id(&c.id),
            c.name.clone(),
            c.image.clone(),
            status_cell(c.status),
            created(c.created.as_ref()),
            ports_cell(c.ports.as_ref()),
        ]);
    }
    table.render()
}

pub fn images(items: &[Image]) -> String {
    let mut table = Table::new(&["REPOSITORY", "TAG", "ID", "SIZE", "CREATED"]);
    for i in items {
        table.row(vec![
            i.repository.clone(),
            i.tag.clone(),
            short_id(&i.id),
            i.size.clone(),
            created(i.created.as_ref()),
        ]);
    }
    table.render()
}

pub fn volumes(items: &[Volume]) -> String {
    let mut table = Table::new(&["NAME", "DRIVER", "MOUNTPOINT"]);
    for v in items {
        table.row(vec![
            v.name.clone(),
            v.display_driver().to_string(),
            or_dash(v.mountpoint.as_deref()),
        ]);
    }
    table.render()
}

pub fn networks(items: &[Network]) -> String {
    let mut table = Table::new(&["ID", "NAME", "DRIVER", "SCOPE", "SUBNET"]);
    for n in items {
        let subnet = n
            .ipam
            .as_ref()
            .and_then(|ipam| ipam.config.iter().find_map(|c| c.subnet.as_deref()));
        table.row(vec![
            short_id(&n.id),
            n.name.clone(),
            or_dash(n.driver.as_deref()),
            or_dash(n.scope.as_deref()),
            or_dash(subnet),
        ]);
    }
    table.render()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_align() {
        console::set_colors_enabled(false);
        let mut table = Table::new(&["NAME", "DRIVER"]);
        table
            .row(vec!["a".to_string(), "local".to_string()])
            .row(vec!["longer-name".to_string(), "nfs".to_string()]);
        let rendered = table.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "NAME          DRIVER");
        assert_eq!(lines[1], "a             local");
        assert_eq!(lines[2], "longer-name   nfs");
    }

    #[test]
    fn test_container_row_formatting() {
        console::set_colors_enabled(false);
        let container = Container {
            id: "0123456789abcdef".to_string(),
            name: "web".to_string(),
            image: "nginx:latest".to_string(),
            status: ContainerStatus::Running,
            ports: Some(vec![PortMapping::new(8080, 80)]),
            ..Default::default()
        };
        let rendered = containers(&[container]);
        let row = rendered.lines().nth(1).unwrap();
        assert!(row.starts_with("0123456789ab   web"));
        assert!(row.contains("running"));
        assert!(row.ends_with("8080->80/tcp"));
    }

    #[test]
    fn test_volume_without_driver_shows_local() {
        console::set_colors_enabled(false);
        let rendered = volumes(&[Volume {
            name: "data".to_string(),
            ..Default::default()
        }]);
        assert!(rendered.lines().nth(1).unwrap().contains("local"));
    }
}
