//! Port and volume specification parsing
//!
//! Short port syntax: `[host_ip:][published:]container[/protocol]`, where
//! `published` and `container` may be ranges (`8000-8002`).
//! Short volume syntax: `[source:]target[:mode]`.

use shipyard_core::{PortMapping, Protocol, VolumeMount, VolumeSource};

/// Parse a short-syntax port specification
pub fn parse_port(spec: &str) -> Result<Vec<PortMapping>, String> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err("empty port specification".to_string());
    }

    let (addr, protocol) = match spec.rsplit_once('/') {
        Some((addr, proto)) => {
            let protocol = Protocol::parse(proto)
                .ok_or_else(|| format!("unsupported protocol '{}' in '{}'", proto, spec))?;
            (addr, protocol)
        }
        None => (spec, Protocol::Tcp),
    };

    let parts: Vec<&str> = addr.rsplitn(3, ':').collect();
    let (host_ip, published, container) = match parts.as_slice() {
        [container] => (None, None, *container),
        [container, published] => (None, Some(*published), *container),
        [container, published, ip] => (Some(*ip), Some(*published), *container),
        _ => return Err(format!("invalid port specification '{}'", spec)),
    };

    let container_range = parse_range(container)
        .ok_or_else(|| format!("invalid container port '{}' in '{}'", container, spec))?;

    let published_range = match published {
        Some(p) if !p.is_empty() => Some(
            parse_range(p).ok_or_else(|| format!("invalid published port '{}' in '{}'", p, spec))?,
        ),
        _ => None,
    };

    if let Some((start, end)) = published_range
        && end - start != container_range.1 - container_range.0
    {
        return Err(format!("mismatched port ranges in '{}'", spec));
    }

    let host_ip = host_ip.filter(|ip| !ip.is_empty()).map(str::to_string);
    let mappings = (container_range.0..=container_range.1)
        .enumerate()
        .map(|(offset, container_port)| PortMapping {
            container_port,
            published: published_range.map(|(start, _)| start + offset as u16),
            host_ip: host_ip.clone(),
            protocol,
        })
        .collect();

    Ok(mappings)
}

fn parse_range(value: &str) -> Option<(u16, u16)> {
    let (start, end) = match value.split_once('-') {
        Some((start, end)) => (start.trim().parse().ok()?, end.trim().parse().ok()?),
        None => {
            let port = value.trim().parse().ok()?;
            (port, port)
        }
    };
    if start == 0 || end < start {
        return None;
    }
    Some((start, end))
}

/// Key used to override a port from an earlier file
pub fn port_key(spec: &str) -> Option<(u16, Protocol)> {
    parse_port(spec)
        .ok()
        .and_then(|ports| ports.first().map(|p| (p.container_port, p.protocol)))
}

/// Parse a short-syntax volume specification
pub fn parse_volume(spec: &str) -> Result<VolumeMount, String> {
    let spec = spec.trim();
    let parts: Vec<&str> = spec.split(':').collect();

    let (source, target, mode) = match parts.as_slice() {
        [target] => (None, *target, None),
        [source, target] => (Some(*source), *target, None),
        [source, target, mode] => (Some(*source), *target, Some(*mode)),
        _ => return Err(format!("invalid volume specification '{}'", spec)),
    };

    if target.is_empty() {
        return Err(format!("volume '{}' has no container path", spec));
    }
    if !target.starts_with('/') {
        return Err(format!("container path '{}' must be absolute", target));
    }

    let read_only = match mode {
        None => false,
        Some(mode) => {
            let flags: Vec<&str> = mode.split(',').collect();
            if let Some(bad) = flags
                .iter()
                .find(|f| !matches!(**f, "ro" | "rw" | "z" | "Z" | "nocopy" | "cached" | "delegated" | "consistent"))
            {
                return Err(format!("unknown volume mode '{}' in '{}'", bad, spec));
            }
            flags.contains(&"ro")
        }
    };

    Ok(VolumeMount {
        source: source.map_or(VolumeSource::Anonymous, volume_source),
        target: target.to_string(),
        read_only,
    })
}

/// Classify a volume source as a host path or a named volume
pub fn volume_source(source: &str) -> VolumeSource {
    if source.is_empty() {
        VolumeSource::Anonymous
    } else if source.starts_with('/') || source.starts_with('.') || source.starts_with('~') {
        VolumeSource::Host(source.to_string())
    } else {
        VolumeSource::Named(source.to_string())
    }
}

/// Key used to override a volume from an earlier file
pub fn volume_key(spec: &str) -> Option<String> {
    parse_volume(spec).ok().map(|v| v.target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_only() {
        let ports = parse_port("8080").unwrap();
        assert_eq!(ports, vec![PortMapping::new(8080)]);
    }

    #[test]
    fn test_published_and_protocol() {
        let ports = parse_port("80:8080/tcp").unwrap();
        assert_eq!(ports, vec![PortMapping::new(8080).published(80)]);

        let ports = parse_port("53:53/udp").unwrap();
        assert_eq!(ports[0].protocol, Protocol::Udp);
    }

    #[test]
    fn test_host_ip() {
        let ports = parse_port("127.0.0.1:80:8080").unwrap();
        assert_eq!(ports[0].host_ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(ports[0].published, Some(80));

        let ports = parse_port("127.0.0.1::5000").unwrap();
        assert_eq!(ports[0].published, None);
        assert_eq!(ports[0].container_port, 5000);
    }

    #[test]
    fn test_ranges() {
        let ports = parse_port("9090-9091:8080-8081").unwrap();
        assert_eq!(
            ports,
            vec![
                PortMapping::new(8080).published(9090),
                PortMapping::new(8081).published(9091),
            ]
        );

        assert_eq!(parse_port("3000-3002").unwrap().len(), 3);
        assert!(parse_port("9090-9092:8080-8081").is_err());
    }

    #[test]
    fn test_invalid_ports() {
        assert!(parse_port("").is_err());
        assert!(parse_port("http").is_err());
        assert!(parse_port("80:8080/sctp").is_err());
        assert!(parse_port("0").is_err());
        assert!(parse_port("70000").is_err());
    }

    #[test]
    fn test_port_key() {
        assert_eq!(port_key("80:8080/udp"), Some((8080, Protocol::Udp)));
        assert_eq!(port_key("nonsense"), None);
    }

    #[test]
    fn test_volumes() {
        assert_eq!(parse_volume("/data").unwrap(), VolumeMount::anonymous("/data"));
        assert_eq!(
            parse_volume("db-data:/var/lib/db").unwrap(),
            VolumeMount::named("db-data", "/var/lib/db")
        );
        assert_eq!(
            parse_volume("./conf:/etc/app:ro").unwrap(),
            VolumeMount::host("./conf", "/etc/app").read_only()
        );
        assert!(!parse_volume("/src:/app:rw,z").unwrap().read_only);
    }

    #[test]
    fn test_invalid_volumes() {
        assert!(parse_volume("data:relative").is_err());
        assert!(parse_volume("a:/b:bogus").is_err());
        assert!(parse_volume("a:/b:ro:x").is_err());
    }

    #[test]
    fn test_volume_key() {
        assert_eq!(volume_key("data:/data:ro"), Some("/data".to_string()));
    }
}
