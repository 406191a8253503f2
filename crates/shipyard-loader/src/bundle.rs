//! Distributed application bundle (DAB) loader
//!
//! A bundle is a JSON document:
//!
//! ```json
//! {
//!   "Version": "0.1",
//!   "Services": {
//!     "web": { "Image": "nginx@sha256:...", "Ports": [{ "Protocol": "tcp", "Port": 80 }] }
//!   }
//! }
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use shipyard_core::{
    Application, ConversionWarning, CoreError, PortMapping, Protocol, Result, ServiceConfig, Warnings,
};

use crate::{app_name_from_path, read_input};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Bundle {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    services: BTreeMap<String, BundleService>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct BundleService {
    image: Option<String>,
    command: Vec<String>,
    args: Vec<String>,
    env: Vec<String>,
    labels: BTreeMap<String, String>,
    ports: Vec<BundlePort>,
    working_dir: Option<String>,
    user: Option<String>,
    networks: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BundlePort {
    #[serde(default)]
    protocol: Option<String>,
    port: u16,
}

/// Loads bundle files
#[derive(Debug, Clone, Copy, Default)]
pub struct BundleLoader;

impl BundleLoader {
    pub fn new() -> Self {
        Self
    }

    pub fn load_file(&self, path: &Path, warnings: &mut Warnings) -> Result<Application> {
        let content = read_input(path)?;
        self.load_str(
            &app_name_from_path(path),
            &content,
            &path.display().to_string(),
            warnings,
        )
    }

    pub fn load_str(
        &self,
        app_name: &str,
        content: &str,
        source: &str,
        warnings: &mut Warnings,
    ) -> Result<Application> {
        let bundle: Bundle = serde_json::from_str(content).map_err(|e| {
            if e.is_data() {
                CoreError::schema(source, e.to_string())
            } else {
                CoreError::format(source, e.to_string())
            }
        })?;

        if let Some(version) = &bundle.version {
            tracing::debug!("Bundle version {}", version);
        }

        let mut app = Application::new(app_name);
        for (name, raw) in bundle.services {
            let service = convert_service(&name, raw, source, warnings)?;
            app.services.insert(name, service);
        }

        app.validate(source)?;
        Ok(app)
    }
}

fn convert_service(
    name: &str,
    raw: BundleService,
    source: &str,
    warnings: &mut Warnings,
) -> Result<ServiceConfig> {
    let image = raw
        .image
        .filter(|i| !i.trim().is_empty())
        .ok_or_else(|| CoreError::schema(source, format!("service '{}': no image specified", name)))?;

    let mut service = ServiceConfig::new(image);
    service.command = raw.command;
    service.args = raw.args;
    service.labels = raw.labels;
    service.working_dir = raw.working_dir.filter(|d| !d.is_empty());
    service.user = raw.user.filter(|u| !u.is_empty());

    for entry in raw.env {
        let (key, value) = entry.split_once('=').unwrap_or((entry.as_str(), ""));
        service.set_env(key, value);
    }

    for port in raw.ports {
        let protocol = match port.protocol.as_deref() {
            None | Some("") => Protocol::Tcp,
            Some(p) => Protocol::parse(p).ok_or_else(|| {
                CoreError::schema(
                    source,
                    format!("service '{}': unsupported protocol '{}'", name, p),
                )
            })?,
        };
        service
            .ports
            .push(PortMapping::new(port.port).published(port.port).protocol(protocol));
    }

    if !raw.networks.is_empty() {
        warnings.warn(ConversionWarning::for_service(
            name,
            "Networks",
            format!("networks are not supported, ignored ({})", raw.networks.join(", ")),
        ))?;
    }

    Ok(service)
}
