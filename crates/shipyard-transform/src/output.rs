//! Serialization of transformed objects

use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::json;
use shipyard_core::{ConvertOptions, CoreError, OutputFormat, OutputTarget, Result};

use crate::objects::Resource;

/// Wrap objects in a `v1` `List`
pub fn to_list(objects: &[Resource]) -> Result<serde_json::Value> {
    let items = objects
        .iter()
        .map(Resource::to_value)
        .collect::<serde_json::Result<Vec<_>>>()
        .map_err(serialization_error)?;

    Ok(json!({
        "apiVersion": "v1",
        "kind": "List",
        "items": items,
    }))
}

/// Render all objects as one `List` document
pub fn render(objects: &[Resource], format: OutputFormat) -> Result<String> {
    serialize(&to_list(objects)?, format)
}

/// Render a single object
pub fn render_object(object: &Resource, format: OutputFormat) -> Result<String> {
    serialize(&object.to_value().map_err(serialization_error)?, format)
}

fn serialize(value: &serde_json::Value, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)
            .map(|s| s + "\n")
            .map_err(serialization_error),
        OutputFormat::Yaml => serde_yaml::to_string(value).map_err(serialization_error),
    }
}

fn serialization_error(e: impl std::fmt::Display) -> CoreError {
    CoreError::Io(std::io::Error::other(format!("failed to serialize objects: {}", e)))
}

/// Write objects where `options` says, relative to `dir`
///
/// Returns the files written (empty for stdout).
pub fn write(objects: &[Resource], options: &ConvertOptions, dir: &Path) -> Result<Vec<PathBuf>> {
    match options.output_target() {
        OutputTarget::Stdout => {
            let rendered = render(objects, options.format)?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            stdout.flush()?;
            Ok(Vec::new())
        }
        OutputTarget::File(path) => {
            let path = dir.join(path);
            write_file(&path, &render(objects, options.format)?)?;
            Ok(vec![path])
        }
        OutputTarget::Files => write_files(objects, options.format, dir),
        OutputTarget::Cluster => Err(CoreError::configuration(
            "objects submitted to a cluster are not written to disk",
        )),
    }
}

/// One file per object, named `<name>-<kind>.<ext>`
pub fn write_files(objects: &[Resource], format: OutputFormat, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(objects.len());
    for object in objects {
        let path = dir.join(format!("{}.{}", object.file_stem(), format.extension()));
        write_file(&path, &render_object(object, format)?)?;
        written.push(path);
    }
    Ok(written)
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| CoreError::file(parent.display().to_string(), e))?;
    }
    std::fs::write(path, content).map_err(|e| CoreError::file(path.display().to_string(), e))?;
    tracing::debug!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::Service;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use tempfile::TempDir;

    fn objects() -> Vec<Resource> {
        ["db", "web"]
            .iter()
            .map(|name| {
                Resource::Service(Service {
                    metadata: ObjectMeta {
                        name: Some(name.to_string()),
                        ..Default::default()
                    },
                    ..Default::default()
                })
            })
            .collect()
    }

    #[test]
    fn test_render_list_json() {
        let rendered = render(&objects(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["kind"], "List");
        assert_eq!(value["apiVersion"], "v1");
        assert_eq!(value["items"][1]["metadata"]["name"], "web");
        assert!(rendered.ends_with('\n'));
    }

    #[test]
    fn test_render_list_yaml() {
        let rendered = render(&objects(), OutputFormat::Yaml).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&rendered).unwrap();
        assert_eq!(value["kind"].as_str(), Some("List"));
        assert_eq!(value["items"][0]["kind"].as_str(), Some("Service"));
    }

    #[test]
    fn test_write_files() {
        let dir = TempDir::new().unwrap();
        let written = write_files(&objects(), OutputFormat::Yaml, dir.path()).unwrap();
        assert_eq!(
            written,
            vec![
                dir.path().join("db-service.yaml"),
                dir.path().join("web-service.yaml"),
            ]
        );
        let content = std::fs::read_to_string(&written[1]).unwrap();
        assert!(content.contains("name: web"));
    }

    #[test]
    fn test_write_single_file() {
        let dir = TempDir::new().unwrap();
        let options = ConvertOptions {
            out_file: Some(PathBuf::from("out/all.json")),
            ..Default::default()
        };
        let written = write(&objects(), &options, dir.path()).unwrap();
        assert_eq!(written, vec![dir.path().join("out/all.json")]);

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&written[0]).unwrap()).unwrap();
        assert_eq!(value["items"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_cluster_target_not_written() {
        let options = ConvertOptions {
            submit: true,
            ..Default::default()
        };
        let dir = TempDir::new().unwrap();
        assert!(write(&objects(), &options, dir.path()).is_err());
    }
}
