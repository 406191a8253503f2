//! Helm chart packaging
//!
//! Layout written by [`Chart::write_to`]:
//!
//! ```text
//! <dir>/<name>/
//!   Chart.yaml
//!   README.md
//!   templates/<object>-<kind>.yaml
//! ```

use std::path::{Path, PathBuf};

use minijinja::{Environment, context};
use semver::Version;
use serde::{Deserialize, Serialize};
use shipyard_core::{CoreError, OutputFormat, Result, to_dns_label};

use crate::objects::Resource;
use crate::output::render_object;

/// Chart API version written to Chart.yaml
pub const CHART_API_VERSION: &str = "v1";

/// Version of every generated chart
pub const CHART_VERSION: Version = Version::new(0, 0, 1);

const README_TEMPLATE: &str = r#"# {{ name }}

This chart was generated by shipyard {{ tool_version }}.

## Objects

| Kind | Name |
|------|------|
{% for object in objects -%}
| {{ object.kind }} | {{ object.name }} |
{% endfor %}
Install it with:

```
helm install {{ name }} ./{{ name }}
```
"#;

/// Chart.yaml contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    pub api_version: String,
    pub name: String,
    pub version: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

/// A chart assembled in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chart {
    pub metadata: ChartMetadata,
    pub readme: String,
    /// File name under `templates/` and its contents
    pub templates: Vec<(String, String)>,
}

impl Chart {
    /// Package `objects` as the chart of application `app_name`
    pub fn package(app_name: &str, objects: &[Resource]) -> Result<Self> {
        let name = to_dns_label(app_name)?;
        let metadata = ChartMetadata {
            api_version: CHART_API_VERSION.to_string(),
            name: name.clone(),
            version: CHART_VERSION.to_string(),
            description: format!("A Helm chart for {}", name),
            keywords: vec!["shipyard".to_string()],
        };

        let templates = objects
            .iter()
            .map(|object| {
                let content = render_object(object, OutputFormat::Yaml)?;
                Ok((format!("{}.yaml", object.file_stem()), content))
            })
            .collect::<Result<Vec<_>>>()?;

        let readme = render_readme(&name, objects)?;

        Ok(Self {
            metadata,
            readme,
            templates,
        })
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Write the chart under `<dir>/<name>/`, returning the chart directory
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let root = dir.join(self.name());
        let templates_dir = root.join("templates");
        std::fs::create_dir_all(&templates_dir)
            .map_err(|e| CoreError::file(templates_dir.display().to_string(), e))?;

        let chart_yaml = serde_yaml::to_string(&self.metadata)
            .map_err(|e| CoreError::Io(std::io::Error::other(e.to_string())))?;
        write(&root.join("Chart.yaml"), &chart_yaml)?;
        write(&root.join("README.md"), &self.readme)?;
        for (file, content) in &self.templates {
            write(&templates_dir.join(file), content)?;
        }

        tracing::info!("Chart {} written to {}", self.name(), root.display());
        Ok(root)
    }
}

fn render_readme(name: &str, objects: &[Resource]) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("README.md", README_TEMPLATE)
        .map_err(|e| CoreError::Io(std::io::Error::other(e.to_string())))?;

    let listed: Vec<_> = objects
        .iter()
        .map(|o| context! { kind => o.kind(), name => o.name() })
        .collect();

    env.get_template("README.md")
        .and_then(|template| {
            template.render(context! {
                name => name,
                tool_version => env!("CARGO_PKG_VERSION"),
                objects => listed,
            })
        })
        .map_err(|e| CoreError::Io(std::io::Error::other(e.to_string())))
}

fn write(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|e| CoreError::file(path.display().to_string(), e))
}
