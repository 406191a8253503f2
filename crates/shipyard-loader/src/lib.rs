//! Shipyard Loader - Input formats normalized into the application model
//!
//! Two input formats are supported:
//! - Compose files (one or more, merged in order)
//! - Distributed application bundles (JSON)
//!
//! Both produce the same [`Application`]; nothing downstream knows which
//! format was read.

pub mod bundle;
pub mod compose;
pub mod interpolate;
pub mod merge;
pub mod ports;

use std::path::{Path, PathBuf};

use shipyard_core::{
    Application, ConvertOptions, CoreError, DEFAULT_APP_NAME, DEFAULT_COMPOSE_FILE, Result, Warnings,
};

pub use bundle::BundleLoader;
pub use compose::ComposeLoader;
pub use interpolate::Environment;

/// Alternate name tried when the default compose file is missing
const ALTERNATE_COMPOSE_FILE: &str = "docker-compose.yaml";

/// Maximum edit distance for key suggestions
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Input format of a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Compose,
    Bundle,
}

impl InputFormat {
    /// The bundle format wins whenever a bundle file is given
    pub fn for_options(options: &ConvertOptions) -> Self {
        match &options.bundle_file {
            Some(path) if !path.as_os_str().is_empty() => Self::Bundle,
            _ => Self::Compose,
        }
    }
}

/// A loader for one input format
#[derive(Debug, Clone)]
pub enum Loader {
    Compose(ComposeLoader),
    Bundle(BundleLoader),
}

impl Loader {
    pub fn new(format: InputFormat, env: Environment) -> Self {
        match format {
            InputFormat::Compose => Self::Compose(ComposeLoader::new(env)),
            InputFormat::Bundle => Self::Bundle(BundleLoader::new()),
        }
    }

    pub fn format(&self) -> InputFormat {
        match self {
            Self::Compose(_) => InputFormat::Compose,
            Self::Bundle(_) => InputFormat::Bundle,
        }
    }

    /// Load the inputs named by `options`
    pub fn load(&self, options: &ConvertOptions, warnings: &mut Warnings) -> Result<Application> {
        match self {
            Self::Compose(loader) => {
                let files = resolve_compose_files(&options.input_files);
                loader.load_files(&files, warnings)
            }
            Self::Bundle(loader) => {
                let path = options
                    .bundle_file
                    .as_deref()
                    .ok_or_else(|| CoreError::configuration("no bundle file given"))?;
                loader.load_file(path, warnings)
            }
        }
    }

    /// Load explicit files
    ///
    /// Compose accepts several files; a bundle loader reads the first.
    pub fn load_files(&self, paths: &[PathBuf], warnings: &mut Warnings) -> Result<Application> {
        match self {
            Self::Compose(loader) => loader.load_files(paths, warnings),
            Self::Bundle(loader) => {
                let path = paths
                    .first()
                    .ok_or_else(|| CoreError::configuration("no bundle file given"))?;
                loader.load_file(path, warnings)
            }
        }
    }
}

/// Select and build the loader for `options`, reading variables from the process
pub fn loader_for(options: &ConvertOptions) -> Loader {
    Loader::new(InputFormat::for_options(options), Environment::from_process())
}

/// Fall back to `docker-compose.yaml` when only the missing default is named
fn resolve_compose_files(files: &[PathBuf]) -> Vec<PathBuf> {
    if let [only] = files
        && only.as_os_str() == DEFAULT_COMPOSE_FILE
        && !only.exists()
        && Path::new(ALTERNATE_COMPOSE_FILE).exists()
    {
        tracing::debug!(
            "{} not found, using {}",
            DEFAULT_COMPOSE_FILE,
            ALTERNATE_COMPOSE_FILE
        );
        return vec![PathBuf::from(ALTERNATE_COMPOSE_FILE)];
    }
    files.to_vec()
}

/// Read an input file, naming it in the error
pub(crate) fn read_input(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| CoreError::file(path.display().to_string(), e))
}

/// Application name derived from the directory holding the input
pub fn app_name_from_path(path: &Path) -> String {
    let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    absolute
        .parent()
        .and_then(Path::file_name)
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_APP_NAME)
        .to_string()
}

/// Closest candidate within a small edit distance
pub(crate) fn suggest<'a>(input: &str, candidates: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    candidates
        .map(|candidate| (strsim::levenshtein(input, candidate), candidate))
        .filter(|(distance, _)| *distance > 0 && *distance <= MAX_SUGGESTION_DISTANCE)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate)
}
