//! Generator configuration (`nexus.codegen.toml`).
//!
//! One `[domains.<name>]` table per API domain:
//!
//! ```toml
//! [domains.workspaces]
//! input = "api/specs/workspaces.yaml"
//!
//! [domains.workspaces.output]
//! mode = "tags-split"
//! target = "frontend/src/lib/api/generated/workspaces"
//! schemas = "frontend/src/lib/api/generated/workspaces/model"
//! client = "react-query"
//!
//! [domains.workspaces.output.override.mutator]
//! path = "frontend/src/lib/api/mutator/custom-instance.ts"
//! name = "customInstance"
//!
//! [domains.workspaces.output.override.query]
//! use-query = true
//! use-infinite = true
//! use-infinite-query-param = "nextPageToken"
//! use-query-options = true
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use nexus_common::DEFAULT_CURSOR_PARAM;
use serde::Deserialize;

use crate::error::{GenerationError, Result};

/// Default configuration filename looked up in the project root.
pub const CONFIG_FILENAME: &str = "nexus.codegen.toml";

/// Complete generator configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub root: PathBuf,
    /// Domains by name.
    pub domains: BTreeMap<String, DomainConfig>,
}

/// Per-domain configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DomainConfig {
    /// OpenAPI document (`.yaml`, `.yml` or `.json`).
    pub input: PathBuf,
    /// Where and how the client is written.
    pub output: OutputConfig,
}

/// `[domains.<name>.output]`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct OutputConfig {
    /// Module layout.
    #[serde(default)]
    pub mode: OutputMode,
    /// Directory receiving the generated modules.
    pub target: PathBuf,
    /// Directory receiving model types; `<target>/model` when omitted.
    pub schemas: Option<PathBuf>,
    /// Emission style.
    #[serde(default)]
    pub client: ClientKind,
    /// Remove files under `target` that the current run did not produce.
    #[serde(default)]
    pub clean: bool,
    /// `override` table.
    #[serde(default, rename = "override")]
    pub overrides: OverrideConfig,
}

impl OutputConfig {
    /// Model directory, defaulted.
    pub fn schemas_dir(&self) -> PathBuf {
        self.schemas
            .clone()
            .unwrap_or_else(|| self.target.join("model"))
    }
}

/// How generated modules are organised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// One module for the whole domain.
    Single,
    /// One module per tag.
    Tags,
    /// One directory per tag.
    #[default]
    TagsSplit,
}

/// Emission style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClientKind {
    /// Request functions plus React-Query hooks.
    #[default]
    ReactQuery,
    /// Bare promise-returning request functions and query-key helpers.
    Fetch,
}

/// `[domains.<name>.output.override]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct OverrideConfig {
    /// Request function the generated code calls.
    #[serde(default)]
    pub mutator: MutatorConfig,
    /// Which hooks are emitted.
    #[serde(default)]
    pub query: QueryOverride,
}

/// The single request function every generated endpoint calls.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MutatorConfig {
    /// Module exporting the function.
    pub path: PathBuf,
    /// Exported function name.
    pub name: String,
}

impl Default for MutatorConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("src/lib/api/mutator/custom-instance.ts"),
            name: "customInstance".to_string(),
        }
    }
}

/// `[domains.<name>.output.override.query]`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct QueryOverride {
    /// Emit `use<Op>` hooks for queries.
    #[serde(default = "default_true")]
    pub use_query: bool,
    /// Treat paginated reads as infinite queries.
    #[serde(default = "default_true")]
    pub use_infinite: bool,
    /// Name of the cursor parameter.
    #[serde(default = "default_cursor_param")]
    pub use_infinite_query_param: String,
    /// Hooks accept a pass-through options bag.
    #[serde(default = "default_true")]
    pub use_query_options: bool,
}

impl Default for QueryOverride {
    fn default() -> Self {
        Self {
            use_query: true,
            use_infinite: true,
            use_infinite_query_param: default_cursor_param(),
            use_query_options: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cursor_param() -> String {
    DEFAULT_CURSOR_PARAM.to_string()
}

impl GeneratorConfig {
    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|err| GenerationError::io(path, err))?;
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::from_toml(&contents, root).map_err(|message| GenerationError::Config {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse configuration text; `root` anchors relative paths.
    pub fn from_toml(contents: &str, root: PathBuf) -> std::result::Result<Self, String> {
        let mut config: GeneratorConfig =
            toml::from_str(contents).map_err(|err| err.to_string())?;
        if config.domains.is_empty() {
            return Err("no [domains] configured".to_string());
        }
        for (name, domain) in &config.domains {
            if domain.output.overrides.mutator.name.trim().is_empty() {
                return Err(format!("domain `{name}`: mutator name must not be empty"));
            }
            if domain
                .output
                .overrides
                .query
                .use_infinite_query_param
                .trim()
                .is_empty()
            {
                return Err(format!(
                    "domain `{name}`: use-infinite-query-param must not be empty"
                ));
            }
            // Both would own `index.ts`.
            if domain.output.schemas_dir() == domain.output.target {
                return Err(format!(
                    "domain `{name}`: schemas must not be the same directory as target"
                ));
            }
        }
        config.root = root;
        Ok(config)
    }

    /// Configuration of one domain.
    pub fn domain(&self, name: &str) -> Result<&DomainConfig> {
        self.domains
            .get(name)
            .ok_or_else(|| GenerationError::UnknownDomain(name.to_string()))
    }

    /// Resolve a configured path against the configuration root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}
