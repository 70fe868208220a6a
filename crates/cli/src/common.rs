//! Helpers shared across CLI commands

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Instant;

use nexus_codegen::{GeneratedDomain, GeneratorConfig, generate_all, generate_domain};
use nexus_common::{EndpointManifest, MANIFEST_FILENAME};
use tracing::debug;

pub fn load_config(path: &Path) -> Result<GeneratorConfig, String> {
    debug!(path = %path.display(), "Loading generator configuration.");
    GeneratorConfig::load(path).map_err(|err| err.to_string())
}

/// Render the named domains (every configured one when `names` is empty).
///
/// Each domain is rendered once, in name order.
pub fn generate_selected(
    config: &GeneratorConfig,
    names: &[String],
) -> Result<Vec<GeneratedDomain>, String> {
    if names.is_empty() {
        return generate_all(config, None).map_err(|err| err.to_string());
    }
    names
        .iter()
        .map(String::as_str)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|name| generate_domain(config, name).map_err(|err| err.to_string()))
        .collect()
}

/// The manifest written by the last `nexus generate`, or a freshly derived
/// one when the domain was never generated.
pub fn load_manifest(config: &GeneratorConfig, domain: &str) -> Result<EndpointManifest, String> {
    let target = &config.domain(domain).map_err(|err| err.to_string())?.output.target;
    let path = config.resolve(target).join(MANIFEST_FILENAME);

    match fs::read_to_string(&path) {
        Ok(json) => EndpointManifest::from_json(&json)
            .map_err(|err| format!("Failed to parse {}: {err}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No manifest on disk, deriving endpoints.");
            generate_domain(config, domain)
                .map(|generated| generated.manifest)
                .map_err(|err| err.to_string())
        }
        Err(err) => Err(format!("Failed to read {}: {err}", path.display())),
    }
}

/// `path` relative to the configuration root when it lives below it.
pub fn display_path(config: &GeneratorConfig, path: &Path) -> String {
    path.strip_prefix(&config.root)
        .unwrap_or(path)
        .display()
        .to_string()
}

pub fn format_elapsed_ms(start: Instant) -> String {
    let elapsed = start.elapsed();
    if elapsed.as_secs() == 0 {
        return format!("{}ms", elapsed.as_millis());
    }
    let seconds = elapsed.as_secs();
    let remaining_ms = elapsed.subsec_millis();
    format!("{seconds}s {remaining_ms}ms")
}
