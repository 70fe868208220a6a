//! Domain generation, file layout and writing.
//!
//! The pipeline for each configured domain is:
//! 1. Parse: OpenAPI document -> OpenApiSpec
//! 2. Normalize: OpenApiSpec -> ApiIR (all OpenAPI logic resolved)
//! 3. Codegen: ApiIR -> TsModule per output file
//! 4. Emit: TsModule -> String (via Emit trait)
//!
//! Every domain is rendered in memory first. Nothing touches the disk until
//! all requested domains generated cleanly, so a bad document never leaves
//! partially written output behind.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use nexus_common::{EndpointManifest, MANIFEST_FILENAME};
use similar::TextDiff;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::{GeneratorConfig, OutputMode};
use crate::error::{GenerationError, Result};
use crate::ir::utils::{relative_module_path, to_kebab_case};
use crate::ir::{
    ApiIR, Emit, ModuleContext, NormalizeOptions, OperationIR, codegen_barrel, codegen_models,
    codegen_operations, normalize_spec,
};
use crate::spec::OpenApiSpec;

/// Barrel module written at the root of each target directory.
const BARREL_FILENAME: &str = "index.ts";

/// Rendered output of one domain, not yet written.
#[derive(Debug, Clone)]
pub struct GeneratedDomain {
    /// Domain name.
    pub domain: String,
    /// Resolved target directory
    pub target: PathBuf,
    /// Whether stale files under `target` are removed on write
    pub clean: bool,
    /// Resolved mutator module, never removed by `clean`
    pub mutator: PathBuf,
    /// Resolved path -> file contents
    pub files: BTreeMap<PathBuf, String>,
    /// Endpoints of the domain; also rendered into `files`.
    pub manifest: EndpointManifest,
}

/// What a write did on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Files created or rewritten.
    pub written: Vec<PathBuf>,
    /// Files already up to date.
    pub unchanged: usize,
    /// Stale files deleted by `clean`.
    pub removed: Vec<PathBuf>,
}

/// A file whose contents on disk differ from what generation produces.
#[derive(Debug, Clone)]
pub struct StaleFile {
    /// Generated or leftover file.
    pub path: PathBuf,
    /// Unified diff from the file on disk to the generated contents
    pub diff: String,
}

/// Generate one configured domain, reading its OpenAPI document from disk.
pub fn generate_domain(config: &GeneratorConfig, name: &str) -> Result<GeneratedDomain> {
    let domain = config.domain(name)?;
    let input = config.resolve(&domain.input);
    info!(domain = name, input = %input.display(), "Generating API client.");

    let spec = OpenApiSpec::from_path(&input).map_err(|err| err.in_domain(name))?;
    generate_from_spec(config, name, &spec)
}

/// Generate one configured domain from an already parsed document.
pub fn generate_from_spec(
    config: &GeneratorConfig,
    name: &str,
    spec: &OpenApiSpec,
) -> Result<GeneratedDomain> {
    render_domain(config, name, spec).map_err(|err| err.in_domain(name))
}

/// Generate every configured domain, or only `only` when given.
///
/// Fails on the first domain that does not generate.
pub fn generate_all(config: &GeneratorConfig, only: Option<&str>) -> Result<Vec<GeneratedDomain>> {
    let names: Vec<&str> = match only {
        Some(name) => vec![config.domain(name).map(|_| name)?],
        None => config.domains.keys().map(String::as_str).collect(),
    };
    names
        .into_iter()
        .map(|name| generate_domain(config, name))
        .collect()
}

fn render_domain(config: &GeneratorConfig, name: &str, spec: &OpenApiSpec) -> Result<GeneratedDomain> {
    let domain = config.domain(name)?;
    let output = &domain.output;

    let api = normalize_spec(
        spec,
        &NormalizeOptions {
            domain: name,
            client: output.client,
            query: &output.overrides.query,
        },
    )?;
    debug!(
        domain = name,
        operations = api.operations.len(),
        types = api.types.len(),
        "Normalized OpenAPI document."
    );

    let target = config.resolve(&output.target);
    let model_file = config.resolve(&output.schemas_dir()).join(BARREL_FILENAME);
    let mutator = config.resolve(&output.overrides.mutator.path);

    let mut files = BTreeMap::new();
    let mut barrel = Vec::new();

    for (path, operations) in layout(&api, output.mode, &target) {
        let dir = path.parent().unwrap_or(target.as_path());
        let ctx = ModuleContext {
            mutator_module: relative_module_path(dir, &mutator),
            mutator_name: output.overrides.mutator.name.clone(),
            model_module: relative_module_path(dir, &model_file),
        };
        let module = codegen_operations(&api, &operations, &ctx);
        barrel.push(relative_module_path(&target, &path));
        debug!(path = %path.display(), operations = operations.len(), "Rendered module.");
        files.insert(path, module.emit());
    }

    files.insert(model_file.clone(), codegen_models(&api).emit());
    barrel.push(relative_module_path(&target, &model_file));
    files.insert(
        target.join(BARREL_FILENAME),
        codegen_barrel(&api, &barrel).emit(),
    );

    let manifest = EndpointManifest {
        domain: name.to_string(),
        endpoints: api.endpoints(),
    };
    files.insert(target.join(MANIFEST_FILENAME), manifest.to_json()?);

    Ok(GeneratedDomain {
        domain: name.to_string(),
        target,
        clean: output.clean,
        mutator,
        files,
        manifest,
    })
}

/// Output file of each operation group.
fn layout<'a>(
    api: &'a ApiIR,
    mode: OutputMode,
    target: &Path,
) -> BTreeMap<PathBuf, Vec<&'a OperationIR>> {
    let mut groups: BTreeMap<PathBuf, Vec<&OperationIR>> = BTreeMap::new();
    for op in &api.operations {
        let path = match mode {
            OutputMode::Single => target.join(format!("{}.ts", module_stem(&api.domain))),
            OutputMode::Tags => target.join(format!("{}.ts", module_stem(&op.tag))),
            OutputMode::TagsSplit => {
                let stem = module_stem(&op.tag);
                target.join(&stem).join(format!("{stem}.ts"))
            }
        };
        groups.entry(path).or_default().push(op);
    }
    groups
}

/// File stem for a tag or domain; `index` is taken by the barrel.
fn module_stem(name: &str) -> String {
    let stem = to_kebab_case(name);
    if stem == "index" {
        "index-api".to_string()
    } else {
        stem
    }
}

// =============================================================================
// Writing
// =============================================================================

/// Write a generated domain, skipping files whose contents already match.
pub fn write_domain(generated: &GeneratedDomain) -> Result<WriteSummary> {
    let mut summary = WriteSummary::default();

    for (path, contents) in &generated.files {
        if fs::read_to_string(path).is_ok_and(|existing| existing == *contents) {
            summary.unchanged += 1;
            continue;
        }
        write_atomic(path, contents)?;
        debug!(path = %path.display(), bytes = contents.len(), "Wrote generated file.");
        summary.written.push(path.clone());
    }

    if generated.clean {
        for path in stale_files(generated)? {
            fs::remove_file(&path).map_err(|err| GenerationError::io(&path, err))?;
            debug!(path = %path.display(), "Removed stale file.");
            summary.removed.push(path);
        }
        remove_empty_dirs(&generated.target)?;
    }

    info!(
        domain = %generated.domain,
        written = summary.written.len(),
        unchanged = summary.unchanged,
        removed = summary.removed.len(),
        "API client written."
    );
    Ok(summary)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent).map_err(|err| GenerationError::io(parent, err))?;
    let mut tmp = NamedTempFile::new_in(parent).map_err(|err| GenerationError::io(parent, err))?;
    tmp.write_all(contents.as_bytes())
        .map_err(|err| GenerationError::io(path, err))?;
    if let Some(permissions) = target_permissions(path) {
        tmp.as_file()
            .set_permissions(permissions)
            .map_err(|err| GenerationError::io(path, err))?;
    }
    tmp.persist(path)
        .map_err(|err| GenerationError::io(path, err.error))?;
    Ok(())
}

/// Mode for a rewritten file: the one it already has, else a plain `0644`.
///
/// Temp files are created owner-only, which must not leak into the output.
fn target_permissions(path: &Path) -> Option<fs::Permissions> {
    match fs::metadata(path) {
        Ok(metadata) => Some(metadata.permissions()),
        Err(_) => default_permissions(),
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}

/// Files under the target directory that generation no longer produces.
fn stale_files(generated: &GeneratedDomain) -> Result<Vec<PathBuf>> {
    if !generated.target.is_dir() {
        return Ok(Vec::new());
    }
    let produced: BTreeSet<&PathBuf> = generated.files.keys().collect();
    let mut stale = Vec::new();
    for entry in WalkDir::new(&generated.target).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err
                .path()
                .map_or_else(|| generated.target.clone(), Path::to_path_buf);
            GenerationError::io(path, err.into())
        })?;
        let path = entry.path();
        if entry.file_type().is_file()
            && !produced.contains(&path.to_path_buf())
            && path != generated.mutator
        {
            stale.push(path.to_path_buf());
        }
    }
    Ok(stale)
}

fn remove_empty_dirs(target: &Path) -> Result<()> {
    for entry in WalkDir::new(target)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_dir())
    {
        let is_empty = fs::read_dir(entry.path())
            .map_err(|err| GenerationError::io(entry.path(), err))?
            .next()
            .is_none();
        if is_empty {
            fs::remove_dir(entry.path()).map_err(|err| GenerationError::io(entry.path(), err))?;
        }
    }
    Ok(())
}

// =============================================================================
// Checking
// =============================================================================

/// Compare generated output with the files on disk.
///
/// Missing files diff against empty contents. With `clean` enabled, files
/// that a write would remove are reported too.
pub fn check_domain(generated: &GeneratedDomain) -> Result<Vec<StaleFile>> {
    let mut stale = Vec::new();

    for (path, contents) in &generated.files {
        let existing = match fs::read_to_string(path) {
            Ok(existing) => existing,
            Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
            Err(err) => return Err(GenerationError::io(path, err)),
        };
        if existing != *contents {
            stale.push(StaleFile {
                path: path.clone(),
                diff: unified_diff(path, &existing, contents),
            });
        }
    }

    if generated.clean {
        for path in stale_files(generated)? {
            let existing = fs::read_to_string(&path).unwrap_or_default();
            stale.push(StaleFile {
                diff: unified_diff(&path, &existing, ""),
                path,
            });
        }
    }

    debug!(domain = %generated.domain, stale = stale.len(), "Checked generated output.");
    Ok(stale)
}

fn unified_diff(path: &Path, old: &str, new: &str) -> String {
    let name = path.display().to_string();
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{name}"), &format!("b/{name}"))
        .to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const COMMENTS: &str = r##"
openapi: 3.0.3
info: { title: Comments, version: "1.0" }
paths:
  /tasks/{taskId}/comments:
    get:
      operationId: listComments
      tags: [comments]
      parameters:
        - { name: taskId, in: path, required: true, schema: { type: string } }
        - { name: nextPageToken, in: query, schema: { type: string } }
      responses:
        "200":
          description: OK
          content:
            application/json:
              schema: { $ref: "#/components/schemas/CommentPage" }
  /reactions:
    get:
      operationId: listReactions
      tags: [Comment Reactions]
      responses:
        "200":
          description: OK
          content:
            application/json:
              schema: { type: array, items: { type: string } }
components:
  schemas:
    CommentPage:
      type: object
      properties:
        comments: { type: array, items: { type: string } }
        nextPageToken: { type: string }
"##;

    fn setup(mode: &str, clean: bool) -> (TempDir, GeneratorConfig) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("comments.yaml"), COMMENTS).unwrap();
        let toml = format!(
            r#"
[domains.comments]
input = "comments.yaml"

[domains.comments.output]
mode = "{mode}"
target = "gen/comments"
clean = {clean}

[domains.comments.output.override.mutator]
path = "mutator/custom-instance.ts"
name = "customInstance"
"#
        );
        let config = GeneratorConfig::from_toml(&toml, dir.path().to_path_buf()).unwrap();
        (dir, config)
    }

    fn relative_files(dir: &TempDir, generated: &GeneratedDomain) -> Vec<String> {
        generated
            .files
            .keys()
            .map(|p| {
                p.strip_prefix(dir.path())
                    .unwrap()
                    .display()
                    .to_string()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn test_tags_split_layout() {
        let (dir, config) = setup("tags-split", false);
        let generated = generate_domain(&config, "comments").unwrap();
        assert_eq!(
            relative_files(&dir, &generated),
            vec![
                "gen/comments/comment-reactions/comment-reactions.ts",
                "gen/comments/comments/comments.ts",
                "gen/comments/endpoints.json",
                "gen/comments/index.ts",
                "gen/comments/model/index.ts",
            ]
        );
        let module = &generated.files[&dir.path().join("gen/comments/comments/comments.ts")];
        assert!(module.contains("from \"../../../mutator/custom-instance\";"));
        assert!(module.contains("import type { CommentPage } from \"../model\";"));

        let barrel = &generated.files[&dir.path().join("gen/comments/index.ts")];
        assert!(barrel.contains(
            "export * from \"./comment-reactions/comment-reactions\";\n\
             export * from \"./comments/comments\";\n\
             export * from \"./model\";\n"
        ));
    }

    #[test]
    fn test_single_and_tags_layouts() {
        let (dir, config) = setup("single", false);
        let generated = generate_domain(&config, "comments").unwrap();
        assert!(relative_files(&dir, &generated).contains(&"gen/comments/comments.ts".to_string()));

        let (dir, config) = setup("tags", false);
        let generated = generate_domain(&config, "comments").unwrap();
        let files = relative_files(&dir, &generated);
        assert!(files.contains(&"gen/comments/comment-reactions.ts".to_string()));
        assert!(files.contains(&"gen/comments/comments.ts".to_string()));
    }

    #[test]
    fn test_manifest_is_written_alongside_modules() {
        let (dir, config) = setup("tags-split", false);
        let generated = generate_domain(&config, "comments").unwrap();
        let json = &generated.files[&dir.path().join("gen/comments/endpoints.json")];
        let manifest = EndpointManifest::from_json(json).unwrap();
        assert_eq!(manifest, generated.manifest);
        let list = manifest.get("listComments").unwrap();
        assert_eq!(list.cursor_field.as_deref(), Some("nextPageToken"));
    }

    #[test]
    fn test_write_then_check_is_clean() {
        let (_dir, config) = setup("tags-split", false);
        let generated = generate_domain(&config, "comments").unwrap();

        let first = write_domain(&generated).unwrap();
        assert_eq!(first.written.len(), generated.files.len());
        assert!(check_domain(&generated).unwrap().is_empty());

        let second = write_domain(&generated).unwrap();
        assert!(second.written.is_empty());
        assert_eq!(second.unchanged, generated.files.len());
    }

    #[cfg(unix)]
    #[test]
    fn test_written_files_are_world_readable() {
        use std::os::unix::fs::PermissionsExt;
        let mode = |path: &Path| fs::metadata(path).unwrap().permissions().mode() & 0o777;

        let (dir, config) = setup("tags-split", false);
        let generated = generate_domain(&config, "comments").unwrap();
        write_domain(&generated).unwrap();
        let barrel = dir.path().join("gen/comments/index.ts");
        for path in generated.files.keys() {
            assert_eq!(mode(path), 0o644, "{}", path.display());
        }

        // A rewrite keeps whatever mode the file was given.
        fs::set_permissions(&barrel, fs::Permissions::from_mode(0o664)).unwrap();
        fs::write(&barrel, "export {};\n").unwrap();
        let summary = write_domain(&generated).unwrap();
        assert_eq!(summary.written, vec![barrel.clone()]);
        assert_eq!(mode(&barrel), 0o664);
    }

    #[test]
    fn test_check_reports_edited_file() {
        let (dir, config) = setup("tags-split", false);
        let generated = generate_domain(&config, "comments").unwrap();
        write_domain(&generated).unwrap();

        let barrel = dir.path().join("gen/comments/index.ts");
        fs::write(&barrel, "export {};\n").unwrap();
        let stale = check_domain(&generated).unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].path, barrel);
        assert!(stale[0].diff.contains("+export * from \"./model\";"));
        assert!(stale[0].diff.contains("-export {};"));
    }

    #[test]
    fn test_clean_removes_stale_files() {
        let (dir, config) = setup("tags-split", true);
        let generated = generate_domain(&config, "comments").unwrap();
        let leftover = dir.path().join("gen/comments/old-tag/old-tag.ts");
        fs::create_dir_all(leftover.parent().unwrap()).unwrap();
        fs::write(&leftover, "export {};\n").unwrap();

        assert!(check_domain(&generated).unwrap().iter().any(|s| s.path == leftover));

        let summary = write_domain(&generated).unwrap();
        assert_eq!(summary.removed, vec![leftover.clone()]);
        assert!(!leftover.exists());
        assert!(!leftover.parent().unwrap().exists());
    }

    #[test]
    fn test_failed_domain_writes_nothing() {
        let (dir, config) = setup("tags-split", false);
        fs::write(
            dir.path().join("comments.yaml"),
            COMMENTS.replace("#/components/schemas/CommentPage", "#/components/schemas/Nope"),
        )
        .unwrap();
        let err = generate_all(&config, None).unwrap_err();
        assert!(err.to_string().starts_with("domain `comments`: GET /tasks/{taskId}/comments"));
        assert!(!dir.path().join("gen").exists());
    }

    #[test]
    fn test_unknown_domain_filter() {
        let (_dir, config) = setup("tags-split", false);
        assert!(matches!(
            generate_all(&config, Some("billing")),
            Err(GenerationError::UnknownDomain(_))
        ));
    }
}
