//! Bundled and on-disk asset trees (docs, example recipes, schema)
//!
//! The server serves documentation and example recipes from either a
//! directory under the workspace (dev workflows with the engine checked out)
//! or the bundle compiled into the binary. Both go through one capability
//! interface, [`AssetSource`], selected once at startup.

use std::path::PathBuf;

use include_dir::{include_dir, Dir};
use walkdir::WalkDir;

use crate::error::FakesmithError;
use crate::workspace::WorkspacePaths;

static BUNDLED_EXAMPLES: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/bundled/examples");
static BUNDLED_DOCS: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/bundled/docs");
static BUNDLED_SCHEMA: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/bundled/schema");

/// Workspace subdirectory that overrides bundled assets when present
const ASSETS_OVERRIDE_DIR: &str = "fakesmith-assets";

/// Read-only tree of text assets.
pub trait AssetSource: Send + Sync {
    fn is_file(&self, rel: &str) -> bool;
    fn is_dir(&self, rel: &str) -> bool;
    /// POSIX-style relative file paths under the root, filtered by suffix,
    /// sorted.
    fn list_files(&self, suffixes: &[&str]) -> Vec<String>;
    fn read_text(&self, rel: &str) -> Result<String, FakesmithError>;
}

/// Reject user-supplied asset names that could traverse out of the tree.
pub fn safe_relpath(name: &str) -> Result<&str, FakesmithError> {
    let unsafe_name = name.starts_with('/')
        || name.contains('\\')
        || name.contains(':')
        || name.split('/').any(|part| part.is_empty() || part == "..");
    if name.is_empty() || unsafe_name {
        return Err(FakesmithError::UnsafeAssetPath {
            name: name.to_string(),
        });
    }
    Ok(name)
}

/// Filesystem-backed asset tree
pub struct FsAssets {
    root: PathBuf,
}

impl FsAssets {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn joined(&self, rel: &str) -> Result<PathBuf, FakesmithError> {
        Ok(self.root.join(safe_relpath(rel)?))
    }
}

impl AssetSource for FsAssets {
    fn is_file(&self, rel: &str) -> bool {
        self.joined(rel).map(|p| p.is_file()).unwrap_or(false)
    }

    fn is_dir(&self, rel: &str) -> bool {
        self.joined(rel).map(|p| p.is_dir()).unwrap_or(false)
    }

    fn list_files(&self, suffixes: &[&str]) -> Vec<String> {
        let mut files: Vec<String> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(&self.root)
                    .ok()
                    .map(|rel| rel.to_string_lossy().replace('\\', "/"))
            })
            .filter(|rel| suffixes.iter().any(|s| rel.ends_with(s)))
            .collect();
        files.sort();
        files
    }

    fn read_text(&self, rel: &str) -> Result<String, FakesmithError> {
        let path = self.joined(rel)?;
        if !path.is_file() {
            return Err(FakesmithError::AssetNotFound {
                name: rel.to_string(),
            });
        }
        Ok(std::fs::read_to_string(path)?)
    }
}

/// Asset tree compiled into the binary
pub struct BundledAssets {
    dir: &'static Dir<'static>,
}

impl BundledAssets {
    pub fn examples() -> Self {
        Self {
            dir: &BUNDLED_EXAMPLES,
        }
    }

    pub fn docs() -> Self {
        Self { dir: &BUNDLED_DOCS }
    }

    pub fn schema() -> Self {
        Self {
            dir: &BUNDLED_SCHEMA,
        }
    }
}

impl AssetSource for BundledAssets {
    fn is_file(&self, rel: &str) -> bool {
        safe_relpath(rel)
            .map(|r| self.dir.get_file(r).is_some())
            .unwrap_or(false)
    }

    fn is_dir(&self, rel: &str) -> bool {
        safe_relpath(rel)
            .map(|r| self.dir.get_dir(r).is_some())
            .unwrap_or(false)
    }

    fn list_files(&self, suffixes: &[&str]) -> Vec<String> {
        let mut files = Vec::new();
        collect_bundled(self.dir, suffixes, &mut files);
        files.sort();
        files
    }

    fn read_text(&self, rel: &str) -> Result<String, FakesmithError> {
        let rel = safe_relpath(rel)?;
        let file = self
            .dir
            .get_file(rel)
            .ok_or_else(|| FakesmithError::AssetNotFound {
                name: rel.to_string(),
            })?;
        file.contents_utf8()
            .map(str::to_string)
            .ok_or_else(|| FakesmithError::AssetNotFound {
                name: rel.to_string(),
            })
    }
}

fn collect_bundled(dir: &Dir<'_>, suffixes: &[&str], out: &mut Vec<String>) {
    for file in dir.files() {
        let rel = file.path().to_string_lossy().replace('\\', "/");
        if suffixes.iter().any(|s| rel.ends_with(s)) {
            out.push(rel);
        }
    }
    for sub in dir.dirs() {
        collect_bundled(sub, suffixes, out);
    }
}

/// Example recipe tree: workspace override when present, bundled otherwise.
pub fn examples_source(workspace: &WorkspacePaths) -> Box<dyn AssetSource> {
    let override_dir = workspace.root().join(ASSETS_OVERRIDE_DIR).join("examples");
    if override_dir.is_dir() {
        Box::new(FsAssets::new(override_dir))
    } else {
        Box::new(BundledAssets::examples())
    }
}

/// Documentation tree: workspace override when present, bundled otherwise.
pub fn docs_source(workspace: &WorkspacePaths) -> Box<dyn AssetSource> {
    let override_dir = workspace.root().join(ASSETS_OVERRIDE_DIR).join("docs");
    if override_dir.is_dir() {
        Box::new(FsAssets::new(override_dir))
    } else {
        Box::new(BundledAssets::docs())
    }
}

/// The recipe JSON schema text.
pub fn recipe_schema_text() -> String {
    BundledAssets::schema()
        .read_text("recipe.schema.json")
        .unwrap_or_default()
}
