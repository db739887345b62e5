//! Bundle definition and loading
//!
//! A bundle is a directory of manifest templates rendered together:
//!
//! ```text
//! backend/
//!   Stencil.yaml          # optional metadata and engine settings
//!   values.yaml           # default values
//!   values.schema.yaml    # optional values schema
//!   templates/
//!     deployment.yaml
//! ```

use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::schema::Schema;

/// Name of the optional metadata file at the bundle root
pub const BUNDLE_FILE: &str = "Stencil.yaml";

/// Extensions picked up from `templates/`
const TEMPLATE_EXTENSIONS: &[&str] = &["yaml", "yml", "tpl", "json"];

/// Contents of `Stencil.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    /// Bundle metadata
    pub metadata: BundleMetadata,

    /// Engine configuration
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Bundle metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleMetadata {
    pub name: String,

    /// SemVer version
    #[serde(with = "version_serde", default = "default_version")]
    pub version: Version,

    #[serde(default)]
    pub description: Option<String>,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fail on undefined variables
    #[serde(default = "default_true")]
    pub strict: bool,

    /// Validate rendered manifests against the Kubernetes object schema
    #[serde(default = "default_true")]
    pub validate: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strict: true,
            validate: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_version() -> Version {
    Version::new(0, 1, 0)
}

impl Bundle {
    /// Metadata for a bundle without a `Stencil.yaml`, named after its directory
    fn implicit(root: &Path) -> Self {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "bundle".to_string());

        Self {
            metadata: BundleMetadata {
                name,
                version: default_version(),
                description: None,
            },
            engine: EngineConfig::default(),
        }
    }
}

/// Loaded bundle with resolved paths
#[derive(Debug, Clone)]
pub struct LoadedBundle {
    /// Bundle definition
    pub bundle: Bundle,

    /// Root directory of the bundle
    pub root: PathBuf,

    /// Templates directory
    pub templates_dir: PathBuf,

    /// Values file path (may not exist)
    pub values_path: PathBuf,

    /// Schema file path (if present)
    pub schema_path: Option<PathBuf>,

    /// Set when the bundle wraps a single template file
    single_template: Option<PathBuf>,
}

impl LoadedBundle {
    /// Load a bundle from a directory, or wrap a single template file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(CoreError::BundleNotFound {
                path: path.display().to_string(),
            });
        }

        if path.is_file() {
            return Self::single_file(path);
        }

        let root = path.to_path_buf();
        let bundle_file = root.join(BUNDLE_FILE);
        let bundle = if bundle_file.exists() {
            let content = std::fs::read_to_string(&bundle_file)?;
            let bundle: Bundle = serde_yaml::from_str(&content)?;
            if bundle.metadata.name.trim().is_empty() {
                return Err(CoreError::InvalidBundle {
                    message: format!("{} has an empty metadata.name", bundle_file.display()),
                });
            }
            bundle
        } else {
            Bundle::implicit(&root)
        };

        let templates_dir = root.join("templates");
        if !templates_dir.is_dir() {
            return Err(CoreError::InvalidBundle {
                message: format!("templates/ directory not found in {}", root.display()),
            });
        }

        debug!(
            bundle = %bundle.metadata.name,
            root = %root.display(),
            "loaded bundle"
        );

        Ok(Self {
            values_path: root.join("values.yaml"),
            schema_path: Self::find_schema_file(&root),
            bundle,
            root,
            templates_dir,
            single_template: None,
        })
    }

    /// Wrap a lone template file; a sibling `values.yaml` supplies defaults
    fn single_file(path: &Path) -> Result<Self> {
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "template".to_string());
        let mut bundle = Bundle::implicit(&root);
        bundle.metadata.name = stem;

        Ok(Self {
            bundle,
            values_path: root.join("values.yaml"),
            schema_path: Self::find_schema_file(&root),
            templates_dir: root.clone(),
            root,
            single_template: Some(path.to_path_buf()),
        })
    }

    /// Find schema file, checking multiple standard locations
    fn find_schema_file(root: &Path) -> Option<PathBuf> {
        let candidates = [
            "values.schema.yaml",
            "values.schema.json",
            "schema.yaml",
            "schema.json",
        ];

        candidates
            .iter()
            .map(|candidate| root.join(candidate))
            .find(|path| path.exists())
    }

    /// Load the schema if present
    pub fn load_schema(&self) -> Result<Option<Schema>> {
        match &self.schema_path {
            Some(path) => Ok(Some(Schema::from_file(path)?)),
            None => Ok(None),
        }
    }

    /// Get list of template files, sorted for deterministic rendering
    pub fn template_files(&self) -> Result<Vec<PathBuf>> {
        if let Some(single) = &self.single_template {
            return Ok(vec![single.clone()]);
        }

        let mut files = Vec::new();

        for entry in walkdir::WalkDir::new(&self.templates_dir)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let matches = path
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase())
                .is_some_and(|ext| TEMPLATE_EXTENSIONS.contains(&ext.as_str()));
            if matches {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }

    /// Name a template file by its path relative to the templates directory
    pub fn template_name(&self, file: &Path) -> String {
        file.strip_prefix(&self.templates_dir)
            .unwrap_or(file)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

/// Custom serde for semver::Version
mod version_serde {
    use semver::Version;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(version: &Version, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&version.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Version, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Version::parse(&s).map_err(serde::de::Error::custom)
    }
}
