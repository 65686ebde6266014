//! Explicit function manifest (`lambda.toml`).
//!
//! The manifest replaces runtime discovery of decorated functions: it lists
//! each publishable function together with its invocation settings, and
//! optional defaults shared by every entry. One manifest may describe several
//! modules; an entry belongs to its own `module`, else to the top-level one.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::declaration::{DeclarationRegistry, FunctionSettings, ValidationError};

pub const DEFAULT_MANIFEST_FILE: &str = "lambda.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub module: Option<String>,
    #[serde(default)]
    pub defaults: ManifestDefaults,
    #[serde(default, rename = "function")]
    pub functions: Vec<ManifestFunction>,
}

// `deny_unknown_fields` does not combine with `flatten`; leftover keys are
// collected and rejected in `parse_manifest`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ManifestDefaults {
    #[serde(flatten)]
    pub settings: FunctionSettings,
    #[serde(flatten)]
    unknown: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ManifestFunction {
    pub name: String,
    pub module: Option<String>,
    #[serde(flatten)]
    pub settings: FunctionSettings,
    #[serde(flatten)]
    unknown: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown keys in {table}: {}", .keys.join(", "))]
    UnknownKeys { table: String, keys: Vec<String> },

    #[error("manifest does not declare module '{requested}' (declares: {})", .declared.join(", "))]
    ModuleNotDeclared {
        requested: String,
        declared: Vec<String>,
    },

    #[error("function '{function}' has no module and several modules are being published")]
    AmbiguousModule { function: String },

    #[error("function '{function}' is declared by both '{first}' and '{second}'")]
    DuplicateFunction {
        function: String,
        first: String,
        second: String,
    },

    #[error("invalid manifest: {0}")]
    Invalid(#[from] ValidationError),
}

impl ManifestFunction {
    fn owner<'a>(&'a self, manifest: &'a Manifest) -> Option<&'a str> {
        self.module
            .as_deref()
            .or(manifest.module.as_deref())
            .map(str::trim)
    }
}

impl Manifest {
    /// Every module named anywhere in the manifest.
    pub fn declared_modules(&self) -> BTreeSet<String> {
        self.module
            .iter()
            .chain(self.functions.iter().filter_map(|function| function.module.as_ref()))
            .map(|module| module.trim().to_string())
            .collect()
    }

    /// Declared set of `module`. Entries without any module belong to whichever
    /// module is requested.
    pub fn registry(&self, module: &str) -> Result<DeclarationRegistry, ManifestError> {
        let module = module.trim();
        let declared = self.declared_modules();
        if !declared.is_empty() && !declared.contains(module) {
            return Err(ManifestError::ModuleNotDeclared {
                requested: module.to_string(),
                declared: declared.into_iter().collect(),
            });
        }

        let mut registry =
            DeclarationRegistry::new(module)?.with_defaults(self.defaults.settings.clone());
        for function in &self.functions {
            if function.owner(self).is_some_and(|owner| owner != module) {
                continue;
            }
            registry.register(function.name.clone(), function.settings.clone())?;
        }
        Ok(registry)
    }

    /// One registry per requested module, in request order.
    ///
    /// Lambda function names are account-wide, so a name may be declared by
    /// only one of the published modules.
    pub fn registries(
        &self,
        modules: &[String],
    ) -> Result<Vec<DeclarationRegistry>, ManifestError> {
        if modules.len() > 1 {
            if let Some(function) = self.functions.iter().find(|f| f.owner(self).is_none()) {
                return Err(ManifestError::AmbiguousModule {
                    function: function.name.clone(),
                });
            }
        }

        let registries = modules
            .iter()
            .map(|module| self.registry(module))
            .collect::<Result<Vec<_>, _>>()?;

        let mut owners: BTreeMap<&str, &str> = BTreeMap::new();
        for registry in &registries {
            for declaration in registry.iter() {
                if let Some(first) = owners.insert(&declaration.name, registry.module()) {
                    return Err(ManifestError::DuplicateFunction {
                        function: declaration.name.clone(),
                        first: first.to_string(),
                        second: registry.module().to_string(),
                    });
                }
            }
        }
        Ok(registries)
    }
}

pub fn parse_manifest(text: &str) -> Result<Manifest, ManifestError> {
    let manifest: Manifest = toml::from_str(text)?;
    reject_unknown("[defaults]", &manifest.defaults.unknown)?;
    for function in &manifest.functions {
        reject_unknown(&format!("function '{}'", function.name), &function.unknown)?;
    }
    Ok(manifest)
}

pub fn load_manifest(path: &Path) -> Result<Manifest, ManifestError> {
    let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_manifest(&text)
}

fn reject_unknown(
    table: &str,
    unknown: &BTreeMap<String, toml::Value>,
) -> Result<(), ManifestError> {
    if unknown.is_empty() {
        return Ok(());
    }
    Err(ManifestError::UnknownKeys {
        table: table.to_string(),
        keys: unknown.keys().cloned().collect(),
    })
}
