use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_RUNTIME: &str = "python3.12";
pub const DEFAULT_TIMEOUT_SECONDS: i32 = 60;
pub const DEFAULT_MEMORY_MB: i32 = 128;
pub const MIN_TIMEOUT_SECONDS: i32 = 1;
pub const MAX_TIMEOUT_SECONDS: i32 = 900;
pub const MIN_MEMORY_MB: i32 = 128;
pub const MAX_MEMORY_MB: i32 = 10_240;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Invocation settings attached to a declared function.
///
/// Every field is optional so the same shape can carry manifest defaults and
/// per-function overrides; [`DeclarationRegistry::register`] resolves them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionSettings {
    pub role: Option<String>,
    pub timeout: Option<i32>,
    pub memory: Option<i32>,
    pub description: Option<String>,
    pub runtime: Option<String>,
}

impl FunctionSettings {
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_timeout(mut self, seconds: i32) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn with_memory(mut self, megabytes: i32) -> Self {
        self.memory = Some(megabytes);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = Some(runtime.into());
        self
    }

    /// Fills every unset field from `defaults`.
    pub fn merged_over(&self, defaults: &FunctionSettings) -> FunctionSettings {
        FunctionSettings {
            role: self.role.clone().or_else(|| defaults.role.clone()),
            timeout: self.timeout.or(defaults.timeout),
            memory: self.memory.or(defaults.memory),
            description: self
                .description
                .clone()
                .or_else(|| defaults.description.clone()),
            runtime: self.runtime.clone().or_else(|| defaults.runtime.clone()),
        }
    }
}

/// A function the author marked as publishable, with fully resolved settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionDeclaration {
    pub name: String,
    pub handler: String,
    pub role: String,
    pub timeout: i32,
    pub memory: i32,
    pub description: String,
    pub runtime: String,
}

/// The authoritative declared set for one module, keyed by function name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationRegistry {
    module: String,
    defaults: FunctionSettings,
    functions: BTreeMap<String, FunctionDeclaration>,
}

impl DeclarationRegistry {
    pub fn new(module: impl Into<String>) -> Result<Self, ValidationError> {
        let module = module.into().trim().to_string();
        validate_module_name(&module)?;
        Ok(Self {
            module,
            defaults: FunctionSettings::default(),
            functions: BTreeMap::new(),
        })
    }

    pub fn with_defaults(mut self, defaults: FunctionSettings) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        settings: FunctionSettings,
    ) -> Result<&FunctionDeclaration, ValidationError> {
        let name = name.into().trim().to_string();
        if !is_python_identifier(&name) {
            return Err(ValidationError::new(format!(
                "Function name '{name}' is not a valid Python identifier"
            )));
        }
        if self.functions.contains_key(&name) {
            return Err(ValidationError::new(format!(
                "Function '{name}' is declared more than once"
            )));
        }

        let resolved = settings.merged_over(&self.defaults);
        let role = match resolved.role {
            Some(role) if !role.trim().is_empty() => role.trim().to_string(),
            _ => {
                return Err(ValidationError::new(format!(
                    "Function '{name}' has no role and no default role is configured"
                )));
            }
        };

        let timeout = resolved.timeout.unwrap_or(DEFAULT_TIMEOUT_SECONDS);
        if !(MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS).contains(&timeout) {
            return Err(ValidationError::new(format!(
                "Function '{name}' timeout {timeout}s is outside {MIN_TIMEOUT_SECONDS}..={MAX_TIMEOUT_SECONDS}"
            )));
        }

        let memory = resolved.memory.unwrap_or(DEFAULT_MEMORY_MB);
        if !(MIN_MEMORY_MB..=MAX_MEMORY_MB).contains(&memory) {
            return Err(ValidationError::new(format!(
                "Function '{name}' memory {memory}MB is outside {MIN_MEMORY_MB}..={MAX_MEMORY_MB}"
            )));
        }

        let runtime = resolved
            .runtime
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_RUNTIME.to_string());

        let declaration = FunctionDeclaration {
            handler: handler_reference(&self.module, &name),
            name: name.clone(),
            role,
            timeout,
            memory,
            description: resolved.description.unwrap_or_default(),
            runtime,
        };

        Ok(self.functions.entry(name).or_insert(declaration))
    }

    pub fn get(&self, name: &str) -> Option<&FunctionDeclaration> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Declarations in name order.
    pub fn iter(&self) -> impl Iterator<Item = &FunctionDeclaration> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

pub fn handler_reference(module: &str, function_name: &str) -> String {
    format!("{module}.{function_name}")
}

pub fn validate_module_name(module: &str) -> Result<(), ValidationError> {
    if module.is_empty() {
        return Err(ValidationError::new("module name cannot be empty"));
    }
    if let Some(part) = module.split('.').find(|part| !is_python_identifier(part)) {
        return Err(ValidationError::new(format!(
            "Module '{module}' has an invalid component '{part}'"
        )));
    }
    Ok(())
}

// ASCII subset of Python identifiers; Lambda handler names are ASCII anyway.
pub fn is_python_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
