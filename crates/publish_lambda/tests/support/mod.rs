#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use publish_lambda::adapters::function_api::FunctionApi;
use publish_lambda::adapters::installer::PackageInstaller;
use publish_lambda::adapters::object_store::ArchiveStore;
use publish_lambda::error::BuildError;
use publish_lambda_core::declaration::{DeclarationRegistry, FunctionDeclaration, FunctionSettings};
use publish_lambda_core::plan::{is_managed, RemoteFunction};
use publish_lambda_core::storage_keys::CodeLocation;

pub const ROLE: &str = "arn:aws:iam::123456789012:role/lambda";

pub fn registry(module: &str, names: &[&str]) -> DeclarationRegistry {
    let mut registry = DeclarationRegistry::new(module)
        .expect("module should be valid")
        .with_defaults(FunctionSettings::default().with_role(ROLE));
    for name in names {
        registry
            .register(*name, FunctionSettings::default())
            .expect("registration should pass");
    }
    registry
}

pub fn code_location(code_sha256: &str) -> CodeLocation {
    CodeLocation {
        bucket: "artifacts".to_string(),
        key: "orders".to_string(),
        code_sha256: code_sha256.to_string(),
    }
}

pub fn remote(name: &str, handler: &str) -> RemoteFunction {
    RemoteFunction {
        name: name.to_string(),
        handler: handler.to_string(),
        role: ROLE.to_string(),
        timeout: 60,
        memory: 128,
        runtime: Some("python3.9".to_string()),
        code_sha256: Some("old".to_string()),
        ..RemoteFunction::default()
    }
}

/// In-memory function service that applies every call to its own state.
#[derive(Default)]
pub struct MemoryFunctionApi {
    functions: Mutex<BTreeMap<String, RemoteFunction>>,
    calls: Mutex<Vec<String>>,
    failing: BTreeSet<String>,
    fail_listing: bool,
}

impl MemoryFunctionApi {
    pub fn with_functions(functions: Vec<RemoteFunction>) -> Self {
        Self {
            functions: Mutex::new(
                functions
                    .into_iter()
                    .map(|function| (function.name.clone(), function))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    pub fn failing_for(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("poisoned mutex").clone()
    }

    pub fn function(&self, name: &str) -> Option<RemoteFunction> {
        self.functions
            .lock()
            .expect("poisoned mutex")
            .get(name)
            .cloned()
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.functions
            .lock()
            .expect("poisoned mutex")
            .keys()
            .cloned()
            .collect()
    }

    pub fn managed_names(&self, module: &str) -> BTreeSet<String> {
        self.functions
            .lock()
            .expect("poisoned mutex")
            .values()
            .filter(|function| is_managed(function, module))
            .map(|function| function.name.clone())
            .collect()
    }

    fn call(&self, operation: &str, name: &str) -> Result<(), String> {
        self.calls
            .lock()
            .expect("poisoned mutex")
            .push(format!("{operation}:{name}"));
        if self.failing.contains(name) {
            return Err(format!("simulated {operation} failure for {name}"));
        }
        Ok(())
    }
}

impl FunctionApi for MemoryFunctionApi {
    fn list_functions(&self) -> Result<Vec<RemoteFunction>, String> {
        self.calls
            .lock()
            .expect("poisoned mutex")
            .push("list".to_string());
        if self.fail_listing {
            return Err("AccessDeniedException".to_string());
        }
        Ok(self
            .functions
            .lock()
            .expect("poisoned mutex")
            .values()
            .cloned()
            .collect())
    }

    fn create_function(
        &self,
        declaration: &FunctionDeclaration,
        code: &CodeLocation,
    ) -> Result<(), String> {
        self.call("create", &declaration.name)?;
        let mut functions = self.functions.lock().expect("poisoned mutex");
        if functions.contains_key(&declaration.name) {
            return Err("ResourceConflictException".to_string());
        }
        functions.insert(
            declaration.name.clone(),
            RemoteFunction {
                name: declaration.name.clone(),
                handler: declaration.handler.clone(),
                role: declaration.role.clone(),
                timeout: declaration.timeout,
                memory: declaration.memory,
                description: declaration.description.clone(),
                runtime: Some(declaration.runtime.clone()),
                code_sha256: Some(code.code_sha256.clone()),
            },
        );
        Ok(())
    }

    fn update_function_configuration(
        &self,
        declaration: &FunctionDeclaration,
    ) -> Result<(), String> {
        self.call("update_configuration", &declaration.name)?;
        let mut functions = self.functions.lock().expect("poisoned mutex");
        let function = functions
            .get_mut(&declaration.name)
            .ok_or_else(|| "ResourceNotFoundException".to_string())?;
        function.handler = declaration.handler.clone();
        function.role = declaration.role.clone();
        function.timeout = declaration.timeout;
        function.memory = declaration.memory;
        function.description = declaration.description.clone();
        function.runtime = Some(declaration.runtime.clone());
        Ok(())
    }

    fn update_function_code(
        &self,
        function_name: &str,
        code: &CodeLocation,
    ) -> Result<(), String> {
        self.call("update_code", function_name)?;
        let mut functions = self.functions.lock().expect("poisoned mutex");
        let function = functions
            .get_mut(function_name)
            .ok_or_else(|| "ResourceNotFoundException".to_string())?;
        function.code_sha256 = Some(code.code_sha256.clone());
        Ok(())
    }

    fn delete_function(&self, function_name: &str) -> Result<(), String> {
        self.call("delete", function_name)?;
        self.functions
            .lock()
            .expect("poisoned mutex")
            .remove(function_name)
            .map(|_| ())
            .ok_or_else(|| "ResourceNotFoundException".to_string())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    fail: bool,
}

impl MemoryStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .expect("poisoned mutex")
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().expect("poisoned mutex").len()
    }
}

impl ArchiveStore for MemoryStore {
    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), String> {
        if self.fail {
            return Err("RequestTimeout".to_string());
        }
        self.objects
            .lock()
            .expect("poisoned mutex")
            .insert((bucket.to_string(), key.to_string()), body.to_vec());
        Ok(())
    }
}

/// Stands in for pip: copies `*.py` files of the project for `.`, and writes
/// a package stub for any other requirement.
#[derive(Default)]
pub struct CopyingInstaller {
    targets: Mutex<Vec<String>>,
}

impl CopyingInstaller {
    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().expect("poisoned mutex").clone()
    }
}

impl PackageInstaller for CopyingInstaller {
    fn install(&self, project_dir: &Path, target: &str, staging: &Path) -> Result<(), BuildError> {
        self.targets
            .lock()
            .expect("poisoned mutex")
            .push(target.to_string());

        let write_error = |source: std::io::Error| BuildError::InstallFailed {
            target: target.to_string(),
            status: "exit status: 1".to_string(),
            stderr: source.to_string(),
        };

        if target == "." {
            for entry in fs::read_dir(project_dir).map_err(write_error)? {
                let path = entry.map_err(write_error)?.path();
                let is_python = path.extension().is_some_and(|ext| ext == "py");
                let is_setup = path.file_name().is_some_and(|name| name == "setup.py");
                if path.is_file() && is_python && !is_setup {
                    let file_name = path.file_name().expect("file has a name");
                    fs::copy(&path, staging.join(file_name)).map_err(write_error)?;
                }
            }
        } else {
            let package = staging.join(target.replace('-', "_"));
            fs::create_dir_all(&package).map_err(write_error)?;
            fs::write(package.join("__init__.py"), format!("# {target}\n"))
                .map_err(write_error)?;
        }
        Ok(())
    }
}

pub fn python_project(root: &Path) {
    fs::write(root.join("setup.py"), "from setuptools import setup\nsetup(name='orders')\n")
        .expect("write setup.py");
    fs::write(
        root.join("orders.py"),
        "def f1(event, context):\n    return 1\n\n\ndef f2(event, context):\n    return 2\n",
    )
    .expect("write module");
}
