use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::declaration::{DeclarationRegistry, FunctionDeclaration};

/// Snapshot of a function as reported by the function service listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteFunction {
    pub name: String,
    pub handler: String,
    pub role: String,
    pub timeout: i32,
    pub memory: i32,
    pub description: String,
    pub runtime: Option<String>,
    pub code_sha256: Option<String>,
}

/// A remote function belongs to `module` when its handler is exactly
/// `<module>.<function name>`, the only shape this tool ever deploys.
///
/// Functions of nested modules (`orders.jobs.f` for `orders`) are not managed.
pub fn is_managed(remote: &RemoteFunction, module: &str) -> bool {
    remote
        .handler
        .rsplit_once('.')
        .is_some_and(|(owner, function)| owner == module && function == remote.name)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    /// Push configuration and code to every existing declared function.
    #[default]
    Always,
    /// Push only what differs; untouched functions are reported unchanged.
    ChangedOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Handler,
    Role,
    Timeout,
    MemorySize,
    Description,
    Runtime,
    Code,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Handler => "handler",
            Self::Role => "role",
            Self::Timeout => "timeout",
            Self::MemorySize => "memory_size",
            Self::Description => "description",
            Self::Runtime => "runtime",
            Self::Code => "code",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet(BTreeSet<ChangeKind>);

impl ChangeSet {
    pub fn between(
        declared: &FunctionDeclaration,
        remote: &RemoteFunction,
        archive_sha256: Option<&str>,
    ) -> Self {
        let mut changes = BTreeSet::new();
        if declared.handler != remote.handler {
            changes.insert(ChangeKind::Handler);
        }
        if declared.role != remote.role {
            changes.insert(ChangeKind::Role);
        }
        if declared.timeout != remote.timeout {
            changes.insert(ChangeKind::Timeout);
        }
        if declared.memory != remote.memory {
            changes.insert(ChangeKind::MemorySize);
        }
        if declared.description != remote.description {
            changes.insert(ChangeKind::Description);
        }
        if remote.runtime.as_deref() != Some(declared.runtime.as_str()) {
            changes.insert(ChangeKind::Runtime);
        }
        let code_matches = matches!(
            (archive_sha256, remote.code_sha256.as_deref()),
            (Some(local), Some(deployed)) if local == deployed
        );
        if !code_matches {
            changes.insert(ChangeKind::Code);
        }
        Self(changes)
    }

    pub fn contains(&self, kind: ChangeKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn configuration_changed(&self) -> bool {
        self.0.iter().any(|kind| *kind != ChangeKind::Code)
    }

    pub fn code_changed(&self) -> bool {
        self.contains(ChangeKind::Code)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ChangeKind> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(ChangeKind::as_str).collect();
        f.write_str(&names.join(","))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedUpdate {
    pub declaration: FunctionDeclaration,
    pub changes: ChangeSet,
}

impl PlannedUpdate {
    pub fn updates_configuration(&self, policy: UpdatePolicy) -> bool {
        match policy {
            UpdatePolicy::Always => true,
            UpdatePolicy::ChangedOnly => self.changes.configuration_changed(),
        }
    }

    pub fn updates_code(&self, policy: UpdatePolicy) -> bool {
        match policy {
            UpdatePolicy::Always => true,
            UpdatePolicy::ChangedOnly => self.changes.code_changed(),
        }
    }
}

/// A declared function whose name is taken by a function this module does
/// not manage. Creating it could only fail, so it is reported instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanConflict {
    pub name: String,
    pub existing_handler: String,
}

impl fmt::Display for PlanConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "function {} already exists with handler {}",
            self.name, self.existing_handler
        )
    }
}

/// Reconciliation plan for one module. Execution order is create, update,
/// delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPlan {
    pub module: String,
    pub policy: UpdatePolicy,
    pub create: Vec<FunctionDeclaration>,
    pub update: Vec<PlannedUpdate>,
    pub delete: Vec<String>,
    pub unchanged: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<PlanConflict>,
}

impl SyncPlan {
    pub fn is_noop(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    /// Names the managed remote set will hold once the plan has run.
    pub fn expected_names(&self) -> BTreeSet<String> {
        self.create
            .iter()
            .map(|decl| decl.name.clone())
            .chain(self.update.iter().map(|update| update.declaration.name.clone()))
            .chain(self.unchanged.iter().cloned())
            .collect()
    }
}

impl fmt::Display for SyncPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "plan for module {}:", self.module)?;
        let create: Vec<&str> = self.create.iter().map(|decl| decl.name.as_str()).collect();
        writeln!(f, "  create:    [{}]", create.join(", "))?;
        let update: Vec<String> = self
            .update
            .iter()
            .map(|update| {
                if update.changes.is_empty() {
                    update.declaration.name.clone()
                } else {
                    format!("{} ({})", update.declaration.name, update.changes)
                }
            })
            .collect();
        writeln!(f, "  update:    [{}]", update.join(", "))?;
        writeln!(f, "  delete:    [{}]", self.delete.join(", "))?;
        write!(f, "  unchanged: [{}]", self.unchanged.join(", "))?;
        if !self.conflicts.is_empty() {
            let conflicts: Vec<String> = self
                .conflicts
                .iter()
                .map(|conflict| {
                    format!("{} (handler {})", conflict.name, conflict.existing_handler)
                })
                .collect();
            write!(f, "\n  conflict:  [{}]", conflicts.join(", "))?;
        }
        Ok(())
    }
}

/// Diffs the declared set against the managed subset of `remote`.
///
/// Remote functions outside the module are never updated or deleted; a
/// declared name they already hold becomes a [`PlanConflict`].
/// `archive_sha256` is the fingerprint of the archive about to be deployed;
/// `None` treats code as changed.
pub fn plan_sync(
    registry: &DeclarationRegistry,
    remote: &[RemoteFunction],
    archive_sha256: Option<&str>,
    policy: UpdatePolicy,
) -> SyncPlan {
    let module = registry.module();
    let managed: BTreeMap<&str, &RemoteFunction> = remote
        .iter()
        .filter(|function| is_managed(function, module))
        .map(|function| (function.name.as_str(), function))
        .collect();

    let unmanaged: BTreeMap<&str, &RemoteFunction> = remote
        .iter()
        .filter(|function| !is_managed(function, module))
        .map(|function| (function.name.as_str(), function))
        .collect();

    let mut create = Vec::new();
    let mut update = Vec::new();
    let mut unchanged = Vec::new();
    let mut conflicts = Vec::new();
    for declaration in registry.iter() {
        match managed.get(declaration.name.as_str()) {
            None => match unmanaged.get(declaration.name.as_str()) {
                Some(foreign) => conflicts.push(PlanConflict {
                    name: declaration.name.clone(),
                    existing_handler: foreign.handler.clone(),
                }),
                None => create.push(declaration.clone()),
            },
            Some(existing) => {
                let changes = ChangeSet::between(declaration, existing, archive_sha256);
                if policy == UpdatePolicy::ChangedOnly && changes.is_empty() {
                    unchanged.push(declaration.name.clone());
                } else {
                    update.push(PlannedUpdate {
                        declaration: declaration.clone(),
                        changes,
                    });
                }
            }
        }
    }

    let delete = managed
        .keys()
        .filter(|name| !registry.contains(name))
        .map(|name| name.to_string())
        .collect();

    SyncPlan {
        module: module.to_string(),
        policy,
        create,
        update,
        delete,
        unchanged,
        conflicts,
    }
}
