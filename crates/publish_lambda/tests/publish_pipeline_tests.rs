mod support;

use std::collections::BTreeSet;
use std::fs;
use std::io::Cursor;

use publish_lambda::error::{BuildError, PublishError};
use publish_lambda::pipeline::{publish, PublishDependencies, PublishRequest};
use publish_lambda_core::declaration::DeclarationRegistry;
use publish_lambda_core::fingerprint::code_sha256;
use publish_lambda_core::manifest::parse_manifest;
use publish_lambda_core::plan::UpdatePolicy;
use publish_lambda_core::storage_keys::{ARCHIVE_FILE_NAME, STAGING_DIR_NAME};
use support::{python_project, remote, CopyingInstaller, MemoryFunctionApi, MemoryStore};

const MANIFEST: &str = r#"
module = "orders"

[defaults]
role = "arn:aws:iam::123456789012:role/lambda"

[[function]]
name = "f1"
timeout = 30

[[function]]
name = "f2"
memory = 512
"#;

const MULTI_MODULE: &str = r#"
[defaults]
role = "arn:aws:iam::123456789012:role/lambda"

[[function]]
module = "orders"
name = "f1"

[[function]]
module = "billing"
name = "charge"
"#;

fn load_registries(manifest: &str, modules: &[&str]) -> Vec<DeclarationRegistry> {
    let modules: Vec<String> = modules.iter().map(|module| module.to_string()).collect();
    parse_manifest(manifest)
        .and_then(|manifest| manifest.registries(&modules))
        .expect("manifest parses")
}

fn request(project_dir: &std::path::Path, dry_run: bool) -> PublishRequest {
    PublishRequest {
        project_dir: project_dir.to_path_buf(),
        bucket: "artifacts".to_string(),
        key_prefix: None,
        requirements: vec!["requests".to_string()],
        policy: UpdatePolicy::Always,
        dry_run,
    }
}

fn archive_entries(bytes: &[u8]) -> BTreeSet<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).expect("valid zip");
    (0..archive.len())
        .map(|index| {
            archive
                .by_index(index)
                .expect("entry opens")
                .name()
                .to_string()
        })
        .collect()
}

#[test]
fn publishes_archive_and_reconciles_functions() {
    let dir = tempfile::tempdir().expect("tempdir");
    python_project(dir.path());
    let registries = load_registries(MANIFEST, &["orders"]);
    let installer = CopyingInstaller::default();
    let store = MemoryStore::default();
    let functions = MemoryFunctionApi::with_functions(vec![
        remote("f1", "orders.f1"),
        remote("f3", "orders.f3"),
        remote("unrelated", "billing.unrelated"),
    ]);
    let deps = PublishDependencies {
        installer: &installer,
        store: &store,
        functions: &functions,
    };

    let summary = publish(&request(dir.path(), false), &registries, &deps).expect("publish");

    assert_eq!(installer.targets(), vec![".", "requests"]);

    let uploaded = store.get("artifacts", "orders").expect("archive uploaded");
    let on_disk = fs::read(dir.path().join(ARCHIVE_FILE_NAME)).expect("archive on disk");
    assert_eq!(uploaded, on_disk);
    assert_eq!(summary.code_sha256, code_sha256(&uploaded));
    assert_eq!(summary.archive_size_bytes, uploaded.len());
    let orders = summary.module("orders").expect("orders published");
    assert_eq!(orders.code.key, "orders");
    assert_eq!(
        archive_entries(&uploaded),
        BTreeSet::from([
            "orders.py".to_string(),
            "requests/__init__.py".to_string()
        ])
    );

    assert!(!summary.has_failures());
    assert_eq!(
        functions.names(),
        BTreeSet::from(["f1".to_string(), "f2".to_string(), "unrelated".to_string()])
    );
    let f1 = functions.function("f1").expect("f1 updated");
    assert_eq!(f1.timeout, 30);
    assert_eq!(f1.code_sha256.as_deref(), Some(summary.code_sha256.as_str()));
    let f2 = functions.function("f2").expect("f2 created");
    assert_eq!(f2.memory, 512);
    assert_eq!(f2.handler, "orders.f2");
}

#[test]
fn missing_descriptor_aborts_before_upload_and_sync() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("orders.py"), "def f1(event, context): pass\n")
        .expect("write module");
    let registries = load_registries(MANIFEST, &["orders"]);
    let installer = CopyingInstaller::default();
    let store = MemoryStore::default();
    let functions = MemoryFunctionApi::with_functions(vec![remote("f3", "orders.f3")]);
    let deps = PublishDependencies {
        installer: &installer,
        store: &store,
        functions: &functions,
    };

    let error = publish(&request(dir.path(), false), &registries, &deps)
        .expect_err("publish should abort");

    assert!(matches!(
        error,
        PublishError::Build(BuildError::MissingDescriptor(_))
    ));
    assert!(installer.targets().is_empty());
    assert_eq!(store.len(), 0);
    assert!(functions.calls().is_empty());
    assert!(!dir.path().join(ARCHIVE_FILE_NAME).exists());
}

#[test]
fn upload_failure_aborts_before_sync() {
    let dir = tempfile::tempdir().expect("tempdir");
    python_project(dir.path());
    let registries = load_registries(MANIFEST, &["orders"]);
    let installer = CopyingInstaller::default();
    let store = MemoryStore::failing();
    let functions = MemoryFunctionApi::default();
    let deps = PublishDependencies {
        installer: &installer,
        store: &store,
        functions: &functions,
    };

    let error = publish(&request(dir.path(), false), &registries, &deps)
        .expect_err("publish should abort");

    match error {
        PublishError::Upload(upload) => {
            assert_eq!(upload.bucket, "artifacts");
            assert_eq!(upload.key, "orders");
        }
        other => panic!("expected upload error, got {other}"),
    }
    assert!(functions.calls().is_empty());
}

#[test]
fn dry_run_plans_without_side_effects() {
    let dir = tempfile::tempdir().expect("tempdir");
    python_project(dir.path());
    let registries = load_registries(MANIFEST, &["orders"]);
    let installer = CopyingInstaller::default();
    let store = MemoryStore::default();
    let functions = MemoryFunctionApi::with_functions(vec![
        remote("f1", "orders.f1"),
        remote("f3", "orders.f3"),
    ]);
    let deps = PublishDependencies {
        installer: &installer,
        store: &store,
        functions: &functions,
    };

    let summary = publish(&request(dir.path(), true), &registries, &deps).expect("dry run");

    assert!(summary.dry_run);
    assert_eq!(store.len(), 0);
    assert_eq!(functions.calls(), vec!["list"]);
    let orders = summary.module("orders").expect("orders planned");
    assert!(orders.report.outcomes.is_empty());
    assert_eq!(orders.plan.create.len(), 1);
    assert_eq!(orders.plan.delete, vec!["f3".to_string()]);
    assert!(dir.path().join(STAGING_DIR_NAME).is_dir());
    assert!(dir.path().join(ARCHIVE_FILE_NAME).is_file());
}

#[test]
fn republishing_identical_project_uploads_identical_bytes() {
    let dir = tempfile::tempdir().expect("tempdir");
    python_project(dir.path());
    let registries = load_registries(MANIFEST, &["orders"]);
    let installer = CopyingInstaller::default();
    let store = MemoryStore::default();
    let functions = MemoryFunctionApi::default();
    let deps = PublishDependencies {
        installer: &installer,
        store: &store,
        functions: &functions,
    };

    let first = publish(&request(dir.path(), false), &registries, &deps).expect("first publish");
    let second = publish(&request(dir.path(), false), &registries, &deps).expect("second publish");

    assert_eq!(first.code_sha256, second.code_sha256);
    assert_eq!(second.failures().len(), 0);
}

#[test]
fn publishes_one_archive_for_several_modules() {
    let dir = tempfile::tempdir().expect("tempdir");
    python_project(dir.path());
    let registries = load_registries(MULTI_MODULE, &["orders", "billing"]);
    let installer = CopyingInstaller::default();
    let store = MemoryStore::default();
    let functions = MemoryFunctionApi::with_functions(vec![
        remote("old_charge", "billing.old_charge"),
        remote("report", "reports.report"),
    ]);
    let deps = PublishDependencies {
        installer: &installer,
        store: &store,
        functions: &functions,
    };
    let mut prefixed = request(dir.path(), false);
    prefixed.key_prefix = Some("deploy".to_string());

    let summary = publish(&prefixed, &registries, &deps).expect("publish");

    assert_eq!(installer.targets(), vec![".", "requests"]);
    assert_eq!(store.len(), 2);
    assert_eq!(
        store.get("artifacts", "deploy/orders"),
        store.get("artifacts", "deploy/billing")
    );
    assert_eq!(
        functions.calls(),
        vec![
            "list",
            "create:f1",
            "list",
            "create:charge",
            "delete:old_charge"
        ]
    );
    assert_eq!(
        functions.names(),
        BTreeSet::from(["charge".to_string(), "f1".to_string(), "report".to_string()])
    );
    let billing = summary.module("billing").expect("billing published");
    assert_eq!(billing.code.key, "deploy/billing");
    assert_eq!(
        functions.function("charge").expect("charge created").handler,
        "billing.charge"
    );
}

#[test]
fn upload_failure_touches_no_module() {
    let dir = tempfile::tempdir().expect("tempdir");
    python_project(dir.path());
    let registries = load_registries(MULTI_MODULE, &["orders", "billing"]);
    let installer = CopyingInstaller::default();
    let store = MemoryStore::failing();
    let functions =
        MemoryFunctionApi::with_functions(vec![remote("old_charge", "billing.old_charge")]);
    let deps = PublishDependencies {
        installer: &installer,
        store: &store,
        functions: &functions,
    };

    let error = publish(&request(dir.path(), false), &registries, &deps)
        .expect_err("publish should abort");

    assert!(matches!(error, PublishError::Upload(_)));
    assert!(functions.calls().is_empty());
}
