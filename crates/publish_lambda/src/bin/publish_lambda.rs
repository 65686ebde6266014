use anyhow::Context;
use clap::Parser;
use publish_lambda::adapters::aws::{load_aws_config, LambdaFunctionApi, S3ArchiveStore};
use publish_lambda::adapters::installer::PipInstaller;
use publish_lambda::config::PublishArgs;
use publish_lambda::exit_code::exit_code;
use publish_lambda::logging::init_tracing;
use publish_lambda::pipeline::{publish, PublishDependencies, PublishRequest, PublishSummary};
use publish_lambda::report::write_run_report;
use publish_lambda_core::manifest::load_manifest;

async fn run(args: PublishArgs) -> anyhow::Result<PublishSummary> {
    let config = args.into_config()?;
    let registries = load_manifest(&config.manifest_path)
        .and_then(|manifest| manifest.registries(&config.modules))
        .with_context(|| {
            format!(
                "failed to load declarations from {}",
                config.manifest_path.display()
            )
        })?;

    let aws_config = load_aws_config(config.region.as_deref()).await;
    let installer = PipInstaller::new(config.python.clone());
    let store = S3ArchiveStore::new(&aws_config);
    let functions = LambdaFunctionApi::new(&aws_config);
    let deps = PublishDependencies {
        installer: &installer,
        store: &store,
        functions: &functions,
    };

    let summary = publish(&PublishRequest::from(&config), &registries, &deps)?;

    if let Some(path) = &config.report_path {
        write_run_report(path, &summary)
            .with_context(|| format!("failed to write run report to {}", path.display()))?;
    }
    Ok(summary)
}

fn print_summary(summary: &PublishSummary) {
    for module in &summary.modules {
        println!("{}", module.plan);
    }
    if summary.dry_run {
        println!(
            "dry run: archive {} ({} bytes, sha256 {}) was not uploaded",
            summary.archive_path.display(),
            summary.archive_size_bytes,
            summary.code_sha256
        );
        return;
    }

    for module in &summary.modules {
        println!(
            "uploaded s3://{}/{} ({} bytes)",
            module.code.bucket, module.code.key, summary.archive_size_bytes
        );
    }
    if !summary.has_failures() {
        println!("Done!");
        return;
    }
    eprintln!("{} function operation(s) failed:", summary.failures().len());
    for module in &summary.modules {
        for failure in module.report.failures() {
            eprintln!("  - [{}] {failure}", module.module);
        }
    }
}

#[tokio::main]
async fn main() {
    let args = PublishArgs::parse();
    init_tracing(args.verbose);

    let result = run(args).await;
    match &result {
        Ok(summary) => print_summary(summary),
        Err(error) => {
            tracing::error!(error = %format!("{error:#}"), "publish aborted");
            eprintln!("Error: {error:#}");
        }
    }
    std::process::exit(exit_code(&result));
}
