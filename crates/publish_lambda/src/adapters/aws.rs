//! S3 and Lambda implementations of the adapter traits.
//!
//! The SDK is async while the pipeline is sequential and blocking, so every
//! call is driven to completion on the ambient multi-thread runtime.

use std::future::Future;
use std::time::Duration;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_lambda::types::{FunctionCode, FunctionConfiguration, LastUpdateStatus, Runtime};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use publish_lambda_core::declaration::FunctionDeclaration;
use publish_lambda_core::plan::RemoteFunction;
use publish_lambda_core::storage_keys::CodeLocation;

use crate::adapters::function_api::FunctionApi;
use crate::adapters::object_store::ArchiveStore;

pub async fn load_aws_config(region: Option<&str>) -> SdkConfig {
    let loader = aws_config::defaults(BehaviorVersion::latest());
    match region {
        Some(region) => loader.region(Region::new(region.to_string())).load().await,
        None => loader.load().await,
    }
}

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

pub struct S3ArchiveStore {
    s3_client: aws_sdk_s3::Client,
}

impl S3ArchiveStore {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            s3_client: aws_sdk_s3::Client::new(config),
        }
    }
}

impl ArchiveStore for S3ArchiveStore {
    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), String> {
        let request = self
            .s3_client
            .put_object()
            .bucket(bucket)
            .key(key)
            .acl(ObjectCannedAcl::BucketOwnerFullControl)
            .body(ByteStream::from(body.to_vec()));

        block_on(async move {
            request.send().await.map(|_| ()).map_err(|error| {
                format!(
                    "failed to write object to s3: {}",
                    aws_sdk_s3::error::DisplayErrorContext(&error)
                )
            })
        })
    }
}

pub struct LambdaFunctionApi {
    lambda_client: aws_sdk_lambda::Client,
}

impl LambdaFunctionApi {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            lambda_client: aws_sdk_lambda::Client::new(config),
        }
    }
}

fn describe_lambda_error<E>(operation: &str, error: &E) -> String
where
    E: std::error::Error,
{
    format!(
        "{operation} failed: {}",
        aws_sdk_lambda::error::DisplayErrorContext(error)
    )
}

const UPDATE_POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_UPDATE_POLLS: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateProgress {
    Settled,
    InProgress,
}

fn update_progress(
    function_name: &str,
    status: Option<&LastUpdateStatus>,
    reason: Option<&str>,
) -> Result<UpdateProgress, String> {
    match status {
        Some(LastUpdateStatus::InProgress) => Ok(UpdateProgress::InProgress),
        Some(LastUpdateStatus::Failed) => Err(format!(
            "update of function {function_name} failed: {}",
            reason.unwrap_or("no reason reported")
        )),
        _ => Ok(UpdateProgress::Settled),
    }
}

/// Polls until the function's last update has left `InProgress`. Lambda
/// rejects further updates with a conflict until then.
async fn wait_for_update(
    client: &aws_sdk_lambda::Client,
    function_name: &str,
) -> Result<(), String> {
    for _ in 0..MAX_UPDATE_POLLS {
        let configuration = client
            .get_function_configuration()
            .function_name(function_name)
            .send()
            .await
            .map_err(|error| describe_lambda_error("GetFunctionConfiguration", &error))?;
        let progress = update_progress(
            function_name,
            configuration.last_update_status(),
            configuration.last_update_status_reason(),
        )?;
        if progress == UpdateProgress::Settled {
            return Ok(());
        }
        tracing::debug!(function = function_name, "waiting for function update");
        tokio::time::sleep(UPDATE_POLL_INTERVAL).await;
    }
    Err(format!(
        "function {function_name} still updating after {MAX_UPDATE_POLLS} polls"
    ))
}

fn remote_function(configuration: &FunctionConfiguration) -> Option<RemoteFunction> {
    Some(RemoteFunction {
        name: configuration.function_name()?.to_string(),
        handler: configuration.handler().unwrap_or_default().to_string(),
        role: configuration.role().unwrap_or_default().to_string(),
        timeout: configuration.timeout().unwrap_or_default(),
        memory: configuration.memory_size().unwrap_or_default(),
        description: configuration.description().unwrap_or_default().to_string(),
        runtime: configuration
            .runtime()
            .map(|runtime| runtime.as_str().to_string()),
        code_sha256: configuration.code_sha256().map(str::to_string),
    })
}

impl FunctionApi for LambdaFunctionApi {
    fn list_functions(&self) -> Result<Vec<RemoteFunction>, String> {
        let client = self.lambda_client.clone();
        block_on(async move {
            let mut functions = Vec::new();
            let mut marker: Option<String> = None;
            loop {
                let page = client
                    .list_functions()
                    .set_marker(marker.take())
                    .send()
                    .await
                    .map_err(|error| describe_lambda_error("ListFunctions", &error))?;
                functions.extend(page.functions().iter().filter_map(remote_function));
                match page.next_marker() {
                    Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                    _ => break,
                }
            }
            Ok::<_, String>(functions)
        })
    }

    fn create_function(
        &self,
        declaration: &FunctionDeclaration,
        code: &CodeLocation,
    ) -> Result<(), String> {
        let request = self
            .lambda_client
            .create_function()
            .function_name(&declaration.name)
            .runtime(Runtime::from(declaration.runtime.as_str()))
            .role(&declaration.role)
            .handler(&declaration.handler)
            .code(
                FunctionCode::builder()
                    .s3_bucket(&code.bucket)
                    .s3_key(&code.key)
                    .build(),
            )
            .description(&declaration.description)
            .timeout(declaration.timeout)
            .memory_size(declaration.memory)
            .publish(true);

        block_on(async move {
            request
                .send()
                .await
                .map(|_| ())
                .map_err(|error| describe_lambda_error("CreateFunction", &error))
        })
    }

    fn update_function_configuration(
        &self,
        declaration: &FunctionDeclaration,
    ) -> Result<(), String> {
        let request = self
            .lambda_client
            .update_function_configuration()
            .function_name(&declaration.name)
            .runtime(Runtime::from(declaration.runtime.as_str()))
            .role(&declaration.role)
            .handler(&declaration.handler)
            .description(&declaration.description)
            .timeout(declaration.timeout)
            .memory_size(declaration.memory);
        let client = self.lambda_client.clone();
        let function_name = declaration.name.clone();

        block_on(async move {
            request
                .send()
                .await
                .map_err(|error| describe_lambda_error("UpdateFunctionConfiguration", &error))?;
            wait_for_update(&client, &function_name).await
        })
    }

    fn update_function_code(
        &self,
        function_name: &str,
        code: &CodeLocation,
    ) -> Result<(), String> {
        let request = self
            .lambda_client
            .update_function_code()
            .function_name(function_name)
            .s3_bucket(&code.bucket)
            .s3_key(&code.key)
            .publish(true);

        block_on(async move {
            request
                .send()
                .await
                .map(|_| ())
                .map_err(|error| describe_lambda_error("UpdateFunctionCode", &error))
        })
    }

    fn delete_function(&self, function_name: &str) -> Result<(), String> {
        let request = self
            .lambda_client
            .delete_function()
            .function_name(function_name);

        block_on(async move {
            request
                .send()
                .await
                .map(|_| ())
                .map_err(|error| describe_lambda_error("DeleteFunction", &error))
        })
    }
}
