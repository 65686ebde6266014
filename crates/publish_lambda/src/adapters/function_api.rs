use publish_lambda_core::declaration::FunctionDeclaration;
use publish_lambda_core::plan::RemoteFunction;
use publish_lambda_core::storage_keys::CodeLocation;

/// Function-as-a-service management calls used by the synchronizer.
pub trait FunctionApi {
    fn list_functions(&self) -> Result<Vec<RemoteFunction>, String>;

    fn create_function(
        &self,
        declaration: &FunctionDeclaration,
        code: &CodeLocation,
    ) -> Result<(), String>;

    /// Returns once the service has finished applying the configuration, so
    /// a code update can follow immediately.
    fn update_function_configuration(
        &self,
        declaration: &FunctionDeclaration,
    ) -> Result<(), String>;

    fn update_function_code(&self, function_name: &str, code: &CodeLocation)
        -> Result<(), String>;

    fn delete_function(&self, function_name: &str) -> Result<(), String>;
}
