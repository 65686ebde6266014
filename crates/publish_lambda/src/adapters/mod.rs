pub mod aws;
pub mod function_api;
pub mod installer;
pub mod object_store;
