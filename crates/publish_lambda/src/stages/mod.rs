pub mod archive;
pub mod build;
pub mod sync;
pub mod upload;
