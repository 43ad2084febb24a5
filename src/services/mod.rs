//! Storage backends and the upload service built on them.

#[cfg(test)]
pub mod memory_storage;
pub mod object_storage;
pub mod s3_client;
pub mod upload_service;
