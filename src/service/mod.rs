//! Request-level operations: authentication, listing, creation, accounts, and uploads.

mod backend;
pub mod types;

pub use backend::{BackendService, CREATED_BY_FIELD};
pub use types::{FileUpload, NewRecord, Registration, ServiceError, ServiceSettings};

#[cfg(test)]
mod tests;
