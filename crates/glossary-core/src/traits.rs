use crate::{RemoteTerm, Result, ServiceResult, TermPayload, TermRecord};
use async_trait::async_trait;

/// Produces the flat list of terms to publish.
pub trait TermSource {
    fn read_all(&self) -> Result<Vec<TermRecord>>;
}

/// The remote catalog holding the glossary tree.
///
/// Implementations attach credentials, refresh them and follow redirects on their own;
/// callers never observe either.
#[async_trait]
pub trait RemoteTermService: Send + Sync {
    /// Full snapshot of the remote hierarchy.
    async fn list_all(&self) -> ServiceResult<Vec<RemoteTerm>>;

    /// Creates a term under `payload.parent_id` and returns its location.
    async fn create(&self, payload: &TermPayload) -> ServiceResult<String>;

    /// Replaces the term at `location` with `payload`.
    async fn update(&self, location: &str, payload: &TermPayload) -> ServiceResult<String>;

    async fn delete(&self, location: &str) -> ServiceResult<bool>;
}

/// Asked before overwriting a term that already exists remotely.
pub trait OverwritePrompt: Send + Sync {
    fn confirm_overwrite(&self, name_path: &[String]) -> bool;
}
