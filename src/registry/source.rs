use thiserror::Error;

use super::entity::{Entity, EntityId, Ownership};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("no registry record for {0}")]
    NotFound(String),
    #[error("registry lookup failed: {0}")]
    Upstream(String),
}

/// The registry as seen by the graph. Implementations may block; callers run
/// them off the UI thread.
pub trait OwnershipSource: Send + Sync {
    fn resolve_entity(&self, id: &EntityId) -> Result<Entity, FetchError>;

    fn resolve_company_by_registry_number(&self, registry_number: &str)
    -> Result<Entity, FetchError>;

    /// Owners of `entity`, largest stake first.
    fn list_investors(
        &self,
        entity: &Entity,
        year: u16,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<Ownership>, FetchError>;

    /// Holdings of `entity`, largest stake first.
    fn list_investments(
        &self,
        entity: &Entity,
        year: u16,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<Ownership>, FetchError>;
}
