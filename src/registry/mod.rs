mod entity;
mod snapshot;
mod source;

pub use entity::{Entity, EntityId, EntityKind, Ownership};
pub use snapshot::RegistrySnapshot;
pub use source::{FetchError, OwnershipSource};
