use thiserror::Error;

/// Returned by [`ChainedHashMap::at`](crate::ChainedHashMap::at) and
/// [`ChainedHashMap::at_mut`](crate::ChainedHashMap::at_mut) when the key is
/// absent. The map is left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[error("key not found in map")]
pub struct KeyNotFound;
