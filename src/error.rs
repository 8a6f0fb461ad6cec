use crate::Entity;
use thiserror::Error;

/// Errors of per-entity operations.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum EntityError {
    #[error("{0} was never allocated")]
    NotFound(Entity),
    #[error("{0} is stale")]
    Stale(Entity),
    #[error("{entity} has no component {component}")]
    MissingComponent {
        entity: Entity,
        component: &'static str,
    },
    #[error("component {0} was never registered")]
    UnknownComponent(&'static str),
    #[error("component {0} appears more than once in a bundle")]
    DuplicateComponent(&'static str),
    #[error(transparent)]
    Capacity(#[from] CapacityError),
}

/// Storage could not grow. The operation that hit it had no effect.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum CapacityError {
    #[error("failed to allocate {bytes} bytes for a column of {component}")]
    Allocation {
        component: &'static str,
        bytes: usize,
    },
    #[error("column of {component} overflows with {rows} rows")]
    LayoutOverflow {
        component: &'static str,
        rows: usize,
    },
    #[error("failed to reserve {rows} entity slots in a chunk")]
    EntitySlots { rows: usize },
    #[error("entity index space is exhausted")]
    EntityIndices,
}
