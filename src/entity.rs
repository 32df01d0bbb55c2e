pub mod binder;
pub mod column;
pub mod factory;
pub mod mapping;
pub mod persist;
pub mod registry;

use std::ops::{Deref, DerefMut};

use mapping::Mapping;

/// A domain type stored as rows of a single table.
///
/// Usually derived with [`Entity`](macro@crate::Entity), which generates [`Entity::map`] from
/// the struct's fields.
pub trait Entity: Sized + Send + Sync + 'static {
    /// The name of this entity's table in the database.
    const TABLE_NAME: &'static str;

    /// Declare the mapped fields and the constructors of this type.
    fn map(mapping: &mut Mapping<Self>);
}

/// Whether a backing row is known to exist for a [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntityState {
    #[default]
    Transient,
    Persisted,
}

/// An entity together with its persistence state.
///
/// Records built by hand start out [`EntityState::Transient`]; records read from the database, or
/// successfully inserted, are [`EntityState::Persisted`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record<T> {
    model: T,
    state: EntityState,
}

impl<T> Record<T> {
    pub const fn new(model: T) -> Self {
        Self {
            model,
            state: EntityState::Transient,
        }
    }

    pub(crate) const fn persisted(model: T) -> Self {
        Self {
            model,
            state: EntityState::Persisted,
        }
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.state = EntityState::Persisted;
    }

    pub const fn state(&self) -> EntityState {
        self.state
    }

    pub fn is_persisted(&self) -> bool {
        self.state == EntityState::Persisted
    }

    pub const fn model(&self) -> &T {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut T {
        &mut self.model
    }

    pub fn into_inner(self) -> T {
        self.model
    }
}

impl<T> Deref for Record<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.model
    }
}

impl<T> DerefMut for Record<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.model
    }
}

impl<T> From<T> for Record<T> {
    fn from(model: T) -> Self {
        Self::new(model)
    }
}
