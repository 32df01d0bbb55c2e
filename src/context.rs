use std::{
    any::{Any, TypeId, type_name},
    collections::HashMap,
    sync::Arc,
};

use tracing::{debug, error};

use crate::{
    data_layer::{DataLayer, Statement},
    entity::{Entity, Record, factory, persist, registry::EntityRegistry},
    error::{Error, Result},
    query::criteria::{Criteria, CriteriaNode, compile},
    value::Value,
};

/// What to do when a reference or serialized field of a row cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolvePolicy {
    /// Log a warning and leave the field absent.
    #[default]
    Degrade,
    /// Fail the whole row.
    Abort,
}

/// The records a multi-row read produced before it stopped, and the error that stopped it.
#[derive(Debug)]
pub struct Partial<T> {
    pub items: Vec<T>,
    pub error: Option<Error>,
}

impl<T> Partial<T> {
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// All items, or the error if the read did not complete.
    ///
    /// # Errors
    ///
    /// The error that stopped the read.
    pub fn into_result(self) -> Result<Vec<T>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.items),
        }
    }
}

/// The registered entity types and the policy for resolving their fields.
///
/// Every read and write goes through a context, which looks up the registry of the entity type
/// involved, and of any type it references.
#[derive(Default)]
pub struct Context {
    registries: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    policy: ResolvePolicy,
}

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ResolvePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub const fn policy(&self) -> ResolvePolicy {
        self.policy
    }

    /// Introspect `T`'s table, bind its mapping and register the result.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyRegistered`] if `T` has been registered before, otherwise see
    /// [`EntityRegistry::initialize`].
    pub async fn register<T: Entity>(
        &mut self,
        db: &mut dyn DataLayer,
    ) -> Result<Arc<EntityRegistry<T>>> {
        if self.is_registered::<T>() {
            return Err(Error::AlreadyRegistered(type_name::<T>()));
        }

        let registry = EntityRegistry::<T>::initialize(db).await?;
        self.insert_registry(registry)
    }

    /// Register a registry built elsewhere, e.g. with [`EntityRegistry::from_parts`].
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyRegistered`] if `T` has been registered before.
    pub fn insert_registry<T: Entity>(
        &mut self,
        registry: EntityRegistry<T>,
    ) -> Result<Arc<EntityRegistry<T>>> {
        if self.is_registered::<T>() {
            return Err(Error::AlreadyRegistered(type_name::<T>()));
        }

        let registry = Arc::new(registry);
        self.registries
            .insert(TypeId::of::<T>(), Arc::clone(&registry) as Arc<dyn Any + Send + Sync>);
        debug!(table = T::TABLE_NAME, "registered entity {}", type_name::<T>());

        Ok(registry)
    }

    #[must_use]
    pub fn is_registered<T: Entity>(&self) -> bool {
        self.registries.contains_key(&TypeId::of::<T>())
    }

    /// # Errors
    ///
    /// [`Error::Unregistered`] if `T` has not been registered.
    pub fn registry<T: Entity>(&self) -> Result<Arc<EntityRegistry<T>>> {
        self.registries
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|e| e.downcast::<EntityRegistry<T>>().ok())
            .ok_or(Error::Unregistered(type_name::<T>()))
    }

    /// Read the entity whose primary key is `id`.
    ///
    /// # Errors
    ///
    /// If the query fails, or the row cannot be turned into an entity.
    pub async fn by_id<T: Entity>(
        &self,
        db: &mut dyn DataLayer,
        id: impl Into<Value> + Send,
        extra_args: &[Value],
    ) -> Result<Option<Record<T>>> {
        let registry = self.registry::<T>()?;
        let statement = registry.select_by_id_statement(id.into());

        let Some(row) = db.fetch_all(&statement).await?.into_iter().next() else {
            return Ok(None);
        };

        factory::instantiate(self, &registry, db, row, extra_args)
            .await
            .map(Some)
    }

    /// Read every row of `T`'s table.
    pub async fn all<T: Entity>(
        &self,
        db: &mut dyn DataLayer,
        extra_args: &[Value],
    ) -> Partial<Record<T>> {
        let registry = match self.registry::<T>() {
            Ok(registry) => registry,
            Err(e) => return failed(e),
        };

        let statement = registry.select_all_statement();
        self.read_rows(&registry, db, &statement, extra_args).await
    }

    /// Read the rows of `T`'s table matching `criteria`.
    pub async fn selection<T: Entity>(
        &self,
        db: &mut dyn DataLayer,
        criteria: &Criteria,
        extra_args: &[Value],
    ) -> Partial<Record<T>> {
        match criteria.to_tree() {
            Ok(tree) => self.select(db, &tree, extra_args).await,
            Err(e) => failed(e),
        }
    }

    /// Read the rows of `T`'s table matching a criteria tree.
    pub async fn select<T: Entity>(
        &self,
        db: &mut dyn DataLayer,
        tree: &CriteriaNode,
        extra_args: &[Value],
    ) -> Partial<Record<T>> {
        let registry = match self.registry::<T>() {
            Ok(registry) => registry,
            Err(e) => return failed(e),
        };

        let compiled = match compile(tree) {
            Ok(compiled) => compiled,
            Err(e) => return failed(e),
        };

        let statement = registry.selection_statement(&compiled);
        self.read_rows(&registry, db, &statement, extra_args).await
    }

    async fn read_rows<T: Entity>(
        &self,
        registry: &EntityRegistry<T>,
        db: &mut dyn DataLayer,
        statement: &Statement,
        extra_args: &[Value],
    ) -> Partial<Record<T>> {
        let rows = match db.fetch_all(statement).await {
            Ok(rows) => rows,
            Err(e) => {
                error!(sql = statement.sql(), "failed to read {}: {e}", registry.table());
                return failed(e.into());
            }
        };

        let mut items = Vec::with_capacity(rows.len());

        for row in rows {
            match factory::instantiate(self, registry, db, row, extra_args).await {
                Ok(record) => items.push(record),
                Err(e) => {
                    error!(
                        sql = statement.sql(),
                        read = items.len(),
                        "failed to build {} from row: {e}",
                        type_name::<T>()
                    );
                    return Partial {
                        items,
                        error: Some(e),
                    };
                }
            }
        }

        Partial { items, error: None }
    }

    /// Insert or update `record`, reporting failures through the log only.
    pub async fn persist<T: Entity>(&self, db: &mut dyn DataLayer, record: &mut Record<T>) -> bool {
        match self.try_persist(db, record).await {
            Ok(()) => true,
            Err(e) => {
                error!(table = T::TABLE_NAME, "failed to persist {}: {e}", type_name::<T>());
                false
            }
        }
    }

    /// Insert or update `record`. A transient record becomes persisted once inserted.
    ///
    /// # Errors
    ///
    /// See [`persist::persist`].
    pub async fn try_persist<T: Entity>(
        &self,
        db: &mut dyn DataLayer,
        record: &mut Record<T>,
    ) -> Result<()> {
        let registry = self.registry::<T>()?;
        persist::persist(self, &registry, db, record).await
    }

    /// Reload every mapped field of `record` from the database, without changing its state.
    ///
    /// # Errors
    ///
    /// [`Error::MissingRow`] if the record's row no longer exists.
    pub async fn refresh<T: Entity>(
        &self,
        db: &mut dyn DataLayer,
        record: &mut Record<T>,
    ) -> Result<()> {
        let registry = self.registry::<T>()?;
        persist::refresh(self, &registry, db, record).await
    }
}

fn failed<T>(error: Error) -> Partial<T> {
    Partial {
        items: vec![],
        error: Some(error),
    }
}
