//! Indexing engine: lifecycle and the public operation surface.
//!
//! The engine is created stopped. [`start`](IndexingEngine::start) binds it
//! to a [`GridContext`], registers it as the node's indexing component and
//! opens the engine span every later log line is recorded in.
//! [`stop`](IndexingEngine::stop) drops every index and unregisters the
//! component; afterwards every operation fails with
//! [`CoreError::NotStarted`] until the engine is started again.
//!
//! # Example
//!
//! ```rust
//! use gridix_core::{
//!     FieldDescriptor, FieldType, GridContext, IndexingConfig, IndexingEngine, SpaceName,
//!     TypeDescriptor, Value, Version,
//! };
//! use std::sync::Arc;
//!
//! let context = Arc::new(GridContext::new("demo"));
//! let engine = Arc::new(IndexingEngine::new(IndexingConfig::default()));
//! engine.start(Arc::clone(&context))?;
//!
//! let space = SpaceName::named("people");
//! let person = TypeDescriptor::new("Person")
//!     .field(FieldDescriptor::new("age", FieldType::Integer).indexed());
//! engine.register_type(&space, person.clone())?;
//!
//! let value = Value::object([("age", 42)]);
//! engine.store(&space, &person, Value::from("ann"), value, Version::from_u64(1), 0)?;
//!
//! let rows: Vec<_> = engine
//!     .query_fields(&space, "SELECT _key FROM Person WHERE age > ?", &[Value::Integer(40)], None)?
//!     .collect::<Result<_, _>>()?;
//! assert_eq!(rows, vec![vec![Value::from("ann")]]);
//!
//! engine.stop();
//! # Ok::<(), gridix_core::CoreError>(())
//! ```

use crate::config::{IndexingConfig, SchemaConflictPolicy};
use crate::context::{CacheSource, Component, ComponentKind, GridContext};
use crate::error::{CoreError, CoreResult};
use crate::index::{IndexStore, TableInfo};
use crate::query::{self, FieldsCursor, QueryContext, QueryFilter, RowCursor};
use crate::rebuild::RebuildReport;
use crate::schema::{Registration, TypeDescriptor, TypeRegistry};
use crate::stats::IndexingStats;
use crate::swap::UnswapOutcome;
use crate::types::{SpaceName, Version, UNKNOWN_TYPE_SIZE};
use gridix_codec::Value;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, info_span, warn, Span};

/// State held while the engine runs.
struct Running {
    context: Arc<GridContext>,
    span: Span,
}

/// Secondary index and query engine of one grid node.
pub struct IndexingEngine {
    config: IndexingConfig,
    registry: TypeRegistry,
    store: IndexStore,
    stats: Arc<IndexingStats>,
    /// Serializes register and unregister.
    schema_lock: Mutex<()>,
    state: RwLock<Option<Running>>,
}

impl IndexingEngine {
    /// Creates a stopped engine.
    pub fn new(config: IndexingConfig) -> Self {
        let stats = Arc::new(IndexingStats::new());
        Self {
            store: IndexStore::new(config.clone(), Arc::clone(&stats)),
            registry: TypeRegistry::new(),
            stats,
            schema_lock: Mutex::new(()),
            state: RwLock::new(None),
            config,
        }
    }

    /// Starts the engine within a runtime context.
    ///
    /// # Errors
    ///
    /// - [`CoreError::AlreadyStarted`] if the engine is running
    /// - [`CoreError::ContextStopping`] if the context is shutting down
    /// - [`CoreError::DuplicateComponent`] if the context already has an
    ///   indexing component
    pub fn start(self: &Arc<Self>, context: Arc<GridContext>) -> CoreResult<()> {
        let mut state = self.state.write();
        if state.is_some() {
            return Err(CoreError::AlreadyStarted);
        }
        if context.is_stopping() {
            return Err(CoreError::ContextStopping);
        }
        context
            .components()
            .add(Arc::clone(self) as Arc<dyn Component>)?;

        let span = info_span!(
            "indexing",
            grid = %context.grid_name(),
            node = %context.node_id()
        );
        span.in_scope(|| {
            if context.cache_source().is_none() {
                warn!("no cache component registered; rebuilds and swapped values are unavailable");
            }
            info!(
                batch = self.config.scan_batch_size,
                gate_shards = self.config.gate_shards,
                "indexing engine started"
            );
        });

        *state = Some(Running { context, span });
        Ok(())
    }

    /// Stops the engine, dropping every index. Stopping a stopped engine
    /// does nothing.
    pub fn stop(&self) {
        let Some(running) = self.state.write().take() else {
            return;
        };
        let _enter = running.span.enter();
        running.context.components().remove(ComponentKind::Indexing);
        self.store.clear();
        self.registry.clear();
        info!("indexing engine stopped");
    }

    /// Returns true while the engine runs.
    pub fn is_started(&self) -> bool {
        self.state.read().is_some()
    }

    /// Runs `op` while the engine is running, inside the engine span.
    ///
    /// The state lock is held for the whole operation, so `stop` waits for
    /// operations in flight.
    fn with_running<T>(&self, op: impl FnOnce(&GridContext) -> CoreResult<T>) -> CoreResult<T> {
        let state = self.state.read();
        let running = state.as_ref().ok_or(CoreError::NotStarted)?;
        if running.context.is_stopping() {
            return Err(CoreError::ContextStopping);
        }
        let _enter = running.span.enter();
        op(&running.context)
    }

    fn query_context(
        &self,
        context: &GridContext,
        space: &SpaceName,
        filter: Option<Arc<dyn QueryFilter>>,
    ) -> QueryContext {
        QueryContext {
            space: space.clone(),
            clock: Arc::clone(context.clock()),
            stats: Arc::clone(&self.stats),
            source: context.cache_source(),
            filter,
            batch: self.config.scan_batch_size,
        }
    }

    /// Registers or updates a type.
    ///
    /// Returns false if a different descriptor is registered and the
    /// schema conflict policy keeps it. Replacing a descriptor re-projects
    /// every entry of the type; swapped values are loaded from the cache.
    pub fn register_type(&self, space: &SpaceName, descriptor: TypeDescriptor) -> CoreResult<bool> {
        self.with_running(|context| {
            let _schema = self.schema_lock.lock();
            let (outcome, registered) =
                self.registry
                    .register(space, descriptor, self.config.schema_conflict)?;

            match outcome {
                Registration::Added => {
                    self.store.create_table(space, Arc::clone(&registered));
                    debug!(%space, type_name = %registered.name, "registered type");
                    Ok(true)
                }
                Registration::Unchanged => Ok(true),
                Registration::Replaced { previous } => {
                    let source = context.cache_source();
                    let load = |key: &Value| match &source {
                        Some(source) => source.load(space, key),
                        None => Ok(None),
                    };
                    match self
                        .store
                        .replace_descriptor(space, Arc::clone(&registered), &load)
                    {
                        Ok((kept, dropped)) => {
                            warn!(%space, type_name = %registered.name, kept, dropped, "replaced type descriptor");
                            Ok(true)
                        }
                        Err(err) => {
                            self.registry.register(
                                space,
                                (*previous).clone(),
                                SchemaConflictPolicy::Replace,
                            )?;
                            Err(err)
                        }
                    }
                }
                Registration::Rejected => {
                    warn!(%space, type_name = %registered.name, "kept existing descriptor for conflicting registration");
                    Ok(false)
                }
            }
        })
    }

    /// Unregisters a type and drops its indexes.
    ///
    /// Cursors open on the type end with a schema error. Unregistering an
    /// unknown type does nothing.
    pub fn unregister_type(&self, space: &SpaceName, descriptor: &TypeDescriptor) -> CoreResult<()> {
        self.with_running(|_| {
            let _schema = self.schema_lock.lock();
            if self.registry.unregister(space, &descriptor.name).is_some() {
                let dropped = self.store.drop_table(space, &descriptor.name);
                debug!(%space, type_name = %descriptor.name, dropped, "unregistered type");
            }
            Ok(())
        })
    }

    /// Indexes a value.
    ///
    /// Returns false if the store was discarded as stale.
    pub fn store(
        &self,
        space: &SpaceName,
        descriptor: &TypeDescriptor,
        key: Value,
        value: Value,
        version: Version,
        expiration_time: u64,
    ) -> CoreResult<bool> {
        self.with_running(|context| {
            let now = context.clock().now_millis();
            self.store
                .store(space, &descriptor.name, key, value, version, expiration_time, now)
        })
    }

    /// Removes a key from every type of its space.
    ///
    /// Returns true if the key was indexed.
    pub fn remove(&self, space: &SpaceName, key: &Value) -> CoreResult<bool> {
        self.with_running(|_| Ok(self.store.remove(space, key)))
    }

    /// Marks the value of a key as swapped out. Its index entry stays
    /// queryable.
    pub fn on_swap(&self, space: &SpaceName, key: &Value) -> CoreResult<bool> {
        self.with_running(|_| Ok(self.store.on_swap(space, key)))
    }

    /// Reconciles the index entry of a key with its reloaded value.
    pub fn on_unswap(&self, space: &SpaceName, key: &Value, value: Value) -> CoreResult<UnswapOutcome> {
        self.with_running(|_| self.store.on_unswap(space, key, value))
    }

    /// Like [`on_unswap`](Self::on_unswap), with the value in its CBOR
    /// encoding.
    pub fn on_unswap_bytes(
        &self,
        space: &SpaceName,
        key: &Value,
        bytes: &[u8],
    ) -> CoreResult<UnswapOutcome> {
        self.with_running(|_| self.store.on_unswap_bytes(space, key, bytes))
    }

    /// Counts the live entries of a type visible through `filter`.
    ///
    /// Returns [`UNKNOWN_TYPE_SIZE`] if the type is not registered.
    pub fn size(
        &self,
        space: &SpaceName,
        descriptor: &TypeDescriptor,
        filter: Option<Arc<dyn QueryFilter>>,
    ) -> CoreResult<i64> {
        self.with_running(|context| {
            let now = context.clock().now_millis();
            Ok(self
                .store
                .size(space, &descriptor.name, filter.as_deref(), now)
                .map_or(UNKNOWN_TYPE_SIZE, |n| i64::try_from(n).unwrap_or(i64::MAX)))
        })
    }

    /// Runs a `SELECT` statement and streams the selected fields.
    pub fn query_fields(
        &self,
        space: &SpaceName,
        text: &str,
        params: &[Value],
        filter: Option<Arc<dyn QueryFilter>>,
    ) -> CoreResult<FieldsCursor> {
        self.with_running(|context| {
            let cx = self.query_context(context, space, filter);
            query::query_fields(&self.store, cx, text, params)
        })
    }

    /// Runs a clause against one type and streams `(key, value)` rows.
    pub fn query(
        &self,
        space: &SpaceName,
        text: &str,
        params: &[Value],
        descriptor: &TypeDescriptor,
        filter: Option<Arc<dyn QueryFilter>>,
    ) -> CoreResult<RowCursor> {
        self.with_running(|context| {
            let cx = self.query_context(context, space, filter);
            query::query_rows(&self.store, cx, &descriptor.name, text, params)
        })
    }

    /// Runs a text search against one type, best match first.
    pub fn query_text(
        &self,
        space: &SpaceName,
        text: &str,
        descriptor: &TypeDescriptor,
        filter: Option<Arc<dyn QueryFilter>>,
    ) -> CoreResult<RowCursor> {
        self.with_running(|context| {
            let cx = self.query_context(context, space, filter);
            query::query_text(&self.store, cx, &descriptor.name, text)
        })
    }

    /// Re-derives the indexes of a type from the cache component.
    ///
    /// Queries keep running while the fresh indexes are built; the swap
    /// briefly blocks queries against the type.
    ///
    /// # Errors
    ///
    /// - [`CoreError::ComponentMissing`] if no cache is registered
    /// - [`CoreError::Schema`] if the type is not registered
    /// - [`CoreError::InvalidOperation`] if the type was re-registered
    ///   while the rebuild ran
    pub fn rebuild_indexes(
        &self,
        space: &SpaceName,
        descriptor: &TypeDescriptor,
    ) -> CoreResult<RebuildReport> {
        self.with_running(|context| {
            let source: Arc<dyn CacheSource> = context
                .cache_source()
                .ok_or(CoreError::ComponentMissing(ComponentKind::Cache))?;
            info!(%space, type_name = %descriptor.name, "rebuilding indexes");
            let report = self.store.rebuild(space, &descriptor.name, source.as_ref())?;
            info!(
                %space,
                type_name = %descriptor.name,
                indexed = report.indexed,
                skipped = report.skipped,
                dropped = report.dropped,
                reconciled = report.reconciled,
                "rebuild complete"
            );
            Ok(report)
        })
    }

    /// Runs [`rebuild_indexes`](Self::rebuild_indexes) on a background
    /// thread.
    pub fn spawn_rebuild(
        self: &Arc<Self>,
        space: SpaceName,
        descriptor: TypeDescriptor,
    ) -> CoreResult<JoinHandle<CoreResult<RebuildReport>>> {
        self.with_running(|_| Ok(()))?;
        let engine = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name(format!("gridix-rebuild-{}", descriptor.name))
            .spawn(move || engine.rebuild_indexes(&space, &descriptor))?;
        Ok(handle)
    }

    /// Purges expired entries of every type in a space.
    pub fn purge_expired(&self, space: &SpaceName) -> CoreResult<usize> {
        self.with_running(|context| {
            let purged = self.store.purge_expired(space, context.clock().now_millis());
            if purged > 0 {
                debug!(%space, purged, "purged expired entries");
            }
            Ok(purged)
        })
    }

    /// Describes the index tables of a space.
    pub fn inspect(&self, space: &SpaceName) -> CoreResult<Vec<TableInfo>> {
        self.with_running(|context| Ok(self.store.inspect(space, context.clock().now_millis())))
    }

    /// Returns the registered types of a space.
    pub fn types(&self, space: &SpaceName) -> CoreResult<Vec<Arc<TypeDescriptor>>> {
        self.with_running(|_| Ok(self.registry.types(space)))
    }

    /// Returns the engine statistics.
    pub fn stats(&self) -> &IndexingStats {
        &self.stats
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &IndexingConfig {
        &self.config
    }
}

impl Component for IndexingEngine {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Indexing
    }

    fn name(&self) -> &str {
        "indexing"
    }
}

impl fmt::Debug for IndexingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexingEngine")
            .field("config", &self.config)
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{GridState, MemoryCache};
    use crate::schema::{FieldDescriptor, FieldType};

    fn person() -> TypeDescriptor {
        TypeDescriptor::new("Person")
            .field(FieldDescriptor::new("age", FieldType::Integer).indexed())
    }

    fn started(config: IndexingConfig) -> (Arc<IndexingEngine>, Arc<GridContext>, Arc<MemoryCache>) {
        let context = Arc::new(GridContext::new("test"));
        let cache = Arc::new(MemoryCache::new());
        context
            .components()
            .add(Arc::clone(&cache) as Arc<dyn Component>)
            .unwrap();
        let engine = Arc::new(IndexingEngine::new(config));
        engine.start(Arc::clone(&context)).unwrap();
        (engine, context, cache)
    }

    #[test]
    fn operations_require_a_started_engine() {
        let engine = IndexingEngine::new(IndexingConfig::default());
        let err = engine.register_type(&SpaceName::DEFAULT, person()).unwrap_err();
        assert!(matches!(err, CoreError::NotStarted));
        assert!(err.is_lifecycle());
    }

    #[test]
    fn start_registers_component_and_stop_releases_it() {
        let (engine, context, _) = started(IndexingConfig::default());
        assert!(engine.is_started());
        assert!(context.components().get(ComponentKind::Indexing).is_some());
        assert!(matches!(
            engine.start(Arc::clone(&context)),
            Err(CoreError::AlreadyStarted)
        ));

        engine.register_type(&SpaceName::DEFAULT, person()).unwrap();
        engine.stop();
        assert!(!engine.is_started());
        assert!(context.components().get(ComponentKind::Indexing).is_none());
        assert!(matches!(
            engine.size(&SpaceName::DEFAULT, &person(), None),
            Err(CoreError::NotStarted)
        ));

        // Restart begins from an empty registry.
        engine.start(Arc::clone(&context)).unwrap();
        assert_eq!(engine.size(&SpaceName::DEFAULT, &person(), None).unwrap(), UNKNOWN_TYPE_SIZE);
    }

    #[test]
    fn stopping_context_fails_operations() {
        let (engine, context, _) = started(IndexingConfig::default());
        context.set_state(GridState::Stopping);
        assert!(matches!(
            engine.remove(&SpaceName::DEFAULT, &Value::Integer(1)),
            Err(CoreError::ContextStopping)
        ));

        let other = Arc::new(IndexingEngine::new(IndexingConfig::default()));
        assert!(matches!(other.start(context), Err(CoreError::ContextStopping)));
    }

    #[test]
    fn second_engine_in_one_context_is_rejected() {
        let (_engine, context, _) = started(IndexingConfig::default());
        let second = Arc::new(IndexingEngine::new(IndexingConfig::default()));
        assert!(matches!(
            second.start(context),
            Err(CoreError::DuplicateComponent(ComponentKind::Indexing))
        ));
        assert!(!second.is_started());
    }

    #[test]
    fn conflicting_registration_under_reject_policy() {
        let (engine, _, _) = started(
            IndexingConfig::new().schema_conflict(SchemaConflictPolicy::Reject),
        );
        let space = SpaceName::DEFAULT;
        assert!(engine.register_type(&space, person()).unwrap());
        assert!(engine.register_type(&space, person()).unwrap());

        let changed = TypeDescriptor::new("person")
            .field(FieldDescriptor::new("name", FieldType::Text));
        assert!(!engine.register_type(&space, changed).unwrap());
        assert_eq!(engine.types(&space).unwrap()[0].fields[0].name, "age");
    }

    #[test]
    fn replacing_a_descriptor_reprojects_entries() {
        let (engine, _, cache) = started(IndexingConfig::default());
        let space = SpaceName::DEFAULT;
        engine.register_type(&space, person()).unwrap();

        let value = Value::object([("age", Value::Integer(30)), ("name", Value::from("ann"))]);
        cache.put(&space, "Person", Value::Integer(1), value.clone(), Version::from_u64(1));
        engine
            .store(&space, &person(), Value::Integer(1), value, Version::from_u64(1), 0)
            .unwrap();
        engine.on_swap(&space, &Value::Integer(1)).unwrap();

        let with_name = person().field(FieldDescriptor::new("name", FieldType::Text).indexed());
        assert!(engine.register_type(&space, with_name).unwrap());

        let rows: Vec<_> = engine
            .query_fields(&space, "SELECT name FROM Person WHERE name = 'ann'", &[], None)
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(rows, vec![vec![Value::from("ann")]]);
    }

    #[test]
    fn unregister_cascades() {
        let (engine, _, _) = started(IndexingConfig::default());
        let space = SpaceName::named("s");
        engine.register_type(&space, person()).unwrap();
        engine
            .store(&space, &person(), Value::Integer(1), Value::object([("age", 1)]), Version::from_u64(1), 0)
            .unwrap();
        assert_eq!(engine.size(&space, &person(), None).unwrap(), 1);

        engine.unregister_type(&space, &person()).unwrap();
        assert_eq!(engine.size(&space, &person(), None).unwrap(), UNKNOWN_TYPE_SIZE);
        assert!(matches!(
            engine.query(&space, "", &[], &person(), None),
            Err(CoreError::Schema { .. })
        ));
        // Unknown types are a no-op.
        engine.unregister_type(&space, &person()).unwrap();
    }

    #[test]
    fn rebuild_needs_a_cache_component() {
        let context = Arc::new(GridContext::new("bare"));
        let engine = Arc::new(IndexingEngine::new(IndexingConfig::default()));
        engine.start(context).unwrap();
        engine.register_type(&SpaceName::DEFAULT, person()).unwrap();

        let err = engine.rebuild_indexes(&SpaceName::DEFAULT, &person()).unwrap_err();
        assert!(matches!(err, CoreError::ComponentMissing(ComponentKind::Cache)));
    }

    #[test]
    fn spawned_rebuild_reports_back() {
        let (engine, _, cache) = started(IndexingConfig::default());
        let space = SpaceName::DEFAULT;
        engine.register_type(&space, person()).unwrap();
        for key in 0..10 {
            cache.put(&space, "Person", Value::Integer(key), Value::object([("age", key)]), Version::from_u64(1));
        }

        let report = engine
            .spawn_rebuild(space.clone(), person())
            .unwrap()
            .join()
            .unwrap()
            .unwrap();
        assert_eq!(report.indexed, 10);
        assert_eq!(engine.size(&space, &person(), None).unwrap(), 10);
        assert_eq!(engine.stats().snapshot().rebuilds, 1);
    }
}
