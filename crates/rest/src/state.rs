//! Application state for the DocGate REST API.
//!
//! This module defines the shared application state that is available to all
//! request handlers: the CRUD engine, configuration, the metadata registry,
//! the metadata cache and the request pipelines.

use std::sync::Arc;

use docgate_persistence::core::DocumentStore;
use docgate_persistence::engine::Engine;

use crate::cache::PropsCache;
use crate::config::{EtagPolicy, ServerConfig};
use crate::metadata::MetadataRegistry;
use crate::pipeline::Pipelines;

/// Shared application state for the REST API.
///
/// # Type Parameters
///
/// * `S` - The document store (must implement [`DocumentStore`])
///
/// # Example
///
/// ```rust,ignore
/// use docgate_rest::{AppState, ServerConfig};
/// use docgate_persistence::backends::sqlite::SqliteStore;
/// use std::sync::Arc;
///
/// let store = SqliteStore::in_memory()?;
/// let state = AppState::new(Arc::new(store), ServerConfig::default());
/// ```
pub struct AppState<S> {
    engine: Engine<S>,
    config: Arc<ServerConfig>,
    registry: Arc<MetadataRegistry>,
    props_cache: Arc<PropsCache>,
    pipelines: Arc<Pipelines<S>>,
}

// S sits behind Arc and need not be Clone
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            config: Arc::clone(&self.config),
            registry: Arc::clone(&self.registry),
            props_cache: Arc::clone(&self.props_cache),
            pipelines: Arc::clone(&self.pipelines),
        }
    }
}

impl<S: DocumentStore + 'static> AppState<S> {
    /// Creates a new AppState with the default checkers and transformers.
    pub fn new(store: Arc<S>, config: ServerConfig) -> Self {
        Self::with_registry(store, config, MetadataRegistry::with_defaults())
    }

    /// Creates a new AppState with a custom metadata registry.
    pub fn with_registry(store: Arc<S>, config: ServerConfig, registry: MetadataRegistry) -> Self {
        let props_cache = PropsCache::from_config(&config);
        Self {
            engine: Engine::new(store),
            config: Arc::new(config),
            registry: Arc::new(registry),
            props_cache: Arc::new(props_cache),
            pipelines: Arc::new(Pipelines::standard()),
        }
    }

    /// Returns the CRUD engine.
    pub fn engine(&self) -> &Engine<S> {
        &self.engine
    }

    /// Returns the document store.
    pub fn store(&self) -> &S {
        self.engine.store()
    }

    /// Returns a reference to the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the checker and transformer registry.
    pub fn registry(&self) -> &MetadataRegistry {
        &self.registry
    }

    /// Returns the metadata cache.
    pub fn props_cache(&self) -> &PropsCache {
        &self.props_cache
    }

    /// Returns the request pipelines.
    pub fn pipelines(&self) -> &Pipelines<S> {
        &self.pipelines
    }

    /// Returns the etag policy for collection writes and deletes.
    pub fn coll_etag_policy(&self) -> EtagPolicy {
        self.config.coll_etag_policy
    }

    /// Returns the default etag policy for document writes and deletes.
    pub fn doc_etag_policy(&self) -> EtagPolicy {
        self.config.doc_etag_policy
    }

    /// Returns whether error documents include internal details.
    pub fn debug_errors(&self) -> bool {
        self.config.debug_errors
    }
}
