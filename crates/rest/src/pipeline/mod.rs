//! Request pipelines.
//!
//! Every [`Endpoint`] is served by a fixed [`Pipeline`]: an ordered list of
//! [`Stage`]s sharing one [`RequestContext`]. The runner invokes every
//! stage. A failing stage is logged and its error rendered into the
//! context; the business stages after it see [`RequestContext::in_error`]
//! and step aside, while [`Finalize`] still runs.
//!
//! | Order | Stage | Endpoints |
//! |-------|-------|-----------|
//! | 1 | [`ValidateInput`] | all |
//! | 2 | [`LoadCollectionProps`] | all |
//! | 3 | [`MetadataValidation`] | collection PUT / PATCH |
//! | 4 | [`SchemaStoreValidation`] | document writes |
//! | 5 | [`RequestTransformers`] | document writes |
//! | 6 | [`Checkers`] | document writes |
//! | 7 | [`Crud`] | all |
//! | 8 | [`ResponseTransformers`] | collection and document GET |
//! | 9 | [`Representation`] | all |
//! | 10 | [`Finalize`] | all, also on error |

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use docgate_persistence::core::DocumentStore;
use tracing::{debug, error};

use crate::context::RequestContext;
use crate::endpoint::Endpoint;
use crate::error::RestResult;
use crate::state::AppState;

mod stages;

pub use stages::{
    Checkers, Crud, Finalize, LoadCollectionProps, MetadataValidation, Representation,
    RequestTransformers, ResponseTransformers, SchemaStoreValidation, ValidateInput,
};

/// One step of a request pipeline.
#[async_trait]
pub trait Stage<S>: Send + Sync {
    /// Stage name, used in logs.
    fn name(&self) -> &'static str;

    /// Processes the request.
    async fn handle(&self, state: &AppState<S>, ctx: &mut RequestContext) -> RestResult<()>;
}

/// An ordered list of stages.
pub struct Pipeline<S> {
    stages: Vec<Arc<dyn Stage<S>>>,
}

impl<S> Clone for Pipeline<S> {
    fn clone(&self) -> Self {
        Self {
            stages: self.stages.clone(),
        }
    }
}

impl<S> fmt::Debug for Pipeline<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.stages.iter().map(|s| s.name()))
            .finish()
    }
}

impl<S: DocumentStore + 'static> Pipeline<S> {
    /// Creates a pipeline from its stages.
    pub fn new(stages: Vec<Arc<dyn Stage<S>>>) -> Self {
        Self { stages }
    }

    /// Builds the standard pipeline of an endpoint.
    pub fn standard(endpoint: Endpoint) -> Self {
        let mut stages: Vec<Arc<dyn Stage<S>>> =
            vec![Arc::new(ValidateInput), Arc::new(LoadCollectionProps)];
        if endpoint.writes_collection() {
            stages.push(Arc::new(MetadataValidation));
        }
        if endpoint.writes_documents() {
            stages.push(Arc::new(SchemaStoreValidation));
            stages.push(Arc::new(RequestTransformers));
            stages.push(Arc::new(Checkers));
        }
        stages.push(Arc::new(Crud));
        if matches!(endpoint, Endpoint::GetCollection | Endpoint::GetDocument) {
            stages.push(Arc::new(ResponseTransformers));
        }
        stages.push(Arc::new(Representation));
        stages.push(Arc::new(Finalize));
        Self::new(stages)
    }

    /// Returns the stage names in order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Runs every stage over the context.
    pub async fn run(&self, state: &AppState<S>, ctx: &mut RequestContext) {
        for stage in &self.stages {
            if let Err(err) = stage.handle(state, ctx).await {
                if err.is_server_error() {
                    error!(stage = stage.name(), path = %ctx.path, error = %err, "Stage failed");
                } else {
                    debug!(stage = stage.name(), path = %ctx.path, error = %err, "Stage rejected request");
                }
                ctx.fail(&err, state.debug_errors());
            }
        }
    }
}

/// The pipeline of every endpoint.
pub struct Pipelines<S> {
    by_endpoint: HashMap<Endpoint, Pipeline<S>>,
}

impl<S> fmt::Debug for Pipelines<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.by_endpoint.iter()).finish()
    }
}

impl<S: DocumentStore + 'static> Pipelines<S> {
    /// Builds the standard pipeline of every endpoint.
    pub fn standard() -> Self {
        let by_endpoint = Endpoint::ALL
            .iter()
            .map(|endpoint| (*endpoint, Pipeline::standard(*endpoint)))
            .collect();
        Self { by_endpoint }
    }

    /// Replaces the pipeline of an endpoint.
    pub fn insert(&mut self, endpoint: Endpoint, pipeline: Pipeline<S>) {
        self.by_endpoint.insert(endpoint, pipeline);
    }

    /// Returns the pipeline of an endpoint.
    pub fn get(&self, endpoint: Endpoint) -> Option<&Pipeline<S>> {
        self.by_endpoint.get(&endpoint)
    }
}
