//! API Handlers
//!
//! HTTP request handlers for each admin endpoint.
//!
//! Handlers that need both locks take the store lock before the registry
//! lock.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tokio::sync::RwLock;
use tracing::info;

use crate::config::{Config, SiteConfig};
use crate::error::{RecordError, Result};
use crate::model::{AppendConsistency, Record, RecordType};
use crate::models::{
    AppendLogRequest, ContentTypeResponse, CreateUserRequest, HealthResponse, RecordResponse,
    StatsResponse, WriteRecordRequest,
};
use crate::registry::ContentTypeRegistry;
use crate::store::{MemoryStore, RecordId};
use crate::users::{user_type, UserManager};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Thread-safe row storage and content type catalog
    pub store: Arc<RwLock<MemoryStore>>,
    /// Cached view of the catalog, refreshed in the background
    pub registry: Arc<RwLock<ContentTypeRegistry>>,
    pub users: UserManager,
    pub site: SiteConfig,
    /// Consistency used for appends that do not ask for one
    pub append_consistency: AppendConsistency,
}

impl AppState {
    /// Creates a new AppState around `store`.
    ///
    /// Installs the user record type and seeds the registry from the
    /// store's catalog.
    pub fn new(mut store: MemoryStore, config: &Config) -> Result<Self> {
        let users = Arc::new(user_type()?);
        store.register_type(users.clone());
        let registry = ContentTypeRegistry::seeded(&store)?;

        Ok(Self {
            store: Arc::new(RwLock::new(store)),
            registry: Arc::new(RwLock::new(registry)),
            users: UserManager::new(users),
            site: config.site.clone(),
            append_consistency: config.append_consistency,
        })
    }

    /// Creates a new AppState with an empty store.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(MemoryStore::new(), config)
    }

    async fn resolve_type(
        &self,
        store: &MemoryStore,
        app_label: &str,
        model: &str,
    ) -> Result<Arc<RecordType>> {
        let mut registry = self.registry.write().await;
        registry.resolve(app_label, model, store)
    }
}

/// Handler for POST /records/:app/:model
///
/// Creates a record from the given field values.
pub async fn create_record_handler(
    State(state): State<AppState>,
    Path((app_label, model)): Path<(String, String)>,
    Json(req): Json<WriteRecordRequest>,
) -> Result<(StatusCode, Json<RecordResponse>)> {
    if let Some(error_msg) = req.validate() {
        return Err(RecordError::InvalidRequest(error_msg));
    }

    let mut store = state.store.write().await;
    let record_type = state.resolve_type(&store, &app_label, &model).await?;

    let mut record = Record::new(record_type);
    record.set_many(req.fields)?;
    record.save(&mut *store)?;
    info!("Created {}", record.as_str_fallback());

    Ok((
        StatusCode::CREATED,
        Json(RecordResponse::new(&record, &state.site)),
    ))
}

/// Handler for GET /records/:app/:model/:id
pub async fn get_record_handler(
    State(state): State<AppState>,
    Path((app_label, model, id)): Path<(String, String, RecordId)>,
) -> Result<Json<RecordResponse>> {
    let mut store = state.store.write().await;
    let record_type = state.resolve_type(&store, &app_label, &model).await?;
    let record = Record::get(&mut *store, record_type, id)?;

    Ok(Json(RecordResponse::new(&record, &state.site)))
}

/// Handler for PATCH /records/:app/:model/:id
///
/// Assigns the given field values and saves. The cache token is refreshed
/// when a designated cache field changes.
pub async fn update_record_handler(
    State(state): State<AppState>,
    Path((app_label, model, id)): Path<(String, String, RecordId)>,
    Json(req): Json<WriteRecordRequest>,
) -> Result<Json<RecordResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(RecordError::InvalidRequest(error_msg));
    }

    let mut store = state.store.write().await;
    let record_type = state.resolve_type(&store, &app_label, &model).await?;

    let mut record = Record::get(&mut *store, record_type, id)?;
    record.set_many(req.fields)?;
    record.save(&mut *store)?;

    Ok(Json(RecordResponse::new(&record, &state.site)))
}

/// Handler for POST /records/:app/:model/:id/log
///
/// Appends one entry to the record's change log.
pub async fn append_log_handler(
    State(state): State<AppState>,
    Path((app_label, model, id)): Path<(String, String, RecordId)>,
    Json(req): Json<AppendLogRequest>,
) -> Result<Json<RecordResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(RecordError::InvalidRequest(error_msg));
    }

    let mut store = state.store.write().await;
    let record_type = state.resolve_type(&store, &app_label, &model).await?;

    let mut record = Record::get(&mut *store, record_type, id)?;
    let options = req.to_options(state.append_consistency);
    record.append_to_log(&mut *store, &req.text, &options)?;

    Ok(Json(RecordResponse::new(&record, &state.site)))
}

/// Handler for POST /users
pub async fn create_user_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<RecordResponse>)> {
    if let Some(error_msg) = req.validate() {
        return Err(RecordError::InvalidRequest(error_msg));
    }

    let mut store = state.store.write().await;
    let user = if req.superuser {
        state
            .users
            .create_superuser(&mut *store, &req.email, req.fields)?
    } else {
        state.users.create_user(&mut *store, &req.email, req.fields)?
    };

    Ok((
        StatusCode::CREATED,
        Json(RecordResponse::new(user.record(), &state.site)),
    ))
}

/// Handler for GET /types
///
/// Lists content types that still resolve to an installed record type.
pub async fn list_types_handler(State(state): State<AppState>) -> Json<Vec<ContentTypeResponse>> {
    let registry = state.registry.read().await;
    Json(
        registry
            .valid_content_types()
            .filter_map(ContentTypeResponse::from_content_type)
            .collect(),
    )
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.store.read().await.stats();
    let content_types = state.registry.read().await.len();

    Json(StatsResponse::new(stats, content_types))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
