//! REST API handlers

use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use berth_core::{
    ApiConfig, BerthError, Cluster, Deployment, NewDeployment, PassSummary, QueueEntry, Resources,
};
use berth_scheduler::Scheduler;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

/// Application state shared across handlers
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
}

/// Create the API router
pub fn create_router(scheduler: Arc<Scheduler>, config: &ApiConfig) -> Router {
    let state = Arc::new(AppState { scheduler });

    let router = Router::new()
        .route("/api/v1/clusters", post(create_cluster).get(list_clusters))
        .route("/api/v1/clusters/:id", get(get_cluster))
        .route(
            "/api/v1/clusters/:id/deployments",
            get(list_cluster_deployments),
        )
        .route("/api/v1/deployments", post(create_deployment))
        .route(
            "/api/v1/deployments/:id",
            get(get_deployment).delete(delete_deployment),
        )
        .route("/api/v1/deployments/:id/submit", post(submit_deployment))
        .route("/api/v1/queue", get(get_queue))
        .route("/api/v1/scheduler/trigger", post(trigger_scheduler))
        .route("/api/v1/status", get(get_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.cors_enabled {
        router.layer(cors_layer(&config.cors_origins))
    } else {
        router
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new().allow_origin(AllowOrigin::list(allowed))
}

/// Map a scheduler error onto an HTTP status and message body
fn error_response(e: BerthError) -> (StatusCode, String) {
    let status = match &e {
        e if e.is_not_found() => StatusCode::NOT_FOUND,
        BerthError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

/// Request to register a cluster
#[derive(Debug, Deserialize)]
pub struct CreateClusterRequest {
    pub name: String,
    pub total_ram: u64,
    pub total_cpu: u64,
    #[serde(default)]
    pub total_gpu: u64,
}

/// Response for a cluster
#[derive(Debug, Serialize, Deserialize)]
pub struct ClusterResponse {
    pub id: Uuid,
    pub name: String,
    pub total_ram: u64,
    pub total_cpu: u64,
    pub total_gpu: u64,
    pub available_ram: u64,
    pub available_cpu: u64,
    pub available_gpu: u64,
    pub created_at: DateTime<Utc>,
}

impl From<Cluster> for ClusterResponse {
    fn from(cluster: Cluster) -> Self {
        Self {
            id: cluster.id,
            name: cluster.name,
            total_ram: cluster.total.ram,
            total_cpu: cluster.total.cpu,
            total_gpu: cluster.total.gpu,
            available_ram: cluster.available.ram,
            available_cpu: cluster.available.cpu,
            available_gpu: cluster.available.gpu,
            created_at: cluster.created_at,
        }
    }
}

/// Request to create a deployment
#[derive(Debug, Deserialize)]
pub struct CreateDeploymentRequest {
    pub cluster_id: Uuid,
    /// Container image reference
    #[serde(alias = "docker_image")]
    pub image: String,
    pub required_ram: u64,
    pub required_cpu: u64,
    #[serde(default)]
    pub required_gpu: u64,
    /// Lower value is scheduled first
    #[serde(default)]
    pub priority: i64,
}

/// Response for a deployment
#[derive(Debug, Serialize, Deserialize)]
pub struct DeploymentResponse {
    pub id: Uuid,
    pub cluster_id: Uuid,
    pub image: String,
    pub required_ram: u64,
    pub required_cpu: u64,
    pub required_gpu: u64,
    pub priority: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<Deployment> for DeploymentResponse {
    fn from(deployment: Deployment) -> Self {
        Self {
            id: deployment.id,
            cluster_id: deployment.cluster_id,
            image: deployment.image,
            required_ram: deployment.requirements.ram,
            required_cpu: deployment.requirements.cpu,
            required_gpu: deployment.requirements.gpu,
            priority: deployment.priority,
            status: deployment.status.to_string(),
            created_at: deployment.created_at,
        }
    }
}

/// Register a new cluster
async fn create_cluster(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateClusterRequest>,
) -> Result<(StatusCode, Json<ClusterResponse>), (StatusCode, String)> {
    let cluster = state
        .scheduler
        .create_cluster(
            req.name,
            Resources::new(req.total_ram, req.total_cpu, req.total_gpu),
        )
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(ClusterResponse::from(cluster))))
}

/// List all clusters
async fn list_clusters(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ClusterResponse>>, (StatusCode, String)> {
    let clusters = state
        .scheduler
        .list_clusters()
        .await
        .map_err(error_response)?;
    Ok(Json(clusters.into_iter().map(ClusterResponse::from).collect()))
}

/// Get a specific cluster
async fn get_cluster(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ClusterResponse>, (StatusCode, String)> {
    let cluster = state
        .scheduler
        .get_cluster(id)
        .await
        .map_err(error_response)?;
    Ok(Json(ClusterResponse::from(cluster)))
}

/// List the deployments targeting a cluster
async fn list_cluster_deployments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DeploymentResponse>>, (StatusCode, String)> {
    let deployments = state
        .scheduler
        .list_cluster_deployments(id)
        .await
        .map_err(error_response)?;
    Ok(Json(
        deployments
            .into_iter()
            .map(DeploymentResponse::from)
            .collect(),
    ))
}

/// Create a deployment and submit it for scheduling
async fn create_deployment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateDeploymentRequest>,
) -> Result<(StatusCode, Json<DeploymentResponse>), (StatusCode, String)> {
    info!(
        cluster_id = %req.cluster_id,
        image = %req.image,
        priority = req.priority,
        "Creating deployment"
    );

    let deployment = state
        .scheduler
        .create_deployment(NewDeployment {
            cluster_id: req.cluster_id,
            image: req.image,
            requirements: Resources::new(req.required_ram, req.required_cpu, req.required_gpu),
            priority: req.priority,
        })
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(DeploymentResponse::from(deployment))))
}

/// Get a specific deployment
async fn get_deployment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeploymentResponse>, (StatusCode, String)> {
    let deployment = state
        .scheduler
        .get_deployment(id)
        .await
        .map_err(error_response)?;
    Ok(Json(DeploymentResponse::from(deployment)))
}

/// Delete a deployment record
async fn delete_deployment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    info!(deployment_id = %id, "Deleting deployment");

    state
        .scheduler
        .delete_deployment(id)
        .await
        .map_err(error_response)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Request to (re-)submit a deployment
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub priority: i64,
}

/// Put an existing deployment back on the queue with a new priority
async fn submit_deployment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<DeploymentResponse>, (StatusCode, String)> {
    let deployment = state
        .scheduler
        .get_deployment(id)
        .await
        .map_err(error_response)?;

    info!(deployment_id = %id, priority = req.priority, "Submitting deployment");

    state
        .scheduler
        .submit(id, req.priority)
        .await
        .map_err(error_response)?;

    Ok(Json(DeploymentResponse::from(deployment)))
}

/// Ordered view of the pending queue
async fn get_queue(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<QueueEntry>>, (StatusCode, String)> {
    let entries = state
        .scheduler
        .pending_queue()
        .await
        .map_err(error_response)?;
    Ok(Json(entries))
}

/// Response for a manual scheduling pass
#[derive(Debug, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub success: bool,
    pub message: String,
    pub summary: PassSummary,
}

/// Run one scheduling pass now
async fn trigger_scheduler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TriggerResponse>, (StatusCode, String)> {
    info!("Manual scheduling pass requested");

    let summary = state.scheduler.run_pass().await.map_err(error_response)?;

    Ok(Json(TriggerResponse {
        success: true,
        message: "Scheduler triggered successfully".to_string(),
        summary,
    }))
}

/// System status response
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub clusters: usize,
    pub deployments_pending: usize,
    pub deployments_running: usize,
    pub queue_length: usize,
    pub passes_completed: u64,
    pub passes_failed: u64,
    pub last_pass: Option<PassSummary>,
}

/// Get system status
async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    let stats = state.scheduler.stats().await.map_err(error_response)?;

    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        clusters: stats.clusters,
        deployments_pending: stats.deployments_pending,
        deployments_running: stats.deployments_running,
        queue_length: stats.queue_length,
        passes_completed: stats.passes_completed,
        passes_failed: stats.passes_failed,
        last_pass: stats.last_pass,
    }))
}
