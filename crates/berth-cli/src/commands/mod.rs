//! CLI commands implementation

use anyhow::Result;
use berth_core::{PassSummary, QueueEntry};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// API client for communicating with the daemon
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Cluster response from API
#[derive(Debug, Deserialize)]
pub struct ClusterResponse {
    pub id: Uuid,
    pub name: String,
    pub total_ram: u64,
    pub total_cpu: u64,
    pub total_gpu: u64,
    pub available_ram: u64,
    pub available_cpu: u64,
    pub available_gpu: u64,
}

/// Deployment response from API
#[derive(Debug, Deserialize)]
pub struct DeploymentResponse {
    pub id: Uuid,
    pub cluster_id: Uuid,
    pub image: String,
    pub required_ram: u64,
    pub required_cpu: u64,
    pub required_gpu: u64,
    pub priority: i64,
    pub status: String,
}

/// Manual pass response
#[derive(Debug, Deserialize)]
pub struct TriggerResponse {
    pub message: String,
    pub summary: PassSummary,
}

/// Status response
#[derive(Debug, Deserialize)]
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

/// Register a cluster
pub async fn cluster_create(
    client: &ApiClient,
    name: String,
    ram: u64,
    cpu: u64,
    gpu: u64,
) -> Result<()> {
    #[derive(Serialize)]
    struct CreateRequest {
        name: String,
        total_ram: u64,
        total_cpu: u64,
        total_gpu: u64,
    }

    let response = client
        .client
        .post(client.url("/api/v1/clusters"))
        .json(&CreateRequest {
            name,
            total_ram: ram,
            total_cpu: cpu,
            total_gpu: gpu,
        })
        .send()
        .await?;

    if response.status().is_success() {
        let cluster: ClusterResponse = response.json().await?;
        println!("Cluster '{}' created successfully", cluster.name);
        print_cluster_details(&cluster);
    } else {
        let error = response.text().await?;
        eprintln!("Failed to create cluster: {}", error);
    }

    Ok(())
}

/// List all clusters
pub async fn cluster_list(client: &ApiClient) -> Result<()> {
    let response = client
        .client
        .get(client.url("/api/v1/clusters"))
        .send()
        .await?;

    if response.status().is_success() {
        let clusters: Vec<ClusterResponse> = response.json().await?;

        if clusters.is_empty() {
            println!("No clusters found");
        } else {
            println!(
                "{:<36} {:<20} {:<20} {:<12} {:<8}",
                "ID", "NAME", "RAM (FREE/TOTAL)", "CPU", "GPU"
            );
            println!("{}", "-".repeat(100));
            for c in clusters {
                println!(
                    "{:<36} {:<20} {:<20} {:<12} {:<8}",
                    c.id,
                    c.name,
                    format!("{}/{}", c.available_ram, c.total_ram),
                    format!("{}/{}", c.available_cpu, c.total_cpu),
                    format!("{}/{}", c.available_gpu, c.total_gpu),
                );
            }
        }
    } else {
        let error = response.text().await?;
        eprintln!("Failed to list clusters: {}", error);
    }

    Ok(())
}

/// Show a cluster and its deployments
pub async fn cluster_get(client: &ApiClient, id: Uuid) -> Result<()> {
    let response = client
        .client
        .get(client.url(&format!("/api/v1/clusters/{}", id)))
        .send()
        .await?;

    if !response.status().is_success() {
        let error = response.text().await?;
        eprintln!("Cluster not found: {}", error);
        return Ok(());
    }

    let cluster: ClusterResponse = response.json().await?;
    println!("Cluster: {}", cluster.name);
    print_cluster_details(&cluster);

    let deployments = cluster_deployments(client, id).await?;
    if !deployments.is_empty() {
        println!("\nDeployments:");
        print_deployment_table(&deployments);
    }

    Ok(())
}

/// Create a deployment
pub async fn deploy(
    client: &ApiClient,
    cluster_id: Uuid,
    image: String,
    ram: u64,
    cpu: u64,
    gpu: u64,
    priority: i64,
) -> Result<()> {
    #[derive(Serialize)]
    struct CreateRequest {
        cluster_id: Uuid,
        image: String,
        required_ram: u64,
        required_cpu: u64,
        required_gpu: u64,
        priority: i64,
    }

    let req = CreateRequest {
        cluster_id,
        image,
        required_ram: ram,
        required_cpu: cpu,
        required_gpu: gpu,
        priority,
    };

    let response = client
        .client
        .post(client.url("/api/v1/deployments"))
        .json(&req)
        .send()
        .await?;

    if response.status().is_success() {
        let deployment: DeploymentResponse = response.json().await?;
        println!("Deployment '{}' submitted", deployment.image);
        print_deployment_details(&deployment);
    } else {
        let error = response.text().await?;
        eprintln!("Failed to create deployment: {}", error);
    }

    Ok(())
}

/// Delete a deployment
pub async fn delete(client: &ApiClient, id: Uuid) -> Result<()> {
    let response = client
        .client
        .delete(client.url(&format!("/api/v1/deployments/{}", id)))
        .send()
        .await?;

    if response.status().is_success() {
        println!("Deployment '{}' deleted", id);
    } else {
        let error = response.text().await?;
        eprintln!("Failed to delete deployment: {}", error);
    }

    Ok(())
}

/// Re-submit a deployment with a new priority
pub async fn submit(client: &ApiClient, id: Uuid, priority: i64) -> Result<()> {
    #[derive(Serialize)]
    struct SubmitRequest {
        priority: i64,
    }

    let response = client
        .client
        .post(client.url(&format!("/api/v1/deployments/{}/submit", id)))
        .json(&SubmitRequest { priority })
        .send()
        .await?;

    if response.status().is_success() {
        println!("Deployment '{}' queued with priority {}", id, priority);
    } else {
        let error = response.text().await?;
        eprintln!("Failed to submit deployment: {}", error);
    }

    Ok(())
}

/// Get deployment status
pub async fn status(client: &ApiClient, deployment: Option<Uuid>) -> Result<()> {
    match deployment {
        Some(id) => {
            let response = client
                .client
                .get(client.url(&format!("/api/v1/deployments/{}", id)))
                .send()
                .await?;

            if response.status().is_success() {
                let dep: DeploymentResponse = response.json().await?;
                print_deployment_details(&dep);
            } else {
                let error = response.text().await?;
                eprintln!("Deployment not found: {}", error);
            }
        }
        None => {
            // Show deployments across every cluster
            let response = client
                .client
                .get(client.url("/api/v1/clusters"))
                .send()
                .await?;

            if !response.status().is_success() {
                let error = response.text().await?;
                eprintln!("Failed to list clusters: {}", error);
                return Ok(());
            }

            let clusters: Vec<ClusterResponse> = response.json().await?;
            let mut deployments = Vec::new();
            for cluster in clusters {
                deployments.extend(cluster_deployments(client, cluster.id).await?);
            }

            if deployments.is_empty() {
                println!("No deployments found");
            } else {
                print_deployment_table(&deployments);
            }
        }
    }

    Ok(())
}

/// Show the pending queue
pub async fn queue(client: &ApiClient) -> Result<()> {
    let response = client
        .client
        .get(client.url("/api/v1/queue"))
        .send()
        .await?;

    if response.status().is_success() {
        let entries: Vec<QueueEntry> = response.json().await?;

        if entries.is_empty() {
            println!("Queue is empty");
        } else {
            println!("{:<6} {:<36} {:<10}", "#", "DEPLOYMENT", "PRIORITY");
            println!("{}", "-".repeat(54));
            for (position, entry) in entries.iter().enumerate() {
                println!(
                    "{:<6} {:<36} {:<10}",
                    position + 1,
                    entry.deployment_id,
                    entry.priority
                );
            }
        }
    } else {
        let error = response.text().await?;
        eprintln!("Failed to get queue: {}", error);
    }

    Ok(())
}

/// Run a scheduling pass
pub async fn schedule(client: &ApiClient) -> Result<()> {
    let response = client
        .client
        .post(client.url("/api/v1/scheduler/trigger"))
        .send()
        .await?;

    if response.status().is_success() {
        let trigger: TriggerResponse = response.json().await?;
        println!("{}", trigger.message);
        print_pass_summary(&trigger.summary);
    } else {
        let error = response.text().await?;
        eprintln!("Scheduling pass failed: {}", error);
    }

    Ok(())
}

/// Show system status
pub async fn top(client: &ApiClient) -> Result<()> {
    let response = client
        .client
        .get(client.url("/api/v1/status"))
        .send()
        .await?;

    if response.status().is_success() {
        let status: StatusResponse = response.json().await?;

        println!("berth v{}", status.version);
        println!();
        println!("Clusters: {}", status.clusters);
        println!(
            "Deployments: {} running, {} pending",
            status.deployments_running, status.deployments_pending
        );
        println!("Queue length: {}", status.queue_length);
        println!(
            "Passes: {} completed, {} failed",
            status.passes_completed, status.passes_failed
        );
        if let Some(last) = status.last_pass {
            println!();
            println!("Last pass at {}:", last.started_at);
            print_pass_summary(&last);
        }
    } else {
        let error = response.text().await?;
        eprintln!("Failed to get status: {}", error);
    }

    Ok(())
}

async fn cluster_deployments(
    client: &ApiClient,
    cluster_id: Uuid,
) -> Result<Vec<DeploymentResponse>> {
    let response = client
        .client
        .get(client.url(&format!("/api/v1/clusters/{}/deployments", cluster_id)))
        .send()
        .await?;

    if !response.status().is_success() {
        anyhow::bail!(
            "Failed to list deployments for cluster {}: {}",
            cluster_id,
            response.text().await?
        );
    }

    Ok(response.json().await?)
}

fn print_cluster_details(cluster: &ClusterResponse) {
    println!("  ID: {}", cluster.id);
    println!("  RAM: {}/{} free", cluster.available_ram, cluster.total_ram);
    println!("  CPU: {}/{} free", cluster.available_cpu, cluster.total_cpu);
    println!("  GPU: {}/{} free", cluster.available_gpu, cluster.total_gpu);
}

fn print_deployment_details(dep: &DeploymentResponse) {
    println!("Deployment: {}", dep.image);
    println!("  ID: {}", dep.id);
    println!("  Cluster: {}", dep.cluster_id);
    println!(
        "  Requires: ram={} cpu={} gpu={}",
        dep.required_ram, dep.required_cpu, dep.required_gpu
    );
    println!("  Priority: {}", dep.priority);
    println!("  Status: {}", dep.status);
}

fn print_deployment_table(deployments: &[DeploymentResponse]) {
    println!(
        "{:<36} {:<25} {:<22} {:<9} {:<8}",
        "ID", "IMAGE", "RAM/CPU/GPU", "PRIORITY", "STATUS"
    );
    println!("{}", "-".repeat(104));
    for dep in deployments {
        println!(
            "{:<36} {:<25} {:<22} {:<9} {:<8}",
            dep.id,
            dep.image,
            format!("{}/{}/{}", dep.required_ram, dep.required_cpu, dep.required_gpu),
            dep.priority,
            dep.status
        );
    }
}

fn print_pass_summary(summary: &PassSummary) {
    println!("  Admitted: {}", summary.admitted.len());
    for id in &summary.admitted {
        println!("    {}", id);
    }
    println!("  Still pending: {}", summary.still_pending.len());
    println!("  Discarded: {}", summary.discarded.len());
    if summary.budget_exhausted {
        println!("  Stopped early: pass budget exhausted");
    }
    println!("  Duration: {}ms", summary.duration_ms);
}
