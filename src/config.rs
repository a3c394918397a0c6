use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::{
    env,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingsDevice {
    Cpu,
    Metal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingsBackend {
    FastEmbed,
    Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub events_addr: SocketAddr,
    pub submodel_repo_url: String,
    pub vector_db_path: PathBuf,
    pub collection_name: String,
    pub embeddings_backend: EmbeddingsBackend,
    pub embeddings_model_repo: Option<String>,
    pub embeddings_model_dir: Option<PathBuf>,
    pub embeddings_device: EmbeddingsDevice,
    pub embedding_batch_size: usize,
    pub hash_embedding_dim: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub download_timeout: Duration,
    pub download_dir: PathBuf,
    pub event_workers: usize,
    pub metrics_port: Option<u16>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let events_addr = optional_env("EVENTS_ADDR")
            .as_deref()
            .map(parse_socket_addr)
            .transpose()?
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8000)));

        let submodel_repo_url = optional_env("SUBMODEL_REPO_URL")
            .unwrap_or_else(|| "http://basyx-repo".to_string())
            .trim_end_matches('/')
            .to_string();

        let vector_db_path = optional_env("VECTOR_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| Path::new("./data/vectors").to_path_buf());

        let collection_name =
            optional_env("COLLECTION_NAME").unwrap_or_else(|| "docs".to_string());

        let embeddings_backend = optional_env("EMBEDDINGS_BACKEND")
            .as_deref()
            .map(parse_embeddings_backend)
            .transpose()?
            .unwrap_or(EmbeddingsBackend::FastEmbed);

        let embeddings_model_repo = optional_env("EMBEDDINGS_MODEL_REPO");

        let embeddings_model_dir = match embeddings_backend {
            EmbeddingsBackend::FastEmbed => Some(
                optional_env("EMBEDDINGS_MODEL_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| Path::new("./data/embeddings-cache").to_path_buf()),
            ),
            EmbeddingsBackend::Hash => None,
        };

        let embeddings_device = optional_env("EMBEDDINGS_DEVICE")
            .as_deref()
            .map(parse_embeddings_device)
            .transpose()?
            .unwrap_or(EmbeddingsDevice::Cpu);

        let embedding_batch_size = optional_env("EMBEDDING_BATCH_SIZE")
            .as_deref()
            .map(parse_usize)
            .transpose()?
            .unwrap_or(100);
        if embedding_batch_size == 0 {
            return Err(anyhow!("EMBEDDING_BATCH_SIZE must be at least 1"));
        }

        let hash_embedding_dim = optional_env("HASH_EMBEDDING_DIM")
            .as_deref()
            .map(parse_usize)
            .transpose()?
            .unwrap_or(64);

        let chunk_size = optional_env("CHUNK_SIZE")
            .as_deref()
            .map(parse_usize)
            .transpose()?
            .unwrap_or(800);

        let chunk_overlap = optional_env("CHUNK_OVERLAP")
            .as_deref()
            .map(parse_usize)
            .transpose()?
            .unwrap_or(150);
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(anyhow!(
                "CHUNK_OVERLAP ({chunk_overlap}) must be smaller than CHUNK_SIZE ({chunk_size})"
            ));
        }

        let download_timeout = Duration::from_secs(
            optional_env("DOWNLOAD_TIMEOUT_S")
                .as_deref()
                .map(parse_u64)
                .transpose()?
                .unwrap_or(30),
        );

        let download_dir = optional_env("DOWNLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| Path::new("./pdfs").to_path_buf());

        let event_workers = optional_env("EVENT_WORKERS")
            .as_deref()
            .map(parse_usize)
            .transpose()?
            .unwrap_or(4)
            .max(1);

        let metrics_port = optional_env("METRICS_PORT")
            .as_deref()
            .map(parse_u16)
            .transpose()?;

        Ok(Self {
            events_addr,
            submodel_repo_url,
            vector_db_path,
            collection_name,
            embeddings_backend,
            embeddings_model_repo,
            embeddings_model_dir,
            embeddings_device,
            embedding_batch_size,
            hash_embedding_dim,
            chunk_size,
            chunk_overlap,
            download_timeout,
            download_dir,
            event_workers,
            metrics_port,
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|v| {
        let v = v.trim().to_string();
        if v.is_empty() {
            None
        } else {
            Some(v)
        }
    })
}

fn parse_socket_addr(value: &str) -> Result<SocketAddr> {
    value
        .trim()
        .parse::<SocketAddr>()
        .map_err(|err| anyhow!("Invalid socket address '{value}': {err}"))
}

fn parse_embeddings_device(value: &str) -> Result<EmbeddingsDevice> {
    match value.trim().to_lowercase().as_str() {
        "cpu" => Ok(EmbeddingsDevice::Cpu),
        "metal" => Ok(EmbeddingsDevice::Metal),
        other => Err(anyhow!("Invalid EMBEDDINGS_DEVICE: {other}")),
    }
}

fn parse_embeddings_backend(value: &str) -> Result<EmbeddingsBackend> {
    match value.trim().to_lowercase().as_str() {
        "fastembed" => Ok(EmbeddingsBackend::FastEmbed),
        "hash" => Ok(EmbeddingsBackend::Hash),
        other => Err(anyhow!("Invalid EMBEDDINGS_BACKEND: {other}")),
    }
}

fn parse_usize(value: &str) -> Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|err| anyhow!("Invalid integer '{value}': {err}"))
}

fn parse_u64(value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|err| anyhow!("Invalid integer '{value}': {err}"))
}

fn parse_u16(value: &str) -> Result<u16> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|err| anyhow!("Invalid port '{value}': {err}"))
}
