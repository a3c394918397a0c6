use crate::config::EmbeddingsDevice;
use crate::embeddings::Embedder;
use anyhow::{anyhow, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::Path;

pub struct FastEmbedder {
    model: TextEmbedding,
    model_name: String,
}

impl FastEmbedder {
    pub fn new(
        model_name: &str,
        cache_dir: Option<&Path>,
        device: EmbeddingsDevice,
    ) -> Result<Self> {
        // FastEmbed addresses models through an enum, so only a known set of
        // repo names is accepted here.
        let model_enum = match model_name {
            "BAAI/bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
            "BAAI/bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
            "sentence-transformers/all-MiniLM-L6-v2" => EmbeddingModel::AllMiniLML6V2,
            _ => {
                return Err(anyhow!(
                    "Unsupported embedding model: {}. Supported: BAAI/bge-base-en-v1.5, BAAI/bge-small-en-v1.5, sentence-transformers/all-MiniLM-L6-v2",
                    model_name
                ))
            }
        };

        let mut options = InitOptions::new(model_enum);

        if let Some(path) = cache_dir {
            options = options.with_cache_dir(path.to_path_buf());
        }

        match device {
            EmbeddingsDevice::Metal => {
                tracing::warn!("Metal acceleration is not wired up on this target, using CPU");
            }
            EmbeddingsDevice::Cpu => {
                tracing::debug!("Initializing FastEmbed with CPU execution provider");
            }
        }

        let model = TextEmbedding::try_new(options)
            .map_err(|e| anyhow!("Failed to initialize FastEmbed: {}", e))?;

        Ok(Self {
            model,
            model_name: model_name.to_string(),
        })
    }
}

impl Embedder for FastEmbedder {
    fn dim(&self) -> usize {
        match self.model_name.as_str() {
            "BAAI/bge-base-en-v1.5" => 768,
            "BAAI/bge-small-en-v1.5" => 384,
            "sentence-transformers/all-MiniLM-L6-v2" => 384,
            _ => 384,
        }
    }

    fn embed(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.model
            .embed(texts.to_vec(), None)
            .map_err(|e| anyhow!("Embedding failed: {}", e))
    }
}
