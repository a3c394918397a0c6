pub mod fastembed;
pub mod hash;

use anyhow::Result;

pub trait Embedder {
    fn dim(&self) -> usize;
    fn embed(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Create an embedder for the configured backend.
///
/// Returns a boxed trait object so the pipeline can hold either backend
/// behind one handle.
///
/// # Errors
/// Returns an error if the FastEmbed model name is unsupported or model
/// initialization fails.
pub fn create_embedder(
    backend: crate::config::EmbeddingsBackend,
    model_dir: Option<&std::path::Path>,
    model_repo: Option<&str>,
    device: crate::config::EmbeddingsDevice,
    hash_dim: usize,
) -> Result<Box<dyn Embedder + Send>> {
    match backend {
        crate::config::EmbeddingsBackend::FastEmbed => {
            let model_repo = model_repo.unwrap_or("BAAI/bge-base-en-v1.5");
            Ok(Box::new(fastembed::FastEmbedder::new(
                model_repo, model_dir, device,
            )?))
        }
        crate::config::EmbeddingsBackend::Hash => Ok(Box::new(hash::HashEmbedder::new(hash_dim))),
    }
}

/// Embed `texts` in slices of at most `batch_size`, concatenating the
/// results in input order. Upstream embedding backends reject oversized
/// batches, so the cap is enforced here rather than at each call site.
pub fn embed_batched(
    embedder: &mut dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let batch_size = batch_size.max(1);
    let mut out = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size) {
        out.extend(embedder.embed(batch)?);
    }
    Ok(out)
}
