//! Embedding functions for the study index.
//!
//! `HashEmbedder` is a deterministic bag-of-words projection that needs no
//! model files; `BgeEmbedder` runs BGE-M3 locally through candle. Both return
//! L2-normalized vectors so cosine distance is comparable across queries.

use anyhow::{anyhow, Result};
use std::hash::Hasher;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use twox_hash::XxHash64;

use studymate_core::config::{EmbeddingBackend, EmbeddingSettings};
pub use studymate_core::traits::Embedder;

pub mod bge;

pub use bge::{masked_mean_l2, BgeEmbedder, BGE_M3_DIM};

/// Feature-hashing embedder: each lowercased alphanumeric token lands in one
/// of `dim` buckets with a hash-derived sign.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let lowered = text.to_lowercase();
        for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(token.as_bytes());
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// Pick the embedder named by configuration. `APP_USE_FAKE_EMBEDDINGS=1`
/// forces the hashing embedder regardless.
pub fn build_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    if use_fake_embeddings() {
        tracing::info!("APP_USE_FAKE_EMBEDDINGS set; using HashEmbedder");
        return Ok(Arc::new(HashEmbedder::new(settings.dim)));
    }
    match settings.backend {
        EmbeddingBackend::Hash => Ok(Arc::new(HashEmbedder::new(settings.dim))),
        EmbeddingBackend::Bge => {
            let dir = resolve_model_dir(settings.model_dir.as_deref())?;
            Ok(Arc::new(BgeEmbedder::load(&dir)?))
        }
    }
}

fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn resolve_model_dir(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = configured {
        if p.exists() { return Ok(p.to_path_buf()); }
        tracing::warn!(dir = %p.display(), "configured model dir missing");
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = PathBuf::from(&dir);
            if p.exists() { tracing::debug!(var, dir = %p.display(), "model dir from env"); return Ok(p); }
        }
    }
    let local = Path::new("models/bge-m3");
    if local.exists() { return Ok(local.to_path_buf()); }
    Err(anyhow!("Could not locate BGE-M3 model directory"))
}
