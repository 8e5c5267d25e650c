//! BGE-M3 sentence embeddings on candle.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;

use studymate_core::traits::Embedder;

pub const BGE_M3_DIM: usize = 1024;
const MAX_TOKENS: usize = 256;
// XLM-R <pad>
const PAD_ID: u32 = 1;
const BATCH_SIZE: usize = 16;

pub fn select_device() -> Device {
    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(dev) => {
                tracing::info!("embedding device: Metal");
                return dev;
            }
            Err(e) => tracing::warn!(error = %e, "Metal unavailable"),
        }
    }
    tracing::info!("embedding device: CPU");
    Device::Cpu
}

/// Masked mean over the sequence axis, then L2 normalization:
/// `[batch, seq, hidden] -> [batch, hidden]`. Fully masked rows pool to zero.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (batch, _seq, width) = hidden.dims3().context("hidden states must be [batch, seq, hidden]")?;
    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?.unsqueeze(2)?;
    let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
    let counts = mask.sum(1)?.maximum(1.0)?;
    let mean = summed.broadcast_div(&counts)?;
    let norms = mean.sqr()?.sum_keepdim(1)?.sqrt()?.maximum(1e-12)?;
    let pooled = mean.broadcast_div(&norms)?;
    anyhow::ensure!(pooled.dims() == [batch, width], "pooled shape {:?}", pooled.dims());
    Ok(pooled)
}

/// Token ids and attention mask for a batch, right-padded to its longest row.
struct EncodedBatch {
    ids: Tensor,
    mask: Tensor,
}

fn encode_batch(tokenizer: &Tokenizer, texts: &[String], device: &Device) -> Result<EncodedBatch> {
    let mut rows: Vec<(Vec<u32>, Vec<u32>)> = Vec::with_capacity(texts.len());
    for text in texts {
        let enc = tokenizer.encode(text.as_str(), true).map_err(|e| anyhow!("tokenization failed: {e}"))?;
        let len = enc.get_ids().len().min(MAX_TOKENS);
        rows.push((enc.get_ids()[..len].to_vec(), enc.get_attention_mask()[..len].to_vec()));
    }
    let width = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0).max(1);
    let mut ids = Vec::with_capacity(rows.len() * width);
    let mut mask = Vec::with_capacity(rows.len() * width);
    for (row_ids, row_mask) in rows {
        let pad = width - row_ids.len();
        ids.extend(row_ids.into_iter().chain(std::iter::repeat(PAD_ID).take(pad)));
        mask.extend(row_mask.into_iter().chain(std::iter::repeat(0).take(pad)));
    }
    let shape = (texts.len(), width);
    Ok(EncodedBatch { ids: Tensor::from_vec(ids, shape, device)?, mask: Tensor::from_vec(mask, shape, device)? })
}

pub struct BgeEmbedder {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl BgeEmbedder {
    /// Load `tokenizer.json`, `config.json` and `pytorch_model.bin` from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let device = select_device();
        tracing::info!(dir = %model_dir.display(), "loading BGE-M3");
        let tokenizer = Tokenizer::from_file(model_dir.join("tokenizer.json"))
            .map_err(|e| anyhow!("loading tokenizer from {}: {e}", model_dir.display()))?;
        let config_path = model_dir.join("config.json");
        let raw = std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?;
        let config: XLMRobertaConfig = serde_json::from_str(&raw)?;
        let weights: HashMap<String, Tensor> =
            candle_core::pickle::read_all(model_dir.join("pytorch_model.bin"))?.into_iter().collect();
        let model = XLMRobertaModel::new(&config, VarBuilder::from_tensors(weights, DType::F32, &device))?;
        Ok(Self { model, tokenizer, device })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch = encode_batch(&self.tokenizer, texts, &self.device)?;
        let token_types = batch.ids.zeros_like()?;
        let hidden = self.model.forward(&batch.ids, &batch.mask, &token_types, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &batch.mask)?;
        let rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        anyhow::ensure!(
            rows.iter().all(|r| r.len() == BGE_M3_DIM),
            "unexpected embedding width"
        );
        Ok(rows)
    }
}

impl Embedder for BgeEmbedder {
    fn dim(&self) -> usize { BGE_M3_DIM }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(BATCH_SIZE) {
            out.extend(self.embed_chunk(chunk)?);
        }
        tracing::debug!(texts = texts.len(), ms = start.elapsed().as_millis() as u64, "bge embed batch");
        Ok(out)
    }
}
