use crate::error::{Result, VectorStoreError};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokenizers::Tokenizer;

const DEFAULT_MAX_SEQ_LENGTH: usize = 256;

struct LoadedModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

/// Lazily-loaded ONNX sentence embedder for a single model id.
///
/// The model and tokenizer aren't fetched until the first call to `embed_texts`, so
/// constructing a `VectorStore` never touches the network or disk cache.
pub struct Embedder {
    model_id: String,
    repo_id: Option<String>,
    dimension: usize,
    inner: once_cell::sync::OnceCell<Arc<LoadedModel>>,
}

impl Embedder {
    #[must_use]
    pub fn new(model_id: String, dimension: usize, repo_id: Option<String>) -> Self {
        Self {
            model_id,
            repo_id,
            dimension,
            inner: once_cell::sync::OnceCell::new(),
        }
    }

    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn ensure_loaded(&self) -> Result<Arc<LoadedModel>> {
        if let Some(loaded) = self.inner.get() {
            return Ok(Arc::clone(loaded));
        }

        let repo_id = self.repo_id.as_deref().unwrap_or(&self.model_id);
        log::info!("Loading embedding model {repo_id} for model_id={}", self.model_id);

        let api = hf_hub::api::sync::ApiBuilder::new()
            .with_progress(false)
            .build()
            .map_err(|e| VectorStoreError::EmbeddingError(format!("failed to build HF API: {e}")))?;
        let repo = api.model(repo_id.to_string());

        let tokenizer_path: PathBuf = repo
            .get("tokenizer.json")
            .map_err(|e| VectorStoreError::EmbeddingError(format!("failed to fetch tokenizer: {e}")))?;
        let model_path: PathBuf = repo
            .get("model.onnx")
            .or_else(|_| repo.get("onnx/model.onnx"))
            .map_err(|e| VectorStoreError::EmbeddingError(format!("failed to fetch ONNX model: {e}")))?;

        let loaded = self.load_from_paths(&model_path, &tokenizer_path)?;
        let loaded = Arc::new(loaded);
        let _ = self.inner.set(Arc::clone(&loaded));
        Ok(loaded)
    }

    fn load_from_paths(&self, model_path: &PathBuf, tokenizer_path: &PathBuf) -> Result<LoadedModel> {
        let session = Session::builder()
            .map_err(|e| VectorStoreError::EmbeddingError(format!("session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| VectorStoreError::EmbeddingError(format!("optimization level: {e}")))?
            .commit_from_file(model_path)
            .map_err(|e| VectorStoreError::EmbeddingError(format!("load ONNX model: {e}")))?;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| VectorStoreError::EmbeddingError(format!("load tokenizer: {e}")))?;

        Ok(LoadedModel {
            session: Mutex::new(session),
            tokenizer,
        })
    }

    /// Embed a batch of already-templated strings, returning L2-normalized vectors.
    pub async fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = texts.iter().map(|s| (*s).to_string()).collect();
        let dimension = self.dimension;
        let loaded = self.ensure_loaded()?;

        tokio::task::spawn_blocking(move || Self::embed_texts_blocking(&loaded, &texts, dimension))
            .await
            .map_err(|e| VectorStoreError::EmbeddingError(format!("embedding task panicked: {e}")))?
    }

    fn embed_texts_blocking(
        loaded: &LoadedModel,
        texts: &[String],
        fallback_dimension: usize,
    ) -> Result<Vec<Vec<f32>>> {
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let encodings = loaded
            .tokenizer
            .encode_batch(refs, true)
            .map_err(|e| VectorStoreError::EmbeddingError(format!("tokenization failed: {e}")))?;

        let batch_size = encodings.len();
        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(DEFAULT_MAX_SEQ_LENGTH)
            .max(1);

        let mut input_ids: Vec<i64> = Vec::with_capacity(batch_size * max_len);
        let mut attention_mask: Vec<i64> = Vec::with_capacity(batch_size * max_len);
        let mut token_type_ids: Vec<i64> = Vec::with_capacity(batch_size * max_len);

        for encoding in &encodings {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let type_ids = encoding.get_type_ids();
            let len = ids.len().min(max_len);

            input_ids.extend(ids[..len].iter().map(|&x| i64::from(x)));
            attention_mask.extend(mask[..len].iter().map(|&x| i64::from(x)));
            token_type_ids.extend(type_ids[..len].iter().map(|&x| i64::from(x)));

            let padding = max_len - len;
            input_ids.extend(std::iter::repeat_n(0i64, padding));
            attention_mask.extend(std::iter::repeat_n(0i64, padding));
            token_type_ids.extend(std::iter::repeat_n(0i64, padding));
        }

        let shape = [batch_size, max_len];
        let input_ids_tensor = Tensor::from_array((shape, input_ids))
            .map_err(|e| VectorStoreError::EmbeddingError(format!("input_ids tensor: {e}")))?;
        let attention_mask_tensor = Tensor::from_array((shape, attention_mask))
            .map_err(|e| VectorStoreError::EmbeddingError(format!("attention_mask tensor: {e}")))?;
        let token_type_ids_tensor = Tensor::from_array((shape, token_type_ids))
            .map_err(|e| VectorStoreError::EmbeddingError(format!("token_type_ids tensor: {e}")))?;

        let mut session = loaded
            .session
            .lock()
            .map_err(|_| VectorStoreError::EmbeddingError("session mutex poisoned".into()))?;

        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor,
            ])
            .map_err(|e| VectorStoreError::EmbeddingError(format!("inference failed: {e}")))?;

        let output_value = outputs
            .iter()
            .next()
            .map(|(_, v)| v)
            .ok_or_else(|| VectorStoreError::EmbeddingError("no output tensor".into()))?;

        let (out_shape, data) = output_value
            .try_extract_tensor::<f32>()
            .map_err(|e| VectorStoreError::EmbeddingError(format!("extract output tensor: {e}")))?;
        let out_shape: Vec<usize> = out_shape.iter().map(|&x| x as usize).collect();

        let embeddings = if out_shape.len() == 3 {
            let hidden_size = out_shape[2];
            let seq_len = out_shape[1];
            (0..batch_size)
                .map(|i| {
                    let mut embedding = vec![0.0f32; hidden_size];
                    let mut count = 0.0f32;
                    let mask = encodings[i].get_attention_mask();
                    for j in 0..seq_len.min(max_len) {
                        let mask_val = if j < mask.len() { mask[j] as f32 } else { 0.0 };
                        if mask_val > 0.0 {
                            for (k, emb_k) in embedding.iter_mut().enumerate().take(hidden_size) {
                                let idx = i * seq_len * hidden_size + j * hidden_size + k;
                                *emb_k += data[idx] * mask_val;
                            }
                            count += mask_val;
                        }
                    }
                    if count > 0.0 {
                        for v in &mut embedding {
                            *v /= count;
                        }
                    }
                    normalize(&mut embedding);
                    embedding
                })
                .collect()
        } else if out_shape.len() == 2 {
            let hidden_size = out_shape[1];
            (0..batch_size)
                .map(|i| {
                    let mut embedding: Vec<f32> =
                        (0..hidden_size).map(|j| data[i * hidden_size + j]).collect();
                    normalize(&mut embedding);
                    embedding
                })
                .collect()
        } else {
            let _ = fallback_dimension;
            return Err(VectorStoreError::EmbeddingError(format!(
                "unexpected output tensor shape: {out_shape:?}"
            )));
        };

        Ok(embeddings)
    }
}

fn normalize(embedding: &mut [f32]) {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in embedding.iter_mut() {
            *v /= norm;
        }
    }
}

#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_mismatched_len_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0, 2.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }
}
