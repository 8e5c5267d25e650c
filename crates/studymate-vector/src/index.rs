//! In-memory embedding index over the current fragment set.
//!
//! The live state is an immutable `IndexSnapshot` behind an `Arc`. A rebuild
//! embeds into a fresh snapshot and swaps the pointer, so a query always sees
//! either the old or the new snapshot in full. Rebuilds are serialized by an
//! async mutex.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use twox_hash::XxHash64;

use studymate_core::config::RefreshPolicy;
use studymate_core::traits::{Embedder, FragmentSource};
use studymate_core::types::{Fragment, FragmentId, Neighbor, RetrievalResult, SourceKind};

pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone)]
struct IndexEntry {
    fragment: Fragment,
    vector: Vec<f32>,
}

/// Immutable view of the index at one build.
#[derive(Debug, Default)]
pub struct IndexSnapshot {
    entries: Vec<IndexEntry>,
    fingerprint: u64,
}

impl IndexSnapshot {
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn fingerprint(&self) -> u64 { self.fingerprint }

    /// The `k` entries nearest to `query`, closest first; ties keep build order.
    pub fn search(&self, query: &[f32], k: usize) -> RetrievalResult {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_distance(query, &e.vector)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored
            .into_iter()
            .take(k)
            .map(|(i, distance)| Neighbor { fragment: self.entries[i].fragment.clone(), distance })
            .collect()
    }
}

pub struct EmbeddingIndex {
    source: Arc<dyn FragmentSource>,
    embedder: Arc<dyn Embedder>,
    refresh: RefreshPolicy,
    snapshot: RwLock<Arc<IndexSnapshot>>,
    rebuild_lock: Mutex<()>,
}

impl EmbeddingIndex {
    pub fn new(source: Arc<dyn FragmentSource>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            source,
            embedder,
            refresh: RefreshPolicy::default(),
            snapshot: RwLock::new(Arc::new(IndexSnapshot::default())),
            rebuild_lock: Mutex::new(()),
        }
    }

    pub fn with_refresh(mut self, refresh: RefreshPolicy) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn refresh_policy(&self) -> RefreshPolicy { self.refresh }

    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        let guard = self.snapshot.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*guard)
    }

    pub fn is_empty(&self) -> bool { self.snapshot().is_empty() }
    pub fn len(&self) -> usize { self.snapshot().len() }
    pub fn fingerprint(&self) -> u64 { self.snapshot().fingerprint() }

    pub fn ids(&self) -> Vec<FragmentId> {
        self.snapshot().entries.iter().map(|e| e.fragment.id.clone()).collect()
    }

    /// Replace the whole index with freshly embedded current fragments.
    /// Returns the number of entries in the new snapshot.
    pub async fn rebuild(&self) -> Result<usize> {
        let _guard = self.rebuild_lock.lock().await;
        let fragments = self.current_fragments().await?;
        self.build_and_swap(fragments).await
    }

    /// Apply the refresh policy; returns whether a rebuild happened.
    pub async fn refresh(&self) -> Result<bool> {
        let _guard = self.rebuild_lock.lock().await;
        let current = self.snapshot();
        if !current.is_empty() && self.refresh == RefreshPolicy::WhenEmpty {
            return Ok(false);
        }
        let fragments = self.current_fragments().await?;
        if !current.is_empty() && self.refresh == RefreshPolicy::OnChange && fingerprint(&fragments) == current.fingerprint() {
            return Ok(false);
        }
        self.build_and_swap(fragments).await?;
        Ok(true)
    }

    /// Refresh per policy, then return the `k` nearest fragments to `text`.
    pub async fn query(&self, text: &str, k: usize) -> Result<RetrievalResult> {
        self.refresh().await?;
        let snapshot = self.snapshot();
        if snapshot.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let mut vectors = self.embed(vec![text.to_string()]).await?;
        let query = vectors.pop().context("embedder returned no query vector")?;
        Ok(snapshot.search(&query, k))
    }

    // Caller holds `rebuild_lock`.
    async fn build_and_swap(&self, fragments: Vec<Fragment>) -> Result<usize> {
        let fp = fingerprint(&fragments);
        let texts: Vec<String> = fragments.iter().map(|f| f.text.clone()).collect();
        let vectors = if texts.is_empty() { Vec::new() } else { self.embed(texts).await? };
        anyhow::ensure!(
            vectors.len() == fragments.len(),
            "embedder returned {} vectors for {} fragments",
            vectors.len(),
            fragments.len()
        );
        let entries: Vec<IndexEntry> = fragments
            .into_iter()
            .zip(vectors)
            .map(|(fragment, vector)| IndexEntry { fragment, vector })
            .collect();
        let count = entries.len();
        let next = Arc::new(IndexSnapshot { entries, fingerprint: fp });
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = next;
        tracing::debug!(fragments = count, "embedding index rebuilt");
        Ok(count)
    }

    // Store reads and knowledge-base file IO are blocking.
    async fn current_fragments(&self) -> Result<Vec<Fragment>> {
        let source = Arc::clone(&self.source);
        let fragments = tokio::task::spawn_blocking(move || source.list_fragments())
            .await
            .context("fragment listing task failed")?;
        Ok(dedup_by_id(fragments))
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let embedder = Arc::clone(&self.embedder);
        tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
            .await
            .context("embedding task failed")?
    }
}

/// Later duplicates overwrite earlier ones in place.
fn dedup_by_id(fragments: Vec<Fragment>) -> Vec<Fragment> {
    let mut position: HashMap<FragmentId, usize> = HashMap::new();
    let mut out: Vec<Fragment> = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        match position.get(&fragment.id) {
            Some(&i) => {
                tracing::warn!(id = %fragment.id, "duplicate fragment id; keeping the later text");
                out[i] = fragment;
            }
            None => {
                position.insert(fragment.id.clone(), out.len());
                out.push(fragment);
            }
        }
    }
    out
}

fn fingerprint(fragments: &[Fragment]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    for f in fragments {
        hasher.write(f.id.as_bytes());
        hasher.write_u8(0xff);
        hasher.write(f.text.as_bytes());
        hasher.write_u8(match f.source_kind { SourceKind::Syllabus => 1, SourceKind::KnowledgeBase => 2 });
    }
    hasher.finish()
}

/// `1 - cos(a, b)`; 1.0 when either side has no direction or is not finite.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    let distance = 1.0 - dot / denom;
    if denom <= f64::EPSILON || !distance.is_finite() {
        return 1.0;
    }
    distance as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_distance_basics() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_distance(&[1.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_distance(&[f32::NAN, 1.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_distance(&[f32::INFINITY, 1.0], &[1.0, 0.0]), 1.0);
    }

    #[test]
    fn dedup_keeps_first_position_and_last_value() {
        let frags = vec![
            Fragment::new("a", "one", SourceKind::Syllabus),
            Fragment::new("b", "two", SourceKind::Syllabus),
            Fragment::new("a", "three", SourceKind::Syllabus),
        ];
        let out = dedup_by_id(frags);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, "a");
        assert_eq!(out[0].text, "three");
    }

    #[test]
    fn fingerprint_tracks_text_changes() {
        let a = vec![Fragment::new("a", "one", SourceKind::Syllabus)];
        let b = vec![Fragment::new("a", "uno", SourceKind::Syllabus)];
        assert_eq!(fingerprint(&a), fingerprint(&a.clone()));
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}
