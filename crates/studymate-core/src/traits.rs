use crate::error::Result;
use crate::types::{Fragment, Subject, Task};

/// Text → vector function shared by index build and query time.
///
/// Implementations return L2-normalized vectors of length `dim()`.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Read access to one user's study records.
pub trait StudyStore: Send + Sync {
    fn get_all_subjects(&self) -> Result<Vec<Subject>>;
    fn get_tasks(&self) -> Result<Vec<Task>>;
}

/// Anything that can enumerate the current indexable fragments.
///
/// Enumeration is infallible: unreachable sources are logged and skipped.
pub trait FragmentSource: Send + Sync {
    fn list_fragments(&self) -> Vec<Fragment>;
}
