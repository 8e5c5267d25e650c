pub mod config;
pub mod error;
pub mod fragments;
pub mod store;
pub mod traits;
pub mod types;

pub use config::{Config, RefreshPolicy, Settings};
pub use error::{Error, Result};
pub use fragments::DocumentStoreAdapter;
pub use store::{JsonStudyStore, MemoryStudyStore};
pub use traits::{Embedder, FragmentSource, StudyStore};
pub use types::{
    ConversationTurn, Fragment, FragmentId, Neighbor, QuizRecord, RetrievalResult, Role, RoutingDecision, SourceKind,
    Subject, Task,
};
