//! Document Store Adapter: turns syllabus records and knowledge-base text
//! files into a deterministic list of indexable fragments.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::traits::{FragmentSource, StudyStore};
use crate::types::{Fragment, SourceKind, Subject};

pub struct DocumentStoreAdapter {
    store: Arc<dyn StudyStore>,
    knowledge_dir: PathBuf,
    syllabus_files: Vec<String>,
}

impl DocumentStoreAdapter {
    pub fn new(store: Arc<dyn StudyStore>, knowledge_dir: impl Into<PathBuf>) -> Self {
        Self { store, knowledge_dir: knowledge_dir.into(), syllabus_files: vec!["syllabus".to_string()] }
    }

    /// Knowledge-base file stems whose paragraphs are treated as syllabus entries.
    pub fn with_syllabus_files(mut self, stems: Vec<String>) -> Self {
        self.syllabus_files = stems;
        self
    }

    /// Syllabus fragments first (store order), then knowledge-base paragraphs
    /// (files sorted by name, paragraphs in file order).
    pub fn fragments(&self) -> impl Iterator<Item = Fragment> {
        let syllabus = match self.store.get_all_subjects() {
            Ok(subjects) => syllabus_fragments(&subjects),
            Err(e) => {
                tracing::warn!(error = %e, "syllabus source unreachable; indexing knowledge base only");
                Vec::new()
            }
        };
        let knowledge = self.knowledge_fragments();
        syllabus.into_iter().chain(knowledge)
    }

    fn knowledge_fragments(&self) -> Vec<Fragment> {
        if !self.knowledge_dir.is_dir() {
            tracing::info!(dir = %self.knowledge_dir.display(), "knowledge-base directory missing; indexing syllabus only");
            return Vec::new();
        }
        let mut fragments = Vec::new();
        for path in list_txt_files(&self.knowledge_dir) {
            let content = match read_file_content(&path) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable knowledge-base file");
                    continue;
                }
            };
            let stem = file_stem(&path);
            let kind = if self.syllabus_files.iter().any(|s| s == &stem) {
                SourceKind::Syllabus
            } else {
                SourceKind::KnowledgeBase
            };
            fragments.extend(paragraph_fragments(&stem, &content, kind));
        }
        disambiguate_ids(&mut fragments);
        fragments
    }
}

impl FragmentSource for DocumentStoreAdapter {
    fn list_fragments(&self) -> Vec<Fragment> {
        self.fragments().collect()
    }
}

/// One fragment per (subject, topic) pair.
pub fn syllabus_fragments(subjects: &[Subject]) -> Vec<Fragment> {
    let mut out = Vec::new();
    for subject in subjects {
        for topic in &subject.topics {
            let text = match &subject.due_date {
                Some(due) => format!("{}: {} (Due: {})", subject.name, topic, due),
                None => format!("{}: {}", subject.name, topic),
            };
            let id = format!("syllabus_{}_{}", normalize_id(&subject.name), normalize_id(topic));
            out.push(Fragment::new(id, text, SourceKind::Syllabus));
        }
    }
    disambiguate_ids(&mut out);
    out
}

/// One fragment per non-empty blank-line-delimited paragraph.
///
/// The paragraph index counts every segment, empty ones included, so ids of
/// later paragraphs do not shift when whitespace-only segments appear.
pub fn paragraph_fragments(stem: &str, content: &str, kind: SourceKind) -> Vec<Fragment> {
    let stem = normalize_id(stem);
    let content = content.replace("\r\n", "\n");
    content
        .trim()
        .split("\n\n")
        .enumerate()
        .filter_map(|(index, paragraph)| {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                return None;
            }
            Some(Fragment::new(format!("kb_{stem}_{index}"), paragraph, kind))
        })
        .collect()
}

/// Map anything outside `[A-Za-z0-9_-]` to `_` so ids are safe keys.
pub fn normalize_id(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Normalization is lossy ("Data Science"/"ML" and "Data"/"Science ML" both
/// map to `syllabus_Data_Science_ML`). Later duplicates get `_2`, `_3`, ...
/// in list order so every fragment keeps its own id.
fn disambiguate_ids(fragments: &mut [Fragment]) {
    let mut seen: HashSet<String> = HashSet::with_capacity(fragments.len());
    for fragment in fragments.iter_mut() {
        if seen.insert(fragment.id.clone()) {
            continue;
        }
        let mut n = 2;
        let mut candidate = format!("{}_{n}", fragment.id);
        while seen.contains(&candidate) {
            n += 1;
            candidate = format!("{}_{n}", fragment.id);
        }
        tracing::warn!(id = %fragment.id, renamed = %candidate, text = %fragment.text, "fragment id collision");
        fragment.id = candidate.clone();
        seen.insert(candidate);
    }
}

fn read_file_content(file_path: &Path) -> std::io::Result<String> {
    let bytes = fs::read(file_path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

fn file_stem(file_path: &Path) -> String {
    file_path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default()
}

fn list_txt_files(root: &Path) -> Vec<PathBuf> {
    let mut txt_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("txt"))
        .collect();
    txt_files.sort();
    txt_files
}
