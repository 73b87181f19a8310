//! Retrieval corpus store
//!
//! Loads a directory of notes, splits it into paragraph passages and ranks
//! them against free-text queries with a TF-IDF score. A corpus lives from
//! `provision` until `delete`; the session owns that lifecycle.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::{AccordError, Result};

/// Words too common to carry any ranking signal
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "are", "was", "were", "you", "your",
    "have", "has", "but", "not", "all", "any", "can", "into", "out", "our", "its", "then",
];

/// Handle to a provisioned corpus
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorpusId(String);

impl CorpusId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorpusId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A ranked search hit
#[derive(Debug, Clone, Serialize)]
pub struct Passage {
    /// File the passage came from
    pub source: String,
    pub text: String,
    pub score: f64,
}

#[derive(Debug)]
struct IndexedPassage {
    source: String,
    text: String,
    term_counts: HashMap<String, usize>,
}

#[derive(Debug, Default)]
struct Corpus {
    passages: Vec<IndexedPassage>,
    document_frequency: HashMap<String, usize>,
}

impl Corpus {
    fn add_document(&mut self, source: &str, body: &str) {
        for paragraph in body.split("\n\n") {
            let text = paragraph.trim();
            if text.is_empty() {
                continue;
            }

            let mut term_counts = HashMap::new();
            for term in tokenize(text) {
                *term_counts.entry(term).or_insert(0) += 1;
            }
            for term in term_counts.keys() {
                *self.document_frequency.entry(term.clone()).or_insert(0) += 1;
            }

            self.passages.push(IndexedPassage {
                source: source.to_string(),
                text: text.to_string(),
                term_counts,
            });
        }
    }

    fn search(&self, query: &str, limit: usize) -> Vec<Passage> {
        let terms: HashSet<String> = tokenize(query).collect();
        let total = self.passages.len() as f64;

        let mut hits: Vec<(usize, f64)> = self
            .passages
            .iter()
            .enumerate()
            .filter_map(|(i, passage)| {
                let score: f64 = terms
                    .iter()
                    .filter_map(|term| {
                        let tf = *passage.term_counts.get(term)? as f64;
                        let df = *self.document_frequency.get(term)? as f64;
                        Some((1.0 + tf.ln()) * (1.0 + total / df).ln())
                    })
                    .sum();
                (score > 0.0).then_some((i, score))
            })
            .collect();

        // Highest score first; earlier passages win ties
        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        hits.into_iter()
            .take(limit)
            .map(|(i, score)| Passage {
                source: self.passages[i].source.clone(),
                text: self.passages[i].text.clone(),
                score,
            })
            .collect()
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(|w| w.to_lowercase())
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
}

/// In-process store of provisioned corpora
#[derive(Debug, Default)]
pub struct CorpusStore {
    corpora: RwLock<HashMap<CorpusId, Corpus>>,
    next_id: AtomicU64,
}

impl CorpusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every `.txt` and `.md` file directly inside `dir`
    pub async fn provision(&self, dir: &Path) -> Result<CorpusId> {
        let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
            AccordError::provisioning(format!("Cannot read corpus dir {}: {}", dir.display(), e))
        })?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_note = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("txt") || ext.eq_ignore_ascii_case("md"));
            if is_note {
                paths.push(path);
            }
        }
        // Stable passage order regardless of directory iteration order
        paths.sort();

        if paths.is_empty() {
            return Err(AccordError::provisioning(format!(
                "No .txt or .md documents in {}",
                dir.display()
            )));
        }

        let mut documents = Vec::with_capacity(paths.len());
        for path in &paths {
            let body = tokio::fs::read_to_string(path).await?;
            let source = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            documents.push((source, body));
        }

        let id = self.provision_documents(documents)?;
        info!(corpus = %id, documents = paths.len(), "Provisioned corpus");
        Ok(id)
    }

    /// Index in-memory `(source, body)` documents
    pub fn provision_documents<I, S, B>(&self, documents: I) -> Result<CorpusId>
    where
        I: IntoIterator<Item = (S, B)>,
        S: AsRef<str>,
        B: AsRef<str>,
    {
        let mut corpus = Corpus::default();
        for (source, body) in documents {
            corpus.add_document(source.as_ref(), body.as_ref());
        }

        let id = CorpusId(format!(
            "corpus-{}",
            self.next_id.fetch_add(1, Ordering::Relaxed) + 1
        ));
        debug!(corpus = %id, passages = corpus.passages.len(), "Indexed corpus");

        self.corpora
            .write()
            .map_err(|_| AccordError::provisioning("corpus store lock poisoned"))?
            .insert(id.clone(), corpus);
        Ok(id)
    }

    /// Rank passages of a corpus against a query
    pub fn search(&self, corpus_id: &CorpusId, query: &str, limit: usize) -> Result<Vec<Passage>> {
        let corpora = self
            .corpora
            .read()
            .map_err(|_| AccordError::tool("corpus store lock poisoned"))?;
        let corpus = corpora
            .get(corpus_id)
            .ok_or_else(|| AccordError::tool(format!("Unknown corpus: {}", corpus_id)))?;
        Ok(corpus.search(query, limit))
    }

    /// Release a corpus; returns whether it existed
    pub fn delete(&self, corpus_id: &CorpusId) -> Result<bool> {
        let removed = self
            .corpora
            .write()
            .map_err(|_| AccordError::provisioning("corpus store lock poisoned"))?
            .remove(corpus_id)
            .is_some();
        if removed {
            info!(corpus = %corpus_id, "Deleted corpus");
        }
        Ok(removed)
    }

    /// Number of live corpora
    pub fn len(&self) -> usize {
        self.corpora.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
