//! Batch classification of canonical records through an external language model.

mod orchestrator;
mod prompt;
mod provider;
mod schema;

pub use orchestrator::ClassificationOrchestrator;
pub use prompt::{build_prompt, Prompt};
pub use provider::ChatCompletionsClient;
pub use schema::{parse_response, unwrap_envelope, validate};

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Important,
    Promotional,
    Social,
    Marketing,
    Spam,
    General,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Important,
        Category::Promotional,
        Category::Social,
        Category::Marketing,
        Category::Spam,
        Category::General,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Important => "Important",
            Category::Promotional => "Promotional",
            Category::Social => "Social",
            Category::Marketing => "Marketing",
            Category::Spam => "Spam",
            Category::General => "General",
        }
    }

    pub fn parse(name: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

/// Response shape requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVariant {
    /// `{ id, category, confidence, reasoning }`
    #[default]
    Scored,
    /// `{ emailId, classification: { category, summary, actionable } }`
    Actionable,
}

impl SchemaVariant {
    pub fn categories(self) -> &'static [Category] {
        match self {
            SchemaVariant::Scored => &[
                Category::Important,
                Category::Promotional,
                Category::Social,
                Category::Spam,
                Category::General,
            ],
            SchemaVariant::Actionable => &Category::ALL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Signal {
    Confidence { confidence: f64 },
    Actionable { actionable: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub id: String,
    pub category: Category,
    #[serde(flatten)]
    pub signal: Signal,
    #[serde(alias = "summary")]
    pub reasoning: String,
}

/// What a merge did with each returned classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeReport {
    pub applied: Vec<String>,
    pub discarded: Vec<String>,
}

/// Accumulated classifications keyed by record identifier. Later merges
/// overwrite earlier entries for the same identifier; nothing is ever removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationMap {
    entries: HashMap<String, Classification>,
}

impl ClassificationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Classification> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Classification)> {
        self.entries.iter()
    }

    /// Merge results for a batch. Entries whose identifier was not part of
    /// `batch_ids` are discarded with a warning and never inserted.
    pub fn merge<'a, I>(&mut self, batch_ids: I, results: Vec<Classification>) -> MergeReport
    where
        I: IntoIterator<Item = &'a str>,
    {
        let batch: HashSet<&str> = batch_ids.into_iter().collect();
        let mut report = MergeReport::default();
        for classification in results {
            if batch.contains(classification.id.as_str()) {
                report.applied.push(classification.id.clone());
                self.entries.insert(classification.id.clone(), classification);
            } else {
                log::warn!(
                    "Discarding classification for {} which was not in the submitted batch",
                    classification.id
                );
                report.discarded.push(classification.id);
            }
        }
        report
    }
}
