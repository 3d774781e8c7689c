use std::collections::BTreeMap;

use serde::{ Deserialize, Deserializer, Serialize };

use crate::error::RagError;

pub type Metadata = BTreeMap<String, String>;

pub const DEFAULT_N_RESULTS: usize = 5;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DocumentRecord {
    pub document: String,
    pub metadata: Metadata,
    pub embedding: Vec<f32>,
}

impl DocumentRecord {
    /// Stable row key: `source#chunk`, or the document itself when there is no source.
    pub fn record_key(&self) -> String {
        match self.metadata.get("source") {
            Some(source) => {
                let chunk = self.metadata.get("chunk").map_or("0", String::as_str);
                format!("{}#{}", source, chunk)
            }
            None => self.document.clone(),
        }
    }
}

/// Nearest-neighbour answer for a batch of query embeddings.
///
/// `documents[q]` and `metadatas[q]` are the hits for query `q`, best first.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct QueryResults {
    pub documents: Vec<Vec<String>>,
    pub metadatas: Vec<Vec<Metadata>>,
}

impl QueryResults {
    /// Pairs the hits of the first query, failing if the two sequences disagree.
    pub fn into_first_pairs(self) -> Result<Vec<(String, Metadata)>, RagError> {
        let documents = self.documents.into_iter().next();
        let metadatas = self.metadatas.into_iter().next();

        let (documents, metadatas) = match (documents, metadatas) {
            (Some(d), Some(m)) => (d, m),
            (None, None) => {
                return Err(RagError::ResultShape("no results for query".to_string()));
            }
            _ => {
                return Err(
                    RagError::ResultShape("documents and metadatas cover different queries".to_string())
                );
            }
        };

        if documents.len() != metadatas.len() {
            return Err(
                RagError::ResultShape(
                    format!("{} documents but {} metadatas", documents.len(), metadatas.len())
                )
            );
        }

        Ok(documents.into_iter().zip(metadatas).collect())
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchForm {
    pub query: String,
    #[serde(default = "default_n_results", deserialize_with = "empty_as_default")]
    pub n_results: usize,
}

fn default_n_results() -> usize {
    DEFAULT_N_RESULTS
}

// HTML forms send `n_results=` for an untouched field.
fn empty_as_default<'de, D>(deserializer: D) -> Result<usize, D::Error>
    where D: Deserializer<'de>
{
    let raw = String::deserialize(deserializer)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(DEFAULT_N_RESULTS);
    }
    raw.parse().map_err(serde::de::Error::custom)
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SearchItem {
    Image {
        source: String,
        path: String,
    },
    Text {
        source: String,
        text: String,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchItem>,
}
