//! In-memory inverted index.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chrono::Utc;
use uuid::Uuid;

use crate::tokenizer::Tokenizer;
use crate::{Document, IndexError, Indexer, Query, QueryKind, Result, SearchResults};

const RESULTS_PER_PAGE: usize = 10;

#[derive(Default)]
struct IndexData {
    docs: HashMap<Uuid, Document>,
    // token -> ids of the documents containing it
    postings: HashMap<String, HashSet<Uuid>>,
}

/// A concurrency-safe, in-memory [`Indexer`] implementation backed by
/// an inverted index.
///
/// Match queries score documents by the number of distinct query terms
/// they contain; phrase queries require the phrase as a contiguous
/// substring. Results are ordered by page rank, then score.
pub struct InMemoryIndex {
    data: RwLock<IndexData>,
    tokenizer: Tokenizer,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(IndexData::default()),
            tokenizer: Tokenizer::new(),
        }
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl Indexer for InMemoryIndex {
    fn index(&self, mut doc: Document) -> Result<Document> {
        if doc.link_id.is_nil() {
            return Err(IndexError::MissingLinkId);
        }
        doc.indexed_at = Utc::now();

        let mut data = self.data.write().unwrap();

        // Re-indexing keeps the score assigned by the ranking pass and
        // retracts the previous content from the postings.
        let previous = data
            .docs
            .get(&doc.link_id)
            .map(|existing| (existing.page_rank, searchable_text(existing)));
        if let Some((page_rank, old_text)) = previous {
            doc.page_rank = page_rank;
            for token in self.tokenizer.tokenize(&old_text) {
                let now_empty = match data.postings.get_mut(&token) {
                    Some(ids) => {
                        ids.remove(&doc.link_id);
                        ids.is_empty()
                    }
                    None => false,
                };
                if now_empty {
                    data.postings.remove(&token);
                }
            }
        }

        for token in self.tokenizer.tokenize(&searchable_text(&doc)) {
            data.postings.entry(token).or_default().insert(doc.link_id);
        }
        data.docs.insert(doc.link_id, doc.clone());
        Ok(doc)
    }

    fn find_by_id(&self, link_id: Uuid) -> Result<Document> {
        self.data
            .read()
            .unwrap()
            .docs
            .get(&link_id)
            .cloned()
            .ok_or(IndexError::NotFound)
    }

    fn search(&self, query: Query) -> Result<SearchResults> {
        let data = self.data.read().unwrap();

        let mut hits: Vec<(Document, usize)> = match query.kind {
            QueryKind::Match => {
                let terms = self.tokenizer.tokenize_query(&query.expression);
                let mut scores: HashMap<Uuid, usize> = HashMap::new();
                for term in &terms {
                    if let Some(ids) = data.postings.get(term) {
                        for id in ids {
                            *scores.entry(*id).or_insert(0) += 1;
                        }
                    }
                }
                scores
                    .into_iter()
                    .filter_map(|(id, score)| {
                        data.docs.get(&id).map(|doc| (doc.clone(), score))
                    })
                    .collect()
            }
            QueryKind::Phrase => {
                let needle = query.expression.to_lowercase();
                data.docs
                    .values()
                    .filter(|doc| {
                        doc.title.to_lowercase().contains(&needle)
                            || doc.content.to_lowercase().contains(&needle)
                    })
                    .map(|doc| (doc.clone(), 1))
                    .collect()
            }
        };

        hits.sort_by(|a, b| {
            b.0.page_rank
                .partial_cmp(&a.0.page_rank)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.1.cmp(&a.1))
                .then_with(|| a.0.url.cmp(&b.0.url))
        });

        let total_count = hits.len() as u64;
        let page: Vec<Document> = hits
            .into_iter()
            .skip(query.offset)
            .take(RESULTS_PER_PAGE)
            .map(|(doc, _)| doc)
            .collect();
        Ok(SearchResults::new(page, total_count))
    }

    fn update_score(&self, link_id: Uuid, score: f64) -> Result<()> {
        let mut data = self.data.write().unwrap();
        match data.docs.get_mut(&link_id) {
            Some(doc) => doc.page_rank = score,
            None => {
                // Keep the score around; the document may be indexed
                // later and must not lose it.
                let mut placeholder = Document::new(link_id, "");
                placeholder.page_rank = score;
                data.docs.insert(link_id, placeholder);
            }
        }
        Ok(())
    }
}

fn searchable_text(doc: &Document) -> String {
    format!("{} {}", doc.title, doc.content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(url: &str, title: &str, content: &str) -> Document {
        let mut doc = Document::new(Uuid::new_v4(), url);
        doc.title = title.to_string();
        doc.content = content.to_string();
        doc
    }

    #[test]
    fn index_rejects_nil_link_ids() {
        let index = InMemoryIndex::new();
        let err = index.index(Document::new(Uuid::nil(), "x")).unwrap_err();
        assert!(matches!(err, IndexError::MissingLinkId));
    }

    #[test]
    fn indexed_documents_can_be_found_by_id() {
        let index = InMemoryIndex::new();
        let stored = index
            .index(doc("https://a.test", "Rust systems", "fearless concurrency"))
            .unwrap();
        let found = index.find_by_id(stored.link_id).unwrap();
        assert_eq!(found.title, "Rust systems");
        assert!(matches!(
            index.find_by_id(Uuid::new_v4()),
            Err(IndexError::NotFound)
        ));
    }

    #[test]
    fn match_queries_score_by_matched_terms() {
        let index = InMemoryIndex::new();
        index
            .index(doc("https://both.test", "rust pipelines", "streaming pipelines in rust"))
            .unwrap();
        index
            .index(doc("https://one.test", "gardening", "pipelines of water"))
            .unwrap();

        let results: Vec<Document> = index
            .search(Query::matching("rust pipelines"))
            .unwrap()
            .collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://both.test");
    }

    #[test]
    fn phrase_queries_require_the_exact_phrase() {
        let index = InMemoryIndex::new();
        index
            .index(doc("https://a.test", "", "the quick brown fox"))
            .unwrap();
        index
            .index(doc("https://b.test", "", "the brown quick fox"))
            .unwrap();

        let results: Vec<Document> = index
            .search(Query::phrase("quick brown"))
            .unwrap()
            .collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://a.test");
    }

    #[test]
    fn page_rank_orders_results_before_score() {
        let index = InMemoryIndex::new();
        let low = index
            .index(doc("https://low.test", "rust rust", "rust everywhere"))
            .unwrap();
        let high = index
            .index(doc("https://high.test", "rust", ""))
            .unwrap();
        index.update_score(low.link_id, 0.1).unwrap();
        index.update_score(high.link_id, 0.9).unwrap();

        let results: Vec<Document> = index.search(Query::matching("rust")).unwrap().collect();
        assert_eq!(results[0].url, "https://high.test");
    }

    #[test]
    fn reindexing_updates_postings_and_keeps_the_score() {
        let index = InMemoryIndex::new();
        let first = index
            .index(doc("https://a.test", "", "ancient history"))
            .unwrap();
        index.update_score(first.link_id, 0.7).unwrap();

        let mut updated = first.clone();
        updated.content = "modern computing".to_string();
        let stored = index.index(updated).unwrap();
        assert_eq!(stored.page_rank, 0.7);

        let search = |expr: &str| -> u64 {
            index.search(Query::matching(expr)).unwrap().total_count()
        };
        assert_eq!(search("history"), 0, "old tokens must be retracted");
        assert_eq!(search("computing"), 1);
    }

    #[test]
    fn update_score_stores_a_placeholder_for_unknown_documents() {
        let index = InMemoryIndex::new();
        let link_id = Uuid::new_v4();
        index.update_score(link_id, 0.4).unwrap();

        let mut incoming = Document::new(link_id, "https://late.test");
        incoming.content = "finally crawled".to_string();
        let stored = index.index(incoming).unwrap();
        assert_eq!(stored.page_rank, 0.4);
    }

    #[test]
    fn search_paginates_with_offset_and_total_count() {
        let index = InMemoryIndex::new();
        for i in 0..15 {
            index
                .index(doc(&format!("https://host{i:02}.test"), "shared topic", ""))
                .unwrap();
        }

        let first_page = index.search(Query::matching("shared")).unwrap();
        assert_eq!(first_page.total_count(), 15);
        assert_eq!(first_page.count(), 10);

        let mut query = Query::matching("shared");
        query.offset = 10;
        let second_page = index.search(query).unwrap();
        assert_eq!(second_page.total_count(), 15);
        assert_eq!(second_page.count(), 5);
    }
}
