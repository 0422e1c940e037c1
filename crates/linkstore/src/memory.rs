//! In-memory link store.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Edge, EdgeIterator, Link, LinkIterator, LinkStore, Result, StoreError};

#[derive(Default)]
struct StoreData {
    links: HashMap<Uuid, Link>,
    edges: HashMap<Uuid, Edge>,
    url_index: HashMap<String, Uuid>,
    // Edge ids keyed by the id of their source link.
    edges_by_src: HashMap<Uuid, Vec<Uuid>>,
}

/// A concurrency-safe, in-memory [`LinkStore`] implementation.
///
/// Suitable for tests and single-host deployments; swap in a durable
/// implementation behind the same trait for anything else.
#[derive(Default)]
pub struct InMemoryLinkStore {
    data: RwLock<StoreData>,
}

impl InMemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LinkStore for InMemoryLinkStore {
    fn upsert_link(&self, mut link: Link) -> Result<Link> {
        let mut data = self.data.write().unwrap();

        if let Some(&id) = data.url_index.get(&link.url) {
            let existing = data.links.get_mut(&id).expect("url index out of sync");
            // Keep the most recent retrieval time.
            if link.retrieved_at > existing.retrieved_at {
                existing.retrieved_at = link.retrieved_at;
            }
            return Ok(existing.clone());
        }

        link.id = Uuid::new_v4();
        data.url_index.insert(link.url.clone(), link.id);
        data.links.insert(link.id, link.clone());
        Ok(link)
    }

    fn find_link(&self, id: Uuid) -> Result<Link> {
        self.data
            .read()
            .unwrap()
            .links
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn upsert_edge(&self, mut edge: Edge) -> Result<Edge> {
        let mut data = self.data.write().unwrap();

        if !data.links.contains_key(&edge.src) || !data.links.contains_key(&edge.dst) {
            return Err(StoreError::UnknownEdgeLinks);
        }

        // An edge between the same endpoints only has its timestamp
        // refreshed.
        let existing_id = data
            .edges_by_src
            .get(&edge.src)
            .into_iter()
            .flatten()
            .copied()
            .find(|id| data.edges.get(id).map(|e| e.dst) == Some(edge.dst));
        if let Some(id) = existing_id {
            let existing = data.edges.get_mut(&id).expect("edge index out of sync");
            existing.updated_at = Utc::now();
            return Ok(existing.clone());
        }

        edge.id = Uuid::new_v4();
        edge.updated_at = Utc::now();
        data.edges.insert(edge.id, edge.clone());
        data.edges_by_src.entry(edge.src).or_default().push(edge.id);
        Ok(edge)
    }

    fn remove_stale_edges(&self, from: Uuid, updated_before: DateTime<Utc>) -> Result<()> {
        let mut data = self.data.write().unwrap();

        let mut retained = Vec::new();
        for edge_id in data.edges_by_src.remove(&from).unwrap_or_default() {
            let stale = data
                .edges
                .get(&edge_id)
                .map(|edge| edge.updated_at < updated_before)
                .unwrap_or(true);
            if stale {
                data.edges.remove(&edge_id);
            } else {
                retained.push(edge_id);
            }
        }
        data.edges_by_src.insert(from, retained);
        Ok(())
    }

    fn links(
        &self,
        from: Uuid,
        to: Uuid,
        retrieved_before: DateTime<Utc>,
    ) -> Result<LinkIterator> {
        let data = self.data.read().unwrap();
        let partition: Vec<Link> = data
            .links
            .values()
            .filter(|link| {
                link.id >= from && link.id < to && link.retrieved_at < retrieved_before
            })
            .cloned()
            .collect();
        Ok(Box::new(partition.into_iter()))
    }

    fn edges(&self, from: Uuid, to: Uuid, updated_before: DateTime<Utc>) -> Result<EdgeIterator> {
        let data = self.data.read().unwrap();
        let mut partition = Vec::new();
        for (src, edge_ids) in &data.edges_by_src {
            if *src < from || *src >= to {
                continue;
            }
            for edge_id in edge_ids {
                if let Some(edge) = data.edges.get(edge_id) {
                    if edge.updated_at < updated_before {
                        partition.push(edge.clone());
                    }
                }
            }
        }
        Ok(Box::new(partition.into_iter()))
    }
}
