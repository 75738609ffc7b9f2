//! # VectorStore
//!
//! Persistent embedding database for sitechat.
//!
//! The store holds text chunks scraped from web pages, each tagged with the
//! URL it came from, and ranks them against query embeddings by inner product
//! (cosine similarity, given normalized vectors). It owns both halves of the
//! state directly: a [`FlatIndex`] of vectors and an id→[`Chunk`] map, kept in
//! lock-step by every public operation.
//!
//! ## Responsibilities
//! - **Ingestion**: [`add`](VectorStore::add) inserts one URL's worth of
//!   chunks at a time, replacing whatever that URL had before
//!   (upsert-by-source).
//! - **Retrieval**: [`search`](VectorStore::search) runs exact k-NN over the
//!   whole store or scoped to a single URL.
//! - **Deletion**: [`remove_by_source`](VectorStore::remove_by_source) drops a
//!   URL's chunks and rebuilds the index from the survivors; ids are never
//!   renumbered.
//! - **Persistence**: every mutation writes the full state through a
//!   [`BlobStore`] before reporting success, so an acknowledged write survives
//!   a restart.
//!
//! ## Serialization layout
//! One blob: a 4-byte magic tag, a BLAKE3 checksum of the payload, then the
//! bincode-encoded snapshot (dimension, next id, ids, vectors in insertion
//! order, records sorted by id). Anything that fails these checks surfaces as
//! [`StoreError::PersistenceCorrupt`] at startup rather than being discarded.
//!
//! ## Quick example
//! ```rust
//! use sitechat::storage::MemoryStore;
//! use sitechat::vector_store::{NewChunk, VectorStore};
//! use std::collections::HashMap;
//!
//! # fn main() -> Result<(), sitechat::vector_store::StoreError> {
//! let mut store = VectorStore::open(3, Box::new(MemoryStore::new()))?;
//! store.add(vec![NewChunk {
//!     text: "Rust is great!".into(),
//!     embedding: vec![1.0, 0.0, 0.0],
//!     source: "https://example.com".into(),
//!     metadata: HashMap::from([("url".to_string(), "https://example.com".to_string())]),
//! }])?;
//! let hits = store.search(&[1.0, 0.0, 0.0], 1, None)?;
//! assert_eq!(hits[0].text, "Rust is great!");
//! # Ok(()) }
//! ```

use std::collections::HashMap;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::index::FlatIndex;
use crate::storage::BlobStore;

/// Magic tag prefixed to every persisted snapshot.
const SNAPSHOT_MAGIC: &[u8; 4] = b"SCS1";

/// BLAKE3 digest length in the snapshot framing.
const CHECKSUM_LEN: usize = 32;

/// Failures the store can report. Every variant surfaces to the caller;
/// nothing is logged-and-swallowed.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An embedding's length does not match the store's dimension. Rejected
    /// before any mutation, so the store is unchanged.
    #[error("embedding has dimension {actual}, store expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// An `add` batch mixed chunks from more than one source.
    #[error("batch mixes chunks from \"{first}\" and \"{second}\"")]
    InvalidBatch { first: String, second: String },

    /// The persisted state is unreadable or structurally invalid.
    #[error("persisted store is corrupt: {0}")]
    PersistenceCorrupt(String),

    /// The storage backend rejected a write. The in-memory state was left as
    /// it was before the failed operation.
    #[error("failed to persist store state")]
    PersistenceWrite(#[source] io::Error),
}

/// A stored chunk: the original text, the URL it was scraped from, and
/// caller-supplied metadata (opaque to the store, always at least the url
/// association).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source: String,
    pub metadata: HashMap<String, String>,
}

/// A chunk on its way into the store: [`Chunk`] fields plus the embedding,
/// which lives in the index once inserted.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub text: String,
    pub embedding: Vec<f32>,
    pub source: String,
    pub metadata: HashMap<String, String>,
}

/// One search result: the record's id and content plus its inner-product
/// score against the query (higher is more similar).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: usize,
    pub score: f32,
    pub text: String,
    pub source: String,
    pub metadata: HashMap<String, String>,
}

/// On-disk form of the whole store. `ids` and `vectors` share insertion
/// order; `records` is sorted by id so identical states encode identically.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    dimension: usize,
    next_id: usize,
    ids: Vec<usize>,
    vectors: Vec<f32>,
    records: Vec<(usize, Chunk)>,
}

/// Persistent, URL-scoped embedding store.
///
/// Invariants held after every public operation:
/// - the index and the record map describe the same set: `ids[p]` is the id
///   of the vector at index position `p`, and every id in `ids` has a record;
/// - every stored vector has the store's dimension;
/// - at most one batch of chunks exists per source;
/// - ids are assigned densely upward and never renumbered (deletions leave
///   gaps).
impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("dimension", &self.dimension)
            .field("ids", &self.ids)
            .field("next_id", &self.next_id)
            .finish()
    }
}

pub struct VectorStore {
    /// Dimensionality of all stored and queried vectors.
    dimension: usize,
    /// Exact inner-product index, positions in insertion order.
    index: FlatIndex,
    /// Position → id. Ascending, since insertion assigns ids upward and
    /// removal preserves order.
    ids: Vec<usize>,
    /// Id → record.
    records: HashMap<usize, Chunk>,
    /// Next id to assign.
    next_id: usize,
    /// Durable storage for the snapshot.
    backend: Box<dyn BlobStore>,
}

impl VectorStore {
    /// Open the store, loading persisted state from `backend` if any exists.
    ///
    /// # Parameters
    /// - `dimension`: Vector dimensionality every embedding must match
    ///   (384 for all-MiniLM-L6-v2).
    /// - `backend`: Durable blob storage; [`crate::storage::FileStore`] in
    ///   production, [`crate::storage::MemoryStore`] in tests.
    ///
    /// # Errors
    /// [`StoreError::PersistenceCorrupt`] if a persisted blob exists but is
    /// unreadable, fails its checksum, or decodes to an inconsistent state
    /// (including a dimension that differs from `dimension`). Corruption is
    /// surfaced, never silently discarded.
    pub fn open(dimension: usize, backend: Box<dyn BlobStore>) -> Result<Self, StoreError> {
        let bytes = backend
            .read()
            .map_err(|e| StoreError::PersistenceCorrupt(format!("unreadable state: {e}")))?;

        let Some(bytes) = bytes else {
            debug!("No persisted state, starting empty with dimension {dimension}");
            return Ok(Self {
                dimension,
                index: FlatIndex::new(dimension),
                ids: Vec::new(),
                records: HashMap::new(),
                next_id: 0,
                backend,
            });
        };

        let snapshot = decode_snapshot(&bytes)?;
        if snapshot.dimension != dimension {
            return Err(StoreError::PersistenceCorrupt(format!(
                "dimension {} on disk, {} requested",
                snapshot.dimension, dimension
            )));
        }
        validate_snapshot(&snapshot)?;

        let Snapshot {
            next_id,
            ids,
            vectors,
            records,
            ..
        } = snapshot;
        let index = FlatIndex::from_rows(dimension, vectors)
            .ok_or_else(|| StoreError::PersistenceCorrupt("ragged vector data".to_string()))?;

        debug!("Loaded {} chunks from persisted state", ids.len());
        Ok(Self {
            dimension,
            index,
            ids,
            records: records.into_iter().collect(),
            next_id,
            backend,
        })
    }

    /// The dimension every embedding must have.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Total number of stored chunks, across all sources.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// `true` if no chunks are stored.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Look up a stored chunk by id. `None` for ids never assigned or since
    /// removed.
    pub fn get(&self, id: usize) -> Option<&Chunk> {
        self.records.get(&id)
    }

    /// Insert one source's worth of chunks, replacing any previous chunks
    /// from the same source.
    ///
    /// Ids are assigned densely from the current high-water mark, in batch
    /// order. The replace-then-insert happens against a private successor
    /// state which is persisted and only then swapped in, so no reader of
    /// this store ever observes the old chunks gone but the new ones missing.
    ///
    /// # Parameters
    /// - `batch`: Chunks sharing one `source`. An empty batch is a no-op.
    ///
    /// # Returns
    /// The number of chunks added.
    ///
    /// # Errors
    /// - [`StoreError::DimensionMismatch`] if any embedding has the wrong
    ///   length (checked before any mutation).
    /// - [`StoreError::InvalidBatch`] if the batch mixes sources.
    /// - [`StoreError::PersistenceWrite`] if the backend rejects the write;
    ///   the in-memory state is left unchanged.
    pub fn add(&mut self, batch: Vec<NewChunk>) -> Result<usize, StoreError> {
        if batch.is_empty() {
            return Ok(0);
        }
        for chunk in &batch {
            if chunk.embedding.len() != self.dimension {
                return Err(StoreError::DimensionMismatch {
                    expected: self.dimension,
                    actual: chunk.embedding.len(),
                });
            }
        }
        let source = batch[0].source.clone();
        if let Some(stray) = batch.iter().find(|c| c.source != source) {
            return Err(StoreError::InvalidBatch {
                first: source,
                second: stray.source.clone(),
            });
        }

        let (mut index, mut ids, mut records) = self.without_source(&source);
        let mut next_id = self.next_id;
        let added = batch.len();
        for chunk in batch {
            index.push(&chunk.embedding);
            ids.push(next_id);
            records.insert(
                next_id,
                Chunk {
                    text: chunk.text,
                    source: chunk.source,
                    metadata: chunk.metadata,
                },
            );
            next_id += 1;
        }

        self.commit(index, ids, records, next_id)?;
        debug!("Added {added} chunks for {source:?}");
        Ok(added)
    }

    /// Remove every chunk whose source matches, rebuilding the index from the
    /// survivors' vectors in their existing id order.
    ///
    /// The index primitive has no in-place delete, so removal reconstructs
    /// each surviving vector into a fresh index at O(surviving) cost.
    /// Surviving ids keep their values; the id counter is not rewound, so
    /// removed ids are never reassigned.
    ///
    /// # Returns
    /// The number of chunks removed. Zero matches is a successful no-op and
    /// skips the persistence write (the durable state would be unchanged).
    ///
    /// # Errors
    /// [`StoreError::PersistenceWrite`] if the backend rejects the write; the
    /// in-memory state is left unchanged.
    pub fn remove_by_source(&mut self, source: &str) -> Result<usize, StoreError> {
        let matching = self
            .ids
            .iter()
            .filter(|id| self.records.get(id).is_some_and(|c| c.source == source))
            .count();
        if matching == 0 {
            return Ok(0);
        }

        let (index, ids, records) = self.without_source(source);
        let next_id = self.next_id;
        self.commit(index, ids, records, next_id)?;
        debug!("Removed {matching} chunks for {source:?}");
        Ok(matching)
    }

    /// Discard everything: all records, all vectors, and the id counter. The
    /// dimension is unchanged. Idempotent.
    ///
    /// # Errors
    /// [`StoreError::PersistenceWrite`] if the backend rejects the write; the
    /// in-memory state is left unchanged.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.commit(FlatIndex::new(self.dimension), Vec::new(), HashMap::new(), 0)
    }

    /// Find the `k` nearest chunks to `query` by inner product.
    ///
    /// With a `source_filter`, only that source's chunks are candidates: a
    /// scoped view is built over their vectors and result positions are
    /// mapped back to the original ids. An empty candidate set — empty store,
    /// or a filter matching nothing — returns an empty result, not an error.
    ///
    /// # Parameters
    /// - `query`: Query embedding of the store's dimension.
    /// - `k`: Maximum results to return; fewer come back if fewer candidates
    ///   exist.
    /// - `source_filter`: Restrict candidates to one source.
    ///
    /// # Returns
    /// Up to `k` [`SearchHit`]s ordered by descending similarity. Ties break
    /// toward the earlier-inserted chunk, so identical queries always return
    /// identical rankings.
    ///
    /// # Errors
    /// [`StoreError::DimensionMismatch`] if the query has the wrong length.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        source_filter: Option<&str>,
    ) -> Result<Vec<SearchHit>, StoreError> {
        if query.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let ranked: Vec<(usize, f32)> = match source_filter {
            None => self
                .index
                .search(query, k)
                .into_iter()
                .map(|(position, score)| (self.ids[position], score))
                .collect(),
            Some(source) => {
                let scoped: Vec<usize> = self
                    .ids
                    .iter()
                    .enumerate()
                    .filter(|(_, id)| self.records.get(id).is_some_and(|c| c.source == source))
                    .map(|(position, _)| position)
                    .collect();
                if scoped.is_empty() {
                    return Ok(Vec::new());
                }

                let mut view = FlatIndex::new(self.dimension);
                for &position in &scoped {
                    if let Some(vector) = self.index.reconstruct(position) {
                        view.push(vector);
                    }
                }
                view.search(query, k)
                    .into_iter()
                    .map(|(view_position, score)| (self.ids[scoped[view_position]], score))
                    .collect()
            }
        };

        // Ids missing from the record map should be impossible; skip them
        // rather than failing the whole query.
        Ok(ranked
            .into_iter()
            .filter_map(|(id, score)| {
                self.records.get(&id).map(|chunk| SearchHit {
                    id,
                    score,
                    text: chunk.text.clone(),
                    source: chunk.source.clone(),
                    metadata: chunk.metadata.clone(),
                })
            })
            .collect())
    }

    /// Copy the current state minus one source's chunks, preserving id order.
    fn without_source(&self, source: &str) -> (FlatIndex, Vec<usize>, HashMap<usize, Chunk>) {
        let mut index = FlatIndex::new(self.dimension);
        let mut ids = Vec::new();
        let mut records = HashMap::new();
        for (position, &id) in self.ids.iter().enumerate() {
            let Some(chunk) = self.records.get(&id) else {
                continue;
            };
            if chunk.source == source {
                continue;
            }
            if let Some(vector) = self.index.reconstruct(position) {
                index.push(vector);
                ids.push(id);
                records.insert(id, chunk.clone());
            }
        }
        (index, ids, records)
    }

    /// Persist a successor state, then swap it in.
    ///
    /// The write happens first: if the backend fails, `self` is untouched and
    /// memory still matches the blob on disk.
    fn commit(
        &mut self,
        index: FlatIndex,
        ids: Vec<usize>,
        records: HashMap<usize, Chunk>,
        next_id: usize,
    ) -> Result<(), StoreError> {
        let mut sorted: Vec<(usize, Chunk)> =
            records.iter().map(|(id, c)| (*id, c.clone())).collect();
        sorted.sort_by_key(|(id, _)| *id);

        let snapshot = Snapshot {
            dimension: self.dimension,
            next_id,
            ids: ids.clone(),
            vectors: index.rows().to_vec(),
            records: sorted,
        };
        let bytes = encode_snapshot(&snapshot)?;
        self.backend
            .write(&bytes)
            .map_err(StoreError::PersistenceWrite)?;

        self.index = index;
        self.ids = ids;
        self.records = records;
        self.next_id = next_id;
        Ok(())
    }
}

/// Frame a snapshot: magic, BLAKE3 checksum, bincode payload.
fn encode_snapshot(snapshot: &Snapshot) -> Result<Vec<u8>, StoreError> {
    let payload = bincode::serde::encode_to_vec(snapshot, bincode::config::standard())
        .map_err(|e| StoreError::PersistenceWrite(io::Error::new(io::ErrorKind::InvalidData, e)))?;

    let mut bytes = Vec::with_capacity(SNAPSHOT_MAGIC.len() + CHECKSUM_LEN + payload.len());
    bytes.extend_from_slice(SNAPSHOT_MAGIC);
    bytes.extend_from_slice(blake3::hash(&payload).as_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Unframe and decode a snapshot, verifying magic and checksum.
fn decode_snapshot(bytes: &[u8]) -> Result<Snapshot, StoreError> {
    let corrupt = |reason: &str| StoreError::PersistenceCorrupt(reason.to_string());

    if bytes.len() < SNAPSHOT_MAGIC.len() + CHECKSUM_LEN {
        return Err(corrupt("truncated header"));
    }
    let (magic, rest) = bytes.split_at(SNAPSHOT_MAGIC.len());
    if magic != SNAPSHOT_MAGIC {
        return Err(corrupt("unrecognized magic tag"));
    }
    let (checksum, payload) = rest.split_at(CHECKSUM_LEN);
    if blake3::hash(payload).as_bytes() != checksum {
        return Err(corrupt("checksum mismatch"));
    }

    let (snapshot, consumed): (Snapshot, usize) =
        bincode::serde::decode_from_slice(payload, bincode::config::standard())
            .map_err(|e| StoreError::PersistenceCorrupt(format!("undecodable payload: {e}")))?;
    if consumed != payload.len() {
        return Err(corrupt("trailing bytes after payload"));
    }
    Ok(snapshot)
}

/// Structural checks beyond what decoding guarantees.
fn validate_snapshot(snapshot: &Snapshot) -> Result<(), StoreError> {
    let corrupt = |reason: &str| StoreError::PersistenceCorrupt(reason.to_string());

    if snapshot.dimension == 0 {
        return Err(corrupt("zero dimension"));
    }
    if snapshot.vectors.len() != snapshot.ids.len() * snapshot.dimension {
        return Err(corrupt("vector data does not match id count"));
    }
    if !snapshot.ids.windows(2).all(|w| w[0] < w[1]) {
        return Err(corrupt("ids out of order"));
    }
    if snapshot.records.len() != snapshot.ids.len()
        || snapshot
            .records
            .iter()
            .zip(&snapshot.ids)
            .any(|((record_id, _), id)| record_id != id)
    {
        return Err(corrupt("record map does not match ids"));
    }
    if let Some(&last) = snapshot.ids.last() {
        if snapshot.next_id <= last {
            return Err(corrupt("id counter behind stored ids"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, MemoryStore};
    use std::sync::Arc;

    fn mem_store() -> VectorStore {
        VectorStore::open(3, Box::new(MemoryStore::new())).unwrap()
    }

    fn chunk(text: &str, embedding: [f32; 3], source: &str) -> NewChunk {
        NewChunk {
            text: text.to_string(),
            embedding: embedding.to_vec(),
            source: source.to_string(),
            metadata: HashMap::from([("url".to_string(), source.to_string())]),
        }
    }

    struct FailingStore;

    impl BlobStore for FailingStore {
        fn read(&self) -> io::Result<Option<Vec<u8>>> {
            Ok(None)
        }

        fn write(&self, _bytes: &[u8]) -> io::Result<()> {
            Err(io::Error::other("disk full"))
        }
    }

    #[test]
    fn empty_batch_is_a_noop() {
        let mut store = mem_store();
        assert_eq!(store.add(Vec::new()).unwrap(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn add_assigns_dense_ids_in_batch_order() {
        let mut store = mem_store();
        store
            .add(vec![
                chunk("first", [1.0, 0.0, 0.0], "https://a.example"),
                chunk("second", [0.0, 1.0, 0.0], "https://a.example"),
            ])
            .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(0).unwrap().text, "first");
        assert_eq!(store.get(1).unwrap().text, "second");
    }

    #[test]
    fn upsert_replaces_previous_chunks_for_source() {
        let mut store = mem_store();
        store
            .add(vec![
                chunk("old one", [1.0, 0.0, 0.0], "https://a.example"),
                chunk("old two", [0.0, 1.0, 0.0], "https://a.example"),
                chunk("old three", [0.0, 0.0, 1.0], "https://a.example"),
            ])
            .unwrap();
        store
            .add(vec![
                chunk("new one", [1.0, 0.0, 0.0], "https://a.example"),
                chunk("new two", [0.0, 1.0, 0.0], "https://a.example"),
            ])
            .unwrap();

        assert_eq!(store.len(), 2);
        let hits = store
            .search(&[1.0, 1.0, 1.0], 10, Some("https://a.example"))
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.text.starts_with("new")));
    }

    #[test]
    fn mixed_source_batch_is_rejected() {
        let mut store = mem_store();
        let err = store
            .add(vec![
                chunk("a", [1.0, 0.0, 0.0], "https://a.example"),
                chunk("b", [0.0, 1.0, 0.0], "https://b.example"),
            ])
            .unwrap_err();

        assert!(matches!(err, StoreError::InvalidBatch { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn wrong_dimension_add_leaves_state_unchanged() {
        let backend = Arc::new(MemoryStore::new());
        let mut store = VectorStore::open(3, Box::new(Arc::clone(&backend))).unwrap();
        store
            .add(vec![chunk("kept", [1.0, 0.0, 0.0], "https://a.example")])
            .unwrap();
        let persisted_before = backend.read().unwrap();

        let mut bad = chunk("bad", [1.0, 0.0, 0.0], "https://b.example");
        bad.embedding = vec![1.0, 0.0];
        let err = store.add(vec![bad]).unwrap_err();

        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(store.len(), 1);
        assert_eq!(backend.read().unwrap(), persisted_before);
    }

    #[test]
    fn wrong_dimension_query_is_rejected() {
        let store = mem_store();
        let err = store.search(&[1.0, 0.0], 1, None).unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { .. }));
    }

    #[test]
    fn empty_store_and_empty_filter_return_empty() {
        let mut store = mem_store();
        assert!(store.search(&[1.0, 0.0, 0.0], 5, None).unwrap().is_empty());

        store
            .add(vec![chunk("a", [1.0, 0.0, 0.0], "https://a.example")])
            .unwrap();
        let hits = store
            .search(&[1.0, 0.0, 0.0], 5, Some("https://nowhere.example"))
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn removal_shrinks_store_and_scoped_search_goes_empty() {
        let mut store = mem_store();
        store
            .add(vec![
                chunk("a1", [1.0, 0.0, 0.0], "https://a.example"),
                chunk("a2", [0.0, 1.0, 0.0], "https://a.example"),
            ])
            .unwrap();
        store
            .add(vec![chunk("b1", [0.0, 0.0, 1.0], "https://b.example")])
            .unwrap();

        assert_eq!(store.remove_by_source("https://a.example").unwrap(), 2);
        assert_eq!(store.len(), 1);
        assert!(
            store
                .search(&[1.0, 0.0, 0.0], 5, Some("https://a.example"))
                .unwrap()
                .is_empty()
        );

        let hits = store.search(&[0.0, 0.0, 1.0], 5, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "b1");
    }

    #[test]
    fn removal_of_unknown_source_is_a_noop() {
        let mut store = mem_store();
        store
            .add(vec![chunk("a", [1.0, 0.0, 0.0], "https://a.example")])
            .unwrap();
        assert_eq!(store.remove_by_source("https://nowhere.example").unwrap(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn ids_survive_removal_unrenumbered() {
        let mut store = mem_store();
        store
            .add(vec![
                chunk("a1", [1.0, 0.0, 0.0], "https://a.example"),
                chunk("a2", [0.0, 1.0, 0.0], "https://a.example"),
            ])
            .unwrap();
        store
            .add(vec![
                chunk("b1", [0.0, 0.0, 1.0], "https://b.example"),
                chunk("b2", [0.0, 0.7, 0.7], "https://b.example"),
            ])
            .unwrap();

        store.remove_by_source("https://a.example").unwrap();
        let hits = store.search(&[0.0, 0.0, 1.0], 5, None).unwrap();
        let mut surviving: Vec<usize> = hits.iter().map(|h| h.id).collect();
        surviving.sort_unstable();
        assert_eq!(surviving, vec![2, 3]);

        // The id counter does not rewind: the next source continues upward.
        store
            .add(vec![chunk("c1", [1.0, 0.0, 0.0], "https://c.example")])
            .unwrap();
        let hits = store
            .search(&[1.0, 0.0, 0.0], 1, Some("https://c.example"))
            .unwrap();
        assert_eq!(hits[0].id, 4);
    }

    #[test]
    fn clear_empties_the_store_and_is_idempotent() {
        let mut store = mem_store();
        store
            .add(vec![chunk("a", [1.0, 0.0, 0.0], "https://a.example")])
            .unwrap();

        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.is_empty());
        assert!(store.search(&[1.0, 0.0, 0.0], 5, None).unwrap().is_empty());

        // After a full reset ids start over from zero.
        store
            .add(vec![chunk("fresh", [1.0, 0.0, 0.0], "https://a.example")])
            .unwrap();
        assert_eq!(store.search(&[1.0, 0.0, 0.0], 1, None).unwrap()[0].id, 0);
    }

    #[test]
    fn search_spans_sources_and_filter_scopes_them() {
        let mut store = mem_store();
        store
            .add(vec![
                chunk("a1", [1.0, 0.0, 0.0], "https://a.example"),
                chunk("a2", [0.9, 0.1, 0.0], "https://a.example"),
                chunk("a3", [0.0, 1.0, 0.0], "https://a.example"),
            ])
            .unwrap();
        store
            .add(vec![
                chunk("b1", [0.95, 0.05, 0.0], "https://b.example"),
                chunk("b2", [0.0, 0.0, 1.0], "https://b.example"),
            ])
            .unwrap();

        let hits = store.search(&[1.0, 0.0, 0.0], 5, None).unwrap();
        assert_eq!(hits.len(), 5);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(hits[0].text, "a1");
        assert_eq!(hits[1].text, "b1");
        let sources: Vec<&str> = hits.iter().map(|h| h.source.as_str()).collect();
        assert!(sources.contains(&"https://a.example"));
        assert!(sources.contains(&"https://b.example"));

        let scoped = store
            .search(&[1.0, 0.0, 0.0], 5, Some("https://a.example"))
            .unwrap();
        assert_eq!(scoped.len(), 3);
        assert!(scoped.iter().all(|h| h.source == "https://a.example"));
        assert_eq!(scoped[0].text, "a1");
        assert_eq!(scoped[1].text, "a2");

        store.clear().unwrap();
        assert!(store.search(&[1.0, 0.0, 0.0], 5, None).unwrap().is_empty());
    }

    #[test]
    fn state_round_trips_through_the_backend() {
        let backend = Arc::new(MemoryStore::new());
        let query = [0.6, 0.8, 0.0];

        let before = {
            let mut store = VectorStore::open(3, Box::new(Arc::clone(&backend))).unwrap();
            store
                .add(vec![
                    chunk("a1", [1.0, 0.0, 0.0], "https://a.example"),
                    chunk("a2", [0.0, 1.0, 0.0], "https://a.example"),
                ])
                .unwrap();
            store
                .add(vec![chunk("b1", [0.0, 0.6, 0.8], "https://b.example")])
                .unwrap();
            store.remove_by_source("https://a.example").unwrap();
            store
                .add(vec![chunk("c1", [0.8, 0.6, 0.0], "https://c.example")])
                .unwrap();
            store.search(&query, 5, None).unwrap()
        };

        let reopened = VectorStore::open(3, Box::new(Arc::clone(&backend))).unwrap();
        assert_eq!(reopened.search(&query, 5, None).unwrap(), before);
        assert_eq!(reopened.len(), 2);
    }

    #[test]
    fn state_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");
        let query = [1.0, 0.0, 0.0];

        let before = {
            let mut store = VectorStore::open(3, Box::new(FileStore::new(&path))).unwrap();
            store
                .add(vec![
                    chunk("a1", [1.0, 0.0, 0.0], "https://a.example"),
                    chunk("a2", [0.5, 0.5, 0.0], "https://a.example"),
                ])
                .unwrap();
            store.search(&query, 2, None).unwrap()
        };

        let reopened = VectorStore::open(3, Box::new(FileStore::new(&path))).unwrap();
        assert_eq!(reopened.search(&query, 2, None).unwrap(), before);
    }

    #[test]
    fn garbage_blob_is_reported_as_corrupt() {
        let backend = Arc::new(MemoryStore::new());
        backend.write(b"not a snapshot at all").unwrap();

        let err = VectorStore::open(3, Box::new(backend)).unwrap_err();
        assert!(matches!(err, StoreError::PersistenceCorrupt(_)));
    }

    #[test]
    fn flipped_payload_byte_fails_the_checksum() {
        let backend = Arc::new(MemoryStore::new());
        {
            let mut store = VectorStore::open(3, Box::new(Arc::clone(&backend))).unwrap();
            store
                .add(vec![chunk("a", [1.0, 0.0, 0.0], "https://a.example")])
                .unwrap();
        }
        let mut bytes = backend.read().unwrap().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        backend.write(&bytes).unwrap();

        let err = VectorStore::open(3, Box::new(backend)).unwrap_err();
        assert!(matches!(err, StoreError::PersistenceCorrupt(_)));
    }

    #[test]
    fn dimension_change_between_runs_is_corrupt() {
        let backend = Arc::new(MemoryStore::new());
        {
            let mut store = VectorStore::open(3, Box::new(Arc::clone(&backend))).unwrap();
            store
                .add(vec![chunk("a", [1.0, 0.0, 0.0], "https://a.example")])
                .unwrap();
        }

        let err = VectorStore::open(4, Box::new(backend)).unwrap_err();
        assert!(matches!(err, StoreError::PersistenceCorrupt(_)));
    }

    #[test]
    fn failed_write_leaves_memory_uncommitted() {
        let mut store = VectorStore::open(3, Box::new(FailingStore)).unwrap();
        let err = store
            .add(vec![chunk("a", [1.0, 0.0, 0.0], "https://a.example")])
            .unwrap_err();

        assert!(matches!(err, StoreError::PersistenceWrite(_)));
        assert!(store.is_empty());
    }
}
