//! In-memory approximate nearest-neighbor index over embeddings.
//!
//! Slots map to vectors; deleted slots are tombstoned and reused through a
//! free list. A navigable-small-world adjacency list accelerates search when
//! present; a brute-force scan is the correctness baseline and the fallback
//! whenever the graph is missing (crash, disk-spill build, filtered query).
//!
//! Disk-spill mode bounds resident memory during large builds: new vectors
//! append to a temp file as packed little-endian `f32`, and only a
//! slot→offset map stays in RAM until the first search loads them back.

use std::collections::HashMap;
use std::collections::HashSet;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::RwLock;

use tracing::debug;
use tracing::info;
use zerocopy::AsBytes;

use crate::error::Result;
use crate::error::RetrievalErr;

/// Neighbors kept per slot at insert time.
const DEFAULT_M: usize = 16;
/// Recorded build parameter, persisted in the savepoint header.
const DEFAULT_EF_CONSTRUCTION: usize = 200;
/// Beam width during graph search.
const DEFAULT_EF_SEARCH: usize = 50;

/// One search hit: slot plus both distance and clamped similarity score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub slot: i64,
    /// Cosine distance in `[0, 2]`.
    pub distance: f32,
    /// `1 − distance`, clamped to `[0, 1]`.
    pub score: f32,
}

/// ANN index.
#[derive(Debug)]
pub struct AnnIndex {
    inner: RwLock<Inner>,
}

#[derive(Debug)]
struct Inner {
    dimension: usize,
    next_slot: i64,
    vectors: HashMap<i64, Vec<f32>>,
    tombstones: HashSet<i64>,
    free_list: Vec<i64>,
    neighbors: HashMap<i64, Vec<i64>>,
    m: usize,
    ef_construction: usize,
    ef_search: usize,
    disk: Option<DiskSpill>,
}

#[derive(Debug)]
struct DiskSpill {
    file: File,
    path: PathBuf,
    offsets: HashMap<i64, u64>,
}

impl AnnIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                dimension,
                next_slot: 0,
                vectors: HashMap::new(),
                tombstones: HashSet::new(),
                free_list: Vec::new(),
                neighbors: HashMap::new(),
                m: DEFAULT_M,
                ef_construction: DEFAULT_EF_CONSTRUCTION,
                ef_search: DEFAULT_EF_SEARCH,
                disk: None,
            }),
        }
    }

    pub fn dimension(&self) -> usize {
        self.read().dimension
    }

    /// Live (non-tombstoned) vector count. Deletion removes the vector
    /// entry, so the maps hold live slots only.
    pub fn len(&self) -> usize {
        let inner = self.read();
        let on_disk = inner.disk.as_ref().map_or(0, |d| d.offsets.len());
        inner.vectors.len() + on_disk
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_disk_mode(&self) -> bool {
        self.read().disk.is_some()
    }

    /// Slots currently on the free list, oldest first.
    pub fn free_slots(&self) -> Vec<i64> {
        self.read().free_list.clone()
    }

    /// Insert a vector, reusing a freed slot when one exists.
    pub fn insert(&self, vector: Vec<f32>) -> Result<i64> {
        let mut inner = self.write();
        if vector.len() != inner.dimension {
            return Err(RetrievalErr::DimensionMismatch {
                stored: inner.dimension,
                actual: vector.len(),
            });
        }

        let slot = match inner.free_list.pop() {
            Some(reused) => {
                inner.tombstones.remove(&reused);
                reused
            }
            None => {
                let slot = inner.next_slot;
                inner.next_slot += 1;
                slot
            }
        };

        if inner.disk.is_some() {
            inner.append_to_disk(slot, &vector)?;
        } else {
            inner.link_neighbors(slot, &vector);
            inner.vectors.insert(slot, vector);
        }

        Ok(slot)
    }

    /// Tombstone a slot and push it onto the free list.
    ///
    /// Neighbor lists are not pruned eagerly; search skips tombstones.
    pub fn delete(&self, slot: i64) {
        let mut inner = self.write();
        if slot >= inner.next_slot || inner.tombstones.contains(&slot) {
            return;
        }
        inner.vectors.remove(&slot);
        if let Some(disk) = &mut inner.disk {
            disk.offsets.remove(&slot);
        }
        inner.tombstones.insert(slot);
        inner.free_list.push(slot);
    }

    /// Top-`k` nearest live slots by cosine distance.
    ///
    /// `filter` restricts candidates to the given slot set. Filtered and
    /// graph-less queries use the brute-force baseline; the graph is an
    /// optimization for full-index queries only.
    pub fn search(&self, query: &[f32], k: usize, filter: Option<&HashSet<i64>>) -> Vec<Hit> {
        if k == 0 {
            return Vec::new();
        }

        // Disk mode: lazy-load spilled vectors once, then search in RAM.
        if self.read().needs_disk_load() {
            if let Err(e) = self.write().load_spilled() {
                tracing::warn!(error = %e, "Failed to load spilled vectors, searching RAM only");
            }
        }

        let inner = self.read();
        if query.len() != inner.dimension {
            return Vec::new();
        }

        let mut hits = if filter.is_none() && !inner.neighbors.is_empty() {
            inner.graph_search(query, k)
        } else {
            inner.brute_force(query, k, filter)
        };
        hits.truncate(k);
        hits
    }

    /// Switch new inserts to the disk-spill file.
    pub fn enable_disk_mode(&self, temp_path: &Path) -> Result<()> {
        let mut inner = self.write();
        if inner.disk.is_some() {
            return Ok(());
        }
        if let Some(parent) = temp_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(temp_path)?;
        inner.disk = Some(DiskSpill {
            file,
            path: temp_path.to_path_buf(),
            offsets: HashMap::new(),
        });
        info!(path = %temp_path.display(), "ANN disk-spill mode enabled");
        Ok(())
    }

    /// Flush outstanding spilled vectors into RAM and delete the temp file.
    pub fn disable_disk_mode(&self) -> Result<()> {
        let mut inner = self.write();
        if inner.disk.is_none() {
            return Ok(());
        }
        inner.load_spilled()?;
        if let Some(disk) = inner.disk.take() {
            let _ = std::fs::remove_file(&disk.path);
            debug!(path = %disk.path.display(), "ANN disk-spill file removed");
        }
        Ok(())
    }

    /// Persist to the savepoint format.
    ///
    /// Layout: a 24-byte little-endian header `{dimension, next_slot,
    /// free-list length, vector count, M, efConstruction}`, the free list as
    /// `i32`s, the adjacency block (entry count, then `{slot,
    /// neighbor_count, neighbors[]}`), then each live vector as `{slot,
    /// tombstone byte, f32[dimension]}`.
    pub fn save(&self, path: &Path) -> Result<()> {
        // Spilled vectors must be in RAM to be written out.
        if self.read().needs_disk_load() {
            self.write().load_spilled()?;
        }

        let inner = self.read();
        let mut buf: Vec<u8> = Vec::new();

        for value in [
            inner.dimension as u32,
            inner.next_slot as u32,
            inner.free_list.len() as u32,
            inner.vectors.len() as u32,
            inner.m as u32,
            inner.ef_construction as u32,
        ] {
            buf.extend_from_slice(&value.to_le_bytes());
        }

        for slot in &inner.free_list {
            buf.extend_from_slice(&(*slot as i32).to_le_bytes());
        }

        buf.extend_from_slice(&(inner.neighbors.len() as u32).to_le_bytes());
        for (slot, neighbors) in &inner.neighbors {
            buf.extend_from_slice(&(*slot as i32).to_le_bytes());
            buf.extend_from_slice(&(neighbors.len() as u32).to_le_bytes());
            for neighbor in neighbors {
                buf.extend_from_slice(&(*neighbor as i32).to_le_bytes());
            }
        }

        for (slot, vector) in &inner.vectors {
            buf.extend_from_slice(&(*slot as i32).to_le_bytes());
            buf.push(u8::from(inner.tombstones.contains(slot)));
            buf.extend_from_slice(vector.as_bytes());
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        file.write_all(&buf)?;
        file.sync_all()?;

        debug!(
            path = %path.display(),
            vectors = inner.vectors.len(),
            free = inner.free_list.len(),
            "ANN index saved"
        );
        Ok(())
    }

    /// Load a savepoint. A missing neighbor block degrades to brute-force;
    /// a dimension mismatch against the provider is fatal.
    pub fn load(path: &Path, expected_dimension: usize) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;

        let mut cursor = 0usize;
        let mut header = [0u32; 6];
        for value in header.iter_mut() {
            *value = read_u32(&buf, &mut cursor)?;
        }
        let [dimension, next_slot, free_len, vector_count, m, ef_construction] = header;
        let dimension = dimension as usize;

        if dimension != expected_dimension {
            return Err(RetrievalErr::DimensionMismatch {
                stored: dimension,
                actual: expected_dimension,
            });
        }

        let mut free_list = Vec::with_capacity(free_len as usize);
        for _ in 0..free_len {
            free_list.push(read_i32(&buf, &mut cursor)? as i64);
        }

        // The neighbor block is optional: a crash-truncated savepoint may
        // hold exactly the vector section after the free list.
        let vector_record = 4 + 1 + 4 * dimension;
        let vectors_only_size = vector_count as usize * vector_record;
        let mut neighbors = HashMap::new();
        if buf.len() - cursor != vectors_only_size {
            let entry_count = read_u32(&buf, &mut cursor)?;
            for _ in 0..entry_count {
                let slot = read_i32(&buf, &mut cursor)? as i64;
                let count = read_u32(&buf, &mut cursor)?;
                let mut list = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    list.push(read_i32(&buf, &mut cursor)? as i64);
                }
                neighbors.insert(slot, list);
            }
        } else if vector_count > 0 {
            info!("ANN savepoint has no neighbor block, falling back to brute-force");
        }

        let mut vectors = HashMap::with_capacity(vector_count as usize);
        let mut tombstones: HashSet<i64> = free_list.iter().copied().collect();
        for _ in 0..vector_count {
            let slot = read_i32(&buf, &mut cursor)? as i64;
            let tombstoned = read_u8(&buf, &mut cursor)? != 0;
            let mut vector = vec![0.0f32; dimension];
            for value in vector.iter_mut() {
                *value = f32::from_le_bytes(read_array(&buf, &mut cursor)?);
            }
            if tombstoned {
                tombstones.insert(slot);
            } else {
                vectors.insert(slot, vector);
            }
        }

        debug!(
            path = %path.display(),
            vectors = vectors.len(),
            neighbors = neighbors.len(),
            "ANN index loaded"
        );

        Ok(Self {
            inner: RwLock::new(Inner {
                dimension,
                next_slot: next_slot as i64,
                vectors,
                tombstones,
                free_list,
                neighbors,
                m: m as usize,
                ef_construction: ef_construction as usize,
                ef_search: DEFAULT_EF_SEARCH,
                disk: None,
            }),
        })
    }

    /// Return excess map and list capacity to the allocator.
    ///
    /// Delete-then-reinsert churn leaves the vector and neighbor maps
    /// holding capacity for their high-water mark; the orchestrator calls
    /// this on its periodic shrink pass.
    pub fn release_memory(&self) {
        let mut inner = self.write();
        inner.vectors.shrink_to_fit();
        inner.tombstones.shrink_to_fit();
        inner.free_list.shrink_to_fit();
        for list in inner.neighbors.values_mut() {
            list.shrink_to_fit();
        }
        inner.neighbors.shrink_to_fit();
        if let Some(disk) = &mut inner.disk {
            disk.offsets.shrink_to_fit();
        }
    }

    /// Wipe everything, keeping the dimension. Any disk-spill temp file is
    /// removed.
    pub fn clear(&self) {
        let mut inner = self.write();
        if let Some(disk) = inner.disk.take() {
            let _ = std::fs::remove_file(&disk.path);
        }
        inner.next_slot = 0;
        inner.vectors.clear();
        inner.tombstones.clear();
        inner.free_list.clear();
        inner.neighbors.clear();
    }

    /// Drop the adjacency list (used by tests to exercise the fallback).
    #[cfg(test)]
    pub fn drop_graph(&self) {
        self.write().neighbors.clear();
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Inner {
    /// Exact top-M linking per insert; neighbor lists cap at 2M.
    fn link_neighbors(&mut self, slot: i64, vector: &[f32]) {
        let mut nearest: Vec<(f32, i64)> = self
            .vectors
            .iter()
            .filter(|(other, _)| !self.tombstones.contains(other))
            .map(|(other, v)| (cosine_distance(vector, v), *other))
            .collect();

        if nearest.is_empty() {
            // First vector: empty neighbor list.
            self.neighbors.insert(slot, Vec::new());
            return;
        }

        nearest.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        nearest.truncate(self.m);

        let linked: Vec<i64> = nearest.iter().map(|(_, s)| *s).collect();
        for neighbor in &linked {
            let list = self.neighbors.entry(*neighbor).or_default();
            list.push(slot);
            if list.len() > 2 * self.m {
                list.truncate(2 * self.m);
            }
        }
        self.neighbors.insert(slot, linked);
    }

    fn brute_force(&self, query: &[f32], k: usize, filter: Option<&HashSet<i64>>) -> Vec<Hit> {
        let mut hits: Vec<Hit> = self
            .vectors
            .iter()
            .filter(|(slot, _)| !self.tombstones.contains(slot))
            .filter(|(slot, _)| filter.is_none_or(|f| f.contains(slot)))
            .map(|(slot, vector)| hit(*slot, cosine_distance(query, vector)))
            .collect();
        sort_hits(&mut hits);
        hits.truncate(k);
        hits
    }

    /// Beam search over the adjacency list.
    fn graph_search(&self, query: &[f32], k: usize) -> Vec<Hit> {
        let ef = self.ef_search.max(k);

        let Some(entry) = self
            .vectors
            .keys()
            .find(|slot| !self.tombstones.contains(slot))
            .copied()
        else {
            return Vec::new();
        };

        let mut visited: HashSet<i64> = HashSet::from([entry]);
        let mut best: Vec<Hit> = Vec::new();
        if let Some(v) = self.vectors.get(&entry) {
            best.push(hit(entry, cosine_distance(query, v)));
        }
        let mut frontier: Vec<i64> = vec![entry];

        while let Some(current) = frontier.pop() {
            let Some(links) = self.neighbors.get(&current) else {
                continue;
            };
            for neighbor in links {
                if !visited.insert(*neighbor) {
                    continue;
                }
                let Some(vector) = self.vectors.get(neighbor) else {
                    continue; // tombstoned or spilled
                };
                let candidate = hit(*neighbor, cosine_distance(query, vector));
                let worst = best.last().map_or(f32::INFINITY, |h| h.distance);
                if best.len() < ef || candidate.distance < worst {
                    best.push(candidate);
                    sort_hits(&mut best);
                    best.truncate(ef);
                    frontier.push(*neighbor);
                }
            }
        }

        // The beam can miss disconnected islands; that is the accepted
        // approximation. Tombstones never surface because they have no
        // vector entry.
        best.truncate(k);
        best
    }

    fn needs_disk_load(&self) -> bool {
        self.disk.as_ref().is_some_and(|d| !d.offsets.is_empty())
    }

    fn append_to_disk(&mut self, slot: i64, vector: &[f32]) -> Result<()> {
        let disk = self
            .disk
            .as_mut()
            .unwrap_or_else(|| unreachable!("checked by caller"));
        let offset = disk.file.seek(SeekFrom::End(0))?;
        disk.file.write_all(vector.as_bytes())?;
        disk.offsets.insert(slot, offset);
        Ok(())
    }

    /// Move every spilled vector back into RAM.
    fn load_spilled(&mut self) -> Result<()> {
        let dimension = self.dimension;
        let Some(disk) = self.disk.as_mut() else {
            return Ok(());
        };
        if disk.offsets.is_empty() {
            return Ok(());
        }

        let count = disk.offsets.len();
        let mut loaded: Vec<(i64, Vec<f32>)> = Vec::with_capacity(count);
        let mut raw = vec![0u8; 4 * dimension];
        for (slot, offset) in &disk.offsets {
            disk.file.seek(SeekFrom::Start(*offset))?;
            disk.file.read_exact(&mut raw)?;
            let vector: Vec<f32> = raw
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            loaded.push((*slot, vector));
        }
        disk.offsets.clear();

        for (slot, vector) in loaded {
            if !self.tombstones.contains(&slot) {
                self.vectors.insert(slot, vector);
            }
        }
        info!(count, "Spilled vectors loaded back to RAM");
        Ok(())
    }
}

fn hit(slot: i64, distance: f32) -> Hit {
    Hit {
        slot,
        distance,
        score: (1.0 - distance).clamp(0.0, 1.0),
    }
}

fn sort_hits(hits: &mut [Hit]) {
    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.slot.cmp(&b.slot))
    });
}

/// Cosine distance `1 − cos(a, b)`, in `[0, 2]`. Zero vectors are treated
/// as maximally distant from everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 2.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 2.0;
    }
    let similarity = (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0);
    1.0 - similarity
}

fn read_u32(buf: &[u8], cursor: &mut usize) -> Result<u32> {
    Ok(u32::from_le_bytes(read_array(buf, cursor)?))
}

fn read_i32(buf: &[u8], cursor: &mut usize) -> Result<i32> {
    Ok(i32::from_le_bytes(read_array(buf, cursor)?))
}

fn read_u8(buf: &[u8], cursor: &mut usize) -> Result<u8> {
    if *cursor + 1 > buf.len() {
        return Err(RetrievalErr::IndexCorrupt("unexpected end of file".to_string()));
    }
    let value = buf[*cursor];
    *cursor += 1;
    Ok(value)
}

fn read_array<const N: usize>(buf: &[u8], cursor: &mut usize) -> Result<[u8; N]> {
    if *cursor + N > buf.len() {
        return Err(RetrievalErr::IndexCorrupt("unexpected end of file".to_string()));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[*cursor..*cursor + N]);
    *cursor += N;
    Ok(out)
}

#[cfg(test)]
#[path = "ann_index.test.rs"]
mod tests;
