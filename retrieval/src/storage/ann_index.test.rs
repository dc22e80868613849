use super::*;
use pretty_assertions::assert_eq;

fn unit(x: f32, y: f32, z: f32) -> Vec<f32> {
    let norm = (x * x + y * y + z * z).sqrt();
    vec![x / norm, y / norm, z / norm]
}

#[test]
fn cosine_distance_properties() {
    let a = unit(1.0, 0.0, 0.0);
    let b = unit(0.0, 1.0, 0.0);
    let c = unit(-1.0, 0.0, 0.0);

    // Identical vectors are at distance 0; opposite at 2.
    assert!(cosine_distance(&a, &a).abs() < 1e-6);
    assert!((cosine_distance(&a, &b) - 1.0).abs() < 1e-6);
    assert!((cosine_distance(&a, &c) - 2.0).abs() < 1e-6);

    // Symmetric.
    assert_eq!(cosine_distance(&a, &b), cosine_distance(&b, &a));

    // Degenerate inputs are maximally distant.
    assert_eq!(cosine_distance(&[], &[]), 2.0);
    assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 2.0);
}

#[test]
fn score_is_clamped() {
    let h = hit(0, 1.7);
    assert_eq!(h.score, 0.0);
    let h = hit(0, 0.25);
    assert_eq!(h.score, 0.75);
}

#[test]
fn insert_assigns_sequential_slots() {
    let index = AnnIndex::new(3);
    assert_eq!(index.insert(unit(1.0, 0.0, 0.0)).unwrap(), 0);
    assert_eq!(index.insert(unit(0.0, 1.0, 0.0)).unwrap(), 1);
    assert_eq!(index.insert(unit(0.0, 0.0, 1.0)).unwrap(), 2);
    assert_eq!(index.len(), 3);
}

#[test]
fn dimension_mismatch_is_rejected() {
    let index = AnnIndex::new(3);
    assert!(index.insert(vec![1.0, 0.0]).is_err());
}

#[test]
fn delete_then_insert_reuses_slot_before_next() {
    let index = AnnIndex::new(3);
    index.insert(unit(1.0, 0.0, 0.0)).unwrap();
    index.insert(unit(0.0, 1.0, 0.0)).unwrap();

    index.delete(1);
    assert_eq!(index.free_slots(), vec![1]);
    assert_eq!(index.len(), 1);

    // Freed slot reused before next_slot grows.
    let slot = index.insert(unit(0.0, 0.0, 1.0)).unwrap();
    assert_eq!(slot, 1);
    assert!(index.free_slots().is_empty());

    let fresh = index.insert(unit(1.0, 1.0, 0.0)).unwrap();
    assert_eq!(fresh, 2);
}

#[test]
fn double_delete_pushes_once() {
    let index = AnnIndex::new(3);
    index.insert(unit(1.0, 0.0, 0.0)).unwrap();
    index.delete(0);
    index.delete(0);
    assert_eq!(index.free_slots(), vec![0]);
}

#[test]
fn search_ranks_by_distance() {
    let index = AnnIndex::new(3);
    let exact = index.insert(unit(1.0, 0.0, 0.0)).unwrap();
    let close = index.insert(unit(1.0, 0.2, 0.0)).unwrap();
    let far = index.insert(unit(0.0, 1.0, 0.0)).unwrap();

    let hits = index.search(&unit(1.0, 0.0, 0.0), 3, None);
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].slot, exact);
    assert_eq!(hits[1].slot, close);
    assert_eq!(hits[2].slot, far);
    assert!(hits[0].score > hits[1].score);
    assert!(hits[1].score > hits[2].score);
}

#[test]
fn search_skips_tombstones() {
    let index = AnnIndex::new(3);
    let best = index.insert(unit(1.0, 0.0, 0.0)).unwrap();
    index.insert(unit(0.9, 0.1, 0.0)).unwrap();
    index.delete(best);

    let hits = index.search(&unit(1.0, 0.0, 0.0), 5, None);
    assert_eq!(hits.len(), 1);
    assert_ne!(hits[0].slot, best);
}

#[test]
fn search_empty_index_returns_nothing() {
    let index = AnnIndex::new(3);
    assert!(index.search(&unit(1.0, 0.0, 0.0), 10, None).is_empty());
}

#[test]
fn filtered_search_restricts_candidates() {
    let index = AnnIndex::new(3);
    let a = index.insert(unit(1.0, 0.0, 0.0)).unwrap();
    let b = index.insert(unit(0.95, 0.05, 0.0)).unwrap();

    let only_b: HashSet<i64> = HashSet::from([b]);
    let hits = index.search(&unit(1.0, 0.0, 0.0), 5, Some(&only_b));
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].slot, b);
    assert_ne!(hits[0].slot, a);
}

#[test]
fn graph_fallback_matches_brute_force() {
    let index = AnnIndex::new(3);
    for i in 0..20 {
        let angle = i as f32 * 0.1;
        index.insert(unit(angle.cos(), angle.sin(), 0.1)).unwrap();
    }

    let query = unit(1.0, 0.05, 0.1);
    let with_graph = index.search(&query, 5, None);
    index.drop_graph();
    let brute = index.search(&query, 5, None);

    let graph_slots: Vec<i64> = with_graph.iter().map(|h| h.slot).collect();
    let brute_slots: Vec<i64> = brute.iter().map(|h| h.slot).collect();
    assert_eq!(graph_slots, brute_slots);
}

#[test]
fn save_load_round_trip_preserves_results() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vectors.bin");

    let index = AnnIndex::new(3);
    for i in 0..10 {
        let angle = i as f32 * 0.3;
        index.insert(unit(angle.cos(), angle.sin(), 0.2)).unwrap();
    }
    index.delete(4);

    let query = unit(1.0, 0.1, 0.2);
    let before = index.search(&query, 4, None);
    index.save(&path).unwrap();

    let reloaded = AnnIndex::load(&path, 3).unwrap();
    assert_eq!(reloaded.len(), 9);
    assert_eq!(reloaded.free_slots(), vec![4]);

    let after = reloaded.search(&query, 4, None);
    assert_eq!(
        before.iter().map(|h| h.slot).collect::<Vec<_>>(),
        after.iter().map(|h| h.slot).collect::<Vec<_>>()
    );
    for (b, a) in before.iter().zip(after.iter()) {
        assert!((b.score - a.score).abs() < 1e-6);
    }

    // Freed slot still reused after reload.
    let slot = reloaded.insert(unit(0.0, 0.0, 1.0)).unwrap();
    assert_eq!(slot, 4);
}

#[test]
fn load_rejects_dimension_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vectors.bin");

    let index = AnnIndex::new(3);
    index.insert(unit(1.0, 0.0, 0.0)).unwrap();
    index.save(&path).unwrap();

    let err = AnnIndex::load(&path, 768).unwrap_err();
    assert!(matches!(err, RetrievalErr::DimensionMismatch { stored: 3, actual: 768 }));
}

#[test]
fn load_without_neighbor_block_brute_forces() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vectors.bin");

    let index = AnnIndex::new(3);
    let slots: Vec<i64> = (0..5)
        .map(|i| {
            let angle = i as f32 * 0.5;
            index.insert(unit(angle.cos(), angle.sin(), 0.3)).unwrap()
        })
        .collect();
    index.save(&path).unwrap();

    // Rewrite the file without the adjacency block: header + free list,
    // then the vector section verbatim.
    let inner = index.read();
    let mut buf: Vec<u8> = Vec::new();
    for value in [3u32, inner.next_slot as u32, 0, inner.vectors.len() as u32, 16, 200] {
        buf.extend_from_slice(&value.to_le_bytes());
    }
    for (slot, vector) in &inner.vectors {
        buf.extend_from_slice(&(*slot as i32).to_le_bytes());
        buf.push(0);
        buf.extend_from_slice(vector.as_bytes());
    }
    drop(inner);
    std::fs::write(&path, &buf).unwrap();

    let reloaded = AnnIndex::load(&path, 3).unwrap();
    assert_eq!(reloaded.len(), slots.len());
    let hits = reloaded.search(&unit(1.0, 0.0, 0.3), 3, None);
    assert_eq!(hits.len(), 3);
}

#[test]
fn release_memory_keeps_index_state() {
    let index = AnnIndex::new(3);
    for i in 0..30 {
        let angle = i as f32 * 0.2;
        index.insert(unit(angle.cos(), angle.sin(), 0.1)).unwrap();
    }
    // Churn to build up excess capacity, then release it.
    for slot in 0..15 {
        index.delete(slot);
    }
    let free_before = index.free_slots();
    let query = unit(1.0, 0.1, 0.1);
    let hits_before = index.search(&query, 5, None);

    index.release_memory();

    assert_eq!(index.free_slots(), free_before);
    assert_eq!(index.len(), 15);
    let hits_after = index.search(&query, 5, None);
    assert_eq!(
        hits_before.iter().map(|h| h.slot).collect::<Vec<_>>(),
        hits_after.iter().map(|h| h.slot).collect::<Vec<_>>()
    );
}

#[test]
fn disk_mode_spills_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let temp = dir.path().join("vectors_temp.bin");

    let index = AnnIndex::new(3);
    index.enable_disk_mode(&temp).unwrap();
    assert!(index.is_disk_mode());

    let a = index.insert(unit(1.0, 0.0, 0.0)).unwrap();
    let b = index.insert(unit(0.0, 1.0, 0.0)).unwrap();
    assert_eq!(index.len(), 2);
    assert!(temp.exists());

    // First search lazy-loads the spilled vectors.
    let hits = index.search(&unit(1.0, 0.0, 0.0), 2, None);
    assert_eq!(hits[0].slot, a);
    assert_eq!(hits[1].slot, b);

    index.disable_disk_mode().unwrap();
    assert!(!index.is_disk_mode());
    assert!(!temp.exists());

    // Vectors survive mode exit.
    let hits = index.search(&unit(0.0, 1.0, 0.0), 1, None);
    assert_eq!(hits[0].slot, b);
}

#[test]
fn disk_mode_save_includes_spilled_vectors() {
    let dir = tempfile::tempdir().unwrap();
    let temp = dir.path().join("vectors_temp.bin");
    let path = dir.path().join("vectors.bin");

    let index = AnnIndex::new(3);
    index.enable_disk_mode(&temp).unwrap();
    index.insert(unit(1.0, 0.0, 0.0)).unwrap();
    index.insert(unit(0.0, 1.0, 0.0)).unwrap();

    index.save(&path).unwrap();

    let reloaded = AnnIndex::load(&path, 3).unwrap();
    assert_eq!(reloaded.len(), 2);
}
