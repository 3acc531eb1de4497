// tests/tracker_capacity.rs
use std::collections::VecDeque;
use std::sync::Arc;

use rand::{rngs::StdRng, Rng, SeedableRng};
use story_tracker::{BoundedTracker, Item};

fn item(id: u64, url: &str) -> Arc<Item> {
    Arc::new(Item::new(id, url))
}

#[test]
fn fifo_eviction_with_capacity_two() {
    let mut t = BoundedTracker::with_capacity(2);
    assert!(t.add(item(1, "")).is_none());
    assert!(t.add(item(2, "")).is_none());
    let evicted = t.add(item(3, "")).expect("eviction");
    assert_eq!(evicted.id, 1);

    let mut ids = t.ids();
    ids.sort();
    assert_eq!(ids, vec![2, 3]);
}

#[test]
fn update_keeps_order_and_evicts_nothing() {
    let mut t = BoundedTracker::with_capacity(2);
    t.add(item(1, "https://a.example/1"));
    t.add(item(2, "https://a.example/2"));

    assert!(t.add(item(1, "https://b.example/1")).is_none());
    assert_eq!(t.ids(), vec![1, 2]);
    assert_eq!(t.get(1).unwrap().url, "https://b.example/1");
}

#[test]
fn random_sequences_respect_capacity_and_fifo() {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for cap in [1usize, 2, 5, 30] {
        let mut t = BoundedTracker::with_capacity(cap);
        let mut model: VecDeque<u64> = VecDeque::new();

        for _ in 0..2_000 {
            let id = rng.random_range(0..(cap as u64 * 3));
            let evicted = t.add(item(id, ""));

            let expected_evicted = if model.contains(&id) {
                None
            } else {
                model.push_back(id);
                if model.len() > cap {
                    model.pop_front()
                } else {
                    None
                }
            };

            assert_eq!(evicted.map(|it| it.id), expected_evicted);
            assert!(t.len() <= cap);
            assert_eq!(t.ids(), model.iter().copied().collect::<Vec<_>>());

            if rng.random_bool(0.1) {
                let victim = rng.random_range(0..(cap as u64 * 3));
                t.remove(victim);
                model.retain(|k| *k != victim);
                assert_eq!(t.len(), model.len());
            }
        }
    }
}
