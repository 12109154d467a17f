// Property tests for ChainedHashMap kept inside the crate so they can call
// the structural invariant checker after every step.

use crate::{ChainedHashMap, KeyNotFound};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations so shrinking converges on earlier keys.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    IndexAdd(usize, i32),
    Remove(usize),
    Find(usize),
    At(String),
    Mutate(usize, i32),
    Iterate,
    Rehash,
    Clear,
    CloneFrom,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=12).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let at_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            6 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| Op::IndexAdd(i, d)),
            3 => idx.clone().prop_map(Op::Remove),
            2 => idx.clone().prop_map(Op::Find),
            2 => prop_oneof![at_pool.prop_map(|s: String| s), "[a-z]{0,5}".prop_map(|s| s)]
                .prop_map(Op::At),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| Op::Mutate(i, d)),
            1 => Just(Op::Iterate),
            1 => Just(Op::Rehash),
            1 => Just(Op::Clear),
            1 => Just(Op::CloneFrom),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Drives one scenario against `sut`, using std's HashMap as the model.
// After every op:
// - structural invariants hold (markers, buckets, load factor),
// - `len`/`is_empty` match the model,
// - iteration yields exactly the model's pairs.
fn run_scenario<S>(
    mut sut: ChainedHashMap<Key, i32, S>,
    pool: &[String],
    ops: Vec<Op>,
) -> Result<(), TestCaseError>
where
    S: BuildHasher + Clone,
{
    let mut model: HashMap<Key, i32> = HashMap::new();

    for op in ops {
        match op {
            Op::Insert(i, v) => {
                let k = key_from(pool, i);
                let fresh = !model.contains_key(&k);
                prop_assert_eq!(sut.insert(k.clone(), v), fresh);
                // First writer wins.
                model.entry(k).or_insert(v);
            }
            Op::IndexAdd(i, d) => {
                let k = key_from(pool, i);
                let slot = sut.get_or_insert_default(k.clone());
                *slot = slot.wrapping_add(d);
                let m = model.entry(k).or_default();
                *m = m.wrapping_add(d);
            }
            Op::Remove(i) => {
                let k = key_from(pool, i);
                let before = sut.len();
                let got = sut.remove_entry(&k);
                match model.remove(&k) {
                    Some(mv) => {
                        prop_assert_eq!(got, Some((k.clone(), mv)));
                        prop_assert_eq!(sut.len(), before - 1);
                    }
                    None => {
                        prop_assert!(got.is_none());
                        prop_assert_eq!(sut.len(), before);
                    }
                }
                prop_assert!(sut.find(&k).is_none());
            }
            Op::Find(i) => {
                let k = key_from(pool, i);
                prop_assert_eq!(sut.find(&k), model.get_key_value(&k));
                prop_assert_eq!(sut.contains_key(&k), model.contains_key(&k));
            }
            Op::At(s) => {
                let len = sut.len();
                let expected = model
                    .iter()
                    .find(|(k, _)| k.0 == s)
                    .map(|(_, v)| v)
                    .ok_or(KeyNotFound);
                prop_assert_eq!(sut.at(s.as_str()), expected);
                prop_assert_eq!(sut.len(), len, "at never inserts");
            }
            Op::Mutate(i, d) => {
                let k = key_from(pool, i);
                match (sut.get_mut(&k), model.get_mut(&k)) {
                    (Some(v), Some(m)) => {
                        *v = v.saturating_add(d);
                        *m = m.saturating_add(d);
                    }
                    (None, None) => {}
                    (s, m) => prop_assert!(false, "presence mismatch: {:?} vs {:?}", s, m),
                }
            }
            Op::Iterate => {
                let keys: Vec<_> = sut.keys().cloned().collect();
                let unique: BTreeSet<_> = keys.iter().cloned().collect();
                prop_assert_eq!(keys.len(), unique.len(), "iteration repeats a key");
            }
            Op::Rehash => {
                let before: Vec<_> = sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                let buckets = sut.bucket_count();
                sut.rehash();
                prop_assert_eq!(sut.bucket_count(), buckets * 2);
                let after: Vec<_> = sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                prop_assert_eq!(before, after, "rehash must not move entries");
            }
            Op::Clear => {
                let buckets = sut.bucket_count();
                sut.clear();
                model.clear();
                prop_assert_eq!(sut.bucket_count(), buckets);
            }
            Op::CloneFrom => {
                let mut copy = ChainedHashMap::with_hasher(sut.hasher().clone());
                copy.clone_from(&sut);
                copy.check_invariants();
                prop_assert!(copy == sut);
                // Mutating the copy leaves the original alone.
                copy.clear();
                prop_assert_eq!(sut.len(), model.len());
            }
        }

        sut.check_invariants();
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        let s_pairs: BTreeSet<_> = sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
        let m_pairs: BTreeSet<_> = model.iter().map(|(k, v)| (k.clone(), *v)).collect();
        prop_assert_eq!(s_pairs, m_pairs);
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap
// with a randomly seeded hasher.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_scenario(ChainedHashMap::new(), &pool, ops)?;
    }
}

// Every key hashes to 0, so all markers share one bucket.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Property: same state machine under worst-case collisions. Every insert
// and removal rewrites a marker that shares a bucket with its neighbour.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_scenario(ChainedHashMap::with_hasher(ConstBuildHasher), &pool, ops)?;
    }
}

// Property: any insert order of distinct keys leaves `len <= bucket_count`
// and a power-of-two table just large enough to hold them.
proptest! {
    #[test]
    fn prop_load_factor_bound(keys in proptest::collection::btree_set(any::<u32>(), 0..300)) {
        let mut sut: ChainedHashMap<u32, u32> = ChainedHashMap::new();
        for &k in &keys {
            prop_assert!(sut.insert(k, k));
            prop_assert!(sut.len() <= sut.bucket_count());
        }
        prop_assert_eq!(sut.bucket_count(), keys.len().max(1).next_power_of_two());
        sut.check_invariants();
    }
}
