//! Keyed data-join: classify each key as entering, updating or exiting and
//! produce the next tracked set.
//!
//! `diff` is pure. It never touches interpolated state (owned by each record's
//! lifecycle) and never drops a record; only an explicit hard removal does.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::error::JoinError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    Enter,
    Update,
    Exit,
}

/// Placement of newly entering records relative to tracked ones.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnterPlacement {
    /// After every tracked record, in source order.
    #[default]
    Append,
    /// Directly after the nearest preceding source item that was already
    /// tracked; before everything if there is none.
    Interleave,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DiffOptions {
    pub placement: EnterPlacement,
    /// Stamped on every record whose item is replaced by this diff.
    pub revision: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackedRecord<I> {
    pub key: String,
    pub record_type: RecordType,
    pub item: I,
    /// Presentation index; dense and stable across diffs.
    pub order: usize,
    /// Revision of the diff that last delivered `item`.
    pub revision: u64,
}

/// Ordered records plus the keys hidden by lazy removal.
#[derive(Clone, Debug)]
pub struct TrackedSet<I> {
    records: Vec<TrackedRecord<I>>,
    /// key -> index into `records`; rebuilt whenever orders change.
    index: HashMap<String, usize>,
    removed: HashSet<String>,
}

impl<I> Default for TrackedSet<I> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            index: HashMap::new(),
            removed: HashSet::new(),
        }
    }
}

impl<I> TrackedSet<I> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn records(&self) -> &[TrackedRecord<I>] {
        &self.records
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.key.as_str())
    }

    #[inline]
    pub fn position(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&TrackedRecord<I>> {
        self.position(key).map(|idx| &self.records[idx])
    }

    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    #[inline]
    pub fn is_removed(&self, key: &str) -> bool {
        self.removed.contains(key)
    }

    pub fn removed(&self) -> impl Iterator<Item = &str> {
        self.removed.iter().map(String::as_str)
    }

    /// Records that take part in presentation, in order.
    pub fn visible(&self) -> impl Iterator<Item = &TrackedRecord<I>> {
        self.records
            .iter()
            .filter(move |r| !self.removed.contains(r.key.as_str()))
    }

    /// Hide a tracked record from presentation. Returns false if `key` is not tracked.
    pub fn mark_removed(&mut self, key: &str) -> bool {
        if !self.contains(key) {
            return false;
        }
        self.removed.insert(key.to_string());
        true
    }

    /// Structurally delete a record and its bookkeeping; later records shift up.
    pub fn hard_remove(&mut self, key: &str) -> Option<TrackedRecord<I>> {
        let idx = self.position(key)?;
        let record = self.records.remove(idx);
        self.removed.remove(key);
        self.renumber();
        Some(record)
    }

    fn renumber(&mut self) {
        self.index.clear();
        self.index.reserve(self.records.len());
        for (i, r) in self.records.iter_mut().enumerate() {
            r.order = i;
            self.index.insert(r.key.clone(), i);
        }
    }
}

/// Join `new_items` against `previous` by key.
///
/// - present and tracked: `Update`, item replaced, order kept
/// - absent and not yet exiting: `Exit`, last item kept
/// - absent and already exiting: kept as-is
/// - present and untracked: `Enter`, placed per `opts.placement`
///
/// Fails with [`JoinError::KeyCollision`] if two items share a key; `previous`
/// is never modified.
pub fn diff<I, K>(
    new_items: Vec<I>,
    previous: &TrackedSet<I>,
    key_fn: K,
    opts: DiffOptions,
) -> Result<TrackedSet<I>, JoinError>
where
    I: Clone,
    K: Fn(&I) -> String,
{
    // Key the incoming sequence, rejecting duplicates before touching anything.
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(new_items.len());
    let mut keys: Vec<String> = Vec::with_capacity(new_items.len());
    for (idx, item) in new_items.iter().enumerate() {
        let key = key_fn(item);
        if let Some(&first) = positions.get(&key) {
            log::warn!("key collision on '{key}' at positions {first} and {idx}");
            return Err(JoinError::KeyCollision {
                key,
                first,
                second: idx,
            });
        }
        positions.insert(key.clone(), idx);
        keys.push(key);
    }
    let mut slots: Vec<Option<I>> = new_items.into_iter().map(Some).collect();

    let mut continuing: Vec<TrackedRecord<I>> = Vec::with_capacity(previous.len());
    let mut counts = (0usize, 0usize, 0usize);
    for prev in previous.records() {
        let next = match positions.get(&prev.key) {
            Some(&idx) => {
                counts.1 += 1;
                TrackedRecord {
                    key: prev.key.clone(),
                    record_type: RecordType::Update,
                    item: slots[idx].take().unwrap_or_else(|| prev.item.clone()),
                    order: prev.order,
                    revision: opts.revision,
                }
            }
            None => {
                if prev.record_type != RecordType::Exit {
                    counts.2 += 1;
                }
                TrackedRecord {
                    record_type: RecordType::Exit,
                    ..prev.clone()
                }
            }
        };
        continuing.push(next);
    }

    let entering = keys
        .into_iter()
        .zip(slots)
        .enumerate()
        .filter_map(|(idx, (key, slot))| slot.map(|item| (idx, key, item)))
        .filter(|(_, key, _)| !previous.contains(key));

    let mut records: Vec<TrackedRecord<I>> = Vec::with_capacity(continuing.len() + positions.len());
    let mk_enter = |key: String, item: I| TrackedRecord {
        key,
        record_type: RecordType::Enter,
        item,
        order: 0,
        revision: opts.revision,
    };

    match opts.placement {
        EnterPlacement::Append => {
            records.extend(continuing);
            for (_, key, item) in entering {
                counts.0 += 1;
                records.push(mk_enter(key, item));
            }
        }
        EnterPlacement::Interleave => {
            // Anchor each entering record on the last tracked key seen before it
            // in the new sequence.
            let mut anchors: Vec<Option<String>> = vec![None; positions.len()];
            let mut last_tracked: Option<String> = None;
            let mut by_position: Vec<(usize, &String)> =
                positions.iter().map(|(k, &i)| (i, k)).collect();
            by_position.sort_unstable_by_key(|(i, _)| *i);
            for (idx, key) in by_position {
                if previous.contains(key) {
                    last_tracked = Some(key.clone());
                } else {
                    anchors[idx] = last_tracked.clone();
                }
            }

            let mut leading: Vec<TrackedRecord<I>> = Vec::new();
            let mut after: HashMap<String, Vec<TrackedRecord<I>>> = HashMap::new();
            for (idx, key, item) in entering {
                counts.0 += 1;
                match anchors[idx].take() {
                    Some(anchor) => after.entry(anchor).or_default().push(mk_enter(key, item)),
                    None => leading.push(mk_enter(key, item)),
                }
            }

            records.extend(leading);
            for record in continuing {
                let followers = after.remove(&record.key);
                records.push(record);
                if let Some(followers) = followers {
                    records.extend(followers);
                }
            }
        }
    }

    let mut next = TrackedSet {
        records,
        index: HashMap::new(),
        removed: previous.removed.clone(),
    };
    next.renumber();

    log::debug!(
        "diff rev {}: {} enter, {} update, {} exit, {} tracked",
        opts.revision,
        counts.0,
        counts.1,
        counts.2,
        next.len()
    );
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(v: &u32) -> String {
        format!("k{v}")
    }

    fn opts(revision: u64) -> DiffOptions {
        DiffOptions {
            placement: EnterPlacement::Append,
            revision,
        }
    }

    fn summary(set: &TrackedSet<u32>) -> Vec<(String, RecordType)> {
        set.records()
            .iter()
            .map(|r| (r.key.clone(), r.record_type))
            .collect()
    }

    #[test]
    fn first_diff_enters_everything_in_source_order() {
        let set = diff(vec![3, 1, 2], &TrackedSet::new(), key, opts(1)).unwrap();
        assert_eq!(
            summary(&set),
            vec![
                ("k3".into(), RecordType::Enter),
                ("k1".into(), RecordType::Enter),
                ("k2".into(), RecordType::Enter),
            ]
        );
        let orders: Vec<usize> = set.records().iter().map(|r| r.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn exit_records_keep_item_and_revision() {
        let first = diff(vec![1, 2], &TrackedSet::new(), key, opts(1)).unwrap();
        let second = diff(vec![2], &first, key, opts(2)).unwrap();
        let gone = second.get("k1").unwrap();
        assert_eq!(gone.record_type, RecordType::Exit);
        assert_eq!(gone.item, 1);
        assert_eq!(gone.revision, 1);
        assert_eq!(second.get("k2").unwrap().revision, 2);

        let third = diff(vec![2], &second, key, opts(3)).unwrap();
        let still_gone = third.get("k1").unwrap();
        assert_eq!(still_gone.record_type, RecordType::Exit);
        assert_eq!(still_gone.revision, 1);
    }

    #[test]
    fn collision_leaves_previous_untouched() {
        let first = diff(vec![1, 2], &TrackedSet::new(), key, opts(1)).unwrap();
        let err = diff(vec![5, 6, 5], &first, key, opts(2)).unwrap_err();
        assert_eq!(
            err,
            JoinError::KeyCollision {
                key: "k5".into(),
                first: 0,
                second: 2,
            }
        );
        assert_eq!(first.len(), 2);
        assert!(first
            .records()
            .iter()
            .all(|r| r.record_type == RecordType::Enter));
    }

    #[test]
    fn exiting_key_that_returns_is_updated_in_place() {
        let first = diff(vec![1, 2, 3], &TrackedSet::new(), key, opts(1)).unwrap();
        let second = diff(vec![1, 3], &first, key, opts(2)).unwrap();
        let third = diff(vec![1, 2, 3], &second, key, opts(3)).unwrap();
        assert_eq!(third.get("k2").unwrap().record_type, RecordType::Update);
        assert_eq!(third.position("k2"), Some(1));
    }

    #[test]
    fn removed_flags_survive_diffs() {
        let first = diff(vec![1, 2], &TrackedSet::new(), key, opts(1)).unwrap();
        let mut second = diff(vec![2], &first, key, opts(2)).unwrap();
        assert!(second.mark_removed("k1"));
        assert!(!second.mark_removed("nope"));
        let third = diff(vec![2, 4], &second, key, opts(3)).unwrap();
        assert!(third.is_removed("k1"));
        let visible: Vec<&str> = third.visible().map(|r| r.key.as_str()).collect();
        assert_eq!(visible, vec!["k2", "k4"]);
    }

    #[test]
    fn hard_remove_renumbers() {
        let mut set = diff(vec![1, 2, 3], &TrackedSet::new(), key, opts(1)).unwrap();
        set.mark_removed("k2");
        let gone = set.hard_remove("k2").unwrap();
        assert_eq!(gone.item, 2);
        assert!(!set.is_removed("k2"));
        let orders: Vec<(String, usize)> = set
            .records()
            .iter()
            .map(|r| (r.key.clone(), r.order))
            .collect();
        assert_eq!(orders, vec![("k1".into(), 0), ("k3".into(), 1)]);
        assert!(set.hard_remove("k2").is_none());
    }

    #[test]
    fn interleave_places_entering_after_their_predecessor() {
        let first = diff(vec![1, 3], &TrackedSet::new(), key, opts(1)).unwrap();
        let second = diff(
            vec![0, 1, 2, 3, 4],
            &first,
            key,
            DiffOptions {
                placement: EnterPlacement::Interleave,
                revision: 2,
            },
        )
        .unwrap();
        let keys: Vec<&str> = second.keys().collect();
        assert_eq!(keys, vec!["k0", "k1", "k2", "k3", "k4"]);
    }

    #[test]
    fn interleave_keeps_exiting_records_in_place() {
        let first = diff(vec![1, 2, 3], &TrackedSet::new(), key, opts(1)).unwrap();
        let second = diff(
            vec![1, 5, 3],
            &first,
            key,
            DiffOptions {
                placement: EnterPlacement::Interleave,
                revision: 2,
            },
        )
        .unwrap();
        let keys: Vec<&str> = second.keys().collect();
        assert_eq!(keys, vec!["k1", "k5", "k2", "k3"]);
        assert_eq!(second.get("k2").unwrap().record_type, RecordType::Exit);
    }

    #[test]
    fn lookups_follow_hard_removal() {
        let mut set = diff(vec![1, 2, 3, 4], &TrackedSet::new(), key, opts(1)).unwrap();
        set.hard_remove("k2");
        assert_eq!(set.position("k1"), Some(0));
        assert_eq!(set.position("k3"), Some(1));
        assert_eq!(set.get("k4").map(|r| r.item), Some(4));
        assert!(!set.contains("k2"));
        assert!(set.get("k2").is_none());
    }

    #[test]
    fn large_half_overlapping_join() {
        let n = 50_000u32;
        let first = diff((0..n).collect(), &TrackedSet::new(), key, opts(1)).unwrap();
        for placement in [EnterPlacement::Append, EnterPlacement::Interleave] {
            let second = diff(
                (n / 2..n + n / 2).collect(),
                &first,
                key,
                DiffOptions {
                    placement,
                    revision: 2,
                },
            )
            .unwrap();
            assert_eq!(second.len(), (n + n / 2) as usize);
            let count = |t: RecordType| {
                second
                    .records()
                    .iter()
                    .filter(|r| r.record_type == t)
                    .count()
            };
            assert_eq!(count(RecordType::Enter), (n / 2) as usize);
            assert_eq!(count(RecordType::Update), (n / 2) as usize);
            assert_eq!(count(RecordType::Exit), (n / 2) as usize);
            let last = key(&(n - 1));
            assert_eq!(second.position(&last), Some(second.get(&last).unwrap().order));
        }
    }
}
