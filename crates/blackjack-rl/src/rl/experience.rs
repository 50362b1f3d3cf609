//! Experience replay for learning agents.
//!
//! [`ExperienceStore`] is a fixed-capacity ring of transitions. Each slot is
//! tagged once, at insertion, with the count bucket of its decision-time
//! state; the bucket index sets are kept in step with the ring so biased
//! sampling never scans the buffer. [`ExperienceCollector`] writes labelled
//! transitions to JSONL for offline training.

use crate::rl::observation::{TRUE_COUNT_FEATURE, TRUE_COUNT_SCALE};
use blackjack_bot::policy::Transition;
use blackjack_core::model::action::Action;
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error)]
pub enum ExperienceError {
    #[error("requested {requested} transitions but only {available} stored")]
    Underfilled { requested: usize, available: usize },
    #[error("experience file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize experience: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountBucket {
    Low,
    Mid,
    High,
}

impl CountBucket {
    pub const ALL: [CountBucket; 3] = [CountBucket::Low, CountBucket::Mid, CountBucket::High];

    const fn index(self) -> usize {
        match self {
            CountBucket::Low => 0,
            CountBucket::Mid => 1,
            CountBucket::High => 2,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            CountBucket::Low => "low",
            CountBucket::Mid => "mid",
            CountBucket::High => "high",
        }
    }
}

/// Classifies a state by one of its features. The feature is multiplied by
/// `scale` before the thresholds apply, so the default rule reads the
/// normalised true count back in true-count units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketRule {
    pub field: usize,
    pub scale: f64,
    pub high_at: f64,
    pub low_at: f64,
}

impl Default for BucketRule {
    fn default() -> Self {
        Self {
            field: TRUE_COUNT_FEATURE,
            scale: TRUE_COUNT_SCALE,
            high_at: 3.0,
            low_at: -2.0,
        }
    }
}

impl BucketRule {
    /// States too short to carry the field land in `Mid`.
    pub fn classify(&self, state: &[f32]) -> CountBucket {
        let Some(&raw) = state.get(self.field) else {
            return CountBucket::Mid;
        };
        let value = f64::from(raw) * self.scale;
        if value >= self.high_at {
            CountBucket::High
        } else if value <= self.low_at {
            CountBucket::Low
        } else {
            CountBucket::Mid
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSizes {
    pub low: usize,
    pub mid: usize,
    pub high: usize,
}

/// Insert counts per action (in [`Action::ALL`] order) and current bucket sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Composition {
    pub hit: u64,
    pub stand: u64,
    pub double: u64,
    pub split: u64,
    pub buckets: BucketSizes,
}

#[derive(Debug, Clone)]
struct Slot {
    transition: Transition,
    bucket: CountBucket,
    /// Position of this slot inside its bucket's member list.
    position: usize,
}

#[derive(Debug, Clone)]
pub struct ExperienceStore {
    slots: Vec<Option<Slot>>,
    buckets: [Vec<usize>; 3],
    cursor: usize,
    len: usize,
    rule: BucketRule,
    action_counts: [u64; 4],
}

impl ExperienceStore {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self::with_rule(capacity, BucketRule::default())
    }

    pub fn with_rule(capacity: usize, rule: BucketRule) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec![None; capacity],
            buckets: [Vec::new(), Vec::new(), Vec::new()],
            cursor: 0,
            len: 0,
            rule,
            action_counts: [0; 4],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn rule(&self) -> BucketRule {
        self.rule
    }

    /// Store `transition`, evicting the oldest one when full. Returns the
    /// bucket it was filed under.
    pub fn add(&mut self, transition: Transition) -> CountBucket {
        let slot = self.cursor;
        if self.slots[slot].is_some() {
            self.detach(slot);
            trace!(target: "blackjack_rl::experience", slot, "evicted oldest transition");
        }

        let bucket = self.rule.classify(&transition.state);
        self.action_counts[usize::from(transition.action.code())] += 1;
        let members = &mut self.buckets[bucket.index()];
        members.push(slot);
        self.slots[slot] = Some(Slot {
            transition,
            bucket,
            position: members.len() - 1,
        });

        self.cursor = (slot + 1) % self.capacity();
        self.len = (self.len + 1).min(self.capacity());
        bucket
    }

    pub fn get(&self, slot: usize) -> Option<&Transition> {
        self.slots.get(slot)?.as_ref().map(|entry| &entry.transition)
    }

    pub fn bucket_of(&self, slot: usize) -> Option<CountBucket> {
        self.slots.get(slot)?.as_ref().map(|entry| entry.bucket)
    }

    /// Slot indices currently filed under `bucket`, in no particular order.
    pub fn bucket_slots(&self, bucket: CountBucket) -> &[usize] {
        &self.buckets[bucket.index()]
    }

    pub fn bucket_sizes(&self) -> BucketSizes {
        BucketSizes {
            low: self.buckets[CountBucket::Low.index()].len(),
            mid: self.buckets[CountBucket::Mid.index()].len(),
            high: self.buckets[CountBucket::High.index()].len(),
        }
    }

    pub fn composition(&self) -> Composition {
        Composition {
            hit: self.action_counts[usize::from(Action::Hit.code())],
            stand: self.action_counts[usize::from(Action::Stand.code())],
            double: self.action_counts[usize::from(Action::Double.code())],
            split: self.action_counts[usize::from(Action::Split.code())],
            buckets: self.bucket_sizes(),
        }
    }

    /// Stored transitions from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = (&Transition, CountBucket)> {
        let start = if self.len == self.capacity() { self.cursor } else { 0 };
        (0..self.len).filter_map(move |offset| {
            let slot = (start + offset) % self.capacity();
            self.slots[slot]
                .as_ref()
                .map(|entry| (&entry.transition, entry.bucket))
        })
    }

    /// `k` draws with replacement, uniform over occupied slots.
    pub fn sample_uniform<R: Rng + ?Sized>(
        &self,
        k: usize,
        rng: &mut R,
    ) -> Result<Vec<Transition>, ExperienceError> {
        self.ensure_filled(k)?;
        Ok((0..k).map(|_| self.uniform_pick(rng)).collect())
    }

    /// About `k * high_fraction` draws from the high bucket (fewer when the
    /// bucket is smaller, none when empty), the rest uniform over all
    /// occupied slots. Cost is O(k).
    pub fn sample_biased<R: Rng + ?Sized>(
        &self,
        k: usize,
        high_fraction: f64,
        rng: &mut R,
    ) -> Result<Vec<Transition>, ExperienceError> {
        self.ensure_filled(k)?;
        let wanted = (k as f64 * high_fraction.clamp(0.0, 1.0)).round() as usize;
        let high = &self.buckets[CountBucket::High.index()];
        let from_high = if high.is_empty() {
            0
        } else {
            wanted.min(high.len()).min(k)
        };

        let mut batch = Vec::with_capacity(k);
        for _ in 0..from_high {
            let slot = high[rng.gen_range(0..high.len())];
            batch.push(self.transition_at(slot));
        }
        while batch.len() < k {
            batch.push(self.uniform_pick(rng));
        }
        Ok(batch)
    }

    fn ensure_filled(&self, k: usize) -> Result<(), ExperienceError> {
        if self.len < k {
            return Err(ExperienceError::Underfilled {
                requested: k,
                available: self.len,
            });
        }
        Ok(())
    }

    fn uniform_pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Transition {
        // Slots fill from zero, so the occupied ones are exactly 0..len.
        self.transition_at(rng.gen_range(0..self.len))
    }

    fn transition_at(&self, slot: usize) -> Transition {
        match &self.slots[slot] {
            Some(entry) => entry.transition.clone(),
            None => unreachable!("bucket member {slot} points at an empty slot"),
        }
    }

    fn detach(&mut self, slot: usize) {
        let Some(entry) = self.slots[slot].take() else {
            return;
        };
        let members = &mut self.buckets[entry.bucket.index()];
        members.swap_remove(entry.position);
        if let Some(&moved) = members.get(entry.position) {
            if let Some(moved_entry) = self.slots[moved].as_mut() {
                moved_entry.position = entry.position;
            }
        }
    }
}

/// Cloneable handle for rollout workers that feed one store.
#[derive(Debug, Clone)]
pub struct SharedExperienceStore {
    inner: Arc<Mutex<ExperienceStore>>,
}

impl SharedExperienceStore {
    pub fn new(store: ExperienceStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub fn add(&self, transition: Transition) -> CountBucket {
        self.inner.lock().add(transition)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn composition(&self) -> Composition {
        self.inner.lock().composition()
    }

    pub fn sample_uniform<R: Rng + ?Sized>(
        &self,
        k: usize,
        rng: &mut R,
    ) -> Result<Vec<Transition>, ExperienceError> {
        self.inner.lock().sample_uniform(k, rng)
    }

    pub fn sample_biased<R: Rng + ?Sized>(
        &self,
        k: usize,
        high_fraction: f64,
        rng: &mut R,
    ) -> Result<Vec<Transition>, ExperienceError> {
        self.inner.lock().sample_biased(k, high_fraction, rng)
    }

    /// Run `f` with the store locked.
    pub fn with<T>(&self, f: impl FnOnce(&mut ExperienceStore) -> T) -> T {
        f(&mut self.inner.lock())
    }
}

/// One JSONL row: a transition with its bucket label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceRecord {
    pub round_id: u64,
    pub step_id: u32,
    pub bucket: CountBucket,
    #[serde(flatten)]
    pub transition: Transition,
}

/// Collector for writing experiences to JSONL format
pub struct ExperienceCollector {
    writer: BufWriter<File>,
    count: usize,
}

impl ExperienceCollector {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ExperienceError> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            count: 0,
        })
    }

    pub fn append<P: AsRef<Path>>(path: P) -> Result<Self, ExperienceError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            count: 0,
        })
    }

    pub fn record(&mut self, record: &ExperienceRecord) -> Result<(), ExperienceError> {
        let json = serde_json::to_string(record)?;
        writeln!(self.writer, "{}", json)?;
        self.count += 1;
        Ok(())
    }

    /// Write every stored transition, oldest first, under one `round_id`.
    pub fn record_store(
        &mut self,
        round_id: u64,
        store: &ExperienceStore,
    ) -> Result<(), ExperienceError> {
        for (step_id, (transition, bucket)) in store.iter().enumerate() {
            self.record(&ExperienceRecord {
                round_id,
                step_id: step_id as u32,
                bucket,
                transition: transition.clone(),
            })?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), ExperienceError> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

impl Drop for ExperienceCollector {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
