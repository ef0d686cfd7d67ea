//! Match rule table
//!
//! Ordered value/mask rules steering packets between classes.
//!
//! # Design
//! - Copy-on-write: readers get an immutable `ArcSwap` snapshot, writers
//!   rebuild the list and swap it in
//! - First match wins, in insertion order; the table never reorders,
//!   deduplicates, or picks a "best" match
//! - Rules are scoped to a source class: evaluation only consults rules
//!   whose `src_class` matches

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use steer_common::{ClassId, MatchField, PacketHeaders, RuleId, SteerError, SteerResult};

/// A single match rule
///
/// Packets being evaluated in `src_class` whose `field` matches `value`
/// under `mask` are steered to `dst_class`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRule {
    /// Rule identifier, monotonic and never reused
    pub id: RuleId,
    /// Field the rule selects on
    pub field: MatchField,
    /// Match value
    pub value: u64,
    /// Match mask; only masked bits participate in the comparison
    pub mask: u64,
    /// Class whose packets this rule filters
    pub src_class: ClassId,
    /// Destination class on match
    pub dst_class: ClassId,
}

impl MatchRule {
    /// `(field & mask) == (value & mask)`, non-match when the packet
    /// does not carry the field
    #[inline]
    pub fn matches(&self, headers: &PacketHeaders) -> bool {
        match headers.field(self.field) {
            Some(value) => (value & self.mask) == (self.value & self.mask),
            None => false,
        }
    }
}

/// Ordered rule table with copy-on-write snapshots
///
/// The table validates value/mask widths but not class liveness; the
/// classifier engine checks classes before inserting.
#[derive(Debug)]
pub struct RuleTable {
    rules: ArcSwap<Vec<MatchRule>>,
    /// Serializes read-modify-write updates; readers never take it
    write_lock: Mutex<()>,
    next_id: AtomicU32,
    version: AtomicU64,
}

impl RuleTable {
    /// Empty table
    pub fn new() -> Self {
        Self {
            rules: ArcSwap::from_pointee(Vec::new()),
            write_lock: Mutex::new(()),
            next_id: AtomicU32::new(0),
            version: AtomicU64::new(0),
        }
    }

    /// Append a rule after the existing rules for its source class
    ///
    /// Fails with [`SteerError::InvalidMask`] when `value` or `mask` has
    /// bits outside the field's fixed width.
    pub fn insert(
        &self,
        field: MatchField,
        value: u64,
        mask: u64,
        src_class: ClassId,
        dst_class: ClassId,
    ) -> SteerResult<RuleId> {
        let full = field.full_mask();
        if value & !full != 0 || mask & !full != 0 {
            return Err(SteerError::InvalidMask {
                field,
                bits: field.width_bits(),
            });
        }

        let _write = self.write_lock.lock();
        let id = RuleId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut next = self.rules.load_full().as_ref().clone();
        next.push(MatchRule {
            id,
            field,
            value,
            mask,
            src_class,
            dst_class,
        });
        self.rules.store(Arc::new(next));
        self.version.fetch_add(1, Ordering::Release);
        tracing::debug!("rule {} added: {} -> {} on {}", id, src_class, dst_class, field);
        Ok(id)
    }

    /// Remove a rule, keeping the relative order of the rest
    pub fn remove(&self, id: RuleId) -> SteerResult<MatchRule> {
        let _write = self.write_lock.lock();
        let current = self.rules.load_full();
        let index = current
            .iter()
            .position(|rule| rule.id == id)
            .ok_or_else(|| SteerError::NotFound(format!("rule {id}")))?;

        let mut next = current.as_ref().clone();
        let removed = next.remove(index);
        self.rules.store(Arc::new(next));
        self.version.fetch_add(1, Ordering::Release);
        tracing::debug!("rule {} removed", id);
        Ok(removed)
    }

    /// Destination for a packet evaluated in `src_class`
    ///
    /// Walks the rules scoped to `src_class` in insertion order and
    /// returns the first match's destination, or `src_class` unchanged
    /// when nothing matches.
    #[inline]
    pub fn evaluate(&self, src_class: ClassId, headers: &PacketHeaders) -> ClassId {
        let rules = self.rules.load();
        for rule in rules.iter() {
            if rule.src_class == src_class && rule.matches(headers) {
                return rule.dst_class;
            }
        }
        src_class
    }

    /// Snapshot of the rules scoped to `src_class`, in match order
    ///
    /// The returned list is isolated from later table updates.
    pub fn rules_for(&self, src_class: ClassId) -> Vec<MatchRule> {
        self.rules
            .load()
            .iter()
            .filter(|rule| rule.src_class == src_class)
            .cloned()
            .collect()
    }

    /// Snapshot of the whole table
    pub fn snapshot(&self) -> Arc<Vec<MatchRule>> {
        self.rules.load_full()
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.load().len()
    }

    /// True when the table holds no rules
    pub fn is_empty(&self) -> bool {
        self.rules.load().is_empty()
    }

    /// Update generation, bumped on every insert or remove
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::new()
    }
}
