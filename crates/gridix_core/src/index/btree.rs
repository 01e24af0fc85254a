//! Ordered field index.

use crate::index::entry::Slot;
use gridix_codec::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;

/// A range of values, bounded on either side.
///
/// Ranges are interpreted with the natural [`Value`] order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRange {
    /// Lower bound.
    pub lower: Bound<Value>,
    /// Upper bound.
    pub upper: Bound<Value>,
}

impl ValueRange {
    /// The unbounded range.
    pub fn all() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    /// The range holding exactly `value`.
    pub fn point(value: Value) -> Self {
        Self {
            lower: Bound::Included(value.clone()),
            upper: Bound::Included(value),
        }
    }

    /// Creates a range from explicit bounds.
    pub fn new(lower: Bound<Value>, upper: Bound<Value>) -> Self {
        Self { lower, upper }
    }

    /// The part of the value space left to visit after `position`.
    ///
    /// Ascending scans continue above the position, descending scans below.
    pub(crate) fn resume(position: &Value, descending: bool, inclusive: bool) -> Self {
        let bound = if inclusive {
            Bound::Included(position.clone())
        } else {
            Bound::Excluded(position.clone())
        };
        if descending {
            Self::new(Bound::Unbounded, bound)
        } else {
            Self::new(bound, Bound::Unbounded)
        }
    }

    /// Returns true if this is a single-value range.
    pub fn is_point(&self) -> bool {
        matches!((&self.lower, &self.upper), (Bound::Included(a), Bound::Included(b)) if a == b)
    }

    /// Returns true if no value can fall in the range.
    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Bound::Included(a), Bound::Included(b)) => a > b,
            (Bound::Included(a), Bound::Excluded(b))
            | (Bound::Excluded(a), Bound::Included(b))
            | (Bound::Excluded(a), Bound::Excluded(b)) => a >= b,
            _ => false,
        }
    }

    /// Returns true if `value` falls in the range.
    pub fn contains(&self, value: &Value) -> bool {
        let above = match &self.lower {
            Bound::Included(v) => value >= v,
            Bound::Excluded(v) => value > v,
            Bound::Unbounded => true,
        };
        let below = match &self.upper {
            Bound::Included(v) => value <= v,
            Bound::Excluded(v) => value < v,
            Bound::Unbounded => true,
        };
        above && below
    }

    /// Returns the range covered by both `self` and `other`.
    #[must_use]
    pub fn intersect(self, other: &ValueRange) -> Self {
        Self {
            lower: tighter(self.lower, &other.lower, Ordering::Greater),
            upper: tighter(self.upper, &other.upper, Ordering::Less),
        }
    }
}

/// Picks the more restrictive of two bounds; `wins` is the ordering of the
/// winning value relative to the other one.
fn tighter(a: Bound<Value>, b: &Bound<Value>, wins: Ordering) -> Bound<Value> {
    let keep_a = match (&a, b) {
        (_, Bound::Unbounded) => true,
        (Bound::Unbounded, _) => false,
        (Bound::Included(x) | Bound::Excluded(x), Bound::Included(y) | Bound::Excluded(y)) => {
            match x.cmp(y) {
                Ordering::Equal => matches!(a, Bound::Excluded(_)),
                ord => ord == wins,
            }
        }
    };
    if keep_a {
        a
    } else {
        b.clone()
    }
}

/// Iterates the part of `map` inside `range`.
///
/// Empty ranges yield nothing instead of reaching `BTreeMap::range`, which
/// panics on inverted bounds.
pub(crate) fn range_iter<'a, V>(
    map: &'a BTreeMap<Value, V>,
    range: &ValueRange,
    descending: bool,
) -> Box<dyn Iterator<Item = (&'a Value, &'a V)> + 'a> {
    if range.is_empty() {
        return Box::new(std::iter::empty());
    }
    let iter = map.range((range.lower.clone(), range.upper.clone()));
    if descending {
        Box::new(iter.rev())
    } else {
        Box::new(iter)
    }
}

/// Ordered index over one field of a type.
///
/// Maps field value to the keys holding it, and each key to its arena slot.
/// Entries sharing a field value are visited in key order, so a scan
/// position is fully described by `(field value, key)`.
#[derive(Debug, Default)]
pub(crate) struct OrderedIndex {
    entries: BTreeMap<Value, BTreeMap<Value, Slot>>,
    count: usize,
}

impl OrderedIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.count
    }

    pub(crate) fn insert(&mut self, field: Value, key: Value, slot: Slot) {
        if self.entries.entry(field).or_default().insert(key, slot).is_none() {
            self.count += 1;
        }
    }

    pub(crate) fn remove(&mut self, field: &Value, key: &Value) -> Option<Slot> {
        let keys = self.entries.get_mut(field)?;
        let slot = keys.remove(key)?;
        if keys.is_empty() {
            self.entries.remove(field);
        }
        self.count -= 1;
        Some(slot)
    }

    /// Returns up to `limit` entries inside `range`, continuing after
    /// `after` when resuming a scan.
    pub(crate) fn scan(
        &self,
        range: &ValueRange,
        after: Option<(&Value, &Value)>,
        descending: bool,
        limit: usize,
    ) -> Vec<(Value, Value, Slot)> {
        let mut out = Vec::new();
        let outer = match after {
            Some((field, _)) => range
                .clone()
                .intersect(&ValueRange::resume(field, descending, true)),
            None => range.clone(),
        };

        for (field, keys) in range_iter(&self.entries, &outer, descending) {
            let inner = match after {
                Some((after_field, after_key)) if after_field == field => {
                    ValueRange::resume(after_key, descending, false)
                }
                _ => ValueRange::all(),
            };
            for (key, slot) in range_iter(keys, &inner, descending) {
                if out.len() >= limit {
                    return out;
                }
                out.push((field.clone(), key.clone(), *slot));
            }
        }
        out
    }
}
