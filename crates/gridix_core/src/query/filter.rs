//! Caller-supplied visibility filters.

use crate::types::SpaceName;
use gridix_codec::Value;

/// Decides per key whether a query may see an entry.
///
/// Filters run outside every index lock, after the entry has been read.
/// Any `Fn(&SpaceName, &Value) -> bool` closure is a filter:
///
/// ```
/// use gridix_core::{QueryFilter, SpaceName, Value};
///
/// let even = |_: &SpaceName, key: &Value| key.as_integer().is_some_and(|k| k % 2 == 0);
/// assert!(even.accepts(&SpaceName::DEFAULT, &Value::Integer(2)));
/// assert!(!even.accepts(&SpaceName::DEFAULT, &Value::Integer(3)));
/// ```
pub trait QueryFilter: Send + Sync {
    /// Returns true if the entry under `key` is visible.
    fn accepts(&self, space: &SpaceName, key: &Value) -> bool;
}

impl<F> QueryFilter for F
where
    F: Fn(&SpaceName, &Value) -> bool + Send + Sync,
{
    fn accepts(&self, space: &SpaceName, key: &Value) -> bool {
        self(space, key)
    }
}
