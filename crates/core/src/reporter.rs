//! Fractional progress fed by an external source.

use std::rc::Rc;

use crate::scope::ScopeInner;

/// Step resolution backing every fractional scope.
pub(crate) const REPORTER_STEPS: u32 = 1000;

/// Handle for pushing externally measured progress into the tree.
///
/// A reporter wraps a fractional scope with a fixed resolution of 1000
/// steps. Reported values map onto that counter and run through the same
/// monotonic clamp as step advancement. There is no acknowledgment: a
/// disposed reporter swallows reports silently, which also makes it the
/// one kind of open child a sibling may displace without an error.
#[derive(Debug, Clone)]
pub struct Reporter {
    pub(crate) inner: Rc<ScopeInner>,
}

impl Reporter {
    /// Feed the current completion fraction, expected in `[0, 1]`.
    ///
    /// Values above 1 clamp to 1; NaN, negatives, and anything that would
    /// move progress backwards are dropped.
    pub fn report(&self, value: f64) {
        self.inner.apply_report(value);
    }
}
