// SPDX-License-Identifier: Apache-2.0
//! Composable access options for `read`/`take`/`insert` (C9).

use std::time::Duration;

use crate::path::ValidationLevel;

/// A duration effectively indistinguishable from "never" for blocking waits.
const FOREVER: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 100);

/// Options governing a single `read`/`take` call.
///
/// Build one with [`Out::new`] and compose modifiers onto it with `|`:
///
/// ```
/// use pathspace_core::options::{Out, Block, Pop};
/// use std::time::Duration;
///
/// let out = Out::new() | Block(Duration::from_millis(500)) | Pop;
/// assert!(out.do_block);
/// assert!(out.do_pop);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Out {
    /// Suspend on the notification bus until a match arrives or `timeout` elapses.
    pub do_block: bool,
    /// Remove the head on a successful match (`take` semantics) instead of peeking.
    pub do_pop: bool,
    /// Deadline for a blocking wait, relative to call time.
    pub timeout: Duration,
    /// How strictly the target path is validated before dispatch.
    pub validation_level: ValidationLevel,
}

impl Default for Out {
    fn default() -> Self {
        Self { do_block: false, do_pop: false, timeout: FOREVER, validation_level: ValidationLevel::Basic }
    }
}

impl Out {
    /// Returns the default, non-blocking, non-popping, basic-validation options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// A modifier that can be folded onto an [`Out`] via `|`.
///
/// Composition is a right-fold: `a | b | c` applies `a`'s modification, then
/// `b`'s, then `c`'s, each taking the previous result as its starting point.
pub trait OutModifier {
    /// Applies this modifier to `out`, returning the updated value.
    fn modify(self, out: Out) -> Out;
}

impl<M: OutModifier> std::ops::BitOr<M> for Out {
    type Output = Self;

    fn bitor(self, rhs: M) -> Self::Output {
        rhs.modify(self)
    }
}

/// Enables blocking with the given timeout.
#[derive(Debug, Clone, Copy)]
pub struct Block(pub Duration);

impl OutModifier for Block {
    fn modify(self, out: Out) -> Out {
        Out { do_block: true, timeout: self.0, ..out }
    }
}

/// Requests removal of the head on success (`take` semantics).
#[derive(Debug, Clone, Copy)]
pub struct Pop;

impl OutModifier for Pop {
    fn modify(self, out: Out) -> Out {
        Out { do_pop: true, ..out }
    }
}

/// Skips path validation entirely.
#[derive(Debug, Clone, Copy)]
pub struct OutNoValidation;

impl OutModifier for OutNoValidation {
    fn modify(self, out: Out) -> Out {
        Out { validation_level: ValidationLevel::None, ..out }
    }
}

/// Requests the strictest path validation.
#[derive(Debug, Clone, Copy)]
pub struct OutFullValidation;

impl OutModifier for OutFullValidation {
    fn modify(self, out: Out) -> Out {
        Out { validation_level: ValidationLevel::Full, ..out }
    }
}

/// Options governing a single `insert` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct In {
    /// How strictly the target path is validated before dispatch.
    pub validation_level: ValidationLevel,
}

impl Default for In {
    fn default() -> Self {
        Self { validation_level: ValidationLevel::Basic }
    }
}

impl In {
    /// Returns the default, basic-validation insert options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_out_does_not_block_or_pop() {
        let out = Out::new();
        assert!(!out.do_block);
        assert!(!out.do_pop);
        assert_eq!(out.validation_level, ValidationLevel::Basic);
    }

    #[test]
    fn block_sets_timeout_and_flag() {
        let out = Out::new() | Block(Duration::from_millis(20));
        assert!(out.do_block);
        assert_eq!(out.timeout, Duration::from_millis(20));
    }

    #[test]
    fn composition_is_left_to_right() {
        let out = Out::new() | Block(Duration::from_millis(20)) | Pop | OutFullValidation;
        assert!(out.do_block);
        assert!(out.do_pop);
        assert_eq!(out.validation_level, ValidationLevel::Full);
    }

    #[test]
    fn no_validation_overrides_default() {
        let out = Out::new() | OutNoValidation;
        assert_eq!(out.validation_level, ValidationLevel::None);
    }
}
