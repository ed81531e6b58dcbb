// SPDX-License-Identifier: Apache-2.0
//! Pointer mixer: a single FIFO sink fed by any number of pointer sources.
//!
//! Structurally identical to [`MouseProvider`](crate::mouse::MouseProvider) —
//! its own deque, mutex, and condvar — rather than an aggregator that polls
//! upstream layers. Any number of callers (multiple physical backends,
//! tests) feed it through `simulate_*`, each event tagged with the
//! `source_id` its caller supplied; "arrival order" is the order
//! `simulate_*` was called, not any upstream timestamp.

use std::sync::Arc;

use pathspace_core::{Context, Error, InsertReturn, Layer, LayerValue, Out, OutSlot};

use crate::common::{deadline_from, EventQueue};
use crate::mouse::MouseEvent;

/// A pointer event tagged with the source that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixedPointerEvent {
    /// Identifies which upstream source produced `event`.
    pub source_id: i32,
    /// The underlying pointer event.
    pub event: MouseEvent,
}

/// A mountable pointer mixer.
#[derive(Default)]
pub struct PointerMixer {
    events: EventQueue<MixedPointerEvent>,
}

impl PointerMixer {
    /// Creates a mixer with no queued events.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a pointer event from `source_id` into the shared FIFO.
    pub fn simulate_event(&self, source_id: i32, event: MouseEvent) {
        self.events.enqueue(MixedPointerEvent { source_id, event });
    }
}

impl Layer for PointerMixer {
    fn insert(&self, _tail: &str, _value: LayerValue) -> InsertReturn {
        let mut result = InsertReturn::new();
        result.errors.push((
            "/".to_string(),
            Error::InvalidPermissions("pointer mixer does not accept insert".to_string()),
        ));
        result
    }

    fn out(&self, _tail: &str, options: &Out, slot: &mut OutSlot<'_>) -> Option<Error> {
        let event = if options.do_block {
            self.events.wait_for_head(deadline_from(options.timeout), options.do_pop)
        } else if options.do_pop {
            self.events.pop_front()
        } else {
            self.events.peek_front()
        };
        match event {
            Some(event) => match slot.write(event) {
                Ok(()) => None,
                Err(_) => Some(Error::TypeMismatch { expected: "MixedPointerEvent", found: "other" }),
            },
            None if options.do_block => Some(Error::Timeout),
            None => Some(Error::NoObjectFound),
        }
    }

    fn shutdown(&self) {
        tracing::info!("pointer mixer shut down");
    }

    fn adopt_context_and_prefix(&self, context: Arc<Context>, prefix: String) {
        self.events.bind(context, prefix);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_from_multiple_sources_preserve_arrival_order() {
        let mixer = PointerMixer::new();
        mixer.simulate_event(1, MouseEvent::Move { dx: 1.0, dy: 0.0, timestamp_ns: 1 });
        mixer.simulate_event(2, MouseEvent::Move { dx: 2.0, dy: 0.0, timestamp_ns: 2 });
        mixer.simulate_event(1, MouseEvent::Move { dx: 3.0, dy: 0.0, timestamp_ns: 3 });

        let mut first: Option<MixedPointerEvent> = None;
        mixer.out("/", &(Out::new() | pathspace_core::Pop), &mut OutSlot::new(&mut first));
        assert_eq!(first.unwrap().source_id, 1);

        let mut second: Option<MixedPointerEvent> = None;
        mixer.out("/", &(Out::new() | pathspace_core::Pop), &mut OutSlot::new(&mut second));
        assert_eq!(second.unwrap().source_id, 2);

        let mut third: Option<MixedPointerEvent> = None;
        mixer.out("/", &(Out::new() | pathspace_core::Pop), &mut OutSlot::new(&mut third));
        assert_eq!(third.unwrap().source_id, 1);
    }

    #[test]
    fn insert_is_rejected() {
        let mixer = PointerMixer::new();
        let result = mixer.insert("/", LayerValue::new(1_i32));
        assert_eq!(result.nbr_values_inserted, 0);
    }
}
