// SPDX-License-Identifier: Apache-2.0
//! Pointer/mouse event provider.

use std::sync::Arc;

use pathspace_core::{Context, Error, InsertReturn, Layer, LayerValue, Out, OutSlot};

use crate::common::{deadline_from, EventQueue};

/// A single pointer/mouse event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MouseEvent {
    /// Relative motion.
    Move {
        /// Horizontal delta.
        dx: f64,
        /// Vertical delta.
        dy: f64,
        /// Event time, nanoseconds since an arbitrary epoch.
        timestamp_ns: u64,
    },
    /// Absolute position.
    AbsoluteMove {
        /// Absolute horizontal position.
        x: f64,
        /// Absolute vertical position.
        y: f64,
        /// Event time, nanoseconds since an arbitrary epoch.
        timestamp_ns: u64,
    },
    /// A button was pressed.
    ButtonDown {
        /// Which button.
        button: u8,
        /// Event time, nanoseconds since an arbitrary epoch.
        timestamp_ns: u64,
    },
    /// A button was released.
    ButtonUp {
        /// Which button.
        button: u8,
        /// Event time, nanoseconds since an arbitrary epoch.
        timestamp_ns: u64,
    },
    /// A scroll-wheel movement.
    Wheel {
        /// Horizontal scroll delta.
        dx: f64,
        /// Vertical scroll delta.
        dy: f64,
        /// Event time, nanoseconds since an arbitrary epoch.
        timestamp_ns: u64,
    },
}

/// A mountable pointer/mouse provider.
///
/// `insert` is unsupported (`InvalidPermissions`); `out` serves the head
/// event, popping it if `options.do_pop` is set, and blocks on its own
/// condition variable (not the shared bus) when `options.do_block` is set.
#[derive(Default)]
pub struct MouseProvider {
    events: EventQueue<MouseEvent>,
}

impl MouseProvider {
    /// Creates a provider with no queued events.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a relative-motion event as if the OS/backend had produced it.
    pub fn simulate_move(&self, dx: f64, dy: f64, timestamp_ns: u64) {
        self.events.enqueue(MouseEvent::Move { dx, dy, timestamp_ns });
    }

    /// Enqueues an absolute-position event.
    pub fn simulate_absolute_move(&self, x: f64, y: f64, timestamp_ns: u64) {
        self.events.enqueue(MouseEvent::AbsoluteMove { x, y, timestamp_ns });
    }

    /// Enqueues a button-down event.
    pub fn simulate_button_down(&self, button: u8, timestamp_ns: u64) {
        self.events.enqueue(MouseEvent::ButtonDown { button, timestamp_ns });
    }

    /// Enqueues a button-up event.
    pub fn simulate_button_up(&self, button: u8, timestamp_ns: u64) {
        self.events.enqueue(MouseEvent::ButtonUp { button, timestamp_ns });
    }

    /// Enqueues a wheel event.
    pub fn simulate_wheel(&self, dx: f64, dy: f64, timestamp_ns: u64) {
        self.events.enqueue(MouseEvent::Wheel { dx, dy, timestamp_ns });
    }
}

impl Layer for MouseProvider {
    fn insert(&self, _tail: &str, _value: LayerValue) -> InsertReturn {
        let mut result = InsertReturn::new();
        result.errors.push((
            "/".to_string(),
            Error::InvalidPermissions("mouse provider does not accept insert".to_string()),
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
                Err(_) => Some(Error::TypeMismatch { expected: "MouseEvent", found: "other" }),
            },
            None if options.do_block => Some(Error::Timeout),
            None => Some(Error::NoObjectFound),
        }
    }

    fn shutdown(&self) {
        tracing::info!("mouse provider shut down");
    }

    fn adopt_context_and_prefix(&self, context: Arc<Context>, prefix: String) {
        self.events.bind(context, prefix);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn out_without_events_is_no_object_found() {
        let provider = MouseProvider::new();
        let mut slot: Option<MouseEvent> = None;
        let err = provider.out("/", &Out::new(), &mut OutSlot::new(&mut slot));
        assert!(matches!(err, Some(Error::NoObjectFound)));
    }

    #[test]
    fn simulate_then_out_serves_head_event() {
        let provider = MouseProvider::new();
        provider.simulate_move(3.0, 4.0, 1);
        let mut slot: Option<MouseEvent> = None;
        let err = provider.out("/", &Out::new(), &mut OutSlot::new(&mut slot));
        assert!(err.is_none());
        assert_eq!(slot, Some(MouseEvent::Move { dx: 3.0, dy: 4.0, timestamp_ns: 1 }));
    }

    #[test]
    fn pop_removes_event_peek_does_not() {
        let provider = MouseProvider::new();
        provider.simulate_button_down(1, 1);
        let mut slot: Option<MouseEvent> = None;
        provider.out("/", &Out::new(), &mut OutSlot::new(&mut slot));
        assert!(slot.is_some());
        assert!(!provider.events.is_empty());

        let mut slot: Option<MouseEvent> = None;
        provider.out("/", &(Out::new() | pathspace_core::Pop), &mut OutSlot::new(&mut slot));
        assert!(slot.is_some());
        assert!(provider.events.is_empty());
    }

    #[test]
    fn insert_is_rejected() {
        let provider = MouseProvider::new();
        let result = provider.insert("/", LayerValue::new(1_i32));
        assert_eq!(result.nbr_values_inserted, 0);
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn blocking_out_times_out_without_events() {
        let provider = MouseProvider::new();
        let mut slot: Option<MouseEvent> = None;
        let opts = Out::new() | pathspace_core::Block(Duration::from_millis(20));
        let err = provider.out("/", &opts, &mut OutSlot::new(&mut slot));
        assert!(matches!(err, Some(Error::Timeout)));
    }
}
