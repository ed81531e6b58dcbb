// SPDX-License-Identifier: Apache-2.0
//! Keyboard event provider.

use std::sync::Arc;

use pathspace_core::{Context, Error, InsertReturn, Layer, LayerValue, Out, OutSlot};

use crate::common::{deadline_from, EventQueue};

/// A single keyboard event.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyboardEvent {
    /// A key was pressed.
    KeyDown {
        /// Platform-specific key code.
        keycode: u32,
        /// Bitmask of held modifier keys.
        modifiers: u32,
        /// Event time, nanoseconds since an arbitrary epoch.
        timestamp_ns: u64,
    },
    /// A key was released.
    KeyUp {
        /// Platform-specific key code.
        keycode: u32,
        /// Bitmask of held modifier keys.
        modifiers: u32,
        /// Event time, nanoseconds since an arbitrary epoch.
        timestamp_ns: u64,
    },
    /// Composed text input (post-IME), always valid UTF-8.
    Text {
        /// The composed text.
        text: String,
        /// Event time, nanoseconds since an arbitrary epoch.
        timestamp_ns: u64,
    },
}

/// A mountable keyboard provider. See [`MouseProvider`](crate::mouse::MouseProvider)
/// for the shared contract; `insert` is unsupported here too.
#[derive(Default)]
pub struct KeyboardProvider {
    events: EventQueue<KeyboardEvent>,
}

impl KeyboardProvider {
    /// Creates a provider with no queued events.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a key-down event.
    pub fn simulate_key_down(&self, keycode: u32, modifiers: u32, timestamp_ns: u64) {
        self.events.enqueue(KeyboardEvent::KeyDown { keycode, modifiers, timestamp_ns });
    }

    /// Enqueues a key-up event.
    pub fn simulate_key_up(&self, keycode: u32, modifiers: u32, timestamp_ns: u64) {
        self.events.enqueue(KeyboardEvent::KeyUp { keycode, modifiers, timestamp_ns });
    }

    /// Enqueues a composed-text event.
    pub fn simulate_text(&self, text: impl Into<String>, timestamp_ns: u64) {
        self.events.enqueue(KeyboardEvent::Text { text: text.into(), timestamp_ns });
    }
}

impl Layer for KeyboardProvider {
    fn insert(&self, _tail: &str, _value: LayerValue) -> InsertReturn {
        let mut result = InsertReturn::new();
        result.errors.push((
            "/".to_string(),
            Error::InvalidPermissions("keyboard provider does not accept insert".to_string()),
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
                Err(_) => Some(Error::TypeMismatch { expected: "KeyboardEvent", found: "other" }),
            },
            None if options.do_block => Some(Error::Timeout),
            None => Some(Error::NoObjectFound),
        }
    }

    fn shutdown(&self) {
        tracing::info!("keyboard provider shut down");
    }

    fn adopt_context_and_prefix(&self, context: Arc<Context>, prefix: String) {
        self.events.bind(context, prefix);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulate_text_then_out_serves_head_event() {
        let provider = KeyboardProvider::new();
        provider.simulate_text("hi", 1);
        let mut slot: Option<KeyboardEvent> = None;
        let err = provider.out("/", &Out::new(), &mut OutSlot::new(&mut slot));
        assert!(err.is_none());
        assert_eq!(slot, Some(KeyboardEvent::Text { text: "hi".to_string(), timestamp_ns: 1 }));
    }

    #[test]
    fn fifo_order_across_event_kinds() {
        let provider = KeyboardProvider::new();
        provider.simulate_key_down(65, 0, 1);
        provider.simulate_key_up(65, 0, 2);
        let mut first: Option<KeyboardEvent> = None;
        provider.out("/", &(Out::new() | pathspace_core::Pop), &mut OutSlot::new(&mut first));
        assert!(matches!(first, Some(KeyboardEvent::KeyDown { .. })));
        let mut second: Option<KeyboardEvent> = None;
        provider.out("/", &(Out::new() | pathspace_core::Pop), &mut OutSlot::new(&mut second));
        assert!(matches!(second, Some(KeyboardEvent::KeyUp { .. })));
    }

    #[test]
    fn insert_is_rejected() {
        let provider = KeyboardProvider::new();
        let result = provider.insert("/", LayerValue::new(1_i32));
        assert_eq!(result.nbr_values_inserted, 0);
    }
}
