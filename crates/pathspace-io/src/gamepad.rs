// SPDX-License-Identifier: Apache-2.0
//! Gamepad event provider, including haptics command routing.

use std::sync::Arc;

use parking_lot::Mutex;
use pathspace_core::{Context, Error, InsertReturn, Layer, LayerValue, Out, OutSlot};

use crate::common::{clamp_unit, deadline_from, EventQueue};

/// A single gamepad event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GamepadEvent {
    /// A gamepad was connected.
    Connected {
        /// Which physical device.
        device_id: u32,
        /// Event time, nanoseconds since an arbitrary epoch.
        timestamp_ns: u64,
    },
    /// A gamepad was disconnected.
    Disconnected {
        /// Which physical device.
        device_id: u32,
        /// Event time, nanoseconds since an arbitrary epoch.
        timestamp_ns: u64,
    },
    /// A button was pressed.
    ButtonDown {
        /// Which physical device.
        device_id: u32,
        /// Which button.
        button: u8,
        /// Event time, nanoseconds since an arbitrary epoch.
        timestamp_ns: u64,
    },
    /// A button was released.
    ButtonUp {
        /// Which physical device.
        device_id: u32,
        /// Which button.
        button: u8,
        /// Event time, nanoseconds since an arbitrary epoch.
        timestamp_ns: u64,
    },
    /// An analog axis moved.
    AxisMove {
        /// Which physical device.
        device_id: u32,
        /// Which axis.
        axis: u8,
        /// New axis value, in `[-1.0, 1.0]`.
        value: f32,
        /// Event time, nanoseconds since an arbitrary epoch.
        timestamp_ns: u64,
    },
}

/// A rumble/haptics command, clamped on construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HapticsCommand {
    /// Low-frequency motor intensity, `[0.0, 1.0]`.
    pub low: f32,
    /// High-frequency motor intensity, `[0.0, 1.0]`.
    pub high: f32,
    /// Duration of the effect, in milliseconds.
    pub duration_ms: u32,
}

impl HapticsCommand {
    /// Builds a command, clamping `low`/`high` into `[0.0, 1.0]`.
    #[must_use]
    pub fn new(low: f32, high: f32, duration_ms: u32) -> Self {
        Self { low: clamp_unit(low), high: clamp_unit(high), duration_ms }
    }
}

/// Which backend a gamepad provider emulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HapticsBackend {
    /// Records the last command; never touches real hardware.
    Simulation,
    /// Would forward to vendor rumble APIs; unimplemented here, so every
    /// command is rejected with [`Error::InvalidPermissions`] (see §4.6:
    /// "the OS backend ... returns InvalidPermissions if unsupported").
    Os,
}

/// A mountable gamepad provider: event queue plus haptics command routing.
pub struct GamepadProvider {
    events: EventQueue<GamepadEvent>,
    backend: HapticsBackend,
    last_command: Mutex<Option<HapticsCommand>>,
}

impl GamepadProvider {
    /// Creates a provider backed by `backend`.
    #[must_use]
    pub fn new(backend: HapticsBackend) -> Self {
        Self { events: EventQueue::new(), backend, last_command: Mutex::new(None) }
    }

    /// Enqueues a connect event.
    pub fn simulate_connected(&self, device_id: u32, timestamp_ns: u64) {
        self.events.enqueue(GamepadEvent::Connected { device_id, timestamp_ns });
    }

    /// Enqueues a disconnect event.
    pub fn simulate_disconnected(&self, device_id: u32, timestamp_ns: u64) {
        self.events.enqueue(GamepadEvent::Disconnected { device_id, timestamp_ns });
    }

    /// Enqueues a button-down event.
    pub fn simulate_button_down(&self, device_id: u32, button: u8, timestamp_ns: u64) {
        self.events.enqueue(GamepadEvent::ButtonDown { device_id, button, timestamp_ns });
    }

    /// Enqueues a button-up event.
    pub fn simulate_button_up(&self, device_id: u32, button: u8, timestamp_ns: u64) {
        self.events.enqueue(GamepadEvent::ButtonUp { device_id, button, timestamp_ns });
    }

    /// Enqueues an axis-move event.
    pub fn simulate_axis_move(&self, device_id: u32, axis: u8, value: f32, timestamp_ns: u64) {
        self.events.enqueue(GamepadEvent::AxisMove { device_id, axis, value, timestamp_ns });
    }

    /// The last haptics command accepted, if any.
    #[must_use]
    pub fn last_haptics_command(&self) -> Option<HapticsCommand> {
        *self.last_command.lock()
    }

    fn accept_haptics(&self, command: HapticsCommand) -> Option<Error> {
        match self.backend {
            HapticsBackend::Simulation => {
                *self.last_command.lock() = Some(command);
                None
            }
            HapticsBackend::Os => {
                Some(Error::InvalidPermissions("OS haptics backend does not support rumble".to_string()))
            }
        }
    }
}

impl Layer for GamepadProvider {
    fn insert(&self, tail: &str, value: LayerValue) -> InsertReturn {
        let mut result = InsertReturn::new();
        if tail == "/rumble" || tail == "/haptics" {
            match value.downcast_ref::<HapticsCommand>() {
                Some(command) => match self.accept_haptics(*command) {
                    None => result.nbr_values_inserted = 1,
                    Some(err) => result.errors.push((tail.to_string(), err)),
                },
                None => result.errors.push((
                    tail.to_string(),
                    Error::TypeMismatch { expected: "HapticsCommand", found: "other" },
                )),
            }
        } else {
            result.errors.push((
                tail.to_string(),
                Error::InvalidPermissions(format!("gamepad provider rejects insert at {tail}")),
            ));
        }
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
                Err(_) => Some(Error::TypeMismatch { expected: "GamepadEvent", found: "other" }),
            },
            None if options.do_block => Some(Error::Timeout),
            None => Some(Error::NoObjectFound),
        }
    }

    fn shutdown(&self) {
        tracing::info!("gamepad provider shut down");
    }

    fn adopt_context_and_prefix(&self, context: Arc<Context>, prefix: String) {
        self.events.bind(context, prefix);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haptics_command_clamps_out_of_range_values() {
        let command = HapticsCommand::new(-1.0, 2.0, 100);
        assert_eq!(command.low, 0.0);
        assert_eq!(command.high, 1.0);
    }

    #[test]
    fn simulation_backend_records_rumble_command() {
        let provider = GamepadProvider::new(HapticsBackend::Simulation);
        let result = provider.insert("/rumble", LayerValue::new(HapticsCommand::new(0.5, 0.5, 200)));
        assert_eq!(result.nbr_values_inserted, 1);
        assert_eq!(provider.last_haptics_command().unwrap().duration_ms, 200);
    }

    #[test]
    fn haptics_suffix_also_accepted() {
        let provider = GamepadProvider::new(HapticsBackend::Simulation);
        let result = provider.insert("/haptics", LayerValue::new(HapticsCommand::new(0.1, 0.1, 10)));
        assert_eq!(result.nbr_values_inserted, 1);
    }

    #[test]
    fn os_backend_rejects_rumble() {
        let provider = GamepadProvider::new(HapticsBackend::Os);
        let result = provider.insert("/rumble", LayerValue::new(HapticsCommand::new(0.5, 0.5, 200)));
        assert_eq!(result.nbr_values_inserted, 0);
        assert!(matches!(result.errors[0].1, Error::InvalidPermissions(_)));
    }

    #[test]
    fn non_haptics_path_rejects_insert() {
        let provider = GamepadProvider::new(HapticsBackend::Simulation);
        let result = provider.insert("/other", LayerValue::new(1_i32));
        assert_eq!(result.nbr_values_inserted, 0);
    }

    #[test]
    fn events_are_served_fifo() {
        let provider = GamepadProvider::new(HapticsBackend::Simulation);
        provider.simulate_connected(1, 1);
        provider.simulate_button_down(1, 0, 2);
        let mut slot: Option<GamepadEvent> = None;
        provider.out("/", &(Out::new() | pathspace_core::Pop), &mut OutSlot::new(&mut slot));
        assert!(matches!(slot, Some(GamepadEvent::Connected { .. })));
    }
}
