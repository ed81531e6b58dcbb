// SPDX-License-Identifier: Apache-2.0
//! Device event providers (C6): mouse, keyboard, gamepad, pointer mixer,
//! device discovery, and a stdout sink, each implementing
//! `pathspace_core::Layer`.

#![forbid(unsafe_code)]

pub mod common;
pub mod device_discovery;
pub mod gamepad;
pub mod keyboard;
pub mod mouse;
pub mod pointer_mixer;
pub mod stdout_sink;

pub use device_discovery::DeviceDiscovery;
pub use gamepad::{GamepadEvent, GamepadProvider, HapticsBackend, HapticsCommand};
pub use keyboard::{KeyboardEvent, KeyboardProvider};
pub use mouse::{MouseEvent, MouseProvider};
pub use pointer_mixer::{MixedPointerEvent, PointerMixer};
pub use stdout_sink::StdOutSink;
