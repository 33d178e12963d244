// SPDX-License-Identifier: MIT OR Apache-2.0

//! Host-side board monitor and HalfKay upload engine for the Teensy family of USB microcontroller
//! boards.
//!
//! This crate does not talk to USB, HID, or serial devices itself — see [`hotplug`] and
//! [`transport`] for the contracts a host application implements against its own platform
//! backend (`nusb`, `rusb`, `hidapi`, ...). Given those, [`monitor::Monitor`] tracks which boards
//! are attached, dispatches state-change events, and drives firmware uploads and board commands
//! through the [`board::Board`] handles it hands back.

pub mod aggregator;
pub mod board;
pub mod capabilities;
pub mod classifier;
pub mod dispatcher;
pub mod drop_timer;
pub mod error;
pub mod firmware;
pub mod halfkay;
pub mod hotplug;
pub mod interface;
pub mod model;
pub mod monitor;
pub mod platform;
pub mod transport;

pub use board::{Board, State as BoardState};
pub use capabilities::Capability;
pub use dispatcher::{CallbackOutcome, Event};
pub use error::{Error, ErrorKind};
pub use monitor::{Monitor, MonitorConfig};
