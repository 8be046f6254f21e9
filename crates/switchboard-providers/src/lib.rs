// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vendor HTTP clients.
//!
//! Each client implements one of the provider traits from
//! `switchboard-core`, is built from its config section, and carries a
//! bounded per-request timeout. Non-2xx responses become
//! [`SwitchboardError::Upstream`](switchboard_core::SwitchboardError::Upstream)
//! and timeouts become `Timeout`.

pub mod builderbot;
pub mod elevenlabs;
mod http;
pub mod twilio;

pub use builderbot::BuilderbotClient;
pub use elevenlabs::ElevenlabsClient;
pub use twilio::TwilioClient;
