// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Switchboard contact-center back office.
//!
//! This crate provides the domain model (interactions, events, messages,
//! call details, OTP challenges, audit entries), the shared error type, and
//! the adapter traits that storage and vendor clients implement.

pub mod clock;
pub mod error;
pub mod phone;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use clock::{Clock, SystemClock};
pub use error::SwitchboardError;
pub use types::{Channel, Direction, InteractionStatus, OtpPurpose, OtpStatus, Outcome, Provider};

// Re-export all adapter traits at crate root.
pub use traits::{MessagingBot, SmsGateway, StorageAdapter, VoiceAgentApi};
