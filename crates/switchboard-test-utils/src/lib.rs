// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Switchboard integration tests.
//!
//! Provides recording vendor mocks, a hand-driven clock, and a harness that
//! wires the dispatcher, OTP manager, SMS worker and sync service against a
//! temp SQLite database.
//!
//! # Components
//!
//! - [`MockVoiceApi`] - Scripted voice platform with conversation documents
//! - [`MockSmsGateway`] / [`MockMessagingBot`] - Capture outbound sends
//! - [`ManualClock`] - Clock advanced explicitly by the test
//! - [`TestHarness`] - The assembled back office

pub mod clock;
pub mod harness;
pub mod mock_providers;

pub use clock::ManualClock;
pub use harness::{AuditRow, TestHarness, TestHarnessBuilder};
pub use mock_providers::{MockMessagingBot, MockSmsGateway, MockVoiceApi, SentRecord};
