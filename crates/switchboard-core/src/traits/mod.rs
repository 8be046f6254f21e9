// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All adapters use `#[async_trait]` for dynamic dispatch compatibility, so
//! components hold them as `Arc<dyn Trait>`.

pub mod provider;
pub mod storage;

pub use provider::{MessagingBot, SmsGateway, VoiceAgentApi};
pub use storage::StorageAdapter;
