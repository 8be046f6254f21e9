// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-time passcodes delivered by SMS.
//!
//! [`OtpManager`] owns the challenge state machine and rate limit;
//! [`SmsWorker`] drains the send queue the manager fills.

pub mod code;
pub mod manager;
pub mod template;
pub mod worker;

pub use manager::{OtpCreated, OtpManager, OtpRequest, VerifyOutcome};
pub use worker::{JobResult, OTP_SMS_QUEUE, SmsJob, SmsWorker};
