// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Failures of best-effort steps.

use switchboard_core::SwitchboardError;
use thiserror::Error;

/// A best-effort step failed. The caller decides whether to continue.
#[derive(Debug, Error)]
#[error("{step} failed: {source}")]
pub struct SoftError {
    pub step: &'static str,
    #[source]
    pub source: SwitchboardError,
}

impl SoftError {
    pub fn new(step: &'static str, source: SwitchboardError) -> Self {
        Self { step, source }
    }
}
