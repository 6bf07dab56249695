// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Test harness for abuse guard attack simulation.
//!
//! Simulated time comes from a `MockClock`, so a ten-minute attack runs in
//! milliseconds and every run produces the same counts.

pub mod attacks;
pub mod generators;
pub mod metrics;
