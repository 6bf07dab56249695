// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Pre-configured limits for the site's call sites.

use crate::guard::Limit;
use std::time::Duration;

/// Identifier used by the contact form.
pub const CONTACT_FORM: &str = "contact-form";

/// Identifier used by the appointment request form.
pub const APPOINTMENT: &str = "appointment";

/// Contact form: 3 submissions per 5 minutes.
pub const fn contact_form() -> Limit {
    Limit::preset(3, Duration::from_secs(300))
}

/// Appointment form: 5 submissions per minute.
pub const fn appointment() -> Limit {
    Limit::preset(5, Duration::from_secs(60))
}

/// Phone-click conversion tracking: 3 events per minute per session.
pub const fn phone_click() -> Limit {
    Limit::preset(3, Duration::from_secs(60))
}

/// Network identity: 10 requests per minute.
pub const fn network_identity() -> Limit {
    Limit::network()
}

/// Identifier scoping phone-click tracking to one session.
pub fn phone_click_key(session_id: &str) -> String {
    format!("phone-click:{session_id}")
}

/// Whole minutes a caller should be told to wait, rounded up.
pub fn wait_minutes(remaining: Duration) -> u64 {
    u64::try_from(remaining.as_millis().div_ceil(60_000)).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(contact_form(), Limit::new(3, Duration::from_secs(300)).unwrap());
        assert_eq!(appointment(), Limit::default());
        assert_eq!(network_identity().max_attempts(), 10);
    }

    #[test]
    fn test_phone_click_key() {
        assert_eq!(phone_click_key("abc123"), "phone-click:abc123");
    }

    #[test]
    fn test_wait_minutes_rounds_up() {
        assert_eq!(wait_minutes(Duration::ZERO), 0);
        assert_eq!(wait_minutes(Duration::from_millis(1)), 1);
        assert_eq!(wait_minutes(Duration::from_secs(60)), 1);
        assert_eq!(wait_minutes(Duration::from_secs(61)), 2);
        assert_eq!(wait_minutes(Duration::MAX), u64::MAX.div_ceil(60));
    }
}
