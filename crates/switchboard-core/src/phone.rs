// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Phone-number normalization used for lookups and dedup keys.
//!
//! Numbers are not validated; normalization only removes formatting so that
//! `"+54 11 1234-5678"` and `"541112345678"` compare equal.

/// Strip whitespace, dashes, parentheses and dots, then any leading `+`.
pub fn normalize_phone(raw: &str) -> String {
    let bare: String = raw
        .chars()
        .filter(|c| !(c.is_whitespace() || matches!(c, '-' | '(' | ')' | '.')))
        .collect();
    bare.trim_start_matches('+').to_string()
}

/// Strip WhatsApp JID suffixes (`@s.whatsapp.net`, `@c.us`) and normalize.
pub fn normalize_whatsapp_id(raw: &str) -> String {
    let number = raw.split('@').next().unwrap_or(raw);
    // Multi-device JIDs carry a `:<device>` suffix on the user part.
    let number = number.split(':').next().unwrap_or(number);
    normalize_phone(number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn formatted_and_bare_numbers_collide() {
        assert_eq!(normalize_phone("+54 11 1234-5678"), "541112345678");
        assert_eq!(normalize_phone("541112345678"), "541112345678");
    }

    #[test]
    fn strips_parens_and_dots() {
        assert_eq!(normalize_phone("(011) 1234.5678"), "01112345678");
    }

    #[test]
    fn plus_inside_parentheses_is_stripped() {
        let once = normalize_phone("(+54) 11 1234-5678");
        assert_eq!(once, "541112345678");
        assert_eq!(normalize_phone(&once), once);
        assert_eq!(normalize_phone(" + +54 11"), "5411");
    }

    #[test]
    fn whatsapp_jid_suffix_removed() {
        assert_eq!(normalize_whatsapp_id("5491155550000@s.whatsapp.net"), "5491155550000");
        assert_eq!(normalize_whatsapp_id("5491155550000:12@s.whatsapp.net"), "5491155550000");
        assert_eq!(normalize_whatsapp_id("+54 9 11 5555-0000"), "5491155550000");
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(raw in "[+() .-]*[0-9 ().+-]{0,24}") {
            let once = normalize_phone(&raw);
            prop_assert_eq!(normalize_phone(&once), once.clone());
        }

        #[test]
        fn normalized_output_has_no_formatting(raw in "[+() .-]*[0-9 ().-]{0,24}") {
            let out = normalize_phone(&raw);
            prop_assert!(out.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
