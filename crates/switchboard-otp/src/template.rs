// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMS bodies per OTP purpose.

use switchboard_core::OtpPurpose;

const DEFAULT_TEMPLATE: &str = "Tu código de verificación es {code}. Vence en {minutes} minutos.";

fn template_for(purpose: Option<OtpPurpose>) -> &'static str {
    match purpose {
        Some(OtpPurpose::PasswordReset) => {
            "Tu código para restablecer la contraseña es {code}. Vence en {minutes} minutos. No lo compartas."
        }
        Some(OtpPurpose::TxConfirmation) => {
            "Confirmá tu operación con el código {code}. Vence en {minutes} minutos. Si no la iniciaste, ignorá este mensaje."
        }
        Some(OtpPurpose::IdentityVerification) => {
            "Tu código de verificación de identidad es {code}. Vence en {minutes} minutos."
        }
        Some(OtpPurpose::Login2fa) => {
            "Tu código de acceso es {code}. Vence en {minutes} minutos. No lo compartas con nadie."
        }
        None => DEFAULT_TEMPLATE,
    }
}

/// Render the SMS text for a code. `purpose` is `None` when the job names
/// a purpose this build does not know.
pub fn render(purpose: Option<OtpPurpose>, code: &str, ttl_seconds: i64) -> String {
    let minutes = (ttl_seconds.max(60) + 59) / 60;
    template_for(purpose)
        .replace("{code}", code)
        .replace("{minutes}", &minutes.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_purpose_includes_code_and_expiry() {
        for purpose in [
            Some(OtpPurpose::PasswordReset),
            Some(OtpPurpose::TxConfirmation),
            Some(OtpPurpose::IdentityVerification),
            Some(OtpPurpose::Login2fa),
            None,
        ] {
            let text = render(purpose, "482913", 300);
            assert!(text.contains("482913"), "{text}");
            assert!(text.contains("5 minutos"), "{text}");
            assert!(!text.contains('{'));
        }
    }

    #[test]
    fn minutes_round_up() {
        assert!(render(None, "1", 90).contains("2 minutos"));
        assert!(render(None, "1", 10).contains("1 minutos"));
    }
}
