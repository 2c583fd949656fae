//! Password-prompt classification
//!
//! Remote hosts phrase their interactive password prompts in many languages
//! and scripts, and some mask the prompt itself. The negotiator needs a yes/no
//! answer per prompt, so the heuristics live here as a pure function over the
//! prompt text and echo flag, separate from the negotiation state machine.

/// Password indicators across the languages the fleet has been seen to run.
/// Matched case-insensitively as substrings.
const PASSWORD_LEXICON: &[&str] = &[
    "password",
    "senha",
    "contraseña",
    "mot de passe",
    "kennwort",
    "пароль",
    "密码",
    "密碼",
    "パスワード",
    "암호",
];

/// Classify one interactive-authentication prompt.
///
/// A prompt is password-like when its echo flag is off (hidden input), when
/// its text carries a password indicator from the fixed lexicon, or when the
/// text contains a masking pattern of repeated asterisks.
pub fn is_password_prompt(text: &str, echo: bool) -> bool {
    if !echo {
        return true;
    }

    let lowered = text.to_lowercase();
    if lowered.contains("**") {
        return true;
    }

    PASSWORD_LEXICON
        .iter()
        .any(|indicator| lowered.contains(indicator))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_prompt_matches() {
        assert!(is_password_prompt("Password:", true));
        assert!(is_password_prompt("password for root@host:", true));
    }

    #[test]
    fn spanish_prompt_matches() {
        assert!(is_password_prompt("Contraseña:", true));
    }

    #[test]
    fn echo_off_is_password_like_regardless_of_text() {
        assert!(is_password_prompt("Password: ", false));
        assert!(is_password_prompt("", false));
    }

    #[test]
    fn two_factor_prompt_is_not_password_like() {
        assert!(!is_password_prompt("Enter 2FA code:", true));
        assert!(!is_password_prompt("Verification code:", true));
    }

    #[test]
    fn lexicon_covers_other_languages() {
        assert!(is_password_prompt("Senha:", true));
        assert!(is_password_prompt("Mot de passe :", true));
        assert!(is_password_prompt("Kennwort eingeben:", true));
        assert!(is_password_prompt("Пароль:", true));
        assert!(is_password_prompt("请输入密码:", true));
        assert!(is_password_prompt("密碼:", true));
        assert!(is_password_prompt("パスワードを入力してください:", true));
        assert!(is_password_prompt("암호 입력:", true));
    }

    #[test]
    fn masking_pattern_matches() {
        assert!(is_password_prompt("******:", true));
        assert!(!is_password_prompt("* note *", true));
    }

    #[test]
    fn case_is_ignored() {
        assert!(is_password_prompt("PASSWORD:", true));
        assert!(is_password_prompt("CONTRASEÑA:", true));
    }
}
