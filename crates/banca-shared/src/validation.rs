//! Input checks shared by the HTTP API and the WebSocket handler.

use crate::constants::{MAX_MESSAGE_LEN, MIN_PASSWORD_LEN, VERIFICATION_CODE_LEN};

/// Accepts `local@domain.tld`: no whitespace, exactly one `@`, and a dot in
/// the domain with characters on both sides.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    match domain.rfind('.') {
        Some(dot) => dot > 0 && dot + 1 < domain.len(),
        None => false,
    }
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    Ok(())
}

/// Returns the content unchanged if it can be stored as a message.
pub fn validate_message_content(content: &str) -> Result<&str, String> {
    if content.trim().is_empty() {
        return Err("Message content is empty".to_string());
    }
    if content.chars().count() > MAX_MESSAGE_LEN {
        return Err(format!(
            "Message content exceeds {MAX_MESSAGE_LEN} characters"
        ));
    }
    Ok(content)
}

pub fn is_well_formed_code(code: &str) -> bool {
    code.len() == VERIFICATION_CODE_LEN && code.bytes().all(|b| b.is_ascii_digit())
}
