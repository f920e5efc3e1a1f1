//! Delivery status of a message.
//!
//! A message is created as [`MessageStatus::Sent`], becomes
//! [`MessageStatus::Delivered`] once it has been pushed to the recipient's
//! live channel, and [`MessageStatus::Read`] once the recipient issues a read
//! receipt. `Sent -> Read` is a valid jump (the recipient was offline and
//! read the message from history).
//!
//! Transitions only move forward. Asking for a status at or below the
//! current one is a no-op rather than an error, so a stale or duplicated
//! receipt can never downgrade a message.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Read)
    }

    /// Returns `Some(target)` if moving from `self` to `target` is a forward
    /// transition, `None` if it would keep or lower the status.
    pub fn advance(self, target: MessageStatus) -> Option<MessageStatus> {
        if target > self {
            Some(target)
        } else {
            None
        }
    }
}

impl Default for MessageStatus {
    fn default() -> Self {
        Self::Sent
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageStatus {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(Self::Sent),
            "delivered" => Ok(Self::Delivered),
            "read" => Ok(Self::Read),
            other => Err(ProtocolError::UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert_eq!(
            MessageStatus::Sent.advance(MessageStatus::Delivered),
            Some(MessageStatus::Delivered)
        );
        assert_eq!(
            MessageStatus::Delivered.advance(MessageStatus::Read),
            Some(MessageStatus::Read)
        );
        // Recipient read it from history without a live delivery.
        assert_eq!(
            MessageStatus::Sent.advance(MessageStatus::Read),
            Some(MessageStatus::Read)
        );
    }

    #[test]
    fn test_no_regression() {
        assert_eq!(MessageStatus::Read.advance(MessageStatus::Delivered), None);
        assert_eq!(MessageStatus::Read.advance(MessageStatus::Sent), None);
        assert_eq!(MessageStatus::Delivered.advance(MessageStatus::Sent), None);
    }

    #[test]
    fn test_repeat_is_noop() {
        assert_eq!(MessageStatus::Read.advance(MessageStatus::Read), None);
        assert!(MessageStatus::Read.is_terminal());
        assert!(!MessageStatus::Delivered.is_terminal());
    }

    #[test]
    fn test_parse_and_display() {
        for status in [
            MessageStatus::Sent,
            MessageStatus::Delivered,
            MessageStatus::Read,
        ] {
            assert_eq!(status.to_string().parse::<MessageStatus>().unwrap(), status);
        }
        assert!("seen".parse::<MessageStatus>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&MessageStatus::Delivered).unwrap();
        assert_eq!(json, "\"delivered\"");
    }
}
