/// Application name
pub const APP_NAME: &str = "BancaMessenger";

/// Status text given to users who never set one
pub const DEFAULT_STATUS_TEXT: &str = "Hey, I'm using BancaMessenger!";

/// Path of the WebSocket endpoint
pub const WS_PATH: &str = "/ws";

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 5000;

/// Maximum message content length in characters
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Maximum size of one inbound WebSocket text frame in bytes (64 KiB)
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Minimum password length accepted at registration
pub const MIN_PASSWORD_LEN: usize = 8;

/// Number of digits in a verification code
pub const VERIFICATION_CODE_LEN: usize = 6;

/// Default lifetime of a verification code in seconds (10 minutes)
pub const DEFAULT_VERIFICATION_CODE_TTL_SECS: u64 = 600;
