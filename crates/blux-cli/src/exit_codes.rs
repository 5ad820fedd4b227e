//! Process exit codes. Part of the public contract of `blux-system`.

pub const SUCCESS: i32 = 0;
pub const VERIFY_FAILED: i32 = 1; // Replay report summary is not ok
pub const CONFIG_ERROR: i32 = 2; // Unreadable input, malformed document, bad arguments
