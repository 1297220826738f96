//! Message sink adapter — delivers replies through Messages.app.
//!
//! The AppleScript is a fixed program that reads recipient and body from
//! its argument vector. Both values are attacker-influenced, so they are
//! never interpolated into the script text; they travel as plain argv
//! entries after a `--` terminator and AppleScript sees them verbatim.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::error::DeliveryError;

/// Fixed send program. `item 1 of argv` is the recipient, `item 2` the body.
const SEND_SCRIPT: &str = r#"on run argv
    set theRecipient to item 1 of argv
    set theBody to item 2 of argv
    tell application "Messages"
        set targetService to 1st account whose service type = iMessage
        set targetBuddy to participant theRecipient of targetService
        send theBody to targetBuddy
    end tell
end run"#;

/// Outbound delivery contract consumed by the relay loop.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Transmit `body` to `recipient` through the external channel.
    async fn deliver(&self, recipient: &str, body: &str) -> Result<(), DeliveryError>;
}

/// `MessageSink` that shells out to `osascript`.
pub struct OsaScriptSink {
    program: String,
}

impl OsaScriptSink {
    pub fn new() -> Self {
        Self {
            program: "osascript".to_string(),
        }
    }
}

impl Default for OsaScriptSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageSink for OsaScriptSink {
    async fn deliver(&self, recipient: &str, body: &str) -> Result<(), DeliveryError> {
        let output = Command::new(&self.program)
            .args(send_args(recipient, body))
            .output()
            .await
            .map_err(|e| DeliveryError::Spawn(e.to_string()))?;

        if !output.status.success() {
            return Err(DeliveryError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!(recipient = %recipient, preview = %preview(body), "Reply sent");
        Ok(())
    }
}

/// Argument vector for one send. The script is constant; only argv varies.
fn send_args(recipient: &str, body: &str) -> Vec<String> {
    vec![
        "-e".to_string(),
        SEND_SCRIPT.to_string(),
        "--".to_string(),
        recipient.to_string(),
        body.to_string(),
    ]
}

/// First 50 characters of a body, for log lines.
fn preview(body: &str) -> String {
    body.chars().take(50).collect()
}
