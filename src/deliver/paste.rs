//! Synthetic paste keystrokes and remote-session detection.

use enigo::{Direction, Enigo, Key, Keyboard, Settings};

use super::DeliveryError;

/// Send the platform paste chord (Cmd+V on macOS, Ctrl+V elsewhere) to the
/// focused application.
///
/// A fresh `Enigo` handle is created per call; construction is cheap and a
/// long-lived handle pins the X11 connection.
pub fn send_paste_chord() -> Result<(), DeliveryError> {
    let mut enigo = Enigo::new(&Settings::default())
        .map_err(|e| DeliveryError::PasteToolUnavailable(e.to_string()))?;

    #[cfg(target_os = "macos")]
    let modifier = Key::Meta;
    #[cfg(not(target_os = "macos"))]
    let modifier = Key::Control;

    enigo
        .key(modifier, Direction::Press)
        .map_err(|e| DeliveryError::PasteFailed(e.to_string()))?;
    let result = enigo
        .key(Key::Unicode('v'), Direction::Click)
        .map_err(|e| DeliveryError::PasteFailed(e.to_string()));
    // Release the modifier even if the 'v' failed, or it stays held down.
    let released = enigo
        .key(modifier, Direction::Release)
        .map_err(|e| DeliveryError::PasteFailed(e.to_string()));

    result.and(released)
}

/// Best-effort check for an active inbound RDP connection.
///
/// Looks for an established TCP connection on port 3389 in `ss -tnp`
/// output. Any failure (missing `ss`, non-Linux platform) reads as "not
/// remote".
pub fn remote_session_active() -> bool {
    let output = match std::process::Command::new("ss").args(["-tnp"]).output() {
        Ok(output) if output.status.success() => output,
        _ => return false,
    };
    String::from_utf8_lossy(&output.stdout).contains(":3389")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Must never panic or hang regardless of the host environment.
    #[test]
    fn remote_session_check_is_best_effort() {
        let _ = remote_session_active();
    }
}
