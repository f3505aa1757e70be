//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Components receive their sub-config at construction time — there is no
//! process-wide mutable configuration state.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// HotkeyConfig
// ---------------------------------------------------------------------------

/// Push-to-talk trigger key binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotkeyConfig {
    /// Trigger key name (e.g. `"RightCtrl"`, `"F9"`).
    /// Parsed with [`crate::event::parse_key`].
    pub trigger_key: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            trigger_key: "RightCtrl".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for audio capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Target sample rate in Hz of the buffer handed to the transcriber
    /// (Whisper requires 16 000).
    pub sample_rate: u32,
    /// Number of channels in the captured buffer (always downmixed to 1).
    pub channels: u16,
    /// Preferred hardware block size in frames.
    pub block_size: u32,
    /// Gain multiplier applied to captured samples, clipped to `[-1.0, 1.0]`.
    pub gain: f32,
    /// Minimum recording length in seconds; shorter sessions are discarded
    /// without invoking the transcriber.
    pub min_recording_secs: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            block_size: 1024,
            gain: 2.0,
            min_recording_secs: 1.5,
        }
    }
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Settings for the Whisper STT engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    /// GGML model name / file stem (e.g. `"large-v3"`).
    pub model: String,
    /// Language hint as an ISO-639-1 code, or `"auto"` for Whisper's
    /// built-in language detection.
    pub language: String,
    /// Beam-search width; higher is more accurate but slower.
    pub beam_size: i32,
    /// Attempt GPU-accelerated inference when available.
    pub use_gpu: bool,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: "large-v3".into(),
            language: "en".into(),
            beam_size: 5,
            use_gpu: true,
        }
    }
}

// ---------------------------------------------------------------------------
// DeliveryOrder
// ---------------------------------------------------------------------------

/// Policy for releasing completed transcriptions when several sessions are
/// pending delivery at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryOrder {
    /// Deliver every result, in session-close order. Never drops.
    Fifo,
    /// Discard a completed result when a newer session is already queued
    /// behind it; only the newest pending result is pasted.
    LatestWins,
}

impl Default for DeliveryOrder {
    fn default() -> Self {
        Self::Fifo
    }
}

// ---------------------------------------------------------------------------
// DeliveryConfig
// ---------------------------------------------------------------------------

/// Settings for clipboard-paste text delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Fixed delay in milliseconds between setting the clipboard and the
    /// synthetic paste. `0` enables environment detection.
    pub paste_delay_ms: u64,
    /// Delay used instead when `paste_delay_ms` is `0` and an active
    /// remote-desktop session is detected (clipboard sync over RDP is slow).
    pub rdp_paste_delay_ms: u64,
    /// Ordering policy for queued deliveries.
    pub order: DeliveryOrder,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            paste_delay_ms: 0,
            rdp_paste_delay_ms: 200,
            order: DeliveryOrder::Fifo,
        }
    }
}

// ---------------------------------------------------------------------------
// HistoryConfig
// ---------------------------------------------------------------------------

/// Settings for the persisted transcription history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Append each successfully delivered transcription to a daily JSON log.
    pub enabled: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use pushscribe::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Trigger key binding.
    pub hotkey: HotkeyConfig,
    /// Audio capture settings.
    pub audio: AudioConfig,
    /// STT engine settings.
    pub stt: SttConfig,
    /// Clipboard-paste delivery settings.
    pub delivery: DeliveryConfig,
    /// Transcription history settings.
    pub history: HistoryConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Verify that a default `AppConfig` can be serialised to TOML and
    /// deserialised back without any data loss.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.hotkey.trigger_key, loaded.hotkey.trigger_key);
        assert_eq!(original.audio.sample_rate, loaded.audio.sample_rate);
        assert_eq!(original.audio.channels, loaded.audio.channels);
        assert_eq!(original.audio.gain, loaded.audio.gain);
        assert_eq!(
            original.audio.min_recording_secs,
            loaded.audio.min_recording_secs
        );
        assert_eq!(original.stt.model, loaded.stt.model);
        assert_eq!(original.stt.language, loaded.stt.language);
        assert_eq!(original.stt.beam_size, loaded.stt.beam_size);
        assert_eq!(original.delivery.paste_delay_ms, loaded.delivery.paste_delay_ms);
        assert_eq!(original.delivery.order, loaded.delivery.order);
        assert_eq!(original.history.enabled, loaded.history.enabled);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        let default = AppConfig::default();

        assert_eq!(config.hotkey.trigger_key, default.hotkey.trigger_key);
        assert_eq!(config.audio.sample_rate, default.audio.sample_rate);
        assert_eq!(config.stt.model, default.stt.model);
        assert_eq!(config.delivery.order, default.delivery.order);
    }

    /// Verify default values match the documented contract.
    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.hotkey.trigger_key, "RightCtrl");
        assert_eq!(cfg.audio.sample_rate, 16_000);
        assert_eq!(cfg.audio.channels, 1);
        assert_eq!(cfg.audio.gain, 2.0);
        assert_eq!(cfg.audio.min_recording_secs, 1.5);
        assert_eq!(cfg.stt.language, "en");
        assert_eq!(cfg.stt.beam_size, 5);
        assert_eq!(cfg.delivery.paste_delay_ms, 0);
        assert_eq!(cfg.delivery.rdp_paste_delay_ms, 200);
        assert_eq!(cfg.delivery.order, DeliveryOrder::Fifo);
        assert!(cfg.history.enabled);
    }

    /// Verify that modified non-default values survive a round trip.
    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.hotkey.trigger_key = "F9".into();
        cfg.audio.gain = 1.0;
        cfg.audio.min_recording_secs = 0.8;
        cfg.stt.language = "pl".into();
        cfg.stt.model = "base".into();
        cfg.delivery.paste_delay_ms = 50;
        cfg.delivery.order = DeliveryOrder::LatestWins;
        cfg.history.enabled = false;

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.hotkey.trigger_key, "F9");
        assert_eq!(loaded.audio.gain, 1.0);
        assert_eq!(loaded.audio.min_recording_secs, 0.8);
        assert_eq!(loaded.stt.language, "pl");
        assert_eq!(loaded.stt.model, "base");
        assert_eq!(loaded.delivery.paste_delay_ms, 50);
        assert_eq!(loaded.delivery.order, DeliveryOrder::LatestWins);
        assert!(!loaded.history.enabled);
    }
}
