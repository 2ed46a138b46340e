//! # relay-settings
//!
//! Configuration management with layered sources for the room relay.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`RelaySettings::default()`]
//! 2. **Settings file**: `~/.relay/settings.json` or an explicit path (deep-merged over defaults)
//! 3. **Environment variables**: `PORT`, `JWT_SECRET`, `RELAY_*`, ... (highest priority)
//!
//! After layering, [`RelaySettings::validate`] repairs values that would break
//! connection handling (for example a heartbeat slower than the read timeout).

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings_from_path, settings_path};
pub use types::*;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
