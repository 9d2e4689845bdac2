//! Device profile: a deterministic function of host capabilities and
//! screen dimensions into a slot/cadence configuration (spec.md §4.5).

use serde::{Deserialize, Serialize};

use crate::model::SourceOfTruth;

/// Host facts the embedder gathers (from `navigator`, `matchMedia`, the
/// presence of `window.showSaveFilePicker`, etc. in the browser host; a
/// native embedder supplies equivalent stand-ins). This crate never reads
/// these itself — detection lives in the host, this module only computes
/// the configuration that follows from them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostCapabilities {
    pub has_touch: bool,
    pub is_mobile_user_agent: bool,
    pub is_tablet_user_agent: bool,
    pub screen_width: u32,
    pub has_save_picker: bool,
}

/// Threshold below which a touch screen counts as "medium" for the
/// `gitOnlyMode` rule (spec.md §4.5: "touch AND medium screen").
const MEDIUM_SCREEN_MAX_WIDTH: u32 = 1024;

/// Resolved configuration derived from `HostCapabilities`. Stored verbatim
/// on each `Universe` as `deviceConfig` (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfile {
    pub git_only_mode: bool,
    pub source_of_truth: SourceOfTruth,
    pub enable_local_file_storage: bool,
    pub auto_save_frequency_ms: u32,
    pub compact_interface: bool,
    pub touch_optimized_ui: bool,
}

impl DeviceProfile {
    /// Compute the profile for a set of host capabilities. Pure and
    /// deterministic; the embedder is responsible for calling this again
    /// whenever capabilities change (e.g. after rotation) and feeding the
    /// result into `UniverseManager::apply_device_profile`.
    pub fn detect(caps: HostCapabilities) -> Self {
        let is_mobile = caps.is_mobile_user_agent;
        let is_tablet = caps.is_tablet_user_agent;
        let medium_screen = caps.screen_width <= MEDIUM_SCREEN_MAX_WIDTH;

        let git_only_mode = is_mobile
            || is_tablet
            || !caps.has_save_picker
            || (caps.has_touch && medium_screen);

        let source_of_truth = if git_only_mode { SourceOfTruth::Git } else { SourceOfTruth::Local };
        let enable_local_file_storage = !git_only_mode && caps.has_save_picker;
        let auto_save_frequency_ms = if is_mobile { 2000 } else { 1000 };

        Self {
            git_only_mode,
            source_of_truth,
            enable_local_file_storage,
            auto_save_frequency_ms,
            compact_interface: is_mobile,
            touch_optimized_ui: caps.has_touch,
        }
    }

    /// Conservative fallback used at bootstrap before the host has reported
    /// real capabilities (spec.md §4.3 "safe normalizer"): assumes a
    /// desktop-shaped device so startup never wrongly forces Git-only mode
    /// before the real profile arrives.
    pub fn conservative_default() -> Self {
        Self::detect(HostCapabilities {
            has_touch: false,
            is_mobile_user_agent: false,
            is_tablet_user_agent: false,
            screen_width: 1920,
            has_save_picker: true,
        })
    }

    /// Cadence for the Manager's health watchdog: `autoSaveFrequency × 60`
    /// (spec.md §4.3, §9 open question (b) — preserved as specified).
    pub fn health_watchdog_interval_ms(&self) -> u64 {
        self.auto_save_frequency_ms as u64 * 60
    }
}
