//! Service levels, their throughput, and label translation.
//!
//! The CVS API and the console name tiers differently, and the word
//! `standard` means a different tier on each side:
//!
//! | API           | UI            | KiB/s per GiB |
//! |---------------|---------------|---------------|
//! | `basic`       | `standard`    | 16            |
//! | `standard`    | `premium`     | 64            |
//! | `extreme`     | `extreme`     | 128           |
//! | `standard-sw` | `standard-sw` | 128           |
//!
//! `standard-sw` is not an API label. Software-defined volumes report
//! `basic` with storage class `software`; they are renamed internally so the
//! throughput lookup can tell them apart from hardware `basic`.

use tracing::warn;

/// Storage class of hardware-backed volumes.
pub const HARDWARE_STORAGE_CLASS: &str = "hardware";

/// A CVS service level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceLevel {
    /// Hardware `basic` (UI `standard`).
    Basic,
    /// Hardware `standard` (UI `premium`).
    Standard,
    /// Hardware `extreme`.
    Extreme,
    /// Software-defined volumes.
    StandardSw,
}

impl ServiceLevel {
    /// All service levels.
    pub const ALL: [Self; 4] = [Self::Basic, Self::Standard, Self::Extreme, Self::StandardSw];

    /// Parses an API-side label.
    #[must_use]
    pub fn from_api_label(label: &str) -> Option<Self> {
        match label {
            "basic" => Some(Self::Basic),
            "standard" => Some(Self::Standard),
            "extreme" => Some(Self::Extreme),
            "standard-sw" => Some(Self::StandardSw),
            _ => None,
        }
    }

    /// Parses a UI-side label.
    #[must_use]
    pub fn from_ui_label(label: &str) -> Option<Self> {
        match label {
            "standard" => Some(Self::Basic),
            "premium" => Some(Self::Standard),
            "extreme" => Some(Self::Extreme),
            "standard-sw" => Some(Self::StandardSw),
            _ => None,
        }
    }

    /// API-side label.
    #[must_use]
    pub const fn api_label(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Standard => "standard",
            Self::Extreme => "extreme",
            Self::StandardSw => "standard-sw",
        }
    }

    /// UI-side label.
    #[must_use]
    pub const fn ui_label(self) -> &'static str {
        match self {
            Self::Basic => "standard",
            Self::Standard => "premium",
            Self::Extreme => "extreme",
            Self::StandardSw => "standard-sw",
        }
    }

    /// Maximum write throughput per allocated GiB, in KiB/s.
    #[must_use]
    pub const fn throughput_kib_per_gib(self) -> u32 {
        match self {
            Self::Basic => 16,
            Self::Standard => 64,
            Self::Extreme | Self::StandardSw => 128,
        }
    }
}

impl std::fmt::Display for ServiceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.api_label())
    }
}

/// Translates an API label to its UI label. Unknown labels log a warning.
#[must_use]
pub fn api_to_ui(label: &str) -> Option<&'static str> {
    let translated = ServiceLevel::from_api_label(label).map(ServiceLevel::ui_label);
    if translated.is_none() {
        warn!(service_level = label, "unknown API service level");
    }
    translated
}

/// Translates a UI label to its API label. Unknown labels log a warning.
#[must_use]
pub fn ui_to_api(label: &str) -> Option<&'static str> {
    let translated = ServiceLevel::from_ui_label(label).map(ServiceLevel::api_label);
    if translated.is_none() {
        warn!(service_level = label, "unknown UI service level");
    }
    translated
}

/// Throughput for an API label, falling back to `extreme` for unknown labels.
#[must_use]
pub fn throughput_for(label: &str) -> u32 {
    ServiceLevel::from_api_label(label).map_or_else(
        || {
            warn!(service_level = label, "unknown service level, assuming extreme throughput");
            ServiceLevel::Extreme.throughput_kib_per_gib()
        },
        ServiceLevel::throughput_kib_per_gib,
    )
}

/// The tier label used for sizing: the reported level for hardware volumes,
/// `standard-sw` for everything else.
#[must_use]
pub fn effective_tier<'a>(storage_class: &str, service_level: &'a str) -> &'a str {
    if storage_class == HARDWARE_STORAGE_CLASS {
        service_level
    } else {
        ServiceLevel::StandardSw.api_label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("basic", Some("standard") ; "basic is ui standard")]
    #[test_case("standard", Some("premium") ; "standard is ui premium")]
    #[test_case("extreme", Some("extreme") ; "extreme is fixed")]
    #[test_case("standard-sw", Some("standard-sw") ; "standard-sw is fixed")]
    #[test_case("premium", None ; "ui label is not an api label")]
    #[test_case("", None ; "empty")]
    fn api_to_ui_translation(api: &str, expected: Option<&str>) {
        assert_eq!(api_to_ui(api), expected);
    }

    #[test_case("standard", Some("basic") ; "ui standard is basic")]
    #[test_case("premium", Some("standard") ; "premium is api standard")]
    #[test_case("extreme", Some("extreme") ; "extreme is fixed")]
    #[test_case("standard-sw", Some("standard-sw") ; "standard-sw is fixed")]
    #[test_case("basic", None ; "api label is not a ui label")]
    fn ui_to_api_translation(ui: &str, expected: Option<&str>) {
        assert_eq!(ui_to_api(ui), expected);
    }

    #[test]
    fn translation_round_trips_for_all_tiers() {
        for level in ServiceLevel::ALL {
            let ui = api_to_ui(level.api_label()).expect("api label known");
            assert_eq!(ui_to_api(ui), Some(level.api_label()));

            let api = ui_to_api(level.ui_label()).expect("ui label known");
            assert_eq!(api_to_ui(api), Some(level.ui_label()));
        }
    }

    #[test_case("basic", 16)]
    #[test_case("standard", 64)]
    #[test_case("extreme", 128)]
    #[test_case("standard-sw", 128)]
    #[test_case("ultra", 128 ; "unknown falls back to extreme")]
    fn throughput_table(label: &str, expected: u32) {
        assert_eq!(throughput_for(label), expected);
    }

    #[test]
    fn software_volumes_are_standard_sw() {
        assert_eq!(effective_tier("software", "basic"), "standard-sw");
        assert_eq!(effective_tier("", "extreme"), "standard-sw");
        assert_eq!(effective_tier("hardware", "basic"), "basic");
    }
}
