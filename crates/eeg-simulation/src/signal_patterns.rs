//! Pre-defined EEG rhythm profiles for realistic simulation

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// One sinusoidal rhythm, amplitude in microvolts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RhythmComponent {
    pub frequency_hz: f32,
    pub amplitude: f32,
}

impl RhythmComponent {
    pub const fn new(frequency_hz: f32, amplitude: f32) -> Self {
        Self {
            frequency_hz,
            amplitude,
        }
    }

    /// Whether the rhythm lies in the 8-13 Hz alpha band
    pub fn is_alpha(&self) -> bool {
        (8.0..=13.0).contains(&self.frequency_hz)
    }

    /// Value at `time` seconds with a per-channel phase offset in radians
    pub fn value_at(&self, time: f64, phase: f64) -> f64 {
        self.amplitude as f64 * (2.0 * PI * self.frequency_hz as f64 * time + phase).sin()
    }
}

/// Predefined mental-state rhythm mixtures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RhythmProfile {
    /// Eyes-closed rest, dominant alpha
    #[default]
    Relaxed,
    /// Task engagement, dominant beta with suppressed alpha
    Focused,
    /// Low vigilance, dominant theta and delta
    Drowsy,
    /// User-supplied mixture
    Custom { components: Vec<RhythmComponent> },
}

impl RhythmProfile {
    /// Rhythms making up the profile
    pub fn components(&self) -> Vec<RhythmComponent> {
        match self {
            RhythmProfile::Relaxed => vec![
                RhythmComponent::new(2.0, 8.0),
                RhythmComponent::new(6.0, 6.0),
                RhythmComponent::new(10.0, 25.0),
                RhythmComponent::new(20.0, 4.0),
            ],
            RhythmProfile::Focused => vec![
                RhythmComponent::new(6.0, 5.0),
                RhythmComponent::new(10.0, 6.0),
                RhythmComponent::new(18.0, 14.0),
                RhythmComponent::new(24.0, 8.0),
                RhythmComponent::new(38.0, 3.0),
            ],
            RhythmProfile::Drowsy => vec![
                RhythmComponent::new(2.0, 20.0),
                RhythmComponent::new(5.5, 22.0),
                RhythmComponent::new(9.0, 8.0),
                RhythmComponent::new(16.0, 3.0),
            ],
            RhythmProfile::Custom { components } => components.clone(),
        }
    }

    /// Get profile description
    pub fn description(&self) -> &'static str {
        match self {
            RhythmProfile::Relaxed => "Relaxed, alpha dominant",
            RhythmProfile::Focused => "Focused, beta dominant",
            RhythmProfile::Drowsy => "Drowsy, theta dominant",
            RhythmProfile::Custom { .. } => "Custom rhythm mixture",
        }
    }

    /// Common preset profiles
    pub fn presets() -> Vec<(&'static str, RhythmProfile)> {
        vec![
            ("relaxed", RhythmProfile::Relaxed),
            ("focused", RhythmProfile::Focused),
            ("drowsy", RhythmProfile::Drowsy),
        ]
    }

    /// Look up a preset by name
    pub fn from_name(name: &str) -> Option<RhythmProfile> {
        Self::presets()
            .into_iter()
            .find(|(preset, _)| preset.eq_ignore_ascii_case(name))
            .map(|(_, profile)| profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dominant(profile: &RhythmProfile) -> f32 {
        profile
            .components()
            .iter()
            .max_by(|a, b| a.amplitude.total_cmp(&b.amplitude))
            .map(|c| c.frequency_hz)
            .unwrap()
    }

    #[test]
    fn test_profiles_have_expected_dominant_rhythm() {
        assert!((8.0..=13.0).contains(&dominant(&RhythmProfile::Relaxed)));
        assert!((13.0..=30.0).contains(&dominant(&RhythmProfile::Focused)));
        assert!((4.0..8.0).contains(&dominant(&RhythmProfile::Drowsy)));
    }

    #[test]
    fn test_custom_profile_and_lookup() {
        let custom = RhythmProfile::Custom {
            components: vec![RhythmComponent::new(11.0, 3.0)],
        };
        assert_eq!(custom.components().len(), 1);
        assert!(custom.components()[0].is_alpha());

        assert_eq!(RhythmProfile::from_name("Focused"), Some(RhythmProfile::Focused));
        assert_eq!(RhythmProfile::from_name("unknown"), None);
    }

    #[test]
    fn test_component_value() {
        let component = RhythmComponent::new(1.0, 2.0);
        assert!(component.value_at(0.0, 0.0).abs() < 1e-12);
        assert!((component.value_at(0.25, 0.0) - 2.0).abs() < 1e-12);
    }
}
