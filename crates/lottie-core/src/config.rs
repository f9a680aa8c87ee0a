//! Options controlling how a document becomes an animated layer tree.

use serde::Deserialize;

/// What to do with a top-level branch whose animations cannot be installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Fail the whole setup and leave nothing bound.
    #[default]
    Abort,
    /// Keep the branch, frozen at the start frame, without animations.
    StaticFallback,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    pub fallback: FallbackPolicy,
    /// Upper bound on the copies a single repeater produces.
    pub max_repeater_copies: usize,
    /// Upper bound on the layers of the whole tree. Nested repeaters multiply,
    /// so this is what keeps a document's layer count in check.
    pub max_layers: usize,
    /// Replaces the document's frame rate when set.
    pub frame_rate_override: Option<f32>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            fallback: FallbackPolicy::Abort,
            max_repeater_copies: 256,
            max_layers: 65_536,
            frame_rate_override: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let options: BuildOptions = serde_json::from_str(r#"{ "fallback": "static_fallback" }"#).unwrap();
        assert_eq!(options.fallback, FallbackPolicy::StaticFallback);
        assert_eq!(options.max_repeater_copies, 256);
        assert_eq!(options.max_layers, 65_536);
        assert_eq!(options.frame_rate_override, None);
    }
}
