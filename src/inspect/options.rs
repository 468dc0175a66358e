//! Inspection settings.
//!
//! JSON shape (every field optional):
//! {
//!   "strictness": "verify"     // or "trust"
//! }

use serde::Deserialize;

/// How much the inspector checks around rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// Validate the source model before rendering and the rendered tree after.
    #[default]
    Verify,
    /// Render as given. Unresolvable references still fail the call.
    Trust,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InspectOptions {
    pub strictness: Strictness,
}

impl InspectOptions {
    pub fn trusting() -> Self {
        Self {
            strictness: Strictness::Trust,
        }
    }

    pub fn verifies(&self) -> bool {
        self.strictness == Strictness::Verify
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_verify() {
        let options: InspectOptions = serde_json::from_str("{}").unwrap();
        assert!(options.verifies());

        let options: InspectOptions = serde_json::from_str(r#"{"strictness":"trust"}"#).unwrap();
        assert_eq!(options, InspectOptions::trusting());
    }
}
