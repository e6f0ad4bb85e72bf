//! Status types for pre-orders.

use serde::{Deserialize, Serialize};

/// Pre-order sub-state as reported by the backend.
///
/// Informational only: the cache never branches on it, it just carries it
/// through to whatever renders the pre-order button. Unknown values are kept
/// verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PreorderPhase {
    Pending,
    Confirmed,
    Ready,
    Other(String),
}

impl PreorderPhase {
    /// Get the backend's string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Ready => "ready",
            Self::Other(s) => s,
        }
    }
}

impl std::fmt::Display for PreorderPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for PreorderPhase {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "confirmed" => Self::Confirmed,
            "ready" | "ready_for_pickup" => Self::Ready,
            _ => Self::Other(s.to_string()),
        }
    }
}

impl From<String> for PreorderPhase {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<PreorderPhase> for String {
    fn from(phase: PreorderPhase) -> Self {
        match phase {
            PreorderPhase::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_known_phases_parse_case_insensitively() {
        assert_eq!(PreorderPhase::from("Pending"), PreorderPhase::Pending);
        assert_eq!(PreorderPhase::from("CONFIRMED"), PreorderPhase::Confirmed);
        assert_eq!(PreorderPhase::from("ready_for_pickup"), PreorderPhase::Ready);
    }

    #[test]
    fn test_unknown_phase_kept_verbatim() {
        let phase = PreorderPhase::from("awaiting_stock");
        assert_eq!(phase, PreorderPhase::Other("awaiting_stock".to_string()));
        assert_eq!(phase.to_string(), "awaiting_stock");
    }

    #[test]
    fn test_serde_uses_plain_string() {
        let json = serde_json::to_string(&PreorderPhase::Confirmed).unwrap();
        assert_eq!(json, "\"confirmed\"");
        let back: PreorderPhase = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(back, PreorderPhase::Pending);
    }
}
