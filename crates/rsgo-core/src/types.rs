//! Ticker lifecycle types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ============================================================================
// Ticker
// ============================================================================

/// Watched symbol identifier (e.g. "SPY").
///
/// Symbols are normalized to upper case on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticker(String);

impl Ticker {
    /// Create a ticker, normalizing to upper case.
    ///
    /// # Errors
    /// Returns `CoreError::InvalidTicker` for empty or whitespace-containing symbols.
    pub fn new(symbol: &str) -> Result<Self, CoreError> {
        let trimmed = symbol.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidTicker(symbol.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Ticker {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ============================================================================
// TickerStatus
// ============================================================================

/// Trading-readiness lifecycle status.
///
/// ```text
/// READY -> SET -> GO -> COOLDOWN -> READY
///           ^     |
///           +-----+   (GO -> SET on weakening, SET -> READY on decay)
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TickerStatus {
    #[default]
    Ready,
    Set,
    Go,
    Cooldown,
}

impl TickerStatus {
    pub const ALL: [TickerStatus; 4] = [
        TickerStatus::Ready,
        TickerStatus::Set,
        TickerStatus::Go,
        TickerStatus::Cooldown,
    ];

    /// Whether `self -> to` is in the transition table.
    #[must_use]
    pub fn can_transition_to(self, to: TickerStatus) -> bool {
        use TickerStatus::{Cooldown, Go, Ready, Set};
        matches!(
            (self, to),
            (Ready, Set) | (Set, Ready) | (Set, Go) | (Go, Set) | (Go, Cooldown) | (Cooldown, Ready)
        )
    }

    /// Valid targets from this status.
    #[must_use]
    pub fn successors(self) -> &'static [TickerStatus] {
        match self {
            TickerStatus::Ready => &[TickerStatus::Set],
            TickerStatus::Set => &[TickerStatus::Ready, TickerStatus::Go],
            TickerStatus::Go => &[TickerStatus::Set, TickerStatus::Cooldown],
            TickerStatus::Cooldown => &[TickerStatus::Ready],
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TickerStatus::Ready => "READY",
            TickerStatus::Set => "SET",
            TickerStatus::Go => "GO",
            TickerStatus::Cooldown => "COOLDOWN",
        }
    }
}

impl fmt::Display for TickerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TickerStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "READY" => Ok(TickerStatus::Ready),
            "SET" => Ok(TickerStatus::Set),
            "GO" => Ok(TickerStatus::Go),
            "COOLDOWN" => Ok(TickerStatus::Cooldown),
            _ => Err(CoreError::InvalidStatus(s.to_string())),
        }
    }
}

// ============================================================================
// FibZone
// ============================================================================

/// Price-expansion classification used to gate READY -> SET.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FibZone {
    #[default]
    Neutral,
    Retracement,
    GoldenPocket,
    Extension,
    Exhaustion,
}

impl FibZone {
    pub const ALL: [FibZone; 5] = [
        FibZone::Neutral,
        FibZone::Retracement,
        FibZone::GoldenPocket,
        FibZone::Extension,
        FibZone::Exhaustion,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FibZone::Neutral => "NEUTRAL",
            FibZone::Retracement => "RETRACEMENT",
            FibZone::GoldenPocket => "GOLDEN_POCKET",
            FibZone::Extension => "EXTENSION",
            FibZone::Exhaustion => "EXHAUSTION",
        }
    }
}

impl fmt::Display for FibZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FibZone {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FibZone::ALL
            .into_iter()
            .find(|zone| zone.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::InvalidFibZone(s.to_string()))
    }
}

// ============================================================================
// TickerState
// ============================================================================

/// Lifecycle state of one watched ticker.
///
/// Owned by the state machine; everything handed out is a snapshot copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerState {
    pub ticker: Ticker,
    pub status: TickerStatus,
    /// Signal confidence in [0, 1].
    pub confidence: f64,
    /// Signal conviction in [0, 1].
    pub conviction: f64,
    pub fib_zone: FibZone,
    pub gamma_exposure: f64,
    /// Last mutation (Unix ms).
    pub last_update: u64,
    /// When the current status was entered (Unix ms).
    pub state_entry_time: u64,
    /// Set only while status is COOLDOWN.
    pub cooldown_until: Option<u64>,
    /// Opaque recommendation payload supplied by collaborators.
    pub recommended_action: Option<serde_json::Value>,
}

impl TickerState {
    /// Fresh READY state with zeroed readings.
    #[must_use]
    pub fn new(ticker: Ticker, now_ms: u64) -> Self {
        Self {
            ticker,
            status: TickerStatus::Ready,
            confidence: 0.0,
            conviction: 0.0,
            fib_zone: FibZone::default(),
            gamma_exposure: 0.0,
            last_update: now_ms,
            state_entry_time: now_ms,
            cooldown_until: None,
            recommended_action: None,
        }
    }

    /// Time spent in the current status.
    #[must_use]
    pub fn time_in_state_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.state_entry_time)
    }
}

/// Partial update merged into a `TickerState`.
///
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TickerUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TickerStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conviction: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fib_zone: Option<FibZone>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gamma_exposure: Option<f64>,
    /// Explicit cooldown expiry; only honored when entering or inside COOLDOWN.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_until: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_action: Option<serde_json::Value>,
}

impl TickerUpdate {
    /// Update that only changes status.
    #[must_use]
    pub fn status(status: TickerStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ============================================================================
// StateTransition
// ============================================================================

/// One entry of a ticker's bounded transition history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateTransition {
    pub from: TickerStatus,
    pub to: TickerStatus,
    /// When the transition happened (Unix ms).
    pub timestamp: u64,
    pub duration_in_previous_state: u64,
    /// Whether validation was bypassed.
    pub forced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_normalizes_case() {
        let t = Ticker::new(" spy ").unwrap();
        assert_eq!(t.as_str(), "SPY");
        assert_eq!(t.to_string(), "SPY");
    }

    #[test]
    fn test_ticker_rejects_empty_and_spaces() {
        assert!(Ticker::new("").is_err());
        assert!(Ticker::new("   ").is_err());
        assert!(Ticker::new("SP Y").is_err());
    }

    #[test]
    fn test_transition_table() {
        use TickerStatus::*;
        let valid = [
            (Ready, Set),
            (Set, Ready),
            (Set, Go),
            (Go, Set),
            (Go, Cooldown),
            (Cooldown, Ready),
        ];
        for from in TickerStatus::ALL {
            for to in TickerStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    valid.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_successors_match_table() {
        for from in TickerStatus::ALL {
            for to in from.successors() {
                assert!(from.can_transition_to(*to));
            }
        }
    }

    #[test]
    fn test_status_serde_and_parse() {
        let json = serde_json::to_string(&TickerStatus::Cooldown).unwrap();
        assert_eq!(json, "\"COOLDOWN\"");
        assert_eq!("go".parse::<TickerStatus>().unwrap(), TickerStatus::Go);
        assert!("LIMBO".parse::<TickerStatus>().is_err());
    }

    #[test]
    fn test_fib_zone_parse() {
        assert_eq!(
            "golden_pocket".parse::<FibZone>().unwrap(),
            FibZone::GoldenPocket
        );
        assert_eq!("EXHAUSTION".parse::<FibZone>().unwrap(), FibZone::Exhaustion);
        assert!("moon".parse::<FibZone>().is_err());
    }

    #[test]
    fn test_new_state_defaults() {
        let state = TickerState::new(Ticker::new("QQQ").unwrap(), 42);
        assert_eq!(state.status, TickerStatus::Ready);
        assert_eq!(state.confidence, 0.0);
        assert_eq!(state.state_entry_time, 42);
        assert!(state.cooldown_until.is_none());
        assert_eq!(state.time_in_state_ms(100), 58);
    }

    #[test]
    fn test_update_deserializes_partial() {
        let update: TickerUpdate =
            serde_json::from_str(r#"{"status":"SET","confidence":0.7}"#).unwrap();
        assert_eq!(update.status, Some(TickerStatus::Set));
        assert_eq!(update.confidence, Some(0.7));
        assert!(update.conviction.is_none());
        assert!(TickerUpdate::default().is_empty());
    }
}
