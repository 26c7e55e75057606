// =============================================================================
// Shared types used across the indicator service
// =============================================================================

use serde::{Deserialize, Serialize};

/// Indicator formulas the engine knows how to compute.
///
/// Names coming from disk or from older clients may not match any formula;
/// those are kept verbatim in [`IndicatorKind::Unrecognized`] so the engine can
/// log them and degrade to an empty series instead of failing the whole pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IndicatorKind {
    Sma,
    Ema,
    Wma,
    Rsi,
    Roc,
    Momentum,
    WilliamsR,
    Atr,
    Cci,
    Unrecognized(String),
}

impl IndicatorKind {
    /// Every recognised kind, in display order.
    pub const KNOWN: [IndicatorKind; 9] = [
        Self::Sma,
        Self::Ema,
        Self::Wma,
        Self::Rsi,
        Self::Roc,
        Self::Momentum,
        Self::WilliamsR,
        Self::Atr,
        Self::Cci,
    ];

    /// Parse a kind name case-insensitively. Never fails: unknown names map to
    /// `Unrecognized`.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "sma" => Self::Sma,
            "ema" => Self::Ema,
            "wma" => Self::Wma,
            "rsi" => Self::Rsi,
            "roc" => Self::Roc,
            "momentum" => Self::Momentum,
            "williams_r" => Self::WilliamsR,
            "atr" => Self::Atr,
            "cci" => Self::Cci,
            _ => Self::Unrecognized(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Sma => "sma",
            Self::Ema => "ema",
            Self::Wma => "wma",
            Self::Rsi => "rsi",
            Self::Roc => "roc",
            Self::Momentum => "momentum",
            Self::WilliamsR => "williams_r",
            Self::Atr => "atr",
            Self::Cci => "cci",
            Self::Unrecognized(name) => name,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }

    /// Whether the formula reads high/low in addition to close.
    pub fn needs_high_low(&self) -> bool {
        matches!(self, Self::Atr | Self::Cci | Self::WilliamsR)
    }

    /// Conventional look-back used when a request omits the period.
    /// The moving averages have no sensible default and return `None`.
    pub fn default_period(&self) -> Option<usize> {
        match self {
            Self::Rsi => Some(14),
            Self::Roc => Some(12),
            Self::Momentum => Some(10),
            Self::WilliamsR => Some(14),
            Self::Atr => Some(14),
            Self::Cci => Some(20),
            Self::Sma | Self::Ema | Self::Wma | Self::Unrecognized(_) => None,
        }
    }
}

impl From<String> for IndicatorKind {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<IndicatorKind> for String {
    fn from(kind: IndicatorKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user-configured request for one indicator kind at one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorDefinition {
    pub id: String,
    pub kind: IndicatorKind,
    pub period: usize,
}

impl IndicatorDefinition {
    pub fn new(id: impl Into<String>, kind: IndicatorKind, period: usize) -> Self {
        Self {
            id: id.into(),
            kind,
            period,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(IndicatorKind::parse("SMA"), IndicatorKind::Sma);
        assert_eq!(IndicatorKind::parse(" Williams_R "), IndicatorKind::WilliamsR);
        assert_eq!(IndicatorKind::parse("cci"), IndicatorKind::Cci);
    }

    #[test]
    fn unknown_names_are_kept() {
        let kind = IndicatorKind::parse("macd");
        assert_eq!(kind, IndicatorKind::Unrecognized("macd".into()));
        assert!(!kind.is_recognized());
        assert_eq!(kind.to_string(), "macd");
    }

    #[test]
    fn known_kinds_round_trip_through_their_names() {
        for kind in IndicatorKind::KNOWN {
            assert_eq!(IndicatorKind::parse(kind.as_str()), kind);
        }
    }

    #[test]
    fn definition_serialises_kind_as_plain_string() {
        let def = IndicatorDefinition::new("a", IndicatorKind::WilliamsR, 14);
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["kind"], "williams_r");

        let back: IndicatorDefinition =
            serde_json::from_str(r#"{"id":"b","kind":"bogus","period":3}"#).unwrap();
        assert_eq!(back.kind, IndicatorKind::Unrecognized("bogus".into()));
    }

    #[test]
    fn default_periods_follow_convention() {
        assert_eq!(IndicatorKind::Rsi.default_period(), Some(14));
        assert_eq!(IndicatorKind::Roc.default_period(), Some(12));
        assert_eq!(IndicatorKind::Momentum.default_period(), Some(10));
        assert_eq!(IndicatorKind::Cci.default_period(), Some(20));
        assert_eq!(IndicatorKind::Sma.default_period(), None);
    }
}
