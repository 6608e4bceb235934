use serde::{Deserialize, Serialize};

/// Discrete trade decision produced fresh each cycle.
///
/// `Buy`/`Sell` are spot-style open/close decisions from the conservative
/// rule set; `Long`/`Short` are directional futures entries from the
/// aggressive rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Hold,
    Buy,
    Sell,
    Long,
    Short,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hold => "hold",
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Long => "long",
            Self::Short => "short",
        }
    }

    /// True for decisions that open or close exposure.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, Self::Hold)
    }
}

/// Which rule set the classifier applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierMode {
    Conservative,
    Aggressive,
}

impl ClassifierMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Aggressive => "aggressive",
        }
    }
}
