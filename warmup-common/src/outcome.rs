//! Delivery outcome flags and the warmup score derived from them.

use std::fmt::{self, Display};

/// Result of sending a message and then probing the channel for what
/// happened to it.
///
/// The flags are independent: a channel may report a message as both
/// delivered and bounced if its checks disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryOutcome {
    pub delivered: bool,
    pub bounced: bool,
    pub opened: bool,
    pub spam: bool,
}

/// Per-event delivery quality, always within `[-3, 3]`.
///
/// | signal | points |
/// |---|---|
/// | delivered | +2 |
/// | bounced (only when not delivered) | -1 |
/// | opened | +1 |
/// | spam | -2 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Score(i8);

impl Score {
    pub const MIN: i8 = -3;
    pub const MAX: i8 = 3;

    #[must_use]
    pub const fn from_outcome(outcome: &DeliveryOutcome) -> Self {
        let mut score = if outcome.delivered {
            2
        } else if outcome.bounced {
            -1
        } else {
            0
        };

        if outcome.opened {
            score += 1;
        }

        if outcome.spam {
            score -= 2;
        }

        Self(score)
    }

    #[must_use]
    pub const fn value(self) -> i8 {
        self.0
    }
}

impl From<DeliveryOutcome> for Score {
    fn from(outcome: DeliveryOutcome) -> Self {
        Self::from_outcome(&outcome)
    }
}

impl From<Score> for i64 {
    fn from(score: Score) -> Self {
        Self::from(score.0)
    }
}

impl Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
