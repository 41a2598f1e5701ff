use serde::{Deserialize, Serialize};

/// One side of the bridged call
///
/// Each participant gets an independent health monitor and latency timeline;
/// the only thing shared between sides is the cross-participant turn-taking
/// comparison in the latency tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Participant {
    /// The call-center agent side
    Agent,
    /// The customer side
    Customer,
}

impl Participant {
    /// The opposite side of the call
    pub fn other(self) -> Participant {
        match self {
            Participant::Agent => Participant::Customer,
            Participant::Customer => Participant::Agent,
        }
    }

    /// Stable index for per-side storage (agent = 0, customer = 1)
    pub fn index(self) -> usize {
        match self {
            Participant::Agent => 0,
            Participant::Customer => 1,
        }
    }

    /// Both participants, in index order
    pub fn both() -> [Participant; 2] {
        [Participant::Agent, Participant::Customer]
    }
}

impl std::fmt::Display for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Participant::Agent => write!(f, "agent"),
            Participant::Customer => write!(f, "customer"),
        }
    }
}
