//! Internet reachability state

use serde::{Deserialize, Serialize};

/// Whether a validated, internet-capable network is currently reachable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    /// A validated network with internet capability is up
    Available,
    /// No such network; also the fallback when probing fails
    #[default]
    Lost,
}

impl ConnectivityState {
    pub fn from_reachable(reachable: bool) -> Self {
        if reachable {
            ConnectivityState::Available
        } else {
            ConnectivityState::Lost
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ConnectivityState::Available)
    }
}

impl std::fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectivityState::Available => write!(f, "available"),
            ConnectivityState::Lost => write!(f, "lost"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_lost() {
        assert_eq!(ConnectivityState::default(), ConnectivityState::Lost);
    }

    #[test]
    fn test_from_reachable() {
        assert!(ConnectivityState::from_reachable(true).is_available());
        assert!(!ConnectivityState::from_reachable(false).is_available());
    }
}
