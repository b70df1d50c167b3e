use serde::{Deserialize, Serialize};

/// Type of change made to a configuration artifact during a pass
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeType::Create => write!(f, "create"),
            ChangeType::Update => write!(f, "update"),
            ChangeType::Delete => write!(f, "delete"),
        }
    }
}

/// Description of an applied configuration change
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigChange {
    pub change_type: ChangeType,
    /// Backend whose config directory was touched
    pub backend: String,
    /// File name inside the backend's config directory
    pub target: String,
    pub description: String,
}

impl ConfigChange {
    pub fn new(change_type: ChangeType, backend: &str, target: &str) -> Self {
        Self {
            change_type,
            backend: backend.to_string(),
            target: target.to_string(),
            description: format!("{} {} ({})", change_type, target, backend),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_serializes_snake_case() {
        let change = ConfigChange::new(
            ChangeType::Delete,
            "systemd-networkd",
            "1-eth1-google-guest-agent.network",
        );
        let value = serde_json::to_value(&change).unwrap();
        assert_eq!(value["change_type"], "delete");
        assert_eq!(
            change.description,
            "delete 1-eth1-google-guest-agent.network (systemd-networkd)"
        );
    }
}
