pub mod asset;
pub mod positions;
pub mod store;

use serde::{Deserialize, Serialize};

use self::asset::Asset;

pub const MIN_SLOTS: usize = 5;
pub const MAX_SLOTS: usize = 50;
pub const DEFAULT_SLOTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub ordinal: usize,
    pub asset: Option<Asset>,
    pub label: String,
    pub position: Option<u32>,
}

impl Slot {
    /// Empty slot seeded with the identity position `ordinal + 1`.
    pub fn seeded(ordinal: usize) -> Self {
        Self {
            ordinal,
            asset: None,
            label: String::new(),
            position: Some(ordinal as u32 + 1),
        }
    }

    pub fn is_filled(&self) -> bool {
        self.asset.is_some() && self.position.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Embed the target inline.
    #[default]
    Mirror,
    /// Redirect to the target.
    Jump,
}

impl DeliveryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryMode::Mirror => "mirror",
            DeliveryMode::Jump => "jump",
        }
    }
}

impl std::str::FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mirror" => Ok(DeliveryMode::Mirror),
            "jump" => Ok(DeliveryMode::Jump),
            other => Err(format!("Unknown delivery mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub title: String,
    pub failure_message: String,
    pub target_url: String,
    pub delivery_mode: DeliveryMode,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            title: "Secret Puzzle".to_string(),
            failure_message: "Wrong again? Try harder!".to_string(),
            target_url: String::new(),
            delivery_mode: DeliveryMode::Mirror,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_mode_parse_and_wire_names() {
        assert_eq!("Mirror".parse::<DeliveryMode>().unwrap(), DeliveryMode::Mirror);
        assert_eq!(" jump ".parse::<DeliveryMode>().unwrap(), DeliveryMode::Jump);
        assert!("teleport".parse::<DeliveryMode>().is_err());
        assert_eq!(DeliveryMode::Jump.as_str(), "jump");
        assert_eq!(
            serde_json::to_string(&DeliveryMode::Mirror).unwrap(),
            "\"mirror\""
        );
    }

    #[test]
    fn test_configuration_defaults() {
        let config = Configuration::default();
        assert_eq!(config.title, "Secret Puzzle");
        assert_eq!(config.failure_message, "Wrong again? Try harder!");
        assert!(config.target_url.is_empty());
        assert_eq!(config.delivery_mode, DeliveryMode::Mirror);
    }
}
