// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::physics::{
    dynamic_aabb_tree::SiblingStrategy,
    response_table::{CollisionCategory, PairResponse, ResponseTable},
};

/// Response for one unordered pair of categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairRule<C> {
    pub a: C,
    pub b: C,
    pub response: PairResponse,
}

/// Tuning for a [`CollisionWorld`](crate::CollisionWorld).
///
/// Every field may be omitted from a TOML file:
///
/// ```toml
/// inflate_scale = 1.2
/// restitution = 0.8
/// sibling_strategy = "greedy"
///
/// [[rules]]
/// a = "bullet"
/// b = "bullet"
/// response = "ignore"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig<C> {
    /// Scale applied to tight boxes before they are stored in a tree.
    pub inflate_scale: f32,
    /// 1 keeps the bounce elastic, 0 kills the approach velocity.
    pub restitution: f32,
    pub sibling_strategy: SiblingStrategy,
    /// Response for category pairs without a rule.
    pub default_response: PairResponse,
    pub rules: Vec<PairRule<C>>,
}

impl<C> Default for CollisionConfig<C> {
    fn default() -> Self {
        Self {
            inflate_scale: 1.1,
            restitution: 1.0,
            sibling_strategy: SiblingStrategy::default(),
            default_response: PairResponse::default(),
            rules: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Deserialization Error: {0}")]
    Deserialize(#[from] toml::de::Error),

    #[error("Serialization Error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid collision config: {0}")]
    Invalid(String),
}

impl<C> CollisionConfig<C> {
    pub fn with_rule(mut self, a: C, b: C, response: PairResponse) -> Self {
        self.rules.push(PairRule { a, b, response });
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.inflate_scale.is_finite() || self.inflate_scale < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "inflate_scale must be at least 1, got {}",
                self.inflate_scale
            )));
        }
        if !self.restitution.is_finite() || self.restitution < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "restitution must be finite and non-negative, got {}",
                self.restitution
            )));
        }
        Ok(())
    }
}

impl<C: CollisionCategory> CollisionConfig<C> {
    /// Rules are applied in order, so a later rule for the same pair wins.
    pub fn response_table(&self) -> ResponseTable<C> {
        let mut table = ResponseTable::new(self.default_response);
        for rule in &self.rules {
            table.set(rule.a, rule.b, rule.response);
        }
        table
    }
}

impl<C: DeserializeOwned> CollisionConfig<C> {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: CollisionConfig<C> = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a config from a specified file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Falls back to defaults when the file is missing or broken.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!(
                    "Failed to load collision config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }
}

impl<C: Serialize> CollisionConfig<C> {
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Saves the config to a specified file path, ensuring the directory exists.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = self.to_toml_string()?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    enum Layer {
        Ship,
        Rock,
        Bullet,
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = CollisionConfig::<Layer>::from_toml_str("").unwrap();
        assert_eq!(config, CollisionConfig::default());
        assert_eq!(config.inflate_scale, 1.1);
        assert_eq!(config.sibling_strategy, SiblingStrategy::BestFirst);
    }

    #[test]
    fn parses_rules_and_strategy() {
        let content = r#"
            restitution = 0.5
            sibling_strategy = "exhaustive"
            default_response = "notify"

            [[rules]]
            a = "bullet"
            b = "bullet"
            response = "ignore"

            [[rules]]
            a = "rock"
            b = "ship"
            response = "bounce"
        "#;
        let config = CollisionConfig::<Layer>::from_toml_str(content).unwrap();
        assert_eq!(config.restitution, 0.5);
        assert_eq!(config.sibling_strategy, SiblingStrategy::Exhaustive);
        assert_eq!(config.rules.len(), 2);

        let table = config.response_table();
        assert_eq!(table.get(Layer::Bullet, Layer::Bullet), PairResponse::Ignore);
        assert_eq!(table.get(Layer::Ship, Layer::Rock), PairResponse::Bounce);
        assert_eq!(table.get(Layer::Ship, Layer::Bullet), PairResponse::Notify);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let shrink = CollisionConfig::<Layer>::from_toml_str("inflate_scale = 0.5");
        assert!(matches!(shrink, Err(ConfigError::Invalid(_))));

        let negative = CollisionConfig::<Layer>::from_toml_str("restitution = -1.0");
        assert!(matches!(negative, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_unknown_category() {
        let content = r#"
            [[rules]]
            a = "comet"
            b = "ship"
            response = "ignore"
        "#;
        let result = CollisionConfig::<Layer>::from_toml_str(content);
        assert!(matches!(result, Err(ConfigError::Deserialize(_))));
    }

    #[test]
    fn file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings").join("collision.toml");

        let config = CollisionConfig {
            inflate_scale: 1.25,
            sibling_strategy: SiblingStrategy::Greedy,
            ..Default::default()
        }
        .with_rule(Layer::Bullet, Layer::Ship, PairResponse::Notify);

        config.save_to_file(&path).unwrap();
        let loaded = CollisionConfig::<Layer>::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_falls_back() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.toml");

        assert!(matches!(
            CollisionConfig::<Layer>::load_from_file(&missing),
            Err(ConfigError::Io(_))
        ));
        assert_eq!(
            CollisionConfig::<Layer>::load_or_default(&missing),
            CollisionConfig::default()
        );
    }
}
