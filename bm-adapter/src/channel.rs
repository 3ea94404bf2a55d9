//! Channel configuration and the read-only channel registry.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Channel type code used in webhook routes and logs.
pub const CHANNEL_TYPE: &str = "BM";

/// Config key for the vendor account username.
pub const CONFIG_USERNAME: &str = "username";

/// Config key for the vendor account password.
pub const CONFIG_PASSWORD: &str = "password";

/// Config key for the vendor API key.
pub const CONFIG_API_KEY: &str = "api_key";

/// Per-tenant channel configuration.
///
/// Owned by whoever loads configuration; the adapter only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub uuid: Uuid,
    /// Sender address registered with the vendor.
    pub address: String,
    /// ISO 3166-1 alpha-2 country code, e.g. `US`.
    pub country: String,
    #[serde(default)]
    pub config: HashMap<String, String>,
}

impl Channel {
    pub fn new(uuid: Uuid, address: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            uuid,
            address: address.into(),
            country: country.into(),
            config: HashMap::new(),
        }
    }

    /// Builder-style config setter.
    pub fn with_config(mut self, key: &str, value: impl Into<String>) -> Self {
        self.config.insert(key.to_string(), value.into());
        self
    }

    /// Look up a string config value, falling back to `default` when unset.
    pub fn string_config_for_key(&self, key: &str, default: &str) -> String {
        self.config
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }
}

/// Channels known to this process, keyed by UUID.
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    channels: Arc<HashMap<Uuid, Arc<Channel>>>,
}

impl ChannelRegistry {
    pub fn new(channels: Vec<Channel>) -> Self {
        let channels = channels
            .into_iter()
            .map(|c| (c.uuid, Arc::new(c)))
            .collect();
        Self {
            channels: Arc::new(channels),
        }
    }

    pub fn get(&self, uuid: &Uuid) -> Option<Arc<Channel>> {
        self.channels.get(uuid).cloned()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_config_for_key() {
        let channel = Channel::new(Uuid::new_v4(), "2020", "US").with_config(CONFIG_USERNAME, "bob");

        assert_eq!(channel.string_config_for_key(CONFIG_USERNAME, ""), "bob");
        assert_eq!(channel.string_config_for_key(CONFIG_PASSWORD, ""), "");
        assert_eq!(channel.string_config_for_key(CONFIG_API_KEY, "fallback"), "fallback");
    }

    #[test]
    fn test_channel_deserializes_without_config() {
        let json = r#"{"uuid":"8eb23e93-5ecb-45ba-b726-3b064e0c56ab","address":"2020","country":"RW"}"#;
        let channel: Channel = serde_json::from_str(json).unwrap();

        assert_eq!(channel.country, "RW");
        assert!(channel.config.is_empty());
    }

    #[test]
    fn test_registry_lookup() {
        let uuid = Uuid::new_v4();
        let registry = ChannelRegistry::new(vec![Channel::new(uuid, "2020", "US")]);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&uuid).unwrap().address, "2020");
        assert!(registry.get(&Uuid::new_v4()).is_none());
    }
}
