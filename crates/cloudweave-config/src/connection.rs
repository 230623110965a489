//! Connection catalog

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One named connection to a provider region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub name: String,

    /// Provider name, matched case-insensitively against driver factories
    pub provider: String,

    pub region: String,

    #[serde(default)]
    pub zone: String,

    /// Reference to credentials kept outside this file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl ConnectionConfig {
    pub fn new(
        name: impl Into<String>,
        provider: impl Into<String>,
        region: impl Into<String>,
        zone: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            region: region.into(),
            zone: zone.into(),
            credential: None,
        }
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| ConfigError::InvalidConnection {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        if self.provider.trim().is_empty() {
            return Err(invalid("provider is empty"));
        }
        if self.region.trim().is_empty() {
            return Err(invalid("region is empty"));
        }
        Ok(())
    }
}

/// Connections indexed by name
#[derive(Debug, Clone, Default)]
pub struct ConnectionCatalog {
    connections: BTreeMap<String, ConnectionConfig>,
}

impl ConnectionCatalog {
    pub fn new(connections: Vec<ConnectionConfig>) -> Result<Self> {
        let mut catalog = Self::default();
        for conn in connections {
            catalog.insert(conn)?;
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, conn: ConnectionConfig) -> Result<()> {
        conn.validate()?;
        if self.connections.contains_key(&conn.name) {
            return Err(ConfigError::DuplicateConnection(conn.name));
        }
        self.connections.insert(conn.name.clone(), conn);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&ConnectionConfig> {
        self.connections
            .get(name)
            .ok_or_else(|| ConfigError::ConnectionNotFound(name.to_string()))
    }

    pub fn provider_name(&self, name: &str) -> Result<String> {
        Ok(self.get(name)?.provider.to_uppercase())
    }

    /// Region and zone of a connection
    pub fn region(&self, name: &str) -> Result<(String, String)> {
        let conn = self.get(name)?;
        Ok((conn.region.clone(), conn.zone.clone()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.connections.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let catalog = ConnectionCatalog::new(vec![
            ConnectionConfig::new("aws-seoul", "aws", "ap-northeast-2", "ap-northeast-2a"),
            ConnectionConfig::new("mock-1", "MOCK", "default", ""),
        ])
        .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.provider_name("aws-seoul").unwrap(), "AWS");
        assert_eq!(
            catalog.region("aws-seoul").unwrap(),
            ("ap-northeast-2".to_string(), "ap-northeast-2a".to_string())
        );
        assert!(matches!(
            catalog.get("gcp-tokyo"),
            Err(ConfigError::ConnectionNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_rejected() {
        let result = ConnectionCatalog::new(vec![
            ConnectionConfig::new("c1", "MOCK", "r1", ""),
            ConnectionConfig::new("c1", "MOCK", "r2", ""),
        ]);
        assert!(matches!(result, Err(ConfigError::DuplicateConnection(name)) if name == "c1"));
    }

    #[test]
    fn test_blank_fields_rejected() {
        let result = ConnectionCatalog::new(vec![ConnectionConfig::new("c1", " ", "r1", "")]);
        assert!(matches!(result, Err(ConfigError::InvalidConnection { .. })));
    }
}
