use super::store::StoreError;
use cloudweave_cloud::Iid;
use serde::{Deserialize, Serialize};

const SEPARATOR: char = ':';

/// A persisted identity mapping
///
/// Holds the user name together with both provider-facing keys. The flat
/// `"<generated id>:<provider id>"` form exists only at the storage boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IidRecord {
    pub name: String,
    pub generated_id: String,
    pub system_id: String,
}

impl IidRecord {
    pub fn new(
        name: impl Into<String>,
        generated_id: impl Into<String>,
        system_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            generated_id: generated_id.into(),
            system_id: system_id.into(),
        }
    }

    /// IID shown to callers: `{user name, provider id}`
    pub fn user_iid(&self) -> Iid {
        Iid::new(&self.name, &self.system_id)
    }

    /// IID handed to drivers: `{generated id, provider id}`
    pub fn driver_iid(&self) -> Iid {
        Iid::new(&self.generated_id, &self.system_id)
    }

    pub(crate) fn to_stored(&self) -> String {
        format!("{}{}{}", self.generated_id, SEPARATOR, self.system_id)
    }

    /// Splits on the first separator only; provider ids such as ARNs carry their own colons
    pub(crate) fn from_stored(name: impl Into<String>, value: &str) -> Result<Self, StoreError> {
        let name = name.into();
        let (generated_id, system_id) = value
            .split_once(SEPARATOR)
            .ok_or_else(|| StoreError::Corrupt(format!("record {} has no separator", name)))?;
        Ok(Self::new(name, generated_id, system_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_views() {
        let record = IidRecord::new("web-vm", "web-vm-3f2a", "i-0abc");
        assert_eq!(record.user_iid(), Iid::new("web-vm", "i-0abc"));
        assert_eq!(record.driver_iid(), Iid::new("web-vm-3f2a", "i-0abc"));
    }

    #[test]
    fn test_arn_system_id_survives_storage() {
        let arn = "arn:aws:elasticloadbalancing:us-east-2:635484366616:loadbalancer/net/lb/1dee";
        let record = IidRecord::new("lb-01", "lb-01-9c1d", arn);
        let stored = record.to_stored();
        assert_eq!(IidRecord::from_stored("lb-01", &stored).unwrap(), record);
    }

    #[test]
    fn test_missing_separator_is_corrupt() {
        assert!(matches!(
            IidRecord::from_stored("x", "no-separator"),
            Err(StoreError::Corrupt(_))
        ));
    }
}
