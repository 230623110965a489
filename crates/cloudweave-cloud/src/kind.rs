//! Resource kinds

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a managed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Vpc,
    Subnet,
    #[serde(rename = "sg")]
    SecurityGroup,
    #[serde(rename = "keypair")]
    KeyPair,
    Vm,
    Disk,
    #[serde(rename = "myimage")]
    MyImage,
    Nlb,
    #[serde(rename = "filesystem")]
    FileSystem,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 9] = [
        ResourceKind::Vpc,
        ResourceKind::Subnet,
        ResourceKind::SecurityGroup,
        ResourceKind::KeyPair,
        ResourceKind::Vm,
        ResourceKind::Disk,
        ResourceKind::MyImage,
        ResourceKind::Nlb,
        ResourceKind::FileSystem,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Vpc => "vpc",
            ResourceKind::Subnet => "subnet",
            ResourceKind::SecurityGroup => "sg",
            ResourceKind::KeyPair => "keypair",
            ResourceKind::Vm => "vm",
            ResourceKind::Disk => "disk",
            ResourceKind::MyImage => "myimage",
            ResourceKind::Nlb => "nlb",
            ResourceKind::FileSystem => "filesystem",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        ResourceKind::ALL
            .into_iter()
            .find(|k| k.as_str() == lower)
            .ok_or_else(|| format!("unknown resource kind: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
        }
        assert_eq!("SG".parse::<ResourceKind>().unwrap(), ResourceKind::SecurityGroup);
        assert!("bucket".parse::<ResourceKind>().is_err());
    }
}
