use cloudweave_cloud::ResourceKind;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

const MAX_PREFIX: usize = 40;
const HASH_LEN: usize = 20;

/// Generates the ids drivers see instead of user names
///
/// Format: `<sanitised name>-<20 hex chars>`. The hex part is a UUIDv5 over
/// connection, kind, name, wall-clock nanoseconds and a process counter, so
/// repeated creates of one name never collide and the inputs can be traced
/// back from logs.
#[derive(Debug, Default)]
pub struct IdGenerator {
    counter: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(&self, connection: &str, kind: ResourceKind, name: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let seed = format!("{}/{}/{}/{}/{}", connection, kind, name, nanos, seq);

        let hash = Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes())
            .simple()
            .to_string();
        format!("{}-{}", prefix(kind, name), &hash[..HASH_LEN])
    }
}

/// Lower-case alphanumerics and single dashes, starting with a letter
fn prefix(kind: ResourceKind, name: &str) -> String {
    let mut out = String::with_capacity(MAX_PREFIX);
    for c in name.chars().flat_map(char::to_lowercase) {
        if out.len() >= MAX_PREFIX {
            break;
        }
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_end_matches('-');
    match trimmed.chars().next() {
        Some(c) if c.is_ascii_lowercase() => trimmed.to_string(),
        Some(_) => format!("{}-{}", kind, trimmed),
        None => kind.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_format() {
        let id_gen = IdGenerator::new();
        let id = id_gen.generate("aws-seoul", ResourceKind::Vpc, "My_VPC/01");
        assert!(id.starts_with("my-vpc-01-"));
        assert_eq!(id.len(), "my-vpc-01-".len() + HASH_LEN);
        assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }

    #[test]
    fn test_prefix_edge_cases() {
        assert_eq!(prefix(ResourceKind::Vm, "9lives"), "vm-9lives");
        assert_eq!(prefix(ResourceKind::Disk, "___"), "disk");
        assert!(prefix(ResourceKind::Vm, &"a".repeat(100)).len() <= MAX_PREFIX);
    }

    #[test]
    fn test_unique_for_same_inputs() {
        let id_gen = IdGenerator::new();
        let ids: HashSet<String> = (0..1000)
            .map(|_| id_gen.generate("c", ResourceKind::Vm, "same"))
            .collect();
        assert_eq!(ids.len(), 1000);
    }
}
