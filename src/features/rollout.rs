use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Stable bucket in `0..100` for an organization and flag.
///
/// First eight bytes of `SHA-256("<flag_key>:<organization_id>")`, read as a
/// big-endian u64, modulo 100. The same organization lands in a different
/// bucket for each flag.
pub fn rollout_bucket(flag_key: &str, organization_id: Uuid) -> u8 {
    let mut hasher = Sha256::new();
    hasher.update(flag_key.as_bytes());
    hasher.update(b":");
    hasher.update(organization_id.hyphenated().to_string().as_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % 100) as u8
}

/// `percentage` is clamped to 0..=100; 0 admits nobody and 100 everybody
pub fn in_rollout(flag_key: &str, organization_id: Uuid, percentage: u8) -> bool {
    rollout_bucket(flag_key, organization_id) < percentage.min(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_is_deterministic() {
        let org = Uuid::parse_str("6f1c1e52-4a43-4c1c-9d0b-3f7f0d9a2b11").unwrap();
        let first = rollout_bucket("advanced_export", org);
        for _ in 0..10 {
            assert_eq!(rollout_bucket("advanced_export", org), first);
        }
        assert!(first < 100);
    }

    #[test]
    fn zero_and_hundred_are_absolute() {
        for _ in 0..50 {
            let org = Uuid::new_v4();
            assert!(!in_rollout("flag", org, 0));
            assert!(in_rollout("flag", org, 100));
        }
    }

    #[test]
    fn percentage_roughly_matches_population() {
        let admitted = (0..2000)
            .filter(|_| in_rollout("agent_memory", Uuid::new_v4(), 30))
            .count();
        // 30% of 2000 with generous slack
        assert!((400..=800).contains(&admitted), "admitted {admitted}");
    }

    #[test]
    fn raising_percentage_never_removes_an_org() {
        let org = Uuid::new_v4();
        let mut was_in = false;
        for pct in 0..=100u8 {
            let now_in = in_rollout("flag", org, pct);
            assert!(!was_in || now_in, "dropped out at {pct}");
            was_in = now_in;
        }
    }
}
