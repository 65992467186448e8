//! Stable machine identity.

use sha2::{Digest, Sha256};

use crate::config::ClientConfig;

/// Resolve the machine id for `cfg`.
///
/// An explicit `machine_id` wins. Otherwise the id is derived from the
/// endpoint, secret and optional seed, so the same configuration always
/// yields the same id across restarts.
pub fn machine_id(cfg: &ClientConfig) -> String {
    match cfg.machine_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => derive_machine_id(
            &cfg.api_endpoint,
            &cfg.api_secret,
            cfg.machine_seed.as_deref().unwrap_or_default(),
        ),
    }
}

fn derive_machine_id(endpoint: &str, secret: &str, seed: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [endpoint, secret, seed] {
        // Length prefix keeps ("ab", "c") distinct from ("a", "bc").
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    format!("m_{}", &digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(secret: &str, seed: Option<&str>) -> ClientConfig {
        ClientConfig {
            api_secret: secret.into(),
            machine_seed: seed.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn stable_for_identical_options() {
        let a = machine_id(&cfg("sk_one", None));
        let b = machine_id(&cfg("sk_one", None));
        assert_eq!(a, b);
        assert!(a.starts_with("m_"));
        assert_eq!(a.len(), 18);
    }

    #[test]
    fn differs_when_seed_differs() {
        let a = machine_id(&cfg("sk_one", Some("worker-1")));
        let b = machine_id(&cfg("sk_one", Some("worker-2")));
        let c = machine_id(&cfg("sk_two", Some("worker-1")));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn part_boundaries_matter() {
        assert_ne!(
            derive_machine_id("ab", "c", ""),
            derive_machine_id("a", "bc", "")
        );
    }

    #[test]
    fn explicit_id_wins() {
        let mut c = cfg("sk_one", Some("seed"));
        c.machine_id = Some("my-box".into());
        assert_eq!(machine_id(&c), "my-box");

        c.machine_id = Some("   ".into());
        assert!(machine_id(&c).starts_with("m_"));
    }
}
