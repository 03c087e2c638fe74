// This file fingerprints rendered DDL for the schema registry.

use sha2::{Digest, Sha256};

// Domain separation constant so a registry fingerprint can never collide with
// a hash of the same bytes produced elsewhere.
const DDL_DOMAIN: &[u8] = b"TASKDBDDL";

/// Hashes a rendered DDL definition into a stable hex fingerprint.
///
/// The reconciler compares the stored fingerprint against the freshly rendered
/// one to decide between "unchanged" (no-op) and "drifted" (re-apply).
pub fn fingerprint(definition: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(DDL_DOMAIN);
    hasher.update(definition.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::fingerprint;

    #[test]
    fn fingerprint_is_stable() {
        assert_eq!(fingerprint("CREATE INDEX x"), fingerprint("CREATE INDEX x"));
    }

    #[test]
    fn fingerprint_distinguishes_definitions() {
        assert_ne!(fingerprint("CREATE INDEX x"), fingerprint("CREATE INDEX y"));
    }
}
