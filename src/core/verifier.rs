//! Plain-text secret verifier for fixtures and tests

use super::traits::SecretVerifier;

/// Exact string comparison
///
/// The stored "hash" is the secret itself. Suitable for CSV fixtures and tests,
/// never for real credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainSecretVerifier;

impl SecretVerifier for PlainSecretVerifier {
    fn verify(&self, plain: &str, hash: &str) -> bool {
        plain == hash
    }
}
