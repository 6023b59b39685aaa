use rand::Rng;
use sha2::{Digest, Sha256};

/// One-time password reset token. Only the digest is stored; the plain
/// token goes to the user.
pub struct ResetToken {
    pub plain: String,
    pub digest: String,
}

impl ResetToken {
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rand::rng().random();
        let plain = hex::encode(bytes);
        let digest = Self::digest(&plain);
        Self { plain, digest }
    }

    /// sha256 hex of a presented token
    pub fn digest(plain: &str) -> String {
        hex::encode(Sha256::digest(plain.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_matches_generated_token() {
        let token = ResetToken::generate();
        assert_eq!(token.plain.len(), 64);
        assert_eq!(ResetToken::digest(&token.plain), token.digest);
        assert_ne!(token.plain, token.digest);
        assert_ne!(ResetToken::generate().plain, token.plain);
    }

    #[test]
    fn known_digest() {
        assert_eq!(
            ResetToken::digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
