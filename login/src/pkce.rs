use base64::Engine;
use rand::RngCore;
use sha2::Digest;
use sha2::Sha256;

#[derive(Debug, Clone)]
pub struct PkceCodes {
    pub code_verifier: String,
    pub code_challenge: String,
}

/// Generates an S256 PKCE pair. The verifier is 64 random bytes encoded as
/// unpadded base64url (86 characters, inside the RFC 7636 43..=128 range).
pub fn generate_pkce() -> PkceCodes {
    let mut bytes = [0u8; 64];
    rand::thread_rng().fill_bytes(&mut bytes);
    let code_verifier = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);
    let code_challenge = challenge_for(&code_verifier);
    PkceCodes {
        code_verifier,
        code_challenge,
    }
}

pub(crate) fn challenge_for(code_verifier: &str) -> String {
    let digest = Sha256::digest(code_verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

/// Opaque `state` value for the authorize redirect.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn challenge_is_sha256_of_verifier() {
        let pkce = generate_pkce();
        assert_eq!(pkce.code_verifier.len(), 86);
        assert_eq!(pkce.code_challenge, challenge_for(&pkce.code_verifier));
        assert!(!pkce.code_challenge.contains('='));
    }

    #[test]
    fn rfc7636_appendix_b_vector() {
        assert_eq!(
            challenge_for("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn states_are_unique() {
        assert_ne!(generate_state(), generate_state());
    }
}
