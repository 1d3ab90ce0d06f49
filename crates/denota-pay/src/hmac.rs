use alloy::hex;
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Value of the `X-Webhook-Signature` header: hex HMAC-SHA256 of the exact
/// body bytes sent.
pub fn webhook_signature(secret: &[u8], body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_rfc4231_vector() {
        assert_eq!(
            webhook_signature(b"Jefe", b"what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_signature_depends_on_secret_and_body() {
        let body = br#"{"event":"settlement.settled"}"#;
        let sig = webhook_signature(b"secret-1", body);
        assert_eq!(sig.len(), 64);
        assert_ne!(sig, webhook_signature(b"secret-2", body));
        assert_ne!(sig, webhook_signature(b"secret-1", b"{}"));
    }
}
