//! secp256k1 ECDSA adapter: key generation, signing, and verification
//! against the protocol's raw 65-byte public keys and 72-byte padded
//! DER signature slots.

use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

use crate::error::TxError;
use crate::types::{Hash256, PublicKeyBytes, SignatureSlot};

/// An owned keypair usable for signing outgoing transactions.
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let mut rng = rand::thread_rng();
        let (secret, public) = secp.generate_keypair(&mut rng);
        Self { secret, public }
    }

    /// Restore a keypair from a 32-byte secret scalar.
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self, TxError> {
        let secret = SecretKey::from_slice(bytes)
            .map_err(|_| TxError::InvalidSignature { index: 0 })?;
        let secp = Secp256k1::new();
        let public = PublicKey::from_secret_key(&secp, &secret);
        Ok(Self { secret, public })
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.secret_bytes()
    }

    /// The uncompressed, 65-byte public key (`0x04 || X || Y`).
    pub fn public_key_bytes(&self) -> PublicKeyBytes {
        PublicKeyBytes(self.public.serialize_uncompressed())
    }

    /// Sign a message hash, producing a DER signature padded into the
    /// 72-byte wire slot.
    pub fn sign(&self, message: &Hash256) -> SignatureSlot {
        let secp = Secp256k1::new();
        let msg = Message::from_digest(*message.as_bytes());
        let sig = secp.sign_ecdsa(&msg, &self.secret);
        let der = sig.serialize_der();
        SignatureSlot::from_der(&der).expect("DER signature fits 72-byte slot")
    }
}

/// Verify a signature slot against a message hash and uncompressed
/// public key. Returns `false` (never errors) on any malformed input,
/// since callers treat "does not verify" uniformly regardless of cause.
pub fn verify(message: &Hash256, signature: &SignatureSlot, public_key: &PublicKeyBytes) -> bool {
    let Some(der) = signature.effective_der() else {
        return false;
    };
    let Ok(sig) = Signature::from_der(der) else {
        return false;
    };
    let Ok(pk) = PublicKey::from_slice(&public_key.0) else {
        return false;
    };
    let secp = Secp256k1::new();
    let msg = Message::from_digest(*message.as_bytes());
    secp.verify_ecdsa(&msg, &sig, &pk).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trip() {
        let kp = KeyPair::generate();
        let msg = Hash256::of(b"hello brook");
        let sig = kp.sign(&msg);
        assert!(verify(&msg, &sig, &kp.public_key_bytes()));
    }

    #[test]
    fn verify_rejects_wrong_message() {
        let kp = KeyPair::generate();
        let sig = kp.sign(&Hash256::of(b"one"));
        assert!(!verify(&Hash256::of(b"two"), &sig, &kp.public_key_bytes()));
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let kp = KeyPair::generate();
        let other = KeyPair::generate();
        let msg = Hash256::of(b"hello brook");
        let sig = kp.sign(&msg);
        assert!(!verify(&msg, &sig, &other.public_key_bytes()));
    }

    #[test]
    fn verify_rejects_empty_signature() {
        let kp = KeyPair::generate();
        let msg = Hash256::of(b"hello brook");
        assert!(!verify(&msg, &SignatureSlot::EMPTY, &kp.public_key_bytes()));
    }

    #[test]
    fn secret_round_trip() {
        let kp = KeyPair::generate();
        let restored = KeyPair::from_secret_bytes(&kp.secret_bytes()).unwrap();
        assert_eq!(kp.public_key_bytes(), restored.public_key_bytes());
    }
}
