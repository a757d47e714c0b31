//! A minimal in-memory wallet: one or more imported/generated keypairs,
//! enough to sign `send` transactions from the shell. No BIP32
//! derivation, mnemonics, or on-disk encryption (out of scope).

use brook_core::crypto::KeyPair;
use brook_core::types::PublicKeyBytes;

/// Keys the node can sign with, most-recently-added first for
/// `account`'s "current" notion.
#[derive(Default)]
pub struct Wallet {
    keys: Vec<KeyPair>,
}

impl Wallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh keypair and make it the current account.
    pub fn generate(&mut self) -> PublicKeyBytes {
        let kp = KeyPair::generate();
        let pk = kp.public_key_bytes();
        self.keys.push(kp);
        pk
    }

    /// Import a raw 32-byte secret scalar as the current account.
    pub fn import_private_key(&mut self, secret: &[u8; 32]) -> anyhow::Result<PublicKeyBytes> {
        let kp = KeyPair::from_secret_bytes(secret).map_err(|e| anyhow::anyhow!(e))?;
        let pk = kp.public_key_bytes();
        self.keys.push(kp);
        Ok(pk)
    }

    pub fn current_public_key(&self) -> Option<PublicKeyBytes> {
        self.keys.last().map(|kp| kp.public_key_bytes())
    }

    pub fn current_keypair(&self) -> Option<&KeyPair> {
        self.keys.last()
    }

    pub fn find(&self, public_key: &PublicKeyBytes) -> Option<&KeyPair> {
        self.keys.iter().find(|kp| &kp.public_key_bytes() == public_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_sets_current_account() {
        let mut wallet = Wallet::new();
        let pk = wallet.generate();
        assert_eq!(wallet.current_public_key(), Some(pk));
    }

    #[test]
    fn import_round_trips_public_key() {
        let mut wallet = Wallet::new();
        let original = KeyPair::generate();
        let secret = original.secret_bytes();
        let pk = wallet.import_private_key(&secret).unwrap();
        assert_eq!(pk, original.public_key_bytes());
        assert!(wallet.find(&pk).is_some());
    }

    #[test]
    fn empty_wallet_has_no_current_account() {
        let wallet = Wallet::new();
        assert!(wallet.current_public_key().is_none());
    }
}
