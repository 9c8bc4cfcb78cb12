//! Key-binding proofs.
//!
//! A [`Meta`] is the immutable proof binding an [`EntityId`] to a public
//! key. Once accepted for an id it is never replaced or deleted; the
//! address of the id is derived deterministically from the meta, so a
//! mismatch is detectable by every peer without any directory server.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::id::{Address, NetworkType};

/// Address-generation algorithm, with the original wire values.
///
/// Bit 0 marks metas that carry a seed string (a username bound into
/// the fingerprint); the remaining bits select the address flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MetaVersion {
    /// Seed + fingerprint, default algorithm.
    Mkm = 0x01,
    /// Key-only BTC-style address, no username.
    Btc = 0x02,
    /// BTC-style address with a bound username.
    ExBtc = 0x03,
    /// Key-only ETH-style address.
    Eth = 0x04,
    /// ETH-style address with a bound username.
    ExEth = 0x05,
}

impl MetaVersion {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Mkm),
            0x02 => Some(Self::Btc),
            0x03 => Some(Self::ExBtc),
            0x04 => Some(Self::Eth),
            0x05 => Some(Self::ExEth),
            _ => None,
        }
    }

    /// Whether this algorithm binds a seed string into the proof.
    pub fn has_seed(self) -> bool {
        (self as u8) & 0x01 == 0x01
    }
}

/// Public key material. The actual signature math lives behind
/// [`crate::traits::SignatureVerifier`]; this type only carries bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    /// Algorithm name, e.g. "ECC" or "RSA".
    pub algorithm: String,
    /// Raw key bytes.
    pub data: Vec<u8>,
}

impl PublicKey {
    pub fn new(algorithm: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            algorithm: algorithm.into(),
            data,
        }
    }
}

/// Immutable key-binding proof for an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub version: MetaVersion,
    pub public_key: PublicKey,
    /// Username bound into the proof; required iff the version is seeded.
    pub seed: Option<String>,
    /// Signature of the seed by the matching private key; required iff
    /// the version is seeded.
    pub fingerprint: Option<Vec<u8>>,
}

impl Meta {
    pub fn new(
        version: MetaVersion,
        public_key: PublicKey,
        seed: Option<String>,
        fingerprint: Option<Vec<u8>>,
    ) -> Self {
        Self {
            version,
            public_key,
            seed,
            fingerprint,
        }
    }

    /// Structural well-formedness: key bytes present, and seed plus
    /// fingerprint present exactly when the version requires them.
    pub fn is_valid(&self) -> bool {
        if self.public_key.data.is_empty() {
            return false;
        }
        if self.version.has_seed() {
            let seeded = self.seed.as_deref().is_some_and(|s| !s.is_empty());
            let signed = self.fingerprint.as_deref().is_some_and(|f| !f.is_empty());
            seeded && signed
        } else {
            self.seed.is_none() && self.fingerprint.is_none()
        }
    }

    /// Derive the address this meta generates for the given network.
    ///
    /// Seeded versions hash the fingerprint, key-only versions hash the
    /// key bytes; either way the derivation is deterministic, so every
    /// peer computes the same address from the same proof.
    pub fn generate_address(&self, network: NetworkType) -> Address {
        let mut hasher = Sha256::new();
        hasher.update([network as u8]);
        match (self.version.has_seed(), self.fingerprint.as_deref()) {
            (true, Some(fingerprint)) => hasher.update(fingerprint),
            _ => hasher.update(&self.public_key.data),
        }
        let digest = hasher.finalize();
        // 20-byte tail, BTC style
        Address::new(network, hex::encode(&digest[12..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_meta() -> Meta {
        Meta::new(
            MetaVersion::Mkm,
            PublicKey::new("ECC", b"moki-public-key".to_vec()),
            Some("moki".to_string()),
            Some(b"moki-fingerprint".to_vec()),
        )
    }

    #[test]
    fn test_version_seed_bit() {
        assert!(MetaVersion::Mkm.has_seed());
        assert!(!MetaVersion::Btc.has_seed());
        assert!(MetaVersion::ExBtc.has_seed());
        assert!(!MetaVersion::Eth.has_seed());
        assert!(MetaVersion::ExEth.has_seed());
    }

    #[test]
    fn test_version_parse() {
        assert_eq!(MetaVersion::from_u8(0x01), Some(MetaVersion::Mkm));
        assert_eq!(MetaVersion::from_u8(0x05), Some(MetaVersion::ExEth));
        assert_eq!(MetaVersion::from_u8(0x06), None);
    }

    #[test]
    fn test_seeded_meta_validity() {
        let meta = seeded_meta();
        assert!(meta.is_valid());

        let mut missing_seed = meta.clone();
        missing_seed.seed = None;
        assert!(!missing_seed.is_valid());

        let mut empty_fingerprint = meta;
        empty_fingerprint.fingerprint = Some(Vec::new());
        assert!(!empty_fingerprint.is_valid());
    }

    #[test]
    fn test_key_only_meta_validity() {
        let meta = Meta::new(
            MetaVersion::Btc,
            PublicKey::new("ECC", b"key".to_vec()),
            None,
            None,
        );
        assert!(meta.is_valid());

        let mut stray_seed = meta;
        stray_seed.seed = Some("moki".to_string());
        assert!(!stray_seed.is_valid());
    }

    #[test]
    fn test_address_derivation_is_deterministic() {
        let meta = seeded_meta();
        let a = meta.generate_address(NetworkType::User);
        let b = meta.generate_address(NetworkType::User);
        assert_eq!(a, b);
        assert!(a.is_user());
        // Network byte participates in the digest, so group and user
        // addresses differ for the same proof.
        assert_ne!(a, meta.generate_address(NetworkType::Group));
    }

    #[test]
    fn test_address_depends_on_fingerprint() {
        let meta = seeded_meta();
        let mut other = meta.clone();
        other.fingerprint = Some(b"forged".to_vec());
        assert_ne!(
            meta.generate_address(NetworkType::User),
            other.generate_address(NetworkType::User)
        );
    }
}
