use crate::{BLSSignature, PublicKey};

/// Trait for aggregating BLS public keys into a single aggregate key, as used
/// when verifying messages signed by multiple parties.
pub trait Aggregatable<T> {
    type Error;

    fn aggregate(items: &[&T]) -> Result<T, Self::Error>;
}

/// Trait for BLS message signing.
pub trait Signable {
    type Error;

    fn sign(&self, message: &[u8]) -> Result<BLSSignature, Self::Error>;
}

/// Trait for verifying BLS signatures, either against a single public key or
/// against the aggregate of multiple public keys.
pub trait Verifiable {
    type Error;

    fn verify(&self, public_key: &PublicKey, message: &[u8]) -> Result<bool, Self::Error>;

    fn fast_aggregate_verify<'a, P>(
        &self,
        public_keys: P,
        message: &[u8],
    ) -> Result<bool, Self::Error>
    where
        P: AsRef<[&'a PublicKey]>;
}
