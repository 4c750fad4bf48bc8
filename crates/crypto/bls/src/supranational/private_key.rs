use anyhow::anyhow;
use blst::min_pk::SecretKey as BlstSecretKey;
use ssz_types::FixedVector;

use crate::{
    constants::DST,
    private_key::PrivateKey,
    public_key::PublicKey,
    signature::BLSSignature,
    traits::Signable,
};

impl PrivateKey {
    fn to_blst_secret_key(&self) -> anyhow::Result<BlstSecretKey> {
        BlstSecretKey::from_bytes(self.inner.as_slice())
            .map_err(|err| anyhow!("Failed to convert to BlstSecretKey: {err:?}"))
    }

    /// Derive a private key from input key material, per the `KeyGen` procedure of the BLS
    /// signature draft standard.
    pub fn from_ikm(ikm: &[u8]) -> anyhow::Result<Self> {
        let secret_key = BlstSecretKey::key_gen(ikm, &[])
            .map_err(|err| anyhow!("Failed to generate secret key: {err:?}"))?;
        Ok(Self {
            inner: alloy_primitives::B256::from_slice(&secret_key.to_bytes()),
        })
    }

    pub fn public_key(&self) -> anyhow::Result<PublicKey> {
        let secret_key = self.to_blst_secret_key()?;
        Ok(PublicKey {
            inner: FixedVector::new(secret_key.sk_to_pk().to_bytes().to_vec())
                .map_err(|err| anyhow!("Failed to convert to PublicKey: {err:?}"))?,
        })
    }
}

impl Signable for PrivateKey {
    type Error = anyhow::Error;

    fn sign(&self, message: &[u8]) -> Result<BLSSignature, Self::Error> {
        let signature = self.to_blst_secret_key()?.sign(message, DST, &[]);
        Ok(BLSSignature {
            inner: FixedVector::new(signature.to_bytes().to_vec())
                .map_err(|err| anyhow!("Failed to create BLSSignature: {err:?}"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::traits::{Signable, Verifiable};

    use super::*;

    #[test]
    fn test_sign_and_verify_roundtrip() {
        let private_key = PrivateKey::from_ikm(&[0x42; 32]).expect("key generation");
        let public_key = private_key.public_key().expect("public key derivation");

        let message = b"beacon chain message";
        let signature = private_key.sign(message).expect("signing");

        assert!(signature.verify(&public_key, message).expect("verification"));
        assert!(!signature.verify(&public_key, b"other message").expect("verification"));
    }

    #[test]
    fn test_fast_aggregate_verify() {
        use crate::{signature::BLSSignature, traits::Aggregatable};

        let message = b"same message for all signers";

        let mut public_keys = vec![];
        let mut signatures = vec![];
        for i in 0..4u8 {
            let private_key = PrivateKey::from_ikm(&[i + 1; 32]).expect("key generation");
            public_keys.push(private_key.public_key().expect("public key derivation"));
            signatures.push(private_key.sign(message).expect("signing"));
        }

        let aggregate = BLSSignature::aggregate(&signatures.iter().collect::<Vec<_>>())
            .expect("aggregation");

        let key_refs = public_keys.iter().collect::<Vec<_>>();
        assert!(aggregate.fast_aggregate_verify(&key_refs, message).expect("verification"));
        assert!(
            !aggregate
                .fast_aggregate_verify(&key_refs[..3], message)
                .expect("verification")
        );
    }
}
