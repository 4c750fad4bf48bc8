use blst::min_pk::AggregatePublicKey as BlstAggregatePublicKey;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

use crate::{
    public_key::PublicKey,
    traits::Aggregatable,
};

#[derive(Debug, PartialEq, Clone, Encode, Decode, TreeHash, Serialize, Deserialize, Default)]
pub struct AggregatePublicKey {
    pub inner: PublicKey,
}

impl AggregatePublicKey {
    pub fn to_public_key(self) -> PublicKey {
        self.inner
    }

    pub fn aggregate(public_keys: &[&PublicKey]) -> anyhow::Result<Self> {
        Ok(Self {
            inner: PublicKey::aggregate(public_keys)?,
        })
    }
}

impl Aggregatable<PublicKey> for PublicKey {
    type Error = anyhow::Error;

    fn aggregate(public_keys: &[&PublicKey]) -> anyhow::Result<PublicKey> {
        let public_keys = public_keys
            .iter()
            .map(|public_key| public_key.to_blst_public_key())
            .collect::<Result<Vec<_>, _>>()?;
        let aggregate_public_key =
            BlstAggregatePublicKey::aggregate(&public_keys.iter().collect::<Vec<_>>(), true)
                .map_err(|err| anyhow::anyhow!("Failed to aggregate public keys {err:?}"))?;
        Ok(PublicKey::try_from(aggregate_public_key.to_public_key())?)
    }
}
