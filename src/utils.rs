//! Utility functions for identities and hashing

use super::error::LedgerError;
use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique account id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Encode a value into CBOR and return it alongside its sha256 digest.
pub fn digest_cbor<T: minicbor::Encode<()>>(value: &T) -> Result<(String, Vec<u8>), LedgerError> {
    let cbor = minicbor::to_vec(value).map_err(|e| LedgerError::Codec(e.to_string()))?;
    let hash = sha256::digest(&cbor);

    Ok((hash, cbor))
}
