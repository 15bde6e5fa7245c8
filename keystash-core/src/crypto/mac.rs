use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use keystash_spec::{Digest, Error, Result};
use md5::Md5;
use sha2::{Sha256, Sha512};

/// HMAC of `data` under `key` with the record's digest.
pub fn compute(digest: Digest, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    match digest {
        Digest::Sha256 => sign::<Hmac<Sha256>>(key, data),
        Digest::Sha512 => sign::<Hmac<Sha512>>(key, data),
        Digest::Md5 => sign::<Hmac<Md5>>(key, data),
    }
}

/// Constant-time check of `expected` against the HMAC of `data`. Tags of a
/// different length never match.
pub fn verify(digest: Digest, key: &[u8], data: &[u8], expected: &[u8]) -> Result<bool> {
    match digest {
        Digest::Sha256 => check::<Hmac<Sha256>>(key, data, expected),
        Digest::Sha512 => check::<Hmac<Sha512>>(key, data, expected),
        Digest::Md5 => check::<Hmac<Md5>>(key, data, expected),
    }
}

fn keyed<M: Mac + KeyInit>(key: &[u8], data: &[u8]) -> Result<M> {
    let mut mac = <M as Mac>::new_from_slice(key)
        .map_err(|_| Error::Crypto("invalid hmac key length".into()))?;
    mac.update(data);
    Ok(mac)
}

fn sign<M: Mac + KeyInit>(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    Ok(keyed::<M>(key, data)?.finalize().into_bytes().to_vec())
}

fn check<M: Mac + KeyInit>(key: &[u8], data: &[u8], expected: &[u8]) -> Result<bool> {
    Ok(keyed::<M>(key, data)?.verify_slice(expected).is_ok())
}
