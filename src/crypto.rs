use core::fmt;

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use sha1::Sha1;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::error::{Error, Result};

/// AES block size, also the IV length.
pub(crate) const AES_BLOCK: usize = 16;

/// A minimal secret container that zeroizes its contents on drop.
///
/// This is intentionally small and avoids exposing secrets via `Debug`.
#[derive(Clone, Default)]
pub(crate) struct SecretBytes(Vec<u8>);

impl SecretBytes {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub(crate) fn expose(&self) -> &[u8] {
        &self.0
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The secret as a 20-byte RAKP-HMAC-SHA1 key.
    pub(crate) fn to_key_sha1(&self) -> [u8; 20] {
        normalize_key::<20>(self.expose())
    }

    /// The secret as the 16-byte key used by IPMI v1.5 auth codes.
    pub(crate) fn to_key_v15(&self) -> [u8; 16] {
        normalize_key::<16>(self.expose())
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<secret>")
    }
}

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

pub(crate) type HmacSha1 = Hmac<Sha1>;

/// Truncate and zero-pad a secret (password/Kg) to a fixed-size key.
///
/// IPMI implementations treat the user key as a fixed-size array where the
/// provided secret is truncated and the remainder is zero-padded.
pub(crate) fn normalize_key<const N: usize>(secret: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    let n = secret.len().min(N);
    out[..n].copy_from_slice(&secret[..n]);
    out
}

pub(crate) fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

pub(crate) fn hmac_sha1(key: &[u8], data: &[u8]) -> Result<[u8; 20]> {
    let mut mac =
        <HmacSha1 as Mac>::new_from_slice(key).map_err(|_| Error::Crypto("invalid HMAC key"))?;
    mac.update(data);
    let bytes = mac.finalize().into_bytes();
    let mut out = [0u8; 20];
    out.copy_from_slice(&bytes[..]);
    Ok(out)
}

pub(crate) fn hmac_sha1_truncated_12(key: &[u8], data: &[u8]) -> Result<[u8; 12]> {
    let full = hmac_sha1(key, data)?;
    let mut out = [0u8; 12];
    out.copy_from_slice(&full[..12]);
    Ok(out)
}

/// IPMI v1.5 MD5 auth code: `MD5(pw || session_id || payload || sequence || pw)`.
pub(crate) fn md5_auth_code(
    password: &[u8; 16],
    session_id: u32,
    payload: &[u8],
    sequence: u32,
) -> [u8; 16] {
    let mut md5 = Md5::new();
    md5.update(password);
    md5.update(session_id.to_le_bytes());
    md5.update(payload);
    md5.update(sequence.to_le_bytes());
    md5.update(password);
    let digest = md5.finalize();
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest[..]);
    out
}

/// Keying material derived from the session integrity key.
#[derive(Clone)]
pub struct SessionKeys {
    k1: [u8; 20],
    k2: [u8; 20],
}

impl SessionKeys {
    /// Derive K1 and K2 from a 20-byte SIK (RAKP-HMAC-SHA1).
    pub fn derive(sik: &[u8; 20]) -> Result<Self> {
        let (k1, k2) = derive_k1_k2_sha1(sik)?;
        Ok(Self { k1, k2 })
    }

    /// Integrity key K1.
    pub fn k1(&self) -> &[u8; 20] {
        &self.k1
    }

    /// Confidentiality key material K2.
    pub fn k2(&self) -> &[u8; 20] {
        &self.k2
    }

    /// AES-CBC-128 key: the first 16 bytes of K2.
    pub fn aes_key(&self) -> [u8; 16] {
        derive_aes_key_from_k2(&self.k2)
    }

    /// HMAC-SHA1-96 length of the packet auth code.
    pub(crate) fn auth_code_len(&self) -> usize {
        12
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKeys(<secret>)")
    }
}

impl Drop for SessionKeys {
    fn drop(&mut self) {
        self.k1.zeroize();
        self.k2.zeroize();
    }
}

fn derive_k1_k2_sha1(sik: &[u8; 20]) -> Result<([u8; 20], [u8; 20])> {
    let const1 = [0x01u8; 20];
    let const2 = [0x02u8; 20];

    let k1 = hmac_sha1(sik, &const1)?;
    let k2 = hmac_sha1(sik, &const2)?;
    Ok((k1, k2))
}

fn derive_aes_key_from_k2(k2: &[u8; 20]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out.copy_from_slice(&k2[..16]);
    out
}

/// AES-128-CBC encryption without padding.
///
/// The caller must ensure `plaintext.len()` is a multiple of 16.
pub(crate) fn aes128_cbc_encrypt(
    key: &[u8; 16],
    iv: &[u8; 16],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    if !plaintext.len().is_multiple_of(AES_BLOCK) {
        return Err(Error::Crypto(
            "AES-CBC plaintext length must be a multiple of 16",
        ));
    }

    let cipher = Aes128::new_from_slice(key).map_err(|_| Error::Crypto("invalid AES-128 key"))?;

    let mut out = Vec::with_capacity(plaintext.len());
    let mut prev = *iv;

    for block in plaintext.chunks(AES_BLOCK) {
        let mut xored = [0u8; 16];
        for i in 0..AES_BLOCK {
            xored[i] = block[i] ^ prev[i];
        }

        let mut ga = GenericArray::clone_from_slice(&xored);
        cipher.encrypt_block(&mut ga);

        let mut ct = [0u8; 16];
        ct.copy_from_slice(&ga);
        out.extend_from_slice(&ct);
        prev = ct;
    }

    Ok(out)
}

/// AES-128-CBC decryption without padding.
///
/// The caller must ensure `ciphertext.len()` is a multiple of 16.
pub(crate) fn aes128_cbc_decrypt(
    key: &[u8; 16],
    iv: &[u8; 16],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    if !ciphertext.len().is_multiple_of(AES_BLOCK) {
        return Err(Error::Crypto(
            "AES-CBC ciphertext length must be a multiple of 16",
        ));
    }

    let cipher = Aes128::new_from_slice(key).map_err(|_| Error::Crypto("invalid AES-128 key"))?;

    let mut out = Vec::with_capacity(ciphertext.len());
    let mut prev = *iv;

    for block in ciphertext.chunks(AES_BLOCK) {
        let mut ga = GenericArray::clone_from_slice(block);
        cipher.decrypt_block(&mut ga);

        let mut pt = [0u8; 16];
        pt.copy_from_slice(&ga);
        for i in 0..AES_BLOCK {
            pt[i] ^= prev[i];
        }

        out.extend_from_slice(&pt);
        prev.copy_from_slice(block);
    }

    Ok(out)
}

/// Encrypt a payload with AES-CBC-128 and IPMI confidentiality padding.
///
/// Pad bytes count up from 1 to the block boundary minus one, followed by a
/// single pad-length byte. Returns `iv || ciphertext`.
pub(crate) fn encrypt_payload(
    plaintext: &[u8],
    aes_key: &[u8; 16],
    iv: &[u8; 16],
) -> Result<Vec<u8>> {
    let base = plaintext.len() + 1;
    let pad_len = (AES_BLOCK - (base % AES_BLOCK)) % AES_BLOCK;

    let mut to_encrypt = Vec::with_capacity(base + pad_len);
    to_encrypt.extend_from_slice(plaintext);
    to_encrypt.extend((1..=pad_len).map(|i| i as u8));
    to_encrypt.push(pad_len as u8);

    let ciphertext = aes128_cbc_encrypt(aes_key, iv, &to_encrypt)?;

    let mut out = Vec::with_capacity(AES_BLOCK + ciphertext.len());
    out.extend_from_slice(iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt an `iv || ciphertext` payload and strip the confidentiality trailer.
pub(crate) fn decrypt_payload(payload: &[u8], aes_key: &[u8; 16]) -> Result<Vec<u8>> {
    if payload.len() < AES_BLOCK {
        return Err(Error::Decoding("encrypted payload too short"));
    }

    let (iv, ciphertext) = payload.split_at(AES_BLOCK);
    let iv: [u8; 16] = iv
        .try_into()
        .map_err(|_| Error::Decoding("invalid IV"))?;
    if ciphertext.is_empty() || !ciphertext.len().is_multiple_of(AES_BLOCK) {
        return Err(Error::Decoding("invalid AES-CBC ciphertext length"));
    }

    let mut plaintext = aes128_cbc_decrypt(aes_key, &iv, ciphertext)?;

    let pad_len = *plaintext
        .last()
        .ok_or(Error::Decoding("missing confidentiality pad length"))? as usize;
    if pad_len >= AES_BLOCK || pad_len > plaintext.len() - 1 {
        return Err(Error::Decoding("invalid confidentiality pad length"));
    }

    let trailer_start = plaintext.len() - 1 - pad_len;
    let pad_bytes = &plaintext[trailer_start..plaintext.len() - 1];
    for (i, &b) in pad_bytes.iter().enumerate() {
        if b != (i as u8 + 1) {
            return Err(Error::Decoding("invalid confidentiality pad bytes"));
        }
    }

    plaintext.truncate(trailer_start);
    Ok(plaintext)
}
