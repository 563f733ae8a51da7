//! Common Encryption (ISO/IEC 23001-7): configuration, key plumbing
//! and the per-sample encryptor.
//!
//! The encryptor owns the IV chain for one track. Samples are
//! encrypted in place; the returned entry carries the IV and the
//! subsample partition for the fragment's `senc` box.
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncryptMut, KeyIvInit, StreamCipher};
use aes::Aes128;
use rand::RngCore;

use crate::boxes::{SampleEncryptionEntry, SubsampleEntry};
use crate::error::{Error, Result};
use crate::stream::Codec;
use crate::types::FourCC;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;
type Aes128CbcEnc = cbc::Encryptor<Aes128>;

const AES_BLOCK_SIZE: usize = 16;

/// The four CENC protection schemes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProtectionScheme {
    /// AES-CTR, whole-subsample cipher runs.
    Cenc,
    /// AES-CBC, whole-subsample cipher runs.
    Cbc1,
    /// AES-CTR with a crypt:skip block pattern.
    Cens,
    /// AES-CBC with a crypt:skip block pattern and constant IV.
    Cbcs,
}

impl ProtectionScheme {
    pub fn fourcc(&self) -> FourCC {
        match self {
            ProtectionScheme::Cenc => FourCC::new("cenc"),
            ProtectionScheme::Cbc1 => FourCC::new("cbc1"),
            ProtectionScheme::Cens => FourCC::new("cens"),
            ProtectionScheme::Cbcs => FourCC::new("cbcs"),
        }
    }

    /// `tenc` version: 0 for cenc/cbc1, 1 for the pattern schemes.
    pub fn tenc_version(&self) -> u8 {
        match self {
            ProtectionScheme::Cenc | ProtectionScheme::Cbc1 => 0,
            ProtectionScheme::Cens | ProtectionScheme::Cbcs => 1,
        }
    }

    fn is_ctr(&self) -> bool {
        matches!(self, ProtectionScheme::Cenc | ProtectionScheme::Cens)
    }

    fn uses_pattern(&self) -> bool {
        matches!(self, ProtectionScheme::Cens | ProtectionScheme::Cbcs)
    }
}

/// One DRM system's `pssh` box, carried verbatim.
#[derive(Clone, Debug, Default)]
pub struct ProtectionSystemSpecificInfo {
    /// A complete `pssh` box, header included. Never re-framed.
    pub psshs: Vec<u8>,
}

/// Key material returned by a key source. Opaque to the muxer except
/// for the fields below.
#[derive(Clone, Debug, Default)]
pub struct EncryptionKey {
    pub key_id: Vec<u8>,
    pub key: Vec<u8>,
    /// First IV; empty means "pick one at random".
    pub iv: Vec<u8>,
    pub key_system_info: Vec<ProtectionSystemSpecificInfo>,
}

/// Where keys come from. Key acquisition itself (Widevine, raw keys,
/// PlayReady, ...) lives outside the packager core.
pub trait KeySource {
    fn get_key(&mut self, label: &str) -> Result<EncryptionKey>;

    /// Key for a crypto period, used with key rotation.
    fn get_crypto_period_key(&mut self, _crypto_period_index: u32, label: &str) -> Result<EncryptionKey> {
        self.get_key(label)
    }
}

/// A key source with fixed key material, for testing and raw-key use.
#[derive(Clone, Debug, Default)]
pub struct FixedKeySource {
    pub key: EncryptionKey,
}

impl FixedKeySource {
    pub fn new(key: EncryptionKey) -> FixedKeySource {
        FixedKeySource { key }
    }
}

impl KeySource for FixedKeySource {
    fn get_key(&mut self, _label: &str) -> Result<EncryptionKey> {
        Ok(self.key.clone())
    }

    fn get_crypto_period_key(&mut self, crypto_period_index: u32, _label: &str) -> Result<EncryptionKey> {
        // Derive a distinguishable per-period key id so rotation can be
        // observed even with fixed key material.
        let mut key = self.key.clone();
        if let Some(last) = key.key_id.last_mut() {
            *last = last.wrapping_add(crypto_period_index as u8);
        }
        Ok(key)
    }
}

/// Everything needed to set up encryption for one stream.
#[derive(Clone, Debug)]
pub struct EncryptionConfig {
    pub protection_scheme: ProtectionScheme,
    /// 0 (constant IV, cbcs only), 8 or 16.
    pub per_sample_iv_size: u8,
    /// Only with `per_sample_iv_size == 0`.
    pub constant_iv: Vec<u8>,
    /// 16-byte key id; shorter values are zero-padded with a warning.
    pub key_id: Vec<u8>,
    pub crypt_byte_block: u8,
    pub skip_byte_block: u8,
    pub key_system_info: Vec<ProtectionSystemSpecificInfo>,
}

impl Default for EncryptionConfig {
    fn default() -> EncryptionConfig {
        EncryptionConfig {
            protection_scheme: ProtectionScheme::Cenc,
            per_sample_iv_size: 8,
            constant_iv: Vec::new(),
            key_id: vec![0; 16],
            crypt_byte_block: 0,
            skip_byte_block: 0,
            key_system_info: Vec::new(),
        }
    }
}

impl EncryptionConfig {
    /// Check the configuration at muxer init; invalid combinations are
    /// fatal before the first sample is touched.
    pub fn validate(&self) -> Result<()> {
        match self.per_sample_iv_size {
            0 => {
                if self.protection_scheme != ProtectionScheme::Cbcs {
                    return Err(Error::invalid_argument(
                        "constant IV (per_sample_iv_size 0) is only valid for cbcs",
                    ));
                }
                if self.constant_iv.len() != 16 {
                    return Err(Error::invalid_argument(format!(
                        "constant IV must be 16 bytes, got {}",
                        self.constant_iv.len()
                    )));
                }
            },
            8 | 16 => {
                if !self.constant_iv.is_empty() {
                    return Err(Error::invalid_argument(
                        "constant IV set with a per-sample IV size",
                    ));
                }
                if self.protection_scheme == ProtectionScheme::Cbc1 && self.per_sample_iv_size != 16 {
                    return Err(Error::invalid_argument("cbc1 requires a 16-byte IV"));
                }
            },
            sz => {
                return Err(Error::invalid_argument(format!(
                    "per_sample_iv_size must be 0, 8 or 16, got {}",
                    sz
                )))
            },
        }
        if !self.protection_scheme.uses_pattern()
            && (self.crypt_byte_block != 0 || self.skip_byte_block != 0)
        {
            return Err(Error::invalid_argument(
                "crypt/skip byte blocks are only valid for cens and cbcs",
            ));
        }
        Ok(())
    }

    /// The key id, padded or truncated to exactly 16 bytes.
    pub fn key_id_16(&self) -> Vec<u8> {
        let mut kid = self.key_id.clone();
        if kid.len() != 16 {
            log::warn!("resized {}-byte KID to 16 bytes", kid.len());
            kid.resize(16, 0);
        }
        kid
    }
}

// NAL-structured codecs keep the NALU header in the clear; everything
// else is encrypted as one run.
fn nal_header_len(codec: Codec) -> Option<usize> {
    match codec {
        Codec::H264 => Some(1),
        Codec::H265 | Codec::H265DolbyVision => Some(2),
        _ => None,
    }
}

fn is_vcl_nalu(codec_header_len: usize, first_byte: u8) -> bool {
    if codec_header_len == 1 {
        // AVC: nal_unit_type 1..=5.
        matches!(first_byte & 0x1f, 1..=5)
    } else {
        // HEVC: nal_unit_type 0..=31.
        (first_byte >> 1) & 0x3f <= 31
    }
}

/// Per-track sample encryptor.
pub struct SampleEncryptor {
    scheme: ProtectionScheme,
    key: [u8; 16],
    iv: Vec<u8>,
    per_sample_iv_size: u8,
    crypt_byte_block: u8,
    skip_byte_block: u8,
    nal_header: Option<usize>,
}

impl SampleEncryptor {
    pub fn new(config: &EncryptionConfig, key: &EncryptionKey, codec: Codec) -> Result<SampleEncryptor> {
        config.validate()?;
        if key.key.len() != 16 {
            return Err(Error::invalid_argument(format!(
                "AES-128 key must be 16 bytes, got {}",
                key.key.len()
            )));
        }
        let mut aes_key = [0u8; 16];
        aes_key.copy_from_slice(&key.key);

        let iv = if config.per_sample_iv_size > 0 {
            if key.iv.len() == config.per_sample_iv_size as usize {
                key.iv.clone()
            } else {
                if !key.iv.is_empty() {
                    log::warn!(
                        "ignoring {}-byte IV from key source, need {}",
                        key.iv.len(),
                        config.per_sample_iv_size
                    );
                }
                let mut iv = vec![0u8; config.per_sample_iv_size as usize];
                rand::thread_rng().fill_bytes(&mut iv);
                iv
            }
        } else {
            config.constant_iv.clone()
        };

        Ok(SampleEncryptor {
            scheme: config.protection_scheme,
            key: aes_key,
            iv,
            per_sample_iv_size: config.per_sample_iv_size,
            crypt_byte_block: config.crypt_byte_block,
            skip_byte_block: config.skip_byte_block,
            nal_header: nal_header_len(codec),
        })
    }

    /// Switch to a new key (key rotation). The IV chain continues.
    pub fn set_key(&mut self, key: &EncryptionKey) -> Result<()> {
        if key.key.len() != 16 {
            return Err(Error::invalid_argument(format!(
                "AES-128 key must be 16 bytes, got {}",
                key.key.len()
            )));
        }
        self.key.copy_from_slice(&key.key);
        Ok(())
    }

    /// The IV the next sample will be encrypted with.
    pub fn current_iv(&self) -> &[u8] {
        &self.iv
    }

    /// Encrypt one sample in place and return its `senc` entry.
    pub fn encrypt_sample(&mut self, data: &mut [u8]) -> Result<SampleEncryptionEntry> {
        let subsamples = match self.nal_header {
            Some(header_len) => self.partition_nal_sample(data, header_len)?,
            None => Vec::new(),
        };

        let encrypted = if subsamples.is_empty() {
            self.encrypt_range(data, &[(0, data.len())])?
        } else {
            let mut ranges = Vec::with_capacity(subsamples.len());
            let mut pos = 0usize;
            for sub in &subsamples {
                pos += sub.clear_bytes as usize;
                if sub.cipher_bytes > 0 {
                    ranges.push((pos, sub.cipher_bytes as usize));
                    pos += sub.cipher_bytes as usize;
                }
            }
            self.encrypt_range(data, &ranges)?
        };

        let entry = SampleEncryptionEntry {
            initialization_vector: if self.per_sample_iv_size > 0 {
                self.iv.clone()
            } else {
                Vec::new()
            },
            subsamples,
        };

        if self.per_sample_iv_size > 0 {
            let blocks = (encrypted as u64 + AES_BLOCK_SIZE as u64 - 1) / AES_BLOCK_SIZE as u64;
            increment_iv(&mut self.iv, blocks);
        }

        Ok(entry)
    }

    // Split a length-prefixed NALU stream into clear/cipher subsamples.
    // Non-VCL NALUs stay clear; a VCL NALU keeps the length prefix and
    // the NALU header clear and encrypts the rest.
    fn partition_nal_sample(&self, data: &[u8], header_len: usize) -> Result<Vec<SubsampleEntry>> {
        let mut subsamples: Vec<SubsampleEntry> = Vec::new();
        let mut clear = 0u64;
        let mut pos = 0usize;

        while pos < data.len() {
            if pos + 4 > data.len() {
                return Err(Error::invalid_argument("truncated NALU length prefix"));
            }
            let nalu_size = u32::from_be_bytes([
                data[pos],
                data[pos + 1],
                data[pos + 2],
                data[pos + 3],
            ]) as usize;
            if nalu_size == 0 || pos + 4 + nalu_size > data.len() {
                return Err(Error::invalid_argument("invalid NALU size in sample"));
            }

            let is_vcl = is_vcl_nalu(header_len, data[pos + 4]);
            let mut cipher = 0usize;
            if is_vcl && nalu_size > header_len {
                cipher = nalu_size - header_len;
                if self.scheme != ProtectionScheme::Cbcs {
                    // Cipher runs must cover whole AES blocks; the tail
                    // stays clear and prefixes the next subsample.
                    cipher -= cipher % AES_BLOCK_SIZE;
                }
            }

            if cipher > 0 {
                // Length prefix and NALU header go in front of the run.
                clear += (4 + header_len) as u64;
                while clear > u16::MAX as u64 {
                    subsamples.push(SubsampleEntry {
                        clear_bytes: u16::MAX,
                        cipher_bytes: 0,
                    });
                    clear -= u16::MAX as u64;
                }
                subsamples.push(SubsampleEntry {
                    clear_bytes: clear as u16,
                    cipher_bytes: cipher as u32,
                });
                // The partial-block tail carries into the next entry.
                clear = (nalu_size - header_len - cipher) as u64;
            } else {
                clear += (4 + nalu_size) as u64;
            }
            pos += 4 + nalu_size;
        }

        // Trailing clear bytes.
        while clear > 0 {
            let n = std::cmp::min(clear, u16::MAX as u64);
            subsamples.push(SubsampleEntry {
                clear_bytes: n as u16,
                cipher_bytes: 0,
            });
            clear -= n;
        }

        Ok(subsamples)
    }

    // Encrypt the given (offset, len) ranges in place. Returns the
    // number of bytes actually encrypted.
    fn encrypt_range(&self, data: &mut [u8], ranges: &[(usize, usize)]) -> Result<usize> {
        let mut counter = [0u8; 16];
        counter[..self.iv.len()].copy_from_slice(&self.iv);

        let mut encrypted = 0usize;
        if self.scheme.is_ctr() {
            // The key stream is continuous over all cipher runs of the
            // sample.
            let mut cipher = Aes128Ctr::new(&self.key.into(), &counter.into());
            for &(off, len) in ranges {
                if self.scheme.uses_pattern() {
                    encrypted += apply_ctr_pattern(
                        &mut cipher,
                        &mut data[off..off + len],
                        self.crypt_byte_block,
                        self.skip_byte_block,
                    );
                } else {
                    cipher.apply_keystream(&mut data[off..off + len]);
                    encrypted += len;
                }
            }
        } else {
            for &(off, len) in ranges {
                // CBC chains restart on each cipher run.
                let mut cipher = Aes128CbcEnc::new(&self.key.into(), &counter.into());
                let run = &mut data[off..off + len];
                if self.scheme.uses_pattern() {
                    encrypted += apply_cbc_pattern(
                        &mut cipher,
                        run,
                        self.crypt_byte_block,
                        self.skip_byte_block,
                    );
                } else {
                    // Whole blocks only; a partial tail block stays clear.
                    let whole = run.len() - run.len() % AES_BLOCK_SIZE;
                    encrypt_cbc_blocks(&mut cipher, &mut run[..whole]);
                    encrypted += whole;
                }
            }
        }
        Ok(encrypted)
    }
}

fn encrypt_cbc_blocks(cipher: &mut Aes128CbcEnc, data: &mut [u8]) {
    for block in data.chunks_exact_mut(AES_BLOCK_SIZE) {
        cipher.encrypt_block_mut(GenericArray::from_mut_slice(block));
    }
}

// crypt:skip pattern over 16-byte blocks, CTR flavour. The key stream
// advances only over encrypted blocks.
fn apply_ctr_pattern(
    cipher: &mut Aes128Ctr,
    data: &mut [u8],
    crypt_blocks: u8,
    skip_blocks: u8,
) -> usize {
    if crypt_blocks == 0 && skip_blocks == 0 {
        cipher.apply_keystream(data);
        return data.len();
    }
    let mut encrypted = 0;
    let mut pos = 0;
    loop {
        let crypt = std::cmp::min(crypt_blocks as usize * AES_BLOCK_SIZE, data.len() - pos);
        // A partial tail block is left clear.
        let crypt = crypt - crypt % AES_BLOCK_SIZE;
        if crypt == 0 {
            break;
        }
        cipher.apply_keystream(&mut data[pos..pos + crypt]);
        encrypted += crypt;
        pos += crypt;
        pos += skip_blocks as usize * AES_BLOCK_SIZE;
        if pos >= data.len() {
            break;
        }
    }
    encrypted
}

// crypt:skip pattern, CBC flavour. The chain continues from the last
// encrypted block across skipped blocks.
fn apply_cbc_pattern(
    cipher: &mut Aes128CbcEnc,
    data: &mut [u8],
    crypt_blocks: u8,
    skip_blocks: u8,
) -> usize {
    if crypt_blocks == 0 && skip_blocks == 0 {
        let whole = data.len() - data.len() % AES_BLOCK_SIZE;
        encrypt_cbc_blocks(cipher, &mut data[..whole]);
        return whole;
    }
    let mut encrypted = 0;
    let mut pos = 0;
    loop {
        let crypt = std::cmp::min(crypt_blocks as usize * AES_BLOCK_SIZE, data.len() - pos);
        let crypt = crypt - crypt % AES_BLOCK_SIZE;
        if crypt == 0 {
            break;
        }
        encrypt_cbc_blocks(cipher, &mut data[pos..pos + crypt]);
        encrypted += crypt;
        pos += crypt;
        pos += skip_blocks as usize * AES_BLOCK_SIZE;
        if pos >= data.len() {
            break;
        }
    }
    encrypted
}

// Big-endian increment with wrap, 8 or 16 byte IVs.
fn increment_iv(iv: &mut [u8], by: u64) {
    let mut carry = by;
    for byte in iv.iter_mut().rev() {
        if carry == 0 {
            break;
        }
        let sum = *byte as u64 + (carry & 0xff);
        *byte = sum as u8;
        carry = (carry >> 8) + (sum >> 8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iv_increment_carries() {
        let mut iv = vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff];
        increment_iv(&mut iv, 1);
        assert_eq!(iv, vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00]);

        let mut iv = vec![0xff; 8];
        increment_iv(&mut iv, 1);
        assert_eq!(iv, vec![0x00; 8]);

        let mut iv = vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01];
        increment_iv(&mut iv, 0x1_0000);
        assert_eq!(iv, vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01]);
    }

    #[test]
    fn validate_rejects_bad_iv_sizes() {
        let mut config = EncryptionConfig::default();
        config.per_sample_iv_size = 12;
        assert!(config.validate().is_err());

        let mut config = EncryptionConfig::default();
        config.per_sample_iv_size = 0;
        // constant IV without cbcs.
        assert!(config.validate().is_err());

        let mut config = EncryptionConfig::default();
        config.protection_scheme = ProtectionScheme::Cbcs;
        config.per_sample_iv_size = 0;
        config.constant_iv = vec![3; 16];
        config.crypt_byte_block = 1;
        config.skip_byte_block = 9;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_constant_iv_with_per_sample_ivs() {
        let mut config = EncryptionConfig::default();
        config.constant_iv = vec![3; 16];
        assert!(config.validate().is_err());
    }

    fn test_key() -> EncryptionKey {
        EncryptionKey {
            key_id: vec![0x11; 16],
            key: vec![0x22; 16],
            iv: vec![0x33; 8],
            key_system_info: Vec::new(),
        }
    }

    #[test]
    fn whole_sample_encryption_has_no_subsamples() {
        let config = EncryptionConfig::default();
        let mut enc = SampleEncryptor::new(&config, &test_key(), Codec::Aac).unwrap();
        let clear = vec![0xaau8; 100];
        let mut data = clear.clone();
        let entry = enc.encrypt_sample(&mut data).unwrap();
        assert!(entry.subsamples.is_empty());
        assert_eq!(entry.initialization_vector, vec![0x33; 8]);
        assert_ne!(data, clear);
        // 100 bytes = 7 blocks, rounded up.
        assert_eq!(enc.current_iv(), &[0x33, 0x33, 0x33, 0x33, 0x33, 0x33, 0x33, 0x3a]);
    }

    #[test]
    fn avc_sample_keeps_nalu_headers_clear() {
        let config = EncryptionConfig::default();
        let mut enc = SampleEncryptor::new(&config, &test_key(), Codec::H264).unwrap();

        // One non-VCL NALU (SEI, type 6) and one VCL NALU (type 5).
        let sei = [0x06u8, 1, 2, 3];
        let mut vcl = vec![0x65u8];
        vcl.extend_from_slice(&[0x44; 48]);
        let mut sample = Vec::new();
        sample.extend_from_slice(&(sei.len() as u32).to_be_bytes());
        sample.extend_from_slice(&sei);
        sample.extend_from_slice(&(vcl.len() as u32).to_be_bytes());
        sample.extend_from_slice(&vcl);

        let orig = sample.clone();
        let entry = enc.encrypt_sample(&mut sample).unwrap();

        assert_eq!(entry.subsamples.len(), 1);
        // 4 + 4 (SEI) + 4 + 1 (VCL length + header) = 13 clear, and the
        // 48 payload bytes again leave 48 % 16 == 0 -> 48 cipher bytes.
        assert_eq!(entry.subsamples[0].clear_bytes, 13);
        assert_eq!(entry.subsamples[0].cipher_bytes, 48);
        // Clear prefix untouched, payload encrypted.
        assert_eq!(&sample[..13], &orig[..13]);
        assert_ne!(&sample[13..], &orig[13..]);
    }

    #[test]
    fn partial_block_tail_moves_to_clear() {
        let config = EncryptionConfig::default();
        let mut enc = SampleEncryptor::new(&config, &test_key(), Codec::H264).unwrap();

        // VCL NALU with 1 header byte + 40 payload bytes: 40 % 16 = 8
        // trailing bytes must stay clear.
        let mut vcl = vec![0x65u8];
        vcl.extend_from_slice(&[0x55; 40]);
        let mut sample = Vec::new();
        sample.extend_from_slice(&(vcl.len() as u32).to_be_bytes());
        sample.extend_from_slice(&vcl);

        let entry = enc.encrypt_sample(&mut sample).unwrap();
        assert_eq!(entry.subsamples.len(), 2);
        assert_eq!(entry.subsamples[0].clear_bytes, 5);
        assert_eq!(entry.subsamples[0].cipher_bytes, 32);
        assert_eq!(entry.subsamples[1].clear_bytes, 8);
        assert_eq!(entry.subsamples[1].cipher_bytes, 0);
    }

    #[test]
    fn cbcs_constant_iv_reuses_iv() {
        let mut config = EncryptionConfig::default();
        config.protection_scheme = ProtectionScheme::Cbcs;
        config.per_sample_iv_size = 0;
        config.constant_iv = vec![0x44; 16];
        config.crypt_byte_block = 1;
        config.skip_byte_block = 9;
        let mut key = test_key();
        key.iv.clear();

        let mut enc = SampleEncryptor::new(&config, &key, Codec::H264).unwrap();
        let mut vcl = vec![0x65u8];
        vcl.extend_from_slice(&[0x55; 64]);
        let mut sample = Vec::new();
        sample.extend_from_slice(&(vcl.len() as u32).to_be_bytes());
        sample.extend_from_slice(&vcl);

        let entry = enc.encrypt_sample(&mut sample).unwrap();
        assert!(entry.initialization_vector.is_empty());
        assert_eq!(enc.current_iv(), &[0x44; 16][..]);
    }
}
