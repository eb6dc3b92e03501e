use rapidhash::v3::rapidhash_v3;

/// Canonical byte encoding behind routing table fingerprints.
///
/// Integers are written big-endian with fixed widths and strings carry a
/// length prefix, so the encoding depends neither on the platform nor on how
/// std hashes collections. The buffer is digested with rapidhash V3 (default
/// seed and secrets).
#[derive(Debug, Default)]
pub(crate) struct Fingerprint(Vec<u8>);

impl Fingerprint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u32(&mut self, value: u32) {
        self.0.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.0.extend_from_slice(bytes);
    }

    /// Writes the string's length as `u32`, then its bytes.
    pub fn write_str(&mut self, s: &str) {
        self.write_u32(s.len() as u32);
        self.write_bytes(s.as_bytes());
    }

    pub fn finish(&self) -> u64 {
        rapidhash_v3(&self.0)
    }
}
