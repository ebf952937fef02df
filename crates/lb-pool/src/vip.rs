/// A 16-byte virtual IP address, v4-mapped the same way `FiveTuple`
/// zero-extends a 4-byte address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Vip(pub [u8; 16]);

impl Vip {
    /// # Panics
    ///
    /// Panics if `bytes` is neither 4 nor 16 bytes long — a malformed VIP
    /// in the config is a programmer/operator error, not a runtime
    /// condition (§7).
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        assert!(
            bytes.len() == 4 || bytes.len() == 16,
            "VIP address must be 4 or 16 bytes, got {}",
            bytes.len()
        );
        let mut v = [0u8; 16];
        v[..bytes.len()].copy_from_slice(bytes);
        Self(v)
    }
}
