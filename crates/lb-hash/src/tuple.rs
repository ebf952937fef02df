//! The flow identity: a fixed 5-tuple with a stable byte encoding.

use crate::siphash::{self, LOOKUP_KEY};

/// Address-family discriminant used only at construction time to validate
/// that the caller's raw address slices have the length they claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

/// Immutable flow identifier: `(src_ip, dst_ip, src_port, dst_port, protocol)`.
///
/// Addresses are always stored zero-extended (v4) or as-is (v6) into 16
/// bytes; `protocol` is the L4 protocol number (e.g. 6 = TCP, 17 = UDP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FiveTuple {
    pub src_ip: [u8; 16],
    pub dst_ip: [u8; 16],
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: u16,
}

impl FiveTuple {
    /// Validates `family` against the length of `src_ip`/`dst_ip` and
    /// zero-extends 4-byte addresses into the internal 16-byte form.
    ///
    /// # Panics
    ///
    /// Panics if `family` doesn't match the address length — a caller
    /// passing a 4-byte slice tagged `Ipv6` (or vice versa) has a bug, not
    /// a runtime condition to recover from.
    #[must_use]
    pub fn new(
        family: AddressFamily,
        src_ip: &[u8],
        dst_ip: &[u8],
        src_port: u16,
        dst_port: u16,
        protocol: u16,
    ) -> Self {
        let expected_len = match family {
            AddressFamily::Ipv4 => 4,
            AddressFamily::Ipv6 => 16,
        };
        assert!(
            src_ip.len() == expected_len && dst_ip.len() == expected_len,
            "address length {}/{} does not match declared family {:?} (expected {})",
            src_ip.len(),
            dst_ip.len(),
            family,
            expected_len
        );

        let mut src = [0u8; 16];
        let mut dst = [0u8; 16];
        src[..src_ip.len()].copy_from_slice(src_ip);
        dst[..dst_ip.len()].copy_from_slice(dst_ip);

        Self {
            src_ip: src,
            dst_ip: dst,
            src_port,
            dst_port,
            protocol,
        }
    }

    /// Builds a tuple directly from already-16-byte addresses, skipping the
    /// family check (used internally and by tests that already hold a
    /// canonical 16-byte form).
    #[must_use]
    pub fn from_raw16(
        src_ip: [u8; 16],
        dst_ip: [u8; 16],
        src_port: u16,
        dst_port: u16,
        protocol: u16,
    ) -> Self {
        Self {
            src_ip,
            dst_ip,
            src_port,
            dst_port,
            protocol,
        }
    }

    /// 38-byte little-endian record: `src_ip(16) || dst_ip(16) ||
    /// src_port(2) || dst_port(2) || proto(2)`.
    #[must_use]
    pub fn encode(&self) -> [u8; 38] {
        let mut out = [0u8; 38];
        out[0..16].copy_from_slice(&self.src_ip);
        out[16..32].copy_from_slice(&self.dst_ip);
        out[32..34].copy_from_slice(&self.src_port.to_le_bytes());
        out[34..36].copy_from_slice(&self.dst_port.to_le_bytes());
        out[36..38].copy_from_slice(&self.protocol.to_le_bytes());
        out
    }

    /// `SipHash(LOOKUP_KEY, 0, encode())` — the hash fed to the Maglev table.
    #[must_use]
    pub fn hash(&self) -> u64 {
        siphash::hash(LOOKUP_KEY, 0, &self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_field_order() {
        let t = FiveTuple::from_raw16([1; 16], [2; 16], 0x1234, 0x5678, 6);
        let enc = t.encode();
        assert_eq!(&enc[0..16], &[1u8; 16]);
        assert_eq!(&enc[16..32], &[2u8; 16]);
        assert_eq!(&enc[32..34], &0x1234u16.to_le_bytes());
        assert_eq!(&enc[34..36], &0x5678u16.to_le_bytes());
        assert_eq!(&enc[36..38], &6u16.to_le_bytes());
    }

    #[test]
    fn test_equal_tuples_hash_equal() {
        let a = FiveTuple::new(AddressFamily::Ipv4, &[10, 0, 0, 1], &[10, 0, 0, 2], 1111, 80, 6);
        let b = FiveTuple::new(AddressFamily::Ipv4, &[10, 0, 0, 1], &[10, 0, 0, 2], 1111, 80, 6);
        assert_eq!(a, b);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_differing_field_changes_hash() {
        let a = FiveTuple::new(AddressFamily::Ipv4, &[10, 0, 0, 1], &[10, 0, 0, 2], 1111, 80, 6);
        let b = FiveTuple::new(AddressFamily::Ipv4, &[10, 0, 0, 1], &[10, 0, 0, 2], 1112, 80, 6);
        assert_ne!(a, b);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_v4_zero_extension() {
        let t = FiveTuple::new(AddressFamily::Ipv4, &[192, 168, 1, 1], &[192, 168, 1, 2], 1, 2, 6);
        assert_eq!(&t.src_ip[..4], &[192, 168, 1, 1]);
        assert_eq!(&t.src_ip[4..], &[0u8; 12]);
    }

    #[test]
    fn test_v6_passthrough() {
        let addr = [0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        let t = FiveTuple::new(AddressFamily::Ipv6, &addr, &addr, 1, 2, 17);
        assert_eq!(t.src_ip, addr);
    }

    #[test]
    #[should_panic(expected = "does not match declared family")]
    fn test_family_mismatch_is_fatal() {
        let _ = FiveTuple::new(AddressFamily::Ipv6, &[1, 2, 3, 4], &[1, 2, 3, 4], 1, 2, 6);
    }
}
