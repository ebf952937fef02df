//! SipHash-2-4: a keyed 64-bit hash with 2 compression rounds and 4
//! finalization rounds.
//!
//! Implemented in-tree rather than pulled from a crate: the three
//! domain-separated keys and the published reference vector this module is
//! pinned to (`test_reference_vector_zero_key_empty_message`) only mean
//! anything if we control the exact round schedule ourselves.

const INIT_V0: u64 = 0x736f6d6570736575;
const INIT_V1: u64 = 0x646f72616e646f6d;
const INIT_V2: u64 = 0x6c7967656e657261;
const INIT_V3: u64 = 0x7465646279746573;

/// Domain-separation keys for the three uses of SipHash in this crate family.
/// Distinct constants prevent correlation between a backend's Maglev offset
/// and skip, and between table construction and the lookup hash.
pub const OFFSET_KEY: u64 = 0x35d5_3c53_71bd_f886;
pub const SKIP_KEY: u64 = 0x9e1d_bc70_2649_df3a;
pub const LOOKUP_KEY: u64 = 0xdd5d_6350_24f1_9f34;

#[inline]
fn rotl(x: u64, b: u32) -> u64 {
    (x << b) | (x >> (64 - b))
}

#[inline]
fn sipround(v0: &mut u64, v1: &mut u64, v2: &mut u64, v3: &mut u64) {
    *v0 = v0.wrapping_add(*v1);
    *v1 = rotl(*v1, 13);
    *v1 ^= *v0;
    *v0 = rotl(*v0, 32);

    *v2 = v2.wrapping_add(*v3);
    *v3 = rotl(*v3, 16);
    *v3 ^= *v2;

    *v0 = v0.wrapping_add(*v3);
    *v3 = rotl(*v3, 21);
    *v3 ^= *v0;

    *v2 = v2.wrapping_add(*v1);
    *v1 = rotl(*v1, 17);
    *v1 ^= *v2;
    *v2 = rotl(*v2, 32);
}

/// Total function: SipHash-2-4 of `msg` under the 128-bit key `(k0, k1)`.
/// Never fails, allocates nothing.
#[must_use]
pub fn hash(k0: u64, k1: u64, msg: &[u8]) -> u64 {
    let mut v0 = INIT_V0 ^ k0;
    let mut v1 = INIT_V1 ^ k1;
    let mut v2 = INIT_V2 ^ k0;
    let mut v3 = INIT_V3 ^ k1;

    let b: u64 = (msg.len() as u64) << 56;

    let mut chunks = msg.chunks_exact(8);
    for block in &mut chunks {
        let m = u64::from_le_bytes(block.try_into().expect("exact 8-byte chunk"));
        v3 ^= m;
        sipround(&mut v0, &mut v1, &mut v2, &mut v3);
        sipround(&mut v0, &mut v1, &mut v2, &mut v3);
        v0 ^= m;
    }

    let tail = chunks.remainder();
    let mut last_block = [0u8; 8];
    last_block[..tail.len()].copy_from_slice(tail);
    let m = u64::from_le_bytes(last_block) | b;

    v3 ^= m;
    sipround(&mut v0, &mut v1, &mut v2, &mut v3);
    sipround(&mut v0, &mut v1, &mut v2, &mut v3);
    v0 ^= m;

    v2 ^= 0xff;
    sipround(&mut v0, &mut v1, &mut v2, &mut v3);
    sipround(&mut v0, &mut v1, &mut v2, &mut v3);
    sipround(&mut v0, &mut v1, &mut v2, &mut v3);
    sipround(&mut v0, &mut v1, &mut v2, &mut v3);

    v0 ^ v1 ^ v2 ^ v3
}
