//! Small stable helpers shared across modules.

/// Number of slots in the series→pool lookup table (spec §3).
pub const LOOKUP_SIZE: usize = 8192;

/// Hash a series name down to a lookup slot.
///
/// Spec §4.1 leaves the hash function as an implementation choice, "must
/// be stable across versions and platforms... a 32-bit CRC-like function
/// over the UTF-8 bytes is adequate". We use CRC-32C (Castagnoli), the
/// same checksum pgdog already depends on for its own wire framing, which
/// keeps the dependency stack aligned with the teacher crate rather than
/// hand-rolling a checksum. Once chosen this is part of the wire
/// contract and must not change across versions.
pub fn series_slot(name: &str) -> usize {
    (crc32c::crc32c(name.as_bytes()) as usize) % LOOKUP_SIZE
}
