// docvault-core/src/id.rs
// Identifier generation for new records

use chrono::Utc;
use uuid::Uuid;

/// New opaque record id: `<13 hex digits of µs since epoch>.<16 random hex>`.
///
/// The time prefix only helps humans reading the file; the 64 random bits
/// carry uniqueness across processes. Callers must not rely on ordering or
/// density.
pub fn generate_id() -> String {
    let micros = Utc::now().timestamp_micros().max(0) as u64;
    format!("{:013x}.{:016x}", micros, random_u64())
}

// The low half of a v4 UUID starts with the two fixed variant bits; the
// lowest two bits of the high half are random and fill that gap.
fn random_u64() -> u64 {
    let (high, low) = Uuid::new_v4().as_u64_pair();
    (low & VARIANT_MASK) | ((high & 0b11) << 62)
}

const VARIANT_MASK: u64 = !(0b11 << 62);
