#[cfg(test)]
mod rand_test;

use rand::{thread_rng, Rng};

/// ice-char = ALPHA / DIGIT / "+" / "/"; only the lowercase subset is
/// emitted.
const RUNES_ICE_CHAR: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789+/";

const LEN_UFRAG: usize = 4;
const LEN_PWD: usize = 22;
const LEN_FOUNDATION: usize = 10;

pub fn generate_ice_string(n: usize) -> String {
    let mut rng = thread_rng();

    (0..n)
        .map(|_| {
            let idx = rng.gen_range(0..RUNES_ICE_CHAR.len());
            RUNES_ICE_CHAR[idx] as char
        })
        .collect()
}

/// Generates an ICE ufrag (RFC 5245 section 15.4).
pub fn generate_ufrag() -> String {
    generate_ice_string(LEN_UFRAG)
}

/// Generates an ICE pwd (RFC 5245 section 15.4).
pub fn generate_pwd() -> String {
    generate_ice_string(LEN_PWD)
}

/// Generates a foundation for a peer-reflexive candidate.
pub fn generate_foundation() -> String {
    generate_ice_string(LEN_FOUNDATION)
}
