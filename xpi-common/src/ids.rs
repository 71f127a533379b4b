//! Identifier helpers

use rand::Rng;
use uuid::Uuid;

/// Length of interview link tokens
pub const LINK_TOKEN_LEN: usize = 10;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Parse UUID from string
pub fn parse(s: &str) -> Result<Uuid, uuid::Error> {
    Uuid::parse_str(s)
}

/// Generate a random lowercase base36 token for interview link URLs
pub fn link_token() -> String {
    let mut rng = rand::thread_rng();
    (0..LINK_TOKEN_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}
