//! Coordination store key layout.
//!
//! ```text
//! /ping/<hostname>             heartbeat timestamp, expires after the TTL
//! /state/<hostname>            processed state graph for that host
//! /command/<hostname>/<verb>   command id
//! /result/<id>                 JSON array of results
//! ```

use otter_core::effects::RandomEffects;

/// Membership directory.
pub const PING_DIR: &str = "/ping";
/// Per-host state directory.
pub const STATE_DIR: &str = "/state";
/// Per-host command directory.
pub const COMMAND_DIR: &str = "/command";
/// Result directory.
pub const RESULT_DIR: &str = "/result";

/// Length of a command id.
pub const NONCE_LEN: usize = 8;
/// Characters a command id is drawn from.
pub const NONCE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// `/ping/<host>`
pub fn ping_key(host: &str) -> String {
    format!("{PING_DIR}/{host}")
}

/// `/state/<host>`
pub fn state_key(host: &str) -> String {
    format!("{STATE_DIR}/{host}")
}

/// `/command/<host>`
pub fn command_dir(host: &str) -> String {
    format!("{COMMAND_DIR}/{host}")
}

/// `/command/<host>/<verb>`
pub fn command_key(host: &str, verb: &str) -> String {
    format!("{COMMAND_DIR}/{host}/{verb}")
}

/// `/result/<id>`
pub fn result_key(id: &str) -> String {
    format!("{RESULT_DIR}/{id}")
}

/// Trailing path segment of a key.
pub fn last_segment(key: &str) -> &str {
    key.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}

/// Draw a fresh command id.
pub async fn generate_nonce<R: RandomEffects + ?Sized>(random: &R) -> String {
    let mut id = String::with_capacity(NONCE_LEN);
    for _ in 0..NONCE_LEN {
        let pick = random.random_below(NONCE_ALPHABET.len() as u64).await as usize;
        id.push(char::from(NONCE_ALPHABET[pick % NONCE_ALPHABET.len()]));
    }
    id
}

/// True for strings shaped like a command id.
pub fn is_valid_nonce(id: &str) -> bool {
    id.len() == NONCE_LEN && id.bytes().all(|b| NONCE_ALPHABET.contains(&b))
}
