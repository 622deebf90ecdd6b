//! Password hashing and generation, matching PostgreSQL's `md5` auth
//! method. Grounded on `pg_objects/utils.py`.

use std::fmt::Write as _;

/// Computes the `md5` password hash PostgreSQL expects in
/// `ALTER USER ... PASSWORD`: `"md5" + md5(password || username)`.
pub fn password_md5(username: &str, password: &str) -> String {
    let digest = md5_hex(format!("{password}{username}").as_bytes());
    format!("md5{digest}")
}

/// Returns `password` unchanged if it already looks like a precomputed
/// `md5...` hash, otherwise hashes it for `username`.
pub fn normalize_password(username: &str, password: &str) -> String {
    if password.starts_with("md5") {
        password.to_string()
    } else {
        password_md5(username, password)
    }
}

/// Generates a random alphanumeric password of the given length, for
/// users whose definition requests a generated password.
pub fn generate_password(length: usize, rng: &mut impl rand::Rng) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

fn md5_hex(data: &[u8]) -> String {
    let digest = md5::compute(data);
    let mut out = String::with_capacity(32);
    for byte in digest.0 {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
