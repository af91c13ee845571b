use rand::Rng;

pub use cce_db::status::is_valid_bootstrap_token;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// A fresh kubeadm bootstrap token, `[a-z0-9]{6}.[a-z0-9]{16}`.
pub fn generate_bootstrap_token() -> String {
    let mut rng = rand::rng();
    let mut part = |len: usize| -> String {
        (0..len)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect()
    };
    let id = part(6);
    let secret = part(16);
    format!("{id}.{secret}")
}
