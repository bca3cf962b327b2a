//! Hashing utilities

/// FNV-1 32-bit hash of a name, lowercased first (Wwise "short id")
pub fn hash_name(name: &str) -> u32 {
    let mut hash: u32 = 2166136261;
    for byte in name.to_lowercase().bytes() {
        hash = hash.wrapping_mul(16777619);
        hash ^= u32::from(byte);
    }
    hash
}

/// Parses a numeric id, or hashes the text when it isn't one
pub fn id_or_hash(text: &str) -> u32 {
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(id) = text.parse::<u32>() {
            return id;
        }
    }
    hash_name(text)
}

/// CRC32 of some text, used as content hash
pub fn hash_text(text: &str) -> u32 {
    crc32fast::hash(text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv_hash() {
        assert_eq!(hash_name(""), 2166136261);
        assert_eq!(hash_name("SFX"), 393239870);
        assert_eq!(hash_name("English(US)"), 684519430);
        assert_eq!(hash_name("Play_Music"), hash_name("play_music"));
        assert_eq!(hash_name("play_music"), 2932040671);
    }

    #[test]
    fn test_id_or_hash() {
        assert_eq!(id_or_hash("12345"), 12345);
        assert_eq!(id_or_hash("bgm1"), 1189781958);
        // too big for u32, treated as a name
        assert_eq!(id_or_hash("99999999999"), hash_name("99999999999"));
    }
}
