//! Glob matching for filter patterns

/// Matches `*` (any run) and `?` (one char), ignoring ASCII case
pub fn matches_glob(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();
    matches_glob_recursive(&pattern_chars, &text_chars, 0, 0)
}

fn matches_glob_recursive(pattern: &[char], text: &[char], pi: usize, ti: usize) -> bool {
    if pi == pattern.len() {
        return ti == text.len();
    }

    match pattern[pi] {
        '*' => (ti..=text.len()).any(|i| matches_glob_recursive(pattern, text, pi + 1, i)),
        '?' => ti < text.len() && matches_glob_recursive(pattern, text, pi + 1, ti + 1),
        c => ti < text.len() && text[ti].eq_ignore_ascii_case(&c) && matches_glob_recursive(pattern, text, pi + 1, ti + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_glob() {
        assert!(matches_glob("play_*", "play_bgm"));
        assert!(matches_glob("PLAY_*", "play_bgm"));
        assert!(matches_glob("*.bnk", "music.bnk"));
        assert!(matches_glob("bgm?", "bgm1"));
        assert!(!matches_glob("bgm?", "bgm"));
        assert!(!matches_glob("play_*", "stop_bgm"));
        assert!(matches_glob("*", ""));
    }
}
