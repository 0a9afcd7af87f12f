//! Routing-key pattern matching for topic exchanges.

/// Returns true if `routing_key` matches the binding `pattern`.
///
/// Both are dot-separated words. In the pattern, `*` stands for exactly one
/// word and `#` for zero or more words.
pub fn matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    match_words(&pattern, &key)
}

fn match_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| match_words(rest, &key[skip..])),
        Some((&word, rest)) => match key.split_first() {
            Some((&k, key_rest)) if word == "*" || word == k => match_words(rest, key_rest),
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_keys() {
        assert!(matches("payment.completed", "payment.completed"));
        assert!(!matches("payment.completed", "payment.failed"));
    }

    #[test]
    fn star_matches_one_word() {
        assert!(matches("payment.*", "payment.completed"));
        assert!(!matches("payment.*", "payment"));
        assert!(!matches("payment.*", "payment.completed.late"));
        assert!(!matches("payment.*", "booking.created"));
    }

    #[test]
    fn hash_matches_any_number_of_words() {
        assert!(matches("#", "booking.created"));
        assert!(matches("booking.#", "booking"));
        assert!(matches("booking.#", "booking.created.v2"));
        assert!(matches("#.created", "booking.created"));
        assert!(!matches("#.created", "booking.expired"));
    }
}
