//! Splitting long text into a thread of posts.

/// Splits `text` into parts of at most `limit` characters each.
///
/// Cuts at the last whitespace inside the window when there is one and
/// hard-cuts otherwise. Whitespace at the cut is dropped. Text that fits is
/// returned as a single part.
#[must_use]
pub fn split_thread(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut parts = Vec::new();
    let mut rest = text.trim();

    while rest.chars().count() > limit {
        // Byte offset just past the `limit`-th character.
        let window_end = rest
            .char_indices()
            .nth(limit)
            .map_or(rest.len(), |(offset, _)| offset);
        let window = &rest[..window_end];

        let at_boundary = rest[window_end..]
            .chars()
            .next()
            .is_some_and(char::is_whitespace);
        let cut = if at_boundary {
            window_end
        } else {
            window
                .char_indices()
                .filter(|(_, c)| c.is_whitespace())
                .map(|(offset, _)| offset)
                .last()
                .filter(|&offset| offset > 0)
                .unwrap_or(window_end)
        };

        parts.push(rest[..cut].trim_end().to_string());
        rest = rest[cut..].trim_start();
    }

    if !rest.is_empty() || parts.is_empty() {
        parts.push(rest.to_string());
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_part() {
        assert_eq!(split_thread("hello there", 280), vec!["hello there"]);
        assert_eq!(split_thread("", 280), vec![""]);
    }

    #[test]
    fn splits_at_whitespace() {
        let parts = split_thread("one two three four", 9);
        assert_eq!(parts, vec!["one two", "three", "four"]);
    }

    #[test]
    fn hard_cuts_long_words() {
        let parts = split_thread("abcdefghij", 4);
        assert_eq!(parts, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn parts_respect_limit_and_keep_words() {
        let text = "lorem ipsum dolor sit amet ".repeat(40);
        let parts = split_thread(&text, 50);

        assert!(parts.len() > 1);
        for part in &parts {
            assert!(part.chars().count() <= 50, "part too long: {part:?}");
            assert!(!part.starts_with(' ') && !part.ends_with(' '));
        }
        let rejoined = parts.join(" ");
        assert_eq!(rejoined, text.trim());
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "👤 👩 👤 👩";
        let parts = split_thread(text, 3);
        assert_eq!(parts, vec!["👤 👩", "👤 👩"]);
    }
}
