pub fn format_function_name(function_name: &str) -> String {
    if function_name.is_empty() {
        return "Unknown Function".to_string();
    }
    let name = function_name.strip_prefix("mock_").unwrap_or(function_name);
    capitalize_words(name)
}

pub fn format_key_name(key: &str) -> String {
    capitalize_words(key)
}

fn capitalize_words(snake: &str) -> String {
    snake
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cuts `text` to `max_chars` characters and appends `...` when it was longer.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

pub fn format_url(url: &str) -> String {
    let without_scheme = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    without_scheme
        .strip_suffix('/')
        .unwrap_or(without_scheme)
        .to_string()
}

pub fn shorten_prompt(prompt: &str) -> String {
    let words: Vec<&str> = prompt.split(' ').collect();
    let shortened = words[..words.len().min(4)].join(" ");
    if words.len() > 4 {
        format!("{shortened}...")
    } else {
        shortened
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_names_are_prettified() {
        assert_eq!(format_function_name("mock_open_browser_tab"), "Open Browser Tab");
        assert_eq!(format_function_name("extract_rows"), "Extract Rows");
        assert_eq!(format_function_name("run_mock_step"), "Run Mock Step");
        assert_eq!(format_function_name(""), "Unknown Function");
    }

    #[test]
    fn key_names_keep_empty_segments_as_spaces() {
        assert_eq!(format_key_name("first_name"), "First Name");
        assert_eq!(format_key_name("a__b"), "A  B");
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("exactly10!", 10), "exactly10!");
        assert_eq!(truncate_text("déjà vu all over", 7), "déjà vu...");
    }

    #[test]
    fn urls_lose_scheme_and_one_trailing_slash() {
        assert_eq!(format_url("https://example.com/"), "example.com");
        assert_eq!(format_url("http://example.com/a/b"), "example.com/a/b");
        assert_eq!(format_url("ftp://example.com//"), "ftp://example.com/");
        assert_eq!(format_url(""), "");
    }

    #[test]
    fn prompts_keep_four_words() {
        assert_eq!(shorten_prompt("find me cheap flights"), "find me cheap flights");
        assert_eq!(
            shorten_prompt("find me cheap flights to Lisbon"),
            "find me cheap flights..."
        );
    }
}
