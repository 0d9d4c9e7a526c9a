//! Heading normalization applied to markdown carried by workflow steps.

/// Words kept lower-case unless they open the title.
const SMALL_WORDS: &[&str] = &[
    "a", "an", "and", "but", "for", "nor", "or", "so", "yet", "at", "by", "in", "into", "of",
    "on", "onto", "out", "over", "the", "to", "with",
];

// At least one cased character and no lower-case ones, e.g. "API" or "V2".
fn is_upper(word: &str) -> bool {
    let mut cased = false;
    for c in word.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            cased = true;
        }
    }
    cased
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Title-case a heading, preserving all-caps abbreviations.
pub fn normalize_title(title: &str) -> String {
    let words: Vec<&str> = title.split_whitespace().collect();
    let Some((first, rest)) = words.split_first() else {
        return title.to_string();
    };

    let mut out = Vec::with_capacity(words.len());
    out.push(if is_upper(first) {
        first.to_string()
    } else {
        capitalize(first)
    });
    for word in rest {
        if is_upper(word) {
            out.push(word.to_string());
        } else if SMALL_WORDS.contains(&word.to_lowercase().as_str()) {
            out.push(word.to_lowercase());
        } else {
            out.push(capitalize(word));
        }
    }
    out.join(" ")
}

/// Normalize every `#`-prefixed heading line; other lines pass through untouched.
pub fn normalize_markdown_titles(markdown: &str) -> String {
    markdown
        .split('\n')
        .map(|line| {
            if !line.starts_with('#') {
                return line.to_string();
            }
            match line.split_once(' ') {
                Some((hashes, rest)) => format!("{hashes} {}", normalize_title(rest)),
                None => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_words_stay_lower() {
        assert_eq!(
            normalize_title("the art of WAR in the AI age"),
            "The Art of WAR in the AI Age"
        );
    }

    #[test]
    fn first_word_is_capitalized_even_if_small() {
        assert_eq!(normalize_title("of mice and men"), "Of Mice and Men");
    }

    #[test]
    fn mixed_case_words_are_recapitalized() {
        assert_eq!(normalize_title("iPhone sALES report"), "Iphone Sales Report");
    }

    #[test]
    fn blank_title_is_left_alone() {
        assert_eq!(normalize_title(""), "");
        assert_eq!(normalize_title("   "), "   ");
    }

    #[test]
    fn only_heading_lines_change() {
        let input = "# getting started with the API\nbody text stays as is\n## next steps\n#hashtag";
        let expected =
            "# Getting Started with the API\nbody text stays as is\n## Next Steps\n#hashtag";
        assert_eq!(normalize_markdown_titles(input), expected);
    }
}
