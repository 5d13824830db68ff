//! Text normalization shared by the menu index, retrieval, and line identity.
//!
//! Both synonym phrases (at index-build time) and utterances (at query time) go
//! through [`normalize_text`], so token comparison is plain string equality.

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Lowercase, strip diacritics, turn punctuation into spaces, collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    let folded = text
        .nfd()
        .filter(|character| !is_combining_mark(*character))
        .flat_map(char::to_lowercase)
        .map(|character| match character {
            // Turkish dotless i has no decomposition.
            'ı' => 'i',
            other if other.is_alphanumeric() => other,
            _ => ' ',
        })
        .collect::<String>();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn tokenize(text: &str) -> Vec<String> {
    normalize_text(text).split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::{normalize_text, tokenize};

    #[test]
    fn strips_turkish_diacritics() {
        assert_eq!(normalize_text("Tavuk Şiş"), "tavuk sis");
        assert_eq!(normalize_text("AYRANI ÇIKAR"), "ayrani cikar");
        assert_eq!(normalize_text("İskender"), "iskender");
        assert_eq!(normalize_text("Gözleme"), "gozleme");
    }

    #[test]
    fn collapses_whitespace_and_punctuation() {
        assert_eq!(normalize_text("  bir   adana,  bir ayran! "), "bir adana bir ayran");
    }

    #[test]
    fn tokenizes_normalized_words() {
        assert_eq!(tokenize("Bir Adana-Kebap"), vec!["bir", "adana", "kebap"]);
        assert!(tokenize("  ...  ").is_empty());
    }
}
