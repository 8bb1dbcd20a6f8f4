const UNSAFE_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const MAX_LEN: usize = 200;

/// Make `s` safe to use as a file name component.
pub fn sanitize_filename(s: &str) -> String {
    let replaced: String = s
        .chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { '_' } else { c })
        .take(MAX_LEN)
        .collect();
    // Trim after truncating so a cut never leaves a trailing dot or space
    replaced
        .trim_start()
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string()
}

/// Output file name for one chapter.
pub fn chapter_filename(manga_title: &str, chapter_label: &str) -> String {
    format!(
        "{}_chapter_{}.pdf",
        sanitize_filename(manga_title),
        sanitize_filename(chapter_label)
    )
}

pub fn language_name(code: &str) -> String {
    let name = match code {
        "en" => "English",
        "ja" => "Japanese",
        "ko" => "Korean",
        "zh" => "Chinese",
        "id" => "Indonesian",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "ru" => "Russian",
        "pt" => "Portuguese",
        "it" => "Italian",
        "th" => "Thai",
        "vi" => "Vietnamese",
        "ar" => "Arabic",
        "tr" => "Turkish",
        _ => return code.to_uppercase(),
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_unsafe_characters() {
        assert_eq!(
            "Attack on Titan_ Final Season_",
            sanitize_filename("Attack on Titan: Final Season?")
        );
        assert_eq!("a_b_c_d_e_f_g_h_i", sanitize_filename("a<b>c:d\"e/f\\g|h?i"));
        assert_eq!("a_b", sanitize_filename("a*b"));
    }

    #[test]
    fn strips_trailing_dots_and_spaces() {
        assert_eq!("Who Am I", sanitize_filename("  Who Am I... "));
        assert_eq!("Vol. 1", sanitize_filename("Vol. 1."));
    }

    #[test]
    fn truncates_long_names() {
        let long = "x".repeat(250);
        assert_eq!(200, sanitize_filename(&long).chars().count());

        let cut_on_space = format!("{} tail", "y".repeat(199));
        assert_eq!("y".repeat(199), sanitize_filename(&cut_on_space));
    }

    #[test]
    fn sanitize_is_idempotent() {
        let samples = [
            "Attack on Titan: Final Season?",
            " dots... ",
            "plain",
            "",
            "...",
            "日本語: タイトル?",
        ];
        for sample in samples {
            let once = sanitize_filename(sample);
            assert_eq!(once, sanitize_filename(&once), "sample {:?}", sample);
        }
        let long = format!("{}. .", "z".repeat(198));
        let once = sanitize_filename(&long);
        assert_eq!(once, sanitize_filename(&once));
    }

    #[test]
    fn chapter_filename_joins_parts() {
        assert_eq!(
            "Bloom Into You_chapter_12.5.pdf",
            chapter_filename("Bloom Into You", "12.5")
        );
        assert_eq!("A_B_chapter_Unknown.pdf", chapter_filename("A/B", "Unknown"));
    }

    #[test]
    fn language_names() {
        assert_eq!("Indonesian", language_name("id"));
        assert_eq!("PT-BR", language_name("pt-br"));
    }
}
