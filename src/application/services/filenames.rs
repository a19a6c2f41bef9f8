use chrono::Utc;

const AUDIO_SUFFIX: &str = ".mp3";
const MAX_QUERY_LEN: usize = 255;

/// Reduces an untrusted upload name to `[A-Za-z0-9._-]`, always ending in `.mp3`.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .replace('\0', "")
        .replace("..", "");

    let mut safe = String::with_capacity(base.len());
    for c in base.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            c
        } else {
            '_'
        };
        if c == '_' && safe.ends_with('_') {
            continue;
        }
        safe.push(c);
    }

    let mut safe = safe.trim_matches(|c| c == '_' || c == '.').to_string();
    if safe.is_empty() {
        safe = "unnamed".to_string();
    }
    if !safe.to_lowercase().ends_with(AUDIO_SUFFIX) {
        safe.push_str(AUDIO_SUFFIX);
    }
    safe
}

/// `{stem}_{YYYYMMDD_HHMMSS}_{8 hex}.mp3`, unique per upload.
pub fn unique_filename(original: &str) -> String {
    let sanitized = sanitize_filename(original);
    let split = sanitized.len() - AUDIO_SUFFIX.len();
    let (stem, suffix) = sanitized.split_at(split);
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let random_suffix: u32 = rand::random();

    format!("{stem}_{timestamp}_{random_suffix:08x}{suffix}")
}

/// Strips characters used for markup or query injection, trims, and caps the length.
pub fn sanitize_search_query(query: &str) -> String {
    query
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '"' | '\'' | ';' | '(' | ')' | '{' | '}' | '\\'))
        .collect::<String>()
        .trim()
        .chars()
        .take(MAX_QUERY_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spaces_become_single_underscores() {
        assert_eq!(sanitize_filename("sample  3.mp3"), "sample_3.mp3");
    }

    #[test]
    fn path_components_and_traversal_are_removed() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd.mp3");
        assert_eq!(sanitize_filename("C:\\music\\song.MP3"), "song.MP3");
    }

    #[test]
    fn markup_is_neutralised() {
        assert_eq!(sanitize_filename("a<b>c\"d'.mp3"), "a_b_c_d_.mp3");
    }

    #[test]
    fn empty_names_fall_back_to_unnamed() {
        assert_eq!(sanitize_filename("..."), "unnamed.mp3");
        assert_eq!(sanitize_filename(""), "unnamed.mp3");
    }

    #[test]
    fn executable_suffix_is_forced_to_mp3() {
        assert_eq!(sanitize_filename("virus.exe"), "virus.exe.mp3");
    }

    #[test]
    fn unique_filename_keeps_stem_and_suffix() {
        let name = unique_filename("my talk.mp3");
        assert!(name.starts_with("my_talk_"));
        assert!(name.ends_with(".mp3"));
        assert_ne!(name, unique_filename("my talk.mp3"));
    }

    #[test]
    fn search_query_drops_injection_characters() {
        assert_eq!(sanitize_search_query("  sample'; DROP--  "), "sample DROP--");
        assert_eq!(sanitize_search_query("<>"), "");
        assert_eq!(sanitize_search_query(&"a".repeat(300)).len(), 255);
    }
}
