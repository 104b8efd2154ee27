/// Canonicalize punctuation and whitespace across full-width and half-width scripts.
pub fn normalize_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for ch in raw.chars() {
        let mapped = map_char(ch);
        if mapped.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(mapped);
    }
    out
}

/// `normalize_text` plus lowercasing; used for alias and entry keys.
pub fn normalize_key(raw: &str) -> String {
    normalize_text(raw)
        .chars()
        .map(lower_char)
        .collect()
}

/// One-to-one lowercase mapping so char offsets stay aligned with the source text.
pub fn lower_char(ch: char) -> char {
    let mut lower = ch.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(c), None) => c,
        _ => ch,
    }
}

fn map_char(ch: char) -> char {
    match ch {
        '\u{3000}' => ' ',
        // Full-width ASCII block.
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(ch as u32 - 0xFEE0).unwrap_or(ch),
        '、' => ',',
        '。' => '.',
        '【' | '「' => '(',
        '】' | '」' => ')',
        '《' => '<',
        '》' => '>',
        '—' | '–' | '―' | '‐' | '‑' | '−' => '-',
        '“' | '”' | '„' | '〝' | '〞' => '"',
        '‘' | '’' | '‚' | '′' => '\'',
        '〜' => '~',
        _ => ch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_width_punctuation_becomes_ascii() {
        assert_eq!(normalize_text("曼联：胜，赔率１．８５"), "曼联:胜,赔率1.85");
    }

    #[test]
    fn collapses_and_trims_whitespace() {
        assert_eq!(normalize_text("  曼联 \t\n  切尔西\u{3000}胜 "), "曼联 切尔西 胜");
    }

    #[test]
    fn unifies_dashes_and_quotes() {
        assert_eq!(normalize_text("2—1 “主胜”"), "2-1 \"主胜\"");
        assert_eq!(normalize_text("胜－平"), "胜-平");
    }

    #[test]
    fn key_is_lowercase() {
        assert_eq!(normalize_key(" Man  UTD "), "man utd");
    }
}
