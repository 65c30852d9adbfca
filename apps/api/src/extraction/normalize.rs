//! Text normalization shared by the PDF and DOCX extractors.

use crate::extraction::{BlockStatus, SourcePosition, TextBlock};

const BULLETS: &[char] = &['•', '◦', '▪', '▫', '■', '□', '●', '○', '‣', '⁃', '∙', '·', '*', '-', '–', '—', '>'];

/// Expands typographic ligatures, folds odd whitespace, strips a leading bullet marker and
/// collapses runs of whitespace to a single space.
pub fn normalize_line(raw: &str) -> String {
    let mut expanded = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            'ﬀ' => expanded.push_str("ff"),
            'ﬁ' => expanded.push_str("fi"),
            'ﬂ' => expanded.push_str("fl"),
            'ﬃ' => expanded.push_str("ffi"),
            'ﬄ' => expanded.push_str("ffl"),
            'ﬅ' | 'ﬆ' => expanded.push_str("st"),
            '\u{00A0}' | '\u{2007}' | '\u{202F}' | '\t' => expanded.push(' '),
            '\u{00AD}' | '\u{200B}' | '\u{FEFF}' => {}
            '‘' | '’' => expanded.push('\''),
            '“' | '”' => expanded.push('"'),
            c if c.is_control() => expanded.push(' '),
            c => expanded.push(c),
        }
    }

    let collapsed = expanded.split_whitespace().collect::<Vec<_>>().join(" ");
    strip_bullet(&collapsed).to_string()
}

fn strip_bullet(line: &str) -> &str {
    let mut chars = line.char_indices();
    match chars.next() {
        Some((_, c)) if BULLETS.contains(&c) => {
            // Only a bullet when followed by whitespace: keeps "-5%" or "*nix" intact.
            match chars.next() {
                Some((i, n)) if n.is_whitespace() => line[i..].trim_start(),
                _ => line,
            }
        }
        _ => line,
    }
}

/// Splits one page (or the whole DOCX body) into blocks, one per non-empty line.
/// A page with no readable text yields a single empty UNREADABLE block so callers can warn.
pub fn blocks_for_page(page: u32, text: &str) -> Vec<TextBlock> {
    let mut blocks = Vec::new();

    for raw in text.lines() {
        let line = normalize_line(raw);
        if line.is_empty() {
            continue;
        }
        let paragraph = blocks.len() as u32;
        blocks.push(TextBlock {
            text: line,
            position: SourcePosition { page, paragraph },
            status: BlockStatus::Readable,
        });
    }

    if blocks.is_empty() {
        blocks.push(unreadable_page(page));
    }
    blocks
}

pub fn unreadable_page(page: u32) -> TextBlock {
    TextBlock {
        text: String::new(),
        position: SourcePosition { page, paragraph: 0 },
        status: BlockStatus::Unreadable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ligatures_expand() {
        assert_eq!(normalize_line("ﬁnance and eﬃciency"), "finance and efficiency");
    }

    #[test]
    fn test_bullets_and_whitespace() {
        assert_eq!(normalize_line("  •   Built   REST\u{00A0}APIs  "), "Built REST APIs");
        assert_eq!(normalize_line("- Python"), "Python");
        assert_eq!(normalize_line("-5% churn"), "-5% churn");
    }

    #[test]
    fn test_blank_page_is_unreadable() {
        let blocks = blocks_for_page(3, "   \n\n ");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].status, BlockStatus::Unreadable);
        assert_eq!(blocks[0].position.page, 3);
    }

    #[test]
    fn test_paragraphs_are_numbered_per_page() {
        let blocks = blocks_for_page(2, "Skills\n\nRust, Go\n");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].position, SourcePosition { page: 2, paragraph: 1 });
    }
}
