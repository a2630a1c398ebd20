//! Splits an entry's text into the chunks that get embedded individually.
//!
//! Consolidated participant text is one `Label: value` field per line, so
//! lines are the natural boundary:
//! 1. Merge consecutive lines up to the character budget
//! 2. A single line over the budget (long narrative answers) is split at
//!    whitespace, or at a char boundary as a last resort

/// Chunk `text` into pieces of at most `budget` characters.
pub fn chunk_text(text: &str, budget: usize) -> Vec<String> {
    let budget = budget.max(1);
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let line_chars = line.chars().count();

        if line_chars > budget {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_chars = 0;
            }
            split_long_line(line, budget, &mut chunks);
            continue;
        }

        // +1 for the joining newline
        if !current.is_empty() && current_chars + 1 + line_chars > budget {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }

        if !current.is_empty() {
            current.push('\n');
            current_chars += 1;
        }
        current.push_str(line);
        current_chars += line_chars;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

fn split_long_line(line: &str, budget: usize, chunks: &mut Vec<String>) {
    let mut piece = String::new();
    let mut piece_chars = 0usize;

    for word in line.split_whitespace() {
        let word_chars = word.chars().count();

        if word_chars > budget {
            if !piece.is_empty() {
                chunks.push(std::mem::take(&mut piece));
                piece_chars = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for window in chars.chunks(budget) {
                chunks.push(window.iter().collect());
            }
            continue;
        }

        let sep = usize::from(!piece.is_empty());
        if piece_chars + sep + word_chars > budget {
            chunks.push(std::mem::take(&mut piece));
            piece_chars = 0;
        }
        if !piece.is_empty() {
            piece.push(' ');
            piece_chars += 1;
        }
        piece.push_str(word);
        piece_chars += word_chars;
    }

    if !piece.is_empty() {
        chunks.push(piece);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_empty() {
        assert!(chunk_text("", 100).is_empty());
        assert!(chunk_text("   \n\n  ", 100).is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let text = "[ID:p1]\nNome: Ana\nCargo: CFO";
        assert_eq!(chunk_text(text, 600), vec![text.to_string()]);
    }

    #[test]
    fn test_lines_are_merged_up_to_budget() {
        let text = "aaaa\nbbbb\ncccc";
        // "aaaa\nbbbb" is 9 chars; adding "\ncccc" would exceed 10
        assert_eq!(chunk_text(text, 10), vec!["aaaa\nbbbb", "cccc"]);
    }

    #[test]
    fn test_long_line_split_at_whitespace() {
        let line = "Conquistas: liderou a expansão regional da empresa";
        let chunks = chunk_text(line, 20);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
        assert_eq!(chunks.join(" "), line);
    }

    #[test]
    fn test_giant_word_split_at_char_boundary() {
        let word = "é".repeat(25);
        let chunks = chunk_text(&word, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].chars().count(), 5);
    }
}
