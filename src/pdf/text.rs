use crate::fonts::Measure;
use crate::model::TextConfig;

/// Greedy word wrap into lines no wider than `max_width - 2 * margin`.
///
/// Explicit newlines start a new line. A word that cannot fit on a line of
/// its own is split between characters; every returned line that is wider
/// than the available width holds exactly one character.
pub(crate) fn wrap(
    font: &impl Measure,
    text: &str,
    max_width: f32,
    font_size: f32,
    margin: f32,
) -> Vec<String> {
    let available = (max_width - 2.0 * margin).max(0.0);
    let fits = |s: &str| font.text_width(s, font_size) <= available;

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if current.is_empty() {
                if fits(word) {
                    current.push_str(word);
                    continue;
                }
            } else {
                let candidate = format!("{current} {word}");
                if fits(&candidate) {
                    current = candidate;
                    continue;
                }
                lines.push(std::mem::take(&mut current));
                if fits(word) {
                    current.push_str(word);
                    continue;
                }
            }

            // The word alone is wider than the column.
            for ch in word.chars() {
                current.push(ch);
                if current.chars().nth(1).is_some() && !fits(&current) {
                    current.pop();
                    lines.push(std::mem::take(&mut current));
                    current.push(ch);
                }
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    lines
}

pub(crate) fn line_height(font_size: f32, text: &TextConfig) -> f32 {
    font_size * text.line_spacing
}

/// Height needed to show `content` wrapped in a cell `max_width` wide, never
/// less than `min_height`. Sizing a row and drawing it both go through here,
/// so the two always agree.
pub(crate) fn required_height(
    font: &impl Measure,
    content: &str,
    max_width: f32,
    font_size: f32,
    text: &TextConfig,
    min_height: f32,
) -> f32 {
    let lines = wrap(font, content, max_width, font_size, text.margin).len();
    min_height.max(lines as f32 * line_height(font_size, text) + text.padding)
}
