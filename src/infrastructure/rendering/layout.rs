//! Greedy line wrapping in font metric space

use std::iter::Peekable;
use std::str::SplitWhitespace;

use crate::application::errors::RenderError;
use crate::infrastructure::fonts::TextMetrics;

/// One wrapped line; `baseline_y` is relative to the top of the text block
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutLine {
    pub text: String,
    pub width: f32,
    pub baseline_y: f32,
}

/// Wrapped text. Lines are computed on demand by [`TextLayout::lines`].
#[derive(Clone, Copy)]
pub struct TextLayout<'a> {
    text: &'a str,
    metrics: &'a dyn TextMetrics,
    max_width: f32,
}

/// Wrap `text` so that no line is wider than `max_width`, except a single
/// token that is wider on its own.
pub fn layout<'a>(text: &'a str, metrics: &'a dyn TextMetrics, max_width: f32) -> Result<TextLayout<'a>, RenderError> {
    if text.trim().is_empty() {
        return Err(RenderError::EmptyText);
    }
    Ok(TextLayout {
        text,
        metrics,
        max_width,
    })
}

impl<'a> TextLayout<'a> {
    /// Fresh iterator over the lines, starting from the first one
    pub fn lines(&self) -> Lines<'a> {
        Lines {
            words: self.text.split_whitespace().peekable(),
            metrics: self.metrics,
            max_width: self.max_width,
            index: 0,
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines().count()
    }

    /// Height of the whole block
    pub fn height(&self) -> f32 {
        self.line_count() as f32 * self.metrics.line_height()
    }

    pub fn max_width(&self) -> f32 {
        self.max_width
    }
}

/// Iterator over the lines of a [`TextLayout`]
pub struct Lines<'a> {
    words: Peekable<SplitWhitespace<'a>>,
    metrics: &'a dyn TextMetrics,
    max_width: f32,
    index: usize,
}

impl Iterator for Lines<'_> {
    type Item = LayoutLine;

    fn next(&mut self) -> Option<LayoutLine> {
        let first = self.words.next()?;
        let mut line = first.to_string();
        let mut width = self.metrics.advance(&line);

        while let Some(word) = self.words.peek() {
            let candidate = format!("{} {}", line, word);
            let candidate_width = self.metrics.advance(&candidate);
            if candidate_width > self.max_width {
                break;
            }
            line = candidate;
            width = candidate_width;
            self.words.next();
        }

        let baseline_y = self.metrics.ascent() + self.index as f32 * self.metrics.line_height();
        self.index += 1;

        Some(LayoutLine {
            text: line,
            width,
            baseline_y,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::fonts::BlockFace;

    fn texts(layout: &TextLayout<'_>) -> Vec<String> {
        layout.lines().map(|l| l.text).collect()
    }

    // BlockFace::new(10) advances 6px per character
    fn face() -> BlockFace {
        BlockFace::new(10)
    }

    #[test]
    fn test_empty_text_rejected() {
        let face = face();
        assert!(matches!(layout("", &face, 100.0), Err(RenderError::EmptyText)));
        assert!(matches!(layout(" \n\t ", &face, 100.0), Err(RenderError::EmptyText)));
    }

    #[test]
    fn test_greedy_wrapping() {
        let face = face();
        // "aa bb" = 30px, "aa bb cc" = 48px
        let layout = layout("aa bb cc dd", &face, 30.0).unwrap();
        assert_eq!(texts(&layout), vec!["aa bb", "cc dd"]);
    }

    #[test]
    fn test_collapses_whitespace() {
        let face = face();
        let layout = layout("  one\n\ntwo\tthree  ", &face, 1000.0).unwrap();
        assert_eq!(texts(&layout), vec!["one two three"]);
    }

    #[test]
    fn test_long_token_alone_and_untruncated() {
        let face = face();
        let text = "a very long supercalifragilisticexpialidocious token";
        let layout = layout(text, &face, 50.0).unwrap();
        let lines = texts(&layout);

        assert!(lines.contains(&"supercalifragilisticexpialidocious".to_string()));
        assert_eq!(lines.join(" "), text);
    }

    #[test]
    fn test_lines_never_exceed_width_unless_single_token() {
        let face = face();
        let text = "a very long single token of length exceeding width and then some more words \
                    interleaved with extraordinarilylongtokens here";

        for width in [1.0, 6.0, 17.0, 50.0, 73.0, 120.0, 500.0] {
            let layout = layout(text, &face, width).unwrap();
            for line in layout.lines() {
                assert!(
                    line.width <= width || !line.text.contains(' '),
                    "line '{}' ({}px) exceeds {}px",
                    line.text,
                    line.width,
                    width
                );
            }
            let rejoined: Vec<String> = layout.lines().map(|l| l.text).collect();
            assert_eq!(rejoined.join(" "), text.split_whitespace().collect::<Vec<_>>().join(" "));
        }
    }

    #[test]
    fn test_layout_is_restartable_and_deterministic() {
        let face = face();
        let text = "the quick brown fox jumps over the lazy dog";
        let layout = layout(text, &face, 60.0).unwrap();

        let first: Vec<LayoutLine> = layout.lines().collect();
        let second: Vec<LayoutLine> = layout.lines().collect();
        assert_eq!(first, second);

        let again = super::layout(text, &face, 60.0).unwrap();
        assert_eq!(again.lines().collect::<Vec<_>>(), first);
    }

    #[test]
    fn test_baselines_and_height() {
        let face = face();
        let layout = layout("aa bb cc", &face, 12.0).unwrap();
        let baselines: Vec<f32> = layout.lines().map(|l| l.baseline_y).collect();

        assert_eq!(baselines, vec![8.0, 20.0, 32.0]);
        assert_eq!(layout.line_count(), 3);
        assert_eq!(layout.height(), 36.0);
    }
}
