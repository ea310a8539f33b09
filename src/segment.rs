//! Article segmentation: splits brief text into per-story sections.

use std::ops::Range;

/// One story-sized slice of a brief
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Cleaned heading text, `None` for preambles and plain paragraphs
    pub title: Option<String>,
    /// Byte range into the source text
    pub range: Range<usize>,
}

impl Segment {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.range.clone()]
    }
}

/// Split `text` into segments.
///
/// Markdown headings start a new segment; text before the first heading is
/// kept as an untitled segment when it is not blank. Text without headings is
/// split on blank lines instead. Segments never overlap and are in text order.
pub fn segment(text: &str) -> Vec<Segment> {
    let lines = lines_with_offsets(text);
    if lines.iter().any(|(_, line)| heading_level(line).is_some()) {
        by_headings(text, &lines)
    } else {
        by_paragraphs(&lines)
    }
}

/// Index of the segment containing byte `offset`
pub fn segment_at(segments: &[Segment], offset: usize) -> Option<usize> {
    let idx = segments.partition_point(|s| s.range.end <= offset);
    segments
        .get(idx)
        .filter(|s| s.range.contains(&offset))
        .map(|_| idx)
}

fn lines_with_offsets(text: &str) -> Vec<(usize, &str)> {
    let mut offset = 0;
    text.split_inclusive('\n')
        .map(|line| {
            let start = offset;
            offset += line.len();
            (start, line)
        })
        .collect()
}

fn heading_level(line: &str) -> Option<usize> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if rest.trim().is_empty() || rest.starts_with(char::is_whitespace) {
        Some(level)
    } else {
        None
    }
}

fn by_headings(text: &str, lines: &[(usize, &str)]) -> Vec<Segment> {
    let starts: Vec<(usize, &str)> = lines
        .iter()
        .filter(|(_, line)| heading_level(line).is_some())
        .copied()
        .collect();

    let mut segments = Vec::with_capacity(starts.len() + 1);
    if let Some(&(first, _)) = starts.first() {
        if !text[..first].trim().is_empty() {
            segments.push(Segment { title: None, range: 0..first });
        }
    }

    for (i, &(start, line)) in starts.iter().enumerate() {
        let end = starts.get(i + 1).map(|&(next, _)| next).unwrap_or(text.len());
        let title = clean_title(line);
        segments.push(Segment {
            title: (!title.is_empty()).then_some(title),
            range: start..end,
        });
    }
    segments
}

fn by_paragraphs(lines: &[(usize, &str)]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current: Option<Range<usize>> = None;

    for &(start, line) in lines {
        if line.trim().is_empty() {
            if let Some(range) = current.take() {
                segments.push(Segment { title: None, range });
            }
            continue;
        }
        let end = start + line.len();
        current = Some(match current {
            Some(range) => range.start..end,
            None => start..end,
        });
    }
    if let Some(range) = current {
        segments.push(Segment { title: None, range });
    }
    segments
}

/// Strip heading markers, list numbering and bold markers from a heading line
pub fn clean_title(line: &str) -> String {
    let no_hashes = line.trim().trim_start_matches('#').trim();
    let no_bold = no_hashes.replace("**", "");
    let trimmed = no_bold.trim();

    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    let rest = &trimmed[digits..];
    let unnumbered = if digits > 0 && (rest.starts_with('.') || rest.starts_with(')')) {
        &rest[1..]
    } else {
        trimmed
    };
    unnumbered.trim().to_string()
}
