use anyhow::{Context, Result};
use std::io::BufRead;

const SEPARATOR: &str = "===";

/// Lines of one `===`-terminated part of the input, trimmed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Section {
    pub lines: Vec<String>,
}

impl Section {
    /// Blank-line separated blocks, without the `Contents of ...` banners
    /// `readelf` prints ahead of each section.
    pub fn blocks(&self) -> Vec<&[String]> {
        let mut blocks = Vec::new();
        let mut start = None;
        for (i, line) in self.lines.iter().enumerate() {
            if line.is_empty() || line.starts_with("Contents of") {
                if let Some(begin) = start.take() {
                    blocks.push(&self.lines[begin..i]);
                }
            } else if start.is_none() {
                start = Some(i);
            }
        }
        if let Some(begin) = start {
            blocks.push(&self.lines[begin..]);
        }
        blocks
    }
}

/// The three parts of a comparison input, in the order they are streamed.
#[derive(Debug, Default, Clone)]
pub struct InputSections {
    /// Absent when the symbols come from somewhere else.
    pub symbols: Option<Section>,
    pub reference: Section,
    pub candidate: Section,
}

impl InputSections {
    /// Splits the stream on `===` lines. The candidate dump runs to the end
    /// of the stream.
    pub fn read<R: BufRead>(reader: R, with_symbols: bool) -> Result<Self> {
        let mut sections = vec![Section::default()];
        for (number, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("reading input line {}", number + 1))?;
            let line = line.trim();
            if line == SEPARATOR {
                sections.push(Section::default());
            } else if let Some(current) = sections.last_mut() {
                current.lines.push(line.to_string());
            }
        }

        let expected = if with_symbols { 3 } else { 2 };
        if sections.len() < expected {
            log::warn!(
                "Input has {} sections, expected {expected}; missing dumps are empty",
                sections.len()
            );
        }
        if sections.len() > expected {
            log::warn!("Ignoring {} trailing sections", sections.len() - expected);
        }
        sections.resize_with(expected, Section::default);

        let mut sections = sections.into_iter();
        let symbols = if with_symbols { sections.next() } else { None };
        Ok(Self {
            symbols,
            reference: sections.next().unwrap_or_default(),
            candidate: sections.next().unwrap_or_default(),
        })
    }
}
