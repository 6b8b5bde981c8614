//! Line classification and record segmentation.
//!
//! Extracted statement text has lost its table layout. A record starts on a
//! line beginning with a `dd.mm.yyyy` date, and every following line that is
//! neither boilerplate nor another date belongs to it.

use crate::amount::DATE_PATTERN;
use crate::error::Result;
use crate::types::ParseDiagnostics;
use regex::Regex;
use std::sync::OnceLock;

/// Any date token.
pub fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"\b{DATE_PATTERN}\b")).expect("date regex"))
}

/// A date token at the very start of a line.
pub fn leading_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"^{DATE_PATTERN}\b")).expect("leading date regex"))
}

/// Classification of one input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    /// Begins with a date and opens a new record.
    RecordStart,
    /// Blank line or repeated page boilerplate.
    Noise,
    /// Belongs to the currently open record.
    Continuation,
}

/// Boilerplate signatures for one statement layout.
///
/// Statement templates change over time, so the list can be extended at
/// runtime with [`NoiseFilter::with_patterns`].
#[derive(Debug, Clone)]
pub struct NoiseFilter {
    patterns: Vec<Regex>,
}

impl NoiseFilter {
    /// Compile a filter from regex sources.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Add more signatures on top of the current list.
    pub fn with_patterns<I, S>(mut self, extra: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in extra {
            self.patterns.push(Regex::new(pattern.as_ref())?);
        }
        Ok(self)
    }

    /// Whether a trimmed line is boilerplate.
    pub fn is_noise(&self, line: &str) -> bool {
        line.is_empty() || self.patterns.iter().any(|re| re.is_match(line))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Classify one line. Noise wins over a leading date so that a footer that
/// happens to start with a print date never opens a record.
pub fn classify(line: &str, noise: &NoiseFilter) -> LineClass {
    let line = line.trim();
    if noise.is_noise(line) {
        LineClass::Noise
    } else if leading_date_re().is_match(line) {
        LineClass::RecordStart
    } else {
        LineClass::Continuation
    }
}

/// The raw lines of one transaction; the first line carries the date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionBlock {
    lines: Vec<String>,
}

impl TransactionBlock {
    fn open(first: &str) -> Self {
        Self {
            lines: vec![first.to_string()],
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn first_line(&self) -> &str {
        &self.lines[0]
    }

    pub fn continuation(&self) -> &[String] {
        &self.lines[1..]
    }

    /// The leading date token as printed.
    pub fn date(&self) -> Option<&str> {
        leading_date_re().find(self.first_line()).map(|m| m.as_str())
    }

    /// All lines joined with single spaces.
    pub fn joined(&self) -> String {
        self.lines.join(" ")
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Per-layout knobs for when an open block closes early.
#[derive(Debug, Clone, Default)]
pub struct SegmentRules {
    /// Hard cap on the number of lines in one block.
    pub max_lines: Option<usize>,
    /// A noise line closes the open block instead of being skipped over.
    pub noise_closes_block: bool,
    /// A line matching this pattern is kept and then closes the block.
    pub closing_line: Option<Regex>,
}

/// Output of [`segment`].
#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    pub blocks: Vec<TransactionBlock>,
    /// Line counters; block-level counters are left for the extractor.
    pub diagnostics: ParseDiagnostics,
}

/// Group lines into transaction blocks in document order.
pub fn segment(text: &str, noise: &NoiseFilter, rules: &SegmentRules) -> Segmentation {
    let mut out = Segmentation::default();
    let mut open: Option<TransactionBlock> = None;

    for raw in text.lines() {
        out.diagnostics.lines += 1;
        let line = raw.trim();

        match classify(line, noise) {
            LineClass::Noise => {
                out.diagnostics.noise_lines += 1;
                if rules.noise_closes_block {
                    flush(&mut open, &mut out.blocks);
                }
            }
            LineClass::RecordStart => {
                flush(&mut open, &mut out.blocks);
                let block = TransactionBlock::open(line);
                if closes(&block, line, rules) {
                    out.blocks.push(block);
                } else {
                    open = Some(block);
                }
            }
            LineClass::Continuation => match open.as_mut() {
                Some(block) => {
                    out.diagnostics.continuation_lines += 1;
                    block.lines.push(line.to_string());
                    if closes(block, line, rules) {
                        flush(&mut open, &mut out.blocks);
                    }
                }
                None => out.diagnostics.orphaned_lines += 1,
            },
        }
    }

    flush(&mut open, &mut out.blocks);
    out.diagnostics.blocks = out.blocks.len();
    out
}

fn closes(block: &TransactionBlock, line: &str, rules: &SegmentRules) -> bool {
    rules.max_lines.is_some_and(|max| block.len() >= max)
        || rules.closing_line.as_ref().is_some_and(|re| re.is_match(line))
}

fn flush(open: &mut Option<TransactionBlock>, blocks: &mut Vec<TransactionBlock>) {
    if let Some(block) = open.take() {
        blocks.push(block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> NoiseFilter {
        NoiseFilter::new([r"(?i)^page\s+\d+\s*/\s*\d+$", r"(?i)^banque\s+exemple\b"]).unwrap()
    }

    #[test]
    fn test_classify() {
        let noise = filter();
        assert_eq!(classify("01.03.2024 PAYMENT 10.00", &noise), LineClass::RecordStart);
        assert_eq!(classify("  ", &noise), LineClass::Noise);
        assert_eq!(classify("Page 2 / 5", &noise), LineClass::Noise);
        assert_eq!(classify("Donneur d'ordre: ACME SA", &noise), LineClass::Continuation);
        assert_eq!(classify("1.3.2024 short date", &noise), LineClass::Continuation);
    }

    #[test]
    fn test_segment_groups_continuations() {
        let text = "Banque Exemple SA, Lausanne\n\
                    orphan before any record\n\
                    01.03.2024 PAYMENT 10.00 100.00\n\
                    ACME SA\n\
                    Page 1 / 2\n\
                    ref 42\n\
                    02.03.2024 FEE 1.00 99.00\n";
        let seg = segment(text, &filter(), &SegmentRules::default());

        assert_eq!(seg.blocks.len(), 2);
        assert_eq!(seg.blocks[0].lines(), ["01.03.2024 PAYMENT 10.00 100.00", "ACME SA", "ref 42"]);
        assert_eq!(seg.blocks[0].date(), Some("01.03.2024"));
        assert_eq!(seg.blocks[1].continuation().len(), 0);
        assert_eq!(seg.diagnostics.lines, 7);
        assert_eq!(seg.diagnostics.noise_lines, 2);
        assert_eq!(seg.diagnostics.orphaned_lines, 1);
        assert_eq!(seg.diagnostics.continuation_lines, 2);
        assert_eq!(seg.diagnostics.blocks, 2);
    }

    #[test]
    fn test_noise_never_opens_or_extends() {
        let noise = NoiseFilter::new([r"(?i)^\d{2}\.\d{2}\.\d{4}\s+page\s+\d+"]).unwrap();
        let text = "01.03.2024 PAYMENT 10.00 100.00\n05.03.2024 Page 1 of 3\nmore text\n";
        let seg = segment(text, &noise, &SegmentRules::default());

        assert_eq!(seg.blocks.len(), 1);
        assert!(seg.blocks[0].lines().iter().all(|l| !l.contains("Page")));
        assert_eq!(seg.blocks[0].continuation(), ["more text"]);
    }

    #[test]
    fn test_rules_cap_and_closing_line() {
        let rules = SegmentRules {
            max_lines: Some(3),
            noise_closes_block: true,
            closing_line: Some(Regex::new(r"\d+\.\d{2}\s+\d+\.\d{2}\s+\d{2}\.\d{2}\.\d{4}$").unwrap()),
        };
        let text = "01.03.2024 A\nl1\nl2\nl3\n\
                    02.03.2024 B\nx 10.00 90.00 02.03.2024\nafter trailer\n\
                    03.03.2024 C\n\nafter blank\n";
        let seg = segment(text, &filter(), &rules);

        assert_eq!(seg.blocks.len(), 3);
        assert_eq!(seg.blocks[0].lines(), ["01.03.2024 A", "l1", "l2"]);
        assert_eq!(seg.blocks[1].lines(), ["02.03.2024 B", "x 10.00 90.00 02.03.2024"]);
        assert_eq!(seg.blocks[2].lines(), ["03.03.2024 C"]);
        assert_eq!(seg.diagnostics.orphaned_lines, 3);
    }

    #[test]
    fn test_with_patterns_rejects_bad_regex() {
        assert!(filter().with_patterns(["("]).is_err());
        assert_eq!(filter().with_patterns(["^Total"]).unwrap().len(), 3);
    }
}
