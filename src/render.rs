// src/render.rs
//! Turns decoded payloads into the text shown in the results panel.

use std::ops::Range;

use crate::decode::DecodedResult;

pub const NO_DETECTION_MESSAGE: &str = "No QR/Barcode detected.";

/// Payloads starting with this prefix are treated as links.
const URL_PREFIX: &str = "http";

pub fn is_url_like(payload: &str) -> bool {
    payload.starts_with(URL_PREFIX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// The bold "Type: ...\nData: " header of a result block.
    Label(String),
    Text(String),
    /// A clickable payload. `url` is the payload itself, `text` carries the
    /// trailing block separator.
    Link { text: String, url: String },
}

impl Segment {
    pub fn text(&self) -> &str {
        match self {
            Segment::Label(text) | Segment::Text(text) => text,
            Segment::Link { text, .. } => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedResults {
    pub segments: Vec<Segment>,
    /// Last URL-like payload of the batch.
    pub open_target: Option<String>,
}

impl RenderedResults {
    /// Renders a batch. Returns `None` for an empty batch, which callers
    /// show as the no-detection panel instead.
    pub fn render(results: &[DecodedResult]) -> Option<Self> {
        if results.is_empty() {
            return None;
        }
        let mut segments = Vec::with_capacity(results.len() * 2);
        let mut open_target = None;
        for result in results {
            segments.push(Segment::Label(format!(
                "Type: {}\nData: ",
                result.symbol_type
            )));
            let text = format!("{}\n\n", result.payload);
            if is_url_like(&result.payload) {
                open_target = Some(result.payload.clone());
                segments.push(Segment::Link {
                    text,
                    url: result.payload.clone(),
                });
            } else {
                segments.push(Segment::Text(text));
            }
        }
        Some(Self {
            segments,
            open_target,
        })
    }

    pub fn plain_text(&self) -> String {
        self.segments.iter().map(Segment::text).collect()
    }

    /// Char ranges of the link payloads within `plain_text`.
    pub fn link_spans(&self) -> Vec<Range<usize>> {
        let mut spans = Vec::new();
        let mut offset = 0;
        for segment in &self.segments {
            if let Segment::Link { url, .. } = segment {
                spans.push(offset..offset + url.chars().count());
            }
            offset += segment.text().chars().count();
        }
        spans
    }

    /// URL to open for a click at char index `clicked`, given the text
    /// selection (char range) held when the click happened.
    ///
    /// Only clicks on a link span count, and only a non-empty selection
    /// whose text is URL-like is opened.
    pub fn link_for_click(&self, clicked: usize, selection: Option<Range<usize>>) -> Option<String> {
        if !self.link_spans().iter().any(|span| span.contains(&clicked)) {
            return None;
        }
        let selection = selection.filter(|range| !range.is_empty())?;
        let selected: String = self
            .plain_text()
            .chars()
            .skip(selection.start)
            .take(selection.end - selection.start)
            .collect();
        is_url_like(&selected).then_some(selected)
    }
}

/// What the results panel currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ResultsPanel {
    #[default]
    Empty,
    NoDetection,
    Results(RenderedResults),
}

impl ResultsPanel {
    pub fn from_results(results: &[DecodedResult]) -> Self {
        RenderedResults::render(results).map_or(ResultsPanel::NoDetection, ResultsPanel::Results)
    }

    pub fn text(&self) -> String {
        match self {
            ResultsPanel::Empty => String::new(),
            ResultsPanel::NoDetection => NO_DETECTION_MESSAGE.to_string(),
            ResultsPanel::Results(rendered) => rendered.plain_text(),
        }
    }

    pub fn rendered(&self) -> Option<&RenderedResults> {
        match self {
            ResultsPanel::Results(rendered) => Some(rendered),
            _ => None,
        }
    }

    pub fn open_target(&self) -> Option<&str> {
        self.rendered()?.open_target.as_deref()
    }
}
