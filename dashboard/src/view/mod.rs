//! View binder: turns each fetch outcome into a full replacement of one page section.

pub mod sections;

use crate::fetcher::FetchError;
use crate::types::Payload;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Shown for any missing or non-finite field.
pub const GLYPH: &str = "—";
/// Shown where the dashboard historically printed a question mark (confidence, source).
pub const UNKNOWN: &str = "?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    Signal,
    Result,
    Stats,
    Chart,
    History,
    Whitelist,
    MlInfo,
    System,
    AdminSignals,
    Logs,
}

impl Section {
    pub fn id(&self) -> &'static str {
        match self {
            Section::Signal => "signalData",
            Section::Result => "lastResult",
            Section::Stats => "statsBox",
            Section::Chart => "chartImg",
            Section::History => "historyTable",
            Section::Whitelist => "whitelistBox",
            Section::MlInfo => "mlInfo",
            Section::System => "systemBox",
            Section::AdminSignals => "adminSignals",
            Section::Logs => "logBox",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Section::Signal => "Current signal",
            Section::Result => "Last result",
            Section::Stats => "Statistics",
            Section::Chart => "Chart",
            Section::History => "Trade history",
            Section::Whitelist => "Allowed users",
            Section::MlInfo => "ML model",
            Section::System => "System status",
            Section::AdminSignals => "Signals",
            Section::Logs => "System log",
        }
    }

    /// Placeholder for a failed fetch.
    pub fn loading_error(&self) -> &'static str {
        match self {
            Section::Signal => "Error loading signal.",
            Section::Result => "Error loading result.",
            Section::Stats => "Error loading statistics.",
            Section::Chart => "Chart unavailable.",
            Section::History => "Error loading history.",
            Section::Whitelist => "Error loading user list.",
            Section::MlInfo => "Error loading ML data.",
            Section::System => "Error loading status.",
            Section::AdminSignals => "Error loading signals.",
            Section::Logs => "Error loading logs.",
        }
    }

    /// Placeholder for a payload that reports `error` or holds nothing to show.
    pub fn no_data(&self) -> &'static str {
        match self {
            Section::Signal | Section::AdminSignals => "No active signals",
            Section::Result => "No completed trades yet",
            Section::Stats | Section::System => "No data yet",
            Section::Chart => "Chart not available yet",
            Section::History => "No history yet",
            Section::Whitelist => "No users yet",
            Section::MlInfo => "No ML data yet",
            Section::Logs => "Log is empty",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Placeholder(String),
    Fields(Vec<(&'static str, String)>),
    Table {
        header: Vec<&'static str>,
        rows: Vec<Vec<String>>,
        footer: Option<String>,
    },
    Image { src: String },
    Text(String),
}

/// Rendered content of one section. Always replaced whole.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionView {
    pub section: Section,
    pub body: Body,
    pub rendered_at: DateTime<Utc>,
}

impl SectionView {
    pub fn new(section: Section, body: Body) -> Self {
        Self {
            section,
            body,
            rendered_at: Utc::now(),
        }
    }

    pub fn placeholder(section: Section, text: &str) -> Self {
        Self::new(section, Body::Placeholder(text.to_string()))
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.body, Body::Placeholder(_))
    }

    /// Text of a placeholder body, if that is what was rendered.
    pub fn placeholder_text(&self) -> Option<&str> {
        match &self.body {
            Body::Placeholder(t) => Some(t),
            _ => None,
        }
    }

    pub fn field(&self, label: &str) -> Option<&str> {
        match &self.body {
            Body::Fields(fields) => fields
                .iter()
                .find(|(l, _)| *l == label)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for SectionView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "── {} ──", self.section.title())?;
        match &self.body {
            Body::Placeholder(text) => writeln!(f, "  {text}"),
            Body::Fields(fields) => {
                for (label, value) in fields {
                    writeln!(f, "  {label}: {value}")?;
                }
                Ok(())
            }
            Body::Table { header, rows, footer } => {
                writeln!(f, "  {}", header.join(" | "))?;
                for row in rows {
                    writeln!(f, "  {}", row.join(" | "))?;
                }
                if let Some(footer) = footer {
                    writeln!(f, "  {footer}")?;
                }
                Ok(())
            }
            Body::Image { src } => writeln!(f, "  [image] {src}"),
            Body::Text(text) => {
                for line in text.lines() {
                    writeln!(f, "  {line}")?;
                }
                Ok(())
            }
        }
    }
}

/// Apply the uniform render policy to one fetch outcome.
///
/// Failure -> loading-error placeholder, `error` payload -> no-data placeholder,
/// data -> `format`.
pub fn bind<T>(
    section: Section,
    fetched: Result<Payload<T>, FetchError>,
    format: impl FnOnce(T) -> Body,
) -> SectionView {
    match fetched {
        Err(e) => {
            debug!("{} ({}): {e}", section.title(), section.id());
            SectionView::placeholder(section, section.loading_error())
        }
        Ok(Payload::Empty(reason)) => {
            debug!("{} reports no data: {reason}", section.title());
            SectionView::placeholder(section, section.no_data())
        }
        Ok(Payload::Data(data)) => SectionView::new(section, format(data)),
    }
}

#[derive(Default)]
struct PageState {
    /// Bumped on every clear; renders carry the generation they were scheduled in.
    generation: u64,
    sections: BTreeMap<Section, SectionView>,
}

/// In-process stand-in for the dashboard DOM: one view per section.
#[derive(Clone, Default)]
pub struct Page {
    state: Arc<RwLock<PageState>>,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn generation(&self) -> u64 {
        self.state.read().await.generation
    }

    /// Replace a section in the current generation.
    pub async fn replace(&self, view: SectionView) {
        self.state.write().await.sections.insert(view.section, view);
    }

    /// Replace a section only if the page has not been cleared since
    /// `generation` was read. Returns whether the view was applied.
    pub async fn replace_in(&self, generation: u64, view: SectionView) -> bool {
        let mut state = self.state.write().await;
        if state.generation != generation {
            debug!(
                "Dropped late {} render from generation {generation} (page at {})",
                view.section.title(),
                state.generation
            );
            return false;
        }
        state.sections.insert(view.section, view);
        true
    }

    pub async fn get(&self, section: Section) -> Option<SectionView> {
        self.state.read().await.sections.get(&section).cloned()
    }

    pub async fn snapshot(&self) -> Vec<SectionView> {
        self.state.read().await.sections.values().cloned().collect()
    }

    /// Blank the page and invalidate every render still in flight.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.sections.clear();
        state.generation += 1;
    }

    pub async fn render_text(&self) -> String {
        self.snapshot()
            .await
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(_: u8) -> Body {
        Body::Fields(vec![("Pair", "EURUSD".into())])
    }

    #[test]
    fn test_policy_failure() {
        let v = bind(Section::Signal, Err(FetchError::Status(502)), fields);
        assert_eq!(v.placeholder_text(), Some("Error loading signal."));
    }

    #[test]
    fn test_policy_error_payload() {
        let v = bind(Section::Result, Ok(Payload::Empty("none".into())), fields);
        assert_eq!(v.placeholder_text(), Some("No completed trades yet"));
    }

    #[test]
    fn test_policy_data() {
        let v = bind(Section::Signal, Ok(Payload::Data(1u8)), fields);
        assert!(!v.is_placeholder());
        assert_eq!(v.field("Pair"), Some("EURUSD"));
    }

    #[test]
    fn test_every_section_has_distinct_placeholders() {
        let all = [
            Section::Signal,
            Section::Result,
            Section::Stats,
            Section::Chart,
            Section::History,
            Section::Whitelist,
            Section::MlInfo,
            Section::System,
            Section::AdminSignals,
            Section::Logs,
        ];
        for s in all {
            assert_ne!(s.loading_error(), s.no_data(), "{s:?}");
        }
    }

    #[tokio::test]
    async fn test_page_replaces_whole_section() {
        let page = Page::new();
        page.replace(SectionView::new(
            Section::Signal,
            Body::Fields(vec![("Pair", "EURUSD".into()), ("Direction", "BUY".into())]),
        ))
        .await;
        page.replace(SectionView::placeholder(Section::Signal, "No active signals"))
            .await;

        let v = page.get(Section::Signal).await.unwrap();
        assert_eq!(v.body, Body::Placeholder("No active signals".into()));
        assert_eq!(page.snapshot().await.len(), 1);
        assert!(page.render_text().await.contains("No active signals"));
    }

    #[tokio::test]
    async fn test_renders_from_before_a_clear_are_dropped() {
        let page = Page::new();
        let old = page.generation().await;
        assert!(page.replace_in(old, SectionView::placeholder(Section::Logs, "x")).await);

        page.clear().await;
        let current = page.generation().await;
        assert_ne!(old, current);

        let late = SectionView::placeholder(Section::Whitelist, "No users yet");
        assert!(!page.replace_in(old, late).await);
        assert!(page.snapshot().await.is_empty());

        assert!(page.replace_in(current, SectionView::placeholder(Section::Signal, "y")).await);
        assert_eq!(page.snapshot().await.len(), 1);
    }
}
