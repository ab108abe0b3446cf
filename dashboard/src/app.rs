//! Application context: owns config, fetcher, page and the running schedule.

use crate::config::DashboardConfig;
use crate::fetcher::{cache_busted, JsonFetcher};
use crate::scheduler::{task, PollHandle, PollScheduler, Task};
use crate::session::{Route, Session};
use crate::types::{HistoryRecord, Payload, Role, Signal, SystemStatus, TradeResult};
use crate::view::{bind, sections, Page, Section, SectionView};
use crate::whitelist::AllowList;
use anyhow::Result;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Dashboard flavours. Each registers its own set of sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Trader,
    Admin,
}

impl View {
    pub fn required_role(&self) -> Role {
        match self {
            View::Trader => Role::User,
            View::Admin => Role::Admin,
        }
    }

    pub fn sections(&self) -> &'static [Section] {
        match self {
            View::Trader => &[
                Section::Signal,
                Section::Chart,
                Section::Result,
                Section::Stats,
                Section::History,
            ],
            View::Admin => &[
                Section::Whitelist,
                Section::MlInfo,
                Section::System,
                Section::AdminSignals,
                Section::Logs,
            ],
        }
    }

    pub fn for_route(route: Route) -> Option<Self> {
        match route {
            Route::Standard => Some(View::Trader),
            Route::Admin => Some(View::Admin),
            Route::Login => None,
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Trader => write!(f, "trader"),
            View::Admin => write!(f, "admin"),
        }
    }
}

struct Binder {
    config: Arc<DashboardConfig>,
    fetcher: JsonFetcher,
    page: Page,
    /// Page generation this schedule renders into.
    generation: u64,
}

impl Binder {
    /// Fetch-classify-render task for a JSON section.
    fn payload_task<T, F>(&self, section: Section, url: String, format: F) -> Task
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(T) -> crate::view::Body + Send + Sync + Copy + 'static,
    {
        let fetcher = self.fetcher.clone();
        let page = self.page.clone();
        let generation = self.generation;
        task(move || {
            let fetcher = fetcher.clone();
            let page = page.clone();
            let url = url.clone();
            async move {
                let fetched = fetcher.fetch_payload::<T>(&url).await;
                page.replace_in(generation, bind(section, fetched, format)).await;
            }
        })
    }

    fn task_for(&self, section: Section) -> Task {
        let cfg = &self.config;
        match section {
            Section::Signal => {
                self.payload_task::<Signal, _>(section, cfg.api_url("last_signal.json"), sections::signal)
            }
            Section::Result => self.payload_task::<TradeResult, _>(
                section,
                cfg.api_url("last_result.json"),
                sections::result,
            ),
            Section::Stats => self.payload_task::<SystemStatus, _>(
                section,
                cfg.api_url("system_status.json"),
                sections::stats,
            ),
            Section::MlInfo => {
                self.payload_task::<Value, _>(section, cfg.api_url("ml_info.json"), sections::json)
            }
            Section::System => self.payload_task::<Value, _>(
                section,
                cfg.api_url("system_status.json"),
                sections::json,
            ),
            Section::AdminSignals => self.payload_task::<Value, _>(
                section,
                cfg.api_url("last_signal.json"),
                sections::json,
            ),
            Section::Whitelist => self.payload_task::<AllowList, _>(
                section,
                cfg.users_url(),
                sections::whitelist,
            ),
            Section::History => self.history_task(),
            Section::Chart => self.chart_task(),
            Section::Logs => self.logs_task(),
        }
    }

    /// History arrives as a bare array, so it bypasses the `error` classification
    /// unless the server answers with an object.
    fn history_task(&self) -> Task {
        let fetcher = self.fetcher.clone();
        let page = self.page.clone();
        let generation = self.generation;
        let url = self.config.site_url(&self.config.history_file);
        let limit = self.config.history_limit;
        task(move || {
            let fetcher = fetcher.clone();
            let page = page.clone();
            let url = url.clone();
            async move {
                let fetched = fetcher.fetch_json::<Value>(&url).await.and_then(|v| {
                    if v.is_array() {
                        serde_json::from_value::<Vec<HistoryRecord>>(v)
                            .map(Payload::Data)
                            .map_err(|e| crate::fetcher::FetchError::Decode(e.to_string()))
                    } else {
                        Payload::from_value(v)
                            .map_err(|e| crate::fetcher::FetchError::Decode(e.to_string()))
                    }
                });
                let view = bind(Section::History, fetched, |records| {
                    sections::history(records, limit)
                });
                page.replace_in(generation, view).await;
            }
        })
    }

    /// The chart is an image URL; only the cache-busting suffix changes per tick.
    fn chart_task(&self) -> Task {
        let page = self.page.clone();
        let generation = self.generation;
        let url = self.config.api_url("chart.png");
        task(move || {
            let page = page.clone();
            let url = url.clone();
            async move {
                let view = match cache_busted(&url) {
                    Ok(src) => SectionView::new(Section::Chart, sections::chart(src.to_string())),
                    Err(e) => {
                        warn!("Chart URL rejected: {e}");
                        SectionView::placeholder(Section::Chart, Section::Chart.loading_error())
                    }
                };
                page.replace_in(generation, view).await;
            }
        })
    }

    fn logs_task(&self) -> Task {
        let fetcher = self.fetcher.clone();
        let page = self.page.clone();
        let generation = self.generation;
        let url = self.config.site_url("system_log.json");
        let tail = self.config.log_tail_chars;
        task(move || {
            let fetcher = fetcher.clone();
            let page = page.clone();
            let url = url.clone();
            async move {
                let fetched = fetcher.fetch_text(&url).await.map(Payload::Data);
                let view = bind(Section::Logs, fetched, |text| sections::logs(text, tail));
                page.replace_in(generation, view).await;
            }
        })
    }
}

/// One explicit context per running dashboard, replacing module-level state.
pub struct AppContext {
    config: Arc<DashboardConfig>,
    fetcher: JsonFetcher,
    page: Page,
    handle: Option<PollHandle>,
    view: Option<View>,
}

impl AppContext {
    pub fn create(config: DashboardConfig) -> Result<Self> {
        let fetcher = JsonFetcher::new(config.fetch_timeout())?;
        Ok(Self {
            config: Arc::new(config),
            fetcher,
            page: Page::new(),
            handle: None,
            view: None,
        })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &JsonFetcher {
        &self.fetcher
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn view(&self) -> Option<View> {
        self.view
    }

    pub fn ticks(&self) -> u64 {
        self.handle.as_ref().map_or(0, PollHandle::ticks)
    }

    /// Start polling `view` for `session`. A session that may not see the view
    /// gets the redirect route back and nothing is scheduled or rendered.
    pub async fn start(&mut self, view: View, session: &Session) -> Result<(), Route> {
        if !session.satisfies(view.required_role()) {
            warn!("{} denied the {view} view", session.pocket_id);
            return Err(if session.authenticated { Route::Standard } else { Route::Login });
        }

        self.stop().await;

        let binder = Binder {
            config: self.config.clone(),
            fetcher: self.fetcher.clone(),
            page: self.page.clone(),
            generation: self.page.generation().await,
        };
        let tasks = view.sections().iter().map(|s| binder.task_for(*s)).collect();

        info!("Opening {view} dashboard for {} ({})", session.pocket_id, session.role);
        self.handle = Some(PollScheduler::schedule(tasks, self.config.poll_interval()));
        self.view = Some(view);
        Ok(())
    }

    /// Stop polling and blank the page, e.g. when navigating away. Fetches
    /// still in flight finish but their renders are discarded.
    pub async fn stop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.stop();
        }
        self.view = None;
        self.page.clear().await;
    }

    pub async fn dispose(mut self) {
        self.stop().await;
        info!("Dashboard context disposed");
    }
}
