//! Search events and the sinks that receive them
//!
//! The coordinator reports every fragment outcome, progress update and page
//! completion through a `SearchEventSink`, then a single `Finished` event.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::state::{PageWorkerState, SearchId, SearchStats};
use crate::domain::{Outcome, ProductRecord};

/// Why a search stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchTermination {
    TargetReached,
    SourceExhausted,
    Cancelled,
}

impl std::fmt::Display for SearchTermination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TargetReached => write!(f, "target reached"),
            Self::SourceExhausted => write!(f, "no more results"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchSummary {
    pub search_id: SearchId,
    pub termination: SearchTermination,
    pub percent_complete: u8,
    pub stats: SearchStats,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SearchSummary {
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchEvent {
    Outcome {
        page_number: u32,
        outcome: Outcome,
    },
    Progress {
        percent_complete: u8,
        valid_results: u32,
        fragments_considered: u64,
    },
    PageCompleted {
        page_number: u32,
        state: PageWorkerState,
    },
    /// Always the last event of a search.
    Finished(SearchSummary),
}

#[async_trait]
pub trait SearchEventSink: Send + Sync {
    async fn emit(&self, event: SearchEvent);
}

/// Forwards events into an unbounded channel.
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<SearchEvent>,
}

impl ChannelEventSink {
    pub const fn new(sender: mpsc::UnboundedSender<SearchEvent>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl SearchEventSink for ChannelEventSink {
    async fn emit(&self, event: SearchEvent) {
        if self.sender.send(event).is_err() {
            debug!("Search event dropped: receiver closed");
        }
    }
}

/// Writes events to the tracing log only.
#[derive(Debug, Default)]
pub struct LoggingEventSink;

#[async_trait]
impl SearchEventSink for LoggingEventSink {
    async fn emit(&self, event: SearchEvent) {
        match event {
            SearchEvent::Outcome {
                page_number,
                outcome,
            } => {
                if let Some(record) = &outcome.record {
                    info!("[page {}] accepted: {}", page_number, record.name);
                } else if let Some(status) = &outcome.status {
                    debug!("[page {}] {}", page_number, status);
                }
            }
            SearchEvent::Progress {
                percent_complete,
                valid_results,
                ..
            } => debug!("Progress {}% ({} valid)", percent_complete, valid_results),
            SearchEvent::PageCompleted { page_number, state } => {
                if state == PageWorkerState::Error {
                    warn!("Page {} failed", page_number);
                } else {
                    debug!("Page {} {}", page_number, state);
                }
            }
            SearchEvent::Finished(summary) => info!(
                "Search {} finished: {} ({}%, {} valid of {} considered)",
                summary.search_id,
                summary.termination,
                summary.percent_complete,
                summary.stats.valid_results,
                summary.stats.fragments_considered
            ),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<SearchEvent>>,
}

impl CollectingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SearchEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn records(&self) -> Vec<ProductRecord> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SearchEvent::Outcome { outcome, .. } => outcome.record,
                _ => None,
            })
            .collect()
    }

    pub fn summary(&self) -> Option<SearchSummary> {
        self.events().into_iter().find_map(|event| match event {
            SearchEvent::Finished(summary) => Some(summary),
            _ => None,
        })
    }
}

#[async_trait]
impl SearchEventSink for CollectingEventSink {
    async fn emit(&self, event: SearchEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
