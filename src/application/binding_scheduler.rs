// Data binding scheduler - fetches widget sources, orders results and owns refresh timers
use crate::application::dashboard_repository::QueryDirectory;
use crate::application::fetch_cache::{FetchCache, FetchError, FetchResult};
use crate::domain::widget::Widget;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    BindResolved {
        widget_id: String,
        token: u64,
        outcome: FetchResult,
    },
    RefreshDue {
        widget_id: String,
    },
    DashboardRefreshDue,
}

struct RefreshTimer {
    interval_ms: u64,
    handle: JoinHandle<()>,
}

/// Every bind gets a fresh token; only the latest token per widget is accepted when
/// results come back, so a slow earlier fetch can never overwrite a newer one.
pub struct DataBindingScheduler {
    directory: Arc<dyn QueryDirectory>,
    cache: Arc<FetchCache>,
    events: mpsc::UnboundedSender<SchedulerEvent>,
    next_token: u64,
    latest: HashMap<String, u64>,
    timers: HashMap<String, RefreshTimer>,
    dashboard_timer: Option<JoinHandle<()>>,
}

impl DataBindingScheduler {
    pub fn new(
        directory: Arc<dyn QueryDirectory>,
        cache: Arc<FetchCache>,
        events: mpsc::UnboundedSender<SchedulerEvent>,
    ) -> Self {
        Self {
            directory,
            cache,
            events,
            next_token: 0,
            latest: HashMap::new(),
            timers: HashMap::new(),
            dashboard_timer: None,
        }
    }

    /// Supersedes every outstanding request for `widget_id`
    pub fn issue_token(&mut self, widget_id: &str) -> u64 {
        self.next_token += 1;
        self.latest.insert(widget_id.to_string(), self.next_token);
        self.next_token
    }

    pub fn accept(&self, widget_id: &str, token: u64) -> bool {
        self.latest.get(widget_id) == Some(&token)
    }

    /// Starts fetching `source` for `widget_id`; the result arrives as `BindResolved`
    pub fn bind(&mut self, widget_id: &str, source: &str) -> u64 {
        let token = self.issue_token(widget_id);
        tracing::debug!("Binding {} to '{}' (token {})", widget_id, source, token);

        let directory = self.directory.clone();
        let cache = self.cache.clone();
        let events = self.events.clone();
        let widget_id = widget_id.to_string();
        let source = source.to_string();

        tokio::spawn(async move {
            let title = source.clone();
            let outcome = cache
                .get_or_fetch(&source, move || async move {
                    directory.run_query(&title).await.map_err(FetchError::from)
                })
                .await;
            let _ = events.send(SchedulerEvent::BindResolved {
                widget_id,
                token,
                outcome,
            });
        });

        token
    }

    /// Drops any cached result for `source` so the next bind goes to the backend
    pub fn invalidate(&self, source: &str) {
        self.cache.invalidate(source);
    }

    /// Arms the widget's repeating refresh, replacing any timer it already had.
    /// Widgets without a source or with a zero interval end up with no timer.
    pub fn schedule_auto_refresh(&mut self, widget: &Widget) {
        self.disarm(&widget.id);
        if widget.refresh_interval_ms == 0 || widget.data_source.is_none() {
            return;
        }

        let interval_ms = widget.refresh_interval_ms;
        let widget_id = widget.id.clone();
        let handle = self.spawn_timer(Duration::from_millis(interval_ms), move || {
            SchedulerEvent::RefreshDue {
                widget_id: widget_id.clone(),
            }
        });

        tracing::debug!("Armed {}ms refresh for {}", interval_ms, widget.id);
        self.timers.insert(
            widget.id.clone(),
            RefreshTimer {
                interval_ms,
                handle,
            },
        );
    }

    pub fn disarm(&mut self, widget_id: &str) -> bool {
        match self.timers.remove(widget_id) {
            Some(timer) => {
                timer.handle.abort();
                tracing::debug!("Disarmed {}ms refresh for {}", timer.interval_ms, widget_id);
                true
            }
            None => false,
        }
    }

    /// Drops the timer and any in-flight request for a deleted or unbound widget
    pub fn forget(&mut self, widget_id: &str) {
        self.disarm(widget_id);
        self.latest.remove(widget_id);
    }

    /// One timer for the whole dashboard; zero seconds disarms it
    pub fn arm_dashboard_refresh(&mut self, seconds: u32) {
        self.disarm_dashboard_refresh();
        if seconds == 0 {
            return;
        }
        let period = Duration::from_secs(u64::from(seconds));
        self.dashboard_timer = Some(self.spawn_timer(period, || SchedulerEvent::DashboardRefreshDue));
    }

    pub fn disarm_dashboard_refresh(&mut self) {
        if let Some(handle) = self.dashboard_timer.take() {
            handle.abort();
        }
    }

    pub fn teardown(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.handle.abort();
        }
        self.disarm_dashboard_refresh();
        self.latest.clear();
    }

    #[cfg(test)]
    pub fn armed_timers(&self) -> usize {
        self.timers.len()
    }

    #[cfg(test)]
    pub fn refresh_interval(&self, widget_id: &str) -> Option<u64> {
        self.timers.get(widget_id).map(|t| t.interval_ms)
    }

    fn spawn_timer<F>(&self, period: Duration, event: F) -> JoinHandle<()>
    where
        F: Fn() -> SchedulerEvent + Send + 'static,
    {
        let events = self.events.clone();
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if events.send(event()).is_err() {
                    break;
                }
            }
        })
    }
}

impl Drop for DataBindingScheduler {
    fn drop(&mut self) {
        self.teardown();
    }
}
