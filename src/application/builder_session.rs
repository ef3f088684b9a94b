// Builder session - the single event loop that owns the open dashboard
use crate::application::binding_scheduler::{DataBindingScheduler, SchedulerEvent};
use crate::application::dashboard_repository::{
    DashboardRepository, QueryDirectory, RepositoryError, StoredQuery, WidgetForm,
    WidgetSaveResponse,
};
use crate::application::fetch_cache::FetchCache;
use crate::application::local_store::LocalStore;
use crate::application::notifier::{NotificationLevel, Notifier};
use crate::application::persistence_sync::{PersistenceError, PersistenceSync};
use crate::application::render_dispatcher::{CanvasView, ChartRenderer, RenderDispatcher};
use crate::application::save_queue::{QueueError, SaveQueue, SaveReport};
use crate::domain::dashboard::{Dashboard, DashboardSettings, WidgetConfig};
use crate::domain::interaction::{ControlAction, Intent, InteractionState, PointerEvent};
use crate::domain::render_shape::{shape_rows, Row};
use crate::domain::widget::{Widget, WidgetType};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

/// Upper bound on events folded into one render so a pointer stream cannot starve the canvas
const MAX_BATCH: usize = 64;

#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("{0}")]
    Validation(String),
    #[error("no dashboard is open")]
    NoDashboard,
    #[error("dashboard {0} not found")]
    NotFound(String),
    #[error("persistence failed: {0}")]
    Persistence(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("builder session has stopped")]
    SessionClosed,
}

impl From<PersistenceError> for BuilderError {
    fn from(e: PersistenceError) -> Self {
        match e {
            PersistenceError::Validation(message) => BuilderError::Validation(message),
            other => BuilderError::Persistence(other.to_string()),
        }
    }
}

#[derive(Debug)]
pub enum BuilderCommand {
    Open(Box<Dashboard>),
    /// Closes the open dashboard. With `deleting` set, only that dashboard is closed
    /// and its unsaved changes are dropped.
    Close { deleting: Option<String> },
    AddWidget(WidgetType),
    DeleteWidget(String),
    SelectWidget(String),
    ToggleMinimize(String),
    ToggleExpand(String),
    Configure {
        widget_id: String,
        config: WidgetConfig,
    },
    SetText {
        widget_id: String,
        content: String,
        font_size: Option<u32>,
    },
    Retry(String),
    Pointer(PointerEvent),
    UpdateSettings(DashboardSettings),
    Notify {
        level: NotificationLevel,
        message: String,
    },
    Snapshot,
}

#[derive(Debug, PartialEq)]
pub enum CommandOutcome {
    Done,
    WidgetCreated(String),
    Snapshot(Option<Box<Dashboard>>),
}

type Reply = oneshot::Sender<Result<CommandOutcome, BuilderError>>;

enum BuilderEvent {
    Command(BuilderCommand, Reply),
    Scheduler(SchedulerEvent),
    Saved(SaveReport),
    WidgetSaved {
        widget_id: String,
        token: u64,
        outcome: Result<WidgetSaveResponse, RepositoryError>,
    },
    ChartSettled {
        widget_id: String,
        generation: u64,
    },
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub cache_ttl: Duration,
    pub resize_settle: Duration,
    pub notification_limit: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(5),
            resize_settle: Duration::from_millis(150),
            notification_limit: 20,
        }
    }
}

pub struct SessionDeps {
    pub repository: Arc<dyn DashboardRepository>,
    pub directory: Arc<dyn QueryDirectory>,
    pub store: Arc<dyn LocalStore>,
    pub charts: Arc<dyn ChartRenderer>,
    pub settings: SessionSettings,
}

/// Starts the session task and returns the handle used to drive it
pub fn spawn_session(deps: SessionDeps) -> BuilderHandle {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (scheduler_tx, scheduler_rx) = mpsc::unbounded_channel();
    let (reports_tx, reports_rx) = mpsc::unbounded_channel();
    let (view_tx, view_rx) = watch::channel(Arc::new(CanvasView::blank()));

    let persistence = Arc::new(PersistenceSync::new(deps.repository, deps.store));
    let cache = Arc::new(FetchCache::new(deps.settings.cache_ttl));
    let saves = SaveQueue::spawn(persistence.clone(), reports_tx);

    let session = BuilderSession {
        dashboard: None,
        interaction: InteractionState::Idle,
        scheduler: DataBindingScheduler::new(deps.directory.clone(), cache, scheduler_tx),
        dispatcher: RenderDispatcher::new(deps.charts),
        notifier: Notifier::new(deps.settings.notification_limit),
        persistence: persistence.clone(),
        saves: saves.clone(),
        events: events_tx.clone(),
        view: view_tx,
        resize_settle: deps.settings.resize_settle,
        settle_generation: HashMap::new(),
        save_pending: false,
        replies: Vec::new(),
    };
    tokio::spawn(session.run(events_rx, scheduler_rx, reports_rx));

    BuilderHandle {
        events: events_tx,
        view: view_rx,
        persistence,
        saves,
        directory: deps.directory,
    }
}

struct BuilderSession {
    dashboard: Option<Dashboard>,
    interaction: InteractionState,
    scheduler: DataBindingScheduler,
    dispatcher: RenderDispatcher,
    notifier: Notifier,
    persistence: Arc<PersistenceSync>,
    saves: SaveQueue,
    events: mpsc::UnboundedSender<BuilderEvent>,
    view: watch::Sender<Arc<CanvasView>>,
    resize_settle: Duration,
    settle_generation: HashMap<String, u64>,
    save_pending: bool,
    replies: Vec<(Reply, Result<CommandOutcome, BuilderError>)>,
}

impl BuilderSession {
    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<BuilderEvent>,
        mut scheduled: mpsc::UnboundedReceiver<SchedulerEvent>,
        mut reports: mpsc::UnboundedReceiver<SaveReport>,
    ) {
        self.finish_batch();

        loop {
            let first = tokio::select! {
                Some(event) = events.recv() => event,
                Some(event) = scheduled.recv() => BuilderEvent::Scheduler(event),
                Some(report) = reports.recv() => BuilderEvent::Saved(report),
                else => break,
            };

            // everything already queued joins this batch and shares its single render
            let mut running = self.handle(first);
            let mut handled = 1;
            while running && handled < MAX_BATCH {
                let next = if let Ok(event) = events.try_recv() {
                    event
                } else if let Ok(event) = scheduled.try_recv() {
                    BuilderEvent::Scheduler(event)
                } else if let Ok(report) = reports.try_recv() {
                    BuilderEvent::Saved(report)
                } else {
                    break;
                };
                running = self.handle(next);
                handled += 1;
            }

            self.finish_batch();
            if !running {
                break;
            }
        }

        self.teardown_dashboard();
        tracing::info!("Builder session stopped");
    }

    fn handle(&mut self, event: BuilderEvent) -> bool {
        match event {
            BuilderEvent::Command(command, reply) => {
                let result = self.apply(command);
                self.replies.push((reply, result));
            }
            BuilderEvent::Scheduler(event) => self.on_scheduler_event(event),
            BuilderEvent::Saved(report) => {
                if let Err(e) = report.outcome {
                    self.notifier.warn(format!(
                        "Dashboard {} saved locally only: {}",
                        report.dashboard_id, e
                    ));
                    self.dispatcher.request_render();
                }
            }
            BuilderEvent::WidgetSaved {
                widget_id,
                token,
                outcome,
            } => self.on_widget_saved(&widget_id, token, outcome),
            BuilderEvent::ChartSettled {
                widget_id,
                generation,
            } => {
                if self.settle_generation.get(&widget_id) == Some(&generation) {
                    self.settle_generation.remove(&widget_id);
                    self.dispatcher.relayout_chart(&widget_id);
                }
            }
            BuilderEvent::Shutdown => return false,
        }
        true
    }

    fn finish_batch(&mut self) {
        if self.save_pending {
            self.save_pending = false;
            if let Some(dashboard) = &self.dashboard {
                self.saves.schedule(dashboard.clone());
            }
        }

        if let Some(view) = self.dispatcher.flush(
            self.dashboard.as_ref(),
            &self.interaction,
            self.notifier.recent(),
        ) {
            self.view.send_replace(Arc::new(view));
        }

        // replies go out after the flush so callers always read their own writes
        for (reply, result) in self.replies.drain(..) {
            let _ = reply.send(result);
        }
    }

    fn apply(&mut self, command: BuilderCommand) -> Result<CommandOutcome, BuilderError> {
        match command {
            BuilderCommand::Open(dashboard) => {
                self.open(*dashboard);
                return Ok(CommandOutcome::Done);
            }
            BuilderCommand::Close { deleting } => {
                self.close(deleting);
                return Ok(CommandOutcome::Done);
            }
            BuilderCommand::Notify { level, message } => {
                self.notifier.notify(level, message);
                self.dispatcher.request_render();
                return Ok(CommandOutcome::Done);
            }
            BuilderCommand::Snapshot => {
                return Ok(CommandOutcome::Snapshot(self.dashboard.clone().map(Box::new)));
            }
            _ => {}
        }

        let Some(dashboard) = self.dashboard.as_mut() else {
            return Err(BuilderError::NoDashboard);
        };

        match command {
            BuilderCommand::AddWidget(widget_type) => {
                let id = dashboard.create_widget(widget_type).id.clone();
                tracing::debug!("Added {} widget {}", widget_type, id);
                self.mutated();
                return Ok(CommandOutcome::WidgetCreated(id));
            }
            BuilderCommand::DeleteWidget(widget_id) => self.delete_widget(&widget_id),
            BuilderCommand::SelectWidget(widget_id) => self.toggle_selection(&widget_id),
            BuilderCommand::ToggleMinimize(widget_id) => {
                self.control(&widget_id, ControlAction::Minimize)
            }
            BuilderCommand::ToggleExpand(widget_id) => {
                self.control(&widget_id, ControlAction::Expand)
            }
            BuilderCommand::Configure { widget_id, config } => self.configure(&widget_id, config),
            BuilderCommand::SetText {
                widget_id,
                content,
                font_size,
            } => {
                if dashboard.set_widget_text(&widget_id, content, font_size) {
                    if let Some(widget) = dashboard.widget(&widget_id).cloned() {
                        self.submit_widget(&widget);
                    }
                    self.mutated();
                }
            }
            BuilderCommand::Retry(widget_id) => self.refresh_widgets(&[widget_id]),
            BuilderCommand::Pointer(event) => self.pointer(event),
            BuilderCommand::UpdateSettings(settings) => {
                dashboard
                    .apply_settings(settings)
                    .map_err(BuilderError::Validation)?;
                let (auto_refresh, seconds) =
                    (dashboard.auto_refresh, dashboard.refresh_interval_seconds);
                self.arm_dashboard_refresh(auto_refresh, seconds);
                self.mutated();
            }
            BuilderCommand::Open(_)
            | BuilderCommand::Close { .. }
            | BuilderCommand::Notify { .. }
            | BuilderCommand::Snapshot => {}
        }
        Ok(CommandOutcome::Done)
    }

    /// Every model mutation re-renders and schedules a save at the end of the batch
    fn mutated(&mut self) {
        self.dispatcher.request_render();
        self.save_pending = true;
    }

    fn open(&mut self, mut dashboard: Dashboard) {
        self.teardown_dashboard();
        dashboard.normalize();
        dashboard.clear_selection();

        let bound: Vec<Widget> = dashboard
            .widgets
            .iter()
            .filter(|w| w.widget_type.is_data_bound() && w.data_source.is_some())
            .cloned()
            .collect();
        let (auto_refresh, seconds) = (dashboard.auto_refresh, dashboard.refresh_interval_seconds);
        tracing::info!(
            "Opened dashboard {} ({} widgets, {} bound)",
            dashboard.id,
            dashboard.widgets.len(),
            bound.len()
        );
        self.dashboard = Some(dashboard);

        for widget in &bound {
            self.bind_widget(&widget.id);
            self.scheduler.schedule_auto_refresh(widget);
        }
        self.arm_dashboard_refresh(auto_refresh, seconds);
        self.dispatcher.request_render();
    }

    fn close(&mut self, deleting: Option<String>) {
        let current = self.dashboard.as_ref().map(|d| d.id.clone());
        if let Some(id) = &deleting {
            if current.as_ref() != Some(id) {
                return;
            }
            self.save_pending = false;
        }

        self.teardown_dashboard();
        self.dashboard = None;
        self.dispatcher.request_render();
    }

    /// Cancels timers, destroys charts and resets the pointer session.
    /// A save still pending for the outgoing dashboard is queued first.
    fn teardown_dashboard(&mut self) {
        tracing::debug!("Releasing {} live charts", self.dispatcher.live_charts());
        if self.save_pending {
            self.save_pending = false;
            if let Some(dashboard) = &self.dashboard {
                self.saves.schedule(dashboard.clone());
            }
        }
        self.scheduler.teardown();
        self.dispatcher.clear();
        self.interaction = InteractionState::Idle;
        self.settle_generation.clear();
    }

    fn arm_dashboard_refresh(&mut self, auto_refresh: bool, seconds: u32) {
        if auto_refresh {
            self.scheduler.arm_dashboard_refresh(seconds);
        } else {
            self.scheduler.disarm_dashboard_refresh();
        }
    }

    fn delete_widget(&mut self, widget_id: &str) {
        let Some(dashboard) = self.dashboard.as_mut() else {
            return;
        };
        if dashboard.delete_widget(widget_id).is_none() {
            tracing::debug!("Delete ignored for unknown widget {}", widget_id);
            return;
        }

        if self.interaction.active_widget() == Some(widget_id) {
            self.interaction = InteractionState::Idle;
        }
        self.scheduler.forget(widget_id);
        self.settle_generation.remove(widget_id);
        self.mutated();
    }

    fn toggle_selection(&mut self, widget_id: &str) {
        let changed = self
            .dashboard
            .as_mut()
            .and_then(|d| d.select_widget(widget_id))
            .is_some();
        if changed {
            self.mutated();
        }
    }

    fn control(&mut self, widget_id: &str, action: ControlAction) {
        let Some(dashboard) = self.dashboard.as_mut() else {
            return;
        };
        let changed = match action {
            ControlAction::Delete => return self.delete_widget(widget_id),
            ControlAction::Minimize => dashboard.toggle_minimize(widget_id).is_some(),
            ControlAction::Expand => dashboard.toggle_expand(widget_id).is_some(),
        };
        if changed {
            self.mutated();
        }
    }

    fn configure(&mut self, widget_id: &str, config: WidgetConfig) {
        let Some(dashboard) = self.dashboard.as_mut() else {
            return;
        };
        let Some(change) = dashboard.configure_widget(widget_id, config) else {
            return;
        };
        let Some(widget) = dashboard.widget(widget_id).cloned() else {
            return;
        };

        if change.source_changed && widget.data_source.is_none() {
            self.scheduler.forget(widget_id);
        }
        if change.source_changed || change.interval_changed {
            self.scheduler.schedule_auto_refresh(&widget);
        }
        if widget.widget_type.is_data_bound() && widget.data_source.is_some() {
            self.submit_widget(&widget);
        } else if widget.widget_type == WidgetType::TextHeader && change.title_changed {
            self.submit_widget(&widget);
        }
        self.mutated();
    }

    /// Posts the editor contents. For a bound widget the backend's executed result set,
    /// when present, becomes its first data instead of a separate bind; text headers
    /// only post their content.
    fn submit_widget(&mut self, widget: &Widget) {
        let token = self.scheduler.issue_token(&widget.id);
        if widget.widget_type.is_data_bound() {
            if let Some(dashboard) = self.dashboard.as_mut() {
                dashboard.begin_loading(&widget.id);
            }
        }

        let form = WidgetForm {
            title: widget.title.clone(),
            source: widget.data_source.clone(),
            refresh_interval_ms: widget.refresh_interval_ms,
            font_size: widget.font_size,
            text_content: widget.content.clone(),
        };
        let persistence = self.persistence.clone();
        let events = self.events.clone();
        let widget_id = widget.id.clone();

        tokio::spawn(async move {
            let outcome = persistence.save_widget(&form).await;
            let _ = events.send(BuilderEvent::WidgetSaved {
                widget_id,
                token,
                outcome,
            });
        });
    }

    fn on_widget_saved(
        &mut self,
        widget_id: &str,
        token: u64,
        outcome: Result<WidgetSaveResponse, RepositoryError>,
    ) {
        if !self.scheduler.accept(widget_id, token) {
            tracing::debug!("Dropping superseded widget save result for {}", widget_id);
            return;
        }

        let data_bound = self
            .dashboard
            .as_ref()
            .and_then(|d| d.widget(widget_id))
            .is_some_and(|w| w.widget_type.is_data_bound());
        if !data_bound {
            if let Err(e) = outcome {
                self.notifier
                    .warn(format!("Widget settings were not saved remotely: {}", e));
                self.dispatcher.request_render();
            }
            return;
        }

        match outcome {
            Ok(WidgetSaveResponse {
                saved_query: Some(rows),
                ..
            }) => self.apply_rows(widget_id, &rows),
            Ok(_) => self.bind_widget(widget_id),
            Err(e) => {
                self.notifier
                    .warn(format!("Widget settings were not saved remotely: {}", e));
                self.bind_widget(widget_id);
            }
        }
    }

    fn bind_widget(&mut self, widget_id: &str) {
        let Some(dashboard) = self.dashboard.as_mut() else {
            return;
        };
        let Some(source) = dashboard.widget(widget_id).and_then(|w| w.data_source.clone()) else {
            return;
        };

        dashboard.begin_loading(widget_id);
        self.scheduler.bind(widget_id, &source);
        self.dispatcher.request_render();
    }

    /// Rebinds that must reach the backend: timer ticks and retries skip the fetch cache.
    /// Widgets sharing a source still share the one fresh fetch.
    fn refresh_widgets(&mut self, widget_ids: &[String]) {
        let sources: HashSet<String> = self
            .dashboard
            .iter()
            .flat_map(|d| widget_ids.iter().filter_map(move |id| d.widget(id)))
            .filter_map(|w| w.data_source.clone())
            .collect();
        for source in &sources {
            self.scheduler.invalidate(source);
        }
        for widget_id in widget_ids {
            self.bind_widget(widget_id);
        }
    }

    fn apply_rows(&mut self, widget_id: &str, rows: &[Row]) {
        let Some(dashboard) = self.dashboard.as_mut() else {
            return;
        };
        let Some(widget_type) = dashboard.widget(widget_id).map(|w| w.widget_type) else {
            return;
        };

        if let Some(data) = shape_rows(widget_type, rows) {
            dashboard.apply_widget_data(widget_id, data);
            self.mutated();
        }
    }

    fn on_scheduler_event(&mut self, event: SchedulerEvent) {
        match event {
            SchedulerEvent::BindResolved {
                widget_id,
                token,
                outcome,
            } => {
                if !self.scheduler.accept(&widget_id, token) {
                    tracing::debug!("Dropping superseded result for {} (token {})", widget_id, token);
                    return;
                }
                match outcome {
                    Ok(rows) => self.apply_rows(&widget_id, &rows),
                    Err(e) => {
                        let Some(dashboard) = self.dashboard.as_mut() else {
                            return;
                        };
                        let title = dashboard
                            .widget(&widget_id)
                            .map(|w| w.title.clone())
                            .unwrap_or_else(|| widget_id.clone());
                        if dashboard.apply_widget_error(&widget_id, e.to_string()) {
                            self.notifier
                                .error(format!("Failed to load data for '{}': {}", title, e));
                            self.mutated();
                        }
                    }
                }
            }
            SchedulerEvent::RefreshDue { widget_id } => self.refresh_widgets(&[widget_id]),
            SchedulerEvent::DashboardRefreshDue => {
                let bound: Vec<String> = self
                    .dashboard
                    .iter()
                    .flat_map(|d| d.widgets.iter())
                    .filter(|w| w.data_source.is_some())
                    .map(|w| w.id.clone())
                    .collect();
                self.refresh_widgets(&bound);
            }
        }
    }

    fn pointer(&mut self, event: PointerEvent) {
        let Some(dashboard) = self.dashboard.as_ref() else {
            return;
        };
        let state = std::mem::take(&mut self.interaction);
        let before = state.label();
        let transition = state.on_event(event, &dashboard.widgets);
        self.interaction = transition.state;
        if self.interaction.label() != before {
            self.dispatcher.request_render();
        }

        for intent in transition.intents {
            self.apply_intent(intent);
        }
    }

    fn apply_intent(&mut self, intent: Intent) {
        let Some(dashboard) = self.dashboard.as_mut() else {
            return;
        };
        match intent {
            Intent::MoveWidget {
                widget_id,
                position,
            } => {
                if dashboard.move_widget(&widget_id, position) {
                    self.dispatcher.request_render();
                }
            }
            Intent::ResizeWidget { widget_id, size } => {
                if dashboard.resize_widget(&widget_id, size) {
                    self.dispatcher.request_render();
                }
            }
            Intent::CommitGeometry { widget_id } => {
                if dashboard.commit_geometry(&widget_id) {
                    self.mutated();
                }
            }
            Intent::ToggleSelection { widget_id } => self.toggle_selection(&widget_id),
            Intent::Control { widget_id, action } => self.control(&widget_id, action),
            Intent::DismissEditor => {
                if dashboard.clear_selection() {
                    self.mutated();
                }
            }
            Intent::ChartRelayout { widget_id } => self.schedule_relayout(widget_id),
        }
    }

    /// Debounced: only the last resize step within the settle window triggers a relayout
    fn schedule_relayout(&mut self, widget_id: String) {
        let generation = {
            let counter = self.settle_generation.entry(widget_id.clone()).or_insert(0);
            *counter += 1;
            *counter
        };
        let events = self.events.clone();
        let settle = self.resize_settle;

        tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            let _ = events.send(BuilderEvent::ChartSettled {
                widget_id,
                generation,
            });
        });
    }
}

/// Cloneable front door to the session task
#[derive(Clone)]
pub struct BuilderHandle {
    events: mpsc::UnboundedSender<BuilderEvent>,
    view: watch::Receiver<Arc<CanvasView>>,
    persistence: Arc<PersistenceSync>,
    saves: SaveQueue,
    directory: Arc<dyn QueryDirectory>,
}

impl BuilderHandle {
    pub async fn send(&self, command: BuilderCommand) -> Result<CommandOutcome, BuilderError> {
        let (tx, rx) = oneshot::channel();
        self.events
            .send(BuilderEvent::Command(command, tx))
            .map_err(|_| BuilderError::SessionClosed)?;
        rx.await.map_err(|_| BuilderError::SessionClosed)?
    }

    async fn run(&self, command: BuilderCommand) -> Result<(), BuilderError> {
        self.send(command).await.map(|_| ())
    }

    pub fn canvas(&self) -> Arc<CanvasView> {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<CanvasView>> {
        self.view.clone()
    }

    pub async fn snapshot(&self) -> Result<Option<Dashboard>, BuilderError> {
        match self.send(BuilderCommand::Snapshot).await? {
            CommandOutcome::Snapshot(dashboard) => Ok(dashboard.map(|d| *d)),
            _ => Ok(None),
        }
    }

    pub async fn add_widget(&self, widget_type: WidgetType) -> Result<String, BuilderError> {
        match self.send(BuilderCommand::AddWidget(widget_type)).await? {
            CommandOutcome::WidgetCreated(id) => Ok(id),
            other => Err(BuilderError::Validation(format!(
                "unexpected reply to add widget: {:?}",
                other
            ))),
        }
    }

    pub async fn delete_widget(&self, widget_id: &str) -> Result<(), BuilderError> {
        self.run(BuilderCommand::DeleteWidget(widget_id.to_string())).await
    }

    pub async fn select_widget(&self, widget_id: &str) -> Result<(), BuilderError> {
        self.run(BuilderCommand::SelectWidget(widget_id.to_string())).await
    }

    pub async fn toggle_minimize(&self, widget_id: &str) -> Result<(), BuilderError> {
        self.run(BuilderCommand::ToggleMinimize(widget_id.to_string())).await
    }

    pub async fn toggle_expand(&self, widget_id: &str) -> Result<(), BuilderError> {
        self.run(BuilderCommand::ToggleExpand(widget_id.to_string())).await
    }

    pub async fn configure_widget(
        &self,
        widget_id: &str,
        config: WidgetConfig,
    ) -> Result<(), BuilderError> {
        self.run(BuilderCommand::Configure {
            widget_id: widget_id.to_string(),
            config,
        })
        .await
    }

    pub async fn set_text(
        &self,
        widget_id: &str,
        content: String,
        font_size: Option<u32>,
    ) -> Result<(), BuilderError> {
        self.run(BuilderCommand::SetText {
            widget_id: widget_id.to_string(),
            content,
            font_size,
        })
        .await
    }

    pub async fn retry(&self, widget_id: &str) -> Result<(), BuilderError> {
        self.run(BuilderCommand::Retry(widget_id.to_string())).await
    }

    pub async fn pointer(&self, event: PointerEvent) -> Result<(), BuilderError> {
        self.run(BuilderCommand::Pointer(event)).await
    }

    /// A new name follows the same rules as at creation, ignoring the open dashboard itself
    pub async fn update_settings(&self, mut settings: DashboardSettings) -> Result<(), BuilderError> {
        if let Some(name) = settings.name.take() {
            let current = self
                .canvas()
                .dashboard
                .as_ref()
                .map(|d| d.id.clone())
                .ok_or(BuilderError::NoDashboard)?;
            settings.name = Some(self.persistence.validate_name(&name, Some(current.as_str())).await?);
        }
        self.run(BuilderCommand::UpdateSettings(settings)).await
    }

    pub async fn list_dashboards(&self) -> Vec<Dashboard> {
        self.persistence.list().await
    }

    pub async fn list_queries(&self) -> Result<Vec<StoredQuery>, BuilderError> {
        Ok(self.directory.list_queries().await?)
    }

    /// Validates, persists and opens a new dashboard
    pub async fn create_dashboard(
        &self,
        name: &str,
        description: &str,
    ) -> Result<Dashboard, BuilderError> {
        let created = self.persistence.create(name, description).await?;

        if let Some(e) = created.remote_error {
            self.run(BuilderCommand::Notify {
                level: NotificationLevel::Warning,
                message: format!("Dashboard '{}' exists only locally: {}", created.dashboard.name, e),
            })
            .await?;
        }
        self.run(BuilderCommand::Open(Box::new(created.dashboard.clone())))
            .await?;
        Ok(created.dashboard)
    }

    pub async fn open_dashboard(&self, id: &str) -> Result<Dashboard, BuilderError> {
        let dashboard = self
            .persistence
            .load(id)
            .await
            .ok_or_else(|| BuilderError::NotFound(id.to_string()))?;
        self.run(BuilderCommand::Open(Box::new(dashboard.clone())))
            .await?;
        Ok(dashboard)
    }

    pub async fn close_dashboard(&self) -> Result<(), BuilderError> {
        self.run(BuilderCommand::Close { deleting: None }).await
    }

    /// Goes through the save queue so no snapshot queued or in flight can write it back
    pub async fn delete_dashboard(&self, id: &str) -> Result<(), BuilderError> {
        self.run(BuilderCommand::Close {
            deleting: Some(id.to_string()),
        })
        .await?;

        match self.saves.delete(id).await {
            Ok(()) => Ok(()),
            Err(QueueError::Stopped) => Err(BuilderError::SessionClosed),
            Err(QueueError::Persistence(e)) => {
                self.run(BuilderCommand::Notify {
                    level: NotificationLevel::Warning,
                    message: format!("Dashboard {} removed locally only: {}", id, e),
                })
                .await
            }
        }
    }

    pub fn shutdown(&self) {
        let _ = self.events.send(BuilderEvent::Shutdown);
    }
}
