use crate::dashboard::config::{CalendarSettings, Layout, Section, Slot};
use crate::dashboard::data_cache::{wait_for_trades, Account, DashboardData, Strategy, TradeFeed};
use crate::dashboard::error::{DashboardError, DashboardResult};
use crate::dashboard::layout::{LayoutModel, Mode};
use crate::dashboard::session::{EditSession, RenderScope, UserPrompt};
use crate::dashboard::templates::{ResolvedLayout, TemplateStore};
use crate::dashboard::view::{RowView, SectionBody, SectionView, ViewNode, ViewSurface, WidgetCanvas};
use crate::dashboard::widgets::{RenderContext, WidgetCatalog, WidgetId};
use crate::settings::Settings;
use crate::store::DashboardStore;
use crate::toast_log::{NotificationLevel, Notifier};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Host-supplied data the dashboard is opened with.
#[derive(Debug, Clone, Default)]
pub struct DashboardInputs {
    pub accounts: Vec<Account>,
    pub active_account_id: String,
    pub strategies: Vec<Strategy>,
}

/// Everything the controller mutates while the dashboard is open.
#[derive(Debug, Clone, Default)]
pub struct DashboardContext {
    pub model: LayoutModel,
    pub session: EditSession,
    pub data: DashboardData,
    pub calendar: CalendarSettings,
}

/// Orchestrates startup, user intents and scoped re-rendering.
pub struct DashboardController {
    catalog: WidgetCatalog,
    templates: TemplateStore,
    notifier: Arc<dyn Notifier>,
    trade_wait_timeout: Duration,
    ctx: DashboardContext,
    initialized: bool,
}

impl DashboardController {
    pub fn new(
        catalog: WidgetCatalog,
        store: Arc<dyn DashboardStore>,
        notifier: Arc<dyn Notifier>,
        settings: &Settings,
    ) -> Self {
        Self {
            catalog,
            templates: TemplateStore::new(store),
            notifier,
            trade_wait_timeout: settings.trade_wait_timeout(),
            ctx: DashboardContext::default(),
            initialized: false,
        }
    }

    pub fn context(&self) -> &DashboardContext {
        &self.ctx
    }

    pub fn mode(&self) -> Mode {
        self.ctx.session.mode()
    }

    pub fn layout(&self) -> &Layout {
        self.ctx.model.layout()
    }

    pub fn catalog(&self) -> &WidgetCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut WidgetCatalog {
        &mut self.catalog
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Validate the host environment, load the persisted layout alongside the
    /// trade dataset and render every section.
    ///
    /// Configuration problems fail before anything is rendered. A storage
    /// failure is reported and the built-in layout is used instead.
    pub async fn initialize(
        &mut self,
        surface: &mut dyn ViewSurface,
        inputs: DashboardInputs,
        trades: TradeFeed,
    ) -> DashboardResult<()> {
        if let Err(err) = validate_environment(&*surface, &inputs) {
            self.report(&err);
            return Err(err);
        }

        let (resolved, trades) = tokio::join!(
            self.templates.resolve(),
            wait_for_trades(trades, self.trade_wait_timeout)
        );
        let trades = match trades {
            Ok(trades) => trades,
            Err(err) => {
                self.report(&err);
                return Err(err);
            }
        };
        let resolved = resolved.unwrap_or_else(|err| {
            self.report(&err);
            ResolvedLayout::built_in()
        });
        let calendar = self.templates.calendar_settings().await.unwrap_or_else(|err| {
            self.report(&err);
            CalendarSettings::default()
        });

        tracing::info!(
            source = ?resolved.source,
            template = ?resolved.active,
            trades = trades.len(),
            "dashboard initialized"
        );
        self.ctx = DashboardContext {
            model: LayoutModel::new(resolved.layout, resolved.settings, Mode::Viewing),
            session: EditSession::new(),
            data: DashboardData::new(
                trades,
                inputs.strategies,
                inputs.accounts,
                inputs.active_account_id,
            ),
            calendar,
        };
        self.initialized = true;
        self.render_scope(surface, RenderScope::All);
        Ok(())
    }

    /// Rebuild and mount the part of the view tree covered by `scope`.
    pub fn render_scope(&self, surface: &mut dyn ViewSurface, scope: RenderScope) {
        match scope {
            RenderScope::All => {
                for section in Section::ALL {
                    surface.mount_section(self.build_section(section));
                }
            }
            RenderScope::Section(section) => surface.mount_section(self.build_section(section)),
            RenderScope::ChartRow(row) => {
                let grid = self.ctx.model.layout().grid(Section::Charts);
                match grid.get(row) {
                    Some(cells) => {
                        surface.mount_chart_row(self.ctx.model.mode(), self.build_row(row, cells))
                    }
                    None => tracing::warn!(row, "chart row does not exist"),
                }
            }
        }
    }

    /// View of one section, derived from the current model only.
    pub fn build_section(&self, section: Section) -> SectionView {
        let mode = self.ctx.model.mode();
        let body = if section.shape().is_grid() {
            let rows = self
                .ctx
                .model
                .layout()
                .grid(section)
                .iter()
                .enumerate()
                .map(|(row, cells)| self.build_row(row, cells))
                .collect();
            SectionBody::Rows(rows)
        } else {
            let slots = self
                .ctx
                .model
                .layout()
                .grid(section)
                .concat()
                .iter()
                .enumerate()
                .filter_map(|(index, slot)| self.build_slot(index, slot))
                .collect();
            SectionBody::Slots(slots)
        };
        SectionView {
            section,
            mode,
            body,
        }
    }

    fn build_row(&self, row: usize, cells: &[Slot]) -> RowView {
        let cols = Section::Charts.shape().cols();
        RowView {
            index: row,
            cells: cells
                .iter()
                .enumerate()
                .filter_map(|(col, slot)| self.build_slot(row * cols + col, slot))
                .collect(),
        }
    }

    fn build_slot(&self, index: usize, slot: &Slot) -> Option<ViewNode> {
        match slot.widget() {
            Some(id) => Some(self.render_widget(id)),
            None if self.ctx.model.mode() == Mode::Editing => Some(ViewNode::Placeholder { index }),
            None => None,
        }
    }

    fn render_widget(&self, id: WidgetId) -> ViewNode {
        let Some(descriptor) = self.catalog.descriptor(id) else {
            return ViewNode::Error {
                id,
                message: format!("widget '{id}' is not registered"),
            };
        };
        let data = &self.ctx.data;
        let render_ctx = RenderContext {
            trades: &data.trades,
            strategies: &data.strategies,
            active_account_id: &data.active_account_id,
            accounts: &data.accounts,
            trades_by_month: &data.trades_by_month,
            calendar: &self.ctx.calendar,
        };
        let settings = descriptor.effective_settings(self.ctx.model.override_for(id));
        let mut canvas = WidgetCanvas::new();
        match descriptor
            .renderer()
            .render(id, &mut canvas, &render_ctx, &settings)
        {
            Ok(()) => ViewNode::Widget {
                id,
                title: descriptor.title.to_string(),
                canvas,
                editable: self.ctx.model.mode() == Mode::Editing,
            },
            Err(err) => {
                tracing::error!(widget = %id, error = %format!("{err:#}"), "widget render failed");
                let message = format!("Unable to display {}: {err:#}", descriptor.title);
                self.notifier.notify(&message, NotificationLevel::Error);
                ViewNode::Error { id, message }
            }
        }
    }

    fn report(&self, err: &DashboardError) {
        let message = err.to_string();
        if err.is_validation() {
            tracing::warn!(error = %message, "dashboard intent rejected");
            self.notifier.notify(&message, NotificationLevel::Warning);
        } else {
            tracing::error!(error = %message, "dashboard operation failed");
            self.notifier.notify(&message, NotificationLevel::Error);
        }
    }

    fn ensure_initialized(&self) -> DashboardResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(DashboardError::Configuration(
                "the dashboard has not been initialized".into(),
            ))
        }
    }

    /// Apply the outcome of an intent: re-render what changed, or report the
    /// failure with the model untouched.
    fn finish(
        &self,
        surface: &mut dyn ViewSurface,
        outcome: DashboardResult<Vec<RenderScope>>,
        success: Option<String>,
    ) -> DashboardResult<()> {
        match outcome {
            Ok(scopes) => {
                let changed = !scopes.is_empty();
                for scope in coalesce(scopes) {
                    self.render_scope(surface, scope);
                }
                if let (true, Some(message)) = (changed, success) {
                    self.notifier.notify(&message, NotificationLevel::Success);
                }
                Ok(())
            }
            Err(err) => {
                self.report(&err);
                Err(err)
            }
        }
    }

    pub async fn edit_template(
        &mut self,
        surface: &mut dyn ViewSurface,
        name: &str,
    ) -> DashboardResult<()> {
        let outcome = match self.ensure_initialized() {
            Ok(()) => {
                self.ctx
                    .session
                    .edit_template(name, &mut self.ctx.model, &self.templates)
                    .await
            }
            Err(err) => Err(err),
        };
        self.finish(surface, outcome, None)
    }

    pub async fn create_template(
        &mut self,
        surface: &mut dyn ViewSurface,
        prompt: &mut dyn UserPrompt,
    ) -> DashboardResult<()> {
        let outcome = match self.ensure_initialized() {
            Ok(()) => {
                self.ctx
                    .session
                    .create_template(prompt, &mut self.ctx.model, &self.templates)
                    .await
            }
            Err(err) => Err(err),
        };
        let success = self
            .ctx
            .session
            .editing_template()
            .map(|name| format!("Template \"{name}\" created"));
        self.finish(surface, outcome, success)
    }

    pub async fn save(&mut self, surface: &mut dyn ViewSurface) -> DashboardResult<()> {
        let outcome = self
            .ctx
            .session
            .save(&mut self.ctx.model, &self.templates)
            .await;
        self.finish(surface, outcome, Some("Dashboard saved".to_string()))
    }

    pub async fn discard(&mut self, surface: &mut dyn ViewSurface) -> DashboardResult<()> {
        let outcome = self
            .ctx
            .session
            .discard(&mut self.ctx.model, &self.templates)
            .await;
        self.finish(surface, outcome, None)
    }

    pub fn reset_layout(&mut self, surface: &mut dyn ViewSurface) -> DashboardResult<()> {
        let outcome = self.ctx.session.reset_layout(&mut self.ctx.model);
        self.finish(surface, outcome, None)
    }

    pub fn add_widget(
        &mut self,
        surface: &mut dyn ViewSurface,
        section: Section,
        id: WidgetId,
        index: usize,
    ) -> DashboardResult<()> {
        let outcome = self
            .ctx
            .session
            .add(&mut self.ctx.model, &self.catalog, section, id, index);
        self.finish(surface, outcome, None)
    }

    pub fn delete_widget(
        &mut self,
        surface: &mut dyn ViewSurface,
        prompt: &mut dyn UserPrompt,
        id: WidgetId,
    ) -> DashboardResult<()> {
        let outcome = self
            .ctx
            .session
            .delete(&mut self.ctx.model, &self.catalog, prompt, id);
        self.finish(surface, outcome, None)
    }

    pub fn move_widget(
        &mut self,
        surface: &mut dyn ViewSurface,
        id: WidgetId,
        section: Section,
        index: usize,
    ) -> DashboardResult<()> {
        let outcome = self
            .ctx
            .session
            .move_widget(&mut self.ctx.model, &self.catalog, id, section, index);
        self.finish(surface, outcome, None)
    }

    pub async fn apply_settings(
        &mut self,
        surface: &mut dyn ViewSurface,
        id: WidgetId,
        settings: Value,
    ) -> DashboardResult<()> {
        let outcome = self
            .ctx
            .session
            .apply_settings(&mut self.ctx.model, &self.templates, id, settings)
            .await;
        self.finish(surface, outcome, None)
    }

    pub async fn reset_settings(
        &mut self,
        surface: &mut dyn ViewSurface,
        id: WidgetId,
    ) -> DashboardResult<()> {
        let outcome = self
            .ctx
            .session
            .reset_settings(&mut self.ctx.model, &self.templates, id)
            .await;
        self.finish(surface, outcome, None)
    }

    /// Persist calendar display options and redraw the calendar if placed.
    pub async fn set_calendar_settings(
        &mut self,
        surface: &mut dyn ViewSurface,
        calendar: CalendarSettings,
    ) -> DashboardResult<()> {
        let outcome = match self.templates.save_calendar_settings(&calendar).await {
            Ok(()) => {
                self.ctx.calendar = calendar;
                Ok(self
                    .ctx
                    .model
                    .locate(WidgetId::TradingCalendar)
                    .map(RenderScope::from)
                    .into_iter()
                    .collect())
            }
            Err(err) => Err(err),
        };
        self.finish(surface, outcome, None)
    }

    /// Switch the live dashboard to another template without editing it.
    pub async fn select_template(
        &mut self,
        surface: &mut dyn ViewSurface,
        name: &str,
    ) -> DashboardResult<()> {
        let outcome = self.load_template(name).await;
        self.finish(surface, outcome, Some(format!("Switched to \"{name}\"")))
    }

    async fn load_template(&mut self, name: &str) -> DashboardResult<Vec<RenderScope>> {
        self.ensure_initialized()?;
        if self.ctx.session.is_editing() {
            return Err(DashboardError::AlreadyEditing);
        }
        let template = self.templates.template(name).await?;
        self.templates.set_active(&template.name).await?;
        self.ctx.model.replace(template.layout, template.settings);
        Ok(vec![RenderScope::All])
    }

    /// Delete a stored template. The live layout is unaffected.
    pub async fn delete_template(&self, name: &str) -> DashboardResult<()> {
        match self.templates.delete_template(name).await {
            Ok(()) => {
                self.notifier
                    .notify(&format!("Template \"{name}\" deleted"), NotificationLevel::Success);
                Ok(())
            }
            Err(err) => {
                self.report(&err);
                Err(err)
            }
        }
    }

    pub async fn rename_template(&self, from: &str, to: &str) -> DashboardResult<()> {
        let outcome = if self.ctx.session.is_editing() {
            Err(DashboardError::AlreadyEditing)
        } else {
            self.templates.rename_template(from, to).await
        };
        if let Err(err) = outcome {
            self.report(&err);
            return Err(err);
        }
        Ok(())
    }
}

fn validate_environment(surface: &dyn ViewSurface, inputs: &DashboardInputs) -> DashboardResult<()> {
    if let Some(section) = Section::ALL.into_iter().find(|s| !surface.has_anchor(*s)) {
        return Err(DashboardError::Configuration(format!(
            "no anchor element for the {section} section"
        )));
    }
    if inputs.accounts.is_empty() {
        return Err(DashboardError::Configuration("no accounts were provided".into()));
    }
    if !inputs
        .accounts
        .iter()
        .any(|a| a.id == inputs.active_account_id)
    {
        return Err(DashboardError::Configuration(format!(
            "active account '{}' is not among the provided accounts",
            inputs.active_account_id
        )));
    }
    Ok(())
}

/// Collapse overlapping scopes so each subtree is mounted once.
fn coalesce(scopes: Vec<RenderScope>) -> Vec<RenderScope> {
    if scopes.contains(&RenderScope::All) {
        return vec![RenderScope::All];
    }
    let charts_whole = scopes.contains(&RenderScope::Section(Section::Charts));
    let mut out: Vec<RenderScope> = Vec::new();
    for scope in scopes {
        if charts_whole && matches!(scope, RenderScope::ChartRow(_)) {
            continue;
        }
        if !out.contains(&scope) {
            out.push(scope);
        }
    }
    out
}
