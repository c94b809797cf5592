use crate::dashboard::config::{Layout, Section, SettingsOverrides};
use crate::dashboard::error::{DashboardError, DashboardResult, LayoutError};
use crate::dashboard::layout::{LayoutModel, Location, Mode};
use crate::dashboard::templates::TemplateStore;
use crate::dashboard::widgets::{WidgetCatalog, WidgetId};
use serde_json::Value;

/// Part of the view tree that must be rebuilt after an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderScope {
    All,
    Section(Section),
    ChartRow(usize),
}

impl From<Location> for RenderScope {
    fn from(location: Location) -> Self {
        match location.row {
            Some(row) => RenderScope::ChartRow(row),
            None => RenderScope::Section(location.section),
        }
    }
}

/// Questions the session needs answered by the user.
pub trait UserPrompt {
    /// Yes/no gate in front of destructive intents.
    fn confirm(&mut self, message: &str) -> bool;

    /// Name for a new template; `None` cancels.
    fn template_name(&mut self) -> Option<String>;
}

/// Edit/view state machine mediating user intents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditSession {
    mode: Mode,
    editing_template: Option<String>,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_editing(&self) -> bool {
        self.mode == Mode::Editing
    }

    pub fn editing_template(&self) -> Option<&str> {
        self.editing_template.as_deref()
    }

    fn require_editing(&self) -> DashboardResult<()> {
        if self.is_editing() {
            Ok(())
        } else {
            Err(DashboardError::NotEditing)
        }
    }

    fn require_viewing(&self) -> DashboardResult<()> {
        if self.is_editing() {
            Err(DashboardError::AlreadyEditing)
        } else {
            Ok(())
        }
    }

    fn enter(&mut self, model: &mut LayoutModel, template: String) {
        tracing::info!(template = %template, "entering dashboard edit mode");
        self.mode = Mode::Editing;
        self.editing_template = Some(template);
        model.set_mode(Mode::Editing);
    }

    fn leave(&mut self, model: &mut LayoutModel) {
        tracing::info!("leaving dashboard edit mode");
        self.mode = Mode::Viewing;
        self.editing_template = None;
        model.set_mode(Mode::Viewing);
    }

    /// Open an existing template for editing; it becomes the active template.
    pub async fn edit_template(
        &mut self,
        name: &str,
        model: &mut LayoutModel,
        templates: &TemplateStore,
    ) -> DashboardResult<Vec<RenderScope>> {
        self.require_viewing()?;
        let template = templates.template(name).await?;
        templates.set_active(&template.name).await?;
        model.replace(template.layout, template.settings);
        self.enter(model, template.name);
        Ok(vec![RenderScope::All])
    }

    /// Create an all-placeholder template and start editing it.
    pub async fn create_template(
        &mut self,
        prompt: &mut dyn UserPrompt,
        model: &mut LayoutModel,
        templates: &TemplateStore,
    ) -> DashboardResult<Vec<RenderScope>> {
        self.require_viewing()?;
        let Some(name) = prompt.template_name() else {
            return Ok(Vec::new());
        };
        let layout = Layout::empty();
        let settings = SettingsOverrides::new();
        let template = templates.create_template(&name, &layout, &settings).await?;
        templates.set_active(&template.name).await?;
        model.replace(layout, settings);
        self.enter(model, template.name);
        Ok(vec![RenderScope::All])
    }

    /// Persist the live model and return to viewing. On failure the session
    /// stays in edit mode with the in-memory layout intact.
    pub async fn save(
        &mut self,
        model: &mut LayoutModel,
        templates: &TemplateStore,
    ) -> DashboardResult<Vec<RenderScope>> {
        self.require_editing()?;
        templates.save(model.layout(), model.overrides()).await?;
        self.leave(model);
        Ok(vec![RenderScope::All])
    }

    /// Drop unsaved edits by reloading the persisted state.
    pub async fn discard(
        &mut self,
        model: &mut LayoutModel,
        templates: &TemplateStore,
    ) -> DashboardResult<Vec<RenderScope>> {
        self.require_editing()?;
        let resolved = templates.resolve().await?;
        model.replace(resolved.layout, resolved.settings);
        self.leave(model);
        Ok(vec![RenderScope::All])
    }

    /// Replace the working layout with the built-in arrangement.
    pub fn reset_layout(&mut self, model: &mut LayoutModel) -> DashboardResult<Vec<RenderScope>> {
        self.require_editing()?;
        model.replace_layout(Layout::default());
        Ok(vec![RenderScope::All])
    }

    pub fn add(
        &mut self,
        model: &mut LayoutModel,
        catalog: &WidgetCatalog,
        section: Section,
        id: WidgetId,
        index: usize,
    ) -> DashboardResult<Vec<RenderScope>> {
        self.require_editing()?;
        check_section(catalog, section, id)?;
        let location = model.place_widget(section, id, index)?;
        Ok(vec![location.into()])
    }

    /// Remove a widget after the user confirms. Declining is a no-op.
    pub fn delete(
        &mut self,
        model: &mut LayoutModel,
        catalog: &WidgetCatalog,
        prompt: &mut dyn UserPrompt,
        id: WidgetId,
    ) -> DashboardResult<Vec<RenderScope>> {
        self.require_editing()?;
        if model.locate(id).is_none() {
            return Err(LayoutError::NotFound(id).into());
        }
        let message = format!("Remove \"{}\" from the dashboard?", catalog.title_of(id));
        if !prompt.confirm(&message) {
            return Ok(Vec::new());
        }
        let location = model.remove_widget(id)?;
        Ok(vec![location.into()])
    }

    pub fn move_widget(
        &mut self,
        model: &mut LayoutModel,
        catalog: &WidgetCatalog,
        id: WidgetId,
        section: Section,
        index: usize,
    ) -> DashboardResult<Vec<RenderScope>> {
        self.require_editing()?;
        check_section(catalog, section, id)?;
        let outcome = model.move_widget(id, section, index)?;
        let from = RenderScope::from(outcome.from);
        let to = RenderScope::from(outcome.to);
        Ok(if from == to { vec![from] } else { vec![from, to] })
    }

    /// Store a settings override. Outside edit mode it is persisted right
    /// away; while editing it is persisted by [`EditSession::save`].
    pub async fn apply_settings(
        &mut self,
        model: &mut LayoutModel,
        templates: &TemplateStore,
        id: WidgetId,
        settings: Value,
    ) -> DashboardResult<Vec<RenderScope>> {
        model.set_override(id, settings);
        self.persist_settings(model, templates, id).await
    }

    pub async fn reset_settings(
        &mut self,
        model: &mut LayoutModel,
        templates: &TemplateStore,
        id: WidgetId,
    ) -> DashboardResult<Vec<RenderScope>> {
        if model.clear_override(id).is_none() {
            return Ok(Vec::new());
        }
        self.persist_settings(model, templates, id).await
    }

    async fn persist_settings(
        &self,
        model: &LayoutModel,
        templates: &TemplateStore,
        id: WidgetId,
    ) -> DashboardResult<Vec<RenderScope>> {
        if !self.is_editing() {
            templates.save(model.layout(), model.overrides()).await?;
        }
        Ok(model.locate(id).map(RenderScope::from).into_iter().collect())
    }
}

fn check_section(catalog: &WidgetCatalog, section: Section, id: WidgetId) -> DashboardResult<()> {
    match catalog.section_of(id) {
        Some(home) if home == section => Ok(()),
        _ => Err(LayoutError::WrongSection {
            section,
            widget: id,
        }
        .into()),
    }
}
