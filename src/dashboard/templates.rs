use crate::dashboard::config::{
    ActiveTemplateRef, CalendarSettings, DashboardConfig, Layout, SettingsOverrides, Template,
    DEFAULT_TEMPLATE_NAME,
};
use crate::dashboard::error::{DashboardError, DashboardResult};
use crate::store::{DashboardStore, StoreRecord};
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

pub const DASHBOARD_NAMESPACE: &str = "dashboard";
pub const CONFIG_RECORD: &str = "config";
pub const TEMPLATES_RECORD: &str = "templates";
pub const ACTIVE_TEMPLATE_RECORD: &str = "activeTemplate";
pub const CALENDAR_SETTINGS_RECORD: &str = "calendarSettings";

/// Which rule of the startup resolution produced the layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedFrom {
    /// The templates record was empty; the default template was created.
    CreatedDefault,
    ActiveTemplate,
    /// The standalone `config` record, not linked to a template.
    Config,
    BuiltIn,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLayout {
    pub layout: Layout,
    pub settings: SettingsOverrides,
    pub active: Option<String>,
    pub source: ResolvedFrom,
}

impl ResolvedLayout {
    pub fn built_in() -> Self {
        Self {
            layout: Layout::default(),
            settings: SettingsOverrides::new(),
            active: None,
            source: ResolvedFrom::BuiltIn,
        }
    }
}

/// Persistence of templates, the active pointer and the standalone config.
///
/// Each record is read and written independently; nothing is cached here.
#[derive(Clone)]
pub struct TemplateStore {
    store: Arc<dyn DashboardStore>,
}

impl TemplateStore {
    pub fn new(store: Arc<dyn DashboardStore>) -> Self {
        Self { store }
    }

    async fn record(&self, id: &str) -> DashboardResult<Option<StoreRecord>> {
        let records = self
            .store
            .get(DASHBOARD_NAMESPACE)
            .await
            .map_err(DashboardError::Persistence)?;
        Ok(records.into_iter().find(|r| r.id == id))
    }

    /// Decode the `data` field of a record.
    async fn data<T: DeserializeOwned>(&self, id: &str) -> DashboardResult<Option<T>> {
        let Some(record) = self.record(id).await? else {
            return Ok(None);
        };
        let Some(data) = record.get("data") else {
            return Ok(None);
        };
        serde_json::from_value(data.clone())
            .with_context(|| format!("decoding dashboard record '{id}'"))
            .map(Some)
            .map_err(DashboardError::Persistence)
    }

    async fn put_data<T: Serialize>(&self, id: &str, data: &T) -> DashboardResult<()> {
        let value = serde_json::to_value(data)
            .with_context(|| format!("encoding dashboard record '{id}'"))
            .map_err(DashboardError::Persistence)?;
        self.store
            .put(DASHBOARD_NAMESPACE, StoreRecord::new(id).with("data", value))
            .await
            .map_err(DashboardError::Persistence)
    }

    async fn put_templates(&self, templates: &[Template]) -> DashboardResult<()> {
        self.put_data(TEMPLATES_RECORD, &templates).await
    }

    /// Stored templates; `None` when the record has never been written.
    async fn stored_templates(&self) -> DashboardResult<Option<Vec<Template>>> {
        self.data(TEMPLATES_RECORD).await
    }

    pub async fn templates(&self) -> DashboardResult<Vec<Template>> {
        Ok(self.stored_templates().await?.unwrap_or_default())
    }

    pub async fn template(&self, name: &str) -> DashboardResult<Template> {
        self.templates()
            .await?
            .into_iter()
            .find(|t| t.name == name)
            .ok_or_else(|| DashboardError::NotFound(name.to_string()))
    }

    pub async fn active(&self) -> DashboardResult<Option<String>> {
        let active: Option<ActiveTemplateRef> = self.data(ACTIVE_TEMPLATE_RECORD).await?;
        Ok(active.map(|a| a.name))
    }

    async fn put_active(&self, name: &str) -> DashboardResult<()> {
        self.put_data(
            ACTIVE_TEMPLATE_RECORD,
            &ActiveTemplateRef {
                name: name.to_string(),
            },
        )
        .await
    }

    async fn config(&self) -> DashboardResult<Option<DashboardConfig>> {
        let Some(record) = self.record(CONFIG_RECORD).await? else {
            return Ok(None);
        };
        let value = serde_json::Value::Object(record.payload);
        serde_json::from_value(value)
            .context("decoding dashboard config record")
            .map(Some)
            .map_err(DashboardError::Persistence)
    }

    /// Work out which layout and settings are authoritative.
    pub async fn resolve(&self) -> DashboardResult<ResolvedLayout> {
        let Some(templates) = self.stored_templates().await? else {
            return self.resolve_untemplated().await;
        };
        if templates.is_empty() {
            let default = Template::new(
                DEFAULT_TEMPLATE_NAME,
                Layout::default(),
                SettingsOverrides::new(),
            );
            self.put_templates(std::slice::from_ref(&default)).await?;
            self.put_active(&default.name).await?;
            tracing::info!("created default dashboard template");
            return Ok(ResolvedLayout {
                layout: default.layout,
                settings: default.settings,
                active: Some(default.name),
                source: ResolvedFrom::CreatedDefault,
            });
        }

        if let Some(name) = self.active().await? {
            if let Some(template) = templates.into_iter().find(|t| t.name == name) {
                return Ok(ResolvedLayout {
                    layout: template.layout,
                    settings: template.settings,
                    active: Some(template.name),
                    source: ResolvedFrom::ActiveTemplate,
                });
            }
            tracing::warn!(template = %name, "active dashboard template no longer exists");
        }

        self.resolve_untemplated().await
    }

    /// Rules that apply when no template matched: the standalone config, then
    /// the built-in layout.
    async fn resolve_untemplated(&self) -> DashboardResult<ResolvedLayout> {
        if let Some(config) = self.config().await? {
            return Ok(ResolvedLayout {
                layout: config.layout,
                settings: config.settings,
                active: None,
                source: ResolvedFrom::Config,
            });
        }

        Ok(ResolvedLayout::built_in())
    }

    /// Persist the working state and mirror it into the active template.
    pub async fn save(&self, layout: &Layout, settings: &SettingsOverrides) -> DashboardResult<()> {
        let config = serde_json::to_value(DashboardConfig {
            layout: layout.clone(),
            settings: settings.clone(),
        })
        .context("encoding dashboard config")
        .map_err(DashboardError::Persistence)?;
        let record = StoreRecord {
            id: CONFIG_RECORD.to_string(),
            payload: match config {
                serde_json::Value::Object(map) => map,
                _ => serde_json::Map::new(),
            },
        };
        self.store
            .put(DASHBOARD_NAMESPACE, record)
            .await
            .map_err(DashboardError::Persistence)?;

        let Some(active) = self.active().await? else {
            return Ok(());
        };
        let mut templates = self.templates().await?;
        match templates.iter_mut().find(|t| t.name == active) {
            Some(template) => {
                template.layout = layout.clone();
                template.settings = settings.clone();
                self.put_templates(&templates).await?;
                tracing::debug!(template = %active, "dashboard template updated");
            }
            None => tracing::warn!(template = %active, "active template missing; saved config only"),
        }
        Ok(())
    }

    pub async fn create_template(
        &self,
        name: &str,
        layout: &Layout,
        settings: &SettingsOverrides,
    ) -> DashboardResult<Template> {
        let name = validate_name(name)?;
        let mut templates = self.templates().await?;
        if templates.iter().any(|t| t.name == name) {
            return Err(DashboardError::DuplicateName(name));
        }
        let template = Template::new(name, layout.clone(), settings.clone());
        templates.push(template.clone());
        self.put_templates(&templates).await?;
        tracing::info!(template = %template.name, "dashboard template created");
        Ok(template)
    }

    pub async fn delete_template(&self, name: &str) -> DashboardResult<()> {
        if self.active().await?.as_deref() == Some(name) {
            return Err(DashboardError::ActiveTemplateProtected(name.to_string()));
        }
        let mut templates = self.templates().await?;
        let before = templates.len();
        templates.retain(|t| t.name != name);
        if templates.len() == before {
            return Err(DashboardError::NotFound(name.to_string()));
        }
        self.put_templates(&templates).await?;
        tracing::info!(template = %name, "dashboard template deleted");
        Ok(())
    }

    pub async fn set_active(&self, name: &str) -> DashboardResult<()> {
        if !self.templates().await?.iter().any(|t| t.name == name) {
            return Err(DashboardError::NotFound(name.to_string()));
        }
        self.put_active(name).await
    }

    /// Rename a template; the active pointer follows the rename.
    pub async fn rename_template(&self, from: &str, to: &str) -> DashboardResult<()> {
        let to = validate_name(to)?;
        let mut templates = self.templates().await?;
        if from != to && templates.iter().any(|t| t.name == to) {
            return Err(DashboardError::DuplicateName(to));
        }
        let template = templates
            .iter_mut()
            .find(|t| t.name == from)
            .ok_or_else(|| DashboardError::NotFound(from.to_string()))?;
        template.name = to.clone();
        self.put_templates(&templates).await?;
        if self.active().await?.as_deref() == Some(from) {
            self.put_active(&to).await?;
        }
        Ok(())
    }

    pub async fn calendar_settings(&self) -> DashboardResult<CalendarSettings> {
        Ok(self
            .data(CALENDAR_SETTINGS_RECORD)
            .await?
            .unwrap_or_default())
    }

    pub async fn save_calendar_settings(&self, settings: &CalendarSettings) -> DashboardResult<()> {
        self.put_data(CALENDAR_SETTINGS_RECORD, settings).await
    }
}

fn validate_name(name: &str) -> DashboardResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DashboardError::InvalidName);
    }
    Ok(trimmed.to_string())
}

/// Record ids and payload shapes, for hosts that seed the store directly.
pub fn template_record(templates: &[Template]) -> StoreRecord {
    StoreRecord::new(TEMPLATES_RECORD).with("data", json!(templates))
}

pub fn active_template_record(name: &str) -> StoreRecord {
    StoreRecord::new(ACTIVE_TEMPLATE_RECORD).with("data", json!({ "name": name }))
}
