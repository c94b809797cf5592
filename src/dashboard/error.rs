use crate::dashboard::config::Section;
use crate::dashboard::widgets::WidgetId;
use thiserror::Error;

/// Structural failures raised by [`crate::dashboard::layout::LayoutModel`].
///
/// Every variant leaves the model exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("the {section} section already holds {capacity} widgets")]
    CapacityExceeded { section: Section, capacity: usize },
    #[error("chart row {row} already holds two widgets")]
    RowFull { row: usize },
    #[error("slot {index} is outside the {section} section")]
    OutOfBounds { section: Section, index: usize },
    #[error("widget '{widget}' is already placed in the {section} section")]
    AlreadyPlaced { section: Section, widget: WidgetId },
    #[error("widget '{widget}' cannot be placed in the {section} section")]
    WrongSection { section: Section, widget: WidgetId },
    #[error("widget '{0}' is not on the dashboard")]
    NotFound(WidgetId),
}

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("dashboard configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("a template named '{0}' already exists")]
    DuplicateName(String),
    #[error("template names must not be empty")]
    InvalidName,
    #[error("template '{0}' does not exist")]
    NotFound(String),
    #[error("template '{0}' is active and cannot be deleted")]
    ActiveTemplateProtected(String),
    #[error("the dashboard is not in edit mode")]
    NotEditing,
    #[error("the dashboard is already in edit mode")]
    AlreadyEditing,
    #[error("dashboard storage failed: {0:#}")]
    Persistence(#[source] anyhow::Error),
}

impl DashboardError {
    /// Local validation failures are expected user-facing outcomes; everything
    /// else is reported as an error.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Configuration(_) | Self::Persistence(_))
    }
}

pub type DashboardResult<T> = Result<T, DashboardError>;
