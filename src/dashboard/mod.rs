pub mod config;
pub mod dashboard;
pub mod data_cache;
pub mod error;
pub mod layout;
pub mod session;
pub mod templates;
pub mod view;
pub mod widgets;

pub use config::{CalendarSettings, Layout, Section, Slot, Template};
pub use dashboard::{DashboardContext, DashboardController, DashboardInputs};
pub use data_cache::{trade_channel, Account, DashboardData, Strategy, Trade, TradeFeed};
pub use error::{DashboardError, DashboardResult, LayoutError};
pub use layout::{LayoutModel, Mode};
pub use session::{EditSession, RenderScope, UserPrompt};
pub use templates::TemplateStore;
pub use view::{ViewNode, ViewSurface, ViewTree};
pub use widgets::{WidgetCatalog, WidgetId, WidgetRenderer};
