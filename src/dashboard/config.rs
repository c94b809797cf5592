use crate::dashboard::widgets::WidgetId;
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Persisted name of an empty slot.
pub const PLACEHOLDER: &str = "placeholder";

/// Name of the template synthesized on first start.
pub const DEFAULT_TEMPLATE_NAME: &str = "Default";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Metrics,
    Tables,
    Charts,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Metrics, Section::Tables, Section::Charts];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Metrics => "metrics",
            Section::Tables => "tables",
            Section::Charts => "charts",
        }
    }

    pub fn shape(&self) -> SectionShape {
        match self {
            Section::Metrics => SectionShape::Slots(4),
            Section::Tables => SectionShape::Slots(2),
            Section::Charts => SectionShape::Grid { rows: 3, cols: 2 },
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capacity rule of a section.
///
/// A flat section behaves like a grid with a single row whose width is the
/// slot count, which lets every placement operation share one code path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionShape {
    Slots(usize),
    Grid { rows: usize, cols: usize },
}

impl SectionShape {
    pub fn rows(&self) -> usize {
        match self {
            SectionShape::Slots(_) => 1,
            SectionShape::Grid { rows, .. } => *rows,
        }
    }

    pub fn cols(&self) -> usize {
        match self {
            SectionShape::Slots(n) => *n,
            SectionShape::Grid { cols, .. } => *cols,
        }
    }

    pub fn capacity(&self) -> usize {
        self.rows() * self.cols()
    }

    pub fn is_grid(&self) -> bool {
        matches!(self, SectionShape::Grid { .. })
    }
}

/// A single position inside a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Slot {
    Empty,
    Occupied(WidgetId),
}

impl Slot {
    pub fn widget(&self) -> Option<WidgetId> {
        match self {
            Slot::Empty => None,
            Slot::Occupied(id) => Some(*id),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }
}

impl From<WidgetId> for Slot {
    fn from(id: WidgetId) -> Self {
        Slot::Occupied(id)
    }
}

impl From<String> for Slot {
    fn from(raw: String) -> Self {
        if raw == PLACEHOLDER || raw.is_empty() {
            return Slot::Empty;
        }
        match raw.parse::<WidgetId>() {
            Ok(id) => Slot::Occupied(id),
            Err(_) => {
                tracing::warn!(widget = %raw, "unknown dashboard widget dropped");
                Slot::Empty
            }
        }
    }
}

impl From<Slot> for String {
    fn from(slot: Slot) -> Self {
        match slot {
            Slot::Empty => PLACEHOLDER.to_string(),
            Slot::Occupied(id) => id.as_str().to_string(),
        }
    }
}

/// Per-widget settings overrides. A missing entry means "use the defaults".
pub type SettingsOverrides = BTreeMap<WidgetId, Value>;

static DEFAULT_LAYOUT: Lazy<Layout> = Lazy::new(|| {
    use WidgetId::*;
    Layout {
        metrics: slots(&[AccountBalance, TradeWin, DailyWin, CurrentStreak]),
        tables: slots(&[RecentTrades, TradingCalendar]),
        charts: vec![
            slots(&[Drawdown, Balance]),
            slots(&[DailyNetPnl, NetCumulative]),
            slots(&[CumulativeDailyNet, TradeCount]),
        ],
    }
});

fn slots(ids: &[WidgetId]) -> Vec<Slot> {
    ids.iter().copied().map(Slot::from).collect()
}

/// Arrangement of widgets across the three sections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Layout {
    #[serde(default)]
    pub metrics: Vec<Slot>,
    #[serde(default)]
    pub tables: Vec<Slot>,
    #[serde(default)]
    pub charts: Vec<Vec<Slot>>,
}

impl Default for Layout {
    fn default() -> Self {
        DEFAULT_LAYOUT.clone()
    }
}

impl Layout {
    /// Layout with every slot of every section empty.
    pub fn empty() -> Self {
        let grid = |section: Section| {
            let shape = section.shape();
            vec![vec![Slot::Empty; shape.cols()]; shape.rows()]
        };
        let mut layout = Self {
            metrics: Vec::new(),
            tables: Vec::new(),
            charts: Vec::new(),
        };
        for section in Section::ALL {
            layout.set_grid(section, grid(section));
        }
        layout
    }

    /// Copy of a section as rows of slots; flat sections yield one row.
    pub fn grid(&self, section: Section) -> Vec<Vec<Slot>> {
        match section {
            Section::Metrics => vec![self.metrics.clone()],
            Section::Tables => vec![self.tables.clone()],
            Section::Charts => self.charts.clone(),
        }
    }

    pub fn set_grid(&mut self, section: Section, grid: Vec<Vec<Slot>>) {
        match section {
            Section::Metrics => self.metrics = grid.into_iter().flatten().collect(),
            Section::Tables => self.tables = grid.into_iter().flatten().collect(),
            Section::Charts => self.charts = grid,
        }
    }

    pub fn widgets(&self, section: Section) -> Vec<WidgetId> {
        self.grid(section)
            .iter()
            .flatten()
            .filter_map(Slot::widget)
            .collect()
    }

    pub fn contains(&self, id: WidgetId) -> bool {
        Section::ALL
            .iter()
            .any(|section| self.widgets(*section).contains(&id))
    }
}

/// A named, persisted layout plus its settings overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Template {
    pub name: String,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default, deserialize_with = "deserialize_overrides")]
    pub settings: SettingsOverrides,
}

impl Template {
    pub fn new(name: impl Into<String>, layout: Layout, settings: SettingsOverrides) -> Self {
        Self {
            name: name.into(),
            layout,
            settings,
        }
    }
}

/// Payload of the `activeTemplate` record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiveTemplateRef {
    pub name: String,
}

/// Payload of the standalone `config` record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardConfig {
    #[serde(default)]
    pub layout: Layout,
    #[serde(default, deserialize_with = "deserialize_overrides")]
    pub settings: SettingsOverrides,
}

fn default_true() -> bool {
    true
}

/// Display options of the trading calendar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarSettings {
    #[serde(default = "default_true")]
    pub show_weekly_stats: bool,
    #[serde(default = "default_true")]
    pub show_trade_details: bool,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            show_weekly_stats: true,
            show_trade_details: true,
        }
    }
}

/// Reads an overrides map, dropping entries for widgets that no longer exist.
pub fn deserialize_overrides<'de, D>(deserializer: D) -> Result<SettingsOverrides, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Value>> = Option::deserialize(deserializer)?;
    let mut overrides = SettingsOverrides::new();
    for (key, value) in raw.unwrap_or_default() {
        match key.parse::<WidgetId>() {
            Ok(id) => {
                overrides.insert(id, value);
            }
            Err(_) => tracing::warn!(widget = %key, "dropping settings for unknown widget"),
        }
    }
    Ok(overrides)
}
