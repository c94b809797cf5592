use crate::dashboard::config::{CalendarSettings, Section};
use crate::dashboard::data_cache::{Account, Strategy, Trade, TradesByMonth};
use crate::dashboard::view::WidgetCanvas;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

mod schema;

pub use schema::{SettingField, SettingKind};

/// Every widget the dashboard knows how to place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetId {
    AccountBalance,
    TradeWin,
    DailyWin,
    CurrentStreak,
    ProfitFactor,
    AvgWinLoss,
    TotalTrades,
    NetPnl,
    RecentTrades,
    TradingCalendar,
    StrategyPerformance,
    Drawdown,
    Balance,
    DailyNetPnl,
    NetCumulative,
    CumulativeDailyNet,
    TradeCount,
    WinLossDistribution,
    PnlByWeekday,
}

impl WidgetId {
    pub const ALL: [WidgetId; 19] = [
        WidgetId::AccountBalance,
        WidgetId::TradeWin,
        WidgetId::DailyWin,
        WidgetId::CurrentStreak,
        WidgetId::ProfitFactor,
        WidgetId::AvgWinLoss,
        WidgetId::TotalTrades,
        WidgetId::NetPnl,
        WidgetId::RecentTrades,
        WidgetId::TradingCalendar,
        WidgetId::StrategyPerformance,
        WidgetId::Drawdown,
        WidgetId::Balance,
        WidgetId::DailyNetPnl,
        WidgetId::NetCumulative,
        WidgetId::CumulativeDailyNet,
        WidgetId::TradeCount,
        WidgetId::WinLossDistribution,
        WidgetId::PnlByWeekday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetId::AccountBalance => "account-balance",
            WidgetId::TradeWin => "trade-win",
            WidgetId::DailyWin => "daily-win",
            WidgetId::CurrentStreak => "current-streak",
            WidgetId::ProfitFactor => "profit-factor",
            WidgetId::AvgWinLoss => "avg-win-loss",
            WidgetId::TotalTrades => "total-trades",
            WidgetId::NetPnl => "net-pnl",
            WidgetId::RecentTrades => "recent-trades",
            WidgetId::TradingCalendar => "trading-calendar",
            WidgetId::StrategyPerformance => "strategy-performance",
            WidgetId::Drawdown => "drawdown",
            WidgetId::Balance => "balance",
            WidgetId::DailyNetPnl => "daily-net-pnl",
            WidgetId::NetCumulative => "net-cumulative",
            WidgetId::CumulativeDailyNet => "cumulative-daily-net",
            WidgetId::TradeCount => "trade-count",
            WidgetId::WinLossDistribution => "win-loss-distribution",
            WidgetId::PnlByWeekday => "pnl-by-weekday",
        }
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown widget '{0}'")]
pub struct UnknownWidget(pub String);

impl FromStr for WidgetId {
    type Err = UnknownWidget;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WidgetId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownWidget(s.to_string()))
    }
}

/// Data a renderer may read while painting one widget.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    pub trades: &'a [Trade],
    pub strategies: &'a [Strategy],
    pub active_account_id: &'a str,
    pub accounts: &'a [Account],
    pub trades_by_month: &'a TradesByMonth,
    pub calendar: &'a CalendarSettings,
}

impl<'a> RenderContext<'a> {
    /// Trades that belong to the active account.
    pub fn account_trades(&self) -> impl Iterator<Item = &'a Trade> + 'a {
        let account = self.active_account_id;
        self.trades.iter().filter(move |t| t.account_id == account)
    }
}

/// Paints a widget into its canvas. Implementations may fail; the controller
/// isolates failures per widget.
pub trait WidgetRenderer: Send + Sync {
    fn render(
        &self,
        id: WidgetId,
        target: &mut WidgetCanvas,
        ctx: &RenderContext<'_>,
        settings: &Value,
    ) -> anyhow::Result<()>;
}

impl<F> WidgetRenderer for F
where
    F: Fn(WidgetId, &mut WidgetCanvas, &RenderContext<'_>, &Value) -> anyhow::Result<()>
        + Send
        + Sync,
{
    fn render(
        &self,
        id: WidgetId,
        target: &mut WidgetCanvas,
        ctx: &RenderContext<'_>,
        settings: &Value,
    ) -> anyhow::Result<()> {
        self(id, target, ctx, settings)
    }
}

/// Stand-in renderer used until the host registers the real chart transforms.
#[derive(Debug, Default, Clone, Copy)]
pub struct SummaryRenderer;

impl WidgetRenderer for SummaryRenderer {
    fn render(
        &self,
        id: WidgetId,
        target: &mut WidgetCanvas,
        ctx: &RenderContext<'_>,
        _settings: &Value,
    ) -> anyhow::Result<()> {
        let count = ctx.account_trades().count();
        target.line(id.as_str());
        target.line(format!("{count} trades"));
        Ok(())
    }
}

/// Static description of a widget plus its render capability.
#[derive(Clone)]
pub struct WidgetDescriptor {
    pub id: WidgetId,
    pub section: Section,
    pub title: &'static str,
    pub schema: &'static [SettingField],
    renderer: Arc<dyn WidgetRenderer>,
}

impl fmt::Debug for WidgetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetDescriptor")
            .field("id", &self.id)
            .field("section", &self.section)
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

impl WidgetDescriptor {
    pub fn new(
        id: WidgetId,
        section: Section,
        title: &'static str,
        schema: &'static [SettingField],
    ) -> Self {
        Self {
            id,
            section,
            title,
            schema,
            renderer: Arc::new(SummaryRenderer),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn WidgetRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn renderer(&self) -> &dyn WidgetRenderer {
        self.renderer.as_ref()
    }

    pub fn default_settings(&self) -> Value {
        let mut map = Map::new();
        for field in self.schema {
            map.insert(field.key.to_string(), field.kind.default_value());
        }
        Value::Object(map)
    }

    /// Defaults overlaid with the user's override, if any.
    pub fn effective_settings(&self, settings_override: Option<&Value>) -> Value {
        match settings_override {
            Some(updates) => merge_json(&self.default_settings(), updates),
            None => self.default_settings(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WidgetMetadata {
    pub id: WidgetId,
    pub section: Section,
    pub title: &'static str,
    pub has_settings: bool,
}

/// Registry of every widget, keyed by id.
#[derive(Clone, Default, Debug)]
pub struct WidgetCatalog {
    map: HashMap<WidgetId, WidgetDescriptor>,
}

impl WidgetCatalog {
    pub fn with_defaults() -> Self {
        use schema::*;
        use WidgetId::*;

        let mut catalog = Self::default();
        let entries: [(WidgetId, Section, &'static str, &'static [SettingField]); 19] = [
            (AccountBalance, Section::Metrics, "Account Balance", CURRENCY_METRIC),
            (TradeWin, Section::Metrics, "Trade Win %", RATIO_METRIC),
            (DailyWin, Section::Metrics, "Day Win %", RATIO_METRIC),
            (CurrentStreak, Section::Metrics, "Current Streak", STREAK_METRIC),
            (ProfitFactor, Section::Metrics, "Profit Factor", RATIO_METRIC),
            (AvgWinLoss, Section::Metrics, "Avg Win / Loss", CURRENCY_METRIC),
            (TotalTrades, Section::Metrics, "Total Trades", PLAIN_METRIC),
            (NetPnl, Section::Metrics, "Net P&L", CURRENCY_METRIC),
            (RecentTrades, Section::Tables, "Recent Trades", RECENT_TRADES_TABLE),
            (TradingCalendar, Section::Tables, "Trading Calendar", CALENDAR_TABLE),
            (StrategyPerformance, Section::Tables, "Strategy Performance", PLAIN_TABLE),
            (Drawdown, Section::Charts, "Drawdown", AREA_CHART),
            (Balance, Section::Charts, "Balance", AREA_CHART),
            (DailyNetPnl, Section::Charts, "Daily Net P&L", BAR_CHART),
            (NetCumulative, Section::Charts, "Net Cumulative P&L", AREA_CHART),
            (CumulativeDailyNet, Section::Charts, "Cumulative Daily Net", AREA_CHART),
            (TradeCount, Section::Charts, "Trade Count", BAR_CHART),
            (WinLossDistribution, Section::Charts, "Win / Loss Distribution", BAR_CHART),
            (PnlByWeekday, Section::Charts, "P&L by Weekday", BAR_CHART),
        ];
        for (id, section, title, fields) in entries {
            catalog.register(WidgetDescriptor::new(id, section, title, fields));
        }
        catalog
    }

    pub fn register(&mut self, descriptor: WidgetDescriptor) {
        self.map.insert(descriptor.id, descriptor);
    }

    /// Swap the render capability of a registered widget. Returns `false` when
    /// the widget is not registered.
    pub fn set_renderer(&mut self, id: WidgetId, renderer: Arc<dyn WidgetRenderer>) -> bool {
        match self.map.get_mut(&id) {
            Some(descriptor) => {
                descriptor.renderer = renderer;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: WidgetId) -> bool {
        self.map.contains_key(&id)
    }

    pub fn descriptor(&self, id: WidgetId) -> Option<&WidgetDescriptor> {
        self.map.get(&id)
    }

    pub fn section_of(&self, id: WidgetId) -> Option<Section> {
        self.map.get(&id).map(|d| d.section)
    }

    pub fn title_of(&self, id: WidgetId) -> &'static str {
        self.map.get(&id).map(|d| d.title).unwrap_or("Unknown widget")
    }

    /// Widgets that may be placed in `section`, in id order.
    pub fn ids_for(&self, section: Section) -> Vec<WidgetId> {
        let mut ids: Vec<WidgetId> = self
            .map
            .values()
            .filter(|d| d.section == section)
            .map(|d| d.id)
            .collect();
        ids.sort();
        ids
    }

    pub fn metadata(&self) -> Vec<WidgetMetadata> {
        let mut meta: Vec<WidgetMetadata> = self
            .map
            .values()
            .map(|d| WidgetMetadata {
                id: d.id,
                section: d.section,
                title: d.title,
                has_settings: !d.schema.is_empty(),
            })
            .collect();
        meta.sort_by_key(|m| m.id);
        meta
    }
}

pub(crate) fn merge_json(base: &Value, updates: &Value) -> Value {
    match (base, updates) {
        (Value::Object(a), Value::Object(b)) => {
            let mut merged = a.clone();
            for (k, v) in b {
                merged.insert(k.clone(), v.clone());
            }
            Value::Object(merged)
        }
        _ => updates.clone(),
    }
}
