use serde_json::{json, Value};

/// Kind of value a widget setting holds, with its default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Choice {
        options: &'static [&'static str],
        default: &'static str,
    },
    Toggle {
        default: bool,
    },
    Color {
        default: &'static str,
    },
}

impl SettingKind {
    pub fn default_value(&self) -> Value {
        match self {
            SettingKind::Choice { default, .. } => json!(default),
            SettingKind::Toggle { default } => json!(default),
            SettingKind::Color { default } => json!(default),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingField {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: SettingKind,
}

const CURRENCY_FORMATS: &[&str] = &["currency", "currency-short", "plain"];
const PERCENT_FORMATS: &[&str] = &["percent", "ratio"];
const LINE_STYLES: &[&str] = &["area", "line"];

const fn choice(
    key: &'static str,
    label: &'static str,
    options: &'static [&'static str],
    default: &'static str,
) -> SettingField {
    SettingField {
        key,
        label,
        kind: SettingKind::Choice { options, default },
    }
}

const fn toggle(key: &'static str, label: &'static str, default: bool) -> SettingField {
    SettingField {
        key,
        label,
        kind: SettingKind::Toggle { default },
    }
}

const fn color(key: &'static str, label: &'static str, default: &'static str) -> SettingField {
    SettingField {
        key,
        label,
        kind: SettingKind::Color { default },
    }
}

pub(super) const CURRENCY_METRIC: &[SettingField] = &[
    choice("format", "Format", CURRENCY_FORMATS, "currency"),
    color("positiveColor", "Positive color", "#22c55e"),
    color("negativeColor", "Negative color", "#ef4444"),
];

pub(super) const RATIO_METRIC: &[SettingField] = &[
    choice("format", "Format", PERCENT_FORMATS, "percent"),
    toggle("showGauge", "Show gauge", true),
];

pub(super) const STREAK_METRIC: &[SettingField] = &[
    color("winColor", "Win color", "#22c55e"),
    color("lossColor", "Loss color", "#ef4444"),
];

pub(super) const PLAIN_METRIC: &[SettingField] = &[];

pub(super) const RECENT_TRADES_TABLE: &[SettingField] = &[
    choice("format", "P&L format", CURRENCY_FORMATS, "currency"),
    choice("rows", "Rows", &["5", "10", "20"], "10"),
];

pub(super) const CALENDAR_TABLE: &[SettingField] = &[
    choice("format", "P&L format", CURRENCY_FORMATS, "currency-short"),
    color("positiveColor", "Positive color", "#22c55e"),
    color("negativeColor", "Negative color", "#ef4444"),
];

pub(super) const PLAIN_TABLE: &[SettingField] = &[];

pub(super) const AREA_CHART: &[SettingField] = &[
    choice("style", "Style", LINE_STYLES, "area"),
    color("lineColor", "Line color", "#3b82f6"),
    toggle("showGrid", "Show grid", true),
    choice("format", "Axis format", CURRENCY_FORMATS, "currency-short"),
];

pub(super) const BAR_CHART: &[SettingField] = &[
    color("positiveColor", "Positive color", "#22c55e"),
    color("negativeColor", "Negative color", "#ef4444"),
    toggle("showGrid", "Show grid", true),
];
