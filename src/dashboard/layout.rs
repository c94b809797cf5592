use crate::dashboard::config::{Layout, Section, SettingsOverrides, Slot};
use crate::dashboard::error::LayoutError;
use crate::dashboard::widgets::WidgetId;
use serde_json::Value;
use std::collections::HashSet;

/// Whether the dashboard is being looked at or rearranged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Viewing,
    Editing,
}

/// Where a widget sits. `index` is the row-major position inside the
/// section; `row` is only set for chart slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub section: Section,
    pub row: Option<usize>,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub from: Location,
    pub to: Location,
}

/// Bring a layout into the shape required by `mode`.
///
/// Returns the normalized layout and a warning for every widget that had to
/// be dropped.
pub fn normalize_layout(layout: &Layout, mode: Mode) -> (Layout, Vec<String>) {
    let mut normalized = layout.clone();
    let mut warnings = Vec::new();
    for section in Section::ALL {
        let grid = normalize_grid(section, layout.grid(section), mode, &mut warnings);
        normalized.set_grid(section, grid);
    }
    (normalized, warnings)
}

fn normalize_grid(
    section: Section,
    grid: Vec<Vec<Slot>>,
    mode: Mode,
    warnings: &mut Vec<String>,
) -> Vec<Vec<Slot>> {
    let shape = section.shape();
    let mut seen = HashSet::new();
    let mut rows: Vec<Vec<Slot>> = grid
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|slot| match slot {
                    Slot::Occupied(id) if !seen.insert(id) => {
                        warnings.push(format!("duplicate widget '{id}' removed from {section}"));
                        Slot::Empty
                    }
                    other => other,
                })
                .collect()
        })
        .collect();

    if !shape.is_grid() {
        let mut row: Vec<Slot> = rows.into_iter().flatten().collect();
        fit_row(section, &mut row, shape.cols(), mode == Mode::Editing, warnings);
        return vec![row];
    }

    if rows.len() > shape.rows() {
        for extra in rows.drain(shape.rows()..) {
            for id in extra.iter().filter_map(Slot::widget) {
                warnings.push(format!("widget '{id}' evicted from {section}: row limit reached"));
            }
        }
    }
    rows.resize_with(shape.rows(), Vec::new);
    for row in &mut rows {
        fit_row(section, row, shape.cols(), true, warnings);
    }
    rows
}

/// Truncate a row to `width`, dropping the last placeholder before any real
/// widget, and optionally pad it with placeholders.
fn fit_row(
    section: Section,
    row: &mut Vec<Slot>,
    width: usize,
    pad: bool,
    warnings: &mut Vec<String>,
) {
    while row.len() > width {
        match row.iter().rposition(Slot::is_empty) {
            Some(pos) => {
                row.remove(pos);
            }
            None => {
                if let Some(Slot::Occupied(id)) = row.pop() {
                    warnings.push(format!("widget '{id}' evicted from {section}: no free slot"));
                }
            }
        }
    }
    if pad {
        row.resize(width, Slot::Empty);
    }
}

/// The live arrangement plus settings overrides.
///
/// Every mutation leaves the layout normalized for the current mode and
/// every failed mutation leaves it untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutModel {
    layout: Layout,
    overrides: SettingsOverrides,
    mode: Mode,
}

impl Default for LayoutModel {
    fn default() -> Self {
        Self::new(Layout::default(), SettingsOverrides::new(), Mode::Viewing)
    }
}

impl LayoutModel {
    pub fn new(layout: Layout, overrides: SettingsOverrides, mode: Mode) -> Self {
        let mut model = Self {
            layout,
            overrides,
            mode,
        };
        model.normalize();
        model
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn overrides(&self) -> &SettingsOverrides {
        &self.overrides
    }

    pub fn override_for(&self, id: WidgetId) -> Option<&Value> {
        self.overrides.get(&id)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.normalize();
    }

    /// Load a new arrangement, e.g. from a template.
    pub fn replace(&mut self, layout: Layout, overrides: SettingsOverrides) {
        self.layout = layout;
        self.overrides = overrides;
        self.normalize();
    }

    pub fn replace_layout(&mut self, layout: Layout) {
        self.layout = layout;
        self.normalize();
    }

    pub fn normalize(&mut self) {
        let (layout, warnings) = normalize_layout(&self.layout, self.mode);
        for warning in warnings {
            tracing::warn!("{warning}");
        }
        self.layout = layout;
    }

    pub fn locate(&self, id: WidgetId) -> Option<Location> {
        for section in Section::ALL {
            let shape = section.shape();
            for (r, row) in self.layout.grid(section).iter().enumerate() {
                if let Some(c) = row.iter().position(|s| s.widget() == Some(id)) {
                    return Some(Location {
                        section,
                        row: shape.is_grid().then_some(r),
                        index: r * shape.cols() + c,
                    });
                }
            }
        }
        None
    }

    /// Put `id` at `index` of `section`.
    ///
    /// Flat sections overwrite a placeholder at `index` or append. Chart
    /// indices are row-major over two columns; an occupied cell shifts the row
    /// right and evicts its last slot.
    pub fn place_widget(
        &mut self,
        section: Section,
        id: WidgetId,
        index: usize,
    ) -> Result<Location, LayoutError> {
        let shape = section.shape();
        if shape.is_grid() && index >= shape.capacity() {
            return Err(LayoutError::OutOfBounds { section, index });
        }
        let (row, col) = if shape.is_grid() {
            (index / shape.cols(), index % shape.cols())
        } else {
            (0, index)
        };

        let mut grid = self.layout.grid(section);
        let already_placed = grid.iter().flatten().any(|s| s.widget() == Some(id));
        if grid.len() <= row {
            grid.resize_with(row + 1, Vec::new);
        }
        let cells = &mut grid[row];

        if cells.get(col).is_some_and(Slot::is_empty) {
            if already_placed {
                return Err(LayoutError::AlreadyPlaced { section, widget: id });
            }
            cells[col] = Slot::Occupied(id);
        } else {
            let occupied = cells.iter().filter(|s| !s.is_empty()).count();
            if occupied >= shape.cols() {
                return Err(if shape.is_grid() {
                    LayoutError::RowFull { row }
                } else {
                    LayoutError::CapacityExceeded {
                        section,
                        capacity: shape.capacity(),
                    }
                });
            }
            if already_placed {
                return Err(LayoutError::AlreadyPlaced { section, widget: id });
            }
            if shape.is_grid() {
                let at = col.min(cells.len());
                cells.insert(at, Slot::Occupied(id));
            } else {
                cells.push(Slot::Occupied(id));
            }
        }

        self.layout.set_grid(section, grid);
        self.normalize();
        self.locate(id).ok_or(LayoutError::NotFound(id))
    }

    /// Replace the widget's slot with a placeholder.
    pub fn remove_widget(&mut self, id: WidgetId) -> Result<Location, LayoutError> {
        let location = self.locate(id).ok_or(LayoutError::NotFound(id))?;
        let mut grid = self.layout.grid(location.section);
        for slot in grid.iter_mut().flatten() {
            if slot.widget() == Some(id) {
                *slot = Slot::Empty;
            }
        }
        self.layout.set_grid(location.section, grid);
        Ok(location)
    }

    /// Remove and re-place as a single step: if placement fails the layout is
    /// restored exactly.
    pub fn move_widget(
        &mut self,
        id: WidgetId,
        section: Section,
        index: usize,
    ) -> Result<MoveOutcome, LayoutError> {
        let snapshot = self.layout.clone();
        let from = self.remove_widget(id)?;
        match self.place_widget(section, id, index) {
            Ok(to) => Ok(MoveOutcome { from, to }),
            Err(err) => {
                self.layout = snapshot;
                Err(err)
            }
        }
    }

    pub fn set_override(&mut self, id: WidgetId, settings: Value) {
        self.overrides.insert(id, settings);
    }

    pub fn clear_override(&mut self, id: WidgetId) -> Option<Value> {
        self.overrides.remove(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use WidgetId::*;

    fn editing_default() -> LayoutModel {
        LayoutModel::new(Layout::default(), SettingsOverrides::new(), Mode::Editing)
    }

    fn assert_edit_shape(layout: &Layout) {
        assert_eq!(layout.metrics.len(), 4);
        assert_eq!(layout.tables.len(), 2);
        assert_eq!(layout.charts.len(), 3);
        assert!(layout.charts.iter().all(|row| row.len() == 2));
    }

    #[test]
    fn normalize_pads_in_edit_mode_only() {
        let layout = Layout {
            metrics: vec![AccountBalance.into()],
            tables: Vec::new(),
            charts: vec![vec![Drawdown.into()]],
        };
        let (editing, warnings) = normalize_layout(&layout, Mode::Editing);
        assert!(warnings.is_empty());
        assert_edit_shape(&editing);
        assert_eq!(editing.charts[0], vec![Drawdown.into(), Slot::Empty]);

        let (viewing, _) = normalize_layout(&layout, Mode::Viewing);
        assert_eq!(viewing.metrics.len(), 1);
        assert!(viewing.tables.is_empty());
        assert_eq!(viewing.charts.len(), 3);
    }

    #[test]
    fn normalize_is_idempotent() {
        let layout = Layout {
            metrics: vec![
                TradeWin.into(),
                Slot::Empty,
                TradeWin.into(),
                DailyWin.into(),
                Slot::Empty,
                NetPnl.into(),
            ],
            tables: vec![RecentTrades.into(); 3],
            charts: vec![
                vec![Balance.into(), Slot::Empty, Drawdown.into()],
                vec![],
                vec![TradeCount.into()],
                vec![PnlByWeekday.into()],
            ],
        };
        for mode in [Mode::Viewing, Mode::Editing] {
            let (once, _) = normalize_layout(&layout, mode);
            let (twice, again) = normalize_layout(&once, mode);
            assert_eq!(once, twice);
            assert!(again.is_empty());
        }
    }

    #[test]
    fn truncation_drops_placeholders_before_widgets() {
        let layout = Layout {
            metrics: Vec::new(),
            tables: Vec::new(),
            charts: vec![vec![Slot::Empty, Balance.into(), Drawdown.into()]],
        };
        let (normalized, warnings) = normalize_layout(&layout, Mode::Editing);
        assert_eq!(normalized.charts[0], vec![Balance.into(), Drawdown.into()]);
        assert!(warnings.is_empty());

        let crowded = Layout {
            charts: vec![vec![Balance.into(), Drawdown.into(), TradeCount.into()]],
            ..layout
        };
        let (normalized, warnings) = normalize_layout(&crowded, Mode::Editing);
        assert_eq!(normalized.charts[0], vec![Balance.into(), Drawdown.into()]);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("trade-count"));
    }

    #[test]
    fn duplicate_widgets_collapse_to_placeholders() {
        let layout = Layout {
            metrics: vec![TradeWin.into(), TradeWin.into()],
            tables: Vec::new(),
            charts: Vec::new(),
        };
        let model = LayoutModel::new(layout, SettingsOverrides::new(), Mode::Editing);
        assert_eq!(
            model.layout().metrics,
            vec![TradeWin.into(), Slot::Empty, Slot::Empty, Slot::Empty]
        );
    }

    #[test]
    fn metrics_overwrite_placeholder_then_reject_when_full() {
        let mut model = editing_default();
        model.remove_widget(DailyWin).unwrap();
        let placed = model.place_widget(Section::Metrics, NetPnl, 2).unwrap();
        assert_eq!(placed.index, 2);
        assert_eq!(model.layout().metrics[2], NetPnl.into());

        let before = model.layout().clone();
        let err = model.place_widget(Section::Metrics, ProfitFactor, 0).unwrap_err();
        assert_eq!(
            err,
            LayoutError::CapacityExceeded {
                section: Section::Metrics,
                capacity: 4
            }
        );
        assert_eq!(model.layout(), &before);
    }

    #[test]
    fn metrics_append_when_target_is_occupied() {
        let mut model = editing_default();
        model.remove_widget(CurrentStreak).unwrap();
        let placed = model.place_widget(Section::Metrics, NetPnl, 0).unwrap();
        assert_eq!(placed.index, 3);
        assert_edit_shape(model.layout());
    }

    #[test]
    fn chart_index_maps_to_row_and_column() {
        let mut model = editing_default();
        model.remove_widget(TradeCount).unwrap();
        let placed = model.place_widget(Section::Charts, PnlByWeekday, 5).unwrap();
        assert_eq!(
            placed,
            Location {
                section: Section::Charts,
                row: Some(2),
                index: 5
            }
        );
        assert_eq!(model.layout().charts[2][1], PnlByWeekday.into());
    }

    #[test]
    fn chart_row_full_leaves_grid_unchanged() {
        let mut model = editing_default();
        let before = model.layout().clone();
        let err = model.place_widget(Section::Charts, Balance, 5).unwrap_err();
        assert_eq!(err, LayoutError::RowFull { row: 2 });
        assert_eq!(model.layout(), &before);
    }

    #[test]
    fn chart_insert_shifts_row_and_evicts_placeholder() {
        let mut model = editing_default();
        model.remove_widget(NetCumulative).unwrap();
        model.place_widget(Section::Charts, PnlByWeekday, 2).unwrap();
        assert_eq!(
            model.layout().charts[1],
            vec![PnlByWeekday.into(), DailyNetPnl.into()]
        );
    }

    #[test]
    fn chart_rows_are_created_on_demand() {
        let layout = Layout {
            metrics: Vec::new(),
            tables: Vec::new(),
            charts: vec![vec![Balance.into()]],
        };
        let mut model = LayoutModel::new(layout, SettingsOverrides::new(), Mode::Viewing);
        let placed = model.place_widget(Section::Charts, Drawdown, 4).unwrap();
        assert_eq!(placed.row, Some(2));
        assert_eq!(model.layout().charts[2], vec![Drawdown.into(), Slot::Empty]);
        assert_eq!(
            model.place_widget(Section::Charts, TradeCount, 6),
            Err(LayoutError::OutOfBounds {
                section: Section::Charts,
                index: 6
            })
        );
    }

    #[test]
    fn placing_twice_in_a_section_is_rejected() {
        let mut model = editing_default();
        model.remove_widget(Drawdown).unwrap();
        assert_eq!(
            model.place_widget(Section::Charts, Balance, 0),
            Err(LayoutError::AlreadyPlaced {
                section: Section::Charts,
                widget: Balance
            })
        );
    }

    #[test]
    fn remove_reports_section_without_row_for_tables() {
        let mut model = LayoutModel::default();
        let location = model.remove_widget(RecentTrades).unwrap();
        assert_eq!(location.section, Section::Tables);
        assert_eq!(location.row, None);
        assert_eq!(
            model.layout().tables,
            vec![Slot::Empty, TradingCalendar.into()]
        );
        assert_eq!(
            model.remove_widget(RecentTrades),
            Err(LayoutError::NotFound(RecentTrades))
        );
    }

    #[test]
    fn remove_reports_chart_row() {
        let mut model = LayoutModel::default();
        let location = model.remove_widget(NetCumulative).unwrap();
        assert_eq!(location.row, Some(1));
        assert_eq!(location.index, 3);
    }

    #[test]
    fn move_between_chart_rows() {
        let mut model = editing_default();
        model.remove_widget(TradeCount).unwrap();
        let outcome = model.move_widget(Drawdown, Section::Charts, 5).unwrap();
        assert_eq!(outcome.from.row, Some(0));
        assert_eq!(outcome.to.row, Some(2));
        assert_eq!(model.layout().charts[0], vec![Slot::Empty, Balance.into()]);
        assert_eq!(
            model.layout().charts[2],
            vec![CumulativeDailyNet.into(), Drawdown.into()]
        );
    }

    #[test]
    fn failed_move_restores_original_position() {
        let mut model = editing_default();
        let before = model.clone();
        let err = model.move_widget(Drawdown, Section::Charts, 3).unwrap_err();
        assert_eq!(err, LayoutError::RowFull { row: 1 });
        assert_eq!(model, before);

        let err = model.move_widget(NetPnl, Section::Charts, 0).unwrap_err();
        assert_eq!(err, LayoutError::NotFound(NetPnl));
        assert_eq!(model, before);
    }

    #[test]
    fn widget_ids_stay_unique_after_mixed_operations() {
        let mut model = editing_default();
        let _ = model.move_widget(Balance, Section::Charts, 4);
        let _ = model.place_widget(Section::Charts, Balance, 1);
        let _ = model.remove_widget(Drawdown);
        let _ = model.move_widget(Balance, Section::Charts, 0);
        let _ = model.place_widget(Section::Charts, Drawdown, 1);
        let _ = model.move_widget(TradeWin, Section::Metrics, 9);
        for section in Section::ALL {
            let widgets = model.layout().widgets(section);
            let unique: HashSet<_> = widgets.iter().collect();
            assert_eq!(unique.len(), widgets.len(), "duplicates in {section}");
        }
        assert_edit_shape(model.layout());
    }

    #[test]
    fn overrides_replace_and_clear() {
        let mut model = LayoutModel::default();
        model.set_override(Balance, json!({ "lineColor": "#000" }));
        model.set_override(Balance, json!({ "showGrid": false }));
        assert_eq!(model.override_for(Balance), Some(&json!({ "showGrid": false })));
        assert!(model.clear_override(Balance).is_some());
        assert!(model.override_for(Balance).is_none());
    }
}
