use crate::dashboard::config::Section;
use crate::dashboard::layout::Mode;
use crate::dashboard::widgets::WidgetId;
use std::collections::BTreeMap;

/// Paint target handed to a widget renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WidgetCanvas {
    lines: Vec<String>,
}

impl WidgetCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewNode {
    Widget {
        id: WidgetId,
        title: String,
        canvas: WidgetCanvas,
        /// Drag handle, settings and delete controls are shown.
        editable: bool,
    },
    /// Empty slot shown as a drop target while editing.
    Placeholder { index: usize },
    /// Inline message shown instead of a widget whose renderer failed.
    Error { id: WidgetId, message: String },
}

impl ViewNode {
    pub fn widget_id(&self) -> Option<WidgetId> {
        match self {
            ViewNode::Widget { id, .. } | ViewNode::Error { id, .. } => Some(*id),
            ViewNode::Placeholder { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowView {
    pub index: usize,
    pub cells: Vec<ViewNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionBody {
    Slots(Vec<ViewNode>),
    Rows(Vec<RowView>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionView {
    pub section: Section,
    pub mode: Mode,
    pub body: SectionBody,
}

impl SectionView {
    pub fn nodes(&self) -> Vec<&ViewNode> {
        match &self.body {
            SectionBody::Slots(nodes) => nodes.iter().collect(),
            SectionBody::Rows(rows) => rows.iter().flat_map(|r| r.cells.iter()).collect(),
        }
    }
}

/// Host view tree the controller mounts rendered sections into.
pub trait ViewSurface {
    /// Whether the anchor element for `section` exists.
    fn has_anchor(&self, section: Section) -> bool;

    /// Replace the whole subtree of a section.
    fn mount_section(&mut self, view: SectionView);

    /// Replace a single chart row in place.
    fn mount_chart_row(&mut self, mode: Mode, row: RowView);
}

/// In-memory view tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewTree {
    anchors: Vec<Section>,
    sections: BTreeMap<Section, SectionView>,
    mounts: usize,
}

impl Default for ViewTree {
    fn default() -> Self {
        Self::with_anchors(&Section::ALL)
    }
}

impl ViewTree {
    pub fn with_anchors(anchors: &[Section]) -> Self {
        Self {
            anchors: anchors.to_vec(),
            sections: BTreeMap::new(),
            mounts: 0,
        }
    }

    pub fn section(&self, section: Section) -> Option<&SectionView> {
        self.sections.get(&section)
    }

    pub fn chart_row(&self, index: usize) -> Option<&RowView> {
        match &self.sections.get(&Section::Charts)?.body {
            SectionBody::Rows(rows) => rows.iter().find(|r| r.index == index),
            SectionBody::Slots(_) => None,
        }
    }

    /// Number of subtree replacements performed so far.
    pub fn mount_count(&self) -> usize {
        self.mounts
    }

    /// Structural comparison of mounted sections, ignoring bookkeeping.
    pub fn same_content(&self, other: &ViewTree) -> bool {
        self.sections == other.sections
    }
}

impl ViewSurface for ViewTree {
    fn has_anchor(&self, section: Section) -> bool {
        self.anchors.contains(&section)
    }

    fn mount_section(&mut self, view: SectionView) {
        self.mounts += 1;
        self.sections.insert(view.section, view);
    }

    fn mount_chart_row(&mut self, mode: Mode, row: RowView) {
        self.mounts += 1;
        let charts = self
            .sections
            .entry(Section::Charts)
            .or_insert_with(|| SectionView {
                section: Section::Charts,
                mode,
                body: SectionBody::Rows(Vec::new()),
            });
        charts.mode = mode;
        if let SectionBody::Slots(_) = charts.body {
            charts.body = SectionBody::Rows(Vec::new());
        }
        if let SectionBody::Rows(rows) = &mut charts.body {
            match rows.iter_mut().find(|r| r.index == row.index) {
                Some(existing) => *existing = row,
                None => {
                    rows.push(row);
                    rows.sort_by_key(|r| r.index);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(index: usize) -> RowView {
        RowView {
            index,
            cells: vec![ViewNode::Placeholder { index: index * 2 }],
        }
    }

    #[test]
    fn chart_rows_are_replaced_in_place() {
        let mut tree = ViewTree::default();
        tree.mount_chart_row(Mode::Editing, row(2));
        tree.mount_chart_row(Mode::Editing, row(0));
        let replacement = RowView {
            index: 2,
            cells: Vec::new(),
        };
        tree.mount_chart_row(Mode::Editing, replacement.clone());
        assert_eq!(tree.chart_row(2), Some(&replacement));
        assert_eq!(tree.chart_row(0), Some(&row(0)));
        assert_eq!(tree.mount_count(), 3);
    }

    #[test]
    fn missing_anchor_is_reported() {
        let tree = ViewTree::with_anchors(&[Section::Metrics]);
        assert!(tree.has_anchor(Section::Metrics));
        assert!(!tree.has_anchor(Section::Charts));
    }
}
