//! Pixel-rectangle assignment.
//!
//! Arrangement is a pure function of pending state: given a root, recompute the rectangles of
//! every output, workspace, column and window below it. It writes pending state only and marks
//! the touched nodes dirty; promoting the new rectangles to the screen is the transaction
//! engine's job.

use std::rc::Rc;

use hayward_config::HideEdgeBorders;

use crate::tree::column::{Column, ColumnLayout};
use crate::tree::root::Root;
use crate::tree::window::Window;
use crate::tree::workspace::{Gaps, Workspace};
use crate::utils::Rect;

/// Decides which borders of edge-adjacent tiles are dropped.
#[derive(Clone, Copy, Debug)]
struct EdgePolicy {
    policy: HideEdgeBorders,
    /// The area tiles are laid out in; tiles touching its edges are "edge-adjacent".
    area: Rect,
    single_container: bool,
    gapless: bool,
}

impl EdgePolicy {
    fn hide_all(&self) -> bool {
        match self.policy {
            HideEdgeBorders::Smart => self.single_container,
            HideEdgeBorders::SmartNoGaps => self.single_container && self.gapless,
            _ => false,
        }
    }
}

pub fn arrange_root(root: &Rc<Root>) {
    for workspace in root.workspaces() {
        arrange_workspace(&workspace);
    }
    root.node.set_dirty();
}

pub fn arrange_workspace(workspace: &Rc<Workspace>) {
    let root = workspace.root();
    let Some(primary) = workspace
        .get_active_output()
        .or_else(|| root.active_output())
    else {
        return;
    };

    // The workspace rectangle tracks the output it is principally shown on; gap subtraction
    // happens in workspace coordinates and is clamped there.
    workspace.pending.borrow_mut().rect = primary.rect();
    workspace.add_gaps();
    let gaps = workspace.current_gaps.get();

    let edge_policy = {
        let config = root.config();
        let config = config.borrow();
        EdgePolicy {
            policy: config.decorations.hide_edge_borders,
            area: Rect::default(),
            single_container: workspace.has_single_visible_container(),
            gapless: config.gaps.inner == 0 && config.gaps.outer == 0,
        }
    };

    // Columns are grouped per output; each group shares its output's gapped area.
    let mut outputs = Vec::new();
    for column in workspace.pending.borrow().tiling.iter() {
        if let Some(output) = column.output() {
            if !outputs
                .iter()
                .any(|other: &Rc<crate::tree::Output>| *other == output)
            {
                outputs.push(output);
            }
        }
    }

    for output in outputs {
        let area = if output == primary {
            workspace.pending.borrow().rect
        } else {
            shrink_by_gaps(output.rect(), gaps)
        };
        let columns: Vec<Rc<Column>> = workspace
            .pending
            .borrow()
            .tiling
            .iter()
            .filter(|column| {
                column
                    .output()
                    .is_some_and(|column_output| column_output == output)
            })
            .cloned()
            .collect();
        arrange_tiling(&columns, area, EdgePolicy { area, ..edge_policy });
    }

    // Floating windows keep their position; only the content rectangle is refreshed.
    let floating = workspace.pending.borrow().floating.clone();
    for window in &floating {
        arrange_floating(window);
    }

    // The fullscreen window covers its whole output, borders dropped.
    let fullscreen = workspace.pending.borrow().fullscreen.clone();
    if let Some(fullscreen) = fullscreen {
        let rect = fullscreen
            .output()
            .map_or_else(|| primary.rect(), |output| output.rect());
        {
            let mut pending = fullscreen.pending.borrow_mut();
            pending.rect = rect;
            pending.content = rect;
        }
        fullscreen.node.set_dirty();
    }

    workspace.node.set_dirty();
}

/// Distribute `area` horizontally over `columns` proportionally to their width fractions.
fn arrange_tiling(columns: &[Rc<Column>], area: Rect, edge_policy: EdgePolicy) {
    if columns.is_empty() {
        return;
    }

    normalize_fractions(columns.len(), |index| columns[index].width_fraction.get(), |index, fraction| {
        columns[index].width_fraction.set(fraction);
    });

    let mut x = area.x;
    for (index, column) in columns.iter().enumerate() {
        let width = if index == columns.len() - 1 {
            // The last column absorbs rounding drift.
            area.x + area.width - x
        } else {
            column.width_fraction.get() * area.width
        };
        arrange_column_with_policy(
            column,
            Rect::new(x, area.y, width, area.height),
            Some(edge_policy),
        );
        x += width;
    }
}

pub fn arrange_column(column: &Rc<Column>, area: Rect) {
    arrange_column_with_policy(column, area, None);
}

fn arrange_column_with_policy(column: &Rc<Column>, area: Rect, edge_policy: Option<EdgePolicy>) {
    column.pending.borrow_mut().rect = area;
    column.node.set_dirty();

    let (layout, children) = {
        let pending = column.pending.borrow();
        (pending.layout, pending.children.clone())
    };
    if children.is_empty() {
        return;
    }

    match layout {
        ColumnLayout::Split => {
            normalize_fractions(
                children.len(),
                |index| children[index].height_fraction.get(),
                |index, fraction| children[index].height_fraction.set(fraction),
            );

            let mut y = area.y;
            for (index, child) in children.iter().enumerate() {
                let height = if index == children.len() - 1 {
                    area.y + area.height - y
                } else {
                    child.height_fraction.get() * area.height
                };
                arrange_window_tiled(
                    child,
                    Rect::new(area.x, y, area.width, height),
                    None,
                    edge_policy,
                );
                y += height;
            }
        }
        ColumnLayout::Stacked => {
            // Every child owns the full column rectangle; the top is reserved for one titlebar
            // per child.
            let titlebar_height = column.root().titlebar_height();
            let reserved = titlebar_height * children.len() as f64;
            for child in &children {
                arrange_window_tiled(child, area, Some(reserved), edge_policy);
            }
        }
    }
}

fn arrange_window_tiled(
    window: &Rc<Window>,
    rect: Rect,
    top_inset_override: Option<f64>,
    edge_policy: Option<EdgePolicy>,
) {
    window.pending.borrow_mut().rect = rect;

    if let Some(policy) = edge_policy {
        let hide_all = policy.hide_all();
        let (hide_vertical, hide_horizontal) = match policy.policy {
            HideEdgeBorders::Vertical => (true, false),
            HideEdgeBorders::Horizontal => (false, true),
            HideEdgeBorders::Both => (true, true),
            _ => (false, false),
        };
        let area = policy.area;
        let at_left = rect.x <= area.x;
        let at_right = rect.x + rect.width >= area.x + area.width;
        let at_top = rect.y <= area.y;
        let at_bottom = rect.y + rect.height >= area.y + area.height;

        let mut pending = window.pending.borrow_mut();
        pending.border_left = !(hide_all || (hide_vertical && at_left));
        pending.border_right = !(hide_all || (hide_vertical && at_right));
        pending.border_top = !(hide_all || (hide_horizontal && at_top));
        pending.border_bottom = !(hide_all || (hide_horizontal && at_bottom));
    }

    let (top, right, bottom, left) = window.content_insets();
    let top = top_inset_override.unwrap_or(top);
    {
        let mut pending = window.pending.borrow_mut();
        pending.content = Rect::new(
            rect.x + left,
            rect.y + top,
            (rect.width - left - right).max(0.0),
            (rect.height - top - bottom).max(0.0),
        );
    }
    window.node.set_dirty();
}

pub fn arrange_floating(window: &Rc<Window>) {
    window.set_content_from_geometry();
    window.node.set_dirty();
}

/// Give fractionless entries an equal slice, then renormalize so everything sums to one.
fn normalize_fractions(
    len: usize,
    get: impl Fn(usize) -> f64,
    set: impl Fn(usize, f64),
) {
    let mut total = 0.0;
    let mut assigned = 0usize;
    for index in 0..len {
        let fraction = get(index);
        if fraction > 0.0 {
            total += fraction;
            assigned += 1;
        }
    }

    let fill = if assigned == 0 {
        1.0 / len as f64
    } else {
        total / assigned as f64
    };
    for index in 0..len {
        if get(index) <= 0.0 {
            set(index, fill);
            total += fill;
        }
    }
    if assigned == 0 {
        total = 1.0;
    }

    for index in 0..len {
        set(index, get(index) / total);
    }
}

fn shrink_by_gaps(rect: Rect, gaps: Gaps) -> Rect {
    Rect::new(
        rect.x + gaps.left,
        rect.y + gaps.top,
        (rect.width - gaps.left - gaps.right).max(0.0),
        (rect.height - gaps.top - gaps.bottom).max(0.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::headless_view;
    use crate::shell::ClientId;
    use crate::tree::{Root, Window, Workspace};

    fn fixture() -> (Rc<Root>, Rc<Workspace>, Rc<crate::tree::Output>) {
        let root = Root::new(hayward_config::Config::default());
        let output = root.add_output("headless-0", 1920.0, 1080.0);
        let workspace = Workspace::new(&root, "1");
        (root, workspace, output)
    }

    fn tile(root: &Rc<Root>, workspace: &Rc<Workspace>, output: &Rc<crate::tree::Output>) -> Rc<Window> {
        let (view, _client, _surface) = headless_view(ClientId(0));
        let window = Window::new(root, view);
        let column = match workspace.preferred_column_on_output(Some(output)) {
            Some(column) => column,
            None => {
                let column = Column::new(root);
                workspace.insert_tiling(output, &column, 0);
                column
            }
        };
        column.add_child(&window);
        window
    }

    #[test]
    fn stacked_column_reserves_one_titlebar_per_child() {
        let (root, workspace, output) = fixture();
        let a = tile(&root, &workspace, &output);
        let b = tile(&root, &workspace, &output);
        let column = a.column().unwrap();
        column.set_layout(ColumnLayout::Stacked);

        let area = Rect::new(0.0, 0.0, 600.0, 400.0);
        arrange_column(&column, area);

        let titlebar_height = root.titlebar_height();
        for window in [&a, &b] {
            assert_eq!(window.get_box(), area);
            let content = window.pending.borrow().content;
            assert_eq!(content.y, area.y + titlebar_height * 2.0);
            assert_eq!(content.height, area.height - titlebar_height * 2.0);
        }
    }

    #[test]
    fn edge_borders_hide_at_the_workspace_edges() {
        let (root, workspace, output) = fixture();
        root.config().borrow_mut().decorations.hide_edge_borders =
            hayward_config::HideEdgeBorders::Both;
        let a = tile(&root, &workspace, &output);
        let b = tile(&root, &workspace, &output);

        arrange_workspace(&workspace);

        // Both windows span the full width, so the vertical borders are gone; only the shared
        // horizontal edge keeps its border.
        let a_pending = a.pending.borrow();
        assert!(!a_pending.border_left && !a_pending.border_right);
        assert!(!a_pending.border_top);
        assert!(a_pending.border_bottom, "the inner edge keeps its border");
        let b_pending = b.pending.borrow();
        assert!(!b_pending.border_bottom);
        assert!(b_pending.border_top);
    }

    #[test]
    fn fractions_equalize_new_entries() {
        let fractions = std::cell::RefCell::new(vec![0.5, 0.5, 0.0]);
        normalize_fractions(
            3,
            |index| fractions.borrow()[index],
            |index, fraction| fractions.borrow_mut()[index] = fraction,
        );
        let fractions = fractions.borrow();
        for fraction in fractions.iter() {
            assert!((fraction - 1.0 / 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn fractions_preserve_ratios() {
        let fractions = std::cell::RefCell::new(vec![0.75, 0.25]);
        normalize_fractions(
            2,
            |index| fractions.borrow()[index],
            |index, fraction| fractions.borrow_mut()[index] = fraction,
        );
        let fractions = fractions.borrow();
        assert!((fractions[0] - 0.75).abs() < 1e-9);
        assert!((fractions[1] - 0.25).abs() < 1e-9);
    }

    #[test]
    fn fractions_sum_to_one_when_all_unset() {
        let fractions = std::cell::RefCell::new(vec![0.0; 4]);
        normalize_fractions(
            4,
            |index| fractions.borrow()[index],
            |index, fraction| fractions.borrow_mut()[index] = fraction,
        );
        let sum: f64 = fractions.borrow().iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }
}
