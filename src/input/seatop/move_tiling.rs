use std::rc::Rc;

use crate::input::seat::Seat;
use crate::input::ButtonEvent;
use crate::state::Server;
use crate::tree::{arrange, Column, Output, Window};
use crate::utils::Direction;

use super::SeatOp;

/// How far the pointer travels before a titlebar drag turns into a real move.
const MOVE_THRESHOLD: f64 = 5.0;

/// Where the dragged window would land if dropped now.
#[derive(Debug)]
enum DropTarget {
    /// Into an existing column, above or below its active child.
    Column { column: Rc<Column>, after: bool },
    /// Into a fresh column inserted at this index of the workspace tiling list.
    NewColumn { index: usize },
}

/// Drag a tiled window to a new position in the tiling.
///
/// Starts in threshold mode: nothing happens until the pointer travels [`MOVE_THRESHOLD`]
/// pixels, so a sloppy titlebar click does not tear windows out of the layout.
#[derive(Debug)]
pub struct SeatopMoveTiling {
    window: Rc<Window>,
    start: (f64, f64),
    threshold_reached: bool,
    target: Option<DropTarget>,
}

impl SeatopMoveTiling {
    pub fn new_threshold(seat: &Rc<Seat>, window: &Rc<Window>) -> Self {
        Self {
            window: Rc::clone(window),
            start: seat.cursor.position(),
            threshold_reached: false,
            target: None,
        }
    }

    pub fn new_active(seat: &Rc<Seat>, window: &Rc<Window>) -> Self {
        Self {
            window: Rc::clone(window),
            start: seat.cursor.position(),
            threshold_reached: true,
            target: None,
        }
    }

    fn update_target(&mut self, server: &Server, x: f64, y: f64) {
        let hit = server.node_at_coords(x, y);
        let Some(over) = hit.window else {
            self.target = None;
            return;
        };
        if over == self.window || over.is_floating() {
            self.target = None;
            return;
        }
        let Some(column) = over.column() else {
            self.target = None;
            return;
        };

        let rect = column.current.borrow().rect;
        if rect.width > 0.0 {
            let relative = (x - rect.x) / rect.width;
            // The outer quarters of a column create a new column next to it.
            if relative < 0.25 || relative > 0.75 {
                let index = column.sibling_index().unwrap_or(0) + usize::from(relative > 0.75);
                self.target = Some(DropTarget::NewColumn { index });
                return;
            }
        }

        let over_rect = over.current.borrow().rect;
        let after = over_rect.height > 0.0 && (y - over_rect.y) / over_rect.height >= 0.5;
        self.target = Some(DropTarget::Column { column, after });
    }

    fn drop_window(&mut self, server: &mut Server, seat: &Rc<Seat>) {
        let window = Rc::clone(&self.window);
        let Some(workspace) = window.workspace() else {
            return;
        };

        match self.target.take() {
            Some(DropTarget::Column { column, after }) => {
                if window.column().is_none_or(|current| current != column) {
                    window.move_to_column_from_direction(
                        &column,
                        if after { Direction::Down } else { Direction::Up },
                    );
                } else {
                    // Reorder within the same column.
                    window.detach();
                    let index = if after {
                        column.pending.borrow().children.len()
                    } else {
                        0
                    };
                    column.insert_child(&window, index);
                }
            }
            Some(DropTarget::NewColumn { index }) => {
                let output = window
                    .output()
                    .or_else(|| server.root.active_output());
                if let Some(output) = output {
                    let column = Column::new(&server.root);
                    window.detach();
                    workspace.insert_tiling(&output, &column, index);
                    column.add_child(&window);
                }
            }
            None => {}
        }

        server.seat_set_focus_window(seat, Some(window));
        arrange::arrange_workspace(&workspace);
    }
}

impl SeatOp for SeatopMoveTiling {
    fn name(&self) -> &'static str {
        "move_tiling"
    }

    fn button(&mut self, server: &mut Server, seat: &Rc<Seat>, _event: &ButtonEvent) {
        if seat.cursor.pressed_button_count() == 0 {
            if self.threshold_reached {
                self.drop_window(server, seat);
            }
            server.seatop_begin_default(seat);
        }
    }

    fn pointer_motion(&mut self, server: &mut Server, seat: &Rc<Seat>, _time_msec: u32) {
        let (x, y) = seat.cursor.position();

        if !self.threshold_reached {
            let (sx, sy) = self.start;
            if (x - sx).powi(2) + (y - sy).powi(2) <= MOVE_THRESHOLD * MOVE_THRESHOLD {
                return;
            }
            self.threshold_reached = true;
        }

        self.update_target(server, x, y);
    }

    fn unref_window(&mut self, server: &mut Server, seat: &Rc<Seat>, window: &Rc<Window>) {
        if &self.window == window {
            server.seatop_begin_default(seat);
        }
    }

    fn render(&self, _seat: &Rc<Seat>, output: &Rc<Output>) {
        // Drop-indicator feedback; the headless presenter only tracks damage.
        if self.threshold_reached && self.target.is_some() {
            output.damage_whole();
        }
    }
}
