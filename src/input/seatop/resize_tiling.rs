use std::rc::Rc;

use crate::input::seat::Seat;
use crate::input::{ButtonEvent, ResizeEdge};
use crate::state::Server;
use crate::tree::{arrange, Column, Window};

use super::SeatOp;

/// Columns and windows never shrink below this share of their axis.
const MIN_FRACTION: f64 = 0.05;

/// Drag the shared edge between two tiles, trading layout fractions between them.
#[derive(Debug)]
pub struct SeatopResizeTiling {
    window: Rc<Window>,
    edges: ResizeEdge,
    start_cursor: (f64, f64),
    /// Horizontal neighbours: the column pair and their initial width fractions.
    horizontal: Option<(Rc<Column>, Rc<Column>, f64, f64)>,
    /// Vertical neighbours: the window pair and their initial height fractions.
    vertical: Option<(Rc<Window>, Rc<Window>, f64, f64)>,
}

impl SeatopResizeTiling {
    pub fn new(seat: &Rc<Seat>, window: &Rc<Window>, edges: ResizeEdge) -> Self {
        window.set_resizing(true);

        let horizontal = window.column().and_then(|column| {
            let neighbour = if edges.contains(ResizeEdge::LEFT) {
                column.get_previous_sibling()
            } else if edges.contains(ResizeEdge::RIGHT) {
                column.get_next_sibling()
            } else {
                None
            };
            neighbour.map(|neighbour| {
                let a = column.width_fraction.get();
                let b = neighbour.width_fraction.get();
                (column, neighbour, a, b)
            })
        });

        let vertical = {
            let neighbour = if edges.contains(ResizeEdge::TOP) {
                window.get_previous_sibling()
            } else if edges.contains(ResizeEdge::BOTTOM) {
                window.get_next_sibling()
            } else {
                None
            };
            neighbour.map(|neighbour| {
                let a = window.height_fraction.get();
                let b = neighbour.height_fraction.get();
                (Rc::clone(window), neighbour, a, b)
            })
        };

        Self {
            window: Rc::clone(window),
            edges,
            start_cursor: seat.cursor.position(),
            horizontal,
            vertical,
        }
    }
}

impl SeatOp for SeatopResizeTiling {
    fn name(&self) -> &'static str {
        "resize_tiling"
    }

    fn button(&mut self, server: &mut Server, seat: &Rc<Seat>, _event: &ButtonEvent) {
        if seat.cursor.pressed_button_count() == 0 {
            server.seatop_begin_default(seat);
        }
    }

    fn pointer_motion(&mut self, _server: &mut Server, seat: &Rc<Seat>, _time_msec: u32) {
        let Some(workspace) = self.window.workspace() else {
            return;
        };
        let area = workspace.get_box();
        let (x, y) = seat.cursor.position();
        let dx = x - self.start_cursor.0;
        let dy = y - self.start_cursor.1;

        if let Some((column, neighbour, start_a, start_b)) = &self.horizontal {
            if area.width > 0.0 {
                let mut delta = dx / area.width;
                if self.edges.contains(ResizeEdge::LEFT) {
                    delta = -delta;
                }
                let delta = delta
                    .clamp(-(start_a - MIN_FRACTION).max(0.0), (start_b - MIN_FRACTION).max(0.0));
                column.width_fraction.set(start_a + delta);
                neighbour.width_fraction.set(start_b - delta);
            }
        }

        if let Some((window, neighbour, start_a, start_b)) = &self.vertical {
            let column_height = window
                .column()
                .map_or(area.height, |column| column.get_box().height);
            if column_height > 0.0 {
                let mut delta = dy / column_height;
                if self.edges.contains(ResizeEdge::TOP) {
                    delta = -delta;
                }
                let delta = delta
                    .clamp(-(start_a - MIN_FRACTION).max(0.0), (start_b - MIN_FRACTION).max(0.0));
                window.height_fraction.set(start_a + delta);
                neighbour.height_fraction.set(start_b - delta);
            }
        }

        arrange::arrange_workspace(&workspace);
    }

    fn end(&mut self, _server: &mut Server, _seat: &Rc<Seat>) {
        self.window.set_resizing(false);
    }

    fn unref_window(&mut self, server: &mut Server, seat: &Rc<Seat>, window: &Rc<Window>) {
        if &self.window == window {
            server.seatop_begin_default(seat);
        }
    }
}
