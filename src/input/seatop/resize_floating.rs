use std::rc::Rc;

use crate::input::seat::Seat;
use crate::input::{ButtonEvent, ResizeEdge};
use crate::state::Server;
use crate::tree::Window;
use crate::utils::Rect;

use super::SeatOp;

/// Drag-resize a floating window from one or two edges.
#[derive(Debug)]
pub struct SeatopResizeFloating {
    window: Rc<Window>,
    edges: ResizeEdge,
    start_rect: Rect,
    start_cursor: (f64, f64),
}

impl SeatopResizeFloating {
    pub fn new(seat: &Rc<Seat>, window: &Rc<Window>, edges: ResizeEdge) -> Self {
        window.set_resizing(true);
        Self {
            window: Rc::clone(window),
            edges,
            start_rect: window.get_box(),
            start_cursor: seat.cursor.position(),
        }
    }
}

impl SeatOp for SeatopResizeFloating {
    fn name(&self) -> &'static str {
        "resize_floating"
    }

    fn button(&mut self, server: &mut Server, seat: &Rc<Seat>, _event: &ButtonEvent) {
        if seat.cursor.pressed_button_count() == 0 {
            server.seatop_begin_default(seat);
        }
    }

    fn pointer_motion(&mut self, server: &mut Server, seat: &Rc<Seat>, _time_msec: u32) {
        let (x, y) = seat.cursor.position();
        let dx = x - self.start_cursor.0;
        let dy = y - self.start_cursor.1;

        let (min_width, max_width, min_height, max_height) =
            Window::floating_constraints(&server.root);

        let mut rect = self.start_rect;
        if self.edges.contains(ResizeEdge::LEFT) {
            let width = (rect.width - dx).clamp(min_width, max_width);
            rect.x += rect.width - width;
            rect.width = width;
        } else if self.edges.contains(ResizeEdge::RIGHT) {
            rect.width = (rect.width + dx).clamp(min_width, max_width);
        }
        if self.edges.contains(ResizeEdge::TOP) {
            let height = (rect.height - dy).clamp(min_height, max_height);
            rect.y += rect.height - height;
            rect.height = height;
        } else if self.edges.contains(ResizeEdge::BOTTOM) {
            rect.height = (rect.height + dy).clamp(min_height, max_height);
        }

        self.window.pending.borrow_mut().rect = rect;
        self.window.set_content_from_geometry();
        self.window.node.set_dirty();
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
