use std::rc::Rc;

use crate::input::seat::Seat;
use crate::input::ButtonEvent;
use crate::state::Server;
use crate::tree::Window;

use super::SeatOp;

/// Drag a floating window around.
#[derive(Debug)]
pub struct SeatopMoveFloating {
    window: Rc<Window>,
    /// Cursor offset from the window origin, kept constant for the whole drag.
    offset: (f64, f64),
}

impl SeatopMoveFloating {
    pub fn new(seat: &Rc<Seat>, window: &Rc<Window>) -> Self {
        let (x, y) = seat.cursor.position();
        let rect = window.get_box();
        Self {
            window: Rc::clone(window),
            offset: (x - rect.x, y - rect.y),
        }
    }
}

impl SeatOp for SeatopMoveFloating {
    fn name(&self) -> &'static str {
        "move_floating"
    }

    fn button(&mut self, server: &mut Server, seat: &Rc<Seat>, _event: &ButtonEvent) {
        if seat.cursor.pressed_button_count() == 0 {
            server.seatop_begin_default(seat);
        }
    }

    fn pointer_motion(&mut self, _server: &mut Server, seat: &Rc<Seat>, _time_msec: u32) {
        let (x, y) = seat.cursor.position();
        self.window
            .floating_move_to(x - self.offset.0, y - self.offset.1);
        self.window.damage_whole();
    }

    fn unref_window(&mut self, server: &mut Server, seat: &Rc<Seat>, window: &Rc<Window>) {
        if &self.window == window {
            server.seatop_begin_default(seat);
        }
    }
}
