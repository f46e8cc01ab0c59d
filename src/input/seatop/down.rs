use std::rc::Rc;

use crate::input::seat::Seat;
use crate::input::{AxisEvent, Axis, ButtonEvent, ButtonState};
use crate::shell::SurfaceEvent;
use crate::state::Server;
use crate::tree::Window;

use super::SeatOp;

/// Forward all motion and buttons to one surface until the initiating button releases.
#[derive(Debug)]
pub struct SeatopDown {
    window: Rc<Window>,
    button: u32,
    /// Layout position of the surface origin when the press happened; motion keeps being
    /// reported relative to it even when the cursor strays off the surface.
    origin: (f64, f64),
}

impl SeatopDown {
    pub fn new(window: &Rc<Window>, button: u32) -> Self {
        let geometry = window.view().geometry.get();
        let origin = (
            window.surface_x.get() - geometry.x,
            window.surface_y.get() - geometry.y,
        );
        Self {
            window: Rc::clone(window),
            button,
            origin,
        }
    }
}

impl SeatOp for SeatopDown {
    fn name(&self) -> &'static str {
        "down"
    }

    fn button(&mut self, server: &mut Server, seat: &Rc<Seat>, event: &ButtonEvent) {
        if let Some(surface) = self.window.surface() {
            surface.send_event(SurfaceEvent::PointerButton {
                button: event.button,
                pressed: event.state == ButtonState::Pressed,
            });
        }
        if event.button == self.button
            && event.state == ButtonState::Released
            && seat.cursor.pressed_button_count() == 0
        {
            server.seatop_begin_default(seat);
        }
    }

    fn pointer_motion(&mut self, _server: &mut Server, seat: &Rc<Seat>, _time_msec: u32) {
        if let Some(surface) = self.window.surface() {
            let (x, y) = seat.cursor.position();
            surface.send_event(SurfaceEvent::PointerMotion {
                sx: x - self.origin.0,
                sy: y - self.origin.1,
            });
        }
    }

    fn pointer_axis(&mut self, _server: &mut Server, _seat: &Rc<Seat>, event: &AxisEvent) {
        if let Some(surface) = self.window.surface() {
            surface.send_event(SurfaceEvent::PointerAxis {
                horizontal: event.orientation == Axis::Horizontal,
                delta: event.delta,
            });
        }
    }

    fn unref_window(&mut self, server: &mut Server, seat: &Rc<Seat>, window: &Rc<Window>) {
        if &self.window == window {
            server.seatop_begin_default(seat);
        }
    }
}
