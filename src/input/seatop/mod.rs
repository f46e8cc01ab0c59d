//! Seat operations: the strategy objects a seat routes input through.
//!
//! Exactly one seatop is active per seat at all times; [`default::SeatopDefault`] is the
//! sentinel. A seatop decides what to forward to clients and what to mutate on the tree; any
//! mutation goes through the regular commit path afterwards.

pub mod default;
pub mod down;
pub mod move_floating;
pub mod move_tiling;
pub mod resize_floating;
pub mod resize_tiling;

use std::rc::Rc;

use crate::input::seat::Seat;
use crate::input::{AxisEvent, ButtonEvent, ResizeEdge};
use crate::state::Server;
use crate::tree::{Output, Window};

pub trait SeatOp {
    fn name(&self) -> &'static str;

    fn button(&mut self, _server: &mut Server, _seat: &Rc<Seat>, _event: &ButtonEvent) {}

    fn pointer_motion(&mut self, _server: &mut Server, _seat: &Rc<Seat>, _time_msec: u32) {}

    fn pointer_axis(&mut self, _server: &mut Server, _seat: &Rc<Seat>, _event: &AxisEvent) {}

    /// Re-evaluate the surface under the cursor after the tree changed without the cursor
    /// moving.
    fn rebase(&mut self, _server: &mut Server, _seat: &Rc<Seat>, _time_msec: u32) {}

    fn tablet_tool_tip(&mut self, _server: &mut Server, _seat: &Rc<Seat>, _time_msec: u32, _down: bool) {
    }

    fn tablet_tool_motion(&mut self, _server: &mut Server, _seat: &Rc<Seat>, _time_msec: u32) {}

    /// Release any seatop-owned resources; called once when the op is replaced.
    fn end(&mut self, _server: &mut Server, _seat: &Rc<Seat>) {}

    /// Drop references to a window that is going away. The op may abort itself in response by
    /// installing the default seatop.
    fn unref_window(&mut self, _server: &mut Server, _seat: &Rc<Seat>, _window: &Rc<Window>) {}

    /// Draw op-specific feedback onto an output. The headless presenter only records damage.
    fn render(&self, _seat: &Rc<Seat>, _output: &Rc<Output>) {}

    /// Whether clients may set the cursor image while this op runs.
    fn allows_set_cursor(&self) -> bool {
        false
    }
}

impl Server {
    /// Run `f` against the seat's current op. The op is parked outside the seat for the
    /// duration, so `f` (or the op itself) may install a replacement; the displaced op is
    /// ended afterwards.
    fn dispatch_seatop(
        &mut self,
        seat: &Rc<Seat>,
        f: impl FnOnce(&mut dyn SeatOp, &mut Server, &Rc<Seat>),
    ) {
        let Some(mut op) = seat.take_seatop() else {
            return;
        };
        f(&mut *op, self, seat);
        if seat.seatop_installed() {
            op.end(self, seat);
        } else {
            seat.put_seatop(op);
        }
    }

    pub fn seatop_button(&mut self, seat: &Rc<Seat>, event: &ButtonEvent) {
        self.dispatch_seatop(seat, |op, server, seat| op.button(server, seat, event));
    }

    pub fn seatop_pointer_motion(&mut self, seat: &Rc<Seat>, time_msec: u32) {
        self.dispatch_seatop(seat, |op, server, seat| {
            op.pointer_motion(server, seat, time_msec);
        });
    }

    pub fn seatop_pointer_axis(&mut self, seat: &Rc<Seat>, event: &AxisEvent) {
        self.dispatch_seatop(seat, |op, server, seat| {
            op.pointer_axis(server, seat, event);
        });
    }

    pub fn seatop_rebase(&mut self, seat: &Rc<Seat>, time_msec: u32) {
        self.dispatch_seatop(seat, |op, server, seat| op.rebase(server, seat, time_msec));
    }

    pub fn seatop_tablet_tool_tip(&mut self, seat: &Rc<Seat>, time_msec: u32, down: bool) {
        self.dispatch_seatop(seat, |op, server, seat| {
            op.tablet_tool_tip(server, seat, time_msec, down);
        });
    }

    pub fn seatop_tablet_tool_motion(&mut self, seat: &Rc<Seat>, time_msec: u32) {
        self.dispatch_seatop(seat, |op, server, seat| {
            op.tablet_tool_motion(server, seat, time_msec);
        });
    }

    /// End the current op and fall back to the default seatop.
    pub fn seatop_begin_default(&mut self, seat: &Rc<Seat>) {
        self.install_seatop(seat, Box::new(default::SeatopDefault::new()));
    }

    pub fn seatop_begin_down(&mut self, seat: &Rc<Seat>, window: &Rc<Window>, button: u32) {
        self.install_seatop(seat, Box::new(down::SeatopDown::new(window, button)));
    }

    pub fn seatop_begin_move_floating(&mut self, seat: &Rc<Seat>, window: &Rc<Window>) {
        let op = move_floating::SeatopMoveFloating::new(seat, window);
        self.install_seatop(seat, Box::new(op));
    }

    /// Move a tiled window, waiting for the pointer to travel past a small radius before
    /// anything detaches.
    pub fn seatop_begin_move_tiling_threshold(&mut self, seat: &Rc<Seat>, window: &Rc<Window>) {
        let op = move_tiling::SeatopMoveTiling::new_threshold(seat, window);
        self.install_seatop(seat, Box::new(op));
    }

    pub fn seatop_begin_move_tiling(&mut self, seat: &Rc<Seat>, window: &Rc<Window>) {
        let op = move_tiling::SeatopMoveTiling::new_active(seat, window);
        self.install_seatop(seat, Box::new(op));
    }

    pub fn seatop_begin_resize_floating(
        &mut self,
        seat: &Rc<Seat>,
        window: &Rc<Window>,
        edges: ResizeEdge,
    ) {
        let op = resize_floating::SeatopResizeFloating::new(seat, window, edges);
        self.install_seatop(seat, Box::new(op));
    }

    pub fn seatop_begin_resize_tiling(
        &mut self,
        seat: &Rc<Seat>,
        window: &Rc<Window>,
        edges: ResizeEdge,
    ) {
        let op = resize_tiling::SeatopResizeTiling::new(seat, window, edges);
        self.install_seatop(seat, Box::new(op));
    }

    fn install_seatop(&mut self, seat: &Rc<Seat>, op: Box<dyn SeatOp>) {
        trace!(seatop = op.name(), "Starting seatop");
        if let Some(mut old) = seat.take_seatop() {
            old.end(self, seat);
        }
        seat.put_seatop(op);
    }

    /// Tell every seat's op that a window is going away.
    pub fn end_mouse_operation(&mut self, window: &Rc<Window>) {
        let seats = self.input.seats.clone();
        for seat in &seats {
            self.dispatch_seatop(seat, |op, server, seat| {
                op.unref_window(server, seat, window);
            });
        }
    }
}
