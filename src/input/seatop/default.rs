use std::rc::Rc;

use crate::input::seat::Seat;
use crate::input::{AxisEvent, Axis, ButtonEvent, ButtonState, ResizeEdge, BTN_LEFT};
use crate::shell::{KeyboardInteractivity, SurfaceEvent};
use crate::state::Server;
use crate::tree::Window;

use super::SeatOp;

/// The sentinel seatop: hit-test and forward.
#[derive(Debug, Default)]
pub struct SeatopDefault {
    _priv: (),
}

impl SeatopDefault {
    pub fn new() -> Self {
        Self { _priv: () }
    }
}

/// Where on a window a press landed.
enum PressRegion {
    Titlebar,
    Border(ResizeEdge),
    Content,
}

fn press_region(window: &Rc<Window>, lx: f64, ly: f64) -> PressRegion {
    let current = window.current.borrow();
    let content = current.content;

    if content.contains(lx, ly) {
        return PressRegion::Content;
    }

    // Above the content but inside the window is the titlebar, which drags the window; the
    // remaining strips are resize handles.
    if ly < content.y
        && lx >= content.x
        && lx < content.x + content.width
        && current.border == crate::tree::BorderKind::Normal
    {
        return PressRegion::Titlebar;
    }

    let mut edges = ResizeEdge::empty();
    if lx < content.x {
        edges |= ResizeEdge::LEFT;
    } else if lx >= content.x + content.width {
        edges |= ResizeEdge::RIGHT;
    }
    if ly < content.y {
        edges |= ResizeEdge::TOP;
    } else if ly >= content.y + content.height {
        edges |= ResizeEdge::BOTTOM;
    }
    if edges.is_empty() {
        PressRegion::Content
    } else {
        PressRegion::Border(edges)
    }
}

impl SeatOp for SeatopDefault {
    fn name(&self) -> &'static str {
        "default"
    }

    fn button(&mut self, server: &mut Server, seat: &Rc<Seat>, event: &ButtonEvent) {
        let (x, y) = seat.cursor.position();
        let hit = server.node_at_coords(x, y);

        if event.state == ButtonState::Released {
            if let Some(surface) = &hit.surface {
                surface.send_event(SurfaceEvent::PointerButton {
                    button: event.button,
                    pressed: false,
                });
            }
            return;
        }

        // Clicking an on-demand layer surface hands it the keyboard.
        if let Some(layer) = &hit.layer {
            if layer.keyboard_interactivity() != KeyboardInteractivity::None {
                server.seat_set_focus_layer(seat, Some(Rc::clone(layer)));
            }
            if let Some(surface) = &hit.surface {
                surface.send_event(SurfaceEvent::PointerButton {
                    button: event.button,
                    pressed: true,
                });
            }
            return;
        }

        let Some(window) = hit.window.clone() else {
            if let Some(surface) = &hit.surface {
                surface.send_event(SurfaceEvent::PointerButton {
                    button: event.button,
                    pressed: true,
                });
            }
            return;
        };

        server.seat_set_focus_window(seat, Some(Rc::clone(&window)));
        if window.is_floating() {
            window.raise_floating();
        }

        match press_region(&window, x, y) {
            PressRegion::Titlebar if event.button == BTN_LEFT => {
                if window.is_floating() {
                    server.seatop_begin_move_floating(seat, &window);
                } else if !window.is_fullscreen() {
                    server.seatop_begin_move_tiling_threshold(seat, &window);
                }
            }
            PressRegion::Border(edges) if event.button == BTN_LEFT => {
                if window.is_fullscreen() {
                    return;
                }
                if window.is_floating() {
                    server.seatop_begin_resize_floating(seat, &window, edges);
                } else {
                    server.seatop_begin_resize_tiling(seat, &window, edges);
                }
            }
            _ => {
                if let Some(surface) = &hit.surface {
                    surface.send_event(SurfaceEvent::PointerButton {
                        button: event.button,
                        pressed: true,
                    });
                    server.seatop_begin_down(seat, &window, event.button);
                }
            }
        }
    }

    fn pointer_motion(&mut self, server: &mut Server, seat: &Rc<Seat>, _time_msec: u32) {
        let (x, y) = seat.cursor.position();
        let hit = server.node_at_coords(x, y);

        if let Some(output) = &hit.output {
            server.root.set_active_output(output);
        }

        let focus_follows_mouse = server.config.borrow().general.focus_follows_mouse;
        if focus_follows_mouse && seat.cursor.pressed_button_count() == 0 {
            if let Some(window) = &hit.window {
                if seat
                    .focused_window()
                    .is_none_or(|focused| &focused != window)
                {
                    server.seat_set_focus_window(seat, Some(Rc::clone(window)));
                }
            }
        }

        let target = hit
            .surface
            .map(|surface| (surface, hit.sx, hit.sy));
        server.pointer_enter(seat, target);
    }

    fn pointer_axis(&mut self, server: &mut Server, seat: &Rc<Seat>, event: &AxisEvent) {
        let (x, y) = seat.cursor.position();
        let hit = server.node_at_coords(x, y);
        if let Some(surface) = &hit.surface {
            surface.send_event(SurfaceEvent::PointerAxis {
                horizontal: event.orientation == Axis::Horizontal,
                delta: event.delta,
            });
        }
    }

    fn rebase(&mut self, server: &mut Server, seat: &Rc<Seat>, _time_msec: u32) {
        let (x, y) = seat.cursor.position();
        let hit = server.node_at_coords(x, y);
        let target = hit
            .surface
            .map(|surface| (surface, hit.sx, hit.sy));
        server.pointer_enter(seat, target);
    }

    fn tablet_tool_tip(&mut self, server: &mut Server, seat: &Rc<Seat>, _time_msec: u32, down: bool) {
        let (x, y) = seat.cursor.position();
        let hit = server.node_at_coords(x, y);
        if let Some(surface) = &hit.surface {
            surface.send_event(SurfaceEvent::TabletTip { down });
        }
        if down {
            if let Some(window) = hit.window {
                server.seat_set_focus_window(seat, Some(window));
            }
        }
    }

    fn tablet_tool_motion(&mut self, server: &mut Server, seat: &Rc<Seat>, _time_msec: u32) {
        let (x, y) = seat.cursor.position();
        let hit = server.node_at_coords(x, y);
        if let Some(surface) = &hit.surface {
            surface.send_event(SurfaceEvent::TabletMotion {
                sx: hit.sx,
                sy: hit.sy,
            });
        }
    }

    fn allows_set_cursor(&self) -> bool {
        true
    }
}
