//! The cursor: layered hit testing and pointer/touch/tablet event routing.
//!
//! Scene layers are hit-tested back to front as seen by the user: popups, then overlay and top
//! layer-shell surfaces, then unmanaged client-positioned surfaces, then the workspace
//! (fullscreen window, floaters top to bottom, tiling), then the bottom and background
//! layer-shell surfaces. The first hit wins.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::input::constraints::{ConstraintKind, PointerConstraint};
use crate::input::seat::{IdleSource, Seat};
use crate::input::{AxisEvent, ButtonEvent, ButtonState, BTN_LEFT, BTN_RIGHT};
use crate::shell::{Layer, LayerSurface, Surface};
use crate::state::Server;
use crate::tree::{ColumnLayout, Output, Window};

/// Result of a scene hit test.
#[derive(Clone, Debug, Default)]
pub struct HitResult {
    pub output: Option<Rc<Output>>,
    pub window: Option<Rc<Window>>,
    pub layer: Option<Rc<LayerSurface>>,
    pub surface: Option<Rc<Surface>>,
    /// Surface-local coordinates of the hit, meaningful when `surface` is set.
    pub sx: f64,
    pub sy: f64,
}

/// Per-seat cursor state.
#[derive(Debug)]
pub struct Cursor {
    x: Cell<f64>,
    y: Cell<f64>,
    /// Named xcursor image currently shown, `None` when hidden or capability-less.
    image: RefCell<Option<String>>,
    hidden: Cell<bool>,
    /// Surface currently holding pointer focus.
    focused_surface: RefCell<Option<Rc<Surface>>>,
    pressed_button_count: Cell<u32>,
    active_constraint: RefCell<Option<Rc<PointerConstraint>>>,
}

impl Cursor {
    pub fn new() -> Self {
        Self {
            x: Cell::new(0.0),
            y: Cell::new(0.0),
            image: RefCell::new(None),
            hidden: Cell::new(false),
            focused_surface: RefCell::new(None),
            pressed_button_count: Cell::new(0),
            active_constraint: RefCell::new(None),
        }
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x.get(), self.y.get())
    }

    /// Move the cursor without dispatching events.
    pub fn warp(&self, x: f64, y: f64) {
        self.x.set(x);
        self.y.set(y);
    }

    pub fn image(&self) -> Option<String> {
        self.image.borrow().clone()
    }

    pub fn set_image(&self, image: Option<&str>) {
        *self.image.borrow_mut() = image.map(String::from);
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.get()
    }

    pub fn set_hidden(&self, hidden: bool) {
        self.hidden.set(hidden);
    }

    pub fn focused_surface(&self) -> Option<Rc<Surface>> {
        self.focused_surface.borrow().clone()
    }

    pub fn set_focused_surface(&self, surface: Option<Rc<Surface>>) {
        *self.focused_surface.borrow_mut() = surface;
    }

    pub fn pressed_button_count(&self) -> u32 {
        self.pressed_button_count.get()
    }

    pub fn active_constraint(&self) -> Option<Rc<PointerConstraint>> {
        self.active_constraint.borrow().clone()
    }

    pub fn set_active_constraint(&self, constraint: Option<Rc<PointerConstraint>>) {
        *self.active_constraint.borrow_mut() = constraint;
    }
}

impl Server {
    /// Find what sits under the layout point `(lx, ly)`.
    pub fn node_at_coords(&self, lx: f64, ly: f64) -> HitResult {
        let Some(output) = self.root.output_at(lx, ly) else {
            return HitResult::default();
        };
        let mut result = HitResult {
            output: Some(Rc::clone(&output)),
            ..HitResult::default()
        };

        // Popups float above everything.
        let popup_during_fullscreen = self.config.borrow().general.popup_during_fullscreen;
        for popup in self.root.popups.borrow().iter().rev() {
            let Some(parent) = popup.parent.borrow().upgrade() else {
                continue;
            };
            // Popups of hidden windows are dropped outright when so configured.
            if popup_during_fullscreen == hayward_config::PopupDuringFullscreen::Ignore
                && parent.obstructing_fullscreen_window().is_some()
            {
                continue;
            }
            let content = parent.current.borrow().content;
            let (offset_x, offset_y) = popup.offset.get();
            let (width, height) = popup.surface.size();
            let rect = crate::utils::Rect::new(content.x + offset_x, content.y + offset_y, width, height);
            if rect.contains(lx, ly) {
                result.window = Some(parent);
                result.surface = Some(Rc::clone(&popup.surface));
                result.sx = lx - rect.x;
                result.sy = ly - rect.y;
                return result;
            }
        }

        // Overlay and top layer shells.
        if let Some(hit) = layer_surface_at(&output, &[Layer::Overlay, Layer::Top], lx, ly) {
            result.layer = Some(hit.0);
            result.surface = Some(hit.1);
            result.sx = hit.2;
            result.sy = hit.3;
            return result;
        }

        // Unmanaged client-positioned surfaces.
        for unmanaged in self.root.unmanaged.borrow().iter().rev() {
            let rect = unmanaged.rect.get();
            if rect.contains(lx, ly) {
                result.surface = Some(Rc::clone(&unmanaged.surface));
                result.sx = lx - rect.x;
                result.sy = ly - rect.y;
                return result;
            }
        }

        // The workspace: fullscreen window, then floaters top to bottom, then tiling.
        if let Some(workspace) = self.root.current.borrow().active_workspace.clone() {
            let state = workspace.current.borrow().clone();
            if let Some(fullscreen) = state.fullscreen {
                return self.window_hit(result, fullscreen, lx, ly);
            }

            for window in state.floating.iter().rev() {
                if window.current_contains_point(lx, ly) {
                    return self.window_hit(result, Rc::clone(window), lx, ly);
                }
            }

            for column in &state.tiling {
                if !column.current.borrow().rect.contains(lx, ly) {
                    continue;
                }
                let column_state = column.current.borrow().clone();
                let window = match column_state.layout {
                    ColumnLayout::Stacked => column_state.active_child,
                    ColumnLayout::Split => column_state
                        .children
                        .iter()
                        .find(|child| child.current_contains_point(lx, ly))
                        .cloned(),
                };
                if let Some(window) = window {
                    return self.window_hit(result, window, lx, ly);
                }
            }
        }

        // Bottom and background layer shells.
        if let Some(hit) = layer_surface_at(&output, &[Layer::Bottom, Layer::Background], lx, ly) {
            result.layer = Some(hit.0);
            result.surface = Some(hit.1);
            result.sx = hit.2;
            result.sy = hit.3;
            return result;
        }

        result
    }

    fn window_hit(&self, mut result: HitResult, window: Rc<Window>, lx: f64, ly: f64) -> HitResult {
        if let Some((surface, sx, sy)) = window.surface_at(lx, ly) {
            result.surface = Some(surface);
            result.sx = sx;
            result.sy = sy;
        }
        result.window = Some(window);
        result
    }

    // {{{ Pointer

    /// Relative pointer motion, subject to pointer constraints.
    pub fn cursor_motion(&mut self, seat: &Rc<Seat>, time_msec: u32, dx: f64, dy: f64) {
        seat.idle_notify_activity(IdleSource::POINTER);
        seat.cursor.set_hidden(false);

        let (x, y) = seat.cursor.position();
        let mut target = (x + dx, y + dy);

        // Apply the active constraint against the focused surface.
        self.update_active_constraint(seat);
        if let Some(constraint) = seat.cursor.active_constraint() {
            if let Some(focused) = seat.cursor.focused_surface() {
                if focused.id() == constraint.surface().id() {
                    match constraint.kind() {
                        ConstraintKind::Locked => return,
                        ConstraintKind::Confined => {
                            let hit = self.node_at_coords(x, y);
                            // Translate into surface coordinates, clip, translate back.
                            let origin = (x - hit.sx, y - hit.sy);
                            let (sx, sy) = (target.0 - origin.0, target.1 - origin.1);
                            if !constraint.region_contains(sx, sy) {
                                let (cx, cy) = constraint.clamp_to_region(sx, sy);
                                target = (origin.0 + cx, origin.1 + cy);
                            }
                        }
                    }
                }
            }
        }

        // Keep the cursor on some output.
        if self.root.output_at(target.0, target.1).is_none() {
            let layout = self.root.layout_box();
            if !layout.is_empty() {
                let (cx, cy) = layout.closest_point(target.0, target.1);
                // closest_point may land on the exclusive edge.
                target = (
                    cx.min(layout.x + layout.width - 1.0),
                    cy.min(layout.y + layout.height - 1.0),
                );
            }
        }

        seat.cursor.warp(target.0, target.1);
        self.seatop_pointer_motion(seat, time_msec);
    }

    /// Absolute pointer motion (tablets in absolute mode, the headless test harness).
    pub fn cursor_move_absolute(&mut self, seat: &Rc<Seat>, time_msec: u32, x: f64, y: f64) {
        let (cx, cy) = seat.cursor.position();
        self.cursor_motion(seat, time_msec, x - cx, y - cy);
    }

    pub fn cursor_button(&mut self, seat: &Rc<Seat>, event: &ButtonEvent) {
        seat.idle_notify_activity(IdleSource::POINTER);
        match event.state {
            ButtonState::Pressed => {
                seat.cursor
                    .pressed_button_count
                    .set(seat.cursor.pressed_button_count.get() + 1);
            }
            ButtonState::Released => {
                let count = seat.cursor.pressed_button_count.get();
                if count > 0 {
                    seat.cursor.pressed_button_count.set(count - 1);
                }
            }
        }
        seat.last_button_serial
            .set(crate::shell::Serial::next().get());
        self.seatop_button(seat, event);
    }

    pub fn cursor_axis(&mut self, seat: &Rc<Seat>, event: &AxisEvent) {
        seat.idle_notify_activity(IdleSource::POINTER);
        self.seatop_pointer_axis(seat, event);
    }

    /// Re-evaluate what is under every cursor, after the tree changed beneath it.
    pub fn cursor_rebase_all(&mut self, time_msec: u32) {
        let seats = self.input.seats.clone();
        for seat in &seats {
            self.seatop_rebase(seat, time_msec);
        }
    }

    /// Update the pointer-focused surface, sending enter/leave/motion as needed.
    pub fn pointer_enter(
        &mut self,
        seat: &Rc<Seat>,
        target: Option<(Rc<Surface>, f64, f64)>,
    ) {
        let previous = seat.cursor.focused_surface();
        match (&previous, &target) {
            (Some(previous), Some((surface, sx, sy))) if previous.id() == surface.id() => {
                surface.send_event(crate::shell::SurfaceEvent::PointerMotion { sx: *sx, sy: *sy });
                return;
            }
            _ => {}
        }
        if let Some(previous) = previous {
            previous.send_event(crate::shell::SurfaceEvent::PointerLeave);
        }
        if let Some((surface, sx, sy)) = &target {
            surface.send_event(crate::shell::SurfaceEvent::PointerEnter { sx: *sx, sy: *sy });
        }
        seat.cursor
            .set_focused_surface(target.map(|(surface, _, _)| surface));
    }

    fn update_active_constraint(&mut self, seat: &Rc<Seat>) {
        let constraint = seat
            .cursor
            .focused_surface()
            .and_then(|surface| self.constraint_for_surface(&surface));
        seat.cursor.set_active_constraint(constraint);
    }

    // }}}

    // {{{ Touch

    /// Touch down. The first touch starts a native touch sequence when the surface under it
    /// accepts touch; otherwise it drives the pointer.
    pub fn touch_down(&mut self, seat: &Rc<Seat>, time_msec: u32, touch_id: i32, lx: f64, ly: f64) {
        seat.idle_notify_activity(IdleSource::TOUCH);
        seat.touch.touch_id.set(touch_id);
        seat.touch.touch_x.set(lx);
        seat.touch.touch_y.set(ly);

        let hit = self.node_at_coords(lx, ly);
        let native = hit
            .surface
            .as_ref()
            .is_some_and(|surface| surface.accepts_touch());

        if native {
            let surface = hit.surface.expect("checked above");
            surface.send_event(crate::shell::SurfaceEvent::TouchDown {
                id: touch_id,
                sx: hit.sx,
                sy: hit.sy,
            });
            *seat.touch.touch_surface.borrow_mut() = Some(surface);
            if let Some(window) = hit.window {
                self.seat_set_focus_window(seat, Some(window));
            }
        } else {
            // Simulate a pointer press until this touch point releases.
            seat.touch.simulating_pointer_from_touch.set(true);
            seat.touch.pointer_touch_id.set(Some(touch_id));
            seat.cursor.warp(lx, ly);
            self.seatop_pointer_motion(seat, time_msec);
            self.cursor_button(
                seat,
                &ButtonEvent {
                    time_msec,
                    button: BTN_LEFT,
                    state: ButtonState::Pressed,
                },
            );
        }
    }

    pub fn touch_motion(&mut self, seat: &Rc<Seat>, time_msec: u32, touch_id: i32, lx: f64, ly: f64) {
        seat.idle_notify_activity(IdleSource::TOUCH);
        seat.touch.touch_x.set(lx);
        seat.touch.touch_y.set(ly);

        if seat.touch.simulating_pointer_from_touch.get()
            && seat.touch.pointer_touch_id.get() == Some(touch_id)
        {
            seat.cursor.warp(lx, ly);
            self.seatop_pointer_motion(seat, time_msec);
            return;
        }

        // Native sequences keep reporting to the surface they started on.
        let touch_surface = seat.touch.touch_surface.borrow().clone();
        if let Some(surface) = touch_surface {
            let hit = self.node_at_coords(lx, ly);
            let (sx, sy) = match &hit.surface {
                Some(under) if under.id() == surface.id() => (hit.sx, hit.sy),
                _ => (lx, ly),
            };
            surface.send_event(crate::shell::SurfaceEvent::TouchMotion {
                id: touch_id,
                sx,
                sy,
            });
        }
    }

    pub fn touch_up(&mut self, seat: &Rc<Seat>, time_msec: u32, touch_id: i32) {
        seat.idle_notify_activity(IdleSource::TOUCH);
        if seat.touch.simulating_pointer_from_touch.get()
            && seat.touch.pointer_touch_id.get() == Some(touch_id)
        {
            self.cursor_button(
                seat,
                &ButtonEvent {
                    time_msec,
                    button: BTN_LEFT,
                    state: ButtonState::Released,
                },
            );
            seat.touch.simulating_pointer_from_touch.set(false);
            seat.touch.pointer_touch_id.set(None);
            return;
        }

        if let Some(surface) = seat.touch.touch_surface.borrow_mut().take() {
            surface.send_event(crate::shell::SurfaceEvent::TouchUp { id: touch_id });
        }
    }

    // }}}

    // {{{ Tablet tools

    pub fn tablet_tool_motion(&mut self, seat: &Rc<Seat>, time_msec: u32, lx: f64, ly: f64) {
        seat.idle_notify_activity(IdleSource::TABLET_TOOL);
        seat.cursor.warp(lx, ly);

        // A drag that started on a tablet surface stays a tablet drag, wherever the tool goes.
        let drag_surface = seat.tablet.down_surface.borrow().clone();
        if let Some(surface) = drag_surface {
            surface.send_event(crate::shell::SurfaceEvent::TabletMotion { sx: lx, sy: ly });
            return;
        }

        let hit = self.node_at_coords(lx, ly);
        let native = hit
            .surface
            .as_ref()
            .is_some_and(|surface| surface.accepts_tablet());
        if native && !seat.tablet.simulating_pointer_from_tool_tip.get() {
            self.seatop_tablet_tool_motion(seat, time_msec);
        } else {
            self.seatop_pointer_motion(seat, time_msec);
        }
    }

    /// Tip down/up. Surfaces that do not accept tablet-v2 get simulated left clicks.
    pub fn tablet_tool_tip(&mut self, seat: &Rc<Seat>, time_msec: u32, down: bool) {
        seat.idle_notify_activity(IdleSource::TABLET_TOOL);
        let (x, y) = seat.cursor.position();
        let hit = self.node_at_coords(x, y);
        let native = hit
            .surface
            .as_ref()
            .is_some_and(|surface| surface.accepts_tablet());

        if down {
            if native {
                *seat.tablet.down_surface.borrow_mut() = hit.surface.clone();
                self.seatop_tablet_tool_tip(seat, time_msec, true);
            } else {
                seat.tablet.simulating_pointer_from_tool_tip.set(true);
                self.cursor_button(
                    seat,
                    &ButtonEvent {
                        time_msec,
                        button: BTN_LEFT,
                        state: ButtonState::Pressed,
                    },
                );
            }
        } else if seat.tablet.simulating_pointer_from_tool_tip.get() {
            seat.tablet.simulating_pointer_from_tool_tip.set(false);
            self.cursor_button(
                seat,
                &ButtonEvent {
                    time_msec,
                    button: BTN_LEFT,
                    state: ButtonState::Released,
                },
            );
        } else {
            let drag_surface = seat.tablet.down_surface.borrow_mut().take();
            if let Some(surface) = drag_surface {
                surface.send_event(crate::shell::SurfaceEvent::TabletTip { down: false });
            } else {
                self.seatop_tablet_tool_tip(seat, time_msec, false);
            }
        }
    }

    /// Tool buttons simulate mouse buttons on surfaces without tablet support.
    pub fn tablet_tool_button(&mut self, seat: &Rc<Seat>, time_msec: u32, pressed: bool) {
        seat.idle_notify_activity(IdleSource::TABLET_TOOL);
        let (x, y) = seat.cursor.position();
        let hit = self.node_at_coords(x, y);
        let native = hit
            .surface
            .as_ref()
            .is_some_and(|surface| surface.accepts_tablet());
        if native {
            return;
        }

        let buttons = seat.tablet.tool_buttons.get();
        if pressed {
            if buttons == 0 {
                self.cursor_button(
                    seat,
                    &ButtonEvent {
                        time_msec,
                        button: BTN_RIGHT,
                        state: ButtonState::Pressed,
                    },
                );
            }
            seat.tablet.tool_buttons.set(buttons + 1);
        } else {
            if buttons == 1 {
                self.cursor_button(
                    seat,
                    &ButtonEvent {
                        time_msec,
                        button: BTN_RIGHT,
                        state: ButtonState::Released,
                    },
                );
            }
            seat.tablet.tool_buttons.set(buttons.saturating_sub(1));
        }
    }

    // }}}

    /// A client asked to change the cursor image. Denied while a seatop that draws its own
    /// feedback is running.
    pub fn handle_set_cursor_request(&mut self, seat: &Rc<Seat>, image: Option<&str>) {
        if !seat.seatop_allows_set_cursor() {
            return;
        }
        seat.cursor.set_image(image);
    }

    // {{{ Keyboard interplay

    /// Record a key event on the seat, forward it to the keyboard focus, and hide the cursor
    /// while typing when configured.
    pub fn keyboard_key(&mut self, seat: &Rc<Seat>, keycode: u32, pressed: bool) {
        seat.idle_notify_activity(IdleSource::KEYBOARD);
        if pressed {
            seat.keyboard.key_pressed(keycode);
        } else {
            seat.keyboard.key_released(keycode);
        }
        if let Some(surface) = seat.keyboard.focused_surface() {
            surface.send_event(crate::shell::SurfaceEvent::Key { keycode, pressed });
        }

        let hide = match self.config.borrow().cursor.hide_when_typing {
            hayward_config::HideCursorWhenTyping::Enable => true,
            hayward_config::HideCursorWhenTyping::Default
            | hayward_config::HideCursorWhenTyping::Disable => false,
        };
        if hide && pressed {
            seat.cursor.set_hidden(true);
        }
    }

    // }}}
}

/// Topmost mapped layer surface of the given layers containing the point.
fn layer_surface_at(
    output: &Rc<Output>,
    layers: &[Layer],
    lx: f64,
    ly: f64,
) -> Option<(Rc<LayerSurface>, Rc<Surface>, f64, f64)> {
    for layer in layers {
        for layer_surface in output.layers_on(*layer).into_iter().rev() {
            if let Some((surface, sx, sy)) = layer_surface.surface_at(lx, ly) {
                return Some((layer_surface, surface, sx, sy));
            }
        }
    }
    None
}

// vim: foldmethod=marker
