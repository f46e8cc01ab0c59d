//! Hit testing, seatops, pointer constraints and device lifecycle on the headless backend.

mod common;

use std::cell::Cell;
use std::rc::Rc;

use common::{map_tiled, new_state, settle};
use hayward::input::constraints::{ConstraintKind, PointerConstraint};
use hayward::input::{
    Axis, AxisEvent, ButtonEvent, ButtonState, Capabilities, DeviceConfig, DeviceType,
    InputDevice, BTN_LEFT,
};
use hayward::shell::{ClientId, KeyboardInteractivity, Layer, LayerSurface, Surface, SurfaceEvent};
use hayward::utils::Rect;

fn press(button: u32) -> ButtonEvent {
    ButtonEvent {
        time_msec: 0,
        button,
        state: ButtonState::Pressed,
    }
}

fn release(button: u32) -> ButtonEvent {
    ButtonEvent {
        time_msec: 0,
        button,
        state: ButtonState::Released,
    }
}

#[test]
fn hit_test_finds_the_window_under_the_point() {
    let (_event_loop, mut state) = new_state();

    let (a, ca) = map_tiled(&mut state, 1);
    let (b, cb) = map_tiled(&mut state, 2);
    settle(&mut state, &[(&a, &ca), (&b, &cb)]);

    // A sits in the top half of the column, B in the bottom half.
    let hit = state.server.node_at_coords(960.0, 200.0);
    assert_eq!(hit.window, Some(a.clone()));
    assert!(hit.surface.is_some());

    let hit = state.server.node_at_coords(960.0, 900.0);
    assert_eq!(hit.window, Some(b.clone()));

    // Outside every output nothing is hit.
    let hit = state.server.node_at_coords(-10.0, -10.0);
    assert!(hit.output.is_none());
    assert!(hit.window.is_none());
}

#[test]
fn overlay_layer_takes_precedence_over_windows() {
    let (_event_loop, mut state) = new_state();

    let (a, ca) = map_tiled(&mut state, 1);
    settle(&mut state, &[(&a, &ca)]);

    let output = state.server.root.active_output().unwrap();
    let surface = Surface::new(ClientId(99));
    let layer_surface = LayerSurface::new(
        Rc::clone(&surface),
        Layer::Overlay,
        &output,
        Rect::new(0.0, 0.0, 400.0, 300.0),
    );
    output.add_layer_surface(Rc::clone(&layer_surface));

    let hit = state.server.node_at_coords(100.0, 100.0);
    assert_eq!(hit.layer, Some(layer_surface.clone()));
    assert_eq!(hit.window, None);
    assert_eq!(hit.surface.as_ref().map(|surface| surface.id()), Some(surface.id()));
    assert_eq!(hit.sx, 100.0);
    assert_eq!(hit.sy, 100.0);

    // Beside the layer surface the window is hit again.
    let hit = state.server.node_at_coords(960.0, 540.0);
    assert_eq!(hit.window, Some(a.clone()));

    // An unmapped layer surface stops hitting.
    layer_surface.unmap();
    let hit = state.server.node_at_coords(100.0, 100.0);
    assert_eq!(hit.layer, None);
    assert_eq!(hit.window, Some(a.clone()));

    output.remove_layer_surface(&layer_surface);
    assert!(output.layers_on(Layer::Overlay).is_empty());
    surface.destroy();
    assert!(!surface.alive());
}

#[test]
fn click_focuses_and_forwards_to_the_surface() {
    let (_event_loop, mut state) = new_state();
    let seat = state.server.input.current_seat();

    let (a, ca) = map_tiled(&mut state, 1);
    let (b, cb) = map_tiled(&mut state, 2);
    settle(&mut state, &[(&a, &ca), (&b, &cb)]);
    assert_eq!(seat.focused_window(), Some(b.clone()));

    // Click the middle of A's content.
    state.server.cursor_move_absolute(&seat, 0, 960.0, 200.0);
    a.surface().unwrap().take_events();
    b.surface().unwrap().take_events();
    state.server.cursor_button(&seat, &press(BTN_LEFT));

    assert_eq!(seat.focused_window(), Some(a.clone()));
    let events = a.surface().unwrap().take_events();
    assert!(events.contains(&SurfaceEvent::PointerButton {
        button: BTN_LEFT,
        pressed: true,
    }));

    // While the button is down, motion goes to A even outside it.
    state.server.cursor_move_absolute(&seat, 0, 960.0, 900.0);
    let events = a.surface().unwrap().take_events();
    assert!(events
        .iter()
        .any(|event| matches!(event, SurfaceEvent::PointerMotion { .. })));
    assert!(b.surface().unwrap().take_events().is_empty());

    state.server.cursor_button(&seat, &release(BTN_LEFT));
    let events = a.surface().unwrap().take_events();
    assert!(events.contains(&SurfaceEvent::PointerButton {
        button: BTN_LEFT,
        pressed: false,
    }));
}

#[test]
fn axis_goes_to_the_surface_under_the_cursor() {
    let (_event_loop, mut state) = new_state();
    let seat = state.server.input.current_seat();

    let (a, ca) = map_tiled(&mut state, 1);
    settle(&mut state, &[(&a, &ca)]);

    state.server.cursor_move_absolute(&seat, 0, 960.0, 540.0);
    a.surface().unwrap().take_events();

    state.server.cursor_axis(
        &seat,
        &AxisEvent {
            time_msec: 0,
            orientation: Axis::Vertical,
            delta: 15.0,
        },
    );
    let events = a.surface().unwrap().take_events();
    assert!(events.contains(&SurfaceEvent::PointerAxis {
        horizontal: false,
        delta: 15.0,
    }));
}

#[test]
fn locked_pointer_discards_motion_and_warps_to_hint_on_release() {
    let (_event_loop, mut state) = new_state();
    let seat = state.server.input.current_seat();

    let (a, ca) = map_tiled(&mut state, 1);
    settle(&mut state, &[(&a, &ca)]);
    let surface = a.surface().unwrap();

    // Give the surface pointer focus first.
    state.server.cursor_move_absolute(&seat, 0, 960.0, 540.0);

    let constraint = PointerConstraint::new(Rc::clone(&surface), ConstraintKind::Locked);
    constraint.set_cursor_hint(Some((10.0, 20.0)));
    state.server.add_pointer_constraint(Rc::clone(&constraint));

    // The first motion activates the lock; every delta after that is discarded.
    state.server.cursor_motion(&seat, 0, 5.0, 5.0);
    let locked_position = seat.cursor.position();
    state.server.cursor_motion(&seat, 0, 50.0, 50.0);
    assert_eq!(seat.cursor.position(), locked_position);

    surface.take_events();
    state.server.destroy_pointer_constraint(&seat, &constraint);

    let content = a.current.borrow().content;
    let geometry = a.view().geometry.get();
    assert_eq!(
        seat.cursor.position(),
        (content.x - geometry.x + 10.0, content.y - geometry.y + 20.0),
        "cursor warps to the hint"
    );
    assert!(
        !surface
            .take_events()
            .iter()
            .any(|event| matches!(event, SurfaceEvent::PointerMotion { .. })),
        "no synthetic motion after the warp"
    );
}

#[test]
fn touch_without_touch_support_simulates_a_pointer() {
    let (_event_loop, mut state) = new_state();
    let seat = state.server.input.current_seat();

    let (a, ca) = map_tiled(&mut state, 1);
    settle(&mut state, &[(&a, &ca)]);
    let surface = a.surface().unwrap();

    state.server.touch_down(&seat, 0, 7, 960.0, 540.0);
    assert!(seat.touch.simulating_pointer_from_touch.get());
    assert_eq!(seat.touch.pointer_touch_id.get(), Some(7));
    assert!(surface.take_events().contains(&SurfaceEvent::PointerButton {
        button: BTN_LEFT,
        pressed: true,
    }));

    state.server.touch_motion(&seat, 0, 7, 970.0, 550.0);
    assert_eq!(seat.cursor.position(), (970.0, 550.0));

    state.server.touch_up(&seat, 0, 7);
    assert!(!seat.touch.simulating_pointer_from_touch.get());
    assert_eq!(seat.touch.pointer_touch_id.get(), None);
}

#[test]
fn tablet_tip_simulates_left_button_on_plain_surfaces() {
    let (_event_loop, mut state) = new_state();
    let seat = state.server.input.current_seat();

    let (a, ca) = map_tiled(&mut state, 1);
    settle(&mut state, &[(&a, &ca)]);
    let surface = a.surface().unwrap();
    assert!(!surface.accepts_tablet());

    state.server.tablet_tool_motion(&seat, 0, 960.0, 540.0);
    surface.take_events();

    state.server.tablet_tool_tip(&seat, 0, true);
    assert!(seat.tablet.simulating_pointer_from_tool_tip.get());
    assert!(surface.take_events().contains(&SurfaceEvent::PointerButton {
        button: BTN_LEFT,
        pressed: true,
    }));

    state.server.tablet_tool_tip(&seat, 0, false);
    assert!(!seat.tablet.simulating_pointer_from_tool_tip.get());
}

#[test]
fn typing_hides_the_cursor_when_configured() {
    let (_event_loop, mut state) = new_state();
    let seat = state.server.input.current_seat();

    state.server.config.borrow_mut().cursor.hide_when_typing =
        hayward_config::HideCursorWhenTyping::Enable;

    state.server.keyboard_key(&seat, 30, true);
    assert!(seat.cursor.is_hidden());

    state.server.cursor_motion(&seat, 0, 1.0, 0.0);
    assert!(!seat.cursor.is_hidden());
    state.server.keyboard_key(&seat, 30, false);
}

#[derive(Default)]
struct RecordingKnobs {
    tap: Cell<Option<bool>>,
    natural_scroll: Cell<Option<bool>>,
    accel_speed: Cell<Option<f64>>,
}

struct RecordingKnobsHandle(Rc<RecordingKnobs>);

impl DeviceConfig for RecordingKnobsHandle {
    fn set_tap_enabled(&self, enabled: bool) {
        self.0.tap.set(Some(enabled));
    }

    fn set_natural_scroll(&self, enabled: bool) {
        self.0.natural_scroll.set(Some(enabled));
    }

    fn set_accel_speed(&self, speed: f64) {
        self.0.accel_speed.set(Some(speed));
    }
}

#[test]
fn device_lifecycle_aggregates_capabilities() {
    let (_event_loop, mut state) = new_state();
    let seat = state.server.input.current_seat();
    assert_eq!(seat.capabilities(), Capabilities::empty());

    let knobs = Rc::new(RecordingKnobs::default());
    {
        let mut config = state.server.config.borrow_mut();
        let mut device_config = hayward_config::DeviceConfig::default();
        device_config.tap = Some(true);
        device_config.natural_scroll = Some(true);
        device_config.accel_speed = Some(0.5);
        config
            .input
            .devices
            .insert(String::from("2:7:SynPS/2_Synaptics_TouchPad"), device_config);
    }

    let touchpad = InputDevice::new(
        "2:7:SynPS/2_Synaptics_TouchPad",
        DeviceType::Pointer,
        Box::new(RecordingKnobsHandle(Rc::clone(&knobs))),
    );
    state.server.add_input_device(Rc::clone(&touchpad));

    assert!(seat.capabilities().contains(Capabilities::POINTER));
    assert_eq!(seat.cursor.image(), Some(String::from("left_ptr")));
    assert_eq!(knobs.tap.get(), Some(true));
    assert_eq!(knobs.natural_scroll.get(), Some(true));
    assert_eq!(knobs.accel_speed.get(), Some(0.5));

    let keyboard = InputDevice::new(
        "1:1:AT_Translated_Set_2_keyboard",
        DeviceType::Keyboard,
        Box::new(RecordingKnobsHandle(Rc::new(RecordingKnobs::default()))),
    );
    state.server.add_input_device(Rc::clone(&keyboard));
    assert!(seat
        .capabilities()
        .contains(Capabilities::POINTER | Capabilities::KEYBOARD));

    state.server.remove_input_device(&touchpad);
    assert_eq!(seat.capabilities(), Capabilities::KEYBOARD);
    assert_eq!(seat.cursor.image(), None, "losing the pointer clears the cursor");
}

#[test]
fn builtin_touch_devices_map_to_the_builtin_output() {
    let (_event_loop, mut state) = new_state();
    state.server.add_output("eDP-1", 1280.0, 800.0);

    let touch = InputDevice::new(
        "9:9:Touchscreen",
        DeviceType::Touch,
        Box::new(RecordingKnobsHandle(Rc::new(RecordingKnobs::default()))),
    );
    state.server.add_input_device(Rc::clone(&touch));

    assert_eq!(touch.output_name(), Some(String::from("eDP-1")));
}

#[test]
fn on_demand_layer_surface_takes_keyboard_focus_on_click() {
    let (_event_loop, mut state) = new_state();
    let seat = state.server.input.current_seat();

    let (a, ca) = map_tiled(&mut state, 1);
    settle(&mut state, &[(&a, &ca)]);

    let output = state.server.root.active_output().unwrap();
    let surface = Surface::new(ClientId(42));
    let layer_surface = LayerSurface::new(
        Rc::clone(&surface),
        Layer::Top,
        &output,
        Rect::new(0.0, 0.0, 1920.0, 30.0),
    );
    layer_surface.set_keyboard_interactivity(KeyboardInteractivity::OnDemand);
    output.add_layer_surface(Rc::clone(&layer_surface));

    state.server.cursor_move_absolute(&seat, 0, 10.0, 10.0);
    state.server.cursor_button(&seat, &press(BTN_LEFT));

    assert_eq!(seat.focused_layer(), Some(layer_surface.clone()));
    assert_eq!(
        seat.keyboard.focused_surface().map(|surface| surface.id()),
        Some(surface.id())
    );

    // Clearing the layer restores the window focus.
    state.server.cursor_button(&seat, &release(BTN_LEFT));
    state.server.seat_set_focus_layer(&seat, None);
    assert_eq!(seat.focused_window(), Some(a.clone()));
}
