//! Input device lifecycle and seatop dispatch.
//!
//! The [`InputManager`] owns every seat and every input device. Devices are opaque handles
//! from the input backend; per-device configuration is applied through the [`DeviceConfig`]
//! trait when a device appears and again on configuration reload. Device add/remove updates
//! the owning seat's capability set.

pub mod constraints;
pub mod cursor;
pub mod cursor_theme;
pub mod seat;
pub mod seatop;

use std::cell::RefCell;
use std::rc::Rc;

use hayward_config::SendEvents;

pub use cursor::HitResult;
pub use seat::{Capabilities, IdleSource, Seat};
pub use seatop::SeatOp;

use crate::state::Server;
use crate::tree::Root;
use self::cursor_theme::CursorThemeManager;

pub const DEFAULT_SEAT_NAME: &str = "seat0";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceType {
    Keyboard,
    Pointer,
    Touch,
    TabletTool,
    TabletPad,
    Switch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

#[derive(Clone, Copy, Debug)]
pub struct ButtonEvent {
    pub time_msec: u32,
    pub button: u32,
    pub state: ButtonState,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

#[derive(Clone, Copy, Debug)]
pub struct AxisEvent {
    pub time_msec: u32,
    pub orientation: Axis,
    pub delta: f64,
}

pub const BTN_LEFT: u32 = 0x110;
pub const BTN_RIGHT: u32 = 0x111;

bitflags::bitflags! {
    /// Which window edges an interactive resize drags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ResizeEdge: u8 {
        const TOP = 1 << 0;
        const BOTTOM = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
    }
}

/// Libinput-style configuration knobs, exposed by the input backend as an opaque handle.
///
/// Every setter is best-effort: devices reject knobs they do not support and the manager moves
/// on.
pub trait DeviceConfig {
    fn set_tap_enabled(&self, _enabled: bool) {}
    fn set_tap_button_map(&self, _map: hayward_config::TapButtonMap) {}
    fn set_drag_enabled(&self, _enabled: bool) {}
    fn set_drag_lock(&self, _enabled: bool) {}
    fn set_natural_scroll(&self, _enabled: bool) {}
    fn set_accel_profile(&self, _profile: hayward_config::AccelProfile) {}
    fn set_accel_speed(&self, _speed: f64) {}
    fn set_click_method(&self, _method: hayward_config::ClickMethod) {}
    fn set_scroll_method(&self, _method: hayward_config::ScrollMethod) {}
    fn set_scroll_button(&self, _button: u32) {}
    fn set_middle_emulation(&self, _enabled: bool) {}
    fn set_disable_while_typing(&self, _enabled: bool) {}
    fn set_left_handed(&self, _enabled: bool) {}
    fn set_send_events(&self, _mode: SendEvents) {}
    fn set_calibration_matrix(&self, _matrix: [f32; 6]) {}
}

/// One input device known to the compositor.
pub struct InputDevice {
    identifier: String,
    device_type: DeviceType,
    config: Box<dyn DeviceConfig>,
    /// Output this device is mapped to, when restricted.
    output_name: RefCell<Option<String>>,
}

impl std::fmt::Debug for InputDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputDevice")
            .field("identifier", &self.identifier)
            .field("device_type", &self.device_type)
            .field("output_name", &self.output_name.borrow())
            .finish_non_exhaustive()
    }
}

impl InputDevice {
    pub fn new(
        identifier: impl Into<String>,
        device_type: DeviceType,
        config: Box<dyn DeviceConfig>,
    ) -> Rc<Self> {
        Rc::new(Self {
            identifier: identifier.into(),
            device_type,
            config,
            output_name: RefCell::new(None),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn output_name(&self) -> Option<String> {
        self.output_name.borrow().clone()
    }

    pub fn map_to_output(&self, output_name: Option<String>) {
        *self.output_name.borrow_mut() = output_name;
    }
}

/// Owns every seat and input device.
#[derive(Debug)]
pub struct InputManager {
    pub seats: Vec<Rc<Seat>>,
    devices: Vec<Rc<InputDevice>>,
    pub cursor_theme: CursorThemeManager,
}

impl InputManager {
    pub fn new(root: &Rc<Root>) -> Self {
        let cursor_theme = CursorThemeManager::new(&root.config().borrow().cursor);
        Self {
            seats: vec![Seat::new(DEFAULT_SEAT_NAME, root)],
            devices: Vec::new(),
            cursor_theme,
        }
    }

    /// The seat input events are attributed to. Multi-seat configurations would route by
    /// device; with one seat this is it.
    pub fn current_seat(&self) -> Rc<Seat> {
        Rc::clone(&self.seats[0])
    }
}

impl Server {
    pub fn add_input_device(&mut self, device: Rc<InputDevice>) {
        info!(
            identifier = device.identifier(),
            device_type = ?device.device_type(),
            "Adding input device"
        );
        self.apply_device_config(&device);
        self.input.devices.push(Rc::clone(&device));

        let seat = self.input.current_seat();
        seat.add_device(&device);
        self.seat_update_capabilities(&seat);
    }

    pub fn remove_input_device(&mut self, device: &Rc<InputDevice>) {
        info!(identifier = device.identifier(), "Removing input device");
        self.input
            .devices
            .retain(|other| other.identifier() != device.identifier());

        let seat = self.input.current_seat();
        seat.remove_device(device);
        self.seat_update_capabilities(&seat);
    }

    /// Re-apply per-device configuration, for example after a config reload.
    pub fn reconfigure_input_devices(&mut self) {
        let devices = self.input.devices.clone();
        for device in &devices {
            self.apply_device_config(device);
        }
        self.input
            .cursor_theme
            .reload(&self.config.borrow().cursor);
    }

    fn apply_device_config(&mut self, device: &Rc<InputDevice>) {
        let config = self.config.borrow();
        let device_config = config
            .input
            .devices
            .get(device.identifier())
            .unwrap_or(&config.input.default_device)
            .clone();
        drop(config);

        let knobs = &device.config;
        if let Some(tap) = device_config.tap {
            knobs.set_tap_enabled(tap);
        }
        if let Some(map) = device_config.tap_button_map {
            knobs.set_tap_button_map(map);
        }
        if let Some(drag) = device_config.drag {
            knobs.set_drag_enabled(drag);
        }
        if let Some(drag_lock) = device_config.drag_lock {
            knobs.set_drag_lock(drag_lock);
        }
        if let Some(natural_scroll) = device_config.natural_scroll {
            knobs.set_natural_scroll(natural_scroll);
        }
        if let Some(profile) = device_config.accel_profile {
            knobs.set_accel_profile(profile);
        }
        if let Some(speed) = device_config.accel_speed {
            knobs.set_accel_speed(speed.clamp(-1.0, 1.0));
        }
        if let Some(method) = device_config.click_method {
            knobs.set_click_method(method);
        }
        if let Some(method) = device_config.scroll_method {
            knobs.set_scroll_method(method);
        }
        if let Some(button) = device_config.scroll_button {
            knobs.set_scroll_button(button);
        }
        if let Some(middle_emulation) = device_config.middle_emulation {
            knobs.set_middle_emulation(middle_emulation);
        }
        if let Some(dwt) = device_config.disable_while_typing {
            knobs.set_disable_while_typing(dwt);
        }
        if let Some(left_handed) = device_config.left_handed {
            knobs.set_left_handed(left_handed);
        }
        if let Some(events) = device_config.events {
            knobs.set_send_events(events);
        }
        if let Some(matrix) = device_config.calibration_matrix {
            knobs.set_calibration_matrix(matrix);
        }

        // Built-in touch and tablet devices follow the built-in panel unless mapped explicitly.
        let mapped = device_config.map_to_output.clone().or_else(|| {
            if matches!(
                device.device_type(),
                DeviceType::Touch | DeviceType::TabletTool
            ) {
                self.builtin_output_name()
            } else {
                None
            }
        });
        device.map_to_output(mapped);
    }

    /// Name of the built-in output, if there is exactly one.
    fn builtin_output_name(&self) -> Option<String> {
        let outputs = self.root.outputs();
        let mut builtin = outputs.iter().filter(|output| output.is_builtin());
        let first = builtin.next()?;
        if builtin.next().is_some() {
            return None;
        }
        Some(first.name().to_string())
    }

    /// Recompute the seat capability set as the union over its devices. Losing the pointer
    /// capability clears the cursor image; gaining it restores the default.
    pub fn seat_update_capabilities(&mut self, seat: &Rc<Seat>) {
        let mut capabilities = Capabilities::empty();
        for device in seat.devices().iter() {
            capabilities |= match device.device_type() {
                DeviceType::Keyboard => Capabilities::KEYBOARD,
                DeviceType::Pointer => Capabilities::POINTER,
                DeviceType::Touch => Capabilities::TOUCH,
                // Tablet tools are presented to clients as pointer emulation.
                DeviceType::TabletTool => Capabilities::POINTER | Capabilities::TABLET_TOOL,
                DeviceType::TabletPad | DeviceType::Switch => Capabilities::empty(),
            };
        }

        let previous = seat.capabilities();
        seat.set_capabilities(capabilities);

        let had_pointer = previous.contains(Capabilities::POINTER);
        let has_pointer = capabilities.contains(Capabilities::POINTER);
        if had_pointer && !has_pointer {
            seat.cursor.set_image(None);
        } else if !had_pointer && has_pointer {
            seat.cursor.set_image(Some("left_ptr"));
        }
    }
}
