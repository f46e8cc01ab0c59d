use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::shell::Surface;
use crate::tree::Output;
use crate::utils::Rect;

/// The four layer-shell layers, back to front.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Layer {
    Background,
    Bottom,
    Top,
    Overlay,
}

impl Layer {
    pub const ALL: [Layer; 4] = [Layer::Background, Layer::Bottom, Layer::Top, Layer::Overlay];
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyboardInteractivity {
    #[default]
    None,
    Exclusive,
    OnDemand,
}

/// A layer-shell surface anchored to one output.
#[derive(Debug)]
pub struct LayerSurface {
    surface: Rc<Surface>,
    layer: Cell<Layer>,
    keyboard_interactivity: Cell<KeyboardInteractivity>,
    rect: Cell<Rect>,
    mapped: Cell<bool>,
    output: RefCell<Weak<Output>>,
}

impl PartialEq for LayerSurface {
    fn eq(&self, other: &Self) -> bool {
        self.surface.id() == other.surface.id()
    }
}

impl LayerSurface {
    pub fn new(surface: Rc<Surface>, layer: Layer, output: &Rc<Output>, rect: Rect) -> Rc<Self> {
        Rc::new(Self {
            surface,
            layer: Cell::new(layer),
            keyboard_interactivity: Cell::new(KeyboardInteractivity::None),
            rect: Cell::new(rect),
            mapped: Cell::new(true),
            output: RefCell::new(Rc::downgrade(output)),
        })
    }

    pub fn surface(&self) -> &Rc<Surface> {
        &self.surface
    }

    pub fn layer(&self) -> Layer {
        self.layer.get()
    }

    pub fn rect(&self) -> Rect {
        self.rect.get()
    }

    pub fn keyboard_interactivity(&self) -> KeyboardInteractivity {
        self.keyboard_interactivity.get()
    }

    pub fn set_keyboard_interactivity(&self, interactivity: KeyboardInteractivity) {
        self.keyboard_interactivity.set(interactivity);
    }

    pub fn mapped(&self) -> bool {
        self.mapped.get() && self.surface.alive()
    }

    pub fn unmap(&self) {
        self.mapped.set(false);
    }

    pub fn output(&self) -> Option<Rc<Output>> {
        self.output.borrow().upgrade()
    }

    /// Surface-local coordinates for a layout point inside this layer surface.
    pub fn surface_at(&self, lx: f64, ly: f64) -> Option<(Rc<Surface>, f64, f64)> {
        let rect = self.rect.get();
        if !self.mapped() || !rect.contains(lx, ly) {
            return None;
        }
        Some((Rc::clone(&self.surface), lx - rect.x, ly - rect.y))
    }
}
