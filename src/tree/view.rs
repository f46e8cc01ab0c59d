use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use calloop::RegistrationToken;

use crate::shell::{SavedBuffer, Serial, Surface};
use crate::tree::Window;
use crate::utils::Rect;

/// What shell the client surface speaks. Position-aware clients (X11 style) are reconfigured
/// when their integer-truncated position changes, not only when their size does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewKind {
    Xdg,
    X11,
}

/// Operations the compositor requests from a client surface. Implemented by the backend; test
/// fixtures substitute their own.
pub trait ViewImpl {
    /// Ask the client to adopt a new content rectangle. Returns the configure serial the client
    /// will acknowledge.
    fn configure(&self, x: f64, y: f64, width: f64, height: f64) -> Serial;

    fn set_activated(&self, _activated: bool) {}

    fn set_tiled(&self, _tiled: bool) {}

    fn set_fullscreen(&self, _fullscreen: bool) {}

    fn set_resizing(&self, _resizing: bool) {}

    /// Ask the client to close. The client decides when (and whether) to unmap.
    fn close(&self) {}

    fn close_popups(&self) {}

    /// Whether the client asked to start out floating (dialogs, utility windows).
    fn wants_floating(&self) -> bool {
        false
    }
}

/// Handle to one client surface as the tree sees it.
///
/// A [`View`] outlives map/unmap cycles of its surface but belongs to at most one [`Window`].
pub struct View {
    kind: ViewKind,
    implementation: Box<dyn ViewImpl>,
    window: RefCell<Weak<Window>>,
    surface: RefCell<Option<Rc<Surface>>>,
    /// The window-geometry rectangle: where the visible content sits inside the surface.
    pub geometry: Cell<Rect>,
    saved_geometry: Cell<Rect>,
    /// Size the client prefers when floating.
    natural_width: Cell<f64>,
    natural_height: Cell<f64>,
    urgent: Cell<bool>,
    /// The client draws its own decorations.
    using_csd: Cell<bool>,
    pub(crate) urgent_timer: RefCell<Option<RegistrationToken>>,
    saved_buffers: RefCell<Vec<SavedBuffer>>,
    title: RefCell<Option<String>>,
    /// Transient-for ancestor, for dialog windows.
    parent: RefCell<Weak<Window>>,
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("kind", &self.kind)
            .field("title", &self.title.borrow())
            .finish_non_exhaustive()
    }
}

impl View {
    pub fn new(kind: ViewKind, implementation: Box<dyn ViewImpl>) -> Rc<Self> {
        Rc::new(Self {
            kind,
            implementation,
            window: RefCell::new(Weak::new()),
            surface: RefCell::new(None),
            geometry: Cell::new(Rect::default()),
            saved_geometry: Cell::new(Rect::default()),
            natural_width: Cell::new(0.0),
            natural_height: Cell::new(0.0),
            urgent: Cell::new(false),
            using_csd: Cell::new(false),
            urgent_timer: RefCell::new(None),
            saved_buffers: RefCell::new(Vec::new()),
            title: RefCell::new(None),
            parent: RefCell::new(Weak::new()),
        })
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    pub fn window(&self) -> Option<Rc<Window>> {
        self.window.borrow().upgrade()
    }

    pub(crate) fn set_window(&self, window: &Rc<Window>) {
        *self.window.borrow_mut() = Rc::downgrade(window);
    }

    pub fn surface(&self) -> Option<Rc<Surface>> {
        self.surface.borrow().clone()
    }

    pub fn set_surface(&self, surface: Option<Rc<Surface>>) {
        *self.surface.borrow_mut() = surface;
    }

    pub fn natural_size(&self) -> (f64, f64) {
        (self.natural_width.get(), self.natural_height.get())
    }

    pub fn set_natural_size(&self, width: f64, height: f64) {
        self.natural_width.set(width);
        self.natural_height.set(height);
    }

    pub fn title(&self) -> Option<String> {
        self.title.borrow().clone()
    }

    pub fn set_title(&self, title: Option<String>) {
        *self.title.borrow_mut() = title;
    }

    pub fn transient_parent(&self) -> Option<Rc<Window>> {
        self.parent.borrow().upgrade()
    }

    pub fn set_transient_parent(&self, parent: Option<&Rc<Window>>) {
        *self.parent.borrow_mut() = parent.map_or_else(Weak::new, Rc::downgrade);
    }

    pub fn using_csd(&self) -> bool {
        self.using_csd.get()
    }

    pub fn set_using_csd(&self, using_csd: bool) {
        self.using_csd.set(using_csd);
    }

    pub fn is_urgent(&self) -> bool {
        self.urgent.get()
    }

    pub(crate) fn set_urgent_flag(&self, urgent: bool) {
        self.urgent.set(urgent);
    }

    pub fn configure(&self, x: f64, y: f64, width: f64, height: f64) -> Serial {
        self.implementation.configure(x, y, width, height)
    }

    pub fn set_activated(&self, activated: bool) {
        self.implementation.set_activated(activated);
    }

    pub fn set_tiled(&self, tiled: bool) {
        self.implementation.set_tiled(tiled);
    }

    pub fn set_fullscreen(&self, fullscreen: bool) {
        self.implementation.set_fullscreen(fullscreen);
    }

    pub fn set_resizing(&self, resizing: bool) {
        self.implementation.set_resizing(resizing);
    }

    pub fn close(&self) {
        self.implementation.close();
    }

    pub fn close_popups(&self) {
        self.implementation.close_popups();
    }

    pub fn wants_floating(&self) -> bool {
        self.implementation.wants_floating()
    }

    pub fn send_frame_done(&self) {
        if let Some(surface) = self.surface() {
            surface.send_frame_done();
        }
    }

    pub fn has_saved_buffers(&self) -> bool {
        !self.saved_buffers.borrow().is_empty()
    }

    pub fn saved_buffers(&self) -> Vec<SavedBuffer> {
        self.saved_buffers.borrow().clone()
    }

    pub fn saved_geometry(&self) -> Rect {
        self.saved_geometry.get()
    }

    /// Snapshot the current surface buffer so the presenter can keep showing it while the
    /// client catches up with a resize. The lock is released in `remove_saved_buffers`.
    pub fn save_buffer(&self, surface_x: f64, surface_y: f64) {
        debug_assert!(
            !self.has_saved_buffers(),
            "expected no saved buffers before saving"
        );
        let Some(surface) = self.surface() else {
            return;
        };
        if let Some(buffer) = surface.buffer() {
            let (width, height) = buffer.size();
            self.saved_buffers.borrow_mut().push(SavedBuffer {
                buffer,
                rect: Rect::new(surface_x, surface_y, width, height),
            });
        }
        self.saved_geometry.set(self.geometry.get());
    }

    pub fn remove_saved_buffers(&self) {
        self.saved_buffers.borrow_mut().clear();
    }
}
