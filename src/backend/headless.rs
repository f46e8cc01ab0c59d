//! A headless backend: one virtual output, scripted clients, no rendering.
//!
//! Used when testing the IPC and everything that doesn't require a graphical session. The
//! [`HeadlessClient`] plays the part of a Wayland client: it records every configure the
//! compositor sends and acknowledges them (or refuses to, for timeout tests) under test
//! control.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::shell::{Buffer, ClientId, Serial, Surface};
use crate::state::Server;
use crate::tree::{Output, View, ViewImpl, ViewKind};
use crate::utils::Rect;

pub struct HeadlessData {
    output: Rc<Output>,
}

impl HeadlessData {
    pub fn new(server: &mut Server) -> Self {
        // A dummy output to initiate the tree, which depends on one.
        let output = server.add_output("headless-0", 1920.0, 1080.0);
        Self { output }
    }

    pub fn output(&self) -> &Rc<Output> {
        &self.output
    }
}

/// One recorded configure request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfigureRequest {
    pub rect: Rect,
    pub serial: Serial,
}

/// Scripted stand-in for a Wayland client surface.
#[derive(Debug, Default)]
pub struct HeadlessClient {
    configures: RefCell<Vec<ConfigureRequest>>,
    /// How many configures the client acknowledged so far.
    acked: Cell<usize>,
    activated: Cell<bool>,
    tiled: Cell<bool>,
    fullscreen: Cell<bool>,
    resizing: Cell<bool>,
    close_requested: Cell<bool>,
    popups_closed: Cell<u32>,
    wants_floating: Cell<bool>,
}

impl HeadlessClient {
    pub fn configures(&self) -> Vec<ConfigureRequest> {
        self.configures.borrow().clone()
    }

    pub fn last_configure(&self) -> Option<ConfigureRequest> {
        self.configures.borrow().last().copied()
    }

    pub fn activated(&self) -> bool {
        self.activated.get()
    }

    pub fn tiled(&self) -> bool {
        self.tiled.get()
    }

    pub fn fullscreen(&self) -> bool {
        self.fullscreen.get()
    }

    pub fn resizing(&self) -> bool {
        self.resizing.get()
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested.get()
    }

    pub fn popups_closed(&self) -> u32 {
        self.popups_closed.get()
    }

    pub fn set_wants_floating(&self, wants_floating: bool) {
        self.wants_floating.set(wants_floating);
    }
}

struct HeadlessView {
    client: Rc<HeadlessClient>,
}

impl ViewImpl for HeadlessView {
    fn configure(&self, x: f64, y: f64, width: f64, height: f64) -> Serial {
        let serial = Serial::next();
        self.client.configures.borrow_mut().push(ConfigureRequest {
            rect: Rect::new(x, y, width, height),
            serial,
        });
        serial
    }

    fn set_activated(&self, activated: bool) {
        self.client.activated.set(activated);
    }

    fn set_tiled(&self, tiled: bool) {
        self.client.tiled.set(tiled);
    }

    fn set_fullscreen(&self, fullscreen: bool) {
        self.client.fullscreen.set(fullscreen);
    }

    fn set_resizing(&self, resizing: bool) {
        self.client.resizing.set(resizing);
    }

    fn close(&self) {
        self.client.close_requested.set(true);
    }

    fn close_popups(&self) {
        self.client.popups_closed.set(self.client.popups_closed.get() + 1);
    }

    fn wants_floating(&self) -> bool {
        self.client.wants_floating.get()
    }
}

/// Build a view backed by a scripted client, with a surface already carrying a buffer.
pub fn headless_view(client_id: ClientId) -> (Rc<View>, Rc<HeadlessClient>, Rc<Surface>) {
    let client = Rc::new(HeadlessClient::default());
    let view = View::new(
        ViewKind::Xdg,
        Box::new(HeadlessView {
            client: Rc::clone(&client),
        }),
    );
    let surface = Surface::new(client_id);
    surface.attach_buffer(Buffer::new(0.0, 0.0), 0.0, 0.0);
    view.set_surface(Some(Rc::clone(&surface)));
    (view, client, surface)
}

/// Acknowledge every configure the client has not answered yet, oldest first, committing a
/// buffer of exactly the requested size each time.
pub fn ack_pending_configures(
    server: &mut Server,
    window: &Rc<crate::tree::Window>,
    client: &HeadlessClient,
) {
    let configures = client.configures();
    for configure in &configures[client.acked.get()..] {
        if let Some(surface) = window.surface() {
            surface.attach_buffer(
                Buffer::new(configure.rect.width, configure.rect.height),
                configure.rect.width,
                configure.rect.height,
            );
        }
        server.transaction_notify_ready_by_serial(window, configure.serial);
    }
    client.acked.set(configures.len());
}
