//! Client-facing collaborator types.
//!
//! The compositor toolkit owns the wire protocol; the core only manipulates these handles. A
//! [`Surface`] stands for one client surface, a [`Buffer`] for one client buffer with
//! lock/unlock reference counting. Both are populated by the active backend (or by test
//! fixtures) and consumed by the tree and input engines.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

pub mod layer;

pub use layer::{KeyboardInteractivity, Layer, LayerSurface};

use crate::utils::Rect;

static SERIALS: AtomicU32 = AtomicU32::new(1);

/// A configure serial handed to a client, later matched against its acknowledgment.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct Serial(u32);

impl Serial {
    pub fn next() -> Self {
        Self(SERIALS.fetch_add(1, Ordering::SeqCst))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

/// Identifies the client owning a surface. Used for exclusive-client input filtering.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct ClientId(pub u64);

static SURFACE_IDS: AtomicU64 = AtomicU64::new(0);

/// An input event delivered to a client surface.
///
/// The wire encoding belongs to the toolkit; the core records what it sent, which is also what
/// the test suites assert on.
#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceEvent {
    PointerEnter { sx: f64, sy: f64 },
    PointerLeave,
    PointerMotion { sx: f64, sy: f64 },
    PointerButton { button: u32, pressed: bool },
    PointerAxis { horizontal: bool, delta: f64 },
    TouchDown { id: i32, sx: f64, sy: f64 },
    TouchMotion { id: i32, sx: f64, sy: f64 },
    TouchUp { id: i32 },
    TabletTip { down: bool },
    TabletMotion { sx: f64, sy: f64 },
    KeyboardEnter { pressed: Vec<u32> },
    KeyboardLeave,
    Key { keycode: u32, pressed: bool },
}

/// One client surface.
#[derive(Debug)]
pub struct Surface {
    id: u64,
    client: ClientId,
    buffer: RefCell<Option<Buffer>>,
    /// Size of the currently committed buffer in layout coordinates.
    size: Cell<(f64, f64)>,
    accepts_tablet: Cell<bool>,
    accepts_touch: Cell<bool>,
    alive: Cell<bool>,
    /// How many frame-done callbacks were sent. Clients use these to schedule repaints; tests
    /// use the counter to observe commit behaviour.
    frame_done_count: Cell<u32>,
    entered_outputs: RefCell<Vec<u64>>,
    events: RefCell<Vec<SurfaceEvent>>,
}

impl PartialEq for Surface {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Surface {
    pub fn new(client: ClientId) -> Rc<Self> {
        Rc::new(Self {
            id: SURFACE_IDS.fetch_add(1, Ordering::SeqCst),
            client,
            buffer: RefCell::new(None),
            size: Cell::new((0.0, 0.0)),
            accepts_tablet: Cell::new(false),
            accepts_touch: Cell::new(false),
            alive: Cell::new(true),
            frame_done_count: Cell::new(0),
            entered_outputs: RefCell::new(Vec::new()),
            events: RefCell::new(Vec::new()),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn client(&self) -> ClientId {
        self.client
    }

    pub fn alive(&self) -> bool {
        self.alive.get()
    }

    pub fn destroy(&self) {
        self.alive.set(false);
        *self.buffer.borrow_mut() = None;
    }

    pub fn size(&self) -> (f64, f64) {
        self.size.get()
    }

    /// Attach a buffer, as if the client committed one.
    pub fn attach_buffer(&self, buffer: Buffer, width: f64, height: f64) {
        *self.buffer.borrow_mut() = Some(buffer);
        self.size.set((width, height));
    }

    pub fn has_buffer(&self) -> bool {
        self.buffer.borrow().is_some()
    }

    pub fn buffer(&self) -> Option<Buffer> {
        self.buffer.borrow().clone()
    }

    pub fn set_accepts_tablet(&self, accepts: bool) {
        self.accepts_tablet.set(accepts);
    }

    pub fn accepts_tablet(&self) -> bool {
        self.accepts_tablet.get()
    }

    pub fn set_accepts_touch(&self, accepts: bool) {
        self.accepts_touch.set(accepts);
    }

    pub fn accepts_touch(&self) -> bool {
        self.accepts_touch.get()
    }

    pub fn send_frame_done(&self) {
        self.frame_done_count.set(self.frame_done_count.get() + 1);
    }

    pub fn frame_done_count(&self) -> u32 {
        self.frame_done_count.get()
    }

    pub fn send_enter(&self, output_id: u64) {
        let mut entered = self.entered_outputs.borrow_mut();
        if !entered.contains(&output_id) {
            entered.push(output_id);
        }
    }

    pub fn send_leave(&self, output_id: u64) {
        self.entered_outputs
            .borrow_mut()
            .retain(|id| *id != output_id);
    }

    pub fn entered_outputs(&self) -> Vec<u64> {
        self.entered_outputs.borrow().clone()
    }

    pub fn send_event(&self, event: SurfaceEvent) {
        if self.alive.get() {
            self.events.borrow_mut().push(event);
        }
    }

    /// Drain the recorded event log.
    pub fn take_events(&self) -> Vec<SurfaceEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

static BUFFER_IDS: AtomicU64 = AtomicU64::new(0);

/// A client buffer handle with lock/unlock reference counting.
///
/// Cloning a [`Buffer`] locks it; dropping a clone unlocks it. The backing storage is released
/// once every lock is gone, which is what lets a window keep showing stale content while a
/// transaction waits for the client to catch up.
#[derive(Clone, Debug)]
pub struct Buffer {
    inner: Rc<BufferInner>,
}

#[derive(Debug)]
struct BufferInner {
    id: u64,
    width: f64,
    height: f64,
}

impl Buffer {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            inner: Rc::new(BufferInner {
                id: BUFFER_IDS.fetch_add(1, Ordering::SeqCst),
                width,
                height,
            }),
        }
    }

    pub fn size(&self) -> (f64, f64) {
        (self.inner.width, self.inner.height)
    }

    /// Number of outstanding locks, counting this one.
    pub fn lock_count(&self) -> usize {
        Rc::strong_count(&self.inner)
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

/// A snapshot of a surface buffer taken when a transaction commits, rendered in place of live
/// content until the client acknowledges its new size.
#[derive(Clone, Debug)]
pub struct SavedBuffer {
    pub buffer: Buffer,
    pub rect: Rect,
}

/// A popup surface positioned relative to a parent window.
#[derive(Debug)]
pub struct Popup {
    pub surface: Rc<Surface>,
    pub parent: RefCell<std::rc::Weak<crate::tree::Window>>,
    /// Offset of the popup relative to the parent window content rectangle.
    pub offset: Cell<(f64, f64)>,
}

impl Popup {
    pub fn new(
        surface: Rc<Surface>,
        parent: &Rc<crate::tree::Window>,
        offset: (f64, f64),
    ) -> Rc<Self> {
        Rc::new(Self {
            surface,
            parent: RefCell::new(Rc::downgrade(parent)),
            offset: Cell::new(offset),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_lock_counting() {
        let buffer = Buffer::new(64.0, 64.0);
        assert_eq!(buffer.lock_count(), 1);
        let lock = buffer.clone();
        assert_eq!(buffer.lock_count(), 2);
        drop(lock);
        assert_eq!(buffer.lock_count(), 1);
    }

    #[test]
    fn surface_output_tracking() {
        let surface = Surface::new(ClientId(1));
        surface.send_enter(3);
        surface.send_enter(3);
        surface.send_enter(7);
        assert_eq!(surface.entered_outputs(), vec![3, 7]);
        surface.send_leave(3);
        assert_eq!(surface.entered_outputs(), vec![7]);
    }
}
