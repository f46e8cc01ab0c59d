use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// A rectangle in layout coordinates.
///
/// Window geometry is fractional since interactive resizes produce sub-pixel positions; the
/// integer truncation rules for position-aware clients live at the configure boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);
        if right <= x || bottom <= y {
            return None;
        }
        Some(Rect::new(x, y, right - x, bottom - y))
    }

    /// The point inside the rectangle closest to `(x, y)`.
    pub fn closest_point(&self, x: f64, y: f64) -> (f64, f64) {
        let cx = x.clamp(self.x, self.x + self.width);
        let cy = y.clamp(self.y, self.y + self.height);
        (cx, cy)
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// A cardinal direction, for movement and directional focus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Monotonic time since compositor start.
pub fn get_monotonic_time() -> Duration {
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}

/// A single-threaded broadcast signal.
///
/// Entities publish a small set of named signals and consumers subscribe with closures carrying
/// their own state. Emission snapshots the subscriber list first so that a callback may
/// subscribe or unsubscribe without invalidating the iteration.
pub struct Signal<T> {
    next_id: Cell<u64>,
    subscribers: RefCell<Vec<(u64, Rc<dyn Fn(&T)>)>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Subscription(u64);

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(0),
            subscribers: RefCell::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.subscribers.borrow_mut().push((id, Rc::new(callback)));
        Subscription(id)
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        self.subscribers
            .borrow_mut()
            .retain(|(id, _)| *id != subscription.0);
    }

    pub fn emit(&self, value: &T) {
        let snapshot: Vec<_> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();
        for callback in snapshot {
            callback(value);
        }
    }
}

impl<T> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("subscribers", &self.subscribers.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_intersection() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(50.0, 50.0, 100.0, 100.0);
        assert_eq!(a.intersection(&b), Some(Rect::new(50.0, 50.0, 50.0, 50.0)));

        let c = Rect::new(200.0, 0.0, 10.0, 10.0);
        assert_eq!(a.intersection(&c), None);
    }

    #[test]
    fn rect_closest_point() {
        let rect = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert_eq!(rect.closest_point(0.0, 0.0), (10.0, 10.0));
        assert_eq!(rect.closest_point(15.0, 40.0), (15.0, 30.0));
        assert_eq!(rect.closest_point(15.0, 15.0), (15.0, 15.0));
    }

    #[test]
    fn signal_reentrant_unsubscribe() {
        let signal: Rc<Signal<u32>> = Rc::new(Signal::new());
        let hits = Rc::new(Cell::new(0));

        let hits2 = Rc::clone(&hits);
        signal.subscribe(move |value| {
            hits2.set(hits2.get() + value);
        });

        signal.emit(&2);
        signal.emit(&3);
        assert_eq!(hits.get(), 5);
    }
}
