//! Pointer constraints: clients may confine the cursor to a region of their surface or lock it
//! in place entirely.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::input::Seat;
use crate::shell::Surface;
use crate::state::Server;
use crate::utils::Rect;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Motion is clipped against the region.
    Confined,
    /// Motion deltas are discarded while the constraint is active.
    Locked,
}

/// A confinement or lock installed by a client on one of its surfaces.
#[derive(Debug)]
pub struct PointerConstraint {
    surface: Rc<Surface>,
    kind: ConstraintKind,
    /// Region in surface-local coordinates. Empty means the whole surface.
    region: RefCell<Vec<Rect>>,
    /// Where the client wants the cursor to end up when a lock is released, surface-local.
    cursor_hint: Cell<Option<(f64, f64)>>,
}

impl PartialEq for PointerConstraint {
    fn eq(&self, other: &Self) -> bool {
        self.surface.id() == other.surface.id() && self.kind == other.kind
    }
}

impl PointerConstraint {
    pub fn new(surface: Rc<Surface>, kind: ConstraintKind) -> Rc<Self> {
        Rc::new(Self {
            surface,
            kind,
            region: RefCell::new(Vec::new()),
            cursor_hint: Cell::new(None),
        })
    }

    pub fn surface(&self) -> &Rc<Surface> {
        &self.surface
    }

    pub fn kind(&self) -> ConstraintKind {
        self.kind
    }

    pub fn set_region(&self, region: Vec<Rect>) {
        *self.region.borrow_mut() = region;
    }

    pub fn set_cursor_hint(&self, hint: Option<(f64, f64)>) {
        self.cursor_hint.set(hint);
    }

    pub fn cursor_hint(&self) -> Option<(f64, f64)> {
        self.cursor_hint.get()
    }

    /// Whether the surface-local point satisfies the region.
    pub fn region_contains(&self, sx: f64, sy: f64) -> bool {
        let region = self.region.borrow();
        if region.is_empty() {
            let (width, height) = self.surface.size();
            return sx >= 0.0 && sy >= 0.0 && sx < width && sy < height;
        }
        region.iter().any(|rect| rect.contains(sx, sy))
    }

    /// Clamp a surface-local point into the region.
    pub fn clamp_to_region(&self, sx: f64, sy: f64) -> (f64, f64) {
        let region = self.region.borrow();
        if region.is_empty() {
            let (width, height) = self.surface.size();
            return Rect::new(0.0, 0.0, width, height).closest_point(sx, sy);
        }
        region
            .iter()
            .map(|rect| rect.closest_point(sx, sy))
            .min_by(|(ax, ay), (bx, by)| {
                let da = (ax - sx).powi(2) + (ay - sy).powi(2);
                let db = (bx - sx).powi(2) + (by - sy).powi(2);
                da.partial_cmp(&db).expect("distances are finite")
            })
            .expect("non-empty region")
    }
}

impl Server {
    /// Install a constraint. It takes effect as soon as the cursor is over its surface.
    pub fn add_pointer_constraint(&mut self, constraint: Rc<PointerConstraint>) {
        self.pointer_constraints.push(constraint);
    }

    /// Remove a constraint. Releasing a lock whose client provided a cursor-position hint warps
    /// the cursor there, without any synthetic motion event.
    pub fn destroy_pointer_constraint(&mut self, seat: &Rc<Seat>, constraint: &Rc<PointerConstraint>) {
        self.pointer_constraints
            .retain(|other| !Rc::ptr_eq(other, constraint));

        let active = seat
            .cursor
            .active_constraint()
            .is_some_and(|active| Rc::ptr_eq(&active, constraint));
        if !active {
            return;
        }
        seat.cursor.set_active_constraint(None);

        if constraint.kind() == ConstraintKind::Locked {
            if let Some((hint_x, hint_y)) = constraint.cursor_hint() {
                if let Some(window) = self
                    .root
                    .find_window(|window| {
                        window
                            .surface()
                            .is_some_and(|surface| surface.id() == constraint.surface().id())
                    })
                {
                    let content = window.current.borrow().content;
                    let geometry = window.view().geometry.get();
                    seat.cursor
                        .warp(content.x - geometry.x + hint_x, content.y - geometry.y + hint_y);
                }
            }
        }
    }

    /// The constraint applying to the surface currently under the pointer, if any.
    pub fn constraint_for_surface(&self, surface: &Rc<Surface>) -> Option<Rc<PointerConstraint>> {
        self.pointer_constraints
            .iter()
            .find(|constraint| constraint.surface().id() == surface.id())
            .cloned()
    }
}
