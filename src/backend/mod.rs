//! Backends provide outputs, client surfaces and input devices. The compositor toolkit owning
//! real hardware and wire protocols is an external collaborator; the headless backend is the
//! one shipped here and the one the test suites run against.

pub mod headless;

use crate::state::Server;

pub enum Backend {
    Headless(headless::HeadlessData),
}

impl Backend {
    pub fn new_headless(server: &mut Server) -> Self {
        Backend::Headless(headless::HeadlessData::new(server))
    }

    pub fn headless(&self) -> &headless::HeadlessData {
        match self {
            Backend::Headless(data) => data,
        }
    }
}
