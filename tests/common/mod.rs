//! Shared fixtures: a headless compositor driven without a real backend.

use std::rc::Rc;

use calloop::EventLoop;
use hayward::backend::headless::{ack_pending_configures, headless_view, HeadlessClient};
use hayward::shell::ClientId;
use hayward::state::State;
use hayward::tree::Window;

pub fn new_state() -> (EventLoop<'static, State>, State) {
    let mut config = hayward_config::Config::default();
    // Short enough that timeout tests finish quickly, long enough to never fire by accident.
    config.general.transaction_timeout_ms = 50;
    let event_loop = EventLoop::try_new().expect("failed to create an event loop");
    let state = State::new(event_loop.handle(), event_loop.get_signal(), config, None);
    (event_loop, state)
}

/// Map a tiling window and acknowledge its initial configure.
pub fn map_tiled(state: &mut State, client_id: u64) -> (Rc<Window>, Rc<HeadlessClient>) {
    let (view, client, _surface) = headless_view(ClientId(client_id));
    let window = state.server.handle_view_map(view);
    ack_pending_configures(&mut state.server, &window, &client);
    (window, client)
}

/// Acknowledge configures for every window until no transaction is in flight.
pub fn settle(state: &mut State, windows: &[(&Rc<Window>, &Rc<HeadlessClient>)]) {
    for _ in 0..8 {
        for (window, client) in windows {
            ack_pending_configures(&mut state.server, window, client);
        }
        if !state.server.transactions.has_queued() && !state.server.transactions.has_pending() {
            return;
        }
    }
    panic!("transactions never settled");
}
