use std::sync::mpsc::Sender;
use std::sync::Arc;

use crate::state::{LocationFix, StateEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

/// The positioning side of the attached board: a consent gate and the most
/// recent fix it has reported, if any.
pub trait LocationProvider: Send + Sync {
    fn request_permission(&self) -> Permission;
    fn current_fix(&self) -> Option<LocationFix>;
}

/// Fires independent one-shot fetches. Each refresh asks for permission
/// again, so a denial keeps being reported and a grant picks up whatever fix
/// is current. Concurrent refreshes are fine; whichever completes last wins
/// on the screen.
#[derive(Clone)]
pub struct LocationFetcher {
    provider: Arc<dyn LocationProvider>,
    events: Sender<StateEvent>,
}

impl LocationFetcher {
    pub fn new(provider: Arc<dyn LocationProvider>, events: Sender<StateEvent>) -> Self {
        Self { provider, events }
    }

    pub fn refresh(&self) {
        let provider = Arc::clone(&self.provider);
        let events = self.events.clone();
        tokio::spawn(fetch_once(provider, events));
    }
}

async fn fetch_once(provider: Arc<dyn LocationProvider>, events: Sender<StateEvent>) {
    match provider.request_permission() {
        Permission::Denied => {
            events.send(StateEvent::PermissionDenied).ok();
        }
        Permission::Granted => match provider.current_fix() {
            Some(fix) => {
                events.send(StateEvent::Fix(fix)).ok();
            }
            None => log::debug!("location refresh: no fix yet"),
        },
    }
}
