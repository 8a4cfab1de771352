use std::sync::mpsc::Sender;
use std::time::Duration;

use crate::location::LocationFetcher;
use crate::state::{SensorSample, StateEvent};

pub type SampleCallback = Box<dyn FnMut(SensorSample) + Send>;

/// One sensor of the attached board. Mirrors the listener API the board
/// endpoint exposes for every kind: attach a callback, detach it through the
/// returned handle, and throttle delivery with an update interval.
pub trait Sensor: Send {
    fn add_listener(&mut self, callback: SampleCallback) -> Listener;
    fn set_update_interval(&mut self, interval: Duration);
}

/// Handle for one attached callback. Detaches on `remove()` and again on
/// drop.
pub struct Listener {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl Listener {
    pub fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    pub fn remove(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleRate {
    Slow,
    Fast,
}

impl SampleRate {
    pub fn interval(self) -> Duration {
        match self {
            SampleRate::Slow => Duration::from_millis(1000),
            SampleRate::Fast => Duration::from_millis(50),
        }
    }
}

struct ActiveListeners {
    mag: Listener,
    acc: Listener,
    gyro: Listener,
    motion: Listener,
}

/// Owns the four sensors and the all-or-nothing listener set. Incoming
/// samples are forwarded as events into the screen's channel; a device-motion
/// sample additionally kicks off a location refresh.
pub struct SubscriptionManager {
    magnetometer: Box<dyn Sensor>,
    accelerometer: Box<dyn Sensor>,
    gyroscope: Box<dyn Sensor>,
    device_motion: Box<dyn Sensor>,
    active: Option<ActiveListeners>,
    events: Sender<StateEvent>,
    locator: LocationFetcher,
}

impl SubscriptionManager {
    pub fn new(
        magnetometer: Box<dyn Sensor>,
        accelerometer: Box<dyn Sensor>,
        gyroscope: Box<dyn Sensor>,
        device_motion: Box<dyn Sensor>,
        events: Sender<StateEvent>,
        locator: LocationFetcher,
    ) -> Self {
        Self {
            magnetometer,
            accelerometer,
            gyroscope,
            device_motion,
            active: None,
            events,
            locator,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.active.is_some()
    }

    pub fn subscribe(&mut self) {
        if self.active.is_some() {
            return;
        }

        let mag = self.magnetometer.add_listener(forward(self.events.clone()));
        let acc = self
            .accelerometer
            .add_listener(forward(self.events.clone()));
        let gyro = self.gyroscope.add_listener(forward(self.events.clone()));

        let events = self.events.clone();
        let locator = self.locator.clone();
        let motion = self.device_motion.add_listener(Box::new(move |sample| {
            events.send(StateEvent::Sample(sample)).ok();
            locator.refresh();
        }));

        self.active = Some(ActiveListeners {
            mag,
            acc,
            gyro,
            motion,
        });
    }

    pub fn unsubscribe(&mut self) {
        if let Some(active) = self.active.take() {
            active.mag.remove();
            active.acc.remove();
            active.gyro.remove();
            active.motion.remove();
        }
    }

    pub fn toggle(&mut self) {
        if self.is_subscribed() {
            self.unsubscribe();
        } else {
            self.subscribe();
        }
    }

    pub fn set_rate(&mut self, rate: SampleRate) {
        let interval = rate.interval();
        self.magnetometer.set_update_interval(interval);
        self.accelerometer.set_update_interval(interval);
        self.gyroscope.set_update_interval(interval);
        self.device_motion.set_update_interval(interval);
    }
}

fn forward(events: Sender<StateEvent>) -> SampleCallback {
    Box::new(move |sample| {
        events.send(StateEvent::Sample(sample)).ok();
    })
}
