use nalgebra::Vector3;

pub const PERMISSION_DENIED_MSG: &str = "Permission to access location was denied";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MagSample {
    pub field: Vector3<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccSample {
    pub lin_acc: Vector3<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GyroSample {
    pub ang_vel: Vector3<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RotationSample {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    pub yaw_rate: f64,
    pub pitch_rate: f64,
    pub roll_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrientationSample {
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorSample {
    Magnetometer(MagSample),
    Accelerometer(AccSample),
    Gyroscope(GyroSample),
    DeviceMotion {
        rotation: RotationSample,
        orientation: OrientationSample,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Magnetometer,
    Accelerometer,
    Gyroscope,
    DeviceMotion,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    pub accuracy: f64,
    pub altitude: f64,
    pub heading: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
    pub timestamp_ms: u64,
    pub mocked: bool,
}

#[derive(Debug, Clone)]
pub enum StateEvent {
    Sample(SensorSample),
    Fix(LocationFix),
    PermissionDenied,
    Fault(String),
}

/// Everything the screen renders. Written only from the UI loop, one event at
/// a time, so the latest event for a given field always wins.
#[derive(Debug, Default)]
pub struct ScreenState {
    pub mag: MagSample,
    pub acc: AccSample,
    pub gyro: GyroSample,
    pub rotation: RotationSample,
    pub orientation: OrientationSample,
    pub fix: Option<LocationFix>,
    pub error: Option<String>,
}

impl ScreenState {
    pub fn apply(&mut self, event: StateEvent) {
        match event {
            StateEvent::Sample(SensorSample::Magnetometer(sample)) => self.mag = sample,
            StateEvent::Sample(SensorSample::Accelerometer(sample)) => self.acc = sample,
            StateEvent::Sample(SensorSample::Gyroscope(sample)) => self.gyro = sample,
            StateEvent::Sample(SensorSample::DeviceMotion {
                rotation,
                orientation,
            }) => {
                self.rotation = rotation;
                self.orientation = orientation;
            }
            StateEvent::Fix(fix) => self.fix = Some(fix),
            StateEvent::PermissionDenied => self.error = Some(PERMISSION_DENIED_MSG.to_string()),
            StateEvent::Fault(message) => self.error = Some(message),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::vector;

    fn fix(latitude: f64) -> LocationFix {
        LocationFix {
            accuracy: 18.9,
            altitude: 113.4,
            heading: 0.0,
            latitude,
            longitude: 9.57,
            speed: 0.0,
            timestamp_ms: 1_537_269_622_443,
            mocked: false,
        }
    }

    #[test]
    fn samples_overwrite_wholesale() {
        let mut state = ScreenState::default();

        state.apply(StateEvent::Sample(SensorSample::Magnetometer(MagSample {
            field: vector![1.0, 2.0, 3.0],
        })));
        state.apply(StateEvent::Sample(SensorSample::Magnetometer(MagSample {
            field: vector![4.0, 5.0, 6.0],
        })));

        assert_eq!(state.mag.field, vector![4.0, 5.0, 6.0]);
    }

    #[test]
    fn last_fix_wins() {
        let mut state = ScreenState::default();

        state.apply(StateEvent::Fix(fix(55.0)));
        state.apply(StateEvent::Fix(fix(56.0)));

        assert_eq!(state.fix.unwrap().latitude, 56.0);
    }

    #[test]
    fn device_motion_updates_rotation_and_orientation() {
        let mut state = ScreenState::default();

        state.apply(StateEvent::Sample(SensorSample::DeviceMotion {
            rotation: RotationSample {
                yaw: 0.1,
                pitch: 0.2,
                roll: 0.3,
                yaw_rate: 1.0,
                pitch_rate: 2.0,
                roll_rate: 3.0,
            },
            orientation: OrientationSample { value: 0.0 },
        }));

        assert_eq!(state.rotation.pitch, 0.2);
        assert_eq!(state.rotation.roll_rate, 3.0);
        assert_eq!(state.orientation.value, 0.0);
    }

    #[test]
    fn permission_denial_sets_the_canonical_message() {
        let mut state = ScreenState::default();

        state.apply(StateEvent::PermissionDenied);

        assert_eq!(state.error.as_deref(), Some(PERMISSION_DENIED_MSG));
        assert!(state.fix.is_none());
    }
}
