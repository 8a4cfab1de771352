use core::str;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::BytesMut;
use futures::prelude::*;
use nalgebra::vector;
use stream_cancel::StreamExt;
use tokio_serial::{SerialPort, SerialPortBuilderExt};
use tokio_util::codec::Decoder;

use crate::hub::{Listener, SampleCallback, Sensor};
use crate::location::{LocationProvider, Permission};
use crate::state::{
    AccSample, GyroSample, LocationFix, MagSample, OrientationSample, RotationSample, SensorKind,
    SensorSample,
};

pub const BAUD_RATES: [u32; 9] = [
    4800, 9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600,
];

/// One open link to the sensor board. The reader task parses the board's
/// line protocol and routes readings to whatever callbacks are attached;
/// dropping the hub trips the reader and releases the port.
pub struct SerialHub {
    dispatch: Arc<Mutex<Dispatch>>,
    latest_fix: Arc<Mutex<Option<LocationFix>>>,
    location_consent: bool,
    _trigger: stream_cancel::Trigger,
    port_name: String,
}

impl SerialHub {
    pub fn open(
        port_name: &str,
        baud_rate: u32,
        location_consent: bool,
    ) -> tokio_serial::Result<Self> {
        let mut port = tokio_serial::new(port_name, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .flow_control(tokio_serial::FlowControl::None)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .open_native_async()?;
        port.write_data_terminal_ready(true)?; // dtr: required for Arduinos to send data
        log::info!("open sensor link: {port_name} at {baud_rate} baud");

        let dispatch = Arc::new(Mutex::new(Dispatch::default()));
        let latest_fix = Arc::new(Mutex::new(None));
        let (trigger, tripwire) = stream_cancel::Tripwire::new();

        let reader = LineCodec.framed(port);
        let task_dispatch = Arc::clone(&dispatch);
        let task_fix = Arc::clone(&latest_fix);
        tokio::spawn(async move {
            let mut incoming = reader.take_until_if(tripwire);
            while let Some(line) = incoming.next().await {
                match line {
                    Ok(line) => {
                        if let Some(reading) = parse_line(&line) {
                            route(reading, &task_dispatch, &task_fix);
                        }
                    }
                    Err(e) => log::warn!("serial read error: {e}"),
                }
            }
        });

        Ok(Self {
            dispatch,
            latest_fix,
            location_consent,
            _trigger: trigger,
            port_name: port_name.to_string(),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn sensor(&self, kind: SensorKind) -> HubSensor {
        HubSensor {
            kind,
            dispatch: Arc::clone(&self.dispatch),
        }
    }

    pub fn location(&self) -> HubLocation {
        HubLocation {
            consent: self.location_consent,
            latest_fix: Arc::clone(&self.latest_fix),
        }
    }
}

/// Per-kind endpoint onto the hub's dispatch table.
pub struct HubSensor {
    kind: SensorKind,
    dispatch: Arc<Mutex<Dispatch>>,
}

impl Sensor for HubSensor {
    fn add_listener(&mut self, callback: SampleCallback) -> Listener {
        let id = self.dispatch.lock().unwrap().attach(self.kind, callback);
        let dispatch = Arc::clone(&self.dispatch);
        let kind = self.kind;
        Listener::new(move || dispatch.lock().unwrap().detach(kind, id))
    }

    fn set_update_interval(&mut self, interval: Duration) {
        self.dispatch.lock().unwrap().slot_mut(self.kind).interval = interval;
    }
}

pub struct HubLocation {
    consent: bool,
    latest_fix: Arc<Mutex<Option<LocationFix>>>,
}

impl LocationProvider for HubLocation {
    fn request_permission(&self) -> Permission {
        if self.consent {
            Permission::Granted
        } else {
            Permission::Denied
        }
    }

    fn current_fix(&self) -> Option<LocationFix> {
        *self.latest_fix.lock().unwrap()
    }
}

#[derive(Default)]
struct Slot {
    listener: Option<(u64, SampleCallback)>,
    interval: Duration,
    last_delivery: Option<Instant>,
}

impl Slot {
    fn deliver(&mut self, now: Instant, sample: SensorSample) {
        let due = match self.last_delivery {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        };
        if !due {
            return;
        }
        if let Some((_, callback)) = self.listener.as_mut() {
            self.last_delivery = Some(now);
            callback(sample);
        }
    }
}

#[derive(Default)]
struct Dispatch {
    next_id: u64,
    magnetometer: Slot,
    accelerometer: Slot,
    gyroscope: Slot,
    device_motion: Slot,
}

impl Dispatch {
    fn slot_mut(&mut self, kind: SensorKind) -> &mut Slot {
        match kind {
            SensorKind::Magnetometer => &mut self.magnetometer,
            SensorKind::Accelerometer => &mut self.accelerometer,
            SensorKind::Gyroscope => &mut self.gyroscope,
            SensorKind::DeviceMotion => &mut self.device_motion,
        }
    }

    fn attach(&mut self, kind: SensorKind, callback: SampleCallback) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        // zero-or-one listener per kind; a second attach replaces the first
        self.slot_mut(kind).listener = Some((id, callback));
        id
    }

    fn detach(&mut self, kind: SensorKind, id: u64) {
        let slot = self.slot_mut(kind);
        if matches!(slot.listener, Some((current, _)) if current == id) {
            slot.listener = None;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LineReading {
    Imu { gyro: GyroSample, acc: AccSample },
    Mag(MagSample),
    Motion {
        rotation: RotationSample,
        orientation: OrientationSample,
    },
    Gps(GpsReading),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct GpsReading {
    latitude: f64,
    longitude: f64,
    altitude: f64,
    accuracy: f64,
    heading: f64,
    speed: f64,
}

fn parse_line(line: &str) -> Option<LineReading> {
    let line = line.trim_end();

    let mut gyro_x = 0.0;
    let mut gyro_y = 0.0;
    let mut gyro_z = 0.0;
    let mut acc_x = 0.0;
    let mut acc_y = 0.0;
    let mut acc_z = 0.0;
    if scanf::sscanf!(
        line,
        "imu {} {} {} {} {} {}",
        gyro_x,
        gyro_y,
        gyro_z,
        acc_x,
        acc_y,
        acc_z
    )
    .is_ok()
    {
        return Some(LineReading::Imu {
            gyro: GyroSample {
                ang_vel: vector![gyro_x, gyro_y, gyro_z],
            },
            acc: AccSample {
                lin_acc: vector![acc_x, acc_y, acc_z],
            },
        });
    }

    let mut mag_x = 0.0;
    let mut mag_y = 0.0;
    let mut mag_z = 0.0;
    if scanf::sscanf!(line, "mag {} {} {}", mag_x, mag_y, mag_z).is_ok() {
        return Some(LineReading::Mag(MagSample {
            field: vector![mag_x, mag_y, mag_z],
        }));
    }

    let mut yaw = 0.0;
    let mut pitch = 0.0;
    let mut roll = 0.0;
    let mut yaw_rate = 0.0;
    let mut pitch_rate = 0.0;
    let mut roll_rate = 0.0;
    let mut orientation = 0.0;
    if scanf::sscanf!(
        line,
        "rot {} {} {} {} {} {} {}",
        yaw,
        pitch,
        roll,
        yaw_rate,
        pitch_rate,
        roll_rate,
        orientation
    )
    .is_ok()
    {
        return Some(LineReading::Motion {
            rotation: RotationSample {
                yaw,
                pitch,
                roll,
                yaw_rate,
                pitch_rate,
                roll_rate,
            },
            orientation: OrientationSample { value: orientation },
        });
    }

    let mut latitude = 0.0;
    let mut longitude = 0.0;
    let mut altitude = 0.0;
    let mut accuracy = 0.0;
    let mut heading = 0.0;
    let mut speed = 0.0;
    if scanf::sscanf!(
        line,
        "gps {} {} {} {} {} {}",
        latitude,
        longitude,
        altitude,
        accuracy,
        heading,
        speed
    )
    .is_ok()
    {
        return Some(LineReading::Gps(GpsReading {
            latitude,
            longitude,
            altitude,
            accuracy,
            heading,
            speed,
        }));
    }

    None
}

fn route(
    reading: LineReading,
    dispatch: &Mutex<Dispatch>,
    latest_fix: &Mutex<Option<LocationFix>>,
) {
    let now = Instant::now();
    match reading {
        LineReading::Imu { gyro, acc } => {
            let mut dispatch = dispatch.lock().unwrap();
            dispatch
                .gyroscope
                .deliver(now, SensorSample::Gyroscope(gyro));
            dispatch
                .accelerometer
                .deliver(now, SensorSample::Accelerometer(acc));
        }
        LineReading::Mag(mag) => {
            dispatch
                .lock()
                .unwrap()
                .magnetometer
                .deliver(now, SensorSample::Magnetometer(mag));
        }
        LineReading::Motion {
            rotation,
            orientation,
        } => {
            dispatch.lock().unwrap().device_motion.deliver(
                now,
                SensorSample::DeviceMotion {
                    rotation,
                    orientation,
                },
            );
        }
        LineReading::Gps(gps) => {
            *latest_fix.lock().unwrap() = Some(LocationFix {
                accuracy: gps.accuracy,
                altitude: gps.altitude,
                heading: gps.heading,
                latitude: gps.latitude,
                longitude: gps.longitude,
                speed: gps.speed,
                timestamp_ms: unix_ms(),
                mocked: false,
            });
        }
    }
}

fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

struct LineCodec;

impl Decoder for LineCodec {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let newline = src.as_ref().iter().position(|b| *b == b'\n');
        if let Some(n) = newline {
            let line = src.split_to(n + 1);
            return match str::from_utf8(line.as_ref()) {
                Ok(s) => Ok(Some(s.to_string())),
                Err(_) => Err(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "Invalid String",
                )),
            };
        }
        Ok(None)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::vector;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn parses_the_imu_line_into_gyro_and_acc() {
        let reading = parse_line("imu 0.01 -0.02 0.03 0.1 9.81 -0.2\n").unwrap();

        assert_eq!(
            reading,
            LineReading::Imu {
                gyro: GyroSample {
                    ang_vel: vector![0.01, -0.02, 0.03],
                },
                acc: AccSample {
                    lin_acc: vector![0.1, 9.81, -0.2],
                },
            }
        );
    }

    #[test]
    fn parses_mag_rot_and_gps_lines() {
        assert_eq!(
            parse_line("mag 33.1 98.3 571.2\n"),
            Some(LineReading::Mag(MagSample {
                field: vector![33.1, 98.3, 571.2],
            }))
        );

        assert_eq!(
            parse_line("rot 0.1 0.2 0.3 1.0 2.0 3.0 0\r\n"),
            Some(LineReading::Motion {
                rotation: RotationSample {
                    yaw: 0.1,
                    pitch: 0.2,
                    roll: 0.3,
                    yaw_rate: 1.0,
                    pitch_rate: 2.0,
                    roll_rate: 3.0,
                },
                orientation: OrientationSample { value: 0.0 },
            })
        );

        assert_eq!(
            parse_line("gps 55.6845001 9.5745172 113.4 18.9 0 0\n"),
            Some(LineReading::Gps(GpsReading {
                latitude: 55.6845001,
                longitude: 9.5745172,
                altitude: 113.4,
                accuracy: 18.9,
                heading: 0.0,
                speed: 0.0,
            }))
        );
    }

    #[test]
    fn unknown_or_malformed_lines_are_ignored() {
        assert_eq!(parse_line("baro 1013.25\n"), None);
        assert_eq!(parse_line("imu 1.0 2.0\n"), None);
        assert_eq!(parse_line("\n"), None);
    }

    fn counting_callback() -> (SampleCallback, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (
            Box::new(move |_| {
                inner.fetch_add(1, Ordering::SeqCst);
            }),
            count,
        )
    }

    fn mag_sample() -> SensorSample {
        SensorSample::Magnetometer(MagSample {
            field: vector![1.0, 2.0, 3.0],
        })
    }

    #[test]
    fn slot_throttles_to_the_update_interval() {
        let mut slot = Slot::default();
        let (callback, count) = counting_callback();
        slot.listener = Some((0, callback));
        slot.interval = Duration::from_millis(1000);

        let t0 = Instant::now();
        slot.deliver(t0, mag_sample());
        slot.deliver(t0 + Duration::from_millis(50), mag_sample());
        slot.deliver(t0 + Duration::from_millis(999), mag_sample());
        slot.deliver(t0 + Duration::from_millis(1000), mag_sample());

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn detached_listener_no_longer_receives_queued_samples() {
        let dispatch = Arc::new(Mutex::new(Dispatch::default()));
        let (callback, count) = counting_callback();

        let mut sensor = HubSensor {
            kind: SensorKind::Magnetometer,
            dispatch: Arc::clone(&dispatch),
        };
        let listener = sensor.add_listener(callback);

        let now = Instant::now();
        dispatch
            .lock()
            .unwrap()
            .magnetometer
            .deliver(now, mag_sample());
        listener.remove();
        dispatch
            .lock()
            .unwrap()
            .magnetometer
            .deliver(now + Duration::from_millis(1), mag_sample());

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn a_second_attach_replaces_the_first() {
        let mut dispatch = Dispatch::default();
        let (first, first_count) = counting_callback();
        let (second, second_count) = counting_callback();

        let first_id = dispatch.attach(SensorKind::Gyroscope, first);
        dispatch.attach(SensorKind::Gyroscope, second);
        // the stale handle must not tear down the replacement
        dispatch.detach(SensorKind::Gyroscope, first_id);

        dispatch
            .gyroscope
            .deliver(Instant::now(), SensorSample::Gyroscope(GyroSample::default()));

        assert_eq!(first_count.load(Ordering::SeqCst), 0);
        assert_eq!(second_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn consent_gates_the_permission_request() {
        let latest_fix = Arc::new(Mutex::new(None));

        let denied = HubLocation {
            consent: false,
            latest_fix: Arc::clone(&latest_fix),
        };
        assert_eq!(denied.request_permission(), Permission::Denied);

        let granted = HubLocation {
            consent: true,
            latest_fix,
        };
        assert_eq!(granted.request_permission(), Permission::Granted);
        assert!(granted.current_fix().is_none());
    }

    #[test]
    fn line_codec_splits_on_newlines() {
        let mut codec = LineCodec;
        let mut buf = BytesMut::from(&b"mag 1 2 3\nimu 0.1"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some("mag 1 2 3\n".into()));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b" 0.2 0.3 1 2 3\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some("imu 0.1 0.2 0.3 1 2 3\n".into())
        );
    }
}
