use crate::state::LocationFix;

pub const AXIS_SCALE: f64 = 10_000.0;
const ACCURACY_SCALE: f64 = 100.0;
const ALTITUDE_SCALE: f64 = 1_000.0;
const HEADING_SCALE: f64 = 100.0;

pub const WAITING_FOR_GPS: &str = "Waiting for GPS signal...";
const PLACEHOLDER: &str = "n/a";

/// Truncating display rounding. Zero and NaN both collapse to 0.0, matching
/// the readout's treatment of "no value yet".
pub fn round(value: f64, scale: f64) -> f64 {
    if value == 0.0 || value.is_nan() {
        0.0
    } else {
        (value * scale).floor() / scale
    }
}

pub fn round_axis(value: f64) -> f64 {
    round(value, AXIS_SCALE)
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationReadout {
    pub accuracy: String,
    pub altitude: String,
    pub heading: String,
    pub latitude: String,
    pub longitude: String,
    pub speed: String,
    pub status: String,
}

/// Derives the location rows and status line. Error beats fix data; with
/// neither, every field is a placeholder and the status says we are waiting.
pub fn location_readout(fix: Option<&LocationFix>, error: Option<&str>) -> LocationReadout {
    let mut readout = LocationReadout {
        accuracy: PLACEHOLDER.to_string(),
        altitude: PLACEHOLDER.to_string(),
        heading: PLACEHOLDER.to_string(),
        latitude: PLACEHOLDER.to_string(),
        longitude: PLACEHOLDER.to_string(),
        speed: PLACEHOLDER.to_string(),
        status: WAITING_FOR_GPS.to_string(),
    };

    if let Some(error) = error {
        readout.status = format!("Error: {error}");
    } else if let Some(fix) = fix {
        readout.status = String::new();
        readout.accuracy = round(fix.accuracy, ACCURACY_SCALE).to_string();
        readout.altitude = format!("{} m", round(fix.altitude, ALTITUDE_SCALE));
        readout.heading = round(fix.heading, HEADING_SCALE).to_string();
        readout.latitude = fix.latitude.to_string();
        readout.longitude = fix.longitude.to_string();
        // TODO: the board reports speed in m/s but the label still claims km/h
        readout.speed = format!("{} km/h", fix.speed);
    }

    readout
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::state::PERMISSION_DENIED_MSG;

    fn fix() -> LocationFix {
        LocationFix {
            accuracy: 18.955_999,
            altitude: 113.400_001,
            heading: 0.0,
            latitude: 55.684_500_1,
            longitude: 9.574_517_2,
            speed: 0.0,
            timestamp_ms: 1_537_269_622_443,
            mocked: false,
        }
    }

    #[test]
    fn round_collapses_missing_values() {
        assert_eq!(round(0.0, 10_000.0), 0.0);
        assert_eq!(round(0.0, 100.0), 0.0);
        assert_eq!(round(f64::NAN, 10_000.0), 0.0);
        assert_eq!(round(f64::NAN, 1_000.0), 0.0);
    }

    #[test]
    fn round_truncates_toward_negative_infinity() {
        assert_eq!(round(1.23456, 10_000.0), 1.2345);
        assert_eq!(round(-1.23456, 10_000.0), -1.2346);
        assert_eq!(round(18.955_999, 100.0), 18.95);
    }

    #[test]
    fn waiting_readout_is_all_placeholders() {
        let readout = location_readout(None, None);

        assert_eq!(readout.accuracy, "n/a");
        assert_eq!(readout.latitude, "n/a");
        assert_eq!(readout.speed, "n/a");
        assert_eq!(readout.status, WAITING_FOR_GPS);
    }

    #[test]
    fn denied_permission_keeps_placeholders_and_reports_the_error() {
        let readout = location_readout(None, Some(PERMISSION_DENIED_MSG));

        assert_eq!(readout.accuracy, "n/a");
        assert_eq!(readout.altitude, "n/a");
        assert_eq!(readout.heading, "n/a");
        assert_eq!(readout.latitude, "n/a");
        assert_eq!(readout.longitude, "n/a");
        assert_eq!(readout.speed, "n/a");
        assert_eq!(readout.status, format!("Error: {PERMISSION_DENIED_MSG}"));
        assert!(!readout.status.is_empty());
    }

    #[test]
    fn error_beats_fix_data() {
        let fix = fix();
        let readout = location_readout(Some(&fix), Some("link lost"));

        assert_eq!(readout.latitude, "n/a");
        assert_eq!(readout.status, "Error: link lost");
    }

    #[test]
    fn fix_readout_formats_each_field() {
        let fix = fix();
        let readout = location_readout(Some(&fix), None);

        assert_eq!(readout.status, "");
        assert_eq!(readout.accuracy, "18.95");
        assert_eq!(readout.altitude, "113.4 m");
        assert_eq!(readout.heading, "0");
        assert_eq!(readout.latitude, "55.6845001");
        assert_eq!(readout.longitude, "9.5745172");
        assert_eq!(readout.speed, "0 km/h");
    }
}
