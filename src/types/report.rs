//! Aircraft state snapshot and its record layout

use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};

use super::{FieldDef, FieldType, RecordSchema, Value};
use crate::decode::Record;

const TITLE: &str = "TITLE";
const ALTITUDE: &str = "INDICATED ALTITUDE";
const LATITUDE: &str = "PLANE LATITUDE";
const LONGITUDE: &str = "PLANE LONGITUDE";
const HEADING: &str = "PLANE HEADING DEGREES TRUE";
const AIRSPEED: &str = "AIRSPEED INDICATED";
const AIRSPEED_TRUE: &str = "AIRSPEED TRUE";
const VERTICAL_SPEED: &str = "VERTICAL SPEED";
const FLAPS: &str = "TRAILING EDGE FLAPS LEFT ANGLE";
const ELEVATOR_TRIM: &str = "ELEVATOR TRIM PCT";
const RUDDER_TRIM: &str = "RUDDER TRIM PCT";

static REPORT_SCHEMA: LazyLock<Arc<RecordSchema>> = LazyLock::new(|| {
    let schema = RecordSchema::new(
        "TelemetryReport",
        [
            FieldDef::text(TITLE, FieldType::String256),
            FieldDef::new(ALTITUDE, "feet", FieldType::Float64),
            FieldDef::new(LATITUDE, "degrees", FieldType::Float64),
            FieldDef::new(LONGITUDE, "degrees", FieldType::Float64),
            FieldDef::new(HEADING, "degrees", FieldType::Float64),
            FieldDef::new(AIRSPEED, "knot", FieldType::Float64),
            FieldDef::new(AIRSPEED_TRUE, "knot", FieldType::Float64),
            FieldDef::new(VERTICAL_SPEED, "ft/min", FieldType::Float64),
            FieldDef::new(FLAPS, "degrees", FieldType::Float64),
            FieldDef::new(ELEVATOR_TRIM, "percent", FieldType::Float64),
            FieldDef::new(RUDDER_TRIM, "percent", FieldType::Float64),
        ],
    );
    // The table above is static; a failure here is a programming error.
    Arc::new(schema.unwrap_or_else(|e| panic!("invalid TelemetryReport table: {e}")))
});

/// Decoded snapshot of the user aircraft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryReport {
    /// Aircraft title as shown in the simulator
    pub title: String,
    /// Indicated altitude (feet)
    pub altitude: f64,
    /// Latitude (degrees)
    pub latitude: f64,
    /// Longitude (degrees)
    pub longitude: f64,
    /// True heading (degrees)
    pub heading: f64,
    /// Indicated airspeed (knots)
    pub airspeed: f64,
    /// True airspeed (knots)
    pub airspeed_true: f64,
    /// Vertical speed (ft/min)
    pub vertical_speed: f64,
    /// Left trailing-edge flaps angle (degrees)
    pub flaps: f64,
    /// Elevator trim (percent)
    pub trim: f64,
    /// Rudder trim (percent)
    pub rudder_trim: f64,
}

impl TelemetryReport {
    /// Record layout requested from the simulator.
    pub fn schema() -> Arc<RecordSchema> {
        Arc::clone(&REPORT_SCHEMA)
    }

    /// Build a report from a record decoded with [`TelemetryReport::schema`].
    pub fn from_record(record: &Record) -> crate::Result<Self> {
        Ok(Self {
            title: record.get(TITLE)?,
            altitude: record.get(ALTITUDE)?,
            latitude: record.get(LATITUDE)?,
            longitude: record.get(LONGITUDE)?,
            heading: record.get(HEADING)?,
            airspeed: record.get(AIRSPEED)?,
            airspeed_true: record.get(AIRSPEED_TRUE)?,
            vertical_speed: record.get(VERTICAL_SPEED)?,
            flaps: record.get(FLAPS)?,
            trim: record.get(ELEVATOR_TRIM)?,
            rudder_trim: record.get(RUDDER_TRIM)?,
        })
    }

    /// Values in schema order.
    pub fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.title.clone()),
            Value::Float64(self.altitude),
            Value::Float64(self.latitude),
            Value::Float64(self.longitude),
            Value::Float64(self.heading),
            Value::Float64(self.airspeed),
            Value::Float64(self.airspeed_true),
            Value::Float64(self.vertical_speed),
            Value::Float64(self.flaps),
            Value::Float64(self.trim),
            Value::Float64(self.rudder_trim),
        ]
    }

    /// Whether the simulator has a position fix yet.
    ///
    /// An all-zero position is what the simulator reports before a flight is
    /// loaded.
    pub fn has_position_fix(&self, threshold_deg: f64) -> bool {
        self.latitude.abs() > threshold_deg || self.longitude.abs() > threshold_deg
    }
}
