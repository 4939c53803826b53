//! Time-based drone simulator.
//!
//! Actions are dispatched through a name → handler table fixed at
//! construction. Names missing from the table go to a fallback handler that
//! accepts any parameters and takes a short fixed time.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use dronevox_core::Params;

use crate::error::DroneError;
use crate::params::{display_params, display_value, optional_number, required_number};
use crate::sleeper::Sleeper;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Climb and horizontal speed a fresh executor starts with, in cm/s.
pub const DEFAULT_SPEED_CM_S: f64 = 30.0;

/// Rotation speed, in degrees per second.
pub const ROTATION_SPEED_DEG_S: f64 = 90.0;

/// Altitude used by `takeoff` when none is given, in cm.
pub const DEFAULT_TAKEOFF_ALTITUDE_CM: f64 = 50.0;

const LAND_SECS: f64 = 3.0;
const EMERGENCY_SECS: f64 = 1.0;
const SPEED_CHANGE_SECS: f64 = 0.1;
const FALLBACK_SECS: f64 = 0.5;

/// Movement actions that take a `distance` parameter.
const MOVES: [&str; 6] = ["up", "down", "left", "right", "forward", "back"];

// ---------------------------------------------------------------------------
// Seam
// ---------------------------------------------------------------------------

/// The drone capability as seen by the job runner.
///
/// Implementations block for as long as the action takes; they are only ever
/// called from a blocking-capable thread.
pub trait DroneControl: Send {
    /// Whether `action` has a dedicated handler.
    fn has_capability(&self, action: &str) -> bool;

    /// Perform `action`, writing progress lines to `out`.
    fn execute(
        &mut self,
        action: &str,
        params: &Params,
        out: &mut dyn Write,
    ) -> Result<(), DroneError>;
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Static performance figures for the simulated airframe.
#[derive(Debug, Clone, Copy)]
pub struct DroneConfig {
    /// Initial speed in cm/s; `speed` commands change it per executor.
    pub default_speed: f64,
    /// Rotation speed in deg/s.
    pub rotation_speed: f64,
}

impl Default for DroneConfig {
    fn default() -> Self {
        Self {
            default_speed: DEFAULT_SPEED_CM_S,
            rotation_speed: ROTATION_SPEED_DEG_S,
        }
    }
}

type Handler =
    fn(&mut DroneExecutor, &str, &Params, &mut dyn Write) -> Result<(), DroneError>;

pub struct DroneExecutor {
    config: DroneConfig,
    current_speed: f64,
    sleeper: Arc<dyn Sleeper>,
    handlers: HashMap<&'static str, Handler>,
}

impl DroneExecutor {
    pub fn new(config: DroneConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        let mut handlers: HashMap<&'static str, Handler> = HashMap::new();
        for name in MOVES {
            handlers.insert(name, Self::movement);
        }
        handlers.insert("cw", Self::rotation);
        handlers.insert("ccw", Self::rotation);
        handlers.insert("takeoff", Self::takeoff);
        handlers.insert("land", Self::land);
        handlers.insert("go", Self::go);
        handlers.insert("speed", Self::speed);
        handlers.insert("emergency", Self::emergency);

        Self {
            config,
            current_speed: config.default_speed,
            sleeper,
            handlers,
        }
    }

    /// Speed currently applied to distance-based actions, in cm/s.
    pub fn current_speed(&self) -> f64 {
        self.current_speed
    }

    // ---- handlers ----

    fn takeoff(&mut self, action: &str, params: &Params, out: &mut dyn Write) -> Result<(), DroneError> {
        let altitude = optional_number(action, params, "altitude", DEFAULT_TAKEOFF_ALTITUDE_CM)?;
        writeln!(out, "[drone] '{action}' started, target altitude {altitude}cm")?;
        self.wait_for_distance(action, altitude, out)?;
        writeln!(out, "[drone] '{action}' done.")?;
        Ok(())
    }

    fn land(&mut self, action: &str, _params: &Params, out: &mut dyn Write) -> Result<(), DroneError> {
        writeln!(out, "[drone] '{action}' started.")?;
        self.wait(action, LAND_SECS)?;
        writeln!(out, "[drone] '{action}' done.")?;
        Ok(())
    }

    fn movement(&mut self, action: &str, params: &Params, out: &mut dyn Write) -> Result<(), DroneError> {
        let distance = required_number(action, params, "distance")?;
        writeln!(
            out,
            "[drone] '{action}' started, distance {}cm",
            display_value(&params["distance"])
        )?;
        self.wait_for_distance(action, distance, out)?;
        writeln!(out, "[drone] '{action}' done.")?;
        Ok(())
    }

    fn rotation(&mut self, action: &str, params: &Params, out: &mut dyn Write) -> Result<(), DroneError> {
        let degree = required_number(action, params, "degree")?;
        writeln!(
            out,
            "[drone] '{action}' rotation started, angle {}°",
            display_value(&params["degree"])
        )?;
        let secs = degree.abs() / self.config.rotation_speed;
        self.announce_and_wait(action, secs, out)?;
        writeln!(out, "[drone] '{action}' done.")?;
        Ok(())
    }

    fn go(&mut self, action: &str, params: &Params, out: &mut dyn Write) -> Result<(), DroneError> {
        let x = required_number(action, params, "x")?;
        let y = required_number(action, params, "y")?;
        let z = required_number(action, params, "z")?;
        let speed = required_number(action, params, "speed")?;
        writeln!(
            out,
            "[drone] '{action}' started, target ({x},{y},{z}) at {speed}cm/s"
        )?;
        let distance = (x * x + y * y + z * z).sqrt();
        self.announce_and_wait(action, distance / speed, out)?;
        writeln!(out, "[drone] '{action}' done.")?;
        Ok(())
    }

    fn speed(&mut self, action: &str, params: &Params, out: &mut dyn Write) -> Result<(), DroneError> {
        let value = required_number(action, params, "value")?;
        writeln!(out, "[drone] '{action}' changed, new speed {value} cm/s")?;
        self.current_speed = value;
        self.wait(action, SPEED_CHANGE_SECS)?;
        writeln!(out, "[drone] '{action}' done.")?;
        Ok(())
    }

    fn emergency(&mut self, action: &str, _params: &Params, out: &mut dyn Write) -> Result<(), DroneError> {
        writeln!(out, "[drone] '{action}' started.")?;
        self.wait(action, EMERGENCY_SECS)?;
        writeln!(out, "[drone] '{action}' done.")?;
        Ok(())
    }

    fn fallback(&mut self, action: &str, params: &Params, out: &mut dyn Write) -> Result<(), DroneError> {
        writeln!(
            out,
            "[drone] '{action}' started, params {}",
            display_params(params)
        )?;
        self.wait(action, FALLBACK_SECS)?;
        writeln!(out, "[drone] '{action}' done.")?;
        Ok(())
    }

    // ---- timing ----

    fn wait_for_distance(&self, action: &str, distance: f64, out: &mut dyn Write) -> Result<(), DroneError> {
        let secs = distance.abs() / self.current_speed;
        self.announce_and_wait(action, secs, out)
    }

    fn announce_and_wait(&self, action: &str, secs: f64, out: &mut dyn Write) -> Result<(), DroneError> {
        let duration = to_duration(action, secs)?;
        writeln!(out, "  ... [drone] expected duration {secs:.2}s, waiting")?;
        self.sleeper.sleep(duration);
        Ok(())
    }

    fn wait(&self, action: &str, secs: f64) -> Result<(), DroneError> {
        self.sleeper.sleep(to_duration(action, secs)?);
        Ok(())
    }
}

impl DroneControl for DroneExecutor {
    fn has_capability(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    fn execute(
        &mut self,
        action: &str,
        params: &Params,
        out: &mut dyn Write,
    ) -> Result<(), DroneError> {
        let handler = match self.handlers.get(action) {
            Some(handler) => *handler,
            None => {
                tracing::debug!(action, "no dedicated handler; using fallback");
                Self::fallback as Handler
            }
        };
        handler(self, action, params, out)
    }
}

fn to_duration(action: &str, secs: f64) -> Result<Duration, DroneError> {
    Duration::try_from_secs_f64(secs).map_err(|_| DroneError::InvalidDuration {
        action: action.to_string(),
        seconds: secs,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
