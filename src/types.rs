use std::fmt;

/// Convert a local fan speed (0-100 scale) to the purifier's integer step.
/// Values that would land below step 1 are clamped to 1.
pub fn fan_speed_to_remote(local: i32) -> i32 {
    (local.div_euclid(10) - 1).max(1)
}

/// Convert a reported fan step back to the local 0-100 scale.
pub fn fan_speed_from_remote(remote: i32) -> i32 {
    remote.saturating_add(1).saturating_mul(10)
}

/// Local operating mode. The purifier calls auto mode "Auto"; locally it is "smart".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Smart,
    Manual,
}

impl Mode {
    pub fn as_local_str(&self) -> &'static str {
        match self {
            Mode::Smart => "smart",
            Mode::Manual => "manual",
        }
    }

    /// Anything other than "manual" is treated as smart, matching the app.
    pub fn from_local_str(s: &str) -> Self {
        match s {
            "manual" => Mode::Manual,
            _ => Mode::Smart,
        }
    }

    pub fn work_mode(&self) -> WorkMode {
        match self {
            Mode::Smart => WorkMode::Auto,
            Mode::Manual => WorkMode::Manual,
        }
    }
}

/// Remote `Workmode`. There is no separate power flag on the appliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkMode {
    Auto,
    Manual,
    PowerOff,
}

impl WorkMode {
    pub fn as_remote_str(&self) -> &'static str {
        match self {
            WorkMode::Auto => "Auto",
            WorkMode::Manual => "Manual",
            WorkMode::PowerOff => "PowerOff",
        }
    }

    pub fn from_remote_str(s: &str) -> Option<Self> {
        match s {
            "Auto" => Some(WorkMode::Auto),
            "Manual" => Some(WorkMode::Manual),
            "PowerOff" => Some(WorkMode::PowerOff),
            _ => None,
        }
    }
}

/// Read-only sensor readings as reported by the purifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Measurements {
    pub co2: Option<f64>,
    pub humidity: Option<f64>,
    pub pm1: Option<f64>,
    pub pm2_5: Option<f64>,
    pub pm10: Option<f64>,
    pub voc: Option<f64>,
    /// Raw `EnvLightLvl`, 0 when not reported. The unit is not documented.
    pub luminance: f64,
    pub temperature: Option<f64>,
    pub filter_life: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Measurement {
    Co2,
    Humidity,
    Pm1,
    Pm2_5,
    Pm10,
    Voc,
    Luminance,
    Temperature,
    FilterLife,
}

impl Measurements {
    pub fn get(&self, m: Measurement) -> Option<f64> {
        match m {
            Measurement::Co2 => self.co2,
            Measurement::Humidity => self.humidity,
            Measurement::Pm1 => self.pm1,
            Measurement::Pm2_5 => self.pm2_5,
            Measurement::Pm10 => self.pm10,
            Measurement::Voc => self.voc,
            Measurement::Luminance => Some(self.luminance),
            Measurement::Temperature => self.temperature,
            Measurement::FilterLife => self.filter_life,
        }
    }
}

impl Measurement {
    pub const ALL: [Measurement; 9] = [
        Measurement::Co2,
        Measurement::Humidity,
        Measurement::Pm1,
        Measurement::Pm2_5,
        Measurement::Pm10,
        Measurement::Voc,
        Measurement::Luminance,
        Measurement::Temperature,
        Measurement::FilterLife,
    ];
}

/// Normalized appliance state as seen by the host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalState {
    pub power: bool,
    /// Unset while powered off.
    pub mode: Option<Mode>,
    /// 0 while powered off.
    pub fan_speed: Option<i32>,
    pub light: Option<bool>,
    pub lock: Option<bool>,
    pub ionizer: Option<bool>,
    pub measurements: Measurements,
}

/// Why a fetched appliance could not be turned into local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailability {
    NotInAccount,
    NoData,
    Disconnected,
    NoProperties,
}

impl Unavailability {
    /// User-facing explanation shown while the appliance is unavailable.
    pub fn reason(&self) -> &'static str {
        match self {
            Unavailability::NotInAccount => {
                "Device no longer in account. Check the mobile app and verify that you use the correct account."
            }
            Unavailability::NoData => "Device has no data. Check for service outages.",
            Unavailability::Disconnected => {
                "Device is not connected. Check device power and Wi-Fi connectivity."
            }
            Unavailability::NoProperties => {
                "Device has no properties data. Check for service outages."
            }
        }
    }
}

impl fmt::Display for Unavailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Availability {
    /// No reconciliation has happened yet.
    #[default]
    Unknown,
    Available,
    Unavailable(Unavailability),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    #[default]
    Idle,
    Polling,
    BackedOff,
}

/// Snapshot of a controller, published after every tick.
#[derive(Debug, Clone, Default)]
pub struct ControllerStatus {
    pub scheduler: SchedulerState,
    pub availability: Availability,
    pub state: Option<LocalState>,
}

/// Events emitted when reconciled state differs from the previous reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    PowerChanged { power: bool },
    ModeChanged { mode: Option<Mode> },
    FanSpeedChanged { fan_speed: Option<i32> },
    LightChanged { on: Option<bool> },
    LockChanged { on: Option<bool> },
    IonizerChanged { on: Option<bool> },
    MeasurementChanged { measurement: Measurement, value: Option<f64> },
    AvailabilityChanged { availability: Availability },
}
