use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::types::WorkMode;

pub const DEFAULT_BASE_URL: &str = "https://api.delta.electrolux.com/api";

pub const CONNECTED: &str = "Connected";

pub const KEY_WORK_MODE: &str = "WorkMode";
pub const KEY_FAN_SPEED: &str = "Fanspeed";
pub const KEY_LED_RING: &str = "LedRingLight";
pub const KEY_SAFETY_LOCK: &str = "SafetyLock";
pub const KEY_IONIZER: &str = "Ionizer";

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    #[serde(rename = "Username")]
    pub username: &'a str,
    #[serde(rename = "Password")]
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    #[serde(rename = "accessToken")]
    pub access_token: Option<String>,
}

/// One appliance as returned by the appliance list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplianceSnapshot {
    #[serde(rename = "pncId")]
    pub id: String,
    #[serde(rename = "applianceName", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twin: Option<Twin>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Twin {
    #[serde(rename = "deviceId", default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(rename = "connectionState", default, skip_serializing_if = "Option::is_none")]
    pub connection_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<TwinProperties>,
}

impl Twin {
    pub fn is_connected(&self) -> bool {
        self.connection_state.as_deref() == Some(CONNECTED)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwinProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported: Option<ReportedProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportedProperties {
    #[serde(rename = "CO2", default)]
    pub co2: Option<f64>,
    #[serde(rename = "Humidity", default)]
    pub humidity: Option<f64>,
    #[serde(rename = "PM1", default)]
    pub pm1: Option<f64>,
    #[serde(rename = "PM2_5", default)]
    pub pm2_5: Option<f64>,
    #[serde(rename = "PM10", default)]
    pub pm10: Option<f64>,
    #[serde(rename = "TVOC", default)]
    pub tvoc: Option<f64>,
    #[serde(rename = "EnvLightLvl", default)]
    pub env_light_lvl: Option<f64>,
    #[serde(rename = "Temp", default)]
    pub temp: Option<f64>,
    #[serde(rename = "FilterLife", default)]
    pub filter_life: Option<f64>,
    #[serde(rename = "Workmode", default)]
    pub workmode: Option<String>,
    #[serde(rename = "Fanspeed", default)]
    pub fanspeed: Option<i32>,
    #[serde(rename = "Ionizer", default)]
    pub ionizer: Option<bool>,
    #[serde(rename = "UILight", default)]
    pub ui_light: Option<bool>,
    #[serde(rename = "SafetyLock", default)]
    pub safety_lock: Option<bool>,
}

/// A desired-property patch sent with one command request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PropertyPatch(Map<String, Value>);

impl PropertyPatch {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self(Map::new()),
        }
    }
}

pub fn work_mode_patch(mode: WorkMode) -> PropertyPatch {
    PropertyPatch::from_value(json!({ (KEY_WORK_MODE): mode.as_remote_str() }))
}

/// Fan speed only applies in manual mode, so both go in one patch.
pub fn manual_fan_patch(step: i32) -> PropertyPatch {
    PropertyPatch::from_value(json!({
        (KEY_WORK_MODE): WorkMode::Manual.as_remote_str(),
        (KEY_FAN_SPEED): step,
    }))
}

pub fn light_patch(on: bool) -> PropertyPatch {
    PropertyPatch::from_value(json!({ (KEY_LED_RING): on }))
}

pub fn lock_patch(on: bool) -> PropertyPatch {
    PropertyPatch::from_value(json!({ (KEY_SAFETY_LOCK): on }))
}

pub fn ionizer_patch(on: bool) -> PropertyPatch {
    PropertyPatch::from_value(json!({ (KEY_IONIZER): on }))
}
