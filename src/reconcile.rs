use crate::protocol::{ApplianceSnapshot, ReportedProperties};
use crate::types::*;

/// Turn a fetched appliance into local state, or classify why it can't be.
/// Rules apply in order; the first one that matches wins.
pub fn reconcile(snapshot: Option<&ApplianceSnapshot>) -> Result<LocalState, Unavailability> {
    let snapshot = snapshot.ok_or(Unavailability::NotInAccount)?;
    let twin = snapshot.twin.as_ref().ok_or(Unavailability::NoData)?;
    if !twin.is_connected() {
        return Err(Unavailability::Disconnected);
    }
    let reported = twin
        .properties
        .as_ref()
        .and_then(|p| p.reported.as_ref())
        .ok_or(Unavailability::NoProperties)?;
    Ok(local_state(reported))
}

fn local_state(props: &ReportedProperties) -> LocalState {
    let measurements = Measurements {
        co2: props.co2,
        humidity: props.humidity,
        pm1: props.pm1,
        pm2_5: props.pm2_5,
        pm10: props.pm10,
        voc: props.tvoc,
        luminance: props.env_light_lvl.unwrap_or(0.0),
        temperature: props.temp,
        filter_life: props.filter_life,
    };

    let work_mode = props.workmode.as_deref().and_then(WorkMode::from_remote_str);
    let (power, mode, fan_speed) = match work_mode {
        Some(WorkMode::Auto) => (
            true,
            Some(Mode::Smart),
            props.fanspeed.map(fan_speed_from_remote),
        ),
        Some(WorkMode::Manual) => (
            true,
            Some(Mode::Manual),
            props.fanspeed.map(fan_speed_from_remote),
        ),
        // PowerOff and anything unrecognized read as off.
        _ => (false, None, Some(0)),
    };

    LocalState {
        power,
        mode,
        fan_speed,
        light: props.ui_light,
        lock: props.safety_lock,
        ionizer: props.ionizer,
        measurements,
    }
}
