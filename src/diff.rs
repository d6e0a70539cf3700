use serde_json::Value;

use crate::types::*;

/// Recursive leaf diff of two JSON documents. Arrays compare as whole values.
pub(crate) fn diff_json(
    previous: &Value,
    current: &Value,
    path_prefix: &str,
    changes: &mut Vec<(String, Value, Value)>,
) {
    match (previous, current) {
        (Value::Object(prev_map), Value::Object(curr_map)) => {
            for (key, curr_val) in curr_map {
                let path = if path_prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{path_prefix}.{key}")
                };
                match prev_map.get(key) {
                    Some(prev_val) => diff_json(prev_val, curr_val, &path, changes),
                    None => {
                        if curr_val.is_object() {
                            diff_json(&Value::Object(serde_json::Map::new()), curr_val, &path, changes);
                        } else {
                            changes.push((path, Value::Null, curr_val.clone()));
                        }
                    }
                }
            }
        }
        (prev, curr) if prev != curr => {
            changes.push((path_prefix.to_string(), prev.clone(), curr.clone()));
        }
        _ => {}
    }
}

/// Typed events for every field that differs between two reconciliations.
/// With no previous state every field is reported.
pub(crate) fn state_events(previous: Option<&LocalState>, current: &LocalState) -> Vec<Event> {
    let mut events = Vec::new();

    if previous.map(|p| p.power) != Some(current.power) {
        events.push(Event::PowerChanged {
            power: current.power,
        });
    }
    if previous.map(|p| p.mode) != Some(current.mode) {
        events.push(Event::ModeChanged { mode: current.mode });
    }
    if previous.map(|p| p.fan_speed) != Some(current.fan_speed) {
        events.push(Event::FanSpeedChanged {
            fan_speed: current.fan_speed,
        });
    }
    if previous.map(|p| p.light) != Some(current.light) {
        events.push(Event::LightChanged { on: current.light });
    }
    if previous.map(|p| p.lock) != Some(current.lock) {
        events.push(Event::LockChanged { on: current.lock });
    }
    if previous.map(|p| p.ionizer) != Some(current.ionizer) {
        events.push(Event::IonizerChanged {
            on: current.ionizer,
        });
    }

    for measurement in Measurement::ALL {
        let value = current.measurements.get(measurement);
        if previous.map(|p| p.measurements.get(measurement)) != Some(value) {
            events.push(Event::MeasurementChanged { measurement, value });
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn running() -> LocalState {
        LocalState {
            power: true,
            mode: Some(Mode::Smart),
            fan_speed: Some(50),
            light: Some(true),
            lock: Some(false),
            ionizer: Some(false),
            measurements: Measurements {
                pm2_5: Some(3.0),
                ..Default::default()
            },
        }
    }

    #[test]
    fn json_diff_walks_reported_properties() {
        let prev = json!({"reported": {"PM10": 7.0, "Humidity": 45.0}});
        let curr = json!({"reported": {"PM10": 9.0, "Humidity": 45.0, "Temp": 22}});
        let mut changes = Vec::new();
        diff_json(&prev, &curr, "", &mut changes);
        changes.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            changes,
            vec![
                ("reported.PM10".to_string(), json!(7.0), json!(9.0)),
                ("reported.Temp".to_string(), Value::Null, json!(22)),
            ]
        );

        let mut none = Vec::new();
        diff_json(&curr, &curr, "", &mut none);
        assert!(none.is_empty());
    }

    #[test]
    fn first_state_reports_everything() {
        let events = state_events(None, &running());
        assert!(events.contains(&Event::PowerChanged { power: true }));
        assert!(events.contains(&Event::FanSpeedChanged { fan_speed: Some(50) }));
        let measurements = events
            .iter()
            .filter(|e| matches!(e, Event::MeasurementChanged { .. }))
            .count();
        assert_eq!(measurements, Measurement::ALL.len());
    }

    #[test]
    fn identical_state_is_quiet() {
        let state = running();
        assert!(state_events(Some(&state), &state).is_empty());
    }

    #[test]
    fn power_off_reports_coupled_fields() {
        let prev = running();
        let curr = LocalState {
            power: false,
            mode: None,
            fan_speed: Some(0),
            ..prev.clone()
        };
        let events = state_events(Some(&prev), &curr);
        assert_eq!(
            events,
            vec![
                Event::PowerChanged { power: false },
                Event::ModeChanged { mode: None },
                Event::FanSpeedChanged { fan_speed: Some(0) },
            ]
        );
    }

    #[test]
    fn measurement_change() {
        let prev = running();
        let mut curr = prev.clone();
        curr.measurements.pm2_5 = Some(12.0);
        assert_eq!(
            state_events(Some(&prev), &curr),
            vec![Event::MeasurementChanged {
                measurement: Measurement::Pm2_5,
                value: Some(12.0),
            }]
        );
    }
}
