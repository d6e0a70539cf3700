use crate::protocol::{
    PropertyPatch, ionizer_patch, light_patch, lock_patch, manual_fan_patch, work_mode_patch,
};
use crate::types::*;

/// Fields a caller wants changed in one request. `None` means "leave alone".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandIntent {
    pub power: Option<bool>,
    pub mode: Option<Mode>,
    pub fan_speed: Option<i32>,
    pub light: Option<bool>,
    pub lock: Option<bool>,
    pub ionizer: Option<bool>,
}

impl CommandIntent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn power(mut self, on: bool) -> Self {
        self.power = Some(on);
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn fan_speed(mut self, speed: i32) -> Self {
        self.fan_speed = Some(speed);
        self
    }

    pub fn light(mut self, on: bool) -> Self {
        self.light = Some(on);
        self
    }

    pub fn lock(mut self, on: bool) -> Self {
        self.lock = Some(on);
        self
    }

    pub fn ionizer(mut self, on: bool) -> Self {
        self.ionizer = Some(on);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// True when every patch [`translate`] would emit is already reflected in
    /// `state`, including the work mode those patches imply.
    pub fn is_satisfied_by(&self, state: &LocalState) -> bool {
        let work_mode_ok = match (self.power, self.mode) {
            (Some(false), _) => !state.power,
            (Some(true), mode) => state.power && state.mode == Some(mode.unwrap_or(Mode::Smart)),
            (None, Some(mode)) => state.power && state.mode == Some(mode),
            (None, None) => true,
        };
        let fan_ok = match self.fan_speed {
            None => true,
            Some(speed) if speed <= 0 => !state.power,
            Some(speed) => {
                let reported = fan_speed_from_remote(fan_speed_to_remote(speed));
                state.power && state.mode == Some(Mode::Manual) && state.fan_speed == Some(reported)
            }
        };
        work_mode_ok
            && fan_ok
            && self.light.is_none_or(|on| state.light == Some(on))
            && self.lock.is_none_or(|on| state.lock == Some(on))
            && self.ionizer.is_none_or(|on| state.ionizer == Some(on))
    }
}

/// Translate an intent into the patches to send, in send order.
pub fn translate(intent: &CommandIntent) -> Vec<PropertyPatch> {
    let mut patches = Vec::new();

    match (intent.power, intent.mode) {
        (Some(false), _) => patches.push(work_mode_patch(WorkMode::PowerOff)),
        (Some(true), mode) => {
            let mode = mode.unwrap_or(Mode::Smart);
            patches.push(work_mode_patch(mode.work_mode()));
        }
        (None, Some(mode)) => patches.push(work_mode_patch(mode.work_mode())),
        (None, None) => {}
    }

    if let Some(on) = intent.light {
        patches.push(light_patch(on));
    }
    if let Some(on) = intent.lock {
        patches.push(lock_patch(on));
    }
    if let Some(on) = intent.ionizer {
        patches.push(ionizer_patch(on));
    }

    if let Some(speed) = intent.fan_speed {
        if speed <= 0 {
            patches.push(work_mode_patch(WorkMode::PowerOff));
        } else {
            patches.push(manual_fan_patch(fan_speed_to_remote(speed)));
        }
    }

    patches
}
