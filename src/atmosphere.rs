//! Preset library and time-based crossfade between cloud states.

use std::collections::HashMap;

use crate::params::{AtmospherePreset, AtmosphereValues, CloudState};

/// Presets keyed by state: built-ins, optionally overridden by config
#[derive(Debug, Clone)]
pub struct PresetLibrary {
    presets: HashMap<CloudState, AtmospherePreset>,
    last_visualized: Option<CloudState>,
}

impl PresetLibrary {
    pub fn builtin() -> Self {
        let presets = CloudState::ALL
            .into_iter()
            .map(|state| (state, AtmospherePreset::builtin(state)))
            .collect();
        Self {
            presets,
            last_visualized: None,
        }
    }

    /// Built-ins with `overrides` replacing the entries of their states
    pub fn with_overrides(overrides: &[AtmospherePreset]) -> Self {
        let mut library = Self::builtin();
        for preset in overrides {
            log::debug!("preset override for '{}'", preset.state.name());
            library.presets.insert(preset.state, preset.clone());
        }
        library
    }

    pub fn get(&self, state: CloudState) -> &AtmospherePreset {
        // Every state has a built-in entry
        &self.presets[&state]
    }

    /// Look up a preset and remember it as the last one shown
    pub fn visualize(&mut self, state: CloudState) -> AtmosphereValues {
        self.last_visualized = Some(state);
        self.get(state).values
    }

    pub fn last_visualized(&self) -> Option<CloudState> {
        self.last_visualized
    }
}

impl Default for PresetLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Idle,
    Blending {
        start: AtmosphereValues,
        target: AtmosphereValues,
        elapsed: f32,
    },
}

/// Crossfades the current values towards a target over a fixed duration.
///
/// A new request restarts the blend from whatever the current values are,
/// so there is never a jump.
#[derive(Debug, Clone)]
pub struct AtmosphereStateInterpolator {
    current: AtmosphereValues,
    duration: f32,
    state: State,
}

impl AtmosphereStateInterpolator {
    pub fn new(initial: AtmosphereValues, duration: f32) -> Self {
        Self {
            current: initial,
            duration: duration.max(0.0),
            state: State::Idle,
        }
    }

    pub fn current(&self) -> AtmosphereValues {
        self.current
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn is_blending(&self) -> bool {
        matches!(self.state, State::Blending { .. })
    }

    /// Progress of the active blend in [0, 1]; `None` when idle
    pub fn progress(&self) -> Option<f32> {
        match self.state {
            State::Blending { elapsed, .. } if self.duration > 0.0 => {
                Some((elapsed / self.duration).min(1.0))
            }
            State::Blending { .. } => Some(1.0),
            State::Idle => None,
        }
    }

    /// Start blending to `target`, replacing any blend in progress
    pub fn request_transition(&mut self, target: AtmosphereValues) {
        if self.duration <= 0.0 {
            self.current = target;
            self.state = State::Idle;
            return;
        }
        self.state = State::Blending {
            start: self.current,
            target,
            elapsed: 0.0,
        };
    }

    /// Advance by `dt` seconds and return the updated values
    pub fn tick(&mut self, dt: f32) -> AtmosphereValues {
        if let State::Blending {
            start,
            target,
            elapsed,
        } = &mut self.state
        {
            *elapsed += dt.max(0.0);
            if *elapsed >= self.duration {
                self.current = *target;
                self.state = State::Idle;
            } else {
                self.current = start.lerp(target, *elapsed / self.duration);
            }
        }
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(v: f32) -> AtmosphereValues {
        AtmosphereValues::from_array([v; AtmosphereValues::FIELD_COUNT])
    }

    #[test]
    fn test_library_has_every_state() {
        let library = PresetLibrary::builtin();
        for state in CloudState::ALL {
            assert_eq!(library.get(state).state, state);
        }
    }

    #[test]
    fn test_overrides_replace_builtins() {
        let custom = AtmospherePreset {
            state: CloudState::Overcast,
            values: values(2.0),
        };
        let mut library = PresetLibrary::with_overrides(&[custom]);
        assert_eq!(library.get(CloudState::Overcast).values, values(2.0));
        assert_eq!(
            library.get(CloudState::Clear),
            &AtmospherePreset::builtin(CloudState::Clear)
        );

        assert_eq!(library.last_visualized(), None);
        library.visualize(CloudState::Overcast);
        assert_eq!(library.last_visualized(), Some(CloudState::Overcast));
    }

    #[test]
    fn test_blend_reaches_target_exactly() {
        let mut interp = AtmosphereStateInterpolator::new(values(0.0), 2.0);
        interp.request_transition(values(1.0));

        assert_eq!(interp.tick(0.0), values(0.0));
        interp.tick(1.5);
        interp.tick(1.0);
        assert_eq!(interp.current(), values(1.0));
        assert!(!interp.is_blending());
    }

    #[test]
    fn test_blend_is_monotonic() {
        let mut interp = AtmosphereStateInterpolator::new(values(-1.0), 1.0);
        interp.request_transition(values(3.0));

        let mut previous = interp.current().cloud_scale;
        for _ in 0..20 {
            let now = interp.tick(0.07).cloud_scale;
            assert!(now >= previous);
            previous = now;
        }
        assert_eq!(previous, 3.0);
    }

    #[test]
    fn test_halfway_value() {
        let mut interp = AtmosphereStateInterpolator::new(values(0.0), 4.0);
        interp.request_transition(values(2.0));
        let mid = interp.tick(2.0);
        assert!((mid.exposure - 1.0).abs() < 1e-6);
        assert_eq!(interp.progress(), Some(0.5));
    }

    #[test]
    fn test_rerequest_continues_from_current() {
        let mut interp = AtmosphereStateInterpolator::new(values(0.0), 1.0);
        interp.request_transition(values(1.0));
        let before = interp.tick(0.5);

        interp.request_transition(values(-1.0));
        assert_eq!(interp.current(), before);
        let after = interp.tick(0.0);
        assert_eq!(after, before);

        let next = interp.tick(0.25);
        assert!(next.phase_factor < before.phase_factor);
        assert!(next.phase_factor > -1.0);
    }

    #[test]
    fn test_zero_duration_snaps() {
        let mut interp = AtmosphereStateInterpolator::new(values(0.0), 0.0);
        interp.request_transition(values(5.0));
        assert_eq!(interp.current(), values(5.0));
        assert!(!interp.is_blending());
        assert_eq!(interp.tick(0.1), values(5.0));
    }
}
