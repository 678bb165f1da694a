//! Listening-safety limits on output level and session length.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::SafetyConfig;

/// Fraction of the emergency threshold the level must drop below to clear it.
const EMERGENCY_CLEAR_RATIO: f32 = 0.9;

/// Observable safety interventions.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "event", rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SafetyEvent {
    VolumeWarning { rms: f32 },
    /// Master gain is being reduced.
    VolumeEmergency { rms: f32 },
    EmergencyCleared,
    DurationWarning { elapsed: f64 },
    /// Output is fading to silence and every track will be stopped.
    DurationLimit { elapsed: f64 },
}

/// Snapshot for callers polling the monitor.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SafetyStatus {
    pub session_active: bool,
    /// Seconds in the running session.
    pub session_elapsed: f64,
    /// Seconds across all sessions of this engine, including the running one.
    pub total_elapsed: f64,
    pub last_rms: f32,
    pub volume_warned: bool,
    pub emergency: bool,
    pub duration_warned: bool,
    pub duration_limited: bool,
}

#[derive(Debug, Clone)]
pub struct SafetyMonitor {
    config: SafetyConfig,
    session_start: Option<f64>,
    prior_total: f64,
    last_warning: Option<f64>,
    last_rms: f32,
    volume_warned: bool,
    emergency: bool,
    duration_warned: bool,
    duration_limited: bool,
    /// Latest time seen, for status reports between checks.
    now: f64,
}

impl SafetyMonitor {
    pub fn new(config: SafetyConfig) -> Self {
        Self {
            config,
            session_start: None,
            prior_total: 0.0,
            last_warning: None,
            last_rms: 0.0,
            volume_warned: false,
            emergency: false,
            duration_warned: false,
            duration_limited: false,
            now: 0.0,
        }
    }

    pub fn config(&self) -> &SafetyConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.session_start.is_some()
    }

    /// Start a session at `now`. A running session is left alone.
    pub fn start_session(&mut self, now: f64) {
        if self.session_start.is_some() {
            return;
        }
        self.session_start = Some(now);
        self.now = now;
        self.reset_flags();
    }

    /// End the running session and bank its time.
    pub fn end_session(&mut self, now: f64) {
        if let Some(start) = self.session_start.take() {
            self.prior_total += (now - start).max(0.0);
        }
        self.now = now;
        self.reset_flags();
    }

    fn reset_flags(&mut self) {
        self.last_warning = None;
        self.volume_warned = false;
        self.emergency = false;
        self.duration_warned = false;
        self.duration_limited = false;
    }

    fn cooled_down(&self, now: f64) -> bool {
        match self.last_warning {
            Some(at) => now - at >= self.config.warning_cooldown_secs,
            None => true,
        }
    }

    /// Sample the output level at `now`. Idle monitors report nothing.
    pub fn check(&mut self, now: f64, rms: f32) -> Vec<SafetyEvent> {
        let mut events = Vec::new();
        self.now = now;
        self.last_rms = rms;
        let Some(start) = self.session_start else {
            return events;
        };

        if self.emergency {
            if rms < self.config.volume_emergency * EMERGENCY_CLEAR_RATIO {
                self.emergency = false;
                events.push(SafetyEvent::EmergencyCleared);
            }
        } else if rms >= self.config.volume_emergency {
            self.emergency = true;
            events.push(SafetyEvent::VolumeEmergency { rms });
        }

        if !self.emergency && rms >= self.config.volume_warning && self.cooled_down(now) {
            self.last_warning = Some(now);
            self.volume_warned = true;
            events.push(SafetyEvent::VolumeWarning { rms });
        }

        let elapsed = (now - start).max(0.0);
        if !self.duration_limited && elapsed >= self.config.duration_limit_secs {
            self.duration_limited = true;
            events.push(SafetyEvent::DurationLimit { elapsed });
        } else if !self.duration_warned
            && elapsed >= self.config.duration_warning_secs
            && self.cooled_down(now)
        {
            self.duration_warned = true;
            self.last_warning = Some(now);
            events.push(SafetyEvent::DurationWarning { elapsed });
        }

        events
    }

    pub fn status(&self) -> SafetyStatus {
        let session_elapsed = self
            .session_start
            .map(|start| (self.now - start).max(0.0))
            .unwrap_or(0.0);
        SafetyStatus {
            session_active: self.session_start.is_some(),
            session_elapsed,
            total_elapsed: self.prior_total + session_elapsed,
            last_rms: self.last_rms,
            volume_warned: self.volume_warned,
            emergency: self.emergency,
            duration_warned: self.duration_warned,
            duration_limited: self.duration_limited,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> SafetyMonitor {
        let mut monitor = SafetyMonitor::new(SafetyConfig::default());
        monitor.start_session(0.0);
        monitor
    }

    #[test]
    fn idle_monitor_is_silent() {
        let mut monitor = SafetyMonitor::new(SafetyConfig::default());
        assert!(monitor.check(1.0, 0.99).is_empty());
    }

    #[test]
    fn emergency_ignores_cooldown() {
        let mut monitor = monitor();
        assert_eq!(
            monitor.check(0.1, 0.85),
            vec![SafetyEvent::VolumeWarning { rms: 0.85 }]
        );
        // Inside the cooldown window, but emergencies are never rate limited.
        assert_eq!(
            monitor.check(0.2, 0.96),
            vec![SafetyEvent::VolumeEmergency { rms: 0.96 }]
        );
    }

    #[test]
    fn emergency_clears_below_ninety_percent() {
        let mut monitor = monitor();
        monitor.check(0.1, 0.96);
        // 0.9 is above 0.9 * 0.95 = 0.855.
        assert!(monitor.check(0.2, 0.9).is_empty());
        assert!(monitor.status().emergency);
        assert!(monitor
            .check(0.3, 0.5)
            .contains(&SafetyEvent::EmergencyCleared));
        assert!(!monitor.status().emergency);
    }

    #[test]
    fn sustained_warning_level_is_rate_limited() {
        let mut monitor = monitor();
        let mut warnings = 0;
        // Ten minutes at 0.85, checked every 100 ms.
        for step in 1..=6_000 {
            let now = step as f64 * 0.1;
            warnings += monitor
                .check(now, 0.85)
                .iter()
                .filter(|event| matches!(event, SafetyEvent::VolumeWarning { .. }))
                .count();
        }
        assert_eq!(warnings, 2);
    }

    #[test]
    fn duration_limit_fires_once() {
        let mut monitor = monitor();
        assert!(matches!(
            monitor.check(45.0 * 60.0, 0.1).as_slice(),
            [SafetyEvent::DurationWarning { .. }]
        ));
        assert!(matches!(
            monitor.check(60.0 * 60.0, 0.1).as_slice(),
            [SafetyEvent::DurationLimit { .. }]
        ));
        assert!(monitor.check(60.0 * 60.0 + 1.0, 0.1).is_empty());
    }

    #[test]
    fn end_session_banks_time() {
        let mut monitor = monitor();
        monitor.check(30.0, 0.0);
        monitor.end_session(40.0);
        monitor.start_session(100.0);
        monitor.check(105.0, 0.0);
        let status = monitor.status();
        assert_eq!(status.session_elapsed, 5.0);
        assert_eq!(status.total_elapsed, 45.0);
    }
}
