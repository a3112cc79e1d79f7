// Copyright (c) 2024 Mike Tsao

//! Configuration for a metronome. Intended to be serialized, although
//! persisting it is up to the application.

use crate::{
    composition::Rhythm,
    error::{MetronomeError, Result},
    scheduling::TickScheduler,
    types::Tempo,
};
use derivative::Derivative;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Everything about a metronome except its rhythm.
#[derive(Clone, Debug, Derivative, Builder, PartialEq, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(rename_all = "kebab-case")]
#[builder(default, build_fn(private, name = "build_from_builder"))]
pub struct MetronomeSettings {
    /// The starting tempo.
    #[serde(default)]
    pub tempo: Tempo,

    /// Converts whole-note fractions into beats. 4.0 makes a quarter note one
    /// beat.
    #[derivative(Default(value = "4.0"))]
    #[serde(default = "MetronomeSettings::default_beat_value")]
    pub beat_value: f32,

    /// The largest single write of silence, in frames.
    #[derivative(Default(value = "1024"))]
    #[serde(default = "MetronomeSettings::default_silence_chunk_frames")]
    pub silence_chunk_frames: usize,

    /// A disabled metronome ignores requests to start.
    #[derivative(Default(value = "true"))]
    #[serde(default = "MetronomeSettings::default_enabled")]
    pub enabled: bool,
}
impl MetronomeSettings {
    fn default_beat_value() -> f32 {
        Self::default().beat_value
    }

    fn default_silence_chunk_frames() -> usize {
        Self::default().silence_chunk_frames
    }

    fn default_enabled() -> bool {
        true
    }

    /// Checks the fields that can't be checked by their types.
    pub fn validate(&self) -> Result<()> {
        Tempo::new_with(self.tempo.bpm())?;
        if !(self.beat_value.is_finite() && self.beat_value > 0.0) {
            return Err(MetronomeError::InvalidBeatValue(self.beat_value));
        }
        Ok(())
    }

    /// Parses and validates settings from JSON.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    #[allow(missing_docs)]
    pub fn to_json_string(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// A [TickScheduler] configured with these settings.
    pub fn new_scheduler(&self, rhythm: Rhythm) -> Result<TickScheduler> {
        self.validate()?;
        let mut scheduler = TickScheduler::new_with(rhythm, self.tempo, self.beat_value)?;
        scheduler.set_enabled(self.enabled);
        Ok(scheduler)
    }
}
impl MetronomeSettingsBuilder {
    /// Builds the item.
    pub fn build(&self) -> core::result::Result<MetronomeSettings, MetronomeSettingsBuilderError> {
        let settings = self.build_from_builder()?;
        settings
            .validate()
            .map_err(|e| MetronomeSettingsBuilderError::ValidationError(e.to_string()))?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = MetronomeSettings::default();
        assert_eq!(settings.tempo, Tempo(120));
        assert_eq!(settings.beat_value, 4.0);
        assert_eq!(settings.silence_chunk_frames, 1024);
        assert!(settings.enabled);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn builder_validates() {
        let settings = MetronomeSettingsBuilder::default()
            .tempo(Tempo(90))
            .beat_value(8.0)
            .build()
            .unwrap();
        assert_eq!(settings.tempo, Tempo(90));
        assert_eq!(settings.beat_value, 8.0);
        assert!(settings.enabled, "unset fields take their defaults");

        assert!(matches!(
            MetronomeSettingsBuilder::default().tempo(Tempo(0)).build(),
            Err(MetronomeSettingsBuilderError::ValidationError(_))
        ));
        assert!(MetronomeSettingsBuilder::default()
            .beat_value(-1.0)
            .build()
            .is_err());
    }

    #[test]
    fn json() {
        let settings = MetronomeSettingsBuilder::default()
            .tempo(Tempo(72))
            .enabled(false)
            .build()
            .unwrap();
        let json = settings.to_json_string().unwrap();
        assert!(json.contains("\"beat-value\""), "keys should be kebab-case: {json}");
        assert_eq!(MetronomeSettings::from_json_str(&json).unwrap(), settings);

        // Missing fields fall back to defaults.
        let partial = MetronomeSettings::from_json_str(r#"{"tempo": 100}"#).unwrap();
        assert_eq!(partial.tempo, Tempo(100));
        assert_eq!(partial.beat_value, 4.0);
        assert!(partial.enabled);

        assert!(MetronomeSettings::from_json_str(r#"{"tempo": 0}"#).is_err());
        assert!(MetronomeSettings::from_json_str(r#"{"tempo": 60, "beat-value": 0.0}"#).is_err());
    }

    #[test]
    fn scheduler_from_settings() {
        let settings = MetronomeSettingsBuilder::default()
            .tempo(Tempo(60))
            .enabled(false)
            .build()
            .unwrap();
        let scheduler = settings.new_scheduler(Rhythm::default()).unwrap();
        assert_eq!(scheduler.tempo(), Tempo(60));
        assert!(!scheduler.is_enabled());
        assert_eq!(scheduler.current_beats().len(), 4);
    }
}
