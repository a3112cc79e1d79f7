// Copyright (c) 2024 Mike Tsao

use super::{AudioRenderer, AudioSink, WaveformProvider};
use crate::{
    composition::{flatten, Rhythm},
    error::Result,
    scheduling::{beat_delay_ns, check_timing},
    types::Tempo,
};

/// Renders `cycles` complete passes through `rhythm` into `sink` as fast as
/// the sink accepts them, with no clock involved. Returns the number of
/// samples written.
///
/// Each beat gets the same number of samples it would get from a live
/// metronome at this tempo.
pub fn render_cycles<S: AudioSink, W: WaveformProvider>(
    rhythm: &Rhythm,
    tempo: Tempo,
    beat_value: f32,
    cycles: usize,
    sink: S,
    waveforms: W,
) -> Result<usize> {
    let beats = flatten(rhythm);
    check_timing(&beats, tempo, beat_value)?;
    let mut renderer = AudioRenderer::new_with(
        sink,
        waveforms,
        AudioRenderer::<S, W>::DEFAULT_SILENCE_CHUNK_FRAMES,
    );
    let mut total = 0;
    for _ in 0..cycles {
        for beat in beats.iter() {
            total += renderer.render(
                beat_delay_ns(beat, tempo, beat_value),
                beat.is_accented,
                beat.is_rest(),
            )?;
        }
    }
    Ok(total)
}

/// Renders `cycles` passes through `rhythm` with synthesized ticks into a
/// mono WAV file.
#[cfg(feature = "hound")]
pub fn export_to_wav<P: AsRef<std::path::Path>>(
    path: P,
    rhythm: &Rhythm,
    tempo: Tempo,
    beat_value: f32,
    cycles: usize,
    sample_rate: crate::types::SampleRate,
) -> anyhow::Result<usize> {
    let mut sink = super::WavSink::create(path, sample_rate)?;
    let total = render_cycles(
        rhythm,
        tempo,
        beat_value,
        cycles,
        &mut sink,
        super::TickWaveforms::synthesized(sample_rate),
    )?;
    sink.finish()?;
    Ok(total)
}
