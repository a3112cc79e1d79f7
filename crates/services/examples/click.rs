// Copyright (c) 2024 Mike Tsao

use clap::Parser;
use metrum::{
    audio::{AudioSink, TickWaveforms},
    composition::{Measure, Note, Rhythm, Tuplet},
    metronome::{MetronomeEvent, MetronomeService},
    types::{SampleRate, Tempo, TimeSignature},
    util::MetronomeSettingsBuilder,
};
use metrum_services::CpalAudioSink;
use std::time::{Duration, Instant};

#[derive(clap::Parser, Debug, Default)]
#[clap(author, about, long_about = None)]
struct Args {
    /// Beats per minute
    #[clap(short = 'b', long, value_parser, default_value_t = 120)]
    bpm: u32,

    /// Time signature, such as 3/4 or 6/8
    #[clap(short = 't', long, value_parser, default_value = "4/4")]
    time_signature: String,

    /// Play a measure of triplets after every measure of plain ticks
    #[clap(long)]
    triplets: bool,

    /// How long to play, in seconds
    #[clap(short = 's', long, value_parser, default_value_t = 10)]
    seconds: u64,
}

fn parse_time_signature(s: &str) -> anyhow::Result<TimeSignature> {
    let (top, bottom) = s
        .split_once('/')
        .ok_or_else(|| anyhow::anyhow!("expected a time signature like 4/4, got {s}"))?;
    Ok(TimeSignature::new_with(top.trim().parse()?, bottom.trim().parse()?)?)
}

fn build_rhythm(time_signature: TimeSignature, triplets: bool) -> anyhow::Result<Rhythm> {
    let plain = Rhythm::simple(time_signature, true);
    if !triplets {
        return Ok(plain);
    }
    let beat = 1.0 / time_signature.bottom() as f64;
    let triplet_measure = Measure::new_with(
        time_signature,
        (0..time_signature.top())
            .map(|i| {
                Tuplet::triplet(vec![
                    Note::tick(beat / 2.0, i == 0),
                    Note::tick(beat / 2.0, false),
                    Note::tick(beat / 2.0, false),
                ])
                .map(Into::into)
            })
            .collect::<Result<Vec<_>, _>>()?,
    );
    let mut measures = plain.measures().to_vec();
    measures.push(triplet_measure);
    Ok(Rhythm::new_with(measures)?)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let time_signature = parse_time_signature(&args.time_signature)?;
    let rhythm = build_rhythm(time_signature, args.triplets)?;
    let settings = MetronomeSettingsBuilder::default()
        .tempo(Tempo::new_with(args.bpm)?)
        .build()?;

    let sink = CpalAudioSink::new_with(None)?;
    let sample_rate: SampleRate = sink.sample_rate();
    let metronome = MetronomeService::new_with(
        &settings,
        rhythm,
        sink,
        TickWaveforms::synthesized(sample_rate),
    )?;
    let subscription = metronome.subscribe()?;
    metronome.start()?;

    let deadline = Instant::now() + Duration::from_secs(args.seconds);
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match subscription.receiver().recv_timeout(remaining) {
            Ok(MetronomeEvent::Beat(beat)) => {
                let symbol = match (beat.is_rest(), beat.is_accented) {
                    (true, _) => '.',
                    (false, true) => '!',
                    (false, false) => '*',
                };
                println!(
                    "{symbol} measure {} beat {}",
                    beat.measure_index + 1,
                    beat.position_in_measure + 1
                );
            }
            Ok(MetronomeEvent::DeviceFailed(e)) => {
                eprintln!("Audio device failed: {e}");
                break;
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }

    metronome.quit();
    Ok(())
}
