// Copyright (c) 2024 Mike Tsao

use super::observers::{ObserverId, ObserverList, Subscription};
use crate::{
    audio::{AudioRenderer, AudioSink, SinkError, WaveformProvider},
    composition::{Beat, Rhythm},
    error::{MetronomeError, Result},
    scheduling::{ArmedTick, MonotonicClock, SystemClock, TickScheduler, TimerQueue},
    tap_tempo::TapTempoEstimator,
    traits::ProvidesService,
    types::Tempo,
    util::{CrossbeamChannel, MetronomeSettings},
};
use core::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::{debug, error, info, warn};
use std::sync::{Arc, RwLock};

/// A [MetronomeInput] tells [MetronomeService] what to do. Most callers use
/// the service's methods rather than sending these directly, because the
/// methods validate their arguments first.
#[derive(Debug)]
pub enum MetronomeInput {
    /// Starts playback from the first beat of the rhythm.
    Start,
    /// Stops playback. Audio that was already written may still be flushed.
    Stop,
    /// Replaces the rhythm, stopping playback if needed.
    SetRhythm(Rhythm),
    #[allow(missing_docs)]
    SetTempo(Tempo),
    /// Must be positive and finite.
    SetBeatValue(f32),
    #[allow(missing_docs)]
    SetEnabled(bool),
    /// A tap-tempo tap at the given clock time.
    Tap(u64),
    #[allow(missing_docs)]
    Subscribe(ObserverId, Sender<MetronomeEvent>),
    #[allow(missing_docs)]
    Unsubscribe(ObserverId),
    /// Asks the service to exit.
    Quit,
}

/// A [MetronomeEvent] informs observers what's going on.
#[derive(Clone, Debug, PartialEq)]
pub enum MetronomeEvent {
    /// A beat's timer fired and its audio is about to be written.
    Beat(Beat),
    #[allow(missing_docs)]
    PlayStateChanged(bool),
    /// The rhythm was replaced. Playback has stopped if it was running.
    RhythmReplaced(Rhythm),
    /// The tempo changed, either by request or by a tap-tempo commit.
    TempoChanged(Tempo),
    /// The tap-tempo estimate after the latest tap.
    TapEstimate(Option<u32>),
    /// The audio output failed and playback stopped.
    DeviceFailed(String),
    /// The service has exited.
    Quit,
}

/// A copy of the daemon's state as of its last state transition.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetronomeSnapshot {
    #[allow(missing_docs)]
    pub is_playing: bool,
    #[allow(missing_docs)]
    pub is_enabled: bool,
    #[allow(missing_docs)]
    pub tempo: Tempo,
    #[allow(missing_docs)]
    pub beat_value: f32,
    #[allow(missing_docs)]
    pub rhythm: Rhythm,
    /// The flattened beats of `rhythm`.
    pub beats: Vec<Beat>,
}
impl MetronomeSnapshot {
    fn new_with(scheduler: &TickScheduler) -> Self {
        Self {
            is_playing: scheduler.is_playing(),
            is_enabled: scheduler.is_enabled(),
            tempo: scheduler.tempo(),
            beat_value: scheduler.beat_value(),
            rhythm: scheduler.rhythm().clone(),
            beats: scheduler.current_beats().to_vec(),
        }
    }
}

/// A metronome running on its own thread.
///
/// The daemon thread owns the scheduler, the timers, and the audio output, and
/// it's the only thread that ever writes audio. Everything here is a message
/// to that thread, so calls return without waiting. State queries like
/// [is_playing()](Self::is_playing) reflect the last transition the daemon
/// has finished.
///
/// The service's own [receiver()](ProvidesService::receiver) holds at most
/// [EVENT_CHANNEL_CAPACITY](Self::EVENT_CHANNEL_CAPACITY) undelivered events,
/// and events that arrive while it's full are dropped. Use
/// [subscribe()](Self::subscribe) to see every event.
#[derive(Debug)]
pub struct MetronomeService {
    inputs: CrossbeamChannel<MetronomeInput>,
    events: CrossbeamChannel<MetronomeEvent>,

    snapshot: Arc<RwLock<MetronomeSnapshot>>,
    interrupt: Arc<AtomicBool>,
    clock: Arc<dyn MonotonicClock>,
    next_observer_id: AtomicUsize,
}
impl ProvidesService<MetronomeInput, MetronomeEvent> for MetronomeService {
    fn sender(&self) -> &Sender<MetronomeInput> {
        &self.inputs.sender
    }

    fn receiver(&self) -> &Receiver<MetronomeEvent> {
        &self.events.receiver
    }
}
impl Drop for MetronomeService {
    fn drop(&mut self) {
        self.interrupt.store(true, Ordering::Release);
        let _ = self.inputs.sender.try_send(MetronomeInput::Quit);
    }
}
impl MetronomeService {
    /// How many events the service's own event channel keeps for a caller
    /// that isn't reading it.
    pub const EVENT_CHANNEL_CAPACITY: usize = 16;

    /// Creates the service and starts its thread, using the system clock.
    pub fn new_with<S, W>(
        settings: &MetronomeSettings,
        rhythm: Rhythm,
        sink: S,
        waveforms: W,
    ) -> Result<Self>
    where
        S: AudioSink + 'static,
        W: WaveformProvider + 'static,
    {
        Self::new_with_clock(
            settings,
            rhythm,
            sink,
            waveforms,
            Arc::new(SystemClock::default()),
        )
    }

    /// Creates the service and starts its thread, using the supplied clock.
    pub fn new_with_clock<S, W>(
        settings: &MetronomeSettings,
        rhythm: Rhythm,
        sink: S,
        waveforms: W,
        clock: Arc<dyn MonotonicClock>,
    ) -> Result<Self>
    where
        S: AudioSink + 'static,
        W: WaveformProvider + 'static,
    {
        let scheduler = settings.new_scheduler(rhythm)?;
        let renderer = AudioRenderer::new_with(sink, waveforms, settings.silence_chunk_frames);
        let r = Self {
            inputs: Default::default(),
            events: CrossbeamChannel::new_bounded(Self::EVENT_CHANNEL_CAPACITY),
            snapshot: Arc::new(RwLock::new(MetronomeSnapshot::new_with(&scheduler))),
            interrupt: renderer.interrupt_flag(),
            clock,
            next_observer_id: AtomicUsize::new(1),
        };
        r.spawn_thread(scheduler, renderer);
        Ok(r)
    }

    fn spawn_thread<S, W>(&self, scheduler: TickScheduler, renderer: AudioRenderer<S, W>)
    where
        S: AudioSink + 'static,
        W: WaveformProvider + 'static,
    {
        let receiver = self.inputs.receiver.clone();
        let mut observers = ObserverList::default();
        observers.add(ObserverId(0), self.events.sender.clone());
        let snapshot = Arc::clone(&self.snapshot);
        let clock = Arc::clone(&self.clock);
        std::thread::spawn(move || {
            let mut daemon = MetronomeServiceDaemon {
                receiver,
                observers,
                scheduler,
                timers: Default::default(),
                tap_tempo: Default::default(),
                renderer,
                clock,
                snapshot,
            };
            daemon.execute();
        });
    }

    fn send(&self, input: MetronomeInput) -> Result<()> {
        if self.send_input(input) {
            Ok(())
        } else {
            Err(MetronomeError::ServiceUnavailable)
        }
    }

    /// Starts playback. Does nothing if already playing, disabled, or the
    /// rhythm has no notes.
    pub fn start(&self) -> Result<()> {
        self.send(MetronomeInput::Start)
    }

    /// Stops playback, abandoning any audio write in progress.
    pub fn stop(&self) -> Result<()> {
        self.interrupt.store(true, Ordering::Release);
        self.send(MetronomeInput::Stop)
    }

    /// Replaces the rhythm. If playback was running, it stops, and must be
    /// restarted explicitly. A rhythm containing a beat longer than
    /// [MAX_BEAT_DELAY_NS](crate::scheduling::MAX_BEAT_DELAY_NS) at the
    /// current tempo is ignored, with no [MetronomeEvent::RhythmReplaced].
    pub fn set_rhythm(&self, rhythm: Rhythm) -> Result<()> {
        self.interrupt.store(true, Ordering::Release);
        self.send(MetronomeInput::SetRhythm(rhythm))
    }

    /// Changes the tempo starting with the next beat to be scheduled.
    pub fn set_bpm(&self, bpm: u32) -> Result<()> {
        let tempo = Tempo::new_with(bpm)?;
        self.send(MetronomeInput::SetTempo(tempo))
    }

    /// Changes the beat value multiplier starting with the next beat to be
    /// scheduled.
    pub fn set_beat_value(&self, beat_value: f32) -> Result<()> {
        if !(beat_value.is_finite() && beat_value > 0.0) {
            return Err(MetronomeError::InvalidBeatValue(beat_value));
        }
        self.send(MetronomeInput::SetBeatValue(beat_value))
    }

    /// Disabling also stops playback.
    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        if !enabled {
            self.interrupt.store(true, Ordering::Release);
        }
        self.send(MetronomeInput::SetEnabled(enabled))
    }

    /// Records a tap-tempo tap now.
    pub fn tap(&self) -> Result<()> {
        self.tap_at(self.clock.now_ns())
    }

    /// Records a tap-tempo tap at the given clock time.
    pub fn tap_at(&self, timestamp_ns: u64) -> Result<()> {
        self.send(MetronomeInput::Tap(timestamp_ns))
    }

    /// Subscribes to every event published from now on.
    pub fn subscribe(&self) -> Result<Subscription> {
        let id = ObserverId(self.next_observer_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.send(MetronomeInput::Subscribe(id, sender))?;
        Ok(Subscription::new_with(
            id,
            receiver,
            self.inputs.sender.clone(),
        ))
    }

    /// Asks the service thread to exit. It sends [MetronomeEvent::Quit] on
    /// its way out.
    pub fn quit(&self) {
        self.interrupt.store(true, Ordering::Release);
        let _ = self.send(MetronomeInput::Quit);
    }

    #[allow(missing_docs)]
    pub fn snapshot(&self) -> MetronomeSnapshot {
        self.snapshot
            .read()
            .map(|snapshot| snapshot.clone())
            .unwrap_or_default()
    }

    #[allow(missing_docs)]
    pub fn is_playing(&self) -> bool {
        self.snapshot
            .read()
            .map(|snapshot| snapshot.is_playing)
            .unwrap_or_default()
    }

    /// The flattened beats of the current rhythm.
    pub fn current_beats(&self) -> Vec<Beat> {
        self.snapshot
            .read()
            .map(|snapshot| snapshot.beats.clone())
            .unwrap_or_default()
    }

    /// The clock that timestamps taps and schedules beats.
    pub fn clock(&self) -> &Arc<dyn MonotonicClock> {
        &self.clock
    }
}

enum Wake {
    Input(MetronomeInput),
    TimerDue,
    Disconnected,
}

struct MetronomeServiceDaemon<S: AudioSink, W: WaveformProvider> {
    receiver: Receiver<MetronomeInput>,
    observers: ObserverList,

    scheduler: TickScheduler,
    timers: TimerQueue<ArmedTick>,
    tap_tempo: TapTempoEstimator,
    renderer: AudioRenderer<S, W>,
    clock: Arc<dyn MonotonicClock>,

    snapshot: Arc<RwLock<MetronomeSnapshot>>,
}
impl<S: AudioSink, W: WaveformProvider> MetronomeServiceDaemon<S, W> {
    // Bounds each wait so that a clock that doesn't follow wall time is
    // still checked regularly.
    const MAX_WAIT: Duration = Duration::from_millis(20);

    fn execute(&mut self) {
        info!("metronome service started");
        loop {
            match self.wait() {
                Wake::Input(MetronomeInput::Quit) => {
                    self.halt();
                    break;
                }
                Wake::Input(input) => self.handle_input(input),
                Wake::TimerDue => self.fire_due_timers(),
                Wake::Disconnected => {
                    self.halt();
                    break;
                }
            }
        }
        self.observers.notify(MetronomeEvent::Quit);
        info!("metronome service exited");
    }

    fn next_deadline(&self) -> Option<u64> {
        let commit_due = self.tap_tempo.pending_commit().map(|(due_ns, _)| due_ns);
        match (self.timers.next_due(), commit_due) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn wait(&self) -> Wake {
        let Some(deadline) = self.next_deadline() else {
            return match self.receiver.recv() {
                Ok(input) => Wake::Input(input),
                Err(_) => Wake::Disconnected,
            };
        };
        let now = self.clock.now_ns();
        if deadline <= now {
            // Inputs that are already waiting go first, so that a stop isn't
            // stuck behind a whole period of audio.
            return match self.receiver.try_recv() {
                Ok(input) => Wake::Input(input),
                Err(TryRecvError::Empty) => Wake::TimerDue,
                Err(TryRecvError::Disconnected) => Wake::Disconnected,
            };
        }
        let timeout = Duration::from_nanos(deadline - now).min(Self::MAX_WAIT);
        match self.receiver.recv_timeout(timeout) {
            Ok(input) => Wake::Input(input),
            Err(RecvTimeoutError::Timeout) => Wake::TimerDue,
            Err(RecvTimeoutError::Disconnected) => Wake::Disconnected,
        }
    }

    fn handle_input(&mut self, input: MetronomeInput) {
        match input {
            MetronomeInput::Start => {
                let armed = self.scheduler.start(self.clock.as_ref());
                if !armed.is_empty() {
                    info!("playing at {}", self.scheduler.tempo());
                    self.renderer.sink_mut().play();
                    self.arm(armed);
                    self.observers.notify(MetronomeEvent::PlayStateChanged(true));
                }
            }
            MetronomeInput::Stop => {
                let was_playing = self.scheduler.stop();
                self.after_stop(was_playing);
            }
            MetronomeInput::SetRhythm(rhythm) => match self.scheduler.set_rhythm(rhythm.clone()) {
                Ok(was_playing) => {
                    self.after_stop(was_playing);
                    info!("rhythm replaced ({} beats)", self.scheduler.current_beats().len());
                    self.observers.notify(MetronomeEvent::RhythmReplaced(rhythm));
                }
                Err(e) => {
                    warn!("ignoring rhythm: {e}");
                    self.renderer.clear_interrupt();
                }
            },
            MetronomeInput::SetTempo(tempo) => self.apply_tempo(tempo.bpm()),
            MetronomeInput::SetBeatValue(beat_value) => {
                if let Err(e) = self.scheduler.set_beat_value(beat_value) {
                    warn!("ignoring beat value: {e}");
                }
            }
            MetronomeInput::SetEnabled(enabled) => {
                let was_playing = self.scheduler.set_enabled(enabled);
                self.after_stop(was_playing);
            }
            MetronomeInput::Tap(timestamp_ns) => {
                let estimate = self.tap_tempo.on_tap(timestamp_ns);
                debug!(
                    "tap estimate {estimate:?} (confidence {:.2})",
                    self.tap_tempo.confidence()
                );
                self.observers.notify(MetronomeEvent::TapEstimate(estimate));
            }
            MetronomeInput::Subscribe(id, sender) => self.observers.add(id, sender),
            MetronomeInput::Unsubscribe(id) => self.observers.remove(id),
            MetronomeInput::Quit => self.halt(),
        }
        self.publish_snapshot();
    }

    fn fire_due_timers(&mut self) {
        let now = self.clock.now_ns();
        while let Some(tick) = self.timers.pop_due(now) {
            self.on_tick(tick);
        }
        if let Some(bpm) = self.tap_tempo.poll_commit(now) {
            info!("committing tapped tempo of {bpm} BPM");
            self.apply_tempo(bpm);
            self.publish_snapshot();
        }
    }

    fn on_tick(&mut self, tick: ArmedTick) {
        let Some(fired) = self.scheduler.on_timer(&tick) else {
            return;
        };
        self.observers.notify(MetronomeEvent::Beat(fired.beat));
        if let Err(e) =
            self.renderer
                .render(fired.delay_ns, fired.beat.is_accented, fired.beat.is_rest())
        {
            self.on_device_failure(e);
            return;
        }
        let armed = self.scheduler.fill_lookahead(self.clock.as_ref());
        self.arm(armed);
    }

    fn arm(&mut self, armed: Vec<ArmedTick>) {
        armed
            .into_iter()
            .for_each(|tick| self.timers.arm(tick.due_ns, tick));
    }

    fn apply_tempo(&mut self, bpm: u32) {
        match self.scheduler.set_bpm(bpm) {
            Ok(_) => self
                .observers
                .notify(MetronomeEvent::TempoChanged(self.scheduler.tempo())),
            Err(e) => warn!("ignoring tempo: {e}"),
        }
    }

    // Playback has just been stopped, or was never running.
    fn after_stop(&mut self, was_playing: bool) {
        self.timers.clear();
        if was_playing {
            if let Err(e) = self.renderer.flush() {
                warn!("while flushing audio: {e}");
            }
            self.renderer.sink_mut().pause();
            info!("stopped");
            self.observers.notify(MetronomeEvent::PlayStateChanged(false));
        }
        self.renderer.clear_interrupt();
    }

    fn on_device_failure(&mut self, e: SinkError) {
        error!("audio output failed: {e}");
        self.scheduler.stop();
        self.timers.clear();
        let _ = self.renderer.flush();
        self.renderer.clear_interrupt();
        self.observers.notify(MetronomeEvent::DeviceFailed(e.to_string()));
        self.observers.notify(MetronomeEvent::PlayStateChanged(false));
        self.publish_snapshot();
    }

    fn halt(&mut self) {
        let was_playing = self.scheduler.stop();
        self.after_stop(was_playing);
        self.publish_snapshot();
    }

    fn publish_snapshot(&self) {
        if let Ok(mut snapshot) = self.snapshot.write() {
            *snapshot = MetronomeSnapshot::new_with(&self.scheduler);
        }
    }
}
