use crate::config::{PlaybackControls, RetriggerPolicy, ToneParams};
use crate::playback::ToneOutput;
use crate::sequence::ToneDescriptor;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;

const LOG_TARGET: &str = "playback::scheduler";

/// Latest deadline a tone is ever scheduled for. Offsets beyond it (from a
/// vanishingly small speed) wait here instead.
pub const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Converts seconds to a [`Duration`], saturating at [`FAR_FUTURE`].
pub fn duration_from_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).map_or(FAR_FUTURE, |d| d.min(FAR_FUTURE))
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub struct ScheduledTone {
    pub index: usize,
    pub symbol: char,
    pub offset_secs: f64,
    pub tone: ToneParams,
}

impl ScheduledTone {
    pub fn offset(&self) -> Duration {
        duration_from_secs(self.offset_secs)
    }
}

/// Back-to-back tone timeline with the controls captured at build time.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct Schedule {
    tones: Vec<ScheduledTone>,
    total_secs: f64,
    volume: f64,
}

impl Schedule {
    pub fn tones(&self) -> &[ScheduledTone] {
        &self.tones
    }

    pub fn len(&self) -> usize {
        self.tones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tones.is_empty()
    }

    pub fn total_secs(&self) -> f64 {
        self.total_secs
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }
}

/// Tone `k` starts at `(d_0 + … + d_{k-1}) / speed` and lasts
/// `d_k / speed`, so tones never overlap within one schedule.
pub fn build_schedule(descriptors: &[ToneDescriptor], controls: &PlaybackControls) -> Schedule {
    let speed = controls.speed.get();
    let mut elapsed = 0.0;

    let tones = descriptors
        .iter()
        .enumerate()
        .map(|(index, d)| {
            let offset_secs = elapsed / speed;
            elapsed += d.duration;
            ScheduledTone {
                index,
                symbol: d.symbol,
                offset_secs,
                tone: controls.tone_params(d),
            }
        })
        .collect();

    Schedule {
        tones,
        total_secs: elapsed / speed,
        volume: controls.volume.get(),
    }
}

/// A sequence handed to the scheduler.
#[derive(Debug)]
pub struct SequenceHandle {
    task: JoinHandle<usize>,
    tones: usize,
    total: Duration,
}

impl SequenceHandle {
    pub fn tones(&self) -> usize {
        self.tones
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    /// Stops the tones of this sequence that have not started yet.
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// Resolves once the last tone has been emitted. `None` if the sequence
    /// was cancelled first.
    pub async fn finished(self) -> Option<usize> {
        match self.task.await {
            Ok(emitted) => Some(emitted),
            Err(e) => {
                if !e.is_cancelled() {
                    tracing::warn!(target: LOG_TARGET, error = %e, "sequence task failed");
                }
                None
            }
        }
    }
}

/// Drives an output from descriptor sequences.
///
/// Each sequence runs as one Tokio task that sleeps until every tone's
/// absolute deadline, so timer jitter can delay a tone but never reorder it.
pub struct PlaybackScheduler<O> {
    output: Arc<O>,
    retrigger: RetriggerPolicy,
    pending: Mutex<Vec<AbortHandle>>,
}

impl<O> PlaybackScheduler<O>
where
    O: ToneOutput + 'static,
{
    pub fn new(output: O, retrigger: RetriggerPolicy) -> Self {
        Self {
            output: Arc::new(output),
            retrigger,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    fn lock_pending(&self) -> MutexGuard<'_, Vec<AbortHandle>> {
        match self.pending.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!(
                    target: LOG_TARGET,
                    "pending sequence list lock was poisoned; recovering and continuing"
                );
                poisoned.into_inner()
            }
        }
    }

    /// Schedules the whole sequence. Must be called within a Tokio runtime.
    pub fn play_sequence(
        &self,
        descriptors: &[ToneDescriptor],
        controls: &PlaybackControls,
    ) -> SequenceHandle {
        self.play_schedule(build_schedule(descriptors, controls))
    }

    pub fn play_schedule(&self, schedule: Schedule) -> SequenceHandle {
        if self.retrigger == RetriggerPolicy::CancelPending {
            let cancelled = self.cancel_all();
            if cancelled > 0 {
                tracing::debug!(target: LOG_TARGET, cancelled, "cancelled pending sequences");
            }
        }

        let tones = schedule.len();
        let total = duration_from_secs(schedule.total_secs());
        let volume = schedule.volume();
        let output = Arc::clone(&self.output);
        let start = Instant::now();

        tracing::debug!(
            target: LOG_TARGET,
            tones,
            total_secs = schedule.total_secs(),
            volume,
            "sequence scheduled"
        );

        let task = tokio::spawn(async move {
            let mut emitted = 0;
            for scheduled in schedule.tones {
                tokio::time::sleep_until(start + scheduled.offset()).await;
                emit_logged(output.as_ref(), scheduled.tone, volume, Some(scheduled.index));
                emitted += 1;
            }
            emitted
        });

        let mut pending = self.lock_pending();
        pending.retain(|h| !h.is_finished());
        pending.push(task.abort_handle());

        SequenceHandle { task, tones, total }
    }

    /// Plays one descriptor right away, outside any sequence.
    pub fn play_letter(&self, descriptor: &ToneDescriptor, controls: &PlaybackControls) {
        emit_logged(
            self.output.as_ref(),
            controls.tone_params(descriptor),
            controls.volume.get(),
            None,
        );
    }

    /// Aborts every sequence still waiting on a tone. Returns how many were
    /// stopped.
    pub fn cancel_all(&self) -> usize {
        let mut pending = self.lock_pending();
        let mut cancelled = 0;
        for handle in pending.drain(..) {
            if !handle.is_finished() {
                handle.abort();
                cancelled += 1;
            }
        }
        cancelled
    }

    pub fn pending(&self) -> usize {
        self.lock_pending()
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }
}

fn emit_logged<O: ToneOutput + ?Sized>(
    output: &O,
    tone: ToneParams,
    volume: f64,
    index: Option<usize>,
) {
    if let Err(e) = output.emit(tone, volume) {
        tracing::warn!(
            target: LOG_TARGET,
            error = %e,
            index = ?index,
            frequency_hz = tone.frequency_hz,
            "tone emission failed"
        );
    }
}
