//! In-memory state of one recorder.

use chrono::{DateTime, Utc};

use st_core::{
    ContentIdentity, ContentIdentityProvider, FlushReason, LocalZone, PendingDeltas,
    RecorderConfig, Signal, SignalCollector, SignalSnapshot, TickCredit, TickOutcome,
    TimeAccumulator, TimedSignal, Transition,
};

/// Signal fusion, tick integration and unflushed deltas for one page session.
///
/// Nothing here touches storage. Flushing takes the pending deltas out with
/// [`take_pending`](Self::take_pending) and hands back whatever could not be
/// written with [`restore`](Self::restore).
#[derive(Debug)]
pub struct RecorderSession<P> {
    collector: SignalCollector,
    accumulator: TimeAccumulator,
    pending: PendingDeltas,
    identity: P,
    current: Option<ContentIdentity>,
    zone: LocalZone,
    started_at: DateTime<Utc>,
}

impl<P: ContentIdentityProvider> RecorderSession<P> {
    pub fn new(config: &RecorderConfig, identity: P, started_at: DateTime<Utc>) -> Self {
        Self {
            collector: SignalCollector::new(
                config.idle_threshold(),
                config.media_wait(),
                started_at,
            ),
            accumulator: TimeAccumulator::new(config.max_plausible_gap()),
            pending: PendingDeltas::default(),
            identity,
            current: None,
            zone: config.zone(),
            started_at,
        }
    }

    /// Applies one signal. Returns the reason when it calls for an immediate
    /// flush.
    pub fn handle(&mut self, signal: &TimedSignal) -> Option<FlushReason> {
        if let Signal::Navigate { location, title } = &signal.signal {
            self.navigate(location, title.as_deref());
        }

        let applied = self.collector.apply(signal.at, &signal.signal);
        if let Some(transition) = applied.transition {
            let day = self.pending.day_mut(self.zone.date_of(signal.at));
            let counter = match transition {
                Transition::Pause => &mut day.pause_count,
                Transition::ExitFullscreen => &mut day.exit_fullscreen_count,
                Transition::TabSwitch => &mut day.tab_switch_count,
            };
            *counter = counter.saturating_add(1);
            tracing::debug!(?transition, at = %signal.at, "counted transition");
        }
        applied.flush
    }

    /// Integrates time up to `at`.
    pub fn tick(&mut self, at: DateTime<Utc>) -> TickOutcome {
        self.collector.refresh(at);
        let effective = self.collector.snapshot(at).is_effective();
        let rate = self.collector.playback_rate();
        let outcome = self.accumulator.tick(at, effective, rate);
        if let TickOutcome::Counted(credit) = outcome {
            self.credit(at, &credit);
        }
        outcome
    }

    /// Moves the unflushed deltas out for a flush.
    pub fn take_pending(&mut self) -> PendingDeltas {
        self.pending.take()
    }

    /// Adds deltas from a failed flush back.
    pub fn restore(&mut self, retained: PendingDeltas) {
        self.pending.merge(retained);
    }

    pub const fn pending(&self) -> &PendingDeltas {
        &self.pending
    }

    pub fn snapshot(&self, at: DateTime<Utc>) -> SignalSnapshot {
        self.collector.snapshot(at)
    }

    pub const fn current_content(&self) -> Option<&ContentIdentity> {
        self.current.as_ref()
    }

    pub fn is_paused(&self) -> bool {
        self.collector.is_paused()
    }

    pub fn is_degraded(&self) -> bool {
        self.collector.is_degraded()
    }

    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub const fn last_tick(&self) -> Option<DateTime<Utc>> {
        self.accumulator.last_tick()
    }

    /// Session totals as `(total, effective, longest)` seconds.
    pub const fn totals(&self) -> (f64, f64, f64) {
        (
            self.accumulator.total(),
            self.accumulator.effective(),
            self.accumulator.longest(),
        )
    }

    pub const fn zone(&self) -> LocalZone {
        self.zone
    }

    /// Credits one counted tick to the tick's calendar day.
    fn credit(&mut self, at: DateTime<Utc>, credit: &TickCredit) {
        let day = self.pending.day_mut(self.zone.date_of(at));
        day.total_time += credit.elapsed;
        day.effective_time += credit.effective;
        day.longest_continuous_session = day.longest_continuous_session.max(credit.continuous);
        if credit.effective > 0.0 {
            if let Some(content) = &self.current {
                day.credit_video(
                    &content.id,
                    content.title.as_deref(),
                    credit.effective,
                    credit.since,
                );
            }
        }
    }

    fn navigate(&mut self, location: &str, title: Option<&str>) {
        let next = self.identity.identify(location, title);
        match (&mut self.current, next) {
            (Some(current), Some(next)) if current.id == next.id => {
                if current.title.is_none() {
                    current.title = next.title;
                }
            }
            (current, next) => {
                match &next {
                    Some(content) => tracing::info!(content = %content.id, "now studying"),
                    None => tracing::debug!(location, "location is not video content"),
                }
                *current = next;
            }
        }
    }
}
