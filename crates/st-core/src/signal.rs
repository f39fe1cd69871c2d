//! Liveness signal fusion.
//!
//! Several overlapping sources report whether the learner is paying attention:
//! the media element (playing or not), page visibility, window focus, and user
//! activity heartbeats. [`SignalCollector`] folds the raw events into a small
//! amount of state, and [`SignalSnapshot::is_effective`] decides from an
//! immutable snapshot of that state whether the current second counts.
//!
//! # Media binding
//!
//! Players replace their media element on in-app navigation. A detach moves the
//! binding to `Waiting` without touching the rest of the session; the next attach
//! rebinds. If nothing attaches within the configured wait, the collector
//! degrades to visibility-only tracking and treats media as playing. That is a
//! weaker signal and is logged once.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::PlaybackRate;

/// A raw event from one of the liveness providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Signal {
    /// A media element became available.
    MediaAttached {
        #[serde(default)]
        playing: bool,
        #[serde(default)]
        rate: PlaybackRate,
    },
    /// The media element went away (e.g. replaced during navigation).
    MediaDetached,
    Play,
    Pause,
    Ended,
    RateChange {
        rate: PlaybackRate,
    },
    /// Playback position advanced. Only fires while media is playing.
    TimeUpdate,
    Visibility {
        visible: bool,
    },
    Focus {
        focused: bool,
    },
    /// Pointer, keyboard or scroll heartbeat.
    Activity,
    FullscreenEnter,
    FullscreenExit,
    /// The page moved to a new location.
    Navigate {
        location: String,
        #[serde(default)]
        title: Option<String>,
    },
    /// The page is going away.
    Unload,
}

/// A signal stamped with the instant it was observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedSignal {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub signal: Signal,
}

/// Discrete counters, each bumped once per logical transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Pause,
    ExitFullscreen,
    TabSwitch,
}

/// Why a flush was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    Interval,
    Pause,
    ExitFullscreen,
    Ended,
    Unload,
}

impl FlushReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Interval => "interval",
            Self::Pause => "pause",
            Self::ExitFullscreen => "exit_fullscreen",
            Self::Ended => "ended",
            Self::Unload => "unload",
        }
    }
}

/// What applying one signal produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Applied {
    pub transition: Option<Transition>,
    pub flush: Option<FlushReason>,
}

/// Immutable view of the four liveness booleans at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalSnapshot {
    pub media_playing: bool,
    pub page_visible: bool,
    pub window_focused: bool,
    pub user_active: bool,
}

impl SignalSnapshot {
    /// Whether this instant counts as effective study time.
    pub const fn is_effective(self) -> bool {
        self.media_playing && self.page_visible && self.window_focused && self.user_active
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum MediaBinding {
    Waiting { since: DateTime<Utc> },
    Attached { playing: bool, rate: PlaybackRate },
    VisibilityOnly,
}

/// Folds raw liveness events into the state behind [`SignalSnapshot`].
#[derive(Debug, Clone)]
pub struct SignalCollector {
    idle_threshold: Duration,
    media_wait: Duration,
    media: MediaBinding,
    page_visible: bool,
    window_focused: bool,
    fullscreen: bool,
    last_activity: DateTime<Utc>,
}

impl SignalCollector {
    /// Creates a collector for a page that just loaded, visible and focused.
    pub fn new(idle_threshold: Duration, media_wait: Duration, started_at: DateTime<Utc>) -> Self {
        Self {
            idle_threshold,
            media_wait,
            media: MediaBinding::Waiting { since: started_at },
            page_visible: true,
            window_focused: true,
            fullscreen: false,
            last_activity: started_at,
        }
    }

    /// Applies one signal.
    pub fn apply(&mut self, at: DateTime<Utc>, signal: &Signal) -> Applied {
        let mut applied = Applied::default();
        match signal {
            Signal::MediaAttached { playing, rate } => {
                if self.media == MediaBinding::VisibilityOnly {
                    tracing::info!("media element appeared, leaving visibility-only tracking");
                }
                self.media = MediaBinding::Attached {
                    playing: *playing,
                    rate: *rate,
                };
            }
            Signal::MediaDetached => {
                self.media = MediaBinding::Waiting { since: at };
            }
            Signal::Play => {
                self.mark_active(at);
                self.set_playing(true);
            }
            Signal::Pause => {
                self.mark_active(at);
                if self.set_playing(false) {
                    applied.transition = Some(Transition::Pause);
                    applied.flush = Some(FlushReason::Pause);
                }
            }
            Signal::Ended => {
                self.set_playing(false);
                applied.flush = Some(FlushReason::Ended);
            }
            Signal::RateChange { rate } => {
                self.mark_active(at);
                match &mut self.media {
                    MediaBinding::Attached { rate: current, .. } => *current = *rate,
                    binding => {
                        let playing = *binding == MediaBinding::VisibilityOnly;
                        *binding = MediaBinding::Attached {
                            playing,
                            rate: *rate,
                        };
                    }
                }
            }
            Signal::TimeUpdate => {
                // Late binding: a surface reporting progress is a playing surface.
                if !matches!(self.media, MediaBinding::Attached { .. }) {
                    self.media = MediaBinding::Attached {
                        playing: true,
                        rate: PlaybackRate::NORMAL,
                    };
                }
            }
            Signal::Visibility { visible } => {
                let was_present = self.is_present();
                self.page_visible = *visible;
                if *visible {
                    self.mark_active(at);
                }
                applied.transition = self.away_transition(was_present);
            }
            Signal::Focus { focused } => {
                let was_present = self.is_present();
                self.window_focused = *focused;
                if *focused {
                    self.mark_active(at);
                }
                applied.transition = self.away_transition(was_present);
            }
            Signal::Activity | Signal::Navigate { .. } => self.mark_active(at),
            Signal::FullscreenEnter => {
                self.mark_active(at);
                self.fullscreen = true;
            }
            Signal::FullscreenExit => {
                self.mark_active(at);
                if self.fullscreen {
                    self.fullscreen = false;
                    applied.transition = Some(Transition::ExitFullscreen);
                    applied.flush = Some(FlushReason::ExitFullscreen);
                }
            }
            Signal::Unload => applied.flush = Some(FlushReason::Unload),
        }
        applied
    }

    /// Advances time-based state. Returns true when this call degraded the
    /// collector to visibility-only tracking.
    pub fn refresh(&mut self, at: DateTime<Utc>) -> bool {
        if let MediaBinding::Waiting { since } = self.media {
            if at - since >= self.media_wait {
                self.media = MediaBinding::VisibilityOnly;
                tracing::warn!(
                    wait_secs = self.media_wait.num_seconds(),
                    "no media element found, falling back to visibility-only tracking"
                );
                return true;
            }
        }
        false
    }

    /// Snapshot of the liveness booleans at `at`.
    pub fn snapshot(&self, at: DateTime<Utc>) -> SignalSnapshot {
        let media_playing = match self.media {
            MediaBinding::Attached { playing, .. } => playing,
            MediaBinding::VisibilityOnly => true,
            MediaBinding::Waiting { .. } => false,
        };
        SignalSnapshot {
            media_playing,
            page_visible: self.page_visible,
            window_focused: self.window_focused,
            user_active: at - self.last_activity < self.idle_threshold,
        }
    }

    /// Current playback rate; normal speed without an attached element.
    pub fn playback_rate(&self) -> PlaybackRate {
        match self.media {
            MediaBinding::Attached { rate, .. } => rate,
            _ => PlaybackRate::NORMAL,
        }
    }

    /// Whether an attached media element is paused.
    pub fn is_paused(&self) -> bool {
        matches!(self.media, MediaBinding::Attached { playing: false, .. })
    }

    /// Whether tracking fell back to visibility only.
    pub fn is_degraded(&self) -> bool {
        self.media == MediaBinding::VisibilityOnly
    }

    pub const fn is_page_visible(&self) -> bool {
        self.page_visible
    }

    pub const fn is_window_focused(&self) -> bool {
        self.window_focused
    }

    fn mark_active(&mut self, at: DateTime<Utc>) {
        if at > self.last_activity {
            self.last_activity = at;
        }
    }

    /// Sets the playing flag, returning true if it went from playing to paused.
    fn set_playing(&mut self, playing: bool) -> bool {
        match &mut self.media {
            MediaBinding::Attached {
                playing: current, ..
            } => {
                let paused_now = *current && !playing;
                *current = playing;
                paused_now
            }
            binding => {
                // Visibility-only mode assumes playback, so a late surface
                // reporting a stop is a real playing-to-paused change.
                let was_assumed_playing = *binding == MediaBinding::VisibilityOnly;
                *binding = MediaBinding::Attached {
                    playing,
                    rate: PlaybackRate::NORMAL,
                };
                was_assumed_playing && !playing
            }
        }
    }

    const fn is_present(&self) -> bool {
        self.page_visible && self.window_focused
    }

    /// A tab switch is the moment the page stops being both visible and
    /// focused; a blur followed by a hide is still one switch.
    fn away_transition(&self, was_present: bool) -> Option<Transition> {
        (was_present && !self.is_present()).then_some(Transition::TabSwitch)
    }
}
