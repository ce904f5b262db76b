//! Presentation surface: announcements, status bar, tags and sounds.
//!
//! Delivery is fire-and-forget. The coordinator never waits on a
//! presentation call and ignores its failures.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::game::report::MatchReport;

use super::ServiceError;

/// Colour token for the status bar and team markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BarColor {
    Red,
    Blue,
    Yellow,
    Green,
    Purple,
    White,
}

/// Audible cue tied to a match event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Last seconds of the countdown
    CountdownTick,
    MatchStart,
    PvpStart,
    BorderClosed,
    Warning,
    Victory,
}

/// Shared status display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusBar {
    pub title: String,
    pub color: BarColor,
    /// Fraction in `[0, 1]`
    pub progress: f64,
    pub visible: bool,
}

impl StatusBar {
    pub fn hidden() -> Self {
        Self {
            title: String::new(),
            color: BarColor::White,
            progress: 0.0,
            visible: false,
        }
    }
}

pub trait Presentation: Send {
    /// Message to everyone
    fn announce(&mut self, text: &str);

    /// Message to a single participant
    fn tell(&mut self, participant: Uuid, text: &str);

    fn set_status_bar(&mut self, bar: &StatusBar);

    /// Set (or clear with `None`) the participant's name tag
    fn set_participant_tag(
        &mut self,
        participant: Uuid,
        tag: Option<&str>,
    ) -> Result<(), ServiceError>;

    fn play_signal(&mut self, signal: Signal);

    /// Full results of a finished match
    fn publish_report(&mut self, _report: &MatchReport) {}
}

/// Outbound presentation event
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notice {
    Announcement {
        text: String,
    },
    Direct {
        participant: Uuid,
        text: String,
    },
    StatusBar(StatusBar),
    Tag {
        participant: Uuid,
        tag: Option<String>,
    },
    Signal {
        signal: Signal,
    },
    Report(MatchReport),
}

/// Presentation that fans notices out to any number of subscribers
#[derive(Clone)]
pub struct BroadcastPresentation {
    tx: broadcast::Sender<Notice>,
}

impl BroadcastPresentation {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    fn emit(&self, notice: Notice) {
        // No subscribers is fine
        if self.tx.send(notice).is_err() {
            debug!("Notice dropped, no subscribers");
        }
    }
}

impl Presentation for BroadcastPresentation {
    fn announce(&mut self, text: &str) {
        self.emit(Notice::Announcement {
            text: text.to_string(),
        });
    }

    fn tell(&mut self, participant: Uuid, text: &str) {
        self.emit(Notice::Direct {
            participant,
            text: text.to_string(),
        });
    }

    fn set_status_bar(&mut self, bar: &StatusBar) {
        self.emit(Notice::StatusBar(bar.clone()));
    }

    fn set_participant_tag(
        &mut self,
        participant: Uuid,
        tag: Option<&str>,
    ) -> Result<(), ServiceError> {
        self.emit(Notice::Tag {
            participant,
            tag: tag.map(str::to_string),
        });
        Ok(())
    }

    fn play_signal(&mut self, signal: Signal) {
        self.emit(Notice::Signal { signal });
    }

    fn publish_report(&mut self, report: &MatchReport) {
        self.emit(Notice::Report(report.clone()));
    }
}
