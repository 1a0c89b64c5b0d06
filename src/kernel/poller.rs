use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::cancel::TimerSlot;
use super::event::{ReplyRecord, ReplyToken};
use super::reply::ReplyHandler;
use super::telemetry::event::TelemetryEvent;
use super::telemetry::Telemetry;
use crate::error::ClientError;
use crate::outputs::ui::Ui;
use crate::services::api::ServerApi;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Empty,
    Fresh(String),
    /// Same token as the last announced reply. Silently discarded.
    Duplicate,
}

/// Dedup decision for one poll response. Advances `last_seen` on a fresh,
/// tokened reply. A message without a token cannot be deduplicated and is
/// always fresh.
pub fn classify(last_seen: &mut Option<ReplyToken>, record: &ReplyRecord) -> PollOutcome {
    let Some(message) = record.message() else {
        return PollOutcome::Empty;
    };
    let Some(token) = record.token.as_ref() else {
        return PollOutcome::Fresh(message.to_string());
    };
    if last_seen.as_ref() == Some(token) {
        return PollOutcome::Duplicate;
    }
    *last_seen = Some(token.clone());
    PollOutcome::Fresh(message.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    Idle,
    Polling { attempt: u32 },
    Replied,
    TimedOut,
    Cancelled,
}

/// One outstanding wait for a reply.
#[derive(Debug)]
pub struct PollSession {
    pub id: Uuid,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub interval: Duration,
    timer: TimerSlot,
}

#[derive(Debug)]
struct PollerInner {
    session: Option<PollSession>,
    // Outlives sessions so the next call does not re-announce the previous reply.
    last_seen: Option<ReplyToken>,
    status: PollStatus,
}

pub struct ReplyPoller<S: ServerApi> {
    inner: Arc<Mutex<PollerInner>>,
    api: Arc<S>,
    handler: ReplyHandler,
    ui: Arc<dyn Ui>,
    telemetry: Telemetry,
    interval: Duration,
    max_attempts: u32,
}

impl<S: ServerApi> Clone for ReplyPoller<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            api: self.api.clone(),
            handler: self.handler.clone(),
            ui: self.ui.clone(),
            telemetry: self.telemetry.clone(),
            interval: self.interval,
            max_attempts: self.max_attempts,
        }
    }
}

impl<S: ServerApi> ReplyPoller<S> {
    pub fn new(
        api: Arc<S>,
        handler: ReplyHandler,
        ui: Arc<dyn Ui>,
        telemetry: Telemetry,
        interval: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PollerInner {
                session: None,
                last_seen: None,
                status: PollStatus::Idle,
            })),
            api,
            handler,
            ui,
            telemetry,
            interval,
            max_attempts,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PollerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancels any running session, then starts a fresh one.
    pub fn start(&self) -> Uuid {
        let id = Uuid::new_v4();
        {
            let mut inner = self.lock();
            if let Some(mut previous) = inner.session.take() {
                previous.timer.cancel();
                self.telemetry.record(TelemetryEvent::PollCancelled { session: previous.id });
                debug!("poll session {} replaced", previous.id);
            }

            let mut timer = TimerSlot::new();
            let poller = self.clone();
            timer.arm(move |token| poller.run(id, token));
            inner.session = Some(PollSession {
                id,
                attempt_count: 0,
                max_attempts: self.max_attempts,
                interval: self.interval,
                timer,
            });
            inner.status = PollStatus::Polling { attempt: 0 };
        }

        self.ui.show_reply("Waiting for reply...");
        self.telemetry.record(TelemetryEvent::PollStarted { session: id });
        info!("poll session {id} started");
        id
    }

    /// Returns `true` if a session was running.
    pub fn cancel(&self) -> bool {
        let session = {
            let mut inner = self.lock();
            let session = inner.session.take();
            if session.is_some() {
                inner.status = PollStatus::Cancelled;
            }
            session
        };
        match session {
            Some(mut session) => {
                session.timer.cancel();
                self.telemetry.record(TelemetryEvent::PollCancelled { session: session.id });
                true
            }
            None => false,
        }
    }

    pub fn status(&self) -> PollStatus {
        self.lock().status
    }

    pub fn is_active(&self) -> bool {
        self.lock().session.is_some()
    }

    pub fn attempt_count(&self) -> Option<u32> {
        self.lock().session.as_ref().map(|s| s.attempt_count)
    }

    pub fn last_seen_token(&self) -> Option<ReplyToken> {
        self.lock().last_seen.clone()
    }

    async fn run(self, id: Uuid, token: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let attempt = {
                let mut guard = self.lock();
                let inner = &mut *guard;
                match inner.session.as_mut() {
                    Some(session) if session.id == id => {
                        session.attempt_count += 1;
                        inner.status = PollStatus::Polling { attempt: session.attempt_count };
                        session.attempt_count
                    }
                    _ => return,
                }
            };

            let result = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                result = self.api.poll_reply() => result,
            };

            match result {
                Err(e) => {
                    warn!("Poll error: {e}");
                    self.telemetry.record(TelemetryEvent::PollError { session: id, attempt });
                }
                Ok(record) => {
                    let outcome = {
                        let mut inner = self.lock();
                        if inner.session.as_ref().map(|s| s.id) != Some(id) {
                            return;
                        }
                        let outcome = classify(&mut inner.last_seen, &record);
                        if matches!(outcome, PollOutcome::Fresh(_)) {
                            if let Some(mut session) = inner.session.take() {
                                session.timer.release();
                            }
                            inner.status = PollStatus::Replied;
                        }
                        outcome
                    };

                    match outcome {
                        PollOutcome::Empty => {}
                        PollOutcome::Duplicate => {
                            debug!("poll session {id}: repeated reply suppressed");
                            self.telemetry
                                .record(TelemetryEvent::DuplicateSuppressed { session: id });
                        }
                        PollOutcome::Fresh(message) => {
                            info!("poll session {id}: reply received on attempt {attempt}");
                            self.handler.handle(&message);
                            return;
                        }
                    }
                }
            }

            if attempt >= self.max_attempts {
                self.time_out(id, attempt);
                return;
            }
        }
    }

    fn time_out(&self, id: Uuid, attempts: u32) {
        let ended = {
            let mut inner = self.lock();
            if inner.session.as_ref().is_some_and(|s| s.id == id) {
                if let Some(mut session) = inner.session.take() {
                    session.timer.release();
                }
                inner.status = PollStatus::TimedOut;
                true
            } else {
                false
            }
        };
        if ended {
            warn!("poll session {id}: {}", ClientError::Timeout { attempts });
            self.ui.set_status("Timed out waiting for reply.");
            self.telemetry.record(TelemetryEvent::PollTimedOut { session: id, attempts });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_sequence_announces_each_token_once() {
        let mut last_seen = None;
        let sequence = [
            ReplyRecord::empty(),
            ReplyRecord::reply("5 minutes", 1),
            ReplyRecord::reply("5 minutes", 1),
            ReplyRecord::reply("10 minutes", 2),
        ];
        let outcomes: Vec<_> = sequence.iter().map(|r| classify(&mut last_seen, r)).collect();
        assert_eq!(
            outcomes,
            vec![
                PollOutcome::Empty,
                PollOutcome::Fresh("5 minutes".into()),
                PollOutcome::Duplicate,
                PollOutcome::Fresh("10 minutes".into()),
            ]
        );
        assert_eq!(last_seen, Some(ReplyToken::from(2)));
    }

    #[test]
    fn untokened_reply_is_always_fresh() {
        let mut last_seen = Some(ReplyToken::from(7));
        let record = ReplyRecord {
            message: Some("hi".into()),
            token: None,
        };
        assert_eq!(classify(&mut last_seen, &record), PollOutcome::Fresh("hi".into()));
        assert_eq!(last_seen, Some(ReplyToken::from(7)), "last seen token is untouched");
    }

    #[test]
    fn empty_record_does_not_touch_last_seen() {
        let mut last_seen = None;
        let record = ReplyRecord {
            message: None,
            token: Some(ReplyToken::from(3)),
        };
        assert_eq!(classify(&mut last_seen, &record), PollOutcome::Empty);
        assert!(last_seen.is_none());
    }
}
