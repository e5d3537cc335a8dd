//! Selection coordination between the two dataset loads and the student picker.
//!
//! The mastery and submission datasets finish loading in any order relative
//! to user selections. [`SelectionCoordinator`] owns all of the state needed
//! to reconcile them ([`DashboardContext`]) and is the only thing that talks
//! to the renderers.
//!
//! Rules:
//! - The radar depends only on the mastery dataset and renders as soon as it
//!   is ready.
//! - While the submission dataset is still loading, only the most recent
//!   selection is remembered and replayed once it arrives.
//! - An empty or unknown selection, or a picker whose options no longer
//!   contain the current value, resets every chart to an empty frame.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::analyzers::mastery::MasteryIndex;
use crate::analyzers::submissions::SubmissionIndex;
use crate::analyzers::types::{CalendarRange, KnowledgeOrder, RadarSeries, StudentActivity};
use crate::error::LoadError;

/// Knowledge-point radar chart.
pub trait RadarRenderer {
    fn init(&mut self, mount: &str);
    /// Replaces the chart contents. Both series are aligned 1:1 with `labels`.
    fn update(&mut self, labels: &[String], personal: &[f64], class_average: &[f64]);
}

/// Hourly-radial and calendar charts of one student.
pub trait ProfileRenderer {
    fn update(&mut self, activity: &StudentActivity);
    fn clear(&mut self);
}

/// Blocking, user-visible failure notification.
pub trait Notifier {
    fn alert(&mut self, message: &str);
}

/// Progress of one dataset load. Moves out of `Pending` at most once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    Pending,
    Ready,
    Failed,
}

/// Everything that accumulates while the dashboard runs.
#[derive(Debug, Default)]
pub struct DashboardContext {
    mastery_state: LoadState,
    submission_state: LoadState,
    mastery: Option<Arc<MasteryIndex>>,
    submissions: Option<Arc<SubmissionIndex>>,
    /// Selection waiting for the submission dataset; last write wins.
    pending: Option<String>,
    /// Last value reported by the picker.
    current: Option<String>,
    /// Student whose radar is currently drawn.
    rendered: Option<String>,
}

impl DashboardContext {
    pub fn mastery_state(&self) -> LoadState {
        self.mastery_state
    }

    pub fn submission_state(&self) -> LoadState {
        self.submission_state
    }

    pub fn is_mastery_ready(&self) -> bool {
        self.mastery_state == LoadState::Ready
    }

    pub fn is_submission_ready(&self) -> bool {
        self.submission_state == LoadState::Ready
    }

    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn rendered(&self) -> Option<&str> {
        self.rendered.as_deref()
    }

    pub fn mastery(&self) -> Option<&Arc<MasteryIndex>> {
        self.mastery.as_ref()
    }

    pub fn submissions(&self) -> Option<&Arc<SubmissionIndex>> {
        self.submissions.as_ref()
    }

    pub fn calendar_range(&self) -> Option<CalendarRange> {
        self.submissions.as_ref().and_then(|s| s.calendar_range())
    }

    /// Whether `student_id` is in the loaded roster. Always false before mastery is ready.
    pub fn is_known(&self, student_id: &str) -> bool {
        self.is_mastery_ready()
            && self
                .mastery
                .as_ref()
                .is_some_and(|m| m.contains(student_id))
    }
}

/// Inputs to the coordinator's event loop.
#[derive(Debug)]
pub enum DashboardEvent {
    MasteryLoaded(Result<MasteryIndex, LoadError>),
    SubmissionsLoaded(Result<SubmissionIndex, LoadError>),
    /// The picker's `change` event.
    SelectionChanged(String),
    /// The picker rebuilt its option list; `current` is its value afterwards.
    OptionsChanged { options: Vec<String>, current: String },
}

pub struct SelectionCoordinator<R, P, N> {
    ctx: DashboardContext,
    order: KnowledgeOrder,
    radar: R,
    profile: P,
    notifier: N,
}

impl<R, P, N> SelectionCoordinator<R, P, N>
where
    R: RadarRenderer,
    P: ProfileRenderer,
    N: Notifier,
{
    /// Initializes the radar at `mount` and draws the empty frame.
    pub fn new(order: KnowledgeOrder, mount: &str, mut radar: R, profile: P, notifier: N) -> Self {
        radar.init(mount);
        let mut coordinator = Self {
            ctx: DashboardContext::default(),
            order,
            radar,
            profile,
            notifier,
        };
        coordinator.clear();
        coordinator
    }

    pub fn context(&self) -> &DashboardContext {
        &self.ctx
    }

    pub fn radar(&self) -> &R {
        &self.radar
    }

    pub fn profile(&self) -> &P {
        &self.profile
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Processes events in arrival order until every sender is dropped.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<DashboardEvent>) -> Self {
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        debug!("Event channel closed");
        self
    }

    pub fn handle(&mut self, event: DashboardEvent) {
        match event {
            DashboardEvent::MasteryLoaded(result) => self.on_mastery_loaded(result),
            DashboardEvent::SubmissionsLoaded(result) => self.on_submissions_loaded(result),
            DashboardEvent::SelectionChanged(id) => self.on_selection_change(&id),
            DashboardEvent::OptionsChanged { options, current } => {
                self.on_options_changed(&options, &current)
            }
        }
    }

    pub fn on_mastery_loaded(&mut self, result: Result<MasteryIndex, LoadError>) {
        if self.ctx.mastery_state == LoadState::Failed {
            warn!("Ignoring mastery dataset after terminal failure");
            return;
        }

        match result {
            Ok(index) => {
                info!(students = index.len(), "Mastery dataset ready");
                self.ctx.mastery = Some(Arc::new(index));
                self.ctx.mastery_state = LoadState::Ready;

                // A selection made before the roster existed is re-validated now.
                if let Some(current) = self.ctx.current.clone() {
                    self.on_selection_change(&current);
                }
            }
            Err(e) if self.ctx.mastery_state == LoadState::Ready => {
                warn!(error = %e, "Mastery reload failed, keeping previous snapshot");
            }
            Err(e) => {
                error!(error = %e, "Mastery dataset failed to load");
                self.ctx.mastery_state = LoadState::Failed;
                self.notifier
                    .alert(&format!("Mastery data could not be loaded; charts are unavailable ({e})"));
                self.clear();
            }
        }
    }

    pub fn on_submissions_loaded(&mut self, result: Result<SubmissionIndex, LoadError>) {
        if self.ctx.submission_state == LoadState::Failed {
            warn!("Ignoring submission dataset after terminal failure");
            return;
        }

        match result {
            Ok(index) => {
                info!(records = index.total_records(), "Submission dataset ready");
                self.ctx.submissions = Some(Arc::new(index));
                self.ctx.submission_state = LoadState::Ready;

                if let Some(student_id) = self.ctx.pending.take() {
                    debug!(student_id = %student_id, "Replaying pending selection");
                    self.render_profile(&student_id);
                }
            }
            Err(e) if self.ctx.submission_state == LoadState::Ready => {
                warn!(error = %e, "Submission reload failed, keeping previous snapshot");
            }
            Err(e) => {
                warn!(error = %e, "Submission dataset failed to load; profile charts stay empty");
                self.ctx.submission_state = LoadState::Failed;
                self.ctx.pending = None;
                self.profile.clear();
            }
        }
    }

    /// Handles the picker's `change` event.
    pub fn on_selection_change(&mut self, student_id: &str) {
        let student_id = student_id.trim();
        if student_id.is_empty() {
            debug!("Empty selection");
            self.ctx.current = None;
            self.clear();
            return;
        }
        self.ctx.current = Some(student_id.to_string());

        match self.ctx.mastery_state {
            LoadState::Ready => {
                let radar = self
                    .ctx
                    .mastery
                    .as_ref()
                    .and_then(|m| m.radar(student_id, &self.order));
                match radar {
                    Some(series) => {
                        self.push_radar(&series);
                        self.ctx.rendered = Some(student_id.to_string());
                    }
                    None => {
                        debug!(student_id, "Selected student not in roster");
                        self.clear();
                        return;
                    }
                }
            }
            LoadState::Failed => {
                self.clear();
                return;
            }
            LoadState::Pending => {}
        }

        match self.ctx.submission_state {
            LoadState::Ready => self.render_profile(student_id),
            LoadState::Pending => {
                debug!(student_id, "Submission data not ready, deferring profile");
                self.ctx.pending = Some(student_id.to_string());
            }
            LoadState::Failed => self.profile.clear(),
        }
    }

    /// Re-validates the picker's value after its option list was rebuilt.
    ///
    /// Rebuilding the options does not fire a `change` event, so this is the
    /// only chance to notice that the stored value went stale.
    pub fn on_options_changed(&mut self, options: &[String], current: &str) {
        let current = current.trim();
        if options.is_empty() || current.is_empty() {
            debug!(options = options.len(), "Picker has no usable value");
            self.ctx.current = None;
            self.clear();
            return;
        }

        if !options.iter().any(|o| o.trim() == current) || !self.ctx.is_known(current) {
            debug!(current, "Picker value no longer valid");
            self.ctx.current = Some(current.to_string());
            self.clear();
            return;
        }

        // A value that was cleared while stale is drawn again once it is valid.
        if self.ctx.rendered.as_deref() != Some(current) {
            self.on_selection_change(current);
        }
    }

    fn render_profile(&mut self, student_id: &str) {
        let Some(submissions) = self.ctx.submissions.as_ref() else {
            self.profile.clear();
            return;
        };
        let activity = submissions.activity(student_id);
        self.profile.update(&activity);
    }

    fn push_radar(&mut self, series: &RadarSeries) {
        self.radar
            .update(&series.labels, &series.personal, &series.class_average);
    }

    /// Resets every chart to its empty frame and forgets any deferred selection.
    fn clear(&mut self) {
        self.ctx.pending = None;
        self.ctx.rendered = None;
        let empty = RadarSeries::empty(&self.order);
        self.push_radar(&empty);
        self.profile.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{MasteryRow, SubmissionRow};
    use chrono::NaiveDateTime;

    #[derive(Default)]
    struct Radar {
        mount: Option<String>,
        frames: Vec<(Vec<String>, Vec<f64>, Vec<f64>)>,
    }

    impl RadarRenderer for Radar {
        fn init(&mut self, mount: &str) {
            self.mount = Some(mount.to_string());
        }

        fn update(&mut self, labels: &[String], personal: &[f64], class_average: &[f64]) {
            self.frames
                .push((labels.to_vec(), personal.to_vec(), class_average.to_vec()));
        }
    }

    impl Radar {
        fn last_personal(&self) -> &[f64] {
            &self.frames.last().unwrap().1
        }

        fn last_is_zero(&self) -> bool {
            let (labels, personal, class_avg) = self.frames.last().unwrap();
            labels.len() == 8
                && personal.iter().all(|v| *v == 0.0)
                && class_avg.iter().all(|v| *v == 0.0)
        }
    }

    /// `None` records a clear.
    #[derive(Default)]
    struct Profile {
        frames: Vec<Option<StudentActivity>>,
    }

    impl ProfileRenderer for Profile {
        fn update(&mut self, activity: &StudentActivity) {
            self.frames.push(Some(activity.clone()));
        }

        fn clear(&mut self) {
            self.frames.push(None);
        }
    }

    impl Profile {
        fn last(&self) -> Option<&StudentActivity> {
            self.frames.last().and_then(Option::as_ref)
        }

        fn updates(&self) -> Vec<&str> {
            self.frames
                .iter()
                .flatten()
                .map(|a| a.student_id.as_str())
                .collect()
        }
    }

    #[derive(Default)]
    struct Alerts(Vec<String>);

    impl Notifier for Alerts {
        fn alert(&mut self, message: &str) {
            self.0.push(message.to_string());
        }
    }

    type TestCoordinator = SelectionCoordinator<Radar, Profile, Alerts>;

    fn coordinator() -> TestCoordinator {
        SelectionCoordinator::new(
            KnowledgeOrder::default(),
            "radarChart",
            Radar::default(),
            Profile::default(),
            Alerts::default(),
        )
    }

    fn mastery() -> MasteryIndex {
        let row = |class: &str, student: &str, kp: &str, score: f64| MasteryRow {
            class_id: class.to_string(),
            student_id: student.to_string(),
            knowledge_point: kp.to_string(),
            score,
        };
        MasteryIndex::build(&[
            row("Class1", "s01", "t5V9e", 0.6),
            row("Class1", "s01", "t5V9e", 0.8),
            row("Class1", "s02", "t5V9e", 0.9),
            row("Class1", "s03", "m3D1v", 0.5),
        ])
    }

    fn submissions() -> SubmissionIndex {
        let sub = |student: &str, ts: &str| {
            let timestamp = NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").unwrap();
            SubmissionRow {
                class_id: "Class1".to_string(),
                student_id: student.to_string(),
                question_id: "q1".to_string(),
                date: timestamp.date(),
                timestamp,
            }
        };
        SubmissionIndex::build(vec![
            sub("s01", "2024-01-01 08:00:00"),
            sub("s02", "2024-01-05 21:00:00"),
        ])
    }

    fn not_found() -> LoadError {
        LoadError::InvalidLocation("missing".to_string())
    }

    #[test]
    fn test_new_inits_and_draws_empty_frame() {
        let c = coordinator();
        assert_eq!(c.radar().mount.as_deref(), Some("radarChart"));
        assert!(c.radar().last_is_zero());
        assert_eq!(c.profile().frames, vec![None]);
        assert!(!c.context().is_mastery_ready());
        assert!(!c.context().is_submission_ready());
    }

    #[test]
    fn test_selection_with_both_ready_renders_both() {
        let mut c = coordinator();
        c.on_mastery_loaded(Ok(mastery()));
        c.on_submissions_loaded(Ok(submissions()));

        c.on_selection_change("s01");

        assert_eq!(c.radar().last_personal()[0], 70.0);
        let (_, _, class_avg) = c.radar().frames.last().unwrap();
        assert_eq!(class_avg[0], 80.0);
        assert_eq!(class_avg[1], 50.0);

        let activity = c.profile().last().unwrap();
        assert_eq!(activity.student_id, "s01");
        assert_eq!(activity.calendar.len(), 5);
        assert_eq!(activity.hourly.len(), 1);

        let ctx = c.context();
        assert_eq!(ctx.mastery().map(|m| m.len()), Some(3));
        assert_eq!(ctx.submissions().map(|s| s.total_records()), Some(2));
        assert_eq!(ctx.calendar_range().map(|r| r.days()), Some(5));
    }

    #[test]
    fn test_unknown_and_empty_selection_look_the_same() {
        let mut a = coordinator();
        let mut b = coordinator();
        for c in [&mut a, &mut b] {
            c.on_mastery_loaded(Ok(mastery()));
            c.on_submissions_loaded(Ok(submissions()));
            c.on_selection_change("s01");
        }

        a.on_selection_change("nobody");
        b.on_selection_change("");

        assert!(a.radar().last_is_zero());
        assert!(b.radar().last_is_zero());
        assert_eq!(a.radar().frames.last(), b.radar().frames.last());
        assert_eq!(a.profile().frames.last(), Some(&None));
        assert_eq!(b.profile().frames.last(), Some(&None));
    }

    #[test]
    fn test_late_submissions_replay_latest_selection_only() {
        let mut c = coordinator();
        c.on_mastery_loaded(Ok(mastery()));

        c.on_selection_change("s01");
        assert_eq!(c.radar().last_personal()[0], 70.0);
        assert_eq!(c.context().pending(), Some("s01"));

        c.on_selection_change("s02");
        assert_eq!(c.context().pending(), Some("s02"));
        assert!(c.profile().updates().is_empty());

        c.on_submissions_loaded(Ok(submissions()));

        assert_eq!(c.profile().updates(), vec!["s02"]);
        assert_eq!(c.context().pending(), None);
    }

    #[test]
    fn test_clear_discards_pending_selection() {
        let mut c = coordinator();
        c.on_mastery_loaded(Ok(mastery()));
        c.on_selection_change("s01");
        c.on_selection_change("");
        assert_eq!(c.context().pending(), None);

        c.on_submissions_loaded(Ok(submissions()));
        assert!(c.profile().updates().is_empty());
    }

    #[test]
    fn test_selection_before_mastery_is_revalidated() {
        let mut c = coordinator();
        c.on_submissions_loaded(Ok(submissions()));

        c.on_selection_change("s02");
        // Radar untouched until the roster exists.
        assert_eq!(c.radar().frames.len(), 1);
        assert_eq!(c.profile().updates(), vec!["s02"]);

        c.on_mastery_loaded(Ok(mastery()));
        assert_eq!(c.radar().last_personal()[0], 90.0);
        assert_eq!(c.context().current(), Some("s02"));
    }

    #[test]
    fn test_unknown_selection_before_mastery_is_cleared_on_load() {
        let mut c = coordinator();
        c.on_selection_change("ghost");
        assert_eq!(c.context().pending(), Some("ghost"));

        c.on_mastery_loaded(Ok(mastery()));
        assert!(c.radar().last_is_zero());
        assert_eq!(c.context().pending(), None);

        c.on_submissions_loaded(Ok(submissions()));
        assert!(c.profile().updates().is_empty());
    }

    #[test]
    fn test_mastery_failure_alerts_once_and_clears() {
        let mut c = coordinator();
        c.on_submissions_loaded(Ok(submissions()));
        c.on_mastery_loaded(Err(not_found()));

        assert_eq!(c.context().mastery_state(), LoadState::Failed);
        assert_eq!(c.notifier().0.len(), 1);

        c.on_selection_change("s01");
        assert!(c.radar().last_is_zero());
        assert!(c.profile().updates().is_empty());

        // Terminal: a late success does not revive it.
        c.on_mastery_loaded(Ok(mastery()));
        assert_eq!(c.context().mastery_state(), LoadState::Failed);
        assert_eq!(c.notifier().0.len(), 1);
    }

    #[test]
    fn test_submission_failure_keeps_radar_working() {
        let mut c = coordinator();
        c.on_mastery_loaded(Ok(mastery()));
        c.on_selection_change("s01");
        c.on_submissions_loaded(Err(not_found()));

        assert_eq!(c.context().submission_state(), LoadState::Failed);
        assert_eq!(c.context().pending(), None);
        assert!(c.notifier().0.is_empty());

        c.on_selection_change("s02");
        assert_eq!(c.radar().last_personal()[0], 90.0);
        assert_eq!(c.profile().frames.last(), Some(&None));
    }

    #[test]
    fn test_options_changed_revalidates() {
        let mut c = coordinator();
        c.on_mastery_loaded(Ok(mastery()));
        c.on_submissions_loaded(Ok(submissions()));
        c.on_selection_change("s01");
        let frames = c.radar().frames.len();

        let options = vec!["s01".to_string(), "s02".to_string()];

        // Same valid value: nothing to redraw.
        c.on_options_changed(&options, "s01");
        assert_eq!(c.radar().frames.len(), frames);

        // Value silently moved to another valid student.
        c.on_options_changed(&options, "s02");
        assert_eq!(c.radar().last_personal()[0], 90.0);
        assert_eq!(c.profile().last().unwrap().student_id, "s02");

        // Options rebuilt without the current value.
        c.on_options_changed(&["s03".to_string()], "s02");
        assert!(c.radar().last_is_zero());
        assert_eq!(c.profile().frames.last(), Some(&None));

        // The stale value becomes valid again.
        c.on_options_changed(&["s02".to_string(), "s03".to_string()], "s02");
        assert_eq!(c.radar().last_personal()[0], 90.0);
        assert_eq!(c.profile().last().unwrap().student_id, "s02");
        assert_eq!(c.context().rendered(), Some("s02"));

        c.on_options_changed(&options, "s01");
        assert_eq!(c.radar().last_personal()[0], 70.0);

        // No options at all.
        c.on_options_changed(&[], "s01");
        assert!(c.radar().last_is_zero());
        assert_eq!(c.context().current(), None);
    }

    #[test]
    fn test_options_before_mastery_are_drawn_once_roster_loads() {
        let mut c = coordinator();
        c.on_submissions_loaded(Ok(submissions()));

        c.on_options_changed(&["s01".to_string()], "s01");
        assert!(c.radar().last_is_zero());
        assert_eq!(c.profile().frames.last(), Some(&None));
        assert_eq!(c.context().current(), Some("s01"));
        assert_eq!(c.context().rendered(), None);

        c.on_mastery_loaded(Ok(mastery()));
        assert_eq!(c.radar().last_personal()[0], 70.0);
        assert_eq!(c.profile().last().unwrap().student_id, "s01");
        assert_eq!(c.context().rendered(), Some("s01"));
    }

    #[test]
    fn test_options_with_value_outside_roster_clears() {
        let mut c = coordinator();
        c.on_mastery_loaded(Ok(mastery()));
        c.on_selection_change("s01");

        c.on_options_changed(&["x9".to_string()], "x9");
        assert!(c.radar().last_is_zero());
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let mut c = coordinator();
        c.on_mastery_loaded(Ok(mastery()));
        c.on_submissions_loaded(Ok(submissions()));

        c.on_selection_change("s01");
        c.on_selection_change("s01");

        let radar = &c.radar().frames;
        assert_eq!(radar[radar.len() - 1], radar[radar.len() - 2]);
        let profile = &c.profile().frames;
        assert_eq!(profile[profile.len() - 1], profile[profile.len() - 2]);
    }

    #[tokio::test]
    async fn test_run_processes_events_in_order() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(DashboardEvent::SelectionChanged("s01".to_string()))
            .unwrap();
        tx.send(DashboardEvent::MasteryLoaded(Ok(mastery()))).unwrap();
        tx.send(DashboardEvent::SelectionChanged("s02".to_string()))
            .unwrap();
        tx.send(DashboardEvent::SubmissionsLoaded(Ok(submissions())))
            .unwrap();
        drop(tx);

        let c = coordinator().run(rx).await;

        assert!(c.context().is_mastery_ready());
        assert!(c.context().is_submission_ready());
        assert_eq!(c.radar().last_personal()[0], 90.0);
        assert_eq!(c.profile().updates(), vec!["s02"]);
    }
}
