//! Transport controller.
//!
//! A [`Session`] owns everything one sequencer instance needs: the catalog,
//! the grid, the buffer cache, the audio output, the step scheduler and the
//! visual timeline. The host drives it by calling [`Session::pump`] whenever
//! [`Session::next_wakeup`] says something is due; there is no hidden thread.
//!
//! ```text
//!   Idle --start()--> Starting --preload ok--> Running
//!     ^                  |                        |
//!     +---- failure -----+-------- stop() --------+
//! ```
//!
//! User-visible messages go through one status channel (see
//! [`Session::status_receiver`]); they are also logged.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use log::Level;
use tokio::time::Instant;

use crate::audio::{AudioBackend, AudioOutput};
use crate::buffer_cache::{BufferCache, SoundSource};
use crate::catalog::{Catalog, SoundId};
use crate::error::{CatalogError, Error, Result};
use crate::grid::GridStore;
use crate::scheduler::{DueStep, StepScheduler};
use crate::timing::{SessionSettings, MIN_TICK_INTERVAL};
use crate::visual::{DisplayState, PendingVisualEvent, VisualTimeline};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    /// Output is opening and buffers are preloading.
    Starting,
    Running,
}

/// A message meant for the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusEvent {
    pub level: Level,
    pub message: String,
}

/// The installed periodic tick.
#[derive(Clone, Copy, Debug)]
struct TickTimer {
    period: Duration,
    next_due: Instant,
}

fn emit(tx: &Sender<StatusEvent>, level: Level, message: impl Into<String>) {
    let message = message.into();
    log::log!(target: "pulsegrid::status", level, "{}", message);
    // The receiver lives as long as the session.
    let _ = tx.send(StatusEvent { level, message });
}

pub struct Session {
    settings: SessionSettings,
    catalog: Option<Arc<Catalog>>,
    grid: GridStore,
    cache: Arc<BufferCache>,
    backend: Box<dyn AudioBackend>,
    output: Option<Box<dyn AudioOutput>>,
    scheduler: StepScheduler,
    visuals: VisualTimeline,
    ticker: Option<TickTimer>,
    state: TransportState,
    generation: u64,
    status_tx: Sender<StatusEvent>,
    status_rx: Receiver<StatusEvent>,
}

impl Session {
    /// Create an idle session with no catalog and an empty grid.
    ///
    /// The output device is not opened until the first `start()` or preview.
    pub fn new(
        mut settings: SessionSettings,
        backend: Box<dyn AudioBackend>,
        source: Arc<dyn SoundSource>,
    ) -> Self {
        settings.tick_interval = settings.tick_interval.max(MIN_TICK_INTERVAL);
        let mut scheduler = StepScheduler::new(settings.lookahead_secs);
        scheduler.set_tempo(settings.bpm);
        let (status_tx, status_rx) = crossbeam_channel::unbounded();
        Self {
            visuals: VisualTimeline::new(settings.flash_duration),
            settings,
            catalog: None,
            grid: GridStore::new(),
            cache: Arc::new(BufferCache::new(source)),
            backend,
            output: None,
            scheduler,
            ticker: None,
            state: TransportState::Idle,
            generation: 0,
            status_tx,
            status_rx,
        }
    }

    fn report(&self, level: Level, message: impl Into<String>) {
        emit(&self.status_tx, level, message);
    }

    // === Accessors ===

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TransportState::Running
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Shared handle to the grid. Edits through it are seen by the next tick.
    pub fn grid(&self) -> &GridStore {
        &self.grid
    }

    pub fn catalog(&self) -> Option<&Arc<Catalog>> {
        self.catalog.as_ref()
    }

    pub fn cache(&self) -> &Arc<BufferCache> {
        &self.cache
    }

    pub fn display(&self) -> &DisplayState {
        self.visuals.display()
    }

    pub fn tempo(&self) -> f64 {
        self.scheduler.tempo()
    }

    /// Last step handed to the audio output (ahead of what is audible).
    pub fn scheduled_step(&self) -> Option<usize> {
        self.scheduler.playhead()
    }

    /// Incremented on every successful start.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status_receiver(&self) -> Receiver<StatusEvent> {
        self.status_rx.clone()
    }

    /// Take every status message queued so far.
    pub fn drain_status(&self) -> Vec<StatusEvent> {
        self.status_rx.try_iter().collect()
    }

    // === Catalog and grid ===

    /// Install a catalog and reset the grid to its template.
    pub fn set_catalog(&mut self, catalog: Catalog) {
        log::info!("Catalog loaded with {} sound(s)", catalog.len());
        let catalog = Arc::new(catalog);
        self.grid.reset_to_template(&catalog);
        self.catalog = Some(catalog);
    }

    /// Record a failed catalog load. The grid is emptied and `start()` is
    /// refused until [`Session::set_catalog`] succeeds.
    pub fn catalog_failed(&mut self, error: &CatalogError) {
        self.stop();
        self.catalog = None;
        self.grid.clear_all();
        self.report(Level::Error, format!("Could not load sounds: {error}"));
    }

    /// Load a manifest from disk and install it, reporting failures.
    pub fn load_catalog(&mut self, path: &std::path::Path) -> Result<()> {
        match Catalog::load(path) {
            Ok(catalog) => {
                self.set_catalog(catalog);
                Ok(())
            }
            Err(e) => {
                self.catalog_failed(&e);
                Err(e.into())
            }
        }
    }

    pub fn read_cell(&self, row: usize, column: usize) -> Option<SoundId> {
        self.grid.read(row, column)
    }

    /// Bind or clear a cell. Valid in any transport state.
    ///
    /// # Panics
    ///
    /// Panics if the cell is out of range.
    pub fn set_cell(&self, row: usize, column: usize, id: Option<SoundId>) {
        self.grid.set(row, column, id);
    }

    /// Replace the grid with the catalog template (empty without a catalog).
    pub fn reset_to_template(&self) {
        match &self.catalog {
            Some(catalog) => self.grid.reset_to_template(catalog),
            None => self.grid.clear_all(),
        }
    }

    pub fn clear_all(&self) {
        self.grid.clear_all();
    }

    // === Transport ===

    /// Open and resume the output. Returns the device time.
    fn ensure_output(&mut self) -> Result<f64> {
        let output = match self.output.take() {
            Some(output) => output,
            None => {
                let mut output = self.backend.open()?;
                output.set_master_gain(self.settings.master_gain);
                log::info!("[TRANSPORT] Audio output ready at {} Hz", output.sample_rate());
                output
            }
        };
        let output = self.output.insert(output);
        output.resume()?;
        Ok(output.current_time())
    }

    fn device_time(&self) -> f64 {
        self.output.as_ref().map_or(0.0, |o| o.current_time())
    }

    /// Start playback from step 0. A no-op unless idle.
    ///
    /// On failure the session is back to idle, the error is reported on the
    /// status channel and returned.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != TransportState::Idle {
            log::debug!("[TRANSPORT] start() ignored in state {:?}", self.state);
            return Ok(());
        }
        self.state = TransportState::Starting;
        log::info!("[TRANSPORT] Starting");

        match self.try_start().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.report(Level::Error, format!("Could not start playback: {e}"));
                self.stop();
                Err(e)
            }
        }
    }

    async fn try_start(&mut self) -> Result<()> {
        let catalog = self.catalog.clone().ok_or(Error::NoCatalog)?;
        self.ensure_output()?;

        let grid = self.grid.snapshot();
        self.cache.preload(&grid, &catalog).await?;

        // Preloading may have taken a while; read the clock afterwards.
        let device_now = self.device_time();
        self.generation += 1;
        self.scheduler
            .reset(device_now, self.settings.startup_offset_secs);
        self.state = TransportState::Running;
        self.report(
            Level::Info,
            format!("Playing at {:.0} BPM", self.scheduler.tempo()),
        );

        let now = Instant::now();
        self.tick(now);
        self.ticker = Some(TickTimer {
            period: self.settings.tick_interval,
            next_due: now + self.settings.tick_interval,
        });
        Ok(())
    }

    /// Stop playback and clear the playhead and flashes. Idempotent.
    pub fn stop(&mut self) {
        if self.state == TransportState::Idle {
            return;
        }
        let was_running = self.state == TransportState::Running;

        self.ticker = None;
        let dropped = self.visuals.cancel(self.generation);
        self.visuals.reset();
        self.scheduler.stop();
        self.state = TransportState::Idle;

        log::info!(
            "[TRANSPORT] Stopped (generation {}, {} visual transition(s) dropped)",
            self.generation,
            dropped
        );
        if was_running {
            self.report(Level::Info, "Stopped");
        }
    }

    /// Stop playback and release the output device.
    pub fn close(mut self) {
        self.stop();
        self.output = None;
        log::info!("[TRANSPORT] Session closed after {} run(s)", self.generation);
    }

    /// Start when idle, stop otherwise. Returns the new state.
    pub async fn toggle(&mut self) -> Result<TransportState> {
        match self.state {
            TransportState::Idle => self.start().await?,
            TransportState::Starting | TransportState::Running => self.stop(),
        }
        Ok(self.state)
    }

    /// Change the tempo. Returns the applied (clamped) value.
    pub fn set_tempo(&mut self, bpm: f64) -> f64 {
        let applied = self.scheduler.set_tempo(bpm);
        self.settings.bpm = applied;
        log::info!("[TRANSPORT] Tempo {:.0} BPM", applied);
        applied
    }

    pub fn set_master_gain(&mut self, gain: f32) {
        self.settings.master_gain = gain;
        if let Some(output) = self.output.as_mut() {
            output.set_master_gain(gain);
        }
    }

    /// Play one sound right away, whatever the transport state.
    pub async fn preview_sound(&mut self, id: &SoundId) -> Result<()> {
        let result = self.try_preview(id).await;
        if let Err(e) = &result {
            self.report(Level::Warn, format!("Cannot preview '{id}': {e}"));
        }
        result
    }

    async fn try_preview(&mut self, id: &SoundId) -> Result<()> {
        let catalog = self.catalog.clone().ok_or(Error::NoCatalog)?;
        let descriptor = catalog
            .get(id)
            .ok_or_else(|| Error::UnknownSound(id.clone()))?;
        let locator = descriptor.source_locator.clone();
        let buffer = self
            .cache
            .get(&locator)
            .await
            .map_err(|source| Error::Decode { locator, source })?;

        let now = self.ensure_output()?;
        if let Some(output) = self.output.as_mut() {
            output.schedule(buffer, now);
        }
        Ok(())
    }

    // === Timer ===

    /// Run whatever is due: the scheduler tick (if its period elapsed) and
    /// display transitions. Returns the number of display transitions applied.
    pub fn pump(&mut self) -> usize {
        let now = Instant::now();
        let tick_due = match self.ticker.as_mut() {
            Some(ticker) if ticker.next_due <= now => {
                while ticker.next_due <= now {
                    ticker.next_due += ticker.period;
                }
                true
            }
            _ => false,
        };
        if tick_due {
            self.tick(now);
        }
        self.visuals.poll(now)
    }

    /// When [`Session::pump`] next has work to do.
    pub fn next_wakeup(&self) -> Option<Instant> {
        let tick = self.ticker.map(|t| t.next_due);
        match (tick, self.visuals.next_due()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn tick(&mut self, wall_now: Instant) {
        if self.state != TransportState::Running {
            return;
        }
        let Some(output) = self.output.as_mut() else {
            return;
        };
        let audio_now = output.current_time();
        let due = self
            .grid
            .with_grid(|grid| self.scheduler.collect_due_steps(audio_now, grid));

        for DueStep {
            step,
            deadline,
            cells,
        } in due
        {
            self.visuals
                .schedule_playhead(step, deadline, audio_now, wall_now, self.generation);

            for (row, id) in cells {
                let Some(descriptor) = self.catalog.as_ref().and_then(|c| c.get(&id)) else {
                    log::trace!("[SCHEDULER] '{}' at row {} is not in the catalog, skipping", id, row);
                    continue;
                };
                let Some(buffer) = self.cache.get_cached(&descriptor.source_locator) else {
                    emit(
                        &self.status_tx,
                        Level::Warn,
                        format!("'{id}' is not loaded yet, skipped at step {}", step + 1),
                    );
                    fetch_in_background(&self.cache, &self.status_tx, &descriptor.source_locator);
                    continue;
                };

                output.schedule(buffer, deadline);
                self.visuals.schedule(
                    PendingVisualEvent {
                        row,
                        step,
                        onset: deadline,
                    },
                    audio_now,
                    wall_now,
                    self.generation,
                );
            }
        }
    }
}

/// Decode a sound that missed preloading so later passes can play it.
fn fetch_in_background(cache: &Arc<BufferCache>, status: &Sender<StatusEvent>, locator: &str) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        return;
    };
    let cache = Arc::clone(cache);
    let status = status.clone();
    let locator = locator.to_string();
    handle.spawn(async move {
        if let Err(e) = cache.get(&locator).await {
            emit(&status, Level::Warn, format!("Cannot load {locator}: {e}"));
        }
    });
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("tempo", &self.scheduler.tempo())
            .field("grid", &self.grid)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::MockBackend;
    use crate::buffer_cache::tests::CountingSource;
    use crate::catalog::SoundDescriptor;
    use crate::grid::{COLUMNS, ROWS};
    use crate::timing::{MAX_BPM, MIN_BPM};
    use std::sync::atomic::Ordering;

    /// `n` sounds, even indices in "drums" and odd ones in "keys".
    fn catalog(n: usize) -> Catalog {
        Catalog::new(
            (0..n)
                .map(|i| {
                    SoundDescriptor::new(
                        format!("s{i}"),
                        format!("Sound {i}"),
                        if i % 2 == 0 { "drums" } else { "keys" },
                        format!("s{i}.wav"),
                    )
                })
                .collect(),
        )
        .unwrap()
    }

    fn session_with(n: usize) -> (Session, MockBackend, Arc<CountingSource>) {
        let backend = MockBackend::new();
        let source = Arc::new(CountingSource::default());
        let mut session = Session::new(
            SessionSettings::default(),
            Box::new(backend.clone()),
            source.clone(),
        );
        session.set_catalog(catalog(n));
        (session, backend, source)
    }

    /// Advance the paused clock in 5 ms slices, pumping after each.
    async fn run_for(session: &mut Session, total: Duration) {
        let slice = Duration::from_millis(5);
        let mut elapsed = Duration::ZERO;
        while elapsed < total {
            tokio::time::advance(slice).await;
            elapsed += slice;
            session.pump();
        }
    }

    fn play_times(backend: &MockBackend) -> Vec<f64> {
        backend.plays().iter().map(|p| p.at).collect()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_second_schedules_steps_zero_to_two() {
        let (mut session, backend, source) = session_with(3);
        assert_eq!(session.catalog().unwrap().categories().len(), 2);
        session.set_cell(0, 1, Some("s0".into()));
        session.set_cell(1, 2, Some("s1".into()));

        session.start().await.unwrap();
        assert_eq!(session.state(), TransportState::Running);
        assert_eq!(source.loads(), 3);

        run_for(&mut session, Duration::from_millis(1050)).await;

        // Steps 0, 1 and 2 have been handed to the output, step 3 has not.
        assert_eq!(session.scheduled_step(), Some(2));
        let times = play_times(&backend);
        assert_eq!(times.len(), 5);
        assert!(times[..3].iter().all(|t| approx(*t, 0.05)));
        assert!(approx(times[3], 0.55));
        assert!(approx(times[4], 1.05));
        // Every scheduled onset was inside the lookahead window when queued.
        assert!(times.iter().all(|t| *t < 1.05 + 0.16));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_without_catalog_fails() {
        let backend = MockBackend::new();
        let mut session = Session::new(
            SessionSettings::default(),
            Box::new(backend.clone()),
            Arc::new(CountingSource::default()),
        );
        let err = session.start().await.unwrap_err();
        assert!(matches!(err, Error::NoCatalog));
        assert_eq!(session.state(), TransportState::Idle);
        assert!(session.next_wakeup().is_none());
        let status = session.drain_status();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].level, Level::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_failure_keeps_idle() {
        let (mut session, backend, source) = session_with(3);
        backend.set_fail_open(true);

        let err = session.start().await.unwrap_err();
        assert!(matches!(err, Error::Audio(_)));
        assert_eq!(session.state(), TransportState::Idle);
        assert!(session.next_wakeup().is_none());
        assert_eq!(source.loads(), 0);
        assert!(session
            .drain_status()
            .iter()
            .any(|s| s.level == Level::Error));

        backend.set_fail_open(false);
        session.start().await.unwrap();
        assert!(session.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_preload_failure_aborts_then_retries() {
        let (mut session, backend, source) = session_with(3);
        source.fail("s1.wav");

        let err = session.start().await.unwrap_err();
        match err {
            Error::Preload(e) => {
                assert_eq!(e.failures.len(), 1);
                assert_eq!(e.failures[0].locator, "s1.wav");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(session.state(), TransportState::Idle);
        assert!(session.next_wakeup().is_none());
        run_for(&mut session, Duration::from_millis(500)).await;
        assert!(backend.plays().is_empty());

        source.heal("s1.wav");
        session.start().await.unwrap();
        assert!(session.is_running());
        // The two good sounds stayed cached, only the failed one is retried.
        assert_eq!(source.loads(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_then_start_resets_to_step_zero() {
        let (mut session, backend, _source) = session_with(3);
        session.start().await.unwrap();
        run_for(&mut session, Duration::from_millis(1200)).await;
        assert_ne!(session.scheduled_step(), Some(0));

        session.stop();
        assert_eq!(session.state(), TransportState::Idle);
        assert_eq!(session.display(), &DisplayState::default());
        assert!(session.next_wakeup().is_none());
        assert_eq!(session.scheduled_step(), None);
        session.stop();

        run_for(&mut session, Duration::from_millis(300)).await;
        backend.clear_plays();
        let generation = session.generation();

        session.start().await.unwrap();
        assert_eq!(session.generation(), generation + 1);
        assert_eq!(session.scheduled_step(), Some(0));
        let restart_at = backend.origin.elapsed().as_secs_f64();
        let times = play_times(&backend);
        assert_eq!(times.len(), 3);
        assert!(times.iter().all(|t| approx(*t, restart_at + 0.05)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_flash_after_stop() {
        let (mut session, _backend, _source) = session_with(5);
        session.start().await.unwrap();
        // Flashes for step 0 are queued for 50 ms from now.
        assert!(session.next_wakeup().is_some());
        session.stop();

        for _ in 0..100 {
            tokio::time::advance(Duration::from_millis(10)).await;
            session.pump();
            assert!(!session.display().any_flashing());
            assert_eq!(session.display().playhead, None);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_flash_follows_onset() {
        let (mut session, _backend, _source) = session_with(2);
        session.start().await.unwrap();

        run_for(&mut session, Duration::from_millis(45)).await;
        assert!(!session.display().is_flashing(0, 0));
        assert_eq!(session.display().playhead, None);

        run_for(&mut session, Duration::from_millis(10)).await;
        assert!(session.display().is_flashing(0, 0));
        assert!(session.display().is_flashing(1, 0));
        assert!(!session.display().is_flashing(2, 0));
        assert_eq!(session.display().playhead, Some(0));

        run_for(&mut session, Duration::from_millis(300)).await;
        assert!(!session.display().any_flashing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_id_is_skipped() {
        let (mut session, backend, _source) = session_with(1);
        session.set_cell(2, 1, Some("ghost".into()));
        session.start().await.unwrap();
        run_for(&mut session, Duration::from_millis(600)).await;

        assert_eq!(session.scheduled_step(), Some(1));
        assert_eq!(play_times(&backend).len(), 1);
        assert!(!session
            .drain_status()
            .iter()
            .any(|s| s.level == Level::Warn));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sound_added_mid_session_plays_from_next_pass() {
        let (mut session, backend, _source) = session_with(ROWS + 1);
        session.start().await.unwrap();
        assert!(!session.cache().is_cached("s5.wav"));

        session.set_cell(0, 1, Some("s5".into()));
        run_for(&mut session, Duration::from_millis(600)).await;
        assert!(!play_times(&backend).iter().any(|t| approx(*t, 0.55)));
        assert!(session
            .drain_status()
            .iter()
            .any(|s| s.level == Level::Warn && s.message.contains("s5")));
        assert!(session.cache().is_cached("s5.wav"));

        // One full cycle later the step plays.
        let second_pass = 0.55 + COLUMNS as f64 * 0.5;
        run_for(&mut session, Duration::from_millis(4000)).await;
        assert!(play_times(&backend).iter().any(|t| approx(*t, second_pass)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_grid_edit_seen_by_next_tick() {
        let (mut session, backend, _source) = session_with(3);
        session.start().await.unwrap();
        run_for(&mut session, Duration::from_millis(500)).await;

        session.set_cell(1, 3, Some("s2".into()));
        session.clear_all();
        session.set_cell(1, 3, Some("s2".into()));
        backend.clear_plays();
        run_for(&mut session, Duration::from_millis(1200)).await;

        let times = play_times(&backend);
        assert_eq!(times.len(), 1);
        assert!(approx(times[0], 1.55));
    }

    #[tokio::test(start_paused = true)]
    async fn test_preview_while_idle() {
        let (mut session, backend, _source) = session_with(3);
        tokio::time::advance(Duration::from_millis(200)).await;

        session.preview_sound(&"s1".into()).await.unwrap();
        assert_eq!(session.state(), TransportState::Idle);
        assert_eq!(backend.opened.load(Ordering::SeqCst), 1);
        let plays = backend.plays();
        assert_eq!(plays.len(), 1);
        assert!(approx(plays[0].at, 0.2));

        let err = session.preview_sound(&"nope".into()).await.unwrap_err();
        assert!(matches!(err, Error::UnknownSound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_output_is_reused_across_starts() {
        let (mut session, backend, _source) = session_with(3);
        session.start().await.unwrap();
        session.stop();
        session.start().await.unwrap();
        assert_eq!(backend.opened.load(Ordering::SeqCst), 1);
        assert!(backend.resumed.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_and_redundant_start() {
        let (mut session, _backend, _source) = session_with(3);
        assert_eq!(session.toggle().await.unwrap(), TransportState::Running);
        let generation = session.generation();
        session.start().await.unwrap();
        assert_eq!(session.generation(), generation);
        assert_eq!(session.toggle().await.unwrap(), TransportState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tempo_is_clamped() {
        let (mut session, _backend, _source) = session_with(3);
        assert_eq!(session.set_tempo(200.0), MAX_BPM);
        assert_eq!(session.set_tempo(20.0), MIN_BPM);
        assert_eq!(session.tempo(), MIN_BPM);
        assert_eq!(session.set_tempo(100.0), 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_catalog_failure_empties_grid_and_blocks_start() {
        let (mut session, _backend, _source) = session_with(3);
        session.catalog_failed(&CatalogError::Empty);
        assert_eq!(session.grid().snapshot().occupied_count(), 0);
        assert!(session.catalog().is_none());
        assert!(session
            .drain_status()
            .iter()
            .any(|s| s.level == Level::Error));
        assert!(matches!(session.start().await, Err(Error::NoCatalog)));

        session.set_catalog(catalog(2));
        assert_eq!(session.grid().snapshot().occupied_count(), 2);
        session.start().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_sessions() {
        let (mut a, backend_a, _) = session_with(2);
        let (mut b, backend_b, _) = session_with(2);
        a.start().await.unwrap();
        assert!(!b.is_running());
        assert_eq!(backend_b.opened.load(Ordering::SeqCst), 0);

        a.close();
        run_for(&mut b, Duration::from_millis(100)).await;
        assert_eq!(backend_a.plays().len(), 2);
        assert!(backend_b.plays().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_tick_interval_is_raised_to_minimum() {
        let backend = MockBackend::new();
        let settings = SessionSettings {
            tick_interval: Duration::ZERO,
            ..SessionSettings::default()
        };
        let mut session = Session::new(
            settings,
            Box::new(backend.clone()),
            Arc::new(CountingSource::default()),
        );
        assert_eq!(session.settings().tick_interval, MIN_TICK_INTERVAL);
        session.set_catalog(catalog(2));
        session.start().await.unwrap();

        tokio::time::advance(Duration::from_millis(5)).await;
        session.pump();
        let wakeup = session.next_wakeup().unwrap();
        assert!(wakeup > Instant::now());
        assert!(wakeup <= Instant::now() + MIN_TICK_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_master_gain_reaches_output() {
        let (mut session, backend, _source) = session_with(1);
        session.start().await.unwrap();
        session.set_master_gain(0.25);
        assert_eq!(*backend.gain.lock().unwrap(), 0.25);
    }
}
