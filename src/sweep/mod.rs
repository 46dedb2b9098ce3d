//! Sweep sequencer
//!
//! Drives the meter and the temperature controller through one measurement run and
//! assembles the result table. All device traffic is strictly sequential: a command
//! is only issued once the previous reply has been read.
//!
//! # State machine
//!
//! ```text
//! Idle → Configuring → Sweeping ⇄ (Settling → Sampling) → Finalizing → Done
//!                          └──────────── fatal error ─────────→ Finalizing → Aborted
//! ```
//!
//! # Traversal policies
//!
//! - [`SweepMode::FrequencySweep`]: major → minor → frequency. Each frequency has one
//!   row whose columns are filled as the combinations are measured.
//! - [`SweepMode::FrequencySweepWithTemperature`]: as above, polling the controller
//!   once per frequency (on the first combination) and stopping it at the end.
//! - [`SweepMode::Timed`]: fixed frequency, one row per iteration until the elapsed
//!   time exceeds the duration. Checked at the top of each iteration only.
//! - [`SweepMode::TemperatureBounded`]: fixed frequency, direction decided from an
//!   initial reading, one row per iteration until the process value reaches the
//!   target. The table is checkpointed after every row. Missing readings skip the
//!   stop check, but a controller silent for more than `read_attempts` consecutive
//!   polls aborts the run.
//!
//! Controller-driven modes always issue `stop()` on exit, including after a fatal
//! error. A fatal error returns [`SweepAborted`] carrying the rows completed so far.

pub mod config;
pub mod table;

pub use config::{SweepConfig, SweepMode};
pub use table::{schema_for, Column, ResultRow, ResultTable, RowSink};

use crate::averager::SampleAverager;
use crate::clock::Clock;
use crate::controller::{celsius_to_tenths, TemperatureController};
use crate::error::{AppResult, DaqError};
use crate::measurement::{ParameterKind, ParameterPair, TemperatureReading};
use crate::meter::ImpedanceMeter;
use crate::settling::SettlingPolicy;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Default number of consecutive unanswered temperature polls tolerated by a
/// temperature-bounded sweep, initial reading included.
pub const DEFAULT_READ_ATTEMPTS: u32 = 5;

// =============================================================================
// State
// =============================================================================

/// Observable sequencer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweepState {
    Idle,
    Configuring,
    Sweeping,
    Settling,
    Sampling,
    Finalizing,
    Done,
    Aborted,
}

impl fmt::Display for SweepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SweepState::Idle => "idle",
            SweepState::Configuring => "configuring",
            SweepState::Sweeping => "sweeping",
            SweepState::Settling => "settling",
            SweepState::Sampling => "sampling",
            SweepState::Finalizing => "finalizing",
            SweepState::Done => "done",
            SweepState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// A sweep abandoned on a fatal error, with the rows completed before it.
#[derive(Debug, Error)]
#[error("sweep aborted after {} completed rows: {cause}", .partial.len())]
pub struct SweepAborted {
    pub partial: ResultTable,
    #[source]
    pub cause: DaqError,
}

// =============================================================================
// Sequencer
// =============================================================================

/// Runs sweeps against borrowed devices.
pub struct SweepSequencer<'a> {
    meter: &'a mut dyn ImpedanceMeter,
    controller: Option<&'a mut dyn TemperatureController>,
    clock: &'a dyn Clock,
    settling: SettlingPolicy,
    checkpoint: Option<&'a mut dyn RowSink>,
    read_attempts: u32,
    state: SweepState,
    selected_major: Option<ParameterKind>,
    selected_minor: Option<ParameterKind>,
}

impl<'a> SweepSequencer<'a> {
    pub fn new(meter: &'a mut dyn ImpedanceMeter, clock: &'a dyn Clock) -> Self {
        Self {
            meter,
            controller: None,
            clock,
            settling: SettlingPolicy::default(),
            checkpoint: None,
            read_attempts: DEFAULT_READ_ATTEMPTS,
            state: SweepState::Idle,
            selected_major: None,
            selected_minor: None,
        }
    }

    /// Temperature controller, required by every mode except `FrequencySweep`.
    pub fn with_controller(mut self, controller: &'a mut dyn TemperatureController) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn with_settling(mut self, settling: SettlingPolicy) -> Self {
        self.settling = settling;
        self
    }

    /// Sink notified after every appended row. Sink failures are logged, never fatal.
    pub fn with_checkpoint(mut self, sink: &'a mut dyn RowSink) -> Self {
        self.checkpoint = Some(sink);
        self
    }

    /// Consecutive unanswered temperature polls a bounded sweep tolerates.
    pub fn with_read_attempts(mut self, attempts: u32) -> Self {
        self.read_attempts = attempts.max(1);
        self
    }

    pub fn state(&self) -> SweepState {
        self.state
    }

    /// Run one sweep to completion.
    pub fn run(&mut self, config: &SweepConfig) -> Result<ResultTable, SweepAborted> {
        let mut table = ResultTable::for_config(config);
        self.selected_major = None;
        self.selected_minor = None;
        self.transition(SweepState::Configuring);
        info!(mode = %config.mode, averaging = config.averaging, "Starting sweep");

        if let Err(cause) = self.preflight(config) {
            return Err(self.abort(table, cause));
        }

        let outcome = match &config.mode {
            SweepMode::FrequencySweep { frequencies } => {
                self.frequency_sweep(config, frequencies, false, &mut table)
            }
            SweepMode::FrequencySweepWithTemperature { frequencies } => {
                self.frequency_sweep(config, frequencies, true, &mut table)
            }
            SweepMode::Timed {
                frequency_hz,
                duration,
            } => self.timed_sweep(config, *frequency_hz, *duration, &mut table),
            SweepMode::TemperatureBounded {
                frequency_hz,
                target_c,
            } => self.bounded_sweep(config, *frequency_hz, *target_c, &mut table),
        };

        self.transition(SweepState::Finalizing);
        let stopped = if config.mode.uses_controller() {
            self.stop_controller()
        } else {
            Ok(())
        };

        match outcome.and(stopped) {
            Ok(()) => {
                info!(rows = table.len(), "Sweep finished\n{}", table);
                info!("Test completed");
                self.transition(SweepState::Done);
                Ok(table)
            }
            Err(cause) => Err(self.abort(table, cause)),
        }
    }

    fn abort(&mut self, partial: ResultTable, cause: DaqError) -> SweepAborted {
        error!(rows = partial.len(), error = %cause, "Sweep aborted");
        if self.state != SweepState::Finalizing {
            self.transition(SweepState::Finalizing);
        }
        self.transition(SweepState::Aborted);
        SweepAborted { partial, cause }
    }

    fn transition(&mut self, next: SweepState) {
        debug!(from = %self.state, to = %next, "Sweep state");
        self.state = next;
    }

    /// Validate the config and check the required devices are present.
    fn preflight(&self, config: &SweepConfig) -> AppResult<()> {
        config.validate()?;
        if config.mode.uses_controller() && self.controller.is_none() {
            return Err(DaqError::Configuration(format!(
                "{} requires a temperature controller",
                config.mode
            )));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Device helpers
    // -------------------------------------------------------------------------

    fn controller(&mut self) -> AppResult<&mut (dyn TemperatureController + 'a)> {
        self.controller
            .as_deref_mut()
            .ok_or_else(|| DaqError::Configuration("no temperature controller attached".into()))
    }

    fn read_temperature(&mut self) -> AppResult<Option<TemperatureReading>> {
        let reading = self.controller()?.read_temperature()?;
        if reading.is_none() {
            warn!("Temperature reading unavailable");
        }
        Ok(reading)
    }

    fn start_controller(&mut self, config: &SweepConfig) -> AppResult<()> {
        let Some(setpoint) = config.setpoint_c else {
            return Ok(());
        };
        let tenths = celsius_to_tenths(setpoint)?;
        info!(setpoint, "Running controller to setpoint");
        let status = self.controller()?.set_setpoint_and_run(tenths)?;
        if !status.is_confirmed() {
            warn!(?status, "Controller did not confirm setpoint, continuing");
        }
        Ok(())
    }

    fn stop_controller(&mut self) -> AppResult<()> {
        let status = self.controller()?.stop()?;
        if !status.is_confirmed() {
            warn!(?status, "Controller did not confirm stop");
        }
        Ok(())
    }

    /// Apply test level and bias, once per run.
    fn prepare_meter(&mut self, config: &SweepConfig) -> AppResult<()> {
        self.meter.set_voltage(config.voltage_mv)?;
        if let Some(bias) = config.bias_mv {
            self.meter.set_bias(bias)?;
        }
        Ok(())
    }

    /// Select a parameter pair, only re-sending the kinds that changed.
    fn select(&mut self, pair: ParameterPair) -> AppResult<()> {
        if self.selected_major != Some(pair.major) {
            self.meter.set_major(pair.major)?;
            self.selected_major = Some(pair.major);
            self.selected_minor = None;
        }
        if self.selected_minor != Some(pair.minor) {
            self.meter.set_minor(pair.minor)?;
            self.selected_minor = Some(pair.minor);
        }
        Ok(())
    }

    fn tune(&mut self, frequency_hz: u32) -> AppResult<()> {
        self.meter.set_frequency(frequency_hz)?;
        self.transition(SweepState::Settling);
        let dwell = self.settling.delay(frequency_hz);
        if !dwell.is_zero() {
            debug!(frequency_hz, ?dwell, "Settling");
        }
        self.clock.sleep(dwell);
        Ok(())
    }

    /// Measure every combination at the current frequency into `row`.
    fn sample_combinations(
        &mut self,
        config: &SweepConfig,
        averager: &SampleAverager,
        row: &mut ResultRow,
    ) -> AppResult<()> {
        for pair in config.combinations() {
            self.select(pair)?;
            self.transition(SweepState::Sampling);
            let averaged = averager.average(&mut *self.meter)?;
            row.set_measurement(pair, &averaged);
        }
        Ok(())
    }

    fn append(&mut self, table: &mut ResultTable, row: ResultRow) -> AppResult<()> {
        table.push_row(row)?;
        info!(row = table.len(), "Row recorded");
        if let Some(sink) = self.checkpoint.as_deref_mut() {
            if let Err(err) = sink.row_appended(table) {
                error!(error = %err, "Checkpoint failed, continuing sweep");
            }
        }
        Ok(())
    }

    fn elapsed_since(&self, start: Duration) -> Duration {
        self.clock.now().saturating_sub(start)
    }

    // -------------------------------------------------------------------------
    // Traversal policies
    // -------------------------------------------------------------------------

    fn frequency_sweep(
        &mut self,
        config: &SweepConfig,
        frequencies: &[u32],
        with_temperature: bool,
        table: &mut ResultTable,
    ) -> AppResult<()> {
        let mut rows: Vec<ResultRow> = frequencies
            .iter()
            .map(|&hz| {
                let mut row = table.blank_row();
                row.set(Column::Frequency, Some(f64::from(hz)));
                row
            })
            .collect();

        let mut folded = vec![0usize; rows.len()];
        let outcome =
            self.fill_frequency_rows(config, frequencies, with_temperature, &mut rows, &mut folded);

        // On abort only rows with every combination folded in are kept.
        let combinations = config.combinations().len();
        for (row, done) in rows.into_iter().zip(folded) {
            if outcome.is_ok() || done == combinations {
                self.append(table, row)?;
            }
        }
        outcome
    }

    fn fill_frequency_rows(
        &mut self,
        config: &SweepConfig,
        frequencies: &[u32],
        with_temperature: bool,
        rows: &mut [ResultRow],
        folded: &mut [usize],
    ) -> AppResult<()> {
        if with_temperature {
            self.start_controller(config)?;
        }
        let averager = SampleAverager::new(config.averaging)?;
        self.prepare_meter(config)?;

        for (index, pair) in config.combinations().into_iter().enumerate() {
            self.select(pair)?;
            let points = frequencies.iter().zip(rows.iter_mut()).zip(folded.iter_mut());
            for ((&hz, row), done) in points {
                self.transition(SweepState::Sweeping);
                self.tune(hz)?;

                if with_temperature && index == 0 {
                    let reading = self.read_temperature()?;
                    row.set_temperature(reading);
                }

                self.transition(SweepState::Sampling);
                let averaged = averager.average(&mut *self.meter)?;
                row.set_measurement(pair, &averaged);
                *done += 1;
                info!(
                    frequency_hz = hz,
                    combination = %pair,
                    major = averaged.major_mean,
                    minor = averaged.minor_mean,
                    "Point measured"
                );
            }
        }
        Ok(())
    }

    /// Shared set-up of the fixed-frequency modes.
    fn prepare_fixed_frequency(
        &mut self,
        config: &SweepConfig,
        frequency_hz: u32,
    ) -> AppResult<SampleAverager> {
        self.start_controller(config)?;
        let averager = SampleAverager::new(config.averaging)?;
        self.prepare_meter(config)?;
        self.tune(frequency_hz)?;
        Ok(averager)
    }

    fn fixed_frequency_row(
        &mut self,
        config: &SweepConfig,
        averager: &SampleAverager,
        table: &ResultTable,
        elapsed: Duration,
        reading: Option<TemperatureReading>,
    ) -> AppResult<ResultRow> {
        let mut row = table.blank_row();
        row.set(Column::ElapsedTime, Some(round_tenths(elapsed)));
        row.set_temperature(reading);
        self.sample_combinations(config, averager, &mut row)?;
        Ok(row)
    }

    fn timed_sweep(
        &mut self,
        config: &SweepConfig,
        frequency_hz: u32,
        duration: Duration,
        table: &mut ResultTable,
    ) -> AppResult<()> {
        let averager = self.prepare_fixed_frequency(config, frequency_hz)?;
        let start = self.clock.now();

        loop {
            self.transition(SweepState::Sweeping);
            let elapsed = self.elapsed_since(start);
            if elapsed > duration {
                info!(?elapsed, "Duration reached");
                break;
            }

            let reading = self.read_temperature()?;
            let row = self.fixed_frequency_row(config, &averager, table, elapsed, reading)?;
            self.append(table, row)?;
        }
        Ok(())
    }

    fn bounded_sweep(
        &mut self,
        config: &SweepConfig,
        frequency_hz: u32,
        target_c: f64,
        table: &mut ResultTable,
    ) -> AppResult<()> {
        let averager = self.prepare_fixed_frequency(config, frequency_hz)?;
        let start = self.clock.now();

        let initial = self.initial_temperature()?;
        let heating = target_c > initial.process_value;
        info!(
            initial = initial.process_value,
            target = target_c,
            direction = if heating { "heating" } else { "cooling" },
            "Waiting for target temperature"
        );

        let mut missed = 0u32;
        loop {
            self.transition(SweepState::Sweeping);
            let reading = self.read_temperature()?;
            let elapsed = self.elapsed_since(start);

            match reading {
                Some(r) if target_reached(heating, r.process_value, target_c) => {
                    info!(pv = r.process_value, "Target temperature reached");
                    break;
                }
                Some(_) => missed = 0,
                None => {
                    missed += 1;
                    if missed > self.read_attempts {
                        return Err(DaqError::Instrument(format!(
                            "no temperature reading for {missed} consecutive polls"
                        )));
                    }
                    debug!(missed, "Stop condition not evaluated this iteration");
                }
            }

            let row = self.fixed_frequency_row(config, &averager, table, elapsed, reading)?;
            self.append(table, row)?;
        }
        Ok(())
    }

    fn initial_temperature(&mut self) -> AppResult<TemperatureReading> {
        for attempt in 1..=self.read_attempts {
            if let Some(reading) = self.read_temperature()? {
                return Ok(reading);
            }
            debug!(attempt, "Initial temperature unavailable, retrying");
        }
        Err(DaqError::Instrument(format!(
            "no valid temperature reading after {} attempts",
            self.read_attempts
        )))
    }
}

/// Whether `pv` has reached or passed `target` in the sweep direction.
pub fn target_reached(heating: bool, pv: f64, target: f64) -> bool {
    if heating {
        pv >= target
    } else {
        pv <= target
    }
}

fn round_tenths(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::controller::WriteStatus;
    use crate::measurement::MeasurementSample;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeMeter {
        commands: Vec<String>,
        fail_after: Option<usize>,
        fetches: usize,
    }

    impl ImpedanceMeter for FakeMeter {
        fn set_voltage(&mut self, millivolts: u32) -> AppResult<()> {
            self.commands.push(format!("VOLT {millivolts}"));
            Ok(())
        }
        fn set_bias(&mut self, millivolts: i32) -> AppResult<()> {
            self.commands.push(format!("BIAS:VOLT {millivolts}"));
            Ok(())
        }
        fn set_major(&mut self, kind: ParameterKind) -> AppResult<()> {
            self.commands.push(format!("FUNC:IMP:A {kind}"));
            Ok(())
        }
        fn set_minor(&mut self, kind: ParameterKind) -> AppResult<()> {
            self.commands.push(format!("FUNC:IMP:B {kind}"));
            Ok(())
        }
        fn set_frequency(&mut self, hz: u32) -> AppResult<()> {
            self.commands.push(format!("FREQ {hz}"));
            Ok(())
        }
        fn fetch_raw(&mut self) -> AppResult<MeasurementSample> {
            if self.fail_after == Some(self.fetches) {
                return Err(DaqError::Parse {
                    reply: "garbage".into(),
                    reason: "not a pair".into(),
                });
            }
            self.fetches += 1;
            Ok(MeasurementSample::new(self.fetches as f64, 0.5))
        }
    }

    #[derive(Default)]
    struct FakeController {
        readings: VecDeque<Option<f64>>,
        writes: Vec<(u16, i16)>,
    }

    impl TemperatureController for FakeController {
        fn read_temperature(&mut self) -> AppResult<Option<TemperatureReading>> {
            Ok(self.readings.pop_front().flatten().map(|pv| TemperatureReading {
                process_value: pv,
                set_value: 40.0,
            }))
        }
        fn write_register(&mut self, register: u16, value: i16) -> AppResult<WriteStatus> {
            self.writes.push((register, value));
            Ok(WriteStatus::Confirmed)
        }
        fn stop(&mut self) -> AppResult<WriteStatus> {
            self.write_register(0x4701, 180)?;
            self.write_register(0x4719, 0)
        }
    }

    #[test]
    fn test_frequency_sweep_row_per_frequency() {
        let mut meter = FakeMeter::default();
        let clock = ManualClock::new();
        let config = SweepConfig::new(SweepMode::FrequencySweep {
            frequencies: vec![50, 5000],
        })
        .with_averaging(2);

        let mut sequencer = SweepSequencer::new(&mut meter, &clock);
        let table = sequencer.run(&config).unwrap();
        assert_eq!(sequencer.state(), SweepState::Done);
        drop(sequencer);

        assert_eq!(table.len(), 2);
        assert_eq!(table.column(Column::Frequency), vec![Some(50.0), Some(5000.0)]);
        // fetches 1,2 then 3,4
        assert_eq!(table.column(Column::MajorMean(ParameterKind::Z)), vec![Some(1.5), Some(3.5)]);
        assert_eq!(clock.total_slept(), Duration::from_secs(10));
        assert_eq!(
            meter.commands,
            vec!["VOLT 1000", "FUNC:IMP:A Z", "FUNC:IMP:B THR", "FREQ 50", "FREQ 5000"]
        );
    }

    #[test]
    fn test_kind_commands_only_resent_on_change() {
        let mut meter = FakeMeter::default();
        let clock = ManualClock::new();
        let config = SweepConfig::new(SweepMode::FrequencySweep {
            frequencies: vec![2000],
        })
        .with_kinds(
            vec![ParameterKind::Z, ParameterKind::C],
            vec![ParameterKind::D, ParameterKind::Q],
        )
        .with_averaging(1)
        .with_bias_mv(Some(200));

        SweepSequencer::new(&mut meter, &clock).run(&config).unwrap();
        let kinds: Vec<&str> = meter
            .commands
            .iter()
            .map(String::as_str)
            .filter(|c| c.starts_with("FUNC") || c.starts_with("BIAS"))
            .collect();
        assert_eq!(
            kinds,
            vec![
                "BIAS:VOLT 200",
                "FUNC:IMP:A Z",
                "FUNC:IMP:B D",
                "FUNC:IMP:B Q",
                "FUNC:IMP:A C",
                "FUNC:IMP:B D",
                "FUNC:IMP:B Q",
            ]
        );
    }

    #[test]
    fn test_last_minor_overwrites_major_columns() {
        let mut meter = FakeMeter::default();
        let clock = ManualClock::new();
        let config = SweepConfig::new(SweepMode::FrequencySweep {
            frequencies: vec![2000],
        })
        .with_kinds(vec![ParameterKind::Z], vec![ParameterKind::D, ParameterKind::Q])
        .with_averaging(1);

        let table = SweepSequencer::new(&mut meter, &clock).run(&config).unwrap();
        let row = &table.rows()[0];
        assert_eq!(row.get(Column::MajorMean(ParameterKind::Z)), Some(2.0));
        let zd = ParameterPair::new(ParameterKind::Z, ParameterKind::D);
        assert_eq!(row.get(Column::PairMean(zd)), Some(0.5));
    }

    #[test]
    fn test_abort_keeps_completed_rows_only() {
        let mut meter = FakeMeter {
            fail_after: Some(2),
            ..FakeMeter::default()
        };
        let clock = ManualClock::new();
        let config = SweepConfig::new(SweepMode::FrequencySweep {
            frequencies: vec![2000, 3000, 4000],
        })
        .with_averaging(1);

        let mut sequencer = SweepSequencer::new(&mut meter, &clock);
        let aborted = sequencer.run(&config).unwrap_err();
        assert_eq!(sequencer.state(), SweepState::Aborted);
        assert!(matches!(aborted.cause, DaqError::Parse { .. }));
        assert_eq!(aborted.partial.len(), 2);
        assert_eq!(
            aborted.partial.column(Column::Frequency),
            vec![Some(2000.0), Some(3000.0)]
        );
    }

    #[test]
    fn test_abort_drops_rows_missing_a_combination() {
        let config = SweepConfig::new(SweepMode::FrequencySweep {
            frequencies: vec![2000, 3000],
        })
        .with_kinds(
            vec![ParameterKind::Z],
            vec![ParameterKind::ThetaRad, ParameterKind::D],
        )
        .with_averaging(1);
        let zd = ParameterPair::new(ParameterKind::Z, ParameterKind::D);
        let clock = ManualClock::new();

        // Z-THR at both frequencies, then Z-D at 2000 Hz, then fail
        let mut meter = FakeMeter {
            fail_after: Some(3),
            ..FakeMeter::default()
        };
        let aborted = SweepSequencer::new(&mut meter, &clock).run(&config).unwrap_err();
        assert_eq!(aborted.partial.column(Column::Frequency), vec![Some(2000.0)]);
        assert_eq!(aborted.partial.column(Column::PairMean(zd)), vec![Some(0.5)]);

        // failing on the first Z-D point leaves no row complete
        let mut meter = FakeMeter {
            fail_after: Some(2),
            ..FakeMeter::default()
        };
        let aborted = SweepSequencer::new(&mut meter, &clock).run(&config).unwrap_err();
        assert!(aborted.partial.is_empty());
    }

    #[test]
    fn test_controller_mode_requires_controller() {
        let mut meter = FakeMeter::default();
        let clock = ManualClock::new();
        let config = SweepConfig::new(SweepMode::FrequencySweepWithTemperature {
            frequencies: vec![1000],
        });
        let aborted = SweepSequencer::new(&mut meter, &clock).run(&config).unwrap_err();
        assert!(matches!(aborted.cause, DaqError::Configuration(_)));
        assert!(aborted.partial.is_empty());
        assert!(meter.commands.is_empty());
    }

    #[test]
    fn test_timed_zero_duration_records_nothing_but_stops_controller() {
        let mut meter = FakeMeter::default();
        let mut controller = FakeController::default();
        let clock = ManualClock::with_tick(Duration::from_millis(1));
        let config = SweepConfig::new(SweepMode::Timed {
            frequency_hz: 1000,
            duration: Duration::ZERO,
        })
        .with_setpoint(Some(40.0));

        let table = SweepSequencer::new(&mut meter, &clock)
            .with_controller(&mut controller)
            .run(&config)
            .unwrap();
        assert!(table.is_empty());
        assert_eq!(
            controller.writes,
            vec![(0x4701, 400), (0x4719, 1), (0x4701, 180), (0x4719, 0)]
        );
    }

    #[test]
    fn test_timed_sweep_runs_until_duration_exceeded() {
        let mut meter = FakeMeter::default();
        let mut controller = FakeController {
            readings: VecDeque::from([Some(21.0), None, Some(21.4)]),
            ..FakeController::default()
        };
        let clock = ManualClock::with_tick(Duration::from_secs(1));
        let config = SweepConfig::new(SweepMode::Timed {
            frequency_hz: 5000,
            duration: Duration::from_secs(5),
        })
        .with_averaging(1);

        let table = SweepSequencer::new(&mut meter, &clock)
            .with_controller(&mut controller)
            .run(&config)
            .unwrap();
        // start at t=0; checks at t=1..=5 record rows, t=6 stops
        assert_eq!(table.len(), 5);
        assert_eq!(
            table.column(Column::ElapsedTime),
            vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)]
        );
        assert_eq!(
            table.column(Column::ProcessValue),
            vec![Some(21.0), None, Some(21.4), None, None]
        );
    }

    #[test]
    fn test_target_reached_both_directions() {
        assert!(target_reached(true, 25.0, 25.0));
        assert!(!target_reached(true, 24.9, 25.0));
        assert!(target_reached(false, 4.9, 5.0));
        assert!(!target_reached(false, 5.1, 5.0));
    }

    #[test]
    fn test_bounded_cooling_stops_at_target() {
        let mut meter = FakeMeter::default();
        let mut controller = FakeController {
            readings: VecDeque::from([Some(30.0), Some(28.0), None, Some(26.0), Some(24.9)]),
            ..FakeController::default()
        };
        let clock = ManualClock::new();
        let config = SweepConfig::new(SweepMode::TemperatureBounded {
            frequency_hz: 1000,
            target_c: 25.0,
        })
        .with_averaging(1);

        let table = SweepSequencer::new(&mut meter, &clock)
            .with_controller(&mut controller)
            .run(&config)
            .unwrap();
        assert_eq!(
            table.column(Column::ProcessValue),
            vec![Some(28.0), None, Some(26.0)]
        );
        assert_eq!(controller.writes, vec![(0x4701, 180), (0x4719, 0)]);
    }

    #[test]
    fn test_bounded_without_initial_reading_fails_and_stops() {
        let mut meter = FakeMeter::default();
        let mut controller = FakeController::default();
        let clock = ManualClock::new();
        let config = SweepConfig::new(SweepMode::TemperatureBounded {
            frequency_hz: 1000,
            target_c: 25.0,
        });

        let aborted = SweepSequencer::new(&mut meter, &clock)
            .with_controller(&mut controller)
            .with_read_attempts(3)
            .run(&config)
            .unwrap_err();
        assert!(matches!(aborted.cause, DaqError::Instrument(_)));
        assert_eq!(controller.writes, vec![(0x4701, 180), (0x4719, 0)]);
    }

    #[test]
    fn test_bounded_aborts_when_controller_goes_silent() {
        let mut meter = FakeMeter::default();
        let mut controller = FakeController {
            readings: VecDeque::from([Some(20.0), Some(21.0)]),
            ..FakeController::default()
        };
        let clock = ManualClock::new();
        let config = SweepConfig::new(SweepMode::TemperatureBounded {
            frequency_hz: 1000,
            target_c: 25.0,
        })
        .with_averaging(1);

        let aborted = SweepSequencer::new(&mut meter, &clock)
            .with_controller(&mut controller)
            .with_read_attempts(2)
            .run(&config)
            .unwrap_err();
        assert!(matches!(aborted.cause, DaqError::Instrument(_)));
        // 21.0, then two tolerated misses, the third aborts
        assert_eq!(
            aborted.partial.column(Column::ProcessValue),
            vec![Some(21.0), None, None]
        );
        assert_eq!(controller.writes, vec![(0x4701, 180), (0x4719, 0)]);
    }

    #[test]
    fn test_round_tenths() {
        assert_eq!(round_tenths(Duration::from_millis(12_345)), 12.3);
        assert_eq!(round_tenths(Duration::from_millis(12_351)), 12.4);
        assert_eq!(round_tenths(Duration::ZERO), 0.0);
    }
}
