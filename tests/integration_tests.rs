//! Integration tests for step-planner.
//!
//! These tests drive the planner the way firmware does: moves go in through
//! `append` or a `MoveSource`, the background loop calls `spin` and the step timer
//! calls `interrupt`, against a simulated platform.

mod unit;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use proptest::prelude::*;
use step_planner::config::{MAX_DRIVES, MAX_LOOK_AHEAD_DEPTH};
use step_planner::error::{Error, MoveError};
use step_planner::{
    parse_config, Dda, Direction, EndStopHit, MotionRequest, MovePlanner, MoveSource,
    MovementProfile, Platform, Result,
};

// =============================================================================
// Test configuration data
// =============================================================================

const XY_CONFIG: &str = r#"
[[drives]]
name = "x"
kind = "x"
steps_per_mm = 80.0
max_feedrate_mm_per_sec = 100.0
max_acceleration_mm_per_sec2 = 2000.0
axis_length_mm = 200.0

[[drives]]
name = "y"
kind = "y"
steps_per_mm = 80.0
max_feedrate_mm_per_sec = 100.0
max_acceleration_mm_per_sec2 = 2000.0
axis_length_mm = 200.0
"#;

const XYE_CONFIG: &str = r#"
[[drives]]
name = "x"
kind = "x"
steps_per_mm = 80.0
max_feedrate_mm_per_sec = 100.0
max_acceleration_mm_per_sec2 = 2000.0
axis_length_mm = 200.0

[[drives]]
name = "y"
kind = "y"
steps_per_mm = 80.0
max_feedrate_mm_per_sec = 100.0
max_acceleration_mm_per_sec2 = 2000.0
axis_length_mm = 200.0

[[drives]]
name = "e0"
kind = "extruder"
steps_per_mm = 280.0
max_feedrate_mm_per_sec = 120.0
max_acceleration_mm_per_sec2 = 5000.0
"#;

// =============================================================================
// Simulated hardware
// =============================================================================

/// Platform that tracks signed positions and trips a low stop at a set position.
#[derive(Debug, Default)]
struct SimPlatform {
    position: [i64; MAX_DRIVES],
    direction: [Direction; MAX_DRIVES],
    pulses: [u32; MAX_DRIVES],
    low_stop_at: [Option<i64>; MAX_DRIVES],
    last_interval: Option<u32>,
}

impl Platform for SimPlatform {
    fn axis_length(&self, _drive: usize) -> f32 {
        200.0
    }

    fn set_direction(&mut self, drive: usize, direction: Direction) -> Result<()> {
        self.direction[drive] = direction;
        Ok(())
    }

    fn step(&mut self, drive: usize) -> Result<()> {
        self.position[drive] += self.direction[drive].sign();
        self.pulses[drive] += 1;
        Ok(())
    }

    fn end_stop(&mut self, drive: usize) -> Result<EndStopHit> {
        Ok(match self.low_stop_at[drive] {
            Some(at) if self.position[drive] <= at => EndStopHit::Low,
            _ => EndStopHit::None,
        })
    }

    fn set_interrupt(&mut self, interval_ns: u32) {
        self.last_interval = Some(interval_ns);
    }
}

/// Move source replaying a fixed script.
struct ScriptedSource {
    moves: VecDeque<MotionRequest>,
    streaming: bool,
}

impl MoveSource for ScriptedSource {
    fn read_move(&mut self) -> Option<MotionRequest> {
        self.moves.pop_front()
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }
}

/// A record as seen when it started executing.
#[derive(Debug, Clone, Copy)]
struct Observed {
    slot: usize,
    entry: f32,
    exit: f32,
    cruise: f32,
    total: u32,
    stop_a: u32,
    start_d: u32,
}

fn planner_with(config: &str, platform: SimPlatform, start: Option<&[f32]>) -> MovePlanner<SimPlatform> {
    let config = parse_config(config).expect("config should parse");
    let mut builder = MovePlanner::builder()
        .from_config(&config)
        .expect("config should validate")
        .platform(platform);
    if let Some(start) = start {
        builder = builder.start_position(start);
    }
    builder.build().expect("planner should build")
}

fn xy_planner() -> MovePlanner<SimPlatform> {
    planner_with(XY_CONFIG, SimPlatform::default(), None)
}

fn with_depth(depth: usize) -> String {
    format!("{XY_CONFIG}\n[planner]\nlook_ahead_depth = {depth}\n")
}

fn is_idle(planner: &MovePlanner<SimPlatform>) -> bool {
    let diagnostics = planner.diagnostics();
    diagnostics.look_ahead_pending == 0 && diagnostics.dda_queued == 0 && !diagnostics.executing
}

/// Spin and tick until everything queued has executed, returning each record once.
fn run_to_completion(planner: &mut MovePlanner<SimPlatform>) -> Vec<Observed> {
    let mut observed: Vec<Observed> = Vec::new();

    for _ in 0..2_000_000 {
        match planner.spin() {
            Ok(_) | Err(Error::Move(MoveError::RingFull)) => {}
            Err(e) => panic!("spin failed: {}", e),
        }
        planner.interrupt().expect("interrupt failed");

        if let Some(record) = planner.current_segment() {
            if observed.last().map(|o| o.slot) != Some(record.source_slot()) {
                observed.push(observe(record));
            }
        }

        if is_idle(planner) {
            // Apply anything the last ticks reported
            planner.spin().expect("final spin failed");
            return observed;
        }
    }
    panic!("planner never went idle");
}

fn observe(record: &Dda) -> Observed {
    Observed {
        slot: record.source_slot(),
        entry: record.entry_velocity(),
        exit: record.exit_velocity(),
        cruise: record.cruise_velocity(),
        total: record.total_steps(),
        stop_a: record.stop_a_step(),
        start_d: record.start_d_step(),
    }
}

fn profile_of(planner: &MovePlanner<SimPlatform>, slot: usize) -> MovementProfile {
    let look_ahead = planner.look_ahead();
    let entry = look_ahead.entry(slot).expect("slot in range");
    let mut u = look_ahead.entry_velocity(slot);
    let mut v = entry.v();
    Dda::default().init(look_ahead.start_of(slot), entry, planner.kinematics(), &mut u, &mut v)
}

// =============================================================================
// Look-ahead smoothing
// =============================================================================

#[test]
fn collinear_moves_keep_their_speed_through_the_joins() {
    let mut planner = xy_planner();
    planner.append(&[50.0, 0.0], 20.0, false).unwrap();
    planner.append(&[51.0, 0.0], 100.0, false).unwrap();
    planner.append(&[100.0, 0.0], 20.0, false).unwrap();

    assert_eq!(planner.spin(), Ok(true));

    // A fresh planner fills from slot 0
    let look_ahead = planner.look_ahead();
    assert!((look_ahead.entry(1).unwrap().cosine() - 1.0).abs() < 1e-6);
    assert!((look_ahead.entry(2).unwrap().cosine() - 1.0).abs() < 1e-6);
    assert!((look_ahead.entry(0).unwrap().v() - 20.0).abs() < 1e-3);
    assert!((look_ahead.entry(1).unwrap().v() - 20.0).abs() < 1e-3);
    assert_eq!(look_ahead.entry(2).unwrap().v(), 0.0);

    assert_eq!(profile_of(&planner, 0), MovementProfile::Moving);
    // Short and fast: accelerates past 20 mm/s and comes straight back down
    assert_eq!(profile_of(&planner, 1), MovementProfile::NoFlat);
    assert_eq!(profile_of(&planner, 2), MovementProfile::Moving);

    let observed = run_to_completion(&mut planner);
    assert_eq!(observed.len(), 3);
    assert_eq!(observed[0].entry, 0.0);
    assert!((observed[1].entry - 20.0).abs() < 1e-3);
    assert!((observed[1].cruise - 2400.0_f32.sqrt()).abs() < 0.05);
    assert_eq!(observed[1].stop_a, observed[1].start_d);
    assert_eq!(observed[2].exit, 0.0);

    assert_eq!(planner.platform().pulses[0], 8000);
    assert_eq!(planner.platform().position[0], 8000);
    assert!((planner.current_state().positions[0] - 100.0).abs() < 1e-4);
}

#[test]
fn right_angle_corner_is_taken_below_the_feedrate() {
    let mut planner = xy_planner();
    planner.append(&[50.0, 0.0], 50.0, false).unwrap();
    planner.append(&[50.0, 50.0], 50.0, false).unwrap();

    assert_eq!(planner.spin(), Ok(true));

    let k = 0.5_f32.sqrt();
    let corner = (2000.0 * 0.05 * k / (1.0 - k)).sqrt();
    let look_ahead = planner.look_ahead();
    assert!(look_ahead.entry(1).unwrap().cosine().abs() < 1e-6);
    assert!((look_ahead.entry(0).unwrap().v() - corner).abs() < 1e-2);
    assert!(look_ahead.entry(0).unwrap().v() < 50.0);

    let observed = run_to_completion(&mut planner);
    assert_eq!(observed.len(), 2);
    assert!((observed[0].cruise - 50.0).abs() < 1e-3);
    assert!((observed[0].exit - corner).abs() < 1e-2);
    assert_eq!(observed[0].exit, observed[1].entry);

    let state = planner.current_state();
    assert!((state.positions[0] - 50.0).abs() < 1e-4);
    assert!((state.positions[1] - 50.0).abs() < 1e-4);
}

#[test]
fn every_drive_takes_exactly_its_steps() {
    let mut planner = planner_with(XYE_CONFIG, SimPlatform::default(), None);
    planner.append(&[10.0, 3.3, 1.7], 30.0, false).unwrap();
    planner.append(&[4.0, 3.3, 2.0], 30.0, false).unwrap();

    run_to_completion(&mut planner);

    let platform = planner.platform();
    assert_eq!(platform.pulses[0], 800 + 480);
    assert_eq!(platform.pulses[1], 264);
    assert_eq!(platform.pulses[2], 476 + 84);
    assert_eq!(&platform.position[..3], &[320, 264, 560]);
}

#[test]
fn zero_length_moves_are_dropped() {
    let mut planner = xy_planner();
    planner.append(&[0.0, 0.0], 30.0, false).unwrap();
    planner.append(&[0.001, 0.0], 30.0, false).unwrap();

    assert_eq!(planner.diagnostics().look_ahead_pending, 0);
    assert_eq!(planner.spin(), Ok(false));
}

// =============================================================================
// Execution ring hand-off
// =============================================================================

#[test]
fn execution_ring_fills_then_defers() {
    let mut planner = xy_planner();
    for i in 1..=5 {
        planner.append(&[2.0 * i as f32, 0.0], 50.0, false).unwrap();
    }

    for _ in 0..3 {
        assert_eq!(planner.spin(), Ok(true));
    }
    assert_eq!(planner.diagnostics().dda_queued, 3);
    assert_eq!(planner.spin(), Err(Error::Move(MoveError::RingFull)));
    assert_eq!(planner.diagnostics().ring_full_deferrals, 1);

    // The first tick promotes a record and frees its slot
    let interval = planner.interrupt().unwrap();
    assert_eq!(planner.platform().last_interval, Some(interval));
    assert_eq!(planner.current_segment().map(|r| r.interval_ns()), Some(interval));
    assert!(planner.diagnostics().executing);
    assert_eq!(planner.diagnostics().dda_queued, 2);
    assert_eq!(planner.spin(), Ok(true));

    let observed = run_to_completion(&mut planner);
    assert_eq!(observed.len(), 5);
    assert_eq!(planner.platform().pulses[0], 800);
    assert_eq!(planner.diagnostics().records_completed, 5);
}

#[test]
fn interrupt_time_is_the_sum_of_intervals() {
    let mut planner = xy_planner();
    planner.append(&[3.0, 4.0], 40.0, false).unwrap();
    planner.spin().unwrap();

    let mut total = 0_u64;
    for _ in 0..50 {
        total += u64::from(planner.interrupt().unwrap());
    }
    assert_eq!(planner.interrupt_time(), total);
}

#[test]
fn deepest_look_ahead_keeps_the_execution_ring_fed() {
    let mut planner = planner_with(&with_depth(MAX_LOOK_AHEAD_DEPTH), SimPlatform::default(), None);
    let mut source = ScriptedSource {
        moves: (1..=40)
            .map(|i| MotionRequest::new(&[5.0 * i as f32, 0.0], 50.0, false))
            .collect(),
        streaming: true,
    };

    let mut deepest = 0;
    let mut last_exit = 0.0;
    let mut starved = 0;
    let mut drained = false;
    for _ in 0..200_000 {
        // The file ends with its last move
        source.streaming = !source.moves.is_empty();
        planner.feed(&mut source).expect("feed failed");
        deepest = deepest.max(planner.diagnostics().look_ahead_pending);
        match planner.spin() {
            Ok(_) | Err(Error::Move(MoveError::RingFull)) => {}
            Err(e) => panic!("spin failed: {}", e),
        }
        planner.interrupt().expect("interrupt failed");

        match planner.current_segment() {
            Some(record) => last_exit = record.exit_velocity(),
            None if last_exit > 1.0 => {
                starved += 1;
                last_exit = 0.0;
            }
            None => {}
        }
        if source.moves.is_empty() && is_idle(&planner) {
            drained = true;
            break;
        }
    }

    assert!(drained, "planner never went idle");
    assert!(deepest > MAX_LOOK_AHEAD_DEPTH, "only {} moves ever pending", deepest);
    assert_eq!(starved, 0, "execution ring ran dry behind a record leaving at speed");
    assert_eq!(planner.diagnostics().records_completed, 40);
    assert_eq!(planner.platform().position[0], 16_000);
}

/// Raises the flag when dropped, panics included.
struct RaiseOnDrop<'a>(&'a AtomicBool);

impl Drop for RaiseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

#[test]
fn handles_run_on_separate_threads() {
    let mut planner = xy_planner();
    let mut source = ScriptedSource {
        moves: (1..=8)
            .map(|i| MotionRequest::new(&[2.0 * i as f32, (i % 2) as f32], 40.0, false))
            .collect(),
        streaming: false,
    };
    let done = AtomicBool::new(false);

    {
        let (mut background, mut step_timer) = planner.split();
        thread::scope(|scope| {
            scope.spawn(|| {
                let _done = RaiseOnDrop(&done);
                for _ in 0..50_000_000 {
                    background.feed(&mut source).expect("feed failed");
                    match background.spin() {
                        Ok(_)
                        | Err(Error::Move(MoveError::RingFull))
                        | Err(Error::Move(MoveError::LockUnavailable)) => {}
                        Err(e) => panic!("spin failed: {}", e),
                    }
                    if source.moves.is_empty() && background.all_moves_are_finished() {
                        return;
                    }
                }
                panic!("background never saw the planner idle");
            });
            scope.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    step_timer.interrupt().expect("interrupt failed");
                }
            });
        });
    }

    let diagnostics = planner.diagnostics();
    assert_eq!(diagnostics.records_completed, 8);
    assert!(!diagnostics.executing);
    assert_eq!(planner.platform().pulses[0], 1280);
    assert_eq!(planner.platform().pulses[1], 640);
    assert_eq!(&planner.platform().position[..2], &[1280, 0]);
}

// =============================================================================
// Producer side
// =============================================================================

#[test]
fn streaming_source_holds_back_look_ahead_depth() {
    let mut planner = xy_planner();
    let mut source = ScriptedSource {
        moves: (1..=10)
            .map(|i| MotionRequest::new(&[i as f32, 0.0], 30.0, false))
            .collect(),
        streaming: true,
    };

    for _ in 0..10 {
        assert_eq!(planner.feed(&mut source), Ok(true));
    }
    assert_eq!(planner.feed(&mut source), Ok(false));
    assert!(planner.diagnostics().streaming);

    for _ in 0..3 {
        assert_eq!(planner.spin(), Ok(true));
    }
    planner.interrupt().unwrap();

    // Seven moves stay pending for later ones to shape
    assert_eq!(planner.spin(), Ok(false));
    assert_eq!(planner.diagnostics().look_ahead_pending, 7);

    // End of file: flush
    source.streaming = false;
    assert_eq!(planner.feed(&mut source), Ok(false));
    assert_eq!(planner.spin(), Ok(true));

    run_to_completion(&mut planner);
    assert_eq!(planner.platform().position[0], 800);
}

#[test]
fn drain_protocol_refuses_moves_until_resumed() {
    let mut planner = xy_planner();
    planner.append(&[5.0, 0.0], 40.0, false).unwrap();

    assert!(!planner.all_moves_are_finished());
    assert_eq!(
        planner.append(&[6.0, 0.0], 40.0, false),
        Err(Error::Move(MoveError::Suspended))
    );

    let mut drained = false;
    for _ in 0..100_000 {
        let _ = planner.spin();
        planner.interrupt().unwrap();
        if planner.all_moves_are_finished() {
            drained = true;
            break;
        }
    }
    assert!(drained);
    assert_eq!(planner.platform().position[0], 400);
    assert!(planner.diagnostics().no_more_moves);

    planner.resume_moving();
    assert!(planner.append(&[6.0, 0.0], 40.0, false).is_ok());
}

// =============================================================================
// End stops
// =============================================================================

#[test]
fn low_end_stop_halts_drive_and_corrects_position() {
    let mut platform = SimPlatform::default();
    platform.position[0] = 800;
    platform.low_stop_at[0] = Some(0);
    let mut planner = planner_with(XY_CONFIG, platform, Some(&[10.0, 0.0]));

    planner.append(&[-5.0, 0.0], 20.0, true).unwrap();
    run_to_completion(&mut planner);

    assert_eq!(planner.platform().pulses[0], 800);
    assert_eq!(planner.platform().position[0], 0);
    assert_eq!(planner.current_state().positions[0], 0.0);
    assert_eq!(planner.diagnostics().end_stop_hits, 1);
    assert_eq!(planner.last_queued_position(), &[0.0, 0.0]);

    // The next move starts from the stop, not from where the last one aimed
    planner.append(&[5.0, 0.0], 20.0, false).unwrap();
    run_to_completion(&mut planner);
    assert_eq!(planner.platform().position[0], 400);
    assert!((planner.current_state().positions[0] - 5.0).abs() < 1e-4);
}

#[test]
fn end_stop_on_one_drive_replans_the_pending_move() {
    let mut platform = SimPlatform::default();
    platform.position[0] = 800;
    platform.position[1] = 800;
    platform.low_stop_at[1] = Some(0);
    let mut planner = planner_with(&with_depth(1), platform, Some(&[10.0, 10.0]));
    let mut source = ScriptedSource {
        moves: [
            MotionRequest::new(&[20.0, -5.0], 20.0, true),
            MotionRequest::new(&[30.0, 10.0], 20.0, false),
        ]
        .into_iter()
        .collect(),
        streaming: true,
    };
    assert_eq!(planner.feed(&mut source), Ok(true));
    assert_eq!(planner.feed(&mut source), Ok(true));

    // Run the first move only; the second stays held back for look-ahead
    let mut first_done = false;
    for _ in 0..100_000 {
        planner.spin().expect("spin failed");
        planner.interrupt().expect("interrupt failed");
        let diagnostics = planner.diagnostics();
        if diagnostics.records_completed == 1 && !diagnostics.executing {
            first_done = true;
            break;
        }
    }
    assert!(first_done);
    planner.spin().expect("spin failed");

    // Y stopped at the switch, X ran its full distance
    assert_eq!(planner.platform().pulses[0], 800);
    assert_eq!(planner.platform().pulses[1], 800);
    assert_eq!(&planner.platform().position[..2], &[1600, 0]);

    let diagnostics = planner.diagnostics();
    assert_eq!(diagnostics.end_stop_hits, 1);
    assert_eq!(diagnostics.look_ahead_pending, 1);
    let look_ahead = planner.look_ahead();
    let slot = look_ahead.pending_slots().next().expect("second move pending");
    assert_eq!(look_ahead.entry_velocity(slot), 0.0);
    assert_eq!(&look_ahead.start_of(slot)[..2], &[20.0, 0.0]);

    source.streaming = false;
    assert_eq!(planner.feed(&mut source), Ok(false));
    let observed = run_to_completion(&mut planner);

    assert_eq!(observed.len(), 1);
    assert_eq!(observed[0].entry, 0.0);
    assert_eq!(observed[0].total, 800);
    assert_eq!(planner.platform().pulses[0], 1600);
    assert_eq!(planner.platform().pulses[1], 1600);
    assert_eq!(&planner.platform().position[..2], &[2400, 800]);
    let state = planner.current_state();
    assert!((state.positions[0] - 30.0).abs() < 1e-4);
    assert!((state.positions[1] - 10.0).abs() < 1e-4);
}

#[test]
fn end_stops_are_ignored_when_not_checked() {
    let mut platform = SimPlatform::default();
    platform.position[0] = 800;
    platform.low_stop_at[0] = Some(400);
    let mut planner = planner_with(XY_CONFIG, platform, Some(&[10.0, 0.0]));

    planner.append(&[0.0, 0.0], 20.0, false).unwrap();
    run_to_completion(&mut planner);

    assert_eq!(planner.platform().position[0], 0);
    assert_eq!(planner.diagnostics().end_stop_hits, 0);
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_velocity_is_continuous_across_records(
        moves in prop::collection::vec((-20.0f32..20.0, -20.0f32..20.0, 5.0f32..100.0), 1..8)
    ) {
        let mut planner = xy_planner();
        for (x, y, feedrate) in &moves {
            planner.append(&[*x, *y], *feedrate, false).unwrap();
        }

        let observed = run_to_completion(&mut planner);

        if let (Some(first), Some(last)) = (observed.first(), observed.last()) {
            prop_assert_eq!(first.entry, 0.0);
            prop_assert_eq!(last.exit, 0.0);
        }
        for pair in observed.windows(2) {
            prop_assert!((pair[0].exit - pair[1].entry).abs() < 1e-3);
        }
        for record in &observed {
            prop_assert!(record.stop_a <= record.start_d);
            prop_assert!(record.start_d <= record.total);
            prop_assert!(record.entry <= record.cruise + 1e-3);
            prop_assert!(record.exit <= record.cruise + 1e-3);
        }

        let (x, y, _) = moves[moves.len() - 1];
        let expected = [(x * 80.0).round() as i64, (y * 80.0).round() as i64];
        prop_assert_eq!(&planner.platform().position[..2], &expected[..]);
    }
}
