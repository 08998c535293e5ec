use slider_rs::config::Config;
use slider_rs::hardware::{
    JointSensor, JointTarget, MotionError, MotionExecutor, PoseSource,
};
use slider_rs::motion::compliance::ComplianceMode;
use slider_rs::motion::controller::{ExitReason, TaskError, TaskState};
use slider_rs::motion::pose::{JointVector, Pose};
use slider_rs::motion::{ControlVariant, SliderSettings, SliderTask};
use slider_rs::simulator::{SimClock, SimulatedArm};
use slider_rs::telemetry::{
    CsvTelemetryLogger, TELEMETRY_COLUMNS, TelemetryError, TelemetryRecord, TelemetrySink,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct ArmLog {
    joint_moves: Vec<(JointTarget, ComplianceMode, f64)>,
    linear_moves: Vec<(Pose, ComplianceMode, f64)>,
}

/// Arm double driven by a pose script. Cancels `cancel_after` once the given
/// number of linear moves has been issued.
struct ScriptedArm {
    poses: VecDeque<Pose>,
    current: Pose,
    log: Arc<Mutex<ArmLog>>,
    fail_joint_move: Option<usize>,
    fail_linear_move: Option<usize>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl ScriptedArm {
    fn new(start: Pose, log: Arc<Mutex<ArmLog>>) -> Self {
        Self {
            poses: VecDeque::new(),
            current: start,
            log,
            fail_joint_move: None,
            fail_linear_move: None,
            cancel_after: None,
        }
    }

    fn with_poses(mut self, poses: Vec<Pose>) -> Self {
        self.poses = poses.into();
        self
    }
}

impl PoseSource for ScriptedArm {
    fn current_pose(&mut self) -> Result<Pose, MotionError> {
        if let Some(pose) = self.poses.pop_front() {
            self.current = pose;
        }
        Ok(self.current)
    }
}

impl JointSensor for ScriptedArm {
    fn joint_positions(&mut self) -> Result<JointVector, MotionError> {
        Ok([0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7])
    }

    fn joint_torques(&mut self) -> Result<JointVector, MotionError> {
        Ok([1.0, -1.0, 0.5, 0.0, 0.25, 0.0, 0.0])
    }
}

impl MotionExecutor for ScriptedArm {
    fn move_linear(
        &mut self,
        target: &Pose,
        mode: &ComplianceMode,
        max_cartesian_speed: f64,
    ) -> Result<(), MotionError> {
        let mut log = self.log.lock().unwrap();
        log.linear_moves.push((*target, *mode, max_cartesian_speed));
        let n = log.linear_moves.len();
        if self.fail_linear_move == Some(n) {
            return Err(MotionError::CommandFailed("executor rejected target".into()));
        }
        if let Some((limit, token)) = &self.cancel_after {
            if n >= *limit {
                token.cancel();
            }
        }
        Ok(())
    }

    fn move_joint(
        &mut self,
        target: &JointTarget,
        mode: &ComplianceMode,
        joint_velocity_rel: f64,
    ) -> Result<(), MotionError> {
        let mut log = self.log.lock().unwrap();
        log.joint_moves.push((*target, *mode, joint_velocity_rel));
        if self.fail_joint_move == Some(log.joint_moves.len()) {
            return Err(MotionError::CommandFailed("joint limit".into()));
        }
        if let JointTarget::Pose(pose) = target {
            self.current = *pose;
        }
        Ok(())
    }
}

#[derive(Default)]
struct SinkLog {
    records: Vec<TelemetryRecord>,
    closes: usize,
}

struct RecordingSink(Arc<Mutex<SinkLog>>);

impl TelemetrySink for RecordingSink {
    fn record(&mut self, record: &TelemetryRecord) -> Result<(), TelemetryError> {
        self.0.lock().unwrap().records.push(record.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<(), TelemetryError> {
        self.0.lock().unwrap().closes += 1;
        Ok(())
    }
}

/// Sink whose writes always fail, as on a full disk.
struct FailingSink(Arc<Mutex<SinkLog>>);

impl TelemetrySink for FailingSink {
    fn record(&mut self, record: &TelemetryRecord) -> Result<(), TelemetryError> {
        self.0.lock().unwrap().records.push(record.clone());
        Err(TelemetryError::Io(std::io::Error::other("no space left on device")))
    }

    fn close(&mut self) -> Result<(), TelemetryError> {
        self.0.lock().unwrap().closes += 1;
        Ok(())
    }
}

fn start_pose() -> Pose {
    Config::default().segment.start_pose()
}

fn on_segment(y: f64) -> Pose {
    Pose { y, ..start_pose() }
}

fn run_scripted(
    arm: ScriptedArm,
    settings: SliderSettings,
    cancel: &CancellationToken,
) -> (Result<slider_rs::TaskReport, TaskError>, TaskState, Arc<Mutex<SinkLog>>) {
    let sink_log = Arc::new(Mutex::new(SinkLog::default()));
    let mut task = SliderTask::new(arm, SimClock::new(), settings)
        .with_telemetry(Box::new(RecordingSink(sink_log.clone())));
    let result = task.run(cancel);
    (result, task.state(), sink_log)
}

#[test]
fn test_interrupt_after_n_iterations() {
    let log = Arc::new(Mutex::new(ArmLog::default()));
    let cancel = CancellationToken::new();
    let mut arm = ScriptedArm::new(start_pose(), log.clone());
    arm.cancel_after = Some((5, cancel.clone()));

    let (result, state, sinks) = run_scripted(arm, SliderSettings::default(), &cancel);
    let report = result.unwrap();
    assert_eq!(report.exit, ExitReason::Interrupted);
    assert_eq!(report.iterations, 5);
    assert_eq!(state, TaskState::Terminated);

    let log = log.lock().unwrap();
    assert_eq!(log.joint_moves.len(), 3);
    assert_eq!(log.joint_moves[0].0, JointTarget::Home);
    assert_eq!(log.joint_moves[0].1, ComplianceMode::Position);
    assert_eq!(log.joint_moves[1].2, 0.25);
    assert_eq!(log.joint_moves[2], (JointTarget::Pose(start_pose()), ComplianceMode::Position, 0.5));
    assert_eq!(log.linear_moves.len(), 5);
    for (_, mode, speed) in &log.linear_moves {
        assert!(mode.is_compliant());
        assert_eq!(*speed, 250.0);
    }

    let sinks = sinks.lock().unwrap();
    assert_eq!(sinks.records.len(), 5);
    assert_eq!(sinks.closes, 1);
    assert_eq!(sinks.records[0].joint_positions[6], 0.7);
    assert_eq!(sinks.records[0].joint_torques[0], 1.0);
}

#[test]
fn test_homing_failure_never_enters_loop() {
    let log = Arc::new(Mutex::new(ArmLog::default()));
    let mut arm = ScriptedArm::new(start_pose(), log.clone());
    arm.fail_joint_move = Some(1);

    let (result, state, sinks) =
        run_scripted(arm, SliderSettings::default(), &CancellationToken::new());
    assert!(matches!(
        result,
        Err(TaskError::Setup { state: TaskState::Homing, .. })
    ));
    assert_eq!(state, TaskState::Terminated);
    assert!(log.lock().unwrap().linear_moves.is_empty());
    let sinks = sinks.lock().unwrap();
    assert!(sinks.records.is_empty());
    assert_eq!(sinks.closes, 1);
}

#[test]
fn test_transit_failure_never_enters_loop() {
    for failing in [2, 3] {
        let log = Arc::new(Mutex::new(ArmLog::default()));
        let mut arm = ScriptedArm::new(start_pose(), log.clone());
        arm.fail_joint_move = Some(failing);

        let (result, _, sinks) =
            run_scripted(arm, SliderSettings::default(), &CancellationToken::new());
        assert!(matches!(
            result,
            Err(TaskError::Setup { state: TaskState::Transit, .. })
        ));
        assert_eq!(log.lock().unwrap().joint_moves.len(), failing);
        assert!(log.lock().unwrap().linear_moves.is_empty());
        assert_eq!(sinks.lock().unwrap().closes, 1);
    }
}

#[test]
fn test_runtime_failure_on_kth_move() {
    let log = Arc::new(Mutex::new(ArmLog::default()));
    let mut arm = ScriptedArm::new(start_pose(), log.clone());
    arm.fail_linear_move = Some(4);

    let (result, state, sinks) =
        run_scripted(arm, SliderSettings::default(), &CancellationToken::new());
    match result {
        Err(TaskError::Runtime { iterations, .. }) => assert_eq!(iterations, 3),
        other => panic!("expected runtime failure, got {:?}", other),
    }
    assert_eq!(state, TaskState::Terminated);
    let sinks = sinks.lock().unwrap();
    // the failing iteration records telemetry before commanding the move
    assert_eq!(sinks.records.len(), 4);
    assert_eq!(sinks.closes, 1);
}

#[test]
fn test_telemetry_write_failure_does_not_stop_loop() {
    let log = Arc::new(Mutex::new(ArmLog::default()));
    let arm = ScriptedArm::new(start_pose(), log.clone());
    let sink_log = Arc::new(Mutex::new(SinkLog::default()));
    let settings = SliderSettings::default().with_iteration_limit(Some(6));
    let mut task = SliderTask::new(arm, SimClock::new(), settings)
        .with_telemetry(Box::new(FailingSink(sink_log.clone())));

    let report = task.run(&CancellationToken::new()).unwrap();
    assert_eq!(report.iterations, 6);
    assert_eq!(report.exit, ExitReason::IterationLimit);
    assert!(!task.has_telemetry());
    assert_eq!(log.lock().unwrap().linear_moves.len(), 6);

    // the sink is dropped after the first failed write
    let sinks = sink_log.lock().unwrap();
    assert_eq!(sinks.records.len(), 1);
    assert_eq!(sinks.closes, 1);
}

#[test]
fn test_sensor_failure_ends_run() {
    let config = Config::default();
    let clock = SimClock::new();
    let arm = SimulatedArm::new(&config.simulation, clock.clone()).fail_torque_read_at(3);
    let settings = SliderSettings::from_config(&config);
    let mut task = SliderTask::new(arm, clock, settings);

    match task.run(&CancellationToken::new()) {
        Err(TaskError::Runtime {
            iterations,
            source: MotionError::Sensor(_),
        }) => assert_eq!(iterations, 2),
        other => panic!("expected sensor failure, got {:?}", other),
    }
    assert_eq!(task.state(), TaskState::Terminated);
    assert_eq!(task.arm().linear_moves(), 2);
}

#[test]
fn test_passive_hold_commands_clamped_pose() {
    let log = Arc::new(Mutex::new(ArmLog::default()));
    let script: Vec<Pose> = vec![
        on_segment(-245.0),
        Pose { x: 480.0, y: -300.0, ..start_pose() },
        Pose { x: 470.0, y: 0.0, z: 250.0, ..start_pose() },
        on_segment(500.0),
        on_segment(100.0),
    ];
    let arm = ScriptedArm::new(start_pose(), log.clone()).with_poses(script);
    let settings = SliderSettings::default()
        .with_variant(ControlVariant::PassiveHold)
        .with_iteration_limit(Some(4));

    let (result, _, _) = run_scripted(arm, settings, &CancellationToken::new());
    assert_eq!(result.unwrap().exit, ExitReason::IterationLimit);

    let targets: Vec<Pose> = log
        .lock()
        .unwrap()
        .linear_moves
        .iter()
        .map(|(pose, _, _)| *pose)
        .collect();
    assert_eq!(
        targets,
        vec![on_segment(-245.0), on_segment(0.0), on_segment(230.0), on_segment(100.0)]
    );
}

#[test]
fn test_force_field_offset_through_loop() {
    // primed at x=475; the first iteration samples at the priming instant,
    // then +2 mm along X over one 20 ms period gives vx = 0.1 m/s
    let log = Arc::new(Mutex::new(ArmLog::default()));
    let script = vec![
        start_pose(),
        Pose { x: 477.0, ..start_pose() },
        Pose { x: 479.0, ..start_pose() },
    ];
    let arm = ScriptedArm::new(start_pose(), log.clone()).with_poses(script);
    let settings = SliderSettings::default().with_iteration_limit(Some(2));

    let (result, _, _) = run_scripted(arm, settings, &CancellationToken::new());
    assert_eq!(result.unwrap().iterations, 2);

    let log = log.lock().unwrap();
    let targets: Vec<Pose> = log.linear_moves.iter().map(|(pose, _, _)| *pose).collect();
    assert_eq!(targets[0], start_pose());
    // force_y = K * vx = 5 N over stiffness_y = 300
    let expected_dy = 50.0 * 0.1 / 300.0;
    assert!((targets[1].x - 475.0).abs() < 1e-9);
    assert!((targets[1].y - (-245.0 + expected_dy)).abs() < 1e-9);
    assert_eq!(targets[1].z, 260.0);
}

#[test]
fn test_degenerate_segment_still_runs() {
    let mut config = Config::default();
    config.segment.y_start_mm = 100.0;
    config.segment.y_end_mm = 100.05;
    assert_eq!(config.validate().unwrap().len(), 1);

    let log = Arc::new(Mutex::new(ArmLog::default()));
    let arm = ScriptedArm::new(start_pose(), log.clone())
        .with_poses(vec![on_segment(100.0), on_segment(120.0), on_segment(90.0)]);
    let settings = SliderSettings::from_config(&config)
        .with_variant(ControlVariant::PassiveHold)
        .with_iteration_limit(Some(2));

    let (result, _, _) = run_scripted(arm, settings, &CancellationToken::new());
    assert_eq!(result.unwrap().iterations, 2);
    let log = log.lock().unwrap();
    assert_eq!(log.linear_moves[0].0.y, 100.05);
    assert_eq!(log.linear_moves[1].0.y, 100.0);
}

#[test]
fn test_csv_telemetry_has_one_row_per_iteration() {
    let dir = tempfile::tempdir().unwrap();
    let mut headers = Vec::new();
    for (run, iterations) in [3u64, 7].into_iter().enumerate() {
        let path = dir.path().join(format!("run{}.csv", run));
        let clock = SimClock::new();
        let config = Config::default();
        let arm = SimulatedArm::new(&config.simulation, clock.clone());
        let settings = SliderSettings::from_config(&config).with_iteration_limit(Some(iterations));
        let logger = CsvTelemetryLogger::create(&path).unwrap();
        let mut task = SliderTask::new(arm, clock, settings).with_telemetry(Box::new(logger));
        task.run(&CancellationToken::new()).unwrap();
        assert!(!task.has_telemetry());

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len() as u64, iterations + 1);
        headers.push(lines[0].to_string());
    }
    assert_eq!(headers[0], headers[1]);
    assert_eq!(headers[0], TELEMETRY_COLUMNS.join(","));
}

#[test]
fn test_simulated_run_stays_on_segment() {
    let config = Config::default();
    let clock = SimClock::new();
    let arm = SimulatedArm::new(&config.simulation, clock.clone());
    let settings = SliderSettings::from_config(&config).with_iteration_limit(Some(500));
    let mut task = SliderTask::new(arm, clock.clone(), settings);

    let report = task.run(&CancellationToken::new()).unwrap();
    assert_eq!(report.iterations, 500);
    assert_eq!(clock.elapsed(), Duration::from_millis(500 * 20));
    assert_eq!(task.arm().linear_moves(), 500);
    let target = task.arm().last_target().unwrap();
    let (low, high) = task.settings().segment.bounds();
    assert!(target.y >= low - 1.0 && target.y <= high + 1.0);
    assert_eq!(target.z, 260.0);
    assert!(task.last_outcome().is_some());
}
