use proptest::prelude::*;
use rstest::rstest;
use shade_core::position::position_from_steps;
use shade_core::state::{
    Command, CommandOutcome, Direction, MotionMode, MotorState, SharedState, StepOutcome,
};

#[derive(Debug, Clone)]
enum Op {
    SetTarget(u16),
    Stop,
    Steps(u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u16..=12_000).prop_map(Op::SetTarget),
        Just(Op::Stop),
        any::<u8>().prop_map(Op::Steps),
    ]
}

fn check_invariants(s: &MotorState) -> Result<(), TestCaseError> {
    prop_assert_eq!(s.moving, s.direction != Direction::None);
    prop_assert!(s.current_steps <= s.travel_steps);
    prop_assert_eq!(
        s.current_position,
        position_from_steps(s.current_steps, s.travel_steps)
    );
    Ok(())
}

proptest! {
    #[test]
    fn moving_stops_only_on_target(travel in 100u16..=2_000, ops in prop::collection::vec(op(), 1..40)) {
        let mut s = MotorState::new(travel);
        for op in ops {
            match op {
                Op::SetTarget(p) => s.set_target(p),
                Op::Stop => s.halt(),
                Op::Steps(n) => {
                    for _ in 0..n {
                        let before = s;
                        if !before.moving {
                            break;
                        }
                        let outcome = s.advance(before.direction);
                        if !s.moving {
                            prop_assert_eq!(outcome, StepOutcome::Reached);
                            prop_assert_eq!(s.current_steps, s.target_steps);
                        }
                    }
                }
            }
            check_invariants(&s)?;
        }
    }
}

#[rstest]
#[case(0, 10_000, Direction::Positive)]
#[case(10_000, 0, Direction::Negative)]
#[case(5_000, 5_000, Direction::None)]
fn direction_follows_target(#[case] from: u16, #[case] to: u16, #[case] expected: Direction) {
    let mut s = MotorState::new(1000);
    s.set_target(from);
    while s.moving {
        s.advance(s.direction);
    }
    s.set_target(to);
    assert_eq!(s.direction, expected);
    assert_eq!(s.moving, expected != Direction::None);
}

#[test]
fn target_above_max_is_clamped() {
    let mut s = MotorState::new(400);
    s.set_target(65_000);
    assert_eq!(s.target_position, 10_000);
    assert_eq!(s.target_steps, 400);
}

#[test]
fn walks_to_target_and_stops() {
    let mut s = MotorState::new(200);
    s.set_target(2_500);
    assert_eq!(s.target_steps, 50);
    let mut pulses = 0;
    while s.moving {
        s.advance(s.direction);
        pulses += 1;
    }
    assert_eq!(pulses, 50);
    assert_eq!(s.current_position, 2_500);
    assert_eq!(s.direction, Direction::None);
}

#[test]
fn blocked_commands_leave_state_unchanged() {
    let shared = SharedState::new(MotorState::new(1000));
    shared.update(|s| s.commands_blocked = true);
    let before = shared.snapshot();
    assert_eq!(shared.set_target(7_000), CommandOutcome::Blocked);
    assert_eq!(shared.stop(), CommandOutcome::Blocked);
    assert_eq!(shared.snapshot(), before);
}

#[test]
fn stop_command_collapses_target() {
    let shared = SharedState::new(MotorState::new(1000));
    assert_eq!(shared.apply(Command::SetTarget(10_000)), CommandOutcome::Accepted);
    shared.update(|s| {
        for _ in 0..10 {
            s.advance(Direction::Positive);
        }
    });
    assert_eq!(shared.apply(Command::Stop), CommandOutcome::Accepted);
    let s = shared.snapshot();
    assert!(!s.moving);
    assert_eq!(s.target_steps, 10);
    assert_eq!(s.target_position, s.current_position);
}

#[test]
fn home_seek_runs_until_stopped() {
    let mut s = MotorState::new(100);
    s.current_steps = 3;
    s.seek_home();
    for _ in 0..10 {
        assert_eq!(s.advance(Direction::Negative), StepOutcome::Stepped);
    }
    assert!(s.moving);
    assert_eq!(s.current_steps, 0);
    assert_eq!(s.mode, MotionMode::SeekHome);
}
