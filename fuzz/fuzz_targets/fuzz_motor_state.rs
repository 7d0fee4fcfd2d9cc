#![no_main]
use libfuzzer_sys::arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use shade_core::{Direction, MotorState, POSITION_MAX};

#[derive(Debug, Arbitrary)]
enum Op {
    Target(u16),
    Halt,
    Step,
    SeekHome,
    SeekLimit,
    SetHome,
    SetTravel(u16),
    EndCalibration,
}

fuzz_target!(|input: (u16, Vec<Op>)| {
    let (travel, ops) = input;
    // Zero travel falls back to the default divisor; keep travel real here.
    let mut s = MotorState::new(travel.max(1));
    for op in ops {
        match op {
            Op::Target(p) => s.set_target(p),
            Op::Halt => s.halt(),
            Op::Step => {
                let dir = s.direction;
                let _ = s.advance(dir);
            }
            Op::SeekHome => s.seek_home(),
            Op::SeekLimit => s.seek_limit(),
            Op::SetHome => s.set_home(),
            Op::SetTravel(t) => s.set_travel(t.max(1)),
            Op::EndCalibration => s.end_calibration(),
        }
        assert!(s.current_position <= POSITION_MAX);
        assert!(s.target_position <= POSITION_MAX);
        if s.moving && !s.mode.is_calibrating() {
            assert!(s.target_steps <= s.travel_steps);
        }
        if !s.moving {
            assert_eq!(s.direction, Direction::None);
        }
    }
});
