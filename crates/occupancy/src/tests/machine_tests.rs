use chrono::{Duration, TimeZone, Utc};

use super::*;

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(seconds)
}

fn occupied_since(seconds: i64) -> Seat {
    Seat {
        occupied: true,
        start_time: Some(at(seconds)),
        paused_time: None,
    }
}

#[test]
fn toggle_walks_available_occupied_paused_occupied() {
    let seat = Seat::available();

    let occupied = toggle(&seat, at(0));
    assert_eq!(seat_state(&occupied), SeatState::Occupied);
    assert_eq!(occupied.start_time, Some(at(0)));
    assert_eq!(occupied.paused_time, None);

    let paused = toggle(&occupied, at(300));
    assert_eq!(seat_state(&paused), SeatState::Paused);
    assert_eq!(paused.start_time, Some(at(0)));
    assert_eq!(paused.paused_time, Some(at(300)));

    let resumed = toggle(&paused, at(420));
    assert_eq!(seat_state(&resumed), SeatState::Occupied);
    assert_eq!(resumed.start_time, Some(at(120)));
    assert_eq!(resumed.paused_time, None);
}

#[test]
fn toggle_from_available_never_pauses() {
    let stale_pause = Seat {
        occupied: false,
        start_time: Some(at(0)),
        paused_time: Some(at(10)),
    };
    for seat in [Seat::available(), stale_pause] {
        let next = toggle(&seat, at(50));
        assert_eq!(seat_state(&next), SeatState::Occupied);
        assert_eq!(next.start_time, Some(at(50)));
        assert!(next.paused_time.is_none());
    }
}

#[test]
fn resume_preserves_active_elapsed_time() {
    let seat = toggle(&Seat::available(), at(0));
    let seat = toggle(&seat, at(300));
    assert_eq!(elapsed_seconds(&seat, at(400)), 300);

    let seat = toggle(&seat, at(420));
    assert_eq!(elapsed_seconds(&seat, at(500)), 380);
    assert_eq!(format_elapsed(elapsed_seconds(&seat, at(500))), "6:20");
}

#[test]
fn paused_seat_without_start_resumes_from_now() {
    let seat = Seat {
        occupied: true,
        start_time: None,
        paused_time: Some(at(10)),
    };
    let resumed = toggle(&seat, at(20));
    assert_eq!(resumed.start_time, Some(at(20)));
    assert_eq!(resumed.paused_time, None);
}

#[test]
fn reset_clears_every_state() {
    let seats = [
        Seat::available(),
        occupied_since(0),
        Seat {
            occupied: true,
            start_time: Some(at(0)),
            paused_time: Some(at(60)),
        },
    ];
    for seat in seats {
        assert_eq!(
            reset(&seat),
            Seat {
                occupied: false,
                start_time: None,
                paused_time: None,
            }
        );
    }
}

#[test]
fn elapsed_is_zero_for_available_or_unstarted_seats() {
    assert_eq!(elapsed_seconds(&Seat::available(), at(100)), 0);
    let unstarted = Seat {
        occupied: true,
        start_time: None,
        paused_time: None,
    };
    assert_eq!(elapsed_seconds(&unstarted, at(100)), 0);
}

#[test]
fn elapsed_floors_partial_seconds_and_clamps_skew() {
    let seat = occupied_since(0);
    assert_eq!(
        elapsed_seconds(&seat, at(61) + Duration::milliseconds(999)),
        61
    );
    assert_eq!(elapsed_seconds(&seat, at(-5)), 0);
}

#[test]
fn overtime_starts_exactly_at_ninety_minutes() {
    let seat = occupied_since(0);
    let just_under = at(89 * 60 + 59);
    let limit = at(90 * 60);

    assert!(!is_over_limit(&seat, just_under));
    assert_eq!(display_class(&seat, just_under), DisplayClass::Occupied);

    assert!(is_over_limit(&seat, limit));
    assert_eq!(display_class(&seat, limit), DisplayClass::Overtime);
}

#[test]
fn paused_seat_displays_paused_even_past_limit() {
    let seat = Seat {
        occupied: true,
        start_time: Some(at(0)),
        paused_time: Some(at(95 * 60)),
    };
    assert!(is_over_limit(&seat, at(100 * 60)));
    assert_eq!(display_class(&seat, at(100 * 60)), DisplayClass::Paused);
    assert_eq!(
        display_class(&Seat::available(), at(0)),
        DisplayClass::Available
    );
}

#[test]
fn formats_elapsed_seconds() {
    assert_eq!(format_elapsed(0), "0:00");
    assert_eq!(format_elapsed(65), "1:05");
    assert_eq!(format_elapsed(599), "9:59");
    assert_eq!(format_elapsed(3599), "59:59");
    assert_eq!(format_elapsed(3661), "1:01:01");
    assert_eq!(format_elapsed(36_000), "10:00:00");
    assert_eq!(format_elapsed(-3), "0:00");
}

#[test]
fn display_classes_carry_fixed_labels() {
    assert_eq!(DisplayClass::Overtime.css_class(), "overtime");
    assert_eq!(DisplayClass::Overtime.label(), "over 90 min");
    assert_eq!(DisplayClass::Occupied.icon(), None);
    assert_eq!(DisplayClass::Available.icon(), Some("✓"));
}
