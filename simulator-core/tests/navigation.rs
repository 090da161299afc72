mod common;

use common::{Harness, id};
use simulator_core::navigation::{ButtonEvent, Screen};
use simulator_core::serial::Parity;
use simulator_core::telemetry::TelemetryEventKind;

#[test]
fn select_from_home_opens_first_parameter() {
    let mut harness = Harness::start();
    harness.press(ButtonEvent::Select);

    let nav = harness.controller.nav();
    assert_eq!(nav.screen, Screen::ParamList);
    assert_eq!(nav.list_index, id(0));
}

#[test]
fn list_selection_opens_matching_editor() {
    let mut harness = Harness::start();
    harness.press(ButtonEvent::Select);
    harness.rotate(2);
    harness.press(ButtonEvent::Select);

    let nav = harness.controller.nav();
    assert_eq!(nav.screen, Screen::ParamEdit);
    assert_eq!(nav.edit_index, id(2));

    let (screen, text) = harness
        .controller
        .display()
        .frames
        .last()
        .cloned()
        .expect("editor rendered");
    assert_eq!(screen, Screen::ParamEdit);
    assert!(text.contains("TSS\n100 NTU\n"), "unexpected frame: {text}");
}

#[test]
fn back_from_editor_skips_the_explicit_write() {
    let mut harness = Harness::start();
    harness.press(ButtonEvent::Select);
    harness.rotate(2);
    harness.press(ButtonEvent::Select);
    harness.rotate(3);

    assert_eq!(harness.value(2), 103.0);
    harness.press(ButtonEvent::Back);

    assert_eq!(harness.controller.screen(), Screen::ParamList);
    assert_eq!(
        harness.register(3),
        Some(100),
        "cancel must not write the register"
    );

    // The rotation already changed the authoritative value, so the periodic
    // export still publishes it.
    harness.tick_after(300, &[]);
    assert_eq!(harness.register(3), Some(103));
}

#[test]
fn save_from_editor_writes_immediately() {
    let mut harness = Harness::start();
    harness.press(ButtonEvent::Select);
    harness.press(ButtonEvent::Select);
    harness.rotate(-25);
    harness.press(ButtonEvent::Select);

    assert_eq!(harness.controller.screen(), Screen::ParamList);
    assert_eq!(harness.register(1), Some(675));

    let committed = harness
        .controller
        .telemetry()
        .oldest_first()
        .any(|record| record.event == TelemetryEventKind::LocalCommit(id(0)));
    assert!(committed);
}

#[test]
fn back_on_home_refreshes_the_screen() {
    let mut harness = Harness::start();
    let before = harness.frames();
    harness.press(ButtonEvent::Back);

    assert_eq!(harness.controller.screen(), Screen::Home);
    assert_eq!(harness.frames(), before + 1);
}

#[test]
fn rotation_on_home_is_ignored() {
    let mut harness = Harness::start();
    let before = harness.frames();
    harness.rotate(4);

    assert_eq!(harness.controller.screen(), Screen::Home);
    assert_eq!(harness.frames(), before);
}

#[test]
fn serial_edit_applies_only_on_select() {
    let mut harness = Harness::start();
    harness.press(ButtonEvent::SelectLong);
    assert_eq!(harness.controller.screen(), Screen::SerialMenu);

    harness.rotate(1);
    harness.press(ButtonEvent::Select);
    assert_eq!(harness.controller.nav().serial_field.label(), "Parity");

    harness.rotate(-1);
    assert_eq!(harness.controller.serial().parity, Parity::Odd);
    harness.press(ButtonEvent::Back);
    assert_eq!(harness.controller.link().reinits.len(), 1);
    assert_eq!(harness.controller.applied_serial().parity, Parity::None);

    harness.press(ButtonEvent::Select);
    harness.press(ButtonEvent::Select);
    assert_eq!(harness.controller.screen(), Screen::SerialMenu);

    let reinits = &harness.controller.link().reinits;
    assert_eq!(reinits.len(), 2);
    assert_eq!(reinits[1].0.parity, Parity::Odd);
    assert_eq!(reinits[1].1, 1);
}

#[test]
fn baud_rate_edits_clamp_at_the_fastest_rate() {
    let mut harness = Harness::start();
    harness.press(ButtonEvent::SelectLong);
    harness.press(ButtonEvent::Select);

    harness.rotate(-1);
    assert_eq!(harness.controller.serial().baud(), 4800);

    harness.rotate(10);
    assert_eq!(harness.controller.serial().baud(), 115_200);
}

#[test]
fn long_press_outside_home_does_nothing() {
    let mut harness = Harness::start();
    harness.press(ButtonEvent::Select);
    let before = harness.frames();

    harness.press(ButtonEvent::SelectLong);
    assert_eq!(harness.controller.screen(), Screen::ParamList);
    assert_eq!(harness.frames(), before);
}
