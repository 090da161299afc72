//! Menu navigation as a pure transition function.
//!
//! [`transition`] never touches the parameter store, the serial settings, or
//! the register table. It returns the next [`NavState`] together with an
//! optional [`Action`] describing the side effect the controller must perform,
//! plus flags for encoder re-baselining and redraw. Actions that mutate values
//! leave `redraw` unset; the controller decides once it knows whether the
//! value actually moved.

use core::fmt;

use crate::encoder::Rotation;
use crate::params::{PARAMETER_COUNT, ParameterId};
use crate::serial::SerialField;

/// Screens reachable from the rotary menu.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Screen {
    #[default]
    Home,
    ParamList,
    ParamEdit,
    SerialMenu,
    SerialEdit,
}

impl Screen {
    pub const COUNT: usize = 5;

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Screen::Home => 0,
            Screen::ParamList => 1,
            Screen::ParamEdit => 2,
            Screen::SerialMenu => 3,
            Screen::SerialEdit => 4,
        }
    }

    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Screen::Home),
            1 => Some(Screen::ParamList),
            2 => Some(Screen::ParamEdit),
            3 => Some(Screen::SerialMenu),
            4 => Some(Screen::SerialEdit),
            _ => None,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Screen::Home => "home",
            Screen::ParamList => "param-list",
            Screen::ParamEdit => "param-edit",
            Screen::SerialMenu => "serial-menu",
            Screen::SerialEdit => "serial-edit",
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Debounced button gestures delivered by the input collaborator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ButtonEvent {
    Select,
    SelectLong,
    Back,
}

impl fmt::Display for ButtonEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ButtonEvent::Select => "select",
            ButtonEvent::SelectLong => "select-long",
            ButtonEvent::Back => "back",
        })
    }
}

/// Input consumed by [`transition`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NavEvent {
    Button(ButtonEvent),
    Rotate(Rotation),
}

/// Side effect requested by a transition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Action {
    /// Write the parameter's encoded value to its register immediately.
    CommitParameter(ParameterId),
    /// Reinitialise the transport with the pending serial settings.
    ApplySerial,
    /// Move the parameter value by one step.
    StepParameter(ParameterId, Rotation),
    /// Move the serial field through its choice set.
    RotateSerial(SerialField, Rotation),
}

/// Screen and cursor positions.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct NavState {
    pub screen: Screen,
    /// Highlighted row on the parameter list.
    pub list_index: ParameterId,
    /// Parameter open on the edit screen.
    pub edit_index: ParameterId,
    /// Highlighted row on the serial menu.
    pub serial_field: SerialField,
}

impl NavState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            screen: Screen::Home,
            list_index: FIRST_PARAMETER,
            edit_index: FIRST_PARAMETER,
            serial_field: SerialField::Baud,
        }
    }

    /// Returns `true` when the active screen shows the parameter's value.
    #[must_use]
    pub fn displays(&self, id: ParameterId) -> bool {
        match self.screen {
            Screen::Home | Screen::ParamList => true,
            Screen::ParamEdit => self.edit_index == id,
            Screen::SerialMenu | Screen::SerialEdit => false,
        }
    }
}

impl Default for NavState {
    fn default() -> Self {
        Self::new()
    }
}

const FIRST_PARAMETER: ParameterId = match ParameterId::from_index(0) {
    Some(id) => id,
    None => panic!("catalog is never empty"),
};

/// Result of applying a [`NavEvent`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Transition {
    pub state: NavState,
    pub action: Option<Action>,
    /// Anchor the encoder at the current reading so stale motion is dropped.
    pub rebaseline: bool,
    pub redraw: bool,
}

impl Transition {
    const fn stay(state: NavState) -> Self {
        Self {
            state,
            action: None,
            rebaseline: false,
            redraw: false,
        }
    }

    const fn enter(state: NavState, rebaseline: bool) -> Self {
        Self {
            state,
            action: None,
            rebaseline,
            redraw: true,
        }
    }

    const fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }
}

/// Computes the next navigation state for `event`.
#[must_use]
pub fn transition(state: NavState, event: NavEvent) -> Transition {
    match event {
        NavEvent::Button(button) => on_button(state, button),
        NavEvent::Rotate(rotation) => on_rotate(state, rotation),
    }
}

fn on_button(state: NavState, button: ButtonEvent) -> Transition {
    let goto = |screen| NavState { screen, ..state };

    match (state.screen, button) {
        (Screen::Home, ButtonEvent::Select) => Transition::enter(
            NavState {
                screen: Screen::ParamList,
                list_index: FIRST_PARAMETER,
                ..state
            },
            true,
        ),
        (Screen::Home, ButtonEvent::SelectLong) => Transition::enter(
            NavState {
                screen: Screen::SerialMenu,
                serial_field: SerialField::Baud,
                ..state
            },
            true,
        ),
        // Back on Home is a manual refresh.
        (Screen::Home, ButtonEvent::Back) => Transition::enter(state, false),

        (Screen::ParamList, ButtonEvent::Select) => Transition::enter(
            NavState {
                screen: Screen::ParamEdit,
                edit_index: state.list_index,
                ..state
            },
            true,
        ),
        (Screen::ParamList | Screen::SerialMenu, ButtonEvent::Back) => {
            Transition::enter(goto(Screen::Home), false)
        }

        (Screen::ParamEdit, ButtonEvent::Select) => {
            Transition::enter(goto(Screen::ParamList), false)
                .with_action(Action::CommitParameter(state.edit_index))
        }
        (Screen::ParamEdit, ButtonEvent::Back) => {
            Transition::enter(goto(Screen::ParamList), false)
        }

        (Screen::SerialMenu, ButtonEvent::Select) => {
            Transition::enter(goto(Screen::SerialEdit), true)
        }

        (Screen::SerialEdit, ButtonEvent::Select) => {
            Transition::enter(goto(Screen::SerialMenu), false).with_action(Action::ApplySerial)
        }
        (Screen::SerialEdit, ButtonEvent::Back) => {
            Transition::enter(goto(Screen::SerialMenu), false)
        }

        (
            Screen::ParamList | Screen::ParamEdit | Screen::SerialMenu | Screen::SerialEdit,
            ButtonEvent::SelectLong,
        ) => Transition::stay(state),
    }
}

fn on_rotate(state: NavState, rotation: Rotation) -> Transition {
    match state.screen {
        Screen::Home => Transition::stay(state),
        Screen::ParamList => {
            let index = step_index(state.list_index.index(), PARAMETER_COUNT, rotation);
            match ParameterId::from_index(index) {
                Some(list_index) if list_index != state.list_index => Transition {
                    redraw: true,
                    ..Transition::stay(NavState { list_index, ..state })
                },
                _ => Transition::stay(state),
            }
        }
        Screen::ParamEdit => Transition::stay(state)
            .with_action(Action::StepParameter(state.edit_index, rotation)),
        Screen::SerialMenu => {
            let index = step_index(state.serial_field.index(), SerialField::COUNT, rotation);
            match SerialField::from_index(index) {
                Some(serial_field) if serial_field != state.serial_field => Transition {
                    redraw: true,
                    ..Transition::stay(NavState {
                        serial_field,
                        ..state
                    })
                },
                _ => Transition::stay(state),
            }
        }
        Screen::SerialEdit => Transition::stay(state)
            .with_action(Action::RotateSerial(state.serial_field, rotation)),
    }
}

fn step_index(index: usize, len: usize, rotation: Rotation) -> usize {
    match rotation {
        Rotation::Clockwise => (index + 1).min(len.saturating_sub(1)),
        Rotation::CounterClockwise => index.saturating_sub(1),
    }
}
