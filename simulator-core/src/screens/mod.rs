//! Text layout for the five menu screens.
//!
//! A [`ScreenView`] borrows exactly the state a screen shows. Its `Display`
//! implementation writes a header line, the body, and a key hint, one line per
//! row; pixel renderers position those lines, text sinks print them as-is.

use core::fmt;

use crate::navigation::{NavState, Screen};
use crate::params::{Parameter, ParameterId, ParameterStore};
use crate::serial::{SerialConfig, SerialField};

/// Snapshot of one screen ready for rendering.
#[derive(Copy, Clone, Debug)]
pub enum ScreenView<'a> {
    Home {
        store: &'a ParameterStore,
    },
    ParamList {
        store: &'a ParameterStore,
        selected: ParameterId,
    },
    ParamEdit {
        param: &'a Parameter,
    },
    SerialMenu {
        config: &'a SerialConfig,
        selected: SerialField,
    },
    SerialEdit {
        config: &'a SerialConfig,
        field: SerialField,
    },
}

impl<'a> ScreenView<'a> {
    /// Builds the view for the active screen.
    #[must_use]
    pub fn from_state(
        nav: &NavState,
        store: &'a ParameterStore,
        config: &'a SerialConfig,
    ) -> Self {
        match nav.screen {
            Screen::Home => ScreenView::Home { store },
            Screen::ParamList => ScreenView::ParamList {
                store,
                selected: nav.list_index,
            },
            Screen::ParamEdit => ScreenView::ParamEdit {
                param: store.get(nav.edit_index),
            },
            Screen::SerialMenu => ScreenView::SerialMenu {
                config,
                selected: nav.serial_field,
            },
            Screen::SerialEdit => ScreenView::SerialEdit {
                config,
                field: nav.serial_field,
            },
        }
    }

    #[must_use]
    pub const fn screen(&self) -> Screen {
        match self {
            ScreenView::Home { .. } => Screen::Home,
            ScreenView::ParamList { .. } => Screen::ParamList,
            ScreenView::ParamEdit { .. } => Screen::ParamEdit,
            ScreenView::SerialMenu { .. } => Screen::SerialMenu,
            ScreenView::SerialEdit { .. } => Screen::SerialEdit,
        }
    }

    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self.screen() {
            Screen::Home => "WQMS Modbus Sensor Simulator",
            Screen::ParamList => "Parameters",
            Screen::ParamEdit => "Edit Parameter",
            Screen::SerialMenu => "Serial Settings (RS-485)",
            Screen::SerialEdit => "Edit Serial Field",
        }
    }

    /// Key legend shown on the bottom row.
    #[must_use]
    pub const fn hint(&self) -> &'static str {
        match self.screen() {
            Screen::Home => "[Select]=Menus   [Back]=Refresh",
            Screen::ParamList => "Rotate to choose, Select=Edit, Back=Home",
            Screen::ParamEdit => "Rotate=Adjust  Sel=Save  Back=Cancel",
            Screen::SerialMenu => "Rotate=Move  Select=Edit  Back=Home",
            Screen::SerialEdit => "Rotate=Change  Sel=Apply  Back=Cancel",
        }
    }

    fn write_body(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ScreenView::Home { store } => {
                for (_, param) in store.iter() {
                    writeln!(f, "{}", ValueLine(param))?;
                }
                Ok(())
            }
            ScreenView::ParamList { store, selected } => {
                for (id, param) in store.iter() {
                    writeln!(f, "{}{}", marker(id == selected), ValueLine(param))?;
                }
                Ok(())
            }
            ScreenView::ParamEdit { param } => {
                let dp = param.decimals();
                writeln!(f, "{}", param.name)?;
                writeln!(f, "{:.*} {}", dp, param.value(), param.unit)?;
                writeln!(
                    f,
                    "Min {:.*}  Max {:.*}  Step {:.*}",
                    dp, param.min_val, dp, param.max_val, dp, param.step
                )
            }
            ScreenView::SerialMenu { config, selected } => {
                for field in SerialField::ALL {
                    writeln!(
                        f,
                        "{}{} : {}",
                        marker(field == selected),
                        field.label(),
                        config.field_value(field)
                    )?;
                }
                Ok(())
            }
            ScreenView::SerialEdit { config, field } => {
                writeln!(f, "{}", field.label())?;
                writeln!(f, "{}", config.field_value(field))
            }
        }
    }
}

impl fmt::Display for ScreenView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title())?;
        self.write_body(f)?;
        f.write_str(self.hint())
    }
}

/// `name : value unit` row used by the home screen and the parameter list.
pub struct ValueLine<'a>(pub &'a Parameter);

impl fmt::Display for ValueLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let param = self.0;
        write!(
            f,
            "{:<6} : {:.*} {}",
            param.name,
            param.decimals(),
            param.value(),
            param.unit
        )
    }
}

const fn marker(selected: bool) -> &'static str {
    if selected { "> " } else { "  " }
}
