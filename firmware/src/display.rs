//! Screen sink for boards without the TFT fitted: frames go to the RTT log.

use simulator_core::controller::Display;
use simulator_core::navigation::Screen;
use simulator_core::screens::ScreenView;

#[derive(Default)]
pub struct LogDisplay {
    frames: u32,
    last: Option<Screen>,
}

impl LogDisplay {
    pub const fn new() -> Self {
        Self {
            frames: 0,
            last: None,
        }
    }

    pub const fn frames(&self) -> u32 {
        self.frames
    }

    pub const fn last(&self) -> Option<Screen> {
        self.last
    }
}

impl Display for LogDisplay {
    fn render(&mut self, view: &ScreenView<'_>) {
        self.frames = self.frames.wrapping_add(1);
        self.last = Some(view.screen());
        emit_frame(self.frames, view);
    }
}

#[cfg(target_os = "none")]
fn emit_frame(frame: u32, view: &ScreenView<'_>) {
    defmt::info!(
        "display:frame {} [{}]\n{}",
        frame,
        defmt::Display2Format(&view.screen()),
        defmt::Display2Format(view)
    );
}

#[cfg(not(target_os = "none"))]
fn emit_frame(frame: u32, view: &ScreenView<'_>) {
    println!("display:frame {frame} [{}]\n{view}", view.screen());
}

#[cfg(test)]
mod tests {
    use super::*;
    use simulator_core::params::ParameterStore;

    #[test]
    fn counts_frames_and_remembers_screen() {
        let store = ParameterStore::new();
        let mut display = LogDisplay::new();

        display.render(&ScreenView::Home { store: &store });
        display.render(&ScreenView::ParamList {
            store: &store,
            selected: simulator_core::params::ParameterId::from_index(1).expect("in range"),
        });

        assert_eq!(display.frames(), 2);
        assert_eq!(display.last(), Some(Screen::ParamList));
    }
}
