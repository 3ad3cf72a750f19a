pub mod interrupt_control;
pub mod keypad;
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub mod lcd;
