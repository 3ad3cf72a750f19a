use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use emu::cpu::hardware::keypad::GbaButton;

/// Runs a Gameboy Advance cartridge headless for a number of frames.
#[derive(Debug, Parser)]
#[command(name = "gbahle", version)]
pub struct Args {
    /// Path to the cartridge image
    pub rom: PathBuf,

    /// Frames to emulate before exiting
    #[arg(long, default_value_t = 60)]
    pub frames: u64,

    /// Firmware image, overriding the one in the config file
    #[arg(long)]
    pub bios: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the last frame as a binary PPM
    #[arg(long)]
    pub screenshot: Option<PathBuf>,

    /// Write a save state after the last frame
    #[arg(long)]
    pub save_state: Option<PathBuf>,

    /// Restore a save state before the first frame
    #[arg(long)]
    pub load_state: Option<PathBuf>,

    /// Keep a button pressed for the whole run (repeatable)
    #[arg(long = "hold", value_name = "BUTTON", value_parser = GbaButton::from_str)]
    pub held_buttons: Vec<GbaButton>,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("gbahle").chain(args.iter().copied()))
    }

    #[test]
    fn rom_only_uses_defaults() {
        let args = parse(&["game.gba"]).unwrap();

        assert_eq!(args.rom, PathBuf::from("game.gba"));
        assert_eq!(args.frames, 60);
        assert_eq!(args.bios, None);
        assert!(args.held_buttons.is_empty());
    }

    #[test]
    fn options_may_come_before_the_rom() {
        let args = parse(&[
            "--frames",
            "5",
            "--screenshot",
            "out.ppm",
            "game.gba",
            "--hold",
            "start",
            "--hold",
            "A",
            "--save-state",
            "game.state",
        ])
        .unwrap();

        assert_eq!(args.rom, PathBuf::from("game.gba"));
        assert_eq!(args.frames, 5);
        assert_eq!(args.screenshot, Some(PathBuf::from("out.ppm")));
        assert_eq!(args.save_state, Some(PathBuf::from("game.state")));
        assert_eq!(args.held_buttons, vec![GbaButton::Start, GbaButton::A]);
    }

    #[test]
    fn errors() {
        let kind = |args: &[&str]| parse(args).unwrap_err().kind();

        assert_eq!(kind(&[]), ErrorKind::MissingRequiredArgument);
        assert_eq!(kind(&["game.gba", "--frames"]), ErrorKind::InvalidValue);
        assert_eq!(kind(&["game.gba", "--frames", "many"]), ErrorKind::ValueValidation);
        assert_eq!(kind(&["game.gba", "--turbo"]), ErrorKind::UnknownArgument);
        assert_eq!(kind(&["a.gba", "b.gba"]), ErrorKind::UnknownArgument);
        assert_eq!(kind(&["game.gba", "--hold", "turbo"]), ErrorKind::ValueValidation);
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
