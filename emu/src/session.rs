//! A running console: cartridge, CPU and every device behind the bus.
//!
//! The session drives emulation one frame at a time. Each step the CPU
//! executes one instruction (or takes an interrupt) and the hardware is
//! advanced by the cycles it reported; while the CPU sleeps the hardware is
//! fast forwarded to its next event so a pending wake up is never missed.

use serde::{Deserialize, Serialize};

use crate::bios::rom;
use crate::bus::Bus;
use crate::cartridge::{Cartridge, CartridgeHeader};
use crate::config::Config;
use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::hardware::keypad::GbaButton;
use crate::cpu::hardware::lcd::{CYCLES_PER_FRAME, Framebuffer};
use crate::error::{EmuError, Result};

/// Bumped whenever the layout of a save state changes.
pub const SAVE_STATE_VERSION: u32 = 1;

/// Receives a copy of every completed frame.
pub type FrameCallback = Box<dyn FnMut(Framebuffer) + Send>;

pub struct Session {
    cpu: Arm7tdmi,
    header: CartridgeHeader,
    config: Config,

    /// Cycles the last instruction of the previous frame ran past its end.
    overshoot: u32,
    frame_count: u64,

    frame_callback: Option<FrameCallback>,
}

#[derive(Serialize)]
struct SaveStateRef<'a> {
    version: u32,
    cpu: &'a Arm7tdmi,
    overshoot: u32,
    frame_count: u64,
}

#[derive(Deserialize)]
struct SaveState {
    cpu: Arm7tdmi,
    overshoot: u32,
    frame_count: u64,
}

#[derive(Deserialize)]
struct SaveStateVersion {
    version: u32,
}

impl Session {
    /// Session with the default [`Config`].
    pub fn load_cartridge(rom: Vec<u8>) -> Result<Self> {
        Self::with_config(rom, Config::default())
    }

    pub fn with_config(rom: Vec<u8>, config: Config) -> Result<Self> {
        Self::new(Cartridge::from_bytes(rom)?, config)
    }

    pub fn new(cartridge: Cartridge, config: Config) -> Result<Self> {
        let header = cartridge.header().clone();
        let rom_size = cartridge.rom().len();

        let mut bus = Bus::with_rom(cartridge.into_rom());
        if let Some(path) = &config.bios_path {
            bus.set_bios(rom::image_from_file(path)?);
            tracing::info!("BIOS loaded from {}", path.display());
        }

        let mut cpu = Arm7tdmi::new(bus, config.firmware.into());
        cpu.reset(config.skip_boot);

        tracing::info!(
            "cartridge loaded: \"{}\" [{}], {rom_size} bytes",
            header.game_title(),
            header.game_code()
        );

        Ok(Self {
            cpu,
            header,
            config,
            overshoot: 0,
            frame_count: 0,
            frame_callback: None,
        })
    }

    /// Power cycles the console. Cartridge, BIOS and SRAM are kept.
    pub fn reset(&mut self) {
        self.cpu.bus.reset();
        self.cpu.reset(self.config.skip_boot);
        self.overshoot = 0;
        self.frame_count = 0;

        tracing::info!("session reset");
    }

    /// Runs one frame (280,896 cycles) and returns the finished image.
    pub fn run_frame(&mut self) -> &Framebuffer {
        let mut elapsed = self.overshoot;

        while elapsed < CYCLES_PER_FRAME {
            let cycles = match self.cpu.step() {
                0 => self
                    .cpu
                    .bus
                    .cycles_to_next_event()
                    .min(CYCLES_PER_FRAME - elapsed),
                cycles => cycles,
            };

            self.cpu.bus.advance(cycles);
            elapsed += cycles;
        }

        self.overshoot = elapsed - CYCLES_PER_FRAME;
        self.frame_count += 1;

        if !self.cpu.bus.lcd.take_frame_ready() {
            tracing::debug!("frame {} ended without reaching VBlank", self.frame_count);
        }

        if let Some(callback) = &mut self.frame_callback {
            callback(self.cpu.bus.lcd.framebuffer().clone());
        }

        self.cpu.bus.lcd.framebuffer()
    }

    /// Registers `callback` to receive a copy of every frame. The copy is
    /// owned by the callback, so it may be moved to another thread.
    pub fn set_frame_callback(&mut self, callback: impl FnMut(Framebuffer) + Send + 'static) {
        self.frame_callback = Some(Box::new(callback));
    }

    pub fn clear_frame_callback(&mut self) {
        self.frame_callback = None;
    }

    pub fn set_key(&mut self, button: GbaButton, pressed: bool) {
        self.cpu.bus.set_key(button, pressed);
    }

    /// Serializes the whole machine state. ROM and BIOS images are not
    /// included: a state can only be restored into a session running the
    /// same cartridge.
    pub fn save_state(&self) -> Result<Vec<u8>> {
        let state = SaveStateRef {
            version: SAVE_STATE_VERSION,
            cpu: &self.cpu,
            overshoot: self.overshoot,
            frame_count: self.frame_count,
        };
        let data = serde_json::to_vec(&state)?;

        tracing::info!("state saved, {} bytes", data.len());
        Ok(data)
    }

    /// Replaces the machine state with `data`. On failure the session is
    /// left untouched.
    pub fn restore_state(&mut self, data: &[u8]) -> Result<()> {
        let state = match Self::decode_state(data) {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!("cannot restore save state: {err}");
                return Err(err);
            }
        };

        let mut cpu = state.cpu;
        cpu.bus.take_images_from(&mut self.cpu.bus);
        self.cpu = cpu;
        self.overshoot = state.overshoot;
        self.frame_count = state.frame_count;

        tracing::info!("state restored at frame {}", self.frame_count);
        Ok(())
    }

    fn decode_state(data: &[u8]) -> Result<SaveState> {
        let SaveStateVersion { version } = serde_json::from_slice(data)?;
        if version != SAVE_STATE_VERSION {
            return Err(EmuError::SaveStateVersion {
                found: version,
                expected: SAVE_STATE_VERSION,
            });
        }

        Ok(serde_json::from_slice(data)?)
    }

    #[must_use]
    pub const fn framebuffer(&self) -> &Framebuffer {
        self.cpu.bus.lcd.framebuffer()
    }

    #[must_use]
    pub const fn header(&self) -> &CartridgeHeader {
        &self.header
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    #[must_use]
    pub const fn cpu(&self) -> &Arm7tdmi {
        &self.cpu
    }

    pub const fn cpu_mut(&mut self) -> &mut Arm7tdmi {
        &mut self.cpu
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::cartridge::HEADER_SIZE;
    use crate::cpu::arm7tdmi::{CARTRIDGE_ENTRY, HaltState};
    use crate::cpu::hardware::lcd::Color;
    use pretty_assertions::assert_eq;

    /// `b 0x080000C0`, jumping over the header.
    const BRANCH_OVER_HEADER: u32 = 0xEA00_002E;

    /// Builds a cartridge whose code starts right after the header.
    fn assemble(program: &[u32]) -> Vec<u8> {
        let mut rom = vec![0; HEADER_SIZE];
        rom[0..4].copy_from_slice(&BRANCH_OVER_HEADER.to_le_bytes());
        rom[0xA0..0xA4].copy_from_slice(b"TEST");
        rom[0xB2] = 0x96;
        for word in program {
            rom.extend_from_slice(&word.to_le_bytes());
        }
        rom
    }

    /// Mode 4, palette entry 1 = pure red, first pixel = index 1.
    const BITMAP_PROGRAM: [u32; 11] = [
        0xE3A0_0301, // mov   r0, #0x04000000
        0xE3A0_1B01, // mov   r1, #0x400
        0xE281_1004, // add   r1, r1, #4
        0xE1C0_10B0, // strh  r1, [r0]          ; DISPCNT = mode 4, BG2
        0xE3A0_0405, // mov   r0, #0x05000000
        0xE3A0_101F, // mov   r1, #0x1F
        0xE1C0_10B2, // strh  r1, [r0, #2]      ; palette 1 = red
        0xE3A0_0406, // mov   r0, #0x06000000
        0xE3A0_1001, // mov   r1, #1
        0xE1C0_10B0, // strh  r1, [r0]          ; pixel (0, 0) = 1
        0xEAFF_FFFE, // b     .
    ];

    /// Waits for VBlank with IRQs masked in the CPSR, then samples VCOUNT.
    const VBLANK_WAIT_PROGRAM: [u32; 10] = [
        0xE321_F09F, // msr   cpsr_c, #0x9F     ; System mode, IRQ disabled
        0xE3A0_0301, // mov   r0, #0x04000000
        0xE3A0_1008, // mov   r1, #8
        0xE1C0_10B4, // strh  r1, [r0, #4]      ; DISPSTAT VBlank IRQ
        0xE280_2C02, // add   r2, r0, #0x200
        0xE3A0_1001, // mov   r1, #1
        0xE1C2_10B0, // strh  r1, [r2]          ; IE = VBlank
        0xEF05_0000, // swi   0x05              ; VBlankIntrWait
        0xE1D0_30B6, // ldrh  r3, [r0, #6]      ; VCOUNT
        0xEAFF_FFFE, // b     .
    ];

    /// Installs an IRQ handler counting VBlanks at 0x03000000 and loops on
    /// VBlankIntrWait.
    const IRQ_HANDLER_PROGRAM: [u32; 22] = [
        0xE3A0_0301, // 0C0: mov   r0, #0x04000000
        0xE3A0_1008, // 0C4: mov   r1, #8
        0xE1C0_10B4, // 0C8: strh  r1, [r0, #4]
        0xE280_2C02, // 0CC: add   r2, r0, #0x200
        0xE3A0_1001, // 0D0: mov   r1, #1
        0xE1C2_10B0, // 0D4: strh  r1, [r2]
        0xE3A0_4403, // 0D8: mov   r4, #0x03000000
        0xE284_4C7F, // 0DC: add   r4, r4, #0x7F00
        0xE284_40FC, // 0E0: add   r4, r4, #0xFC
        0xE28F_5008, // 0E4: add   r5, pc, #8       ; handler at 0x0F4
        0xE584_5000, // 0E8: str   r5, [r4]         ; 0x03007FFC
        0xEF05_0000, // 0EC: swi   0x05
        0xEAFF_FFFD, // 0F0: b     0x0EC
        0xE3A0_0301, // 0F4: mov   r0, #0x04000000
        0xE280_0C02, // 0F8: add   r0, r0, #0x200
        0xE3A0_1001, // 0FC: mov   r1, #1
        0xE1C0_10B2, // 100: strh  r1, [r0, #2]     ; acknowledge VBlank
        0xE3A0_0403, // 104: mov   r0, #0x03000000
        0xE590_1000, // 108: ldr   r1, [r0]
        0xE281_1001, // 10C: add   r1, r1, #1
        0xE580_1000, // 110: str   r1, [r0]
        0xE12F_FF1E, // 114: bx    lr
    ];

    /// Two VBlankIntrWaits in a row with IRQs masked, sampling VCOUNT after
    /// each.
    const DOUBLE_VBLANK_WAIT_PROGRAM: [u32; 13] = [
        0xE321_F09F, // msr   cpsr_c, #0x9F
        0xE3A0_0301, // mov   r0, #0x04000000
        0xE3A0_1008, // mov   r1, #8
        0xE1C0_10B4, // strh  r1, [r0, #4]
        0xE280_2C02, // add   r2, r0, #0x200
        0xE3A0_1001, // mov   r1, #1
        0xE1C2_10B0, // strh  r1, [r2]
        0xEF05_0000, // swi   0x05
        0xE1D0_30B6, // ldrh  r3, [r0, #6]
        0xEF05_0000, // swi   0x05              ; IF still holds VBlank
        0xE3A0_4001, // mov   r4, #1
        0xE1D0_50B6, // ldrh  r5, [r0, #6]
        0xEAFF_FFFE, // b     .
    ];

    /// Enables HBlank and VBlank IRQs, counts handler calls at 0x03000000 and
    /// VBlankIntrWait returns at 0x03000004.
    const HBLANK_AND_VBLANK_PROGRAM: [u32; 26] = [
        0xE3A0_0301, // 0C0: mov   r0, #0x04000000
        0xE3A0_1018, // 0C4: mov   r1, #0x18
        0xE1C0_10B4, // 0C8: strh  r1, [r0, #4]     ; DISPSTAT VBlank and HBlank IRQ
        0xE280_2C02, // 0CC: add   r2, r0, #0x200
        0xE3A0_1003, // 0D0: mov   r1, #3
        0xE1C2_10B0, // 0D4: strh  r1, [r2]         ; IE = VBlank | HBlank
        0xE3A0_4403, // 0D8: mov   r4, #0x03000000
        0xE284_4C7F, // 0DC: add   r4, r4, #0x7F00
        0xE284_40FC, // 0E0: add   r4, r4, #0xFC
        0xE28F_5018, // 0E4: add   r5, pc, #0x18    ; handler at 0x104
        0xE584_5000, // 0E8: str   r5, [r4]
        0xE3A0_6403, // 0EC: mov   r6, #0x03000000
        0xEF05_0000, // 0F0: swi   0x05
        0xE596_7004, // 0F4: ldr   r7, [r6, #4]
        0xE287_7001, // 0F8: add   r7, r7, #1
        0xE586_7004, // 0FC: str   r7, [r6, #4]
        0xEAFF_FFFA, // 100: b     0x0F0
        0xE3A0_0301, // 104: mov   r0, #0x04000000
        0xE280_0C02, // 108: add   r0, r0, #0x200
        0xE1D0_10B2, // 10C: ldrh  r1, [r0, #2]
        0xE1C0_10B2, // 110: strh  r1, [r0, #2]     ; acknowledge whatever is set
        0xE3A0_0403, // 114: mov   r0, #0x03000000
        0xE590_1000, // 118: ldr   r1, [r0]
        0xE281_1001, // 11C: add   r1, r1, #1
        0xE580_1000, // 120: str   r1, [r0]
        0xE12F_FF1E, // 124: bx    lr
    ];

    /// Fills 0x1000 words of EWRAM with CpuSet over and over.
    const CPU_SET_LOOP_PROGRAM: [u32; 6] = [
        0xE3A0_0402, // mov   r0, #0x02000000
        0xE1A0_1000, // mov   r1, r0
        0xE3A0_2405, // mov   r2, #0x05000000   ; 32-bit fill
        0xE382_2A01, // orr   r2, r2, #0x1000
        0xEF0B_0000, // swi   0x0B
        0xEAFF_FFFD, // b     swi
    ];

    #[test]
    fn bitmap_palette_write_reaches_the_framebuffer() {
        let mut session = Session::load_cartridge(assemble(&BITMAP_PROGRAM)).unwrap();

        let frame = session.run_frame();

        assert_eq!(frame.pixel(0, 0), Color(0x001F).to_rgba());
        assert_eq!(frame.pixel(0, 0), 0xF800_00FF);
        assert_eq!(frame.pixel(1, 0), 0x0000_00FF);
        assert_eq!(frame.pixel(0, 1), 0x0000_00FF);
    }

    #[test]
    fn vblank_intr_wait_resumes_at_vblank_within_one_frame() {
        let mut session = Session::load_cartridge(assemble(&VBLANK_WAIT_PROGRAM)).unwrap();

        session.run_frame();

        let cpu = session.cpu_mut();
        assert_eq!(cpu.registers.register_at(3), 160);
        assert_eq!(cpu.bus.read_half_word(0x0400_0202), 1);
    }

    #[test]
    fn irq_trampoline_runs_the_user_handler_once_per_frame() {
        let mut session = Session::load_cartridge(assemble(&IRQ_HANDLER_PROGRAM)).unwrap();

        for _ in 0..3 {
            session.run_frame();
        }

        let cpu = session.cpu_mut();
        assert_eq!(cpu.bus.read_word(0x0300_0000), 3);
        assert_eq!(cpu.bus.read_half_word(0x0400_0202), 0);
    }

    #[test]
    fn other_enabled_irqs_are_serviced_during_vblank_intr_wait() {
        let mut session = Session::load_cartridge(assemble(&HBLANK_AND_VBLANK_PROGRAM)).unwrap();

        session.run_frame();
        session.run_frame();

        let cpu = session.cpu_mut();
        let hblanks_and_vblanks = 2 * (228 + 1);
        assert_eq!(cpu.bus.read_word(0x0300_0000), hblanks_and_vblanks);
        assert_eq!(cpu.bus.read_word(0x0300_0004), 2);
    }

    #[test]
    fn second_vblank_intr_wait_ignores_the_latched_request() {
        let mut session = Session::load_cartridge(assemble(&DOUBLE_VBLANK_WAIT_PROGRAM)).unwrap();

        session.run_frame();
        let cpu = session.cpu();
        assert_eq!(cpu.registers.register_at(3), 160);
        assert_eq!(cpu.registers.register_at(4), 0);
        assert_eq!(cpu.halt_state(), HaltState::IntrWait { mask: 1 });

        session.run_frame();
        let cpu = session.cpu();
        assert_eq!(cpu.registers.register_at(4), 1);
        assert_eq!(cpu.registers.register_at(5), 160);
    }

    #[test]
    fn long_system_calls_do_not_overshoot_the_frame() {
        let mut session = Session::load_cartridge(assemble(&CPU_SET_LOOP_PROGRAM)).unwrap();

        for _ in 0..3 {
            session.run_frame();
            assert_eq!(session.cpu().bus.lcd.vcount(), 0);
        }
        assert_eq!(session.frame_count(), 3);
    }

    #[test]
    fn run_frame_advances_exactly_one_frame() {
        let mut session = Session::load_cartridge(assemble(&[0xEAFF_FFFE])).unwrap();

        session.run_frame();
        assert_eq!(session.frame_count(), 1);
        assert_eq!(session.cpu().bus.lcd.vcount(), 0);
        assert!(session.cpu().elapsed_cycles() >= u64::from(CYCLES_PER_FRAME));

        session.run_frame();
        assert_eq!(session.frame_count(), 2);
        assert_eq!(session.cpu().bus.lcd.vcount(), 0);
    }

    #[test]
    fn frame_callback_gets_a_copy_of_every_frame() {
        let mut session = Session::load_cartridge(assemble(&BITMAP_PROGRAM)).unwrap();
        let frames = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&frames);
        session.set_frame_callback(move |frame| sink.lock().unwrap().push(frame.pixel(0, 0)));

        session.run_frame();
        session.run_frame();

        assert_eq!(*frames.lock().unwrap(), vec![0xF800_00FF, 0xF800_00FF]);

        session.clear_frame_callback();
        session.run_frame();
        assert_eq!(frames.lock().unwrap().len(), 2);
    }

    #[test]
    fn save_and_restore_round_trip() {
        let mut session = Session::load_cartridge(assemble(&IRQ_HANDLER_PROGRAM)).unwrap();
        session.run_frame();
        let state = session.save_state().unwrap();

        session.run_frame();
        session.run_frame();
        let expected_registers = session.cpu().registers.clone();
        let expected_frame = session.framebuffer().clone();
        let expected_counter = session.cpu_mut().bus.read_word(0x0300_0000);

        session.restore_state(&state).unwrap();
        assert_eq!(session.frame_count(), 1);
        assert_eq!(session.cpu_mut().bus.read_word(0x0300_0000), 1);
        assert_eq!(session.cpu().bus.rom().len(), HEADER_SIZE + IRQ_HANDLER_PROGRAM.len() * 4);

        session.run_frame();
        session.run_frame();
        assert_eq!(session.cpu().registers, expected_registers);
        assert_eq!(session.cpu_mut().bus.read_word(0x0300_0000), expected_counter);
        assert!(session.framebuffer() == &expected_frame);
    }

    #[test]
    fn restored_state_shows_its_frame_before_running() {
        let mut session = Session::load_cartridge(assemble(&BITMAP_PROGRAM)).unwrap();
        session.run_frame();
        let state = session.save_state().unwrap();

        let mut restored = Session::load_cartridge(assemble(&BITMAP_PROGRAM)).unwrap();
        assert_eq!(restored.framebuffer().pixel(0, 0), 0);

        restored.restore_state(&state).unwrap();
        assert_eq!(restored.framebuffer().pixel(0, 0), 0xF800_00FF);
        assert!(restored.framebuffer() == session.framebuffer());
    }

    #[test]
    fn bad_save_states_leave_the_session_untouched() {
        let mut session = Session::load_cartridge(assemble(&BITMAP_PROGRAM)).unwrap();
        session.run_frame();

        let err = session.restore_state(b"not a save state").unwrap_err();
        assert!(matches!(err, EmuError::SaveState(_)));

        let err = session.restore_state(br#"{ "version": 99 }"#).unwrap_err();
        assert!(matches!(
            err,
            EmuError::SaveStateVersion {
                found: 99,
                expected: SAVE_STATE_VERSION
            }
        ));

        assert_eq!(session.frame_count(), 1);
        assert_eq!(session.framebuffer().pixel(0, 0), 0xF800_00FF);
    }

    #[test]
    fn reset_restarts_the_cartridge() {
        let mut session = Session::load_cartridge(assemble(&BITMAP_PROGRAM)).unwrap();
        session.run_frame();

        session.reset();

        let cpu = session.cpu_mut();
        assert_eq!(cpu.registers.program_counter(), CARTRIDGE_ENTRY);
        assert_eq!(cpu.bus.read_half_word(0x0500_0002), 0);
        assert_eq!(cpu.bus.read_word(0x0800_0000), BRANCH_OVER_HEADER);
        assert_eq!(session.frame_count(), 0);
    }

    #[test]
    fn keys_show_up_in_keyinput() {
        let mut session = Session::load_cartridge(assemble(&[0xEAFF_FFFE])).unwrap();

        session.set_key(GbaButton::Start, true);

        assert_eq!(session.cpu_mut().bus.read_half_word(0x0400_0130), 0x03F7);
    }

    #[test]
    fn header_is_exposed() {
        let session = Session::load_cartridge(assemble(&[0xEAFF_FFFE])).unwrap();

        assert_eq!(session.header().game_title(), "TEST");
        assert_eq!(session.header().rom_entry_point(), BRANCH_OVER_HEADER);
    }

    #[test]
    fn truncated_cartridge_is_rejected() {
        let err = Session::load_cartridge(vec![0; 16]).err().unwrap();
        assert!(matches!(err, EmuError::CartridgeTooSmall { size: 16 }));
    }
}
