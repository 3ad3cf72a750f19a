//! Minimal firmware image mapped at `0x0000_0000` when no BIOS file is given.
//!
//! System calls never reach it in HLE mode, but exceptions still vector into
//! the BIOS region, so it carries:
//!
//! ```text
//! 0x000  mov   pc, #0x08000000           ; reset: jump to the cartridge
//! 0x008  movs  pc, lr                    ; SWI: return immediately
//! 0x018  b     0x128                     ; IRQ
//! 0x128  stmfd sp!, {r0-r3, r12, lr}
//! 0x12C  mov   r0, #0x04000000
//! 0x130  add   lr, pc, #0                ; return to 0x138
//! 0x134  ldr   pc, [r0, #-4]             ; user handler at 0x03FFFFFC
//! 0x138  ldmfd sp!, {r0-r3, r12, lr}
//! 0x13C  subs  pc, lr, #4
//! ```

use std::path::Path;

use crate::error::{EmuError, Result};

pub const BIOS_SIZE: usize = 0x4000;

/// Where the IRQ trampoline starts.
pub const IRQ_HANDLER: u32 = 0x128;

const RESET_VECTOR: [u32; 1] = [0xE3A0_F408];
const SWI_VECTOR: [u32; 1] = [0xE1B0_F00E];
const IRQ_VECTOR: [u32; 1] = [0xEA00_0042];
const IRQ_TRAMPOLINE: [u32; 6] = [
    0xE92D_500F,
    0xE3A0_0301,
    0xE28F_E000,
    0xE510_F004,
    0xE8BD_500F,
    0xE25E_F004,
];

#[must_use]
#[allow(clippy::large_stack_arrays)]
pub fn synthesized_image() -> Box<[u8; BIOS_SIZE]> {
    let mut image = Box::new([0; BIOS_SIZE]);

    let sections: [(u32, &[u32]); 4] = [
        (0x000, &RESET_VECTOR),
        (0x008, &SWI_VECTOR),
        (0x018, &IRQ_VECTOR),
        (IRQ_HANDLER, &IRQ_TRAMPOLINE),
    ];
    for (address, words) in sections {
        for (i, word) in words.iter().enumerate() {
            let offset = address as usize + i * 4;
            image[offset..offset + 4].copy_from_slice(&word.to_le_bytes());
        }
    }

    image
}

/// Loads a BIOS dump, which must be exactly 16KB.
pub fn image_from_bytes(data: &[u8]) -> Result<Box<[u8; BIOS_SIZE]>> {
    if data.len() != BIOS_SIZE {
        return Err(EmuError::InvalidBios { size: data.len() });
    }

    let mut image = Box::new([0; BIOS_SIZE]);
    image.copy_from_slice(data);
    Ok(image)
}

pub fn image_from_file(path: &Path) -> Result<Box<[u8; BIOS_SIZE]>> {
    let data = std::fs::read(path).map_err(|source| EmuError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    image_from_bytes(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn word_at(image: &[u8; BIOS_SIZE], offset: usize) -> u32 {
        u32::from_le_bytes([
            image[offset],
            image[offset + 1],
            image[offset + 2],
            image[offset + 3],
        ])
    }

    #[test]
    fn irq_vector_branches_to_the_trampoline() {
        let image = synthesized_image();
        let branch = word_at(&image, 0x18);

        // target = vector + 8 + offset * 4
        let offset = branch & 0x00FF_FFFF;
        assert_eq!(0x18 + 8 + offset * 4, IRQ_HANDLER);
        assert_eq!(word_at(&image, IRQ_HANDLER as usize + 20), 0xE25E_F004);
    }

    #[test]
    fn bios_dumps_must_be_16k() {
        let err = image_from_bytes(&[0; 0x1000]).unwrap_err();
        assert!(matches!(err, EmuError::InvalidBios { size: 0x1000 }));

        let image = image_from_bytes(&[0xAB; BIOS_SIZE]).unwrap();
        assert_eq!(image[BIOS_SIZE - 1], 0xAB);
    }

    #[test]
    fn unused_space_is_zero() {
        let image = synthesized_image();
        assert!(image[0x140..].iter().all(|&byte| byte == 0));
    }
}
