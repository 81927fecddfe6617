//! Relocatable machine-code stub templates injected or transferred during
//! a play session.
//!
//! Both templates are process-wide constants with designated patch slots at
//! fixed offsets. They are never mutated in place: the composer copies a
//! template and overwrites the slots with snapshot-derived values, so no two
//! sessions can alias each other's patches. Slot placeholder bytes are 0x00
//! in the templates.
//!
//! Both programs use only relative branches, so they run unmodified at
//! whatever address they end up at.

/// Length of the boot stub in bytes.
pub const BOOT_STUB_LEN: usize = 40;

/// Boot stub template. Injected into located free space inside the memory
/// image; started by the play command. Restores the bytes and I/O state the
/// transfer protocol clobbered, then returns into the captured program
/// through an emulated post-interrupt stack frame.
pub static BOOT_STUB: [u8; BOOT_STUB_LEN] = [
    // NOTE: mov operands are `dest, source`

    // Restore the two zero-page bytes the loader used as scratch
    0x8f, 0x00, 0x00,   // 00  mov $00, #zp0        <- slot BOOT_SLOT_ZP0
    0x8f, 0x00, 0x01,   // 03  mov $01, #zp1        <- slot BOOT_SLOT_ZP1

    // Control register, with the port-reset bits masked off
    0x8f, 0x00, 0xf1,   // 06  mov $f1, #control    <- slot BOOT_SLOT_CONTROL

    // Replay the DSP flags register (mute/echo-disable state)
    0x8f, 0x6c, 0xf2,   // 09  mov $f2, #$6c
    0x8f, 0x00, 0xf3,   // 0c  mov $f3, #flags      <- slot BOOT_SLOT_DSP_FLAGS

    // Prime the outbound port latches with the captured values
    0x8f, 0x00, 0xf4,   // 0f  mov $f4, #port0      <- slot BOOT_SLOT_PORT0
    0x8f, 0x00, 0xf7,   // 12  mov $f7, #port3      <- slot BOOT_SLOT_PORT3

    // Replay the echo-feedback register
    0x8f, 0x47, 0xf2,   // 15  mov $f2, #$47
    0x8f, 0x00, 0xf3,   // 18  mov $f3, #efb        <- slot BOOT_SLOT_DSP_EFB

    // Put the captured DSP address register back; the writes above
    // clobbered it
    0x8f, 0x00, 0xf2,   // 1b  mov $f2, #dspaddr    <- slot BOOT_SLOT_DSP_ADDR

    // Short settle delay before handing control back
    0x8d, 0xff,         // 1e  mov y, #$ff
    0xfe, 0xfe,         // 20  dbnz y, 20           :spin1
    0xfe, 0xfe,         // 22  dbnz y, 22           :spin2

    // Pop the rebuilt frame: a, x, y, then psw+pc via reti
    0xae,               // 24  pop a
    0xce,               // 25  pop x
    0xee,               // 26  pop y
    0x7f,               // 27  reti
];

/// Boot stub patch slots: original zero-page bytes 0x00/0x01.
pub const BOOT_SLOT_ZP0: usize = 0x01;
pub const BOOT_SLOT_ZP1: usize = 0x04;
/// Control byte slot, patched with `ram[0xF1] & 0xCF`.
pub const BOOT_SLOT_CONTROL: usize = 0x07;
/// DSP flags slot, patched with `dsp[0x6C]`.
pub const BOOT_SLOT_DSP_FLAGS: usize = 0x0D;
/// Port-0 latch slot, patched with `ram[0xF4]` or [`PORT_SENTINEL`].
pub const BOOT_SLOT_PORT0: usize = 0x10;
/// Port-3 latch slot, patched with `ram[0xF7]`.
pub const BOOT_SLOT_PORT3: usize = 0x13;
/// Echo-feedback slot, patched with `dsp[0x47]`.
pub const BOOT_SLOT_DSP_EFB: usize = 0x19;
/// DSP address register restore slot, patched with `ram[0xF2]`.
pub const BOOT_SLOT_DSP_ADDR: usize = 0x1C;

/// Patched into the port-0 slot when all four captured port bytes are zero.
/// Zero is ambiguous with "not yet written" on the hardware port latches, so
/// an all-zero capture is replaced with a value that cannot be mistaken for
/// an unwritten port.
pub const PORT_SENTINEL: u8 = 0xFF;

/// Length of the DSP-restore stub in bytes.
pub const DSP_STUB_LEN: usize = 33;

/// DSP-restore stub template. Transferred with the load-DSP command and run
/// on the device: sets the stack pointer and timer reloads, then receives
/// the 128-byte DSP register bank one value per port handshake and writes
/// each to the DSP, finally idling until the image load takes over.
pub static DSP_STUB: [u8; DSP_STUB_LEN] = [
    // Stack pointer for the rebuilt frame
    0xcd, 0x00,         // 00  mov x, #sp           <- slot DSP_SLOT_STACK_POINTER
    0xbd,               // 02  mov sp, x

    // Timer reload values
    0x8f, 0x00, 0xfa,   // 03  mov $fa, #t0         <- slot DSP_SLOT_TIMER0
    0x8f, 0x00, 0xfb,   // 06  mov $fb, #t1         <- slot DSP_SLOT_TIMER1
    0x8f, 0x00, 0xfc,   // 09  mov $fc, #t2         <- slot DSP_SLOT_TIMER2

    // Receive loop: for x in 0..0x80, wait for index x on port 0, take the
    // value from port 1, write it to DSP register x, echo x back as the ack
    0xcd, 0x00,         // 0c  mov x, #$00
    0xd8, 0xf2,         // 0e  mov $f2, x           :next
    0x3e, 0xf4,         // 10  cmp x, $f4           :wait
    0xd0, 0xfc,         // 12  bne 10               -> wait
    0xe4, 0xf5,         // 14  mov a, $f5
    0xc4, 0xf3,         // 16  mov $f3, a
    0xd8, 0xf4,         // 18  mov $f4, x
    0x3d,               // 1a  inc x
    0xc8, 0x80,         // 1b  cmp x, #$80
    0xd0, 0xef,         // 1d  bne 0e               -> next

    // All registers written; idle until the image load restarts us
    0x2f, 0xfe,         // 1f  bra 1f
];

/// Stack-pointer slot, patched with the adjusted stack pointer.
pub const DSP_SLOT_STACK_POINTER: usize = 0x01;
/// Timer reload slots, patched with `ram[0xFA]`, `ram[0xFB]`, `ram[0xFC]`.
pub const DSP_SLOT_TIMER0: usize = 0x04;
pub const DSP_SLOT_TIMER1: usize = 0x07;
pub const DSP_SLOT_TIMER2: usize = 0x0A;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_slots_hold_placeholders() {
        for slot in [
            BOOT_SLOT_ZP0,
            BOOT_SLOT_ZP1,
            BOOT_SLOT_CONTROL,
            BOOT_SLOT_DSP_FLAGS,
            BOOT_SLOT_PORT0,
            BOOT_SLOT_PORT3,
            BOOT_SLOT_DSP_EFB,
            BOOT_SLOT_DSP_ADDR,
        ] {
            assert_eq!(BOOT_STUB[slot], 0x00, "slot 0x{:02X}", slot);
        }
    }

    #[test]
    fn dsp_slots_hold_placeholders() {
        for slot in [
            DSP_SLOT_STACK_POINTER,
            DSP_SLOT_TIMER0,
            DSP_SLOT_TIMER1,
            DSP_SLOT_TIMER2,
        ] {
            assert_eq!(DSP_STUB[slot], 0x00, "slot 0x{:02X}", slot);
        }
    }
}
