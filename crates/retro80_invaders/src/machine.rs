use anyhow::{ensure, Result};
use log::info;
use retro80_common::key::Key;
use retro80_core::cpu::{Bus8080, Cpu8080};
use retro80_core::frame::{FrameClock, FrameEvent, MID_FRAME_VECTOR, VBLANK_VECTOR};

/// ROM occupies 0x0000–0x1FFF and is read-only; everything at or above
/// 0x2000 decodes into 8 KiB of RAM mirrored every 0x2000.
const ROM_SIZE: usize = 0x2000;
const RAM_SIZE: usize = 0x2000;
const RAM_BASE: u16 = 0x2000;

/// Video RAM is the RAM window backing addresses 0x2400–0x3FFF.
const VRAM_OFFSET: usize = 0x0400;
const VRAM_SIZE: usize = 0x1c00;

/// Bit positions for input port 1 (IN 1).
const IN1_BIT_COIN: u8 = 0;
const IN1_BIT_P2_START: u8 = 1;
const IN1_BIT_P1_START: u8 = 2;
const IN1_BIT_ALWAYS_ONE: u8 = 3;
const IN1_BIT_P1_SHOOT: u8 = 4;
const IN1_BIT_P1_LEFT: u8 = 5;
const IN1_BIT_P1_RIGHT: u8 = 6;

/// Bit positions for input port 2 (IN 2): player 2 controls, tilt and the
/// DIP switches we model.
const IN2_BIT_TILT: u8 = 2;
const IN2_BIT_P2_SHOOT: u8 = 4;
const IN2_BIT_P2_LEFT: u8 = 5;
const IN2_BIT_P2_RIGHT: u8 = 6;
const IN2_BIT_COIN_INFO: u8 = 7;

const IN2_MASK_SHIPS_PER_CREDIT: u8 = 0x03;

/// DIP switch configuration surfaced on input port 2.
///
/// - `ships_per_credit`: number of ships per game (3–6), encoded in bits
///   0–1 of port 2 as `value - 3`.
/// - `show_coin_info`: whether the attract mode shows the coin/credit info
///   line. The ROM treats bit 7 = 1 as "hide coin info".
#[derive(Clone, Copy, Debug)]
pub struct DipConfig {
    pub ships_per_credit: u8,
    pub show_coin_info: bool,
}

impl Default for DipConfig {
    fn default() -> Self {
        Self {
            ships_per_credit: 3,
            show_coin_info: true,
        }
    }
}

impl DipConfig {
    fn apply_to_port2(&self, in_port2: &mut u8) {
        *in_port2 &= !IN2_MASK_SHIPS_PER_CREDIT;
        *in_port2 &= !(1 << IN2_BIT_COIN_INFO);

        let ships = self.ships_per_credit.clamp(3, 6);
        *in_port2 |= (ships - 3) & IN2_MASK_SHIPS_PER_CREDIT;

        if !self.show_coin_info {
            *in_port2 |= 1 << IN2_BIT_COIN_INFO;
        }
    }
}

/// Memory map and port hardware for the Space Invaders board: mirrored
/// ROM/RAM, the shift register, input latches and sound output latches.
pub struct InvadersBus {
    rom: [u8; ROM_SIZE],
    ram: [u8; RAM_SIZE],
    in_port1: u8,
    in_port2: u8,
    out_port3: u8,
    out_port5: u8,
    shift_register: u16,
    shift_offset: u8,
}

impl Default for InvadersBus {
    fn default() -> Self {
        Self {
            rom: [0; ROM_SIZE],
            ram: [0; RAM_SIZE],
            in_port1: 1 << IN1_BIT_ALWAYS_ONE,
            in_port2: 0,
            out_port3: 0,
            out_port5: 0,
            shift_register: 0,
            shift_offset: 0,
        }
    }
}

impl InvadersBus {
    fn mirrored_index(addr: u16) -> usize {
        ((addr - RAM_BASE) & 0x1fff) as usize
    }
}

impl Bus8080 for InvadersBus {
    fn mem_read(&mut self, addr: u16) -> u8 {
        if addr < RAM_BASE {
            self.rom[addr as usize]
        } else {
            self.ram[Self::mirrored_index(addr)]
        }
    }

    fn mem_write(&mut self, addr: u16, value: u8) {
        // Writes into the ROM region are silently discarded.
        if addr < RAM_BASE {
            return;
        }
        self.ram[Self::mirrored_index(addr)] = value;
    }

    fn io_read(&mut self, port: u8) -> u8 {
        match port {
            1 => self.in_port1,
            2 => self.in_port2,
            3 => {
                let shift = 8 - self.shift_offset;
                (self.shift_register >> shift) as u8
            }
            _ => 0,
        }
    }

    fn io_write(&mut self, port: u8, value: u8) {
        match port {
            2 => {
                self.shift_offset = value & 0x07;
            }
            3 => {
                self.out_port3 = value;
            }
            4 => {
                self.shift_register = (self.shift_register >> 8) | ((value as u16) << 8);
            }
            5 => {
                self.out_port5 = value;
            }
            6 => {
                // watchdog, ignore
            }
            _ => {}
        }
    }
}

/// The Space Invaders machine: 8080 CPU, board bus and frame clock.
pub struct InvadersMachine {
    cpu: Cpu8080,
    bus: InvadersBus,
    clock: FrameClock,
    dip_config: DipConfig,
}

impl InvadersMachine {
    pub fn new() -> Self {
        Self::with_dip_config(DipConfig::default())
    }

    pub fn with_dip_config(dip_config: DipConfig) -> Self {
        let mut machine = Self {
            cpu: Cpu8080::new(),
            bus: InvadersBus::default(),
            clock: FrameClock::new(),
            dip_config,
        };
        machine.apply_dip_config();
        machine
    }

    /// Load a ROM image. Errors if the image exceeds the 8 KiB ROM region;
    /// execution restarts at 0x0000.
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<()> {
        ensure!(
            rom.len() <= ROM_SIZE,
            "ROM is {} bytes but the board only decodes {ROM_SIZE}",
            rom.len()
        );
        self.bus.rom[..rom.len()].copy_from_slice(rom);
        self.cpu.pc = 0x0000;
        info!("loaded {} byte Space Invaders ROM", rom.len());
        Ok(())
    }

    /// Reset the machine, preserving ROM contents and the DIP configuration.
    pub fn reset(&mut self) {
        self.cpu.reset();
        let rom = self.bus.rom;
        self.bus = InvadersBus::default();
        self.bus.rom = rom;
        self.clock = FrameClock::new();
        self.apply_dip_config();
    }

    fn apply_dip_config(&mut self) {
        self.dip_config.apply_to_port2(&mut self.bus.in_port2);
    }

    /// Run the CPU up to the next vblank.
    ///
    /// Every instruction's cycle cost feeds the frame clock; the mid-frame
    /// edge delivers RST 1 and the vblank edge delivers RST 2 (both gated
    /// by the CPU's enable latch) before returning to the caller, which
    /// renders the frame. A CPU halted with interrupts disabled can never
    /// resume, so the frame ends early to keep the frontend responsive.
    pub fn step_frame(&mut self) {
        loop {
            let mut cycles = self.cpu.step(&mut self.bus);
            if cycles == 0 {
                if !self.cpu.interrupts_enabled {
                    return;
                }
                // Halted until the next timer interrupt; let time pass at
                // the cost of a NOP per iteration.
                cycles = 4;
            }

            match self.clock.tick(cycles) {
                FrameEvent::HalfFrame => {
                    self.cpu.interrupt(&mut self.bus, MID_FRAME_VECTOR);
                }
                FrameEvent::FullFrame => {
                    self.cpu.interrupt(&mut self.bus, VBLANK_VECTOR);
                    return;
                }
                FrameEvent::None => {}
            }
        }
    }

    /// Map a logical key to its input port bit.
    ///
    /// - `C` inserts a coin, `Num1`/`Num2` start one or two players
    /// - `A`/`Left`, `D`/`Right`, `S`/`Space` drive player 1
    /// - `J`/`L`/`K` drive player 2 (port 2)
    /// - `T` latches tilt on press (cleared by the game, not by release)
    pub fn handle_key(&mut self, key: Key, pressed: bool) {
        match key {
            Key::C => set_input_bit(&mut self.bus.in_port1, IN1_BIT_COIN, pressed),
            Key::Num1 => set_input_bit(&mut self.bus.in_port1, IN1_BIT_P1_START, pressed),
            Key::Num2 => set_input_bit(&mut self.bus.in_port1, IN1_BIT_P2_START, pressed),
            Key::A | Key::Left => {
                set_input_bit(&mut self.bus.in_port1, IN1_BIT_P1_LEFT, pressed);
            }
            Key::D | Key::Right => {
                set_input_bit(&mut self.bus.in_port1, IN1_BIT_P1_RIGHT, pressed);
            }
            Key::S | Key::Space => {
                set_input_bit(&mut self.bus.in_port1, IN1_BIT_P1_SHOOT, pressed);
            }
            Key::J => set_input_bit(&mut self.bus.in_port2, IN2_BIT_P2_LEFT, pressed),
            Key::L => set_input_bit(&mut self.bus.in_port2, IN2_BIT_P2_RIGHT, pressed),
            Key::K => set_input_bit(&mut self.bus.in_port2, IN2_BIT_P2_SHOOT, pressed),
            Key::T if pressed => {
                set_input_bit(&mut self.bus.in_port2, IN2_BIT_TILT, true);
            }
            _ => {}
        }
    }

    /// The raw 1bpp framebuffer window (addresses 0x2400–0x3FFF).
    pub fn video_ram(&self) -> &[u8] {
        &self.bus.ram[VRAM_OFFSET..VRAM_OFFSET + VRAM_SIZE]
    }

    /// Current values of the sound output latches (OUT 3 and OUT 5).
    pub fn outputs(&self) -> (u8, u8) {
        (self.bus.out_port3, self.bus.out_port5)
    }

    pub fn cpu(&self) -> &Cpu8080 {
        &self.cpu
    }
}

impl Default for InvadersMachine {
    fn default() -> Self {
        Self::new()
    }
}

fn set_input_bit(port: &mut u8, bit: u8, pressed: bool) {
    let mask = 1 << bit;
    if pressed {
        *port |= mask;
    } else {
        *port &= !mask;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ram_is_mirrored_every_0x2000() {
        let mut bus = InvadersBus::default();
        bus.mem_write(0x2405, 0xaa);
        assert_eq!(bus.mem_read(0x2405), 0xaa);
        assert_eq!(bus.mem_read(0x4405), 0xaa, "same RAM byte via the mirror");
        bus.mem_write(0x6405, 0x55);
        assert_eq!(bus.mem_read(0x2405), 0x55);
    }

    #[test]
    fn rom_writes_are_silently_discarded() {
        let mut bus = InvadersBus::default();
        bus.rom[0x0123] = 0x42;
        bus.mem_write(0x0123, 0xff);
        assert_eq!(bus.mem_read(0x0123), 0x42);
    }

    #[test]
    fn oversized_rom_is_rejected() {
        let mut machine = InvadersMachine::new();
        let rom = vec![0u8; ROM_SIZE + 1];
        assert!(machine.load_rom(&rom).is_err());
        assert!(machine.load_rom(&rom[..ROM_SIZE]).is_ok());
    }

    #[test]
    fn shift_register_reads_through_the_offset() {
        let mut bus = InvadersBus::default();
        // Two writes fill the 16-bit register, newest byte on top.
        bus.io_write(4, 0xab);
        bus.io_write(4, 0xcd);
        assert_eq!(bus.io_read(3), 0xcd, "offset 0 reads the high byte");

        bus.io_write(2, 4);
        // Register is 0xCDAB; offset 4 selects bits 11..4.
        assert_eq!(bus.io_read(3), 0xda);

        bus.io_write(2, 0xff);
        assert_eq!(bus.io_read(3), (0xcdabu16 >> 1) as u8, "offset masked to 3 bits");
    }

    #[test]
    fn dip_switches_encode_into_port_2() {
        let machine = InvadersMachine::with_dip_config(DipConfig {
            ships_per_credit: 5,
            show_coin_info: false,
        });
        let port2 = machine.bus.in_port2;
        assert_eq!(port2 & IN2_MASK_SHIPS_PER_CREDIT, 2, "ships encoded as value - 3");
        assert_ne!(port2 & (1 << IN2_BIT_COIN_INFO), 0, "bit 7 hides coin info");

        let machine = InvadersMachine::new();
        assert_eq!(machine.bus.in_port2 & IN2_MASK_SHIPS_PER_CREDIT, 0);
        assert_eq!(machine.bus.in_port2 & (1 << IN2_BIT_COIN_INFO), 0);
    }

    #[test]
    fn key_presses_set_and_clear_input_bits() {
        let mut machine = InvadersMachine::new();
        assert_ne!(machine.bus.in_port1 & (1 << IN1_BIT_ALWAYS_ONE), 0);

        machine.handle_key(Key::C, true);
        assert_ne!(machine.bus.in_port1 & (1 << IN1_BIT_COIN), 0);
        machine.handle_key(Key::C, false);
        assert_eq!(machine.bus.in_port1 & (1 << IN1_BIT_COIN), 0);

        // Tilt latches on press and ignores release.
        machine.handle_key(Key::T, true);
        machine.handle_key(Key::T, false);
        assert_ne!(machine.bus.in_port2 & (1 << IN2_BIT_TILT), 0);
    }

    #[test]
    fn frame_interrupts_reach_an_idle_cpu() {
        let mut machine = InvadersMachine::new();
        // EI; HLT. The halted CPU waits for the mid-frame interrupt, runs
        // NOPs from ROM, then takes the vblank interrupt ending the frame.
        machine.load_rom(&[0xfb, 0x76]).unwrap();
        machine.step_frame();
        assert_eq!(machine.cpu.pc, VBLANK_VECTOR);
        assert!(machine.cpu.interrupts_enabled, "latch survives delivery");
    }

    #[test]
    fn frame_ends_early_when_the_cpu_hard_stops() {
        let mut machine = InvadersMachine::new();
        // DI; HLT: nothing can wake the CPU, so step_frame must return.
        machine.load_rom(&[0xf3, 0x76]).unwrap();
        machine.step_frame();
        assert_eq!(machine.cpu.pc, 0x0002);
    }

    #[test]
    fn video_ram_window_tracks_writes() {
        let mut machine = InvadersMachine::new();
        machine.bus.mem_write(0x2400, 0x01);
        machine.bus.mem_write(0x3fff, 0x80);
        let vram = machine.video_ram();
        assert_eq!(vram.len(), VRAM_SIZE);
        assert_eq!(vram[0], 0x01);
        assert_eq!(vram[VRAM_SIZE - 1], 0x80);
    }
}
