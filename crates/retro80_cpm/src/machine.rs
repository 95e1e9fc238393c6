use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{ensure, Result};
use log::{debug, info};
use retro80_core::cpu::{Bus8080, Cpu8080};

use crate::console::{Console, StdConsole};

const MEMORY_SIZE: usize = 0x10000;
/// CP/M transient programs load at 0x0100.
const LOAD_ADDR: u16 = 0x0100;
/// Largest program that fits between the load address and top of memory.
const MAX_PROGRAM_SIZE: usize = 0xffff - LOAD_ADDR as usize;
/// The BDOS entry point; CALL 5 with a function number in C.
const BDOS_ENTRY: u16 = 0x0005;

/// Minimal BIOS image at page zero.
///
/// BOOT at 0x0000 is HLT so a warm boot exits the emulator; 0x0005 is
/// CONST (`IN 3; RET`), 0x0008 is CONIN (`IN 2; RET`) and 0x000B is
/// CONOUT (`PUSH PSW; MOV A,C; OUT 2; POP PSW; RET`). The rest of page
/// zero is filled with RET so stray calls return immediately.
const BIOS_STUB: [u8; 17] = [
    0x76, 0x00, 0x01, 0x00, 0x00, // BOOT: HLT
    0xdb, 0x03, 0xc9, // CONST: IN 3; RET
    0xdb, 0x02, 0xc9, // CONIN: IN 2; RET
    0xf5, 0x79, 0xd3, 0x02, 0xf1, 0xc9, // CONOUT: PUSH PSW; MOV A,C; OUT 2; POP PSW; RET
];

/// Flat 64 KiB memory plus the console port protocol: OUT 2 writes a
/// character, IN 2 blocks for one and IN 3 reports "character ready".
struct CpmBus<C: Console> {
    memory: Box<[u8; MEMORY_SIZE]>,
    console: C,
}

impl<C: Console> Bus8080 for CpmBus<C> {
    fn mem_read(&mut self, addr: u16) -> u8 {
        self.memory[addr as usize]
    }

    fn mem_write(&mut self, addr: u16, value: u8) {
        self.memory[addr as usize] = value;
    }

    fn io_read(&mut self, port: u8) -> u8 {
        match port {
            2 => self.console.read_char(),
            3 => 0xff,
            _ => 0x00,
        }
    }

    fn io_write(&mut self, port: u8, value: u8) {
        if port == 2 {
            self.console.write_char(value);
        }
    }
}

/// Cooperative stop request checked between instructions.
///
/// An in-flight instruction always completes before the check; there is
/// no rollback.
#[derive(Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// The CP/M console machine: 8080 CPU, flat memory seeded with the BIOS
/// stub and a transient program, and a console device.
pub struct CpmMachine<C: Console> {
    cpu: Cpu8080,
    bus: CpmBus<C>,
    abort: AbortHandle,
}

impl CpmMachine<StdConsole> {
    /// Build a machine running `program` against the process console.
    pub fn new(program: &[u8]) -> Result<Self> {
        Self::with_console(program, StdConsole)
    }
}

impl<C: Console> CpmMachine<C> {
    pub fn with_console(program: &[u8], console: C) -> Result<Self> {
        ensure!(
            program.len() <= MAX_PROGRAM_SIZE,
            "program is {} bytes but at most {MAX_PROGRAM_SIZE} fit above {LOAD_ADDR:#06x}",
            program.len()
        );

        let mut memory = Box::new([0u8; MEMORY_SIZE]);
        memory[..BIOS_STUB.len()].copy_from_slice(&BIOS_STUB);
        // RET fill: stray calls into page zero return immediately.
        memory[BIOS_STUB.len()..LOAD_ADDR as usize].fill(0xc9);
        memory[LOAD_ADDR as usize..LOAD_ADDR as usize + program.len()].copy_from_slice(program);

        let mut cpu = Cpu8080::new();
        cpu.pc = LOAD_ADDR;

        Ok(Self {
            cpu,
            bus: CpmBus { memory, console },
            abort: AbortHandle::default(),
        })
    }

    pub fn cpu(&self) -> &Cpu8080 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu8080 {
        &mut self.cpu
    }

    /// Handle for requesting an abort from another thread.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Run until the CPU halts or an abort is requested.
    ///
    /// May be invoked again after a halt if the host clears the CPU's
    /// halted latch.
    pub fn run(&mut self) -> Result<()> {
        info!("running CP/M program loaded at {LOAD_ADDR:#06x}");
        while !self.abort.0.load(Ordering::Relaxed) {
            if self.cpu.halted {
                break;
            }
            if self.cpu.pc == BDOS_ENTRY && self.service_bdos() {
                continue;
            }
            if self.cpu.step(&mut self.bus) == 0 {
                break;
            }
        }
        Ok(())
    }

    /// Service the classic BDOS console functions directly off the
    /// register file, selected by C. Serviced calls behave as RET.
    /// Returns false for functions we leave to the BIOS stub at 0x0005,
    /// which yields A = 0xFF (CONST).
    fn service_bdos(&mut self) -> bool {
        match self.cpu.c {
            0 => {
                // System reset: a warm boot terminates the session.
                info!("BDOS system reset, halting");
                self.cpu.halted = true;
            }
            1 => {
                let ch = self.bus.console.read_char();
                self.cpu.a = ch;
                self.cpu.l = ch;
                self.ret();
            }
            2 => {
                self.bus.console.write_char(self.cpu.e);
                self.ret();
            }
            9 => {
                let mut addr = self.cpu.de();
                loop {
                    let ch = self.bus.mem_read(addr);
                    if ch == b'$' {
                        break;
                    }
                    self.bus.console.write_char(ch);
                    addr = addr.wrapping_add(1);
                }
                self.ret();
            }
            11 => {
                // Console status: always ready, matching CONST.
                self.cpu.a = 0xff;
                self.ret();
            }
            other => {
                debug!("BDOS function {other} not serviced, falling through to the stub");
                return false;
            }
        }
        true
    }

    /// Pop the return address pushed by the CALL 5 that got us here.
    fn ret(&mut self) {
        let lo = self.bus.mem_read(self.cpu.sp) as u16;
        let hi = self.bus.mem_read(self.cpu.sp.wrapping_add(1)) as u16;
        self.cpu.sp = self.cpu.sp.wrapping_add(2);
        self.cpu.pc = (hi << 8) | lo;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct ScriptedConsole {
        input: VecDeque<u8>,
        output: Vec<u8>,
    }

    impl Console for ScriptedConsole {
        fn read_char(&mut self) -> u8 {
            self.input.pop_front().unwrap_or(0x1a)
        }

        fn write_char(&mut self, ch: u8) {
            self.output.push(ch);
        }
    }

    fn machine(program: &[u8]) -> CpmMachine<ScriptedConsole> {
        CpmMachine::with_console(program, ScriptedConsole::default()).unwrap()
    }

    #[test]
    fn memory_image_has_the_bios_stub_and_ret_fill() {
        let m = machine(&[0x76]);
        assert_eq!(&m.bus.memory[..BIOS_STUB.len()], &BIOS_STUB);
        assert!(
            m.bus.memory[BIOS_STUB.len()..0x0100].iter().all(|&b| b == 0xc9),
            "page zero is RET-filled after the stub"
        );
        assert_eq!(m.bus.memory[0x0100], 0x76);
        assert_eq!(m.cpu.pc, 0x0100);
    }

    #[test]
    fn oversized_program_is_rejected() {
        let too_big = vec![0u8; MAX_PROGRAM_SIZE + 1];
        assert!(CpmMachine::with_console(&too_big, ScriptedConsole::default()).is_err());
        let just_fits = vec![0u8; MAX_PROGRAM_SIZE];
        assert!(CpmMachine::with_console(&just_fits, ScriptedConsole::default()).is_ok());
    }

    #[test]
    fn conout_port_writes_through_the_console() {
        // MVI A,'A'; OUT 2; HLT
        let mut m = machine(&[0x3e, b'A', 0xd3, 0x02, 0x76]);
        m.run().unwrap();
        assert_eq!(m.bus.console.output, b"A");
    }

    #[test]
    fn const_port_always_reports_ready() {
        // IN 3; HLT
        let mut m = machine(&[0xdb, 0x03, 0x76]);
        m.run().unwrap();
        assert_eq!(m.cpu.a, 0xff);
    }

    #[test]
    fn bdos_print_string_stops_at_the_dollar() {
        // LXI D,0x0109; MVI C,9; CALL 5; HLT; "HI$"
        let mut m = machine(&[
            0x11, 0x09, 0x01, // LXI D,msg
            0x0e, 0x09, // MVI C,9
            0xcd, 0x05, 0x00, // CALL 5
            0x76, // HLT
            b'H', b'I', b'$',
        ]);
        m.run().unwrap();
        assert_eq!(m.bus.console.output, b"HI");
        assert!(m.cpu.halted);
    }

    #[test]
    fn bdos_console_output_writes_e() {
        // MVI C,2; MVI E,'Z'; CALL 5; HLT
        let mut m = machine(&[0x0e, 0x02, 0x1e, b'Z', 0xcd, 0x05, 0x00, 0x76]);
        m.run().unwrap();
        assert_eq!(m.bus.console.output, b"Z");
    }

    #[test]
    fn bdos_console_input_blocks_and_returns_in_a_and_l() {
        // MVI C,1; CALL 5; HLT
        let mut m = machine(&[0x0e, 0x01, 0xcd, 0x05, 0x00, 0x76]);
        m.bus.console.input.push_back(b'x');
        m.run().unwrap();
        assert_eq!(m.cpu.a, b'x');
        assert_eq!(m.cpu.l, b'x');
    }

    #[test]
    fn bdos_system_reset_halts_the_machine() {
        // MVI C,0; CALL 5; (never reached) MVI A,0xEE
        let mut m = machine(&[0x0e, 0x00, 0xcd, 0x05, 0x00, 0x3e, 0xee]);
        m.run().unwrap();
        assert!(m.cpu.halted);
        assert_ne!(m.cpu.a, 0xee);
        assert!(m.bus.console.output.is_empty());
    }

    #[test]
    fn unknown_bdos_function_falls_through_to_the_stub() {
        // MVI C,0x20; CALL 5; HLT — the stub's CONST path leaves 0xFF in A.
        let mut m = machine(&[0x0e, 0x20, 0xcd, 0x05, 0x00, 0x76]);
        m.run().unwrap();
        assert_eq!(m.cpu.a, 0xff);
        assert!(m.cpu.halted);
    }

    #[test]
    fn bdos_console_status_reports_ready() {
        // MVI C,11; CALL 5; HLT
        let mut m = machine(&[0x0e, 0x0b, 0xcd, 0x05, 0x00, 0x76]);
        m.run().unwrap();
        assert_eq!(m.cpu.a, 0xff);
    }

    #[test]
    fn warm_boot_through_the_boot_vector_halts() {
        // JMP 0 lands on the BOOT HLT.
        let mut m = machine(&[0xc3, 0x00, 0x00]);
        m.run().unwrap();
        assert!(m.cpu.halted);
        assert_eq!(m.cpu.pc, 0x0001);
    }

    #[test]
    fn abort_handle_stops_the_run_loop() {
        // JMP 0x0100: an infinite loop only the abort can break.
        let mut m = machine(&[0xc3, 0x00, 0x01]);
        m.abort_handle().abort();
        m.run().unwrap();
        assert!(!m.cpu.halted);
    }
}
