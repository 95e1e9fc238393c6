use crate::opcode::{self, Op};

/// Bus interface for an Intel 8080-compatible CPU core.
///
/// The CPU uses this trait to access memory and IO ports without knowing
/// anything about the concrete machine. The `mem_*` half is the memory bus,
/// the `io_*` half is the port dispatcher; both are total over their
/// address/port ranges by contract.
pub trait Bus8080 {
    fn mem_read(&mut self, addr: u16) -> u8;
    fn mem_write(&mut self, addr: u16, value: u8);

    fn io_read(&mut self, port: u8) -> u8;
    fn io_write(&mut self, port: u8, value: u8);
}

/// CPU flags for the Intel 8080.
///
/// Auxiliary carry is carried as a field so that PUSH PSW / POP PSW
/// round-trip bit 4, but no ALU operation updates it; decimal adjust is
/// likewise unimplemented. Both are deliberate, documented gaps.
#[derive(Default, Clone, Copy)]
pub struct Flags {
    pub z: bool,  // zero
    pub s: bool,  // sign
    pub p: bool,  // parity
    pub cy: bool, // carry
    pub ac: bool, // auxiliary carry (stored, never computed)
}

impl Flags {
    /// Pack into the 8080 flag-register layout `S Z 0 A 0 P 1 C`.
    pub fn to_u8(self) -> u8 {
        let mut f = 0u8;
        if self.s {
            f |= 0x80;
        }
        if self.z {
            f |= 0x40;
        }
        if self.ac {
            f |= 0x10;
        }
        if self.p {
            f |= 0x04;
        }
        // Bit 1 is always set; bits 3 and 5 are always clear.
        f |= 0x02;
        if self.cy {
            f |= 0x01;
        }
        f
    }

    pub fn from_u8(&mut self, v: u8) {
        self.s = (v & 0x80) != 0;
        self.z = (v & 0x40) != 0;
        self.ac = (v & 0x10) != 0;
        self.p = (v & 0x04) != 0;
        self.cy = (v & 0x01) != 0;
    }
}

/// Intel 8080 CPU state and executor.
///
/// Registers are public so hosts and tests can inspect and seed them
/// directly; the BC/DE/HL pair accessors are pure projections of their
/// 8-bit halves with no independent storage.
#[derive(Default)]
pub struct Cpu8080 {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
    pub flags: Flags,
    pub interrupts_enabled: bool,
    pub halted: bool,
}

impl Cpu8080 {
    /// Create a new CPU instance in reset state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all registers to their power-on values.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn bc(&self) -> u16 {
        u16::from_be_bytes([self.b, self.c])
    }

    pub fn set_bc(&mut self, value: u16) {
        [self.b, self.c] = value.to_be_bytes();
    }

    pub fn de(&self) -> u16 {
        u16::from_be_bytes([self.d, self.e])
    }

    pub fn set_de(&mut self, value: u16) {
        [self.d, self.e] = value.to_be_bytes();
    }

    pub fn hl(&self) -> u16 {
        u16::from_be_bytes([self.h, self.l])
    }

    pub fn set_hl(&mut self, value: u16) {
        [self.h, self.l] = value.to_be_bytes();
    }

    fn fetch_byte<B: Bus8080>(&mut self, bus: &mut B) -> u8 {
        let b = bus.mem_read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        b
    }

    fn fetch_word<B: Bus8080>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch_byte(bus) as u16;
        let hi = self.fetch_byte(bus) as u16;
        (hi << 8) | lo
    }

    /// Read the register (or M, the byte at HL) selected by a 3-bit field.
    fn read_operand<B: Bus8080>(&mut self, bus: &mut B, index: u8) -> u8 {
        match index {
            0 => self.b,
            1 => self.c,
            2 => self.d,
            3 => self.e,
            4 => self.h,
            5 => self.l,
            6 => bus.mem_read(self.hl()),
            7 => self.a,
            _ => unreachable!("invalid register index {index}"),
        }
    }

    /// Write the register (or M) selected by a 3-bit field.
    fn write_operand<B: Bus8080>(&mut self, bus: &mut B, index: u8, value: u8) {
        match index {
            0 => self.b = value,
            1 => self.c = value,
            2 => self.d = value,
            3 => self.e = value,
            4 => self.h = value,
            5 => self.l = value,
            6 => bus.mem_write(self.hl(), value),
            7 => self.a = value,
            _ => unreachable!("invalid register index {index}"),
        }
    }

    /// Read the 16-bit pair selected by a 2-bit field (BC, DE, HL, SP).
    fn read_pair(&self, index: u8) -> u16 {
        match index {
            0 => self.bc(),
            1 => self.de(),
            2 => self.hl(),
            3 => self.sp,
            _ => unreachable!("invalid pair index {index}"),
        }
    }

    fn write_pair(&mut self, index: u8, value: u16) {
        match index {
            0 => self.set_bc(value),
            1 => self.set_de(value),
            2 => self.set_hl(value),
            3 => self.sp = value,
            _ => unreachable!("invalid pair index {index}"),
        }
    }

    /// Evaluate the condition selected by a 3-bit field: NZ, Z, NC, C,
    /// PO, PE, P, M.
    fn condition(&self, index: u8) -> bool {
        match index {
            0 => !self.flags.z,
            1 => self.flags.z,
            2 => !self.flags.cy,
            3 => self.flags.cy,
            4 => !self.flags.p,
            5 => self.flags.p,
            6 => !self.flags.s,
            7 => self.flags.s,
            _ => unreachable!("invalid condition index {index}"),
        }
    }

    fn set_szp(&mut self, value: u8) {
        self.flags.z = value == 0;
        self.flags.s = (value & 0x80) != 0;
        self.flags.p = value.count_ones() % 2 == 0;
    }

    fn add(&mut self, value: u8) {
        let a = self.a;
        let res = a.wrapping_add(value);
        self.flags.cy = (a as u16 + value as u16) > 0xff;
        self.set_szp(res);
        self.a = res;
    }

    fn adc(&mut self, value: u8) {
        let carry = u8::from(self.flags.cy);
        let a = self.a;
        let res = a.wrapping_add(value).wrapping_add(carry);
        self.flags.cy = (a as u16) + (value as u16) + (carry as u16) > 0xff;
        self.set_szp(res);
        self.a = res;
    }

    fn sub(&mut self, value: u8) {
        let a = self.a;
        let res = a.wrapping_sub(value);
        // Borrow is decided by comparing the operand to A before the
        // subtraction, matching real 8080 semantics.
        self.flags.cy = a < value;
        self.set_szp(res);
        self.a = res;
    }

    fn sbb(&mut self, value: u8) {
        let carry = u8::from(self.flags.cy);
        let a = self.a;
        let res = a.wrapping_sub(value).wrapping_sub(carry);
        self.flags.cy = (a as u16) < (value as u16) + (carry as u16);
        self.set_szp(res);
        self.a = res;
    }

    fn ana(&mut self, value: u8) {
        let res = self.a & value;
        self.flags.cy = false;
        self.set_szp(res);
        self.a = res;
    }

    fn xra(&mut self, value: u8) {
        let res = self.a ^ value;
        self.flags.cy = false;
        self.set_szp(res);
        self.a = res;
    }

    fn ora(&mut self, value: u8) {
        let res = self.a | value;
        self.flags.cy = false;
        self.set_szp(res);
        self.a = res;
    }

    fn cmp(&mut self, value: u8) {
        let a = self.a;
        let res = a.wrapping_sub(value);
        self.flags.cy = a < value;
        self.set_szp(res);
    }

    fn inr(&mut self, value: u8) -> u8 {
        let r = value.wrapping_add(1);
        // Carry flag is not affected by INR.
        self.set_szp(r);
        r
    }

    fn dcr(&mut self, value: u8) -> u8 {
        let r = value.wrapping_sub(1);
        // Carry flag is not affected by DCR.
        self.set_szp(r);
        r
    }

    fn dad(&mut self, value: u16) {
        let res = (self.hl() as u32).wrapping_add(value as u32);
        self.flags.cy = res > 0xffff;
        self.set_hl(res as u16);
    }

    fn push<B: Bus8080>(&mut self, bus: &mut B, value: u16) {
        self.sp = self.sp.wrapping_sub(2);
        bus.mem_write(self.sp, value as u8);
        bus.mem_write(self.sp.wrapping_add(1), (value >> 8) as u8);
    }

    fn pop<B: Bus8080>(&mut self, bus: &mut B) -> u16 {
        let lo = bus.mem_read(self.sp) as u16;
        let hi = bus.mem_read(self.sp.wrapping_add(1)) as u16;
        self.sp = self.sp.wrapping_add(2);
        (hi << 8) | lo
    }

    /// Execute a single instruction and return its cycle cost.
    ///
    /// The cost comes from the opcode table and does not depend on branch
    /// outcome. A halted CPU performs no work and returns 0; run loops
    /// treat a 0-cycle step as the stop condition.
    pub fn step<B: Bus8080>(&mut self, bus: &mut B) -> u32 {
        if self.halted {
            return 0;
        }

        let byte = self.fetch_byte(bus);
        let decoded = opcode::decode(byte);

        match decoded.op {
            Op::Nop => {}

            Op::Lxi => {
                let value = self.fetch_word(bus);
                self.write_pair((byte >> 4) & 0x03, value);
            }
            Op::Stax => {
                let addr = self.read_pair((byte >> 4) & 0x01);
                bus.mem_write(addr, self.a);
            }
            Op::Ldax => {
                let addr = self.read_pair((byte >> 4) & 0x01);
                self.a = bus.mem_read(addr);
            }
            Op::Sta => {
                let addr = self.fetch_word(bus);
                bus.mem_write(addr, self.a);
            }
            Op::Lda => {
                let addr = self.fetch_word(bus);
                self.a = bus.mem_read(addr);
            }
            Op::Shld => {
                let addr = self.fetch_word(bus);
                bus.mem_write(addr, self.l);
                bus.mem_write(addr.wrapping_add(1), self.h);
            }
            Op::Lhld => {
                let addr = self.fetch_word(bus);
                self.l = bus.mem_read(addr);
                self.h = bus.mem_read(addr.wrapping_add(1));
            }

            Op::Mov => {
                let value = self.read_operand(bus, byte & 0x07);
                self.write_operand(bus, (byte >> 3) & 0x07, value);
            }
            Op::Mvi => {
                let value = self.fetch_byte(bus);
                self.write_operand(bus, (byte >> 3) & 0x07, value);
            }

            Op::Inx => {
                let index = (byte >> 4) & 0x03;
                self.write_pair(index, self.read_pair(index).wrapping_add(1));
            }
            Op::Dcx => {
                let index = (byte >> 4) & 0x03;
                self.write_pair(index, self.read_pair(index).wrapping_sub(1));
            }
            Op::Inr => {
                let index = (byte >> 3) & 0x07;
                let value = self.read_operand(bus, index);
                let result = self.inr(value);
                self.write_operand(bus, index, result);
            }
            Op::Dcr => {
                let index = (byte >> 3) & 0x07;
                let value = self.read_operand(bus, index);
                let result = self.dcr(value);
                self.write_operand(bus, index, result);
            }
            Op::Dad => {
                let value = self.read_pair((byte >> 4) & 0x03);
                self.dad(value);
            }

            Op::Add => {
                let value = self.read_operand(bus, byte & 0x07);
                self.add(value);
            }
            Op::Adc => {
                let value = self.read_operand(bus, byte & 0x07);
                self.adc(value);
            }
            Op::Sub => {
                let value = self.read_operand(bus, byte & 0x07);
                self.sub(value);
            }
            Op::Sbb => {
                let value = self.read_operand(bus, byte & 0x07);
                self.sbb(value);
            }
            Op::Ana => {
                let value = self.read_operand(bus, byte & 0x07);
                self.ana(value);
            }
            Op::Xra => {
                let value = self.read_operand(bus, byte & 0x07);
                self.xra(value);
            }
            Op::Ora => {
                let value = self.read_operand(bus, byte & 0x07);
                self.ora(value);
            }
            Op::Cmp => {
                let value = self.read_operand(bus, byte & 0x07);
                self.cmp(value);
            }

            Op::Adi => {
                let value = self.fetch_byte(bus);
                self.add(value);
            }
            Op::Aci => {
                let value = self.fetch_byte(bus);
                self.adc(value);
            }
            Op::Sui => {
                let value = self.fetch_byte(bus);
                self.sub(value);
            }
            Op::Sbi => {
                let value = self.fetch_byte(bus);
                self.sbb(value);
            }
            Op::Ani => {
                let value = self.fetch_byte(bus);
                self.ana(value);
            }
            Op::Xri => {
                let value = self.fetch_byte(bus);
                self.xra(value);
            }
            Op::Ori => {
                let value = self.fetch_byte(bus);
                self.ora(value);
            }
            Op::Cpi => {
                let value = self.fetch_byte(bus);
                self.cmp(value);
            }

            Op::Rlc => {
                let bit7 = (self.a & 0x80) != 0;
                self.a = (self.a << 1) | u8::from(bit7);
                self.flags.cy = bit7;
            }
            Op::Rrc => {
                let bit0 = (self.a & 0x01) != 0;
                self.a = (self.a >> 1) | if bit0 { 0x80 } else { 0 };
                self.flags.cy = bit0;
            }
            Op::Ral => {
                let bit7 = (self.a & 0x80) != 0;
                self.a = (self.a << 1) | u8::from(self.flags.cy);
                self.flags.cy = bit7;
            }
            Op::Rar => {
                let bit0 = (self.a & 0x01) != 0;
                self.a = (self.a >> 1) | if self.flags.cy { 0x80 } else { 0 };
                self.flags.cy = bit0;
            }

            // Decimal adjust is unimplemented and executes as a NOP; the
            // core does not track nibble carries at all.
            Op::Daa => {}
            Op::Cma => {
                self.a = !self.a;
            }
            Op::Stc => {
                self.flags.cy = true;
            }
            Op::Cmc => {
                self.flags.cy = !self.flags.cy;
            }

            Op::Jmp => {
                self.pc = self.fetch_word(bus);
            }
            Op::Jnz | Op::Jz | Op::Jnc | Op::Jc | Op::Jpo | Op::Jpe | Op::Jp | Op::Jm => {
                let addr = self.fetch_word(bus);
                if self.condition((byte >> 3) & 0x07) {
                    self.pc = addr;
                }
            }
            Op::Call => {
                let addr = self.fetch_word(bus);
                self.push(bus, self.pc);
                self.pc = addr;
            }
            Op::Cnz | Op::Cz | Op::Cnc | Op::Cc | Op::Cpo | Op::Cpe | Op::Cp | Op::Cm => {
                let addr = self.fetch_word(bus);
                if self.condition((byte >> 3) & 0x07) {
                    self.push(bus, self.pc);
                    self.pc = addr;
                }
            }
            Op::Ret => {
                self.pc = self.pop(bus);
            }
            Op::Rnz | Op::Rz | Op::Rnc | Op::Rc | Op::Rpo | Op::Rpe | Op::Rp | Op::Rm => {
                if self.condition((byte >> 3) & 0x07) {
                    self.pc = self.pop(bus);
                }
            }
            Op::Rst => {
                self.push(bus, self.pc);
                self.pc = opcode::rst_vector(byte);
            }
            Op::Pchl => {
                self.pc = self.hl();
            }

            Op::Push => {
                let value = match (byte >> 4) & 0x03 {
                    3 => ((self.a as u16) << 8) | self.flags.to_u8() as u16,
                    index => self.read_pair(index),
                };
                self.push(bus, value);
            }
            Op::Pop => {
                let value = self.pop(bus);
                match (byte >> 4) & 0x03 {
                    3 => {
                        self.a = (value >> 8) as u8;
                        self.flags.from_u8(value as u8);
                    }
                    index => self.write_pair(index, value),
                }
            }
            Op::Xthl => {
                let lo = bus.mem_read(self.sp);
                let hi = bus.mem_read(self.sp.wrapping_add(1));
                bus.mem_write(self.sp, self.l);
                bus.mem_write(self.sp.wrapping_add(1), self.h);
                self.l = lo;
                self.h = hi;
            }
            Op::Sphl => {
                self.sp = self.hl();
            }
            Op::Xchg => {
                core::mem::swap(&mut self.d, &mut self.h);
                core::mem::swap(&mut self.e, &mut self.l);
            }

            Op::In => {
                let port = self.fetch_byte(bus);
                self.a = bus.io_read(port);
            }
            Op::Out => {
                let port = self.fetch_byte(bus);
                bus.io_write(port, self.a);
            }

            Op::Ei => {
                self.interrupts_enabled = true;
            }
            Op::Di => {
                self.interrupts_enabled = false;
            }
            Op::Hlt => {
                self.halted = true;
            }
        }

        decoded.cycles
    }

    /// Deliver a forced interrupt, behaving like a hardware RST to `vector`.
    ///
    /// Returns whether the interrupt was taken. The current PC is pushed as
    /// the return address and a halted CPU resumes. The enable latch is
    /// left set on entry: the reference machine runs its handlers with
    /// interrupts still enabled, a deviation from real 8080 hardware that
    /// the Space Invaders ROM tolerates.
    pub fn interrupt<B: Bus8080>(&mut self, bus: &mut B, vector: u16) -> bool {
        if !self.interrupts_enabled {
            return false;
        }
        self.halted = false;
        self.push(bus, self.pc);
        self.pc = vector;
        true
    }
}
