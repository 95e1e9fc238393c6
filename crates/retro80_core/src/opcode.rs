//! Total decode table for the Intel 8080 instruction set.
//!
//! Every byte 0x00–0xFF maps to a symbolic operation with a fixed encoded
//! length (opcode plus 0–2 operand bytes) and a fixed cycle cost. Cycle
//! costs do not depend on whether a conditional branch fires; conditional
//! calls and returns are costed at their taken-path values.

/// Symbolic operation selected by an opcode byte.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Op {
    Nop,
    Lxi,
    Stax,
    Inx,
    Inr,
    Dcr,
    Mvi,
    Rlc,
    Dad,
    Ldax,
    Dcx,
    Rrc,
    Ral,
    Rar,
    Shld,
    Daa,
    Lhld,
    Cma,
    Sta,
    Stc,
    Lda,
    Cmc,
    Mov,
    Hlt,
    Add,
    Adc,
    Sub,
    Sbb,
    Ana,
    Xra,
    Ora,
    Cmp,
    Rnz,
    Pop,
    Jnz,
    Jmp,
    Cnz,
    Push,
    Adi,
    Rst,
    Rz,
    Ret,
    Jz,
    Cz,
    Call,
    Aci,
    Rnc,
    Jnc,
    Out,
    Cnc,
    Sui,
    Rc,
    Jc,
    In,
    Cc,
    Sbi,
    Rpo,
    Jpo,
    Xthl,
    Cpo,
    Ani,
    Rpe,
    Pchl,
    Jpe,
    Xchg,
    Cpe,
    Xri,
    Rp,
    Jp,
    Di,
    Cp,
    Ori,
    Rm,
    Sphl,
    Jm,
    Ei,
    Cm,
    Cpi,
}

/// A decoded opcode: the operation, its encoded length in bytes (1–3) and
/// its fixed cycle cost.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Opcode {
    pub op: Op,
    pub length: u8,
    pub cycles: u32,
}

const fn opcode(op: Op, length: u8, cycles: u32) -> Opcode {
    Opcode { op, length, cycles }
}

/// Extract the target vector encoded in an RST opcode.
pub fn rst_vector(byte: u8) -> u16 {
    u16::from(byte & 0x38)
}

/// Decode a single opcode byte. Total over all 256 values.
///
/// Undefined opcodes are collapsed onto real operations the way the
/// reference hardware treats them: 0x08/0x10/0x18/0x20/0x28/0x30/0x38 act
/// as NOP, 0xCB as JMP, 0xD9 as RET and 0xDD/0xED/0xFD as CALL.
pub fn decode(byte: u8) -> Opcode {
    match byte {
        // 0x00–0x3F: moves, pair arithmetic, rotates, absolute load/store.
        0x00 | 0x08 | 0x10 | 0x18 | 0x20 | 0x28 | 0x30 | 0x38 => opcode(Op::Nop, 1, 4),
        0x01 | 0x11 | 0x21 | 0x31 => opcode(Op::Lxi, 3, 10),
        0x02 | 0x12 => opcode(Op::Stax, 1, 7),
        0x03 | 0x13 | 0x23 | 0x33 => opcode(Op::Inx, 1, 5),
        0x04 | 0x0c | 0x14 | 0x1c | 0x24 | 0x2c | 0x3c => opcode(Op::Inr, 1, 5),
        0x34 => opcode(Op::Inr, 1, 10),
        0x05 | 0x0d | 0x15 | 0x1d | 0x25 | 0x2d | 0x3d => opcode(Op::Dcr, 1, 5),
        0x35 => opcode(Op::Dcr, 1, 10),
        0x06 | 0x0e | 0x16 | 0x1e | 0x26 | 0x2e | 0x3e => opcode(Op::Mvi, 2, 7),
        0x36 => opcode(Op::Mvi, 2, 10),
        0x07 => opcode(Op::Rlc, 1, 4),
        0x09 | 0x19 | 0x29 | 0x39 => opcode(Op::Dad, 1, 10),
        0x0a | 0x1a => opcode(Op::Ldax, 1, 7),
        0x0b | 0x1b | 0x2b | 0x3b => opcode(Op::Dcx, 1, 5),
        0x0f => opcode(Op::Rrc, 1, 4),
        0x17 => opcode(Op::Ral, 1, 4),
        0x1f => opcode(Op::Rar, 1, 4),
        0x22 => opcode(Op::Shld, 3, 16),
        0x27 => opcode(Op::Daa, 1, 4),
        0x2a => opcode(Op::Lhld, 3, 16),
        0x2f => opcode(Op::Cma, 1, 4),
        0x32 => opcode(Op::Sta, 3, 13),
        0x37 => opcode(Op::Stc, 1, 4),
        0x3a => opcode(Op::Lda, 3, 13),
        0x3f => opcode(Op::Cmc, 1, 4),

        // 0x40–0x7F: MOV block, with HLT in the hole at 0x76.
        0x76 => opcode(Op::Hlt, 1, 7),
        0x40..=0x7f => opcode(Op::Mov, 1, mov_cycles(byte)),

        // 0x80–0xBF: register-operand ALU block.
        0x80..=0x87 => opcode(Op::Add, 1, alu_cycles(byte)),
        0x88..=0x8f => opcode(Op::Adc, 1, alu_cycles(byte)),
        0x90..=0x97 => opcode(Op::Sub, 1, alu_cycles(byte)),
        0x98..=0x9f => opcode(Op::Sbb, 1, alu_cycles(byte)),
        0xa0..=0xa7 => opcode(Op::Ana, 1, alu_cycles(byte)),
        0xa8..=0xaf => opcode(Op::Xra, 1, alu_cycles(byte)),
        0xb0..=0xb7 => opcode(Op::Ora, 1, alu_cycles(byte)),
        0xb8..=0xbf => opcode(Op::Cmp, 1, alu_cycles(byte)),

        // 0xC0–0xFF: stack, branches, immediates, IO and specials.
        0xc0 => opcode(Op::Rnz, 1, 11),
        0xc1 => opcode(Op::Pop, 1, 10),
        0xc2 => opcode(Op::Jnz, 3, 10),
        0xc3 | 0xcb => opcode(Op::Jmp, 3, 10),
        0xc4 => opcode(Op::Cnz, 3, 17),
        0xc5 => opcode(Op::Push, 1, 11),
        0xc6 => opcode(Op::Adi, 2, 7),
        0xc7 | 0xcf | 0xd7 | 0xdf | 0xe7 | 0xef | 0xf7 | 0xff => opcode(Op::Rst, 1, 11),
        0xc8 => opcode(Op::Rz, 1, 11),
        0xc9 | 0xd9 => opcode(Op::Ret, 1, 10),
        0xca => opcode(Op::Jz, 3, 10),
        0xcc => opcode(Op::Cz, 3, 17),
        0xcd | 0xdd | 0xed | 0xfd => opcode(Op::Call, 3, 17),
        0xce => opcode(Op::Aci, 2, 7),
        0xd0 => opcode(Op::Rnc, 1, 11),
        0xd1 => opcode(Op::Pop, 1, 10),
        0xd2 => opcode(Op::Jnc, 3, 10),
        0xd3 => opcode(Op::Out, 2, 10),
        0xd4 => opcode(Op::Cnc, 3, 17),
        0xd5 => opcode(Op::Push, 1, 11),
        0xd6 => opcode(Op::Sui, 2, 7),
        0xd8 => opcode(Op::Rc, 1, 11),
        0xda => opcode(Op::Jc, 3, 10),
        0xdb => opcode(Op::In, 2, 10),
        0xdc => opcode(Op::Cc, 3, 17),
        0xde => opcode(Op::Sbi, 2, 7),
        0xe0 => opcode(Op::Rpo, 1, 11),
        0xe1 => opcode(Op::Pop, 1, 10),
        0xe2 => opcode(Op::Jpo, 3, 10),
        0xe3 => opcode(Op::Xthl, 1, 18),
        0xe4 => opcode(Op::Cpo, 3, 17),
        0xe5 => opcode(Op::Push, 1, 11),
        0xe6 => opcode(Op::Ani, 2, 7),
        0xe8 => opcode(Op::Rpe, 1, 11),
        0xe9 => opcode(Op::Pchl, 1, 5),
        0xea => opcode(Op::Jpe, 3, 10),
        0xeb => opcode(Op::Xchg, 1, 4),
        0xec => opcode(Op::Cpe, 3, 17),
        0xee => opcode(Op::Xri, 2, 7),
        0xf0 => opcode(Op::Rp, 1, 11),
        0xf1 => opcode(Op::Pop, 1, 10),
        0xf2 => opcode(Op::Jp, 3, 10),
        0xf3 => opcode(Op::Di, 1, 4),
        0xf4 => opcode(Op::Cp, 3, 17),
        0xf5 => opcode(Op::Push, 1, 11),
        0xf6 => opcode(Op::Ori, 2, 7),
        0xf8 => opcode(Op::Rm, 1, 11),
        0xf9 => opcode(Op::Sphl, 1, 5),
        0xfa => opcode(Op::Jm, 3, 10),
        0xfb => opcode(Op::Ei, 1, 4),
        0xfc => opcode(Op::Cm, 3, 17),
        0xfe => opcode(Op::Cpi, 2, 7),
    }
}

/// MOV costs 5 cycles between registers, 7 when either side is M.
fn mov_cycles(byte: u8) -> u32 {
    let src = byte & 0x07;
    let dst = (byte >> 3) & 0x07;
    if src == 6 || dst == 6 {
        7
    } else {
        5
    }
}

/// Register-operand ALU ops cost 4 cycles, 7 for the M form.
fn alu_cycles(byte: u8) -> u32 {
    if byte & 0x07 == 6 {
        7
    } else {
        4
    }
}

#[cfg(test)]
mod tests {
    use super::{decode, rst_vector, Op};

    #[test]
    fn decode_is_total_with_sane_lengths() {
        for byte in 0..=0xffu8 {
            let op = decode(byte);
            assert!(
                (1..=3).contains(&op.length),
                "bad length for {byte:#04x}: {}",
                op.length
            );
            assert!(op.cycles >= 4, "bad cycles for {byte:#04x}: {}", op.cycles);
        }
    }

    #[test]
    fn undefined_opcodes_collapse_onto_real_operations() {
        for byte in [0x08u8, 0x10, 0x18, 0x20, 0x28, 0x30, 0x38] {
            assert_eq!(decode(byte).op, Op::Nop);
        }
        assert_eq!(decode(0xcb).op, Op::Jmp);
        assert_eq!(decode(0xd9).op, Op::Ret);
        for byte in [0xddu8, 0xed, 0xfd] {
            assert_eq!(decode(byte).op, Op::Call);
        }
    }

    #[test]
    fn lengths_match_the_classic_encoding() {
        assert_eq!(decode(0xc3).length, 3); // JMP a16
        assert_eq!(decode(0xcd).length, 3); // CALL a16
        assert_eq!(decode(0x3e).length, 2); // MVI A,d8
        assert_eq!(decode(0xdb).length, 2); // IN d8
        assert_eq!(decode(0x32).length, 3); // STA a16
        assert_eq!(decode(0x76).length, 1); // HLT
        assert_eq!(decode(0x40).length, 1); // MOV B,B
    }

    #[test]
    fn memory_forms_cost_more_than_register_forms() {
        assert_eq!(decode(0x80).cycles, 4); // ADD B
        assert_eq!(decode(0x86).cycles, 7); // ADD M
        assert_eq!(decode(0x41).cycles, 5); // MOV B,C
        assert_eq!(decode(0x46).cycles, 7); // MOV B,M
        assert_eq!(decode(0x70).cycles, 7); // MOV M,B
        assert_eq!(decode(0x04).cycles, 5); // INR B
        assert_eq!(decode(0x34).cycles, 10); // INR M
    }

    #[test]
    fn conditional_branches_share_the_unconditional_cost() {
        assert_eq!(decode(0xc2).cycles, decode(0xc3).cycles); // JNZ vs JMP
        assert_eq!(decode(0xc4).cycles, decode(0xcd).cycles); // CNZ vs CALL
        for byte in [0xc0u8, 0xc8, 0xd0, 0xd8, 0xe0, 0xe8, 0xf0, 0xf8] {
            assert_eq!(decode(byte).cycles, 11);
        }
    }

    #[test]
    fn rst_vectors_come_from_opcode_bits() {
        let opcodes = [0xc7u8, 0xcf, 0xd7, 0xdf, 0xe7, 0xef, 0xf7, 0xff];
        for (n, byte) in opcodes.into_iter().enumerate() {
            assert_eq!(decode(byte).op, Op::Rst);
            assert_eq!(rst_vector(byte), (n as u16) * 8);
        }
    }
}
