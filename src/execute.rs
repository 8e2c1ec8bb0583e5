//! Per-opcode execution. Each handler mutates the machine in place; PC has
//! already been advanced by [`crate::state::State::step`] before any of these
//! run, so every PC-relative offset here is added to the address of the
//! instruction *following* the one being executed.

use crate::bits::SignExtend;
use crate::instruction::{Instruction, Register::*};
use crate::instruction::Instruction::*;
use crate::state::memory::KeySource;
use crate::state::State;
use crate::trap_vector::TrapVector;
use std::io::{self, Read, Write};

/// Executes one decoded instruction against `state`.
///
/// Returns `Err` only for the two reserved opcodes (RTI, RES); the ISA
/// leaves their behavior unspecified for well-formed programs, and this
/// emulator treats dispatching either as a fatal condition rather than
/// silently falling through to a neighboring handler.
pub fn execute<K: KeySource>(state: &mut State<K>, instruction: Instruction) -> Result<(), String> {
    match instruction {
        // BR - Conditional Branch
        //
        // The condition codes specified by bits [11:9] (n, z, p) are tested
        // against the current COND. If any tested flag is set, the program
        // branches to PC + SEXT(PCoffset9). BR never sets CC.
        BR(mask, pc_offset) => {
            let tested = (mask.n as u16) << 2 | (mask.z as u16) << 1 | (mask.p as u16);
            if tested & state.condition != 0 {
                state.pc = state.pc.wrapping_add(pc_offset.sign_extend(9));
            }
        }

        // ADD - Addition. DR = SR1 + SR2 (register mode). Sets CC.
        ADD(dr, sr1, sr2) => {
            let value = state
                .registers
                .read(sr1)
                .wrapping_add(state.registers.read(sr2));
            state.registers.write(dr, value);
            state.update_flags(dr);
        }

        // ADD - Addition. DR = SR1 + SEXT(imm5) (immediate mode). Sets CC.
        ADDIMM(dr, sr1, imm5) => {
            let value = state.registers.read(sr1).wrapping_add(imm5);
            state.registers.write(dr, value);
            state.update_flags(dr);
        }

        // LD - Load. DR = mem[PC + SEXT(PCoffset9)]. Sets CC.
        LD(dr, pc_offset) => {
            let address = state.pc.wrapping_add(pc_offset.sign_extend(9));
            let value = state.memory.read(address);
            state.registers.write(dr, value);
            state.update_flags(dr);
        }

        // ST - Store. mem[PC + SEXT(PCoffset9)] = SR. No CC.
        ST(sr, pc_offset) => {
            let address = state.pc.wrapping_add(pc_offset.sign_extend(9));
            state.memory.write(address, state.registers.read(sr));
        }

        // JSR - Jump to Subroutine (PC-relative form).
        //
        // R7 <- incremented PC; PC <- PC + SEXT(PCoffset11). No CC.
        JSR(pc_offset) => {
            let return_address = state.pc;
            state.pc = state.pc.wrapping_add(pc_offset.sign_extend(11));
            state.registers.write(R7, return_address);
        }

        // JSRR - Jump to Subroutine (register form).
        //
        // The jump target is read from BaseR *before* R7 is overwritten,
        // since BaseR might itself be R7 (JSRR R7 jumps to the old R7, then
        // saves the return address into R7).
        JSRR(base_r) => {
            let return_address = state.pc;
            state.pc = state.registers.read(base_r);
            state.registers.write(R7, return_address);
        }

        // AND - Bit-wise Logical AND (register mode). Sets CC.
        AND(dr, sr1, sr2) => {
            let value = state.registers.read(sr1) & state.registers.read(sr2);
            state.registers.write(dr, value);
            state.update_flags(dr);
        }

        // AND - Bit-wise Logical AND (immediate mode). Sets CC.
        ANDIMM(dr, sr1, imm5) => {
            let value = state.registers.read(sr1) & imm5;
            state.registers.write(dr, value);
            state.update_flags(dr);
        }

        // LDR - Load Base+offset. DR = mem[BaseR + SEXT(offset6)]. Sets CC.
        LDR(dr, base_r, offset) => {
            let address = state.registers.read(base_r).wrapping_add(offset.sign_extend(6));
            let value = state.memory.read(address);
            state.registers.write(dr, value);
            state.update_flags(dr);
        }

        // STR - Store Base+offset. mem[BaseR + SEXT(offset6)] = SR. No CC.
        STR(sr, base_r, offset) => {
            let address = state.registers.read(base_r).wrapping_add(offset.sign_extend(6));
            state.memory.write(address, state.registers.read(sr));
        }

        // RTI - reserved. Never issued by a well-formed program; this
        // emulator never enters supervisor mode in the first place.
        RTI => return Err("executed reserved opcode RTI (1000)".to_string()),

        // NOT - Bit-wise Complement. DR = !SR. Sets CC.
        NOT(dr, sr) => {
            state.registers.write(dr, !state.registers.read(sr));
            state.update_flags(dr);
        }

        // LDI - Load Indirect. DR = mem[mem[PC + SEXT(PCoffset9)]]. Sets CC.
        LDI(dr, pc_offset) => {
            let pointer = state.pc.wrapping_add(pc_offset.sign_extend(9));
            let address = state.memory.read(pointer);
            let value = state.memory.read(address);
            state.registers.write(dr, value);
            state.update_flags(dr);
        }

        // STI - Store Indirect. mem[mem[PC + SEXT(PCoffset9)]] = SR. No CC.
        STI(sr, pc_offset) => {
            let pointer = state.pc.wrapping_add(pc_offset.sign_extend(9));
            let address = state.memory.read(pointer);
            state.memory.write(address, state.registers.read(sr));
        }

        // JMP / RET - Jump. PC = BaseR. RET is the special case BaseR = R7.
        JMP(base_r) => {
            state.pc = state.registers.read(base_r);
        }

        // RES - reserved, same treatment as RTI.
        RES => return Err("executed reserved opcode RES (1101)".to_string()),

        // LEA - Load Effective Address. DR = PC + SEXT(PCoffset9).
        //
        // Follows the original LC-3 ISA, which sets CC here; a later
        // architecture revision dropped the CC update for LEA.
        LEA(dr, pc_offset) => {
            let value = state.pc.wrapping_add(pc_offset.sign_extend(9));
            state.registers.write(dr, value);
            state.update_flags(dr);
        }

        TRAP(trap_vector) => {
            state.registers.write(R7, state.pc);
            execute_trap(state, trap_vector)?;
        }
    }

    Ok(())
}

fn execute_trap<K: KeySource>(state: &mut State<K>, trap_vector: TrapVector) -> Result<(), String> {
    match trap_vector {
        // GETC - read one byte from stdin (blocking). R0's high byte is cleared.
        TrapVector::GETC => {
            let byte = read_stdin_byte().map_err(|e| e.to_string())?;
            state.registers.write(R0, u16::from(byte));
        }

        // OUT - write R0's low byte to stdout.
        TrapVector::OUT => {
            let byte = state.registers.read(R0) as u8;
            print!("{}", byte as char);
            io::stdout().flush().map_err(|e| e.to_string())?;
        }

        // PUTS - emit the low byte of each word starting at R0, stopping at 0x0000.
        TrapVector::PUTS => {
            let mut address = state.registers.read(R0);
            loop {
                let word = state.memory.read(address);
                if word == 0 {
                    break;
                }
                print!("{}", (word as u8) as char);
                address = address.wrapping_add(1);
            }
            io::stdout().flush().map_err(|e| e.to_string())?;
        }

        // IN - prompt, read and echo one byte, R0's high byte is cleared.
        TrapVector::IN => {
            print!("Enter a character: ");
            io::stdout().flush().map_err(|e| e.to_string())?;
            let byte = read_stdin_byte().map_err(|e| e.to_string())?;
            print!("{}", byte as char);
            io::stdout().flush().map_err(|e| e.to_string())?;
            state.registers.write(R0, u16::from(byte));
        }

        // PUTSP - emit two ASCII characters per word (low byte, then high byte
        // if non-zero) starting at R0, stopping at the first 0x0000 word.
        TrapVector::PUTSP => {
            let mut address = state.registers.read(R0);
            loop {
                let word = state.memory.read(address);
                if word == 0 {
                    break;
                }
                let low = (word & 0xFF) as u8;
                print!("{}", low as char);

                let high = (word >> 8) as u8;
                if high != 0 {
                    print!("{}", high as char);
                }

                address = address.wrapping_add(1);
            }
            io::stdout().flush().map_err(|e| e.to_string())?;
        }

        // HALT - print a message and stop the fetch loop.
        TrapVector::HALT => {
            println!("HALT");
            io::stdout().flush().map_err(|e| e.to_string())?;
            state.running = false;
        }
    }

    Ok(())
}

fn read_stdin_byte() -> io::Result<u8> {
    let mut buffer = [0u8; 1];
    io::stdin().read_exact(&mut buffer)?;
    Ok(buffer[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{ConditionMask, Register};
    use crate::state::{State, FL_NEG, FL_POS, FL_ZRO};

    fn new_state() -> State {
        State::new()
    }

    #[test]
    fn add_register_mode_wraps_modulo_2_16() {
        let mut state = new_state();
        state.registers.write(Register::R1, 0xFFFF);
        state.registers.write(Register::R2, 2);

        execute(&mut state, ADD(Register::R0, Register::R1, Register::R2)).unwrap();

        assert_eq!(state.registers.read(Register::R0), 1);
        assert_eq!(state.condition, FL_POS);
    }

    #[test]
    fn and_sets_condition_code() {
        let mut state = new_state();
        state.registers.write(Register::R1, 0);
        state.registers.write(Register::R2, 0xFFFF);

        execute(&mut state, AND(Register::R0, Register::R1, Register::R2)).unwrap();

        assert_eq!(state.registers.read(Register::R0), 0);
        assert_eq!(state.condition, FL_ZRO);
    }

    #[test]
    fn jsrr_with_r7_as_base_jumps_to_old_r7_then_saves_return_address() {
        let mut state = new_state();
        state.pc = 0x3001;
        state.registers.write(R7, 0x4000);

        execute(&mut state, JSRR(Register::R7)).unwrap();

        assert_eq!(state.pc, 0x4000);
        assert_eq!(state.registers.read(R7), 0x3001);
    }

    #[test]
    fn jsr_saves_return_address_and_jumps_pc_relative() {
        let mut state = new_state();
        state.pc = 0x3001;

        execute(&mut state, JSR(0b11111100000)).unwrap(); // -32, 11-bit field

        assert_eq!(state.pc, 0x3001u16.wrapping_sub(32));
        assert_eq!(state.registers.read(R7), 0x3001);
    }

    #[test]
    fn ldi_reads_through_the_pointer() {
        let mut state = new_state();
        state.pc = 0x3001;
        state.memory.write(0x3002, 0x4000);
        state.memory.write(0x4000, 0x1234);

        execute(&mut state, LDI(Register::R0, 1)).unwrap();

        assert_eq!(state.registers.read(Register::R0), 0x1234);
    }

    #[test]
    fn lea_sets_condition_code_per_original_isa() {
        let mut state = new_state();
        state.pc = 0x3001;

        execute(&mut state, LEA(Register::R0, 0)).unwrap();

        assert_eq!(state.registers.read(Register::R0), 0x3001);
        assert_eq!(state.condition, FL_POS);
    }

    #[test]
    fn br_is_taken_when_tested_flag_matches() {
        let mut state = new_state();
        state.pc = 0x3001;
        state.condition = FL_NEG;

        execute(
            &mut state,
            BR(
                ConditionMask {
                    n: true,
                    z: false,
                    p: false,
                },
                5,
            ),
        )
        .unwrap();

        assert_eq!(state.pc, 0x3006);
    }

    #[test]
    fn br_is_not_taken_when_tested_flag_does_not_match() {
        let mut state = new_state();
        state.pc = 0x3001;
        state.condition = FL_POS;

        execute(
            &mut state,
            BR(
                ConditionMask {
                    n: true,
                    z: false,
                    p: false,
                },
                5,
            ),
        )
        .unwrap();

        assert_eq!(state.pc, 0x3001);
    }

    #[test]
    fn rti_and_res_are_fatal() {
        let mut state = new_state();
        assert!(execute(&mut state, RTI).is_err());
        assert!(execute(&mut state, RES).is_err());
    }

    #[test]
    fn trap_halt_clears_running() {
        let mut state = new_state();
        execute(&mut state, TRAP(TrapVector::HALT)).unwrap();
        assert_eq!(state.running, false);
    }

    #[test]
    fn trap_puts_stops_at_the_null_terminator() {
        let mut state = new_state();
        state.registers.write(R0, 0x4000);
        state.memory.write(0x4000, 'h' as u16);
        state.memory.write(0x4001, 'i' as u16);
        state.memory.write(0x4002, 0);
        // a trailing word past the terminator that must never be visited
        state.memory.write(0x4003, 'X' as u16);

        execute(&mut state, TRAP(TrapVector::PUTS)).unwrap();
    }

    #[test]
    fn trap_putsp_unpacks_two_characters_per_word() {
        let mut state = new_state();
        state.registers.write(R0, 0x4000);
        // low byte 'h', high byte 'i'
        state.memory.write(0x4000, u16::from(b'h') | (u16::from(b'i') << 8));
        // low byte '!', high byte 0: only one character from this word
        state.memory.write(0x4001, u16::from(b'!'));
        state.memory.write(0x4002, 0);

        execute(&mut state, TRAP(TrapVector::PUTSP)).unwrap();
    }
}
