//! Bytecode disassembler for debugging.

use std::fmt::Write;

use crate::bytecode::compiler::Bytecode;
use crate::bytecode::instruction::{read_operands, OpCode};
use crate::object::Object;

/// Disassemble an instruction stream: one line per instruction with a
/// zero-padded byte offset, the mnemonic, and decoded operands.
pub fn disassemble(instructions: &[u8]) -> String {
    let mut output = String::new();
    let mut offset = 0;

    while offset < instructions.len() {
        let byte = instructions[offset];
        let opcode = match OpCode::from_u8(byte) {
            Some(op) => op,
            None => {
                writeln!(&mut output, "{:04} Unknown opcode {}", offset, byte).unwrap();
                offset += 1;
                continue;
            }
        };

        let def = opcode.definition();
        let (operands, bytes_read) = read_operands(&def, &instructions[offset + 1..]);

        write!(&mut output, "{:04} {}", offset, def.name).unwrap();
        for operand in &operands {
            write!(&mut output, " {}", operand).unwrap();
        }
        writeln!(&mut output).unwrap();

        offset += 1 + bytes_read;
    }

    output
}

/// Disassemble a full compilation unit: the main stream first, then each
/// function in the constant pool.
pub fn disassemble_bytecode(bytecode: &Bytecode) -> String {
    let mut output = String::from("== main ==\n");
    output.push_str(&disassemble(&bytecode.instructions));

    for (index, constant) in bytecode.constants.iter().enumerate() {
        if let Object::CompiledFunction(func) = constant {
            writeln!(
                &mut output,
                "\n== fn constant {} (locals: {}, params: {}) ==",
                index, func.num_locals, func.num_parameters
            )
            .unwrap();
            output.push_str(&disassemble(&func.instructions));
        }
    }

    output
}

/// Print a disassembly to stdout.
pub fn print_disassembly(bytecode: &Bytecode) {
    print!("{}", disassemble_bytecode(bytecode));
}
