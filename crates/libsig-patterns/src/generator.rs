//! Relocation-aware signature generation.
//!
//! Decodes a function's bytes linearly and replaces the bytes of relative
//! operands with wildcards, so the resulting pattern matches the function
//! wherever the linker places it. Two operand forms are relative on x86:
//! near-branch immediates (`CALL`/`JMP`/`Jcc` offsets) and RIP-relative
//! memory displacements.

use crate::pattern::{Pattern, PatternByte};
use iced_x86::{ConstantOffsets, Decoder, DecoderOptions, Instruction, OpKind};
use std::ops::Range;

/// Produces the wildcard-masked pattern for one function's bytes.
///
/// Decoding stops at the first undecodable instruction, so the pattern then
/// covers only the decoded prefix; an empty or immediately-undecodable
/// function yields an empty pattern.
pub fn function_pattern(code: &[u8], is_x64: bool) -> Pattern {
    let bitness = if is_x64 { 64 } else { 32 };
    let mut decoder = Decoder::new(bitness, code, DecoderOptions::NONE);
    let mut instruction = Instruction::default();
    let mut pattern = Pattern::new();

    while decoder.can_decode() {
        let start = decoder.position();
        decoder.decode_out(&mut instruction);
        if instruction.is_invalid() {
            break;
        }

        let masked = relative_span(&instruction, &decoder.get_constant_offsets(&instruction));
        for (i, &byte) in code[start..start + instruction.len()].iter().enumerate() {
            let wildcard = masked.as_ref().is_some_and(|span| span.contains(&i));
            pattern.push(if wildcard {
                PatternByte::Wildcard
            } else {
                PatternByte::Concrete(byte)
            });
        }
    }

    pattern
}

/// Byte range, within the instruction, occupied by its relative operand.
///
/// The branch immediate is consulted before the displacement: an instruction
/// that is relative through its memory operand masks whatever non-empty
/// displacement the decoder reports.
fn relative_span(instruction: &Instruction, offsets: &ConstantOffsets) -> Option<Range<usize>> {
    if !is_relative(instruction) {
        return None;
    }
    if has_near_branch_operand(instruction) && offsets.has_immediate() {
        let start = offsets.immediate_offset();
        return Some(start..start + offsets.immediate_size());
    }
    if offsets.has_displacement() {
        let start = offsets.displacement_offset();
        return Some(start..start + offsets.displacement_size());
    }
    None
}

/// True when the encoded instruction contains a position-dependent operand.
fn is_relative(instruction: &Instruction) -> bool {
    has_near_branch_operand(instruction) || instruction.is_ip_rel_memory_operand()
}

fn has_near_branch_operand(instruction: &Instruction) -> bool {
    (0..instruction.op_count()).any(|operand| {
        matches!(
            instruction.op_kind(operand),
            OpKind::NearBranch16 | OpKind::NearBranch32 | OpKind::NearBranch64
        )
    })
}
