//! Bytecode listing in javap's format
//!
//! Used by tests and by `debug_code` traces to inspect emitted methods.

use super::opcodes::*;
use super::pool::ConstantPool;
use crate::common::{Error, Result};
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    None,
    Int(i32),
    Local(u16),
    Pool(u16),
    /// Absolute branch target
    Target(usize),
    Iinc { slot: u16, delta: i16 },
    Switch { default: usize, cases: Vec<(i32, usize)> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insn {
    pub pc: usize,
    pub op: u8,
    pub operand: Operand,
}

impl Insn {
    pub fn mnemonic(&self) -> &'static str {
        mnemonic(self.op)
    }

    /// Branch targets of this instruction, switch cases included
    pub fn targets(&self) -> Vec<usize> {
        match &self.operand {
            Operand::Target(t) => vec![*t],
            Operand::Switch { default, cases } => {
                std::iter::once(*default).chain(cases.iter().map(|(_, t)| *t)).collect()
            }
            _ => Vec::new(),
        }
    }
}

struct Reader<'b> {
    bytes: &'b [u8],
    pos: usize,
}

impl<'b> Reader<'b> {
    fn take(&mut self, n: usize) -> Result<&'b [u8]> {
        let end = self.pos + n;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or_else(|| Error::internal(format!("truncated instruction at {}", self.pos)))?;
        self.pos = end;
        Ok(slice)
    }

    fn u1(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u2(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn i4(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

fn offset_target(pc: usize, offset: i64) -> Result<usize> {
    usize::try_from(pc as i64 + offset).map_err(|_| Error::internal(format!("branch at {} leaves the method", pc)))
}

pub fn disassemble(bytes: &[u8]) -> Result<Vec<Insn>> {
    let mut reader = Reader { bytes, pos: 0 };
    let mut insns = Vec::new();
    while reader.pos < bytes.len() {
        let pc = reader.pos;
        let op = reader.u1()?;
        let operand = match op {
            BIPUSH => Operand::Int(reader.u1()? as i8 as i32),
            SIPUSH => Operand::Int(reader.u2()? as i16 as i32),
            NEWARRAY => Operand::Int(reader.u1()? as i32),
            LDC => Operand::Pool(reader.u1()? as u16),
            LDC_W | LDC2_W | GETSTATIC..=INVOKESTATIC | NEW | ANEWARRAY | CHECKCAST | INSTANCEOF => {
                Operand::Pool(reader.u2()?)
            }
            INVOKEINTERFACE => {
                let index = reader.u2()?;
                reader.take(2)?;
                Operand::Pool(index)
            }
            ILOAD..=ALOAD | ISTORE..=ASTORE | RET => Operand::Local(reader.u1()? as u16),
            IINC => Operand::Iinc {
                slot: reader.u1()? as u16,
                delta: reader.u1()? as i8 as i16,
            },
            WIDE => {
                let inner = reader.u1()?;
                let slot = reader.u2()?;
                if inner == IINC {
                    let delta = reader.u2()? as i16;
                    insns.push(Insn {
                        pc,
                        op: IINC,
                        operand: Operand::Iinc { slot, delta },
                    });
                } else {
                    insns.push(Insn {
                        pc,
                        op: inner,
                        operand: Operand::Local(slot),
                    });
                }
                continue;
            }
            GOTO_W | JSR_W => Operand::Target(offset_target(pc, reader.i4()? as i64)?),
            op if is_jump(op) => Operand::Target(offset_target(pc, reader.u2()? as i16 as i64)?),
            TABLESWITCH | LOOKUPSWITCH => {
                let padding = (4 - (pc + 1) % 4) % 4;
                reader.take(padding)?;
                let default = offset_target(pc, reader.i4()? as i64)?;
                let mut cases = Vec::new();
                if op == TABLESWITCH {
                    let low = reader.i4()?;
                    let high = reader.i4()?;
                    for key in low..=high {
                        cases.push((key, offset_target(pc, reader.i4()? as i64)?));
                    }
                } else {
                    let count = reader.i4()?;
                    for _ in 0..count {
                        let key = reader.i4()?;
                        cases.push((key, offset_target(pc, reader.i4()? as i64)?));
                    }
                }
                Operand::Switch { default, cases }
            }
            op if mnemonic(op) == "unknown" => {
                return Err(Error::internal(format!("unknown opcode {:#04x} at {}", op, pc)))
            }
            _ => Operand::None,
        };
        insns.push(Insn { pc, op, operand });
    }
    Ok(insns)
}

/// Just the mnemonics, for compact assertions
pub fn mnemonics(bytes: &[u8]) -> Result<Vec<&'static str>> {
    Ok(disassemble(bytes)?.iter().map(Insn::mnemonic).collect())
}

/// One line per instruction; pool operands are resolved when a pool is given
pub fn render(insns: &[Insn], pool: Option<&ConstantPool>) -> String {
    let mut out = String::new();
    for insn in insns {
        let _ = write!(out, "{:>5}: {}", insn.pc, insn.mnemonic());
        match &insn.operand {
            Operand::None => {}
            Operand::Int(v) => {
                let _ = write!(out, " {}", v);
            }
            Operand::Local(slot) => {
                let _ = write!(out, " {}", slot);
            }
            Operand::Pool(index) => {
                let _ = match pool {
                    Some(pool) => write!(out, " #{} // {}", index, pool.describe(*index)),
                    None => write!(out, " #{}", index),
                };
            }
            Operand::Target(target) => {
                let _ = write!(out, " {}", target);
            }
            Operand::Iinc { slot, delta } => {
                let _ = write!(out, " {}, {}", slot, delta);
            }
            Operand::Switch { default, cases } => {
                out.push_str(" {");
                for (key, target) in cases {
                    let _ = write!(out, " {}: {};", key, target);
                }
                let _ = write!(out, " default: {} }}", default);
            }
        }
        out.push('\n');
    }
    out
}
