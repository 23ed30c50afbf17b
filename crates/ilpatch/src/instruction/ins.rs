//! Shorthand constructors for authoring replacement code.
//!
//! ```ignore
//! use ilpatch::ins;
//!
//! range.replace(vec![
//!     ins::ldarg(0),
//!     ins::ldfld("StardewValley.Crop", "harvestMethod"),
//!     ins::brfalse(skip),
//! ])?;
//! ```

use super::{Instruction, Label, MemberRef, OpCode, Operand};

fn op(opcode: OpCode) -> Instruction {
    Instruction::new(opcode)
}

fn member(opcode: OpCode, member: MemberRef) -> Instruction {
    Instruction::with_operand(opcode, Operand::Member(member))
}

fn branch(opcode: OpCode, target: Label) -> Instruction {
    Instruction::with_operand(opcode, Operand::Label(target))
}

pub fn nop() -> Instruction {
    op(OpCode::Nop)
}

pub fn ret() -> Instruction {
    op(OpCode::Ret)
}

pub fn dup() -> Instruction {
    op(OpCode::Dup)
}

pub fn pop() -> Instruction {
    op(OpCode::Pop)
}

pub fn ldnull() -> Instruction {
    op(OpCode::Ldnull)
}

pub fn throw() -> Instruction {
    op(OpCode::Throw)
}

/// Load argument, using the shortest encoding
pub fn ldarg(index: u16) -> Instruction {
    match index {
        0 => op(OpCode::Ldarg0),
        1 => op(OpCode::Ldarg1),
        2 => op(OpCode::Ldarg2),
        3 => op(OpCode::Ldarg3),
        i if i <= u8::MAX as u16 => Instruction::with_operand(OpCode::LdargS, Operand::Argument(i)),
        i => Instruction::with_operand(OpCode::Ldarg, Operand::Argument(i)),
    }
}

/// Load local, using the shortest encoding
pub fn ldloc(slot: u16) -> Instruction {
    match slot {
        0 => op(OpCode::Ldloc0),
        1 => op(OpCode::Ldloc1),
        2 => op(OpCode::Ldloc2),
        3 => op(OpCode::Ldloc3),
        s if s <= u8::MAX as u16 => Instruction::with_operand(OpCode::LdlocS, Operand::Local(s)),
        s => Instruction::with_operand(OpCode::Ldloc, Operand::Local(s)),
    }
}

/// Store local, using the shortest encoding
pub fn stloc(slot: u16) -> Instruction {
    match slot {
        0 => op(OpCode::Stloc0),
        1 => op(OpCode::Stloc1),
        2 => op(OpCode::Stloc2),
        3 => op(OpCode::Stloc3),
        s if s <= u8::MAX as u16 => Instruction::with_operand(OpCode::StlocS, Operand::Local(s)),
        s => Instruction::with_operand(OpCode::Stloc, Operand::Local(s)),
    }
}

pub fn ldloca(slot: u16) -> Instruction {
    if slot <= u8::MAX as u16 {
        Instruction::with_operand(OpCode::LdlocaS, Operand::Local(slot))
    } else {
        Instruction::with_operand(OpCode::Ldloca, Operand::Local(slot))
    }
}

/// Load int32 constant, using the shortest encoding
pub fn ldc_i4(value: i32) -> Instruction {
    match value {
        -1 => op(OpCode::LdcI4M1),
        0 => op(OpCode::LdcI40),
        1 => op(OpCode::LdcI41),
        2 => op(OpCode::LdcI42),
        3 => op(OpCode::LdcI43),
        4 => op(OpCode::LdcI44),
        5 => op(OpCode::LdcI45),
        6 => op(OpCode::LdcI46),
        7 => op(OpCode::LdcI47),
        8 => op(OpCode::LdcI48),
        v => match i8::try_from(v) {
            Ok(small) => Instruction::with_operand(OpCode::LdcI4S, Operand::Int8(small)),
            Err(_) => Instruction::with_operand(OpCode::LdcI4, Operand::Int32(v)),
        },
    }
}

pub fn ldc_i8(value: i64) -> Instruction {
    Instruction::with_operand(OpCode::LdcI8, Operand::Int64(value))
}

pub fn ldc_r4(value: f32) -> Instruction {
    Instruction::with_operand(OpCode::LdcR4, Operand::Float32(value))
}

pub fn ldc_r8(value: f64) -> Instruction {
    Instruction::with_operand(OpCode::LdcR8, Operand::Float64(value))
}

pub fn ldstr(value: impl Into<String>) -> Instruction {
    Instruction::with_operand(OpCode::Ldstr, Operand::String(value.into()))
}

pub fn ldfld(declaring_type: &str, name: &str) -> Instruction {
    member(OpCode::Ldfld, MemberRef::field(declaring_type, name))
}

pub fn ldflda(declaring_type: &str, name: &str) -> Instruction {
    member(OpCode::Ldflda, MemberRef::field(declaring_type, name))
}

pub fn stfld(declaring_type: &str, name: &str) -> Instruction {
    member(OpCode::Stfld, MemberRef::field(declaring_type, name))
}

pub fn ldsfld(declaring_type: &str, name: &str) -> Instruction {
    member(OpCode::Ldsfld, MemberRef::field(declaring_type, name))
}

pub fn stsfld(declaring_type: &str, name: &str) -> Instruction {
    member(OpCode::Stsfld, MemberRef::field(declaring_type, name))
}

pub fn call(method: MemberRef) -> Instruction {
    member(OpCode::Call, method)
}

pub fn callvirt(method: MemberRef) -> Instruction {
    member(OpCode::Callvirt, method)
}

pub fn newobj(constructor: MemberRef) -> Instruction {
    member(OpCode::Newobj, constructor)
}

/// Call a property getter, `get_<property>`
pub fn call_get(declaring_type: &str, property: &str) -> Instruction {
    call(MemberRef::method(declaring_type, format!("get_{}", property)))
}

/// Virtual call of a property getter, `get_<property>`
pub fn callvirt_get(declaring_type: &str, property: &str) -> Instruction {
    callvirt(MemberRef::method(declaring_type, format!("get_{}", property)))
}

pub fn isinst(type_name: &str) -> Instruction {
    member(OpCode::Isinst, MemberRef::ty(type_name))
}

pub fn castclass(type_name: &str) -> Instruction {
    member(OpCode::Castclass, MemberRef::ty(type_name))
}

pub fn box_value(type_name: &str) -> Instruction {
    member(OpCode::Box, MemberRef::ty(type_name))
}

pub fn br(target: Label) -> Instruction {
    branch(OpCode::Br, target)
}

pub fn brfalse(target: Label) -> Instruction {
    branch(OpCode::Brfalse, target)
}

pub fn brtrue(target: Label) -> Instruction {
    branch(OpCode::Brtrue, target)
}

pub fn beq(target: Label) -> Instruction {
    branch(OpCode::Beq, target)
}

pub fn bne_un(target: Label) -> Instruction {
    branch(OpCode::BneUn, target)
}

pub fn bgt(target: Label) -> Instruction {
    branch(OpCode::Bgt, target)
}

pub fn bge(target: Label) -> Instruction {
    branch(OpCode::Bge, target)
}

pub fn blt(target: Label) -> Instruction {
    branch(OpCode::Blt, target)
}

pub fn ble(target: Label) -> Instruction {
    branch(OpCode::Ble, target)
}

pub fn leave(target: Label) -> Instruction {
    branch(OpCode::Leave, target)
}

pub fn add() -> Instruction {
    op(OpCode::Add)
}

pub fn sub() -> Instruction {
    op(OpCode::Sub)
}

pub fn mul() -> Instruction {
    op(OpCode::Mul)
}

pub fn div() -> Instruction {
    op(OpCode::Div)
}

pub fn neg() -> Instruction {
    op(OpCode::Neg)
}

pub fn ceq() -> Instruction {
    op(OpCode::Ceq)
}

pub fn cgt() -> Instruction {
    op(OpCode::Cgt)
}

pub fn clt() -> Instruction {
    op(OpCode::Clt)
}

pub fn conv_r4() -> Instruction {
    op(OpCode::ConvR4)
}

pub fn conv_i4() -> Instruction {
    op(OpCode::ConvI4)
}
