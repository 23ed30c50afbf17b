//! CIL operation codes.
//!
//! The opcode is the operation tag of an [`Instruction`](super::Instruction).
//! Mnemonics follow ECMA-335 (`ldarg.0`, `brfalse.s`, `unbox.any`, ...) and
//! are used both for display and for the textual instruction syntax.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// The kind of operand an opcode expects.
///
/// Used when parsing textual instructions, where `ldc.r4 64` must produce a
/// `float32` operand while `ldc.i4 64` produces an `int32` one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum OperandKind {
    None,
    Int8,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Local,
    Argument,
    Branch,
    Switch,
    Field,
    Method,
    Type,
    Token,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr, Display, EnumIter,
)]
pub enum OpCode {
    #[strum(serialize = "nop")]
    Nop,
    #[strum(serialize = "break")]
    Break,
    #[strum(serialize = "ldarg.0")]
    Ldarg0,
    #[strum(serialize = "ldarg.1")]
    Ldarg1,
    #[strum(serialize = "ldarg.2")]
    Ldarg2,
    #[strum(serialize = "ldarg.3")]
    Ldarg3,
    #[strum(serialize = "ldloc.0")]
    Ldloc0,
    #[strum(serialize = "ldloc.1")]
    Ldloc1,
    #[strum(serialize = "ldloc.2")]
    Ldloc2,
    #[strum(serialize = "ldloc.3")]
    Ldloc3,
    #[strum(serialize = "stloc.0")]
    Stloc0,
    #[strum(serialize = "stloc.1")]
    Stloc1,
    #[strum(serialize = "stloc.2")]
    Stloc2,
    #[strum(serialize = "stloc.3")]
    Stloc3,
    #[strum(serialize = "ldarg.s")]
    LdargS,
    #[strum(serialize = "ldarga.s")]
    LdargaS,
    #[strum(serialize = "starg.s")]
    StargS,
    #[strum(serialize = "ldloc.s")]
    LdlocS,
    #[strum(serialize = "ldloca.s")]
    LdlocaS,
    #[strum(serialize = "stloc.s")]
    StlocS,
    #[strum(serialize = "ldnull")]
    Ldnull,
    #[strum(serialize = "ldc.i4.m1")]
    LdcI4M1,
    #[strum(serialize = "ldc.i4.0")]
    LdcI40,
    #[strum(serialize = "ldc.i4.1")]
    LdcI41,
    #[strum(serialize = "ldc.i4.2")]
    LdcI42,
    #[strum(serialize = "ldc.i4.3")]
    LdcI43,
    #[strum(serialize = "ldc.i4.4")]
    LdcI44,
    #[strum(serialize = "ldc.i4.5")]
    LdcI45,
    #[strum(serialize = "ldc.i4.6")]
    LdcI46,
    #[strum(serialize = "ldc.i4.7")]
    LdcI47,
    #[strum(serialize = "ldc.i4.8")]
    LdcI48,
    #[strum(serialize = "ldc.i4.s")]
    LdcI4S,
    #[strum(serialize = "ldc.i4")]
    LdcI4,
    #[strum(serialize = "ldc.i8")]
    LdcI8,
    #[strum(serialize = "ldc.r4")]
    LdcR4,
    #[strum(serialize = "ldc.r8")]
    LdcR8,
    #[strum(serialize = "dup")]
    Dup,
    #[strum(serialize = "pop")]
    Pop,
    #[strum(serialize = "jmp")]
    Jmp,
    #[strum(serialize = "call")]
    Call,
    #[strum(serialize = "calli")]
    Calli,
    #[strum(serialize = "ret")]
    Ret,
    #[strum(serialize = "br.s")]
    BrS,
    #[strum(serialize = "brfalse.s")]
    BrfalseS,
    #[strum(serialize = "brtrue.s")]
    BrtrueS,
    #[strum(serialize = "beq.s")]
    BeqS,
    #[strum(serialize = "bge.s")]
    BgeS,
    #[strum(serialize = "bgt.s")]
    BgtS,
    #[strum(serialize = "ble.s")]
    BleS,
    #[strum(serialize = "blt.s")]
    BltS,
    #[strum(serialize = "bne.un.s")]
    BneUnS,
    #[strum(serialize = "bge.un.s")]
    BgeUnS,
    #[strum(serialize = "bgt.un.s")]
    BgtUnS,
    #[strum(serialize = "ble.un.s")]
    BleUnS,
    #[strum(serialize = "blt.un.s")]
    BltUnS,
    #[strum(serialize = "br")]
    Br,
    #[strum(serialize = "brfalse")]
    Brfalse,
    #[strum(serialize = "brtrue")]
    Brtrue,
    #[strum(serialize = "beq")]
    Beq,
    #[strum(serialize = "bge")]
    Bge,
    #[strum(serialize = "bgt")]
    Bgt,
    #[strum(serialize = "ble")]
    Ble,
    #[strum(serialize = "blt")]
    Blt,
    #[strum(serialize = "bne.un")]
    BneUn,
    #[strum(serialize = "bge.un")]
    BgeUn,
    #[strum(serialize = "bgt.un")]
    BgtUn,
    #[strum(serialize = "ble.un")]
    BleUn,
    #[strum(serialize = "blt.un")]
    BltUn,
    #[strum(serialize = "switch")]
    Switch,
    #[strum(serialize = "ldind.i1")]
    LdindI1,
    #[strum(serialize = "ldind.u1")]
    LdindU1,
    #[strum(serialize = "ldind.i2")]
    LdindI2,
    #[strum(serialize = "ldind.u2")]
    LdindU2,
    #[strum(serialize = "ldind.i4")]
    LdindI4,
    #[strum(serialize = "ldind.u4")]
    LdindU4,
    #[strum(serialize = "ldind.i8")]
    LdindI8,
    #[strum(serialize = "ldind.i")]
    LdindI,
    #[strum(serialize = "ldind.r4")]
    LdindR4,
    #[strum(serialize = "ldind.r8")]
    LdindR8,
    #[strum(serialize = "ldind.ref")]
    LdindRef,
    #[strum(serialize = "stind.ref")]
    StindRef,
    #[strum(serialize = "stind.i1")]
    StindI1,
    #[strum(serialize = "stind.i2")]
    StindI2,
    #[strum(serialize = "stind.i4")]
    StindI4,
    #[strum(serialize = "stind.i8")]
    StindI8,
    #[strum(serialize = "stind.r4")]
    StindR4,
    #[strum(serialize = "stind.r8")]
    StindR8,
    #[strum(serialize = "add")]
    Add,
    #[strum(serialize = "sub")]
    Sub,
    #[strum(serialize = "mul")]
    Mul,
    #[strum(serialize = "div")]
    Div,
    #[strum(serialize = "div.un")]
    DivUn,
    #[strum(serialize = "rem")]
    Rem,
    #[strum(serialize = "rem.un")]
    RemUn,
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "or")]
    Or,
    #[strum(serialize = "xor")]
    Xor,
    #[strum(serialize = "shl")]
    Shl,
    #[strum(serialize = "shr")]
    Shr,
    #[strum(serialize = "shr.un")]
    ShrUn,
    #[strum(serialize = "neg")]
    Neg,
    #[strum(serialize = "not")]
    Not,
    #[strum(serialize = "conv.i1")]
    ConvI1,
    #[strum(serialize = "conv.i2")]
    ConvI2,
    #[strum(serialize = "conv.i4")]
    ConvI4,
    #[strum(serialize = "conv.i8")]
    ConvI8,
    #[strum(serialize = "conv.r4")]
    ConvR4,
    #[strum(serialize = "conv.r8")]
    ConvR8,
    #[strum(serialize = "conv.u4")]
    ConvU4,
    #[strum(serialize = "conv.u8")]
    ConvU8,
    #[strum(serialize = "callvirt")]
    Callvirt,
    #[strum(serialize = "cpobj")]
    Cpobj,
    #[strum(serialize = "ldobj")]
    Ldobj,
    #[strum(serialize = "ldstr")]
    Ldstr,
    #[strum(serialize = "newobj")]
    Newobj,
    #[strum(serialize = "castclass")]
    Castclass,
    #[strum(serialize = "isinst")]
    Isinst,
    #[strum(serialize = "conv.r.un")]
    ConvRUn,
    #[strum(serialize = "unbox")]
    Unbox,
    #[strum(serialize = "throw")]
    Throw,
    #[strum(serialize = "ldfld")]
    Ldfld,
    #[strum(serialize = "ldflda")]
    Ldflda,
    #[strum(serialize = "stfld")]
    Stfld,
    #[strum(serialize = "ldsfld")]
    Ldsfld,
    #[strum(serialize = "ldsflda")]
    Ldsflda,
    #[strum(serialize = "stsfld")]
    Stsfld,
    #[strum(serialize = "stobj")]
    Stobj,
    #[strum(serialize = "conv.ovf.i1.un")]
    ConvOvfI1Un,
    #[strum(serialize = "conv.ovf.i2.un")]
    ConvOvfI2Un,
    #[strum(serialize = "conv.ovf.i4.un")]
    ConvOvfI4Un,
    #[strum(serialize = "conv.ovf.i8.un")]
    ConvOvfI8Un,
    #[strum(serialize = "conv.ovf.u1.un")]
    ConvOvfU1Un,
    #[strum(serialize = "conv.ovf.u2.un")]
    ConvOvfU2Un,
    #[strum(serialize = "conv.ovf.u4.un")]
    ConvOvfU4Un,
    #[strum(serialize = "conv.ovf.u8.un")]
    ConvOvfU8Un,
    #[strum(serialize = "conv.ovf.i.un")]
    ConvOvfIUn,
    #[strum(serialize = "conv.ovf.u.un")]
    ConvOvfUUn,
    #[strum(serialize = "box")]
    Box,
    #[strum(serialize = "newarr")]
    Newarr,
    #[strum(serialize = "ldlen")]
    Ldlen,
    #[strum(serialize = "ldelema")]
    Ldelema,
    #[strum(serialize = "ldelem.i1")]
    LdelemI1,
    #[strum(serialize = "ldelem.u1")]
    LdelemU1,
    #[strum(serialize = "ldelem.i2")]
    LdelemI2,
    #[strum(serialize = "ldelem.u2")]
    LdelemU2,
    #[strum(serialize = "ldelem.i4")]
    LdelemI4,
    #[strum(serialize = "ldelem.u4")]
    LdelemU4,
    #[strum(serialize = "ldelem.i8")]
    LdelemI8,
    #[strum(serialize = "ldelem.i")]
    LdelemI,
    #[strum(serialize = "ldelem.r4")]
    LdelemR4,
    #[strum(serialize = "ldelem.r8")]
    LdelemR8,
    #[strum(serialize = "ldelem.ref")]
    LdelemRef,
    #[strum(serialize = "stelem.i")]
    StelemI,
    #[strum(serialize = "stelem.i1")]
    StelemI1,
    #[strum(serialize = "stelem.i2")]
    StelemI2,
    #[strum(serialize = "stelem.i4")]
    StelemI4,
    #[strum(serialize = "stelem.i8")]
    StelemI8,
    #[strum(serialize = "stelem.r4")]
    StelemR4,
    #[strum(serialize = "stelem.r8")]
    StelemR8,
    #[strum(serialize = "stelem.ref")]
    StelemRef,
    #[strum(serialize = "ldelem")]
    Ldelem,
    #[strum(serialize = "stelem")]
    Stelem,
    #[strum(serialize = "unbox.any")]
    UnboxAny,
    #[strum(serialize = "conv.ovf.i1")]
    ConvOvfI1,
    #[strum(serialize = "conv.ovf.u1")]
    ConvOvfU1,
    #[strum(serialize = "conv.ovf.i2")]
    ConvOvfI2,
    #[strum(serialize = "conv.ovf.u2")]
    ConvOvfU2,
    #[strum(serialize = "conv.ovf.i4")]
    ConvOvfI4,
    #[strum(serialize = "conv.ovf.u4")]
    ConvOvfU4,
    #[strum(serialize = "conv.ovf.i8")]
    ConvOvfI8,
    #[strum(serialize = "conv.ovf.u8")]
    ConvOvfU8,
    #[strum(serialize = "refanyval")]
    Refanyval,
    #[strum(serialize = "ckfinite")]
    Ckfinite,
    #[strum(serialize = "mkrefany")]
    Mkrefany,
    #[strum(serialize = "ldtoken")]
    Ldtoken,
    #[strum(serialize = "conv.u2")]
    ConvU2,
    #[strum(serialize = "conv.u1")]
    ConvU1,
    #[strum(serialize = "conv.i")]
    ConvI,
    #[strum(serialize = "conv.ovf.i")]
    ConvOvfI,
    #[strum(serialize = "conv.ovf.u")]
    ConvOvfU,
    #[strum(serialize = "add.ovf")]
    AddOvf,
    #[strum(serialize = "add.ovf.un")]
    AddOvfUn,
    #[strum(serialize = "mul.ovf")]
    MulOvf,
    #[strum(serialize = "mul.ovf.un")]
    MulOvfUn,
    #[strum(serialize = "sub.ovf")]
    SubOvf,
    #[strum(serialize = "sub.ovf.un")]
    SubOvfUn,
    #[strum(serialize = "endfinally")]
    Endfinally,
    #[strum(serialize = "leave")]
    Leave,
    #[strum(serialize = "leave.s")]
    LeaveS,
    #[strum(serialize = "stind.i")]
    StindI,
    #[strum(serialize = "conv.u")]
    ConvU,
    #[strum(serialize = "arglist")]
    Arglist,
    #[strum(serialize = "ceq")]
    Ceq,
    #[strum(serialize = "cgt")]
    Cgt,
    #[strum(serialize = "cgt.un")]
    CgtUn,
    #[strum(serialize = "clt")]
    Clt,
    #[strum(serialize = "clt.un")]
    CltUn,
    #[strum(serialize = "ldftn")]
    Ldftn,
    #[strum(serialize = "ldvirtftn")]
    Ldvirtftn,
    #[strum(serialize = "ldarg")]
    Ldarg,
    #[strum(serialize = "ldarga")]
    Ldarga,
    #[strum(serialize = "starg")]
    Starg,
    #[strum(serialize = "ldloc")]
    Ldloc,
    #[strum(serialize = "ldloca")]
    Ldloca,
    #[strum(serialize = "stloc")]
    Stloc,
    #[strum(serialize = "localloc")]
    Localloc,
    #[strum(serialize = "endfilter")]
    Endfilter,
    #[strum(serialize = "unaligned.")]
    Unaligned,
    #[strum(serialize = "volatile.")]
    Volatile,
    #[strum(serialize = "tail.")]
    Tail,
    #[strum(serialize = "initobj")]
    Initobj,
    #[strum(serialize = "constrained.")]
    Constrained,
    #[strum(serialize = "cpblk")]
    Cpblk,
    #[strum(serialize = "initblk")]
    Initblk,
    #[strum(serialize = "no.")]
    No,
    #[strum(serialize = "rethrow")]
    Rethrow,
    #[strum(serialize = "sizeof")]
    Sizeof,
    #[strum(serialize = "refanytype")]
    Refanytype,
    #[strum(serialize = "readonly.")]
    Readonly,
}

impl OpCode {
    /// The ECMA-335 mnemonic, e.g. `"brfalse.s"`
    pub fn mnemonic(&self) -> &'static str {
        self.into()
    }

    /// Operand kind expected by this opcode
    pub fn operand_kind(&self) -> OperandKind {
        match self {
            Self::LdcI4S | Self::Unaligned | Self::No => OperandKind::Int8,
            Self::LdcI4 => OperandKind::Int32,
            Self::LdcI8 => OperandKind::Int64,
            Self::LdcR4 => OperandKind::Float32,
            Self::LdcR8 => OperandKind::Float64,
            Self::Ldstr => OperandKind::String,
            Self::LdlocS
            | Self::LdlocaS
            | Self::StlocS
            | Self::Ldloc
            | Self::Ldloca
            | Self::Stloc => OperandKind::Local,
            Self::LdargS
            | Self::LdargaS
            | Self::StargS
            | Self::Ldarg
            | Self::Ldarga
            | Self::Starg => OperandKind::Argument,
            Self::Switch => OperandKind::Switch,
            Self::Ldfld
            | Self::Ldflda
            | Self::Stfld
            | Self::Ldsfld
            | Self::Ldsflda
            | Self::Stsfld => OperandKind::Field,
            Self::Call
            | Self::Callvirt
            | Self::Calli
            | Self::Newobj
            | Self::Jmp
            | Self::Ldftn
            | Self::Ldvirtftn => OperandKind::Method,
            Self::Cpobj
            | Self::Ldobj
            | Self::Castclass
            | Self::Isinst
            | Self::Unbox
            | Self::UnboxAny
            | Self::Stobj
            | Self::Box
            | Self::Newarr
            | Self::Ldelema
            | Self::Ldelem
            | Self::Stelem
            | Self::Refanyval
            | Self::Mkrefany
            | Self::Initobj
            | Self::Constrained
            | Self::Sizeof => OperandKind::Type,
            Self::Ldtoken => OperandKind::Token,
            op if op.is_branch() => OperandKind::Branch,
            _ => OperandKind::None,
        }
    }

    /// Whether this opcode transfers control to a single label operand.
    ///
    /// `switch` is excluded since it carries a label table.
    pub fn is_branch(&self) -> bool {
        self.is_conditional_branch()
            || matches!(self, Self::Br | Self::BrS | Self::Leave | Self::LeaveS)
    }

    pub fn is_conditional_branch(&self) -> bool {
        matches!(
            self,
            Self::BrfalseS
                | Self::BrtrueS
                | Self::BeqS
                | Self::BgeS
                | Self::BgtS
                | Self::BleS
                | Self::BltS
                | Self::BneUnS
                | Self::BgeUnS
                | Self::BgtUnS
                | Self::BleUnS
                | Self::BltUnS
                | Self::Brfalse
                | Self::Brtrue
                | Self::Beq
                | Self::Bge
                | Self::Bgt
                | Self::Ble
                | Self::Blt
                | Self::BneUn
                | Self::BgeUn
                | Self::BgtUn
                | Self::BleUn
                | Self::BltUn
        )
    }

    /// Whether execution never falls through to the next instruction
    pub fn ends_block(&self) -> bool {
        matches!(
            self,
            Self::Br
                | Self::BrS
                | Self::Leave
                | Self::LeaveS
                | Self::Ret
                | Self::Throw
                | Self::Rethrow
                | Self::Jmp
                | Self::Endfinally
                | Self::Endfilter
        )
    }

    /// Long form of a short branch or local/argument opcode.
    ///
    /// Inserted code can move branch targets out of short-form reach, so
    /// patches that grow a method typically widen the branches they author.
    pub fn long_form(&self) -> Self {
        match self {
            Self::BrS => Self::Br,
            Self::BrfalseS => Self::Brfalse,
            Self::BrtrueS => Self::Brtrue,
            Self::BeqS => Self::Beq,
            Self::BgeS => Self::Bge,
            Self::BgtS => Self::Bgt,
            Self::BleS => Self::Ble,
            Self::BltS => Self::Blt,
            Self::BneUnS => Self::BneUn,
            Self::BgeUnS => Self::BgeUn,
            Self::BgtUnS => Self::BgtUn,
            Self::BleUnS => Self::BleUn,
            Self::BltUnS => Self::BltUn,
            Self::LeaveS => Self::Leave,
            Self::LdargS => Self::Ldarg,
            Self::LdargaS => Self::Ldarga,
            Self::StargS => Self::Starg,
            Self::LdlocS => Self::Ldloc,
            Self::LdlocaS => Self::Ldloca,
            Self::StlocS => Self::Stloc,
            other => *other,
        }
    }
}

impl Serialize for OpCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.mnemonic())
    }
}

impl<'de> Deserialize<'de> for OpCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        OpCode::from_str(&text)
            .map_err(|_| serde::de::Error::custom(format!("unknown opcode '{}'", text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_mnemonic_parse() {
        assert_eq!(OpCode::from_str("ldarg.0").unwrap(), OpCode::Ldarg0);
        assert_eq!(OpCode::from_str("bne.un.s").unwrap(), OpCode::BneUnS);
        assert_eq!(OpCode::from_str("ldc.i4.m1").unwrap(), OpCode::LdcI4M1);
        assert_eq!(OpCode::from_str("unbox.any").unwrap(), OpCode::UnboxAny);
        assert_eq!(OpCode::from_str("constrained.").unwrap(), OpCode::Constrained);
        assert!(OpCode::from_str("ldarg.9").is_err());
    }

    #[test]
    fn test_mnemonics_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for op in OpCode::iter() {
            assert!(seen.insert(op.mnemonic()), "duplicate {}", op);
            assert_eq!(OpCode::from_str(op.mnemonic()).unwrap(), op);
        }
        assert_eq!(seen.len(), 219);
    }

    #[test]
    fn test_branch_classification() {
        assert!(OpCode::Brfalse.is_branch());
        assert!(OpCode::BrS.is_branch());
        assert!(OpCode::LeaveS.is_branch());
        assert!(!OpCode::Switch.is_branch());
        assert!(!OpCode::Call.is_branch());
        assert!(OpCode::BgtUn.is_conditional_branch());
        assert!(!OpCode::Br.is_conditional_branch());
        assert_eq!(OpCode::Blt.operand_kind(), OperandKind::Branch);
        assert_eq!(OpCode::Switch.operand_kind(), OperandKind::Switch);
    }

    #[test]
    fn test_operand_kinds() {
        assert_eq!(OpCode::LdcR4.operand_kind(), OperandKind::Float32);
        assert_eq!(OpCode::StlocS.operand_kind(), OperandKind::Local);
        assert_eq!(OpCode::Ldsfld.operand_kind(), OperandKind::Field);
        assert_eq!(OpCode::Newobj.operand_kind(), OperandKind::Method);
        assert_eq!(OpCode::Isinst.operand_kind(), OperandKind::Type);
        assert_eq!(OpCode::Ldarg0.operand_kind(), OperandKind::None);
    }

    #[test]
    fn test_long_form() {
        assert_eq!(OpCode::BrfalseS.long_form(), OpCode::Brfalse);
        assert_eq!(OpCode::LdlocS.long_form(), OpCode::Ldloc);
        assert_eq!(OpCode::Add.long_form(), OpCode::Add);
    }

    #[test]
    fn test_serde_as_mnemonic() {
        let json = serde_json::to_string(&OpCode::LdcR4).unwrap();
        assert_eq!(json, "\"ldc.r4\"");
        let op: OpCode = serde_json::from_str("\"callvirt\"").unwrap();
        assert_eq!(op, OpCode::Callvirt);
    }
}
