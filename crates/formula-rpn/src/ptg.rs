//! The emitted token model.
//!
//! A [`Token`] pairs a [`TokenKind`] payload with the reference class of classed ptgs. The ptg
//! id is always derived from the payload, so the two can never disagree; only the class is ever
//! rewritten after emission.

use serde::{Deserialize, Serialize};

use crate::address::CellAddr;
use crate::class::RefClass;

/// BIFF ptg instruction ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PtgId {
    Add,
    Sub,
    Mul,
    Div,
    Power,
    Concat,
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
    Ne,
    Isect,
    Union,
    Range,
    Uplus,
    Uminus,
    Percent,
    Paren,
    MissArg,
    Str,
    Attr,
    Err,
    Bool,
    Int,
    Num,
    // Classed ptgs.
    Array,
    Func,
    FuncVar,
    Name,
    Ref,
    Area,
    RefErr,
    AreaErr,
    RefN,
    AreaN,
    NameX,
    Ref3d,
    Area3d,
    RefErr3d,
    AreaErr3d,
    /// Placeholder pushed in place of an element that failed to convert.
    Unsupported,
}

impl PtgId {
    /// Ptg byte with the class bits cleared.
    pub const fn base(self) -> u8 {
        match self {
            PtgId::Add => 0x03,
            PtgId::Sub => 0x04,
            PtgId::Mul => 0x05,
            PtgId::Div => 0x06,
            PtgId::Power => 0x07,
            PtgId::Concat => 0x08,
            PtgId::Lt => 0x09,
            PtgId::Le => 0x0A,
            PtgId::Eq => 0x0B,
            PtgId::Ge => 0x0C,
            PtgId::Gt => 0x0D,
            PtgId::Ne => 0x0E,
            PtgId::Isect => 0x0F,
            PtgId::Union => 0x10,
            PtgId::Range => 0x11,
            PtgId::Uplus => 0x12,
            PtgId::Uminus => 0x13,
            PtgId::Percent => 0x14,
            PtgId::Paren => 0x15,
            PtgId::MissArg => 0x16,
            PtgId::Str => 0x17,
            PtgId::Attr => 0x19,
            PtgId::Err => 0x1C,
            PtgId::Bool => 0x1D,
            PtgId::Int => 0x1E,
            PtgId::Num => 0x1F,
            PtgId::Array => 0x00,
            PtgId::Func => 0x01,
            PtgId::FuncVar => 0x02,
            PtgId::Name => 0x03,
            PtgId::Ref => 0x04,
            PtgId::Area => 0x05,
            PtgId::RefErr => 0x0A,
            PtgId::AreaErr => 0x0B,
            PtgId::RefN => 0x0C,
            PtgId::AreaN => 0x0D,
            PtgId::NameX => 0x19,
            PtgId::Ref3d => 0x1A,
            PtgId::Area3d => 0x1B,
            PtgId::RefErr3d => 0x1C,
            PtgId::AreaErr3d => 0x1D,
            PtgId::Unsupported => 0x00,
        }
    }

    /// Whether this ptg carries class bits.
    pub const fn is_classed(self) -> bool {
        matches!(
            self,
            PtgId::Array
                | PtgId::Func
                | PtgId::FuncVar
                | PtgId::Name
                | PtgId::Ref
                | PtgId::Area
                | PtgId::RefErr
                | PtgId::AreaErr
                | PtgId::RefN
                | PtgId::AreaN
                | PtgId::NameX
                | PtgId::Ref3d
                | PtgId::Area3d
                | PtgId::RefErr3d
                | PtgId::AreaErr3d
        )
    }

    /// Binary operators whose result is always a reference.
    pub const fn is_reference_operator(self) -> bool {
        matches!(self, PtgId::Range | PtgId::Isect | PtgId::Union)
    }

    /// Markers that never become the "last operand" seen by the class resolver.
    pub const fn is_transparent(self) -> bool {
        matches!(self, PtgId::Paren | PtgId::Attr)
    }

    const UNCLASSED: [PtgId; 26] = [
        PtgId::Add,
        PtgId::Sub,
        PtgId::Mul,
        PtgId::Div,
        PtgId::Power,
        PtgId::Concat,
        PtgId::Lt,
        PtgId::Le,
        PtgId::Eq,
        PtgId::Ge,
        PtgId::Gt,
        PtgId::Ne,
        PtgId::Isect,
        PtgId::Union,
        PtgId::Range,
        PtgId::Uplus,
        PtgId::Uminus,
        PtgId::Percent,
        PtgId::Paren,
        PtgId::MissArg,
        PtgId::Str,
        PtgId::Attr,
        PtgId::Err,
        PtgId::Bool,
        PtgId::Int,
        PtgId::Num,
    ];

    const CLASSED: [PtgId; 15] = [
        PtgId::Array,
        PtgId::Func,
        PtgId::FuncVar,
        PtgId::Name,
        PtgId::Ref,
        PtgId::Area,
        PtgId::RefErr,
        PtgId::AreaErr,
        PtgId::RefN,
        PtgId::AreaN,
        PtgId::NameX,
        PtgId::Ref3d,
        PtgId::Area3d,
        PtgId::RefErr3d,
        PtgId::AreaErr3d,
    ];
}

/// A ptg id together with its class bits.
///
/// `class` is `None` for unclassed ptgs (operators, literals, markers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Opcode {
    pub id: PtgId,
    pub class: Option<RefClass>,
}

impl Opcode {
    /// Pack into the legacy BIFF8 ptg byte.
    pub fn to_byte(self) -> u8 {
        match self.class {
            Some(class) if self.id.is_classed() => self.id.base() | class.bits(),
            _ => self.id.base(),
        }
    }

    /// Unpack a legacy BIFF8 ptg byte. `0x00` decodes as [`PtgId::Unsupported`].
    pub fn from_byte(byte: u8) -> Option<Self> {
        if byte == 0x00 {
            return Some(Opcode {
                id: PtgId::Unsupported,
                class: None,
            });
        }
        match RefClass::from_bits(byte) {
            Some(class) => {
                let base = RefClass::strip(byte);
                PtgId::CLASSED
                    .iter()
                    .find(|id| id.base() == base)
                    .map(|&id| Opcode {
                        id,
                        class: Some(class),
                    })
            }
            None => PtgId::UNCLASSED
                .iter()
                .find(|id| id.base() == byte)
                .map(|&id| Opcode { id, class: None }),
        }
    }
}

/// BIFF error literal codes (`PtgErr`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    Null,
    Div0,
    Value,
    Ref,
    Name,
    Num,
    NA,
}

impl ErrorCode {
    pub const fn code(self) -> u8 {
        match self {
            ErrorCode::Null => 0x00,
            ErrorCode::Div0 => 0x07,
            ErrorCode::Value => 0x0F,
            ErrorCode::Ref => 0x17,
            ErrorCode::Name => 0x1D,
            ErrorCode::Num => 0x24,
            ErrorCode::NA => 0x2A,
        }
    }

    pub const fn literal(self) -> &'static str {
        match self {
            ErrorCode::Null => "#NULL!",
            ErrorCode::Div0 => "#DIV/0!",
            ErrorCode::Value => "#VALUE!",
            ErrorCode::Ref => "#REF!",
            ErrorCode::Name => "#NAME?",
            ErrorCode::Num => "#NUM!",
            ErrorCode::NA => "#N/A",
        }
    }

    /// Parse an Excel error literal (case-insensitive).
    pub fn from_literal(literal: &str) -> Option<Self> {
        match literal.trim().to_ascii_uppercase().as_str() {
            "#NULL!" => Some(ErrorCode::Null),
            "#DIV/0!" => Some(ErrorCode::Div0),
            "#VALUE!" => Some(ErrorCode::Value),
            "#REF!" => Some(ErrorCode::Ref),
            "#NAME?" => Some(ErrorCode::Name),
            "#NUM!" => Some(ErrorCode::Num),
            "#N/A" => Some(ErrorCode::NA),
            _ => None,
        }
    }
}

/// Kinds of `PtgAttr` formatting markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttrKind {
    /// Spaces before an operand.
    Space,
}

/// Operators that have a dedicated ptg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Power,
    Concat,
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
    Ne,
    Intersect,
    Union,
    Range,
    UnaryPlus,
    UnaryMinus,
    Percent,
}

impl Operator {
    pub const fn ptg(self) -> PtgId {
        match self {
            Operator::Add => PtgId::Add,
            Operator::Sub => PtgId::Sub,
            Operator::Mul => PtgId::Mul,
            Operator::Div => PtgId::Div,
            Operator::Power => PtgId::Power,
            Operator::Concat => PtgId::Concat,
            Operator::Lt => PtgId::Lt,
            Operator::Le => PtgId::Le,
            Operator::Eq => PtgId::Eq,
            Operator::Ge => PtgId::Ge,
            Operator::Gt => PtgId::Gt,
            Operator::Ne => PtgId::Ne,
            Operator::Intersect => PtgId::Isect,
            Operator::Union => PtgId::Union,
            Operator::Range => PtgId::Range,
            Operator::UnaryPlus => PtgId::Uplus,
            Operator::UnaryMinus => PtgId::Uminus,
            Operator::Percent => PtgId::Percent,
        }
    }
}

/// A single element of an array literal (`{1,"a";TRUE,#N/A}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrayValue {
    Empty,
    Number(f64),
    Str(String),
    Bool(bool),
    Error(ErrorCode),
}

/// Token payloads. Each variant maps to exactly one [`PtgId`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    Int(u16),
    Num(f64),
    Str(String),
    Bool(bool),
    Err(ErrorCode),
    MissArg,
    Paren,
    Attr {
        kind: AttrKind,
        count: u16,
    },
    Operator(Operator),
    /// Fixed-arity function call (`PtgFunc`).
    Func {
        iftab: u16,
        argc: u8,
    },
    /// Variable-arity function call (`PtgFuncVar`).
    FuncVar {
        iftab: u16,
        argc: u8,
    },
    /// Rows of equal length.
    Array(Vec<Vec<ArrayValue>>),
    /// Workbook-level defined name (1-based index into the name table).
    Name {
        index: u16,
    },
    /// Name resolved through the external-sheet table.
    NameX {
        ixti: u16,
        index: u16,
    },
    /// Single cell. `offset` marks anchor-relative (`PtgRefN`) addressing.
    Ref {
        cell: CellAddr,
        offset: bool,
    },
    Area {
        first: CellAddr,
        last: CellAddr,
        offset: bool,
    },
    /// Sheet-qualified cell. Always sheet coordinates, never anchor offsets.
    Ref3d {
        ixti: u16,
        cell: CellAddr,
    },
    Area3d {
        ixti: u16,
        first: CellAddr,
        last: CellAddr,
    },
    RefErr,
    AreaErr,
    RefErr3d {
        ixti: u16,
    },
    AreaErr3d {
        ixti: u16,
    },
    Unsupported,
}

impl TokenKind {
    pub fn ptg(&self) -> PtgId {
        match self {
            TokenKind::Int(_) => PtgId::Int,
            TokenKind::Num(_) => PtgId::Num,
            TokenKind::Str(_) => PtgId::Str,
            TokenKind::Bool(_) => PtgId::Bool,
            TokenKind::Err(_) => PtgId::Err,
            TokenKind::MissArg => PtgId::MissArg,
            TokenKind::Paren => PtgId::Paren,
            TokenKind::Attr { .. } => PtgId::Attr,
            TokenKind::Operator(op) => op.ptg(),
            TokenKind::Func { .. } => PtgId::Func,
            TokenKind::FuncVar { .. } => PtgId::FuncVar,
            TokenKind::Array(_) => PtgId::Array,
            TokenKind::Name { .. } => PtgId::Name,
            TokenKind::NameX { .. } => PtgId::NameX,
            TokenKind::Ref { offset: false, .. } => PtgId::Ref,
            TokenKind::Ref { offset: true, .. } => PtgId::RefN,
            TokenKind::Area { offset: false, .. } => PtgId::Area,
            TokenKind::Area { offset: true, .. } => PtgId::AreaN,
            TokenKind::Ref3d { .. } => PtgId::Ref3d,
            TokenKind::Area3d { .. } => PtgId::Area3d,
            TokenKind::RefErr => PtgId::RefErr,
            TokenKind::AreaErr => PtgId::AreaErr,
            TokenKind::RefErr3d { .. } => PtgId::RefErr3d,
            TokenKind::AreaErr3d { .. } => PtgId::AreaErr3d,
            TokenKind::Unsupported => PtgId::Unsupported,
        }
    }
}

/// One emitted instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    kind: TokenKind,
    class: Option<RefClass>,
}

impl Token {
    /// Build a token. `class` is dropped for unclassed ptgs.
    pub fn new(kind: TokenKind, class: RefClass) -> Self {
        let class = kind.ptg().is_classed().then_some(class);
        Self { kind, class }
    }

    /// Build an unclassed token (literals, operators, markers).
    pub fn unclassed(kind: TokenKind) -> Self {
        debug_assert!(!kind.ptg().is_classed(), "{kind:?} requires a class");
        Self { kind, class: None }
    }

    pub fn kind(&self) -> &TokenKind {
        &self.kind
    }

    pub fn ptg(&self) -> PtgId {
        self.kind.ptg()
    }

    pub fn class(&self) -> Option<RefClass> {
        self.class
    }

    pub fn opcode(&self) -> Opcode {
        Opcode {
            id: self.ptg(),
            class: self.class,
        }
    }

    /// Rewrite the class bits. No-op for unclassed ptgs.
    pub fn set_class(&mut self, class: RefClass) {
        if self.class.is_some() {
            self.class = Some(class);
        }
    }
}
