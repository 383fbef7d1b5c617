//! Spreadsheet formula to BIFF8 RPN token conversion.
//!
//! This crate turns formula text (`=SUM(Sheet1!A1:B2)*2`) into the postfix ptg token list stored
//! in BIFF8 `.xls` records:
//! - [`FormulaConverter`]: one `push_*` callback per formula element, driven by the built-in
//!   front end ([`FormulaConverter::parse`]) or by a caller's own grammar
//! - [`ClassResolver`]: rewrites the reference class (reference / value / array) of each operand
//!   once its consumer is known
//! - [`TokenList`]: the frozen, ordered result; [`TokenList::opcode_bytes`] yields the ptg bytes
//!   with class bits applied
//!
//! Workbook lookups (sheets, defined names, external books) go through [`WorkbookNames`];
//! function metadata through [`FunctionCatalog`]. [`InMemoryWorkbook`] and
//! [`BuiltinFunctions`] are ready-made implementations.
//!
//! Notes:
//! - Errors either abort the conversion or, with `throw_on_error` off, are logged, recorded in
//!   [`FormulaConverter::has_errors`] and replaced by a [`PtgId::Unsupported`] placeholder.
//! - Structured references, whole-row/column ranges and operand byte layouts are out of scope.

pub mod address;
pub mod builder;
pub mod class;
pub mod converter;
pub mod error;
pub mod functions;
pub mod options;
mod parser;
pub mod ptg;
pub mod resolver;
pub mod workbook;

pub use address::{CellAddr, CellCoord};
pub use builder::{TokenList, TokenListBuilder};
pub use class::RefClass;
pub use converter::{convert_formula, FormulaConverter, OperatorSymbol};
pub use error::ConvertError;
pub use functions::{BuiltinFunctions, FunctionCatalog, FunctionInfo, FTAB_USER_DEFINED};
pub use options::ConvertOptions;
pub use ptg::{ArrayValue, AttrKind, ErrorCode, Opcode, Operator, PtgId, Token, TokenKind};
pub use resolver::{ClassResolver, ParseState};
pub use workbook::{InMemoryWorkbook, NameScope, WorkbookNames};
