//! Formula -> RPN token conversion.
//!
//! [`FormulaConverter`] exposes one `push_*` callback per formula element. A grammar front end
//! (the one in [`crate::parser`], or a caller's own) walks the formula left to right, calls the
//! matching callback for each element and asks for class rewrites through
//! [`FormulaConverter::reclassify`] as soon as it knows how an operand is consumed.
//!
//! Conversion runs between [`begin`](FormulaConverter::begin) and
//! [`finish`](FormulaConverter::finish); [`parse`](FormulaConverter::parse) does both around the
//! built-in front end.

use crate::address::{CellAddr, CellCoord};
use crate::builder::{TokenList, TokenListBuilder};
use crate::class::RefClass;
use crate::error::ConvertError;
use crate::functions::FunctionCatalog;
use crate::options::ConvertOptions;
use crate::parser;
use crate::ptg::{ArrayValue, AttrKind, ErrorCode, Operator, Token, TokenKind};
use crate::resolver::{ClassResolver, ParseState};
use crate::workbook::{NameScope, WorkbookNames};

/// Longest string literal a `PtgStr` can hold.
pub const MAX_STRING_CHARS: usize = 255;

/// Operator symbols as recognized by a front end.
///
/// Symbols without a BIFF8 ptg (`@`, postfix `#`, anything unrecognized) convert to the
/// unsupported placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorSymbol {
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
    UnaryPlus,
    UnaryMinus,
    Percent,
    ImplicitIntersection,
    SpillRange,
    Other(char),
}

impl OperatorSymbol {
    fn operator(self) -> Option<Operator> {
        Some(match self {
            OperatorSymbol::Add => Operator::Add,
            OperatorSymbol::Sub => Operator::Sub,
            OperatorSymbol::Mul => Operator::Mul,
            OperatorSymbol::Div => Operator::Div,
            OperatorSymbol::Power => Operator::Power,
            OperatorSymbol::Concat => Operator::Concat,
            OperatorSymbol::Lt => Operator::Lt,
            OperatorSymbol::Le => Operator::Le,
            OperatorSymbol::Eq => Operator::Eq,
            OperatorSymbol::Ge => Operator::Ge,
            OperatorSymbol::Gt => Operator::Gt,
            OperatorSymbol::Ne => Operator::Ne,
            OperatorSymbol::UnaryPlus => Operator::UnaryPlus,
            OperatorSymbol::UnaryMinus => Operator::UnaryMinus,
            OperatorSymbol::Percent => Operator::Percent,
            OperatorSymbol::ImplicitIntersection
            | OperatorSymbol::SpillRange
            | OperatorSymbol::Other(_) => return None,
        })
    }

    fn display_char(self) -> Option<char> {
        match self {
            OperatorSymbol::ImplicitIntersection => Some('@'),
            OperatorSymbol::SpillRange => Some('#'),
            OperatorSymbol::Other(ch) => Some(ch),
            _ => None,
        }
    }
}

/// Converts one formula into a [`TokenList`].
pub struct FormulaConverter<'a> {
    formula: String,
    options: ConvertOptions,
    functions: &'a dyn FunctionCatalog,
    workbook: &'a dyn WorkbookNames,
    /// `Some` while a conversion is in progress.
    builder: Option<TokenListBuilder>,
    resolver: ClassResolver,
    has_errors: bool,
    position: usize,
    result: Option<TokenList>,
}

impl std::fmt::Debug for FormulaConverter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormulaConverter")
            .field("formula", &self.formula)
            .field("options", &self.options)
            .field("converting", &self.builder.is_some())
            .field("has_errors", &self.has_errors)
            .finish_non_exhaustive()
    }
}

impl<'a> FormulaConverter<'a> {
    pub fn new(
        formula: impl Into<String>,
        options: ConvertOptions,
        functions: &'a dyn FunctionCatalog,
        workbook: &'a dyn WorkbookNames,
    ) -> Self {
        Self {
            formula: formula.into(),
            options,
            functions,
            workbook,
            builder: None,
            resolver: ClassResolver::new(),
            has_errors: false,
            position: 0,
            result: None,
        }
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    pub(crate) fn functions(&self) -> &'a dyn FunctionCatalog {
        self.functions
    }

    /// Move the relative-addressing anchor.
    pub fn set_anchor(&mut self, row: u32, col: u32) {
        self.options.anchor = CellCoord::new(row, col);
    }

    /// Switch foreign-file-format mode (forward-declared names, no R1C1 notation).
    pub fn set_reading_foreign_format(&mut self, reading: bool) {
        self.options.reading_foreign_format = reading;
    }

    /// Whether any error was recorded (degrade mode) or raised by the last conversion.
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    /// The frozen result of the last successful conversion.
    pub fn token_list(&self) -> Option<&TokenList> {
        self.result.as_ref()
    }

    pub fn into_token_list(self) -> Option<TokenList> {
        self.result
    }

    pub fn is_converting(&self) -> bool {
        self.builder.is_some()
    }

    /// Convert the configured formula text with the built-in front end.
    ///
    /// On failure no token list is kept and [`has_errors`](Self::has_errors) stays set.
    pub fn parse(&mut self) -> Result<&TokenList, ConvertError> {
        self.begin();
        let formula = self.formula.clone();
        match parser::drive(&formula, self) {
            Ok(()) => Ok(self.finish()),
            Err(err) => {
                self.abort();
                self.has_errors = true;
                Err(err)
            }
        }
    }

    /// Start a conversion: fresh builder, no last operand, error flag cleared.
    pub fn begin(&mut self) {
        assert!(self.builder.is_none(), "conversion already in progress");
        self.builder = Some(TokenListBuilder::new());
        self.resolver.reset();
        self.has_errors = false;
        self.position = 0;
        self.result = None;
    }

    /// Freeze the emitted tokens and return to idle.
    ///
    /// # Panics
    ///
    /// Panics if no conversion is in progress.
    pub fn finish(&mut self) -> &TokenList {
        let builder = self.builder.take().expect("finish() without begin()");
        self.resolver.reset();
        self.result.insert(builder.freeze(self.formula.chars().count()))
    }

    /// Drop the builder without producing a token list.
    pub fn abort(&mut self) {
        self.builder = None;
        self.resolver.reset();
    }

    /// Record the scan position (character offset) used in error reports.
    pub fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    pub fn position(&self) -> usize {
        self.position
    }

    fn builder(&self) -> &TokenListBuilder {
        self.builder
            .as_ref()
            .expect("no conversion in progress; call begin() first")
    }

    fn emit(&mut self, token: Token) -> usize {
        let builder = self
            .builder
            .as_mut()
            .expect("no conversion in progress; call begin() first");
        let index = builder.append(token);
        self.resolver.record_emission(index, builder.get(index));
        index
    }

    fn char_at_position(&self) -> Option<char> {
        self.formula.chars().nth(self.position)
    }

    pub(crate) fn malformed(&self, message: impl Into<String>, ch: Option<char>) -> ConvertError {
        ConvertError::MalformedFormula {
            formula: self.formula.clone(),
            message: message.into(),
            ch,
            position: self.position,
        }
    }

    fn invalid_reference(&self, reference: impl Into<String>) -> ConvertError {
        ConvertError::InvalidReference {
            formula: self.formula.clone(),
            reference: reference.into(),
        }
    }

    /// Apply the error policy: raise, or record and optionally push a placeholder.
    pub(crate) fn report(
        &mut self,
        err: ConvertError,
        push_placeholder: bool,
    ) -> Result<(), ConvertError> {
        if self.options.throw_on_error {
            return Err(err);
        }
        log::warn!("{err}");
        self.has_errors = true;
        if push_placeholder {
            self.emit(Token::unclassed(TokenKind::Unsupported));
        }
        Ok(())
    }

    // --- class resolution -------------------------------------------------------------------

    /// Rewrite the class of the last operand for a consumer expecting `desired`.
    pub fn reclassify(
        &mut self,
        desired: RefClass,
        state: ParseState,
        ignore_array_hint: bool,
    ) -> Result<(), ConvertError> {
        let builder = self
            .builder
            .as_mut()
            .expect("no conversion in progress; call begin() first");
        if self
            .resolver
            .reclassify(builder, desired, state, ignore_array_hint)
            .is_err()
        {
            let err = self.malformed(
                format!("expected an operand before a {desired} consumer"),
                self.char_at_position(),
            );
            return self.report(err, false);
        }
        Ok(())
    }

    /// Whether the last operand currently has reference class.
    pub fn current_is_reference(&self) -> bool {
        self.builder
            .as_ref()
            .is_some_and(|builder| self.resolver.current_is_reference(builder))
    }

    /// Number of tokens emitted so far.
    pub fn emitted(&self) -> usize {
        self.builder().len()
    }

    // --- literals ---------------------------------------------------------------------------

    pub fn push_int(&mut self, value: u16) {
        self.emit(Token::unclassed(TokenKind::Int(value)));
    }

    /// Push a number, using `PtgInt` when the value is an integer in `0..=65535`.
    pub fn push_number(&mut self, value: f64) {
        if value >= 0.0 && value <= f64::from(u16::MAX) && value.fract() == 0.0 {
            self.push_int(value as u16);
        } else {
            self.emit(Token::unclassed(TokenKind::Num(value)));
        }
    }

    pub fn push_string(&mut self, value: &str) -> Result<(), ConvertError> {
        let len = value.chars().count();
        if len > MAX_STRING_CHARS {
            let err = self.malformed(
                format!("string literal is {len} characters (max {MAX_STRING_CHARS})"),
                None,
            );
            return self.report(err, true);
        }
        self.emit(Token::unclassed(TokenKind::Str(value.to_string())));
        Ok(())
    }

    pub fn push_bool(&mut self, value: bool) {
        self.emit(Token::unclassed(TokenKind::Bool(value)));
    }

    pub fn push_error(&mut self, code: ErrorCode) {
        self.emit(Token::unclassed(TokenKind::Err(code)));
    }

    /// Push an error literal given as text (`#DIV/0!`).
    pub fn push_error_literal(&mut self, literal: &str) -> Result<(), ConvertError> {
        match ErrorCode::from_literal(literal) {
            Some(code) => {
                self.push_error(code);
                Ok(())
            }
            None => {
                let err = self.malformed(format!("unknown error literal `{literal}`"), Some('#'));
                self.report(err, true)
            }
        }
    }

    pub fn push_missing_arg(&mut self) {
        self.emit(Token::unclassed(TokenKind::MissArg));
    }

    /// Push an array literal. Rows must be non-empty and of equal length.
    pub fn push_array(&mut self, rows: Vec<Vec<ArrayValue>>) -> Result<(), ConvertError> {
        let width = rows.first().map_or(0, Vec::len);
        if width == 0 || rows.iter().any(|row| row.len() != width) {
            let err = self.malformed("array literal rows must have the same length", Some('{'));
            return self.report(err, true);
        }
        self.emit(Token::new(TokenKind::Array(rows), RefClass::Array));
        Ok(())
    }

    // --- markers ----------------------------------------------------------------------------

    pub fn push_paren(&mut self) {
        self.emit(Token::unclassed(TokenKind::Paren));
    }

    pub fn push_attr(&mut self, kind: AttrKind, count: u16) {
        self.emit(Token::unclassed(TokenKind::Attr { kind, count }));
    }

    // --- operators and functions ------------------------------------------------------------

    pub fn push_operator(&mut self, symbol: OperatorSymbol) -> Result<(), ConvertError> {
        match symbol.operator() {
            Some(op) => {
                self.emit(Token::unclassed(TokenKind::Operator(op)));
                Ok(())
            }
            None => {
                let err = self.malformed("unsupported operator", symbol.display_char());
                self.report(err, true)
            }
        }
    }

    /// Push a reference operator: `:` range, `,` union, ` ` intersection.
    pub fn push_separator(&mut self, separator: char) -> Result<(), ConvertError> {
        let op = match separator {
            ':' => Operator::Range,
            ',' => Operator::Union,
            ' ' => Operator::Intersect,
            other => {
                let err = self.malformed("expected a reference operator", Some(other));
                return self.report(err, true);
            }
        };
        self.emit(Token::unclassed(TokenKind::Operator(op)));
        Ok(())
    }

    /// Push a call to `name` with `argc` arguments already on the stack.
    pub fn push_function(&mut self, name: &str, argc: usize) -> Result<(), ConvertError> {
        let Some(info) = self.functions.lookup(name) else {
            let err = self.malformed(format!("unknown function `{name}`"), None);
            return self.report(err, true);
        };
        if argc < usize::from(info.min_args) || argc > usize::from(info.max_args) {
            let err = self.malformed(
                format!(
                    "`{}` expects {}..={} arguments, got {argc}",
                    name.to_ascii_uppercase(),
                    info.min_args,
                    info.max_args
                ),
                None,
            );
            return self.report(err, true);
        }
        let Ok(argc) = u8::try_from(argc) else {
            let err = ConvertError::Internal {
                formula: self.formula.clone(),
                message: format!("argument count {argc} does not fit PtgFuncVar"),
            };
            return Err(err);
        };

        let kind = if info.is_fixed_arity() {
            TokenKind::Func {
                iftab: info.iftab,
                argc,
            }
        } else {
            TokenKind::FuncVar {
                iftab: info.iftab,
                argc,
            }
        };
        self.emit(Token::new(kind, info.return_class));
        Ok(())
    }

    // --- names ------------------------------------------------------------------------------

    /// Push a workbook-level defined name.
    pub fn push_name(&mut self, name: &str) -> Result<(), ConvertError> {
        match self.local_name_index(name) {
            Some(index) => {
                self.emit(Token::new(TokenKind::Name { index }, RefClass::Reference));
                Ok(())
            }
            None => {
                let err = self.invalid_reference(name);
                self.report(err, true)
            }
        }
    }

    /// Push an external name by its resolved indices.
    pub fn push_name_x(&mut self, ixti: u16, index: u16) {
        self.emit(Token::new(
            TokenKind::NameX { ixti, index },
            RefClass::Reference,
        ));
    }

    /// Push `qualifier!name`, resolving whether the qualifier is this workbook or another one.
    pub fn push_name_x_by_name(&mut self, qualifier: &str, name: &str) -> Result<(), ConvertError> {
        let kind = match self.workbook.name_scope(qualifier) {
            Some(NameScope::Local) => self
                .local_name_index(name)
                .map(|index| TokenKind::Name { index }),
            Some(NameScope::External { ixti }) => {
                let index = self.workbook.external_name_index(ixti, name).or_else(|| {
                    self.options
                        .may_mutate_workbook
                        .then(|| self.workbook.ensure_external_name(ixti, name))
                        .flatten()
                });
                index.map(|index| TokenKind::NameX { ixti, index })
            }
            None => None,
        };

        match kind {
            Some(kind) => {
                self.emit(Token::new(kind, RefClass::Reference));
                Ok(())
            }
            None => {
                let err = self.invalid_reference(format!("{qualifier}!{name}"));
                self.report(err, true)
            }
        }
    }

    fn local_name_index(&self, name: &str) -> Option<u16> {
        self.workbook.name_index(name).or_else(|| {
            (self.options.reading_foreign_format && self.options.may_mutate_workbook)
                .then(|| self.workbook.add_placeholder_name(name))
                .flatten()
        })
    }

    // --- references -------------------------------------------------------------------------

    /// Push an unqualified single-cell reference.
    pub fn push_ref(&mut self, cell: CellAddr) -> Result<(), ConvertError> {
        self.emit_reference(None, cell, None)
    }

    /// Push an unqualified area reference. Corners are kept in the given order.
    pub fn push_area(&mut self, first: CellAddr, last: CellAddr) -> Result<(), ConvertError> {
        self.emit_reference(None, first, Some(last))
    }

    /// Push a sheet-qualified single-cell reference (`Sheet1!A1`).
    pub fn push_ref_3d(&mut self, sheet: &str, cell: CellAddr) -> Result<(), ConvertError> {
        self.emit_reference(Some(sheet), cell, None)
    }

    /// Push a sheet-qualified area reference (`Sheet1:Sheet3!A1:B2`).
    pub fn push_area_3d(
        &mut self,
        sheet: &str,
        first: CellAddr,
        last: CellAddr,
    ) -> Result<(), ConvertError> {
        self.emit_reference(Some(sheet), first, Some(last))
    }

    /// Push a `#REF!` placeholder reference.
    pub fn push_ref_err(&mut self, area: bool) -> Result<(), ConvertError> {
        match self.options.force_3d.clone() {
            Some(sheet) => self.push_ref_err_3d(&sheet, area),
            None => {
                let kind = if area {
                    TokenKind::AreaErr
                } else {
                    TokenKind::RefErr
                };
                self.emit(Token::new(kind, RefClass::Reference));
                Ok(())
            }
        }
    }

    /// Push a sheet-qualified `#REF!` placeholder reference.
    pub fn push_ref_err_3d(&mut self, sheet: &str, area: bool) -> Result<(), ConvertError> {
        let Some(ixti) = self.resolve_sheet(sheet) else {
            let err = self.invalid_reference(sheet);
            return self.report(err, true);
        };
        let kind = if area {
            TokenKind::AreaErr3d { ixti }
        } else {
            TokenKind::RefErr3d { ixti }
        };
        self.emit(Token::new(kind, RefClass::Reference));
        Ok(())
    }

    fn resolve_sheet(&self, sheet: &str) -> Option<u16> {
        self.workbook.external_sheet_index(sheet).or_else(|| {
            self.options
                .may_mutate_workbook
                .then(|| self.workbook.ensure_external_sheet(sheet))
                .flatten()
        })
    }

    /// Pick the reference shape: 3-D first, then anchor-relative offsets, then plain.
    ///
    /// 3-D references always carry sheet coordinates; offsets apply to the 2-D forms only.
    fn emit_reference(
        &mut self,
        sheet: Option<&str>,
        first: CellAddr,
        last: Option<CellAddr>,
    ) -> Result<(), ConvertError> {
        let (first, last) = if self.options.force_absolute {
            (first.into_absolute(), last.map(CellAddr::into_absolute))
        } else {
            (first, last)
        };

        let sheet = sheet
            .map(str::to_string)
            .or_else(|| self.options.force_3d.clone());

        let kind = match sheet {
            Some(sheet) => {
                let Some(ixti) = self.resolve_sheet(&sheet) else {
                    let err = self.invalid_reference(sheet);
                    return self.report(err, true);
                };
                match last {
                    None => TokenKind::Ref3d { ixti, cell: first },
                    Some(last) => TokenKind::Area3d { ixti, first, last },
                }
            }
            None => {
                let offset = self.options.relative_addressing && !self.options.force_absolute;
                let anchor = self.options.anchor;
                let place = |cell: CellAddr| {
                    if offset {
                        cell.offset_from(anchor)
                    } else {
                        cell
                    }
                };
                match last {
                    None => TokenKind::Ref {
                        cell: place(first),
                        offset,
                    },
                    Some(last) => TokenKind::Area {
                        first: place(first),
                        last: place(last),
                        offset,
                    },
                }
            }
        };
        self.emit(Token::new(kind, RefClass::Reference));
        Ok(())
    }
}

/// Convert `formula` in one call.
pub fn convert_formula(
    formula: &str,
    options: ConvertOptions,
    functions: &dyn FunctionCatalog,
    workbook: &dyn WorkbookNames,
) -> Result<TokenList, ConvertError> {
    let mut converter = FormulaConverter::new(formula, options, functions, workbook);
    converter.parse()?;
    converter
        .into_token_list()
        .ok_or_else(|| ConvertError::Internal {
            formula: formula.to_string(),
            message: "conversion finished without a token list".to_string(),
        })
}
