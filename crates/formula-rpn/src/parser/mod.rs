//! Reference grammar front end.
//!
//! A precedence-climbing parser over A1-style formula text that drives a
//! [`FormulaConverter`] directly: operands are pushed as they are recognized, operators after
//! their operands, and every operand is reclassified for its consumer before the consumer is
//! pushed.

mod lexer;

use crate::address::{parse_a1, parse_r1c1, CellAddr};
use crate::class::RefClass;
use crate::converter::{FormulaConverter, OperatorSymbol};
use crate::error::ConvertError;
use crate::ptg::{ArrayValue, AttrKind, ErrorCode};
use crate::resolver::ParseState;

use lexer::{Lexeme, Token};

/// Function nesting limit (Excel allows 64 levels).
const MAX_NESTED_CALLS: usize = 64;

/// Limit on recursive sub-expressions: groups, prefix operators and calls together.
const MAX_NESTING: usize = 128;

/// Why the front end stopped early.
enum Halt {
    /// The error policy raised.
    Failed(ConvertError),
    /// An error was recorded in degrade mode; the rest of the formula is skipped.
    Recovered,
}

impl From<ConvertError> for Halt {
    fn from(err: ConvertError) -> Self {
        Halt::Failed(err)
    }
}

type PResult<T = ()> = Result<T, Halt>;

/// Parse context for one nesting level.
#[derive(Debug, Clone, Copy)]
struct Scope {
    state: ParseState,
    /// `,` is the union operator here (not an argument separator).
    union: bool,
}

impl Scope {
    fn nested(self, union: bool) -> Self {
        Self {
            state: self.state.nested(),
            union,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryKind {
    /// Consumes values: arithmetic, comparison, concatenation.
    Value(OperatorSymbol),
    /// Consumes references: `:`, `,`, intersection.
    Reference(char),
}

fn binding_power(kind: BinaryKind) -> (u8, u8) {
    match kind {
        BinaryKind::Reference(':') => (82, 83),
        BinaryKind::Reference(' ') => (81, 82),
        BinaryKind::Reference(_) => (80, 81),
        BinaryKind::Value(OperatorSymbol::Power) => (50, 51),
        BinaryKind::Value(OperatorSymbol::Mul | OperatorSymbol::Div) => (40, 41),
        BinaryKind::Value(OperatorSymbol::Add | OperatorSymbol::Sub) => (30, 31),
        BinaryKind::Value(OperatorSymbol::Concat) => (20, 21),
        BinaryKind::Value(_) => (10, 11),
    }
}

const PREFIX_BP: u8 = 70;
const POSTFIX_BP: u8 = 60;

/// Run the front end over `formula` (with or without a leading `=`).
pub(crate) fn drive(formula: &str, conv: &mut FormulaConverter<'_>) -> Result<(), ConvertError> {
    let (src, offset) = match formula.strip_prefix('=') {
        Some(rest) => (rest, 1),
        None => (formula, 0),
    };

    let tokens = match lexer::lex(src) {
        Ok(tokens) => tokens,
        Err(err) => {
            conv.set_position(err.position + offset);
            let err = conv.malformed(err.message, err.ch);
            return conv.report(err, true);
        }
    };

    let options = conv.options();
    let forced_array = options.array_formula || options.target_class == RefClass::Array;
    let target = options.target_class;
    let top = Scope {
        state: ParseState::new(0, forced_array),
        union: true,
    };

    let mut parser = Parser {
        conv,
        tokens,
        pos: 0,
        offset,
        call_depth: 0,
        depth: 0,
    };
    match parser.formula(top, target) {
        Ok(()) | Err(Halt::Recovered) => Ok(()),
        Err(Halt::Failed(err)) => Err(err),
    }
}

struct Parser<'c, 'a> {
    conv: &'c mut FormulaConverter<'a>,
    tokens: Vec<Token>,
    pos: usize,
    offset: usize,
    call_depth: usize,
    depth: usize,
}

impl Parser<'_, '_> {
    fn peek(&self) -> &Lexeme {
        &self.tokens[self.pos].lexeme
    }

    fn peek_nth(&self, n: usize) -> &Lexeme {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx].lexeme
    }

    fn next(&mut self) -> Lexeme {
        let lexeme = self.tokens[self.pos].lexeme.clone();
        self.mark();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        lexeme
    }

    /// Point error reports at the current token.
    fn mark(&mut self) {
        let start = self.tokens[self.pos].start + self.offset;
        self.conv.set_position(start);
    }

    fn skip_whitespace(&mut self) -> usize {
        let mut count = 0;
        while let Lexeme::Whitespace(n) = *self.peek() {
            count += n;
            self.pos += 1;
        }
        count
    }

    fn current_char(&self) -> Option<char> {
        self.conv.formula().chars().nth(self.conv.position())
    }

    /// Report a syntax error at the current token.
    fn syntax_error<T>(&mut self, message: impl Into<String>) -> PResult<T> {
        self.mark();
        let err = self.conv.malformed(message, self.current_char());
        self.conv.report(err, true)?;
        Err(Halt::Recovered)
    }

    /// Enter a nested sub-expression; pair with [`leave`](Self::leave).
    fn enter(&mut self) -> PResult {
        if self.depth >= MAX_NESTING {
            return self.syntax_error(format!("formula nesting exceeds {MAX_NESTING} levels"));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn formula(&mut self, top: Scope, target: RefClass) -> PResult {
        // Leading whitespace stays in place for the space attribute.
        let first = self.tokens[self.pos..]
            .iter()
            .position(|t| !matches!(t.lexeme, Lexeme::Whitespace(_)))
            .map_or(self.tokens.len() - 1, |n| self.pos + n);
        if matches!(self.tokens[first].lexeme, Lexeme::Eof) {
            self.pos = first;
            return self.syntax_error("empty formula");
        }
        self.expression(0, top)?;
        self.skip_whitespace();
        if !matches!(self.peek(), Lexeme::Eof) {
            return self.syntax_error("unexpected input after expression");
        }
        self.mark();
        self.conv.reclassify(target, top.state, false)?;
        Ok(())
    }

    fn expression(&mut self, min_bp: u8, scope: Scope) -> PResult {
        self.prefix(scope)?;

        loop {
            let ws = self.skip_whitespace();
            let lexeme = self.peek().clone();
            let kind = match &lexeme {
                Lexeme::Percent if ws == 0 => {
                    if POSTFIX_BP < min_bp {
                        break;
                    }
                    self.mark();
                    self.conv.reclassify(RefClass::Value, scope.state, false)?;
                    self.next();
                    self.conv.push_operator(OperatorSymbol::Percent)?;
                    continue;
                }
                Lexeme::Hash if ws == 0 => {
                    if POSTFIX_BP < min_bp {
                        break;
                    }
                    self.next();
                    self.conv.push_operator(OperatorSymbol::SpillRange)?;
                    continue;
                }
                Lexeme::Colon => BinaryKind::Reference(':'),
                Lexeme::Comma if scope.union => BinaryKind::Reference(','),
                Lexeme::Caret => BinaryKind::Value(OperatorSymbol::Power),
                Lexeme::Star => BinaryKind::Value(OperatorSymbol::Mul),
                Lexeme::Slash => BinaryKind::Value(OperatorSymbol::Div),
                Lexeme::Plus => BinaryKind::Value(OperatorSymbol::Add),
                Lexeme::Minus => BinaryKind::Value(OperatorSymbol::Sub),
                Lexeme::Amp => BinaryKind::Value(OperatorSymbol::Concat),
                Lexeme::Eq => BinaryKind::Value(OperatorSymbol::Eq),
                Lexeme::Ne => BinaryKind::Value(OperatorSymbol::Ne),
                Lexeme::Lt => BinaryKind::Value(OperatorSymbol::Lt),
                Lexeme::Le => BinaryKind::Value(OperatorSymbol::Le),
                Lexeme::Gt => BinaryKind::Value(OperatorSymbol::Gt),
                Lexeme::Ge => BinaryKind::Value(OperatorSymbol::Ge),
                Lexeme::Other(ch) => BinaryKind::Value(OperatorSymbol::Other(*ch)),
                Lexeme::Ident(_) | Lexeme::QuotedIdent(_) | Lexeme::LParen
                    if ws > 0 && self.conv.current_is_reference() =>
                {
                    BinaryKind::Reference(' ')
                }
                _ => break,
            };

            let (l_bp, r_bp) = binding_power(kind);
            if l_bp < min_bp {
                break;
            }
            // The intersection operator is the whitespace itself; nothing to consume.
            let op_pos = self.pos;
            if kind != BinaryKind::Reference(' ') {
                self.next();
            }

            let consumes = match kind {
                BinaryKind::Value(_) => RefClass::Value,
                BinaryKind::Reference(_) => RefClass::Reference,
            };
            self.conv.reclassify(consumes, scope.state, false)?;
            self.expression(r_bp, scope)?;
            self.conv.reclassify(consumes, scope.state, false)?;

            self.conv.set_position(self.tokens[op_pos].start + self.offset);
            match kind {
                BinaryKind::Value(symbol) => self.conv.push_operator(symbol)?,
                BinaryKind::Reference(separator) => self.conv.push_separator(separator)?,
            }
        }

        Ok(())
    }

    fn prefix(&mut self, scope: Scope) -> PResult {
        let ws = self.skip_whitespace();
        if ws > 0 {
            let count = u16::try_from(ws).unwrap_or(u16::MAX);
            self.conv.push_attr(AttrKind::Space, count);
        }

        let at = self.pos;
        self.mark();
        match self.next() {
            Lexeme::Number(n) => self.conv.push_number(n),
            Lexeme::String(s) => self.conv.push_string(&s)?,
            Lexeme::Error(literal) => self.conv.push_error_literal(&literal)?,
            lexeme @ (Lexeme::Plus | Lexeme::Minus | Lexeme::At) => {
                let symbol = match lexeme {
                    Lexeme::Plus => OperatorSymbol::UnaryPlus,
                    Lexeme::Minus => OperatorSymbol::UnaryMinus,
                    _ => OperatorSymbol::ImplicitIntersection,
                };
                self.enter()?;
                self.expression(PREFIX_BP, scope)?;
                self.leave();
                if symbol != OperatorSymbol::ImplicitIntersection {
                    self.conv.reclassify(RefClass::Value, scope.state, false)?;
                }
                self.conv.set_position(self.tokens[at].start + self.offset);
                self.conv.push_operator(symbol)?;
            }
            Lexeme::LParen => {
                self.enter()?;
                self.expression(0, scope.nested(true))?;
                self.leave();
                self.skip_whitespace();
                if !matches!(self.peek(), Lexeme::RParen) {
                    return self.syntax_error("expected `)`");
                }
                self.next();
                self.conv.push_paren();
            }
            Lexeme::LBrace => self.array_literal()?,
            Lexeme::Ident(ident) => self.identifier(ident, scope)?,
            Lexeme::QuotedIdent(sheet) => {
                if !matches!(self.peek(), Lexeme::Bang) {
                    return self.syntax_error("expected `!` after quoted sheet name");
                }
                self.next();
                self.qualified(sheet)?;
            }
            _ => {
                self.pos = at;
                return self.syntax_error("expected an operand");
            }
        }
        Ok(())
    }

    fn identifier(&mut self, ident: String, scope: Scope) -> PResult {
        if matches!(self.peek(), Lexeme::LParen) {
            self.next();
            return self.call(&ident, scope);
        }

        // `Sheet1!A1` or `Sheet1:Sheet3!A1`.
        if matches!(self.peek(), Lexeme::Bang) {
            self.next();
            return self.qualified(ident);
        }
        if matches!(self.peek(), Lexeme::Colon) && matches!(self.peek_nth(2), Lexeme::Bang) {
            if let Lexeme::Ident(last) = self.peek_nth(1).clone() {
                self.pos += 3;
                return self.qualified(format!("{ident}:{last}"));
            }
        }

        if let Some(first) = self.cell(&ident)? {
            if let Some(last) = self.area_end()? {
                self.conv.push_area(first, last)?;
            } else {
                self.conv.push_ref(first)?;
            }
            return Ok(());
        }

        if ident.eq_ignore_ascii_case("TRUE") || ident.eq_ignore_ascii_case("FALSE") {
            self.conv.push_bool(ident.eq_ignore_ascii_case("TRUE"));
            return Ok(());
        }

        self.conv.push_name(&ident)?;
        Ok(())
    }

    /// The part after `Qualifier!`.
    fn qualified(&mut self, qualifier: String) -> PResult {
        let at = self.pos;
        self.mark();
        match self.next() {
            Lexeme::Ident(ident) => {
                if let Some(first) = self.cell(&ident)? {
                    if let Some(last) = self.area_end()? {
                        self.conv.push_area_3d(&qualifier, first, last)?;
                    } else {
                        self.conv.push_ref_3d(&qualifier, first)?;
                    }
                } else {
                    self.conv.push_name_x_by_name(&qualifier, &ident)?;
                }
                Ok(())
            }
            Lexeme::Error(literal)
                if ErrorCode::from_literal(&literal) == Some(ErrorCode::Ref) =>
            {
                self.conv.push_ref_err_3d(&qualifier, false)?;
                Ok(())
            }
            _ => {
                self.pos = at;
                self.syntax_error("expected a reference or name after `!`")
            }
        }
    }

    /// Interpret `ident` as a cell address (A1, or R1C1 unless reading a foreign format).
    fn cell(&mut self, ident: &str) -> PResult<Option<CellAddr>> {
        if let Some(addr) = parse_a1(ident) {
            return Ok(Some(addr));
        }
        let anchor = self.conv.options().anchor;
        let foreign = self.conv.options().reading_foreign_format;
        match parse_r1c1(ident, anchor) {
            Some(_) if foreign => {
                self.pos = self.pos.saturating_sub(1);
                self.syntax_error("R1C1 references are not allowed here")
            }
            other => Ok(other),
        }
    }

    /// `:B2` following a cell address, if present.
    fn area_end(&mut self) -> PResult<Option<CellAddr>> {
        if !matches!(self.peek(), Lexeme::Colon) {
            return Ok(None);
        }
        let Lexeme::Ident(ident) = self.peek_nth(1).clone() else {
            return Ok(None);
        };
        if matches!(self.peek_nth(2), Lexeme::LParen | Lexeme::Bang) {
            return Ok(None);
        }
        self.pos += 2;
        match self.cell(&ident)? {
            Some(last) => Ok(Some(last)),
            None => {
                self.pos -= 2;
                Ok(None)
            }
        }
    }

    fn call(&mut self, name: &str, scope: Scope) -> PResult {
        if self.call_depth >= MAX_NESTED_CALLS {
            return self.syntax_error(format!("function nesting exceeds {MAX_NESTED_CALLS} levels"));
        }
        self.enter()?;
        let info = self.conv.functions().lookup(name);
        let inner = scope.nested(false);

        self.call_depth += 1;
        let mut argc = 0usize;
        self.skip_whitespace();
        if matches!(self.peek(), Lexeme::RParen) {
            self.next();
        } else {
            loop {
                self.skip_whitespace();
                if matches!(self.peek(), Lexeme::Comma | Lexeme::RParen) {
                    self.mark();
                    self.conv.push_missing_arg();
                } else {
                    self.expression(0, inner)?;
                    let class = info
                        .as_ref()
                        .map_or(RefClass::Value, |info| info.param_class(argc));
                    self.conv.reclassify(class, inner.state, true)?;
                }
                argc += 1;

                self.skip_whitespace();
                match self.peek() {
                    Lexeme::Comma => {
                        self.next();
                    }
                    Lexeme::RParen => {
                        self.next();
                        break;
                    }
                    _ => return self.syntax_error("expected `,` or `)` in argument list"),
                }
            }
        }
        self.call_depth -= 1;
        self.leave();

        self.conv.push_function(name, argc)?;
        Ok(())
    }

    fn array_literal(&mut self) -> PResult {
        let mut rows: Vec<Vec<ArrayValue>> = vec![Vec::new()];
        loop {
            self.skip_whitespace();
            let value = self.array_value()?;
            if let Some(row) = rows.last_mut() {
                row.push(value);
            }
            self.skip_whitespace();
            let at = self.pos;
            match self.next() {
                Lexeme::Comma => {}
                Lexeme::Semicolon => rows.push(Vec::new()),
                Lexeme::RBrace => break,
                _ => {
                    self.pos = at;
                    return self.syntax_error("expected `,`, `;` or `}` in array literal");
                }
            }
        }
        self.conv.push_array(rows)?;
        Ok(())
    }

    fn array_value(&mut self) -> PResult<ArrayValue> {
        let negative = matches!(self.peek(), Lexeme::Minus);
        if negative {
            self.next();
        }
        let at = self.pos;
        self.mark();
        let value = match self.next() {
            Lexeme::Number(n) => ArrayValue::Number(if negative { -n } else { n }),
            Lexeme::String(s) if !negative => ArrayValue::Str(s),
            Lexeme::Ident(b) if !negative && b.eq_ignore_ascii_case("TRUE") => {
                ArrayValue::Bool(true)
            }
            Lexeme::Ident(b) if !negative && b.eq_ignore_ascii_case("FALSE") => {
                ArrayValue::Bool(false)
            }
            Lexeme::Error(literal) if !negative => match ErrorCode::from_literal(&literal) {
                Some(code) => ArrayValue::Error(code),
                None => return self.syntax_error("unknown error literal in array"),
            },
            Lexeme::Comma | Lexeme::Semicolon | Lexeme::RBrace if !negative => {
                self.pos = at;
                ArrayValue::Empty
            }
            _ => {
                self.pos = at;
                return self.syntax_error("array literals may only contain constants");
            }
        };
        Ok(value)
    }
}
