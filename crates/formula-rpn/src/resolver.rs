//! Reference-class resolution.
//!
//! Operands are emitted with their natural class (references as `Reference`, function calls with
//! their declared return class). Once the front end knows how an operand is consumed, it asks the
//! resolver to rewrite the class of the most recently emitted operand. Parentheses and attribute
//! markers are skipped, so `(A1)` is reclassified through the paren.

use crate::builder::TokenListBuilder;
use crate::class::RefClass;
use crate::ptg::Token;

/// Per-nesting-level context handed to [`ClassResolver::reclassify`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseState {
    /// 0 at the top level of the formula, +1 per function call or parenthesised group.
    pub level: u32,
    /// Operands inside this context are evaluated as arrays.
    pub forced_array_class: bool,
}

impl ParseState {
    pub const fn new(level: u32, forced_array_class: bool) -> Self {
        Self {
            level,
            forced_array_class,
        }
    }

    /// The state for a sub-expression one level deeper.
    pub const fn nested(self) -> Self {
        Self {
            level: self.level + 1,
            forced_array_class: self.forced_array_class,
        }
    }

    fn in_forced_array(self) -> bool {
        self.forced_array_class && self.level > 0
    }
}

/// A class was requested before any operand had been emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingOperand;

/// Class implied by a token's current opcode.
pub fn natural_class(token: &Token) -> RefClass {
    if token.ptg().is_reference_operator() {
        return RefClass::Reference;
    }
    token.class().unwrap_or(RefClass::Value)
}

/// Tracks the last operand-bearing token and rewrites its class on request.
#[derive(Debug, Default)]
pub struct ClassResolver {
    last_operand: Option<usize>,
}

impl ClassResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.last_operand = None;
    }

    /// Index of the most recent non-transparent token.
    pub fn last_operand(&self) -> Option<usize> {
        self.last_operand
    }

    /// Must be called after every append.
    pub fn record_emission(&mut self, index: usize, token: &Token) {
        if !token.ptg().is_transparent() {
            self.last_operand = Some(index);
        }
    }

    /// Rewrite the class of the last operand for a consumer expecting `desired`.
    ///
    /// - `Reference`: kept as-is, except that a `Value` operand inside a forced-array context
    ///   becomes `Array`. `Array` is never downgraded to `Reference`.
    /// - `Value`: becomes `Array` inside a forced-array context, otherwise `Value`, unless
    ///   `ignore_array_hint` is set and the operand already is an `Array`.
    /// - `Array`: always `Array`.
    pub fn reclassify(
        &self,
        builder: &mut TokenListBuilder,
        desired: RefClass,
        state: ParseState,
        ignore_array_hint: bool,
    ) -> Result<(), MissingOperand> {
        let index = self.last_operand.ok_or(MissingOperand)?;
        let natural = natural_class(builder.get(index));

        let target = match desired {
            RefClass::Reference => {
                (state.in_forced_array() && natural == RefClass::Value).then_some(RefClass::Array)
            }
            RefClass::Value => {
                if state.in_forced_array() {
                    Some(RefClass::Array)
                } else if ignore_array_hint && natural == RefClass::Array {
                    None
                } else {
                    Some(RefClass::Value)
                }
            }
            RefClass::Array => Some(RefClass::Array),
        };

        let Some(target) = target else {
            return Ok(());
        };
        let token = builder.get(index);
        if token.class().is_none() || token.class() == Some(target) {
            return Ok(());
        }

        log::debug!(
            "reclassify token {index} ({:?}): {natural} -> {target} (desired {desired})",
            token.ptg()
        );
        let mut token = token.clone();
        token.set_class(target);
        builder.set(index, token);
        Ok(())
    }

    /// Whether the last operand currently has reference class. `false` before any emission.
    pub fn current_is_reference(&self, builder: &TokenListBuilder) -> bool {
        self.last_operand
            .is_some_and(|index| natural_class(builder.get(index)) == RefClass::Reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::CellAddr;
    use crate::ptg::{Operator, TokenKind};

    fn emit(builder: &mut TokenListBuilder, resolver: &mut ClassResolver, token: Token) -> usize {
        let index = builder.append(token);
        resolver.record_emission(index, builder.get(index));
        index
    }

    fn cell_ref() -> Token {
        Token::new(
            TokenKind::Ref {
                cell: CellAddr::relative(0, 0),
                offset: false,
            },
            RefClass::Reference,
        )
    }

    #[test]
    fn reclassify_without_operand_fails() {
        let resolver = ClassResolver::new();
        let mut builder = TokenListBuilder::new();
        for desired in [RefClass::Value, RefClass::Reference, RefClass::Array] {
            assert_eq!(
                resolver.reclassify(&mut builder, desired, ParseState::default(), false),
                Err(MissingOperand)
            );
        }
    }

    #[test]
    fn transparent_markers_do_not_move_the_last_operand() {
        let mut builder = TokenListBuilder::new();
        let mut resolver = ClassResolver::new();
        let idx = emit(&mut builder, &mut resolver, cell_ref());
        emit(&mut builder, &mut resolver, Token::unclassed(TokenKind::Paren));
        assert_eq!(resolver.last_operand(), Some(idx));
        assert!(resolver.current_is_reference(&builder));

        resolver
            .reclassify(&mut builder, RefClass::Value, ParseState::default(), false)
            .unwrap();
        assert_eq!(builder.get(idx).class(), Some(RefClass::Value));
        assert!(!resolver.current_is_reference(&builder));
    }

    #[test]
    fn reference_request_never_downgrades_array() {
        let mut builder = TokenListBuilder::new();
        let mut resolver = ClassResolver::new();
        let idx = emit(
            &mut builder,
            &mut resolver,
            Token::new(TokenKind::Array(vec![vec![]]), RefClass::Array),
        );
        resolver
            .reclassify(&mut builder, RefClass::Reference, ParseState::default(), false)
            .unwrap();
        assert_eq!(builder.get(idx).class(), Some(RefClass::Array));
    }

    #[test]
    fn value_request_respects_array_hint() {
        let mut builder = TokenListBuilder::new();
        let mut resolver = ClassResolver::new();
        let idx = emit(
            &mut builder,
            &mut resolver,
            Token::new(TokenKind::Array(vec![vec![]]), RefClass::Array),
        );
        resolver
            .reclassify(&mut builder, RefClass::Value, ParseState::default(), true)
            .unwrap();
        assert_eq!(builder.get(idx).class(), Some(RefClass::Array));
        resolver
            .reclassify(&mut builder, RefClass::Value, ParseState::default(), false)
            .unwrap();
        assert_eq!(builder.get(idx).class(), Some(RefClass::Value));
    }

    #[test]
    fn forced_array_applies_only_below_top_level() {
        let mut builder = TokenListBuilder::new();
        let mut resolver = ClassResolver::new();
        let idx = emit(&mut builder, &mut resolver, cell_ref());

        let top = ParseState::new(0, true);
        resolver
            .reclassify(&mut builder, RefClass::Value, top, false)
            .unwrap();
        assert_eq!(builder.get(idx).class(), Some(RefClass::Value));

        resolver
            .reclassify(&mut builder, RefClass::Reference, top.nested(), false)
            .unwrap();
        assert_eq!(builder.get(idx).class(), Some(RefClass::Array));
    }

    #[test]
    fn reference_operators_are_always_references() {
        let mut builder = TokenListBuilder::new();
        let mut resolver = ClassResolver::new();
        emit(&mut builder, &mut resolver, cell_ref());
        emit(&mut builder, &mut resolver, cell_ref());
        let idx = emit(
            &mut builder,
            &mut resolver,
            Token::unclassed(TokenKind::Operator(Operator::Range)),
        );
        resolver
            .reclassify(&mut builder, RefClass::Value, ParseState::default(), false)
            .unwrap();
        assert_eq!(builder.get(idx).class(), None);
        assert!(resolver.current_is_reference(&builder));
    }
}
