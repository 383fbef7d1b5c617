use serde::{Deserialize, Serialize};

use crate::address::CellCoord;
use crate::class::RefClass;

/// Construction-time settings for a [`FormulaConverter`](crate::FormulaConverter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertOptions {
    /// Return the first error instead of recording it and emitting a placeholder token.
    pub throw_on_error: bool,
    /// Allow creating EXTERNSHEET entries, placeholder names and external name slots.
    pub may_mutate_workbook: bool,
    /// Store references as offsets from [`anchor`](Self::anchor) (conditional formats,
    /// data validation, shared formulas).
    pub relative_addressing: bool,
    /// Qualify every reference with a sheet; the value is the sheet used for unqualified
    /// references (defined names).
    pub force_3d: Option<String>,
    /// Class the whole formula is consumed as.
    pub target_class: RefClass,
    /// Mark every reference absolute (chart series, report expressions).
    pub force_absolute: bool,
    /// Cell the formula belongs to.
    pub anchor: CellCoord,
    /// The formula comes from a foreign file format: forward-declared names are allowed and
    /// R1C1 notation is rejected.
    pub reading_foreign_format: bool,
    /// Array (CSE) formula: operands inside function calls and groups are forced to arrays.
    pub array_formula: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            throw_on_error: true,
            may_mutate_workbook: false,
            relative_addressing: false,
            force_3d: None,
            target_class: RefClass::Value,
            force_absolute: false,
            anchor: CellCoord::default(),
            reading_foreign_format: false,
            array_formula: false,
        }
    }
}

impl ConvertOptions {
    /// Options for a defined-name formula: every reference is sheet-qualified with `sheet`.
    pub fn defined_name(sheet: impl Into<String>) -> Self {
        Self {
            force_3d: Some(sheet.into()),
            target_class: RefClass::Reference,
            ..Self::default()
        }
    }

    /// Options for a conditional-format / data-validation rule anchored at `anchor`.
    pub fn anchored(anchor: CellCoord) -> Self {
        Self {
            relative_addressing: true,
            anchor,
            ..Self::default()
        }
    }
}
