//! Function metadata lookup.
//!
//! The converter never consults a global table: callers hand it a [`FunctionCatalog`]. The
//! crate ships [`BuiltinFunctions`], a curated set of Excel built-ins with their BIFF `iftab`
//! ids, arity and operand classes.

use std::collections::HashMap;

use crate::class::RefClass;

/// BIFF `iftab` value used for user-defined / add-in / future functions.
pub const FTAB_USER_DEFINED: u16 = 255;

/// Everything the converter needs to know about a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    pub iftab: u16,
    pub min_args: u8,
    pub max_args: u8,
    pub return_class: RefClass,
    /// Expected class per argument position; the last entry repeats.
    pub param_classes: Vec<RefClass>,
    /// Stored with forward-compatible (`_xlfn.`) encoding.
    pub future: bool,
}

impl FunctionInfo {
    /// Class expected for argument `index` (0-based).
    pub fn param_class(&self, index: usize) -> RefClass {
        self.param_classes
            .get(index)
            .or_else(|| self.param_classes.last())
            .copied()
            .unwrap_or(RefClass::Value)
    }

    /// Whether the call is stored as `PtgFunc` (fixed arity) rather than `PtgFuncVar`.
    pub fn is_fixed_arity(&self) -> bool {
        self.min_args == self.max_args && !self.future
    }
}

/// Read-only name -> metadata lookup.
pub trait FunctionCatalog {
    /// Look up a function by name. Implementations should be case-insensitive.
    fn lookup(&self, name: &str) -> Option<FunctionInfo>;
}

impl<T: FunctionCatalog + ?Sized> FunctionCatalog for &T {
    fn lookup(&self, name: &str) -> Option<FunctionInfo> {
        (**self).lookup(name)
    }
}

#[derive(Debug, Clone, Copy)]
struct FunctionSpec {
    id: u16,
    name: &'static str,
    min_args: u8,
    max_args: u8,
    ret: RefClass,
    params: &'static [RefClass],
    future: bool,
}

const V: RefClass = RefClass::Value;
const R: RefClass = RefClass::Reference;
const A: RefClass = RefClass::Array;

const fn builtin(
    id: u16,
    name: &'static str,
    min_args: u8,
    max_args: u8,
    ret: RefClass,
    params: &'static [RefClass],
) -> FunctionSpec {
    FunctionSpec {
        id,
        name,
        min_args,
        max_args,
        ret,
        params,
        future: false,
    }
}

const fn future(
    name: &'static str,
    min_args: u8,
    max_args: u8,
    params: &'static [RefClass],
) -> FunctionSpec {
    FunctionSpec {
        id: FTAB_USER_DEFINED,
        name,
        min_args,
        max_args,
        ret: RefClass::Value,
        params,
        future: true,
    }
}

// NOTE: ids are BIFF built-in function indices (`iftab`). Functions added after Excel 2003 have
// no BIFF8 id and are stored through the user-defined sentinel.
const FUNCTION_SPECS: &[FunctionSpec] = &[
    // Statistics / Math
    builtin(0x0000, "COUNT", 0, 255, V, &[R]),
    builtin(0x0004, "SUM", 0, 255, V, &[R]),
    builtin(0x0005, "AVERAGE", 1, 255, V, &[R]),
    builtin(0x0006, "MIN", 1, 255, V, &[R]),
    builtin(0x0007, "MAX", 1, 255, V, &[R]),
    builtin(0x0018, "ABS", 1, 1, V, &[V]),
    builtin(0x0019, "INT", 1, 1, V, &[V]),
    builtin(0x001B, "ROUND", 2, 2, V, &[V]),
    builtin(0x0027, "MOD", 2, 2, V, &[V]),
    builtin(0x00A9, "COUNTA", 0, 255, V, &[R]),
    builtin(0x00D4, "ROUNDUP", 2, 2, V, &[V]),
    builtin(0x00D5, "ROUNDDOWN", 2, 2, V, &[V]),
    builtin(0x00E4, "SUMPRODUCT", 1, 255, V, &[A]),
    builtin(0x0159, "SUMIF", 2, 3, V, &[R, V, R]),
    builtin(0x015A, "COUNTIF", 2, 2, V, &[R, V]),
    builtin(0x015B, "COUNTBLANK", 1, 1, V, &[R]),
    // Text
    builtin(0x001F, "MID", 3, 3, V, &[V]),
    builtin(0x0020, "LEN", 1, 1, V, &[V]),
    builtin(0x0052, "SEARCH", 2, 3, V, &[V]),
    builtin(0x0073, "LEFT", 1, 2, V, &[V]),
    builtin(0x0074, "RIGHT", 1, 2, V, &[V]),
    builtin(0x0076, "TRIM", 1, 1, V, &[V]),
    builtin(0x0077, "UPPER", 1, 1, V, &[V]),
    builtin(0x0078, "LOWER", 1, 1, V, &[V]),
    builtin(0x007C, "FIND", 2, 3, V, &[V]),
    builtin(0x0150, "CONCATENATE", 0, 255, V, &[V]),
    // Logical / information
    builtin(0x0001, "IF", 2, 3, R, &[V, R]),
    builtin(0x0002, "ISNA", 1, 1, V, &[V]),
    builtin(0x0003, "ISERROR", 1, 1, V, &[V]),
    builtin(0x0024, "AND", 1, 255, V, &[R]),
    builtin(0x0025, "OR", 1, 255, V, &[R]),
    builtin(0x0026, "NOT", 1, 1, V, &[V]),
    builtin(0x000A, "NA", 0, 0, V, &[]),
    // Lookup / reference
    builtin(0x0008, "ROW", 0, 1, V, &[R]),
    builtin(0x0009, "COLUMN", 0, 1, V, &[R]),
    builtin(0x001D, "INDEX", 2, 4, R, &[R, V]),
    builtin(0x0040, "MATCH", 2, 3, V, &[V, R, R]),
    builtin(0x0053, "TRANSPOSE", 1, 1, A, &[A]),
    builtin(0x0065, "HLOOKUP", 3, 4, V, &[V, R, R, V]),
    builtin(0x0066, "VLOOKUP", 3, 4, V, &[V, R, R, V]),
    // Date/time
    builtin(0x0041, "DATE", 3, 3, V, &[V]),
    builtin(0x0043, "DAY", 1, 1, V, &[V]),
    builtin(0x0044, "MONTH", 1, 1, V, &[V]),
    builtin(0x0045, "YEAR", 1, 1, V, &[V]),
    builtin(0x004A, "NOW", 0, 0, V, &[]),
    builtin(0x00DD, "TODAY", 0, 0, V, &[]),
    // Excel 2007+ functions.
    future("IFERROR", 2, 2, &[V]),
    future("IFNA", 2, 2, &[V]),
    future("COUNTIFS", 2, 254, &[R, V]),
    future("SUMIFS", 3, 255, &[R, R, V]),
    future("CONCAT", 1, 254, &[R]),
    future("XLOOKUP", 3, 6, &[V, R, R, V, V, V]),
];

/// The built-in function table.
#[derive(Debug, Clone)]
pub struct BuiltinFunctions {
    by_name: HashMap<&'static str, FunctionSpec>,
}

impl BuiltinFunctions {
    pub fn new() -> Self {
        let by_name = FUNCTION_SPECS.iter().map(|spec| (spec.name, *spec)).collect();
        Self { by_name }
    }
}

impl Default for BuiltinFunctions {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionCatalog for BuiltinFunctions {
    fn lookup(&self, name: &str) -> Option<FunctionInfo> {
        let upper = name.trim().to_ascii_uppercase();
        let upper = upper.strip_prefix("_XLFN.").unwrap_or(&upper);
        let spec = self.by_name.get(upper)?;
        Some(FunctionInfo {
            iftab: spec.id,
            min_args: spec.min_args,
            max_args: spec.max_args,
            return_class: spec.ret,
            param_classes: spec.params.to_vec(),
            future: spec.future,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive_and_accepts_xlfn_prefix() {
        let catalog = BuiltinFunctions::new();
        assert_eq!(catalog.lookup("sum").map(|f| f.iftab), Some(4));
        let iferror = catalog.lookup("_xlfn.IfError").expect("IFERROR");
        assert!(iferror.future);
        assert_eq!(iferror.iftab, FTAB_USER_DEFINED);
        assert!(catalog.lookup("NOPE").is_none());
    }

    #[test]
    fn fixed_arity_requires_equal_bounds_and_no_future_flag() {
        let catalog = BuiltinFunctions::new();
        assert!(catalog.lookup("ABS").unwrap().is_fixed_arity());
        assert!(catalog.lookup("NOW").unwrap().is_fixed_arity());
        assert!(!catalog.lookup("SUM").unwrap().is_fixed_arity());
        // Equal bounds, but stored through the future-function sentinel.
        assert!(!catalog.lookup("IFERROR").unwrap().is_fixed_arity());
    }

    #[test]
    fn last_param_class_repeats() {
        let vlookup = BuiltinFunctions::new().lookup("VLOOKUP").unwrap();
        assert_eq!(vlookup.param_class(0), RefClass::Value);
        assert_eq!(vlookup.param_class(1), RefClass::Reference);
        let sum = BuiltinFunctions::new().lookup("SUM").unwrap();
        assert_eq!(sum.param_class(7), RefClass::Reference);
        let now = BuiltinFunctions::new().lookup("NOW").unwrap();
        assert_eq!(now.param_class(0), RefClass::Value);
    }

    #[test]
    fn table_has_unique_names() {
        let mut seen = std::collections::HashSet::new();
        for spec in FUNCTION_SPECS {
            assert!(seen.insert(spec.name), "duplicate function {}", spec.name);
            assert!(spec.min_args <= spec.max_args, "{}", spec.name);
        }
    }
}
