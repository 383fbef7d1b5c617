use formula_rpn::{
    BuiltinFunctions, ConvertError, ConvertOptions, FormulaConverter, FunctionCatalog,
    FunctionInfo, InMemoryWorkbook, ParseState, PtgId, RefClass, TokenKind, TokenList,
};
use pretty_assertions::assert_eq;

fn shape(list: &TokenList) -> Vec<(PtgId, Option<RefClass>)> {
    list.iter().map(|t| (t.ptg(), t.class())).collect()
}

fn convert(formula: &str, options: ConvertOptions) -> Vec<(PtgId, Option<RefClass>)> {
    let functions = BuiltinFunctions::new();
    let workbook = InMemoryWorkbook::new("Book1.xls").with_sheet("Sheet1");
    let mut conv = FormulaConverter::new(formula, options, &functions, &workbook);
    let list = conv.parse().expect("convert");
    shape(list)
}

#[test]
fn array_formula_forces_arrays_below_top_level() {
    let options = ConvertOptions {
        array_formula: true,
        ..ConvertOptions::default()
    };
    assert_eq!(
        convert("=SUM(ABS(A1))", options),
        vec![
            (PtgId::Ref, Some(RefClass::Array)),
            (PtgId::Func, Some(RefClass::Array)),
            (PtgId::FuncVar, Some(RefClass::Value)),
        ]
    );
}

#[test]
fn plain_formula_keeps_reference_arguments() {
    assert_eq!(
        convert("=SUM(ABS(A1))", ConvertOptions::default()),
        vec![
            (PtgId::Ref, Some(RefClass::Value)),
            (PtgId::Func, Some(RefClass::Value)),
            (PtgId::FuncVar, Some(RefClass::Value)),
        ]
    );
}

#[test]
fn array_parameters_are_requested_as_arrays() {
    assert_eq!(
        convert("=SUMPRODUCT(A1:B2)", ConvertOptions::default()),
        vec![
            (PtgId::Area, Some(RefClass::Array)),
            (PtgId::FuncVar, Some(RefClass::Value)),
        ]
    );
}

#[test]
fn array_target_class_reclassifies_the_whole_formula() {
    let options = ConvertOptions {
        target_class: RefClass::Array,
        ..ConvertOptions::default()
    };
    assert_eq!(
        convert("=A1:B2", options),
        vec![(PtgId::Area, Some(RefClass::Array))]
    );
}

#[test]
fn reference_target_leaves_references_alone() {
    let options = ConvertOptions::defined_name("Sheet1");
    let functions = BuiltinFunctions::new();
    let workbook = InMemoryWorkbook::new("Book1.xls").with_sheet("Sheet1");
    let options = ConvertOptions {
        may_mutate_workbook: true,
        ..options
    };
    let mut conv = FormulaConverter::new("=A1:B2", options, &functions, &workbook);
    assert_eq!(
        shape(conv.parse().unwrap()),
        vec![(PtgId::Area3d, Some(RefClass::Reference))]
    );
}

#[test]
fn markers_are_transparent_to_reclassification() {
    assert_eq!(
        convert("=( A1)", ConvertOptions::default()),
        vec![
            (PtgId::Attr, None),
            (PtgId::Ref, Some(RefClass::Value)),
            (PtgId::Paren, None),
        ]
    );
}

#[test]
fn reclassify_without_operand_fails_for_every_class() {
    let functions = BuiltinFunctions::new();
    let workbook = InMemoryWorkbook::new("Book1.xls");
    let mut conv = FormulaConverter::new("=", ConvertOptions::default(), &functions, &workbook);
    conv.begin();
    for desired in [RefClass::Value, RefClass::Reference, RefClass::Array] {
        let err = conv
            .reclassify(desired, ParseState::default(), false)
            .unwrap_err();
        assert!(matches!(err, ConvertError::MalformedFormula { .. }), "{err}");
    }
    conv.abort();
}

#[test]
fn repeated_requests_are_idempotent() {
    let functions = BuiltinFunctions::new();
    let workbook = InMemoryWorkbook::new("Book1.xls");
    let mut conv = FormulaConverter::new("=A1", ConvertOptions::default(), &functions, &workbook);
    conv.begin();
    conv.push_ref(formula_rpn::CellAddr::relative(0, 0)).unwrap();
    let state = ParseState::new(1, true);
    conv.reclassify(RefClass::Value, state, false).unwrap();
    conv.reclassify(RefClass::Value, state, false).unwrap();
    let list = conv.finish();
    assert_eq!(shape(list), vec![(PtgId::Ref, Some(RefClass::Array))]);
}

/// A catalog with one fixed-arity, one variable-arity and one forward-compatible function.
struct TestCatalog;

impl FunctionCatalog for TestCatalog {
    fn lookup(&self, name: &str) -> Option<FunctionInfo> {
        let info = |iftab, min_args, max_args, future| FunctionInfo {
            iftab,
            min_args,
            max_args,
            return_class: RefClass::Value,
            param_classes: vec![RefClass::Value],
            future,
        };
        match name.to_ascii_uppercase().as_str() {
            "PAIR" => Some(info(300, 2, 2, false)),
            "SOME" => Some(info(301, 1, 3, false)),
            "LATEST" => Some(info(255, 1, 1, true)),
            _ => None,
        }
    }
}

fn convert_with_catalog(formula: &str) -> Result<Vec<TokenKind>, ConvertError> {
    let workbook = InMemoryWorkbook::new("Book1.xls");
    let mut conv =
        FormulaConverter::new(formula, ConvertOptions::default(), &TestCatalog, &workbook);
    let list = conv.parse()?;
    Ok(list.iter().map(|t| t.kind().clone()).collect())
}

#[test]
fn arity_selects_the_call_opcode() {
    let got = convert_with_catalog("=PAIR(1,2)").unwrap();
    assert_eq!(got[2], TokenKind::Func { iftab: 300, argc: 2 });

    let got = convert_with_catalog("=some(1)").unwrap();
    assert_eq!(got[1], TokenKind::FuncVar { iftab: 301, argc: 1 });

    let got = convert_with_catalog("=LATEST(1)").unwrap();
    assert_eq!(got[1], TokenKind::FuncVar { iftab: 255, argc: 1 });

    assert!(convert_with_catalog("=PAIR(1)").is_err());
    assert!(convert_with_catalog("=SOME(1,2,3,4)").is_err());
    // Built-ins are not visible through a custom catalog.
    assert!(convert_with_catalog("=SUM(1)").is_err());
}

#[test]
fn missing_arguments_count_toward_arity() {
    let got = convert_with_catalog("=SOME(,,1)").unwrap();
    assert_eq!(
        got,
        vec![
            TokenKind::MissArg,
            TokenKind::MissArg,
            TokenKind::Int(1),
            TokenKind::FuncVar { iftab: 301, argc: 3 },
        ]
    );
}
