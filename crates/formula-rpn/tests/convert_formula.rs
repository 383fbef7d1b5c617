use formula_rpn::{
    convert_formula, BuiltinFunctions, ConvertError, ConvertOptions, ErrorCode, FormulaConverter,
    InMemoryWorkbook, PtgId, RefClass, TokenKind, TokenList,
};
use pretty_assertions::assert_eq;

fn workbook() -> InMemoryWorkbook {
    InMemoryWorkbook::new("Book1.xls")
        .with_sheet("Sheet1")
        .with_sheet("Sheet2")
        .with_name("Sales")
        .with_external_book("Rates.xls", &["Usd"])
}

fn convert(formula: &str) -> TokenList {
    convert_with(formula, ConvertOptions::default()).expect("convert")
}

fn convert_with(formula: &str, options: ConvertOptions) -> Result<TokenList, ConvertError> {
    convert_formula(formula, options, &BuiltinFunctions::new(), &workbook())
}

fn shape(list: &TokenList) -> Vec<(PtgId, Option<RefClass>)> {
    list.iter().map(|t| (t.ptg(), t.class())).collect()
}

#[test]
fn binary_operator_consumes_values() {
    let list = convert("=A1+B1");
    assert_eq!(
        shape(&list),
        vec![
            (PtgId::Ref, Some(RefClass::Value)),
            (PtgId::Ref, Some(RefClass::Value)),
            (PtgId::Add, None),
        ]
    );
    assert_eq!(list.opcode_bytes(), vec![0x44, 0x44, 0x03]);
    assert_eq!(list.source_len(), 6);
}

#[test]
fn sum_keeps_area_as_reference() {
    let list = convert("=SUM(A1:B2)");
    assert_eq!(
        list.tokens()[1].kind(),
        &TokenKind::FuncVar { iftab: 4, argc: 1 }
    );
    assert_eq!(list.opcode_bytes(), vec![0x25, 0x42]);
}

#[test]
fn fixed_arity_functions_use_ptg_func() {
    let list = convert("=ABS(-1.5)");
    assert_eq!(
        shape(&list),
        vec![
            (PtgId::Num, None),
            (PtgId::Uminus, None),
            (PtgId::Func, Some(RefClass::Value)),
        ]
    );
    assert_eq!(list.tokens()[2].kind(), &TokenKind::Func { iftab: 24, argc: 1 });
}

#[test]
fn future_functions_use_the_user_defined_id() {
    let list = convert("=IFERROR(A1,0)");
    assert_eq!(
        list.tokens()[2].kind(),
        &TokenKind::FuncVar {
            iftab: 255,
            argc: 2
        }
    );
}

#[test]
fn union_inside_a_group() {
    let list = convert("=SUM((A1,B1))");
    assert_eq!(
        shape(&list),
        vec![
            (PtgId::Ref, Some(RefClass::Reference)),
            (PtgId::Ref, Some(RefClass::Reference)),
            (PtgId::Union, None),
            (PtgId::Paren, None),
            (PtgId::FuncVar, Some(RefClass::Value)),
        ]
    );
}

#[test]
fn literals() {
    let list = convert("=\"a\"&TRUE&#DIV/0!&{1,\"x\";FALSE,#N/A}");
    let kinds: Vec<&TokenKind> = list.iter().map(|t| t.kind()).collect();
    assert_eq!(kinds[0], &TokenKind::Str("a".to_string()));
    assert_eq!(kinds[1], &TokenKind::Bool(true));
    assert_eq!(kinds[3], &TokenKind::Err(ErrorCode::Div0));
    assert!(matches!(kinds[5], TokenKind::Array(rows) if rows.len() == 2 && rows[0].len() == 2));
    // Consumed by `&`, so the constant is rewritten to value class.
    assert_eq!(list.tokens()[5].class(), Some(RefClass::Value));
}

#[test]
fn typed_ref_error_is_an_error_constant() {
    let list = convert("=#REF!");
    assert_eq!(list.tokens()[0].kind(), &TokenKind::Err(ErrorCode::Ref));
}

#[test]
fn strings_are_limited_to_255_characters() {
    let ok = format!("=\"{}\"", "a".repeat(255));
    assert_eq!(shape(&convert(&ok)), vec![(PtgId::Str, None)]);

    let too_long = format!("=\"{}\"", "a".repeat(256));
    let err = convert_with(&too_long, ConvertOptions::default()).unwrap_err();
    assert!(matches!(err, ConvertError::MalformedFormula { .. }), "{err}");
}

#[test]
fn unsupported_operator_degrades_to_placeholder() {
    let functions = BuiltinFunctions::new();
    let workbook = workbook();
    let options = ConvertOptions {
        throw_on_error: false,
        ..ConvertOptions::default()
    };
    let mut conv = FormulaConverter::new("=1~2", options, &functions, &workbook);
    let list = conv.parse().expect("degrade mode never raises");
    assert_eq!(
        shape(list),
        vec![
            (PtgId::Int, None),
            (PtgId::Int, None),
            (PtgId::Unsupported, None),
        ]
    );
    assert!(conv.has_errors());
}

#[test]
fn unsupported_operator_raises_in_strict_mode() {
    let err = convert_with("=1~2", ConvertOptions::default()).unwrap_err();
    assert_eq!(err.position(), Some(2));
    assert_eq!(err.formula(), "=1~2");
}

#[test]
fn converter_can_be_reused() {
    let functions = BuiltinFunctions::new();
    let workbook = workbook();
    let options = ConvertOptions {
        throw_on_error: false,
        ..ConvertOptions::default()
    };
    let mut conv = FormulaConverter::new("=1~2", options, &functions, &workbook);
    conv.parse().unwrap();
    assert!(conv.has_errors());
    conv.parse().unwrap();
    assert!(conv.has_errors());
    assert!(!conv.is_converting());
}

#[test]
fn unknown_function_is_malformed() {
    let err = convert_with("=NOPE(1)", ConvertOptions::default()).unwrap_err();
    assert!(err.to_string().contains("unknown function `NOPE`"), "{err}");
}

#[test]
fn wrong_argument_count_is_malformed() {
    let err = convert_with("=ABS(1,2)", ConvertOptions::default()).unwrap_err();
    assert!(matches!(err, ConvertError::MalformedFormula { .. }), "{err}");
}

#[test]
fn syntax_error_reports_offending_character() {
    let err = convert_with("=1+)", ConvertOptions::default()).unwrap_err();
    match err {
        ConvertError::MalformedFormula { ch, position, .. } => {
            assert_eq!(ch, Some(')'));
            assert_eq!(position, 3);
        }
        other => panic!("unexpected error {other:?}"),
    }
}
