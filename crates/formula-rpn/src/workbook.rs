//! Workbook lookups needed while converting a formula.
//!
//! The converter only sees the narrow [`WorkbookNames`] interface. Methods take `&self` so one
//! workbook can serve several conversions at once; implementations that mutate (placeholder
//! names, new EXTERNSHEET entries) synchronize internally, as [`InMemoryWorkbook`] does.

use std::sync::{PoisonError, RwLock};

/// Where a `Qualifier!Name` reference points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameScope {
    /// Defined in this workbook.
    Local,
    /// Defined in another workbook, addressed through EXTERNSHEET entry `ixti`.
    External { ixti: u16 },
}

pub trait WorkbookNames {
    /// EXTERNSHEET index for a local sheet (`Sheet1`) or sheet span (`Sheet1:Sheet3`).
    fn external_sheet_index(&self, sheet: &str) -> Option<u16>;

    /// Create the EXTERNSHEET entry for `sheet` if the sheet exists.
    fn ensure_external_sheet(&self, sheet: &str) -> Option<u16>;

    /// 1-based index of a workbook-level defined name.
    fn name_index(&self, name: &str) -> Option<u16>;

    /// Define an empty placeholder name and return its index.
    fn add_placeholder_name(&self, name: &str) -> Option<u16>;

    /// Resolve the qualifier of `Qualifier!Name`.
    fn name_scope(&self, qualifier: &str) -> Option<NameScope>;

    /// 1-based index of `name` in the external workbook behind `ixti`.
    fn external_name_index(&self, ixti: u16, name: &str) -> Option<u16>;

    /// Create the external name slot for `name` if missing.
    fn ensure_external_name(&self, ixti: u16, name: &str) -> Option<u16>;
}

impl<T: WorkbookNames + ?Sized> WorkbookNames for &T {
    fn external_sheet_index(&self, sheet: &str) -> Option<u16> {
        (**self).external_sheet_index(sheet)
    }
    fn ensure_external_sheet(&self, sheet: &str) -> Option<u16> {
        (**self).ensure_external_sheet(sheet)
    }
    fn name_index(&self, name: &str) -> Option<u16> {
        (**self).name_index(name)
    }
    fn add_placeholder_name(&self, name: &str) -> Option<u16> {
        (**self).add_placeholder_name(name)
    }
    fn name_scope(&self, qualifier: &str) -> Option<NameScope> {
        (**self).name_scope(qualifier)
    }
    fn external_name_index(&self, ixti: u16, name: &str) -> Option<u16> {
        (**self).external_name_index(ixti, name)
    }
    fn ensure_external_name(&self, ixti: u16, name: &str) -> Option<u16> {
        (**self).ensure_external_name(ixti, name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum XtiTarget {
    Local { first: usize, last: usize },
    Book(usize),
}

#[derive(Debug, Clone, Default)]
struct ExternalBook {
    name: String,
    names: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    sheets: Vec<String>,
    names: Vec<String>,
    books: Vec<ExternalBook>,
    xti: Vec<XtiTarget>,
}

/// A self-contained workbook model: sheets, defined names, external books, EXTERNSHEET table.
#[derive(Debug, Default)]
pub struct InMemoryWorkbook {
    name: String,
    tables: RwLock<Tables>,
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn to_u16(index: usize) -> Option<u16> {
    u16::try_from(index).ok()
}

impl InMemoryWorkbook {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: RwLock::default(),
        }
    }

    pub fn with_sheet(self, sheet: impl Into<String>) -> Self {
        self.write().sheets.push(sheet.into());
        self
    }

    pub fn with_name(self, name: impl Into<String>) -> Self {
        self.write().names.push(name.into());
        self
    }

    /// Register an external workbook and its defined names. Also creates its EXTERNSHEET entry.
    pub fn with_external_book(self, book: impl Into<String>, names: &[&str]) -> Self {
        {
            let mut tables = self.write();
            let index = tables.books.len();
            tables.books.push(ExternalBook {
                name: book.into(),
                names: names.iter().map(|n| (*n).to_string()).collect(),
            });
            tables.xti.push(XtiTarget::Book(index));
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Defined names, in index order (index 1 first).
    pub fn defined_names(&self) -> Vec<String> {
        self.read().names.clone()
    }

    pub fn external_sheet_count(&self) -> usize {
        self.read().xti.len()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn sheet_span(tables: &Tables, sheet: &str) -> Option<XtiTarget> {
        let (first, last) = sheet.split_once(':').unwrap_or((sheet, sheet));
        let find = |s: &str| tables.sheets.iter().position(|n| eq_ignore_case(n, s));
        Some(XtiTarget::Local {
            first: find(first)?,
            last: find(last)?,
        })
    }
}

impl WorkbookNames for InMemoryWorkbook {
    fn external_sheet_index(&self, sheet: &str) -> Option<u16> {
        let tables = self.read();
        let target = Self::sheet_span(&tables, sheet)?;
        to_u16(tables.xti.iter().position(|x| *x == target)?)
    }

    fn ensure_external_sheet(&self, sheet: &str) -> Option<u16> {
        let mut tables = self.write();
        let target = Self::sheet_span(&tables, sheet)?;
        if let Some(pos) = tables.xti.iter().position(|x| *x == target) {
            return to_u16(pos);
        }
        tables.xti.push(target);
        to_u16(tables.xti.len() - 1)
    }

    fn name_index(&self, name: &str) -> Option<u16> {
        let tables = self.read();
        to_u16(tables.names.iter().position(|n| eq_ignore_case(n, name))? + 1)
    }

    fn add_placeholder_name(&self, name: &str) -> Option<u16> {
        let mut tables = self.write();
        if let Some(pos) = tables.names.iter().position(|n| eq_ignore_case(n, name)) {
            return to_u16(pos + 1);
        }
        tables.names.push(name.to_string());
        to_u16(tables.names.len())
    }

    fn name_scope(&self, qualifier: &str) -> Option<NameScope> {
        if eq_ignore_case(qualifier, &self.name) {
            return Some(NameScope::Local);
        }
        let tables = self.read();
        if tables.sheets.iter().any(|s| eq_ignore_case(s, qualifier)) {
            return Some(NameScope::Local);
        }
        let book = tables
            .books
            .iter()
            .position(|b| eq_ignore_case(&b.name, qualifier))?;
        let ixti = tables.xti.iter().position(|x| *x == XtiTarget::Book(book))?;
        Some(NameScope::External { ixti: to_u16(ixti)? })
    }

    fn external_name_index(&self, ixti: u16, name: &str) -> Option<u16> {
        let tables = self.read();
        let XtiTarget::Book(book) = tables.xti.get(usize::from(ixti))? else {
            return None;
        };
        let names = &tables.books[*book].names;
        to_u16(names.iter().position(|n| eq_ignore_case(n, name))? + 1)
    }

    fn ensure_external_name(&self, ixti: u16, name: &str) -> Option<u16> {
        let mut tables = self.write();
        let book = match tables.xti.get(usize::from(ixti))? {
            XtiTarget::Book(book) => *book,
            XtiTarget::Local { .. } => return None,
        };
        let names = &mut tables.books[book].names;
        if let Some(pos) = names.iter().position(|n| eq_ignore_case(n, name)) {
            return to_u16(pos + 1);
        }
        names.push(name.to_string());
        to_u16(names.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workbook() -> InMemoryWorkbook {
        InMemoryWorkbook::new("Book1.xls")
            .with_sheet("Sheet1")
            .with_sheet("Sheet2")
            .with_sheet("Sheet3")
            .with_name("Sales")
            .with_external_book("Rates.xls", &["Usd"])
    }

    #[test]
    fn external_sheets_are_created_on_demand() {
        let wb = workbook();
        assert_eq!(wb.external_sheet_index("Sheet2"), None);
        assert_eq!(wb.ensure_external_sheet("sheet2"), Some(1));
        assert_eq!(wb.external_sheet_index("Sheet2"), Some(1));
        assert_eq!(wb.ensure_external_sheet("Sheet1:Sheet3"), Some(2));
        assert_eq!(wb.ensure_external_sheet("Missing"), None);
    }

    #[test]
    fn names_are_one_based_and_placeholders_append() {
        let wb = workbook();
        assert_eq!(wb.name_index("sales"), Some(1));
        assert_eq!(wb.name_index("Later"), None);
        assert_eq!(wb.add_placeholder_name("Later"), Some(2));
        assert_eq!(wb.add_placeholder_name("LATER"), Some(2));
        assert_eq!(wb.defined_names(), vec!["Sales", "Later"]);
    }

    #[test]
    fn name_scope_distinguishes_local_and_external() {
        let wb = workbook();
        assert_eq!(wb.name_scope("Book1.xls"), Some(NameScope::Local));
        assert_eq!(wb.name_scope("Sheet3"), Some(NameScope::Local));
        assert_eq!(wb.name_scope("Rates.xls"), Some(NameScope::External { ixti: 0 }));
        assert_eq!(wb.name_scope("Unknown.xls"), None);

        assert_eq!(wb.external_name_index(0, "usd"), Some(1));
        assert_eq!(wb.external_name_index(0, "Eur"), None);
        assert_eq!(wb.ensure_external_name(0, "Eur"), Some(2));
    }
}
