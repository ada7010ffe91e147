use std::{collections::HashMap, io, io::Write};

use chrono::{DateTime, FixedOffset};
use error_stack::{Report, Result};
use rand::Rng;

use crate::{
    core::{DateTimes, Numbers, apply_quantity},
    generator::Error,
};

/// A typed column in which every cell may be missing.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
    Str(Vec<Option<String>>),
    Binary(Vec<Option<Vec<u8>>>),
    Timestamp(Vec<Option<DateTime<FixedOffset>>>),
}

impl Column {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::Str(v) => v.len(),
            Self::Binary(v) => v.len(),
            Self::Timestamp(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn null_count(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_null(i)).count()
    }

    #[must_use]
    pub fn is_null(&self, i: usize) -> bool {
        match self {
            Self::Int(v) => v[i].is_none(),
            Self::Float(v) => v[i].is_none(),
            Self::Bool(v) => v[i].is_none(),
            Self::Str(v) => v[i].is_none(),
            Self::Binary(v) => v[i].is_none(),
            Self::Timestamp(v) => v[i].is_none(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::Str(_) => "string",
            Self::Binary(_) => "binary",
            Self::Timestamp(_) => "timestamp",
        }
    }

    /// The cell rendered as text, or `None` when it is missing.
    #[must_use]
    pub fn cell(&self, i: usize) -> Option<String> {
        match self {
            Self::Int(v) => v[i].map(|x| itoa::Buffer::new().format(x).to_string()),
            Self::Float(v) => v[i].map(|x| x.to_string()),
            Self::Bool(v) => v[i].map(|x| x.to_string()),
            Self::Str(v) => v[i].clone(),
            Self::Binary(v) => v[i].as_ref().map(|x| String::from_utf8_lossy(x).into_owned()),
            Self::Timestamp(v) => v[i].map(|x| x.to_rfc3339()),
        }
    }

    /// Numeric cells widened to floats, or `None` for non-numeric columns.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(&self) -> Option<Vec<Option<f64>>> {
        match self {
            Self::Int(v) => Some(v.iter().map(|x| x.map(|x| x as f64)).collect()),
            Self::Float(v) => Some(v.clone()),
            _ => None,
        }
    }

    pub(crate) fn with_quantity<R: Rng + ?Sized>(mut self, quantity: f64, rng: &mut R) -> Self {
        match &mut self {
            Self::Int(v) => apply_quantity(v, quantity, rng),
            Self::Float(v) => apply_quantity(v, quantity, rng),
            Self::Bool(v) => apply_quantity(v, quantity, rng),
            Self::Str(v) => apply_quantity(v, quantity, rng),
            Self::Binary(v) => apply_quantity(v, quantity, rng),
            Self::Timestamp(v) => apply_quantity(v, quantity, rng),
        }
        self
    }
}

impl From<Numbers> for Column {
    fn from(value: Numbers) -> Self {
        match value {
            Numbers::Int(v) => v.into(),
            Numbers::Float(v) => v.into(),
        }
    }
}

impl From<Vec<i64>> for Column {
    fn from(value: Vec<i64>) -> Self {
        Self::Int(value.into_iter().map(Some).collect())
    }
}

impl From<Vec<f64>> for Column {
    fn from(value: Vec<f64>) -> Self {
        Self::Float(value.into_iter().map(Some).collect())
    }
}

impl From<DateTimes> for Column {
    fn from(value: DateTimes) -> Self {
        match value {
            DateTimes::Instants(v) => Self::Timestamp(v.into_iter().map(Some).collect()),
            DateTimes::Numeric(v) => v.into(),
            DateTimes::Formatted(v) => Self::Str(v.into_iter().map(Some).collect()),
        }
    }
}

/// Named, equal-length columns in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Table {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_column(&mut self, name: impl Into<String>, column: Column) -> Result<(), Error> {
        let name = name.into();
        if self.names.contains(&name) {
            return Err(Report::new(Error::InvalidParameter)
                .attach_printable(format!("Column {name:?} already exists")));
        }
        if let Some(first) = self.columns.first()
            && first.len() != column.len()
        {
            return Err(Report::new(Error::InvalidSize).attach_printable(format!(
                "Column {name:?} has {} rows but the table has {}",
                column.len(),
                first.len()
            )));
        }

        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i])
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(&self.columns)
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Writes a header record followed by one record per row. Missing cells
    /// are left empty.
    pub fn write_csv(&self, out: impl Write) -> io::Result<()> {
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(&self.names)?;
        for row in 0..self.num_rows() {
            writer.write_record(
                self.columns
                    .iter()
                    .map(|c| c.cell(row).unwrap_or_default()),
            )?;
        }
        writer.flush()
    }
}

/// Where a reference table comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Canonical {
    Table(Table),
    /// A connector registered with a [`CanonicalResolver`].
    Named(String),
}

impl From<Table> for Canonical {
    fn from(value: Table) -> Self {
        Self::Table(value)
    }
}

impl From<&str> for Canonical {
    fn from(value: &str) -> Self {
        Self::Named(value.to_string())
    }
}

impl Canonical {
    pub fn load(self, resolver: &dyn CanonicalResolver) -> Result<Table, Error> {
        match self {
            Self::Table(table) => Ok(table),
            Self::Named(name) => resolver.resolve(&name),
        }
    }
}

/// Loads tables by connector name.
pub trait CanonicalResolver {
    fn resolve(&self, name: &str) -> Result<Table, Error>;
}

/// An in-memory connector catalog.
#[derive(Debug, Clone, Default)]
pub struct Connectors {
    tables: HashMap<String, Table>,
}

impl Connectors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, table: Table) -> &mut Self {
        self.tables.insert(name.into(), table);
        self
    }
}

impl CanonicalResolver for Connectors {
    fn resolve(&self, name: &str) -> Result<Table, Error> {
        self.tables.get(name).cloned().ok_or_else(|| {
            Report::new(Error::UnrecognizedInput)
                .attach_printable(format!("The connector {name:?} is not in the catalog"))
        })
    }
}

#[cfg(test)]
mod tests {
    use expect_test::expect;

    use super::*;
    use crate::utils::seed::rng;

    fn table() -> Table {
        let mut table = Table::new();
        table
            .append_column("id", Column::Int(vec![Some(1), Some(2), None]))
            .unwrap();
        table
            .append_column(
                "name",
                Column::Str(vec![Some("a,b".to_string()), None, Some("c".to_string())]),
            )
            .unwrap();
        table
    }

    #[test]
    fn columns_keep_insertion_order() {
        let table = table();
        assert_eq!(table.column_names(), ["id", "name"]);
        assert_eq!(table.num_rows(), 3);
        assert_eq!(table.num_columns(), 2);
        assert_eq!(table.column("id").map(Column::kind), Some("int"));
        assert!(table.column("missing").is_none());
    }

    #[test]
    fn mismatched_columns_are_rejected() {
        let mut table = table();
        let e = table
            .append_column("short", Column::Bool(vec![Some(true)]))
            .unwrap_err();
        assert!(matches!(e.current_context(), Error::InvalidSize));

        let e = table
            .append_column("id", Column::Bool(vec![None; 3]))
            .unwrap_err();
        assert!(matches!(e.current_context(), Error::InvalidParameter));
    }

    #[test]
    fn csv_output() {
        let mut out = Vec::new();
        table().write_csv(&mut out).unwrap();
        expect![[r#"
            id,name
            1,"a,b"
            2,
            ,c
        "#]]
        .assert_eq(&String::from_utf8(out).unwrap());
    }

    #[test]
    fn csv_quotes_line_breaks() {
        let mut table = Table::new();
        table
            .append_column(
                "note",
                Column::Str(vec![Some("a\rb".to_string()), Some("x\ny".to_string())]),
            )
            .unwrap();
        table
            .append_column("n", Column::Int(vec![Some(1), None]))
            .unwrap();

        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "note,n\n\"a\rb\",1\n\"x\ny\",\n"
        );
    }

    #[test]
    fn quantity_blanks_cells() {
        let column = Column::Float(vec![Some(1.); 10]).with_quantity(0.6, &mut rng(1));
        assert_eq!(column.null_count(), 4);
        assert_eq!(column.len(), 10);
    }

    #[test]
    fn numeric_columns_widen() {
        assert_eq!(
            Column::Int(vec![Some(2), None]).to_f64(),
            Some(vec![Some(2.), None])
        );
        assert_eq!(Column::Bool(vec![Some(true)]).to_f64(), None);
    }

    #[test]
    fn connectors_resolve_by_name() {
        let mut connectors = Connectors::new();
        connectors.register("people", table());

        let loaded = Canonical::from("people").load(&connectors).unwrap();
        assert_eq!(loaded, table());

        let direct = Canonical::from(table()).load(&connectors).unwrap();
        assert_eq!(direct.num_rows(), 3);

        let e = Canonical::from("nope").load(&connectors).unwrap_err();
        assert!(matches!(e.current_context(), Error::UnrecognizedInput));
    }
}
