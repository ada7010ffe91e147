use std::collections::HashMap;

use bon::Builder;
use error_stack::{Report, Result};
use log::{debug, info};
use rand::Rng;

use crate::{
    column::{Canonical, CanonicalResolver, Column, Connectors, Table},
    core::{Correlation, DateOutput, Order, correlate_number, round_to, sample_category},
    generator::{
        BooleanSampler, CategorySampler, DateTimeSampler, DistributionSampler, Error,
        NormalSampler, NumberSampler, StringPatternSampler,
    },
    utils::{Value, column_label, seed},
};

/// Columns of beta-distributed noise labelled `A`, `B`, ... with shape
/// parameters drawn from 1 to 5.
#[derive(Debug, Clone, Builder)]
pub struct NoiseModel {
    size: usize,
    num_columns: usize,
    seed: Option<u64>,
}

impl NoiseModel {
    pub fn build_table(&self) -> Result<Table, Error> {
        let mut seed = seed::resolve(self.seed);
        let mut shapes = seed::rng(seed);
        let mut table = Table::new();
        for i in 0..self.num_columns {
            seed = seed::increment(seed);
            let (a, b) = (shapes.random_range(1..=5), shapes.random_range(1..=5));
            debug!("Noise column {i} is beta({a}, {b})");
            let column = DistributionSampler::builder()
                .name("beta")
                .params(vec![
                    ("a".to_string(), Value::Int(a)),
                    ("b".to_string(), Value::Int(b)),
                ])
                .precision(6)
                .size(self.size)
                .seed(seed)
                .build()
                .sample()?;
            table.append_column(column_label(i), column)?;
        }
        Ok(table)
    }
}

/// A demo table with one column per supported type.
#[derive(Debug, Clone, Builder)]
pub struct SyntheticTypesModel {
    size: usize,
    /// Adds a `*_null` twin of most columns with missing values.
    #[builder(default)]
    inc_nulls: bool,
    /// Fraction of missing values in the `*_null` columns. Values outside
    /// `(0, 1)` mean 0.02.
    #[builder(default = DEFAULT_P_NULLS)]
    p_nulls: f64,
    seed: Option<u64>,
}

const DEFAULT_P_NULLS: f64 = 0.02;
const FIRST_DATE: &str = "2022-12-01";
const LAST_DATE: &str = "2023-03-31";
const STREET_PATTERN: &str = "dd Ulllll Street";

fn labels(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

impl SyntheticTypesModel {
    pub fn build_table(&self) -> Result<Table, Error> {
        let mut seed = seed::resolve(self.seed);
        let mut next_seed = || {
            seed = seed::increment(seed);
            seed
        };
        let size = self.size;

        let mut table = Table::new();
        table.append_column(
            "cat",
            CategorySampler::builder()
                .selection(labels(&["SUSPENDED", "ACTIVE", "PENDING", "INACTIVE"]))
                .relative_freq(vec![1., 99., 10., 40.])
                .size(size)
                .seed(next_seed())
                .build()
                .sample()?,
        )?;
        table.append_column(
            "num",
            NormalSampler::builder()
                .mean(4.)
                .std_dev(1.)
                .size(size)
                .seed(next_seed())
                .build()
                .sample()?,
        )?;
        table.append_column("int", self.ints(1., next_seed())?)?;
        table.append_column("bool", self.booleans(0.7, 1., next_seed())?)?;
        table.append_column("date", self.dates(1., next_seed())?)?;
        table.append_column("string", self.streets(1., next_seed())?)?;
        table.append_column(
            "binary",
            StringPatternSampler::builder()
                .pattern("cccccccc")
                .as_binary(true)
                .size(size)
                .seed(next_seed())
                .build()
                .sample()?,
        )?;
        if !self.inc_nulls {
            return Ok(table);
        }

        let p_nulls = if self.p_nulls > 0. && self.p_nulls < 1. {
            self.p_nulls
        } else {
            DEFAULT_P_NULLS
        };
        let quantity = 1. - p_nulls;
        info!("Adding null columns with {p_nulls} missing.");
        table.append_column(
            "cat_null",
            CategorySampler::builder()
                .selection(labels(&["M", "F", "U"]))
                .relative_freq(vec![9., 8., 4.])
                .size(size)
                .quantity(quantity)
                .seed(next_seed())
                .build()
                .sample()?,
        )?;
        table.append_column(
            "num_null",
            NumberSampler::builder()
                .start(-1.)
                .stop(1.)
                .relative_freq(vec![1., 1., 2., 3., 5., 8., 13., 21.])
                .size(size)
                .quantity(quantity)
                .seed(next_seed())
                .build()
                .sample()?,
        )?;
        table.append_column("int_null", self.ints(quantity, next_seed())?)?;
        table.append_column("bool_null", self.booleans(0.4, quantity, next_seed())?)?;
        table.append_column("date_null", self.dates(quantity, next_seed())?)?;
        table.append_column("string_null", self.streets(quantity, next_seed())?)?;
        Ok(table)
    }

    fn ints(&self, quantity: f64, seed: u64) -> Result<Column, Error> {
        NumberSampler::builder()
            .start(-1000)
            .stop(1000)
            .size(self.size)
            .quantity(quantity)
            .seed(seed)
            .build()
            .sample()
    }

    fn booleans(&self, p: f64, quantity: f64, seed: u64) -> Result<Column, Error> {
        BooleanSampler::builder()
            .probability(p)
            .size(self.size)
            .quantity(quantity)
            .seed(seed)
            .build()
            .sample()
    }

    fn dates(&self, quantity: f64, seed: u64) -> Result<Column, Error> {
        DateTimeSampler::builder()
            .start(FIRST_DATE)
            .until(LAST_DATE)
            .ordered(Order::Asc)
            .output(DateOutput::Instants)
            .size(self.size)
            .quantity(quantity)
            .seed(seed)
            .build()
            .sample()
    }

    fn streets(&self, quantity: f64, seed: u64) -> Result<Column, Error> {
        StringPatternSampler::builder()
            .pattern(STREET_PATTERN)
            .size(self.size)
            .quantity(quantity)
            .seed(seed)
            .build()
            .sample()
    }
}

/// Re-synthesises a reference table column by column from its observed
/// distributions.
#[derive(Debug, Clone, Builder)]
pub struct AnalysisModel {
    #[builder(into)]
    canonical: Canonical,
    size: usize,
    /// Keeps only this many of the most frequent categories.
    category_limit: Option<usize>,
    seed: Option<u64>,
}

const JITTER_SCALE: f64 = 0.6;
const FLOAT_PRECISION: u32 = 5;

impl AnalysisModel {
    pub fn build_table(&self) -> Result<Table, Error> {
        self.build_table_with(&Connectors::new())
    }

    /// Only string, numeric and boolean columns are carried over.
    #[allow(clippy::cast_precision_loss)]
    pub fn build_table_with(&self, resolver: &dyn CanonicalResolver) -> Result<Table, Error> {
        if self.size == 0 {
            return Err(Report::new(Error::InvalidSize).attach_printable("size must be positive"));
        }
        let other = self.canonical.clone().load(resolver)?;
        let seed = seed::resolve(self.seed);
        let mut rng = seed::rng(seed);

        let mut table = Table::new();
        for (name, column) in other.iter() {
            let column = match column {
                Column::Str(values) => {
                    let (selection, counts) = self.frequencies(values);
                    Column::Str(sample_category(&selection, self.size, Some(&counts), &mut rng)?)
                }
                Column::Int(_) | Column::Float(_) => {
                    self.resample_numbers(name, column, &mut rng)?
                }
                Column::Bool(values) => {
                    let observed = values.iter().flatten().count();
                    let ratio = if observed == 0 {
                        0.5
                    } else {
                        values.iter().filter(|v| **v == Some(true)).count() as f64
                            / observed as f64
                    };
                    BooleanSampler::builder()
                        .probability(ratio)
                        .size(self.size)
                        .seed(rng.random_range(0..seed::SEED_CEILING))
                        .build()
                        .sample()?
                }
                Column::Binary(_) | Column::Timestamp(_) => {
                    debug!("Skipping {} column {name:?}", column.kind());
                    continue;
                }
            };
            table.append_column(name, column)?;
        }
        Ok(table)
    }

    /// Distinct labels by descending count, ties in order of appearance.
    #[allow(clippy::cast_precision_loss)]
    fn frequencies(&self, values: &[Option<String>]) -> (Vec<String>, Vec<f64>) {
        let mut order = Vec::new();
        let mut counts = HashMap::<&str, usize>::new();
        for v in values.iter().flatten() {
            let count = counts.entry(v.as_str()).or_default();
            if *count == 0 {
                order.push(v.as_str());
            }
            *count += 1;
        }
        order.sort_by_key(|v| std::cmp::Reverse(counts[v]));
        if let Some(limit) = self.category_limit {
            order.truncate(limit);
        }
        (
            order.iter().map(ToString::to_string).collect(),
            order.iter().map(|v| counts[v] as f64).collect(),
        )
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn resample_numbers<R: Rng + ?Sized>(
        &self,
        name: &str,
        column: &Column,
        rng: &mut R,
    ) -> Result<Column, Error> {
        let values = column.to_f64().unwrap_or_default();
        if values.is_empty() {
            return Err(Report::new(Error::InvalidSize)
                .attach_printable(format!("Column {name:?} has no rows to resample")));
        }

        let observed = values.iter().flatten().copied().collect::<Vec<_>>();
        let std_dev = if observed.is_empty() {
            0.
        } else {
            let n = observed.len() as f64;
            let mean = observed.iter().sum::<f64>() / n;
            (observed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
        };
        let is_int = matches!(column, Column::Int(_));
        let correlation = Correlation {
            jitter: Some(round_to(JITTER_SCALE * std_dev, 5)),
            precision: Some(if is_int { 0 } else { FLOAT_PRECISION }),
            ..Correlation::default()
        };
        debug!("Resampling {name:?} with jitter {:?}", correlation.jitter);

        let mut out = Vec::with_capacity(self.size + values.len());
        while out.len() < self.size {
            out.extend(correlate_number(&values, &correlation, rng)?);
        }
        out.truncate(self.size);
        Ok(if is_int {
            Column::Int(out.into_iter().map(|v| v.map(|v| v as i64)).collect())
        } else {
            Column::Float(out)
        })
    }
}

#[cfg(test)]
mod tests {
    use more_asserts::{assert_ge, assert_le, assert_lt};

    use super::*;

    #[test]
    fn noise_columns_are_labelled() {
        let table = NoiseModel::builder()
            .size(50)
            .num_columns(28)
            .seed(31)
            .build()
            .build_table()
            .unwrap();
        assert_eq!(table.num_columns(), 28);
        assert_eq!(table.num_rows(), 50);
        assert_eq!(table.column_names()[0], "A");
        assert_eq!(table.column_names()[25], "Z");
        assert_eq!(table.column_names()[27], "AB");
        for (_, column) in table.iter() {
            let Column::Float(values) = column else {
                panic!("expected floats, got {column:?}")
            };
            for v in values.iter().flatten() {
                assert_ge!(*v, 0.);
                assert_le!(*v, 1.);
            }
        }
    }

    #[test]
    fn noise_is_reproducible() {
        let model = NoiseModel::builder().size(10).num_columns(3).seed(2).build();
        assert_eq!(model.build_table().unwrap(), model.build_table().unwrap());
    }

    #[test]
    fn synthetic_types_without_nulls() {
        let table = SyntheticTypesModel::builder()
            .size(100)
            .seed(1)
            .build()
            .build_table()
            .unwrap();
        assert_eq!(
            table.column_names(),
            ["cat", "num", "int", "bool", "date", "string", "binary"]
        );
        assert_eq!(table.num_rows(), 100);
        for (_, column) in table.iter() {
            assert_eq!(column.null_count(), 0);
        }
        let Some(Column::Timestamp(dates)) = table.column("date") else {
            panic!("expected timestamps")
        };
        assert!(dates.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn synthetic_types_with_nulls() {
        let table = SyntheticTypesModel::builder()
            .size(200)
            .inc_nulls(true)
            .p_nulls(0.1)
            .seed(1)
            .build()
            .build_table()
            .unwrap();
        assert_eq!(table.num_columns(), 13);
        for name in ["cat_null", "num_null", "int_null", "bool_null", "date_null", "string_null"] {
            assert_eq!(table.column(name).map(Column::null_count), Some(20), "{name}");
        }
        let Some(Column::Float(values)) = table.column("num_null") else {
            panic!("expected floats")
        };
        for v in values.iter().flatten() {
            assert_ge!(*v, -1.);
            assert_lt!(*v, 1.);
        }
    }

    #[test]
    fn out_of_range_p_nulls_uses_default() {
        let table = SyntheticTypesModel::builder()
            .size(100)
            .inc_nulls(true)
            .p_nulls(3.)
            .seed(1)
            .build()
            .build_table()
            .unwrap();
        assert_eq!(table.column("int_null").map(Column::null_count), Some(2));
    }

    fn reference() -> Table {
        let mut table = Table::new();
        table
            .append_column(
                "status",
                Column::Str(
                    ["a", "a", "a", "b", "b", "c"]
                        .into_iter()
                        .map(|s| Some(s.to_string()))
                        .collect(),
                ),
            )
            .unwrap();
        table
            .append_column(
                "age",
                Column::Int(vec![Some(20), Some(30), None, Some(40), Some(50), Some(60)]),
            )
            .unwrap();
        table
            .append_column("score", Column::Float(vec![Some(0.5); 6]))
            .unwrap();
        table
            .append_column(
                "flag",
                Column::Bool(vec![Some(true), Some(true), Some(true), Some(false), None, None]),
            )
            .unwrap();
        table
            .append_column("raw", Column::Binary(vec![None; 6]))
            .unwrap();
        table
    }

    #[test]
    fn analysis_mirrors_the_reference() {
        let table = AnalysisModel::builder()
            .canonical(reference())
            .size(15)
            .seed(9)
            .build()
            .build_table()
            .unwrap();
        assert_eq!(table.column_names(), ["status", "age", "score", "flag"]);
        assert_eq!(table.num_rows(), 15);

        let Some(Column::Int(ages)) = table.column("age") else {
            panic!("expected ints")
        };
        // The single missing age repeats with every pass over the reference
        assert_eq!(ages.iter().filter(|v| v.is_none()).count(), 3);

        assert_eq!(
            table.column("score"),
            Some(&Column::Float(vec![Some(0.5); 15]))
        );
        let Some(Column::Str(status)) = table.column("status") else {
            panic!("expected strings")
        };
        assert!(status.iter().flatten().all(|s| ["a", "b", "c"].contains(&s.as_str())));
    }

    #[test]
    fn category_limit_keeps_the_most_frequent() {
        let table = AnalysisModel::builder()
            .canonical(reference())
            .size(30)
            .category_limit(1)
            .seed(9)
            .build()
            .build_table()
            .unwrap();
        let Some(Column::Str(status)) = table.column("status") else {
            panic!("expected strings")
        };
        assert!(status.iter().all(|s| s.as_deref() == Some("a")));
    }

    #[test]
    fn analysis_resolves_named_tables() {
        let mut connectors = Connectors::new();
        connectors.register("reference", reference());
        let model = AnalysisModel::builder()
            .canonical("reference")
            .size(4)
            .seed(0)
            .build();
        assert_eq!(model.build_table_with(&connectors).unwrap().num_rows(), 4);

        let e = model.build_table().unwrap_err();
        assert!(matches!(e.current_context(), Error::UnrecognizedInput));
    }
}
