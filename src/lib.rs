#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::module_name_repetitions)]

pub use crate::{
    core::{
        Alignment, Choices, Closed, Correlation, DateBound, DateOrder, DateOutput, DateTimes, Expr,
        Family, Interval, Number, Numbers, Order, Shape, Transform, TruncatedNormal, Truncation,
        apply_quantity, bernoulli, bounded_normal, choice, correlate_number, default_choices,
        named, names, normal, normalize, parse_date, redistribute, render, resolve_bounds,
        round_to, sample_category, sample_category_indices, sample_datetime, sample_intervals,
        sample_lists, sample_number, sample_pattern, sample_reference,
    },
    utils::{Value, column_label, seed},
};

pub mod column;
pub mod generator;
pub mod model;

mod core;
mod utils;
