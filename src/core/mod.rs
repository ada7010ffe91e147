pub use category::{sample_category, sample_category_indices};
pub use correlate::{Correlation, Transform, correlate_number};
pub use datetime::{
    DateBound, DateOrder, DateOutput, DateTimes, Truncation, parse_date, render, resolve_bounds,
    sample_datetime,
};
pub use distribution::{Family, bernoulli, bounded_normal, choice, named, names, normal};
pub use expr::Expr;
pub use interval::{Closed, Interval, sample_intervals};
pub use number::{Number, Numbers, Order, Shape, round_to, sample_number};
pub use pattern::{Choices, default_choices, sample_pattern};
pub use quantity::{apply_quantity, normalize};
pub use reference::{sample_lists, sample_reference};
pub use redistribute::{Alignment, redistribute};
pub use truncated::TruncatedNormal;

mod category;
mod correlate;
mod datetime;
mod distribution;
mod expr;
mod interval;
mod number;
mod pattern;
mod quantity;
mod redistribute;
mod reference;
mod truncated;
