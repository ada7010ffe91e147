use error_stack::{Report, Result};
use log::debug;
use rand::{Rng, seq::SliceRandom};

use crate::generator::Error;

/// The most common US occupations, most frequent first.
const US_PROFESSION_RANK: &[&str] = &[
    "Manager",
    "Driver",
    "Elementary and middle school teacher",
    "Registered nurse",
    "First-line supervisors of retail sales worker",
    "Cashier",
    "Retail salesperson",
    "Community and social service",
    "Secretary or administrative assistant",
    "Customer service representative",
    "Janitor or building cleaner",
    "Laborer or freight, stock or material mover",
    "Nursing, psychiatric or home health aide",
    "Construction laborer",
    "Waiter or waitress",
    "Cook",
    "Accountant or auditor",
    "Software developer, application or systems software",
    "Chief executive",
    "Stock clerk or order filler",
    "Maid or housekeeping cleaner",
    "Personal care aide",
    "Postsecondary teacher",
    "Office clerk, general",
    "First-line supervisors of office and administrative support worker",
    "Carpenter",
    "Receptionist or information clerk",
    "Sales representative, wholesale and manufacturing",
    "Grounds maintenance worker",
    "Food service manager",
];

const US_STATES: &[&str] = &[
    "Alabama",
    "Alaska",
    "Arizona",
    "Arkansas",
    "California",
    "Colorado",
    "Connecticut",
    "Delaware",
    "Florida",
    "Georgia",
    "Hawaii",
    "Idaho",
    "Illinois",
    "Indiana",
    "Iowa",
    "Kansas",
    "Kentucky",
    "Louisiana",
    "Maine",
    "Maryland",
    "Massachusetts",
    "Michigan",
    "Minnesota",
    "Mississippi",
    "Missouri",
    "Montana",
    "Nebraska",
    "Nevada",
    "New Hampshire",
    "New Jersey",
    "New Mexico",
    "New York",
    "North Carolina",
    "North Dakota",
    "Ohio",
    "Oklahoma",
    "Oregon",
    "Pennsylvania",
    "Rhode Island",
    "South Carolina",
    "South Dakota",
    "Tennessee",
    "Texas",
    "Utah",
    "Vermont",
    "Virginia",
    "Washington",
    "West Virginia",
    "Wisconsin",
    "Wyoming",
];

const WEEKDAYS: &[&str] = &[
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

const REFERENCES: &[(&str, &[&str])] = &[
    ("us_profession_rank", US_PROFESSION_RANK),
    ("us_states", US_STATES),
    ("weekdays", WEEKDAYS),
];

/// Names of the built-in reference lists.
pub fn sample_lists() -> impl Iterator<Item = &'static str> {
    REFERENCES.iter().map(|&(name, _)| name)
}

/// Takes `size` values from the reference list `name`.
///
/// Only the first `sample_size` entries of the list are used when given. The
/// entries are shuffled unless `shuffle` is off, then repeated in order until
/// `size` values have been taken.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(rng)))]
pub fn sample_reference<R: Rng + ?Sized>(
    name: &str,
    sample_size: Option<usize>,
    shuffle: bool,
    size: usize,
    rng: &mut R,
) -> Result<Vec<String>, Error> {
    if size == 0 {
        return Err(Report::new(Error::InvalidSize).attach_printable("size must be positive"));
    }
    let Some(&(_, reference)) = REFERENCES.iter().find(|&&(n, _)| n == name) else {
        return Err(Report::new(Error::InvalidParameter).attach_printable(format!(
            "Unknown sample {name:?}, expected one of {:?}",
            sample_lists().collect::<Vec<_>>()
        )));
    };
    if sample_size == Some(0) {
        return Err(Report::new(Error::InvalidParameter)
            .attach_printable("sample_size must be positive"));
    }

    let len = sample_size.map_or(reference.len(), |n| n.min(reference.len()));
    let mut selection = reference[..len].to_vec();
    if shuffle {
        selection.shuffle(rng);
    }
    debug!("Taking {size} values from {} entries of {name}", selection.len());

    Ok(selection
        .iter()
        .cycle()
        .take(size)
        .map(|s| (*s).to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::utils::seed::rng;

    #[test]
    fn unshuffled_samples_keep_list_order() {
        let values = sample_reference("weekdays", Some(3), false, 7, &mut rng(0)).unwrap();
        assert_eq!(
            values,
            [
                "Monday",
                "Tuesday",
                "Wednesday",
                "Monday",
                "Tuesday",
                "Wednesday",
                "Monday"
            ]
        );
    }

    #[test]
    fn shuffled_samples_cover_the_list() {
        let values = sample_reference("us_states", None, true, 50, &mut rng(3)).unwrap();
        assert_eq!(values.iter().collect::<HashSet<_>>().len(), 50);
    }

    #[test]
    fn unknown_samples_are_rejected() {
        let e = sample_reference("nope", None, true, 3, &mut rng(0)).unwrap_err();
        assert!(matches!(e.current_context(), Error::InvalidParameter));

        let e = sample_reference("weekdays", None, true, 0, &mut rng(0)).unwrap_err();
        assert!(matches!(e.current_context(), Error::InvalidSize));

        let e = sample_reference("weekdays", Some(0), true, 3, &mut rng(0)).unwrap_err();
        assert!(matches!(e.current_context(), Error::InvalidParameter));
    }

    #[test]
    fn lists_are_named() {
        assert_eq!(
            sample_lists().collect::<Vec<_>>(),
            ["us_profession_rank", "us_states", "weekdays"]
        );
    }
}
