/// Spreadsheet-style column label for a zero-based index: `A`, `B`, …, `Z`,
/// `AA`, `AB`, ….
#[must_use]
pub fn column_label(mut i: usize) -> String {
    let mut label = Vec::new();
    loop {
        #[allow(clippy::cast_possible_truncation)]
        label.push(b'A' + (i % 26) as u8);
        if i < 26 {
            break;
        }
        i = i / 26 - 1;
    }
    label.reverse();
    String::from_utf8(label).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use expect_test::expect;

    use super::*;

    #[test]
    fn labels_roll_over() {
        let labels = [0, 1, 25, 26, 27, 51, 52, 701, 702]
            .map(column_label)
            .join(" ");
        expect!["A B Z AA AB AZ BA ZZ AAA"].assert_eq(&labels);
    }
}
