//! Generators for synthetic MODIS service payloads.
//!
//! Values are predictable so assembled matrices can be checked cell by
//! cell: the value of cell `c` on the date `YYYYDDD` is `DDD * 100 + c`.

/// Every day of every year in `years`, as `A` tokens.
///
/// Useful for exercising chunking without a server.
///
/// ```
/// use test_utils::dummy_date_list;
///
/// let dates = dummy_date_list(2001..2003);
/// assert_eq!(dates[0], "A2001001");
/// assert_eq!(dates.len(), 365 * 2);
/// ```
pub fn dummy_date_list(years: std::ops::Range<i32>) -> Vec<String> {
    let mut dates = Vec::new();
    for year in years {
        for day in 1..=365 {
            dates.push(format!("A{:04}{:03}", year, day));
        }
    }
    dates
}

/// Composite dates for one year every `step` days starting at day 1
/// (8-day composites use `step = 8`).
///
/// ```
/// use test_utils::composite_date_list;
///
/// let dates = composite_date_list(2006, 8);
/// assert_eq!(dates.len(), 46);
/// assert_eq!(dates[1], "A2006009");
/// ```
pub fn composite_date_list(year: i32, step: usize) -> Vec<String> {
    (1..=365)
        .step_by(step.max(1))
        .map(|day| format!("A{:04}{:03}", year, day))
        .collect()
}

/// Expected value of `cell` on `token` under the generator pattern.
pub fn cell_value(token: &str, cell: usize) -> i64 {
    let day: i64 = token[token.len() - 3..].parse().unwrap_or(0);
    day * 100 + cell as i64
}

/// A subset row for `token` with `cells` values following the pattern.
///
/// The first five fields mimic the metadata the service prepends.
pub fn subset_row(product: &str, band: &str, token: &str, cells: usize) -> String {
    let mut fields = vec![
        format!("{}.{}.h17v03.006", product, token),
        product.to_string(),
        token.to_string(),
        format!("{}Lat", band),
        "2015148151541".to_string(),
    ];
    fields.extend((0..cells).map(|c| cell_value(token, c).to_string()));
    fields.join(",")
}
