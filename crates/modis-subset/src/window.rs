//! Date filtering and request window planning.
//!
//! Retrieval happens in two phases over the server's ordered date list:
//! a filtering pass that counts the dates inside `[start, end]` (so the
//! result matrix can be allocated up front), and a planning pass that
//! greedily cuts that range into windows of at most `chunk_size` dates.

use crate::date::DateToken;
use crate::error::{ModisError, Result};

/// A contiguous slice of the server date list sent as one subset request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestWindow {
    /// Index of the first date in the full server list
    pub offset: usize,
    /// Number of dates covered
    pub len: usize,
    pub start: DateToken,
    pub end: DateToken,
}

impl RequestWindow {
    /// Index one past the last covered date.
    pub fn end_offset(&self) -> usize {
        self.offset + self.len
    }
}

/// Return the dates whose decoded value lies in `[start, end]`.
///
/// Dates before `start` are skipped and the walk stops at the first date
/// after `end`; the list is assumed to be in chronological order.
pub fn filter_dates(dates: &[DateToken], start: i64, end: i64) -> Vec<DateToken> {
    let mut kept = Vec::new();

    for token in dates {
        let date = token.as_int();
        if date < start {
            continue;
        }
        if date > end {
            break;
        }
        kept.push(*token);
    }

    kept
}

/// Partition the in-range part of `dates` into request windows.
///
/// Each window starts at the next unconsumed in-range date, takes up to
/// `chunk_size` dates and is shrunk from the back until its last date is no
/// later than `end`. Windows never overlap and never extend past `end`.
pub fn plan_windows(
    dates: &[DateToken],
    start: i64,
    end: i64,
    chunk_size: usize,
) -> Result<Vec<RequestWindow>> {
    if chunk_size == 0 {
        return Err(ModisError::configuration("chunk size must be > 0"));
    }

    let mut windows = Vec::new();
    let mut i = 0;

    while i < dates.len() {
        let date = dates[i].as_int();
        if date < start {
            i += 1;
            continue;
        }
        if date > end {
            break;
        }

        let mut len = chunk_size.min(dates.len() - i);
        // dates[i] <= end, so this stops at len == 1 at the latest
        while dates[i + len - 1].as_int() > end {
            len -= 1;
        }

        windows.push(RequestWindow {
            offset: i,
            len,
            start: dates[i],
            end: dates[i + len - 1],
        });

        i += len;
    }

    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::parse_date_list;

    fn sample_list() -> Vec<DateToken> {
        parse_date_list(&["A2006097", "A2006105", "A2006113", "A2006121", "A2006129"]).unwrap()
    }

    fn tokens(windows: &[RequestWindow]) -> Vec<(String, String)> {
        windows
            .iter()
            .map(|w| (w.start.to_string(), w.end.to_string()))
            .collect()
    }

    #[test]
    fn test_filter_dates() {
        let kept = filter_dates(&sample_list(), 2006100, 2006125);
        let kept: Vec<String> = kept.iter().map(|t| t.to_string()).collect();
        assert_eq!(kept, vec!["A2006105", "A2006113", "A2006121"]);
    }

    #[test]
    fn test_filter_dates_inclusive_bounds() {
        let kept = filter_dates(&sample_list(), 2006105, 2006121);
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_filter_dates_empty_range() {
        assert!(filter_dates(&sample_list(), 2006130, 2006200).is_empty());
        assert!(filter_dates(&sample_list(), 2006125, 2006100).is_empty());
    }

    #[test]
    fn test_single_window_when_chunk_covers_range() {
        let windows = plan_windows(&sample_list(), 2006100, 2006125, 8).unwrap();
        assert_eq!(
            tokens(&windows),
            vec![("A2006105".to_string(), "A2006121".to_string())]
        );
        assert_eq!(windows[0].offset, 1);
        assert_eq!(windows[0].len, 3);
    }

    #[test]
    fn test_chunk_of_two() {
        let windows = plan_windows(&sample_list(), 2006100, 2006125, 2).unwrap();
        assert_eq!(
            tokens(&windows),
            vec![
                ("A2006105".to_string(), "A2006113".to_string()),
                ("A2006121".to_string(), "A2006121".to_string()),
            ]
        );
    }

    #[test]
    fn test_window_shrinks_at_end_date() {
        // chunk of 3 starting at A2006113 would reach A2006129 > end
        let windows = plan_windows(&sample_list(), 2006110, 2006125, 3).unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].len, 2);
        assert_eq!(windows[0].end.as_int(), 2006121);
    }

    #[test]
    fn test_windows_partition_filtered_range() {
        let dates = parse_date_list(
            &(1..=46)
                .map(|k| format!("A2010{:03}", 1 + (k - 1) * 8))
                .collect::<Vec<_>>(),
        )
        .unwrap();

        for chunk in 1..=10 {
            let windows = plan_windows(&dates, 2010050, 2010300, chunk).unwrap();
            let filtered = filter_dates(&dates, 2010050, 2010300);

            let covered: Vec<DateToken> = windows
                .iter()
                .flat_map(|w| dates[w.offset..w.end_offset()].iter().copied())
                .collect();
            assert_eq!(covered, filtered, "chunk size {}", chunk);

            for pair in windows.windows(2) {
                assert_eq!(pair[0].end_offset(), pair[1].offset);
            }
            for w in &windows {
                assert!(w.len <= chunk);
                assert!(w.end.as_int() <= 2010300);
            }
        }
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(matches!(
            plan_windows(&sample_list(), 2006100, 2006125, 0),
            Err(ModisError::Configuration(_))
        ));
    }

    #[test]
    fn test_no_windows_outside_list() {
        let windows = plan_windows(&sample_list(), 2007001, 2007365, 8).unwrap();
        assert!(windows.is_empty());
    }
}
