//! Receipt number allocation.
//!
//! Receipts are partitioned by (GST flag, financial year). Within a
//! partition the suffix increments from the highest sequence already
//! issued; the composed form is
//! `<prefix><current calendar year><FY end year, 2 digits><suffix>`,
//! e.g. `G2024250001` or `NG2024250013`.

use admin_core::error::AppError;
use chrono::{DateTime, Datelike, Utc};

use crate::ledger::fiscal::FyWindow;

const GST_PREFIX: &str = "G";
const NON_GST_PREFIX: &str = "NG";

/// Calendar-year digits plus the two FY end-year digits between the
/// prefix and the sequence suffix.
const YEAR_DIGITS: usize = 6;

/// Minimum digits in the sequence suffix. Past 9999 the pad simply widens
/// to five digits rather than erroring; the suffix is parsed at full
/// width, so sequencing keeps counting. See DESIGN.md.
const SUFFIX_DIGITS: usize = 4;

pub fn prefix(is_gst: bool) -> &'static str {
    if is_gst { GST_PREFIX } else { NON_GST_PREFIX }
}

/// Sequence component of an issued receipt number: every digit after the
/// prefix and year header.
pub fn sequence_of(receipt: &str) -> Result<u32, AppError> {
    let header = if receipt.starts_with(NON_GST_PREFIX) {
        NON_GST_PREFIX.len() + YEAR_DIGITS
    } else {
        GST_PREFIX.len() + YEAR_DIGITS
    };
    let suffix = receipt
        .get(header..)
        .filter(|suffix| !suffix.is_empty())
        .ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Malformed receipt number '{}': no sequence suffix",
                receipt
            ))
        })?;
    suffix.parse().map_err(|_| {
        AppError::InternalError(anyhow::anyhow!(
            "Malformed receipt number '{}': non-numeric suffix '{}'",
            receipt,
            suffix
        ))
    })
}

/// Next sequence for a partition given the receipt holding its highest
/// issued sequence. Starts at 1 for an empty partition.
pub fn next_sequence(latest: Option<&str>) -> Result<u32, AppError> {
    match latest {
        None => Ok(1),
        Some(latest) => Ok(sequence_of(latest)? + 1),
    }
}

/// Compose a receipt number. The 4-digit year is *today's* calendar year;
/// the 2-digit component is the financial year's *end* year. The two are
/// independent by design.
pub fn compose(is_gst: bool, today: DateTime<Utc>, window: &FyWindow, sequence: u32) -> String {
    format!(
        "{}{}{:02}{:04}",
        prefix(is_gst),
        today.year(),
        window.end_year() % 100,
        sequence
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn may_2024() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn first_receipt_in_partition() {
        let now = may_2024();
        let window = FyWindow::containing(now);
        let seq = next_sequence(None).unwrap();
        assert_eq!(compose(true, now, &window, seq), "G2024250001");
        assert_eq!(compose(false, now, &window, seq), "NG2024250001");
    }

    #[test]
    fn sequence_increments_from_latest() {
        assert_eq!(next_sequence(Some("G2024250001")).unwrap(), 2);
        assert_eq!(next_sequence(Some("NG2024250099")).unwrap(), 100);
        assert_eq!(next_sequence(Some("G2024250123")).unwrap(), 124);
    }

    #[test]
    fn suffix_pads_to_four_digits() {
        let now = may_2024();
        let window = FyWindow::containing(now);
        assert_eq!(compose(true, now, &window, 7), "G2024250007");
        assert_eq!(compose(true, now, &window, 123), "G2024250123");
    }

    #[test]
    fn suffix_widens_past_9999_and_keeps_counting() {
        let now = may_2024();
        let window = FyWindow::containing(now);
        assert_eq!(next_sequence(Some("G2024259999")).unwrap(), 10000);
        assert_eq!(compose(true, now, &window, 10000), "G20242510000");
        assert_eq!(next_sequence(Some("G20242510000")).unwrap(), 10001);
        assert_eq!(next_sequence(Some("NG20242512345")).unwrap(), 12346);
    }

    #[test]
    fn sequence_of_reads_the_full_suffix() {
        assert_eq!(sequence_of("G2024250001").unwrap(), 1);
        assert_eq!(sequence_of("NG2024250099").unwrap(), 99);
        assert_eq!(sequence_of("G20242510000").unwrap(), 10000);
    }

    #[test]
    fn calendar_year_and_fy_end_year_are_independent() {
        // January 2025 still sits in the FY that started April 2024:
        // the receipt embeds calendar year 2025 but FY end year 25.
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        let window = FyWindow::containing(now);
        assert_eq!(window.start_year, 2024);
        assert_eq!(compose(true, now, &window, 4), "G2025250004");
    }

    #[test]
    fn malformed_receipt_is_an_error_not_a_panic() {
        assert!(next_sequence(Some("G2")).is_err());
        assert!(next_sequence(Some("G2024 5abc")).is_err());
    }
}
