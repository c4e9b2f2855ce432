//! The extension rule.
//!
//! Paying early never shortens the remaining entitlement and back-to-back
//! payments stack: the new window starts at `max(now, current)`.

use crate::domain::foundation::Timestamp;

use super::SubscriptionKind;

/// Months granted when no override is given.
pub const DEFAULT_VPN_MONTHS: u32 = 1;

/// Normalizes a months override; absent or zero means one month.
pub fn effective_months(months: Option<u32>) -> u32 {
    months.filter(|m| *m > 0).unwrap_or(DEFAULT_VPN_MONTHS)
}

/// Computes `active_until` for a new paid row.
///
/// `current` is the greatest `active_until` among the paid rows of the
/// same (user, kind, country) bucket, if any. Non-renewable kinds are
/// one-shot records and end at `now`.
pub fn compute_active_until(
    kind: SubscriptionKind,
    now: Timestamp,
    current: Option<Timestamp>,
    months: Option<u32>,
) -> Timestamp {
    if !kind.is_renewable() {
        return now;
    }
    let base = current.map_or(now, |until| until.max(now));
    base.add_months(effective_months(months))
}

/// New `active_until` of a row extended in place.
///
/// Months are added to the row's own end, or to the bucket maximum when a
/// later window exists, so a renewal never overlaps a newer payment.
pub fn extended_until(row_until: Timestamp, bucket_max: Option<Timestamp>, months: u32) -> Timestamp {
    bucket_max
        .map_or(row_until, |max| max.max(row_until))
        .add_months(months)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ts(value: &str) -> Timestamp {
        Timestamp::parse_rfc3339(value).unwrap()
    }

    #[test]
    fn first_payment_starts_now() {
        let now = ts("2024-01-10T00:00:00Z");
        assert_eq!(
            compute_active_until(SubscriptionKind::Vpn, now, None, None),
            ts("2024-02-10T00:00:00Z")
        );
    }

    #[test]
    fn early_payment_stacks_on_remaining_time() {
        let now = ts("2024-01-10T00:00:00Z");
        let current = ts("2024-02-01T00:00:00Z");
        assert_eq!(
            compute_active_until(SubscriptionKind::Vpn, now, Some(current), Some(2)),
            ts("2024-04-01T00:00:00Z")
        );
    }

    #[test]
    fn lapsed_entitlement_restarts_from_now() {
        let now = ts("2024-03-01T00:00:00Z");
        let current = ts("2024-01-01T00:00:00Z");
        assert_eq!(
            compute_active_until(SubscriptionKind::Vpn, now, Some(current), None),
            ts("2024-04-01T00:00:00Z")
        );
    }

    #[test]
    fn in_place_extension_starts_from_own_end() {
        let until = ts("2024-02-01T00:00:00Z");
        assert_eq!(extended_until(until, Some(until), 1), ts("2024-03-01T00:00:00Z"));
        assert_eq!(extended_until(until, None, 2), ts("2024-04-01T00:00:00Z"));
    }

    #[test]
    fn in_place_extension_stacks_on_newer_window() {
        let row = ts("2024-02-01T00:00:00Z");
        let newer = ts("2024-03-01T00:00:00Z");
        assert_eq!(extended_until(row, Some(newer), 1), ts("2024-04-01T00:00:00Z"));
    }

    #[test]
    fn zero_months_means_one() {
        assert_eq!(effective_months(Some(0)), 1);
        assert_eq!(effective_months(None), 1);
        assert_eq!(effective_months(Some(3)), 3);
    }

    #[test]
    fn non_renewable_kind_ends_now() {
        let now = ts("2024-01-10T00:00:00Z");
        let current = ts("2024-05-01T00:00:00Z");
        assert_eq!(
            compute_active_until(SubscriptionKind::CountryRequest, now, Some(current), Some(6)),
            now
        );
    }

    // Seconds from 2020-01-01 to roughly 2030.
    fn instant() -> impl Strategy<Value = Timestamp> {
        (1_577_836_800i64..1_893_456_000i64).prop_map(|secs| {
            Timestamp::from_datetime(chrono::DateTime::from_timestamp(secs, 0).unwrap())
        })
    }

    proptest! {
        #[test]
        fn extension_is_monotonic(
            start in instant(),
            steps in prop::collection::vec((0i64..90 * 86_400, 0u32..13), 1..12),
        ) {
            let mut now = start;
            let mut current: Option<Timestamp> = None;
            for (advance_secs, months) in steps {
                now = Timestamp::from_datetime(*now.as_datetime() + chrono::Duration::seconds(advance_secs));
                let next = compute_active_until(SubscriptionKind::Vpn, now, current, Some(months));
                let base = current.map_or(now, |c| c.max(now));

                prop_assert!(next >= base.add_months(effective_months(Some(months))));
                if let Some(previous) = current {
                    prop_assert!(next >= previous);
                }
                current = Some(next);
            }
        }
    }
}
