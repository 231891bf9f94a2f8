use chrono::{DateTime, Utc};

/// True when every sibling signature slot has been filled.
///
/// Completeness is re-derived from the full set of rows after each signature
/// write instead of being tracked as a counter, so the last signer is the
/// one that observes the transition. An empty set counts as fully signed.
pub fn all_signed<'a, I>(timestamps: I) -> bool
where
    I: IntoIterator<Item = &'a Option<DateTime<Utc>>>,
{
    timestamps.into_iter().all(|ts| ts.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_signed_when_every_timestamp_set() {
        let timestamps = vec![Some(Utc::now()), Some(Utc::now())];
        assert!(all_signed(&timestamps));
    }

    #[test]
    fn test_not_all_signed_with_one_missing() {
        let timestamps = vec![Some(Utc::now()), None, Some(Utc::now())];
        assert!(!all_signed(&timestamps));
    }

    #[test]
    fn test_empty_set_counts_as_signed() {
        let timestamps: Vec<Option<DateTime<Utc>>> = vec![];
        assert!(all_signed(&timestamps));
    }
}
