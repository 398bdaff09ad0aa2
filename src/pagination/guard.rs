use std::fmt;
use url::Url;

/// Why a next-page candidate was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardTrip {
    /// Page numbers this high belong to the unfiltered listing.
    AtThreshold { page: u32, threshold: u32 },
    /// Backward or self loop.
    NotForward { page: u32, current: u32 },
    SameUrl,
    /// The active filter was dropped or swapped for another value.
    FilterChanged {
        expected: String,
        found: Option<String>,
    },
    /// No page number could be read, so progress cannot be proven.
    NoPageNumber,
}

impl fmt::Display for GuardTrip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtThreshold { page, threshold } => {
                write!(f, "page {page} is at or above the unfiltered threshold {threshold}")
            }
            Self::NotForward { page, current } => {
                write!(f, "page {page} does not advance past page {current}")
            }
            Self::SameUrl => f.write_str("candidate is the current url"),
            Self::FilterChanged { expected, found } => match found {
                Some(found) => write!(f, "filter changed from {expected:?} to {found:?}"),
                None => write!(f, "filter {expected:?} dropped"),
            },
            Self::NoPageNumber => f.write_str("candidate carries no page number"),
        }
    }
}

/// The validity guard every pagination strategy runs its candidates through.
///
/// Accepted candidates strictly increase the page number and stay below the
/// threshold, so a walk visits at most `threshold` pages.
#[derive(Debug, Clone)]
pub struct PageGuard<'a> {
    pub current_url: &'a Url,
    pub current_page: u32,
    pub threshold: u32,
    pub filter_param: &'a str,
    /// The target's filter value, used when the current URL carries none.
    pub target_filter: Option<&'a str>,
}

impl PageGuard<'_> {
    pub fn check(&self, candidate: &Url, page: Option<u32>) -> Result<u32, GuardTrip> {
        let page = page.ok_or(GuardTrip::NoPageNumber)?;

        if page >= self.threshold {
            return Err(GuardTrip::AtThreshold {
                page,
                threshold: self.threshold,
            });
        }
        if page <= self.current_page {
            return Err(GuardTrip::NotForward {
                page,
                current: self.current_page,
            });
        }
        if candidate.as_str() == self.current_url.as_str() {
            return Err(GuardTrip::SameUrl);
        }

        let found = query_value(candidate, self.filter_param);
        match query_value(self.current_url, self.filter_param) {
            Some(expected) if found.as_deref() != Some(expected.as_str()) => {
                return Err(GuardTrip::FilterChanged { expected, found });
            }
            Some(_) => {}
            // A POSTed listing keeps its filter in the session; links may omit it
            // but must not name a different one.
            None => {
                if let (Some(expected), Some(found)) = (self.target_filter, found)
                    && expected != found
                {
                    return Err(GuardTrip::FilterChanged {
                        expected: expected.to_string(),
                        found: Some(found),
                    });
                }
            }
        }

        Ok(page)
    }
}

/// First value of a query parameter.
pub fn query_value(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Page number carried in the query, if it parses.
pub fn page_number(url: &Url, page_param: &str) -> Option<u32> {
    query_value(url, page_param)?.trim().parse().ok()
}

/// Replace every occurrence of `name` with a single `name=value`, keeping
/// the other pairs in order. Appends when absent.
pub fn set_query_param(url: &Url, name: &str, value: &str) -> Url {
    let mut replaced = false;
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter_map(|(key, existing)| {
            if key != name {
                return Some((key.into_owned(), existing.into_owned()));
            }
            if replaced {
                return None;
            }
            replaced = true;
            Some((key.into_owned(), value.to_string()))
        })
        .collect();

    let mut updated = url.clone();
    {
        let mut query = updated.query_pairs_mut();
        query.clear();
        for (key, existing) in &pairs {
            query.append_pair(key, existing);
        }
        if !replaced {
            query.append_pair(name, value);
        }
    }
    updated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    fn guard(current: &Url) -> PageGuard<'_> {
        PageGuard {
            current_url: current,
            current_page: 1,
            threshold: 1000,
            filter_param: "state",
            target_filter: Some("01"),
        }
    }

    #[test]
    fn accepts_forward_page_with_same_filter() {
        let current = url("https://x.test/results.asp?state=01&page=1");
        let next = url("https://x.test/results.asp?state=01&page=2");
        assert_eq!(guard(&current).check(&next, Some(2)), Ok(2));
    }

    #[test]
    fn rejects_threshold_pages() {
        let current = url("https://x.test/results.asp?state=01&page=1");
        let next = url("https://x.test/results.asp?state=01&page=1006");
        assert_eq!(
            guard(&current).check(&next, Some(1006)),
            Err(GuardTrip::AtThreshold {
                page: 1006,
                threshold: 1000
            })
        );
        assert!(guard(&current).check(&next, Some(1000)).is_err());
    }

    #[test]
    fn rejects_backward_and_self_loops() {
        let current = url("https://x.test/results.asp?state=01&page=3");
        let mut g = guard(&current);
        g.current_page = 3;
        let back = url("https://x.test/results.asp?state=01&page=2");
        assert!(matches!(
            g.check(&back, Some(2)),
            Err(GuardTrip::NotForward { .. })
        ));
        assert!(g.check(&current, Some(3)).is_err());
        assert_eq!(g.check(&current, Some(4)), Err(GuardTrip::SameUrl));
    }

    #[test]
    fn rejects_dropped_or_changed_filter() {
        let current = url("https://x.test/results.asp?state=01&page=1");
        let dropped = url("https://x.test/results.asp?page=2");
        let changed = url("https://x.test/results.asp?state=02&page=2");
        assert_eq!(
            guard(&current).check(&dropped, Some(2)),
            Err(GuardTrip::FilterChanged {
                expected: "01".into(),
                found: None
            })
        );
        assert!(guard(&current).check(&changed, Some(2)).is_err());
    }

    #[test]
    fn posted_listing_tolerates_missing_filter_but_not_a_different_one() {
        let current = url("https://x.test/results.asp");
        let bare = url("https://x.test/results.asp?page=2");
        let other = url("https://x.test/results.asp?page=2&state=05");
        assert_eq!(guard(&current).check(&bare, Some(2)), Ok(2));
        assert!(guard(&current).check(&other, Some(2)).is_err());
    }

    #[test]
    fn missing_page_number_is_a_trip() {
        let current = url("https://x.test/results.asp?state=01&page=1");
        let next = url("https://x.test/results.asp?state=01");
        assert_eq!(
            guard(&current).check(&next, None),
            Err(GuardTrip::NoPageNumber)
        );
    }

    #[test]
    fn set_query_param_replaces_in_place() {
        let current = url("https://x.test/results.asp?state=01&page=1&sort=name");
        let next = set_query_param(&current, "page", "2");
        assert_eq!(
            next.as_str(),
            "https://x.test/results.asp?state=01&page=2&sort=name"
        );

        let bare = url("https://x.test/results.asp?state=01");
        assert_eq!(
            set_query_param(&bare, "page", "2").as_str(),
            "https://x.test/results.asp?state=01&page=2"
        );
    }
}
