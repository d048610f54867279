use std::collections::HashSet;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use url::Url;

use super::parser::ParsedManifest;

/// One media segment known from the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub name: String,
    /// Downloaded successfully at least once. Never reset.
    pub loaded: bool,
    /// A download is in flight.
    pub locked: bool,
}

impl Segment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            loaded: false,
            locked: false,
        }
    }

    /// Eligible for dispatch by the scheduler
    pub fn is_pending(&self) -> bool {
        !self.loaded && !self.locked
    }
}

/// Counts from one merge of a fresh manifest into the known segment list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub added: usize,
    pub removed: usize,
    pub total: usize,
}

/// Builds the segment list that follows `current` once `names` is the latest manifest.
///
/// Segments still listed keep their flags and relative order; names seen for
/// the first time are appended in manifest order; everything else is dropped,
/// whatever its state.
pub fn merge_segments(current: &[Segment], names: &[String]) -> (Vec<Segment>, MergeOutcome) {
    let listed: HashSet<&str> = names.iter().map(String::as_str).collect();

    let mut merged: Vec<Segment> = current
        .iter()
        .filter(|segment| listed.contains(segment.name.as_str()))
        .cloned()
        .collect();
    let kept = merged.len();

    let mut known: HashSet<&str> = current.iter().map(|s| s.name.as_str()).collect();
    for name in names {
        if known.insert(name.as_str()) {
            merged.push(Segment::new(name.as_str()));
        }
    }

    let outcome = MergeOutcome {
        added: merged.len() - kept,
        removed: current.len() - kept,
        total: merged.len(),
    };
    (merged, outcome)
}

#[derive(Debug)]
struct Inner {
    segments: Vec<Segment>,
    poll_interval: Duration,
}

/// The live segment window of one reader.
///
/// All reads and writes go through one mutex that is held only for the
/// duration of a single read-modify-write and never across an await.
#[derive(Debug)]
pub struct ManifestState {
    url: Url,
    inner: Mutex<Inner>,
}

impl ManifestState {
    pub fn new(url: Url, initial_poll_interval: Duration) -> Self {
        Self {
            url,
            inner: Mutex::new(Inner {
                segments: Vec::new(),
                poll_interval: initial_poll_interval,
            }),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn poll_interval(&self) -> Duration {
        self.inner.lock().poll_interval
    }

    /// Merges a freshly parsed manifest and installs the new poll interval.
    pub fn apply(&self, parsed: &ParsedManifest, poll_interval: Duration) -> MergeOutcome {
        let mut inner = self.inner.lock();
        let (merged, outcome) = merge_segments(&inner.segments, &parsed.segments);
        inner.segments = merged;
        inner.poll_interval = poll_interval;
        outcome
    }

    /// Locks up to `limit` pending segments and returns their names in list order.
    ///
    /// Scanning and locking happen under one lock acquisition, so a segment is
    /// returned by at most one caller until it is released.
    pub fn claim_pending(&self, limit: usize) -> Vec<String> {
        let mut inner = self.inner.lock();
        inner
            .segments
            .iter_mut()
            .filter(|segment| segment.is_pending())
            .take(limit)
            .map(|segment| {
                segment.locked = true;
                segment.name.clone()
            })
            .collect()
    }

    /// Marks a finished download. Returns `false` if the segment has left the window.
    pub fn mark_loaded(&self, name: &str) -> bool {
        self.update(name, |segment| {
            segment.loaded = true;
            segment.locked = false;
        })
    }

    /// Unlocks a failed download so the next scan retries it.
    /// Returns `false` if the segment has left the window.
    pub fn release(&self, name: &str) -> bool {
        self.update(name, |segment| segment.locked = false)
    }

    fn update(&self, name: &str, f: impl FnOnce(&mut Segment)) -> bool {
        let mut inner = self.inner.lock();
        match inner.segments.iter_mut().find(|s| s.name == name) {
            Some(segment) => {
                f(segment);
                true
            }
            None => false,
        }
    }

    /// Copy of the current segment list
    pub fn segments(&self) -> Vec<Segment> {
        self.inner.lock().segments.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn parsed(list: &[&str]) -> ParsedManifest {
        ParsedManifest {
            segments: names(list),
            last_duration: None,
        }
    }

    fn state() -> ManifestState {
        ManifestState::new(
            Url::parse("http://example.com/live/index.m3u8").unwrap(),
            Duration::from_secs(2),
        )
    }

    #[test]
    fn merge_replaces_window() {
        let state = state();
        state.apply(&parsed(&["s1", "s2"]), Duration::from_secs(1));
        assert_eq!(state.claim_pending(1), vec!["s1"]);
        assert_eq!(state.claim_pending(1), vec!["s2"]);
        assert!(state.mark_loaded("s2"));

        let outcome = state.apply(&parsed(&["s2", "s3"]), Duration::from_secs(1));
        assert_eq!(
            outcome,
            MergeOutcome {
                added: 1,
                removed: 1,
                total: 2
            }
        );
        assert_eq!(
            state.segments(),
            vec![
                Segment {
                    name: "s2".into(),
                    loaded: true,
                    locked: false
                },
                Segment::new("s3"),
            ]
        );
    }

    #[test]
    fn merge_drops_locked_segments() {
        let current = vec![
            Segment {
                name: "a".into(),
                loaded: false,
                locked: true,
            },
            Segment::new("b"),
            Segment::new("c"),
        ];
        // Adjacent removals must both go.
        let (merged, outcome) = merge_segments(&current, &names(&["c", "d"]));
        assert_eq!(merged, vec![Segment::new("c"), Segment::new("d")]);
        assert_eq!(outcome.removed, 2);
        assert_eq!(outcome.added, 1);
    }

    #[test]
    fn merge_with_empty_manifest_clears_list() {
        let state = state();
        state.apply(&parsed(&["a", "b"]), Duration::from_secs(1));
        let outcome = state.apply(&parsed(&[]), Duration::from_secs(1));
        assert_eq!(outcome.removed, 2);
        assert!(state.is_empty());
    }

    #[test]
    fn apply_sets_poll_interval() {
        let state = state();
        assert_eq!(state.poll_interval(), Duration::from_secs(2));
        state.apply(&parsed(&["a"]), Duration::from_millis(960));
        assert_eq!(state.poll_interval(), Duration::from_millis(960));
    }

    #[test]
    fn claim_skips_locked_and_loaded() {
        let state = state();
        state.apply(&parsed(&["a", "b", "c"]), Duration::from_secs(1));
        assert_eq!(state.claim_pending(1), vec!["a"]);
        assert!(state.mark_loaded("a"));
        assert_eq!(state.claim_pending(usize::MAX), vec!["b", "c"]);
        assert!(state.claim_pending(usize::MAX).is_empty());
    }

    #[test]
    fn release_makes_segment_claimable_again() {
        let state = state();
        state.apply(&parsed(&["a"]), Duration::from_secs(1));
        assert_eq!(state.claim_pending(usize::MAX), vec!["a"]);
        assert!(state.release("a"));
        assert_eq!(state.segments(), vec![Segment::new("a")]);
        assert_eq!(state.claim_pending(usize::MAX), vec!["a"]);
    }

    #[test]
    fn loaded_is_never_reset() {
        let state = state();
        state.apply(&parsed(&["a"]), Duration::from_secs(1));
        state.claim_pending(usize::MAX);
        state.mark_loaded("a");
        state.release("a");
        state.apply(&parsed(&["a"]), Duration::from_secs(1));
        assert!(state.segments()[0].loaded);
        assert!(state.claim_pending(usize::MAX).is_empty());
    }

    #[test]
    fn updates_for_removed_segment_are_noops() {
        let state = state();
        state.apply(&parsed(&["a"]), Duration::from_secs(1));
        state.claim_pending(usize::MAX);
        state.apply(&parsed(&["b"]), Duration::from_secs(1));

        assert!(!state.mark_loaded("a"));
        assert!(!state.release("a"));
        assert_eq!(state.segments(), vec![Segment::new("b")]);
    }

    #[test]
    fn concurrent_claims_never_overlap() {
        let state = Arc::new(state());
        let window: Vec<String> = (0..500).map(|i| format!("seg{i}.ts")).collect();
        state.apply(
            &ParsedManifest {
                segments: window,
                last_duration: None,
            },
            Duration::from_secs(1),
        );

        let claimed: Vec<Vec<String>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let state = Arc::clone(&state);
                    scope.spawn(move || {
                        let mut mine = Vec::new();
                        loop {
                            let batch = state.claim_pending(3);
                            if batch.is_empty() {
                                break;
                            }
                            mine.extend(batch);
                        }
                        mine
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let all: Vec<&String> = claimed.iter().flatten().collect();
        let unique: HashSet<&String> = all.iter().copied().collect();
        assert_eq!(all.len(), 500);
        assert_eq!(unique.len(), 500);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// After a merge the list holds exactly the listed names once each, and
        /// surviving segments keep their flags.
        #[test]
        fn prop_merge_matches_latest_manifest(
            old in prop::collection::vec((0u8..20, any::<bool>(), any::<bool>()), 0..20),
            new in prop::collection::vec(0u8..20, 0..20),
        ) {
            let mut seen = HashSet::new();
            let current: Vec<Segment> = old
                .into_iter()
                .filter(|(n, _, _)| seen.insert(*n))
                .map(|(n, loaded, locked)| Segment { name: format!("s{n}"), loaded, locked })
                .collect();
            let listed: Vec<String> = new.iter().map(|n| format!("s{n}")).collect();

            let (merged, outcome) = merge_segments(&current, &listed);

            let merged_names: HashSet<&str> = merged.iter().map(|s| s.name.as_str()).collect();
            let listed_names: HashSet<&str> = listed.iter().map(String::as_str).collect();
            prop_assert_eq!(merged.len(), merged_names.len());
            prop_assert_eq!(&merged_names, &listed_names);
            prop_assert_eq!(outcome.total, merged.len());

            for segment in &merged {
                match current.iter().find(|s| s.name == segment.name) {
                    Some(previous) => prop_assert_eq!(previous, segment),
                    None => prop_assert!(segment.is_pending()),
                }
            }
        }
    }
}
