//! Canonical form of a cause, and the hash derived from it.
//!
//! A cause is flattened into an ordered sequence of *batches*. Each batch is
//! the set of leaves that occurred in parallel at one position; consecutive
//! batches occurred one after another. Concretely, if every linear path
//! through the cause is written as a list of leaves, batch `k` holds the
//! `k`-th leaf of every path.
//!
//! Empty subtrees are pruned before flattening, as they are before an
//! equivalence check. On `Empty`-free trees every law the equivalence engine
//! applies preserves the set of paths, so equivalent causes flatten to the
//! same batches and hash identically.
//!
//! # Normalization
//!
//! `step` peels one position off a cause. It keeps an explicit stack for
//! `Both` branches and rewrites the left operand of a `Then` until it is a
//! leaf:
//!
//! - `Then(Empty, c)` becomes `c`
//! - `Then(Marked(a), c)` becomes `Then(a, c)`
//! - `Then(Then(a, b), c)` becomes `Then(a, Then(b, c))`
//! - `Then(Both(a, b), c)` becomes `Both(Then(a, c), Then(b, c))`
//! - `Then(leaf, c)` puts the leaf in the current batch and defers `c`
//!
//! # Complexity
//!
//! - Time: O(n log n) for trees without `Then`-over-`Both` nesting, where n
//!   is the number of nodes; otherwise proportional to the total batch size,
//!   which is at most quadratic in n
//! - Space: O(n) plus the batches

use super::{Cause, CauseView};
use crate::error::bug;
use crate::tracing_compat::trace;
use crate::util::det_hash::{hash_one, DetHasher};
use smallvec::SmallVec;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

// Fixed for hash stability across versions.
const FAIL_DOMAIN: u8 = 0x01;
const DIE_DOMAIN: u8 = 0x02;
const INTERRUPT_DOMAIN: u8 = 0x03;
const FINGERPRINT_DOMAIN: u8 = 0x10;

/// Leaves that occurred in parallel at one position of a flattened cause.
///
/// Leaves are deduplicated and kept in a deterministic order.
#[derive(Debug)]
pub struct Batch<E> {
    leaves: Vec<(u64, Cause<E>)>,
}

impl<E> Batch<E> {
    /// Returns the number of distinct leaves.
    #[must_use]
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Returns `true` if the batch holds no leaves.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Iterates over the leaves in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &Cause<E>> + '_ {
        self.leaves.iter().map(|(_, leaf)| leaf)
    }

    fn hashes(&self) -> impl Iterator<Item = u64> + '_ {
        self.leaves.iter().map(|(hash, _)| *hash)
    }
}

impl<E: Hash + PartialEq> Batch<E> {
    fn from_leaves(leaves: Vec<Cause<E>>) -> Self {
        let mut keyed: Vec<(u64, Cause<E>)> = leaves
            .into_iter()
            .map(|leaf| (leaf_hash(&leaf), leaf))
            .collect();
        keyed.sort_by_key(|(hash, _)| *hash);

        let mut unique: Vec<(u64, Cause<E>)> = Vec::with_capacity(keyed.len());
        let mut run_start = 0;
        for (hash, leaf) in keyed {
            if unique.last().map(|(last, _)| *last) != Some(hash) {
                run_start = unique.len();
            }
            let duplicate = unique[run_start..]
                .iter()
                .any(|(_, seen)| leaf_eq(seen, &leaf));
            if !duplicate {
                unique.push((hash, leaf));
            }
        }
        Self { leaves: unique }
    }

    /// Returns `true` if an equal leaf is in the batch.
    #[must_use]
    pub fn contains(&self, leaf: &Cause<E>) -> bool {
        let leaf = leaf.unmarked();
        if !leaf.tag().is_leaf() {
            return false;
        }
        let hash = leaf_hash(leaf);
        self.leaves
            .iter()
            .any(|(h, seen)| *h == hash && leaf_eq(seen, leaf))
    }
}

/// A cause in canonical form: a sequence of parallel batches.
#[derive(Debug)]
pub struct FlattenedCause<E> {
    batches: Vec<Batch<E>>,
}

impl<E> FlattenedCause<E> {
    /// Returns the number of batches (the longest sequential chain).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.batches.len()
    }

    /// Returns the total number of leaves across all batches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batches.iter().map(Batch::len).sum()
    }

    /// Returns `true` if the cause held no leaves.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Returns the batches in sequential order.
    #[must_use]
    pub fn batches(&self) -> &[Batch<E>] {
        &self.batches
    }

    /// Computes a 64-bit fingerprint of the whole batch structure.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DetHasher::with_domain(FINGERPRINT_DOMAIN);
        hasher.write_usize(self.batches.len());
        for (index, batch) in self.batches.iter().enumerate() {
            hasher.write_usize(index);
            hasher.write_usize(batch.len());
            for hash in batch.hashes() {
                hasher.write_u64(hash);
            }
        }
        hasher.finish()
    }

    /// Returns the canonical hash.
    ///
    /// A single batch holding a single leaf hashes as that leaf, so wrappers
    /// such as `Marked(x)` or `Then(Empty, x)` never change the hash of `x`.
    #[must_use]
    pub fn canonical_hash(&self) -> u64 {
        if let [only] = self.batches.as_slice() {
            if let [(hash, _)] = only.leaves.as_slice() {
                return *hash;
            }
        }
        self.fingerprint()
    }
}

impl<E: Hash + PartialEq> Cause<E> {
    /// Flattens the cause into its canonical sequence of parallel batches.
    ///
    /// Empty subtrees are pruned first, so `Empty` never contributes a path.
    /// Each round costs the number of distinct tails it defers, which is
    /// linear in the tree for sequences and fan-outs. Sequences of fan-outs
    /// whose branches have tails of different lengths produce batches that
    /// together hold up to quadratically many leaves, and the cost follows
    /// the output.
    #[must_use]
    pub fn flatten(&self) -> FlattenedCause<E> {
        let mut batches = Vec::new();
        let mut worklist = vec![self.prune_empty()];
        let mut rounds = 0_usize;

        while !worklist.is_empty() {
            rounds += 1;
            let mut parallel = Vec::new();
            let mut sequential = Vec::new();
            // Distribution clones the same suffix into several branches.
            let mut seen: HashSet<*const ()> = HashSet::new();
            for cause in &worklist {
                let (leaves, deferred) = step(cause);
                parallel.extend(leaves);
                for next in deferred {
                    if !next.is_empty_type() && seen.insert(next.node_ptr()) {
                        sequential.push(next);
                    }
                }
            }
            if !parallel.is_empty() {
                batches.push(Batch::from_leaves(parallel));
            }
            worklist = sequential;
        }

        let flattened = FlattenedCause { batches };
        trace!(
            rounds,
            depth = flattened.depth(),
            leaves = flattened.len(),
            "cause flattened"
        );
        flattened
    }

    /// Returns the hash of the canonical form.
    ///
    /// Equivalent causes always produce the same value.
    #[must_use]
    pub fn canonical_hash(&self) -> u64 {
        self.flatten().canonical_hash()
    }
}

/// Hashes the canonical form, consistent with law-based `==`.
impl<E: Hash + PartialEq> Hash for Cause<E> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.canonical_hash());
    }
}

/// Splits off the leaves at the current position and the causes that follow
/// them.
fn step<E>(cause: &Cause<E>) -> (SmallVec<[Cause<E>; 4]>, Vec<Cause<E>>) {
    let mut parallel = SmallVec::new();
    let mut sequential = Vec::new();
    let mut stack: Vec<Cause<E>> = Vec::new();
    let mut current = cause.clone();

    loop {
        let next = match current.view() {
            CauseView::Empty => None,
            CauseView::Marked(inner, _) => Some(inner.clone()),
            CauseView::Both(left, right) => {
                stack.push(right.clone());
                Some(left.clone())
            }
            CauseView::Then(left, right) => Some(match left.view() {
                CauseView::Empty => right.clone(),
                CauseView::Marked(inner, _) => Cause::sequential(inner.clone(), right.clone()),
                CauseView::Then(l, r) => {
                    Cause::sequential(l.clone(), Cause::sequential(r.clone(), right.clone()))
                }
                CauseView::Both(l, r) => Cause::parallel(
                    Cause::sequential(l.clone(), right.clone()),
                    Cause::sequential(r.clone(), right.clone()),
                ),
                CauseView::Fail(..) | CauseView::Die(..) | CauseView::Interrupt(..) => {
                    sequential.push(right.clone());
                    left.clone()
                }
            }),
            CauseView::Fail(..) | CauseView::Die(..) | CauseView::Interrupt(..) => {
                parallel.push(current.clone());
                None
            }
        };
        match next.or_else(|| stack.pop()) {
            Some(cause) => current = cause,
            None => break,
        }
    }

    (parallel, sequential)
}

fn leaf_hash<E: Hash>(leaf: &Cause<E>) -> u64 {
    match leaf.view() {
        CauseView::Fail(error, _) => hash_one(FAIL_DOMAIN, error),
        CauseView::Die(defect, _) => hash_one(DIE_DOMAIN, defect),
        CauseView::Interrupt(fiber_id, _) => hash_one(INTERRUPT_DOMAIN, fiber_id),
        _ => bug("non-leaf cause in a canonical batch"),
    }
}

fn leaf_eq<E: PartialEq>(a: &Cause<E>, b: &Cause<E>) -> bool {
    match (a.view(), b.view()) {
        (CauseView::Fail(x, _), CauseView::Fail(y, _)) => x == y,
        (CauseView::Die(x, _), CauseView::Die(y, _)) => x == y,
        (CauseView::Interrupt(x, _), CauseView::Interrupt(y, _)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;
    use crate::types::FiberId;

    fn init_test(test_name: &str) {
        init_test_logging();
        crate::test_phase!(test_name);
    }

    fn fail(s: &'static str) -> Cause<&'static str> {
        Cause::fail(s)
    }

    fn batch_sizes<E>(flat: &FlattenedCause<E>) -> Vec<usize> {
        flat.batches().iter().map(Batch::len).collect()
    }

    // =========================================================================
    // Flatten Tests
    // =========================================================================

    #[test]
    fn empty_flattens_to_nothing() {
        init_test("empty_flattens_to_nothing");
        let flat = Cause::<&str>::empty().flatten();
        assert!(flat.is_empty());
        assert_eq!(flat.len(), 0);
        let raw: Cause<&str> = Cause::parallel(
            Cause::empty(),
            Cause::sequential(Cause::empty(), Cause::empty()),
        );
        assert!(raw.flatten().is_empty());
        crate::test_complete!("empty_flattens_to_nothing");
    }

    #[test]
    fn sequence_becomes_one_batch_per_leaf() {
        init_test("sequence_becomes_one_batch_per_leaf");
        let cause = (fail("a") + fail("b")) + fail("c");
        let flat = cause.flatten();
        crate::assert_with_log!(flat.depth() == 3, "depth", 3, flat.depth());
        assert_eq!(batch_sizes(&flat), vec![1, 1, 1]);
        assert!(flat.batches()[0].contains(&fail("a")));
        assert!(flat.batches()[2].contains(&fail("c")));
        crate::test_complete!("sequence_becomes_one_batch_per_leaf");
    }

    #[test]
    fn parallel_leaves_share_a_batch() {
        init_test("parallel_leaves_share_a_batch");
        let cause = fail("a") + (fail("b") & Cause::die("d"));
        let flat = cause.flatten();
        assert_eq!(batch_sizes(&flat), vec![1, 2]);
        assert!(flat.batches()[1].contains(&Cause::die("d")));
        assert!(flat.batches()[1].contains(&Cause::mark(fail("b"))));
        assert!(!flat.batches()[1].contains(&fail("a")));
        crate::test_complete!("parallel_leaves_share_a_batch");
    }

    #[test]
    fn then_over_both_distributes() {
        init_test("then_over_both_distributes");
        // Paths: [a, c] and [b, x, c].
        let cause = (fail("a") & (fail("b") + fail("x"))) + fail("c");
        let flat = cause.flatten();
        assert_eq!(batch_sizes(&flat), vec![2, 2, 1]);
        assert!(flat.batches()[1].contains(&fail("c")));
        assert!(flat.batches()[1].contains(&fail("x")));
        crate::test_complete!("then_over_both_distributes");
    }

    #[test]
    fn duplicate_leaves_collapse() {
        init_test("duplicate_leaves_collapse");
        let cause = fail("a") & fail("a") & Cause::mark(fail("a"));
        let flat = cause.flatten();
        assert_eq!(batch_sizes(&flat), vec![1]);
        crate::test_complete!("duplicate_leaves_collapse");
    }

    #[test]
    fn marked_left_operand_keeps_its_order() {
        init_test("marked_left_operand_keeps_its_order");
        let cause = Cause::mark(fail("a") + fail("b")) + fail("c");
        assert_eq!(batch_sizes(&cause.flatten()), vec![1, 1, 1]);
        crate::test_complete!("marked_left_operand_keeps_its_order");
    }

    #[test]
    fn shared_suffixes_are_flattened_once() {
        init_test("shared_suffixes_are_flattened_once");
        // Each level doubles the number of branches reaching the suffix.
        let cause = (0..64_u32).rev().fold(Cause::<u32>::empty(), |acc, i| {
            Cause::then(Cause::fail(i * 2) & Cause::fail(i * 2 + 1), acc)
        });
        let flat = cause.flatten();
        assert_eq!(flat.depth(), 64);
        assert!(flat.batches().iter().all(|batch| batch.len() == 2));
        crate::test_complete!("shared_suffixes_are_flattened_once");
    }

    // =========================================================================
    // Hash Tests
    // =========================================================================

    #[test]
    fn single_leaf_hash_ignores_wrappers() {
        init_test("single_leaf_hash_ignores_wrappers");
        let x = fail("x");
        let expected = x.canonical_hash();
        assert_eq!(Cause::mark_stackless(x.clone()).canonical_hash(), expected);
        assert_eq!(Cause::sequential(Cause::empty(), x.clone()).canonical_hash(), expected);
        assert_eq!(Cause::parallel(x.clone(), Cause::empty()).canonical_hash(), expected);
        crate::test_complete!("single_leaf_hash_ignores_wrappers");
    }

    #[test]
    fn law_equivalent_causes_hash_equal() {
        init_test("law_equivalent_causes_hash_equal");
        let pairs = vec![
            ((fail("a") + fail("b")) + fail("c"), fail("a") + (fail("b") + fail("c"))),
            ((fail("a") & fail("b")) & fail("c"), fail("a") & (fail("b") & fail("c"))),
            (fail("a") & fail("b"), fail("b") & fail("a")),
            (
                fail("a") + (fail("b") & fail("c")),
                (fail("a") + fail("b")) & (fail("a") + fail("c")),
            ),
            (
                (fail("a") & fail("b")) + fail("c"),
                (fail("a") + fail("c")) & (fail("b") + fail("c")),
            ),
        ];
        for (left, right) in pairs {
            assert!(left.equivalent(&right));
            crate::assert_with_log!(
                left.canonical_hash() == right.canonical_hash(),
                "equivalent causes hash equal",
                left.canonical_hash(),
                right.canonical_hash()
            );
        }
        crate::test_complete!("law_equivalent_causes_hash_equal");
    }

    #[test]
    fn empty_parallel_operand_adds_no_path() {
        init_test("empty_parallel_operand_adds_no_path");
        let padded: Cause<u8> = Cause::sequential(
            Cause::parallel(Cause::fail(1), Cause::empty()),
            Cause::fail(2),
        );
        let plain: Cause<u8> = Cause::then(Cause::fail(1), Cause::fail(2));
        assert!(padded.equivalent(&plain));
        assert_eq!(batch_sizes(&padded.flatten()), vec![1, 1]);
        assert_eq!(padded.canonical_hash(), plain.canonical_hash());
        crate::test_complete!("empty_parallel_operand_adds_no_path");
    }

    #[test]
    fn nested_empty_operands_hash_like_their_pruned_form() {
        init_test("nested_empty_operands_hash_like_their_pruned_form");
        // Then(Both(0, Then(0, 0)), Then(2, 1)) against a distribution whose
        // tail carries a parallel Empty.
        let f = |e: u8| Cause::<u8>::fail(e);
        let tail = || Cause::sequential(f(2), f(1));
        let cause = Cause::sequential(
            Cause::parallel(f(0), Cause::sequential(f(0), f(0))),
            tail(),
        );
        let distributed = Cause::parallel(
            Cause::sequential(f(0), Cause::parallel(tail(), Cause::empty())),
            Cause::sequential(
                Cause::parallel(Cause::sequential(f(0), f(0)), Cause::empty()),
                Cause::mark(tail()),
            ),
        );
        assert!(cause.equivalent(&distributed));
        assert_eq!(cause.canonical_hash(), distributed.canonical_hash());
        crate::test_complete!("nested_empty_operands_hash_like_their_pruned_form");
    }

    #[test]
    fn sequence_order_changes_hash() {
        init_test("sequence_order_changes_hash");
        assert_ne!(
            (fail("a") + fail("b")).canonical_hash(),
            (fail("b") + fail("a")).canonical_hash()
        );
        crate::test_complete!("sequence_order_changes_hash");
    }

    #[test]
    fn leaf_kinds_hash_apart() {
        init_test("leaf_kinds_hash_apart");
        let f: Cause<String> = Cause::fail("x".to_string());
        let d: Cause<String> = Cause::die("x");
        assert_ne!(f.canonical_hash(), d.canonical_hash());
        let i1: Cause<String> = Cause::interrupt(FiberId::new_for_test(1));
        let i2: Cause<String> = Cause::interrupt(FiberId::new_for_test(2));
        assert_ne!(i1.canonical_hash(), i2.canonical_hash());
        crate::test_complete!("leaf_kinds_hash_apart");
    }

    #[test]
    fn causes_work_as_hash_set_keys() {
        init_test("causes_work_as_hash_set_keys");
        let mut set = HashSet::new();
        set.insert(fail("a") & fail("b"));
        set.insert(fail("b") & fail("a"));
        set.insert(Cause::mark(fail("b") & fail("a")));
        assert_eq!(set.len(), 1);
        set.insert(fail("a") + fail("b"));
        assert_eq!(set.len(), 2);
        crate::test_complete!("causes_work_as_hash_set_keys");
    }
}
