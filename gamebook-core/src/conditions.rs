//! Visibility condition evaluation.
//!
//! Stitches and options are gated by two flag lists: `ifConditions`, which
//! must all be set, and `notIfConditions`, which only fail once every one of
//! them is set. The check is pure set membership over the session's flags.

use std::collections::BTreeSet;

/// Whether the given flags satisfy a stitch's or option's visibility gate.
///
/// - A non-empty `if_conditions` requires every element to be in `flags`.
/// - A non-empty `not_if_conditions` passes while at least one element is
///   absent from `flags`. This is "any missing passes", not a negation of
///   the if-case: it fails only when all of them are present.
/// - Empty condition sets always pass.
pub fn passes(
    flags: &BTreeSet<String>,
    if_conditions: &BTreeSet<String>,
    not_if_conditions: &BTreeSet<String>,
) -> bool {
    let if_result =
        if_conditions.is_empty() || if_conditions.iter().all(|flag| flags.contains(flag));
    let not_if_result =
        not_if_conditions.is_empty() || not_if_conditions.iter().any(|flag| !flags.contains(flag));
    if_result && not_if_result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_conditions_always_pass() {
        assert!(passes(&set(&[]), &set(&[]), &set(&[])));
        assert!(passes(&set(&["a", "b"]), &set(&[]), &set(&[])));
    }

    #[test]
    fn test_if_conditions_require_all() {
        let flags = set(&["a", "b"]);
        assert!(passes(&flags, &set(&["a"]), &set(&[])));
        assert!(passes(&flags, &set(&["a", "b"]), &set(&[])));
        assert!(!passes(&flags, &set(&["a", "c"]), &set(&[])));
        assert!(!passes(&set(&[]), &set(&["a"]), &set(&[])));
    }

    #[test]
    fn test_not_if_conditions_fail_only_when_all_present() {
        let flags = set(&["a", "b"]);
        // One of the two is missing, so the gate passes.
        assert!(passes(&flags, &set(&[]), &set(&["a", "c"])));
        // Every listed flag is present, so the gate fails.
        assert!(!passes(&flags, &set(&[]), &set(&["a", "b"])));
        assert!(!passes(&flags, &set(&[]), &set(&["a"])));
    }

    #[test]
    fn test_combined_gates() {
        let flags = set(&["torch", "rope"]);
        assert!(passes(&flags, &set(&["torch"]), &set(&["fell"])));
        assert!(!passes(&flags, &set(&["torch"]), &set(&["rope"])));
        assert!(!passes(&flags, &set(&["map"]), &set(&["fell"])));
    }

    #[test]
    fn test_truth_table_against_oracle() {
        // Every subset of a three-flag universe, against a direct statement
        // of the contract.
        let universe = ["a", "b", "c"];
        let subsets: Vec<BTreeSet<String>> = (0u32..8)
            .map(|bits| {
                universe
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| bits & (1 << i) != 0)
                    .map(|(_, s)| s.to_string())
                    .collect()
            })
            .collect();

        for flags in &subsets {
            for ifs in &subsets {
                for not_ifs in &subsets {
                    let expected = !((!ifs.is_empty() && ifs.iter().any(|f| !flags.contains(f)))
                        || (!not_ifs.is_empty() && not_ifs.iter().all(|f| flags.contains(f))));
                    assert_eq!(
                        passes(flags, ifs, not_ifs),
                        expected,
                        "flags={flags:?} ifs={ifs:?} not_ifs={not_ifs:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_referential_transparency() {
        let flags = set(&["a"]);
        let ifs = set(&["a"]);
        let not_ifs = set(&["b"]);
        let first = passes(&flags, &ifs, &not_ifs);
        for _ in 0..10 {
            assert_eq!(passes(&flags, &ifs, &not_ifs), first);
        }
    }
}
