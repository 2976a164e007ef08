use proptest::prelude::*;

use super::*;

#[test]
fn eight_cuts_match_reference_order() {
    assert_eq!(zigzag(8), vec![0, 2, 1, 3, 5, 4, 7, 6]);
}

#[test]
fn four_cuts_match_reference_order() {
    assert_eq!(zigzag(4), vec![0, 2, 1, 3]);
}

#[test]
fn small_counts() {
    assert_eq!(zigzag(0), Vec::<usize>::new());
    assert_eq!(zigzag(1), vec![0]);
    assert_eq!(zigzag(2), vec![0, 1]);
    assert_eq!(zigzag(3), vec![0, 2, 1]);
}

#[test]
fn truncated_tail_keeps_block_pattern() {
    assert_eq!(zigzag(7), vec![0, 2, 1, 3, 5, 4, 6]);
    assert_eq!(zigzag(10), vec![0, 2, 1, 3, 5, 4, 7, 6, 8, 9]);
    assert_eq!(zigzag(11), vec![0, 2, 1, 3, 5, 4, 7, 6, 8, 10, 9]);
}

#[test]
fn identity_tail_keeps_source_order() {
    assert_eq!(
        zigzag_with(7, ZigzagTail::Identity),
        vec![0, 2, 1, 3, 4, 5, 6]
    );
    assert_eq!(zigzag_with(8, ZigzagTail::Identity), zigzag(8));
}

#[test]
fn tail_policy_parses_from_snake_case() {
    let t: ZigzagTail = serde_json::from_str("\"identity\"").unwrap();
    assert_eq!(t, ZigzagTail::Identity);
}

proptest! {
    #[test]
    fn zigzag_is_a_bijection(n in 0usize..500, identity in any::<bool>()) {
        let tail = if identity { ZigzagTail::Identity } else { ZigzagTail::Truncate };
        let order = zigzag_with(n, tail);
        prop_assert_eq!(order.len(), n);
        let mut sorted = order.clone();
        sorted.sort_unstable();
        prop_assert_eq!(sorted, (0..n).collect::<Vec<_>>());
        prop_assert_eq!(order, zigzag_with(n, tail));
    }
}
