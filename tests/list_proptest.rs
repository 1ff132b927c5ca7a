use listguard::{ListError, RemovalBound, SharedList};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone)]
enum Operation {
    Append,
    RemoveFixed(usize),
    RemoveLive,
    Peek,
}

fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        3 => Just(Operation::Append),
        1 => (1usize..20).prop_map(Operation::RemoveFixed),
        1 => Just(Operation::RemoveLive),
        1 => Just(Operation::Peek),
    ]
}

proptest! {
    #[test]
    fn test_shared_list_matches_vec(ops in proptest::collection::vec(operation(), 1..200), seed in any::<u64>()) {
        let mut list = SharedList::new();
        let mut model: Vec<i32> = Vec::new();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        // Distinct values, so a removed value pins down its position.
        let mut next = 0i32;

        for op in ops {
            match op {
                Operation::Append => {
                    list.append(next).unwrap();
                    model.push(next);
                    next += 1;
                }
                Operation::RemoveFixed(n) => {
                    let bound = RemovalBound::fixed(n).unwrap();
                    match list.remove_random(bound, &mut rng) {
                        Some(v) => {
                            // Fixed bounds never reach past position n - 1.
                            let window = n.min(model.len());
                            let at = model[..window].iter().position(|&m| m == v);
                            prop_assert!(at.is_some(), "removed {} outside the first {} elements", v, window);
                            model.remove(at.unwrap());
                        }
                        None => prop_assert!(model.is_empty()),
                    }
                }
                Operation::RemoveLive => match list.remove_random(RemovalBound::LiveLength, &mut rng) {
                    Some(v) => {
                        let at = model.iter().position(|&m| m == v);
                        prop_assert!(at.is_some());
                        model.remove(at.unwrap());
                    }
                    None => prop_assert!(model.is_empty()),
                },
                Operation::Peek => match list.peek_random(&mut rng) {
                    Some(v) => prop_assert!(model.contains(&v)),
                    None => prop_assert!(model.is_empty()),
                },
            }
            prop_assert_eq!(list.len(), model.len());
        }

        prop_assert_eq!(list.to_vec(), model);
    }

    #[test]
    fn test_appends_keep_order(values in proptest::collection::vec(any::<i32>(), 0..100)) {
        let list: SharedList = values.iter().copied().collect();
        prop_assert_eq!(list.to_vec(), values.clone());
        prop_assert_eq!(list.iter().count(), values.len());
    }

    #[test]
    fn test_n_appends_then_n_removals_empty_the_list(
        values in proptest::collection::vec(any::<i32>(), 0..60),
        bound in 1usize..30,
        seed in any::<u64>(),
    ) {
        let mut list: SharedList = values.iter().copied().collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let bound = RemovalBound::fixed(bound).unwrap();

        let mut removed = Vec::with_capacity(values.len());
        for _ in 0..values.len() {
            let v = list.remove_random(bound, &mut rng);
            prop_assert!(v.is_some());
            removed.extend(v);
        }
        prop_assert!(list.is_empty());
        prop_assert_eq!(list.remove_random(bound, &mut rng), None);
        prop_assert_eq!(list.snapshot_string(), "[]");

        let mut expected = values;
        expected.sort_unstable();
        removed.sort_unstable();
        prop_assert_eq!(removed, expected);
    }

    #[test]
    fn test_capacity_limit_is_exact(limit in 0usize..20, extra in 1usize..10) {
        let mut list = SharedList::with_capacity_limit(limit);
        for i in 0..limit {
            prop_assert!(list.append(i as i32).is_ok());
        }
        for _ in 0..extra {
            prop_assert_eq!(list.append(-1), Err(ListError::AllocationFailure { len: limit }));
        }
        prop_assert_eq!(list.len(), limit);
    }
}
