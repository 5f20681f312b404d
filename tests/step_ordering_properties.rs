// Property-based checks for composite step keys
// Sub-stage keys must always sort between their parent and the next main step

use approval_flow::model::StepKey;
use proptest::prelude::*;

fn main_step() -> impl Strategy<Value = i64> {
    -10_000i64..10_000
}

fn ordinal() -> impl Strategy<Value = u32> {
    1u32..=500
}

proptest! {
    #[test]
    fn sub_stages_sort_between_parent_and_next_main(main in main_step(), sub in ordinal()) {
        let parent = StepKey::main(main);
        let child = StepKey::sub(main, sub);
        let next = StepKey::main(main + 1);

        prop_assert!(parent < child);
        prop_assert!(child < next);
        prop_assert_eq!(child.parent(), Some(main));
        prop_assert!(parent.parent().is_none());
    }

    #[test]
    fn siblings_sort_by_ordinal(main in main_step(), a in ordinal(), b in ordinal()) {
        let left = StepKey::sub(main, a);
        let right = StepKey::sub(main, b);
        prop_assert_eq!(left.cmp(&right), a.cmp(&b));
    }

    #[test]
    fn display_form_parses_back(main in main_step(), sub in 0u32..=500) {
        let key = StepKey { main, sub };
        let parsed: StepKey = key.to_string().parse().unwrap();
        prop_assert_eq!(parsed, key);
    }

    #[test]
    fn sorting_groups_every_branch_under_its_parent(
        mut keys in proptest::collection::vec((0i64..20, 0u32..5), 1..40)
    ) {
        keys.sort();
        keys.dedup();
        let mut steps: Vec<StepKey> = keys
            .iter()
            .map(|&(main, sub)| StepKey { main, sub })
            .collect();
        steps.reverse();
        steps.sort();

        for window in steps.windows(2) {
            let (earlier, later) = (window[0], window[1]);
            if later.is_sub() && later.main != earlier.main {
                // A sub-stage may only follow keys of a lower main step.
                prop_assert!(earlier.main < later.main);
            }
            prop_assert!(earlier < later);
        }
    }
}
