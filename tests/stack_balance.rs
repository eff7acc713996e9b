use proptest::prelude::*;

use pagesink::{same_target, ExecutionContext, StreamBuffer, TargetHandle};

fn accumulator() -> TargetHandle {
    StreamBuffer::accumulating(32).into_handle()
}

proptest! {
    // For all N: N pushes followed by N pops restore the facade's
    // delegate to what it was before the sequence began.
    #[test]
    fn pushes_then_pops_restore_delegate(n in 1_usize..24) {
        let mut ctx = ExecutionContext::new();
        let facade = ctx.create_stack(accumulator(), false).unwrap();
        let before = facade.borrow().delegate();

        for _ in 0..n {
            ctx.push(accumulator()).unwrap();
        }
        for _ in 0..n {
            ctx.pop().unwrap();
        }

        let after = facade.borrow().delegate();
        prop_assert!(same_target(&before, &after));
        prop_assert_eq!(ctx.stack_depth(), Some(1));
    }

    // Any balanced interleaving of pushes and pops restores the delegate,
    // not just strictly nested sequences of fresh writers.
    #[test]
    fn balanced_interleavings_restore_delegate(ops in prop::collection::vec(any::<bool>(), 0..64)) {
        let mut ctx = ExecutionContext::new();
        let facade = ctx.create_stack(accumulator(), false).unwrap();
        let before = facade.borrow().delegate();

        let mut depth = 0_usize;
        for push in ops {
            if push {
                ctx.push(accumulator()).unwrap();
                depth += 1;
            } else if depth > 0 {
                ctx.pop().unwrap();
                depth -= 1;
            }
        }
        for _ in 0..depth {
            ctx.pop().unwrap();
        }

        let after = facade.borrow().delegate();
        prop_assert!(same_target(&before, &after));
    }

    // Loop-guard pushes participate in balance like any other frame.
    #[test]
    fn facade_pushes_stay_balanced(n in 1_usize..16) {
        let mut ctx = ExecutionContext::new();
        let facade = ctx.create_stack(accumulator(), false).unwrap();
        let before = facade.borrow().delegate();

        for _ in 0..n {
            let facade_target: TargetHandle = ctx.current_facade().unwrap();
            ctx.push(facade_target).unwrap();
        }
        for _ in 0..n {
            ctx.pop().unwrap();
        }

        let after = facade.borrow().delegate();
        prop_assert!(same_target(&before, &after));
        prop_assert_eq!(ctx.stack_depth(), Some(1));
    }
}
