//! Copy-discipline tests: settling moves values, propagation shares them,
//! and a failed transformation never constructs its output. The tracked
//! payload mirrors an instrumented value type whose constructions and
//! clones are counted per test slot.

#[cfg(test)]
mod tests {
    use promise_cell::{Promise, Rejection};
    use std::sync::atomic::{AtomicUsize, Ordering};

    static BUILDS: [AtomicUsize; 8] = [
        AtomicUsize::new(0),
        AtomicUsize::new(0),
        AtomicUsize::new(0),
        AtomicUsize::new(0),
        AtomicUsize::new(0),
        AtomicUsize::new(0),
        AtomicUsize::new(0),
        AtomicUsize::new(0),
    ];
    static CLONES: [AtomicUsize; 8] = [
        AtomicUsize::new(0),
        AtomicUsize::new(0),
        AtomicUsize::new(0),
        AtomicUsize::new(0),
        AtomicUsize::new(0),
        AtomicUsize::new(0),
        AtomicUsize::new(0),
        AtomicUsize::new(0),
    ];

    /// Payload counting constructions and clones in its test's own slot,
    /// so tests stay independent under the parallel test runner.
    #[derive(Debug)]
    struct Tracked<const SLOT: usize>(i32);

    impl<const SLOT: usize> Tracked<SLOT> {
        fn new(value: i32) -> Self {
            BUILDS[SLOT].fetch_add(1, Ordering::SeqCst);
            Tracked(value)
        }
    }

    impl<const SLOT: usize> Clone for Tracked<SLOT> {
        fn clone(&self) -> Self {
            CLONES[SLOT].fetch_add(1, Ordering::SeqCst);
            Tracked(self.0)
        }
    }

    fn builds<const SLOT: usize>() -> usize {
        BUILDS[SLOT].load(Ordering::SeqCst)
    }

    fn clones<const SLOT: usize>() -> usize {
        CLONES[SLOT].load(Ordering::SeqCst)
    }

    #[test]
    fn fulfilling_with_an_owned_value_moves_it() {
        let promise = Promise::resolve(Tracked::<0>::new(42));
        assert_eq!(promise.wait().value().map(|d| d.0), Some(42));
        assert_eq!(builds::<0>(), 1);
        assert_eq!(clones::<0>(), 0);
    }

    #[test]
    fn fulfilling_from_a_borrow_clones_exactly_once() {
        let original = Tracked::<1>::new(7);
        let (promise, resolver, _rejector) = Promise::pending();
        resolver.resolve(original.clone());
        drop(original);
        assert_eq!(promise.wait().value().map(|d| d.0), Some(7));
        assert_eq!(clones::<1>(), 1);
    }

    #[test]
    fn rejection_propagates_through_hops_without_copying() {
        let captured = Rejection::new(Tracked::<2>::new(9));
        let source: Promise<i32> = Promise::reject(captured.clone());
        let hopped = source.then(|v| Ok(v + 1)).then(|v| Ok(v + 1));

        let outcome = hopped.wait();
        let rejection = outcome.rejection().unwrap();
        assert!(rejection.same(&captured));
        assert_eq!(rejection.downcast_ref::<Tracked<2>>().map(|d| d.0), Some(9));
        assert_eq!(clones::<2>(), 0);
    }

    #[test]
    fn rethrowing_keeps_the_captured_payload() {
        let captured = Rejection::new(Tracked::<3>::new(1));
        let source: Promise<i32> = Promise::reject(captured.clone());
        let rethrown = source.fail(|rejection| Err(rejection.clone()));

        assert!(rethrown.wait().rejection().unwrap().same(&captured));
        assert_eq!(clones::<3>(), 0);
    }

    #[test]
    fn flattening_moves_the_inner_value_without_copying() {
        let chained = Promise::resolve(Tracked::<4>::new(42))
            .chain(|data| Promise::resolve(Tracked::<4>::new(data.0 + 2)));
        assert_eq!(chained.wait().value().map(|d| d.0), Some(44));
        assert_eq!(builds::<4>(), 2);
        assert_eq!(clones::<4>(), 0);
    }

    #[test]
    fn a_failing_handler_never_constructs_its_output() {
        let rejected = Promise::resolve(1)
            .then(|_| -> Result<Tracked<5>, Rejection> { Err(Rejection::new("boom")) });
        assert!(rejected.wait().is_rejected());
        assert_eq!(builds::<5>(), 0);
    }

    #[test]
    fn fulfillment_passes_through_fail_without_copying() {
        let source = Promise::resolve(Tracked::<6>::new(3));
        let recovered = source.fail(|_| Ok(Tracked::<6>::new(0)));
        assert_eq!(recovered.wait().value().map(|d| d.0), Some(3));
        assert_eq!(builds::<6>(), 1);
        assert_eq!(clones::<6>(), 0);
    }

    #[test]
    fn rejecting_never_touches_the_value_type() {
        let promise: Promise<Tracked<7>> = Promise::reject(Rejection::new("foo"));
        assert!(promise.wait().is_rejected());
        assert_eq!(builds::<7>(), 0);
        assert_eq!(clones::<7>(), 0);
    }
}
