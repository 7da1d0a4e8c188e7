//! Property-based tests for canonical term sums.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use crate::expression::Expression;
    use crate::scalar::Scalar;
    use crate::symbol::Symbol;
    use crate::term::Term;

    const NAMES: [&str; 3] = ["x", "y", "z"];
    const POWERS: [f64; 10] = [-3.0, -2.0, -1.0, -0.5, 0.0, 0.25, 0.5, 1.0, 2.0, 3.0];

    // Strategy for single terms with small integer coefficients
    fn term() -> impl Strategy<Value = Term> {
        prop_oneof![
            (-20i32..20).prop_map(Term::constant),
            (-20i32..20, 0usize..NAMES.len(), prop::sample::select(POWERS.to_vec()))
                .prop_map(|(c, s, p)| Term::new(c, Symbol::new(NAMES[s]), p)),
        ]
    }

    // Strategy for expressions built by successive insertion
    fn expression() -> impl Strategy<Value = Expression> {
        proptest::collection::vec(term(), 0..12).prop_map(|terms| terms.into_iter().collect())
    }

    // Positive values keep fractional powers real
    fn binding() -> impl Strategy<Value = [f64; 3]> {
        [0.5f64..4.0, 0.5f64..4.0, 0.5f64..4.0]
    }

    fn bind(values: [f64; 3]) -> impl Fn(&Symbol) -> Scalar {
        move |symbol| {
            let index = NAMES
                .iter()
                .position(|n| Some(*n) == symbol.name())
                .unwrap_or(0);
            Scalar::new(values[index])
        }
    }

    // Order-independent view of the non-zero terms
    fn summary(e: &Expression) -> Vec<(u64, String, i64)> {
        let mut out: Vec<_> = e
            .iter()
            .filter(|t| t.coefficient() != 0.0)
            .map(|t| {
                let name = t.symbol().map(|s| s.to_string()).unwrap_or_default();
                (t.power().value().to_bits(), name, t.coefficient().value() as i64)
            })
            .collect();
        out.sort();
        out
    }

    fn is_canonical(e: &Expression) -> bool {
        let terms = e.terms();
        let sorted = terms
            .windows(2)
            .all(|w| w[0].cmp_power(&w[1]) != std::cmp::Ordering::Greater);
        let constants = terms.iter().filter(|t| t.is_constant()).count();
        let mut seen = HashSet::new();
        let unique = terms.iter().filter(|t| !t.is_constant()).all(|t| {
            let name = t.symbol().map(|s| s.to_string()).unwrap_or_default();
            seen.insert((name, t.power().value().to_bits()))
        });
        sorted && constants == 1 && unique
    }

    fn agrees(interpreted: f64, compiled: f64, scale: f64) -> bool {
        if interpreted.is_nan() || compiled.is_nan() {
            return interpreted.is_nan() && compiled.is_nan();
        }
        if interpreted.is_infinite() || compiled.is_infinite() {
            return interpreted == compiled;
        }
        (interpreted - compiled).abs() <= 1e-9 * (1.0 + scale)
    }

    proptest! {
        #[test]
        fn insertion_keeps_canonical_form(e in expression()) {
            prop_assert!(is_canonical(&e));
        }

        #[test]
        fn operators_keep_canonical_form(a in expression(), b in expression(), k in -5.0f64..5.0) {
            prop_assert!(is_canonical(&(&a + &b)));
            prop_assert!(is_canonical(&(&a - &b)));
            prop_assert!(is_canonical(&(&a * k)));
            prop_assert!(is_canonical(&(-&a)));
        }

        #[test]
        fn merge_matches_one_at_a_time(a in expression(), b in expression()) {
            let mut merged = a.clone();
            merged.merge(b.clone());

            let mut inserted = a;
            for term in b {
                inserted.insert(term);
            }
            prop_assert_eq!(merged, inserted);
        }

        #[test]
        fn addition_is_commutative(a in expression(), b in expression()) {
            prop_assert_eq!(summary(&(&a + &b)), summary(&(&b + &a)));
        }

        #[test]
        fn insertion_order_does_not_matter(terms in proptest::collection::vec(term(), 0..12)) {
            let forward: Expression = terms.iter().cloned().collect();
            let backward: Expression = terms.iter().rev().cloned().collect();
            prop_assert_eq!(summary(&forward), summary(&backward));
        }

        #[test]
        fn term_and_its_negation_cancel(e in expression(), t in term()) {
            let round_trip = (&e + t.clone()) - t;
            prop_assert_eq!(summary(&round_trip), summary(&e));
        }

        #[test]
        fn negation_law(e in expression(), values in binding()) {
            let binder = bind(values);
            let negated = e.negate().evaluate_with(&binder).value();
            prop_assert_eq!(negated, -e.evaluate_with(&binder).value());
        }

        #[test]
        fn subtraction_matches_evaluation(a in expression(), b in expression(), values in binding()) {
            let binder = bind(values);
            let diff = (&a - &b).evaluate_with(&binder).value();
            let expected = a.evaluate_with(&binder).value() - b.evaluate_with(&binder).value();
            let scale: f64 = a.iter().chain(b.iter()).map(|t| t.evaluate(&binder).value().abs()).sum();
            prop_assert!((diff - expected).abs() <= 1e-9 * (1.0 + scale));
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn compiled_agrees_with_interpreter(
            e in expression(),
            inputs in proptest::collection::vec(prop_oneof![Just(0.0), Just(1.0), -4.0f64..4.0], 1..8),
        ) {
            let compiled = e.compile().unwrap();
            for x in inputs {
                let interpreted = e.evaluate_at(x).value();
                let scale: f64 = e.iter().map(|t| t.evaluate(|_| Scalar::new(x)).value().abs()).sum();
                prop_assert!(
                    agrees(interpreted, compiled.call(x), scale),
                    "f({}) interpreted {} compiled {} for {}", x, interpreted, compiled.call(x), e
                );
            }
        }
    }
}
