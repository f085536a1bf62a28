//! Property tests for live-cell selection over a paged chain.

use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

use shannon_core::constants::{default_lock, MIN_CELL_CAPACITY, SHANNONS_PER_CKB};
use shannon_tests::helpers::{EndlessChain, MockChain};
use shannon_wallet::{CoinSelector, RetryPolicy};

const CKB: u64 = SHANNONS_PER_CKB;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// A selection always funds the target with zero or spendable change,
    /// and is only refused when no prefix of the cells could do so.
    #[test]
    fn selection_respects_change_rule(
        capacities in prop::collection::vec(61u64..500, 0..12),
        amount in 61u64..800,
        fee in 0u64..5_000,
        page_limit in 1u32..5,
    ) {
        let lock = default_lock([0x42; 20]);
        let capacities: Vec<u64> = capacities.into_iter().map(|c| c * CKB).collect();
        let amount = amount * CKB;
        let chain = MockChain::new();
        chain.fund(&lock, &capacities);

        let selector = CoinSelector::new(page_limit, RetryPolicy::none());
        let selection = runtime()
            .block_on(selector.select(&chain, &lock, amount, fee, &CancellationToken::new()))
            .unwrap();

        let target = amount + fee;
        match selection {
            Some(selection) => {
                prop_assert_eq!(selection.total_capacity, target + selection.change);
                prop_assert!(selection.change == 0 || selection.change >= MIN_CELL_CAPACITY);
                let sum: u64 = selection.cells.iter().map(|c| c.output.capacity).sum();
                prop_assert_eq!(sum, selection.total_capacity);
            }
            None => {
                // Newest-first prefixes never hit an acceptable stopping point.
                let mut collected = 0u64;
                for capacity in capacities.iter().rev() {
                    collected += capacity;
                    let stop = collected >= target
                        && (collected == target || collected - target >= MIN_CELL_CAPACITY);
                    prop_assert!(!stop);
                }
            }
        }
    }

    /// An inexhaustible page source still ends once the target is funded.
    #[test]
    fn endless_pages_terminate(
        capacities in prop::collection::vec(61u64..500, 1..6),
        amount in 61u64..2_000,
        fee in 0u64..5_000,
        page_limit in 1u32..5,
    ) {
        let lock = default_lock([0x57; 20]);
        let capacities: Vec<u64> = capacities.into_iter().map(|c| c * CKB).collect();
        let amount = amount * CKB;
        let chain = EndlessChain::new(lock.clone(), capacities);

        let selection = runtime()
            .block_on(CoinSelector::new(page_limit, RetryPolicy::none())
                .select(&chain, &lock, amount, fee, &CancellationToken::new()))
            .unwrap();
        let selection = selection.expect("endless supply always funds the target");

        // Every cell is at least the minimum, so one cell past the target suffices.
        let target = amount + fee;
        let max_cells = (target / (61 * CKB) + 2) as usize;
        prop_assert!(selection.cells.len() <= max_cells);
        let max_calls = selection.cells.len().div_ceil(page_limit as usize);
        prop_assert_eq!(chain.get_cells_calls(), max_calls);

        let totals = chain.page_totals();
        prop_assert!(totals.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(selection.total_capacity <= *totals.last().unwrap());
        prop_assert!(selection.change == 0 || selection.change >= MIN_CELL_CAPACITY);
    }

    #[test]
    fn balance_is_independent_of_page_size(
        capacities in prop::collection::vec(61u64..10_000, 0..20),
        page_limit in 1u32..7,
    ) {
        let lock = default_lock([0x24; 20]);
        let chain = MockChain::new();
        chain.fund(&lock, &capacities);

        let balance = runtime()
            .block_on(CoinSelector::new(page_limit, RetryPolicy::none())
                .balance(&chain, &lock, &CancellationToken::new()))
            .unwrap();
        prop_assert_eq!(balance.capacity, capacities.iter().sum::<u64>());
        prop_assert_eq!(balance.cells, capacities.len());
    }
}
