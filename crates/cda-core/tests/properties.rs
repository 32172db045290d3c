// crates/cda-core/tests/properties.rs
use cda_core::{CreatorId, Currency, Order, OrderBook, Pairing, Side};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn arb_order() -> impl Strategy<Value = Order> {
    (0u32..4, any::<bool>(), 1u64..1_000, 9_900i64..10_100, 0u8..2).prop_map(
        |(creator, is_offer, quantity, ticks, currency)| {
            Order::new(
                CreatorId(creator),
                Side::from_is_offer(is_offer),
                quantity,
                // EURUSD around 1.0000 with four decimals
                Decimal::new(ticks, 4),
                Currency::try_from(currency).unwrap(),
            )
        },
    )
}

fn arb_pairing() -> impl Strategy<Value = Pairing> {
    prop_oneof![Just(Pairing::Tail), Just(Pairing::Head)]
}

fn side_total(orders: &[Order], side: Side) -> u64 {
    orders.iter().filter(|o| o.side == side).map(|o| o.quantity).sum()
}

fn book_with(pairing: Pairing, orders: &[Order]) -> OrderBook {
    let mut book = OrderBook::with_pairing(pairing);
    for order in orders {
        book.add_order(order.clone()).unwrap();
    }
    book
}

proptest! {
    #[test]
    fn prop_quantity_is_accounted_for(
        orders in prop::collection::vec(arb_order(), 0..60),
        pairing in arb_pairing(),
    ) {
        let mut book = book_with(pairing, &orders);
        let report = book.match_orders();
        let snap = book.snapshot();

        let consumed = report.matched_quantity + report.discarded_quantity;
        prop_assert_eq!(side_total(&orders, Side::Bid), snap.bid_quantity + consumed);
        prop_assert_eq!(side_total(&orders, Side::Offer), snap.offer_quantity + consumed);

        let recorded: u64 = book.matches().iter().map(|m| m.quantity()).sum();
        prop_assert_eq!(recorded, report.matched_quantity);
        prop_assert!(recorded <= consumed);
    }

    #[test]
    fn prop_book_invariants_hold_after_matching(
        orders in prop::collection::vec(arb_order(), 0..60),
        pairing in arb_pairing(),
    ) {
        let mut book = book_with(pairing, &orders);
        book.match_orders();

        prop_assert!(book.bids().iter().all(|o| o.side == Side::Bid && o.quantity > 0));
        prop_assert!(book.offers().iter().all(|o| o.side == Side::Offer && o.quantity > 0));

        // Either a side is exhausted or the heads no longer cross.
        if let (Some(bid), Some(offer)) = (book.best_bid(), book.best_offer()) {
            prop_assert!(bid < offer);
        }

        for m in book.matches() {
            prop_assert_eq!(m.bid.quantity, m.offer.quantity);
            prop_assert_eq!(m.bid.currency, m.offer.currency);
            prop_assert_ne!(m.bid.creator_id, m.offer.creator_id);
            prop_assert!(m.quantity() > 0);
        }
    }

    #[test]
    fn prop_clearing_price_lies_within_mid_prices(
        orders in prop::collection::vec(arb_order(), 0..60),
        pairing in arb_pairing(),
    ) {
        let mut book = book_with(pairing, &orders);
        book.match_orders();
        let price = book.clearing_price().unwrap();

        if book.matches().is_empty() {
            prop_assert_eq!(price, Decimal::ZERO);
        } else {
            let mids: Vec<Decimal> = book.matches().iter().map(|m| m.mid_price().unwrap()).collect();
            let lo = mids.iter().copied().min().unwrap();
            let hi = mids.iter().copied().max().unwrap();
            prop_assert!(price >= lo && price <= hi, "{} not in [{}, {}]", price, lo, hi);
        }
    }

    #[test]
    fn prop_rematching_converges_to_a_fixed_point(
        orders in prop::collection::vec(arb_order(), 0..60),
        pairing in arb_pairing(),
    ) {
        let mut book = book_with(pairing, &orders);

        // Every productive pass removes at least one order.
        let mut passes = 0;
        while !book.match_orders().is_empty() {
            passes += 1;
            prop_assert!(passes <= orders.len());
        }

        let bids = book.bids().clone();
        let offers = book.offers().clone();
        let matches = book.matches().len();

        prop_assert!(book.match_orders().is_empty());
        prop_assert_eq!(book.bids(), &bids);
        prop_assert_eq!(book.offers(), &offers);
        prop_assert_eq!(book.matches().len(), matches);
    }

    #[test]
    fn prop_head_pairing_is_idempotent_after_one_pass(
        orders in prop::collection::vec(arb_order(), 0..60),
    ) {
        let mut book = book_with(Pairing::Head, &orders);
        book.match_orders();
        let bids = book.bids().clone();
        let offers = book.offers().clone();

        prop_assert!(book.match_orders().is_empty());
        prop_assert_eq!(book.bids(), &bids);
        prop_assert_eq!(book.offers(), &offers);
    }
}
