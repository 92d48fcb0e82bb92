use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;

use market::{
    DepthBand, DepthRatioAggregator, OrderBookSnapshot, PriceLevel, band_volumes,
};

/// Prices in cents around 100.00, sizes in thousandths.
fn level_strategy() -> impl Strategy<Value = (i64, i64)> {
    (1_000i64..=20_000, 0i64..=50_000)
}

fn to_levels(raw: &[(i64, i64)]) -> Vec<PriceLevel> {
    raw.iter()
        .map(|&(p, s)| PriceLevel::new(Decimal::new(p, 2), Decimal::new(s, 3)))
        .collect()
}

fn band_strategy() -> impl Strategy<Value = DepthBand> {
    (1i64..=9_999).prop_map(|bp| DepthBand::new(Decimal::new(bp, 2)).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn one_bounded_or_undefined_ratio_per_band(
        bids in prop::collection::vec(level_strategy(), 1..40),
        asks in prop::collection::vec(level_strategy(), 1..40),
        bands in prop::collection::vec(band_strategy(), 1..8),
    ) {
        let book = OrderBookSnapshot::new(to_levels(&bids), to_levels(&asks), Utc::now());
        let out = DepthRatioAggregator::new(bands.clone())
            .aggregate(&book)
            .expect("both sides populated");

        prop_assert_eq!(out.ratios.len(), bands.len());
        for (r, b) in out.ratios.iter().zip(&bands) {
            prop_assert_eq!(r.band, *b);
            if let Some(v) = r.ratio {
                prop_assert!(v >= Decimal::ZERO && v <= Decimal::ONE, "ratio {} out of range", v);
                prop_assert!(v.scale() <= 4);
            }
        }
    }

    #[test]
    fn wider_band_never_includes_less_volume(
        bids in prop::collection::vec(level_strategy(), 1..40),
        asks in prop::collection::vec(level_strategy(), 1..40),
        a in band_strategy(),
        b in band_strategy(),
    ) {
        let (narrow, wide) = if a <= b { (a, b) } else { (b, a) };
        let book = OrderBookSnapshot::new(to_levels(&bids), to_levels(&asks), Utc::now());
        let mid = book.mid_price().expect("both sides populated");

        let n = band_volumes(&book, mid, narrow).expect("small values never overflow");
        let w = band_volumes(&book, mid, wide).expect("small values never overflow");

        prop_assert!(w.bid >= n.bid);
        prop_assert!(w.ask >= n.ask);
    }

    #[test]
    fn undefined_only_when_band_holds_no_size(
        bids in prop::collection::vec(level_strategy(), 1..20),
        asks in prop::collection::vec(level_strategy(), 1..20),
        band in band_strategy(),
    ) {
        let book = OrderBookSnapshot::new(to_levels(&bids), to_levels(&asks), Utc::now());
        let mid = book.mid_price().expect("both sides populated");
        let vol = band_volumes(&book, mid, band).expect("small values never overflow");
        let out = DepthRatioAggregator::new(vec![band]).aggregate(&book).unwrap();

        prop_assert_eq!(out.ratios[0].ratio.is_none(), vol.total() == Decimal::ZERO);
    }
}
