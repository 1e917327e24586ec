use super::*;

fn btc_spec() -> InstrumentSpec {
    InstrumentSpec {
        unit_contract_value: 0.001,
        quantity_increment: 0.001,
        min_quantity: 0.001,
        max_quantity: 1000.0,
        ..InstrumentSpec::default()
    }
}

fn active(pairs: &[&str]) -> HashSet<String> {
    pairs.iter().map(|p| p.to_string()).collect()
}

struct Scenario {
    spec: InstrumentSpec,
    active: HashSet<String>,
}

impl Scenario {
    fn btc() -> Self {
        Self {
            spec: btc_spec(),
            active: active(&["B-BTC_USDT"]),
        }
    }

    fn request(&self) -> SizingRequest<'_> {
        SizingRequest {
            pair: "B-BTC_USDT",
            notional_inr: 10_000.0,
            mark_price: 60_000.0,
            fx_rate: 90.0,
            leverage: 10,
            wallet_balance: 5_000.0,
            spec: &self.spec,
            active_pairs: &self.active,
        }
    }
}

#[test]
fn sizes_the_reference_order() {
    // 10,000 INR at 60,000 USDT with a 0.001 BTC contract and fx 90:
    // raw contracts = 10000 / (60000 * 0.001 * 90) = 1.8518...,
    // floored to the 0.001 increment.
    let scenario = Scenario::btc();
    let sized = size_order(&scenario.request()).unwrap();

    assert_eq!(sized.quantity, 1.851);
    assert!((sized.contracts_raw - 1.8518518518518519).abs() < 1e-12);
    assert!((sized.notional_inr - 9995.4).abs() < 1e-9);
    assert!((sized.estimated_margin - 999.54).abs() < 1e-9);
    assert_eq!(sized.mark_price, 60_000.0);
    assert_eq!(sized.fx_rate, 90.0);
}

#[test]
fn identical_requests_size_identically() {
    // Pure arithmetic over the same inputs, so every figure matches
    // bit for bit across repeat calls.
    let scenario = Scenario::btc();
    let first = size_order(&scenario.request()).unwrap();
    let second = size_order(&scenario.request()).unwrap();

    assert_eq!(first.quantity, second.quantity);
    assert_eq!(first.contracts_raw, second.contracts_raw);
    assert_eq!(first.notional_usdt, second.notional_usdt);
    assert_eq!(first.notional_inr, second.notional_inr);
    assert_eq!(first.estimated_margin, second.estimated_margin);
}

#[test]
fn margin_above_balance_is_rejected() {
    let scenario = Scenario::btc();
    let mut req = scenario.request();
    req.wallet_balance = 500.0;

    let err = size_order(&req).unwrap_err();
    assert_eq!(err.code(), "estimated_margin_exceeds_balance");
    match err {
        SizingError::MarginExceedsBalance {
            estimated_margin,
            balance,
        } => {
            assert!((estimated_margin - 999.54).abs() < 1e-9);
            assert_eq!(balance, 500.0);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn margin_equal_to_balance_passes() {
    // Integral figures keep the comparison exact: quantity 1, notional
    // 9000 INR, margin 9000 / 9 = 1000.
    let spec = InstrumentSpec {
        unit_contract_value: 1.0,
        quantity_increment: 1.0,
        min_quantity: 1.0,
        max_quantity: 100.0,
        ..InstrumentSpec::default()
    };
    let pairs = active(&["B-XYZ_USDT"]);
    let req = SizingRequest {
        pair: "B-XYZ_USDT",
        notional_inr: 9_000.0,
        mark_price: 100.0,
        fx_rate: 90.0,
        leverage: 9,
        wallet_balance: 1_000.0,
        spec: &spec,
        active_pairs: &pairs,
    };
    let sized = size_order(&req).unwrap();
    assert_eq!(sized.quantity, 1.0);
    assert_eq!(sized.estimated_margin, 1_000.0);
}

#[test]
fn inactive_pair_is_rejected_before_sizing() {
    let scenario = Scenario::btc();
    let mut req = scenario.request();
    req.pair = "B-DOGE_USDT";

    let err = size_order(&req).unwrap_err();
    assert_eq!(err.code(), "instrument_not_active");
}

#[test]
fn notional_below_one_increment_is_too_small() {
    let scenario = Scenario::btc();
    let mut req = scenario.request();
    // Raw contracts ~0.0009, floors to zero.
    req.notional_inr = 5.0;

    let err = size_order(&req).unwrap_err();
    assert_eq!(err.code(), "trade_size_too_small_for_instrument");
    match err {
        SizingError::TradeSizeTooSmall { quantity, .. } => assert_eq!(quantity, 0.0),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn quantity_above_instrument_maximum_is_rejected() {
    let mut scenario = Scenario::btc();
    scenario.spec.max_quantity = 1.0;
    let req = scenario.request();

    let err = size_order(&req).unwrap_err();
    assert_eq!(err.code(), "trade_size_too_large_for_instrument");
}

#[test]
fn zero_leverage_margins_the_full_notional() {
    let scenario = Scenario::btc();
    let mut req = scenario.request();
    req.leverage = 0;
    req.wallet_balance = 10_000.0;

    let sized = size_order(&req).unwrap();
    assert_eq!(sized.estimated_margin, sized.notional_inr);
}

#[test]
fn unusable_price_or_fx_is_reported() {
    let scenario = Scenario::btc();

    let mut req = scenario.request();
    req.mark_price = 0.0;
    assert_eq!(size_order(&req).unwrap_err().code(), "price_unavailable");

    let mut req = scenario.request();
    req.mark_price = f64::NAN;
    assert_eq!(size_order(&req).unwrap_err().code(), "price_unavailable");

    let mut req = scenario.request();
    req.fx_rate = -1.0;
    assert_eq!(size_order(&req).unwrap_err().code(), "fx_rate_unavailable");
}

#[test]
fn quantity_is_always_a_multiple_of_the_increment() {
    let spec = InstrumentSpec {
        unit_contract_value: 0.0001,
        quantity_increment: 0.01,
        min_quantity: 0.01,
        max_quantity: 1e9,
        ..InstrumentSpec::default()
    };
    let pairs = active(&["B-ETH_USDT"]);
    for notional in [1_234.56, 9_999.99, 50_000.0, 123_456.78] {
        let req = SizingRequest {
            pair: "B-ETH_USDT",
            notional_inr: notional,
            mark_price: 3_412.37,
            fx_rate: 88.61,
            leverage: 5,
            wallet_balance: f64::MAX,
            spec: &spec,
            active_pairs: &pairs,
        };
        let sized = size_order(&req).unwrap();
        let steps = sized.quantity / spec.quantity_increment;
        assert!(
            (steps - steps.round()).abs() < 1e-6,
            "quantity {} is not on the 0.01 grid",
            sized.quantity
        );
        // Flooring never sizes above what the notional affords.
        assert!(sized.quantity <= sized.contracts_raw + 1e-9);
    }
}
