use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use vault_metrics_core::errors::CoreError;
use vault_metrics_core::models::event::{Category, Event, EventKind, EventRecord, Sign};
use vault_metrics_core::models::reconciliation::{ReconciliationReport, ReconciliationRow};
use vault_metrics_core::models::settings::Settings;
use vault_metrics_core::models::snapshot::{DailySnapshot, Ratio};
use vault_metrics_core::models::totals::Totals;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn ev(day: NaiveDate, kind: EventKind, amount: Decimal) -> Event {
    Event::new(day, kind, amount).unwrap()
}

// ═══════════════════════════════════════════════════════════════════
//  EventKind
// ═══════════════════════════════════════════════════════════════════

mod event_kind {
    use super::*;

    #[test]
    fn display_uses_variant_name() {
        assert_eq!(EventKind::Supply.to_string(), "Supply");
        assert_eq!(EventKind::SupplyCollateral.to_string(), "SupplyCollateral");
        assert_eq!(EventKind::LiquidationBadDebt.to_string(), "LiquidationBadDebt");
    }

    #[test]
    fn all_lists_every_kind_once() {
        let unique: HashSet<EventKind> = EventKind::ALL.into_iter().collect();
        assert_eq!(unique.len(), EventKind::COUNT);
    }

    #[test]
    fn parse_exact_name() {
        assert_eq!("Repay".parse::<EventKind>().unwrap(), EventKind::Repay);
    }

    #[test]
    fn parse_snake_case() {
        assert_eq!(
            "supply_collateral".parse::<EventKind>().unwrap(),
            EventKind::SupplyCollateral
        );
        assert_eq!(
            "liquidation_bad_debt".parse::<EventKind>().unwrap(),
            EventKind::LiquidationBadDebt
        );
    }

    #[test]
    fn parse_ignores_case_and_whitespace() {
        assert_eq!(" INTEREST-BORROW ".parse::<EventKind>().unwrap(), EventKind::InterestBorrow);
        assert_eq!("withdraw".parse::<EventKind>().unwrap(), EventKind::Withdraw);
    }

    #[test]
    fn parse_every_display_form() {
        for kind in EventKind::ALL {
            assert_eq!(kind.to_string().parse::<EventKind>().unwrap(), kind);
        }
    }

    #[test]
    fn parse_unknown_reports_offending_kind() {
        match "flash_loan".parse::<EventKind>() {
            Err(CoreError::UnknownEventKind(kind)) => assert_eq!(kind, "flash_loan"),
            other => panic!("Expected UnknownEventKind, got {:?}", other),
        }
    }

    #[test]
    fn parse_empty_is_unknown() {
        assert!(matches!(
            "".parse::<EventKind>(),
            Err(CoreError::UnknownEventKind(_))
        ));
    }

    #[test]
    fn serde_json_uses_name_string() {
        let json = serde_json::to_string(&EventKind::WithdrawCollateral).unwrap();
        assert_eq!(json, "\"WithdrawCollateral\"");
        let back: EventKind = serde_json::from_str("\"withdraw_collateral\"").unwrap();
        assert_eq!(back, EventKind::WithdrawCollateral);
    }

    #[test]
    fn serde_json_rejects_unknown() {
        let err = serde_json::from_str::<EventKind>("\"mint\"").unwrap_err();
        assert!(err.to_string().contains("Unknown event kind: mint"));
    }
}

// ═══════════════════════════════════════════════════════════════════
//  Sign policy table
// ═══════════════════════════════════════════════════════════════════

mod sign_policy {
    use super::*;

    fn expect(kind: EventKind, category: Category, sign: Sign) {
        let policy = kind.sign_policy();
        assert_eq!(policy.category, category, "category of {kind}");
        assert_eq!(policy.sign, sign, "sign of {kind}");
    }

    #[test]
    fn supply_side() {
        expect(EventKind::Supply, Category::Supply, Sign::Credit);
        expect(EventKind::InterestSupply, Category::Supply, Sign::Credit);
        expect(EventKind::Withdraw, Category::Supply, Sign::Debit);
        expect(EventKind::LiquidationBadDebt, Category::Supply, Sign::Debit);
    }

    #[test]
    fn borrow_side() {
        expect(EventKind::Borrow, Category::Borrow, Sign::Credit);
        expect(EventKind::InterestBorrow, Category::Borrow, Sign::Credit);
        expect(EventKind::Repay, Category::Borrow, Sign::Debit);
        expect(EventKind::LiquidationRepaid, Category::Borrow, Sign::Debit);
    }

    #[test]
    fn collateral_side() {
        expect(EventKind::SupplyCollateral, Category::Collateral, Sign::Credit);
        expect(EventKind::WithdrawCollateral, Category::Collateral, Sign::Debit);
        expect(EventKind::LiquidationSeized, Category::Collateral, Sign::Debit);
    }

    #[test]
    fn signed_amount_follows_sign() {
        assert_eq!(EventKind::Supply.signed_amount(dec!(12.5)), dec!(12.5));
        assert_eq!(EventKind::Withdraw.signed_amount(dec!(12.5)), dec!(-12.5));
        assert_eq!(EventKind::LiquidationSeized.signed_amount(dec!(3)), dec!(-3));
    }

    #[test]
    fn four_supply_four_borrow_three_collateral() {
        let count = |c: Category| EventKind::ALL.iter().filter(|k| k.category() == c).count();
        assert_eq!(count(Category::Supply), 4);
        assert_eq!(count(Category::Borrow), 4);
        assert_eq!(count(Category::Collateral), 3);
    }
}

// ═══════════════════════════════════════════════════════════════════
//  Event
// ═══════════════════════════════════════════════════════════════════

mod event {
    use super::*;

    #[test]
    fn new_accepts_positive_amount() {
        let e = Event::new(d(2025, 1, 1), EventKind::Supply, dec!(100)).unwrap();
        assert_eq!(e.day, d(2025, 1, 1));
        assert_eq!(e.kind, EventKind::Supply);
        assert_eq!(e.amount_usd, dec!(100));
    }

    #[test]
    fn new_accepts_zero_amount() {
        assert!(Event::new(d(2025, 1, 1), EventKind::Borrow, Decimal::ZERO).is_ok());
    }

    #[test]
    fn new_rejects_negative_amount() {
        let err = Event::new(d(2025, 1, 1), EventKind::Repay, dec!(-1)).unwrap_err();
        match err {
            CoreError::ValidationError(msg) => {
                assert!(msg.contains("Repay"));
                assert!(msg.contains("2025-01-01"));
            }
            other => panic!("Expected ValidationError, got {:?}", other),
        }
    }

    #[test]
    fn validate_catches_struct_literal_with_negative_amount() {
        let e = Event {
            day: d(2025, 1, 1),
            kind: EventKind::Supply,
            amount_usd: dec!(-0.01),
        };
        assert!(e.validate().is_err());
    }

    #[test]
    fn signed_amount_of_debit() {
        let e = ev(d(2025, 1, 1), EventKind::LiquidationBadDebt, dec!(40));
        assert_eq!(e.signed_amount(), dec!(-40));
    }

    #[test]
    fn serde_json_roundtrip() {
        let e = ev(d(2025, 2, 3), EventKind::InterestSupply, dec!(0.125));
        let json = serde_json::to_string(&e).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(e, back);
    }

    #[test]
    fn record_with_aliases_converts() {
        let json = r#"{"date": "2025-02-03", "type": "supply_collateral", "amount": 20}"#;
        let record: EventRecord = serde_json::from_str(json).unwrap();
        let event = Event::try_from(record).unwrap();
        assert_eq!(event.kind, EventKind::SupplyCollateral);
        assert_eq!(event.amount_usd, dec!(20));
    }

    #[test]
    fn record_with_unknown_kind_fails() {
        let record = EventRecord {
            day: d(2025, 1, 1),
            kind: "rebalance".into(),
            amount_usd: dec!(1),
        };
        match Event::try_from(record) {
            Err(CoreError::UnknownEventKind(kind)) => assert_eq!(kind, "rebalance"),
            other => panic!("Expected UnknownEventKind, got {:?}", other),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
//  Totals
// ═══════════════════════════════════════════════════════════════════

mod totals {
    use super::*;

    #[test]
    fn starts_at_zero() {
        let t = Totals::new();
        assert_eq!(t.supply, Decimal::ZERO);
        assert_eq!(t.borrow, Decimal::ZERO);
        assert_eq!(t.collateral, Decimal::ZERO);
    }

    #[test]
    fn apply_routes_to_category() {
        let mut t = Totals::new();
        t.apply(&ev(d(2025, 1, 1), EventKind::Supply, dec!(100))).unwrap();
        t.apply(&ev(d(2025, 1, 1), EventKind::Borrow, dec!(40))).unwrap();
        t.apply(&ev(d(2025, 1, 1), EventKind::SupplyCollateral, dec!(25))).unwrap();
        t.apply(&ev(d(2025, 1, 1), EventKind::LiquidationSeized, dec!(5))).unwrap();

        assert_eq!(t.get(Category::Supply), dec!(100));
        assert_eq!(t.get(Category::Borrow), dec!(40));
        assert_eq!(t.get(Category::Collateral), dec!(20));
    }

    #[test]
    fn totals_can_go_negative() {
        let mut t = Totals::new();
        t.apply(&ev(d(2025, 1, 1), EventKind::Withdraw, dec!(10))).unwrap();
        assert_eq!(t.supply, dec!(-10));
    }

    #[test]
    fn overflow_is_an_error() {
        let mut t = Totals {
            supply: Decimal::MAX,
            ..Totals::default()
        };
        let err = t
            .apply(&ev(d(2025, 1, 1), EventKind::Supply, Decimal::MAX))
            .unwrap_err();
        assert!(matches!(err, CoreError::ArithmeticOverflow(_)));
        assert_eq!(t.supply, Decimal::MAX);
    }
}

// ═══════════════════════════════════════════════════════════════════
//  Ratio & DailySnapshot
// ═══════════════════════════════════════════════════════════════════

mod ratio {
    use super::*;

    #[test]
    fn compute_divides() {
        assert_eq!(
            Ratio::compute(dec!(60), dec!(100)).unwrap(),
            Ratio::Defined(dec!(0.6))
        );
    }

    #[test]
    fn compute_zero_denominator_is_undefined() {
        assert_eq!(
            Ratio::compute(dec!(60), Decimal::ZERO).unwrap(),
            Ratio::Undefined
        );
        assert!(Ratio::compute(Decimal::ZERO, Decimal::ZERO).unwrap().is_undefined());
    }

    #[test]
    fn compute_tiny_denominator_overflows_instead_of_undefined() {
        let tiny = Decimal::new(1, 28);
        match Ratio::compute(dec!(10000000000000000000000000000), tiny) {
            Err(CoreError::ArithmeticOverflow(msg)) => assert!(msg.contains("ratio")),
            other => panic!("Expected ArithmeticOverflow, got {:?}", other),
        }
    }

    #[test]
    fn value_accessor() {
        assert_eq!(Ratio::Defined(dec!(1.5)).value(), Some(dec!(1.5)));
        assert_eq!(Ratio::Undefined.value(), None);
    }

    #[test]
    fn rounded_half_away_from_zero() {
        assert_eq!(Ratio::Defined(dec!(0.12345)).rounded(4), Ratio::Defined(dec!(0.1235)));
        assert_eq!(Ratio::Defined(dec!(-0.12345)).rounded(4), Ratio::Defined(dec!(-0.1235)));
        assert_eq!(Ratio::Undefined.rounded(2), Ratio::Undefined);
    }

    #[test]
    fn serializes_undefined_as_null() {
        assert_eq!(serde_json::to_string(&Ratio::Undefined).unwrap(), "null");
        let back: Ratio = serde_json::from_str("null").unwrap();
        assert_eq!(back, Ratio::Undefined);
    }

    #[test]
    fn serde_json_roundtrip_defined() {
        let r = Ratio::Defined(dec!(0.9));
        let json = serde_json::to_string(&r).unwrap();
        let back: Ratio = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
    }

    #[test]
    fn display() {
        assert_eq!(Ratio::Defined(dec!(0.6)).to_string(), "0.6");
        assert_eq!(Ratio::Undefined.to_string(), "undefined");
    }
}

mod daily_snapshot {
    use super::*;

    #[test]
    fn from_totals_derives_all_metrics() {
        let t = Totals {
            supply: dec!(100),
            borrow: dec!(30),
            collateral: dec!(20),
        };
        let s = DailySnapshot::from_totals(d(2025, 1, 2), &t).unwrap();
        assert_eq!(s.tvl_amount_usd, dec!(120));
        assert_eq!(s.pure_tvl_amount_usd, dec!(90));
        assert_eq!(s.ratio, Ratio::Defined(dec!(0.9)));
    }

    #[test]
    fn from_totals_zero_supply() {
        let t = Totals {
            supply: Decimal::ZERO,
            borrow: dec!(10),
            collateral: dec!(50),
        };
        let s = DailySnapshot::from_totals(d(2025, 1, 2), &t).unwrap();
        assert_eq!(s.tvl_amount_usd, dec!(50));
        assert_eq!(s.pure_tvl_amount_usd, dec!(40));
        assert_eq!(s.ratio, Ratio::Undefined);
    }

    #[test]
    fn from_totals_tvl_overflow() {
        let t = Totals {
            supply: Decimal::MAX,
            borrow: Decimal::ZERO,
            collateral: Decimal::MAX,
        };
        assert!(matches!(
            DailySnapshot::from_totals(d(2025, 1, 2), &t),
            Err(CoreError::ArithmeticOverflow(_))
        ));
    }

    #[test]
    fn json_field_names() {
        let s = DailySnapshot::from_totals(d(2025, 1, 2), &Totals::default()).unwrap();
        let json = serde_json::to_string(&s).unwrap();
        for field in [
            "day",
            "supply_amount_usd",
            "borrow_amount_usd",
            "collateral_amount_usd",
            "tvl_amount_usd",
            "pure_tvl_amount_usd",
            "ratio",
        ] {
            assert!(json.contains(&format!("\"{field}\"")), "missing {field}");
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
//  Settings
// ═══════════════════════════════════════════════════════════════════

mod settings {
    use super::*;

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.ratio_scale, None);
        assert_eq!(s.csv_delimiter, b',');
        assert_eq!(s.vault, None);
    }

    #[test]
    fn from_json_partial_fills_defaults() {
        let s = Settings::from_json(r#"{"ratio_scale": 4}"#).unwrap();
        assert_eq!(s.ratio_scale, Some(4));
        assert_eq!(s.csv_delimiter, b',');
    }

    #[test]
    fn from_json_full() {
        let s = Settings::from_json(r#"{"ratio_scale": null, "csv_delimiter": 59, "vault": "gauntlet-usdc-core"}"#)
            .unwrap();
        assert_eq!(s.csv_delimiter, b';');
        assert_eq!(s.vault.as_deref(), Some("gauntlet-usdc-core"));
    }

    #[test]
    fn from_json_rejects_excessive_scale() {
        assert!(matches!(
            Settings::from_json(r#"{"ratio_scale": 40}"#),
            Err(CoreError::ValidationError(_))
        ));
    }

    #[test]
    fn rejects_quote_delimiter() {
        let s = Settings {
            csv_delimiter: b'"',
            ..Settings::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_line_break_delimiters() {
        for delimiter in [b'\n', b'\r'] {
            let s = Settings {
                csv_delimiter: delimiter,
                ..Settings::default()
            };
            assert!(
                matches!(s.validate(), Err(CoreError::ValidationError(_))),
                "delimiter {delimiter:#04x} was accepted"
            );
        }
    }

    #[test]
    fn from_json_malformed() {
        assert!(matches!(
            Settings::from_json("{"),
            Err(CoreError::Deserialization(_))
        ));
    }
}

// ═══════════════════════════════════════════════════════════════════
//  ReconciliationReport
// ═══════════════════════════════════════════════════════════════════

mod reconciliation_report {
    use super::*;

    fn row(day: NaiveDate, c: Option<Decimal>, r: Option<Decimal>) -> ReconciliationRow {
        ReconciliationRow {
            day,
            computed: c,
            reference: r,
            difference: match (c, r) {
                (Some(c), Some(r)) => Some(c - r),
                _ => None,
            },
        }
    }

    #[test]
    fn max_abs_difference_ignores_one_sided_rows() {
        let report = ReconciliationReport {
            rows: vec![
                row(d(2025, 1, 1), Some(dec!(100)), None),
                row(d(2025, 1, 2), Some(dec!(100)), Some(dec!(130))),
                row(d(2025, 1, 3), Some(dec!(100)), Some(dec!(90))),
            ],
            computed_count: 3,
            reference_count: 2,
            overlap_count: 2,
            correlation: None,
        };
        assert_eq!(report.max_abs_difference(), Some(dec!(30)));
        assert_eq!(report.first_day(), Some(d(2025, 1, 1)));
        assert_eq!(report.last_day(), Some(d(2025, 1, 3)));
    }

    #[test]
    fn empty_report() {
        let report = ReconciliationReport {
            rows: vec![],
            computed_count: 0,
            reference_count: 0,
            overlap_count: 0,
            correlation: None,
        };
        assert_eq!(report.max_abs_difference(), None);
        assert_eq!(report.first_day(), None);
    }
}
