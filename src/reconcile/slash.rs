// src/reconcile/slash.rs

use crate::schemas::{AccountId, Balance, BalanceSnapshot, UnreserveEvent};

/// Reduction in reserved balance of `who` that no explicit unreserve accounts for.
///
/// `reduction = unreserve + slash`, so `slash = reduction - unreserve`, floored at zero since an
/// unreserve can be a no-op.
pub fn detect_slash(
    who: &AccountId,
    before: &BalanceSnapshot,
    after: &BalanceSnapshot,
    unreserves: &[UnreserveEvent],
) -> Balance {
    let reduction = before.reserved.saturating_sub(after.reserved);
    let explained = unreserves
        .iter()
        .filter(|u| &u.who == who)
        .fold(0u128, |acc, u| acc.saturating_add(u.amount));
    reduction.saturating_sub(explained)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::effective_reserved;
    use crate::chain::mock::acc;

    fn snap(who: AccountId, reserved: Balance) -> BalanceSnapshot {
        BalanceSnapshot { who, reserved }
    }

    #[test]
    fn slash_is_reduction_minus_unreserve() {
        let a = acc(1);
        let values: [Balance; 5] = [0, 1, 50, 75, 1_000_000_000_000];
        for &before in &values {
            for &after in values.iter().filter(|&&v| v <= before) {
                let reduction = before - after;
                for &u in values.iter().filter(|&&v| v <= reduction) {
                    // split u across two events to exercise the sum
                    let half = u / 2;
                    let events = [
                        UnreserveEvent { who: a, amount: half },
                        UnreserveEvent { who: a, amount: u - half },
                    ];
                    let got = detect_slash(&a, &snap(a, before), &snap(a, after), &events);
                    assert_eq!(got, reduction - u, "before={before} after={after} u={u}");
                }
            }
        }
    }

    #[test]
    fn fully_explained_reduction_is_not_a_slash() {
        let a = acc(1);
        let events = [UnreserveEvent { who: a, amount: 80 }];
        assert_eq!(detect_slash(&a, &snap(a, 100), &snap(a, 50), &events), 0);
        assert_eq!(detect_slash(&a, &snap(a, 100), &snap(a, 50), &events[..0]), 50);
    }

    #[test]
    fn increases_and_other_accounts_are_ignored() {
        let a = acc(1);
        let b = acc(2);
        let events = [UnreserveEvent { who: b, amount: 40 }];
        assert_eq!(detect_slash(&a, &snap(a, 10), &snap(a, 30), &events), 0);
        assert_eq!(detect_slash(&a, &snap(a, 100), &snap(a, 60), &events), 40);
    }

    #[test]
    fn migrated_reserved_is_not_a_slash() {
        // before the migration the value lived in the legacy map, after it in AccountData
        let a = acc(1);
        let before = snap(a, effective_reserved(Some(0), Some(500)));
        let after = snap(a, effective_reserved(Some(500), None));
        assert_eq!(detect_slash(&a, &before, &after, &[]), 0);
    }
}
