// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::shim::econ::TokenAmount;

const GAS_OVERUSE_NUM: i64 = 11;
const GAS_OVERUSE_DENOM: i64 = 10;

/// How the gas paid for a message was distributed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GasOutputs {
    pub base_fee_burn: TokenAmount,
    pub over_estimation_burn: TokenAmount,
    pub miner_penalty: TokenAmount,
    pub miner_tip: TokenAmount,
    pub refund: TokenAmount,
    pub gas_refund: i64,
    pub gas_burned: i64,
}

/// Splits unused gas into the refunded part and the part burned as an over-estimation penalty.
fn compute_gas_overestimation_burn(gas_used: i64, gas_limit: i64) -> (i64, i64) {
    if gas_used == 0 {
        return (0, gas_limit);
    }
    let mut over = gas_limit - (GAS_OVERUSE_NUM * gas_used) / GAS_OVERUSE_DENOM;
    if over < 0 {
        return (gas_limit - gas_used, 0);
    }
    if over > gas_used {
        over = gas_used;
    }
    let burn = BigInt::from(gas_limit - gas_used) * BigInt::from(over) / BigInt::from(gas_used);
    let burn = i64::try_from(burn).unwrap_or(gas_limit - gas_used);
    (gas_limit - gas_used - burn, burn)
}

/// Computes the gas outputs of a message given the base fee it was executed under.
pub fn compute_gas_outputs(
    gas_used: i64,
    gas_limit: i64,
    base_fee: &TokenAmount,
    fee_cap: &TokenAmount,
    gas_premium: &TokenAmount,
    charge_network_fee: bool,
) -> GasOutputs {
    let mut out = GasOutputs::default();
    let mut base_fee_to_pay = base_fee;
    if base_fee > fee_cap {
        base_fee_to_pay = fee_cap;
        out.miner_penalty = (base_fee - fee_cap) * gas_used;
    }
    if charge_network_fee {
        out.base_fee_burn = base_fee_to_pay * gas_used;
    }
    out.miner_tip = gas_premium * gas_limit;
    if &(base_fee_to_pay + gas_premium) > fee_cap {
        out.miner_tip = (fee_cap - base_fee_to_pay) * gas_limit;
    }

    (out.gas_refund, out.gas_burned) = compute_gas_overestimation_burn(gas_used, gas_limit);
    if out.gas_burned != 0 {
        out.over_estimation_burn = base_fee_to_pay * out.gas_burned;
        out.miner_penalty += &((base_fee - base_fee_to_pay) * out.gas_burned);
    }

    let required_funds = fee_cap * gas_limit;
    out.refund = required_funds - out.base_fee_burn.clone() - out.miner_tip.clone()
        - out.over_estimation_burn.clone();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 1000, (0, 1000))]
    #[case(1000, 1000, (0, 0))]
    #[case(1000, 1100, (100, 0))]
    #[case(100, 1000, (0, 900))]
    #[case(500, 1000, (50, 450))]
    fn overestimation_burn(#[case] used: i64, #[case] limit: i64, #[case] expected: (i64, i64)) {
        assert_eq!(compute_gas_overestimation_burn(used, limit), expected);
    }

    #[test]
    fn outputs_balance_with_required_funds() {
        let base_fee = TokenAmount::from(100);
        let fee_cap = TokenAmount::from(150);
        let premium = TokenAmount::from(10);
        let out = compute_gas_outputs(500, 1000, &base_fee, &fee_cap, &premium, true);
        assert_eq!(out.base_fee_burn, TokenAmount::from(50_000));
        assert_eq!(out.miner_tip, TokenAmount::from(10_000));
        assert_eq!(out.gas_burned, 450);
        assert_eq!(out.over_estimation_burn, TokenAmount::from(45_000));
        assert!(out.miner_penalty.is_zero());
        let total = out.base_fee_burn.clone()
            + out.miner_tip.clone()
            + out.over_estimation_burn.clone()
            + out.refund.clone();
        assert_eq!(total, TokenAmount::from(150_000));
    }

    #[test]
    fn fee_cap_below_base_fee_penalises_miner() {
        let base_fee = TokenAmount::from(200);
        let fee_cap = TokenAmount::from(150);
        let premium = TokenAmount::from(10);
        let out = compute_gas_outputs(1000, 1000, &base_fee, &fee_cap, &premium, true);
        assert_eq!(out.miner_penalty, TokenAmount::from(50_000));
        assert_eq!(out.base_fee_burn, TokenAmount::from(150_000));
        assert!(out.miner_tip.is_zero());
        assert!(out.refund.is_zero());
    }
}
