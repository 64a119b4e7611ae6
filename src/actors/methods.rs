// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::BuiltinActor;

/// FRC-42 method number of `InvokeContract` on EVM actors.
pub const EVM_INVOKE_CONTRACT: u64 = 3_844_450_837;

const ACCOUNT: &[&str] = &["Constructor", "PubkeyAddress"];
const CRON: &[&str] = &["Constructor", "EpochTick"];
const INIT: &[&str] = &["Constructor", "Exec", "Exec4"];
const POWER: &[&str] = &[
    "Constructor",
    "CreateMiner",
    "UpdateClaimedPower",
    "EnrollCronEvent",
    "OnEpochTickEnd",
    "UpdatePledgeTotal",
    "OnConsensusFault",
    "SubmitPoRepForBulkVerify",
    "CurrentTotalPower",
];
const MINER: &[&str] = &[
    "Constructor",
    "ControlAddresses",
    "ChangeWorkerAddress",
    "ChangePeerID",
    "SubmitWindowedPoSt",
    "PreCommitSector",
    "ProveCommitSector",
    "ExtendSectorExpiration",
    "TerminateSectors",
    "DeclareFaults",
    "DeclareFaultsRecovered",
    "OnDeferredCronEvent",
    "CheckSectorProven",
    "ApplyRewards",
    "ReportConsensusFault",
    "WithdrawBalance",
    "ConfirmSectorProofsValid",
    "ChangeMultiaddrs",
    "CompactPartitions",
    "CompactSectorNumbers",
    "ConfirmUpdateWorkerKey",
    "RepayDebt",
    "ChangeOwnerAddress",
    "DisputeWindowedPoSt",
    "PreCommitSectorBatch",
    "ProveCommitAggregate",
    "ProveReplicaUpdates",
    "PreCommitSectorBatch2",
    "ProveReplicaUpdates2",
    "ChangeBeneficiary",
    "GetBeneficiary",
    "ExtendSectorExpiration2",
];
const MARKET: &[&str] = &[
    "Constructor",
    "AddBalance",
    "WithdrawBalance",
    "PublishStorageDeals",
    "VerifyDealsForActivation",
    "ActivateDeals",
    "OnMinerSectorsTerminate",
    "ComputeDataCommitment",
    "CronTick",
];
const PAYCH: &[&str] = &["Constructor", "UpdateChannelState", "Settle", "Collect"];
const MULTISIG: &[&str] = &[
    "Constructor",
    "Propose",
    "Approve",
    "Cancel",
    "AddSigner",
    "RemoveSigner",
    "SwapSigner",
    "ChangeNumApprovalsThreshold",
    "LockBalance",
];
const REWARD: &[&str] = &[
    "Constructor",
    "AwardBlockReward",
    "ThisEpochReward",
    "UpdateNetworkKPI",
];
const VERIFREG: &[&str] = &[
    "Constructor",
    "AddVerifier",
    "RemoveVerifier",
    "AddVerifiedClient",
    "UseBytes",
    "RestoreBytes",
    "RemoveVerifiedClientDataCap",
    "RemoveExpiredAllocations",
    "ClaimAllocations",
    "GetClaims",
    "ExtendClaimTerms",
    "RemoveExpiredClaims",
];
const EVM: &[&str] = &[
    "Constructor",
    "Resurrect",
    "GetBytecode",
    "GetBytecodeHash",
    "GetStorageAt",
    "InvokeContractDelegate",
];
const EAM: &[&str] = &["Constructor", "Create", "Create2", "CreateExternal"];

/// Name of a builtin method, numbered from 1 in declaration order. Method 0 is a plain send on
/// every actor.
pub fn method_name(family: BuiltinActor, method: u64) -> Option<&'static str> {
    if method == 0 {
        return Some("Send");
    }
    if method == EVM_INVOKE_CONTRACT && matches!(family, BuiltinActor::Evm | BuiltinActor::Placeholder | BuiltinActor::EthAccount) {
        return Some("InvokeContract");
    }
    let table = match family {
        BuiltinActor::Account | BuiltinActor::EthAccount => ACCOUNT,
        BuiltinActor::Cron => CRON,
        BuiltinActor::Init => INIT,
        BuiltinActor::Power => POWER,
        BuiltinActor::Miner => MINER,
        BuiltinActor::Market => MARKET,
        BuiltinActor::PaymentChannel => PAYCH,
        BuiltinActor::Multisig => MULTISIG,
        BuiltinActor::Reward => REWARD,
        BuiltinActor::VerifiedRegistry => VERIFREG,
        BuiltinActor::Evm => EVM,
        BuiltinActor::Eam => EAM,
        BuiltinActor::System | BuiltinActor::DataCap | BuiltinActor::Placeholder => &[],
    };
    let index = usize::try_from(method).ok()?.checked_sub(1)?;
    table.get(index).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_methods() {
        assert_eq!(method_name(BuiltinActor::Miner, 5), Some("SubmitWindowedPoSt"));
        assert_eq!(method_name(BuiltinActor::Market, 4), Some("PublishStorageDeals"));
        assert_eq!(method_name(BuiltinActor::Multisig, 0), Some("Send"));
        assert_eq!(
            method_name(BuiltinActor::Evm, EVM_INVOKE_CONTRACT),
            Some("InvokeContract")
        );
        assert_eq!(method_name(BuiltinActor::Cron, 3), None);
        assert_eq!(method_name(BuiltinActor::System, 1), None);
    }
}
