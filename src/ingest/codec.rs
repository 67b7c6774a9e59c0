use alloy::{rpc::types::Log, sol_types::SolEvent};

use super::error::DecodeError;
use crate::{
    contract::FeesCollected, repo::FeeCollectedEvent, utils::uint256::DbU256,
};

fn hex0x(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode a `FeesCollected` log into an event record.
///
/// Fees are carried as full uint256 values; the chain-side `_lifiFee`
/// becomes `protocol_fee`.
pub fn decode(log: &Log) -> Result<FeeCollectedEvent, DecodeError> {
    if log.removed {
        return Err(DecodeError::Removed);
    }
    let inner = &log.inner;
    let topic0 = inner.topics().first().ok_or(DecodeError::MissingTopic)?;
    if *topic0 != FeesCollected::SIGNATURE_HASH {
        return Err(DecodeError::UnexpectedSignature(format!("{topic0}")));
    }
    let event = FeesCollected::decode_log(inner)
        .map_err(|e| DecodeError::Abi(e.to_string()))?
        .data;
    let tx_hash = log
        .transaction_hash
        .ok_or(DecodeError::MissingField("transactionHash"))?;
    let block_number = log
        .block_number
        .ok_or(DecodeError::MissingField("blockNumber"))?;

    Ok(FeeCollectedEvent {
        token: hex0x(event._token.as_slice()),
        integrator: hex0x(event._integrator.as_slice()),
        integrator_fee: DbU256(event._integratorFee),
        protocol_fee: DbU256(event._lifiFee),
        transaction_hash: hex0x(tx_hash.as_slice()),
        block_number,
    })
}
