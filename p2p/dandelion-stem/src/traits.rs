/// A request to check a transaction against the same rules as the public pool.
///
/// This crate does not validate transactions, the validator service is provided by implementers.
pub struct ValidateRequest<Tx>(pub Tx);

/// A response from the validator service.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TxValidity {
    /// The transaction may enter the stem pool.
    Valid,
    /// The transaction must be dropped.
    Invalid,
}

/// A request for a transaction, sent to the peer that advertised it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RequestData<ID, TxId> {
    /// The peer to ask.
    pub peer: ID,
    /// The transaction to ask for.
    pub tx_id: TxId,
}
