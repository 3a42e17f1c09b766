mod delegatecall;
mod ether_thief;
mod predictable_variables;
mod selfdestruct;
mod tx_origin;

pub use delegatecall::DelegateCallToUntrusted;
pub use ether_thief::EtherThief;
pub use predictable_variables::PredictableVariables;
pub use selfdestruct::UnprotectedSelfdestruct;
pub use tx_origin::TxOriginAuthorization;

use argus_vm::core::taint::Taint;

/// Branch conditions derived from these mean the path checked who is calling.
pub(crate) const AUTHORIZATION: Taint = Taint::CALLER.with(Taint::ORIGIN);
