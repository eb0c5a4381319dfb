// Domain models (ported from shared Go types)

mod flow;
mod identity;

pub use flow::{FlowCount, FlowKey, FlowTuple, Transport};
pub use identity::{Identity, IdentityKind, IdentitySnapshot};
