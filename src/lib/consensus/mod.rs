//! Consensus collapsing of candidate-duplicate stacks.
//!
//! A sealed [`Stack`](crate::stack::Stack) becomes a [`ConsensusFamily`]: its records are
//! ordered by name and partitioned into [`ConsensusSet`]s by read length and mate number.
//! Each set accumulates a `length x 5` table of votes and quality sums over `A, C, G, T, N`
//! plus the highest quality observed at each position. Emission calls the most-voted base at
//! every position (ties go to the earlier symbol) and scores it with a [`QualityPolicy`].
//!
//! One record is emitted per set. It keeps the founding record's alignment, gets a name
//! shared with its mate's consensus, loses the duplicate flag and gains three tags:
//!
//! | Tag | Type | Value |
//! |-----|------|-------|
//! | `FM` | `i` | contributing records |
//! | `FA` | `B:i` | contributors agreeing with the called base, per position |
//! | `PV` | `B:i` | summed quality of the agreeing contributors, per position |

pub mod collapser;
pub mod family;
pub mod policy;
pub mod set;

pub use collapser::{CollapseConfig, Collapser, DEFAULT_BATCH_SIZE, collapse_stack};
pub use family::ConsensusFamily;
pub use policy::QualityPolicy;
pub use set::{CalledConsensus, ConsensusSet, synthesize_name};
