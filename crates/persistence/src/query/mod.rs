//! Query material evaluated by stores: filters, update documents and the
//! value ordering used for sorting.

mod filter;
mod ordering;
mod update;

pub use filter::{Condition, Filter};
pub use ordering::{compare_documents, compare_values, lookup, values_equal};
pub use update::{Update, UpdateOp};
