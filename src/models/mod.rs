pub mod category;
pub mod receipt;
pub mod receipt_item;
pub mod spending_record;
pub mod store;

pub use category::Category;
pub use receipt::Receipt;
pub use receipt_item::ReceiptItem;
pub use spending_record::SpendingRecord;
pub use store::Store;

use chrono::{DateTime, SubsecRound, Utc};

/// Drops sub-microsecond precision, which `TIMESTAMPTZ` cannot hold.
pub fn to_storage_precision(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp.trunc_subsecs(6)
}

pub(crate) fn now() -> DateTime<Utc> {
    to_storage_precision(Utc::now())
}
