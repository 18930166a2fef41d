pub mod category_service;
pub mod commands;
pub mod receipt_service;
pub mod spending_service;
pub mod store_service;

pub use category_service::CategoryService;
pub use commands::{
    CreateCategoryRequest, CreateReceiptItemRequest, CreateReceiptRequest,
    CreateSpendingFromReceiptRequest, CreateSpendingRequest, CreateStoreRequest,
    EditStoreRequest, ExtractedReceipt, UpdateCategoryRequest, UpdateStoreRequest,
};
pub use receipt_service::ReceiptService;
pub use spending_service::SpendingService;
pub use store_service::StoreService;
