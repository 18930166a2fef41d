mod common;

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use spending_core::error::AppError;
use spending_core::repositories::{
    ReceiptItemRepository, ReceiptRepository, StoreRepository,
};
use spending_core::services::{
    CategoryService, CreateCategoryRequest, CreateReceiptItemRequest, CreateReceiptRequest,
    CreateSpendingFromReceiptRequest, CreateSpendingRequest, CreateStoreRequest,
    EditStoreRequest, ExtractedReceipt, ReceiptService, SpendingService, StoreService,
    UpdateCategoryRequest, UpdateStoreRequest,
};
use uuid::Uuid;

fn create_category_request(name: &str, stores: &[&str]) -> CreateCategoryRequest {
    CreateCategoryRequest {
        name: name.to_string(),
        stores: stores.iter().map(|s| s.to_string()).collect(),
    }
}

fn sorted_names(stores: &[spending_core::models::Store]) -> Vec<String> {
    let mut names: Vec<String> = stores.iter().map(|s| s.name.clone()).collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_duplicate_category_is_a_conflict() {
    let pool = common::setup_test_db().await;
    let service = CategoryService::new(pool.clone());
    let name = common::unique_name("Groceries");

    let created = service
        .create_category(create_category_request(&name, &[]))
        .await
        .expect("Failed to create category");
    assert!(!created.external_id.is_nil());
    assert_eq!(created.name, name);

    let err = service
        .create_category(create_category_request(&name, &[]))
        .await
        .expect_err("Duplicate name should be rejected");
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(err.status_code(), http::StatusCode::CONFLICT);

    assert_eq!(common::count_categories_named(&pool, &name).await, 1);
    let unchanged = service
        .get_category(created.external_id)
        .await
        .expect("Original category should remain");
    assert_eq!(unchanged.name, created.name);
    assert_eq!(unchanged.updated_at, created.updated_at);
}

#[tokio::test]
async fn test_create_category_with_nested_stores() {
    let pool = common::setup_test_db().await;
    let service = CategoryService::new(pool.clone());
    let store_repo = StoreRepository::new(pool.clone());

    let created = service
        .create_category(create_category_request(
            &common::unique_name("Utilities"),
            &["Store A", "Store B"],
        ))
        .await
        .expect("Failed to create category");

    assert_eq!(created.stores.len(), 2);
    assert_eq!(created.stores[0].name, "Store A");
    assert_eq!(created.stores[1].name, "Store B");
    assert!(created.stores.iter().all(|s| s.category_id == created.id));

    let read_back = store_repo
        .get_by_category_id(None, created.id)
        .await
        .expect("Failed to read stores");
    let mut expected: Vec<Uuid> = created.stores.iter().map(|s| s.external_id).collect();
    let mut actual: Vec<Uuid> = read_back.iter().map(|s| s.external_id).collect();
    expected.sort();
    actual.sort();
    assert_eq!(actual, expected);
}

#[tokio::test]
async fn test_create_category_rejects_invalid_input_before_storage() {
    let pool = common::setup_test_db().await;
    let service = CategoryService::new(pool.clone());
    let name = common::unique_name("Invalid");

    let err = service
        .create_category(create_category_request(&name, &["Same", "Same"]))
        .await
        .expect_err("Duplicate nested stores should be rejected");
    assert!(matches!(err, AppError::InvalidInput(_)));
    assert_eq!(err.status_code(), http::StatusCode::BAD_REQUEST);
    assert_eq!(common::count_categories_named(&pool, &name).await, 0);

    let err = service
        .create_category(create_category_request("  ", &[]))
        .await
        .expect_err("Blank name should be rejected");
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn test_spending_with_unknown_category_is_rejected() {
    let pool = common::setup_test_db().await;
    let service = SpendingService::new(pool.clone());

    let remark = common::unique_name("Ghost");

    let err = service
        .create_spending(CreateSpendingRequest {
            amount: dec!(10.00),
            remark: remark.clone(),
            spending_date: Utc::now(),
            category_id: Uuid::new_v4(),
        })
        .await
        .expect_err("Unknown category should be rejected");
    assert!(matches!(err, AppError::InvalidReference(_)));
    assert_eq!(err.status_code(), http::StatusCode::NOT_FOUND);

    let after = service.list_spending().await.expect("Failed to list");
    assert!(after.iter().all(|r| r.remark != remark));
}

#[tokio::test]
async fn test_update_category_synchronises_stores() {
    let pool = common::setup_test_db().await;
    let service = CategoryService::new(pool.clone());

    let created = service
        .create_category(create_category_request(
            &common::unique_name("Utilities"),
            &["Store A", "Store B"],
        ))
        .await
        .expect("Failed to create category");
    let store_a = created.stores[0].external_id;
    let store_b = created.stores[1].external_id;
    let new_name = common::unique_name("Bills");

    let updated = service
        .update_category(
            created.external_id,
            UpdateCategoryRequest {
                name: new_name.clone(),
                added_stores: vec!["Store C".to_string()],
                edited_stores: vec![EditStoreRequest {
                    id: store_a,
                    name: "Store A2".to_string(),
                }],
                deleted_stores: vec![store_b],
            },
        )
        .await
        .expect("Failed to update category");

    assert_eq!(updated.name, new_name);
    assert!(updated.updated_at >= created.updated_at);
    assert_eq!(sorted_names(&updated.stores), vec!["Store A2", "Store C"]);

    let reloaded = service
        .get_category(created.external_id)
        .await
        .expect("Failed to reload category");
    assert_eq!(sorted_names(&reloaded.stores), vec!["Store A2", "Store C"]);
    assert!(reloaded.stores.iter().any(|s| s.external_id == store_a));

    let (is_deleted, deleted_at) = common::deletion_state(&pool, "stores", store_b).await;
    assert!(is_deleted);
    assert!(deleted_at.is_some());
}

#[tokio::test]
async fn test_failed_update_applies_nothing() {
    let pool = common::setup_test_db().await;
    let service = CategoryService::new(pool.clone());

    let original_name = common::unique_name("Utilities");
    let created = service
        .create_category(create_category_request(&original_name, &["Store A", "Store B"]))
        .await
        .expect("Failed to create category");

    let err = service
        .update_category(
            created.external_id,
            UpdateCategoryRequest {
                name: common::unique_name("Renamed"),
                added_stores: vec!["Store C".to_string()],
                edited_stores: vec![EditStoreRequest {
                    id: Uuid::new_v4(),
                    name: "Store A2".to_string(),
                }],
                deleted_stores: vec![created.stores[1].external_id],
            },
        )
        .await
        .expect_err("Unknown edited store should abort the update");
    assert!(matches!(err, AppError::NotFound(_)));

    let reloaded = service
        .get_category(created.external_id)
        .await
        .expect("Failed to reload category");
    assert_eq!(reloaded.name, original_name);
    assert_eq!(sorted_names(&reloaded.stores), vec!["Store A", "Store B"]);
}

#[tokio::test]
async fn test_update_category_rejects_foreign_stores_and_taken_names() {
    let pool = common::setup_test_db().await;
    let service = CategoryService::new(pool.clone());

    let mine = service
        .create_category(create_category_request(&common::unique_name("Mine"), &["Shop"]))
        .await
        .expect("Failed to create category");
    let theirs = service
        .create_category(create_category_request(&common::unique_name("Theirs"), &["Other"]))
        .await
        .expect("Failed to create category");

    // Editing a store of another category
    let err = service
        .update_category(
            mine.external_id,
            UpdateCategoryRequest {
                name: mine.name.clone(),
                added_stores: Vec::new(),
                edited_stores: vec![EditStoreRequest {
                    id: theirs.stores[0].external_id,
                    name: "Stolen".to_string(),
                }],
                deleted_stores: Vec::new(),
            },
        )
        .await
        .expect_err("Foreign store should not be editable");
    assert!(matches!(err, AppError::NotFound(_)));

    // Adding a name that already exists in the category
    let err = service
        .update_category(
            mine.external_id,
            UpdateCategoryRequest {
                name: mine.name.clone(),
                added_stores: vec!["Shop".to_string()],
                edited_stores: Vec::new(),
                deleted_stores: Vec::new(),
            },
        )
        .await
        .expect_err("Existing store name should conflict");
    assert!(matches!(err, AppError::Conflict(_)));

    // Taking another category's name
    let err = service
        .update_category(
            mine.external_id,
            UpdateCategoryRequest {
                name: theirs.name.clone(),
                added_stores: Vec::new(),
                edited_stores: Vec::new(),
                deleted_stores: Vec::new(),
            },
        )
        .await
        .expect_err("Taken category name should conflict");
    assert!(matches!(err, AppError::Conflict(_)));

    let err = service
        .update_category(
            Uuid::new_v4(),
            UpdateCategoryRequest {
                name: common::unique_name("Nobody"),
                added_stores: Vec::new(),
                edited_stores: Vec::new(),
                deleted_stores: Vec::new(),
            },
        )
        .await
        .expect_err("Unknown category should not be found");
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_update_category_edits_apply_in_order() {
    let pool = common::setup_test_db().await;
    let service = CategoryService::new(pool.clone());

    let created = service
        .create_category(create_category_request(
            &common::unique_name("Chain"),
            &["A", "B"],
        ))
        .await
        .expect("Failed to create category");
    let store_a = created.stores[0].external_id;
    let store_b = created.stores[1].external_id;

    // B takes the name A gives up earlier in the same request
    let updated = service
        .update_category(
            created.external_id,
            UpdateCategoryRequest {
                name: created.name.clone(),
                added_stores: Vec::new(),
                edited_stores: vec![
                    EditStoreRequest {
                        id: store_a,
                        name: "X".to_string(),
                    },
                    EditStoreRequest {
                        id: store_b,
                        name: "A".to_string(),
                    },
                ],
                deleted_stores: Vec::new(),
            },
        )
        .await
        .expect("Chained renames should succeed");
    assert_eq!(sorted_names(&updated.stores), vec!["A", "X"]);

    let reloaded = service
        .get_category(created.external_id)
        .await
        .expect("Failed to reload category");
    let name_of = |id: Uuid| {
        reloaded
            .stores
            .iter()
            .find(|s| s.external_id == id)
            .map(|s| s.name.clone())
    };
    assert_eq!(name_of(store_a).as_deref(), Some("X"));
    assert_eq!(name_of(store_b).as_deref(), Some("A"));

    // Applied in order, a swap collides on its first step
    let err = service
        .update_category(
            created.external_id,
            UpdateCategoryRequest {
                name: created.name.clone(),
                added_stores: Vec::new(),
                edited_stores: vec![
                    EditStoreRequest {
                        id: store_a,
                        name: "A".to_string(),
                    },
                    EditStoreRequest {
                        id: store_b,
                        name: "X".to_string(),
                    },
                ],
                deleted_stores: Vec::new(),
            },
        )
        .await
        .expect_err("Swap should collide on the first edit");
    assert!(matches!(err, AppError::Conflict(_)));
    let unchanged = service
        .get_category(created.external_id)
        .await
        .expect("Failed to reload category");
    assert_eq!(sorted_names(&unchanged.stores), vec!["A", "X"]);
}

#[tokio::test]
async fn test_concurrent_creates_commit_exactly_one() {
    let pool = common::setup_test_db().await;
    let first = CategoryService::new(pool.clone());
    let second = CategoryService::new(pool.clone());
    let name = common::unique_name("X");

    let (a, b) = tokio::join!(
        first.create_category(create_category_request(&name, &[])),
        second.create_category(create_category_request(&name, &[])),
    );

    let outcomes = [a, b];
    let committed = outcomes.iter().filter(|r| r.is_ok()).count();
    let conflicts = outcomes
        .iter()
        .filter(|r| matches!(r, Err(AppError::Conflict(_))))
        .count();
    assert_eq!(committed, 1);
    assert_eq!(conflicts, 1);

    assert_eq!(common::count_categories_named(&pool, &name).await, 1);
}

#[tokio::test]
async fn test_delete_category_cascade_is_opt_in() {
    let pool = common::setup_test_db().await;
    let service = CategoryService::new(pool.clone());
    let store_repo = StoreRepository::new(pool.clone());

    let kept = service
        .create_category(create_category_request(&common::unique_name("Keep"), &["Stays"]))
        .await
        .expect("Failed to create category");
    service
        .delete_category(kept.external_id, false)
        .await
        .expect("Failed to delete category");
    assert_eq!(
        store_repo
            .get_by_category_id(None, kept.id)
            .await
            .expect("Failed to list stores")
            .len(),
        1
    );

    let cascaded = service
        .create_category(create_category_request(
            &common::unique_name("Cascade"),
            &["Goes", "Also goes"],
        ))
        .await
        .expect("Failed to create category");
    service
        .delete_category(cascaded.external_id, true)
        .await
        .expect("Failed to delete category");
    assert!(store_repo
        .get_by_category_id(None, cascaded.id)
        .await
        .expect("Failed to list stores")
        .is_empty());

    let err = service
        .delete_category(cascaded.external_id, true)
        .await
        .expect_err("Second delete should report not found");
    assert!(matches!(err, AppError::NotFound(_)));
    let (is_deleted, _) =
        common::deletion_state(&pool, "categories", cascaded.external_id).await;
    assert!(is_deleted);
}

#[tokio::test]
async fn test_store_service_operations() {
    let pool = common::setup_test_db().await;
    let categories = CategoryService::new(pool.clone());
    let service = StoreService::new(pool.clone());

    let category = categories
        .create_category(create_category_request(&common::unique_name("Books"), &[]))
        .await
        .expect("Failed to create category");

    let store = service
        .create_store(CreateStoreRequest {
            category_id: category.external_id,
            name: "Library".to_string(),
        })
        .await
        .expect("Failed to create store");
    let other = service
        .create_store(CreateStoreRequest {
            category_id: category.external_id,
            name: "Bookshop".to_string(),
        })
        .await
        .expect("Failed to create store");

    let err = service
        .create_store(CreateStoreRequest {
            category_id: category.external_id,
            name: "Library".to_string(),
        })
        .await
        .expect_err("Duplicate store should conflict");
    assert!(matches!(err, AppError::Conflict(_)));

    let err = service
        .create_store(CreateStoreRequest {
            category_id: Uuid::new_v4(),
            name: "Nowhere".to_string(),
        })
        .await
        .expect_err("Unknown category should not be found");
    assert!(matches!(err, AppError::NotFound(_)));

    let err = service
        .update_store(
            other.external_id,
            UpdateStoreRequest {
                name: "Library".to_string(),
            },
        )
        .await
        .expect_err("Taken name should conflict");
    assert!(matches!(err, AppError::Conflict(_)));

    let renamed = service
        .update_store(
            store.external_id,
            UpdateStoreRequest {
                name: "City Library".to_string(),
            },
        )
        .await
        .expect("Failed to rename store");
    assert_eq!(renamed.name, "City Library");
    assert_eq!(
        service
            .get_store(store.external_id)
            .await
            .expect("Failed to get store")
            .name,
        "City Library"
    );

    let listed = service
        .list_stores_for_category(category.external_id)
        .await
        .expect("Failed to list stores");
    assert_eq!(listed.len(), 2);
    assert!(service
        .list_stores()
        .await
        .expect("Failed to list stores")
        .iter()
        .any(|s| s.external_id == other.external_id));

    service
        .delete_store(other.external_id)
        .await
        .expect("Failed to delete store");
    let err = service
        .delete_store(other.external_id)
        .await
        .expect_err("Second delete should report not found");
    assert!(matches!(err, AppError::NotFound(_)));
    let err = service
        .get_store(other.external_id)
        .await
        .expect_err("Deleted store should not be found");
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_spending_lifecycle() {
    let pool = common::setup_test_db().await;
    let categories = CategoryService::new(pool.clone());
    let service = SpendingService::new(pool.clone());

    let category = categories
        .create_category(create_category_request(&common::unique_name("Dining"), &[]))
        .await
        .expect("Failed to create category");

    let record = service
        .create_spending(CreateSpendingRequest {
            amount: dec!(42.10),
            remark: " Dinner ".to_string(),
            spending_date: Utc::now() - Duration::hours(3),
            category_id: category.external_id,
        })
        .await
        .expect("Failed to create spending");
    assert_eq!(record.remark, "Dinner");
    assert_eq!(
        record.category.as_ref().map(|c| c.external_id),
        Some(category.external_id)
    );

    let fetched = service
        .get_spending(record.external_id)
        .await
        .expect("Failed to get spending");
    assert_eq!(fetched.amount, dec!(42.10));
    assert_eq!(fetched.spending_date, record.spending_date);
    assert_eq!(fetched.created_at, record.created_at);
    assert_eq!(
        fetched.category.as_ref().map(|c| c.name.clone()),
        Some(category.name.clone())
    );

    let listed = service.list_spending().await.expect("Failed to list spending");
    let entry = listed
        .iter()
        .find(|r| r.external_id == record.external_id)
        .expect("Record missing from list");
    assert!(entry.category.is_some());

    let err = service
        .create_spending(CreateSpendingRequest {
            amount: dec!(-1),
            remark: String::new(),
            spending_date: Utc::now(),
            category_id: category.external_id,
        })
        .await
        .expect_err("Negative amount should be rejected");
    assert!(matches!(err, AppError::InvalidInput(_)));

    for (amount, reason) in [
        (dec!(12.345), "Sub-cent amount should be rejected"),
        (dec!(100000000000), "Amount beyond the column range should be rejected"),
    ] {
        let err = service
            .create_spending(CreateSpendingRequest {
                amount,
                remark: String::new(),
                spending_date: Utc::now(),
                category_id: category.external_id,
            })
            .await
            .expect_err(reason);
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(err.status_code(), http::StatusCode::BAD_REQUEST);
    }

    service
        .delete_spending(record.external_id)
        .await
        .expect("Failed to delete spending");
    let err = service
        .delete_spending(record.external_id)
        .await
        .expect_err("Second delete should report not found");
    assert!(matches!(err, AppError::NotFound(_)));
    let (is_deleted, deleted_at) =
        common::deletion_state(&pool, "spending_records", record.external_id).await;
    assert!(is_deleted);
    assert!(deleted_at.is_some());
}

#[tokio::test]
async fn test_receipt_lifecycle_and_conversion() {
    let pool = common::setup_test_db().await;
    let categories = CategoryService::new(pool.clone());
    let receipts = ReceiptService::new(pool.clone());
    let spending = SpendingService::new(pool.clone());

    let receipt_date = Utc::now() - Duration::days(1);
    let imported = receipts
        .import_extracted(ExtractedReceipt {
            store_name: "Corner Market".to_string(),
            date: receipt_date,
            items: vec![
                CreateReceiptItemRequest {
                    name: "Apples".to_string(),
                    price: dec!(3.20),
                },
                CreateReceiptItemRequest {
                    name: "Cheese".to_string(),
                    price: dec!(6.80),
                },
            ],
        })
        .await
        .expect("Failed to import receipt");
    assert_eq!(imported.total, dec!(10.00));
    assert_eq!(imported.items.len(), 2);
    assert_eq!(imported.items[0].name, "Apples");

    let manual = receipts
        .create_receipt(CreateReceiptRequest {
            store_name: "Bakery".to_string(),
            date: Utc::now(),
            total: Some(dec!(0.00)),
            items: Vec::new(),
        })
        .await
        .expect("Failed to create receipt");
    assert!(manual.items.is_empty());

    let err = receipts
        .create_receipt(CreateReceiptRequest {
            store_name: "Wholesale".to_string(),
            date: Utc::now(),
            total: None,
            items: vec![
                CreateReceiptItemRequest {
                    name: "Pallet".to_string(),
                    price: dec!(9999999999.99),
                },
                CreateReceiptItemRequest {
                    name: "Pallet 2".to_string(),
                    price: dec!(1.00),
                },
            ],
        })
        .await
        .expect_err("Summed total beyond the column range should be rejected");
    assert!(matches!(err, AppError::InvalidInput(_)));

    let fetched = receipts
        .get_receipt(imported.external_id)
        .await
        .expect("Failed to get receipt");
    assert_eq!(fetched.items.len(), 2);
    assert_eq!(fetched.items_total(), fetched.total);

    let listed = receipts.list_receipts().await.expect("Failed to list receipts");
    let listed_manual = listed
        .iter()
        .find(|r| r.external_id == manual.external_id)
        .expect("Manual receipt missing");
    assert!(listed_manual.items.is_empty());

    let category = categories
        .create_category(create_category_request(&common::unique_name("Groceries"), &[]))
        .await
        .expect("Failed to create category");

    let record = spending
        .create_spending_from_receipt(CreateSpendingFromReceiptRequest {
            receipt_id: imported.external_id,
            category_id: category.external_id,
            remark: None,
        })
        .await
        .expect("Failed to convert receipt");
    assert_eq!(record.amount, dec!(10.00));
    assert_eq!(record.remark, "Corner Market");
    assert_eq!(record.spending_date, imported.date);

    let err = spending
        .create_spending_from_receipt(CreateSpendingFromReceiptRequest {
            receipt_id: manual.external_id,
            category_id: category.external_id,
            remark: Some("Free bread".to_string()),
        })
        .await
        .expect_err("Zero total cannot become a spending record");
    assert!(matches!(err, AppError::InvalidInput(_)));

    let err = spending
        .create_spending_from_receipt(CreateSpendingFromReceiptRequest {
            receipt_id: imported.external_id,
            category_id: Uuid::new_v4(),
            remark: None,
        })
        .await
        .expect_err("Unknown category should be rejected");
    assert!(matches!(err, AppError::InvalidReference(_)));

    receipts
        .delete_receipt_item(fetched.items[0].external_id)
        .await
        .expect("Failed to delete item");
    assert_eq!(
        receipts
            .get_receipt(imported.external_id)
            .await
            .expect("Failed to get receipt")
            .items
            .len(),
        1
    );

    receipts
        .delete_receipt(imported.external_id)
        .await
        .expect("Failed to delete receipt");
    let err = receipts
        .delete_receipt(imported.external_id)
        .await
        .expect_err("Second delete should report not found");
    assert!(matches!(err, AppError::NotFound(_)));
    let err = receipts
        .get_receipt(imported.external_id)
        .await
        .expect_err("Deleted receipt should not be found");
    assert!(matches!(err, AppError::NotFound(_)));
    let (item_deleted, _) =
        common::deletion_state(&pool, "receipt_items", fetched.items[1].external_id).await;
    assert!(item_deleted);
}

#[tokio::test]
async fn test_delete_receipt_losing_a_race_keeps_items() {
    let pool = common::setup_test_db().await;
    let receipts = ReceiptService::new(pool.clone());
    let receipt_repo =
        ReceiptRepository::new(pool.clone(), ReceiptItemRepository::new(pool.clone()));

    let receipt = receipts
        .create_receipt(CreateReceiptRequest {
            store_name: "Corner Market".to_string(),
            date: Utc::now(),
            total: None,
            items: vec![CreateReceiptItemRequest {
                name: "Tea".to_string(),
                price: dec!(4.00),
            }],
        })
        .await
        .expect("Failed to create receipt");
    let item_id = receipt.items[0].external_id;

    // Another writer deletes the receipt and holds the row lock
    let mut rival = pool.begin().await.expect("Failed to begin");
    assert!(receipt_repo
        .delete(Some(&mut *rival), receipt.external_id)
        .await
        .expect("Failed to delete receipt"));

    let (result, _) = tokio::join!(receipts.delete_receipt(receipt.external_id), async move {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        rival.commit().await.expect("Failed to commit");
    });

    let err = result.expect_err("Losing delete should report not found");
    assert!(matches!(err, AppError::NotFound(_)));
    let (item_deleted, deleted_at) = common::deletion_state(&pool, "receipt_items", item_id).await;
    assert!(!item_deleted);
    assert!(deleted_at.is_none());
}
