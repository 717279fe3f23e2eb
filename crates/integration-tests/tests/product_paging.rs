//! Integration tests for product list paging arguments.

use std::sync::Arc;

use cif_connector::resolvers::ResolverModule;
use cif_integration_tests::{MockGateway, data, run};
use serde_json::json;

fn catalog() -> MockGateway {
    MockGateway::new().on("Products", data(json!({"products": {"total": 0, "results": []}})))
}

#[tokio::test]
async fn test_page_becomes_limit_and_offset() {
    let gateway = Arc::new(catalog());

    let response = run(
        &gateway,
        ResolverModule::Category,
        "{ products(pageSize: 10, currentPage: 3) { total_count page_info { current_page } } }",
    )
    .await;

    assert!(response.get("errors").is_none(), "{response}");
    assert_eq!(
        response["data"]["products"],
        json!({"total_count": 0, "page_info": {"current_page": 3}})
    );
    let call = &gateway.calls()[0];
    assert_eq!(call.variables["limit"], 10);
    assert_eq!(call.variables["offset"], 20);
}

#[tokio::test]
async fn test_oversized_page_is_clamped() {
    let gateway = Arc::new(catalog());

    let response = run(
        &gateway,
        ResolverModule::Category,
        "{ products(pageSize: 9223372036854775807, currentPage: 4) { total_count } }",
    )
    .await;

    assert!(response.get("errors").is_none(), "{response}");
    assert_eq!(response["data"]["products"]["total_count"], 0);
    let call = &gateway.calls()[0];
    assert_eq!(call.variables["limit"], 2_147_483_647_u64);
    assert_eq!(call.variables["offset"], 3 * 2_147_483_647_u64);
}
