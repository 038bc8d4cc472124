//! Success envelope.
//!
//! ```json
//! { "success": true, "data": [...], "pagination": { "page": 1, "perPage": 20, "total": 42, "totalPages": 3 } }
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use bookon_core::Page;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pagination: Option<Pagination>,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Envelope {
            success: true,
            data,
            pagination: None,
            status: StatusCode::OK,
        }
    }

    pub fn created(data: T) -> Self {
        Envelope {
            status: StatusCode::CREATED,
            ..Self::ok(data)
        }
    }
}

impl<T: Serialize> Envelope<Vec<T>> {
    pub fn page(page: Page<T>) -> Self {
        let pagination = Pagination {
            page: page.request.page,
            per_page: page.request.per_page,
            total: page.total,
            total_pages: page.total_pages(),
        };
        Envelope {
            success: true,
            data: page.items,
            pagination: Some(pagination),
            status: StatusCode::OK,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (self.status, Json(&self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookon_core::PageRequest;

    #[test]
    fn test_ok_envelope_has_no_pagination() {
        let json = serde_json::to_value(Envelope::ok(serde_json::json!({ "id": "b-1" }))).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["id"], "b-1");
        assert!(json.get("pagination").is_none());
    }

    #[test]
    fn test_page_envelope() {
        let page = Page {
            items: vec![1, 2],
            total: 5,
            request: PageRequest::new(Some(2), Some(2)),
        };
        let json = serde_json::to_value(Envelope::page(page)).unwrap();
        assert_eq!(json["data"].as_array().unwrap().len(), 2);
        assert_eq!(json["pagination"]["perPage"], 2);
        assert_eq!(json["pagination"]["totalPages"], 3);
    }
}
