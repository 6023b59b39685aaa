mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{names, tour, TestApp};

/// Tours named "Query Test Tour NN" with the given prices, inserted in order
async fn seed(app: &TestApp, prices: &[f64]) -> Result<()> {
    let admin = app.admin().await?;
    for (i, price) in prices.iter().enumerate() {
        let mut body = tour(&format!("Query Test Tour {:02}", i), *price);
        body["duration"] = json!(i % 4 + 3);
        body["difficulty"] = json!(["easy", "medium", "difficult"][i % 3]);
        app.create_tour(&admin, body).await?;
    }
    Ok(())
}

fn prices(body: &Value) -> Vec<f64> {
    body["data"]["tours"]
        .as_array()
        .map(|docs| docs.iter().filter_map(|d| d["price"].as_f64()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn gte_returns_exactly_the_matching_subset() -> Result<()> {
    let app = TestApp::new();
    let all = [497.0, 397.0, 997.0, 1497.0, 297.0, 997.5, 1997.0];
    seed(&app, &all).await?;

    let res = app.get("/api/v1/tours?price[gte]=997&limit=50", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    let mut got = prices(&res.body);
    got.sort_by(|a, b| a.total_cmp(b));
    let mut expected: Vec<f64> = all.iter().copied().filter(|p| *p >= 997.0).collect();
    expected.sort_by(|a, b| a.total_cmp(b));
    assert_eq!(got, expected);
    assert_eq!(res.body["results"], expected.len());

    // Percent-encoded brackets behave the same
    let res = app.get("/api/v1/tours?price%5Blt%5D=400", None).await?;
    assert_eq!(res.body["results"], 2);

    let res = app.get("/api/v1/tours?price[gte]=400&price[lte]=1000", None).await?;
    assert_eq!(res.body["results"], 3);
    Ok(())
}

#[tokio::test]
async fn descending_sort_breaks_ties_by_insertion() -> Result<()> {
    let app = TestApp::new();
    seed(&app, &[500.0, 700.0, 500.0, 900.0, 700.0, 500.0]).await?;

    let res = app.get("/api/v1/tours?sort=-price", None).await?;
    let got = prices(&res.body);
    assert!(got.windows(2).all(|w| w[0] >= w[1]), "not non-increasing: {:?}", got);
    assert_eq!(
        names(&res.body, "tours"),
        vec![
            "Query Test Tour 03",
            "Query Test Tour 01",
            "Query Test Tour 04",
            "Query Test Tour 00",
            "Query Test Tour 02",
            "Query Test Tour 05",
        ]
    );

    // Secondary key applies within equal prices
    let res = app.get("/api/v1/tours?sort=price,-duration&fields=name,price,duration", None).await?;
    let docs = res.body["data"]["tours"].as_array().cloned().unwrap_or_default();
    for pair in docs.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if a["price"] == b["price"] {
            assert!(a["duration"].as_i64() >= b["duration"].as_i64());
        }
    }
    Ok(())
}

#[tokio::test]
async fn default_sort_is_newest_first() -> Result<()> {
    let app = TestApp::new();
    seed(&app, &[100.0, 200.0, 300.0]).await?;

    let res = app.get("/api/v1/tours", None).await?;
    assert_eq!(
        names(&res.body, "tours"),
        vec!["Query Test Tour 02", "Query Test Tour 01", "Query Test Tour 00"]
    );
    Ok(())
}

#[tokio::test]
async fn second_page_holds_documents_eleven_to_twenty() -> Result<()> {
    let app = TestApp::new();
    let all: Vec<f64> = (1..=25).map(|i| i as f64 * 10.0).collect();
    seed(&app, &all).await?;

    let res = app.get("/api/v1/tours?sort=price&page=2&limit=10", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(prices(&res.body), all[10..20].to_vec());

    let res = app.get("/api/v1/tours?sort=price&page=3&limit=10", None).await?;
    assert_eq!(prices(&res.body), all[20..25].to_vec());

    let res = app.get("/api/v1/tours?page=4&limit=10", None).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["message"], "This page does not exist");

    // Page 1 of an empty match is simply empty
    let res = app.get("/api/v1/tours?price[gt]=100000&page=1", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["results"], 0);
    Ok(())
}

#[tokio::test]
async fn limit_defaults_to_one_hundred() -> Result<()> {
    let app = TestApp::new();
    let all: Vec<f64> = (1..=105).map(|i| i as f64).collect();
    seed(&app, &all).await?;

    let res = app.get("/api/v1/tours", None).await?;
    assert_eq!(res.body["results"], 100);
    let res = app.get("/api/v1/tours?limit=0", None).await?;
    assert_eq!(res.body["results"], 100);
    let res = app.get("/api/v1/tours?limit=200", None).await?;
    assert_eq!(res.body["results"], 105);
    Ok(())
}

#[tokio::test]
async fn field_projection() -> Result<()> {
    let app = TestApp::new();
    seed(&app, &[100.0]).await?;

    let res = app.get("/api/v1/tours?fields=name,price", None).await?;
    let doc = &res.body["data"]["tours"][0];
    let mut keys: Vec<&str> = doc.as_object().map(|o| o.keys().map(String::as_str).collect()).unwrap_or_default();
    keys.sort();
    assert_eq!(keys, vec!["id", "name", "price"]);

    let res = app.get("/api/v1/tours?fields=-summary,-description", None).await?;
    let doc = &res.body["data"]["tours"][0];
    assert!(doc.get("summary").is_none());
    assert!(doc.get("description").is_none());
    assert!(doc.get("name").is_some());

    // Internal fields cannot be selected
    let res = app.get("/api/v1/tours?fields=name,createdAt,secretTour", None).await?;
    let doc = &res.body["data"]["tours"][0];
    assert!(doc.get("createdAt").is_none());
    assert!(doc.get("secretTour").is_none());
    Ok(())
}

#[tokio::test]
async fn repeated_keys_follow_the_allow_list() -> Result<()> {
    let app = TestApp::new();
    seed(&app, &[100.0, 200.0, 300.0, 400.0, 500.0, 600.0]).await?;

    // duration is allow-listed: repeats widen into a set
    let res = app.get("/api/v1/tours?duration=3&duration=4", None).await?;
    assert_eq!(res.body["results"], 4);

    // name is not: the last value wins
    let res = app
        .get("/api/v1/tours?name=Query%20Test%20Tour%2000&name=Query%20Test%20Tour%2001", None)
        .await?;
    assert_eq!(names(&res.body, "tours"), vec!["Query Test Tour 01"]);
    Ok(())
}

#[tokio::test]
async fn unusable_filters_are_ignored() -> Result<()> {
    let app = TestApp::new();
    seed(&app, &[100.0, 200.0]).await?;

    for query in [
        "color=red",
        "price[regex]=1.*",
        "price=cheap",
        "price[gte=100",
        "difficulty[gt]=easy&difficulty=",
    ] {
        let res = app.get(&format!("/api/v1/tours?{}", query), None).await?;
        assert_eq!(res.status, StatusCode::OK, "{}", query);
    }

    let res = app.get("/api/v1/tours?color=red&price[regex]=1.*", None).await?;
    assert_eq!(res.body["results"], 2);
    Ok(())
}
