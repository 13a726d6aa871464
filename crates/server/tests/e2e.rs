use std::net::SocketAddr;
use std::path::PathBuf;

use configs::StorageConfig;
use models::DeletePolicy;
use reqwest::StatusCode as HttpStatusCode;
use serde_json::{json, Value};
use server::{startup, AppStores};
use tokio::net::TcpListener;
use uuid::Uuid;

struct TestApp {
    base_url: String,
    stores: AppStores,
    data_dir: PathBuf,
}

async fn start_server() -> anyhow::Result<TestApp> {
    // Use isolated data files per test run
    let data_dir = PathBuf::from(format!("target/test-data/{}", Uuid::new_v4()));
    let storage = StorageConfig {
        data_dir: data_dir.to_string_lossy().into_owned(),
        delete_policy: DeletePolicy::Restrict,
        ..StorageConfig::default()
    };
    let stores = AppStores::open(&storage).await?;
    let app = startup::app(&stores);

    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    let base_url = format!("http://{}:{}", addr.ip(), addr.port());

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await { eprintln!("server error: {}", e); }
    });

    Ok(TestApp { base_url, stores, data_dir })
}

impl TestApp {
    async fn shutdown(self) {
        self.stores.close().await;
        let _ = tokio::fs::remove_dir_all(&self.data_dir).await;
    }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().build().expect("reqwest client")
}

#[tokio::test]
async fn e2e_public_health() -> anyhow::Result<()> {
    let app = start_server().await?;
    let res = client().get(format!("{}/health", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["status"], "ok");
    app.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn e2e_cors_allows_any_origin() -> anyhow::Result<()> {
    let app = start_server().await?;
    let res = client()
        .get(format!("{}/drivers", app.base_url))
        .header("Origin", "http://example.com")
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert_eq!(
        res.headers().get("access-control-allow-origin").and_then(|v| v.to_str().ok()),
        Some("*")
    );
    app.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn e2e_concurrent_bus_creation_keeps_every_record() -> anyhow::Result<()> {
    const N: usize = 20;
    let app = start_server().await?;
    let c = client();

    let mut tasks = Vec::with_capacity(N);
    for i in 0..N {
        let c = c.clone();
        let url = format!("{}/buses", app.base_url);
        tasks.push(tokio::spawn(async move {
            c.post(url)
                .json(&json!({
                    "plate": format!("E2E{i:04}"),
                    "model": "Caio Apache",
                    "manufacture_year": 2021,
                    "capacity": 38
                }))
                .send()
                .await
        }));
    }
    for t in tasks {
        assert_eq!(t.await??.status(), HttpStatusCode::CREATED);
    }

    let buses = c.get(format!("{}/buses", app.base_url)).send().await?.json::<Vec<Value>>().await?;
    assert_eq!(buses.len(), N);
    let ids: std::collections::HashSet<_> = buses.iter().filter_map(|b| b["id"].as_str()).collect();
    assert_eq!(ids.len(), N);

    app.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn e2e_closed_stores_answer_500() -> anyhow::Result<()> {
    let app = start_server().await?;
    app.stores.close().await;
    let res = client().get(format!("{}/categories", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::INTERNAL_SERVER_ERROR);
    let body = res.json::<Value>().await?;
    assert_eq!(body["kind"], "storage_unavailable");
    app.shutdown().await;
    Ok(())
}
