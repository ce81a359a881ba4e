//! Sheet export fetching against a loopback HTTP server.

use std::net::SocketAddr;

use roster_sync::error::AppError;
use roster_sync::models::FetchConfig;
use roster_sync::services::{SheetClient, SheetSource};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve canned responses keyed by request path until the test ends.
async fn serve(routes: Vec<(&'static str, String)>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let routes = routes.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&request);
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

                let response = routes
                    .iter()
                    .find(|(route, _)| *route == path)
                    .map(|(_, response)| response.clone())
                    .unwrap_or_else(|| status_response(404, ""));
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

fn status_response(code: u16, body: &str) -> String {
    format!(
        "HTTP/1.1 {code} X\r\nContent-Type: text/csv\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

fn redirect(location: &str) -> String {
    format!(
        "HTTP/1.1 302 Found\r\nLocation: {location}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
    )
}

fn client(addr: SocketAddr, path: &str) -> SheetClient {
    SheetClient::new(format!("http://{addr}{path}"), &FetchConfig::default()).unwrap()
}

const CSV: &str = "Teacher,Student\r\nMs. Smith,John Doe\r\n";

#[tokio::test]
async fn follows_one_redirect() {
    let addr = serve(vec![
        ("/export", redirect("/signed/roster.csv")),
        ("/signed/roster.csv", status_response(200, CSV)),
    ])
    .await;

    let body = client(addr, "/export").fetch_csv().await.unwrap();
    assert_eq!(body, CSV);
}

#[tokio::test]
async fn direct_response_needs_no_redirect() {
    let addr = serve(vec![("/export", status_response(200, CSV))]).await;

    let body = client(addr, "/export").fetch_csv().await.unwrap();
    assert_eq!(body, CSV);
}

#[tokio::test]
async fn second_redirect_is_an_error() {
    let addr = serve(vec![
        ("/export", redirect("/hop")),
        ("/hop", redirect("/signed/roster.csv")),
        ("/signed/roster.csv", status_response(200, CSV)),
    ])
    .await;

    let err = client(addr, "/export").fetch_csv().await.unwrap_err();
    match err {
        AppError::Fetch { url, .. } => assert!(url.ends_with("/hop")),
        other => panic!("expected a fetch error, got {other:?}"),
    }
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let addr = serve(vec![("/export", status_response(500, "boom"))]).await;

    let err = client(addr, "/export").fetch_csv().await.unwrap_err();
    assert!(matches!(err, AppError::Fetch { .. }));
    assert!(err.is_pre_apply());
}

#[tokio::test]
async fn redirect_target_failure_is_an_error() {
    let addr = serve(vec![("/export", redirect("/gone"))]).await;

    let err = client(addr, "/export").fetch_csv().await.unwrap_err();
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn unreachable_host_is_a_fetch_error() {
    // Bind then drop to get a port nothing listens on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let err = client(addr, "/export").fetch_csv().await.unwrap_err();
    assert!(matches!(err, AppError::Fetch { .. }));
}
