/*!
 * Integration tests for the Ollama provider against a local canned server
 */

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use subflow::errors::{ProviderError, TranslationErrorKind};
use subflow::providers::ollama::OllamaTranslator;
use subflow::providers::{TranslationRequest, Translator};

/// Serve one canned HTTP response per connection, returning the request bodies
async fn serve(responses: Vec<(u16, String)>) -> (String, tokio::task::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let mut bodies = Vec::new();
        for (status, body) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            bodies.push(read_request_body(&mut socket).await);

            let reply = format!(
                "HTTP/1.1 {} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }
        bodies
    });

    (format!("http://{}", address), handle)
}

async fn read_request_body(socket: &mut tokio::net::TcpStream) -> String {
    let mut data = Vec::new();
    let mut buffer = [0u8; 4096];

    loop {
        let read = socket.read(&mut buffer).await.unwrap();
        if read == 0 {
            break;
        }
        data.extend_from_slice(&buffer[..read]);

        let text = String::from_utf8_lossy(&data).to_string();
        if let Some(split) = text.find("\r\n\r\n") {
            let length = text[..split]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse::<usize>().ok())?
                })
                .unwrap_or(0);
            let body = &data[split + 4..];
            if body.len() >= length {
                return String::from_utf8_lossy(body).to_string();
            }
        }
    }

    String::new()
}

fn translator(endpoint: &str) -> OllamaTranslator {
    OllamaTranslator::new(
        endpoint,
        "llama3",
        "Translate from {source} to {target}. Reply with the translation only.",
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn test_ollamaTranslate_withSuccessResponse_shouldReturnTrimmedText() {
    let (endpoint, server) = serve(vec![(
        200,
        r#"{"model":"llama3","response":"  Bonjour tout le monde \n","done":true}"#.to_string(),
    )])
    .await;

    let result = translator(&endpoint)
        .translate(&TranslationRequest::new("Hello everyone", "en", "fr"))
        .await
        .unwrap();

    assert_eq!(result, "Bonjour tout le monde");

    let bodies = server.await.unwrap();
    let sent: serde_json::Value = serde_json::from_str(&bodies[0]).unwrap();
    assert_eq!(sent["model"], "llama3");
    assert_eq!(sent["prompt"], "Hello everyone");
    assert_eq!(sent["stream"], false);
    assert_eq!(
        sent["system"],
        "Translate from English to French. Reply with the translation only."
    );
}

#[tokio::test]
async fn test_ollamaTranslate_withServerError_shouldBeServiceUnavailable() {
    let (endpoint, _server) = serve(vec![(503, r#"{"error":"loading model"}"#.to_string())]).await;

    let error = translator(&endpoint)
        .translate(&TranslationRequest::new("Hello", "en", "fr"))
        .await
        .unwrap_err();

    assert!(matches!(error, ProviderError::ApiError { status_code: 503, .. }));
    assert_eq!(error.kind(), TranslationErrorKind::ServiceUnavailable);
}

#[tokio::test]
async fn test_ollamaTranslate_withRateLimit_shouldBeRateLimited() {
    let (endpoint, _server) = serve(vec![(429, r#"{"error":"busy"}"#.to_string())]).await;

    let error = translator(&endpoint)
        .translate(&TranslationRequest::new("Hello", "en", "fr"))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), TranslationErrorKind::RateLimited);
}

#[tokio::test]
async fn test_ollamaTranslate_withGarbageBody_shouldBeParseError() {
    let (endpoint, _server) = serve(vec![(200, "not json".to_string())]).await;

    let error = translator(&endpoint)
        .translate(&TranslationRequest::new("Hello", "en", "fr"))
        .await
        .unwrap_err();

    assert!(matches!(error, ProviderError::ParseError(_)));
}

#[tokio::test]
async fn test_ollamaTranslate_withNothingListening_shouldBeTransient() {
    // Bind then drop to get a port with no listener
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let error = translator(&format!("http://{}", address))
        .translate(&TranslationRequest::new("Hello", "en", "fr"))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), TranslationErrorKind::Transient);
}
