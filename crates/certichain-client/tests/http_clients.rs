//! HTTP-level tests for the collaborator clients against wiremock servers.

use std::time::Duration;

use certichain_client::{
    Attachment, ContentStore, ContentStoreConfig, EvmLedger, HttpMailer, HttpSignatureVerifier,
    Ledger, LedgerConfig, Mailer, MailerConfig, OutgoingMail, PinataStore, RetryPolicy,
    SignatureVerifier, TxStatus, VerifierConfig,
};
use certichain_core::{CertificateId, LedgerAddress, TxHash};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zeroize::Zeroizing;

const ISSUER: &str = "0x00000000000000000000000000000000000000aa";
const CONTRACT: &str = "0x00000000000000000000000000000000000000cc";

fn word(value: usize) -> String {
    format!("{value:064x}")
}

fn padded_string(s: &str) -> String {
    let mut out = word(s.len());
    let mut data = hex::encode(s.as_bytes());
    while data.len() % 64 != 0 {
        data.push('0');
    }
    out.push_str(&data);
    out
}

/// ABI encoding of `(string digest, bool revoked, address issuer)`.
fn credential_return(digest: &str, revoked: bool, issuer: &str) -> String {
    format!(
        "0x{}{}{:0>64}{}",
        word(3 * 32),
        word(usize::from(revoked)),
        issuer.trim_start_matches("0x"),
        padded_string(digest)
    )
}

fn quick_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_millis(5),
    }
}

fn ledger_for(server: &MockServer) -> EvmLedger {
    EvmLedger::new(LedgerConfig {
        rpc_url: Url::parse(&server.uri()).unwrap(),
        contract_address: LedgerAddress::parse(CONTRACT).unwrap(),
        timeout_secs: 5,
    })
    .unwrap()
}

#[tokio::test]
async fn ledger_decodes_credential_record() {
    let server = MockServer::start().await;
    let digest = "0x37ce6d36e66b5e3529532ec4ae427fee6bb30419d934a098bf33954429654cbf";
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_call"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": credential_return(digest, true, ISSUER)
        })))
        .mount(&server)
        .await;

    let record = ledger_for(&server)
        .credential(&CertificateId::parse("CERT-1").unwrap())
        .await
        .unwrap();
    assert_eq!(record.digest, digest);
    assert!(record.revoked);
    assert_eq!(record.issuer, LedgerAddress::parse(ISSUER).unwrap());
    assert!(record.exists());
}

#[tokio::test]
async fn ledger_retries_unavailable_node() {
    let server = MockServer::start().await;
    let digest = "0x37ce6d36e66b5e3529532ec4ae427fee6bb30419d934a098bf33954429654cbf";
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_call"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": credential_return(digest, false, ISSUER)
        })))
        .expect(1)
        .mount(&server)
        .await;

    let record = ledger_for(&server)
        .with_retry(quick_retry())
        .credential(&CertificateId::parse("CERT-1").unwrap())
        .await
        .unwrap();
    assert_eq!(record.digest, digest);
}

#[tokio::test]
async fn ledger_surfaces_rpc_error_member() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32000, "message": "execution reverted"}
        })))
        .mount(&server)
        .await;

    let err = ledger_for(&server)
        .credential(&CertificateId::parse("CERT-1").unwrap())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("execution reverted"));
}

#[tokio::test]
async fn ledger_rejects_empty_return_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": "0x"})),
        )
        .mount(&server)
        .await;

    let err = ledger_for(&server)
        .whitelist_entry("Analytical University")
        .await
        .unwrap_err();
    assert!(matches!(err, certichain_client::ClientError::Abi(_)));
}

#[tokio::test]
async fn ledger_reads_receipt_status() {
    let server = MockServer::start().await;
    let tx = TxHash::parse(&format!("0x{}", "ab".repeat(32))).unwrap();
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_getTransactionReceipt"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"status": "0x1", "blockNumber": "0x10"}
        })))
        .mount(&server)
        .await;

    let status = ledger_for(&server).transaction_status(&tx).await.unwrap();
    assert_eq!(status, TxStatus::Succeeded);
}

#[tokio::test]
async fn ledger_reports_pending_for_missing_receipt() {
    let server = MockServer::start().await;
    let tx = TxHash::parse(&format!("0x{}", "cd".repeat(32))).unwrap();
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": null})),
        )
        .mount(&server)
        .await;

    let status = ledger_for(&server).transaction_status(&tx).await.unwrap();
    assert_eq!(status, TxStatus::Pending);
}

fn content_store_for(server: &MockServer, jwt: Option<&str>) -> PinataStore {
    let base = Url::parse(&server.uri()).unwrap();
    PinataStore::new(ContentStoreConfig {
        pin_url: base.clone(),
        gateway_url: base,
        api_jwt: jwt.map(|j| Zeroizing::new(j.to_string())),
        timeout_secs: 1,
    })
    .unwrap()
}

#[tokio::test]
async fn content_store_pins_with_bearer_jwt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pinning/pinFileToIPFS"))
        .and(header("authorization", "Bearer pinata-jwt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "IpfsHash": "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi",
            "PinSize": 8,
            "Timestamp": "2024-06-01T00:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cid = content_store_for(&server, Some("pinata-jwt"))
        .put("diploma.pdf", b"%PDF-1.7".to_vec())
        .await
        .unwrap();
    assert_eq!(cid, "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi");
}

#[tokio::test]
async fn content_store_put_requires_jwt() {
    let server = MockServer::start().await;
    let err = content_store_for(&server, None)
        .put("diploma.pdf", b"%PDF".to_vec())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("PINATA_JWT"));
}

#[tokio::test]
async fn content_store_fetches_from_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ipfs/bafkdocument"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7 body".to_vec()))
        .mount(&server)
        .await;

    let bytes = content_store_for(&server, None)
        .get("bafkdocument")
        .await
        .unwrap();
    assert_eq!(bytes, b"%PDF-1.7 body");
}

#[tokio::test]
async fn content_store_reports_missing_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = content_store_for(&server, None).get("bafkgone").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn content_store_retries_gateway_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ipfs/bafkflaky"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7 late".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let bytes = content_store_for(&server, None)
        .with_retry(quick_retry())
        .get("bafkflaky")
        .await
        .unwrap();
    assert_eq!(bytes, b"%PDF-1.7 late");
}

#[tokio::test]
async fn content_store_gives_up_after_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = content_store_for(&server, None)
        .with_retry(quick_retry())
        .get("bafkdown")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        certichain_client::ClientError::Api { status: 503, .. }
    ));
}

#[tokio::test]
async fn content_store_pin_is_attempted_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pinning/pinFileToIPFS"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = content_store_for(&server, Some("pinata-jwt"))
        .with_retry(quick_retry())
        .put("diploma.pdf", b"%PDF-1.7".to_vec())
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn content_store_times_out_slow_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let err = content_store_for(&server, None).get("bafkslow").await.unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn content_store_rejects_path_like_locator_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = content_store_for(&server, None)
        .get("../pinning")
        .await
        .unwrap_err();
    assert!(matches!(err, certichain_client::ClientError::InvalidRequest(_)));
}

fn verifier_for(server: &MockServer) -> HttpSignatureVerifier {
    HttpSignatureVerifier::new(VerifierConfig {
        url: Url::parse(&server.uri()).unwrap(),
        timeout_secs: 5,
    })
    .unwrap()
}

#[tokio::test]
async fn verifier_parses_valid_report() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verify-pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "valid": true,
            "message": "Verification succeeded",
            "signer": "CN=Registrar",
            "timestamp": "2024-06-01T10:00:00Z"
        })))
        .mount(&server)
        .await;

    let report = verifier_for(&server)
        .verify(b"%PDF".to_vec(), "-----BEGIN PUBLIC KEY-----")
        .await
        .unwrap();
    assert!(report.valid);
    assert_eq!(report.signer.as_deref(), Some("CN=Registrar"));
}

#[tokio::test]
async fn verifier_reports_invalid_signature_as_value() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verify-pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "valid": false,
            "message": "Verification failed",
            "error_details": {"reason": "no signature"}
        })))
        .mount(&server)
        .await;

    let report = verifier_for(&server)
        .verify(b"%PDF".to_vec(), "KEY")
        .await
        .unwrap();
    assert!(!report.valid);
    assert!(report.signer.is_none());
}

#[tokio::test]
async fn verifier_retries_throttled_check_with_same_document() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/verify-pdf"))
        .and(body_string_contains("%PDF-1.7 retried"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "valid": true,
            "signer": "CN=Registrar"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let report = verifier_for(&server)
        .with_retry(quick_retry())
        .verify(b"%PDF-1.7 retried".to_vec(), "KEY")
        .await
        .unwrap();
    assert!(report.valid);
}

#[tokio::test]
async fn verifier_server_error_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let err = verifier_for(&server)
        .verify(b"%PDF".to_vec(), "KEY")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        certichain_client::ClientError::Api { status: 500, .. }
    ));
}

#[tokio::test]
async fn mailer_posts_base64_attachment_with_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .and(header("authorization", "Bearer relay-token"))
        .and(body_partial_json(json!({
            "from": "CertiChain <no-reply@certichain.local>",
            "to": "ada@example.org",
            "subject": "Your Digital Certificate Has Been Issued!",
            "attachments": [{
                "filename": "CERT-1.json",
                "contentType": "application/json",
                "content": "e30="
            }]
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let mailer = HttpMailer::new(MailerConfig {
        relay_url: Some(Url::parse(&format!("{}/send", server.uri())).unwrap()),
        relay_token: Some(Zeroizing::new("relay-token".to_string())),
        from: "CertiChain <no-reply@certichain.local>".into(),
        timeout_secs: 5,
    })
    .unwrap();

    mailer
        .send(&OutgoingMail {
            to: "ada@example.org".into(),
            subject: "Your Digital Certificate Has Been Issued!".into(),
            html: "<p>issued</p>".into(),
            attachments: vec![Attachment {
                filename: "CERT-1.json".into(),
                content_type: "application/json".into(),
                content: b"{}".to_vec(),
            }],
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn mailer_requires_relay_url() {
    let err = HttpMailer::new(MailerConfig {
        relay_url: None,
        relay_token: None,
        from: "x@y.z".into(),
        timeout_secs: 5,
    })
    .unwrap_err();
    assert!(err.to_string().contains("MAIL_RELAY_URL"));
}
