use axum::response::IntoResponse;

pub async fn root_handler() -> impl IntoResponse {
    let version = env!("CARGO_PKG_VERSION");
    format!(
        r#"Welcome to the Invoice Signing API
Version: {version}

Available endpoints:
  - POST   /invoices                 - Create a draft invoice
  - GET    /invoices/{{id}}            - Fetch an invoice by ID
  - POST   /invoices/{{id}}/cancel     - Cancel a draft invoice
  - POST   /invoices/{{id}}/sign       - Verify an assertion and sign the invoice
  - GET    /invoices/{{id}}/artifact   - Download the signed artifact
  - POST   /signing/challenge        - Issue a single-use signing challenge
  - GET    /health                   - Light health check
  - GET    /health?mode=full         - Full health check (includes Redis)
  - GET    /metrics                  - Prometheus metrics

Invoices are signed with a WebAuthn-style challenge/response credential;
once signed they are immutable and their artifact is reproducible byte
for byte.
"#
    )
}
