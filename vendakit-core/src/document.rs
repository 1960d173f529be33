//! Retrieval of generated sale documents.

use std::sync::Arc;

use crate::api::ApiClient;
use crate::error::{Error, Result};
use crate::time::{SystemTimeSource, TimeSource};

/// Host-side persistence for downloaded documents.
#[cfg_attr(feature = "ffi", uniffi::export(with_foreign))]
pub trait DocumentSink: Send + Sync {
    /// Writes the document bytes under the given file name.
    ///
    /// # Errors
    ///
    /// Implementations return [`Error::Storage`] when the bytes cannot be
    /// persisted.
    fn save(&self, file_name: String, bytes: Vec<u8>) -> Result<()>;
}

/// File name a sale document is saved under.
#[must_use]
pub fn document_file_name(venda_id: i64, unix_secs: u64) -> String {
    format!("venda_{venda_id}_{unix_secs}.pdf")
}

/// Downloads the promissory document for a sale and hands it to the sink.
/// Returns the file name the document was saved under.
///
/// # Errors
///
/// Returns [`Error::NotAuthenticated`] without an active session,
/// [`Error::Api`] or [`Error::Network`] when the download fails, and
/// whatever the sink reports when it rejects the bytes.
#[cfg_attr(feature = "ffi", uniffi::export(async_runtime = "tokio"))]
pub async fn download_sale_document(
    api: Arc<ApiClient>,
    sink: Arc<dyn DocumentSink>,
    venda_id: i64,
) -> Result<String> {
    download_with_time(&api, sink.as_ref(), venda_id, &SystemTimeSource).await
}

pub(crate) async fn download_with_time(
    api: &ApiClient,
    sink: &dyn DocumentSink,
    venda_id: i64,
    time: &dyn TimeSource,
) -> Result<String> {
    let bytes = api.fetch_sale_document(venda_id).await?;
    let file_name = document_file_name(venda_id, time.now_secs());
    tracing::debug!(venda_id, file_name = %file_name, "saving sale document");
    sink.save(file_name.clone(), bytes)?;
    Ok(file_name)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::session::SessionManager;
    use crate::test_support::{in_memory_session, sample_seller, ManualTimeSource};

    async fn authed_session() -> Arc<SessionManager> {
        let session = in_memory_session().await;
        session
            .sign_in("token-123".to_string(), sample_seller())
            .await
            .unwrap();
        session
    }

    #[derive(Default)]
    struct CapturingSink {
        saved: Mutex<Option<(String, Vec<u8>)>>,
    }

    impl DocumentSink for CapturingSink {
        fn save(&self, file_name: String, bytes: Vec<u8>) -> Result<()> {
            *self.saved.lock().unwrap() = Some((file_name, bytes));
            Ok(())
        }
    }

    #[test]
    fn file_name_embeds_sale_id_and_timestamp() {
        assert_eq!(document_file_name(55, 1_700_000_000), "venda_55_1700000000.pdf");
    }

    #[tokio::test]
    async fn download_saves_the_body_under_the_generated_name() {
        let mut server = mockito::Server::new_async().await;
        let session = authed_session().await;
        let mock = server
            .mock("GET", "/vendas/55/pdf")
            .match_header("authorization", "Bearer token-123")
            .with_status(200)
            .with_body(b"%PDF-1.4 stub")
            .create_async()
            .await;

        let api = ApiClient::with_base_url(server.url(), session);
        let sink = CapturingSink::default();
        let time = ManualTimeSource::new(1_700_000_000);
        let file_name = download_with_time(&api, &sink, 55, &time).await.unwrap();

        mock.assert_async().await;
        assert_eq!(file_name, "venda_55_1700000000.pdf");
        let saved = sink.saved.lock().unwrap().clone().unwrap();
        assert_eq!(saved.0, file_name);
        assert_eq!(saved.1, b"%PDF-1.4 stub");
    }

    #[tokio::test]
    async fn download_propagates_backend_errors() {
        let mut server = mockito::Server::new_async().await;
        let session = authed_session().await;
        server
            .mock("GET", "/vendas/55/pdf")
            .with_status(404)
            .with_body(r#"{"sucesso":false,"mensagem":"Venda não encontrada"}"#)
            .create_async()
            .await;

        let api = ApiClient::with_base_url(server.url(), session);
        let sink = CapturingSink::default();
        let time = ManualTimeSource::new(0);
        let err = download_with_time(&api, &sink, 55, &time).await.unwrap_err();

        assert!(matches!(err, Error::Api { status: 404, .. }));
        assert!(sink.saved.lock().unwrap().is_none());
    }
}
