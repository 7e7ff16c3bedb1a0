//! Top-level orchestration of the search → select → deliver flow.
//!
//! The [`Pipeline`] owns the process-scoped state objects (session
//! store, user gate, progress ledger) and wires the search
//! orchestrator, transfer engine, delivery engine, and post-delivery
//! lifecycle together. Handlers mirror the transport's callback
//! surface: a search command, a pagination callback, and a selection
//! callback that runs one full delivery cycle under the per-user gate.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::delivery::{
    ChatId, DeliveryEngine, MessageHandle, MessageSink, Transport, TransportError,
    archive_delivery, schedule_auto_delete,
};
use crate::gate::{UserGate, UserId};
use crate::search::{CatalogRecord, SearchOrchestrator};
use crate::session::{
    CallbackAction, SessionError, SessionStore, parse_callback, result_keyboard,
};
use crate::store::TitleStore;
use crate::transfer::{ProgressLedger, ProgressReporter, TransferEngine, TransferError};

/// Sanitized title prefix length used in local file names.
const FILENAME_TITLE_CHARS: usize = 50;

/// Failures inside one delivery cycle, caught at the selection handler.
#[derive(Debug, Error)]
enum CycleError {
    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Identifies the requesting user and the chat to deliver into.
#[derive(Debug, Clone, Copy)]
pub struct RequestCtx {
    /// The originating user; delivery cycles are serialized per user.
    pub user_id: UserId,
    /// The chat replies and documents go to.
    pub chat_id: ChatId,
}

/// The assembled delivery pipeline.
///
/// Created once at process start; all contained state objects are
/// process-scoped with entries created on demand.
pub struct Pipeline {
    transport: Arc<dyn Transport>,
    orchestrator: SearchOrchestrator,
    sessions: SessionStore,
    gate: UserGate,
    ledger: ProgressLedger,
    transfer: TransferEngine,
    delivery: DeliveryEngine,
    store: Arc<dyn TitleStore>,
    settings: Settings,
    download_dir: PathBuf,
}

impl Pipeline {
    /// Assembles a pipeline from its collaborators and settings.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Client`] if the transfer engine's HTTP
    /// client cannot be built.
    pub fn new(
        transport: Arc<dyn Transport>,
        orchestrator: SearchOrchestrator,
        store: Arc<dyn TitleStore>,
        settings: Settings,
        download_dir: impl Into<PathBuf>,
    ) -> Result<Self, TransferError> {
        let transfer = TransferEngine::new(settings.transfer.clone())?;
        Ok(Self {
            transport,
            orchestrator,
            sessions: SessionStore::new(settings.session_ttl),
            gate: UserGate::new(),
            ledger: ProgressLedger::new(),
            transfer,
            delivery: DeliveryEngine::new(settings.upload_rate_limit_retries),
            store,
            settings,
            download_dir: download_dir.into(),
        })
    }

    /// The session store, exposed for sweeps and tests.
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Handles the search command. `text` is the full command text; the
    /// query is everything after the command token.
    ///
    /// # Errors
    ///
    /// Returns a transport error only when the initial reply cannot be
    /// sent; later failures are reported to the user instead.
    #[instrument(skip(self, ctx, text), fields(user = ctx.user_id))]
    pub async fn handle_search(&self, ctx: &RequestCtx, text: &str) -> Result<(), TransportError> {
        let Some(query) = text
            .split_once(' ')
            .map(|(_, rest)| rest.trim())
            .filter(|q| !q.is_empty())
        else {
            self.transport
                .reply(
                    ctx.chat_id,
                    "Please provide a search query. Example: /search The Great Gatsby",
                    None,
                )
                .await?;
            return Ok(());
        };

        let progress = self
            .transport
            .reply(ctx.chat_id, "Searching the catalog...", None)
            .await?;

        let records = self.orchestrator.search(query).await;
        if records.is_empty() {
            self.edit_best_effort(&progress, "No results found for your query.")
                .await;
            return Ok(());
        }

        let total = records.len();
        let key = self.sessions.create(query, records);
        info!(total, key = %key, "search session created");

        match self.sessions.page(&key, 1) {
            Ok(view) => {
                let keyboard = result_keyboard(&view, &key);
                let header = format!("Found {total} results for \"{query}\":");
                if let Err(edit_error) = self
                    .transport
                    .edit(&progress, &header, Some(keyboard))
                    .await
                {
                    warn!(error = %edit_error, "failed to render search results");
                }
            }
            Err(page_error) => {
                // A freshly created non-empty session always has page 1.
                error!(error = %page_error, "first page render failed");
            }
        }
        Ok(())
    }

    /// Dispatches a callback token to the pagination or selection
    /// handler. Unknown or inert tokens are acknowledged silently.
    ///
    /// # Errors
    ///
    /// Propagates transport errors from the sub-handlers' unavoidable
    /// initial sends.
    #[instrument(skip(self, ctx, message, data), fields(user = ctx.user_id, data))]
    pub async fn handle_callback(
        &self,
        ctx: &RequestCtx,
        message: &MessageHandle,
        data: &str,
    ) -> Result<(), TransportError> {
        match parse_callback(data) {
            Some(CallbackAction::Page { key, page }) => {
                self.handle_page(ctx, message, &key, page).await
            }
            Some(CallbackAction::Download { key, index }) => {
                self.handle_selection(ctx, &key, index).await
            }
            None => {
                debug!("ignoring inert or foreign callback token");
                Ok(())
            }
        }
    }

    /// Re-renders the results message for a different page.
    async fn handle_page(
        &self,
        _ctx: &RequestCtx,
        message: &MessageHandle,
        key: &str,
        page: usize,
    ) -> Result<(), TransportError> {
        match self.sessions.page(key, page) {
            Ok(view) => {
                let keyboard = result_keyboard(&view, key);
                let header = format!("Found {} results for \"{}\":", view.total, view.query);
                if let Err(edit_error) = self
                    .transport
                    .edit(message, &header, Some(keyboard))
                    .await
                {
                    warn!(error = %edit_error, "pagination edit failed");
                }
                Ok(())
            }
            Err(SessionError::Expired) => {
                self.transport.ack("Search session expired!").await
            }
            Err(_) => self.transport.ack("Invalid page!").await,
        }
    }

    /// Runs one full delivery cycle for a selected result, serialized
    /// per user by the gate and with guaranteed local cleanup.
    async fn handle_selection(
        &self,
        ctx: &RequestCtx,
        key: &str,
        index: usize,
    ) -> Result<(), TransportError> {
        let _guard = self.gate.acquire(ctx.user_id).await;

        // Read the record by value before the transfer begins, so a
        // session expiring mid-transfer cannot be observed later.
        let record = match self.sessions.select(key, index) {
            Ok(record) => record,
            Err(SessionError::Expired) => {
                return self.transport.ack("Session expired! Please search again").await;
            }
            Err(_) => return self.transport.ack("Invalid selection!").await,
        };

        self.transport.ack("Starting download...").await?;
        let progress = self
            .transport
            .reply(ctx.chat_id, "Downloading file... (0%)", None)
            .await?;

        let local_path = self.local_path_for(&record);
        if let Some(parent) = local_path.parent() {
            if let Err(io_error) = tokio::fs::create_dir_all(parent).await {
                error!(error = %io_error, "failed to create download directory");
                self.edit_best_effort(&progress, "Download failed: local storage unavailable")
                    .await;
                return Ok(());
            }
        }

        let outcome = self
            .run_cycle(ctx, &record, &local_path, &progress)
            .await;

        match outcome {
            Ok(()) => {}
            Err(CycleError::Transfer(TransferError::TooLarge { .. })) => {
                // The direct-link fallback message was already rendered.
                debug!("selection exceeded size cap; direct link offered");
            }
            Err(cycle_error) => {
                error!(error = %cycle_error, "delivery cycle failed");
                self.edit_best_effort(&progress, &format!("Download failed: {cycle_error}"))
                    .await;
            }
        }

        // Guaranteed cleanup, success or failure.
        if let Err(remove_error) = tokio::fs::remove_file(&local_path).await {
            if remove_error.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %remove_error, path = %local_path.display(), "temp file cleanup failed");
            }
        }
        self.ledger.clear(ctx.user_id);
        Ok(())
    }

    /// The fallible middle of a delivery cycle: fetch, deliver,
    /// lifecycle. Cleanup stays with the caller.
    async fn run_cycle(
        &self,
        ctx: &RequestCtx,
        record: &CatalogRecord,
        local_path: &Path,
        progress: &MessageHandle,
    ) -> Result<(), CycleError> {
        let mut sink = MessageSink::new(self.transport.as_ref(), progress.clone());
        let mut reporter = ProgressReporter::download(ctx.user_id, self.ledger.clone());
        self.transfer
            .fetch(&record.mirror_url, local_path, &mut sink, &mut reporter)
            .await?;

        self.edit_best_effort(progress, "Uploading...").await;
        let mut upload_sink = MessageSink::new(self.transport.as_ref(), progress.clone());
        let mut upload_reporter = ProgressReporter::upload(ctx.user_id, self.ledger.clone());
        let delivered = self
            .delivery
            .deliver(
                self.transport.as_ref(),
                ctx.chat_id,
                local_path,
                record,
                &mut upload_sink,
                &mut upload_reporter,
            )
            .await?;

        schedule_auto_delete(
            Arc::clone(&self.transport),
            ctx.chat_id,
            delivered,
            self.settings.auto_delete_delay,
        )
        .await;

        archive_delivery(
            self.transport.as_ref(),
            self.store.as_ref(),
            &self.settings.lifecycle(),
            local_path,
            record,
            ctx.user_id,
        )
        .await;

        if let Err(delete_error) = self.transport.delete(progress).await {
            warn!(error = %delete_error, "failed to remove progress message");
        }
        Ok(())
    }

    /// Derives the request-exclusive local path: sanitized title prefix
    /// plus a short unique suffix and the record's extension.
    fn local_path_for(&self, record: &CatalogRecord) -> PathBuf {
        let clean: String = record
            .title
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .take(FILENAME_TITLE_CHARS)
            .collect();
        let suffix = Uuid::new_v4().simple().to_string();
        self.download_dir
            .join(format!("{clean}-{}.{}", &suffix[..8], record.extension))
    }

    async fn edit_best_effort(&self, message: &MessageHandle, text: &str) {
        if let Err(error) = self.transport.edit(message, text, None).await {
            if !matches!(error, TransportError::NotModified) {
                warn!(error = %error, "message edit failed");
            }
        }
    }
}
