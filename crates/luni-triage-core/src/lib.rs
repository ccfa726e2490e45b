//! Luni Triage Core Library
//!
//! Conversation state machine for Luni, an AI symptom-triage assistant for
//! pet owners, with local persistence and a UniFFI surface for host apps.
//!
//! # Architecture
//!
//! ```text
//! Owner message ──► append user message ──► publish
//!                          │
//!            ┌─────────────┴─────────────┐
//!            ▼                           ▼
//!   criteria analysis             streamed reply
//!   (scoped thread)               (caller thread)
//!            │                           │
//!            └─────────────┬─────────────┘
//!                          ▼
//!         apply analysis, then apply reply
//!                          │
//!          ready marker or all criteria met?
//!                          │
//!                          ▼
//!             Health Report ──► case locked
//!                          │
//!                          ▼
//!           session snapshot ──► local storage
//! ```
//!
//! # Modules
//!
//! - [`models`]: Domain types (Case, Message, AnalysisState, Report, Region, Pet)
//! - [`triage`]: Session, case management, criteria analyzer and engine
//! - [`ai`]: The `TriageService` boundary and its LLM-backed implementation
//! - [`persistence`]: Session snapshots in quota-limited local storage
//! - [`db`]: SQLite layer (local storage, pets, favorites)
//! - [`export`]: Health Report export
//! - [`auth`], [`favorites`], [`roles`]: account-side state

pub mod ai;
pub mod auth;
pub mod config;
pub mod db;
pub mod export;
pub mod favorites;
pub mod logging;
pub mod models;
pub mod persistence;
pub mod roles;
pub mod triage;

// Re-export commonly used types
pub use ai::{AiError, LlmTriageService, TriageService};
pub use config::TriageConfig;
pub use db::Database;
pub use models::{AnalysisState, Case, Message, MessageKind, Pet, Region, Report, Severity};
pub use persistence::{PersistenceAdapter, SessionSnapshot};
pub use triage::{TriageEngine, TriageError, TriageEvent, TriageObserver, TriageSession};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{mpsc, Arc, Mutex};

use tracing::{debug, warn};

use favorites::Favorites;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum LuniTriageError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Case closed: {0}")]
    CaseClosed(String),

    #[error("AI unavailable: {0}")]
    AiUnavailable(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<db::DbError> for LuniTriageError {
    fn from(e: db::DbError) -> Self {
        LuniTriageError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for LuniTriageError {
    fn from(e: serde_json::Error) -> Self {
        LuniTriageError::SerializationError(e.to_string())
    }
}

impl From<TriageError> for LuniTriageError {
    fn from(e: TriageError) -> Self {
        match e {
            TriageError::CaseNotFound(_) | TriageError::NoReport(_) => {
                LuniTriageError::NotFound(e.to_string())
            }
            TriageError::CaseLocked(_)
            | TriageError::ServiceUnavailable(_)
            | TriageError::ReportAlreadyGenerated(_) => LuniTriageError::CaseClosed(e.to_string()),
            TriageError::EmptyMessage
            | TriageError::InvalidTitle(_)
            | TriageError::InvalidImage(_)
            | TriageError::ImageTooLarge { .. } => LuniTriageError::InvalidInput(e.to_string()),
            TriageError::Ai(ai) => LuniTriageError::AiUnavailable(ai.to_string()),
        }
    }
}

impl From<luni_triage_llm::LlmError> for LuniTriageError {
    fn from(e: luni_triage_llm::LlmError) -> Self {
        LuniTriageError::ConfigError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for LuniTriageError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        LuniTriageError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create the triage store at the given path.
///
/// `config_json` is a JSON `TriageConfig`; missing fields take defaults and
/// `LUNI_*` environment variables override it.
#[uniffi::export]
pub fn open_triage(
    db_path: String,
    config_json: Option<String>,
) -> Result<Arc<LuniTriageCore>, LuniTriageError> {
    let config = parse_config(config_json)?;
    let db = Database::open(&db_path)?;
    LuniTriageCore::build(db, config)
}

/// Create an in-memory store (for testing).
#[uniffi::export]
pub fn open_triage_in_memory(
    config_json: Option<String>,
) -> Result<Arc<LuniTriageCore>, LuniTriageError> {
    let config = parse_config(config_json)?;
    let db = Database::open_in_memory()?;
    LuniTriageCore::build(db, config)
}

/// Install the tracing subscriber. Safe to call more than once.
#[uniffi::export]
pub fn init_logging(filter: Option<String>) {
    let default = TriageConfig::from_env().log_filter;
    logging::init_tracing(filter.as_deref().unwrap_or(&default));
}

fn parse_config(config_json: Option<String>) -> Result<TriageConfig, LuniTriageError> {
    let config = match config_json {
        Some(json) => TriageConfig::from_json(&json)
            .map_err(|e| LuniTriageError::ConfigError(e.to_string()))?,
        None => TriageConfig::default(),
    };
    Ok(config.with_env_overrides())
}

#[cfg(feature = "http")]
fn default_service(config: &TriageConfig) -> Result<Option<Arc<dyn TriageService>>, LuniTriageError> {
    let client = config.build_http_client()?;
    Ok(Some(Arc::new(LlmTriageService::new(client))))
}

#[cfg(not(feature = "http"))]
fn default_service(_config: &TriageConfig) -> Result<Option<Arc<dyn TriageService>>, LuniTriageError> {
    Ok(None)
}

// =========================================================================
// Host Callbacks
// =========================================================================

/// Receives streaming and state-change events.
#[uniffi::export(callback_interface)]
pub trait TriageListener: Send + Sync {
    fn on_event(&self, event: FfiTriageEvent);
}

type SharedListener = Arc<Mutex<Option<Arc<dyn TriageListener>>>>;

/// Queues engine events for the dispatch thread.
struct ForeignObserver {
    events: Mutex<mpsc::Sender<TriageEvent>>,
}

impl TriageObserver for ForeignObserver {
    fn on_event(&self, event: &TriageEvent) {
        if let Ok(events) = self.events.lock() {
            // Fails only once the dispatch thread is gone
            let _ = events.send(event.clone());
        }
    }
}

/// Deliver queued events to the host listener, in order, on a thread of
/// their own. No core lock is held while the listener runs, so it may call
/// back into the core. The thread exits when the core is dropped.
fn spawn_dispatcher(listener: SharedListener) -> mpsc::Sender<TriageEvent> {
    let (tx, rx) = mpsc::channel::<TriageEvent>();
    let spawned = std::thread::Builder::new()
        .name("luni-triage-events".into())
        .spawn(move || {
            for event in rx {
                let current = match listener.lock() {
                    Ok(guard) => guard.clone(),
                    Err(_) => break,
                };
                if let Some(host) = current {
                    host.on_event(event.into());
                }
            }
            debug!("Event dispatch stopped");
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Failed to start event dispatch thread");
    }
    tx
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe triage wrapper for FFI.
#[derive(uniffi::Object)]
pub struct LuniTriageCore {
    db: Arc<Mutex<Database>>,
    session: Arc<Mutex<TriageSession>>,
    engine: Option<TriageEngine>,
    listener: SharedListener,
    config: TriageConfig,
}

impl LuniTriageCore {
    fn build(db: Database, config: TriageConfig) -> Result<Arc<Self>, LuniTriageError> {
        let service = default_service(&config)?;
        Ok(Self::assemble(db, config, service))
    }

    /// Build with a custom AI service.
    pub fn with_service(
        db: Database,
        config: TriageConfig,
        service: Arc<dyn TriageService>,
    ) -> Arc<Self> {
        Self::assemble(db, config, Some(service))
    }

    fn assemble(
        db: Database,
        config: TriageConfig,
        service: Option<Arc<dyn TriageService>>,
    ) -> Arc<Self> {
        let db = db.with_storage_quota(config.storage_quota_bytes);
        let session = TriageSession::load_or_default(
            &PersistenceAdapter::new(&db, &config),
            Region::default(),
        );
        debug!(cases = session.cases().len(), "Session loaded");

        let listener: SharedListener = Arc::new(Mutex::new(None));
        let engine = service.map(|service| {
            TriageEngine::new(service, &config).with_observer(Arc::new(ForeignObserver {
                events: Mutex::new(spawn_dispatcher(Arc::clone(&listener))),
            }))
        });

        Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
            session: Arc::new(Mutex::new(session)),
            engine,
            listener,
            config,
        })
    }

    fn engine(&self) -> Result<&TriageEngine, LuniTriageError> {
        self.engine.as_ref().ok_or_else(|| {
            LuniTriageError::AiUnavailable("no AI service configured".into())
        })
    }

    /// Save the session. Storage failures are logged by the adapter.
    fn persist(&self, session: &TriageSession) -> Result<bool, LuniTriageError> {
        let db = self.db.lock()?;
        let adapter = PersistenceAdapter::new(&db, &self.config);
        let outcome = session.persist(&adapter);
        debug!(?outcome, "Session persisted");
        Ok(outcome.is_saved())
    }

    fn medical_context(&self, pet_id: Option<&str>) -> Result<Option<String>, LuniTriageError> {
        let Some(pet_id) = pet_id else {
            return Ok(None);
        };
        let db = self.db.lock()?;
        let pet = db
            .get_pet(pet_id)?
            .ok_or_else(|| LuniTriageError::NotFound(format!("pet {}", pet_id)))?;
        Ok(Some(pet.medical_context()))
    }
}

#[uniffi::export]
impl LuniTriageCore {
    // =========================================================================
    // Listener
    // =========================================================================

    /// Events arrive in order on a background thread, shortly after the
    /// state they describe has been applied.
    pub fn set_listener(&self, listener: Box<dyn TriageListener>) -> Result<(), LuniTriageError> {
        *self.listener.lock()? = Some(Arc::from(listener));
        Ok(())
    }

    pub fn clear_listener(&self) -> Result<(), LuniTriageError> {
        *self.listener.lock()? = None;
        Ok(())
    }

    // =========================================================================
    // Case Operations
    // =========================================================================

    /// Start a new case with its greeting.
    pub fn start_new_chat(&self) -> Result<FfiCase, LuniTriageError> {
        let mut session = self.session.lock()?;
        let id = session.start_new_chat();
        self.persist(&session)?;
        let case = session
            .case(&id)
            .ok_or_else(|| LuniTriageError::NotFound(id.clone()))?;
        Ok(case.into())
    }

    pub fn select_chat(&self, case_id: String) -> Result<(), LuniTriageError> {
        let mut session = self.session.lock()?;
        session.select_chat(&case_id)?;
        self.persist(&session)?;
        Ok(())
    }

    pub fn rename_chat(&self, case_id: String, title: String) -> Result<(), LuniTriageError> {
        let mut session = self.session.lock()?;
        session.rename_chat(&case_id, &title)?;
        self.persist(&session)?;
        Ok(())
    }

    /// First step of deleting a case; pass the result to `confirm_delete`.
    pub fn request_delete(&self, case_id: String) -> Result<FfiPendingDelete, LuniTriageError> {
        let session = self.session.lock()?;
        let pending = session.request_delete(&case_id)?;
        Ok(FfiPendingDelete {
            case_id: pending.case_id,
            title: pending.title,
        })
    }

    pub fn confirm_delete(&self, pending: FfiPendingDelete) -> Result<(), LuniTriageError> {
        let mut session = self.session.lock()?;
        session.confirm_delete(triage::PendingDelete {
            case_id: pending.case_id,
            title: pending.title,
        })?;
        self.persist(&session)?;
        Ok(())
    }

    pub fn list_chats(&self) -> Result<Vec<FfiCaseSummary>, LuniTriageError> {
        let session = self.session.lock()?;
        Ok(session.cases().iter().map(FfiCaseSummary::from).collect())
    }

    pub fn get_chat(&self, case_id: String) -> Result<Option<FfiCase>, LuniTriageError> {
        let session = self.session.lock()?;
        Ok(session.case(&case_id).map(FfiCase::from))
    }

    pub fn current_chat_id(&self) -> Result<Option<String>, LuniTriageError> {
        let session = self.session.lock()?;
        Ok(session.current_case_id().map(String::from))
    }

    /// Progress of the active case.
    pub fn current_analysis(&self) -> Result<FfiAnalysis, LuniTriageError> {
        let session = self.session.lock()?;
        Ok(session.current_analysis().into())
    }

    // =========================================================================
    // Messaging
    // =========================================================================

    /// Send an owner message. Blocks until the reply (and any report) is done.
    pub fn send_message(
        &self,
        case_id: String,
        text: String,
        pet_id: Option<String>,
    ) -> Result<FfiTurnOutcome, LuniTriageError> {
        let engine = self.engine()?;
        let mut session = self.session.lock()?;
        let medical_context = self.medical_context(pet_id.as_deref())?;

        let outcome = engine.send_message(&mut session, &case_id, &text, medical_context.as_deref());
        // Persist even on error: the user message may already be appended
        self.persist(&session)?;
        Ok(outcome?.into())
    }

    /// Upload a photo (base64, optionally a data URL).
    pub fn send_image(
        &self,
        case_id: String,
        base64_data: String,
        filename: String,
    ) -> Result<FfiTurnOutcome, LuniTriageError> {
        let engine = self.engine()?;
        let mut session = self.session.lock()?;
        let outcome = engine.send_image(&mut session, &case_id, &base64_data, &filename);
        self.persist(&session)?;
        Ok(outcome?.into())
    }

    /// Generate the Health Report now.
    pub fn generate_report(
        &self,
        case_id: String,
        pet_id: Option<String>,
    ) -> Result<FfiReportOutcome, LuniTriageError> {
        let engine = self.engine()?;
        let mut session = self.session.lock()?;
        let medical_context = self.medical_context(pet_id.as_deref())?;
        let outcome = engine.generate_report(&mut session, &case_id, medical_context.as_deref())?;
        self.persist(&session)?;
        Ok(outcome.into())
    }

    // =========================================================================
    // Region & Session
    // =========================================================================

    /// Set the region for new cases ("AU" or "NZ").
    pub fn set_region(&self, code: String) -> Result<(), LuniTriageError> {
        let region: Region = code.parse().map_err(LuniTriageError::InvalidInput)?;
        let mut session = self.session.lock()?;
        session.set_region(region);
        self.persist(&session)?;
        Ok(())
    }

    pub fn region_info(&self, code: String) -> Result<FfiRegionInfo, LuniTriageError> {
        let region: Region = code.parse().map_err(LuniTriageError::InvalidInput)?;
        Ok(region.info().into())
    }

    /// Save the session now. Returns false if it could not be stored.
    pub fn save_session(&self) -> Result<bool, LuniTriageError> {
        let session = self.session.lock()?;
        self.persist(&session)
    }

    // =========================================================================
    // Pet Operations
    // =========================================================================

    pub fn add_pet(&self, pet: FfiPet) -> Result<FfiPet, LuniTriageError> {
        if pet.name.trim().is_empty() {
            return Err(LuniTriageError::InvalidInput("pet name is empty".into()));
        }
        let db = self.db.lock()?;
        let mut new_pet = Pet::new(pet.owner_id.clone(), pet.name.clone(), pet.species.clone());
        pet.apply_to(&mut new_pet);
        db.insert_pet(&new_pet)?;
        Ok(new_pet.into())
    }

    pub fn update_pet(&self, pet: FfiPet) -> Result<bool, LuniTriageError> {
        let db = self.db.lock()?;
        let Some(mut existing) = db.get_pet(&pet.local_id)? else {
            return Ok(false);
        };
        existing.name = pet.name.clone();
        existing.species = pet.species.clone();
        pet.apply_to(&mut existing);
        Ok(db.update_pet(&existing)?)
    }

    pub fn get_pet(&self, local_id: String) -> Result<Option<FfiPet>, LuniTriageError> {
        let db = self.db.lock()?;
        Ok(db.get_pet(&local_id)?.map(FfiPet::from))
    }

    pub fn list_pets(&self, owner_id: String) -> Result<Vec<FfiPet>, LuniTriageError> {
        let db = self.db.lock()?;
        Ok(db
            .list_pets_for_owner(&owner_id)?
            .into_iter()
            .map(FfiPet::from)
            .collect())
    }

    pub fn delete_pet(&self, local_id: String) -> Result<bool, LuniTriageError> {
        let db = self.db.lock()?;
        Ok(db.delete_pet(&local_id)?)
    }

    // =========================================================================
    // Favorites
    // =========================================================================

    /// Toggle a provider favorite. Returns the new state.
    pub fn toggle_favorite(
        &self,
        user_id: String,
        provider_id: String,
    ) -> Result<bool, LuniTriageError> {
        let db = self.db.lock()?;
        let mut favorites = Favorites::load(&*db, user_id)?;
        Ok(favorites.toggle(&provider_id)?)
    }

    pub fn list_favorites(&self, user_id: String) -> Result<Vec<String>, LuniTriageError> {
        let db = self.db.lock()?;
        Ok(Favorites::load(&*db, user_id)?.ids())
    }

    // =========================================================================
    // Export Operations
    // =========================================================================

    /// Export a case's Health Report as Markdown.
    pub fn export_report_markdown(&self, case_id: String) -> Result<String, LuniTriageError> {
        let session = self.session.lock()?;
        let exporter = export::ReportExporter::new(&session);
        Ok(exporter.export_case(&case_id)?.to_markdown())
    }

    /// Export all Health Reports as JSON.
    pub fn export_reports_json(&self) -> Result<String, LuniTriageError> {
        let session = self.session.lock()?;
        let exporter = export::ReportExporter::new(&session);
        Ok(exporter.export_all().to_json()?)
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe message.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMessage {
    pub id: String,
    /// "user", "ai", "image", "soap" or "system"
    pub kind: String,
    pub content: String,
    pub timestamp: String,
    pub image: Option<String>,
    pub filename: Option<String>,
    pub severity: Option<String>,
    pub streaming: bool,
    pub is_error: bool,
    pub image_omitted: bool,
}

impl From<&Message> for FfiMessage {
    fn from(message: &Message) -> Self {
        let kind = match message.kind {
            MessageKind::User => "user",
            MessageKind::Ai => "ai",
            MessageKind::Image => "image",
            MessageKind::Soap => "soap",
            MessageKind::System => "system",
        };
        Self {
            id: message.id.clone(),
            kind: kind.to_string(),
            content: message.content.clone(),
            timestamp: message.timestamp.clone(),
            image: message.image.clone(),
            filename: message.filename.clone(),
            severity: message.severity.map(|s| s.label().to_string()),
            streaming: message.streaming,
            is_error: message.is_error,
            image_omitted: message.image_omitted,
        }
    }
}

/// FFI-safe analysis state.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAnalysis {
    pub completed_criteria: u8,
    pub progress_percentage: u8,
    pub stage: String,
    pub emergency_detected: bool,
    /// Labels of tracked criteria not yet established
    pub missing: Vec<String>,
}

impl From<&AnalysisState> for FfiAnalysis {
    fn from(analysis: &AnalysisState) -> Self {
        Self {
            completed_criteria: analysis.completed_criteria,
            progress_percentage: analysis.progress_percentage,
            stage: analysis.stage.clone(),
            emergency_detected: analysis.emergency_detected,
            missing: analysis
                .missing()
                .into_iter()
                .map(|c| c.label().to_string())
                .collect(),
        }
    }
}

/// FFI-safe case.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCase {
    pub id: String,
    pub title: String,
    pub messages: Vec<FfiMessage>,
    pub locked: bool,
    pub accepts_input: bool,
    pub region: String,
    pub severity: String,
    pub analysis: FfiAnalysis,
    pub emergency_popup_shown: bool,
    pub report_id: Option<String>,
    pub created_at: String,
}

impl From<&Case> for FfiCase {
    fn from(case: &Case) -> Self {
        Self {
            id: case.id.clone(),
            title: case.title.clone(),
            messages: case.messages.iter().map(FfiMessage::from).collect(),
            locked: case.locked,
            accepts_input: case.accepts_input(),
            region: case.region.to_string(),
            severity: case.severity.label().to_string(),
            analysis: (&case.analysis).into(),
            emergency_popup_shown: case.emergency_popup_shown,
            report_id: case.health_report.as_ref().map(|r| r.id.clone()),
            created_at: case.created_at.clone(),
        }
    }
}

/// FFI-safe case list entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCaseSummary {
    pub id: String,
    pub title: String,
    pub locked: bool,
    pub severity: String,
    pub progress_percentage: u8,
    pub created_at: String,
}

impl From<&Case> for FfiCaseSummary {
    fn from(case: &Case) -> Self {
        Self {
            id: case.id.clone(),
            title: case.title.clone(),
            locked: case.locked,
            severity: case.severity.label().to_string(),
            progress_percentage: case.analysis.progress_percentage,
            created_at: case.created_at.clone(),
        }
    }
}

/// FFI-safe delete request.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPendingDelete {
    pub case_id: String,
    pub title: String,
}

/// FFI-safe report outcome.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiReportOutcome {
    pub generated: bool,
    pub message_id: String,
    pub report_id: Option<String>,
    /// User-facing failure text
    pub error: Option<String>,
}

impl From<triage::ReportOutcome> for FfiReportOutcome {
    fn from(outcome: triage::ReportOutcome) -> Self {
        match outcome {
            triage::ReportOutcome::Generated {
                report_id,
                message_id,
            } => Self {
                generated: true,
                message_id,
                report_id: Some(report_id),
                error: None,
            },
            triage::ReportOutcome::Failed { message_id, error } => Self {
                generated: false,
                message_id,
                report_id: None,
                error: Some(error.user_message().to_string()),
            },
        }
    }
}

/// FFI-safe turn outcome.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiTurnOutcome {
    pub user_message_id: String,
    pub reply_message_id: String,
    pub reply_error: Option<String>,
    pub analysis_error: Option<String>,
    pub emergency_raised: bool,
    pub report: Option<FfiReportOutcome>,
}

impl From<triage::TurnOutcome> for FfiTurnOutcome {
    fn from(outcome: triage::TurnOutcome) -> Self {
        Self {
            user_message_id: outcome.user_message_id,
            reply_message_id: outcome.reply_message_id,
            reply_error: outcome.reply_error.map(|e| e.user_message().to_string()),
            analysis_error: outcome.analysis_error.map(|e| e.user_message().to_string()),
            emergency_raised: outcome.emergency_raised,
            report: outcome.report.map(FfiReportOutcome::from),
        }
    }
}

/// FFI-safe region metadata with formatted prices.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRegionInfo {
    pub code: String,
    pub country: String,
    pub currency: String,
    pub authority_name: String,
    pub authority_short: String,
    pub health_report_price: String,
    pub video_consult_price: String,
    pub urgent_consult_price: String,
}

impl From<&models::RegionInfo> for FfiRegionInfo {
    fn from(info: &models::RegionInfo) -> Self {
        Self {
            code: info.code.to_string(),
            country: info.country.to_string(),
            currency: info.currency.to_string(),
            authority_name: info.authority_name.to_string(),
            authority_short: info.authority_short.to_string(),
            health_report_price: info.format_price(info.pricing.health_report),
            video_consult_price: info.format_price(info.pricing.video_consult),
            urgent_consult_price: info.format_price(info.pricing.urgent_consult),
        }
    }
}

/// FFI-safe pet profile.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPet {
    /// Ignored by `add_pet`
    pub local_id: String,
    pub server_id: Option<String>,
    pub owner_id: String,
    pub name: String,
    pub species: String,
    pub breed: Option<String>,
    pub weight_kg: Option<f64>,
    pub date_of_birth: Option<String>,
    pub conditions: Vec<String>,
    pub medications: Vec<String>,
    pub allergies: Vec<String>,
    pub notes: Option<String>,
}

impl FfiPet {
    fn apply_to(self, pet: &mut Pet) {
        pet.breed = self.breed;
        pet.weight_kg = self.weight_kg;
        pet.date_of_birth = self.date_of_birth;
        pet.conditions = self.conditions;
        pet.medications = self.medications;
        pet.allergies = self.allergies;
        pet.notes = self.notes;
    }
}

impl From<Pet> for FfiPet {
    fn from(pet: Pet) -> Self {
        Self {
            local_id: pet.local_id,
            server_id: pet.server_id,
            owner_id: pet.owner_id,
            name: pet.name,
            species: pet.species,
            breed: pet.breed,
            weight_kg: pet.weight_kg,
            date_of_birth: pet.date_of_birth,
            conditions: pet.conditions,
            medications: pet.medications,
            allergies: pet.allergies,
            notes: pet.notes,
        }
    }
}

/// FFI-safe triage event.
#[derive(Debug, Clone, uniffi::Enum)]
pub enum FfiTriageEvent {
    MessageAppended { case_id: String, message: FfiMessage },
    MessageUpdated { case_id: String, message_id: String, content: String },
    AnalysisUpdated { case_id: String, analysis: FfiAnalysis },
    EmergencyAlert { case_id: String },
    CaseLocked { case_id: String, report_id: String },
    InputClosed { case_id: String, reason: String },
}

impl From<TriageEvent> for FfiTriageEvent {
    fn from(event: TriageEvent) -> Self {
        match event {
            TriageEvent::MessageAppended { case_id, message } => FfiTriageEvent::MessageAppended {
                case_id,
                message: (&message).into(),
            },
            TriageEvent::MessageUpdated {
                case_id,
                message_id,
                content,
            } => FfiTriageEvent::MessageUpdated {
                case_id,
                message_id,
                content,
            },
            TriageEvent::AnalysisUpdated { case_id, analysis } => FfiTriageEvent::AnalysisUpdated {
                case_id,
                analysis: (&analysis).into(),
            },
            TriageEvent::EmergencyAlert { case_id } => FfiTriageEvent::EmergencyAlert { case_id },
            TriageEvent::CaseLocked { case_id, report_id } => {
                FfiTriageEvent::CaseLocked { case_id, report_id }
            }
            TriageEvent::InputClosed { case_id, reason } => {
                FfiTriageEvent::InputClosed { case_id, reason }
            }
        }
    }
}
