use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    archive::{Archive, ObjectArchive},
    config::AppConfig,
    crm::{BitrixClient, CrmLinker},
    db::PgPool,
    locks::UserLocks,
    onboarding::OnboardingMachine,
    storage::S3Storage,
    store::{PgStore, Store},
    sync::StageSyncGateway,
    telegram::{FileSource, Notifier, TelegramClient},
};

/// External collaborators the service is wired with.
pub struct Services {
    pub store: Arc<dyn Store>,
    pub crm: Arc<dyn CrmLinker>,
    pub archive: Arc<dyn Archive>,
    pub notifier: Arc<dyn Notifier>,
    pub files: Arc<dyn FileSource>,
}

impl Services {
    /// Production wiring: Postgres, the CRM REST webhook, S3 and the Bot API.
    pub async fn connect(config: &AppConfig, pool: PgPool) -> Result<Self> {
        let crm = BitrixClient::new(
            &config.crm_webhook_url,
            config.crm_category_id,
            config.crm_timeout,
        )
        .context("failed to build CRM client")?;
        let telegram = Arc::new(
            TelegramClient::new(
                &config.telegram_api_url,
                &config.telegram_bot_token,
                config.crm_timeout,
            )
            .context("failed to build chat client")?,
        );
        let storage = Arc::new(S3Storage::from_config(config).await);

        Ok(Self {
            store: Arc::new(PgStore::new(pool)),
            crm: Arc::new(crm),
            archive: Arc::new(ObjectArchive::new(storage)),
            notifier: telegram.clone(),
            files: telegram,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub notifier: Arc<dyn Notifier>,
    pub files: Arc<dyn FileSource>,
    pub machine: OnboardingMachine,
    pub gateway: StageSyncGateway,
}

impl AppState {
    pub fn new(config: AppConfig, services: Services) -> Self {
        let locks = UserLocks::new();
        let machine = OnboardingMachine::new(
            services.store.clone(),
            services.crm,
            services.archive,
            locks.clone(),
            &config.crm_interview_field,
            &config.archive_root,
        );
        let gateway =
            StageSyncGateway::new(services.store.clone(), services.notifier.clone(), locks);

        Self {
            config: Arc::new(config),
            store: services.store,
            notifier: services.notifier,
            files: services.files,
            machine,
            gateway,
        }
    }
}
