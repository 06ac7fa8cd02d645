pub mod auth;
pub mod charges;
pub mod comments;
pub mod common;
pub mod consoles;
pub mod documents;
pub mod lookups;
pub mod parties;
pub mod shipments;
pub mod staff_users;

use crate::{
    db::DbPool,
    services::{
        charges::ChargeService,
        clock::Clock,
        comments::CommentService,
        consoles::ConsoleService,
        export::ExportService,
        import::ImportService,
        invoice::InvoiceService,
        lookups::LookupService,
        manifest::ManifestService,
        notifications::{LoginNotifier, SmsGateway},
        parties::PartyService,
        reference::ReferenceAllocator,
        shipments::ShipmentService,
        staff_users::StaffUserService,
    },
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub staff_users: Arc<StaffUserService>,
    pub parties: Arc<PartyService>,
    pub lookups: Arc<LookupService>,
    pub consoles: Arc<ConsoleService>,
    pub shipments: Arc<ShipmentService>,
    pub charges: Arc<ChargeService>,
    pub comments: Arc<CommentService>,
    pub manifests: Arc<ManifestService>,
    pub invoices: Arc<InvoiceService>,
    pub imports: Arc<ImportService>,
    pub exports: Arc<ExportService>,
    pub login_notifier: Arc<LoginNotifier>,
}

impl AppServices {
    /// Wires every service over one pool and clock.
    ///
    /// Shipment creation and CSV import share a single reference allocator
    /// so their sequences never collide.
    pub fn new(
        db_pool: Arc<DbPool>,
        clock: Arc<dyn Clock>,
        sms_gateway: Arc<dyn SmsGateway>,
        manager_phone: Option<String>,
    ) -> Self {
        let allocator = Arc::new(ReferenceAllocator::new());

        Self {
            staff_users: Arc::new(StaffUserService::new(db_pool.clone())),
            parties: Arc::new(PartyService::new(db_pool.clone())),
            lookups: Arc::new(LookupService::new(db_pool.clone())),
            consoles: Arc::new(ConsoleService::new(db_pool.clone())),
            shipments: Arc::new(ShipmentService::new(
                db_pool.clone(),
                clock.clone(),
                allocator.clone(),
            )),
            charges: Arc::new(ChargeService::new(db_pool.clone())),
            comments: Arc::new(CommentService::new(db_pool.clone())),
            manifests: Arc::new(ManifestService::new(db_pool.clone())),
            invoices: Arc::new(InvoiceService::new(db_pool.clone(), clock.clone())),
            imports: Arc::new(ImportService::new(
                db_pool.clone(),
                clock.clone(),
                allocator,
            )),
            exports: Arc::new(ExportService::new(db_pool.clone(), clock.clone())),
            login_notifier: Arc::new(LoginNotifier::new(
                db_pool,
                clock,
                sms_gateway,
                manager_phone,
            )),
        }
    }
}
