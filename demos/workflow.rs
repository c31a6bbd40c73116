#![allow(warnings)]

use assetverse::identity::CurrentUser;
use assetverse::records::{AssetKind, SubscriptionTier};
use assetverse::service::AssetService;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    let db = sled::open("assetverse-demo")?;

    if !db.is_empty() {
        db.clear()?;
    }

    let service = AssetService::new(Arc::new(db));

    let hr = CurrentUser::hr("people@acme.example");
    service.register_hr_account(&hr.email, "Acme Corp", None, SubscriptionTier::Basic)?;
    let laptop = service.register_asset(&hr, "ThinkPad X1", AssetKind::Returnable, 3, None)?;

    let worker = CurrentUser::employee("jo@acme.example");
    let request =
        service.create_request(&worker, &laptop.id, "Jo Doe", Some("onboarding kit".into()))?;
    println!("request {} is {:?}", request.id, request.status);

    let outcome = service.approve_request(&hr, &request.id)?;
    println!(
        "approved: asset has {} unit(s) left, affiliation {:?}, headcount {}",
        outcome.asset_available_after, outcome.affiliation, outcome.current_employees_after
    );

    let removal = service.remove_employee(&hr, &worker.email)?;
    println!(
        "removal returned {} assignment(s) across {} asset(s), headcount {}",
        removal.assignments_returned, removal.assets_restocked, removal.current_employees_after
    );

    let report = service.reconcile(&hr.email)?;
    println!("reconcile clean: {}", report.is_clean());

    Ok(())
}
