mod common;

use assert_matches::assert_matches;
use common::{business_time, TestApp};
use forwarder_api::{
    entities::{LookupKind, PartyRole},
    errors::ServiceError,
    services::shipments::{ShipmentDraft, ShipmentFilter},
};
use futures::future::join_all;
use rust_decimal_macros::dec;
use std::collections::HashSet;

#[tokio::test]
async fn references_count_up_within_a_business_day() {
    let app = TestApp::new().await;
    let client = app.party(PartyRole::Customer, "Aria Trading").await;
    let service = &app.services().shipments;
    let ctx = service.context(None);

    let mut references = Vec::new();
    for _ in 0..3 {
        let saved = service
            .create(ShipmentDraft::new(client.id), None, &ctx)
            .await
            .expect("create shipment");
        references.push(saved.reference);
    }
    assert_eq!(references, ["240305001", "240305002", "240305003"]);

    app.clock.set(business_time(2024, 3, 6, 0, 5));
    let next_day = service
        .create(ShipmentDraft::new(client.id), None, &service.context(None))
        .await
        .unwrap();
    assert_eq!(next_day.reference, "240306001");
}

#[tokio::test]
async fn concurrent_creates_never_share_a_reference() {
    let app = TestApp::new().await;
    let client = app.party(PartyRole::Customer, "Aria Trading").await;

    let handles = (0..8).map(|_| {
        let service = app.services().shipments.clone();
        let client_id = client.id;
        tokio::spawn(async move {
            let ctx = service.context(None);
            service
                .create(ShipmentDraft::new(client_id), None, &ctx)
                .await
                .map(|s| s.reference)
        })
    });

    let mut seen = HashSet::new();
    for joined in join_all(handles).await {
        let reference = joined.unwrap().expect("create shipment");
        assert!(seen.insert(reference));
    }
    assert_eq!(seen.len(), 8);
    assert!(seen.contains("240305008"));
}

#[tokio::test]
async fn explicit_reference_must_be_unused() {
    let app = TestApp::new().await;
    let client = app.party(PartyRole::Customer, "Aria Trading").await;
    let service = &app.services().shipments;
    let ctx = service.context(None);

    let first = service
        .create(ShipmentDraft::new(client.id), Some("LEGACY-17".into()), &ctx)
        .await
        .unwrap();
    assert_eq!(first.reference, "LEGACY-17");

    let err = service
        .create(ShipmentDraft::new(client.id), Some("LEGACY-17".into()), &ctx)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
}

#[tokio::test]
async fn hand_entered_references_do_not_stall_the_sequence() {
    let app = TestApp::new().await;
    let client = app.party(PartyRole::Customer, "Aria Trading").await;
    let service = &app.services().shipments;
    let ctx = service.context(None);

    for explicit in ["240305X", "240305001", "240305ZZ"] {
        service
            .create(ShipmentDraft::new(client.id), Some(explicit.into()), &ctx)
            .await
            .unwrap();
    }

    let next = service
        .create(ShipmentDraft::new(client.id), None, &ctx)
        .await
        .expect("allocation skips non-numeric suffixes");
    assert_eq!(next.reference, "240305002");
}

#[tokio::test]
async fn sequence_continues_past_nine_hundred_ninety_nine() {
    let app = TestApp::new().await;
    let client = app.party(PartyRole::Customer, "Aria Trading").await;
    let service = &app.services().shipments;
    let ctx = service.context(None);

    service
        .create(ShipmentDraft::new(client.id), Some("240305999".into()), &ctx)
        .await
        .unwrap();

    let mut references = Vec::new();
    for _ in 0..2 {
        let saved = service
            .create(ShipmentDraft::new(client.id), None, &ctx)
            .await
            .unwrap();
        references.push(saved.reference);
    }
    assert_eq!(references, ["2403051000", "2403051001"]);
}

#[tokio::test]
async fn derived_fields_follow_every_save() {
    let app = TestApp::new().await;
    let operator = app.staff("nazanin").await;
    let client = app.party(PartyRole::Customer, "Aria Trading").await;
    let service = &app.services().shipments;

    let mut draft = ShipmentDraft::new(client.id);
    draft.etd = Some(business_time(2024, 3, 5, 0, 0).date());
    draft.eta = Some(business_time(2024, 3, 9, 0, 0).date());
    draft.freight_charge = Some(dec!(1200));
    draft.handling_charge = Some(dec!(250.5));

    let saved = service
        .create(draft.clone(), None, &service.context(Some(operator.id)))
        .await
        .unwrap();
    assert_eq!(saved.transit_time, Some(4));
    assert_eq!(saved.total_charges, Some(dec!(1450.5)));
    assert_eq!(saved.sp_id, Some(operator.id));
    assert!(saved.confirmed_at.is_none());

    draft.eta = None;
    draft.extra_charges = Some(dec!(49.5));
    draft.sp_id = None;
    let updated = service
        .update(saved.id, draft, &service.context(None))
        .await
        .unwrap();
    assert_eq!(updated.transit_time, None);
    assert_eq!(updated.total_charges, Some(dec!(1500)));
    assert_eq!(updated.reference, saved.reference);
}

#[tokio::test]
async fn first_confirmation_is_stamped_once() {
    let app = TestApp::new().await;
    let client = app.party(PartyRole::Customer, "Aria Trading").await;
    let service = &app.services().shipments;
    let saved = service
        .create(ShipmentDraft::new(client.id), None, &service.context(None))
        .await
        .unwrap();

    app.clock.set(business_time(2024, 3, 5, 14, 10));
    let confirmed = service
        .set_confirmation(saved.id, true, &service.context(None))
        .await
        .unwrap();
    assert_eq!(
        confirmed.confirmed_at,
        Some(business_time(2024, 3, 5, 14, 10))
    );

    app.clock.set(business_time(2024, 3, 7, 8, 0));
    let reopened = service
        .set_confirmation(saved.id, false, &service.context(None))
        .await
        .unwrap();
    assert!(!reopened.confirmed);
    let reconfirmed = service
        .set_confirmation(saved.id, true, &service.context(None))
        .await
        .unwrap();
    assert_eq!(
        reconfirmed.confirmed_at,
        Some(business_time(2024, 3, 5, 14, 10))
    );
}

#[tokio::test]
async fn links_must_point_at_the_right_kind_of_record() {
    let app = TestApp::new().await;
    let client = app.party(PartyRole::Customer, "Aria Trading").await;
    let carrier = app.party(PartyRole::Carrier, "Iran Air").await;
    let pod = app.lookup(LookupKind::Pod, "FRA").await;
    let service = &app.services().shipments;

    let mut draft = ShipmentDraft::new(client.id);
    draft.carrier_id = Some(client.id);
    let err = service
        .create(draft, None, &service.context(None))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let mut draft = ShipmentDraft::new(client.id);
    draft.carrier_id = Some(carrier.id);
    draft.pol_id = Some(pod.id);
    let err = service
        .create(draft, None, &service.context(None))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn referenced_parties_cannot_be_deleted() {
    let app = TestApp::new().await;
    let client = app.party(PartyRole::Customer, "Aria Trading").await;
    let service = &app.services().shipments;
    service
        .create(ShipmentDraft::new(client.id), None, &service.context(None))
        .await
        .unwrap();

    let err = app.services().parties.delete(client.id).await.unwrap_err();
    assert_matches!(err, ServiceError::ConstraintViolation(_));
    assert!(app.services().parties.get(client.id).await.is_ok());
}

#[tokio::test]
async fn deleting_a_lookup_takes_its_shipments_along() {
    let app = TestApp::new().await;
    let client = app.party(PartyRole::Customer, "Aria Trading").await;
    let pol = app.lookup(LookupKind::Pol, "IKA").await;
    let service = &app.services().shipments;

    let mut draft = ShipmentDraft::new(client.id);
    draft.pol_id = Some(pol.id);
    let linked = service
        .create(draft, None, &service.context(None))
        .await
        .unwrap();
    let unlinked = service
        .create(ShipmentDraft::new(client.id), None, &service.context(None))
        .await
        .unwrap();
    app.services()
        .charges
        .create(
            linked.id,
            forwarder_api::services::charges::ChargeDraft {
                description: "Fuel surcharge".into(),
                amount: dec!(80),
                currency: "usd".into(),
                payer: Default::default(),
            },
        )
        .await
        .unwrap();

    let removed = app.services().lookups.delete(pol.id).await.unwrap();
    assert_eq!(removed, 1);
    assert_matches!(
        service.get(linked.id).await,
        Err(ServiceError::NotFound(_))
    );
    assert!(service.get(unlinked.id).await.is_ok());
}

#[tokio::test]
async fn search_reaches_party_names_and_references() {
    let app = TestApp::new().await;
    let aria = app.party(PartyRole::Customer, "Aria Trading").await;
    let pars = app.party(PartyRole::Customer, "Pars Logistics").await;
    let service = &app.services().shipments;

    let mut draft = ShipmentDraft::new(aria.id);
    draft.mawb = Some("157-12345675".into());
    service
        .create(draft, None, &service.context(None))
        .await
        .unwrap();
    service
        .create(ShipmentDraft::new(pars.id), None, &service.context(None))
        .await
        .unwrap();

    let by_name = ShipmentFilter {
        search: Some("pars".into()),
        ..Default::default()
    };
    let (found, total) = service.list(by_name, 1, 50).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(found[0].client_id, pars.id);

    let by_mawb = ShipmentFilter {
        search: Some("12345".into()),
        ..Default::default()
    };
    let (found, _) = service.list(by_mawb, 1, 50).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].client_id, aria.id);
}

#[tokio::test]
async fn operators_are_replaced_as_a_set() {
    let app = TestApp::new().await;
    let a = app.staff("ali").await;
    let b = app.staff("bahar").await;
    let client = app.party(PartyRole::Customer, "Aria Trading").await;
    let service = &app.services().shipments;
    let saved = service
        .create(ShipmentDraft::new(client.id), None, &service.context(None))
        .await
        .unwrap();

    let operators = service
        .set_operators(saved.id, vec![b.id, a.id, b.id])
        .await
        .unwrap();
    let names: Vec<_> = operators.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, ["ali", "bahar"]);

    service.set_operators(saved.id, vec![a.id]).await.unwrap();
    assert_eq!(service.operators(saved.id).await.unwrap().len(), 1);

    let err = service
        .set_operators(saved.id, vec![uuid::Uuid::new_v4()])
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}
