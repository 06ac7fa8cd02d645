mod common;

use assert_matches::assert_matches;
use common::{business_time, TestApp};
use forwarder_api::{
    entities::{LookupKind, PartyRole},
    errors::ServiceError,
    services::{
        export::COLUMNS,
        import::{CreatedRelations, ImportOptions, RowOutcome},
        lookups::{LookupDraft, LookupFilter},
        parties::PartyFilter,
        shipments::ShipmentDraft,
    },
};
use rust_decimal_macros::dec;

const TWO_ROWS: &str = "\
reference,client,carrier,pol,pod,term,etd,eta,freight_charge,confirmed,confirmed_at
,Aria Trading,Iran Air,IKA,FRA,EXW,2024-03-05,2024-03-07,1200,1,2024.03.01 10:00:00
,Aria Trading,Iran Air,IKA,HAM,EXW,05/03/2024,,,0,
";

async fn party_count(app: &TestApp, name: &str) -> u64 {
    let filter = PartyFilter {
        role: None,
        search: Some(name.into()),
    };
    app.services()
        .parties
        .list(filter, 1, 50)
        .await
        .expect("list parties")
        .1
}

#[tokio::test]
async fn import_creates_missing_names_and_allocates_references() {
    let app = TestApp::new().await;
    let report = app
        .services()
        .imports
        .import_csv(TWO_ROWS, ImportOptions::default(), None)
        .await
        .expect("import");

    assert!(report.committed);
    assert_eq!(report.totals.new, 2);
    assert_eq!(report.totals.error, 0);
    assert_eq!(
        report.created,
        CreatedRelations {
            parties: 2,
            lookups: 4,
            consoles: 0,
            staff_users: 0,
        }
    );

    let refs: Vec<_> = report
        .rows
        .iter()
        .map(|r| r.reference.clone().unwrap_or_default())
        .collect();
    assert_eq!(refs, ["240305001", "240305002"]);

    let first = app
        .services()
        .shipments
        .find_by_reference("240305001")
        .await
        .unwrap()
        .expect("imported shipment");
    assert_eq!(first.transit_time, Some(2));
    assert_eq!(first.total_charges, Some(dec!(1200)));
    assert_eq!(first.confirmed_at, Some(business_time(2024, 3, 1, 10, 0)));
}

#[tokio::test]
async fn exported_file_imports_back_as_updates() {
    let app = TestApp::new().await;
    let imports = &app.services().imports;
    imports
        .import_csv(TWO_ROWS, ImportOptions::default(), None)
        .await
        .unwrap();

    let (file_name, body) = app.services().exports.export().await.unwrap();
    assert!(file_name.ends_with(".csv"));
    let header = body.lines().next().unwrap();
    assert_eq!(header, COLUMNS.join(","));
    assert_eq!(body.lines().count(), 3);

    app.clock.set(business_time(2024, 3, 9, 12, 0));
    let again = imports
        .import_csv(&body, ImportOptions::default(), None)
        .await
        .unwrap();
    assert_eq!(again.totals.new, 0);
    assert_eq!(again.totals.update, 2);
    assert_eq!(again.created, CreatedRelations::default());
    assert!(again.rows.iter().all(|r| r.outcome == RowOutcome::Update));

    let (_, second_export) = app.services().exports.export().await.unwrap();
    assert_eq!(second_export, body);
}

#[tokio::test]
async fn exported_file_rebuilds_an_empty_database() {
    let source = TestApp::new().await;
    let seeded = source
        .services()
        .imports
        .import_csv(TWO_ROWS, ImportOptions::default(), None)
        .await
        .unwrap();
    let (_, body) = source.services().exports.export().await.unwrap();

    let target = TestApp::new().await;
    let imports = &target.services().imports;
    let first = imports
        .import_csv(&body, ImportOptions::default(), None)
        .await
        .expect("import into empty database");
    assert_eq!(first.totals.new, 2);
    assert_eq!(
        first.created,
        CreatedRelations {
            parties: 2,
            // IKA, FRA, HAM and EXW
            lookups: 4,
            consoles: 0,
            staff_users: 0,
        }
    );
    let ids: Vec<_> = first.rows.iter().map(|r| r.shipment_id).collect();
    let seeded_ids: Vec<_> = seeded.rows.iter().map(|r| r.shipment_id).collect();
    assert_eq!(ids, seeded_ids);

    let second = imports
        .import_csv(&body, ImportOptions::default(), None)
        .await
        .unwrap();
    assert_eq!(second.totals.new, 0);
    assert_eq!(second.totals.update, 2);
    assert_eq!(second.created, CreatedRelations::default());

    let lookups = target
        .services()
        .lookups
        .list(LookupFilter::default(), 1, 50)
        .await
        .unwrap();
    assert_eq!(lookups.1, 4);

    let (_, rebuilt) = target.services().exports.export().await.unwrap();
    assert_eq!(rebuilt, body);
}

#[tokio::test]
async fn airport_codes_survive_the_round_trip() {
    let source = TestApp::new().await;
    let client = source.party(PartyRole::Customer, "Aria Trading").await;
    let lookups = &source.services().lookups;
    let pol = lookups
        .create(LookupDraft {
            airport_abbr: Some("IKA".into()),
            ..LookupDraft::named(LookupKind::Pol, "Tehran Imam Khomeini")
        })
        .await
        .unwrap();
    let pod = lookups
        .create(LookupDraft {
            airport_abbr: Some("FRA".into()),
            ..LookupDraft::named(LookupKind::Pod, "Frankfurt")
        })
        .await
        .unwrap();

    let mut draft = ShipmentDraft::new(client.id);
    draft.pol_id = Some(pol.id);
    draft.pod_id = Some(pod.id);
    let shipments = &source.services().shipments;
    let original = shipments
        .create(draft, None, &shipments.context(None))
        .await
        .unwrap();
    let (_, expected_manifest) = source.services().manifests.render(original.id).await.unwrap();
    let (_, body) = source.services().exports.export().await.unwrap();

    let target = TestApp::new().await;
    target
        .services()
        .imports
        .import_csv(&body, ImportOptions::default(), None)
        .await
        .unwrap();

    let (_, manifest) = target.services().manifests.render(original.id).await.unwrap();
    assert!(manifest.lines().next().unwrap().contains(r#""IKA","FRA""#));
    assert_eq!(manifest, expected_manifest);
}

#[tokio::test]
async fn dry_run_reports_without_keeping_anything() {
    let app = TestApp::new().await;
    let options = ImportOptions {
        dry_run: true,
        skip_invalid_rows: false,
    };
    let report = app
        .services()
        .imports
        .import_csv("client,etd\nNova Freight,not-a-date\nNova Freight,2024-03-05\n", options, None)
        .await
        .expect("dry runs always report");

    assert!(report.dry_run);
    assert!(!report.committed);
    assert_eq!(report.totals.new, 1);
    assert_eq!(report.totals.error, 1);
    assert_eq!(report.rows[0].errors[0].column, "etd");
    assert_eq!(party_count(&app, "Nova").await, 0);
}

#[tokio::test]
async fn rejected_rows_roll_back_the_whole_file() {
    let app = TestApp::new().await;
    let err = app
        .services()
        .imports
        .import_csv(
            "client,pieces\nAria Trading,4\nGhost Cargo,four\n",
            ImportOptions::default(),
            None,
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ImportRejected(ref rows) if rows.len() == 1);
    if let ServiceError::ImportRejected(rows) = err {
        assert_eq!(rows[0].row, 2);
        assert_eq!(rows[0].column, "pieces");
        assert_eq!(rows[0].value, "four");
    }
    assert_eq!(party_count(&app, "Aria").await, 0);
    assert_eq!(party_count(&app, "Ghost").await, 0);
}

#[tokio::test]
async fn skipping_invalid_rows_keeps_the_rest() {
    let app = TestApp::new().await;
    let options = ImportOptions {
        dry_run: false,
        skip_invalid_rows: true,
    };
    let report = app
        .services()
        .imports
        .import_csv(
            "client,pieces\nAria Trading,4\nGhost Cargo,four\n,2\n",
            options,
            None,
        )
        .await
        .unwrap();

    assert!(report.committed);
    assert_eq!(report.totals.new, 1);
    assert_eq!(report.totals.error, 2);
    assert_eq!(report.rows[2].errors[0].column, "client");
    assert_eq!(party_count(&app, "Aria").await, 1);
    // the rejected row's client was rolled back with its savepoint
    assert_eq!(party_count(&app, "Ghost").await, 0);
}

#[tokio::test]
async fn unterminated_quotes_fail_the_request() {
    let app = TestApp::new().await;
    let err = app
        .services()
        .imports
        .import_csv("client,via\n\"Aria Trading,DXB\n", ImportOptions::default(), None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::BadRequest(_));
}
