//! Fields recomputed on every shipment save.

use crate::entities::shipment;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Who is saving and when, passed explicitly into every shipment write.
#[derive(Debug, Clone, Copy)]
pub struct SaveContext {
    pub acting_user: Option<Uuid>,
    pub now_local: NaiveDateTime,
}

impl SaveContext {
    pub fn new(acting_user: Option<Uuid>, now_local: NaiveDateTime) -> Self {
        Self {
            acting_user,
            now_local,
        }
    }
}

/// Brings the derived columns of `model` up to date.
pub fn apply_derived_fields(model: &mut shipment::Model, ctx: &SaveContext) {
    if model.sp_id.is_none() {
        model.sp_id = ctx.acting_user;
    }

    if model.confirmed && model.confirmed_at.is_none() {
        model.confirmed_at = Some(ctx.now_local);
    }

    model.transit_time = transit_days(model);
    model.total_charges = Some(total_charges(model));
}

/// Whole days from ETD to ETA; negative when ETA precedes ETD.
pub fn transit_days(model: &shipment::Model) -> Option<i32> {
    match (model.etd, model.eta) {
        (Some(etd), Some(eta)) => i32::try_from((eta - etd).num_days()).ok(),
        _ => None,
    }
}

pub fn total_charges(model: &shipment::Model) -> Decimal {
    [
        model.freight_charge,
        model.handling_charge,
        model.extra_charges,
    ]
    .into_iter()
    .flatten()
    .sum()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::entities::{Priority, TransportMode};
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    pub(crate) fn blank_shipment() -> shipment::Model {
        let now = Utc::now();
        shipment::Model {
            id: Uuid::new_v4(),
            reference: "240305001".into(),
            priority: Priority::Green,
            client_id: Uuid::new_v4(),
            sp_id: None,
            agent_id: None,
            carrier_id: None,
            shipper_id: None,
            consignee_id: None,
            hawb_shipper_id: None,
            hawb_consignee_id: None,
            pol_id: None,
            pod_id: None,
            term_id: None,
            via: None,
            mode: TransportMode::Air,
            mawb: None,
            hawb: None,
            first_master: None,
            first_house: None,
            flight_no: None,
            manifest_no: None,
            etdw: None,
            etd: None,
            eta: None,
            transit_time: Some(99),
            pieces: None,
            gross_weight: None,
            volume: None,
            chargeable_weight: None,
            first_gross_weight: None,
            first_chargeable_weight: None,
            commodity: None,
            hs_code: None,
            console_id: None,
            inq_replied: false,
            confirmed: false,
            confirmed_at: None,
            currency: None,
            freight_charge: None,
            handling_charge: None,
            extra_charges: None,
            total_charges: None,
            invoice_deadline: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn acting_user_fills_empty_responsible_staff_only() {
        let user = Uuid::new_v4();
        let mut model = blank_shipment();
        apply_derived_fields(&mut model, &SaveContext::new(Some(user), at(9)));
        assert_eq!(model.sp_id, Some(user));

        let other = Uuid::new_v4();
        apply_derived_fields(&mut model, &SaveContext::new(Some(other), at(10)));
        assert_eq!(model.sp_id, Some(user));
    }

    #[test]
    fn confirmation_stamp_is_written_once() {
        let mut model = blank_shipment();
        let ctx = SaveContext::new(None, at(9));

        apply_derived_fields(&mut model, &ctx);
        assert_eq!(model.confirmed_at, None);

        model.confirmed = true;
        apply_derived_fields(&mut model, &ctx);
        assert_eq!(model.confirmed_at, Some(at(9)));

        model.confirmed = false;
        apply_derived_fields(&mut model, &SaveContext::new(None, at(10)));
        model.confirmed = true;
        apply_derived_fields(&mut model, &SaveContext::new(None, at(11)));
        assert_eq!(model.confirmed_at, Some(at(9)));
    }

    #[test]
    fn transit_time_needs_both_dates() {
        let mut model = blank_shipment();
        model.etd = NaiveDate::from_ymd_opt(2024, 3, 5);
        apply_derived_fields(&mut model, &SaveContext::new(None, at(9)));
        assert_eq!(model.transit_time, None);

        model.eta = NaiveDate::from_ymd_opt(2024, 3, 12);
        apply_derived_fields(&mut model, &SaveContext::new(None, at(9)));
        assert_eq!(model.transit_time, Some(7));

        model.eta = NaiveDate::from_ymd_opt(2024, 3, 1);
        apply_derived_fields(&mut model, &SaveContext::new(None, at(9)));
        assert_eq!(model.transit_time, Some(-4));
    }

    #[test]
    fn total_charges_treats_missing_components_as_zero() {
        let mut model = blank_shipment();
        apply_derived_fields(&mut model, &SaveContext::new(None, at(9)));
        assert_eq!(model.total_charges, Some(dec!(0)));

        model.freight_charge = Some(dec!(120.50));
        model.extra_charges = Some(dec!(4.25));
        apply_derived_fields(&mut model, &SaveContext::new(None, at(9)));
        assert_eq!(model.total_charges, Some(dec!(124.75)));
    }

    proptest::proptest! {
        #[test]
        fn transit_time_is_the_day_difference(start in 0i64..20_000, days in -400i64..400) {
            let base = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
            let etd = base + chrono::Duration::days(start);
            let mut model = blank_shipment();
            model.etd = Some(etd);
            model.eta = Some(etd + chrono::Duration::days(days));
            apply_derived_fields(&mut model, &SaveContext::new(None, at(9)));
            proptest::prop_assert_eq!(model.transit_time, Some(days as i32));
        }
    }
}
