//! Planner and sequencer properties

use proptest::prelude::*;
use tas_core::planner::{
    invert_changes, percentage_of, plan_downsize, plan_resize, plan_upsize, rollback_downsize_list,
    rollback_upsize_list, InstanceRequest,
};
use tas_core::sequencer::{resize_units, DOWNSIZE, UPSIZE, WRAPUP};
use tas_core::{InstanceCountChange, ResizeStrategy, SetupVariant};

#[test]
fn test_half_of_ten() {
    let plan = plan_resize(
        InstanceRequest::percentage(50),
        None,
        10,
        false,
        SetupVariant::Canary,
    )
    .unwrap();
    assert_eq!(plan.upsize_count, 5);
    assert_eq!(plan.downsize_count, 5);
    assert!(!plan.skip_old_downsize);
}

#[test]
fn test_ignoring_manifest_sizes_to_request() {
    let plan = plan_resize(
        InstanceRequest::absolute(7),
        None,
        3,
        true,
        SetupVariant::Basic,
    )
    .unwrap();
    assert_eq!(plan.total_desired_count, 7);
    assert_eq!(plan.upsize_count, 7);
    assert_eq!(plan.downsize_count, 0);
}

#[test]
fn test_blue_green_full_upsize_keeps_old() {
    let plan = plan_resize(
        InstanceRequest::percentage(100),
        None,
        4,
        false,
        SetupVariant::BlueGreen,
    )
    .unwrap();
    assert_eq!(plan.downsize_count, 0);
    assert!(plan.skip_old_downsize);
}

#[test]
fn test_sequencer_order() {
    assert_eq!(
        resize_units(ResizeStrategy::UpsizeNewFirst),
        vec![UPSIZE, DOWNSIZE, WRAPUP]
    );
    assert_eq!(
        resize_units(ResizeStrategy::DownsizeOldFirst),
        vec![DOWNSIZE, UPSIZE, WRAPUP]
    );
}

#[test]
fn test_rollback_restores_zeroed_old_version() {
    let recorded = vec![
        InstanceCountChange::new("orders__1", "g1", 0, 4),
        InstanceCountChange::new("orders__0", "g0", 4, 0),
    ];
    let inverted = invert_changes(&recorded);

    let upsize = rollback_upsize_list(&inverted, Some("orders__1"));
    let downsize = rollback_downsize_list(&inverted);
    assert_eq!(upsize.len(), 1);
    assert_eq!(upsize[0].name, "orders__0");
    assert_eq!(upsize[0].desired_count, 4);
    assert_eq!(downsize.len(), 1);
    assert_eq!(downsize[0].name, "orders__1");
}

proptest! {
    #[test]
    fn prop_percentage_upsize_rounds(value in 0i64..=100, total in 0u32..10_000) {
        let expected = (value as f64 * f64::from(total) / 100.0).round() as u32;
        prop_assert_eq!(plan_upsize(InstanceRequest::percentage(value), total), expected);
    }

    #[test]
    fn prop_percentage_above_hundred_caps(value in 100i64..1_000, total in 0u32..10_000) {
        prop_assert_eq!(percentage_of(value, total), total);
    }

    #[test]
    fn prop_absolute_upsize_is_capped(value in 0i64..100_000, total in 0u32..10_000) {
        let upsize = plan_upsize(InstanceRequest::absolute(value), total);
        prop_assert_eq!(i64::from(upsize), value.min(i64::from(total)));
    }

    #[test]
    fn prop_default_downsize_is_remainder(total in 0u32..10_000, upsize in 0u32..20_000) {
        prop_assert_eq!(plan_downsize(None, total, upsize), total.saturating_sub(upsize));
    }

    #[test]
    fn prop_plan_never_exceeds_total(
        value in 0i64..500,
        percentage in any::<bool>(),
        total in 0u32..1_000,
    ) {
        let request = if percentage {
            InstanceRequest::percentage(value)
        } else {
            InstanceRequest::absolute(value)
        };
        let plan = plan_resize(request, None, total, false, SetupVariant::Basic).unwrap();
        prop_assert!(plan.upsize_count <= total);
        prop_assert_eq!(plan.upsize_count + plan.downsize_count, total);
    }

    #[test]
    fn prop_inverting_twice_is_identity(previous in 0u32..100, desired in 0u32..100) {
        let change = InstanceCountChange::new("orders__1", "g1", previous, desired);
        let twice = invert_changes(&invert_changes(std::slice::from_ref(&change)));
        prop_assert_eq!(twice, vec![change]);
    }
}
